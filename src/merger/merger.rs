//! Kind/name keyed document merging.

use thiserror::Error;
use tracing::debug;

use super::document::DocumentKey;
use crate::value::{Map, Value};

/// ConflictPolicy decides what happens when two documents share a key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// The later document replaces the earlier one.
    #[default]
    Overwrite,
    /// The documents are merged: maps merge recursively, lists are
    /// concatenated, and differing scalars are a conflict.
    DeepMerge,
}

/// MergeError represents an unresolvable merge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MergeError {
    #[error("conflicting values for {key} at {path}")]
    Conflict { key: DocumentKey, path: String },
}

/// Merger accumulates documents into a `kind -> name -> document` tree.
///
/// The order in which documents are pushed decides which one wins under
/// [`ConflictPolicy::Overwrite`], so callers must feed them in a stable
/// order.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    policy: ConflictPolicy,
    tree: Map,
    skipped: usize,
}

impl Merger {
    /// Creates a new Merger.
    pub fn new(policy: ConflictPolicy) -> Self {
        Merger {
            policy,
            tree: Map::new(),
            skipped: 0,
        }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Number of documents dropped for lacking a key so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Adds one document.
    ///
    /// Documents without a `kind` or `metadata.name` string are skipped.
    pub fn push(&mut self, doc: Map) -> Result<(), MergeError> {
        let Some(key) = DocumentKey::of(&doc) else {
            debug!("skipping document without kind or metadata.name");
            self.skipped += 1;
            return Ok(());
        };

        if !matches!(self.tree.get(&key.kind), Some(Value::Map(_))) {
            self.tree.set(key.kind.clone(), Map::new());
        }
        let Some(Value::Map(by_name)) = self.tree.get_mut(&key.kind) else {
            return Ok(());
        };

        match (self.policy, by_name.get_mut(&key.name)) {
            (ConflictPolicy::DeepMerge, Some(Value::Map(existing))) => {
                // Merged into a copy so a conflict leaves the stored document as it was.
                let mut merged = existing.clone();
                let mut path = Vec::new();
                deep_merge(&mut merged, doc, &mut path).map_err(|path| MergeError::Conflict {
                    key: key.clone(),
                    path,
                })?;
                *existing = merged;
            }
            (policy, previous) => {
                if previous.is_some() && policy == ConflictPolicy::Overwrite {
                    debug!(document = %key, "later document replaces earlier one");
                }
                by_name.set(key.name.clone(), doc);
            }
        }
        Ok(())
    }

    /// Adds every document of `docs`, in order.
    pub fn extend<I: IntoIterator<Item = Map>>(&mut self, docs: I) -> Result<(), MergeError> {
        for doc in docs {
            self.push(doc)?;
        }
        Ok(())
    }

    /// Returns the merged tree accumulated so far.
    pub fn tree(&self) -> &Map {
        &self.tree
    }

    /// Consumes the merger and returns the merged tree.
    pub fn finish(self) -> Map {
        self.tree
    }
}

/// Merges `docs` in order with the given policy.
pub fn merge_documents<I: IntoIterator<Item = Map>>(
    docs: I,
    policy: ConflictPolicy,
) -> Result<Map, MergeError> {
    let mut merger = Merger::new(policy);
    merger.extend(docs)?;
    Ok(merger.finish())
}

fn merge_value(existing: &mut Value, incoming: Value, path: &mut Vec<String>) -> Result<(), String> {
    match (existing, incoming) {
        (Value::Map(existing), Value::Map(new_map)) => deep_merge(existing, new_map, path),
        (Value::List(existing), Value::List(new_items)) => {
            existing.extend(new_items);
            Ok(())
        }
        (existing, new_value) if *existing == new_value => Ok(()),
        _ => Err(path.join(".")),
    }
}

/// Merges `incoming` into `target`; on conflict returns the dotted path.
fn deep_merge(target: &mut Map, incoming: Map, path: &mut Vec<String>) -> Result<(), String> {
    for (key, value) in incoming {
        path.push(key.clone());
        match target.get_mut(&key) {
            Some(existing) => merge_value(existing, value, path)?,
            None => {
                target.set(key, value);
            }
        }
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml;
    use pretty_assertions::assert_eq;

    fn map(yaml: &str) -> Map {
        from_yaml(yaml).unwrap().as_map().cloned().unwrap()
    }

    #[test]
    fn test_groups_by_kind_and_name() {
        let merged = merge_documents(
            vec![
                map("kind: Config\nmetadata: {name: a}\nspec: {x: 1}\n"),
                map("kind: Config\nmetadata: {name: b}\nspec: {x: 2}\n"),
                map("kind: Secret\nmetadata: {name: a}\n"),
            ],
            ConflictPolicy::Overwrite,
        )
        .unwrap();

        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["Config", "Secret"]);
        assert_eq!(
            merged.get_path(&["Config", "b", "spec", "x"]),
            Some(&Value::Int(2))
        );
    }

    #[test]
    fn test_later_document_wins() {
        let doc1 = map("kind: Config\nmetadata: {name: a}\nspec: {x: 1, y: 1}\n");
        let doc2 = map("kind: Config\nmetadata: {name: a}\nspec: {x: 2}\n");
        let merged = merge_documents(vec![doc1, doc2.clone()], ConflictPolicy::Overwrite).unwrap();
        assert_eq!(merged.get_path(&["Config", "a"]), Some(&Value::Map(doc2)));
    }

    #[test]
    fn test_documents_without_key_are_skipped() {
        let mut merger = Merger::new(ConflictPolicy::Overwrite);
        merger
            .extend(vec![
                map("kind: Config\n"),
                map("metadata: {name: a}\n"),
                map("kind: Config\nmetadata: {name: a}\n"),
            ])
            .unwrap();
        assert_eq!(merger.skipped(), 2);
        assert_eq!(merger.tree().get_map("Config").unwrap().len(), 1);
    }

    #[test]
    fn test_deep_merge_combines_documents() {
        let merged = merge_documents(
            vec![
                map("kind: Config\nmetadata: {name: a}\nspec: {x: 1, l: [1]}\n"),
                map("kind: Config\nmetadata: {name: a}\nspec: {y: 2, l: [2]}\n"),
            ],
            ConflictPolicy::DeepMerge,
        )
        .unwrap();
        assert_eq!(
            merged.get_path(&["Config", "a", "spec"]),
            Some(&Value::Map(map("{x: 1, y: 2, l: [1, 2]}")))
        );
    }

    #[test]
    fn test_conflict_leaves_tree_untouched() {
        let mut merger = Merger::new(ConflictPolicy::DeepMerge);
        merger
            .push(map("kind: Config\nmetadata: {name: a}\nspec: {x: 1, l: [1]}\n"))
            .unwrap();
        let before = merger.tree().clone();

        // `a` and `l` are merged before `x` conflicts.
        let err = merger
            .push(map("kind: Config\nmetadata: {name: a}\nspec: {a: new, l: [2], x: 2}\n"))
            .unwrap_err();

        assert!(matches!(err, MergeError::Conflict { ref path, .. } if path == "spec.x"));
        assert_eq!(merger.tree(), &before);
    }

    #[test]
    fn test_deep_merge_reports_conflicts() {
        let err = merge_documents(
            vec![
                map("kind: Config\nmetadata: {name: a}\nspec: {x: 1}\n"),
                map("kind: Config\nmetadata: {name: a}\nspec: {x: 2}\n"),
            ],
            ConflictPolicy::DeepMerge,
        )
        .unwrap_err();
        assert_eq!(
            err,
            MergeError::Conflict {
                key: DocumentKey::new("Config", "a"),
                path: "spec.x".to_string(),
            }
        );
    }
}
