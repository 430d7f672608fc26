//! Preprocessor for in-place tree rewrites.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;
use tracing::trace;

use crate::value::{Map, NodeId, Value};

/// Decides whether a key should be rewritten.
pub type KeyFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;
/// Produces the new name of a matched key.
pub type KeyRename = Box<dyn Fn(&str) -> String + Send + Sync>;
/// Produces the new value of a matched key from its old value.
pub type ValueRewrite = Box<dyn Fn(&Value) -> Value + Send + Sync>;

/// TransformError reports an incomplete preprocessor definition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransformError {
    #[error("preprocessor is missing its {0} function")]
    MissingFunction(&'static str),
}

/// PreprocessorBuilder is a builder for creating a Preprocessor.
#[derive(Default)]
pub struct PreprocessorBuilder {
    key_filter: Option<KeyFilter>,
    key_rename: Option<KeyRename>,
    value_rewrite: Option<ValueRewrite>,
    keep_original_key: bool,
}

impl PreprocessorBuilder {
    /// Creates a new PreprocessorBuilder.
    pub fn new() -> Self {
        PreprocessorBuilder::default()
    }

    /// Sets the predicate selecting the keys to rewrite.
    pub fn key_filter(mut self, f: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.key_filter = Some(Box::new(f));
        self
    }

    /// Sets the function naming the rewritten key.
    pub fn key_rename(mut self, f: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.key_rename = Some(Box::new(f));
        self
    }

    /// Sets the function producing the rewritten value.
    pub fn value_rewrite(mut self, f: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        self.value_rewrite = Some(Box::new(f));
        self
    }

    /// Keeps the matched key next to its rewritten counterpart.
    pub fn keep_original_key(mut self, keep: bool) -> Self {
        self.keep_original_key = keep;
        self
    }

    /// Builds the Preprocessor.
    pub fn build(self) -> Result<Preprocessor, TransformError> {
        Ok(Preprocessor {
            key_filter: self
                .key_filter
                .ok_or(TransformError::MissingFunction("key filter"))?,
            key_rename: self
                .key_rename
                .ok_or(TransformError::MissingFunction("key rename"))?,
            value_rewrite: self
                .value_rewrite
                .ok_or(TransformError::MissingFunction("value rewrite"))?,
            keep_original_key: self.keep_original_key,
        })
    }
}

/// Preprocessor rewrites every matching key of a tree.
///
/// For each map entry whose key passes the filter, the key is renamed and
/// the value rewritten; the rewritten value is then searched for further
/// matches. Entries that do not match are searched as they are. Renamed
/// entries are merged back once the whole map has been visited, and the
/// original entry is dropped unless `keep_original_key` is set.
///
/// Within one pass a rewritten map is only processed once: when the
/// rewrite hands back a node already processed in this pass (same
/// [`NodeId`] and same content), the earlier result is reused instead of
/// walking it again.
pub struct Preprocessor {
    key_filter: KeyFilter,
    key_rename: KeyRename,
    value_rewrite: ValueRewrite,
    keep_original_key: bool,
}

/// Rewritten maps seen during one pass, by node identity: the rewrite
/// output as produced and its processed result.
type Visited = HashMap<NodeId, (Value, Value)>;

impl Preprocessor {
    /// Creates a new PreprocessorBuilder.
    pub fn builder() -> PreprocessorBuilder {
        PreprocessorBuilder::new()
    }

    /// Rewrites every key named `from` into `to`.
    pub fn rename_key(
        from: impl Into<String>,
        to: impl Into<String>,
        rewrite: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        let from = from.into();
        let to = to.into();
        Preprocessor {
            key_filter: Box::new(move |key| key == from),
            key_rename: Box::new(move |_| to.clone()),
            value_rewrite: Box::new(rewrite),
            keep_original_key: false,
        }
    }

    /// Rewrites every key ending in `suffix` into the key without it.
    ///
    /// A key equal to `suffix` is left alone.
    pub fn strip_suffix(
        suffix: impl Into<String>,
        rewrite: impl Fn(&Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        let suffix = suffix.into();
        let filter_suffix = suffix.clone();
        Preprocessor {
            key_filter: Box::new(move |key| key.len() > filter_suffix.len() && key.ends_with(&*filter_suffix)),
            key_rename: Box::new(move |key| {
                key.strip_suffix(&*suffix).unwrap_or(key).to_string()
            }),
            value_rewrite: Box::new(rewrite),
            keep_original_key: false,
        }
    }

    pub fn keeps_original_key(&self) -> bool {
        self.keep_original_key
    }

    /// Runs one pass over `tree`, modifying it in place.
    pub fn apply(&self, tree: &mut Map) {
        let mut visited = Visited::new();
        self.process_map(tree, &mut visited);
    }

    /// Runs one pass over a copy of `tree` and returns it.
    pub fn applied(&self, tree: &Map) -> Map {
        let mut copy = tree.clone();
        self.apply(&mut copy);
        copy
    }

    fn process_map(&self, map: &mut Map, visited: &mut Visited) {
        let mut rewritten: Vec<(String, Value)> = Vec::new();
        let mut matched: Vec<String> = Vec::new();

        for (key, value) in map.iter_mut() {
            if (self.key_filter)(key.as_str()) {
                let new_key = (self.key_rename)(key.as_str());
                let new_value = self.process_rewritten((self.value_rewrite)(&*value), visited);
                trace!(from = %key, to = %new_key, "rewrote key");
                rewritten.push((new_key, new_value));
                matched.push(key.clone());
            } else {
                self.process_value(value, visited);
            }
        }

        // Originals go first so a key renamed onto itself keeps its new value.
        if !self.keep_original_key {
            for key in &matched {
                map.delete(key);
            }
        }
        for (key, value) in rewritten {
            map.set(key, value);
        }
    }

    fn process_rewritten(&self, mut value: Value, visited: &mut Visited) -> Value {
        let id = match &value {
            Value::Map(m) => m.id(),
            _ => {
                self.process_value(&mut value, visited);
                return value;
            }
        };

        // A clone edited after the fact keeps its id, so only an output
        // equal to the one seen before counts as the same node.
        if let Some((seen, done)) = visited.get(&id) {
            if *seen == value {
                trace!(node = id.get(), "rewritten node already processed");
                return done.clone();
            }
        }
        // Mark before walking so a node reachable from itself stops here.
        let seen = value.clone();
        visited.insert(id, (seen.clone(), seen.clone()));
        self.process_value(&mut value, visited);
        visited.insert(id, (seen, value.clone()));
        value
    }

    fn process_value(&self, value: &mut Value, visited: &mut Visited) {
        match value {
            Value::Map(m) => self.process_map(m, visited),
            Value::List(items) => {
                for item in items.iter_mut() {
                    self.process_value(item, visited);
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for Preprocessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preprocessor")
            .field("keep_original_key", &self.keep_original_key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::from_yaml;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn map(yaml: &str) -> Map {
        from_yaml(yaml).unwrap().as_map().cloned().unwrap()
    }

    fn upper(value: &Value) -> Value {
        match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other.clone(),
        }
    }

    #[test]
    fn test_builder_requires_all_functions() {
        let err = Preprocessor::builder()
            .key_filter(|k| k == "a")
            .key_rename(|k| k.to_string())
            .build()
            .unwrap_err();
        assert_eq!(err, TransformError::MissingFunction("value rewrite"));
    }

    #[test]
    fn test_rename_drops_original_key() {
        let p = Preprocessor::rename_key("outputPathDesc", "outputPath", upper);
        let mut tree = map("cores:\n  file: {outputPathDesc: a b, level: warn}\n");
        p.apply(&mut tree);
        assert_eq!(tree, map("cores:\n  file: {outputPath: A B, level: warn}\n"));
    }

    #[test]
    fn test_keep_original_key() {
        let p = Preprocessor::builder()
            .key_filter(|k| k == "name")
            .key_rename(|_| "display".to_string())
            .value_rewrite(upper)
            .keep_original_key(true)
            .build()
            .unwrap();
        let mut tree = map("{name: web}");
        p.apply(&mut tree);
        assert_eq!(tree, map("{name: web, display: WEB}"));
    }

    #[test]
    fn test_matches_inside_lists() {
        let p = Preprocessor::strip_suffix("_desc", upper);
        let mut tree = map("handlers:\n  - {log_desc: x}\n  - [{dir_desc: y}]\n  - plain\n");
        p.apply(&mut tree);
        assert_eq!(tree, map("handlers:\n  - {log: X}\n  - [{dir: Y}]\n  - plain\n"));
    }

    #[test]
    fn test_rewritten_values_are_searched_too() {
        // The rewrite wraps the value in a map that itself holds a matching key.
        let p = Preprocessor::builder()
            .key_filter(|k| k.starts_with("wrap"))
            .key_rename(|k| format!("done_{}", k))
            .value_rewrite(|v| match v {
                Value::Int(n) if *n > 0 => {
                    let mut inner = Map::new();
                    inner.set("wrap", n - 1);
                    Value::Map(inner)
                }
                other => other.clone(),
            })
            .build()
            .unwrap();
        let mut tree = map("{wrap: 2}");
        p.apply(&mut tree);
        assert_eq!(tree, map("{done_wrap: {done_wrap: {done_wrap: 0}}}"));
    }

    #[test]
    fn test_second_pass_is_a_noop() {
        let p = Preprocessor::strip_suffix("_desc", upper);
        let mut tree = map("{a_desc: x, b: {c_desc: y, d: z}}");
        p.apply(&mut tree);
        let once = tree.clone();
        p.apply(&mut tree);
        assert_eq!(tree, once);
        assert_eq!(once, map("{a: X, b: {c: Y, d: z}}"));
    }

    #[test]
    fn test_shared_rewrite_output_is_processed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let template = map("{inner_desc: v}");
        let counter = Arc::clone(&calls);
        let p = Preprocessor::builder()
            .key_filter(|k| k.ends_with("_desc"))
            .key_rename(|k| k.trim_end_matches("_desc").to_string())
            .value_rewrite(move |v| {
                counter.fetch_add(1, Ordering::SeqCst);
                match v {
                    // Every top-level match hands back the same node.
                    Value::String(s) if s == "shared" => Value::Map(template.clone()),
                    other => upper(other),
                }
            })
            .build()
            .unwrap();

        let mut tree = map("{a_desc: shared, b_desc: shared}");
        p.apply(&mut tree);

        assert_eq!(tree, map("{a: {inner: V}, b: {inner: V}}"));
        // Two top-level rewrites, and the shared node's inner key only once.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_edited_clones_of_one_template_stay_distinct() {
        let template = map("{rotate: true}");
        let p = Preprocessor::strip_suffix("_desc", move |v| {
            let mut m = template.clone();
            m.set("path", v.clone());
            Value::Map(m)
        });

        let mut tree = map("{a_desc: x.log, b_desc: y.log}");
        p.apply(&mut tree);

        assert_eq!(
            tree,
            map("{a: {path: x.log, rotate: true}, b: {path: y.log, rotate: true}}")
        );
    }

    #[test]
    fn test_edited_sibling_clones_stay_distinct() {
        let first = map("{lvl_desc: info}");
        let mut second = first.clone();
        second.set("lvl_desc", "debug");
        assert_eq!(first.id(), second.id());

        let mut tree = Map::new();
        tree.set("a", [("cfg_desc", first)].into_iter().collect::<Map>());
        tree.set("b", [("cfg_desc", second)].into_iter().collect::<Map>());

        let p = Preprocessor::strip_suffix("_desc", |v: &Value| v.clone());
        p.apply(&mut tree);

        assert_eq!(tree, map("{a: {cfg: {lvl: info}}, b: {cfg: {lvl: debug}}}"));
    }

    #[test]
    fn test_rename_onto_itself_keeps_new_value() {
        let p = Preprocessor::builder()
            .key_filter(|k| k == "level")
            .key_rename(|k| k.to_string())
            .value_rewrite(upper)
            .build()
            .unwrap();
        let mut tree = map("{level: info}");
        p.apply(&mut tree);
        assert_eq!(tree, map("{level: INFO}"));
    }

    #[test]
    fn test_scalars_stop_recursion() {
        let p = Preprocessor::strip_suffix("_desc", upper);
        let tree = map("{a: 1, b: text, c: null}");
        assert_eq!(p.applied(&tree), tree);
    }
}
