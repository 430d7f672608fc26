//! Recursive map comparison.

use std::collections::BTreeSet;

use super::result::DiffResult;
use crate::value::{Map, Value};

/// Compares `candidate` against `current`.
///
/// Keys are classified as follows:
/// - equal values produce no entry;
/// - two differing maps are compared recursively, and each non-empty part
///   of the nested result is stored under the key;
/// - any other difference, including a change of type, stores the whole
///   candidate value in `changed`. Lists are compared as atomic values and
///   never element by element;
/// - keys only in `candidate` go to `added`, keys only in `current` go to
///   `removed`.
pub fn diff(candidate: &Map, current: &Map) -> DiffResult {
    let mut result = DiffResult::new();

    let keys: BTreeSet<&String> = candidate.keys().chain(current.keys()).collect();

    for key in keys {
        match (candidate.get(key), current.get(key)) {
            (Some(new_value), Some(old_value)) => {
                diff_value(key, new_value, old_value, &mut result);
            }
            (Some(new_value), None) => {
                result.added.set(key.clone(), new_value.clone());
            }
            (None, Some(old_value)) => {
                result.removed.set(key.clone(), old_value.clone());
            }
            (None, None) => {}
        }
    }

    result
}

fn diff_value(key: &str, new_value: &Value, old_value: &Value, result: &mut DiffResult) {
    if new_value == old_value {
        return;
    }

    match (new_value, old_value) {
        (Value::Map(new_map), Value::Map(old_map)) => {
            let nested = diff(new_map, old_map);
            if !nested.changed.is_empty() {
                result.changed.set(key, nested.changed);
            }
            if !nested.added.is_empty() {
                result.added.set(key, nested.added);
            }
            if !nested.removed.is_empty() {
                result.removed.set(key, nested.removed);
            }
        }
        // Same-type scalars and lists, or a change of type altogether.
        _ => {
            result.changed.set(key, new_value.clone());
        }
    }
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
    fn test_identical_trees_have_no_diff() {
        let t = map("a: 1\nb: {c: [1, 2], d: {e: null}}\n");
        assert!(diff(&t, &t).is_empty());
    }

    #[test]
    fn test_nested_change() {
        let result = diff(&map("{a: 1, b: {c: 2, d: 3}}"), &map("{a: 1, b: {c: 2, d: 4}}"));
        assert_eq!(result.changed, map("{b: {d: 3}}"));
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
    }

    #[test]
    fn test_lists_are_atomic() {
        let result = diff(&map("l: [1, 2, 3]"), &map("l: [1, 2]"));
        assert_eq!(result.changed, map("l: [1, 2, 3]"));
        assert!(result.added.is_empty());
    }

    #[test]
    fn test_type_change_is_a_change() {
        let result = diff(&map("a: {x: 1}\nb: 1.0\n"), &map("a: 5\nb: 1\n"));
        assert_eq!(result.changed, map("a: {x: 1}\nb: 1.0\n"));
    }

    #[test]
    fn test_one_key_feeds_several_parts() {
        let result = diff(&map("b: {c: 1, n: 2}"), &map("b: {c: 0, o: 3}"));
        assert_eq!(result.changed, map("b: {c: 1}"));
        assert_eq!(result.added, map("b: {n: 2}"));
        assert_eq!(result.removed, map("b: {o: 3}"));
    }
}
