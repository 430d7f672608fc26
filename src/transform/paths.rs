//! Path descriptors.
//!
//! Configuration sources often spell file locations as whitespace separated
//! components (`"{{ project_root }} artifacts log app.log"`) so that they
//! stay portable. These helpers turn such descriptors into paths.

use std::path::{Component, Path, PathBuf};

use crate::value::Value;

/// Joins the whitespace separated components of `desc` into a path and
/// normalizes it lexically.
pub fn path_from_desc(desc: &str) -> String {
    let joined: PathBuf = desc.split_whitespace().collect();
    clean(&joined).to_string_lossy().into_owned()
}

/// Value rewrite applying [`path_from_desc`] to string values.
///
/// Other values are returned unchanged.
pub fn path_value_from_desc(value: &Value) -> Value {
    match value {
        Value::String(desc) => Value::String(path_from_desc(desc)),
        other => other.clone(),
    }
}

/// Removes `.` components and resolves `..` against preceding components
/// without touching the filesystem.
fn clean(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_joins_components() {
        let expected: PathBuf = ["artifacts", "test", "log", "app.log"].iter().collect();
        assert_eq!(
            path_from_desc("artifacts  test\tlog app.log"),
            expected.to_string_lossy()
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_cleans_lexically() {
        assert_eq!(path_from_desc("/srv/app ./logs ../var x.log"), "/srv/app/var/x.log");
        assert_eq!(path_from_desc("/ .. etc"), "/etc");
        assert_eq!(path_from_desc(".. a"), "../a");
        assert_eq!(path_from_desc(""), ".");
    }

    #[test]
    fn test_value_rewrite_ignores_non_strings() {
        assert_eq!(path_value_from_desc(&Value::Int(3)), Value::Int(3));
        assert_eq!(
            path_value_from_desc(&Value::String("a".into())),
            Value::String("a".into())
        );
    }
}
