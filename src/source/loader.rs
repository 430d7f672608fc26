//! Directory loading.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::LoadError;
use super::parser::{DocumentParser, YamlParser};
use super::template::{PlaceholderRenderer, TemplateRenderer};
use crate::merger::{ConflictPolicy, Merger};
use crate::value::{Map, Value};

/// Kind loaded by [`DirectoryLoader::load_config`].
pub const DEFAULT_KIND: &str = "Config";

/// DirectoryLoader reads every source file of a set of directories and
/// merges the documents they contain.
///
/// Directories are read in the order given, files within one directory in
/// lexical order of their names, so with [`ConflictPolicy::Overwrite`] a
/// document in a later directory overrides one in an earlier directory.
/// Hidden entries (names starting with `.`) are skipped.
pub struct DirectoryLoader {
    root: PathBuf,
    dirs: Vec<String>,
    params: Map,
    extension: String,
    recursive: bool,
    policy: ConflictPolicy,
    renderer: Box<dyn TemplateRenderer>,
    parser: Box<dyn DocumentParser>,
}

impl DirectoryLoader {
    /// Creates a loader reading `dirs` relative to `root`.
    pub fn new<I, S>(root: impl Into<PathBuf>, dirs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        DirectoryLoader {
            root: root.into(),
            dirs: dirs.into_iter().map(Into::into).collect(),
            params: Map::new(),
            extension: "yaml".to_string(),
            recursive: false,
            policy: ConflictPolicy::default(),
            renderer: Box::new(PlaceholderRenderer),
            parser: Box::new(YamlParser),
        }
    }

    /// Replaces the template parameters.
    pub fn with_params(mut self, params: Map) -> Self {
        self.params = params;
        self
    }

    /// Sets one template parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.set(key, value);
        self
    }

    /// Sets the extension of the files to read, without the leading dot.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Descends into subdirectories when set.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_renderer(mut self, renderer: impl TemplateRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_parser(mut self, parser: impl DocumentParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn params(&self) -> &Map {
        &self.params
    }

    /// Returns the absolute locations of the configured directories.
    pub fn config_dirs(&self) -> Vec<PathBuf> {
        self.dirs.iter().map(|d| self.root.join(d)).collect()
    }

    /// Lists the files that [`load`](Self::load) reads, in reading order.
    ///
    /// Every directory is checked before any is listed, so a missing
    /// directory fails the whole call.
    pub fn files(&self) -> Result<Vec<PathBuf>, LoadError> {
        let dirs = self.config_dirs();
        if let Some(missing) = dirs.iter().find(|d| !d.is_dir()) {
            return Err(LoadError::MissingDirectory(missing.clone()));
        }

        let mut files = Vec::new();
        for dir in &dirs {
            self.collect_files(dir, &mut files)?;
        }
        Ok(files)
    }

    fn collect_files(&self, dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
        let read_err = |source| LoadError::ReadDirectory {
            path: dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(dir)
            .map_err(read_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err)?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            if is_hidden(&path) {
                debug!(path = %path.display(), "skipping hidden entry");
                continue;
            }
            if path.is_dir() {
                if self.recursive {
                    self.collect_files(&path, files)?;
                }
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) == Some(self.extension.as_str()) {
                files.push(path);
            } else {
                debug!(path = %path.display(), "skipping file with other extension");
            }
        }
        Ok(())
    }

    /// Reads, renders, parses and merges every source file.
    pub fn load(&self) -> Result<Map, LoadError> {
        let mut merger = Merger::new(self.policy);
        for path in self.files()? {
            let raw = fs::read_to_string(&path).map_err(|source| LoadError::ReadFile {
                path: path.clone(),
                source,
            })?;
            let text = self
                .renderer
                .render(&raw, &self.params)
                .map_err(|source| LoadError::Template {
                    path: path.clone(),
                    source,
                })?;
            let docs = self.parser.parse(&text).map_err(|source| LoadError::Parse {
                path: path.clone(),
                source,
            })?;

            debug!(path = %path.display(), documents = docs.len(), "loaded file");
            merger
                .extend(docs)
                .map_err(|source| LoadError::Merge { path, source })?;
        }

        if merger.skipped() > 0 {
            debug!(skipped = merger.skipped(), "documents without kind or name were skipped");
        }
        Ok(merger.finish())
    }

    /// Loads and returns the `name -> document` mapping of one kind.
    ///
    /// An absent kind yields an empty map.
    pub fn load_kind(&self, kind: &str) -> Result<Map, LoadError> {
        let mut tree = self.load()?;
        match tree.delete(kind) {
            Some(Value::Map(m)) => Ok(m),
            _ => Ok(Map::new()),
        }
    }

    /// Loads the [`DEFAULT_KIND`] documents.
    pub fn load_config(&self) -> Result<Map, LoadError> {
        self.load_kind(DEFAULT_KIND)
    }
}

impl fmt::Debug for DirectoryLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryLoader")
            .field("root", &self.root)
            .field("dirs", &self.dirs)
            .field("params", &self.params)
            .field("extension", &self.extension)
            .field("recursive", &self.recursive)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

/// Walks up from `start` and returns the first directory matching
/// `predicate`, `start` included.
pub fn find_parent_dir(start: &Path, predicate: impl Fn(&Path) -> bool) -> Option<PathBuf> {
    start.ancestors().find(|dir| predicate(dir)).map(Path::to_path_buf)
}

/// Returns the closest enclosing directory that holds a `.git` entry.
pub fn find_git_root(start: &Path) -> Option<PathBuf> {
    find_parent_dir(start, |dir| dir.join(".git").exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merger::MergeError;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "base/10-logging.yaml",
            "kind: Config\nmetadata: {name: logging}\nspec: {level: info, dir: '{{ project_root }}/log'}\n",
        );
        write(
            tmp.path(),
            "base/20-web.yaml",
            "kind: Config\nmetadata: {name: web}\nspec: {port: 80}\n---\nkind: Secret\nmetadata: {name: token}\n",
        );
        write(tmp.path(), "base/.hidden.yaml", "kind: Config\nmetadata: {name: hidden}\n");
        write(tmp.path(), "base/notes.txt", "not yaml: [");
        write(tmp.path(), "base/nested/30-db.yaml", "kind: Config\nmetadata: {name: db}\n");
        write(
            tmp.path(),
            "test/10-logging.yaml",
            "kind: Config\nmetadata: {name: logging}\nspec: {level: debug}\n",
        );
        tmp
    }

    #[test]
    fn test_files_in_order() {
        let tmp = fixture();
        let loader = DirectoryLoader::new(tmp.path(), ["base", "test"]);
        let names: Vec<_> = loader
            .files()
            .unwrap()
            .iter()
            .map(|p| p.strip_prefix(tmp.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("base/10-logging.yaml"),
                PathBuf::from("base/20-web.yaml"),
                PathBuf::from("test/10-logging.yaml"),
            ]
        );
    }

    #[test]
    fn test_recursive_listing() {
        let tmp = fixture();
        let loader = DirectoryLoader::new(tmp.path(), ["base"]).recursive(true);
        let files = loader.files().unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[2].ends_with("nested/30-db.yaml"));
    }

    #[test]
    fn test_load_merges_with_later_directory_winning() {
        let tmp = fixture();
        let tree = DirectoryLoader::new(tmp.path(), ["base", "test"])
            .with_param("ProjectRoot", "/srv")
            .load()
            .unwrap();

        assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["Config", "Secret"]);
        assert_eq!(
            tree.get_path(&["Config", "logging", "spec", "level"]),
            Some(&Value::from("debug"))
        );
        assert_eq!(tree.get_path(&["Config", "logging", "spec", "dir"]), None);
        assert_eq!(
            tree.get_path(&["Config", "web", "spec", "port"]),
            Some(&Value::Int(80))
        );
    }

    #[test]
    fn test_load_renders_parameters() {
        let tmp = fixture();
        let config = DirectoryLoader::new(tmp.path(), ["base"])
            .with_param("ProjectRoot", "/srv")
            .load_config()
            .unwrap();
        assert_eq!(
            config.get_path(&["logging", "spec", "dir"]),
            Some(&Value::from("/srv/log"))
        );
        assert!(!config.has("hidden"));
    }

    #[test]
    fn test_load_kind_absent() {
        let tmp = fixture();
        let loader = DirectoryLoader::new(tmp.path(), ["test"]);
        assert!(loader.load_kind("Secret").unwrap().is_empty());
    }

    #[test]
    fn test_missing_directory() {
        let tmp = fixture();
        let err = DirectoryLoader::new(tmp.path(), ["base", "prod"])
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::MissingDirectory(_)));
        assert_eq!(err.path(), &tmp.path().join("prod"));
    }

    #[test]
    fn test_unknown_parameter_reports_file() {
        let tmp = fixture();
        let err = DirectoryLoader::new(tmp.path(), ["base"]).load().unwrap_err();
        assert!(matches!(err, LoadError::Template { .. }));
        assert!(err.path().ends_with("10-logging.yaml"));
    }

    #[test]
    fn test_parse_error_reports_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "conf/bad.yaml", "a: [1, 2\n");
        let err = DirectoryLoader::new(tmp.path(), ["conf"]).load().unwrap_err();
        assert!(matches!(err, LoadError::Parse { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[test]
    fn test_deep_merge_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a/x.yaml", "kind: Config\nmetadata: {name: n}\nspec: {v: 1}\n");
        write(tmp.path(), "b/x.yaml", "kind: Config\nmetadata: {name: n}\nspec: {v: 2}\n");
        let err = DirectoryLoader::new(tmp.path(), ["a", "b"])
            .with_policy(ConflictPolicy::DeepMerge)
            .load()
            .unwrap_err();
        match err {
            LoadError::Merge { source: MergeError::Conflict { path, .. }, .. } => {
                assert_eq!(path, "spec.v")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_find_git_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir_all(tmp.path().join("repo/.git")).unwrap();
        fs::create_dir_all(tmp.path().join("repo/src/deep")).unwrap();

        let start = tmp.path().join("repo/src/deep");
        assert_eq!(find_git_root(&start), Some(tmp.path().join("repo")));
        assert_eq!(
            find_parent_dir(&start, |d| d.ends_with("src")),
            Some(tmp.path().join("repo/src"))
        );
    }
}
