//! Import file discovery.
//!
//! An import root holds one directory per record category:
//!
//! ```text
//! <root>/nodes/*.json
//! <root>/lists/*.json
//! <root>/relations/*.json
//! ```
//!
//! Only regular files directly inside each category directory are picked up.
//! Reads are bounded by [`ImportConfig::max_file_size`].

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use serde::Serialize;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::ImportConfig;
use crate::error::ImportError;

/// File name pattern for import files.
pub const FILE_PATTERN: &str = "*.json";

/// The three kinds of import records, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Graph entities.
    Nodes,
    /// Scalar list field values.
    Lists,
    /// Edges between nodes.
    Relations,
}

impl Category {
    /// All categories in the order they are validated and uploaded.
    pub const ALL: [Self; 3] = [Self::Nodes, Self::Lists, Self::Relations];

    /// Subdirectory of the import root holding this category's files.
    /// Also the `valueType` an import document of this category declares.
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Nodes => "nodes",
            Self::Lists => "lists",
            Self::Relations => "relations",
        }
    }

    /// Look up a category by its `valueType` string.
    #[must_use]
    pub fn from_value_type(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.dir_name() == value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// An existing import directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRoot {
    path: PathBuf,
}

impl ImportRoot {
    /// Resolve `path` to an absolute, canonical import root.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::PathNotFound`] if nothing exists at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        match path.canonicalize() {
            Ok(canonical) => Ok(Self { path: canonical }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ImportError::PathNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => Err(ImportError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// The canonical root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding `category`'s files.
    #[must_use]
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.path.join(category.dir_name())
    }
}

/// The import files found on disk, one ordered list per category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    /// Files under `nodes/`.
    pub nodes: Vec<PathBuf>,
    /// Files under `lists/`.
    pub lists: Vec<PathBuf>,
    /// Files under `relations/`.
    pub relations: Vec<PathBuf>,
}

impl FileSet {
    /// Scan the three category directories of `root`.
    ///
    /// A missing category directory yields an empty list. Each list is
    /// sorted by path.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Walk`] if a category directory exists but
    /// cannot be traversed.
    pub fn discover(root: &ImportRoot, config: &ImportConfig) -> Result<Self, ImportError> {
        Ok(Self {
            nodes: find_category_files(&root.category_dir(Category::Nodes), config)?,
            lists: find_category_files(&root.category_dir(Category::Lists), config)?,
            relations: find_category_files(&root.category_dir(Category::Relations), config)?,
        })
    }

    /// Files of one category.
    #[must_use]
    pub fn files(&self, category: Category) -> &[PathBuf] {
        match category {
            Category::Nodes => &self.nodes,
            Category::Lists => &self.lists,
            Category::Relations => &self.relations,
        }
    }

    /// `(category, files)` pairs in upload order.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[PathBuf])> {
        Category::ALL.into_iter().map(|c| (c, self.files(c)))
    }

    /// Total number of files across all categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len() + self.lists.len() + self.relations.len()
    }

    /// Whether no import file was found at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn match_options() -> MatchOptions {
    MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    }
}

fn find_category_files(dir: &Path, config: &ImportConfig) -> Result<Vec<PathBuf>, ImportError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let pattern = Pattern::new(FILE_PATTERN).map_err(|e| ImportError::Walk {
        path: dir.to_path_buf(),
        message: format!("invalid file pattern '{FILE_PATTERN}': {e}"),
    })?;
    let options = match_options();

    let mut files = Vec::new();
    for entry_result in WalkDir::new(dir)
        .follow_links(config.follow_links)
        .min_depth(1)
        .max_depth(1)
    {
        let entry = entry_result.map_err(|walk_err| ImportError::Walk {
            path: walk_err
                .path()
                .map_or_else(|| dir.to_path_buf(), Path::to_path_buf),
            message: walk_err.to_string(),
        })?;

        let name = entry.file_name().to_string_lossy();
        if !pattern.matches_with(&name, options) {
            continue;
        }

        // Skip directories, devices, pipes, sockets; only regular files
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        } else if entry.path_is_symlink() {
            warn!(
                file = %entry.path().display(),
                "Skipping symbolic link (enable follow_links to import it)"
            );
        }
    }

    files.sort();
    Ok(files)
}

/// Read an import file as UTF-8, refusing anything over `max_file_size`.
///
/// Reads at most `max_file_size + 1` bytes so the size check and the read
/// are the same operation.
///
/// # Errors
///
/// Returns [`ImportError::Io`], [`ImportError::FileTooLarge`] or
/// [`ImportError::InvalidEncoding`].
pub fn read_file_bounded(path: &Path, max_file_size: u64) -> Result<String, ImportError> {
    let io_err = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut buffer = Vec::new();
    file.take(max_file_size.saturating_add(1))
        .read_to_end(&mut buffer)
        .map_err(io_err)?;

    if buffer.len() as u64 > max_file_size {
        return Err(ImportError::FileTooLarge {
            path: path.to_path_buf(),
            limit: max_file_size,
        });
    }

    String::from_utf8(buffer).map_err(|_| ImportError::InvalidEncoding {
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_import_root_missing() {
        let tmp = TempDir::new().unwrap();
        let err = ImportRoot::new(tmp.path().join("missing")).unwrap_err();
        assert!(matches!(err, ImportError::PathNotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn test_import_root_is_absolute() {
        let tmp = TempDir::new().unwrap();
        let root = ImportRoot::new(tmp.path()).unwrap();
        assert!(root.path().is_absolute());
    }

    #[test]
    fn test_discover_three_categories() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "nodes/b.json");
        touch(tmp.path(), "nodes/a.json");
        touch(tmp.path(), "lists/l.json");
        touch(tmp.path(), "relations/r.json");

        let root = ImportRoot::new(tmp.path()).unwrap();
        let set = FileSet::discover(&root, &ImportConfig::default()).unwrap();

        assert_eq!(names(&set.nodes), ["a.json", "b.json"]);
        assert_eq!(names(&set.lists), ["l.json"]);
        assert_eq!(names(&set.relations), ["r.json"]);
        assert_eq!(set.len(), 4);
        assert!(set.nodes.iter().all(|p| p.is_absolute()));
        assert!(set.nodes[0].starts_with(root.path().join("nodes")));
    }

    #[test]
    fn test_discover_missing_category_is_empty() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "nodes/a.json");

        let root = ImportRoot::new(tmp.path()).unwrap();
        let set = FileSet::discover(&root, &ImportConfig::default()).unwrap();

        assert_eq!(set.nodes.len(), 1);
        assert!(set.lists.is_empty());
        assert!(set.relations.is_empty());
    }

    #[test]
    fn test_discover_skips_nested_other_extensions_and_dotfiles() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "nodes/a.json");
        touch(tmp.path(), "nodes/nested/deep.json");
        touch(tmp.path(), "nodes/readme.md");
        touch(tmp.path(), "nodes/a.json.bak");
        touch(tmp.path(), "nodes/.hidden.json");
        fs::create_dir_all(tmp.path().join("nodes/dir.json")).unwrap();

        let root = ImportRoot::new(tmp.path()).unwrap();
        let set = FileSet::discover(&root, &ImportConfig::default()).unwrap();

        assert_eq!(names(&set.nodes), ["a.json"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_needs_follow_links() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "elsewhere/linked.json");
        touch(tmp.path(), "nodes/a.json");
        std::os::unix::fs::symlink(
            tmp.path().join("elsewhere/linked.json"),
            tmp.path().join("nodes/linked.json"),
        )
        .unwrap();
        let root = ImportRoot::new(tmp.path()).unwrap();

        let set = FileSet::discover(&root, &ImportConfig::default()).unwrap();
        assert_eq!(names(&set.nodes), ["a.json"]);

        let mut config = ImportConfig::default();
        config.follow_links = true;
        let set = FileSet::discover(&root, &config).unwrap();
        assert_eq!(names(&set.nodes), ["a.json", "linked.json"]);
    }

    #[test]
    fn test_iter_yields_upload_order() {
        let set = FileSet {
            nodes: vec![PathBuf::from("n.json")],
            lists: vec![],
            relations: vec![PathBuf::from("r.json")],
        };
        let order: Vec<Category> = set.iter().map(|(c, _)| c).collect();
        assert_eq!(order, Category::ALL);
        assert_eq!(set.files(Category::Relations), [PathBuf::from("r.json")]);
    }

    #[test]
    fn test_category_value_type_lookup() {
        assert_eq!(Category::from_value_type("lists"), Some(Category::Lists));
        assert_eq!(Category::from_value_type("Lists"), None);
        assert_eq!(Category::Relations.to_string(), "relations");
    }

    #[test]
    fn test_read_file_bounded_limits() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.json");
        fs::write(&path, "[1, 2, 3]").unwrap();

        assert_eq!(read_file_bounded(&path, 9).unwrap(), "[1, 2, 3]");
        assert!(matches!(
            read_file_bounded(&path, 8),
            Err(ImportError::FileTooLarge { limit: 8, .. })
        ));
    }

    #[test]
    fn test_read_file_bounded_rejects_invalid_utf8() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.json");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();

        assert!(matches!(
            read_file_bounded(&path, 1024),
            Err(ImportError::InvalidEncoding { .. })
        ));
    }
}
