//! Revision resolution and file content reads.

use std::fmt;
use std::path::{Path, PathBuf};

use diffscope_core::DiffError;
use git2::{ObjectType, Oid, Repository};

/// A revision reference resolved to the id of its root tree.
///
/// # Examples
///
/// ```
/// use diffscope_git::ResolvedRevision;
///
/// let rev = ResolvedRevision::new("master", git2::Oid::zero());
/// assert_eq!(rev.name(), "master");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRevision {
    name: String,
    tree: Oid,
}

impl ResolvedRevision {
    /// Pair a reference name with a tree id.
    pub fn new(name: impl Into<String>, tree: Oid) -> Self {
        Self {
            name: name.into(),
            tree,
        }
    }

    /// The reference as the caller wrote it.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the revision's root tree.
    pub fn tree_id(&self) -> Oid {
        self.tree
    }
}

impl fmt::Display for ResolvedRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.tree)
    }
}

/// Read-only access to the object database of one repository.
///
/// A reader owns its own `git2::Repository` handle and is not shared across
/// threads; concurrent callers each [`open`](Self::open) a reader of their own.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use diffscope_git::RevisionReader;
///
/// let reader = RevisionReader::open(Path::new(".")).unwrap();
/// let text = reader.read_file("master", "src/main/java/App.java").unwrap();
/// println!("{} bytes", text.len());
/// ```
pub struct RevisionReader {
    repo: Repository,
    root: PathBuf,
}

impl RevisionReader {
    /// Open the repository at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Git`] if `path` is not a git repository.
    pub fn open(path: &Path) -> Result<Self, DiffError> {
        let repo = Repository::open(path)
            .map_err(|e| DiffError::Git(format!("failed to open repository: {e}")))?;
        Ok(Self {
            repo,
            root: path.to_path_buf(),
        })
    }

    /// The path this reader was opened from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The underlying repository handle.
    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Resolve a branch, tag, commit id, or other rev-spec to its root tree.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Revision`] if the reference does not exist or does
    /// not peel to a tree.
    pub fn resolve(&self, revision: &str) -> Result<ResolvedRevision, DiffError> {
        let revision_error = |e: git2::Error| DiffError::Revision {
            revision: revision.to_string(),
            reason: e.message().to_string(),
        };
        let object = self.repo.revparse_single(revision).map_err(revision_error)?;
        let tree = object.peel_to_tree().map_err(revision_error)?;
        tracing::debug!(revision, tree = %tree.id(), "resolved revision");
        Ok(ResolvedRevision::new(revision, tree.id()))
    }

    /// Read the full text of `path` as stored in a resolved revision.
    ///
    /// Content is decoded as UTF-8; invalid sequences are replaced rather than
    /// rejected. Nothing is cached between calls.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::NotFound`] if the path is absent from the tree or
    /// does not name a file, and [`DiffError::Git`] if the tree itself cannot
    /// be loaded.
    pub fn read_file_at(&self, revision: &ResolvedRevision, path: &str) -> Result<String, DiffError> {
        let tree = self
            .repo
            .find_tree(revision.tree_id())
            .map_err(|e| DiffError::Git(format!("failed to load tree {}: {e}", revision.tree_id())))?;

        let not_found = || DiffError::NotFound {
            revision: revision.name().to_string(),
            path: path.to_string(),
        };

        let entry = tree.get_path(Path::new(path)).map_err(|_| not_found())?;
        if entry.kind() != Some(ObjectType::Blob) {
            return Err(not_found());
        }
        let blob = self.repo.find_blob(entry.id()).map_err(|_| not_found())?;
        Ok(String::from_utf8_lossy(blob.content()).into_owned())
    }

    /// Resolve `revision` and read `path` from it.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Revision`] for an unknown revision, otherwise the
    /// errors of [`read_file_at`](Self::read_file_at).
    pub fn read_file(&self, revision: &str, path: &str) -> Result<String, DiffError> {
        let resolved = self.resolve(revision)?;
        self.read_file_at(&resolved, path)
    }
}
