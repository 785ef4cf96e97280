//! File-level comparison of two revision trees.

use std::path::Path;

use diffscope_core::{ChangeKind, DiffError, FileChangeEntry};
use git2::{Delta, DiffOptions};

use crate::revision::{ResolvedRevision, RevisionReader};

/// The set of changed source files between two revisions.
///
/// Entries come out in the tree diff's path order. Renames are not detected:
/// a moved file shows up as a deletion plus an addition.
#[derive(Debug, Clone)]
pub struct FileChanges {
    old: ResolvedRevision,
    new: ResolvedRevision,
    suffix: String,
    entries: Vec<FileChangeEntry>,
}

impl FileChanges {
    /// Old side of the comparison.
    pub fn old_revision(&self) -> &ResolvedRevision {
        &self.old
    }

    /// New side of the comparison.
    pub fn new_revision(&self) -> &ResolvedRevision {
        &self.new
    }

    /// All entries in diff order.
    pub fn entries(&self) -> &[FileChangeEntry] {
        &self.entries
    }

    /// Consume into the entry list.
    pub fn into_entries(self) -> Vec<FileChangeEntry> {
        self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trees have no differing source files.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of one kind.
    pub fn of_kind(&self, kind: ChangeKind) -> impl Iterator<Item = &FileChangeEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Newly added files.
    pub fn added(&self) -> impl Iterator<Item = &FileChangeEntry> {
        self.of_kind(ChangeKind::Add)
    }

    /// Files present on both sides with different content.
    pub fn modified(&self) -> impl Iterator<Item = &FileChangeEntry> {
        self.of_kind(ChangeKind::Modify)
    }

    /// Files removed in the new revision.
    pub fn deleted(&self) -> impl Iterator<Item = &FileChangeEntry> {
        self.of_kind(ChangeKind::Delete)
    }

    /// Added and modified files.
    pub fn not_deleted(&self) -> impl Iterator<Item = &FileChangeEntry> {
        self.entries.iter().filter(|e| e.kind != ChangeKind::Delete)
    }

    /// Whether an added or modified file declares the given class.
    ///
    /// `class_name` may be a simple name (`Foo`), a qualified name
    /// (`com.acme.Foo`), or a slash path (`com/acme/Foo`). The match is made
    /// against the file name, so `Foo` does not match `FooBar.java`.
    pub fn touches(&self, class_name: &str) -> bool {
        let needle = format!("{}{}", class_name.replace('.', "/"), self.suffix);
        self.not_deleted().any(|e| {
            let path = e.new_path.as_str();
            path == needle || path.ends_with(&format!("/{needle}"))
        })
    }
}

/// Computes the file-level change list between two revisions.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use diffscope_git::{RevisionReader, TreeDiffer};
///
/// let reader = RevisionReader::open(Path::new(".")).unwrap();
/// let changes = TreeDiffer::new(&reader, ".java").diff("master", "HEAD").unwrap();
/// for entry in changes.entries() {
///     println!("{entry}");
/// }
/// ```
pub struct TreeDiffer<'r> {
    reader: &'r RevisionReader,
    suffix: String,
}

impl<'r> TreeDiffer<'r> {
    /// Create a differ that only reports paths ending in `suffix`.
    pub fn new(reader: &'r RevisionReader, suffix: impl Into<String>) -> Self {
        Self {
            reader,
            suffix: suffix.into(),
        }
    }

    /// Resolve both revisions and diff their trees.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Revision`] if either reference does not resolve,
    /// or [`DiffError::Git`] if the tree comparison fails.
    pub fn diff(&self, old: &str, new: &str) -> Result<FileChanges, DiffError> {
        let old = self.reader.resolve(old)?;
        let new = self.reader.resolve(new)?;
        self.diff_resolved(old, new)
    }

    /// Diff two already-resolved revisions.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Git`] if a tree cannot be loaded or compared.
    pub fn diff_resolved(
        &self,
        old: ResolvedRevision,
        new: ResolvedRevision,
    ) -> Result<FileChanges, DiffError> {
        let repo = self.reader.repository();
        let old_tree = repo
            .find_tree(old.tree_id())
            .map_err(|e| DiffError::Git(format!("failed to load tree for '{}': {e}", old.name())))?;
        let new_tree = repo
            .find_tree(new.tree_id())
            .map_err(|e| DiffError::Git(format!("failed to load tree for '{}': {e}", new.name())))?;

        let mut diff_opts = DiffOptions::new();
        diff_opts.pathspec(format!("*{}", self.suffix));
        let diff = repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut diff_opts))
            .map_err(|e| DiffError::Git(format!("failed to compute diff: {e}")))?;

        let mut entries = Vec::new();
        for delta in diff.deltas() {
            let old_path = delta_path(delta.old_file().path());
            let new_path = delta_path(delta.new_file().path());

            let entry = match delta.status() {
                Delta::Added => FileChangeEntry::new("", new_path, ChangeKind::Add),
                Delta::Deleted => FileChangeEntry::new(old_path, "", ChangeKind::Delete),
                Delta::Unmodified | Delta::Ignored | Delta::Untracked => continue,
                _ => FileChangeEntry::new(old_path, new_path, ChangeKind::Modify),
            };

            if !entry.path().ends_with(&self.suffix) {
                continue;
            }
            entries.push(entry);
        }

        tracing::info!(
            old = %old,
            new = %new,
            files = entries.len(),
            "compared revision trees"
        );

        Ok(FileChanges {
            old,
            new,
            suffix: self.suffix.clone(),
            entries,
        })
    }
}

fn delta_path(path: Option<&Path>) -> String {
    path.unwrap_or(Path::new(""))
        .to_string_lossy()
        .replace('\\', "/")
}
