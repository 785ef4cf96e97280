//! Git plumbing for diffscope: revision resolution, file reads, and tree diffs.
//!
//! Everything here works directly on the object database through git2, so
//! no working tree checkout is ever touched.

pub mod edits;
pub mod revision;
pub mod tree_diff;

pub use edits::line_edits;
pub use revision::{ResolvedRevision, RevisionReader};
pub use tree_diff::{FileChanges, TreeDiffer};
