//! Java syntax indexing for diffscope.
//!
//! Parses a source file with tree-sitter and extracts its package, its primary
//! type, and a fingerprinted record for every method the primary type declares
//! directly. Fingerprints depend only on the token stream, so formatting and
//! comment edits never count as method changes.

pub mod index;
pub mod tokens;

pub use index::{JavaIndexer, SyntaxIndex, TypeDeclaration, TypeKind};
pub use tokens::{fingerprint, render};
