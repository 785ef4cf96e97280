//! Core types, configuration, and error handling for diffscope.
//!
//! This crate provides the shared foundation used by all other diffscope crates:
//! - [`DiffError`] — unified error type using `thiserror`
//! - [`DiffConfig`] — configuration loaded from `.diffscope.toml`
//! - Shared types: [`FileChangeEntry`], [`LineSpan`], [`MethodKey`],
//!   [`MethodRecord`], [`ClassChangeRecord`], [`FileOutcome`], [`DiffReport`]

mod config;
mod error;
mod types;

pub use config::{DiffConfig, EngineConfig, FilterConfig, RevisionConfig};
pub use error::DiffError;
pub use types::{
    ChangeKind, ChangedMethod, ClassChangeKind, ClassChangeRecord, DiffReport, DiffStats,
    FileChangeEntry, FileFailure, FileOutcome, LineEdit, LineSpan, MethodChange, MethodKey,
    MethodRecord, OutputFormat, SkipReason, SkippedFile,
};

/// A convenience `Result` type for diffscope operations.
pub type Result<T> = std::result::Result<T, DiffError>;
