//! Method-level diff pipeline.
//!
//! Ties the git and syntax layers together: filters the changed files, fans
//! them out in fixed-size batches over a bounded worker pool, matches methods
//! per file, and folds the per-file outcomes into one [`DiffReport`].
//!
//! [`DiffReport`]: diffscope_core::DiffReport

pub mod cache;
pub mod cancel;
pub mod filter;
pub mod matcher;
pub mod orchestrator;

pub use cache::{CacheKey, FileCache, MemoryCache, ReportCache};
pub use cancel::CancellationToken;
pub use filter::PathFilter;
pub use matcher::classify;
pub use orchestrator::DiffEngine;
