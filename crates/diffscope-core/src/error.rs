use std::path::PathBuf;

/// Errors that can occur across diffscope.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate reports them as `miette` diagnostics.
///
/// # Examples
///
/// ```
/// use diffscope_core::DiffError;
///
/// let err = DiffError::Config("batch_size must be positive".into());
/// assert!(err.to_string().contains("batch_size"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum DiffError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(diffscope::config), help("see `diffscope init` for the available settings"))]
    Config(String),

    /// Repository or tree comparison failure.
    #[error("git error: {0}")]
    Git(String),

    /// A revision reference could not be resolved to a tree.
    #[error("cannot resolve revision '{revision}': {reason}")]
    #[diagnostic(code(diffscope::revision), help("pass a branch, tag, or commit that exists locally"))]
    Revision {
        /// The reference as given by the caller.
        revision: String,
        /// Underlying cause.
        reason: String,
    },

    /// A path does not exist in the tree of a revision.
    #[error("'{path}' does not exist at revision '{revision}'")]
    NotFound {
        /// Revision whose tree was searched.
        revision: String,
        /// Repository-relative path.
        path: String,
    },

    /// Source code parsing failure.
    #[error("parse error: {0}")]
    Parse(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The batch worker pool could not be started.
    #[error("worker pool error: {0}")]
    Worker(String),

    /// The run was aborted by the caller.
    #[error("diff run cancelled")]
    #[diagnostic(code(diffscope::cancelled))]
    Cancelled,

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
}

impl DiffError {
    /// Whether this error aborts a whole diff run.
    ///
    /// Content reads and parse failures only ever cost a single file; everything
    /// else stops the run before or instead of producing a report.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::DiffError;
    ///
    /// assert!(!DiffError::Parse("unexpected token".into()).is_fatal());
    /// assert!(DiffError::Revision {
    ///     revision: "nope".into(),
    ///     reason: "not found".into(),
    /// }
    /// .is_fatal());
    /// ```
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DiffError::NotFound { .. } | DiffError::Parse(_))
    }
}
