use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DiffError;

/// Top-level configuration loaded from `.diffscope.toml`.
///
/// Supports layered resolution: CLI flags > local config > defaults.
///
/// # Examples
///
/// ```
/// use diffscope_core::DiffConfig;
///
/// let config = DiffConfig::default();
/// assert_eq!(config.filter.suffix, ".java");
/// assert_eq!(config.engine.batch_size, 100);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Which changed files take part in method-level analysis.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Batching and parallelism of the analysis.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Default revision references.
    #[serde(default)]
    pub revisions: RevisionConfig,
}

impl DiffConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Io`] if the file cannot be read,
    /// [`DiffError::Toml`] if the content is not valid TOML, or
    /// [`DiffError::Config`] if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use diffscope_core::DiffConfig;
    /// use std::path::Path;
    ///
    /// let config = DiffConfig::from_file(Path::new(".diffscope.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, DiffError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Toml`] if parsing fails, or [`DiffError::Config`]
    /// if a value is out of range.
    ///
    /// # Examples
    ///
    /// ```
    /// use diffscope_core::DiffConfig;
    ///
    /// let toml = r#"
    /// [engine]
    /// batch_size = 25
    /// "#;
    /// let config = DiffConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.engine.batch_size, 25);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, DiffError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), DiffError> {
        if self.engine.batch_size == 0 {
            return Err(DiffError::Config("engine.batch_size must be at least 1".into()));
        }
        if self.filter.suffix.is_empty() {
            return Err(DiffError::Config("filter.suffix must not be empty".into()));
        }
        if self.revisions.base.trim().is_empty() {
            return Err(DiffError::Config("revisions.base must not be empty".into()));
        }
        for pattern in &self.filter.exclude {
            if pattern.trim().is_empty() {
                return Err(DiffError::Config("filter.exclude contains an empty pattern".into()));
            }
        }
        Ok(())
    }
}

/// File selection settings.
///
/// # Examples
///
/// ```
/// use diffscope_core::FilterConfig;
///
/// let config = FilterConfig::default();
/// assert_eq!(config.test_paths, vec!["src/test/java".to_string()]);
/// assert!(config.exclude.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Source file suffix, including the dot (default: `".java"`).
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Path segment sequences that mark test sources (default: `src/test/java`).
    #[serde(default = "default_test_paths")]
    pub test_paths: Vec<String>,
    /// Additional glob patterns for files to leave out.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_suffix() -> String {
    ".java".into()
}

fn default_test_paths() -> Vec<String> {
    vec!["src/test/java".into()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            suffix: default_suffix(),
            test_paths: default_test_paths(),
            exclude: Vec::new(),
        }
    }
}

/// Batching and worker settings for the analysis pipeline.
///
/// # Examples
///
/// ```
/// use diffscope_core::EngineConfig;
///
/// let config = EngineConfig::default();
/// assert_eq!(config.batch_size, 100);
/// assert_eq!(config.max_workers, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Files analyzed by one batch task (default: 100).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Upper bound on worker threads; `0` means one per batch, capped by the
    /// available parallelism (default: 0).
    #[serde(default)]
    pub max_workers: usize,
}

fn default_batch_size() -> usize {
    100
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_workers: 0,
        }
    }
}

/// Default revision references.
///
/// # Examples
///
/// ```
/// use diffscope_core::RevisionConfig;
///
/// assert_eq!(RevisionConfig::default().base, "master");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    /// Old revision used when only the new one is given (default: `"master"`).
    #[serde(default = "default_base")]
    pub base: String,
}

fn default_base() -> String {
    "master".into()
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            base: default_base(),
        }
    }
}
