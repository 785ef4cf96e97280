//! Path-based selection of the files that take part in method analysis.
//!
//! Runs before any content is read, so deleted files, foreign suffixes, test
//! sources, and excluded paths never cost a blob read or a parse.

use diffscope_core::{ChangeKind, DiffError, FileChangeEntry, FilterConfig, SkipReason};

/// Decides which changed files are analyzed.
///
/// # Examples
///
/// ```
/// use diffscope_core::FilterConfig;
/// use diffscope_engine::PathFilter;
///
/// let filter = PathFilter::from_config(&FilterConfig::default()).unwrap();
/// assert!(filter.should_skip("src/test/java/com/acme/ATest.java"));
/// assert!(filter.should_skip("src/main/resources/app.properties"));
/// assert!(!filter.should_skip("src/main/java/com/acme/A.java"));
/// ```
#[derive(Debug, Clone)]
pub struct PathFilter {
    suffix: String,
    test_segments: Vec<String>,
    exclude: Vec<glob::Pattern>,
}

impl PathFilter {
    /// Build a filter from the `[filter]` configuration section.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Config`] if an exclude pattern is not a valid glob.
    pub fn from_config(config: &FilterConfig) -> Result<Self, DiffError> {
        let mut exclude = Vec::with_capacity(config.exclude.len());
        for pat in &config.exclude {
            let pattern = glob::Pattern::new(pat)
                .map_err(|e| DiffError::Config(format!("invalid exclude pattern '{pat}': {e}")))?;
            exclude.push(pattern);
        }

        let test_segments = config
            .test_paths
            .iter()
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .map(|p| format!("/{p}/"))
            .collect();

        Ok(Self {
            suffix: config.suffix.clone(),
            test_segments,
            exclude,
        })
    }

    /// The reason `entry` is left out, or `None` if it should be analyzed.
    pub fn check(&self, entry: &FileChangeEntry) -> Option<SkipReason> {
        if entry.kind == ChangeKind::Delete {
            return Some(SkipReason::Deleted);
        }
        self.check_path(entry.path())
    }

    /// Whether a non-deleted file at `path` would be left out.
    pub fn should_skip(&self, path: &str) -> bool {
        self.check_path(path).is_some()
    }

    fn check_path(&self, path: &str) -> Option<SkipReason> {
        if !path.ends_with(&self.suffix) {
            return Some(SkipReason::SuffixMismatch);
        }

        let rooted = format!("/{path}");
        if self.test_segments.iter().any(|seg| rooted.contains(seg.as_str())) {
            return Some(SkipReason::TestSource);
        }

        self.exclude
            .iter()
            .find(|pat| pat.matches(path))
            .map(|pat| SkipReason::PatternMatch(pat.to_string()))
    }
}
