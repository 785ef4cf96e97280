//! Caller-supplied memoization of whole diff reports.
//!
//! Reports are keyed by the resolved tree ids of both sides plus a digest of
//! the filter settings, so a moved branch or a changed filter never hits a
//! stale entry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use diffscope_core::{DiffError, DiffReport, FilterConfig};
use diffscope_git::ResolvedRevision;
use sha2::{Digest, Sha256};

/// Identity of one cached report.
///
/// # Examples
///
/// ```
/// use diffscope_core::FilterConfig;
/// use diffscope_engine::CacheKey;
/// use diffscope_git::ResolvedRevision;
///
/// let old = ResolvedRevision::new("master", git2::Oid::zero());
/// let new = ResolvedRevision::new("feature", git2::Oid::zero());
/// let key = CacheKey::new(&old, &new, &FilterConfig::default());
/// assert_eq!(key.old_tree, key.new_tree);
/// assert_eq!(key.settings.len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Hex id of the old root tree.
    pub old_tree: String,
    /// Hex id of the new root tree.
    pub new_tree: String,
    /// Digest of the filter settings the report was produced with.
    pub settings: String,
}

impl CacheKey {
    /// Derive the key for a resolved revision pair.
    pub fn new(old: &ResolvedRevision, new: &ResolvedRevision, filter: &FilterConfig) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(filter.suffix.as_bytes());
        for part in &filter.test_paths {
            hasher.update([0x1F]);
            hasher.update(part.as_bytes());
        }
        hasher.update([0x1D]);
        for part in &filter.exclude {
            hasher.update([0x1E]);
            hasher.update(part.as_bytes());
        }
        Self {
            old_tree: old.tree_id().to_string(),
            new_tree: new.tree_id().to_string(),
            settings: format!("{:x}", hasher.finalize()),
        }
    }

    fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.json",
            self.old_tree,
            self.new_tree,
            &self.settings[..self.settings.len().min(16)]
        )
    }
}

/// Storage for previously computed reports.
///
/// Implementations must be safe to share across threads.
pub trait ReportCache: Send + Sync {
    /// Look up a report.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &CacheKey) -> Result<Option<DiffReport>, DiffError>;

    /// Store a report, replacing any previous entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn put(&self, key: &CacheKey, report: &DiffReport) -> Result<(), DiffError>;
}

/// In-process cache backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<CacheKey, DiffReport>>,
}

impl MemoryCache {
    /// An empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached reports.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no reports.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportCache for MemoryCache {
    fn get(&self, key: &CacheKey) -> Result<Option<DiffReport>, DiffError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, report: &DiffReport) -> Result<(), DiffError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), report.clone());
        Ok(())
    }
}

/// On-disk cache storing one JSON file per report under a directory.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Use `dir` as the cache directory; it is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }
}

impl ReportCache for FileCache {
    fn get(&self, key: &CacheKey) -> Result<Option<DiffReport>, DiffError> {
        let path = self.entry_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&path)?;
        let report = serde_json::from_str(&content)?;
        Ok(Some(report))
    }

    fn put(&self, key: &CacheKey, report: &DiffReport) -> Result<(), DiffError> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir).map_err(|e| {
                DiffError::Config(format!(
                    "failed to create cache directory {}: {e}",
                    self.dir.display()
                ))
            })?;
        }
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(self.entry_path(key), content)?;
        Ok(())
    }
}
