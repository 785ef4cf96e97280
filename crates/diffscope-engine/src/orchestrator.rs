//! Batch fan-out, per-file analysis, and fan-in of the method diff.

use std::path::{Path, PathBuf};
use std::time::Instant;

use diffscope_core::{
    ChangeKind, ClassChangeRecord, DiffConfig, DiffError, DiffReport, DiffStats, FileChangeEntry,
    FileOutcome, SkipReason,
};
use diffscope_git::{line_edits, FileChanges, ResolvedRevision, RevisionReader, TreeDiffer};
use diffscope_syntax::{JavaIndexer, SyntaxIndex, TypeKind};
use rayon::prelude::*;

use crate::cache::{CacheKey, ReportCache};
use crate::cancel::CancellationToken;
use crate::filter::PathFilter;
use crate::matcher::classify;

/// Runs method-level diffs against one repository.
///
/// The engine keeps no state between runs apart from its cancellation
/// token. Each run builds its own worker pool, gives every batch its own
/// repository handle and parser, and joins every worker thread before
/// returning.
///
/// # Examples
///
/// ```no_run
/// use diffscope_core::DiffConfig;
/// use diffscope_engine::DiffEngine;
///
/// let engine = DiffEngine::new(".", DiffConfig::default()).unwrap();
/// let report = engine.run("master", "feature/login").unwrap();
/// for record in &report.records {
///     println!("{} {}", record.kind, record.qualified_name());
/// }
/// ```
pub struct DiffEngine {
    repo_path: PathBuf,
    config: DiffConfig,
    filter: PathFilter,
    cancel: CancellationToken,
}

#[derive(Debug)]
enum BatchState {
    Completed(Vec<FileOutcome>),
    Cancelled,
}

struct FileError {
    revision: Option<String>,
    source: DiffError,
}

impl FileError {
    fn at(revision: &ResolvedRevision, source: DiffError) -> Self {
        Self {
            revision: Some(revision.name().to_string()),
            source,
        }
    }
}

impl From<DiffError> for FileError {
    fn from(source: DiffError) -> Self {
        Self {
            revision: None,
            source,
        }
    }
}

/// Per-batch resources; never shared with another batch.
struct BatchContext {
    reader: RevisionReader,
    indexer: JavaIndexer,
}

impl BatchContext {
    fn open(repo_path: &Path) -> Result<Self, DiffError> {
        Ok(Self {
            reader: RevisionReader::open(repo_path)?,
            indexer: JavaIndexer::new()?,
        })
    }

    fn load(&mut self, revision: &ResolvedRevision, path: &str) -> Result<(String, SyntaxIndex), FileError> {
        let text = self
            .reader
            .read_file_at(revision, path)
            .map_err(|e| FileError::at(revision, e))?;
        let index = self
            .indexer
            .index(&text)
            .map_err(|e| FileError::at(revision, e))?;
        Ok((text, index))
    }

    fn added(
        &mut self,
        entry: &FileChangeEntry,
        new: &ResolvedRevision,
    ) -> Result<FileOutcome, FileError> {
        let (_, index) = self.load(new, &entry.new_path)?;
        let class_name = match primary_class(&index) {
            Ok(name) => name,
            Err(reason) => return Ok(FileOutcome::skipped(entry.path(), reason)),
        };
        Ok(FileOutcome::Record(ClassChangeRecord::added(
            &entry.new_path,
            index.package_name.clone(),
            class_name,
            index.methods().to_vec(),
        )))
    }

    fn modified(
        &mut self,
        entry: &FileChangeEntry,
        old: &ResolvedRevision,
        new: &ResolvedRevision,
    ) -> Result<FileOutcome, FileError> {
        let (new_text, new_index) = self.load(new, &entry.new_path)?;
        let class_name = match primary_class(&new_index) {
            Ok(name) => name,
            Err(reason) => return Ok(FileOutcome::skipped(entry.path(), reason)),
        };
        let (old_text, old_index) = self.load(old, &entry.old_path)?;

        let changed = classify(old_index.methods(), new_index.methods());
        let edits = line_edits(&old_text, &new_text)?;
        Ok(FileOutcome::Record(ClassChangeRecord::replaced(
            &entry.new_path,
            new_index.package_name.clone(),
            class_name,
            changed,
            &edits,
        )))
    }
}

/// Fold batch outcomes into `report`; any cancelled batch discards them all.
fn merge(mut report: DiffReport, states: Vec<BatchState>) -> Result<DiffReport, DiffError> {
    if states.iter().any(|s| matches!(s, BatchState::Cancelled)) {
        return Err(DiffError::Cancelled);
    }
    for state in states {
        if let BatchState::Completed(outcomes) = state {
            for outcome in outcomes {
                report.push(outcome);
            }
        }
    }
    Ok(report)
}

fn primary_class(index: &SyntaxIndex) -> Result<String, SkipReason> {
    match &index.primary_type {
        None => Err(SkipReason::NoPrimaryType),
        Some(decl) if decl.kind == TypeKind::Interface => Err(SkipReason::InterfaceOnly),
        Some(decl) => Ok(decl.name.clone()),
    }
}

impl DiffEngine {
    /// Create an engine for the repository at `repo_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Config`] if the configuration is out of range or
    /// an exclude pattern is invalid.
    pub fn new(repo_path: impl Into<PathBuf>, config: DiffConfig) -> Result<Self, DiffError> {
        config.validate()?;
        let filter = PathFilter::from_config(&config.filter)?;
        Ok(Self {
            repo_path: repo_path.into(),
            config,
            filter,
            cancel: CancellationToken::new(),
        })
    }

    /// Observe `token` instead of the engine's own token.
    ///
    /// Cancellation is permanent: once the token is cancelled, this run and
    /// every later run on the engine return [`DiffError::Cancelled`]. Build a
    /// new engine, or attach a fresh token, to diff again.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels runs of this engine.
    ///
    /// See [`with_cancellation`](Self::with_cancellation); a cancelled engine
    /// stays cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The active configuration.
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    /// The repository this engine reads from.
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// File-level changes between two revisions, restricted to the source suffix.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Git`] if the repository cannot be opened or
    /// compared, and [`DiffError::Revision`] if a revision does not resolve.
    pub fn changes(&self, old: &str, new: &str) -> Result<FileChanges, DiffError> {
        let reader = RevisionReader::open(&self.repo_path)?;
        TreeDiffer::new(&reader, self.config.filter.suffix.as_str()).diff(old, new)
    }

    /// Diff two revisions at method level.
    ///
    /// # Errors
    ///
    /// Fails only for run-level problems: an unopenable repository, an
    /// unresolvable revision, a worker pool that cannot start, or
    /// cancellation. Individual files that fail end up in
    /// [`DiffReport::failures`].
    pub fn run(&self, old: &str, new: &str) -> Result<DiffReport, DiffError> {
        let changes = self.changes(old, new)?;
        self.run_changes(&changes)
    }

    /// Like [`run`](Self::run), but reuse a report from `cache` when both trees
    /// and the filter settings match a previous run.
    ///
    /// Cache read and write failures are logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Same as [`run`](Self::run).
    pub fn run_cached(
        &self,
        old: &str,
        new: &str,
        cache: &dyn ReportCache,
    ) -> Result<DiffReport, DiffError> {
        let reader = RevisionReader::open(&self.repo_path)?;
        let old_rev = reader.resolve(old)?;
        let new_rev = reader.resolve(new)?;
        let key = CacheKey::new(&old_rev, &new_rev, &self.config.filter);

        match cache.get(&key) {
            Ok(Some(mut report)) => {
                tracing::info!(old, new, "using cached report");
                report.old_revision = old.to_string();
                report.new_revision = new.to_string();
                return Ok(report);
            }
            Ok(None) => tracing::debug!(old, new, "no cached report"),
            Err(e) => tracing::warn!(error = %e, "failed to read cached report"),
        }

        let changes = TreeDiffer::new(&reader, self.config.filter.suffix.as_str())
            .diff_resolved(old_rev, new_rev)?;
        let report = self.run_changes(&changes)?;
        if let Err(e) = cache.put(&key, &report) {
            tracing::warn!(error = %e, "failed to store report in cache");
        }
        Ok(report)
    }

    /// Analyze a precomputed change list.
    ///
    /// # Errors
    ///
    /// Same as [`run_entries`](Self::run_entries).
    pub fn run_changes(&self, changes: &FileChanges) -> Result<DiffReport, DiffError> {
        self.run_entries(
            changes.entries(),
            changes.old_revision(),
            changes.new_revision(),
        )
    }

    /// Analyze `entries` in batches and merge the outcomes.
    ///
    /// Entries are split into contiguous batches of `engine.batch_size`, and
    /// the batches run in parallel on a pool of at most one worker per batch.
    ///
    /// # Errors
    ///
    /// Returns [`DiffError::Worker`] if the pool cannot be built and
    /// [`DiffError::Cancelled`] if the run was cancelled; per-file problems
    /// never fail the run.
    pub fn run_entries(
        &self,
        entries: &[FileChangeEntry],
        old: &ResolvedRevision,
        new: &ResolvedRevision,
    ) -> Result<DiffReport, DiffError> {
        let started = Instant::now();
        if self.cancel.is_cancelled() {
            return Err(DiffError::Cancelled);
        }

        let batch_size = self.config.engine.batch_size.max(1);
        let batches: Vec<&[FileChangeEntry]> = entries.chunks(batch_size).collect();
        let workers = self.worker_count(batches.len());
        tracing::info!(
            old = old.name(),
            new = new.name(),
            files = entries.len(),
            batches = batches.len(),
            workers,
            "starting method diff"
        );

        // Worker threads live inside the scope and are joined before it returns.
        let states: Vec<BatchState> = if batches.is_empty() {
            Vec::new()
        } else {
            rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("diffscope-batch-{i}"))
                .build_scoped(
                    |thread| thread.run(),
                    |pool| {
                        pool.install(|| {
                            batches
                                .par_iter()
                                .enumerate()
                                .map(|(idx, batch)| self.run_batch(idx, batch, old, new))
                                .collect::<Vec<_>>()
                        })
                    },
                )
                .map_err(|e| DiffError::Worker(format!("failed to start {workers} workers: {e}")))?
        };

        if self.cancel.is_cancelled() {
            tracing::info!("method diff cancelled");
            return Err(DiffError::Cancelled);
        }

        let mut report = merge(DiffReport::new(old.name(), new.name()), states)?;

        report.stats = DiffStats {
            files_changed: entries.len(),
            batches: batches.len(),
            workers,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            records = report.records.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            duration_ms = report.stats.duration_ms,
            "method diff finished"
        );
        Ok(report)
    }

    fn worker_count(&self, batches: usize) -> usize {
        let cap = match self.config.engine.max_workers {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        batches.min(cap).max(1)
    }

    fn run_batch(
        &self,
        idx: usize,
        batch: &[FileChangeEntry],
        old: &ResolvedRevision,
        new: &ResolvedRevision,
    ) -> BatchState {
        tracing::debug!(batch = idx, files = batch.len(), "batch started");
        // Opened on the first file that needs content.
        let mut ctx: Option<Result<BatchContext, DiffError>> = None;
        let mut outcomes = Vec::with_capacity(batch.len());
        for entry in batch {
            if self.cancel.is_cancelled() {
                tracing::debug!(batch = idx, done = outcomes.len(), "batch cancelled");
                return BatchState::Cancelled;
            }
            if let Some(reason) = self.filter.check(entry) {
                tracing::debug!(path = entry.path(), reason = %reason, "skipped");
                outcomes.push(FileOutcome::skipped(entry.path(), reason));
                continue;
            }

            let ctx = ctx.get_or_insert_with(|| {
                BatchContext::open(&self.repo_path).map_err(|e| {
                    tracing::warn!(batch = idx, error = %e, "batch failed to start");
                    e
                })
            });
            let outcome = match ctx {
                Ok(ctx) => self.analyze(ctx, entry, old, new),
                Err(e) => FileOutcome::failed(entry.path(), None, &*e),
            };
            outcomes.push(outcome);
        }
        tracing::debug!(batch = idx, "batch completed");
        BatchState::Completed(outcomes)
    }

    fn analyze(
        &self,
        ctx: &mut BatchContext,
        entry: &FileChangeEntry,
        old: &ResolvedRevision,
        new: &ResolvedRevision,
    ) -> FileOutcome {
        let result = match entry.kind {
            ChangeKind::Add => ctx.added(entry, new),
            ChangeKind::Modify => ctx.modified(entry, old, new),
            ChangeKind::Delete => Ok(FileOutcome::skipped(entry.path(), SkipReason::Deleted)),
        };

        match result {
            Ok(outcome) => {
                if let FileOutcome::Skipped(skipped) = &outcome {
                    tracing::debug!(path = entry.path(), reason = %skipped.reason, "skipped");
                }
                outcome
            }
            Err(FileError { revision, source }) => {
                tracing::warn!(
                    path = entry.path(),
                    revision = revision.as_deref().unwrap_or("-"),
                    error = %source,
                    "file analysis failed"
                );
                FileOutcome::failed(entry.path(), revision.as_deref(), &source)
            }
        }
    }
}
