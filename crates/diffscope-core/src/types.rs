use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Classification of a file-level change between two trees.
///
/// # Examples
///
/// ```
/// use diffscope_core::ChangeKind;
///
/// let kind = ChangeKind::Modify;
/// assert_eq!(format!("{kind}"), "modify");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Path exists only in the new tree.
    Add,
    /// Path exists in both trees with different content.
    Modify,
    /// Path exists only in the old tree.
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ChangeKind::Add => "add",
            ChangeKind::Modify => "modify",
            ChangeKind::Delete => "delete",
        })
    }
}

/// One differing path between the old and new tree.
///
/// For [`ChangeKind::Add`] the old path is empty, for [`ChangeKind::Delete`]
/// the new path is empty.
///
/// # Examples
///
/// ```
/// use diffscope_core::{ChangeKind, FileChangeEntry};
///
/// let entry = FileChangeEntry::new("", "src/main/java/B.java", ChangeKind::Add);
/// assert_eq!(entry.path(), "src/main/java/B.java");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEntry {
    /// Path in the old tree.
    pub old_path: String,
    /// Path in the new tree.
    pub new_path: String,
    /// Kind of change.
    pub kind: ChangeKind,
}

impl FileChangeEntry {
    /// Create an entry from its two paths and kind.
    pub fn new(old_path: impl Into<String>, new_path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            old_path: old_path.into(),
            new_path: new_path.into(),
            kind,
        }
    }

    /// The path that identifies this entry: the old path for deletions, the new
    /// path otherwise.
    pub fn path(&self) -> &str {
        match self.kind {
            ChangeKind::Delete => &self.old_path,
            ChangeKind::Add | ChangeKind::Modify => &self.new_path,
        }
    }
}

impl fmt::Display for FileChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.kind == ChangeKind::Modify && self.old_path != self.new_path {
            write!(f, "{}: {} -> {}", self.kind, self.old_path, self.new_path)
        } else {
            write!(f, "{}: {}", self.kind, self.path())
        }
    }
}

/// A 0-based, half-open range of lines `[begin, end)`.
///
/// # Examples
///
/// ```
/// use diffscope_core::LineSpan;
///
/// let span = LineSpan::new(4, 7);
/// assert_eq!(span.len(), 3);
/// assert!(!span.is_empty());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    /// First line of the range.
    pub begin: u32,
    /// One past the last line of the range.
    pub end: u32,
}

impl LineSpan {
    /// Create a span; `end` is clamped so it never precedes `begin`.
    pub fn new(begin: u32, end: u32) -> Self {
        Self {
            begin,
            end: end.max(begin),
        }
    }

    /// Number of lines covered.
    pub fn len(&self) -> u32 {
        self.end - self.begin
    }

    /// Whether the span covers no lines.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.begin, self.end)
    }
}

/// One contiguous edit region between two versions of a file.
///
/// The old range was replaced by the new range; either side may be empty
/// (pure insertion or pure deletion).
///
/// # Examples
///
/// ```
/// use diffscope_core::LineEdit;
///
/// let edit = LineEdit { begin_old: 3, end_old: 3, begin_new: 3, end_new: 5 };
/// assert!(edit.deleted().is_none());
/// assert_eq!(edit.inserted().unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEdit {
    /// First replaced line in the old version.
    pub begin_old: u32,
    /// One past the last replaced line in the old version.
    pub end_old: u32,
    /// First inserted line in the new version.
    pub begin_new: u32,
    /// One past the last inserted line in the new version.
    pub end_new: u32,
}

impl LineEdit {
    /// The old-side lines removed by this edit, if any.
    pub fn deleted(&self) -> Option<LineSpan> {
        let span = LineSpan::new(self.begin_old, self.end_old);
        (!span.is_empty()).then_some(span)
    }

    /// The new-side lines introduced by this edit, if any.
    pub fn inserted(&self) -> Option<LineSpan> {
        let span = LineSpan::new(self.begin_new, self.end_new);
        (!span.is_empty()).then_some(span)
    }
}

/// Identity of a method within one file: its name plus parameter list text.
///
/// Overloads have distinct keys. Keys are only comparable between two
/// versions of the same file.
///
/// # Examples
///
/// ```
/// use diffscope_core::MethodKey;
///
/// let key = MethodKey::new("add", "(int a, int b)");
/// assert_eq!(key.to_string(), "add(int a, int b)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodKey {
    /// Method (or constructor) name.
    pub name: String,
    /// Canonical parameter list, including the surrounding parentheses.
    pub parameters: String,
}

impl MethodKey {
    /// Create a key from a name and parameter text.
    pub fn new(name: impl Into<String>, parameters: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.parameters)
    }
}

/// A method extracted from one revision of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodRecord {
    /// Matching identity.
    #[serde(flatten)]
    pub key: MethodKey,
    /// Hex SHA-256 of the method's token stream.
    pub fingerprint: String,
}

/// Why a method was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodChange {
    /// No method with the same key exists in the old revision.
    Added,
    /// A method with the same key exists but its fingerprint differs.
    Modified,
}

impl fmt::Display for MethodChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            MethodChange::Added => "added",
            MethodChange::Modified => "modified",
        })
    }
}

/// A method reported in a [`ClassChangeRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedMethod {
    /// The method as it exists in the new revision.
    #[serde(flatten)]
    pub method: MethodRecord,
    /// Whether it is new or has a different body.
    pub change: MethodChange,
}

/// Classification of a class-level change record.
///
/// # Examples
///
/// ```
/// use diffscope_core::ClassChangeKind;
///
/// assert_eq!(ClassChangeKind::Replace.to_string(), "REPLACE");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClassChangeKind {
    /// The file is new in the new revision.
    Add,
    /// The file exists in both revisions.
    Replace,
}

impl fmt::Display for ClassChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            ClassChangeKind::Add => "ADD",
            ClassChangeKind::Replace => "REPLACE",
        })
    }
}

/// The method-level change report for one source file.
///
/// Built once per file and never mutated afterwards. Records of kind
/// [`ClassChangeKind::Add`] carry no deleted lines and list every method.
///
/// # Examples
///
/// ```
/// use diffscope_core::{ClassChangeKind, ClassChangeRecord};
///
/// let record = ClassChangeRecord::added("src/B.java", "com.acme", "B", vec![]);
/// assert_eq!(record.kind, ClassChangeKind::Add);
/// assert_eq!(record.qualified_name(), "com.acme.B");
/// assert!(record.deleted_lines.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassChangeRecord {
    /// Path of the file in the new revision.
    pub path: String,
    /// Simple name of the file's primary type.
    pub class_name: String,
    /// Package name, empty for the default package.
    pub package_name: String,
    /// Whether the file was added or replaced.
    pub kind: ClassChangeKind,
    /// Added or modified methods, in declaration order.
    pub changed_methods: Vec<ChangedMethod>,
    /// New-side line ranges that were inserted.
    pub added_lines: Vec<LineSpan>,
    /// Old-side line ranges that were removed.
    pub deleted_lines: Vec<LineSpan>,
}

impl ClassChangeRecord {
    /// Build the record for a newly added file: every method counts as added.
    pub fn added(
        path: impl Into<String>,
        package_name: impl Into<String>,
        class_name: impl Into<String>,
        methods: Vec<MethodRecord>,
    ) -> Self {
        Self {
            path: path.into(),
            class_name: class_name.into(),
            package_name: package_name.into(),
            kind: ClassChangeKind::Add,
            changed_methods: methods
                .into_iter()
                .map(|method| ChangedMethod {
                    method,
                    change: MethodChange::Added,
                })
                .collect(),
            added_lines: Vec::new(),
            deleted_lines: Vec::new(),
        }
    }

    /// Build the record for a file present in both revisions.
    pub fn replaced(
        path: impl Into<String>,
        package_name: impl Into<String>,
        class_name: impl Into<String>,
        changed_methods: Vec<ChangedMethod>,
        edits: &[LineEdit],
    ) -> Self {
        Self {
            path: path.into(),
            class_name: class_name.into(),
            package_name: package_name.into(),
            kind: ClassChangeKind::Replace,
            changed_methods,
            added_lines: edits.iter().filter_map(LineEdit::inserted).collect(),
            deleted_lines: edits.iter().filter_map(LineEdit::deleted).collect(),
        }
    }

    /// `package.Class`, or just `Class` in the default package.
    pub fn qualified_name(&self) -> String {
        if self.package_name.is_empty() {
            self.class_name.clone()
        } else {
            format!("{}.{}", self.package_name, self.class_name)
        }
    }

    /// Whether the method with this name and parameter text is reported.
    pub fn is_method_changed(&self, name: &str, parameters: &str) -> bool {
        self.changed_methods
            .iter()
            .any(|m| m.method.key.name == name && m.method.key.parameters == parameters)
    }
}

/// Reason a changed file produced no [`ClassChangeRecord`].
///
/// # Examples
///
/// ```
/// use diffscope_core::SkipReason;
///
/// let reason = SkipReason::TestSource;
/// assert_eq!(format!("{reason}"), "test source");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// The file was removed in the new revision.
    Deleted,
    /// The path does not end with the source suffix.
    SuffixMismatch,
    /// The path lies under a test-source directory.
    TestSource,
    /// Matched a configured exclude pattern.
    PatternMatch(String),
    /// The file declares no top-level class or interface.
    NoPrimaryType,
    /// The file's primary type is an interface.
    InterfaceOnly,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Deleted => write!(f, "deleted"),
            SkipReason::SuffixMismatch => write!(f, "suffix mismatch"),
            SkipReason::TestSource => write!(f, "test source"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
            SkipReason::NoPrimaryType => write!(f, "no primary type"),
            SkipReason::InterfaceOnly => write!(f, "interface only"),
        }
    }
}

/// A changed file that was intentionally left out of the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: String,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

/// A changed file whose analysis failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFailure {
    /// Path of the failed file.
    pub path: String,
    /// Revision being read when the failure happened, if it was a read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Rendered cause.
    pub error: String,
}

/// Result of analyzing one [`FileChangeEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file produced a record.
    Record(ClassChangeRecord),
    /// The file was filtered out or has nothing to report.
    Skipped(SkippedFile),
    /// Reading or parsing the file failed.
    Failed(FileFailure),
}

impl FileOutcome {
    /// Shorthand for a skipped outcome.
    pub fn skipped(path: impl Into<String>, reason: SkipReason) -> Self {
        FileOutcome::Skipped(SkippedFile {
            path: path.into(),
            reason,
        })
    }

    /// Shorthand for a failed outcome.
    pub fn failed(path: impl Into<String>, revision: Option<&str>, error: impl fmt::Display) -> Self {
        FileOutcome::Failed(FileFailure {
            path: path.into(),
            revision: revision.map(str::to_string),
            error: error.to_string(),
        })
    }
}

/// Statistics about one diff run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffStats {
    /// File-level entries produced by the tree comparison.
    pub files_changed: usize,
    /// Number of batch tasks scheduled.
    pub batches: usize,
    /// Worker threads used.
    pub workers: usize,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Everything one diff run produced.
///
/// `records` is the collaborator-facing output; its order carries no meaning.
/// `skipped` and `failures` explain every changed file that has no record.
///
/// # Examples
///
/// ```
/// use diffscope_core::{ClassChangeRecord, DiffReport, FileOutcome};
///
/// let mut report = DiffReport::new("master", "feature");
/// report.push(FileOutcome::Record(ClassChangeRecord::added("B.java", "", "B", vec![])));
/// assert!(report.find("", "B").is_some());
/// assert!(report.find("", "A").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffReport {
    /// Old revision reference as given.
    pub old_revision: String,
    /// New revision reference as given.
    pub new_revision: String,
    /// One record per analyzed source file.
    pub records: Vec<ClassChangeRecord>,
    /// Files with nothing to report.
    pub skipped: Vec<SkippedFile>,
    /// Files whose analysis failed.
    pub failures: Vec<FileFailure>,
    /// Run statistics.
    pub stats: DiffStats,
}

impl DiffReport {
    /// Create an empty report for a revision pair.
    pub fn new(old_revision: impl Into<String>, new_revision: impl Into<String>) -> Self {
        Self {
            old_revision: old_revision.into(),
            new_revision: new_revision.into(),
            ..Self::default()
        }
    }

    /// File one outcome under the matching list.
    pub fn push(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Record(record) => self.records.push(record),
            FileOutcome::Skipped(skipped) => self.skipped.push(skipped),
            FileOutcome::Failed(failure) => self.failures.push(failure),
        }
    }

    /// Look up the record for a class; absence means the class is unchanged.
    pub fn find(&self, package_name: &str, class_name: &str) -> Option<&ClassChangeRecord> {
        self.records
            .iter()
            .find(|r| r.package_name == package_name && r.class_name == class_name)
    }

    /// Total number of methods reported across all records.
    pub fn changed_method_count(&self) -> usize {
        self.records.iter().map(|r| r.changed_methods.len()).sum()
    }
}

/// Output format for CLI results.
///
/// # Examples
///
/// ```
/// use diffscope_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(name: &str, params: &str, fp: &str) -> MethodRecord {
        MethodRecord {
            key: MethodKey::new(name, params),
            fingerprint: fp.into(),
        }
    }

    #[test]
    fn entry_path_uses_old_path_for_deletions() {
        let deleted = FileChangeEntry::new("src/A.java", "", ChangeKind::Delete);
        assert_eq!(deleted.path(), "src/A.java");
        let modified = FileChangeEntry::new("src/A.java", "src/A.java", ChangeKind::Modify);
        assert_eq!(modified.path(), "src/A.java");
    }

    #[test]
    fn entry_display() {
        let added = FileChangeEntry::new("", "B.java", ChangeKind::Add);
        assert_eq!(added.to_string(), "add: B.java");
    }

    #[test]
    fn line_span_clamps_reversed_range() {
        let span = LineSpan::new(5, 2);
        assert!(span.is_empty());
        assert_eq!(span.len(), 0);
    }

    #[test]
    fn line_edit_sides() {
        let replace = LineEdit {
            begin_old: 2,
            end_old: 4,
            begin_new: 2,
            end_new: 3,
        };
        assert_eq!(replace.deleted(), Some(LineSpan::new(2, 4)));
        assert_eq!(replace.inserted(), Some(LineSpan::new(2, 3)));

        let removal = LineEdit {
            begin_old: 7,
            end_old: 9,
            begin_new: 6,
            end_new: 6,
        };
        assert!(removal.inserted().is_none());
    }

    #[test]
    fn added_record_marks_every_method_added() {
        let record = ClassChangeRecord::added(
            "B.java",
            "",
            "B",
            vec![method("n", "()", "aa"), method("m", "(int x)", "bb")],
        );
        assert_eq!(record.kind, ClassChangeKind::Add);
        assert_eq!(record.changed_methods.len(), 2);
        assert!(record
            .changed_methods
            .iter()
            .all(|m| m.change == MethodChange::Added));
        assert!(record.deleted_lines.is_empty());
        assert_eq!(record.qualified_name(), "B");
    }

    #[test]
    fn replaced_record_splits_edits() {
        let edits = [
            LineEdit {
                begin_old: 1,
                end_old: 2,
                begin_new: 1,
                end_new: 2,
            },
            LineEdit {
                begin_old: 10,
                end_old: 10,
                begin_new: 10,
                end_new: 12,
            },
        ];
        let record = ClassChangeRecord::replaced("A.java", "p", "A", vec![], &edits);
        assert_eq!(record.added_lines, vec![LineSpan::new(1, 2), LineSpan::new(10, 12)]);
        assert_eq!(record.deleted_lines, vec![LineSpan::new(1, 2)]);
    }

    #[test]
    fn is_method_changed_matches_name_and_parameters() {
        let record = ClassChangeRecord::added("A.java", "p", "A", vec![method("m", "(int a)", "x")]);
        assert!(record.is_method_changed("m", "(int a)"));
        assert!(!record.is_method_changed("m", "(long a)"));
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = ClassChangeRecord::added("A.java", "p", "A", vec![method("m", "()", "ff")]);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["className"], "A");
        assert_eq!(json["kind"], "ADD");
        assert_eq!(json["changedMethods"][0]["name"], "m");
        assert_eq!(json["changedMethods"][0]["parameters"], "()");
        assert_eq!(json["changedMethods"][0]["change"], "added");
    }

    #[test]
    fn report_push_routes_outcomes() {
        let mut report = DiffReport::new("a", "b");
        report.push(FileOutcome::skipped("X.java", SkipReason::Deleted));
        report.push(FileOutcome::failed("Y.java", Some("master"), "boom"));
        report.push(FileOutcome::Record(ClassChangeRecord::added(
            "Z.java",
            "",
            "Z",
            vec![method("z", "()", "1")],
        )));
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.failures[0].error, "boom");
        assert_eq!(report.failures[0].revision.as_deref(), Some("master"));
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.changed_method_count(), 1);
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::InterfaceOnly.to_string(), "interface only");
        assert_eq!(
            SkipReason::PatternMatch("**/gen/**".into()).to_string(),
            "pattern: **/gen/**"
        );
    }

    #[test]
    fn output_format_from_str() {
        assert_eq!("text".parse::<OutputFormat>().unwrap(), OutputFormat::Text);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
