//! Whitespace-insensitive line edits between two versions of a file.

use diffscope_core::{DiffError, LineEdit};
use git2::{DiffOptions, Patch};

/// Compute the edit regions between two texts, ignoring all whitespace.
///
/// Each edit is one contiguous changed region. Line numbers are 0-based and
/// ranges half-open; a pure insertion has an empty old range positioned at
/// the line it precedes, and a pure deletion has an empty new range.
///
/// # Errors
///
/// Returns [`DiffError::Git`] if the buffers cannot be compared.
///
/// # Examples
///
/// ```
/// use diffscope_git::line_edits;
///
/// let old = "a\nb\nc\n";
/// let new = "a\nB\nc\nd\n";
/// let edits = line_edits(old, new).unwrap();
/// assert_eq!(edits.len(), 2);
/// assert_eq!((edits[0].begin_old, edits[0].end_old), (1, 2));
/// assert_eq!((edits[1].begin_new, edits[1].end_new), (3, 4));
///
/// assert!(line_edits("int x;\n", "int  x ;\n").unwrap().is_empty());
/// ```
pub fn line_edits(old_text: &str, new_text: &str) -> Result<Vec<LineEdit>, DiffError> {
    let mut opts = DiffOptions::new();
    opts.ignore_whitespace(true)
        .context_lines(0)
        .interhunk_lines(0)
        .force_text(true);

    let patch = Patch::from_buffers(
        old_text.as_bytes(),
        None,
        new_text.as_bytes(),
        None,
        Some(&mut opts),
    )
    .map_err(|e| DiffError::Git(format!("failed to diff file contents: {e}")))?;

    let mut edits = Vec::with_capacity(patch.num_hunks());
    for idx in 0..patch.num_hunks() {
        let (hunk, _) = patch
            .hunk(idx)
            .map_err(|e| DiffError::Git(format!("failed to read hunk {idx}: {e}")))?;

        let begin_old = hunk_begin(hunk.old_start(), hunk.old_lines());
        let begin_new = hunk_begin(hunk.new_start(), hunk.new_lines());
        edits.push(LineEdit {
            begin_old,
            end_old: begin_old + hunk.old_lines(),
            begin_new,
            end_new: begin_new + hunk.new_lines(),
        });
    }
    Ok(edits)
}

/// Hunk headers are 1-based, except that an empty side names the line it
/// follows.
fn hunk_begin(start: u32, lines: u32) -> u32 {
    if lines == 0 {
        start
    } else {
        start.saturating_sub(1)
    }
}
