//! Where processed transcripts and job summaries are written.

use crate::error::{Result, ScriptsmithError};
use crate::report::JobSummary;
use std::fs;
use std::path::{Path, PathBuf};

const TRANSCRIPT_SUFFIX: &str = "_transcript";
const PROCESSED_SUFFIX: &str = "_processed.txt";

/// Default output path for `input`: next to it, named
/// `<stem without "_transcript">_processed.txt`.
pub fn processed_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = stem.strip_suffix(TRANSCRIPT_SUFFIX).unwrap_or(&stem);
    let base = if base.is_empty() { "output" } else { base };
    input.with_file_name(format!("{base}{PROCESSED_SUFFIX}"))
}

/// Write `text` to `path`, creating parent directories as needed.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    tracing::info!(path = %path.display(), chars = text.chars().count(), "Output written");
    Ok(())
}

/// Write the summary as pretty JSON.
pub fn write_summary_json(path: &Path, summary: &JobSummary) -> Result<()> {
    let json = summary
        .to_json()
        .map_err(|e| ScriptsmithError::Other(format!("Failed to encode summary: {e}")))?;
    write_text(path, &json)
}
