//! System prompt loading and per-segment continuity notes.

use crate::defaults;
use crate::error::{Result, ScriptsmithError};
use std::path::Path;

/// Load the system prompt from `path`, trimmed.
///
/// Prompts shorter than [`defaults::MIN_PROMPT_CHARS`] are rejected.
pub fn load_system_prompt(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(ScriptsmithError::PromptNotFound {
            path: path.display().to_string(),
        });
    }

    let content = std::fs::read_to_string(path)?.trim().to_string();
    let length = content.chars().count();
    if length < defaults::MIN_PROMPT_CHARS {
        return Err(ScriptsmithError::PromptTooShort {
            length,
            minimum: defaults::MIN_PROMPT_CHARS,
        });
    }

    tracing::info!(path = %path.display(), char_count = length, "System prompt loaded");
    Ok(content)
}

/// System prompt for segment `index` of `total`.
///
/// With more than one segment the prompt gets a note telling the service
/// which part it is looking at, so headings and tone stay continuous.
pub fn annotate_for_segment(system_prompt: &str, index: usize, total: usize) -> String {
    if total <= 1 {
        return system_prompt.to_string();
    }
    format!(
        "{system_prompt}\n\nNote: This is part {} of {total} of a larger transcript. \
         Maintain consistency and continuity.",
        index + 1
    )
}
