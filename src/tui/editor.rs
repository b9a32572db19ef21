//! Card text is edited in the user's own editor on a temporary file.

use std::fs;
use std::io::Write;
use std::process::Command;

use crate::tui::error::TuiError;

/// Open `text` in `command` and return what was saved. A single trailing
/// newline, which most editors add, is removed.
pub fn edit_in_external_editor(command: &str, text: &str) -> Result<String, TuiError> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| TuiError::EditorError("no editor configured".to_string()))?;

    let mut file = tempfile::Builder::new()
        .prefix("sprout-")
        .suffix(".txt")
        .tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;

    log::debug!("editing {} with {}", file.path().display(), command);
    let status = Command::new(program)
        .args(parts)
        .arg(file.path())
        .status()
        .map_err(|e| TuiError::EditorError(format!("could not start {}: {}", program, e)))?;

    if !status.success() {
        return Err(TuiError::EditorError(format!("{} exited with {}", program, status)));
    }

    let edited = fs::read_to_string(file.path())?;
    Ok(edited.strip_suffix('\n').unwrap_or(&edited).to_string())
}
