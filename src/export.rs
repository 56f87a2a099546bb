use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};

use crate::session::Session;

/// Render the session's turns as a markdown document
pub fn render_markdown(session: &Session, now: DateTime<Local>) -> String {
    let mut export = String::from("# Learning Session Export\n\n");
    export.push_str(&format!("Date: {}\n", now.format("%Y-%m-%d %H:%M")));
    export.push_str(&format!("Model: {}\n", session.model()));
    export.push_str(&format!("Mode: {}\n\n", session.mode()));

    for entry in session.conversation().history() {
        export.push_str(&format!("## {}:\n{}\n\n", entry.role.label(), entry.content));
    }

    export
}

pub fn export_filename(now: DateTime<Local>) -> String {
    format!("learning_session_{}.md", now.format("%Y%m%d_%H%M"))
}

/// Write the export into `dir` and return the file path
pub fn write_export(session: &Session, dir: &Path) -> Result<PathBuf> {
    let now = Local::now();

    fs::create_dir_all(dir)
        .context("Failed to create export directory")?;

    let path = dir.join(export_filename(now));
    fs::write(&path, render_markdown(session, now))
        .with_context(|| format!("Failed to write export to {}", path.display()))?;

    tracing::info!(path = %path.display(), session = %session.session_id, "exported session");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::LearningMode;
    use crate::llm::Conversation;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    fn session_with_history() -> Session {
        let mut conversation = Conversation::new("gemini-1.5-flash", "sys");
        conversation.push_exchange("What is a derivative?", "The rate of change of a function.");
        Session::new(conversation, LearningMode::Math)
    }

    #[test]
    fn markdown_has_header_and_turns() {
        let markdown = render_markdown(&session_with_history(), fixed_now());

        assert_eq!(
            markdown,
            "# Learning Session Export\n\n\
             Date: 2024-03-09 14:05\n\
             Model: gemini-1.5-flash\n\
             Mode: Math\n\n\
             ## Student:\nWhat is a derivative?\n\n\
             ## Assistant:\nThe rate of change of a function.\n\n"
        );
    }

    #[test]
    fn filename_is_timestamped() {
        assert_eq!(export_filename(fixed_now()), "learning_session_20240309_1405.md");
    }

    #[test]
    fn export_is_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let session = session_with_history();

        let path = write_export(&session, dir.path()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# Learning Session Export"));
        assert!(content.contains("## Assistant:\nThe rate of change of a function."));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("learning_session_"));
    }
}
