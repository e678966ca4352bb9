//! Plain text output

use anyhow::Context;
use std::path::Path;
use tracing::warn;

use super::{OutputEditor, ReadSession};
use crate::config::OutputMode;
use crate::engine::OcrEngine;

/// Accumulates recognized text
#[derive(Debug, Default)]
pub struct TextEditor {
    text: String,
    modified: bool,
}

impl TextEditor {
    pub fn new() -> Self {
        Self::default()
    }

    fn append(&mut self, chunk: &str) {
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(chunk);
        self.modified = true;
    }
}

/// `[File: name; Page: n]` marker for the flags set on the session
fn boundary_marker(session: &ReadSession) -> Option<String> {
    let mut parts = Vec::new();
    if session.first_chunk_of_file {
        parts.push(format!("File: {}", session.display_name()));
    }
    if session.prepend_page {
        parts.push(format!("Page: {}", session.page));
    }
    (!parts.is_empty()).then(|| format!("[{}]\n", parts.join("; ")))
}

impl OutputEditor for TextEditor {
    fn mode(&self) -> OutputMode {
        OutputMode::Text
    }

    fn init_read(&mut self, engine: &dyn OcrEngine) -> ReadSession {
        ReadSession::new(engine.language())
    }

    fn read(&mut self, engine: &dyn OcrEngine, session: &mut ReadSession) {
        let mut chunk = boundary_marker(session).unwrap_or_default();
        chunk.push_str(engine.text().trim_end());
        self.append(&chunk);
        session.chunks_read += 1;
    }

    fn read_error(&mut self, message: &str, session: &mut ReadSession) {
        self.append(message);
        session.errors.push(message.trim().to_string());
    }

    fn finalize_read(&mut self, session: ReadSession) {
        if !session.errors.is_empty() {
            warn!("{} page(s) could not be recognized", session.errors.len());
        }
    }

    fn is_modified(&self) -> bool {
        self.modified
    }

    fn save(&mut self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, &self.text)
            .with_context(|| format!("Failed to write {:?}", path))?;
        self.modified = false;
        Ok(())
    }

    fn clear(&mut self) {
        self.text.clear();
        self.modified = false;
    }

    fn contents(&self) -> String {
        self.text.clone()
    }
}
