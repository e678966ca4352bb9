//! Output Editors
//!
//! An output editor receives recognized chunks in page/region order and
//! keeps a saveable document. Two implementations exist: flat text and hOCR.
//! The recognition worker only talks to the `OutputEditor` trait.

pub mod hocr;
pub mod text;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::OutputMode;
use crate::engine::OcrEngine;

pub use hocr::HocrEditor;
pub use text::TextEditor;

/// State threaded through every chunk of one job
#[derive(Debug, Clone, Default)]
pub struct ReadSession {
    /// Source file of the current chunk
    pub file: PathBuf,
    /// Page index inside `file`
    pub page: usize,
    /// Rotation of the page in degrees
    pub angle: f64,
    /// Page resolution in DPI
    pub resolution: u32,
    /// First region processed for the current page
    pub first_chunk_of_page: bool,
    /// A file marker must precede this chunk
    pub first_chunk_of_file: bool,
    /// A page marker must precede this chunk
    pub prepend_page: bool,
    /// Language prefix the engine ran with
    pub language: String,
    /// Per-page errors collected by `read_error`
    pub errors: Vec<String>,
    /// Chunks handed to `read`
    pub chunks_read: usize,
}

impl ReadSession {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            ..Default::default()
        }
    }

    /// File name shown in markers
    pub fn display_name(&self) -> String {
        self.file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file.display().to_string())
    }
}

/// Receives recognition output
pub trait OutputEditor: Send {
    fn mode(&self) -> OutputMode;

    /// Start a read session for a job run with `engine`
    fn init_read(&mut self, engine: &dyn OcrEngine) -> ReadSession;

    /// Append the engine's current result as one chunk
    fn read(&mut self, engine: &dyn OcrEngine, session: &mut ReadSession);

    /// Record a page that could not be processed
    fn read_error(&mut self, message: &str, session: &mut ReadSession);

    /// End the read session, leaving the document saveable
    fn finalize_read(&mut self, session: ReadSession);

    /// Unsaved changes exist
    fn is_modified(&self) -> bool;

    fn save(&mut self, path: &Path) -> anyhow::Result<()>;

    fn clear(&mut self);

    /// Serialized document
    fn contents(&self) -> String;
}

/// Editor shared between the interactive thread and the recognition worker
pub type SharedEditor = Arc<Mutex<Box<dyn OutputEditor>>>;

/// Create an editor for the configured mode
pub fn create_editor(mode: OutputMode) -> SharedEditor {
    let editor: Box<dyn OutputEditor> = match mode {
        OutputMode::Text => Box::new(TextEditor::new()),
        OutputMode::Hocr => Box::new(HocrEditor::new()),
    };
    Arc::new(Mutex::new(editor))
}
