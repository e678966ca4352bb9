//! Fake collaborators for unit tests

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::OutputMode;
use crate::display::{DisplayError, Displayer, RegionImage};
use crate::engine::{
    CancelPoll, CharacterFilter, EngineError, EngineFactory, LanguageSpec, OcrEngine, PageSegMode,
    RecognizeStatus,
};
use crate::output::{OutputEditor, ReadSession, SharedEditor};
use crate::recognition::resolver::{resolve_on_display, DisplayGone, PageUnit, PageUnitResolver};
use crate::recognition::orchestrator::StatusSink;

/// Called with the zero-based recognize call index before recognition
pub type RecognizeHook = Arc<dyn Fn(usize) -> Result<(), EngineError> + Send + Sync>;

/// Engine whose text names the region it was given: `p<width>r<height>`
pub struct FakeEngine {
    language: String,
    text: String,
    hocr: String,
    image: Option<(u32, u32)>,
    calls: Arc<AtomicUsize>,
    hook: Option<RecognizeHook>,
}

impl FakeEngine {
    fn new(language: &str) -> Self {
        Self {
            language: language.to_string(),
            text: String::new(),
            hocr: String::new(),
            image: None,
            calls: Arc::new(AtomicUsize::new(0)),
            hook: None,
        }
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::new("eng")
        }
    }

    pub fn with_hocr(hocr: &str) -> Self {
        Self {
            hocr: hocr.to_string(),
            ..Self::new("eng")
        }
    }
}

impl OcrEngine for FakeEngine {
    fn language(&self) -> &str {
        &self.language
    }

    fn set_page_seg_mode(&mut self, _mode: PageSegMode) {}

    fn set_character_filter(&mut self, _filter: CharacterFilter) {}

    fn set_image(&mut self, image: &RegionImage) {
        self.image = Some(image.dimensions());
    }

    fn set_source_resolution(&mut self, _dpi: u32) {}

    fn recognize(&mut self, poll: CancelPoll<'_>) -> Result<RecognizeStatus, EngineError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(hook) = &self.hook {
            hook(call)?;
        }
        if poll(50) {
            return Ok(RecognizeStatus::Cancelled);
        }
        if let Some((width, height)) = self.image {
            self.text = format!("p{}r{}", width, height);
        }
        poll(100);
        Ok(RecognizeStatus::Completed)
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn hocr_text(&self) -> String {
        self.hocr.clone()
    }
}

/// Factory for `FakeEngine`s sharing one call counter
pub struct FakeFactory {
    pub languages: Vec<String>,
    pub fail_init: bool,
    pub hook: Option<RecognizeHook>,
    /// hOCR every engine returns
    pub hocr: String,
    calls: Arc<AtomicUsize>,
}

impl Default for FakeFactory {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            fail_init: false,
            hook: None,
            hocr: String::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakeFactory {
    /// Factory whose `init` always fails
    pub fn failing() -> Self {
        Self {
            fail_init: true,
            ..Default::default()
        }
    }

    pub fn with_hook(hook: impl Fn(usize) -> Result<(), EngineError> + Send + Sync + 'static) -> Self {
        Self {
            hook: Some(Arc::new(hook)),
            ..Default::default()
        }
    }
}

impl EngineFactory for FakeFactory {
    fn init(&self, language: &LanguageSpec) -> Result<Box<dyn OcrEngine>, EngineError> {
        if self.fail_init {
            return Err(EngineError::LanguageMissing(language.prefix.clone()));
        }
        let mut engine = FakeEngine::new(&language.prefix);
        engine.calls = self.calls.clone();
        engine.hook = self.hook.clone();
        engine.hocr = self.hocr.clone();
        Ok(Box::new(engine))
    }

    fn available_languages(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.languages.clone())
    }
}

/// Displayer over one document; `None` pages fail to render. Region images
/// are `page` wide and `region index + 1` high.
pub struct FakeDisplayer {
    pages: Vec<Option<usize>>,
    current: usize,
    regions: usize,
    pub autodetected: bool,
}

impl FakeDisplayer {
    pub const AUTODETECTED_REGIONS: usize = 4;

    pub fn new(pages: Vec<Option<usize>>) -> Self {
        Self {
            pages,
            current: 0,
            regions: 0,
            autodetected: false,
        }
    }
}

impl Displayer for FakeDisplayer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn current_page(&self) -> usize {
        self.current.max(1)
    }

    fn setup(&mut self, page: usize) -> Result<usize, DisplayError> {
        match self.pages.get(page.wrapping_sub(1)) {
            Some(Some(regions)) => {
                self.current = page;
                self.regions = *regions;
                Ok(page)
            }
            Some(None) => Err(DisplayError::InvalidSetup(format!("page {} is unreadable", page))),
            None => Err(DisplayError::PageOutOfRange {
                page,
                count: self.pages.len(),
            }),
        }
    }

    fn autodetect_regions(&mut self) {
        self.autodetected = true;
        self.regions = Self::AUTODETECTED_REGIONS;
    }

    fn region_images(&self) -> Vec<RegionImage> {
        let width = self.current as u32;
        (1..=self.regions as u32)
            .map(|height| RegionImage::new(vec![255; (width * height * 4) as usize], width, height))
            .collect()
    }

    fn current_image(&self) -> Option<RegionImage> {
        let width = self.current as u32;
        Some(RegionImage::new(vec![255; (width * 4) as usize], width, 1))
    }

    fn current_source(&self) -> (PathBuf, usize) {
        (PathBuf::from("doc.pdf"), self.current)
    }

    fn current_angle(&self) -> f64 {
        0.0
    }

    fn current_resolution(&self) -> u32 {
        300
    }
}

/// Resolver calling the displayer in place, for single-threaded tests
pub struct DirectResolver<D> {
    displayer: Mutex<D>,
}

impl<D> DirectResolver<D> {
    pub fn new(displayer: D) -> Self {
        Self {
            displayer: Mutex::new(displayer),
        }
    }
}

impl<D: Displayer + Send> PageUnitResolver for DirectResolver<D> {
    fn resolve_page(&self, page: usize, autodetect: bool) -> Result<PageUnit, DisplayGone> {
        Ok(resolve_on_display(&mut *self.displayer.lock(), page, autodetect))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    InitRead,
    Read {
        text: String,
        file: PathBuf,
        page: usize,
        first_chunk_of_page: bool,
        first_chunk_of_file: bool,
        prepend_page: bool,
    },
    ReadError {
        message: String,
    },
    Finalize {
        errors: usize,
    },
}

/// Editor that records every call
pub struct RecordingEditor {
    events: Arc<Mutex<Vec<EditorEvent>>>,
}

impl RecordingEditor {
    pub fn shared() -> (SharedEditor, Arc<Mutex<Vec<EditorEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let editor: Box<dyn OutputEditor> = Box::new(RecordingEditor {
            events: events.clone(),
        });
        (Arc::new(Mutex::new(editor)), events)
    }
}

impl OutputEditor for RecordingEditor {
    fn mode(&self) -> OutputMode {
        OutputMode::Text
    }

    fn init_read(&mut self, engine: &dyn OcrEngine) -> ReadSession {
        self.events.lock().push(EditorEvent::InitRead);
        ReadSession::new(engine.language())
    }

    fn read(&mut self, engine: &dyn OcrEngine, session: &mut ReadSession) {
        self.events.lock().push(EditorEvent::Read {
            text: engine.text(),
            file: session.file.clone(),
            page: session.page,
            first_chunk_of_page: session.first_chunk_of_page,
            first_chunk_of_file: session.first_chunk_of_file,
            prepend_page: session.prepend_page,
        });
        session.chunks_read += 1;
    }

    fn read_error(&mut self, message: &str, session: &mut ReadSession) {
        self.events.lock().push(EditorEvent::ReadError {
            message: message.to_string(),
        });
        session.errors.push(message.to_string());
    }

    fn finalize_read(&mut self, session: ReadSession) {
        self.events.lock().push(EditorEvent::Finalize {
            errors: session.errors.len(),
        });
    }

    fn is_modified(&self) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| matches!(e, EditorEvent::Read { .. }))
    }

    fn save(&mut self, _path: &Path) -> anyhow::Result<()> {
        Ok(())
    }

    fn clear(&mut self) {
        self.events.lock().clear();
    }

    fn contents(&self) -> String {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EditorEvent::Read { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Status sink keeping pushed messages and the stack depth
#[derive(Debug, Clone, Default)]
pub struct RecordingStatus {
    inner: Arc<Mutex<(Vec<String>, usize)>>,
}

impl RecordingStatus {
    pub fn messages(&self) -> Vec<String> {
        self.inner.lock().0.clone()
    }

    pub fn depth(&self) -> usize {
        self.inner.lock().1
    }
}

impl StatusSink for RecordingStatus {
    fn push_busy(&self, message: String) {
        let mut inner = self.inner.lock();
        inner.0.push(message);
        inner.1 += 1;
    }

    fn pop(&self) {
        let mut inner = self.inner.lock();
        inner.1 = inner.1.saturating_sub(1);
    }
}
