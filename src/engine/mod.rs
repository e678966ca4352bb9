//! OCR Engine Layer
//!
//! The OCR engine is an opaque capability: it is initialized for a language,
//! configured with a page segmentation mode and a character filter, fed one
//! region image at a time and asked to recognize it. While recognizing it
//! calls back into a poll function that receives sub-progress and answers
//! whether the job was cancelled.

pub mod language;
pub mod session;
pub mod tesseract;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{CharFilterMode, RecognitionSettings};
use crate::display::RegionImage;

pub use language::{sort_languages, LanguageSpec};
pub use session::EngineSession;
pub use tesseract::TesseractFactory;

/// Errors from the OCR engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("OCR engine not available: {0}")]
    NotAvailable(String),

    #[error("Language data for '{0}' is not installed")]
    LanguageMissing(String),

    #[error("Page segmentation mode '{0}' requires orientation and script detection data (osd)")]
    OsdUnavailable(&'static str),

    #[error("Engine initialization failed: {0}")]
    InitFailed(String),

    #[error("Recognition failed: {0}")]
    RecognitionFailed(String),

    #[error("OCR engine aborted: {0}")]
    Aborted(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Tesseract page segmentation modes offered for selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    AutoOsd,
    Auto,
    SingleColumn,
    SingleBlockVertText,
    #[default]
    SingleBlock,
    SingleLine,
    SingleWord,
    CircleWord,
    SparseText,
    SparseTextOsd,
}

impl PageSegMode {
    pub const ALL: [PageSegMode; 10] = [
        PageSegMode::Auto,
        PageSegMode::AutoOsd,
        PageSegMode::SingleColumn,
        PageSegMode::SingleBlockVertText,
        PageSegMode::SingleBlock,
        PageSegMode::SingleLine,
        PageSegMode::SingleWord,
        PageSegMode::CircleWord,
        PageSegMode::SparseText,
        PageSegMode::SparseTextOsd,
    ];

    /// Tesseract's numeric value for this mode
    pub fn number(self) -> u8 {
        match self {
            PageSegMode::AutoOsd => 1,
            PageSegMode::Auto => 3,
            PageSegMode::SingleColumn => 4,
            PageSegMode::SingleBlockVertText => 5,
            PageSegMode::SingleBlock => 6,
            PageSegMode::SingleLine => 7,
            PageSegMode::SingleWord => 8,
            PageSegMode::CircleWord => 9,
            PageSegMode::SparseText => 11,
            PageSegMode::SparseTextOsd => 12,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.number() == number)
    }

    pub fn label(self) -> &'static str {
        match self {
            PageSegMode::Auto => "Automatic page segmentation",
            PageSegMode::AutoOsd => "Page segmentation with orientation and script detection",
            PageSegMode::SingleColumn => "Assume single column of text",
            PageSegMode::SingleBlockVertText => "Assume single block of vertically aligned text",
            PageSegMode::SingleBlock => "Assume a single uniform block of text",
            PageSegMode::SingleLine => "Assume a line of text",
            PageSegMode::SingleWord => "Assume a single word",
            PageSegMode::CircleWord => "Assume a single word in a circle",
            PageSegMode::SparseText => "Sparse text in no particular order",
            PageSegMode::SparseTextOsd => "Sparse text with orientation and script detection",
        }
    }

    pub fn requires_osd(self) -> bool {
        matches!(self, PageSegMode::AutoOsd | PageSegMode::SparseTextOsd)
    }
}

/// Character whitelist XOR blacklist
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CharacterFilter {
    #[default]
    None,
    Whitelist(String),
    Blacklist(String),
}

impl CharacterFilter {
    /// Build from settings; an empty list means no filter
    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        match settings.char_filter_mode {
            CharFilterMode::Whitelist if !settings.whitelist.is_empty() => {
                CharacterFilter::Whitelist(settings.whitelist.clone())
            }
            CharFilterMode::Blacklist if !settings.blacklist.is_empty() => {
                CharacterFilter::Blacklist(settings.blacklist.clone())
            }
            _ => CharacterFilter::None,
        }
    }

    /// Tesseract variable name and value
    pub fn variable(&self) -> Option<(&'static str, &str)> {
        match self {
            CharacterFilter::None => None,
            CharacterFilter::Whitelist(chars) => Some(("tessedit_char_whitelist", chars)),
            CharacterFilter::Blacklist(chars) => Some(("tessedit_char_blacklist", chars)),
        }
    }
}

/// Engine configuration for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub language: LanguageSpec,
    pub psm: PageSegMode,
    pub char_filter: CharacterFilter,
}

impl EngineConfig {
    pub fn from_settings(settings: &RecognitionSettings) -> Self {
        Self {
            language: LanguageSpec::parse(&settings.language),
            psm: PageSegMode::from_number(settings.psm).unwrap_or_default(),
            char_filter: CharacterFilter::from_settings(settings),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&RecognitionSettings::default())
    }
}

/// How a recognition call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognizeStatus {
    Completed,
    Cancelled,
}

/// Called periodically during recognition with the sub-progress (0..=100)
/// of the current image. Returning `true` cancels recognition.
pub type CancelPoll<'a> = &'a dyn Fn(u8) -> bool;

/// One initialized engine instance
pub trait OcrEngine: Send {
    /// Language prefix the engine was initialized with
    fn language(&self) -> &str;

    fn set_page_seg_mode(&mut self, mode: PageSegMode);

    fn set_character_filter(&mut self, filter: CharacterFilter);

    /// Set the image for the next `recognize` call
    fn set_image(&mut self, image: &RegionImage);

    fn set_source_resolution(&mut self, dpi: u32);

    /// Recognize the current image, polling `poll` until done
    fn recognize(&mut self, poll: CancelPoll<'_>) -> Result<RecognizeStatus, EngineError>;

    /// Flat text of the last recognition
    fn text(&self) -> String;

    /// hOCR markup of the last recognition
    fn hocr_text(&self) -> String;
}

/// Creates engine instances
pub trait EngineFactory: Send + Sync {
    /// Initialize an engine for a `+`-joined language prefix
    fn init(&self, language: &LanguageSpec) -> Result<Box<dyn OcrEngine>, EngineError>;

    /// Language prefixes with installed data, including `osd`
    fn available_languages(&self) -> Result<Vec<String>, EngineError>;
}
