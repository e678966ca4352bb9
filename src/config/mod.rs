//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Recognition settings
    pub recognition: RecognitionSettings,
    /// OCR engine settings
    pub engine: EngineSettings,
    /// Display settings
    pub display: DisplaySettings,
    /// Output settings
    pub output: OutputSettings,
    /// Progress surface settings
    pub progress: ProgressSettings,
}

/// Which character filter is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharFilterMode {
    None,
    Whitelist,
    #[default]
    Blacklist,
}

/// Which areas of a page are recognized in multi-page jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionStrategy {
    /// Use the current selection, or the entire page if nothing is selected
    #[default]
    CurrentSelection,
    /// Detect text blocks automatically on each page
    Autodetect,
}

/// Recognition-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionSettings {
    /// Language as "prefix:code", e.g. "eng:en_EN" or "eng+deu:"
    pub language: String,
    /// Tesseract page segmentation mode number
    pub psm: u8,
    /// Active character filter
    pub char_filter_mode: CharFilterMode,
    /// Characters to allow when the whitelist is active
    pub whitelist: String,
    /// Characters to reject when the blacklist is active
    pub blacklist: String,
    /// Region strategy for multi-page jobs
    pub region_strategy: RegionStrategy,
    /// Prefix output with the source file name on file/page boundaries
    pub prepend_filename: bool,
    /// Prefix output with the page number on page boundaries
    pub prepend_page: bool,
}

impl Default for RecognitionSettings {
    fn default() -> Self {
        Self {
            language: "eng:en_EN".to_string(),
            psm: 6,
            char_filter_mode: CharFilterMode::Blacklist,
            whitelist: String::new(),
            blacklist: String::new(),
            region_strategy: RegionStrategy::CurrentSelection,
            prepend_filename: false,
            prepend_page: false,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Path or name of the tesseract executable
    pub tesseract_path: PathBuf,
    /// Override for the tessdata directory
    pub tessdata_dir: Option<PathBuf>,
    /// How often a running recognition polls for cancellation
    pub poll_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            tessdata_dir: None,
            poll_interval_ms: 50,
        }
    }
}

/// Display settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Resolution assumed for images without embedded DPI
    pub default_resolution: u32,
    /// Luminance below which a pixel counts as ink for layout detection
    pub autodetect_threshold: u8,
    /// Smallest width/height in pixels for an autodetected region
    pub min_region_size: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            default_resolution: 300,
            autodetect_threshold: 160,
            min_region_size: 8,
        }
    }
}

/// Output editor mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Plain text
    #[default]
    Text,
    /// hOCR markup
    Hocr,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Output editor mode
    pub mode: OutputMode,
    /// Where unsaved output is written when the process crashes
    pub recovery_dir: Option<PathBuf>,
}

/// Progress surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    /// Interval at which the progress bar polls the monitor
    pub update_interval_ms: u64,
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
