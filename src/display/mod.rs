//! Display Layer
//!
//! Owns the currently displayed page, its rotation and the regions of
//! interest selected on it. A displayer is not thread safe: it is only ever
//! touched from the interactive thread, and the recognition worker reaches
//! it through the resolver channel in `recognition::resolver`.

pub mod frame;
pub mod image_displayer;
pub mod layout;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub use frame::RegionImage;
pub use image_displayer::ImageDisplayer;

/// Errors raised while rendering a page
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Failed to read {path:?}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid display setup: {0}")]
    InvalidSetup(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Axis-aligned rectangle in page pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Clip to an image of the given size, `None` if nothing remains
    pub fn clip(&self, img_width: u32, img_height: u32) -> Option<Rect> {
        if self.x >= img_width || self.y >= img_height {
            return None;
        }
        let width = self.width.min(img_width - self.x);
        let height = self.height.min(img_height - self.y);
        if width == 0 || height == 0 {
            return None;
        }
        Some(Rect::new(self.x, self.y, width, height))
    }
}

/// The display collaborator used by page resolution.
///
/// Page numbers are 1-based.
pub trait Displayer {
    /// Number of pages across all open sources
    fn page_count(&self) -> usize;

    /// Page currently shown
    fn current_page(&self) -> usize;

    /// Render `page`, returning the page number actually displayed
    fn setup(&mut self, page: usize) -> Result<usize, DisplayError>;

    /// Whether automatic region detection is supported by this displayer
    fn allow_autodetect_regions(&self) -> bool {
        true
    }

    /// Replace the current selection with detected text blocks
    fn autodetect_regions(&mut self);

    /// Images of the selected regions in selection order, or the whole
    /// page when nothing is selected
    fn region_images(&self) -> Vec<RegionImage>;

    /// The whole rendered page
    fn current_image(&self) -> Option<RegionImage>;

    /// Source file of the current page and the page index inside it
    fn current_source(&self) -> (PathBuf, usize);

    /// Rotation of the current page in degrees
    fn current_angle(&self) -> f64;

    /// Resolution of the current page in DPI
    fn current_resolution(&self) -> u32;
}
