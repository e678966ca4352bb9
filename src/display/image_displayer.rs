//! Displayer over a list of image files, one page per file

use image::{imageops, DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::layout::{detect_text_blocks, LayoutConfig};
use super::{DisplayError, Displayer, Rect, RegionImage};
use crate::config::DisplaySettings;

/// Per-page rotation and region selections, loaded from JSON
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySetup {
    /// Rotation in degrees per page number (multiples of 90)
    pub rotations: HashMap<usize, u32>,
    /// Selected regions per page number, in recognition order
    pub selections: HashMap<usize, Vec<Rect>>,
}

impl DisplaySetup {
    /// Load a setup file
    pub fn load(path: &Path) -> Result<Self, DisplayError> {
        let content = std::fs::read_to_string(path)?;
        let setup: DisplaySetup = serde_json::from_str(&content)
            .map_err(|e| DisplayError::InvalidSetup(format!("{:?}: {}", path, e)))?;

        if let Some((page, angle)) = setup.rotations.iter().find(|(_, a)| *a % 90 != 0) {
            return Err(DisplayError::InvalidSetup(format!(
                "rotation of page {} must be a multiple of 90, got {}",
                page, angle
            )));
        }
        Ok(setup)
    }
}

/// The page currently rendered
struct RenderedPage {
    page: usize,
    image: RgbaImage,
    regions: Vec<Rect>,
}

/// Image file displayer
pub struct ImageDisplayer {
    sources: Vec<PathBuf>,
    setup: DisplaySetup,
    resolution: u32,
    layout: LayoutConfig,
    current: Option<RenderedPage>,
}

impl ImageDisplayer {
    /// Create a displayer over the given files
    pub fn new(sources: Vec<PathBuf>, settings: &DisplaySettings) -> Self {
        info!("Opened {} source image(s)", sources.len());
        Self {
            sources,
            setup: DisplaySetup::default(),
            resolution: settings.default_resolution,
            layout: LayoutConfig {
                ink_threshold: settings.autodetect_threshold,
                min_block_size: settings.min_region_size,
            },
            current: None,
        }
    }

    /// Apply rotations and selections
    pub fn with_setup(mut self, setup: DisplaySetup) -> Self {
        self.setup = setup;
        self
    }

    /// Regions selected on the current page
    pub fn selected_regions(&self) -> &[Rect] {
        self.current.as_ref().map(|c| c.regions.as_slice()).unwrap_or(&[])
    }

    fn angle_for(&self, page: usize) -> u32 {
        self.setup.rotations.get(&page).copied().unwrap_or(0) % 360
    }

    fn render(&self, page: usize) -> Result<RgbaImage, DisplayError> {
        let path = &self.sources[page - 1];
        let image = image::open(path).map_err(|source| DisplayError::Unreadable {
            path: path.clone(),
            source,
        })?;
        Ok(rotate(image, self.angle_for(page)).to_rgba8())
    }
}

fn rotate(image: DynamicImage, angle: u32) -> DynamicImage {
    match angle {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    }
}

impl Displayer for ImageDisplayer {
    fn page_count(&self) -> usize {
        self.sources.len()
    }

    fn current_page(&self) -> usize {
        self.current.as_ref().map(|c| c.page).unwrap_or(1)
    }

    fn setup(&mut self, page: usize) -> Result<usize, DisplayError> {
        if page == 0 || page > self.sources.len() {
            return Err(DisplayError::PageOutOfRange {
                page,
                count: self.sources.len(),
            });
        }

        let image = self.render(page)?;
        let (width, height) = image.dimensions();
        let regions = self
            .setup
            .selections
            .get(&page)
            .map(|rects| rects.iter().filter_map(|r| r.clip(width, height)).collect())
            .unwrap_or_default();

        debug!("Displaying page {} ({}x{})", page, width, height);
        self.current = Some(RenderedPage { page, image, regions });
        Ok(page)
    }

    fn autodetect_regions(&mut self) {
        let layout = self.layout;
        if let Some(current) = self.current.as_mut() {
            let gray = DynamicImage::ImageRgba8(current.image.clone()).to_luma8();
            current.regions = detect_text_blocks(&gray, &layout);
        }
    }

    fn region_images(&self) -> Vec<RegionImage> {
        let Some(current) = &self.current else {
            return Vec::new();
        };

        let regions = self.selected_regions();
        if regions.is_empty() {
            return vec![RegionImage::from_rgba(current.image.clone())];
        }

        regions
            .iter()
            .map(|r| {
                let crop = imageops::crop_imm(&current.image, r.x, r.y, r.width, r.height).to_image();
                RegionImage::from_rgba(crop)
            })
            .collect()
    }

    fn current_image(&self) -> Option<RegionImage> {
        self.current
            .as_ref()
            .map(|c| RegionImage::from_rgba(c.image.clone()))
    }

    fn current_source(&self) -> (PathBuf, usize) {
        match &self.current {
            Some(current) => (self.sources[current.page - 1].clone(), 1),
            None => (PathBuf::new(), 0),
        }
    }

    fn current_angle(&self) -> f64 {
        self.angle_for(self.current_page()) as f64
    }

    fn current_resolution(&self) -> u32 {
        self.resolution
    }
}
