//! Text block detection
//!
//! Splits a page into text blocks using projection profiles: rows are
//! grouped into horizontal bands separated by blank rows, then each band is
//! split into columns separated by wide blank gaps.

use image::GrayImage;
use tracing::debug;

use super::Rect;

/// Configuration for layout detection
#[derive(Debug, Clone, Copy)]
pub struct LayoutConfig {
    /// Luminance below which a pixel counts as ink
    pub ink_threshold: u8,
    /// Smallest width/height of a block; also the smallest blank gap that
    /// separates two bands
    pub min_block_size: u32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            ink_threshold: 160,
            min_block_size: 8,
        }
    }
}

/// Detect text blocks, ordered top to bottom then left to right
pub fn detect_text_blocks(page: &GrayImage, config: &LayoutConfig) -> Vec<Rect> {
    let (width, height) = page.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let is_ink = |x: u32, y: u32| page.get_pixel(x, y).0[0] < config.ink_threshold;

    let row_profile: Vec<u32> = (0..height)
        .map(|y| (0..width).filter(|&x| is_ink(x, y)).count() as u32)
        .collect();
    let bands = split_runs(&row_profile, config.min_block_size.max(1));

    let mut blocks = Vec::new();
    for (top, bottom) in bands {
        let band_height = bottom - top;
        let column_profile: Vec<u32> = (0..width)
            .map(|x| (top..bottom).filter(|&y| is_ink(x, y)).count() as u32)
            .collect();

        // Columns must be separated by more than a line height to count as
        // distinct blocks; narrower gaps are word spacing.
        let column_gap = band_height.max(config.min_block_size * 2);
        for (left, right) in split_runs(&column_profile, column_gap) {
            let block = Rect::new(left, top, right - left, band_height);
            if block.width >= config.min_block_size && block.height >= config.min_block_size {
                blocks.push(block);
            }
        }
    }

    debug!("Layout detection found {} blocks on {}x{} page", blocks.len(), width, height);
    blocks
}

/// Find half-open runs of non-zero entries, merging runs separated by fewer
/// than `min_gap` zero entries
fn split_runs(profile: &[u32], min_gap: u32) -> Vec<(u32, u32)> {
    let mut runs: Vec<(u32, u32)> = Vec::new();
    let mut start: Option<u32> = None;

    for (i, &count) in profile.iter().enumerate() {
        let i = i as u32;
        match (count > 0, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                push_run(&mut runs, (s, i), min_gap);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        push_run(&mut runs, (s, profile.len() as u32), min_gap);
    }

    runs
}

fn push_run(runs: &mut Vec<(u32, u32)>, run: (u32, u32), min_gap: u32) {
    if let Some(last) = runs.last_mut() {
        if run.0 - last.1 < min_gap {
            last.1 = run.1;
            return;
        }
    }
    runs.push(run);
}
