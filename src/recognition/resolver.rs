//! Page unit resolution
//!
//! The displayer lives on the interactive thread. The recognition worker
//! asks for a rendered page by sending a `DisplayRequest` and blocking on
//! its reply channel until the interactive thread has serviced it.

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};

use crate::display::{Displayer, RegionImage};
use crate::shared::DisplayRequest;

/// A rendered page ready for recognition
#[derive(Debug, Clone, Default)]
pub struct PageUnit {
    pub success: bool,
    /// Source file of the page
    pub file: PathBuf,
    /// Page index inside `file`
    pub page: usize,
    pub angle: f64,
    pub resolution: u32,
    /// Region images in recognition order
    pub regions: Vec<RegionImage>,
}

impl PageUnit {
    /// Unit for a page that could not be rendered
    pub fn failed(page: usize) -> Self {
        Self {
            success: false,
            page,
            ..Default::default()
        }
    }
}

/// The interactive thread stopped servicing display requests
#[derive(Debug, Error)]
#[error("The display is no longer available")]
pub struct DisplayGone;

pub trait PageUnitResolver: Send {
    /// Render `page` and collect its regions, detecting them first when
    /// `autodetect` is set. Render failures come back as unsuccessful units.
    fn resolve_page(&self, page: usize, autodetect: bool) -> Result<PageUnit, DisplayGone>;
}

/// Resolve a page directly on the displayer. Only call this from the
/// thread owning the displayer.
pub fn resolve_on_display(displayer: &mut dyn Displayer, page: usize, autodetect: bool) -> PageUnit {
    if let Err(e) = displayer.setup(page) {
        warn!("Failed to render page {}: {}", page, e);
        return PageUnit::failed(page);
    }

    if autodetect && displayer.allow_autodetect_regions() {
        displayer.autodetect_regions();
    }

    let (file, index) = displayer.current_source();
    let regions = displayer.region_images();
    debug!("Page {} resolved with {} region(s)", page, regions.len());

    PageUnit {
        success: true,
        file,
        page: index,
        angle: displayer.current_angle(),
        resolution: displayer.current_resolution(),
        regions,
    }
}

/// Worker-side end of the display channel
#[derive(Debug, Clone)]
pub struct DisplayHandle {
    requests: Sender<DisplayRequest>,
}

impl PageUnitResolver for DisplayHandle {
    fn resolve_page(&self, page: usize, autodetect: bool) -> Result<PageUnit, DisplayGone> {
        let (reply, response) = bounded(1);
        self.requests
            .send(DisplayRequest {
                page,
                autodetect,
                reply,
            })
            .map_err(|_| DisplayGone)?;
        response.recv().map_err(|_| DisplayGone)
    }
}

/// Create the request channel between a worker and the displayer owner
pub fn display_channel() -> (DisplayHandle, Receiver<DisplayRequest>) {
    let (requests, receiver) = unbounded();
    (DisplayHandle { requests }, receiver)
}

/// Answer one request on the displayer's thread
pub fn service_request(displayer: &mut dyn Displayer, request: DisplayRequest) {
    let unit = resolve_on_display(displayer, request.page, request.autodetect);
    if request.reply.send(unit).is_err() {
        debug!("Worker dropped its request for page {}", request.page);
    }
}
