//! File and page boundary tracking for the read session

use std::path::PathBuf;

use super::resolver::PageUnit;
use crate::output::ReadSession;

/// Decides which chunks must be preceded by file or page markers
#[derive(Debug, Clone, Default)]
pub struct ChunkBoundaries {
    prepend_filename: bool,
    prepend_page_number: bool,
    previous_file: Option<PathBuf>,
    first_region: bool,
}

impl ChunkBoundaries {
    pub fn new(prepend_filename: bool, prepend_page_number: bool) -> Self {
        Self {
            prepend_filename,
            prepend_page_number,
            ..Default::default()
        }
    }

    /// Copy the page's provenance into the session before its first region
    pub fn begin_page(&mut self, session: &mut ReadSession, unit: &PageUnit) {
        session.file = unit.file.clone();
        session.page = unit.page;
        session.angle = unit.angle;
        session.resolution = unit.resolution;
        self.first_region = true;
    }

    /// Set the boundary flags for the next chunk of the current page
    pub fn next_chunk(&mut self, session: &mut ReadSession) {
        let new_file = self.previous_file.as_ref() != Some(&session.file);

        session.first_chunk_of_page = self.first_region;
        session.prepend_page = self.prepend_page_number && self.first_region;
        session.first_chunk_of_file = self.prepend_filename && (session.prepend_page || new_file);

        self.previous_file = Some(session.file.clone());
        self.first_region = false;
    }
}
