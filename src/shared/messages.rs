//! Message types for communication between the interactive thread and the
//! recognition worker

use crossbeam_channel::Sender;

use super::state::AppState;
use crate::recognition::PageUnit;

/// Request from the worker to render a page on the interactive thread
#[derive(Debug)]
pub struct DisplayRequest {
    /// Page number to display
    pub page: usize,
    /// Detect text regions before reading them back
    pub autodetect: bool,
    /// Where the resolved unit is sent
    pub reply: Sender<PageUnit>,
}

/// Messages sent from the worker to the interactive thread
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Push a status message
    PushState(AppState, String),
    /// Pop the last status message
    PopState,
    /// The worker finished its job
    Finished,
}
