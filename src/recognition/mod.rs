//! Recognition Pipeline
//!
//! Turns a job (a sorted list of pages plus layout and marker options) into
//! output editor chunks, reporting progress and honouring cancellation.

pub mod accumulator;
pub mod orchestrator;
pub mod page_range;
pub mod progress;
pub mod resolver;

pub use orchestrator::{
    ImageSource, Job, JobError, JobReport, JobState, OutputDestination, Recognizer,
};
pub use page_range::parse_page_range;
pub use progress::ProgressMonitor;
pub use resolver::{display_channel, service_request, PageUnit};
