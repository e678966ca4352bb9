//! Shared state and messaging between the interactive thread and the
//! recognition worker

pub mod messages;
pub mod state;

pub use messages::{DisplayRequest, WorkerEvent};
pub use state::{AppState, SharedAppState};
