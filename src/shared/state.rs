//! Shared application state

use crate::config::AppConfig;
use crate::recognition::JobState;

/// Coarse activity level shown alongside a status message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppState {
    #[default]
    Idle,
    Normal,
    Busy,
}

/// Central state shared between the front end and the job runner
#[derive(Debug, Clone, Default)]
pub struct SharedAppState {
    /// Application configuration
    pub config: AppConfig,
    /// Runtime state (not persisted)
    pub runtime: RuntimeState,
}

impl SharedAppState {
    /// Create a new shared state with the given configuration
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            runtime: RuntimeState::default(),
        }
    }
}

/// Runtime state that is not persisted
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    /// Status messages, innermost last
    pub state_stack: Vec<(AppState, String)>,
    /// State of the current or last job
    pub job_state: JobState,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl RuntimeState {
    pub fn push_state(&mut self, state: AppState, message: impl Into<String>) {
        self.state_stack.push((state, message.into()));
    }

    pub fn pop_state(&mut self) {
        self.state_stack.pop();
    }

    /// Status currently on top of the stack
    pub fn current_state(&self) -> (AppState, &str) {
        self.state_stack
            .last()
            .map(|(state, message)| (*state, message.as_str()))
            .unwrap_or((AppState::Idle, ""))
    }

    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
    }
}
