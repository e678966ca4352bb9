//! Job progress and cooperative cancellation

use parking_lot::Mutex;

/// Progress counters shared by the worker and the progress surface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressState {
    pub completed_units: usize,
    pub total_units: usize,
    /// Progress of the current unit, 0..=100
    pub sub_progress: u8,
    pub cancelled: bool,
}

/// Tracks fractional completion of a job and its cancel flag.
///
/// All reads and writes serialize through one mutex, so the surface can poll
/// while the engine callback reports sub-progress.
#[derive(Debug)]
pub struct ProgressMonitor {
    state: Mutex<ProgressState>,
}

impl ProgressMonitor {
    pub fn new(total_units: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                total_units,
                ..Default::default()
            }),
        }
    }

    /// Overall completion percentage
    pub fn get_progress(&self) -> u8 {
        let state = self.state.lock();
        let total = state.total_units.max(1) as u64;
        let done = state.completed_units as u64 * 100 + state.sub_progress as u64;
        (done / total).min(100) as u8
    }

    /// Mark one unit complete and reset the sub-progress
    pub fn increase_progress(&self) {
        let mut state = self.state.lock();
        state.completed_units = (state.completed_units + 1).min(state.total_units);
        state.sub_progress = 0;
    }

    /// Report progress within the current unit. Values never move backwards
    /// until the unit completes.
    pub fn set_sub_progress(&self, percent: u8) {
        let mut state = self.state.lock();
        state.sub_progress = state.sub_progress.max(percent.min(100));
    }

    /// Start the current unit over, used before the first region of a page
    pub fn reset_sub_progress(&self) {
        self.state.lock().sub_progress = 0;
    }

    pub fn cancel(&self) {
        self.state.lock().cancelled = true;
    }

    pub fn cancelled(&self) -> bool {
        self.state.lock().cancelled
    }

    /// Engine callback: record sub-progress and answer whether to stop
    pub fn poll(&self, percent: u8) -> bool {
        self.set_sub_progress(percent);
        self.cancelled()
    }
}

#[cfg(test)]
impl ProgressMonitor {
    pub fn snapshot(&self) -> ProgressState {
        *self.state.lock()
    }
}
