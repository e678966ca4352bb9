//! Application Coordinator
//!
//! Owns the displayer on the interactive thread and runs each recognition
//! job on a background worker. While the worker runs, the interactive thread
//! answers its display requests, relays status messages, polls progress into
//! the surface and forwards cancel requests.

use crossbeam_channel::{never, select, tick, unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{AppConfig, RegionStrategy};
use crate::display::{DisplayError, Displayer};
use crate::engine::{EngineConfig, EngineFactory};
use crate::output::SharedEditor;
use crate::recognition::{
    display_channel, service_request, ImageSource, Job, JobError, JobReport, JobState,
    OutputDestination, ProgressMonitor, Recognizer,
};
use crate::shared::{AppState, DisplayRequest, SharedAppState, WorkerEvent};
use crate::surface::ProgressSurface;

/// Main application coordinator
pub struct PageReaderApp {
    /// Configuration and runtime state
    pub shared_state: Arc<RwLock<SharedAppState>>,
    displayer: Box<dyn Displayer>,
    factory: Arc<dyn EngineFactory>,
    editor: SharedEditor,
    cancel_tx: Sender<()>,
    cancel_rx: Receiver<()>,
}

impl PageReaderApp {
    pub fn new(
        config: AppConfig,
        displayer: Box<dyn Displayer>,
        factory: Arc<dyn EngineFactory>,
        editor: SharedEditor,
    ) -> Self {
        let (cancel_tx, cancel_rx) = unbounded();
        let mut state = SharedAppState::new(config);
        if displayer.page_count() > 0 {
            state.runtime.push_state(AppState::Normal, "Ready");
        }
        Self {
            shared_state: Arc::new(RwLock::new(state)),
            displayer,
            factory,
            editor,
            cancel_tx,
            cancel_rx,
        }
    }

    /// Sending on this channel cancels the running job
    pub fn cancel_sender(&self) -> Sender<()> {
        self.cancel_tx.clone()
    }

    pub fn page_count(&self) -> usize {
        self.displayer.page_count()
    }

    /// Display `page`
    pub fn show_page(&mut self, page: usize) -> Result<usize, DisplayError> {
        self.displayer.setup(page)
    }

    /// Recognize the displayed page using its current selection
    pub fn recognize_current_page(
        &mut self,
        surface: &mut dyn ProgressSurface,
    ) -> Result<JobReport, JobError> {
        let job = Job::single_page(self.displayer.current_page());
        self.run_job(job, surface)
    }

    /// Recognize `pages` with the configured region strategy and markers
    pub fn recognize_multiple_pages(
        &mut self,
        pages: Vec<usize>,
        surface: &mut dyn ProgressSurface,
    ) -> Result<JobReport, JobError> {
        let recognition = self.shared_state.read().config.recognition.clone();
        let job = Job::multi_page(
            pages,
            recognition.region_strategy == RegionStrategy::Autodetect,
            recognition.prepend_filename,
            recognition.prepend_page,
        );
        self.run_job(job, surface)
    }

    /// Recognize the whole displayed image without going through a job
    pub fn recognize_image(
        &mut self,
        destination: OutputDestination,
        surface: &mut dyn ProgressSurface,
    ) -> Result<Option<String>, JobError> {
        let Some(image) = self.displayer.current_image() else {
            warn!("No image is displayed");
            return Ok(None);
        };
        let (file, page) = self.displayer.current_source();
        let source = ImageSource {
            image,
            file,
            page,
            angle: self.displayer.current_angle(),
            resolution: self.displayer.current_resolution(),
        };

        let monitor = Arc::new(ProgressMonitor::new(1));
        let (handle, _requests) = display_channel();
        let (events_tx, events_rx) = unbounded();
        let recognizer = Recognizer::new(
            self.factory.clone(),
            self.editor.clone(),
            handle,
            events_tx.clone(),
            self.engine_config(),
        );

        let worker_monitor = monitor.clone();
        let worker = spawn_worker(move || {
            let result = recognizer.recognize_image(&source, destination, &worker_monitor);
            let _ = events_tx.send(WorkerEvent::Finished);
            result
        })?;
        self.begin_job();

        let result = self.drive(worker, never(), events_rx, &monitor, surface);
        let state = match &result {
            Ok(_) if monitor.cancelled() => JobState::Cancelled,
            Ok(_) => JobState::Completed,
            Err(_) => JobState::Failed,
        };
        self.finish_job(state, result.as_ref().err());
        result
    }

    fn engine_config(&self) -> EngineConfig {
        EngineConfig::from_settings(&self.shared_state.read().config.recognition)
    }

    fn run_job(
        &mut self,
        job: Job,
        surface: &mut dyn ProgressSurface,
    ) -> Result<JobReport, JobError> {
        let monitor = Arc::new(ProgressMonitor::new(job.pages.len()));
        let (handle, requests) = display_channel();
        let (events_tx, events_rx) = unbounded();
        let recognizer = Recognizer::new(
            self.factory.clone(),
            self.editor.clone(),
            handle,
            events_tx.clone(),
            self.engine_config(),
        );

        let worker_monitor = monitor.clone();
        let worker = spawn_worker(move || {
            let result = recognizer.recognize(&job, &worker_monitor);
            let _ = events_tx.send(WorkerEvent::Finished);
            result
        })?;
        self.begin_job();

        let result = self.drive(worker, requests, events_rx, &monitor, surface);
        match &result {
            Ok(report) => self.finish_job(report.state, None),
            Err(e) => self.finish_job(JobState::Failed, Some(e)),
        }
        result
    }

    fn begin_job(&self) {
        let mut state = self.shared_state.write();
        state.runtime.job_state = JobState::Running;
        state.runtime.clear_error();
    }

    fn finish_job(&self, job_state: JobState, error: Option<&JobError>) {
        let mut state = self.shared_state.write();
        state.runtime.job_state = job_state;
        if let Some(e) = error {
            state.runtime.set_error(e.to_string());
        }
    }

    /// Service the worker until it finishes
    fn drive<T>(
        &mut self,
        worker: JoinHandle<Result<T, JobError>>,
        mut requests: Receiver<DisplayRequest>,
        events: Receiver<WorkerEvent>,
        monitor: &ProgressMonitor,
        surface: &mut dyn ProgressSurface,
    ) -> Result<T, JobError> {
        // Cancels sent while no job was running do not apply to this one
        while self.cancel_rx.try_recv().is_ok() {}

        let interval = Duration::from_millis(
            self.shared_state.read().config.progress.update_interval_ms.max(1),
        );
        let ticker = tick(interval);
        surface.show_progress();

        loop {
            let mut requests_closed = false;
            select! {
                recv(requests) -> msg => match msg {
                    Ok(request) => service_request(self.displayer.as_mut(), request),
                    Err(_) => requests_closed = true,
                },
                recv(events) -> msg => match msg {
                    Ok(WorkerEvent::PushState(state, message)) => {
                        surface.set_status(&message);
                        self.shared_state.write().runtime.push_state(state, message);
                    }
                    Ok(WorkerEvent::PopState) => {
                        let mut state = self.shared_state.write();
                        state.runtime.pop_state();
                        surface.set_status(state.runtime.current_state().1);
                    }
                    Ok(WorkerEvent::Finished) | Err(_) => break,
                },
                recv(self.cancel_rx) -> _ => {
                    info!("Cancelling recognition");
                    monitor.cancel();
                },
                recv(ticker) -> _ => surface.set_progress(monitor.get_progress()),
            }
            if requests_closed {
                requests = never();
            }
        }

        surface.set_progress(monitor.get_progress());
        surface.hide_progress();

        worker
            .join()
            .map_err(|_| JobError::Worker("recognition thread panicked".to_string()))?
    }
}

/// Whether Ctrl-C should end the process rather than cancel: no job is
/// running, or an earlier cancel request is still unhandled
pub fn interrupt_exits(state: &SharedAppState, cancel_pending: bool) -> bool {
    state.runtime.job_state != JobState::Running || cancel_pending
}

fn spawn_worker<T, F>(work: F) -> Result<JoinHandle<Result<T, JobError>>, JobError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, JobError> + Send + 'static,
{
    std::thread::Builder::new()
        .name("recognition".to_string())
        .spawn(work)
        .map_err(|e| JobError::Worker(e.to_string()))
}
