//! Recognition job driver
//!
//! Runs on the recognition worker thread. Pages are resolved through the
//! display channel, recognized region by region with one engine session and
//! handed to the output editor strictly in page and region order.

use crossbeam_channel::Sender;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use super::accumulator::ChunkBoundaries;
use super::progress::ProgressMonitor;
use super::resolver::{DisplayGone, PageUnitResolver};
use crate::display::RegionImage;
use crate::engine::{EngineConfig, EngineError, EngineFactory, EngineSession, RecognizeStatus};
use crate::output::SharedEditor;
use crate::shared::{AppState, WorkerEvent};

/// One recognition run over a set of pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    /// Ascending, without duplicates
    pub pages: Vec<usize>,
    pub autodetect_layout: bool,
    pub prepend_filename: bool,
    pub prepend_page_number: bool,
}

impl Job {
    /// Recognize one page with its current selection, without markers
    pub fn single_page(page: usize) -> Self {
        Self {
            pages: vec![page],
            autodetect_layout: false,
            prepend_filename: false,
            prepend_page_number: false,
        }
    }

    pub fn multi_page(
        mut pages: Vec<usize>,
        autodetect_layout: bool,
        prepend_filename: bool,
        prepend_page_number: bool,
    ) -> Self {
        pages.sort_unstable();
        pages.dedup();
        let multiple = pages.len() > 1;
        Self {
            pages,
            autodetect_layout,
            prepend_filename: multiple && prepend_filename,
            prepend_page_number: multiple && prepend_page_number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub page: usize,
    pub reason: String,
}

/// Outcome of a job that ran its page loop
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: Uuid,
    pub state: JobState,
    /// Pages that rendered successfully
    pub pages_processed: usize,
    pub chunks_emitted: usize,
    pub failures: Vec<PageFailure>,
}

impl JobReport {
    fn new(job_id: Uuid) -> Self {
        Self {
            job_id,
            state: JobState::Running,
            pages_processed: 0,
            chunks_emitted: 0,
            failures: Vec::new(),
        }
    }

    /// One message listing every failed page, if any failed
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        let mut message = String::from("The following errors occurred:");
        for failure in &self.failures {
            message.push_str(&format!("\n- Page {}: {}", failure.page, failure.reason));
        }
        Some(message)
    }

    /// No page of the job could be rendered
    pub fn all_pages_failed(&self) -> bool {
        self.state == JobState::Completed && self.pages_processed == 0 && !self.failures.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Failed to initialize the OCR engine: {0}")]
    EngineInit(#[source] EngineError),

    #[error("The OCR engine aborted: {0}")]
    EngineAborted(String),

    #[error(transparent)]
    Display(#[from] DisplayGone),

    #[error("Recognition worker failed: {0}")]
    Worker(String),
}

/// Receives busy messages while pages are processed
pub trait StatusSink: Send {
    fn push_busy(&self, message: String);
    fn pop(&self);
}

impl StatusSink for Sender<WorkerEvent> {
    fn push_busy(&self, message: String) {
        let _ = self.send(WorkerEvent::PushState(AppState::Busy, message));
    }

    fn pop(&self) {
        let _ = self.send(WorkerEvent::PopState);
    }
}

/// Where single-image output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDestination {
    /// The output editor
    Editor,
    /// Flat text returned to the caller
    Clipboard,
}

/// A whole image recognized outside a job, with where it came from
#[derive(Debug, Clone)]
pub struct ImageSource {
    pub image: RegionImage,
    pub file: PathBuf,
    /// Page index inside `file`
    pub page: usize,
    pub angle: f64,
    pub resolution: u32,
}

const RENDER_FAILURE: &str = "failed to render page";

/// Sub-progress of region `index` of `count`, so a page advances evenly
fn region_progress(index: usize, count: usize, percent: u8) -> u8 {
    let count = count.max(1);
    ((index * 100 + percent as usize) / count).min(100) as u8
}

pub struct Recognizer<R, S> {
    factory: Arc<dyn EngineFactory>,
    editor: SharedEditor,
    resolver: R,
    status: S,
    engine_config: EngineConfig,
}

impl<R: PageUnitResolver, S: StatusSink> Recognizer<R, S> {
    pub fn new(
        factory: Arc<dyn EngineFactory>,
        editor: SharedEditor,
        resolver: R,
        status: S,
        engine_config: EngineConfig,
    ) -> Self {
        Self {
            factory,
            editor,
            resolver,
            status,
            engine_config,
        }
    }

    fn start_engine(&self) -> Result<EngineSession, JobError> {
        EngineSession::start(self.factory.as_ref(), &self.engine_config).map_err(|e| {
            error!("Failed to initialize the OCR engine: {}", e);
            JobError::EngineInit(e)
        })
    }

    /// Run the page loop for `job`.
    ///
    /// The read session is finalized exactly once, after the loop, whether
    /// the job completed, was cancelled or hit an engine abort. An engine
    /// that fails to initialize aborts the job before the editor is touched.
    pub fn recognize(&self, job: &Job, monitor: &ProgressMonitor) -> Result<JobReport, JobError> {
        let job_id = Uuid::new_v4();
        let span = info_span!("job", id = %job_id);
        let _enter = span.enter();
        info!("Recognizing {} page(s)", job.pages.len());

        let mut engine = self.start_engine()?;
        let mut session = self.editor.lock().init_read(engine.engine());
        let mut boundaries = ChunkBoundaries::new(job.prepend_filename, job.prepend_page_number);
        let mut report = JobReport::new(job_id);
        let mut fatal: Option<JobError> = None;
        let total = job.pages.len();

        for (i, &page) in job.pages.iter().enumerate() {
            monitor.reset_sub_progress();
            self.status
                .push_busy(format!("Recognizing page {} ({} of {})", page, i + 1, total));

            let unit = match self.resolver.resolve_page(page, job.autodetect_layout) {
                Ok(unit) => unit,
                Err(e) => {
                    self.status.pop();
                    fatal = Some(e.into());
                    break;
                }
            };

            if !unit.success {
                warn!("Skipping page {}: {}", page, RENDER_FAILURE);
                report.failures.push(PageFailure {
                    page,
                    reason: RENDER_FAILURE.to_string(),
                });
                session.file = unit.file;
                session.page = page;
                self.editor
                    .lock()
                    .read_error(&format!("\n[Failed to recognize page {}]\n", page), &mut session);
            } else {
                report.pages_processed += 1;
                boundaries.begin_page(&mut session, &unit);
                let count = unit.regions.len();

                for (r, region) in unit.regions.iter().enumerate() {
                    if monitor.cancelled() {
                        break;
                    }
                    boundaries.next_chunk(&mut session);
                    let poll = |percent: u8| monitor.poll(region_progress(r, count, percent));

                    match engine.recognize(region, unit.resolution, &poll) {
                        Ok(RecognizeStatus::Completed) if !monitor.cancelled() => {
                            self.editor.lock().read(engine.engine(), &mut session);
                            report.chunks_emitted += 1;
                        }
                        Ok(_) => debug!("Region {} of page {} cancelled", r + 1, page),
                        Err(EngineError::Aborted(message)) => {
                            error!("OCR engine aborted on page {}: {}", page, message);
                            fatal = Some(JobError::EngineAborted(message));
                            break;
                        }
                        Err(e) => {
                            warn!("Region {} of page {} failed: {}", r + 1, page, e);
                            report.failures.push(PageFailure {
                                page,
                                reason: e.to_string(),
                            });
                        }
                    }
                }
            }

            self.status.pop();
            monitor.increase_progress();
            if monitor.cancelled() || fatal.is_some() {
                break;
            }
        }

        self.editor.lock().finalize_read(session);

        if let Some(e) = fatal {
            return Err(e);
        }

        report.state = if monitor.cancelled() {
            JobState::Cancelled
        } else {
            JobState::Completed
        };
        info!(
            "Job finished: {:?}, {} chunk(s), {} failure(s)",
            report.state,
            report.chunks_emitted,
            report.failures.len()
        );
        Ok(report)
    }

    /// Recognize an image that is already available, bypassing the display.
    ///
    /// Returns the flat text for `OutputDestination::Clipboard`, and `None`
    /// when the output went to the editor or recognition was cancelled.
    pub fn recognize_image(
        &self,
        source: &ImageSource,
        destination: OutputDestination,
        monitor: &ProgressMonitor,
    ) -> Result<Option<String>, JobError> {
        let mut engine = self.start_engine()?;
        let poll = |percent: u8| monitor.poll(percent);

        self.status.push_busy("Recognizing image".to_string());
        let status = engine.recognize(&source.image, source.resolution, &poll);
        self.status.pop();

        let completed = match status {
            Ok(RecognizeStatus::Completed) => !monitor.cancelled(),
            Ok(RecognizeStatus::Cancelled) => false,
            Err(EngineError::Aborted(message)) => return Err(JobError::EngineAborted(message)),
            Err(e) => {
                warn!("Image recognition failed: {}", e);
                false
            }
        };
        monitor.increase_progress();

        match destination {
            OutputDestination::Clipboard => Ok(completed.then(|| engine.engine().text())),
            OutputDestination::Editor => {
                let mut editor = self.editor.lock();
                let mut session = editor.init_read(engine.engine());
                session.file = source.file.clone();
                session.page = source.page;
                session.angle = source.angle;
                session.resolution = source.resolution;
                if completed {
                    editor.read(engine.engine(), &mut session);
                }
                editor.finalize_read(session);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputMode;
    use crate::engine::PageSegMode;
    use crate::output::create_editor;
    use crate::testing::{DirectResolver, EditorEvent, FakeDisplayer, FakeFactory, RecordingEditor, RecordingStatus};
    use parking_lot::Mutex;

    struct Harness {
        recognizer: Recognizer<DirectResolver<FakeDisplayer>, RecordingStatus>,
        events: Arc<Mutex<Vec<EditorEvent>>>,
        status: RecordingStatus,
    }

    fn harness(factory: FakeFactory, pages: Vec<Option<usize>>) -> Harness {
        let (editor, events) = RecordingEditor::shared();
        let status = RecordingStatus::default();
        let recognizer = Recognizer::new(
            Arc::new(factory),
            editor,
            DirectResolver::new(FakeDisplayer::new(pages)),
            status.clone(),
            EngineConfig::default(),
        );
        Harness {
            recognizer,
            events,
            status,
        }
    }

    fn reads(events: &[EditorEvent]) -> Vec<&EditorEvent> {
        events.iter().filter(|e| matches!(e, EditorEvent::Read { .. })).collect()
    }

    fn finalize_count(events: &[EditorEvent]) -> usize {
        events.iter().filter(|e| matches!(e, EditorEvent::Finalize { .. })).count()
    }

    #[test]
    fn test_job_constructors() {
        let single = Job::single_page(3);
        assert_eq!(single.pages, vec![3]);
        assert!(!single.prepend_filename && !single.prepend_page_number);

        let multi = Job::multi_page(vec![4, 2, 4], true, true, true);
        assert_eq!(multi.pages, vec![2, 4]);
        assert!(multi.prepend_filename && multi.prepend_page_number);

        let one = Job::multi_page(vec![5], false, true, true);
        assert!(!one.prepend_filename && !one.prepend_page_number);
    }

    #[test]
    fn test_region_progress_scaling() {
        assert_eq!(region_progress(0, 2, 100), 50);
        assert_eq!(region_progress(1, 2, 0), 50);
        assert_eq!(region_progress(1, 2, 100), 100);
        assert_eq!(region_progress(0, 0, 40), 40);
    }

    #[test]
    fn test_chunks_emitted_in_page_and_region_order() {
        let h = harness(FakeFactory::default(), vec![Some(2), Some(1), Some(3)]);
        let monitor = ProgressMonitor::new(3);

        let report = h
            .recognizer
            .recognize(&Job::multi_page(vec![3, 1], false, false, false), &monitor)
            .unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.chunks_emitted, 5);
        let events = h.events.lock();
        let texts: Vec<_> = reads(&events)
            .into_iter()
            .map(|e| match e {
                EditorEvent::Read { text, .. } => text.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(texts, vec!["p1r1", "p1r2", "p3r1", "p3r2", "p3r3"]);
        assert!(matches!(events.first(), Some(EditorEvent::InitRead)));
        assert!(matches!(events.last(), Some(EditorEvent::Finalize { .. })));
        assert_eq!(monitor.get_progress(), 66);
    }

    #[test]
    fn test_prepend_flags_across_pages() {
        let h = harness(FakeFactory::default(), vec![Some(1), Some(1)]);
        let monitor = ProgressMonitor::new(2);

        h.recognizer
            .recognize(&Job::multi_page(vec![1, 2], false, true, true), &monitor)
            .unwrap();

        let events = h.events.lock();
        let flags: Vec<_> = reads(&events)
            .into_iter()
            .map(|e| match e {
                EditorEvent::Read {
                    first_chunk_of_file,
                    first_chunk_of_page,
                    ..
                } => (*first_chunk_of_file, *first_chunk_of_page),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(flags, vec![(true, true), (true, true)]);
    }

    #[test]
    fn test_no_file_flag_without_prepend_filename() {
        let h = harness(FakeFactory::default(), vec![Some(2), Some(1)]);
        let monitor = ProgressMonitor::new(2);

        h.recognizer
            .recognize(&Job::multi_page(vec![1, 2], false, false, true), &monitor)
            .unwrap();

        let events = h.events.lock();
        assert!(reads(&events).iter().all(|e| matches!(
            e,
            EditorEvent::Read {
                first_chunk_of_file: false,
                ..
            }
        )));
    }

    #[test]
    fn test_single_page_job_never_prepends() {
        let h = harness(FakeFactory::default(), vec![Some(1)]);
        let monitor = ProgressMonitor::new(1);

        h.recognizer.recognize(&Job::single_page(1), &monitor).unwrap();

        let events = h.events.lock();
        assert!(matches!(
            reads(&events)[0],
            EditorEvent::Read {
                first_chunk_of_file: false,
                prepend_page: false,
                ..
            }
        ));
    }

    #[test]
    fn test_render_failure_continues_and_advances_progress() {
        let h = harness(FakeFactory::default(), vec![Some(1), None, Some(1)]);
        let monitor = ProgressMonitor::new(3);

        let report = h
            .recognizer
            .recognize(&Job::multi_page(vec![1, 2, 3], false, false, false), &monitor)
            .unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.pages_processed, 2);
        assert_eq!(report.chunks_emitted, 2);
        assert_eq!(
            report.failures,
            vec![PageFailure {
                page: 2,
                reason: RENDER_FAILURE.to_string()
            }]
        );
        assert_eq!(
            report.failure_summary().unwrap(),
            "The following errors occurred:\n- Page 2: failed to render page"
        );
        assert!(!report.all_pages_failed());
        assert_eq!(monitor.get_progress(), 100);

        let events = h.events.lock();
        assert!(events.iter().any(|e| matches!(
            e,
            EditorEvent::ReadError { message } if message == "\n[Failed to recognize page 2]\n"
        )));
        assert_eq!(finalize_count(&events), 1);
    }

    #[test]
    fn test_all_pages_failed() {
        let h = harness(FakeFactory::default(), vec![None, None]);
        let monitor = ProgressMonitor::new(2);

        let report = h
            .recognizer
            .recognize(&Job::multi_page(vec![1, 2], false, false, false), &monitor)
            .unwrap();

        assert!(report.all_pages_failed());
        assert_eq!(report.failures.len(), 2);
    }

    #[test]
    fn test_engine_init_failure_touches_nothing() {
        let factory = FakeFactory::failing();
        let h = harness(factory, vec![Some(1)]);
        let monitor = ProgressMonitor::new(1);

        let result = h.recognizer.recognize(&Job::single_page(1), &monitor);

        assert!(matches!(result, Err(JobError::EngineInit(_))));
        assert!(h.events.lock().is_empty());
        assert!(h.status.messages().is_empty());
    }

    #[test]
    fn test_osd_mode_requires_osd_data() {
        let (editor, events) = RecordingEditor::shared();
        let config = EngineConfig {
            psm: PageSegMode::AutoOsd,
            ..EngineConfig::default()
        };
        let recognizer = Recognizer::new(
            Arc::new(FakeFactory::default()),
            editor,
            DirectResolver::new(FakeDisplayer::new(vec![Some(1)])),
            RecordingStatus::default(),
            config,
        );

        let result = recognizer.recognize(&Job::single_page(1), &ProgressMonitor::new(1));

        assert!(matches!(result, Err(JobError::EngineInit(EngineError::OsdUnavailable(_)))));
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_cancel_mid_job() {
        let monitor = Arc::new(ProgressMonitor::new(3));
        let cancel_on = monitor.clone();
        // Cancel while the second region is being recognized
        let factory = FakeFactory::with_hook(move |call| {
            if call == 1 {
                cancel_on.cancel();
            }
            Ok(())
        });
        let h = harness(factory, vec![Some(2), Some(2), Some(2)]);

        let report = h
            .recognizer
            .recognize(&Job::multi_page(vec![1, 2, 3], false, false, false), &monitor)
            .unwrap();

        assert_eq!(report.state, JobState::Cancelled);
        assert_eq!(report.chunks_emitted, 1);
        let events = h.events.lock();
        assert_eq!(reads(&events).len(), 1);
        assert_eq!(finalize_count(&events), 1);
        assert_eq!(monitor.snapshot().completed_units, 1);
    }

    #[test]
    fn test_recognition_error_is_recorded() {
        let factory = FakeFactory::with_hook(|call| {
            if call == 0 {
                Err(EngineError::RecognitionFailed("bad region".to_string()))
            } else {
                Ok(())
            }
        });
        let h = harness(factory, vec![Some(2)]);
        let monitor = ProgressMonitor::new(1);

        let report = h.recognizer.recognize(&Job::single_page(1), &monitor).unwrap();

        assert_eq!(report.state, JobState::Completed);
        assert_eq!(report.chunks_emitted, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].reason.contains("bad region"));
    }

    #[test]
    fn test_engine_abort_stops_job_and_finalizes() {
        let factory = FakeFactory::with_hook(|call| {
            if call == 1 {
                Err(EngineError::Aborted("signal 6".to_string()))
            } else {
                Ok(())
            }
        });
        let h = harness(factory, vec![Some(1), Some(1), Some(1)]);
        let monitor = ProgressMonitor::new(3);

        let result = h
            .recognizer
            .recognize(&Job::multi_page(vec![1, 2, 3], false, false, false), &monitor);

        assert!(matches!(result, Err(JobError::EngineAborted(_))));
        let events = h.events.lock();
        assert_eq!(reads(&events).len(), 1);
        assert_eq!(finalize_count(&events), 1);
    }

    #[test]
    fn test_status_messages() {
        let h = harness(FakeFactory::default(), vec![Some(1), Some(1)]);
        let monitor = ProgressMonitor::new(2);

        h.recognizer
            .recognize(&Job::multi_page(vec![1, 2], false, false, false), &monitor)
            .unwrap();

        assert_eq!(
            h.status.messages(),
            vec!["Recognizing page 1 (1 of 2)", "Recognizing page 2 (2 of 2)"]
        );
        assert_eq!(h.status.depth(), 0);
    }

    fn image_source(width: u32, height: u32) -> ImageSource {
        ImageSource {
            image: RegionImage::new(vec![0; (width * height * 4) as usize], width, height),
            file: PathBuf::from("/scans/receipt.png"),
            page: 1,
            angle: 180.0,
            resolution: 150,
        }
    }

    #[test]
    fn test_recognize_image_to_clipboard() {
        let h = harness(FakeFactory::default(), vec![]);
        let monitor = ProgressMonitor::new(1);

        let text = h
            .recognizer
            .recognize_image(&image_source(7, 2), OutputDestination::Clipboard, &monitor)
            .unwrap();

        assert_eq!(text.as_deref(), Some("p7r2"));
        assert!(h.events.lock().is_empty());
    }

    #[test]
    fn test_recognize_image_to_editor() {
        let h = harness(FakeFactory::default(), vec![]);
        let monitor = ProgressMonitor::new(1);

        let text = h
            .recognizer
            .recognize_image(&image_source(3, 1), OutputDestination::Editor, &monitor)
            .unwrap();

        assert!(text.is_none());
        let events = h.events.lock();
        let reads = reads(&events);
        assert_eq!(reads.len(), 1);
        assert!(matches!(
            reads[0],
            EditorEvent::Read { file, page: 1, .. } if file == &PathBuf::from("/scans/receipt.png")
        ));
        assert_eq!(finalize_count(&events), 1);
    }

    #[test]
    fn test_recognize_image_to_hocr_keeps_provenance() {
        let mut factory = FakeFactory::default();
        factory.hocr =
            "<div class='ocr_page' id='page_1' title='bbox 0 0 3 1; ppageno 0'><span>x</span></div>"
                .to_string();
        let editor = create_editor(OutputMode::Hocr);
        let recognizer = Recognizer::new(
            Arc::new(factory),
            editor.clone(),
            DirectResolver::new(FakeDisplayer::new(vec![])),
            RecordingStatus::default(),
            EngineConfig::default(),
        );
        let monitor = ProgressMonitor::new(1);

        recognizer
            .recognize_image(&image_source(3, 1), OutputDestination::Editor, &monitor)
            .unwrap();

        let doc = editor.lock().contents();
        assert!(doc.contains(
            "title=\"bbox 0 0 3 1; ppageno 1; image '/scans/receipt.png'; rot 180; res 150\""
        ));
    }

    #[test]
    fn test_autodetect_layout_is_forwarded() {
        let h = harness(FakeFactory::default(), vec![Some(1)]);
        let monitor = ProgressMonitor::new(1);

        let report = h
            .recognizer
            .recognize(&Job::multi_page(vec![1], true, false, false), &monitor)
            .unwrap();

        assert_eq!(report.chunks_emitted, FakeDisplayer::AUTODETECTED_REGIONS);
    }
}
