//! page-reader - OCR for document images
//!
//! Opens a set of page images, recognizes the current page, a selection of
//! pages or the whole image with tesseract, and writes the result as plain
//! text or hOCR.

mod app;
mod config;
mod crash;
mod display;
mod engine;
mod output;
mod prompt;
mod recognition;
mod shared;
mod storage;
mod surface;

#[cfg(test)]
mod testing;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::{interrupt_exits, PageReaderApp};
use crate::config::{AppConfig, CharFilterMode, OutputMode, RegionStrategy};
use crate::crash::CrashGuard;
use crate::display::image_displayer::DisplaySetup;
use crate::display::ImageDisplayer;
use crate::engine::{sort_languages, EngineFactory, LanguageSpec, PageSegMode, TesseractFactory};
use crate::output::create_editor;
use crate::recognition::{parse_page_range, JobError, JobReport, JobState, OutputDestination};
use crate::shared::SharedAppState;
use crate::surface::TerminalSurface;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Text,
    Hocr,
}

/// page-reader - OCR for document images
#[derive(Parser, Debug)]
#[command(name = "page-reader")]
#[command(about = "Recognize text in document images with tesseract")]
struct Args {
    /// Page images, one page per file
    files: Vec<PathBuf>,

    /// Page to recognize when no range is given
    #[arg(short, long, default_value = "1")]
    page: usize,

    /// Pages to recognize, e.g. "1-3,5"
    #[arg(long)]
    pages: Option<String>,

    /// Ask for the pages to recognize
    #[arg(long)]
    select_pages: bool,

    /// Detect text regions on each page instead of using the selection
    #[arg(long)]
    autodetect: bool,

    /// Insert the source file name on file and page boundaries
    #[arg(long)]
    prepend_filename: bool,

    /// Insert the page number on page boundaries
    #[arg(long)]
    prepend_page: bool,

    /// Recognition language(s), e.g. "deu" or "eng+fra"
    #[arg(short, long)]
    lang: Option<String>,

    /// Tesseract page segmentation mode
    #[arg(long)]
    psm: Option<u8>,

    /// Only recognize these characters
    #[arg(long, conflicts_with = "blacklist")]
    whitelist: Option<String>,

    /// Never recognize these characters
    #[arg(long)]
    blacklist: Option<String>,

    /// Output format
    #[arg(short, long, value_enum)]
    mode: Option<ModeArg>,

    /// Write output here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Recognize the whole current page as flat text and print it
    #[arg(long)]
    clipboard: bool,

    /// Recognize the whole current page into the output, ignoring selections
    #[arg(long, conflicts_with_all = ["clipboard", "pages", "select_pages"])]
    whole_page: bool,

    /// JSON file with per-page rotations and region selections
    #[arg(long)]
    selections: Option<PathBuf>,

    /// Configuration file to use instead of the default one
    #[arg(long)]
    config: Option<PathBuf>,

    /// List installed recognition languages and page segmentation modes
    #[arg(long)]
    list_languages: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = load_config_or_default(args.config.as_deref())?;
    apply_overrides(&mut config, &args);

    let factory: Arc<dyn EngineFactory> = Arc::new(TesseractFactory::new(&config.engine));

    if args.list_languages {
        return list_languages(factory.as_ref());
    }

    if args.files.is_empty() {
        bail!("No input images given");
    }

    let mut displayer = ImageDisplayer::new(args.files.clone(), &config.display);
    if let Some(path) = &args.selections {
        let setup = DisplaySetup::load(path)
            .with_context(|| format!("Failed to load selections from {:?}", path))?;
        displayer = displayer.with_setup(setup);
    }

    let editor = create_editor(config.output.mode);
    let recovery_dir = match &config.output.recovery_dir {
        Some(dir) => dir.clone(),
        None => storage::get_documents_dir()?,
    };
    let crash_guard = CrashGuard::install(editor.clone(), recovery_dir);

    let mut app = PageReaderApp::new(config, Box::new(displayer), factory, editor.clone());
    let page_count = app.page_count();
    spawn_cancel_listener(app.cancel_sender(), app.shared_state.clone())?;
    let mut surface = if io::stderr().is_terminal() {
        TerminalSurface::new()
    } else {
        TerminalSurface::hidden()
    };

    if args.clipboard {
        app.show_page(args.page)?;
        return match app.recognize_image(OutputDestination::Clipboard, &mut surface) {
            Ok(Some(text)) => {
                println!("{}", text.trim_end());
                Ok(())
            }
            Ok(None) => bail!("Nothing was recognized"),
            Err(e) => Err(job_failure(e, &crash_guard)),
        };
    }

    if args.whole_page {
        app.show_page(args.page)?;
        app.recognize_image(OutputDestination::Editor, &mut surface)
            .map_err(|e| job_failure(e, &crash_guard))?;
    } else {
        let result = if args.select_pages || args.pages.is_some() {
            let pages = if args.select_pages {
                let mut input = io::stdin().lock();
                prompt::prompt_page_range(&mut input, &mut io::stderr(), args.pages.clone(), page_count)?
            } else {
                let text = args.pages.as_deref().unwrap_or_default();
                Some(parse_page_range(text, page_count)?)
            };
            let Some(pages) = pages else {
                info!("No pages selected");
                return Ok(());
            };
            app.recognize_multiple_pages(pages, &mut surface)
        } else {
            app.show_page(args.page)?;
            app.recognize_current_page(&mut surface)
        };

        let report = result.map_err(|e| job_failure(e, &crash_guard))?;
        report_job(&report)?;
    }

    let mut editor = editor.lock();
    match &args.output {
        Some(path) => {
            editor.save(path)?;
            info!("Output written to {:?}", path);
        }
        None => print!("{}", editor.contents()),
    }
    // Written out, nothing left for the crash guard to recover
    editor.clear();

    Ok(())
}

/// Print the end-of-job summary. Fails when no page could be recognized.
fn report_job(report: &JobReport) -> Result<()> {
    info!(
        "Job {} ended {:?} after {} page(s)",
        report.job_id, report.state, report.pages_processed
    );
    if let Some(summary) = report.failure_summary() {
        eprintln!("{}", summary);
    }
    if report.all_pages_failed() {
        bail!("None of the selected pages could be recognized");
    }
    if report.state == JobState::Cancelled {
        warn!("Recognition was cancelled, output is incomplete");
    }
    Ok(())
}

/// Turn a failed job into the process error, saving unsaved output first
/// when the engine aborted
fn job_failure(e: JobError, crash_guard: &CrashGuard) -> anyhow::Error {
    if let JobError::EngineAborted(message) = &e {
        if let Some(path) = crash_guard.persist_unsaved() {
            eprintln!("Unsaved output was written to {:?}", path);
        }
        return anyhow::anyhow!("The OCR engine aborted: {}", message);
    }
    error!("{}", e);
    e.into()
}

/// Load the configuration from `path`, or from the default location, which
/// is created with defaults when missing
fn load_config_or_default(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return config::load_config(path);
    }
    if let Ok(config_dir) = storage::get_config_dir() {
        let config_path = config_dir.join("config.toml");
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return Ok(config);
                }
                Err(e) => warn!("Ignoring configuration: {:#}", e),
            }
        } else if let Err(e) = config::save_config(&AppConfig::default(), &config_path) {
            warn!("Failed to write default configuration: {:#}", e);
        } else {
            info!("Wrote default configuration to {:?}", config_path);
        }
    }
    info!("Using default configuration");
    Ok(AppConfig::default())
}

/// Apply command line options on top of the configuration
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    let recognition = &mut config.recognition;
    if let Some(lang) = &args.lang {
        let parsed = LanguageSpec::parse(lang);
        let language = if parsed.is_multilingual() {
            LanguageSpec::multilingual(&parsed.prefixes().collect::<Vec<_>>())
        } else {
            parsed
        };
        recognition.language = language.to_setting();
    }
    if let Some(psm) = args.psm {
        if PageSegMode::from_number(psm).is_some() {
            recognition.psm = psm;
        } else {
            warn!("Unknown page segmentation mode {}, keeping {}", psm, recognition.psm);
        }
    }
    if let Some(chars) = &args.whitelist {
        recognition.char_filter_mode = CharFilterMode::Whitelist;
        recognition.whitelist = chars.clone();
    }
    if let Some(chars) = &args.blacklist {
        recognition.char_filter_mode = CharFilterMode::Blacklist;
        recognition.blacklist = chars.clone();
    }
    if args.autodetect {
        recognition.region_strategy = RegionStrategy::Autodetect;
    }
    recognition.prepend_filename |= args.prepend_filename;
    recognition.prepend_page |= args.prepend_page;

    if let Some(mode) = args.mode {
        config.output.mode = match mode {
            ModeArg::Text => OutputMode::Text,
            ModeArg::Hocr => OutputMode::Hocr,
        };
    }
}

fn list_languages(factory: &dyn EngineFactory) -> Result<()> {
    let installed = factory.available_languages()?;
    let has_osd = installed.iter().any(|l| l == engine::language::OSD_PREFIX);

    println!("Installed languages:");
    for language in sort_languages(installed) {
        println!("  {}", language);
    }

    println!("Page segmentation modes:");
    for mode in PageSegMode::ALL {
        let note = if mode.requires_osd() && !has_osd {
            " (requires osd data)"
        } else {
            ""
        };
        println!("  {:>2}  {}{}", mode.number(), mode.label(), note);
    }
    Ok(())
}

/// Turn Ctrl-C into a cancel request while a job runs. Outside a job, or
/// when the previous request is still unhandled, Ctrl-C exits.
fn spawn_cancel_listener(cancel: Sender<()>, state: Arc<RwLock<SharedAppState>>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    std::thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            runtime.block_on(async {
                while tokio::signal::ctrl_c().await.is_ok() {
                    if interrupt_exits(&state.read(), !cancel.is_empty()) {
                        std::process::exit(130);
                    }
                    info!("Received Ctrl+C, cancelling recognition...");
                    if cancel.send(()).is_err() {
                        break;
                    }
                }
            });
        })?;
    Ok(())
}
