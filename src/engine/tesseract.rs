//! Tesseract OCR backend.
//!
//! Drives the `tesseract` command-line program. Each recognition writes the
//! region to a scratch PNG, runs tesseract with `txt` and `hocr` outputs and
//! polls the child process so a cancelled job kills it promptly.

use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use super::{
    CancelPoll, CharacterFilter, EngineError, EngineFactory, LanguageSpec, OcrEngine,
    PageSegMode, RecognizeStatus,
};
use crate::config::EngineSettings;
use crate::display::RegionImage;

/// Creates tesseract engines
#[derive(Debug, Clone)]
pub struct TesseractFactory {
    binary: PathBuf,
    tessdata_dir: Option<PathBuf>,
    poll_interval: Duration,
}

impl TesseractFactory {
    pub fn new(settings: &EngineSettings) -> Self {
        Self {
            binary: settings.tesseract_path.clone(),
            tessdata_dir: settings.tessdata_dir.clone(),
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        // Own process group, so a terminal Ctrl-C only reaches us and
        // cancels the job instead of killing tesseract
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }
        if let Some(dir) = &self.tessdata_dir {
            command.arg("--tessdata-dir").arg(dir);
        }
        command
    }
}

impl EngineFactory for TesseractFactory {
    fn init(&self, language: &LanguageSpec) -> Result<Box<dyn OcrEngine>, EngineError> {
        let installed = self.available_languages()?;
        if let Some(missing) = language
            .prefixes()
            .find(|p| !installed.iter().any(|l| l == p))
        {
            return Err(EngineError::LanguageMissing(missing.to_string()));
        }

        Ok(Box::new(TesseractEngine {
            factory: self.clone(),
            language: language.prefix.clone(),
            psm: PageSegMode::default(),
            filter: CharacterFilter::None,
            image: None,
            resolution: None,
            text: String::new(),
            hocr: String::new(),
        }))
    }

    fn available_languages(&self) -> Result<Vec<String>, EngineError> {
        let output = self
            .command()
            .arg("--list-langs")
            .output()
            .map_err(|e| spawn_error(&self.binary, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::InitFailed(format!(
                "tesseract --list-langs failed: {}",
                stderr.trim()
            )));
        }

        // Older releases print the list on stderr
        let mut listing = String::from_utf8_lossy(&output.stdout).into_owned();
        if listing.trim().is_empty() {
            listing = String::from_utf8_lossy(&output.stderr).into_owned();
        }
        Ok(parse_language_list(&listing))
    }
}

fn spawn_error(binary: &Path, e: std::io::Error) -> EngineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        EngineError::NotAvailable(format!(
            "{} not found (install tesseract-ocr)",
            binary.display()
        ))
    } else {
        EngineError::Io(e)
    }
}

/// Parse `tesseract --list-langs` output
fn parse_language_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("List of available languages"))
        .map(str::to_string)
        .collect()
}

/// One tesseract configuration; every `recognize` call runs the binary
pub struct TesseractEngine {
    factory: TesseractFactory,
    language: String,
    psm: PageSegMode,
    filter: CharacterFilter,
    image: Option<RegionImage>,
    resolution: Option<u32>,
    text: String,
    hocr: String,
}

impl TesseractEngine {
    /// Arguments following the binary (and its tessdata option)
    fn arguments(&self, input: &Path, output_base: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            input.into(),
            output_base.into(),
            "-l".into(),
            self.language.clone().into(),
            "--psm".into(),
            self.psm.number().to_string().into(),
        ];
        if let Some(dpi) = self.resolution {
            args.push("--dpi".into());
            args.push(dpi.to_string().into());
        }
        if let Some((name, value)) = self.filter.variable() {
            args.push("-c".into());
            args.push(format!("{}={}", name, value).into());
        }
        args.push("-c".into());
        args.push("hocr_font_info=1".into());
        args.push("txt".into());
        args.push("hocr".into());
        args
    }

    fn wait_polling(
        &self,
        child: &mut std::process::Child,
        poll: CancelPoll<'_>,
    ) -> Result<Option<ExitStatus>, EngineError> {
        loop {
            if let Some(status) = child.try_wait()? {
                // A child that died while the job was being cancelled is not
                // an engine failure
                if !status.success() && poll(0) {
                    return Ok(None);
                }
                return Ok(Some(status));
            }
            if poll(0) {
                if let Err(e) = child.kill() {
                    warn!("Failed to stop tesseract: {}", e);
                }
                if let Err(e) = child.wait() {
                    warn!("Failed to reap tesseract: {}", e);
                }
                return Ok(None);
            }
            std::thread::sleep(self.factory.poll_interval);
        }
    }
}

impl OcrEngine for TesseractEngine {
    fn language(&self) -> &str {
        &self.language
    }

    fn set_page_seg_mode(&mut self, mode: PageSegMode) {
        self.psm = mode;
    }

    fn set_character_filter(&mut self, filter: CharacterFilter) {
        self.filter = filter;
    }

    fn set_image(&mut self, image: &RegionImage) {
        self.image = Some(image.clone());
    }

    fn set_source_resolution(&mut self, dpi: u32) {
        self.resolution = (dpi > 0).then_some(dpi);
    }

    fn recognize(&mut self, poll: CancelPoll<'_>) -> Result<RecognizeStatus, EngineError> {
        self.text.clear();
        self.hocr.clear();

        let image = self
            .image
            .as_ref()
            .ok_or_else(|| EngineError::RecognitionFailed("no image set".to_string()))?;
        if poll(0) {
            return Ok(RecognizeStatus::Cancelled);
        }

        let scratch = TempDir::with_prefix("page-reader")?;
        let input = scratch.path().join("region.png");
        let output_base = scratch.path().join("result");
        let stderr_path = scratch.path().join("stderr.log");

        image
            .to_rgba_image()
            .ok_or_else(|| EngineError::RecognitionFailed("region buffer too short".to_string()))?
            .save(&input)?;

        let args = self.arguments(&input, &output_base);
        debug!("Running {} {:?}", self.factory.binary.display(), args);

        let mut child = self
            .factory
            .command()
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(File::create(&stderr_path)?))
            .spawn()
            .map_err(|e| spawn_error(&self.factory.binary, e))?;

        let Some(status) = self.wait_polling(&mut child, poll)? else {
            debug!("Recognition cancelled");
            return Ok(RecognizeStatus::Cancelled);
        };

        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            return Err(failure_from_status(status, stderr.trim()));
        }

        self.text = fs::read_to_string(output_base.with_extension("txt"))?;
        self.hocr = fs::read_to_string(output_base.with_extension("hocr"))?;
        poll(100);
        Ok(RecognizeStatus::Completed)
    }

    fn text(&self) -> String {
        self.text.clone()
    }

    fn hocr_text(&self) -> String {
        self.hocr.clone()
    }
}

#[cfg(unix)]
fn failure_from_status(status: ExitStatus, stderr: &str) -> EngineError {
    use std::os::unix::process::ExitStatusExt;

    match status.signal() {
        Some(signal) => EngineError::Aborted(format!("tesseract killed by signal {}: {}", signal, stderr)),
        None => EngineError::RecognitionFailed(format!("tesseract exited with {}: {}", status, stderr)),
    }
}

#[cfg(not(unix))]
fn failure_from_status(status: ExitStatus, stderr: &str) -> EngineError {
    EngineError::RecognitionFailed(format!("tesseract exited with {}: {}", status, stderr))
}
