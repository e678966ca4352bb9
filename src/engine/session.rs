//! A configured engine held for the duration of one job

use tracing::{debug, info};

use super::{
    language::OSD_PREFIX, CancelPoll, EngineConfig, EngineError, EngineFactory, OcrEngine,
    RecognizeStatus,
};
use crate::display::RegionImage;

pub struct EngineSession {
    engine: Box<dyn OcrEngine>,
}

impl EngineSession {
    /// Initialize and configure an engine. Fails when the language data or
    /// the OSD data required by the page segmentation mode is missing.
    pub fn start(factory: &dyn EngineFactory, config: &EngineConfig) -> Result<Self, EngineError> {
        if config.psm.requires_osd() {
            let languages = factory.available_languages()?;
            if !languages.iter().any(|l| l == OSD_PREFIX) {
                return Err(EngineError::OsdUnavailable(config.psm.label()));
            }
        }

        let mut engine = factory.init(&config.language)?;
        engine.set_page_seg_mode(config.psm);
        engine.set_character_filter(config.char_filter.clone());

        info!(
            "Engine ready: language={}, psm={}",
            config.language.label(),
            config.psm.number()
        );
        Ok(Self { engine })
    }

    /// Recognize one region image
    pub fn recognize(
        &mut self,
        image: &RegionImage,
        resolution: u32,
        poll: CancelPoll<'_>,
    ) -> Result<RecognizeStatus, EngineError> {
        if image.is_empty() {
            return Err(EngineError::RecognitionFailed("empty region".to_string()));
        }
        let (width, height) = image.dimensions();
        debug!("Recognizing {}x{} region at {} dpi", width, height, resolution);
        self.engine.set_image(image);
        self.engine.set_source_resolution(resolution);
        self.engine.recognize(poll)
    }

    pub fn engine(&self) -> &dyn OcrEngine {
        self.engine.as_ref()
    }
}
