//! Vietnamese license plate recognition.
//!
//! [`Lpr`] runs a [`Detector`] over a frame, pushes every candidate region
//! through the plate pipeline ([`recognition::PlateRecognizer`]) and draws
//! the accepted plates on a copy of the frame. Detector and recognizer are
//! injected so the models are loaded once and shared across calls.

use image::{ DynamicImage, GenericImageView, RgbImage };
use rusttype::Font;
use tracing::{ debug, info };

use std::path::Path;

pub mod annotate;
pub mod config;
pub mod detection;
pub mod error;
pub mod image_process;
pub mod normalize;
pub mod recognition;
#[cfg(feature = "tensorflow")]
pub mod tf;
pub mod utils;

pub use config::PipelineConfig;
pub use detection::{ BoundingBox, Detector };
pub use error::{ LprError, LprErrorKind };
pub use normalize::{ normalize_plate_text, NOT_AVAILABLE };
pub use recognition::{ PlateOutcome, PlateRecord, Recognizer, TextFragment };

use annotate::FrameAnnotator;
use recognition::PlateRecognizer;

/// An accepted plate and where it was found.
#[derive(Debug, Clone)]
pub struct DetectedPlate {
    pub bbox: BoundingBox,
    pub record: PlateRecord,
}

/// Everything produced for one frame.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// copy of the input with accepted plates drawn in
    pub annotated: RgbImage,
    /// accepted plates in detector order
    pub plates: Vec<DetectedPlate>,
}

pub struct Lpr {
    detector: Box<dyn Detector>,
    recognizer: Box<dyn Recognizer>,
    font: Option<Font<'static>>,
    config: PipelineConfig,
}

impl Lpr {

    pub fn new(detector: Box<dyn Detector>, recognizer: Box<dyn Recognizer>, config: PipelineConfig) -> Self {
        Lpr { detector, recognizer, font: None, config }
    }

    /// Load the frozen detection and OCR graphs.
    #[cfg(feature = "tensorflow")]
    pub fn from_models(detection_pb: impl AsRef<Path>, ocr_pb: impl AsRef<Path>, config: PipelineConfig) -> Result<Self, LprError> {
        let detector = tf::TfDetector::new(detection_pb)?;
        let recognizer = tf::TfRecognizer::plate_ocr(ocr_pb)?;
        Ok(Self::new(Box::new(detector), Box::new(recognizer), config))
    }

    #[cfg(not(feature = "tensorflow"))]
    pub fn from_models(_detection_pb: impl AsRef<Path>, _ocr_pb: impl AsRef<Path>, _config: PipelineConfig) -> Result<Self, LprError> {
        Err(LprErrorKind::BackendUnavailable("tensorflow").into())
    }

    /// Font used for plate labels; without one only boxes are drawn.
    pub fn with_font(mut self, font: Font<'static>) -> Self {
        self.font = Some(font);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detector pass only. Boxes are clipped to the frame and boxes with no
    /// area left are dropped.
    pub fn get_boxes_and_scores(&self, img: &DynamicImage) -> Result<Vec<BoundingBox>, LprError> {
        let (width, height) = img.dimensions();
        let boxes = self.detector.detect(img, self.config.detection_confidence, self.config.detection_iou)?;
        Ok(boxes.iter().filter_map(|b| b.clip_to(width, height)).collect())
    }

    /// Recognize every plate in one image.
    pub fn recognize(&self, img: &DynamicImage) -> Result<Recognition, LprError> {
        let boxes = self.get_boxes_and_scores(img)?;
        let plate_recognizer = PlateRecognizer::new(self.recognizer.as_ref(), &self.config);

        let mut plates = Vec::with_capacity(boxes.len());
        for a_box in boxes {
            let crop = a_box.crop(img);
            match plate_recognizer.recognize(&crop, a_box.confidence()).into_record() {
                Some(record) => plates.push(DetectedPlate { bbox: a_box, record }),
                None => debug!(?a_box, "region dropped"),
            }
        }

        let labels: Vec<(BoundingBox, &str, f32)> = plates.iter()
            .map(|p| (p.bbox, p.record.text.as_str(), p.record.confidence))
            .collect();
        let annotated = FrameAnnotator::new(self.font.as_ref(), self.config.label_scale)
            .annotate(img, &labels);

        info!(plates = plates.len(), "frame processed");
        Ok(Recognition { annotated, plates })
    }

    /// Decode an encoded image (PNG, JPEG, ...) and recognize it.
    pub fn recognize_bytes(&self, bytes: &[u8]) -> Result<Recognition, LprError> {
        let img = image::load_from_memory(bytes)?;
        self.recognize(&img)
    }
}
