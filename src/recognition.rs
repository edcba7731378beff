//! Per-plate pipeline: enhance the crop, read it, merge the fragments and
//! decide whether the region is kept.

use image::{ DynamicImage, GrayImage, RgbImage };
use tracing::{ debug, warn };

use crate::config::PipelineConfig;
use crate::error::LprError;
use crate::image_process;
use crate::normalize::{ self, NOT_AVAILABLE };

/// One piece of text found by the recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFragment {
    /// quadrilateral corners, top-left first
    pub points: [(f32, f32); 4],
    pub text: String,
    pub confidence: f32,
}

impl TextFragment {
    pub fn new(points: [(f32, f32); 4], text: impl Into<String>, confidence: f32) -> Self {
        Self { points, text: text.into(), confidence }
    }

    /// Axis-aligned fragment spanning `(x, y)` to `(x + width, y + height)`.
    pub fn from_rect(x: f32, y: f32, width: f32, height: f32, text: impl Into<String>, confidence: f32) -> Self {
        let points = [(x, y), (x + width, y), (x + width, y + height), (x, y + height)];
        Self::new(points, text, confidence)
    }

    pub fn top_left(&self) -> (f32, f32) {
        self.points[0]
    }
}

/// Reads text from an enhanced plate image.
pub trait Recognizer {
    fn read(&self, image: &GrayImage) -> Result<Vec<TextFragment>, LprError>;
}

/// Concatenate fragments top to bottom, then left to right, keyed on each
/// fragment's top-left corner.
pub fn reading_order_text(mut fragments: Vec<TextFragment>) -> String {
    fragments.sort_by(|a, b| {
        let (ax, ay) = a.top_left();
        let (bx, by) = b.top_left();
        ay.partial_cmp(&by)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(ax.partial_cmp(&bx).unwrap_or(std::cmp::Ordering::Equal))
    });
    fragments.into_iter().map(|f| f.text).collect()
}

/// A plate that made it through the pipeline.
#[derive(Debug, Clone)]
pub struct PlateRecord {
    /// canonical plate text or [`NOT_AVAILABLE`]
    pub text: String,
    /// detector confidence for the region
    pub confidence: f32,
    /// upscaled color crop
    pub plate: RgbImage,
    /// binarized crop, for inspection
    pub binary: GrayImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    EmptyCrop,
    /// too much text to be a plate
    TooManyLetters(usize),
}

#[derive(Debug, Clone)]
pub enum PlateOutcome {
    Accepted(PlateRecord),
    /// crop was fine but nothing was read; kept with [`NOT_AVAILABLE`]
    NoText(PlateRecord),
    Rejected(RejectReason),
}

impl PlateOutcome {
    /// The record to emit, if any.
    pub fn into_record(self) -> Option<PlateRecord> {
        match self {
            PlateOutcome::Accepted(record) | PlateOutcome::NoText(record) => Some(record),
            PlateOutcome::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, PlateOutcome::Rejected(_))
    }
}

pub struct PlateRecognizer<'a> {
    recognizer: &'a dyn Recognizer,
    config: &'a PipelineConfig,
}

impl<'a> PlateRecognizer<'a> {

    pub fn new(recognizer: &'a dyn Recognizer, config: &'a PipelineConfig) -> Self {
        Self { recognizer, config }
    }

    /// Run one cropped region through the pipeline.
    ///
    /// Never fails: recognizer errors count as "no text", bad crops and
    /// signage come back as [`PlateOutcome::Rejected`].
    pub fn recognize(&self, crop: &DynamicImage, confidence: f32) -> PlateOutcome {
        let processed = match image_process::preprocess(crop, self.config) {
            Some(processed) => processed,
            None => return PlateOutcome::Rejected(RejectReason::EmptyCrop),
        };

        let fragments = match self.recognizer.read(&processed.enhanced) {
            Ok(fragments) => fragments,
            Err(e) => {
                warn!(error = %e, "recognizer failed, treating plate as unread");
                Vec::new()
            }
        };

        let record = |text: String| PlateRecord {
            text,
            confidence,
            plate: processed.plate.clone(),
            binary: processed.binary.clone(),
        };

        if fragments.is_empty() {
            return PlateOutcome::NoText(record(NOT_AVAILABLE.to_string()));
        }

        let raw_text = reading_order_text(fragments);
        let letters = normalize::count_letters(&raw_text);
        if letters >= self.config.max_plate_letters {
            debug!(raw_text = %raw_text, letters, "region reads like signage, skipping");
            return PlateOutcome::Rejected(RejectReason::TooManyLetters(letters));
        }

        let text = normalize::normalize_plate_text(&raw_text);
        debug!(raw_text = %raw_text, text = %text, confidence, "plate read");
        PlateOutcome::Accepted(record(text))
    }
}
