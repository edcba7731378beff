//! Tuning constants for the plate pipeline.
//!
//! All values are empirical. They were tuned against Vietnamese plates shot
//! by ordinary phone cameras and should be changed together, not one by one.

/// Minimum detector score for a box to be considered.
pub const DETECTION_CONFIDENCE: f32 = 0.4;
/// IoU above which overlapping detections are suppressed.
pub const DETECTION_IOU: f32 = 0.5;

/// Crops lower than this are upscaled before enhancement.
pub const MIN_PLATE_HEIGHT: u32 = 32;
/// Crops narrower than this are upscaled before enhancement.
pub const MIN_PLATE_WIDTH: u32 = 80;
/// Lower bound of the upscale factor applied to small crops.
pub const MIN_UPSCALE_FACTOR: f32 = 2.0;

pub const CLAHE_CLIP_LIMIT: f32 = 2.0;
pub const CLAHE_TILE_GRID: u32 = 8;

/// Neighbourhood diameter of the bilateral filter, in pixels.
pub const BILATERAL_DIAMETER: u32 = 9;
pub const BILATERAL_SIGMA_COLOR: f32 = 75.0;
pub const BILATERAL_SIGMA_SPACE: f32 = 75.0;

/// Side of the square neighbourhood used by the adaptive threshold.
pub const ADAPTIVE_BLOCK_SIZE: u32 = 11;
/// Subtracted from the weighted local mean before comparing.
pub const ADAPTIVE_OFFSET: f32 = 2.0;

/// Recognized text with this many letters is signage, not a plate.
pub const MAX_PLATE_LETTERS: usize = 5;

/// Pixel height of the label text drawn above each plate.
pub const LABEL_SCALE: f32 = 24.0;

/// Knobs for one `Lpr` instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    pub detection_confidence: f32,
    pub detection_iou: f32,
    pub min_plate_height: u32,
    pub min_plate_width: u32,
    pub min_upscale_factor: f32,
    pub clahe_clip_limit: f32,
    pub clahe_tile_grid: u32,
    pub bilateral_diameter: u32,
    pub bilateral_sigma_color: f32,
    pub bilateral_sigma_space: f32,
    pub adaptive_block_size: u32,
    pub adaptive_offset: f32,
    pub max_plate_letters: usize,
    pub label_scale: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_confidence: DETECTION_CONFIDENCE,
            detection_iou: DETECTION_IOU,
            min_plate_height: MIN_PLATE_HEIGHT,
            min_plate_width: MIN_PLATE_WIDTH,
            min_upscale_factor: MIN_UPSCALE_FACTOR,
            clahe_clip_limit: CLAHE_CLIP_LIMIT,
            clahe_tile_grid: CLAHE_TILE_GRID,
            bilateral_diameter: BILATERAL_DIAMETER,
            bilateral_sigma_color: BILATERAL_SIGMA_COLOR,
            bilateral_sigma_space: BILATERAL_SIGMA_SPACE,
            adaptive_block_size: ADAPTIVE_BLOCK_SIZE,
            adaptive_offset: ADAPTIVE_OFFSET,
            max_plate_letters: MAX_PLATE_LETTERS,
            label_scale: LABEL_SCALE,
        }
    }
}

impl PipelineConfig {
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.detection_confidence = confidence;
        self.detection_iou = iou;
        self
    }
}
