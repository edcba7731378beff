use image::{ DynamicImage, GenericImageView };
use imageproc::rect::Rect;

use crate::error::LprError;

/// A plate candidate in frame pixel coordinates.
///
/// Always satisfies `x1 < x2` and `y1 < y2`; the constructors refuse anything
/// else.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
    confidence: f32,
}

impl BoundingBox {

    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32, confidence: f32) -> Option<Self> {
        if x1 >= x2 || y1 >= y2 {
            return None;
        }
        let confidence = confidence.max(0.0).min(1.0);
        Some(Self { x1, y1, x2, y2, confidence })
    }

    /// Build a box from raw model coordinates, truncated to whole pixels and
    /// clipped to a `width`×`height` frame. `None` when nothing is left.
    pub fn clipped(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, width: u32, height: u32) -> Option<Self> {
        let clip = |v: f32, max: u32| (v as i64).max(0).min(max as i64) as u32;
        Self::new(clip(x1, width), clip(y1, height), clip(x2, width), clip(y2, height), confidence)
    }

    /// Clip an existing box to a frame.
    pub fn clip_to(&self, width: u32, height: u32) -> Option<Self> {
        Self::new(
            self.x1.min(width),
            self.y1.min(height),
            self.x2.min(width),
            self.y2.min(height),
            self.confidence,
        )
    }

    pub fn x1(&self) -> u32 { self.x1 }
    pub fn y1(&self) -> u32 { self.y1 }
    pub fn x2(&self) -> u32 { self.x2 }
    pub fn y2(&self) -> u32 { self.y2 }
    pub fn confidence(&self) -> f32 { self.confidence }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    fn area(&self) -> f32 {
        self.width() as f32 * self.height() as f32
    }

    /// Intersection over union with `other`.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        if ix1 >= ix2 || iy1 >= iy2 {
            return 0.0;
        }
        let inter = (ix2 - ix1) as f32 * (iy2 - iy1) as f32;
        inter / (self.area() + other.area() - inter)
    }

    pub fn to_rect(&self) -> Rect {
        Rect::at(self.x1 as i32, self.y1 as i32).of_size(self.width(), self.height())
    }

    /// Copy the boxed region out of `frame`.
    pub fn crop(&self, frame: &DynamicImage) -> DynamicImage {
        let (width, height) = frame.dimensions();
        match self.clip_to(width, height) {
            Some(b) => frame.crop_imm(b.x1, b.y1, b.width(), b.height()),
            None => DynamicImage::new_rgb8(0, 0),
        }
    }
}

/// Locates plate candidates in a full frame.
///
/// Implementations are expected to drop candidates under `confidence` and
/// suppress overlaps above `iou`; [`filter_detections`] does both for
/// backends that return raw candidates.
pub trait Detector {
    fn detect(&self, frame: &DynamicImage, confidence: f32, iou: f32) -> Result<Vec<BoundingBox>, LprError>;
}

/// Greedy non-maximum suppression, best score first.
pub fn non_max_suppression(mut boxes: Vec<BoundingBox>, iou: f32) -> Vec<BoundingBox> {
    boxes.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
    let mut kept: Vec<BoundingBox> = Vec::with_capacity(boxes.len());
    for candidate in boxes {
        if kept.iter().all(|k| k.iou(&candidate) <= iou) {
            kept.push(candidate);
        }
    }
    kept
}

/// Drop low scores, then suppress overlaps.
pub fn filter_detections(boxes: Vec<BoundingBox>, confidence: f32, iou: f32) -> Vec<BoundingBox> {
    let boxes = boxes.into_iter().filter(|b| b.confidence >= confidence).collect();
    non_max_suppression(boxes, iou)
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn degenerate_boxes_are_refused() {
        assert!(BoundingBox::new(10, 10, 10, 20, 0.9).is_none());
        assert!(BoundingBox::new(10, 20, 30, 5, 0.9).is_none());
        assert!(BoundingBox::new(0, 0, 1, 1, 0.9).is_some());
    }

    #[test]
    fn raw_coordinates_are_clipped_to_frame() {
        let b = BoundingBox::clipped(-5.7, 3.9, 120.2, 40.0, 0.8, 100, 50).unwrap();
        assert_eq!((b.x1(), b.y1(), b.x2(), b.y2()), (0, 3, 100, 40));
        // entirely outside the frame
        assert!(BoundingBox::clipped(120.0, 0.0, 150.0, 10.0, 0.8, 100, 50).is_none());
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0, 0, 10, 10, 0.5).unwrap();
        let b = BoundingBox::new(20, 20, 30, 30, 0.5).unwrap();
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        let half = BoundingBox::new(5, 0, 15, 10, 0.5).unwrap();
        assert!((a.iou(&half) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn suppression_keeps_best_of_overlapping() {
        let boxes = vec![
            BoundingBox::new(0, 0, 10, 10, 0.6).unwrap(),
            BoundingBox::new(1, 0, 11, 10, 0.9).unwrap(),
            BoundingBox::new(50, 50, 60, 60, 0.3).unwrap(),
        ];
        let kept = filter_detections(boxes, 0.4, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].x1(), 1);
    }

    #[test]
    fn crop_matches_box_size() {
        let frame = DynamicImage::new_rgb8(100, 60);
        let b = BoundingBox::new(10, 20, 50, 35, 0.7).unwrap();
        assert_eq!(b.crop(&frame).dimensions(), (40, 15));
        // box outside a smaller frame gives an empty crop
        let small = DynamicImage::new_rgb8(5, 5);
        assert_eq!(b.crop(&small).dimensions(), (0, 0));
    }
}
