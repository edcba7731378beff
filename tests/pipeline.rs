use image::{ DynamicImage, GrayImage, ImageOutputFormat, Rgb, RgbImage };
use lpr_vn::{ BoundingBox, Detector, Lpr, LprError, PipelineConfig, Recognizer, TextFragment, NOT_AVAILABLE };

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io::Cursor;

const GREEN: Rgb<u8> = Rgb([0, 255, 0]);

struct FixedBoxes(Vec<BoundingBox>);

impl Detector for FixedBoxes {
    fn detect(&self, _: &DynamicImage, confidence: f32, _: f32) -> Result<Vec<BoundingBox>, LprError> {
        Ok(self.0.iter().copied().filter(|b| b.confidence() >= confidence).collect())
    }
}

/// answers one scripted read per call, in order
struct Scripted(RefCell<VecDeque<Result<Vec<TextFragment>, LprError>>>);

impl Scripted {
    fn new(reads: Vec<Result<Vec<TextFragment>, LprError>>) -> Self {
        Scripted(RefCell::new(reads.into_iter().collect()))
    }
}

impl Recognizer for Scripted {
    fn read(&self, _: &GrayImage) -> Result<Vec<TextFragment>, LprError> {
        self.0.borrow_mut().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

fn text(s: &str) -> Result<Vec<TextFragment>, LprError> {
    Ok(vec![TextFragment::from_rect(0.0, 0.0, 80.0, 20.0, s, 0.9)])
}

fn gray_frame() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([128, 128, 128])))
}

#[test]
fn accepted_kept_and_rejected_regions() {
    let boxes = vec![
        BoundingBox::new(20, 40, 120, 70, 0.92).unwrap(),
        BoundingBox::new(150, 40, 300, 80, 0.88).unwrap(),
        BoundingBox::new(20, 150, 100, 180, 0.51).unwrap(),
        // below the default threshold, never reaches the recognizer
        BoundingBox::new(200, 150, 260, 180, 0.2).unwrap(),
    ];
    let reads = vec![
        text("51G1234"),
        text("NO PARKING"),
        Ok(Vec::new()),
    ];
    let lpr = Lpr::new(Box::new(FixedBoxes(boxes)), Box::new(Scripted::new(reads)), PipelineConfig::default());
    let res = lpr.recognize(&gray_frame()).unwrap();

    let texts: Vec<&str> = res.plates.iter().map(|p| p.record.text.as_str()).collect();
    assert_eq!(texts, vec!["51G-1.234", NOT_AVAILABLE]);
    assert_eq!(res.plates[0].record.confidence, 0.92);
    assert_eq!(res.plates[1].record.confidence, 0.51);
    assert_eq!(res.plates[0].bbox.x1(), 20);

    // accepted plates are outlined, the signage region is not
    assert_eq!(*res.annotated.get_pixel(20, 55), GREEN);
    assert_eq!(*res.annotated.get_pixel(20, 165), GREEN);
    assert_eq!(*res.annotated.get_pixel(150, 60), Rgb([128, 128, 128]));
    assert_eq!(*res.annotated.get_pixel(299, 60), Rgb([128, 128, 128]));
}

#[test]
fn recognizer_fault_keeps_region_as_unread() {
    let boxes = vec![BoundingBox::new(10, 10, 90, 40, 0.7).unwrap()];
    let reads = vec![Err(LprError::recognizer("model crashed"))];
    let lpr = Lpr::new(Box::new(FixedBoxes(boxes)), Box::new(Scripted::new(reads)), PipelineConfig::default());
    let res = lpr.recognize(&gray_frame()).unwrap();
    assert_eq!(res.plates.len(), 1);
    assert_eq!(res.plates[0].record.text, NOT_AVAILABLE);
}

#[test]
fn small_plate_records_carry_upscaled_images() {
    let boxes = vec![BoundingBox::new(0, 0, 40, 10, 0.9).unwrap()];
    let lpr = Lpr::new(Box::new(FixedBoxes(boxes)), Box::new(Scripted::new(vec![text("30A12345")])), PipelineConfig::default());
    let res = lpr.recognize(&gray_frame()).unwrap();
    let record = &res.plates[0].record;
    assert_eq!(record.text, "30A-12.345");
    // x3.2 brings the height to 32
    assert_eq!(record.plate.height(), 32);
    assert_eq!(record.binary.dimensions(), record.plate.dimensions());
}

#[test]
fn thresholds_come_from_config() {
    let boxes = vec![BoundingBox::new(10, 10, 90, 40, 0.3).unwrap()];
    let config = PipelineConfig::default().with_thresholds(0.25, 0.5);
    let lpr = Lpr::new(Box::new(FixedBoxes(boxes)), Box::new(Scripted::new(vec![text("29S567")])), config);
    let res = lpr.recognize(&gray_frame()).unwrap();
    assert_eq!(res.plates.len(), 1);
    assert_eq!(res.plates[0].record.text, "29S567");
}

#[test]
fn encoded_images_are_decoded_first() {
    let mut bytes = Cursor::new(Vec::new());
    gray_frame().write_to(&mut bytes, ImageOutputFormat::Png).unwrap();

    let boxes = vec![BoundingBox::new(10, 10, 90, 40, 0.9).unwrap()];
    let lpr = Lpr::new(Box::new(FixedBoxes(boxes)), Box::new(Scripted::new(vec![text("30A 123.45")])), PipelineConfig::default());
    let res = lpr.recognize_bytes(bytes.get_ref()).unwrap();
    assert_eq!(res.annotated.dimensions(), (320, 240));
    assert_eq!(res.plates[0].record.text, "30A-12.345");
}
