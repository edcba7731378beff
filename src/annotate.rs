//! Burns accepted plates into a copy of the frame for human review.

use image::{ DynamicImage, Rgb, RgbImage };
use imageproc::{ drawing, rect::Rect };
use rusttype::{ Font, Scale };

use std::fs;
use std::path::Path;

use crate::detection::BoundingBox;
use crate::error::{ LprError, LprErrorKind };

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
/// gap between the box top and the label baseline
const LABEL_GAP: i32 = 10;
/// extra band height above the text
const LABEL_PADDING: i32 = 5;

/// Read a TrueType font for plate labels.
pub fn load_font(path: impl AsRef<Path>) -> Result<Font<'static>, LprError> {
    let data = fs::read(path)?;
    Font::try_from_vec(data).ok_or_else(|| LprErrorKind::InvalidFont.into())
}

/// Label drawn above a plate.
pub fn plate_label(text: &str, confidence: f32) -> String {
    format!("{} ({:.2})", text, confidence)
}

pub struct FrameAnnotator<'f> {
    font: Option<&'f Font<'static>>,
    scale: Scale,
}

impl<'f> FrameAnnotator<'f> {

    /// Without a font only boxes and label bands are drawn.
    pub fn new(font: Option<&'f Font<'static>>, scale: f32) -> Self {
        Self { font, scale: Scale::uniform(scale) }
    }

    fn label_size(&self, label: &str) -> (i32, i32) {
        match self.font {
            Some(font) => drawing::text_size(self.scale, font, label),
            // rough glyph box when no font is loaded
            None => (
                (label.chars().count() as f32 * self.scale.x * 0.5) as i32,
                (self.scale.y * 0.7) as i32,
            ),
        }
    }

    /// Copy `frame` and draw each `(box, text, confidence)` on it.
    pub fn annotate(&self, frame: &DynamicImage, plates: &[(BoundingBox, &str, f32)]) -> RgbImage {
        let mut annotated = frame.to_rgb8();
        for (a_box, text, confidence) in plates {
            self.draw_plate(&mut annotated, a_box, text, *confidence);
        }
        annotated
    }

    fn draw_plate(&self, canvas: &mut RgbImage, a_box: &BoundingBox, text: &str, confidence: f32) {
        let a_box = match a_box.clip_to(canvas.width(), canvas.height()) {
            Some(a_box) => a_box,
            None => return,
        };

        // two pixel outline
        drawing::draw_hollow_rect_mut(canvas, a_box.to_rect(), BOX_COLOR);
        if a_box.width() > 2 && a_box.height() > 2 {
            let inner = Rect::at(a_box.x1() as i32 + 1, a_box.y1() as i32 + 1)
                .of_size(a_box.width() - 2, a_box.height() - 2);
            drawing::draw_hollow_rect_mut(canvas, inner, BOX_COLOR);
        }

        let label = plate_label(text, confidence);
        let (text_width, text_height) = self.label_size(&label);
        let x = a_box.x1() as i32;
        let text_top = a_box.y1() as i32 - LABEL_GAP - text_height;
        let band = Rect::at(x, text_top - LABEL_PADDING)
            .of_size(text_width.max(1) as u32, (text_height + LABEL_PADDING).max(1) as u32);
        drawing::draw_filled_rect_mut(canvas, band, BOX_COLOR);

        if let Some(font) = self.font {
            drawing::draw_text_mut(canvas, TEXT_COLOR, x, text_top, self.scale, font, &label);
        }
    }
}


#[cfg(test)]
mod test {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn label_shows_two_decimals() {
        assert_eq!(plate_label("30A-12.345", 0.876), "30A-12.345 (0.88)");
        assert_eq!(plate_label("N/A", 0.4), "N/A (0.40)");
    }

    #[test]
    fn draws_box_and_band_on_a_copy() {
        let frame = DynamicImage::new_rgb8(200, 120);
        let a_box = BoundingBox::new(40, 60, 140, 100, 0.9).unwrap();
        let annotator = FrameAnnotator::new(None, 24.0);
        let out = annotator.annotate(&frame, &[(a_box, "51G-1.234", 0.9)]);

        assert_eq!(out.dimensions(), (200, 120));
        // outline, both pixels thick
        assert_eq!(*out.get_pixel(40, 80), BOX_COLOR);
        assert_eq!(*out.get_pixel(41, 80), BOX_COLOR);
        assert_eq!(*out.get_pixel(139, 80), BOX_COLOR);
        // inside the plate stays untouched
        assert_eq!(*out.get_pixel(90, 80), Rgb([0, 0, 0]));
        // band sits above the box
        assert_eq!(*out.get_pixel(45, 45), BOX_COLOR);
        // original frame is unchanged
        assert_eq!(frame.get_pixel(40, 80).0, [0, 0, 0, 255]);
    }

    #[test]
    fn nothing_is_drawn_without_plates() {
        let frame = DynamicImage::new_rgb8(50, 50);
        let out = FrameAnnotator::new(None, 24.0).annotate(&frame, &[]);
        assert!(out.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn box_at_top_edge_does_not_panic() {
        let frame = DynamicImage::new_rgb8(60, 40);
        let a_box = BoundingBox::new(0, 0, 60, 40, 0.5).unwrap();
        let out = FrameAnnotator::new(None, 24.0).annotate(&frame, &[(a_box, "N/A", 0.5)]);
        assert_eq!(*out.get_pixel(0, 0), BOX_COLOR);
    }

    #[test]
    fn missing_font_file_is_an_io_error() {
        let err = load_font("/definitely/not/here.ttf").unwrap_err();
        assert!(matches!(err.kind(), LprErrorKind::IOError(_)));
    }
}
