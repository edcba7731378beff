//! Helpers for preparing model input and decoding raw model output.

use image::{ GrayImage, ImageBuffer, imageops::{ self, FilterType } };

/// How a plate image is laid out in an OCR input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrLayout {
    /// tensor rows (image height after any transpose)
    pub rows: u32,
    /// tensor columns (image width after any transpose)
    pub cols: u32,
    /// swap x and y before resizing
    pub transposed: bool,
}

impl OcrLayout {
    /// `[1, rows, cols, 3]`
    pub fn tensor_shape(&self) -> [u64; 4] {
        [1, self.rows as u64, self.cols as u64, 3]
    }
}

/// Swap the axes of a gray image.
pub fn transpose(input: &GrayImage) -> GrayImage {
    ImageBuffer::from_fn(input.height(), input.width(), |x, y| *input.get_pixel(y, x))
}

/// Row-major `[rows, cols, 3]` float data for `layout`, gray replicated
/// over the three channels.
pub fn ocr_input(image: &GrayImage, layout: &OcrLayout) -> Vec<f32> {
    let source = if layout.transposed { transpose(image) } else { image.clone() };
    let resized = imageops::resize(&source, layout.cols, layout.rows, FilterType::Nearest);
    resized.pixels()
        .flat_map(|p| std::iter::repeat(p.0[0] as f32).take(3))
        .collect()
}

/// Index of the largest value in every row of a row-major `[rows, cols]`
/// tensor. Ties go to the later index.
pub fn argmax_in_axis0(input: &[f32], shape: &[usize; 2]) -> Vec<usize> {
    input.chunks(shape[1]).map(|v: &[f32]| {
        let mut max = v[0];
        let mut index = 0;
        v.iter().enumerate().for_each(|(i, v_in_v)| {
            if *v_in_v >= max {
                max = *v_in_v;
                index = i;
            }
        });
        index
    }).collect()
}

/// Greedy CTC decoding of a `[steps, classes]` probability tensor.
///
/// Classes at or past `charset.len()` are blanks. Repeated classes on
/// consecutive steps collapse into one character. Returns the text and the
/// mean probability of the emitted characters.
pub fn ctc_greedy_decode(probs: &[f32], shape: [usize; 2], charset: &[char]) -> (String, f32) {
    if shape[1] == 0 || probs.is_empty() {
        return (String::new(), 0.0);
    }
    let argmax = argmax_in_axis0(probs, &shape);
    let mut text = String::new();
    let mut confidence = 0.0;
    let mut previous = None;
    for (step, class) in argmax.iter().enumerate() {
        if *class < charset.len() && previous != Some(*class) {
            text.push(charset[*class]);
            confidence += probs[step * shape[1] + class];
        }
        previous = Some(*class);
    }
    let emitted = text.chars().count();
    if emitted == 0 {
        return (text, 0.0);
    }
    (text, confidence / emitted as f32)
}


#[cfg(test)]
mod test {
    use super::*;

    use image::Luma;

    const CHARSET: [char; 3] = ['3', '0', 'A'];

    /// pixel value encodes its position: x + 10 * y
    fn numbered(width: u32, height: u32) -> GrayImage {
        ImageBuffer::from_fn(width, height, |x, y| Luma([(x + 10 * y) as u8]))
    }

    #[test]
    fn transpose_swaps_axes() {
        let t = transpose(&numbered(4, 2));
        assert_eq!(t.dimensions(), (2, 4));
        assert_eq!(t.get_pixel(1, 3).0[0], 13);
        assert_eq!(t.get_pixel(0, 2).0[0], 2);
    }

    #[test]
    fn transposed_input_is_rows_by_cols() {
        // a wide plate becomes a tall tensor
        let layout = OcrLayout { rows: 4, cols: 2, transposed: true };
        let data = ocr_input(&numbered(4, 2), &layout);
        assert_eq!(layout.tensor_shape(), [1, 4, 2, 3]);
        assert_eq!(data.len(), 4 * 2 * 3);
        // first tensor row holds the first image column, channels repeated
        assert_eq!(&data[..6], &[0.0, 0.0, 0.0, 10.0, 10.0, 10.0]);
        // last tensor row holds the last image column
        assert_eq!(&data[18..], &[3.0, 3.0, 3.0, 13.0, 13.0, 13.0]);
    }

    #[test]
    fn stock_plate_layout_size() {
        let layout = OcrLayout { rows: 164, cols: 48, transposed: true };
        let data = ocr_input(&numbered(120, 40), &layout);
        assert_eq!(data.len(), 164 * 48 * 3);
        let plain = OcrLayout { transposed: false, ..layout };
        assert_eq!(ocr_input(&numbered(120, 40), &plain).len(), 164 * 48 * 3);
    }

    #[test]
    fn argmax_per_row() {
        let input = [0.1, 0.7, 0.2, 0.5, 0.5, 0.0];
        assert_eq!(argmax_in_axis0(&input, &[2, 3]), vec![1, 1]);
    }

    #[test]
    fn repeats_collapse_and_blanks_split() {
        // steps: 3 3 blank 3 0 0 A
        let rows: [[f32; 4]; 7] = [
            [0.9, 0.0, 0.0, 0.1],
            [0.8, 0.0, 0.0, 0.2],
            [0.0, 0.0, 0.0, 1.0],
            [0.7, 0.1, 0.1, 0.1],
            [0.0, 0.6, 0.0, 0.4],
            [0.0, 0.9, 0.0, 0.1],
            [0.0, 0.0, 1.0, 0.0],
        ];
        let probs: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
        let (text, confidence) = ctc_greedy_decode(&probs, [7, 4], &CHARSET);
        assert_eq!(text, "330A");
        assert!((confidence - (0.9 + 0.7 + 0.6 + 1.0) / 4.0).abs() < 1e-6);
    }

    #[test]
    fn all_blank_gives_empty_text() {
        let probs = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        assert_eq!(ctc_greedy_decode(&probs, [2, 4], &CHARSET), (String::new(), 0.0));
    }
}
