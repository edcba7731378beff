//! Enhancement of a cropped plate before it is handed to the recognizer.
//!
//! The chain is: upscale small crops, gray, CLAHE, bilateral smoothing. A
//! binary image is produced alongside for inspection; the recognizer itself
//! reads the smoothed gray image.

use image::{ DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, RgbImage, imageops::FilterType };
use imageproc::filter;
use tracing::debug;

use crate::config::PipelineConfig;

/// Output of [`preprocess`].
#[derive(Debug, Clone)]
pub struct PreprocessedPlate {
    /// color crop after upscaling
    pub plate: RgbImage,
    /// gray crop after CLAHE and bilateral smoothing, fed to the recognizer
    pub enhanced: GrayImage,
    /// adaptive threshold of `enhanced`
    pub binary: GrayImage,
}

/// Run the full enhancement chain. `None` for a zero-area crop.
pub fn preprocess(crop: &DynamicImage, config: &PipelineConfig) -> Option<PreprocessedPlate> {
    let (width, height) = crop.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let plate = upscale_small_plate(crop, config);
    let gray = plate.to_luma8();
    let equalized = clahe(&gray, config.clahe_clip_limit, config.clahe_tile_grid);
    let enhanced = bilateral_filter(
        &equalized,
        config.bilateral_diameter,
        config.bilateral_sigma_color,
        config.bilateral_sigma_space,
    );
    let binary = adaptive_threshold_gaussian(&enhanced, config.adaptive_block_size, config.adaptive_offset);

    Some(PreprocessedPlate { plate: plate.to_rgb8(), enhanced, binary })
}

/// Enlarge crops below the minimum plate size.
///
/// The factor is at least `min_upscale_factor` and large enough to bring both
/// sides up to the minimum. Crops that are already large enough are returned
/// as they are.
pub fn upscale_small_plate(img: &DynamicImage, config: &PipelineConfig) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    if height >= config.min_plate_height && width >= config.min_plate_width {
        return img.clone();
    }
    let scale = config.min_upscale_factor
        .max(config.min_plate_height as f32 / height as f32)
        .max(config.min_plate_width as f32 / width as f32);
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;
    debug!(width, height, new_width, new_height, "upscaling small plate crop");
    img.resize_exact(new_width, new_height, FilterType::Lanczos3)
}

/// Per-tile equalization lookup tables.
struct TileLuts {
    tiles_x: u32,
    tiles_y: u32,
    tile_width: f32,
    tile_height: f32,
    luts: Vec<[u8; 256]>,
}

impl TileLuts {

    fn build(img: &GrayImage, clip_limit: f32, grid: u32) -> Self {
        let (width, height) = img.dimensions();
        let tiles_x = grid.min(width).max(1);
        let tiles_y = grid.min(height).max(1);
        let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);

        for ty in 0..tiles_y {
            let y0 = ty * height / tiles_y;
            let y1 = (ty + 1) * height / tiles_y;
            for tx in 0..tiles_x {
                let x0 = tx * width / tiles_x;
                let x1 = (tx + 1) * width / tiles_x;

                let mut hist = [0u32; 256];
                for y in y0..y1 {
                    for x in x0..x1 {
                        hist[img.get_pixel(x, y).0[0] as usize] += 1;
                    }
                }
                let area = (x1 - x0) * (y1 - y0);
                clip_histogram(&mut hist, clip_limit, area);

                // cdf scaled back to the intensity range
                let scale = 255.0 / area.max(1) as f32;
                let mut lut = [0u8; 256];
                let mut sum = 0u32;
                hist.iter().zip(lut.iter_mut()).for_each(|(count, v)| {
                    sum += count;
                    *v = (sum as f32 * scale).round().min(255.0) as u8;
                });
                luts.push(lut);
            }
        }

        Self {
            tiles_x,
            tiles_y,
            tile_width: width as f32 / tiles_x as f32,
            tile_height: height as f32 / tiles_y as f32,
            luts,
        }
    }

    fn lut(&self, tx: u32, ty: u32) -> &[u8; 256] {
        &self.luts[(ty * self.tiles_x + tx) as usize]
    }

    /// neighbouring tile indices and the weight of the second one
    fn neighbours(pos: u32, tile_size: f32, tiles: u32) -> (u32, u32, f32) {
        let f = pos as f32 / tile_size - 0.5;
        let t1 = f.floor();
        let weight = f - t1;
        let t1 = t1 as i64;
        let last = tiles as i64 - 1;
        ((t1.max(0).min(last)) as u32, ((t1 + 1).max(0).min(last)) as u32, weight)
    }

    fn map(&self, x: u32, y: u32, v: u8) -> u8 {
        let (tx1, tx2, xa) = Self::neighbours(x, self.tile_width, self.tiles_x);
        let (ty1, ty2, ya) = Self::neighbours(y, self.tile_height, self.tiles_y);
        let v = v as usize;
        let top = self.lut(tx1, ty1)[v] as f32 * (1.0 - xa) + self.lut(tx2, ty1)[v] as f32 * xa;
        let bottom = self.lut(tx1, ty2)[v] as f32 * (1.0 - xa) + self.lut(tx2, ty2)[v] as f32 * xa;
        (top * (1.0 - ya) + bottom * ya).round().max(0.0).min(255.0) as u8
    }
}

// clip bins at the limit and spread the excess evenly
fn clip_histogram(hist: &mut [u32; 256], clip_limit: f32, area: u32) {
    if clip_limit <= 0.0 {
        return;
    }
    let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
    let mut clipped = 0u32;
    hist.iter_mut().for_each(|v| {
        if *v > limit {
            clipped += *v - limit;
            *v = limit;
        }
    });

    let batch = clipped / 256;
    let residual = clipped - batch * 256;
    hist.iter_mut().for_each(|v| *v += batch);
    if residual != 0 {
        let step = (256 / residual).max(1) as usize;
        hist.iter_mut().step_by(step).take(residual as usize).for_each(|v| *v += 1);
    }
}

/// Contrast limited adaptive histogram equalization over a `grid`×`grid`
/// tiling, with bilinear blending between tile mappings.
pub fn clahe(img: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let luts = TileLuts::build(img, clip_limit, grid.max(1));
    ImageBuffer::from_fn(width, height, |x, y| {
        Luma([luts.map(x, y, img.get_pixel(x, y).0[0])])
    })
}

/// Edge preserving smoothing over a `diameter` wide window.
///
/// Neighbours are weighted by spatial distance and by intensity difference,
/// so flat plate surface is smoothed while glyph edges stay sharp.
pub fn bilateral_filter(img: &GrayImage, diameter: u32, sigma_color: f32, sigma_space: f32) -> GrayImage {
    filter::bilateral_filter(img, diameter, sigma_color, sigma_space)
}

/// 1-D gaussian of `size` taps, normalized to sum to one.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) | 1;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f32;
    let kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let total: f32 = kernel.iter().sum();
    kernel.into_iter().map(|v| v / total).collect()
}

/// Binarize against a gaussian weighted local mean.
///
/// A pixel turns white when it is brighter than the mean of its
/// `block_size`×`block_size` neighbourhood minus `offset`.
pub fn adaptive_threshold_gaussian(img: &GrayImage, block_size: u32, offset: f32) -> GrayImage {
    let kernel = gaussian_kernel(block_size);
    // mean stays 8-bit
    let local_mean: GrayImage = filter::separable_filter_equal(img, &kernel);
    let offset = offset.ceil();
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        let mean = local_mean.get_pixel(x, y).0[0] as f32;
        let v = img.get_pixel(x, y).0[0] as f32;
        if v - mean > -offset { Luma([255u8]) } else { Luma([0u8]) }
    })
}
