use crate::error::PlateError;
use image::{GrayImage, Luma};

/// Adaptive thresholding against a Gaussian-weighted local mean
///
/// A pixel becomes white when it is brighter than its weighted neighbourhood
/// mean minus `offset`, black otherwise. Works under uneven illumination
/// where a single global cutoff would not.
pub fn apply(gray: &GrayImage, block_size: u32, offset: f32) -> Result<GrayImage, PlateError> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(PlateError::Preprocessing(format!(
            "Adaptive threshold block size must be odd and >= 3, got {}",
            block_size
        )));
    }

    let kernel = gaussian_kernel(block_size);
    let mean = separable_blur(gray, &kernel);
    let (width, height) = gray.dimensions();
    let offset = offset.ceil();

    let binary = GrayImage::from_fn(width, height, |x, y| {
        let pixel = gray.get_pixel(x, y).0[0] as f32;
        let local_mean = mean[(y * width + x) as usize].round();
        if pixel > local_mean - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });

    Ok(binary)
}

/// Normalized Gaussian kernel of `size` taps; sigma follows the usual
/// derivation from the aperture size
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as i32;
    let weights: Vec<f32> = (-half..=half)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Horizontal then vertical convolution with replicated borders
fn separable_blur(gray: &GrayImage, kernel: &[f32]) -> Vec<f32> {
    let (width, height) = (gray.width() as i32, gray.height() as i32);
    let half = (kernel.len() / 2) as i32;

    let mut horizontal = vec![0.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sx = (x + k as i32 - half).clamp(0, width - 1);
                acc += w * gray.get_pixel(sx as u32, y as u32).0[0] as f32;
            }
            horizontal[(y * width + x) as usize] = acc;
        }
    }

    let mut blurred = vec![0.0f32; (width * height) as usize];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, w) in kernel.iter().enumerate() {
                let sy = (y + k as i32 - half).clamp(0, height - 1);
                acc += w * horizontal[(sy * width + x) as usize];
            }
            blurred[(y * width + x) as usize] = acc;
        }
    }

    blurred
}
