use crate::error::PlateError;
use image::{GrayImage, Luma};

/// Non-local means denoising
///
/// Each output pixel is a weighted mean of the pixels in its search window,
/// where the weight of a candidate falls off with the mean squared difference
/// between the patch around it and the patch around the pixel being
/// restored. Flat noise averages out while edges, whose patches only match
/// other edge patches, stay sharp.
pub fn apply(
    gray: &GrayImage,
    strength: f32,
    patch_radius: u32,
    search_radius: u32,
) -> Result<GrayImage, PlateError> {
    if strength <= 0.0 || search_radius == 0 {
        return Ok(gray.clone());
    }

    let (width, height) = gray.dimensions();
    let pad = (patch_radius + search_radius) as i64;
    let padded = PaddedImage::new(gray, pad);

    let pr = patch_radius as i64;
    let sr = search_radius as i64;
    let patch_len = ((2 * pr + 1) * (2 * pr + 1)) as f32;
    let inv_h2 = 1.0 / (strength * strength);

    let denoised = GrayImage::from_fn(width, height, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut weight_sum = 0.0f32;
        let mut value_sum = 0.0f32;

        for qy in (y - sr)..=(y + sr) {
            for qx in (x - sr)..=(x + sr) {
                let mut dist = 0.0f32;
                for dy in -pr..=pr {
                    for dx in -pr..=pr {
                        let diff = padded.get(x + dx, y + dy) - padded.get(qx + dx, qy + dy);
                        dist += diff * diff;
                    }
                }
                let weight = (-(dist / patch_len) * inv_h2).exp();
                weight_sum += weight;
                value_sum += weight * padded.get(qx, qy);
            }
        }

        // The centre patch always contributes weight 1, so weight_sum >= 1
        Luma([(value_sum / weight_sum).round().clamp(0.0, 255.0) as u8])
    });

    Ok(denoised)
}

/// Float copy of an image with replicated borders
struct PaddedImage {
    data: Vec<f32>,
    stride: i64,
    pad: i64,
}

impl PaddedImage {
    fn new(img: &GrayImage, pad: i64) -> Self {
        let (width, height) = (img.width() as i64, img.height() as i64);
        let stride = width + 2 * pad;
        let rows = height + 2 * pad;
        let mut data = Vec::with_capacity((stride * rows) as usize);

        for py in 0..rows {
            let sy = (py - pad).clamp(0, height - 1) as u32;
            for px in 0..stride {
                let sx = (px - pad).clamp(0, width - 1) as u32;
                data.push(img.get_pixel(sx, sy).0[0] as f32);
            }
        }

        Self { data, stride, pad }
    }

    #[inline]
    fn get(&self, x: i64, y: i64) -> f32 {
        self.data[((y + self.pad) * self.stride + x + self.pad) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denoise_reduces_noise_variance() {
        // Checkerboard-free flat field with a sprinkle of mild noise
        let img = GrayImage::from_fn(24, 24, |x, y| {
            let noise = ((x * 7 + y * 13) % 5) as u8;
            Luma([126 + noise])
        });

        let result = apply(&img, 3.0, 1, 3).unwrap();

        assert!(calculate_variance(&result) < calculate_variance(&img));
    }

    #[test]
    fn test_denoise_keeps_strong_edges() {
        let img = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([20]) } else { Luma([230]) });

        let result = apply(&img, 3.0, 1, 3).unwrap();

        assert_eq!(result.get_pixel(2, 5).0[0], 20);
        assert_eq!(result.get_pixel(17, 5).0[0], 230);
        let edge_diff = result.get_pixel(10, 5).0[0] as i32 - result.get_pixel(9, 5).0[0] as i32;
        assert!(edge_diff > 150, "edge blurred: diff {}", edge_diff);
    }

    #[test]
    fn test_denoise_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(12, 8, Luma([77]));
        let result = apply(&img, 3.0, 1, 3).unwrap();
        assert!(result.pixels().all(|p| p.0[0] == 77));
        assert_eq!(result.dimensions(), (12, 8));
    }

    #[test]
    fn test_zero_strength_is_identity() {
        let img = GrayImage::from_fn(8, 8, |x, y| Luma([(x * 30 + y) as u8]));
        assert_eq!(apply(&img, 0.0, 1, 3).unwrap(), img);
    }

    fn calculate_variance(img: &GrayImage) -> f64 {
        let pixels: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pixels.len() as f64
    }
}
