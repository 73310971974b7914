use crate::config::UpscaleParams;
use image::{imageops::FilterType, GrayImage};

/// Upscale a narrow plate crop so OCR sees glyphs at a usable size
/// Regions at least `min_width` wide are returned unchanged
pub fn upscale_region(region: GrayImage, params: UpscaleParams) -> GrayImage {
    let (width, height) = region.dimensions();
    if width == 0 || width >= params.min_width {
        return region;
    }

    let scale = params.target_width as f32 / width as f32;
    let new_width = params.target_width;
    let new_height = ((height as f32 * scale).round() as u32).max(1);

    // CatmullRom is the bicubic filter in the image crate
    image::imageops::resize(&region, new_width, new_height, FilterType::CatmullRom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upscales_narrow_region_to_target_width() {
        let img = GrayImage::new(150, 40);
        let result = upscale_region(img, UpscaleParams::default());
        assert_eq!(result.dimensions(), (300, 80));
    }

    #[test]
    fn test_preserves_aspect_ratio() {
        let img = GrayImage::new(120, 30);
        let result = upscale_region(img, UpscaleParams::default());
        assert_eq!(result.width(), 300);
        assert_eq!(result.height(), 75);
    }

    #[test]
    fn test_wide_region_is_untouched() {
        let img = GrayImage::new(200, 60);
        let result = upscale_region(img, UpscaleParams::default());
        assert_eq!(result.dimensions(), (200, 60));
    }
}
