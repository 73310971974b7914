use crate::error::PlateError;
use image::{DynamicImage, GrayImage};

/// Convert image to single-channel grayscale
/// Every later stage works on luminance only
pub fn apply(image: &DynamicImage) -> Result<GrayImage, PlateError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PlateError::Preprocessing(format!(
            "Empty image ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image.to_luma8())
}
