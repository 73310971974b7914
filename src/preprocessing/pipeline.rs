use crate::config::PreprocessParams;
use crate::error::PlateError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::time::Instant;

use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
}

/// Derived buffers produced from one source image.
///
/// Each variant is an independent buffer; later stages read whichever one
/// they need without affecting the others.
#[derive(Debug, Clone)]
pub struct PreprocessedImages {
    /// Adaptive-threshold output, input to the first region pass
    pub binary: GrayImage,
    /// Denoised and CLAHE-equalized image, used for the fallback region pass
    /// and for cropping plates
    pub enhanced: GrayImage,
    pub gray: GrayImage,
    pub total_time_ms: u64,
    pub steps: Vec<StepTiming>,
}

/// Fixed preprocessing chain: grayscale, denoise, CLAHE, adaptive threshold
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    params: PreprocessParams,
}

impl Preprocessor {
    pub fn new(params: PreprocessParams) -> Self {
        Self { params }
    }

    /// Run every step on `image`; the input is left untouched
    pub fn process(&self, image: &DynamicImage) -> Result<PreprocessedImages, PlateError> {
        let start = Instant::now();
        let mut timings = Vec::new();
        let p = &self.params;

        let gray = run_step("grayscale", &mut timings, || steps::grayscale::apply(image))?;

        let denoised = run_step("denoise", &mut timings, || {
            steps::denoise::apply(
                &gray,
                p.denoise_strength,
                p.denoise_patch_radius,
                p.denoise_search_radius,
            )
        })?;

        let enhanced = run_step("clahe", &mut timings, || {
            steps::clahe::apply(&denoised, p.clahe_clip_limit, p.clahe_tile_grid)
        })?;

        let binary = run_step("threshold", &mut timings, || {
            steps::threshold::apply(&enhanced, p.threshold_block_size, p.threshold_offset)
        })?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            width = gray.width(),
            height = gray.height(),
            total_time_ms,
            steps = ?timings,
            "Preprocessing complete"
        );

        Ok(PreprocessedImages {
            binary,
            enhanced,
            gray,
            total_time_ms,
            steps: timings,
        })
    }
}

fn run_step<F>(name: &str, timings: &mut Vec<StepTiming>, step_fn: F) -> Result<GrayImage, PlateError>
where
    F: FnOnce() -> Result<GrayImage, PlateError>,
{
    let step_start = Instant::now();
    let result = step_fn()?;
    timings.push(StepTiming {
        name: name.to_string(),
        time_ms: step_start.elapsed().as_millis() as u64,
    });
    Ok(result)
}
