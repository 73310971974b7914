//! End-to-end plate detection
//!
//! Drives preprocessing, region detection (with a fallback pass on the
//! enhanced image), per-region OCR and text cleanup, and reduces everything to
//! a single [`DetectionResult`]. Failures never escape: they come back as
//! results whose plate string starts with [`ERROR_PREFIX`].

use crate::config::{NormalizeParams, PipelineConfig, UpscaleParams};
use crate::engine::OcrBackend;
use crate::error::PlateError;
use crate::extraction::TextExtractor;
use crate::normalize;
use crate::preprocessing::steps::resize;
use crate::preprocessing::{PreprocessedImages, Preprocessor};
use crate::region::{Region, RegionDetector};
use image::{DynamicImage, ImageReader};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Plate string returned when no candidate survives
pub const NO_PLATE: &str = "No plate detected";

/// Prefix marking an in-band error result
pub const ERROR_PREFIX: &str = "Error:";

/// Outcome of one detection call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    pub number_plate: String,
    /// 0.0 to 1.0
    pub confidence: f32,
    pub bounding_box: Option<Region>,
}

impl DetectionResult {
    pub fn plate(text: String, confidence: f32, region: Region) -> Self {
        Self {
            number_plate: text,
            confidence,
            bounding_box: Some(region),
        }
    }

    pub fn no_plate() -> Self {
        Self {
            number_plate: NO_PLATE.to_string(),
            confidence: 0.0,
            bounding_box: None,
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            number_plate: format!("{} {}", ERROR_PREFIX, message),
            confidence: 0.0,
            bounding_box: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.number_plate.starts_with(ERROR_PREFIX)
    }

    /// True when `number_plate` holds a validated plate string
    pub fn is_detected(&self) -> bool {
        !self.is_error() && self.number_plate != NO_PLATE && !self.number_plate.is_empty()
    }
}

/// Best candidate seen while scanning regions
struct Candidate {
    text: String,
    confidence: f32,
    region: Region,
}

/// The full recognition pipeline.
///
/// Holds only read-only configuration and a shared OCR backend, so one
/// instance can serve concurrent calls.
pub struct PlateDetector {
    preprocessor: Preprocessor,
    regions: RegionDetector,
    extractor: TextExtractor,
    normalize: NormalizeParams,
    upscale: UpscaleParams,
}

impl PlateDetector {
    pub fn new(backend: Arc<dyn OcrBackend>, config: PipelineConfig) -> Self {
        Self {
            preprocessor: Preprocessor::new(config.preprocess),
            regions: RegionDetector::new(config.regions),
            extractor: TextExtractor::new(backend, config.extraction),
            normalize: config.normalize,
            upscale: config.upscale,
        }
    }

    pub fn extractor(&self) -> &TextExtractor {
        &self.extractor
    }

    /// Decode the image at `path` and detect its plate
    pub fn detect_path(&self, path: &Path) -> DetectionResult {
        match decode_path(path) {
            Ok(image) => self.detect_image(&image),
            Err(e) => DetectionResult::error(e),
        }
    }

    /// Decode an in-memory image and detect its plate
    pub fn detect_bytes(&self, bytes: &[u8]) -> DetectionResult {
        match image::load_from_memory(bytes) {
            Ok(image) => self.detect_image(&image),
            Err(e) => {
                tracing::warn!(error = %e, bytes = bytes.len(), "Failed to decode upload");
                DetectionResult::error(PlateError::Decode)
            }
        }
    }

    /// Detect the plate in a decoded image
    pub fn detect_image(&self, image: &DynamicImage) -> DetectionResult {
        let start = Instant::now();

        let result = match catch_unwind(AssertUnwindSafe(|| self.run(image))) {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                tracing::error!("Detection failed: {}", e);
                DetectionResult::error(e)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::error!("Detection panicked: {}", message);
                DetectionResult::error(message)
            }
        };

        tracing::info!(
            plate = %result.number_plate,
            confidence = result.confidence,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Detection finished"
        );
        result
    }

    fn run(&self, image: &DynamicImage) -> Result<DetectionResult, PlateError> {
        let images = self.preprocessor.process(image)?;
        let regions = self.candidate_regions(&images);

        let mut best: Option<Candidate> = None;
        for region in regions {
            if !region.fits_within(images.enhanced.width(), images.enhanced.height()) {
                return Err(PlateError::Internal(format!(
                    "Region {:?} outside {}x{} image",
                    region,
                    images.enhanced.width(),
                    images.enhanced.height()
                )));
            }

            let crop = resize::upscale_region(region.crop(&images.enhanced), self.upscale);
            let extraction = self.extractor.extract(&crop);
            let cleaned = normalize::clean_with(&extraction.text, self.normalize);

            tracing::debug!(
                ?region,
                raw = %extraction.text,
                cleaned = %cleaned,
                confidence = extraction.confidence,
                "Region read"
            );

            let best_confidence = best.as_ref().map_or(0.0, |c| c.confidence);
            if !cleaned.is_empty() && extraction.confidence > best_confidence {
                best = Some(Candidate {
                    text: cleaned,
                    confidence: extraction.confidence,
                    region,
                });
            }
        }

        Ok(match best {
            Some(c) => DetectionResult::plate(c.text, c.confidence / 100.0, c.region),
            None => DetectionResult::no_plate(),
        })
    }

    /// Regions from the binary image, or from the enhanced image when the
    /// binary pass finds nothing
    fn candidate_regions(&self, images: &PreprocessedImages) -> Vec<Region> {
        let regions = self.regions.detect(&images.binary);
        if !regions.is_empty() {
            return regions;
        }
        tracing::debug!("No regions in binary image, retrying on enhanced image");
        self.regions.detect(&images.enhanced)
    }
}

fn decode_path(path: &Path) -> Result<DynamicImage, PlateError> {
    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| {
            tracing::warn!(error = %e, path = ?path, "Failed to open image");
            PlateError::Decode
        })?;

    reader.decode().map_err(|e| {
        tracing::warn!(error = %e, path = ?path, "Failed to decode image");
        PlateError::Decode
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{OcrProfile, OcrToken};
    use image::{GrayImage, Luma};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use std::io::Write;

    struct NullBackend;

    impl OcrBackend for NullBackend {
        fn name(&self) -> &'static str {
            "null"
        }

        fn description(&self) -> &'static str {
            "reads nothing"
        }

        fn recognize(&self, _: &GrayImage, _: &OcrProfile) -> Result<Vec<OcrToken>, PlateError> {
            Ok(Vec::new())
        }
    }

    fn detector() -> PlateDetector {
        PlateDetector::new(Arc::new(NullBackend), PipelineConfig::default())
    }

    fn with_rectangle(x: i32, y: i32, w: u32, h: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(400, 300, Luma([0]));
        draw_filled_rect_mut(&mut img, Rect::at(x, y).of_size(w, h), Luma([255]));
        img
    }

    fn images(binary: GrayImage, enhanced: GrayImage) -> PreprocessedImages {
        PreprocessedImages {
            gray: enhanced.clone(),
            binary,
            enhanced,
            total_time_ms: 0,
            steps: Vec::new(),
        }
    }

    fn near(region: &Region, x: u32, y: u32) -> bool {
        region.x.abs_diff(x) <= 3 && region.y.abs_diff(y) <= 3
    }

    #[test]
    fn test_enhanced_image_is_scanned_when_binary_has_no_regions() {
        let blank = GrayImage::from_pixel(400, 300, Luma([255]));
        let regions = detector().candidate_regions(&images(blank, with_rectangle(100, 120, 200, 60)));

        assert!(!regions.is_empty());
        assert!(near(&regions[0], 100, 120), "got {:?}", regions[0]);
        assert!((regions[0].width as i32 - 200).abs() <= 6);
        assert!((regions[0].height as i32 - 60).abs() <= 6);
    }

    #[test]
    fn test_binary_regions_win_over_enhanced() {
        let binary = with_rectangle(20, 20, 200, 60);
        let enhanced = with_rectangle(150, 200, 200, 60);

        let regions = detector().candidate_regions(&images(binary, enhanced));

        assert!(!regions.is_empty());
        assert!(regions.iter().all(|r| near(r, 20, 20)), "got {:?}", regions);
    }

    #[test]
    fn test_no_regions_in_either_image() {
        let blank = GrayImage::from_pixel(400, 300, Luma([128]));
        assert!(detector()
            .candidate_regions(&images(blank.clone(), blank))
            .is_empty());
    }

    #[test]
    fn test_decode_path_maps_open_and_format_errors() {
        let missing = decode_path(Path::new("/nonexistent/plate.jpg"));
        assert!(matches!(missing, Err(PlateError::Decode)));

        let mut garbage = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        garbage.write_all(b"not a png").unwrap();
        assert!(matches!(decode_path(garbage.path()), Err(PlateError::Decode)));
    }

    #[test]
    fn test_sentinel_constructors() {
        let none = DetectionResult::no_plate();
        assert_eq!(none.number_plate, "No plate detected");
        assert!(!none.is_error());
        assert!(!none.is_detected());

        let err = DetectionResult::error(PlateError::Decode);
        assert_eq!(err.number_plate, "Error: Could not read image");
        assert!(err.is_error());
        assert_eq!(err.confidence, 0.0);
        assert!(err.bounding_box.is_none());

        let found = DetectionResult::plate("KA05MN1234".into(), 0.9, Region::new(1, 2, 3, 4));
        assert!(found.is_detected());
    }

    #[test]
    fn test_result_serializes_null_bounding_box() {
        let json = serde_json::to_value(DetectionResult::no_plate()).unwrap();
        assert_eq!(json["number_plate"], "No plate detected");
        assert!(json["bounding_box"].is_null());
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
