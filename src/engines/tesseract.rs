//! In-process Tesseract backend
//!
//! Uses the tesseract-static crate for static linking (no system
//! dependencies). Downloads tessdata (training data) on first use unless a
//! tessdata directory is configured.

use crate::config::EngineConfig;
use crate::engine::{OcrBackend, OcrProfile, OcrToken};
use crate::engines::tsv;
use crate::error::PlateError;
use image::GrayImage;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tesseract_static::tesseract::Tesseract;

pub struct TesseractEngine {
    tessdata_path: String,
    language: String,
}

impl TesseractEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, PlateError> {
        let language = config.language.clone();

        let tessdata_path = match &config.tessdata_path {
            Some(path) => path.clone(),
            None => ensure_tessdata_available(&language)?,
        };

        // Validate that tessdata is accessible by doing a test initialization
        let test_tess = Tesseract::new(Some(&tessdata_path), Some(&language)).map_err(|e| {
            PlateError::Initialization(format!("Failed to initialize Tesseract: {}", e))
        })?;
        drop(test_tess);

        tracing::info!(
            "tesseract engine initialized (tessdata: {}, language: {})",
            tessdata_path,
            language
        );

        Ok(Self {
            tessdata_path,
            language,
        })
    }
}

impl OcrBackend for TesseractEngine {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn description(&self) -> &'static str {
        "Statically linked Tesseract, one instance per recognition call"
    }

    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Vec<OcrToken>, PlateError> {
        let (width, height) = image.dimensions();

        // BMP is always supported by leptonica
        let mut bmp_data = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| PlateError::Ocr(format!("Failed to convert to BMP: {}", e)))?;

        // A fresh instance per call keeps concurrent detections independent
        let tess = Tesseract::new(Some(&self.tessdata_path), Some(&self.language))
            .map_err(|e| PlateError::Ocr(format!("Failed to create Tesseract: {}", e)))?;

        let tess = tess
            .set_variable("tessedit_pageseg_mode", profile.page_seg_mode.as_str())
            .map_err(|e| PlateError::Ocr(format!("Failed to set page segmentation mode: {}", e)))?
            .set_variable("tessedit_char_whitelist", profile.whitelist)
            .map_err(|e| PlateError::Ocr(format!("Failed to set whitelist: {}", e)))?;

        let tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            PlateError::Ocr(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        let mut tess = tess
            .recognize()
            .map_err(|e| PlateError::Ocr(format!("Failed to recognize text: {}", e)))?;

        let tsv_text = tess
            .get_tsv_text(0)
            .map_err(|e| PlateError::Ocr(format!("Failed to get TSV output: {}", e)))?;

        Ok(tsv::parse_tokens(&tsv_text))
    }
}

/// Ensure tessdata is available, downloading if needed
fn ensure_tessdata_available(language: &str) -> Result<String, PlateError> {
    let cache_dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("plate-reader")
        .join("tessdata");

    std::fs::create_dir_all(&cache_dir).map_err(|e| {
        PlateError::Initialization(format!("Failed to create tessdata directory: {}", e))
    })?;

    let traineddata_path = cache_dir.join(format!("{}.traineddata", language));

    if !traineddata_path.exists() {
        tracing::info!(
            "Downloading tessdata for '{}' (this may take a moment)...",
            language
        );
        download_file(&tessdata_url(language), &traineddata_path)?;
        tracing::info!("Downloaded tessdata to {:?}", traineddata_path);
    } else {
        tracing::info!("Using cached tessdata from {:?}", cache_dir);
    }

    // Tesseract expects the directory, not the file
    cache_dir
        .to_str()
        .map(|s| s.to_string())
        .ok_or_else(|| PlateError::Initialization("Invalid tessdata path".to_string()))
}

/// tessdata_fast keeps the download small
fn tessdata_url(language: &str) -> String {
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}

fn download_file(url: &str, path: &Path) -> Result<(), PlateError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| PlateError::Initialization(format!("Failed to download tessdata: {}", e)))?;

    let buffer = response.into_body().read_to_vec().map_err(|e| {
        PlateError::Initialization(format!("Failed to read tessdata response: {}", e))
    })?;

    let mut file = File::create(path).map_err(|e| {
        PlateError::Initialization(format!("Failed to create tessdata file: {}", e))
    })?;
    file.write_all(&buffer).map_err(|e| {
        PlateError::Initialization(format!("Failed to write tessdata file: {}", e))
    })?;

    Ok(())
}
