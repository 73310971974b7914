//! Tesseract executable backend
//!
//! Runs the configured `tesseract` binary once per profile and reads its TSV
//! output. Needs no native build dependencies; the executable location is
//! part of the engine configuration.

use crate::config::EngineConfig;
use crate::engine::{OcrBackend, OcrProfile, OcrToken};
use crate::engines::tsv;
use crate::error::PlateError;
use image::GrayImage;
use std::process::Command;

pub struct TesseractCliEngine {
    command: String,
    language: String,
    tessdata_path: Option<String>,
}

impl TesseractCliEngine {
    pub fn new(config: &EngineConfig) -> Self {
        let engine = Self {
            command: config.tesseract_cmd.clone(),
            language: config.language.clone(),
            tessdata_path: config.tessdata_path.clone(),
        };

        // The executable may be installed after startup, so a missing binary
        // is only reported here and surfaces again per recognition call.
        match Command::new(&engine.command).arg("--version").output() {
            Ok(output) if output.status.success() => {
                tracing::info!(
                    "tesseract-cli engine initialized (command: {}, language: {})",
                    engine.command,
                    engine.language
                );
            }
            Ok(output) => tracing::warn!(
                "'{} --version' exited with {}",
                engine.command,
                output.status
            ),
            Err(e) => tracing::warn!("tesseract executable '{}' not usable: {}", engine.command, e),
        }

        engine
    }

    fn build_command(&self, input: &std::path::Path, profile: &OcrProfile) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg(input)
            .arg("stdout")
            .args(["-l", &self.language])
            .args(["--psm", profile.page_seg_mode.as_str()])
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", profile.whitelist));
        if let Some(dir) = &self.tessdata_path {
            cmd.args(["--tessdata-dir", dir]);
        }
        cmd.arg("tsv");
        cmd
    }
}

impl OcrBackend for TesseractCliEngine {
    fn name(&self) -> &'static str {
        "tesseract-cli"
    }

    fn description(&self) -> &'static str {
        "Tesseract executable driven per profile, TSV output"
    }

    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Vec<OcrToken>, PlateError> {
        let temp_file = tempfile::Builder::new()
            .prefix("plate-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| PlateError::Ocr(format!("Failed to create temp file: {}", e)))?;

        image
            .save_with_format(temp_file.path(), image::ImageFormat::Png)
            .map_err(|e| PlateError::Ocr(format!("Failed to write region image: {}", e)))?;

        let output = self
            .build_command(temp_file.path(), profile)
            .output()
            .map_err(|e| PlateError::Ocr(format!("Failed to run '{}': {}", self.command, e)))?;

        if !output.status.success() {
            return Err(PlateError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let tokens = tsv::parse_tokens(&String::from_utf8_lossy(&output.stdout));
        tracing::debug!(
            profile = profile.name,
            tokens = tokens.len(),
            "tesseract-cli recognition finished"
        );
        Ok(tokens)
    }
}
