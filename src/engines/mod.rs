//! OCR backend implementations
//!
//! This module contains implementations of the OcrBackend trait. The
//! executable-driven backend is always available; the in-process Tesseract
//! backend is compiled in with the `engine-tesseract` feature.

pub mod tesseract_cli;
pub mod tsv;

#[cfg(feature = "engine-tesseract")]
pub mod tesseract;

use crate::config::EngineConfig;
use crate::engine::OcrBackend;
use crate::error::PlateError;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available backend
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Registry of available OCR backends
pub struct BackendRegistry {
    engines: Vec<Arc<dyn OcrBackend>>,
}

impl BackendRegistry {
    /// Create a registry with all compiled-in backends initialized
    pub fn new(config: &EngineConfig) -> Result<Self, PlateError> {
        let mut engines: Vec<Arc<dyn OcrBackend>> = Vec::new();

        tracing::info!("Initializing tesseract-cli engine...");
        engines.push(Arc::new(tesseract_cli::TesseractCliEngine::new(config)));

        #[cfg(feature = "engine-tesseract")]
        {
            // Only pay the tessdata download when this backend is wanted
            if config.backend == "tesseract" {
                tracing::info!("Initializing tesseract engine...");
                engines.push(Arc::new(tesseract::TesseractEngine::new(config)?));
            }
        }

        Ok(Self { engines })
    }

    /// Create a registry from already-built backends
    pub fn with_engines(engines: Vec<Arc<dyn OcrBackend>>) -> Self {
        Self { engines }
    }

    /// Get a backend by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrBackend>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Resolve the backend named by the configuration
    pub fn select(&self, name: &str) -> Result<Arc<dyn OcrBackend>, PlateError> {
        self.get(name).ok_or_else(|| {
            PlateError::Initialization(format!(
                "Unknown OCR engine '{}'. Available: {}",
                name,
                self.list().join(", ")
            ))
        })
    }

    /// List all available backend names
    pub fn list(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    /// Get info about all available backends
    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
            })
            .collect()
    }
}
