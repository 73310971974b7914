use crate::error::PlateError;
use image::GrayImage;
use serde::Serialize;

/// Characters a registration plate may contain
pub const PLATE_WHITELIST: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A single recognized token with the engine's confidence (0-100).
/// Values `<= 0` carry no confidence signal.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrToken {
    pub text: String,
    pub confidence: f32,
}

impl OcrToken {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Tesseract page segmentation modes used for plate reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageSegMode {
    /// Treat the image as a single text line
    SingleLine = 7,
    /// Treat the image as a single word
    SingleWord = 8,
    /// Find as much text as possible in no particular order
    SparseText = 11,
    /// Single text line, bypassing Tesseract-specific hacks
    RawLine = 13,
}

impl PageSegMode {
    /// Numeric value passed as `--psm` / `tessedit_pageseg_mode`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SingleLine => "7",
            Self::SingleWord => "8",
            Self::SparseText => "11",
            Self::RawLine => "13",
        }
    }
}

/// One OCR configuration evaluated per region
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OcrProfile {
    pub name: &'static str,
    pub page_seg_mode: PageSegMode,
    pub whitelist: &'static str,
}

impl OcrProfile {
    pub const fn new(name: &'static str, page_seg_mode: PageSegMode) -> Self {
        Self {
            name,
            page_seg_mode,
            whitelist: PLATE_WHITELIST,
        }
    }

    /// Ordered profile list evaluated for every region
    pub fn defaults() -> Vec<OcrProfile> {
        vec![
            Self::new("single_word", PageSegMode::SingleWord),
            Self::new("single_line", PageSegMode::SingleLine),
            Self::new("raw_line", PageSegMode::RawLine),
            Self::new("sparse_text", PageSegMode::SparseText),
        ]
    }
}

/// Capability every OCR backend must provide.
///
/// Backends are shared across concurrent detections, so `recognize` must not
/// rely on per-call mutable state held in `self`.
pub trait OcrBackend: Send + Sync {
    /// Returns the backend identifier (e.g., "tesseract-cli")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the backend
    fn description(&self) -> &'static str;

    /// Recognize tokens in a grayscale region under one profile
    fn recognize(&self, image: &GrayImage, profile: &OcrProfile)
        -> Result<Vec<OcrToken>, PlateError>;
}
