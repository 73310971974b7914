use crate::cli::{EngineArgs, ServeArgs};
use crate::engine::OcrProfile;

/// Maximum accepted upload size (16 MiB)
pub const DEFAULT_MAX_FILE_SIZE: usize = 16 * 1024 * 1024;

/// Detection log entries kept before the oldest are dropped
pub const DEFAULT_HISTORY_CAPACITY: usize = 10_000;

/// Upload extensions the server accepts
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp"];

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
    pub history_capacity: usize,
    /// Preload the vehicle registry with demo records
    pub sample_vehicles: bool,
    pub engine: EngineConfig,
    pub pipeline: PipelineConfig,
}

impl From<ServeArgs> for Config {
    fn from(args: ServeArgs) -> Self {
        Self {
            host: args.host,
            port: args.port,
            max_file_size: args.max_file_size,
            history_capacity: args.history_capacity,
            sample_vehicles: args.sample_vehicles,
            engine: args.engine.into(),
            pipeline: PipelineConfig::default(),
        }
    }
}

/// OCR backend selection and location
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backend name as listed by the registry
    pub backend: String,
    /// Path to the tesseract executable
    pub tesseract_cmd: String,
    /// Tessdata directory (falls back to the engine's default lookup)
    pub tessdata_path: Option<String>,
    pub language: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: "tesseract-cli".to_string(),
            tesseract_cmd: "tesseract".to_string(),
            tessdata_path: None,
            language: "eng".to_string(),
        }
    }
}

impl From<EngineArgs> for EngineConfig {
    fn from(args: EngineArgs) -> Self {
        Self {
            backend: args.engine,
            tesseract_cmd: args.tesseract_cmd,
            tessdata_path: args.tessdata_path,
            language: args.language,
        }
    }
}

/// Image preprocessing parameters
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessParams {
    /// Non-local means filter strength (h)
    pub denoise_strength: f32,
    /// Radius of the patch compared by the denoiser (3x3 at radius 1)
    pub denoise_patch_radius: u32,
    /// Radius of the neighbourhood searched for similar patches
    pub denoise_search_radius: u32,
    pub clahe_clip_limit: f32,
    /// Number of CLAHE tiles along each axis
    pub clahe_tile_grid: u32,
    /// Adaptive threshold neighbourhood size, odd
    pub threshold_block_size: u32,
    /// Constant subtracted from the weighted neighbourhood mean
    pub threshold_offset: f32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            denoise_strength: 3.0,
            denoise_patch_radius: 1,
            denoise_search_radius: 3,
            clahe_clip_limit: 2.0,
            clahe_tile_grid: 8,
            threshold_block_size: 11,
            threshold_offset: 2.0,
        }
    }
}

/// Plate region geometry filters
#[derive(Debug, Clone, PartialEq)]
pub struct RegionParams {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Contours with a smaller area are speckle
    pub min_area: f64,
    /// Contours covering more than this share of the frame are rejected
    pub max_area_fraction: f64,
    /// Polygon approximation tolerance as a fraction of the perimeter
    pub approx_epsilon_fraction: f64,
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    /// Bounding box width must be strictly greater
    pub min_width: u32,
    /// Bounding box height must be strictly greater
    pub min_height: u32,
}

impl Default for RegionParams {
    fn default() -> Self {
        Self {
            canny_low: 50.0,
            canny_high: 150.0,
            min_area: 1000.0,
            max_area_fraction: 0.3,
            approx_epsilon_fraction: 0.02,
            min_aspect_ratio: 2.0,
            max_aspect_ratio: 5.0,
            min_width: 100,
            min_height: 30,
        }
    }
}

/// OCR profile search parameters
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionParams {
    pub profiles: Vec<OcrProfile>,
    /// Tokens at or below this confidence are left out of the text
    pub min_token_confidence: f32,
}

impl Default for ExtractionParams {
    fn default() -> Self {
        Self {
            profiles: OcrProfile::defaults(),
            min_token_confidence: 30.0,
        }
    }
}

/// Plate text length bounds (inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeParams {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self {
            min_len: 6,
            max_len: 12,
        }
    }
}

/// Upscaling applied to narrow regions before OCR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpscaleParams {
    /// Regions narrower than this are upscaled
    pub min_width: u32,
    pub target_width: u32,
}

impl Default for UpscaleParams {
    fn default() -> Self {
        Self {
            min_width: 200,
            target_width: 300,
        }
    }
}

/// Read-only configuration shared by every detection
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub preprocess: PreprocessParams,
    pub regions: RegionParams,
    pub extraction: ExtractionParams,
    pub normalize: NormalizeParams,
    pub upscale: UpscaleParams,
}
