//! Number plate recognition
//!
//! A still image goes through preprocessing, plate region detection, multi
//! profile OCR and text cleanup, and comes out as a single
//! [`DetectionResult`]. The HTTP server and CLI in this crate are thin
//! wrappers around [`PlateDetector`].

pub mod cli;
pub mod config;
pub mod detector;
pub mod engine;
pub mod engines;
pub mod error;
pub mod extraction;
pub mod history;
pub mod normalize;
pub mod preprocessing;
pub mod record;
pub mod region;
pub mod server;
pub mod vehicles;

pub use config::PipelineConfig;
pub use detector::{DetectionResult, PlateDetector, ERROR_PREFIX, NO_PLATE};
pub use engine::{OcrBackend, OcrProfile, OcrToken, PageSegMode};
pub use error::PlateError;
pub use normalize::clean_plate_text;
pub use region::{Region, RegionDetector};
pub use vehicles::{Vehicle, VehicleRegistry};
