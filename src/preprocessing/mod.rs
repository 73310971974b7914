//! Image preprocessing for plate detection
//!
//! Produces the grayscale, contrast-enhanced and binarized variants consumed
//! by region detection and text extraction.

pub mod pipeline;
pub mod steps;

pub use pipeline::{PreprocessedImages, Preprocessor, StepTiming};
