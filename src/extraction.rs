//! Multi-profile OCR over a single plate region
//!
//! Every configured profile is run against the region and scored by the
//! mean confidence of its tokens. The highest score wins; on equal scores the
//! profile evaluated first is kept.

use crate::config::ExtractionParams;
use crate::engine::{OcrBackend, OcrProfile, OcrToken};
use image::GrayImage;
use serde::Serialize;
use std::sync::Arc;

/// Best text found in one region with its mean confidence (0-100)
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Extraction {
    pub text: String,
    pub confidence: f32,
}

/// Score of one profile run
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileScore {
    pub profile: &'static str,
    pub extraction: Extraction,
}

pub struct TextExtractor {
    backend: Arc<dyn OcrBackend>,
    params: ExtractionParams,
}

impl TextExtractor {
    pub fn new(backend: Arc<dyn OcrBackend>, params: ExtractionParams) -> Self {
        Self { backend, params }
    }

    pub fn profiles(&self) -> &[OcrProfile] {
        &self.params.profiles
    }

    /// Run every profile in order and keep the best-scoring text.
    /// Returns an empty extraction with confidence 0 when nothing scored.
    pub fn extract(&self, region: &GrayImage) -> Extraction {
        let scores = self
            .params
            .profiles
            .iter()
            .filter_map(|profile| self.run_profile(region, profile));
        select_best(scores)
    }

    fn run_profile(&self, region: &GrayImage, profile: &OcrProfile) -> Option<ProfileScore> {
        let tokens = match self.backend.recognize(region, profile) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(profile = profile.name, error = %e, "OCR profile failed, skipping");
                return None;
            }
        };

        let extraction = score_tokens(&tokens, self.params.min_token_confidence)?;
        tracing::debug!(
            profile = profile.name,
            confidence = extraction.confidence,
            text = %extraction.text,
            "Profile scored"
        );
        Some(ProfileScore {
            profile: profile.name,
            extraction,
        })
    }
}

/// Mean confidence over tokens that carry a confidence signal, and the
/// space-joined text of tokens above `min_token_confidence`.
/// `None` when no token has a positive confidence.
pub fn score_tokens(tokens: &[OcrToken], min_token_confidence: f32) -> Option<Extraction> {
    let confident: Vec<f32> = tokens
        .iter()
        .map(|t| t.confidence)
        .filter(|c| *c > 0.0)
        .collect();
    if confident.is_empty() {
        return None;
    }
    let mean = confident.iter().sum::<f32>() / confident.len() as f32;

    let text = tokens
        .iter()
        .filter(|t| t.confidence > min_token_confidence)
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    Some(Extraction {
        text,
        confidence: mean,
    })
}

/// Highest confidence wins; a later score must be strictly greater to
/// replace an earlier one. Scores of 0 never win.
pub fn select_best(scores: impl IntoIterator<Item = ProfileScore>) -> Extraction {
    scores
        .into_iter()
        .fold(Extraction::default(), |best, score| {
            if score.extraction.confidence > best.confidence {
                score.extraction
            } else {
                best
            }
        })
}
