//! Detection log entries handed to the history store

use crate::detector::DetectionResult;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome column of the detection log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetectionStatus {
    Detected,
    Failed,
}

impl DetectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detected => "Detected",
            Self::Failed => "Failed",
        }
    }
}

/// One row for the detection history: every call is logged, including
/// errors and empty results
#[derive(Debug, Clone, Serialize)]
pub struct DetectionRecord {
    pub plate: String,
    pub confidence: f32,
    pub image_reference: String,
    pub timestamp: DateTime<Utc>,
    pub status: DetectionStatus,
}

impl DetectionRecord {
    pub fn from_result(result: &DetectionResult, image_reference: impl Into<String>) -> Self {
        Self::at(result, image_reference, Utc::now())
    }

    pub fn at(
        result: &DetectionResult,
        image_reference: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let status = if result.is_detected() {
            DetectionStatus::Detected
        } else {
            DetectionStatus::Failed
        };

        Self {
            plate: result.number_plate.clone(),
            confidence: result.confidence,
            image_reference: image_reference.into(),
            timestamp,
            status,
        }
    }
}
