use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlateError {
    #[error("Failed to initialize OCR backend: {0}")]
    Initialization(String),

    #[error("Could not read image")]
    Decode,

    #[error("Preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid file type '{0}'. Allowed types: PNG, JPG, JPEG, GIF, BMP")]
    UnsupportedExtension(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("No file provided")]
    MissingFile,

    #[error("{0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl IntoResponse for PlateError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            PlateError::Initialization(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INIT_ERROR"),
            PlateError::Decode => (StatusCode::BAD_REQUEST, "DECODE_ERROR"),
            PlateError::Preprocessing(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PREPROCESSING_ERROR")
            }
            PlateError::Ocr(_) => (StatusCode::INTERNAL_SERVER_ERROR, "OCR_ERROR"),
            PlateError::InvalidUpload(_) => (StatusCode::BAD_REQUEST, "INVALID_UPLOAD"),
            PlateError::UnsupportedExtension(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_TYPE"),
            PlateError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            PlateError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            PlateError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            PlateError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            success: false,
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
