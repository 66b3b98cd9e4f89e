use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::json_utils::JsonResponse;
use crate::upload::UploadedFile;

#[derive(Debug, Error)]
pub enum ToolkitError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("empty string not permitted")]
    EmptySlugInput,

    #[error("slugified string is empty")]
    EmptySlug,

    #[error("the uploaded file is too big")]
    UploadTooLarge,

    #[error("file type not permitted")]
    FileTypeNotPermitted,

    #[error("no file provided")]
    NoFile,

    #[error("multipart error: {0}")]
    Multipart(#[from] actix_multipart::MultipartError),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),

    #[error("body contains badly formed JSON at character {offset}")]
    BadlyFormedJson { offset: usize },

    #[error("body contains incorrect JSON type for field {field:?}")]
    IncorrectJsonType { field: String },

    #[error("body contains incorrect JSON type at character {offset}")]
    IncorrectJsonTypeAt { offset: usize },

    #[error("body contains badly formed JSON (unexpected EOF marker)")]
    TruncatedJson,

    #[error("body must not be empty")]
    EmptyBody,

    #[error("body contains unknown field {field:?}")]
    UnknownField { field: String },

    #[error("body must not be larger than {limit} bytes")]
    BodyTooLarge { limit: u64 },

    #[error("body must only contain a single JSON payload")]
    MultipleJsonValues,

    /// Decode failures that fit none of the classified kinds, passed through untouched.
    #[error(transparent)]
    Decode(serde_json::Error),

    #[error(transparent)]
    Payload(#[from] actix_web::error::PayloadError),

    #[error(transparent)]
    Serialize(serde_json::Error),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ResponseError for ToolkitError {
    fn status_code(&self) -> StatusCode {
        match self {
            ToolkitError::UploadTooLarge | ToolkitError::BodyTooLarge { .. } => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ToolkitError::Io(_) | ToolkitError::Blocking(_) | ToolkitError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_REQUEST,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(JsonResponse::error(self.to_string()))
    }
}

/// A failed upload batch. `uploaded` holds every file persisted before `error` stopped the batch.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct UploadFailure {
    pub uploaded: Vec<UploadedFile>,
    #[source]
    pub error: ToolkitError,
}

impl UploadFailure {
    pub fn new(uploaded: Vec<UploadedFile>, error: impl Into<ToolkitError>) -> Self {
        Self { uploaded, error: error.into() }
    }
}

impl From<UploadFailure> for ToolkitError {
    fn from(failure: UploadFailure) -> Self {
        failure.error
    }
}

impl ResponseError for UploadFailure {
    fn status_code(&self) -> StatusCode {
        self.error.status_code()
    }

    fn error_response(&self) -> HttpResponse {
        self.error.error_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ToolkitError::UploadTooLarge.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ToolkitError::BodyTooLarge { limit: 10 }.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ToolkitError::FileTypeNotPermitted.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ToolkitError::Config("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ToolkitError::UnknownField { field: "age".into() }.to_string(),
            "body contains unknown field \"age\""
        );
        assert_eq!(
            ToolkitError::BodyTooLarge { limit: 5 }.to_string(),
            "body must not be larger than 5 bytes"
        );
    }

    #[test]
    fn test_upload_failure_keeps_partial_list() {
        let failure = UploadFailure::new(
            vec![UploadedFile {
                new_file_name: "a.png".into(),
                original_file_name: "a.png".into(),
                file_size: 3,
            }],
            ToolkitError::FileTypeNotPermitted,
        );
        assert_eq!(failure.to_string(), "file type not permitted");
        assert_eq!(failure.uploaded.len(), 1);
        assert_eq!(failure.status_code(), StatusCode::BAD_REQUEST);
    }
}
