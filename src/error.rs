use reqwest::StatusCode;
use thiserror::Error;

/// Message shown to the user whenever a submission fails, whatever the cause.
pub const GENERATE_FAILED: &str = "Error generating thumbnails!";
pub const MISSING_PHOTO: &str = "Please upload a photo!";
pub const INVALID_FIELD: &str = "Please check the form fields!";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No photo selected")]
    MissingPhoto,

    #[error("A submission is already in progress")]
    Busy,

    #[error("Invalid value for {field}: {value}")]
    InvalidField { field: &'static str, value: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Thumbnail service answered {0}")]
    Status(StatusCode),

    #[error("Malformed response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("Invalid thumbnail reference: {0}")]
    InvalidReference(String),

    #[error("Failed to decode inline image: {0}")]
    InlineDecode(#[from] base64::DecodeError),

    #[error("No thumbnails could be archived")]
    NothingToArchive,

    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Server error: {0}")]
    Server(#[from] warp::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// The generic message a user sees for this failure. Details stay in the log.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::MissingPhoto => MISSING_PHOTO,
            AppError::Busy => "A submission is already in progress!",
            AppError::InvalidField { .. } => INVALID_FIELD,
            AppError::NothingToArchive | AppError::Archive(_) => "Error building archive!",
            _ => GENERATE_FAILED,
        }
    }

    /// Validation failures are raised before any request is sent.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::MissingPhoto | AppError::Busy | AppError::InvalidField { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_share_one_user_message() {
        let status = AppError::Status(StatusCode::BAD_GATEWAY);
        let reference = AppError::InvalidReference("::".into());
        assert_eq!(status.user_message(), GENERATE_FAILED);
        assert_eq!(reference.user_message(), GENERATE_FAILED);
        assert_eq!(AppError::MissingPhoto.user_message(), MISSING_PHOTO);
    }

    #[test]
    fn only_validation_errors_are_rejections() {
        assert!(AppError::MissingPhoto.is_rejection());
        assert!(AppError::Busy.is_rejection());
        assert!(!AppError::NothingToArchive.is_rejection());
    }

    #[test]
    fn bad_field_is_not_reported_as_a_generation_failure() {
        let err = AppError::InvalidField {
            field: "placement",
            value: "top".into(),
        };
        assert!(err.is_rejection());
        assert_eq!(err.user_message(), INVALID_FIELD);
        assert_ne!(err.user_message(), GENERATE_FAILED);
    }
}
