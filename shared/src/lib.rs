#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod app;
pub mod capabilities;
pub mod config;
pub mod event;
pub mod model;
pub mod photo;
pub mod record;
pub mod view;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::{ApiConfig, ConfigError};
pub use crux_core::App as CruxApp;
pub use event::Event;
pub use model::{CameraSession, Model, PhotoPreview, SubmissionGate};
pub use photo::{PhotoError, PhotoFile};
pub use record::{FieldError, FormMode, IncidentField, IncidentId, IncidentRecord};
pub use view::{DialogView, FieldView, UserFacingError, ViewModel, ViewState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    FetchFailure,
    UploadFailure,
    CameraAccessFailure,
    SubmissionFailure,
    Validation,
    InvalidState,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::FetchFailure => "FETCH_FAILED",
            Self::UploadFailure => "UPLOAD_FAILED",
            Self::CameraAccessFailure => "CAMERA_ACCESS_FAILED",
            Self::SubmissionFailure => "SUBMISSION_FAILED",
            Self::Validation => "VALIDATION_ERROR",
            Self::InvalidState => "INVALID_STATE",
        }
    }

    /// Whether repeating the same user action can reasonably succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::FetchFailure | Self::UploadFailure | Self::SubmissionFailure
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }

    #[must_use]
    pub fn user_facing_message(&self) -> String {
        match self.kind {
            ErrorKind::FetchFailure => {
                "Unable to load the incident. Please check your connection and try again.".into()
            }
            ErrorKind::UploadFailure => {
                "Photo upload failed. Please try selecting the photos again.".into()
            }
            ErrorKind::CameraAccessFailure => {
                "Camera access is unavailable. You can still attach photos from your device."
                    .into()
            }
            ErrorKind::SubmissionFailure => {
                "The incident could not be saved. Please try again.".into()
            }
            ErrorKind::Validation => self.message.clone(),
            ErrorKind::InvalidState => {
                "The form is in an unexpected state. Please close it and try again.".into()
            }
        }
    }

    /// Builds an error for a non-200 backend reply, preferring the server's
    /// own `message` when the body carries one.
    #[must_use]
    pub fn from_http_status(kind: ErrorKind, status: u16, body: Option<&[u8]>) -> Self {
        let message = body
            .and_then(|b| serde_json::from_slice::<ApiErrorResponse>(b).ok())
            .map(|e| e.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("HTTP error: {status}"));

        Self::new(kind, message).with_context("http_status", status.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)
    }
}

impl std::error::Error for AppError {}

#[derive(Debug, Clone, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    message: String,
}

pub type AppResult<T> = Result<T, AppError>;

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        AppError::new(ErrorKind::Validation, e.to_string())
    }
}

impl From<PhotoError> for AppError {
    fn from(e: PhotoError) -> Self {
        let kind = match &e {
            PhotoError::ZeroSizedFrame { .. }
            | PhotoError::FrameSizeMismatch { .. }
            | PhotoError::Encode(_) => ErrorKind::CameraAccessFailure,
            PhotoError::EmptyFile { .. } | PhotoError::NothingToUpload => ErrorKind::UploadFailure,
        };
        AppError::new(kind, e.to_string())
    }
}
