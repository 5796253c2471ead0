use serde::{Deserialize, Serialize};

use crate::config::ApiConfig;
use crate::photo::PhotoFile;
use crate::record::{FormMode, IncidentRecord};
use crate::AppError;

/// Where the form sits in the submit / confirm-update cycle.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum SubmissionGate {
    #[default]
    Idle,
    /// Confirmation dialog open. `snapshot` is what gets sent on confirm;
    /// later edits only touch the live record.
    PendingConfirmation { snapshot: Box<IncidentRecord> },
    Submitting,
}

impl SubmissionGate {
    pub fn is_dialog_open(&self) -> bool {
        matches!(self, Self::PendingConfirmation { .. })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
pub enum CameraSession {
    #[default]
    Inactive,
    Starting,
    Active {
        stream_id: String,
    },
    /// Start was refused or failed; capture becomes a no-op.
    Unavailable,
}

impl CameraSession {
    pub fn stream_id(&self) -> Option<&str> {
        match self {
            Self::Active { stream_id } => Some(stream_id),
            _ => None,
        }
    }
}

/// What the form lists under "selected photos". Never sent anywhere.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PhotoPreview {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl From<&PhotoFile> for PhotoPreview {
    fn from(file: &PhotoFile) -> Self {
        Self {
            name: file.name.clone(),
            mime_type: file.content_type(),
            size_bytes: file.size_bytes(),
        }
    }
}

#[derive(Default, Debug)]
pub struct Model {
    pub config: ApiConfig,
    /// Bumped on every mount; capability replies carry the value they were
    /// requested under.
    pub session: u64,
    pub mode: FormMode,
    pub record: IncidentRecord,
    pub loading: bool,
    pub gate: SubmissionGate,
    pub photo_previews: Vec<PhotoPreview>,
    pub uploads_in_flight: usize,
    pub camera: CameraSession,
    pub active_error: Option<AppError>,
    pub closed: bool,
}

impl Model {
    /// Fresh form state for a new mount. Configuration survives.
    pub fn reset_for(&mut self, mode: FormMode) {
        *self = Self {
            config: std::mem::take(&mut self.config),
            session: self.session.wrapping_add(1),
            loading: mode.is_edit(),
            mode,
            ..Self::default()
        };
    }

    /// Whether user edits and submissions are accepted right now.
    pub fn is_editable(&self) -> bool {
        !self.loading && !self.closed
    }

    /// Whether a reply requested under `session` still belongs to this form.
    pub fn accepts_reply(&self, session: u64) -> bool {
        !self.closed && session == self.session
    }

    pub fn set_error(&mut self, error: AppError) {
        self.active_error = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.active_error = None;
    }
}
