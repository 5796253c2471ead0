use serde::{Deserialize, Serialize};

use crate::capabilities::HttpResult;
#[cfg(feature = "camera")]
use crate::capabilities::CameraResult;
use crate::config::ApiConfig;
use crate::photo::PhotoFile;
use crate::record::IncidentField;

// --- Event enum: shell-facing variants first, capability responses boxed ---

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub enum Event {
    Configure(Box<ApiConfig>),

    // Form lifecycle
    FormOpened {
        incident_id: Option<String>,
    },
    FormClosed,

    // Editing
    FieldChanged {
        field: IncidentField,
        value: String,
    },
    PhotosSelected {
        files: Vec<PhotoFile>,
    },

    #[cfg(feature = "camera")]
    CameraStartRequested,
    #[cfg(feature = "camera")]
    CapturePhotoRequested,

    // Submission gate
    SubmitRequested,
    UpdateRequested,
    UpdateConfirmed,
    UpdateCancelled,

    DismissError,

    // Capability responses, tagged with the form session that sent the
    // request (results boxed to keep enum size small)
    #[serde(skip)]
    IncidentFetched {
        session: u64,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    PhotosUploaded {
        session: u64,
        result: Box<HttpResult>,
    },
    #[serde(skip)]
    IncidentSaved {
        session: u64,
        result: Box<HttpResult>,
    },

    #[cfg(feature = "camera")]
    #[serde(skip)]
    CameraStarted {
        session: u64,
        result: Box<CameraResult>,
    },
    #[cfg(feature = "camera")]
    #[serde(skip)]
    FrameCaptured {
        session: u64,
        result: Box<CameraResult>,
    },
}

impl Event {
    /// Stable name for log fields.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Configure(_) => "configure",
            Self::FormOpened { .. } => "form_opened",
            Self::FormClosed => "form_closed",
            Self::FieldChanged { .. } => "field_changed",
            Self::PhotosSelected { .. } => "photos_selected",
            #[cfg(feature = "camera")]
            Self::CameraStartRequested => "camera_start_requested",
            #[cfg(feature = "camera")]
            Self::CapturePhotoRequested => "capture_photo_requested",
            Self::SubmitRequested => "submit_requested",
            Self::UpdateRequested => "update_requested",
            Self::UpdateConfirmed => "update_confirmed",
            Self::UpdateCancelled => "update_cancelled",
            Self::DismissError => "dismiss_error",
            Self::IncidentFetched { .. } => "incident_fetched",
            Self::PhotosUploaded { .. } => "photos_uploaded",
            Self::IncidentSaved { .. } => "incident_saved",
            #[cfg(feature = "camera")]
            Self::CameraStarted { .. } => "camera_started",
            #[cfg(feature = "camera")]
            Self::FrameCaptured { .. } => "frame_captured",
        }
    }

    pub const fn is_user_initiated(&self) -> bool {
        match self {
            Self::FieldChanged { .. }
            | Self::PhotosSelected { .. }
            | Self::SubmitRequested
            | Self::UpdateRequested
            | Self::UpdateConfirmed
            | Self::UpdateCancelled
            | Self::DismissError => true,
            #[cfg(feature = "camera")]
            Self::CameraStartRequested | Self::CapturePhotoRequested => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::HttpError;

    #[test]
    fn event_size_is_reasonable() {
        let size = std::mem::size_of::<Event>();
        assert!(
            size <= 64,
            "Event enum is {size} bytes, box more variants"
        );
    }

    #[test]
    fn shell_events_deserialize() {
        let event: Event =
            serde_json::from_str(r#"{"FieldChanged":{"field":"truckId","value":"T-9"}}"#).unwrap();
        assert_eq!(
            event,
            Event::FieldChanged {
                field: IncidentField::TruckId,
                value: "T-9".into()
            }
        );

        let event: Event = serde_json::from_str(r#"{"FormOpened":{"incident_id":null}}"#).unwrap();
        assert_eq!(event, Event::FormOpened { incident_id: None });
    }

    #[test]
    fn capability_responses_are_not_user_initiated() {
        let fetched = Event::IncidentFetched {
            session: 1,
            result: Box::new(Err(HttpError::Cancelled {
                request_id: "r".into(),
            })),
        };
        assert!(!fetched.is_user_initiated());
        assert_eq!(fetched.name(), "incident_fetched");

        assert!(Event::UpdateConfirmed.is_user_initiated());
        assert!(!Event::FormClosed.is_user_initiated());
    }
}
