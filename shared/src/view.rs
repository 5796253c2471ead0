use serde::{Deserialize, Serialize};

#[cfg(feature = "camera")]
use crate::model::CameraSession;
use crate::model::{Model, PhotoPreview, SubmissionGate};
use crate::record::{FormMode, IncidentField};
use crate::AppError;

pub const LOADING_MESSAGE: &str = "Loading incident details...";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldView {
    pub field: IncidentField,
    pub name: String,
    pub label: String,
    pub value: String,
    /// `None` for single-line inputs.
    pub multiline_rows: Option<u8>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DialogView {
    pub title: String,
    pub message: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl DialogView {
    fn confirm_update() -> Self {
        Self {
            title: "Confirm Update".into(),
            message: "Are you sure you want to update this incident?".into(),
            confirm_label: "Confirm".into(),
            cancel_label: "Cancel".into(),
        }
    }
}

#[cfg(feature = "camera")]
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CameraView {
    pub stream_id: Option<String>,
    pub starting: bool,
    pub can_start: bool,
    pub can_capture: bool,
    pub unavailable: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewState {
    Loading {
        message: String,
    },
    Editing {
        title: String,
        fields: Vec<FieldView>,
        photo_previews: Vec<PhotoPreview>,
        uploads_in_flight: usize,
        submit_label: String,
        submit_enabled: bool,
        dialog: Option<DialogView>,
    },
    Closed,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub is_retryable: bool,
    pub error_code: String,
}

impl From<&AppError> for UserFacingError {
    fn from(e: &AppError) -> Self {
        Self {
            message: e.user_facing_message(),
            is_retryable: e.is_retryable(),
            error_code: e.code().to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ViewModel {
    pub state: ViewState,
    pub error: Option<UserFacingError>,
    #[cfg(feature = "camera")]
    pub camera: CameraView,
}

pub(crate) fn build(model: &Model) -> ViewModel {
    let state = if model.closed {
        ViewState::Closed
    } else if model.loading {
        ViewState::Loading {
            message: LOADING_MESSAGE.into(),
        }
    } else {
        editing(model)
    };

    ViewModel {
        state,
        error: model.active_error.as_ref().map(UserFacingError::from),
        #[cfg(feature = "camera")]
        camera: camera(model),
    }
}

fn editing(model: &Model) -> ViewState {
    let (title, submit_label) = match model.mode {
        FormMode::Create => ("Add Incident", "Submit Report"),
        FormMode::Edit(_) => ("Edit Incident", "Update Incident"),
    };

    let fields = IncidentField::ALL
        .into_iter()
        .map(|field| FieldView {
            field,
            name: field.name().into(),
            label: field.label().into(),
            value: model.record.field(field).to_owned(),
            multiline_rows: field.multiline_rows(),
        })
        .collect();

    ViewState::Editing {
        title: title.into(),
        fields,
        photo_previews: model.photo_previews.clone(),
        uploads_in_flight: model.uploads_in_flight,
        submit_label: submit_label.into(),
        submit_enabled: matches!(model.gate, SubmissionGate::Idle),
        dialog: model
            .gate
            .is_dialog_open()
            .then(DialogView::confirm_update),
    }
}

#[cfg(feature = "camera")]
fn camera(model: &Model) -> CameraView {
    let editable = model.is_editable();
    match &model.camera {
        CameraSession::Inactive => CameraView {
            can_start: editable,
            ..CameraView::default()
        },
        CameraSession::Starting => CameraView {
            starting: true,
            ..CameraView::default()
        },
        CameraSession::Active { stream_id } => CameraView {
            stream_id: Some(stream_id.clone()),
            can_capture: editable,
            ..CameraView::default()
        },
        CameraSession::Unavailable => CameraView {
            can_start: editable,
            unavailable: true,
            ..CameraView::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{IncidentId, IncidentRecord};
    use crate::ErrorKind;

    fn editing_parts(view: &ViewModel) -> (&str, &[FieldView], &str, &Option<DialogView>) {
        match &view.state {
            ViewState::Editing {
                title,
                fields,
                submit_label,
                dialog,
                ..
            } => (title.as_str(), fields.as_slice(), submit_label.as_str(), dialog),
            other => panic!("expected editing state, got {other:?}"),
        }
    }

    #[test]
    fn create_mode_labels() {
        let view = build(&Model::default());
        let (title, fields, submit_label, dialog) = editing_parts(&view);

        assert_eq!(title, "Add Incident");
        assert_eq!(submit_label, "Submit Report");
        assert!(dialog.is_none());
        assert_eq!(fields.len(), 11);
        assert_eq!(fields[0].label, "Driver Name");
        assert_eq!(fields[9].label, "Photos (URLs or Base64)");
        assert_eq!(fields[4].multiline_rows, Some(4));
    }

    #[test]
    fn edit_mode_with_dialog() {
        let record = IncidentRecord {
            truck_id: "T-1".into(),
            ..IncidentRecord::default()
        };
        let model = Model {
            mode: FormMode::Edit(IncidentId::new("3")),
            gate: SubmissionGate::PendingConfirmation {
                snapshot: Box::new(record.clone()),
            },
            record,
            ..Model::default()
        };

        let view = build(&model);
        let (title, fields, submit_label, dialog) = editing_parts(&view);

        assert_eq!(title, "Edit Incident");
        assert_eq!(submit_label, "Update Incident");
        assert_eq!(fields[1].value, "T-1");
        let dialog = dialog.as_ref().unwrap();
        assert_eq!(dialog.title, "Confirm Update");
        assert_eq!(dialog.message, "Are you sure you want to update this incident?");
    }

    #[test]
    fn loading_and_closed_states() {
        let loading = Model {
            loading: true,
            ..Model::default()
        };
        assert_eq!(
            build(&loading).state,
            ViewState::Loading {
                message: "Loading incident details...".into()
            }
        );

        let closed = Model {
            closed: true,
            loading: true,
            ..Model::default()
        };
        assert_eq!(build(&closed).state, ViewState::Closed);
    }

    #[test]
    fn error_is_exposed() {
        let mut model = Model::default();
        model.set_error(AppError::new(ErrorKind::UploadFailure, "HTTP error: 500"));

        let error = build(&model).error.unwrap();
        assert_eq!(error.error_code, "UPLOAD_FAILED");
        assert!(error.is_retryable);
    }

    #[cfg(feature = "camera")]
    #[test]
    fn camera_controls_follow_session() {
        let mut model = Model::default();
        assert!(build(&model).camera.can_start);

        model.camera = CameraSession::Active {
            stream_id: "s1".into(),
        };
        let camera = build(&model).camera;
        assert!(camera.can_capture);
        assert_eq!(camera.stream_id.as_deref(), Some("s1"));

        model.camera = CameraSession::Unavailable;
        let camera = build(&model).camera;
        assert!(camera.unavailable);
        assert!(!camera.can_capture);
    }
}
