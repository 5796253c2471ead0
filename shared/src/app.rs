use std::mem;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::capabilities::{
    Capabilities, HttpError, HttpMethod, HttpRequest, HttpResult, ValidatedUrl,
};
#[cfg(feature = "camera")]
use crate::capabilities::{CameraError, CameraOutput, CameraResult};
use crate::config::{ApiConfig, ConfigError};
use crate::event::Event;
#[cfg(feature = "camera")]
use crate::model::CameraSession;
use crate::model::{Model, PhotoPreview, SubmissionGate};
use crate::photo::{self, PhotoFile};
use crate::record::{FormMode, IncidentField, IncidentId, IncidentRecord};
use crate::view::{self, ViewModel};
use crate::{AppError, AppResult, ErrorKind};

/// Body of a successful `upload-photos` reply.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    photos: Vec<String>,
}

#[derive(Default)]
pub struct App;

impl App {
    fn configure(config: ApiConfig, model: &mut Model, caps: &Capabilities) {
        match config.validated() {
            Ok(config) => {
                info!(base_url = %config.base_url, "api configured");
                model.config = config;
            }
            Err(e) => {
                warn!(error = %e, "rejected api configuration");
                model.set_error(e.into());
            }
        }
        caps.render.render();
    }

    fn open_form(incident_id: Option<String>, model: &mut Model, caps: &Capabilities) {
        Self::release_camera(model, caps);

        let mode = incident_id
            .filter(|id| !id.trim().is_empty())
            .map_or(FormMode::Create, |id| FormMode::Edit(IncidentId::new(id)));
        model.reset_for(mode);

        if let FormMode::Edit(id) = &model.mode {
            let session = model.session;
            info!(incident_id = %id, session, "loading incident");
            let request =
                Self::build_request(HttpMethod::Get, model.config.incident_url(id), ErrorKind::FetchFailure);
            match request {
                Ok(request) => caps
                    .http
                    .execute(request, move |result| Event::IncidentFetched {
                        session,
                        result: Box::new(result),
                    }),
                Err(e) => {
                    error!(incident_id = %id, error = %e, "cannot build fetch request");
                    model.loading = false;
                    model.set_error(e);
                }
            }
        } else {
            debug!("opening empty incident form");
        }

        caps.render.render();
    }

    fn incident_fetched(session: u64, result: HttpResult, model: &mut Model, caps: &Capabilities) {
        if !model.accepts_reply(session) {
            debug!(session, current = model.session, "ignoring stale fetch response");
            return;
        }
        model.loading = false;

        let fetched = result
            .map_err(|e| Self::transport_failure(ErrorKind::FetchFailure, &e))
            .and_then(|response| {
                if response.is_ok() {
                    response
                        .json::<Option<IncidentRecord>>()
                        .map_err(|e| Self::transport_failure(ErrorKind::FetchFailure, &e))
                } else {
                    Err(AppError::from_http_status(
                        ErrorKind::FetchFailure,
                        response.status(),
                        Some(response.body()),
                    ))
                }
            });

        match fetched {
            Ok(Some(mut record)) => {
                if record.id.is_none() {
                    record.id = model.mode.incident_id().cloned();
                }
                info!(incident_id = ?record.id, "incident loaded");
                model.record = record;
            }
            Ok(None) => debug!("backend returned no incident, keeping an empty form"),
            Err(e) => {
                error!(error = %e, "failed to load incident");
                model.set_error(e);
            }
        }

        caps.render.render();
    }

    fn field_changed(field: IncidentField, value: String, model: &mut Model, caps: &Capabilities) {
        if !model.is_editable() {
            debug!(field = field.name(), "ignoring edit while form is not editable");
            return;
        }
        model.record.set_field(field, value);
        caps.render.render();
    }

    fn photos_selected(files: Vec<PhotoFile>, model: &mut Model, caps: &Capabilities) {
        if files.is_empty() {
            debug!("no files selected");
            return;
        }
        if !model.is_editable() {
            debug!(count = files.len(), "ignoring photo selection while form is not editable");
            return;
        }
        Self::upload_photos(files, model, caps);
        caps.render.render();
    }

    fn upload_photos(files: Vec<PhotoFile>, model: &mut Model, caps: &Capabilities) {
        let report_id = model.mode.incident_id().cloned();
        let session = model.session;

        match Self::upload_request(&files, report_id.as_ref(), &model.config) {
            Ok(request) => {
                info!(
                    count = files.len(),
                    report_id = ?report_id,
                    request_id = request.request_id(),
                    "uploading photos"
                );
                model
                    .photo_previews
                    .extend(files.iter().map(PhotoPreview::from));
                model.uploads_in_flight += 1;
                caps.http.execute(request, move |result| Event::PhotosUploaded {
                    session,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                error!(error = %e, "cannot build upload request");
                model.set_error(e);
            }
        }
    }

    fn upload_request(
        files: &[PhotoFile],
        report_id: Option<&IncidentId>,
        config: &ApiConfig,
    ) -> AppResult<HttpRequest> {
        let kind = ErrorKind::UploadFailure;
        let body = photo::encode_multipart(files, report_id)?;
        Self::build_request(HttpMethod::Post, config.upload_url(report_id), kind)?
            .with_header("Content-Type", body.content_type())
            .and_then(|request| request.with_body(body.into_bytes()))
            .map_err(|e| Self::transport_failure(kind, &e))
    }

    fn photos_uploaded(session: u64, result: HttpResult, model: &mut Model, caps: &Capabilities) {
        if !model.accepts_reply(session) {
            debug!(session, current = model.session, "ignoring stale upload response");
            return;
        }
        model.uploads_in_flight = model.uploads_in_flight.saturating_sub(1);

        let uploaded = result
            .map_err(|e| Self::transport_failure(ErrorKind::UploadFailure, &e))
            .and_then(|response| {
                if response.is_ok() {
                    response
                        .json::<UploadResponse>()
                        .map_err(|e| Self::transport_failure(ErrorKind::UploadFailure, &e))
                } else {
                    Err(AppError::from_http_status(
                        ErrorKind::UploadFailure,
                        response.status(),
                        Some(response.body()),
                    ))
                }
            });

        // Completions append in arrival order; concurrent uploads are not serialized.
        match uploaded {
            Ok(UploadResponse { photos }) => {
                let appended = model.record.append_photos(&photos);
                info!(returned = photos.len(), appended, "photos uploaded");
            }
            Err(e) => {
                error!(error = %e, "photo upload failed");
                model.set_error(e);
            }
        }

        caps.render.render();
    }

    #[cfg(feature = "camera")]
    fn start_camera(model: &mut Model, caps: &Capabilities) {
        if !model.is_editable() {
            debug!("ignoring camera start while form is not editable");
            return;
        }
        match model.camera {
            CameraSession::Starting | CameraSession::Active { .. } => {
                debug!("camera already started");
            }
            CameraSession::Inactive | CameraSession::Unavailable => {
                model.camera = CameraSession::Starting;
                let session = model.session;
                caps.camera
                    .start_preview(model.config.camera_facing, move |result| {
                        Event::CameraStarted {
                            session,
                            result: Box::new(result),
                        }
                    });
                caps.render.render();
            }
        }
    }

    #[cfg(feature = "camera")]
    fn camera_started(session: u64, result: CameraResult, model: &mut Model, caps: &Capabilities) {
        let still_wanted =
            model.accepts_reply(session) && model.camera == CameraSession::Starting;

        match result {
            Ok(CameraOutput::PreviewStarted { stream_id }) if still_wanted => {
                info!(stream_id = %stream_id, "camera preview started");
                model.camera = CameraSession::Active { stream_id };
            }
            Ok(CameraOutput::PreviewStarted { stream_id }) => {
                info!(stream_id = %stream_id, "releasing camera stream that outlived its form");
                caps.camera.stop_preview(stream_id);
                return;
            }
            _ if !still_wanted => {
                debug!("ignoring camera start result for an abandoned session");
                return;
            }
            Ok(other) => {
                warn!(output = ?other, "unexpected camera start output");
                model.camera = CameraSession::Unavailable;
                model.set_error(AppError::new(
                    ErrorKind::CameraAccessFailure,
                    "camera did not start a preview",
                ));
            }
            Err(e) => {
                warn!(error = %e, permission = e.is_permission_error(), "camera access failed");
                model.camera = CameraSession::Unavailable;
                model.set_error(Self::camera_failure(&e));
            }
        }

        caps.render.render();
    }

    #[cfg(feature = "camera")]
    fn capture_photo(model: &mut Model, caps: &Capabilities) {
        if !model.is_editable() {
            debug!("ignoring capture while form is not editable");
            return;
        }
        let session = model.session;
        match model.camera.stream_id() {
            Some(stream_id) => {
                debug!(stream_id, "capturing frame");
                caps.camera.capture_frame(stream_id, move |result| {
                    Event::FrameCaptured {
                        session,
                        result: Box::new(result),
                    }
                });
            }
            None => debug!(camera = ?model.camera, "capture requested without an active stream"),
        }
    }

    #[cfg(feature = "camera")]
    fn frame_captured(session: u64, result: CameraResult, model: &mut Model, caps: &Capabilities) {
        if !model.accepts_reply(session) {
            debug!(session, current = model.session, "ignoring stale captured frame");
            return;
        }

        let file = match result {
            Ok(CameraOutput::Frame(frame)) => {
                photo::encode_frame(&frame, model.config.jpeg_quality).map_err(AppError::from)
            }
            Ok(CameraOutput::Photo(image)) => Ok(PhotoFile::from_captured(image)),
            Ok(CameraOutput::Cancelled) => {
                debug!("capture cancelled");
                return;
            }
            Ok(CameraOutput::PreviewStarted { .. }) => Err(AppError::new(
                ErrorKind::CameraAccessFailure,
                "camera returned a preview instead of a frame",
            )),
            Err(e) => {
                if matches!(e, CameraError::StreamNotActive { .. }) {
                    model.camera = CameraSession::Inactive;
                }
                Err(Self::camera_failure(&e))
            }
        };

        match file {
            Ok(file) => Self::upload_photos(vec![file], model, caps),
            Err(e) => {
                warn!(error = %e, "frame capture failed");
                model.set_error(e);
            }
        }

        caps.render.render();
    }

    #[cfg(feature = "camera")]
    fn camera_failure(e: &CameraError) -> AppError {
        AppError::new(ErrorKind::CameraAccessFailure, e.to_string())
    }

    /// Stops the preview stream if one is held. A start still in flight is
    /// released when its answer arrives.
    #[cfg(feature = "camera")]
    fn release_camera(model: &mut Model, caps: &Capabilities) {
        if let CameraSession::Active { stream_id } = mem::take(&mut model.camera) {
            info!(stream_id = %stream_id, "releasing camera stream");
            caps.camera.stop_preview(stream_id);
        }
    }

    #[cfg(not(feature = "camera"))]
    fn release_camera(_model: &mut Model, _caps: &Capabilities) {}

    fn submit_requested(model: &mut Model, caps: &Capabilities) {
        if !model.is_editable() {
            debug!("ignoring submit while form is not editable");
            return;
        }

        if model.mode.is_edit() {
            Self::request_update(model, caps);
            return;
        }
        if model.gate != SubmissionGate::Idle {
            warn!(gate = ?model.gate, "submit ignored, a save is already running");
            return;
        }

        let payload = model.record.stamped(Utc::now());
        let request = Self::build_request(
            HttpMethod::Post,
            model.config.incidents_url(),
            ErrorKind::SubmissionFailure,
        );
        Self::save(request, &payload, model, caps);
    }

    fn request_update(model: &mut Model, caps: &Capabilities) {
        if !model.is_editable() {
            debug!("ignoring update request while form is not editable");
            return;
        }
        if !model.mode.is_edit() {
            warn!("update requested for an incident that does not exist yet");
            return;
        }
        if model.gate != SubmissionGate::Idle {
            warn!(gate = ?model.gate, "update request ignored");
            return;
        }

        model.gate = SubmissionGate::PendingConfirmation {
            snapshot: Box::new(model.record.clone()),
        };
        caps.render.render();
    }

    fn update_cancelled(model: &mut Model, caps: &Capabilities) {
        if !model.gate.is_dialog_open() {
            warn!(gate = ?model.gate, "nothing to cancel");
            return;
        }
        model.gate = SubmissionGate::Idle;
        caps.render.render();
    }

    fn update_confirmed(model: &mut Model, caps: &Capabilities) {
        if model.closed {
            debug!("ignoring confirmation for a closed form");
            return;
        }

        let snapshot = match mem::replace(&mut model.gate, SubmissionGate::Submitting) {
            SubmissionGate::PendingConfirmation { snapshot } => snapshot,
            other => {
                warn!(gate = ?other, "confirmation ignored, no update pending");
                model.gate = other;
                return;
            }
        };

        let Some(id) = model.mode.incident_id() else {
            model.gate = SubmissionGate::Idle;
            model.set_error(AppError::new(
                ErrorKind::InvalidState,
                "confirmed an update without an incident id",
            ));
            caps.render.render();
            return;
        };

        let payload = snapshot.stamped(Utc::now());
        let request = Self::build_request(
            HttpMethod::Put,
            model.config.incident_url(id),
            ErrorKind::SubmissionFailure,
        );
        Self::save(request, &payload, model, caps);
    }

    fn save(
        request: AppResult<HttpRequest>,
        payload: &IncidentRecord,
        model: &mut Model,
        caps: &Capabilities,
    ) {
        let request = request.and_then(|request| {
            request
                .with_json(payload)
                .map_err(|e| Self::transport_failure(ErrorKind::SubmissionFailure, &e))
        });

        match request {
            Ok(request) => {
                info!(
                    method = request.method().as_str(),
                    incident_id = ?payload.id,
                    request_id = request.request_id(),
                    "saving incident"
                );
                model.gate = SubmissionGate::Submitting;
                let session = model.session;
                caps.http.execute(request, move |result| Event::IncidentSaved {
                    session,
                    result: Box::new(result),
                });
            }
            Err(e) => {
                error!(error = %e, "cannot build save request");
                model.gate = SubmissionGate::Idle;
                model.set_error(e);
            }
        }

        caps.render.render();
    }

    fn incident_saved(session: u64, result: HttpResult, model: &mut Model, caps: &Capabilities) {
        if !model.accepts_reply(session) {
            debug!(session, current = model.session, "ignoring stale save response");
            return;
        }
        model.gate = SubmissionGate::Idle;

        match result {
            Ok(response) if response.is_ok() => {
                info!(request_id = response.request_id(), "incident saved");
                Self::release_camera(model, caps);
                model.closed = true;
                caps.navigator.navigate(model.config.list_route.clone());
            }
            Ok(response) => {
                let e = AppError::from_http_status(
                    ErrorKind::SubmissionFailure,
                    response.status(),
                    Some(response.body()),
                );
                error!(status = response.status(), error = %e, "incident save rejected");
                model.set_error(e);
            }
            Err(e) => {
                error!(error = %e, "incident save failed");
                model.set_error(Self::transport_failure(ErrorKind::SubmissionFailure, &e));
            }
        }

        caps.render.render();
    }

    fn form_closed(model: &mut Model, caps: &Capabilities) {
        info!(uploads_in_flight = model.uploads_in_flight, "incident form closed");
        Self::release_camera(model, caps);
        model.closed = true;
        caps.render.render();
    }

    fn build_request(
        method: HttpMethod,
        url: Result<Url, ConfigError>,
        kind: ErrorKind,
    ) -> AppResult<HttpRequest> {
        let url = url.map_err(|e| AppError::new(kind, e.to_string()))?;
        let url = ValidatedUrl::from_url(&url).map_err(|e| Self::transport_failure(kind, &e))?;
        Ok(HttpRequest::new(method, url))
    }

    fn transport_failure(kind: ErrorKind, e: &HttpError) -> AppError {
        let error = AppError::new(kind, e.to_string());
        match e.request_id() {
            Some(id) => error.with_context("request_id", id),
            None => error,
        }
    }
}

impl crux_core::App for App {
    type Event = Event;
    type Model = Model;
    type ViewModel = ViewModel;
    type Capabilities = Capabilities;

    fn update(&self, event: Event, model: &mut Model, caps: &Capabilities) {
        debug!(
            event = event.name(),
            user_initiated = event.is_user_initiated(),
            "update"
        );

        match event {
            Event::Configure(config) => Self::configure(*config, model, caps),
            Event::FormOpened { incident_id } => Self::open_form(incident_id, model, caps),
            Event::FormClosed => Self::form_closed(model, caps),

            Event::FieldChanged { field, value } => Self::field_changed(field, value, model, caps),
            Event::PhotosSelected { files } => Self::photos_selected(files, model, caps),
            Event::PhotosUploaded { session, result } => {
                Self::photos_uploaded(session, *result, model, caps);
            }

            #[cfg(feature = "camera")]
            Event::CameraStartRequested => Self::start_camera(model, caps),
            #[cfg(feature = "camera")]
            Event::CameraStarted { session, result } => {
                Self::camera_started(session, *result, model, caps);
            }
            #[cfg(feature = "camera")]
            Event::CapturePhotoRequested => Self::capture_photo(model, caps),
            #[cfg(feature = "camera")]
            Event::FrameCaptured { session, result } => {
                Self::frame_captured(session, *result, model, caps);
            }

            Event::SubmitRequested => Self::submit_requested(model, caps),
            Event::UpdateRequested => Self::request_update(model, caps),
            Event::UpdateConfirmed => Self::update_confirmed(model, caps),
            Event::UpdateCancelled => Self::update_cancelled(model, caps),
            Event::IncidentFetched { session, result } => {
                Self::incident_fetched(session, *result, model, caps);
            }
            Event::IncidentSaved { session, result } => {
                Self::incident_saved(session, *result, model, caps);
            }

            Event::DismissError => {
                model.clear_error();
                caps.render.render();
            }
        }
    }

    fn view(&self, model: &Model) -> ViewModel {
        view::build(model)
    }
}
