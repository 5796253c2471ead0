mod common;

use common::*;
use incident_form::capabilities::{HttpError, HttpMethod};
use incident_form::{ErrorKind, Event, Model, PhotoFile};
use serde_json::json;

const JPEG_BYTES: [u8; 12] = [
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01,
];

fn jpeg(name: &str) -> PhotoFile {
    PhotoFile::new(name, Some("image/jpeg".into()), JPEG_BYTES.to_vec())
}

fn create_form(app: &Tester) -> Model {
    let mut model = Model::default();
    send(app, &mut model, Event::FormOpened { incident_id: None });
    model
}

fn select(app: &Tester, model: &mut Model, files: Vec<PhotoFile>) -> Vec<incident_form::Effect> {
    send(app, model, Event::PhotosSelected { files })
}

#[test]
fn empty_selection_is_a_no_op() {
    let app = tester();
    let mut model = create_form(&app);

    let effects = select(&app, &mut model, Vec::new());

    assert!(effects.is_empty());
    assert!(model.photo_previews.is_empty());
    assert_eq!(model.uploads_in_flight, 0);
}

#[test]
fn upload_appends_returned_tokens() {
    let app = tester();
    let mut model = create_form(&app);

    let effects = select(&app, &mut model, vec![jpeg("a.jpg"), jpeg("b.jpg")]);
    assert!(has_render(&effects));
    let mut request = single_http(effects);

    assert_eq!(model.uploads_in_flight, 1);
    assert_eq!(model.photo_previews.len(), 2);
    assert_eq!(request.operation.request().method(), HttpMethod::Post);
    assert_eq!(
        request.operation.request().url().as_str(),
        "http://localhost:8080/api/incidents/upload-photos"
    );
    assert!(request
        .operation
        .request()
        .header("Content-Type")
        .is_some_and(|v| v.starts_with("multipart/form-data")));

    let body = body_text(&request);
    assert_eq!(body.matches("name=\"files\"").count(), 2);
    assert!(body.contains("filename=\"a.jpg\""));
    assert!(!body.contains("name=\"reportId\""));

    resolve_http(
        &app,
        &mut model,
        &mut request,
        json_response(200, &json!({"photos": ["up/a.jpg", "up/b.jpg"]})),
    );

    assert_eq!(model.record.photos, "up/a.jpg,up/b.jpg");
    assert_eq!(model.uploads_in_flight, 0);
    assert!(model.active_error.is_none());
}

#[test]
fn upload_in_edit_mode_carries_report_id() {
    let app = tester();
    let mut model = Model::default();
    let mut fetch = single_http(send(
        &app,
        &mut model,
        Event::FormOpened {
            incident_id: Some("42".into()),
        },
    ));
    resolve_http(
        &app,
        &mut model,
        &mut fetch,
        json_response(200, &json!({"id": "42", "photos": "p1.jpg"})),
    );

    let mut request = single_http(select(&app, &mut model, vec![jpeg("c.jpg")]));
    assert_eq!(
        request.operation.request().url().as_str(),
        "http://localhost:8080/api/incidents/upload-photos?reportId=42"
    );
    let body = body_text(&request);
    assert!(body.contains("name=\"reportId\"\r\n\r\n42\r\n"));

    resolve_http(
        &app,
        &mut model,
        &mut request,
        json_response(200, &json!({"photos": ["p2.jpg"]})),
    );
    assert_eq!(model.record.photos, "p1.jpg,p2.jpg");
}

#[test]
fn failed_upload_leaves_photos_unchanged() {
    let app = tester();
    let mut model = create_form(&app);
    model.record.photos = "existing.jpg".into();

    let mut request = single_http(select(&app, &mut model, vec![jpeg("a.jpg")]));
    resolve_http(&app, &mut model, &mut request, text_response(500, "boom"));

    assert_eq!(model.record.photos, "existing.jpg");
    assert_eq!(model.uploads_in_flight, 0);
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::UploadFailure)
    );
}

#[test]
fn undecodable_upload_reply_is_a_failure() {
    let app = tester();
    let mut model = create_form(&app);

    let mut request = single_http(select(&app, &mut model, vec![jpeg("a.jpg")]));
    resolve_http(&app, &mut model, &mut request, text_response(200, "<html>"));

    assert_eq!(model.record.photos, "");
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::UploadFailure)
    );
}

#[test]
fn transport_error_during_upload_is_recorded() {
    let app = tester();
    let mut model = create_form(&app);

    let mut request = single_http(select(&app, &mut model, vec![jpeg("a.jpg")]));
    resolve_http(
        &app,
        &mut model,
        &mut request,
        Err(HttpError::Timeout {
            timeout_ms: 30_000,
            request_id: "r-1".into(),
        }),
    );

    let error = model.active_error.as_ref().expect("error recorded");
    assert_eq!(error.kind, ErrorKind::UploadFailure);
    assert_eq!(error.context.get("request_id").map(String::as_str), Some("r-1"));
}

#[test]
fn concurrent_uploads_append_in_completion_order() {
    let app = tester();
    let mut model = create_form(&app);

    let mut first = single_http(select(&app, &mut model, vec![jpeg("first.jpg")]));
    let mut second = single_http(select(&app, &mut model, vec![jpeg("second.jpg")]));
    assert_eq!(model.uploads_in_flight, 2);

    resolve_http(
        &app,
        &mut model,
        &mut second,
        json_response(200, &json!({"photos": ["second.jpg"]})),
    );
    resolve_http(
        &app,
        &mut model,
        &mut first,
        json_response(200, &json!({"photos": ["first.jpg"]})),
    );

    assert_eq!(model.record.photos, "second.jpg,first.jpg");
    assert_eq!(model.uploads_in_flight, 0);
}

#[test]
fn empty_file_is_rejected_before_upload() {
    let app = tester();
    let mut model = create_form(&app);

    let effects = select(&app, &mut model, vec![PhotoFile::new("empty.jpg", None, Vec::new())]);

    assert!(http_requests(effects).is_empty());
    assert_eq!(model.uploads_in_flight, 0);
    assert_eq!(
        model.active_error.as_ref().map(|e| e.kind),
        Some(ErrorKind::UploadFailure)
    );
}

#[test]
fn returned_tokens_follow_existing_photos() {
    let app = tester();
    let mut model = Model::default();
    let mut fetch = single_http(send(
        &app,
        &mut model,
        Event::FormOpened {
            incident_id: Some("9".into()),
        },
    ));
    resolve_http(
        &app,
        &mut model,
        &mut fetch,
        json_response(200, &json!({"id": "9", "photos": "p1.jpg"})),
    );

    let mut request = single_http(select(&app, &mut model, vec![jpeg("x.jpg"), jpeg("y.jpg")]));
    resolve_http(
        &app,
        &mut model,
        &mut request,
        json_response(200, &json!({"photos": ["p2.jpg", "p3.jpg"]})),
    );

    assert_eq!(model.record.photos, "p1.jpg,p2.jpg,p3.jpg");
    assert_eq!(
        model.record.photo_tokens().collect::<Vec<_>>(),
        vec!["p1.jpg", "p2.jpg", "p3.jpg"]
    );
}

#[test]
fn upload_from_previous_form_does_not_touch_next_one() {
    let app = tester();
    let mut model = create_form(&app);
    let mut stale = single_http(select(&app, &mut model, vec![jpeg("old.jpg")]));

    send(&app, &mut model, Event::FormClosed);
    send(&app, &mut model, Event::FormOpened { incident_id: None });
    let mut current = single_http(select(&app, &mut model, vec![jpeg("new.jpg")]));
    assert_eq!(model.uploads_in_flight, 1);

    let effects = resolve_http(
        &app,
        &mut model,
        &mut stale,
        json_response(200, &json!({"photos": ["old.jpg"]})),
    );
    assert!(effects.is_empty());
    assert_eq!(model.record.photos, "");
    assert_eq!(model.uploads_in_flight, 1);

    resolve_http(
        &app,
        &mut model,
        &mut current,
        json_response(200, &json!({"photos": ["new.jpg"]})),
    );
    assert_eq!(model.record.photos, "new.jpg");
    assert_eq!(model.uploads_in_flight, 0);
}
