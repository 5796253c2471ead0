#![allow(dead_code)]

use crux_core::testing::AppTester;
use crux_core::Request;
use incident_form::capabilities::{
    HttpHeaders, HttpOperation, HttpResponse, HttpResult, NavigatorOperation,
};
use incident_form::{App, Effect, Event, Model};
use serde::Serialize;

pub type Tester = AppTester<App, Effect>;

pub fn tester() -> Tester {
    AppTester::<App, Effect>::default()
}

pub fn has_render(effects: &[Effect]) -> bool {
    effects.iter().any(|e| matches!(e, Effect::Render(_)))
}

pub fn http_requests(effects: Vec<Effect>) -> Vec<Request<HttpOperation>> {
    effects
        .into_iter()
        .filter_map(|e| match e {
            Effect::Http(request) => Some(request),
            _ => None,
        })
        .collect()
}

pub fn single_http(effects: Vec<Effect>) -> Request<HttpOperation> {
    let mut requests = http_requests(effects);
    assert_eq!(requests.len(), 1, "expected exactly one http request");
    requests.remove(0)
}

pub fn navigations(effects: &[Effect]) -> Vec<String> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Navigator(request) => match &request.operation {
                NavigatorOperation::Navigate { route } => Some(route.clone()),
            },
            _ => None,
        })
        .collect()
}

/// Sends `event`, returning the effects it produced.
pub fn send(app: &Tester, model: &mut Model, event: Event) -> Vec<Effect> {
    app.update(event, model).effects
}

/// Resolves an HTTP request and runs the resulting events through the app.
pub fn resolve_http(
    app: &Tester,
    model: &mut Model,
    request: &mut Request<HttpOperation>,
    result: HttpResult,
) -> Vec<Effect> {
    let update = app.resolve(request, result).expect("an update");
    let mut effects = update.effects;
    for event in update.events {
        effects.extend(app.update(event, model).effects);
    }
    effects
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> HttpResult {
    Ok(HttpResponse::json_body(status, value, "test-request").expect("serializable body"))
}

pub fn text_response(status: u16, body: &str) -> HttpResult {
    Ok(HttpResponse::new(
        status,
        HttpHeaders::new(),
        body.as_bytes().to_vec(),
        "test-request".into(),
    ))
}

pub fn body_json(request: &Request<HttpOperation>) -> serde_json::Value {
    let body = request.operation.request().body().expect("request body");
    serde_json::from_slice(body).expect("json body")
}

pub fn body_text(request: &Request<HttpOperation>) -> String {
    let body = request.operation.request().body().expect("request body");
    String::from_utf8_lossy(body).into_owned()
}
