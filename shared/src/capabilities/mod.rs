mod http;
mod navigator;

#[cfg(feature = "camera")]
pub(crate) mod camera;

pub use self::http::{
    ContentType, Http, HttpError, HttpHeaders, HttpMethod, HttpOperation,
    HttpRequest, HttpResponse, HttpResult, ValidatedUrl,
};
pub use self::navigator::{Navigator, NavigatorOperation};

#[cfg(feature = "camera")]
pub use self::camera::{
    Camera, CameraError, CameraFacing, CameraOperation, CameraOutput, CameraResult,
    CapturedImage, RawFrame,
};

pub use crux_core::render::Render;

use crate::event::Event;
// The Effect derive refers to the app type by its default name.
#[allow(unused_imports)]
use crate::app::App;

// Field names match the capability type names so the generated `Effect`
// variants read the same either way (`Effect::Http`, `Effect::Camera`, ...).
// The derive does not see `cfg` on fields, hence two declarations.
#[cfg(feature = "camera")]
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub navigator: Navigator<Event>,
    pub camera: Camera<Event>,
}

#[cfg(not(feature = "camera"))]
#[derive(crux_core::macros::Effect)]
pub struct Capabilities {
    pub http: Http<Event>,
    pub render: Render<Event>,
    pub navigator: Navigator<Event>,
}
