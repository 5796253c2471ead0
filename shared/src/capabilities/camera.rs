use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::photo::ImageFormat;

pub const MAX_IMAGE_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// Live camera preview and frame capture, backed by the shell's media
/// stack (`getUserMedia` + canvas on the web, AVFoundation / CameraX on
/// mobile).
///
/// A started preview holds a device stream until `stop_preview` is sent.
pub struct Camera<E> {
    context: CapabilityContext<CameraOperation, E>,
}

impl<Ev> Capability<Ev> for Camera<Ev> {
    type Operation = CameraOperation;
    type MappedSelf<MappedEv> = Camera<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Camera::new(self.context.map_event(f))
    }
}

impl<E> Camera<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<CameraOperation, E>) -> Self {
        Self { context }
    }

    pub fn start_preview<F>(&self, facing: CameraFacing, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        self.request(CameraOperation::StartPreview { facing }, callback);
    }

    pub fn capture_frame<F>(&self, stream_id: impl Into<String>, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        self.request(
            CameraOperation::CaptureFrame {
                stream_id: stream_id.into(),
            },
            callback,
        );
    }

    /// Fire-and-forget: the shell stops every track of the stream.
    pub fn stop_preview(&self, stream_id: impl Into<String>) {
        let context = self.context.clone();
        let operation = CameraOperation::StopPreview {
            stream_id: stream_id.into(),
        };
        self.context.spawn(async move {
            context.notify_shell(operation).await;
        });
    }

    fn request<F>(&self, operation: CameraOperation, callback: F)
    where
        F: FnOnce(CameraResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context.request_from_shell(operation).await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOperation {
    StartPreview { facing: CameraFacing },
    CaptureFrame { stream_id: String },
    StopPreview { stream_id: String },
}

impl Operation for CameraOperation {
    type Output = CameraResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    Front,
    #[default]
    Back,
    External,
}

/// One uncompressed video frame, RGBA8, row-major.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    #[serde(with = "serde_bytes")]
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

impl fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("rgba_len", &self.rgba.len())
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapturedImage {
    #[serde(with = "serde_bytes")]
    data: Vec<u8>,
    format: ImageFormat,
    width: u32,
    height: u32,
}

impl CapturedImage {
    pub fn new(
        data: Vec<u8>,
        format: ImageFormat,
        width: u32,
        height: u32,
    ) -> Result<Self, CameraError> {
        if data.is_empty() {
            return Err(CameraError::InvalidImage {
                reason: "image data is empty".to_string(),
            });
        }

        if data.len() > MAX_IMAGE_SIZE_BYTES {
            return Err(CameraError::ImageTooLarge {
                size: data.len(),
                max: MAX_IMAGE_SIZE_BYTES,
            });
        }

        if let Some(detected) = ImageFormat::from_magic_bytes(&data) {
            if detected != format {
                return Err(CameraError::InvalidImage {
                    reason: format!("format mismatch: declared {format:?} but detected {detected:?}"),
                });
            }
        }

        Ok(Self {
            data,
            format,
            width,
            height,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl fmt::Debug for CapturedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedImage")
            .field("format", &self.format)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("data_len", &self.data.len())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraOutput {
    PreviewStarted { stream_id: String },
    Frame(RawFrame),
    Photo(CapturedImage),
    Cancelled,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum CameraError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,

    #[error("camera unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("camera stream {stream_id} is not active")]
    StreamNotActive { stream_id: String },

    #[error("capture failed: {reason}")]
    CaptureFailed { reason: String },

    #[error("image too large: {size} bytes exceeds maximum of {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },

    #[error("camera not supported on this platform")]
    NotSupported,
}

impl CameraError {
    pub fn is_permission_error(&self) -> bool {
        matches!(self, CameraError::PermissionDenied)
    }
}

pub type CameraResult = Result<CameraOutput, CameraError>;
