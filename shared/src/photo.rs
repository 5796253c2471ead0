//! Photo payloads: files picked by the user, frames grabbed from the
//! camera, and the multipart body that carries them to the backend.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::record::IncidentId;

#[cfg(feature = "camera")]
use crate::capabilities::{CapturedImage, RawFrame};

pub const MULTIPART_FILES_FIELD: &str = "files";
pub const MULTIPART_REPORT_ID_FIELD: &str = "reportId";
pub const CAPTURED_IMAGE_STEM: &str = "captured_image";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PhotoError {
    #[error("photo '{name}' is empty")]
    EmptyFile { name: String },

    #[error("frame is zero-sized ({width}x{height})")]
    ZeroSizedFrame { width: u32, height: u32 },

    #[error("frame buffer has {actual} bytes, expected {expected}")]
    FrameSizeMismatch { expected: usize, actual: usize },

    #[error("jpeg encoding failed: {0}")]
    Encode(String),

    #[error("no files to upload")]
    NothingToUpload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Jpeg,
    Png,
    Heic,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Heic => "image/heic",
            ImageFormat::WebP => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Heic => "heic",
            ImageFormat::WebP => "webp",
        }
    }

    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(ImageFormat::Jpeg);
        }

        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(ImageFormat::Png);
        }

        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(ImageFormat::WebP);
        }

        if &data[4..8] == b"ftyp" {
            let brand = &data[8..12];
            if brand == b"heic" || brand == b"heix" || brand == b"mif1" {
                return Some(ImageFormat::Heic);
            }
        }

        None
    }
}

/// A file chosen in the picker or produced by the camera.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhotoFile {
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(with = "serde_bytes")]
    pub bytes: Vec<u8>,
}

impl PhotoFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes,
        }
    }

    /// Declared type if the shell gave one, otherwise sniffed from the bytes.
    pub fn content_type(&self) -> String {
        self.mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned)
            .or_else(|| ImageFormat::from_magic_bytes(&self.bytes).map(|f| f.mime_type().to_owned()))
            .unwrap_or_else(|| "application/octet-stream".to_owned())
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    #[cfg(feature = "camera")]
    pub fn from_captured(image: CapturedImage) -> Self {
        let format = image.format();
        Self {
            name: format!("{CAPTURED_IMAGE_STEM}.{}", format.extension()),
            mime_type: Some(format.mime_type().to_owned()),
            bytes: image.into_data(),
        }
    }
}

impl fmt::Debug for PhotoFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhotoFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.bytes.len())
            .finish()
    }
}

/// Encodes a raw RGBA frame as `captured_image.jpg`.
#[cfg(feature = "camera")]
#[instrument(skip(frame), fields(width = frame.width, height = frame.height))]
pub fn encode_frame(frame: &RawFrame, quality: u8) -> Result<PhotoFile, PhotoError> {
    use image::codecs::jpeg::JpegEncoder;
    use image::{DynamicImage, RgbaImage};

    if frame.width == 0 || frame.height == 0 {
        return Err(PhotoError::ZeroSizedFrame {
            width: frame.width,
            height: frame.height,
        });
    }

    let expected = frame.expected_len();
    let mismatch = PhotoError::FrameSizeMismatch {
        expected,
        actual: frame.rgba.len(),
    };
    if frame.rgba.len() != expected {
        return Err(mismatch);
    }

    let rgba = RgbaImage::from_raw(frame.width, frame.height, frame.rgba.clone()).ok_or(mismatch)?;
    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| PhotoError::Encode(e.to_string()))?;

    debug!(encoded_bytes = bytes.len(), "frame encoded");

    Ok(PhotoFile::new(
        format!("{CAPTURED_IMAGE_STEM}.{}", ImageFormat::Jpeg.extension()),
        Some(ImageFormat::Jpeg.mime_type().to_owned()),
        bytes,
    ))
}

/// A `multipart/form-data` body ready to hand to the HTTP capability.
#[derive(Clone, PartialEq, Eq)]
pub struct MultipartBody {
    boundary: String,
    bytes: Vec<u8>,
}

impl MultipartBody {
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl fmt::Debug for MultipartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipartBody")
            .field("boundary", &self.boundary)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One `files` part per photo, plus `reportId` when the record already exists.
#[instrument(skip(files), fields(file_count = files.len()))]
pub fn encode_multipart(
    files: &[PhotoFile],
    report_id: Option<&IncidentId>,
) -> Result<MultipartBody, PhotoError> {
    if files.is_empty() {
        return Err(PhotoError::NothingToUpload);
    }

    let boundary = format!("----incident-form-{}", Uuid::new_v4().simple());
    let mut bytes: Vec<u8> = Vec::with_capacity(files.iter().map(|f| f.bytes.len() + 256).sum());

    for file in files {
        if file.bytes.is_empty() {
            return Err(PhotoError::EmptyFile {
                name: file.name.clone(),
            });
        }

        let header = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{MULTIPART_FILES_FIELD}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
            escape_filename(&file.name),
            file.content_type(),
        );
        bytes.extend_from_slice(header.as_bytes());
        bytes.extend_from_slice(&file.bytes);
        bytes.extend_from_slice(b"\r\n");
    }

    if let Some(id) = report_id {
        let part = format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{MULTIPART_REPORT_ID_FIELD}\"\r\n\r\n{id}\r\n",
        );
        bytes.extend_from_slice(part.as_bytes());
    }

    bytes.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    Ok(MultipartBody { boundary, bytes })
}

fn escape_filename(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '\r' && *c != '\n')
        .map(|c| if c == '"' { '\'' } else { c })
        .collect()
}
