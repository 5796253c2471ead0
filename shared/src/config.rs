use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[cfg(feature = "camera")]
use crate::capabilities::CameraFacing;
use crate::record::IncidentId;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_LIST_ROUTE: &str = "/incidents";
pub const DEFAULT_JPEG_QUALITY: u8 = 85;

const INCIDENTS_SEGMENT: &str = "incidents";
const UPLOAD_SEGMENT: &str = "upload-photos";
const REPORT_ID_PARAM: &str = "reportId";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Parse(String),

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("list route must start with '/': {0}")]
    InvalidListRoute(String),
}

/// Where the backend lives and how the form behaves around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApiConfig {
    pub base_url: String,
    /// Route the shell shows after a successful save.
    pub list_route: String,
    #[cfg(feature = "camera")]
    pub camera_facing: CameraFacing,
    pub jpeg_quality: u8,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            list_route: DEFAULT_LIST_ROUTE.to_string(),
            #[cfg(feature = "camera")]
            camera_facing: CameraFacing::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl ApiConfig {
    /// Parses a (possibly partial) JSON config and validates it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validated()
    }

    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_url_parsed()?;
        if !self.list_route.starts_with('/') {
            return Err(ConfigError::InvalidListRoute(self.list_route));
        }
        self.jpeg_quality = self.jpeg_quality.clamp(1, 100);
        Ok(self)
    }

    /// `GET`/`PUT` target for one stored incident.
    pub fn incident_url(&self, id: &IncidentId) -> Result<Url, ConfigError> {
        self.endpoint(&[INCIDENTS_SEGMENT, id.as_str()])
    }

    /// `POST` target for new incidents.
    pub fn incidents_url(&self) -> Result<Url, ConfigError> {
        self.endpoint(&[INCIDENTS_SEGMENT])
    }

    pub fn upload_url(&self, report_id: Option<&IncidentId>) -> Result<Url, ConfigError> {
        let mut url = self.endpoint(&[INCIDENTS_SEGMENT, UPLOAD_SEGMENT])?;
        if let Some(id) = report_id {
            url.query_pairs_mut()
                .append_pair(REPORT_ID_PARAM, id.as_str());
        }
        Ok(url)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ConfigError> {
        let mut url = self.base_url_parsed()?;
        url.path_segments_mut()
            .map_err(|()| self.invalid_base("cannot be a base"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn base_url_parsed(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| self.invalid_base(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(self.invalid_base("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(self.invalid_base("missing host"));
        }
        Ok(url)
    }

    fn invalid_base(&self, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: reason.into(),
        }
    }
}
