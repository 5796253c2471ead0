use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_REQUEST_BODY_SIZE: usize = 50 * 1024 * 1024;
pub const MAX_HEADER_NAME_LENGTH: usize = 256;
pub const MAX_HEADER_VALUE_LENGTH: usize = 8192;
pub const MAX_HEADERS_COUNT: usize = 100;

/// HTTP requests executed by the shell on behalf of the core.
pub struct Http<E> {
    context: CapabilityContext<HttpOperation, E>,
}

impl<Ev> Capability<Ev> for Http<Ev> {
    type Operation = HttpOperation;
    type MappedSelf<MappedEv> = Http<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Http::new(self.context.map_event(f))
    }
}

impl<E> Http<E>
where
    E: Send + 'static,
{
    pub fn new(context: CapabilityContext<HttpOperation, E>) -> Self {
        Self { context }
    }

    /// Sends `request` and feeds the outcome back through `callback`.
    /// There is no cancellation: the response arrives even if the caller
    /// has moved on.
    pub fn execute<F>(&self, request: HttpRequest, callback: F)
    where
        F: FnOnce(HttpResult) -> E + Send + 'static,
    {
        let context = self.context.clone();
        self.context.spawn(async move {
            let result = context
                .request_from_shell(HttpOperation::Execute(request))
                .await;
            context.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    scheme: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = Self::validate(&url)?;
        Self::from_parsed(&url, &parsed)
    }

    pub fn from_url(url: &Url) -> Result<Self, HttpError> {
        Self::new(url.as_str())
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn from_parsed(raw: &str, parsed: &Url) -> Result<Self, HttpError> {
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "missing host".to_string(),
            })?
            .to_lowercase();

        Ok(Self {
            url: parsed.to_string(),
            scheme: parsed.scheme().to_lowercase(),
            host,
        })
    }

    fn validate(url: &str) -> Result<Url, HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: url.to_string(),
                reason: "URL cannot be empty".to_string(),
            });
        }

        if url.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })?;

        let scheme = parsed.scheme().to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        if parsed.host_str().is_none() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "URL must have a host".to_string(),
            });
        }

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(url),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        Ok(parsed)
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let cut = (0..=100).rev().find(|i| url.is_char_boundary(*i)).unwrap_or(0);
            format!("{}...", &url[..cut])
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HttpHeaders {
    headers: Vec<(String, String)>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), HttpError> {
        if self.headers.len() >= MAX_HEADERS_COUNT {
            return Err(HttpError::TooManyHeaders {
                count: self.headers.len(),
                max: MAX_HEADERS_COUNT,
            });
        }

        let name = name.into();
        let value = value.into();

        Self::validate_header_name(&name)?;
        Self::validate_header_value(&name, &value)?;

        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value));

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn validate_header_name(name: &str) -> Result<(), HttpError> {
        if name.is_empty() {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header name cannot be empty".to_string(),
            });
        }

        if name.len() > MAX_HEADER_NAME_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.chars().take(50).collect(),
                reason: format!(
                    "header name exceeds maximum length of {MAX_HEADER_NAME_LENGTH} bytes"
                ),
            });
        }

        if let Some(c) = name
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!("invalid character '{c}' in header name"),
            });
        }

        let lower = name.to_lowercase();
        if lower == "host" || lower == "content-length" || lower == "transfer-encoding" {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "this header is managed automatically".to_string(),
            });
        }

        Ok(())
    }

    fn validate_header_value(name: &str, value: &str) -> Result<(), HttpError> {
        if value.len() > MAX_HEADER_VALUE_LENGTH {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: format!(
                    "header value exceeds maximum length of {MAX_HEADER_VALUE_LENGTH} bytes"
                ),
            });
        }

        if value.chars().any(|c| c == '\r' || c == '\n' || c == '\0') {
            return Err(HttpError::InvalidHeader {
                name: name.to_string(),
                reason: "header value contains invalid characters (CR, LF, or NULL)".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
        }
    }

    pub fn has_request_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Json,
    Multipart,
    OctetStream,
    Text,
    Custom(String),
}

impl ContentType {
    pub fn as_str(&self) -> &str {
        match self {
            ContentType::Json => "application/json",
            ContentType::Multipart => "multipart/form-data",
            ContentType::OctetStream => "application/octet-stream",
            ContentType::Text => "text/plain",
            ContentType::Custom(s) => s.as_str(),
        }
    }

    pub fn from_header(value: &str) -> Self {
        let lower = value.to_lowercase();
        if lower.starts_with("application/json") {
            ContentType::Json
        } else if lower.starts_with("multipart/form-data") {
            ContentType::Multipart
        } else if lower.starts_with("application/octet-stream") {
            ContentType::OctetStream
        } else if lower.starts_with("text/plain") {
            ContentType::Text
        } else {
            ContentType::Custom(value.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequest {
    method: HttpMethod,
    url: ValidatedUrl,
    headers: HttpHeaders,
    #[serde(with = "serde_bytes")]
    body: Option<Vec<u8>>,
    request_id: String,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: ValidatedUrl) -> Self {
        Self {
            method,
            url,
            headers: HttpHeaders::new(),
            body: None,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Get, ValidatedUrl::new(url)?))
    }

    pub fn post(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Post, ValidatedUrl::new(url)?))
    }

    pub fn put(url: impl Into<String>) -> Result<Self, HttpError> {
        Ok(Self::new(HttpMethod::Put, ValidatedUrl::new(url)?))
    }

    pub fn with_header(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, HttpError> {
        self.headers.insert(name, value)?;
        Ok(self)
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Result<Self, HttpError> {
        self.check_body_allowed(body.len())?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn with_json<T: Serialize>(mut self, value: &T) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::SerializationError {
            message: e.to_string(),
        })?;
        self.check_body_allowed(body.len())?;

        self.headers.insert("Content-Type", ContentType::Json.as_str())?;
        self.body = Some(body);
        Ok(self)
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn url(&self) -> &ValidatedUrl {
        &self.url
    }

    pub fn headers(&self) -> &HttpHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    fn check_body_allowed(&self, len: usize) -> Result<(), HttpError> {
        if !self.method.has_request_body() {
            return Err(HttpError::InvalidRequest {
                reason: format!("{} requests cannot have a body", self.method.as_str()),
            });
        }

        if len > MAX_REQUEST_BODY_SIZE {
            return Err(HttpError::BodyTooLarge {
                size: len,
                max: MAX_REQUEST_BODY_SIZE,
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpOperation {
    Execute(HttpRequest),
}

impl HttpOperation {
    pub fn request(&self) -> &HttpRequest {
        match self {
            HttpOperation::Execute(request) => request,
        }
    }
}

impl Operation for HttpOperation {
    type Output = HttpResult;
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header '{name}': {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("too many headers: {count} exceeds maximum of {max}")]
    TooManyHeaders { count: usize, max: usize },

    #[error("request body too large: {size} bytes exceeds maximum of {max} bytes")]
    BodyTooLarge { size: usize, max: usize },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("connection failed to {host}: {message}")]
    ConnectionError { host: String, message: String },

    #[error("timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64, request_id: String },

    #[error("request cancelled")]
    Cancelled { request_id: String },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String, request_id: String },
}

impl HttpError {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            HttpError::Timeout { request_id, .. }
            | HttpError::Cancelled { request_id }
            | HttpError::InvalidResponse { request_id, .. } => Some(request_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    headers: HttpHeaders,
    #[serde(with = "serde_bytes")]
    body: Vec<u8>,
    request_id: String,
}

impl HttpResponse {
    pub fn new(status: u16, headers: HttpHeaders, body: Vec<u8>, request_id: String) -> Self {
        Self {
            status,
            headers,
            body,
            request_id,
        }
    }

    /// Convenience for shells and tests: a response with a JSON body.
    pub fn json_body<T: Serialize>(
        status: u16,
        value: &T,
        request_id: impl Into<String>,
    ) -> Result<Self, HttpError> {
        let body = serde_json::to_vec(value).map_err(|e| HttpError::SerializationError {
            message: e.to_string(),
        })?;
        let mut headers = HttpHeaders::new();
        headers.insert("Content-Type", ContentType::Json.as_str())?;
        Ok(Self::new(status, headers, body, request_id.into()))
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// The backend signals success with exactly 200.
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.headers.get("content-type").map(ContentType::from_header)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
            request_id: self.request_id.clone(),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;
