//! # Error Taxonomy
//!
//! Closed set of status-bearing errors the pipeline can produce.
//!
//! | Kind                 | Status | Default message       |
//! |----------------------|--------|-----------------------|
//! | `InvalidRequest`     | 400    | `Invalid Request`     |
//! | `Unauthorized`       | 401    | `Unauthorized`        |
//! | `Forbidden`          | 403    | `Forbidden`           |
//! | `NotFound`           | 404    | `Not Found`           |
//! | `ServerError`        | 500    | `Server Error`        |
//! | `ServiceUnavailable` | 503    | `Service Unavailable` |
//!
//! [`ApiError`] is the business-level variant: a 400 carrying a code from the
//! route's error catalog. Handlers *return* it (see [`crate::Reply`]) while
//! [`HttpError`] is *raised* through `anyhow::Error`; the pipeline folds both
//! into a single [`crate::Outcome`].
//!
//! Every error can carry a diagnostic payload (`devInfo`). It is always handed
//! to the request logger, but [`HttpError::to_json`] only serializes it when
//! diagnostics are enabled.

use http::StatusCode;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::fmt;

/// Status ladder of the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpErrorKind {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    ServerError,
    ServiceUnavailable,
}

impl HttpErrorKind {
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            HttpErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
            HttpErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            HttpErrorKind::Forbidden => StatusCode::FORBIDDEN,
            HttpErrorKind::NotFound => StatusCode::NOT_FOUND,
            HttpErrorKind::ServerError => StatusCode::INTERNAL_SERVER_ERROR,
            HttpErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    #[must_use]
    pub fn default_message(self) -> &'static str {
        match self {
            HttpErrorKind::InvalidRequest => "Invalid Request",
            HttpErrorKind::Unauthorized => "Unauthorized",
            HttpErrorKind::Forbidden => "Forbidden",
            HttpErrorKind::NotFound => "Not Found",
            HttpErrorKind::ServerError => "Server Error",
            HttpErrorKind::ServiceUnavailable => "Service Unavailable",
        }
    }
}

impl fmt::Display for HttpErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status().as_u16(), self.default_message())
    }
}

/// A status-bearing error with an optional diagnostic payload.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    kind: HttpErrorKind,
    message: String,
    dev_info: Option<JsonValue>,
}

impl HttpError {
    /// Error of `kind` with its default message.
    #[must_use]
    pub fn new(kind: HttpErrorKind) -> Self {
        Self {
            kind,
            message: kind.default_message().to_string(),
            dev_info: None,
        }
    }

    #[must_use]
    pub fn invalid_request() -> Self {
        Self::new(HttpErrorKind::InvalidRequest)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(HttpErrorKind::Unauthorized)
    }

    #[must_use]
    pub fn forbidden() -> Self {
        Self::new(HttpErrorKind::Forbidden)
    }

    #[must_use]
    pub fn not_found() -> Self {
        Self::new(HttpErrorKind::NotFound)
    }

    #[must_use]
    pub fn server_error() -> Self {
        Self::new(HttpErrorKind::ServerError)
    }

    #[must_use]
    pub fn service_unavailable() -> Self {
        Self::new(HttpErrorKind::ServiceUnavailable)
    }

    /// Replace the default message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach a diagnostic payload.
    #[must_use]
    pub fn with_dev_info(mut self, info: JsonValue) -> Self {
        self.dev_info = Some(info);
        self
    }

    #[must_use]
    pub fn kind(&self) -> HttpErrorKind {
        self.kind
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn dev_info(&self) -> Option<&JsonValue> {
        self.dev_info.as_ref()
    }

    /// Wire form: `{message}` plus `devInfo` when `dev_mode` is set.
    #[must_use]
    pub fn to_json(&self, dev_mode: bool) -> JsonValue {
        let mut body = JsonMap::new();
        body.insert("message".into(), JsonValue::String(self.message.clone()));
        if dev_mode {
            if let Some(info) = &self.dev_info {
                body.insert("devInfo".into(), info.clone());
            }
        }
        JsonValue::Object(body)
    }
}

/// Business error returned by a handler.
///
/// Carries only a `code`; the message is resolved from the route's error
/// catalog when the pipeline classifies the outcome.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("api error {code}")]
pub struct ApiError {
    code: String,
    message: Option<String>,
    dev_info: Option<JsonValue>,
}

impl ApiError {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: None,
            dev_info: None,
        }
    }

    #[must_use]
    pub fn with_dev_info(mut self, info: JsonValue) -> Self {
        self.dev_info = Some(info);
        self
    }

    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Message resolved from the catalog, or `Invalid Request` when the code
    /// is not declared by the route.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or(HttpErrorKind::InvalidRequest.default_message())
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        HttpErrorKind::InvalidRequest.status()
    }

    #[must_use]
    pub fn dev_info(&self) -> Option<&JsonValue> {
        self.dev_info.as_ref()
    }

    /// Look the code up in `catalog`. Undeclared codes keep the default message.
    pub(crate) fn resolve_message<'a>(
        mut self,
        catalog: impl Fn(&str) -> Option<&'a str>,
    ) -> Self {
        self.message = catalog(&self.code).map(str::to_string);
        self
    }

    /// Wire form: `{message, code}` plus `devInfo` when `dev_mode` is set.
    #[must_use]
    pub fn to_json(&self, dev_mode: bool) -> JsonValue {
        let mut body = JsonMap::new();
        body.insert("message".into(), JsonValue::String(self.message().to_string()));
        body.insert("code".into(), JsonValue::String(self.code.clone()));
        if dev_mode {
            if let Some(info) = &self.dev_info {
                body.insert("devInfo".into(), info.clone());
            }
        }
        JsonValue::Object(body)
    }
}

/// Two routes normalize to the same key. Raised at registration time only.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Ambiguous route: {key}")]
pub struct ConflictError {
    pub key: String,
}

/// Diagnostic payload for an error that is not part of the taxonomy:
/// `{message, stack}` with one `stack` entry per cause in the chain.
#[must_use]
pub fn unknown_error_payload(err: &anyhow::Error) -> JsonValue {
    let stack: Vec<String> = err.chain().map(ToString::to_string).collect();
    json!({ "message": err.to_string(), "stack": stack })
}
