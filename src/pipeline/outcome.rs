use super::handler::Reply;
use crate::error::{ApiError, HttpError};
use crate::value::Value;
use http::StatusCode;
use std::any::Any;
use tokio::task::JoinError;

/// Classification of one handler invocation. Exactly one per request.
#[derive(Debug)]
pub enum Outcome {
    /// The handler settled normally; `None` for [`Reply::Empty`]
    Success(Option<Value>),
    /// Business error returned (or raised) by the handler
    ApiError(ApiError),
    /// Taxonomy error raised by the handler
    HttpError(HttpError),
    /// The timeout won the race; the handler task was abandoned
    Timeout,
    /// Anything else the handler raised, including panics
    Unknown(anyhow::Error),
}

impl Outcome {
    /// Fold a settled handler result into an outcome.
    ///
    /// Returned [`Reply::Error`]s and raised [`HttpError`]s keep their kind;
    /// every other raised error is `Unknown`.
    #[must_use]
    pub fn from_result(result: anyhow::Result<Reply>) -> Self {
        match result {
            Ok(Reply::Empty) => Outcome::Success(None),
            Ok(Reply::Value(v)) => Outcome::Success(Some(v)),
            Ok(Reply::Error(e)) => Outcome::ApiError(e),
            Err(err) => match err.downcast::<HttpError>() {
                Ok(http) => Outcome::HttpError(http),
                Err(err) => match err.downcast::<ApiError>() {
                    Ok(api) => Outcome::ApiError(api),
                    Err(other) => Outcome::Unknown(other),
                },
            },
        }
    }

    pub(crate) fn from_join(joined: Result<anyhow::Result<Reply>, JoinError>) -> Self {
        match joined {
            Ok(result) => Self::from_result(result),
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic().as_ref());
                Outcome::Unknown(anyhow::anyhow!("handler panicked: {message}"))
            }
            Err(err) => Outcome::Unknown(anyhow::Error::new(err).context("handler task failed")),
        }
    }

    /// Status this outcome is answered with before response validation.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Outcome::Success(_) => StatusCode::OK,
            Outcome::ApiError(e) => e.status(),
            Outcome::HttpError(e) => e.status(),
            Outcome::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            Outcome::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A stage stopped the request; the error is what gets sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    Api(ApiError),
    Http(HttpError),
}

impl Rejection {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Api(e) => e.status(),
            Rejection::Http(e) => e.status(),
        }
    }

    #[must_use]
    pub fn to_json(&self, dev_mode: bool) -> serde_json::Value {
        match self {
            Rejection::Api(e) => e.to_json(dev_mode),
            Rejection::Http(e) => e.to_json(dev_mode),
        }
    }
}

impl From<HttpError> for Rejection {
    fn from(err: HttpError) -> Self {
        Rejection::Http(err)
    }
}

impl From<ApiError> for Rejection {
    fn from(err: ApiError) -> Self {
        Rejection::Api(err)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
