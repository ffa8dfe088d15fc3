//! # Transport Module
//!
//! The narrow seam between the router and whatever actually speaks HTTP.
//!
//! ## Overview
//!
//! A transport only has to do two things for the router:
//!
//! 1. accept endpoint bindings through [`Transport::register_handler`]
//! 2. for each matching request, build an [`IncomingRequest`] and hand it to
//!    the endpoint together with a [`ResponseWriter`]
//!
//! Listening, connection handling and routing-table mechanics stay on the
//! transport side. [`MemoryTransport`] is the in-process implementation used
//! by tests and benchmarks.

mod memory;

pub use memory::{MemoryRequest, MemoryTransport, RecordedResponse};

use crate::value::Object;
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Transport-level HTTP verbs the router binds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Verb> for http::Method {
    fn from(verb: Verb) -> Self {
        match verb {
            Verb::Get => http::Method::GET,
            Verb::Post => http::Method::POST,
            Verb::Put => http::Method::PUT,
            Verb::Delete => http::Method::DELETE,
        }
    }
}

/// A request as handed over by the transport.
///
/// Path parameters arrive as raw strings and query values as strings (or
/// arrays of strings for repeated keys); schemas with coercion turn them into
/// typed values.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub method: Verb,
    /// Full request path including the mount path
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub query: Object,
    pub headers: HeaderMap,
    pub body: Option<JsonValue>,
}

impl IncomingRequest {
    #[must_use]
    pub fn new(method: Verb, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: BTreeMap::new(),
            query: Object::new(),
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

/// Response side of one request. The pipeline writes exactly once.
pub trait ResponseWriter: Send {
    fn write(&mut self, status: StatusCode, body: Option<JsonValue>);
}

/// Callback bound to a transport path.
pub type Endpoint =
    Arc<dyn Fn(IncomingRequest, Box<dyn ResponseWriter>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Anything the router can bind routes to.
pub trait Transport {
    /// Bind `endpoint` to `verb` requests matching `path` (`:name` segments
    /// are parameters).
    fn register_handler(&mut self, verb: Verb, path: &str, endpoint: Endpoint);
}
