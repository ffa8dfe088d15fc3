use super::{Endpoint, IncomingRequest, ResponseWriter, Transport, Verb};
use crate::value::{Object, Value};
use http::header::{HeaderName, HeaderValue};
use http::StatusCode;
use regex::Regex;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

struct Binding {
    verb: Verb,
    pattern: String,
    regex: Regex,
    param_names: Vec<String>,
    endpoint: Endpoint,
}

/// In-process transport.
///
/// Bindings are matched in registration order. Requests that match no
/// binding are answered with `404 {"message": "Not Found"}` without touching
/// the router.
#[derive(Default)]
pub struct MemoryTransport {
    bindings: Vec<Binding>,
}

/// What the endpoint wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedResponse {
    pub status: StatusCode,
    pub body: Option<JsonValue>,
    /// Number of `write` calls observed; anything but 1 is a pipeline bug
    pub writes: usize,
}

/// Request builder for [`MemoryTransport::dispatch`].
#[derive(Debug, Clone)]
pub struct MemoryRequest {
    verb: Verb,
    target: String,
    headers: http::HeaderMap,
    body: Option<JsonValue>,
}

impl MemoryRequest {
    /// `target` is a path with an optional `?query` part.
    pub fn new(verb: Verb, target: impl Into<String>) -> Self {
        Self {
            verb,
            target: target.into(),
            headers: http::HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Verb::Get, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Verb::Post, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Verb::Put, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Verb::Delete, target)
    }

    /// Add a header. Names or values that are not valid HTTP are skipped.
    #[must_use]
    pub fn header(mut self, name: &str, value: &str) -> Self {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(n), Ok(v)) => {
                self.headers.append(n, v);
            }
            _ => warn!(header = %name, "Skipping invalid header"),
        }
        self
    }

    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Default)]
struct RecordingWriter {
    slot: Arc<Mutex<Vec<(StatusCode, Option<JsonValue>)>>>,
}

impl ResponseWriter for RecordingWriter {
    fn write(&mut self, status: StatusCode, body: Option<JsonValue>) {
        if let Ok(mut writes) = self.slot.lock() {
            writes.push((status, body));
        }
    }
}

/// `/users/:id` → `^/users/(?P<id>[^/]+)$`, literal segments escaped.
fn path_to_regex(path: &str) -> Result<(Regex, Vec<String>), regex::Error> {
    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut param_names = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        pattern.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            pattern.push_str("([^/]+)");
            param_names.push(name.to_string());
        } else {
            pattern.push_str(&regex::escape(segment));
        }
    }
    if param_names.is_empty() && pattern.len() == 1 {
        pattern.push('/');
    }
    pattern.push_str("/?$");
    Ok((Regex::new(&pattern)?, param_names))
}

/// Percent-decode a captured path segment. Malformed input is kept as is.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw).map_or_else(|_| raw.to_string(), |decoded| decoded.into_owned())
}

/// Query string → object. Repeated keys collect into an array.
fn parse_query(query: &str) -> Object {
    let mut out = Object::new();
    for (k, v) in url::form_urlencoded::parse(query.as_bytes()) {
        let value = Value::String(v.into_owned());
        match out.remove(k.as_ref()) {
            None => {
                out.insert(k.into_owned(), value);
            }
            Some(Value::Array(mut items)) => {
                items.push(value);
                out.insert(k.into_owned(), Value::Array(items));
            }
            Some(previous) => {
                out.insert(k.into_owned(), Value::Array(vec![previous, value]));
            }
        }
    }
    out
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound `(verb, pattern)` pairs in registration order.
    pub fn bindings(&self) -> impl Iterator<Item = (Verb, &str)> {
        self.bindings.iter().map(|b| (b.verb, b.pattern.as_str()))
    }

    /// Run `request` through the first matching binding.
    pub async fn dispatch(&self, request: MemoryRequest) -> RecordedResponse {
        let (path, query) = match request.target.split_once('?') {
            Some((p, q)) => (p.to_string(), parse_query(q)),
            None => (request.target.clone(), Object::new()),
        };

        let matched = self.bindings.iter().find_map(|b| {
            if b.verb != request.verb {
                return None;
            }
            let caps = b.regex.captures(&path)?;
            let params: BTreeMap<String, String> = b
                .param_names
                .iter()
                .enumerate()
                .filter_map(|(i, name)| caps.get(i + 1).map(|m| (name.clone(), decode_segment(m.as_str()))))
                .collect();
            Some((b, params))
        });

        let Some((binding, params)) = matched else {
            debug!(method = %request.verb, path = %path, "No binding matched");
            return RecordedResponse {
                status: StatusCode::NOT_FOUND,
                body: Some(json!({"message": "Not Found"})),
                writes: 1,
            };
        };

        let incoming = IncomingRequest {
            method: request.verb,
            path,
            params,
            query,
            headers: request.headers,
            body: request.body,
        };
        let writer = RecordingWriter::default();
        let slot = Arc::clone(&writer.slot);
        (binding.endpoint)(incoming, Box::new(writer)).await;

        let writes = slot.lock().map(|w| w.clone()).unwrap_or_default();
        match writes.first() {
            Some((status, body)) => RecordedResponse {
                status: *status,
                body: body.clone(),
                writes: writes.len(),
            },
            None => RecordedResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: None,
                writes: 0,
            },
        }
    }
}

impl Transport for MemoryTransport {
    fn register_handler(&mut self, verb: Verb, path: &str, endpoint: Endpoint) {
        match path_to_regex(path) {
            Ok((regex, param_names)) => {
                debug!(method = %verb, path = %path, "Binding endpoint");
                self.bindings.push(Binding {
                    verb,
                    pattern: path.to_string(),
                    regex,
                    param_names,
                    endpoint,
                });
            }
            Err(e) => warn!(method = %verb, path = %path, error = %e, "Could not compile path pattern"),
        }
    }
}
