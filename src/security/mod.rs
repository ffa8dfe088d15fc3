//! # Security Module
//!
//! Authorization gate of the request pipeline.
//!
//! ## Overview
//!
//! Every route carries an [`Auth`] requirement:
//!
//! - [`Auth::Public`] - no session needed, the gate is skipped entirely
//! - [`Auth::Private`] (the default) - a session must be present
//! - [`Auth::Permission`] - a session must be present **and** the
//!   [`PermissionChecker`] must grant the named permission
//!
//! The crate never creates sessions. A [`SessionProvider`] extracts one from
//! the request (cookie, bearer token, upstream gateway header...), and a
//! [`PermissionChecker`] answers permission questions asynchronously.
//!
//! ## Example
//!
//! ```rust
//! use schemaroute::security::{RequestContext, Session, SessionProvider};
//!
//! struct HeaderSessions;
//!
//! impl SessionProvider for HeaderSessions {
//!     fn session(&self, req: &RequestContext<'_>) -> Option<Session> {
//!         req.get_header("x-user").map(|user| Session::new("token", user))
//!     }
//! }
//! ```

use crate::transport::{IncomingRequest, Verb};
use crate::value::{Object, Value};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;

/// Access requirement of a route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Auth {
    /// Session required
    #[default]
    Private,
    /// Anyone may call the route
    Public,
    /// Session required and the permission token must be granted
    Permission(String),
}

impl Auth {
    #[must_use]
    pub fn permission(token: impl Into<String>) -> Self {
        Auth::Permission(token.into())
    }

    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Auth::Public)
    }

    #[must_use]
    pub fn required_permission(&self) -> Option<&str> {
        match self {
            Auth::Permission(token) => Some(token),
            _ => None,
        }
    }
}

/// Authenticated caller, supplied by a [`SessionProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: String,
    pub expires_on: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(access_token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            user_id: user_id.into(),
            expires_on: None,
        }
    }

    #[must_use]
    pub fn expiring(mut self, at: DateTime<Utc>) -> Self {
        self.expires_on = Some(at);
        self
    }
}

/// Read-only view of the request used by authorization collaborators.
pub struct RequestContext<'a> {
    pub method: Verb,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    pub query: &'a Object,
}

impl<'a> RequestContext<'a> {
    #[must_use]
    pub fn from_request(req: &'a IncomingRequest) -> Self {
        Self {
            method: req.method,
            path: &req.path,
            headers: &req.headers,
            query: &req.query,
        }
    }

    /// Get a header by name (case-insensitive)
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a query parameter by name; the first value for repeated keys
    #[must_use]
    pub fn get_query(&self, name: &str) -> Option<&'a str> {
        match self.query.get(name)? {
            Value::String(s) => Some(s),
            Value::Array(items) => items.first().and_then(Value::as_str),
            _ => None,
        }
    }

    /// Get a cookie by name from the `Cookie` header
    #[must_use]
    pub fn get_cookie(&self, name: &str) -> Option<&'a str> {
        self.headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }
}

/// Extracts the session of a request, if any.
pub trait SessionProvider: Send + Sync {
    fn session(&self, req: &RequestContext<'_>) -> Option<Session>;
}

impl<F> SessionProvider for F
where
    F: Fn(&RequestContext<'_>) -> Option<Session> + Send + Sync,
{
    fn session(&self, req: &RequestContext<'_>) -> Option<Session> {
        self(req)
    }
}

/// Provider for services without sessions; every private route answers 401.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSessions;

impl SessionProvider for NoSessions {
    fn session(&self, _req: &RequestContext<'_>) -> Option<Session> {
        None
    }
}

/// Asynchronous permission decision for routes with [`Auth::Permission`].
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn check(&self, req: &RequestContext<'_>, session: &Session, permission: &str) -> bool;
}

/// Grants every permission.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

#[async_trait]
impl PermissionChecker for AllowAll {
    async fn check(&self, _req: &RequestContext<'_>, _session: &Session, _permission: &str) -> bool {
        true
    }
}
