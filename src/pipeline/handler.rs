use crate::error::ApiError;
use crate::ids::RequestId;
use crate::security::Session;
use crate::services::{RequestContainer, ResolvedServices};
use crate::value::Value;
use futures::future::BoxFuture;
use serde::Serialize;
use std::future::Future;

/// Everything a handler receives for one request.
///
/// `params`, `query`, `body` and `headers` hold the coerced values produced
/// by the route's schemas; facets without a schema are empty objects.
pub struct HandlerContext {
    pub params: Value,
    pub query: Value,
    pub body: Value,
    pub headers: Value,
    pub services: ResolvedServices,
    /// Always present on non-public routes
    pub session: Option<Session>,
    /// Ad-hoc lookups within the same scope as `services`
    pub container: RequestContainer,
    pub request_id: RequestId,
}

impl HandlerContext {
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }
}

/// What a handler settles with when it does not raise an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// 200 without a body
    Empty,
    Value(Value),
    /// Business error, answered with the message from the route's catalog
    Error(ApiError),
}

impl Reply {
    /// Serialize `value` into a reply.
    ///
    /// # Errors
    ///
    /// Fails when `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> anyhow::Result<Self> {
        Ok(Reply::Value(Value::from_serialize(value)?))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Value(value)
    }
}

impl From<ApiError> for Reply {
    fn from(err: ApiError) -> Self {
        Reply::Error(err)
    }
}

/// User code bound to a route.
///
/// The returned future runs on its own task. If the route's timeout fires
/// first, the future is left running in the background and whatever it
/// eventually produces is discarded.
pub trait RouteHandler: Send + Sync + 'static {
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, anyhow::Result<Reply>>;
}

impl<F, Fut> RouteHandler for F
where
    F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn call(&self, ctx: HandlerContext) -> BoxFuture<'static, anyhow::Result<Reply>> {
        Box::pin(self(ctx))
    }
}
