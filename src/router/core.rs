use super::route::{Method, Route, RouteConfig};
use crate::error::ConflictError;
use crate::logging::{LoggerProvider, TracingLoggers};
use crate::metrics::PipelineMetrics;
use crate::pipeline::{PipelineContext, RequestPipeline};
use crate::runtime_config::RouterConfig;
use crate::security::{AllowAll, NoSessions, PermissionChecker, SessionProvider};
use crate::services::{ServiceRegistry, ServiceResolver};
use crate::transport::{Endpoint, IncomingRequest, ResponseWriter, Transport};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Normalized uniqueness key: `METHOD` and the url with each `:name`
/// segment replaced by `:<segment index>`.
///
/// `GET /:id` and `GET /:slug` share the key `GET /:1`.
#[must_use]
pub fn route_key(method: Method, url: &str) -> String {
    let normalized = url
        .split('/')
        .enumerate()
        .map(|(i, segment)| {
            if segment.starts_with(':') {
                format!(":{i}")
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/");
    format!("{} {normalized}", method.as_str())
}

/// Strip one trailing slash so `mount_path + url` never doubles it.
fn normalize_mount_path(mount_path: &str) -> String {
    mount_path.strip_suffix('/').unwrap_or(mount_path).to_string()
}

/// Collaborators for [`Router::builder`]. Unset ones fall back to
/// [`NoSessions`], [`AllowAll`], an empty [`ServiceRegistry`] and
/// [`TracingLoggers`].
pub struct RouterBuilder<T: Transport> {
    transport: T,
    config: RouterConfig,
    sessions: Arc<dyn SessionProvider>,
    permissions: Arc<dyn PermissionChecker>,
    resolver: Arc<dyn ServiceResolver>,
    loggers: Arc<dyn LoggerProvider>,
}

impl<T: Transport> RouterBuilder<T> {
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn sessions(mut self, sessions: impl SessionProvider + 'static) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    #[must_use]
    pub fn permissions(mut self, permissions: impl PermissionChecker + 'static) -> Self {
        self.permissions = Arc::new(permissions);
        self
    }

    #[must_use]
    pub fn resolver(mut self, resolver: impl ServiceResolver + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    #[must_use]
    pub fn loggers(mut self, loggers: impl LoggerProvider + 'static) -> Self {
        self.loggers = Arc::new(loggers);
        self
    }

    #[must_use]
    pub fn build(self) -> Router<T> {
        let mut config = self.config;
        config.mount_path = normalize_mount_path(&config.mount_path);
        info!(
            mount_path = %config.mount_path,
            environment = ?config.environment,
            handler_timeout_ms = ?config.handler_timeout.map(|d| d.as_millis()),
            "Router created"
        );
        Router {
            transport: self.transport,
            shared: Arc::new(PipelineContext {
                config,
                sessions: self.sessions,
                permissions: self.permissions,
                resolver: self.resolver,
                loggers: self.loggers,
                metrics: Arc::new(PipelineMetrics::new()),
            }),
            routes: Vec::new(),
            lookup: HashMap::new(),
        }
    }
}

/// Owns the registered routes and binds each one to the transport.
///
/// Registration happens up front; afterwards the route table is only read.
pub struct Router<T: Transport> {
    transport: T,
    shared: Arc<PipelineContext>,
    routes: Vec<Arc<Route>>,
    lookup: HashMap<String, usize>,
}

impl<T: Transport> Router<T> {
    /// Router with default collaborators and configuration.
    #[must_use]
    pub fn new(transport: T, config: RouterConfig) -> Self {
        Self::builder(transport).config(config).build()
    }

    #[must_use]
    pub fn builder(transport: T) -> RouterBuilder<T> {
        RouterBuilder {
            transport,
            config: RouterConfig::default(),
            sessions: Arc::new(NoSessions),
            permissions: Arc::new(AllowAll),
            resolver: Arc::new(ServiceRegistry::new()),
            loggers: Arc::new(TracingLoggers),
        }
    }

    /// Register a route and bind it under `mount_path + url`.
    ///
    /// # Errors
    ///
    /// [`ConflictError`] when a route with the same normalized key exists.
    pub fn register(
        &mut self,
        method: Method,
        url: &str,
        config: RouteConfig,
    ) -> Result<&Route, ConflictError> {
        let key = route_key(method, url);
        if self.lookup.contains_key(&key) {
            return Err(ConflictError { key });
        }

        let route = Arc::new(Route {
            key: key.clone(),
            method,
            url: url.to_string(),
            config,
        });
        let path = format!("{}{url}", self.shared.config.mount_path);
        debug!(route = %key, path = %path, verb = %method.verb(), "Registering route");

        let endpoint: Endpoint = {
            let route = Arc::clone(&route);
            let shared = Arc::clone(&self.shared);
            Arc::new(
                move |request: IncomingRequest, writer: Box<dyn ResponseWriter>| -> BoxFuture<'static, ()> {
                    let pipeline =
                        RequestPipeline::new(Arc::clone(&route), Arc::clone(&shared), request, writer);
                    Box::pin(pipeline.execute())
                },
            )
        };
        self.transport.register_handler(method.verb(), &path, endpoint);

        let index = self.routes.len();
        self.routes.push(route);
        self.lookup.insert(key, index);
        Ok(&self.routes[index])
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn get(&mut self, url: &str, config: RouteConfig) -> Result<&Route, ConflictError> {
        self.register(Method::Get, url, config)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn post(&mut self, url: &str, config: RouteConfig) -> Result<&Route, ConflictError> {
        self.register(Method::Post, url, config)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn put(&mut self, url: &str, config: RouteConfig) -> Result<&Route, ConflictError> {
        self.register(Method::Put, url, config)
    }

    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn delete(&mut self, url: &str, config: RouteConfig) -> Result<&Route, ConflictError> {
        self.register(Method::Delete, url, config)
    }

    /// Register an RPC route, served over POST and flagged [`Route::is_rpc`].
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn rpc(&mut self, url: &str, config: RouteConfig) -> Result<&Route, ConflictError> {
        self.register(Method::Rpc, url, config)
    }

    /// Registered routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn route(&self, key: &str) -> Option<&Route> {
        self.lookup.get(key).map(|&i| self.routes[i].as_ref())
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn metrics(&self) -> &PipelineMetrics {
        &self.shared.metrics
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn into_transport(self) -> T {
        self.transport
    }
}
