use crate::pipeline::{HandlerContext, Reply, RouteHandler};
use crate::schema::{FieldSchemas, SchemaDescriptor, SchemaRef};
use crate::security::Auth;
use crate::services::ServiceDescriptor;
use crate::transport::Verb;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Registration method of a route. `Rpc` routes are served over POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Rpc,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Rpc => "RPC",
        }
    }

    /// Transport verb the route is bound to.
    #[must_use]
    pub fn verb(self) -> Verb {
        match self {
            Method::Get => Verb::Get,
            Method::Post | Method::Rpc => Verb::Post,
            Method::Put => Verb::Put,
            Method::Delete => Verb::Delete,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Documentation metadata. Ignored by the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteDoc {
    pub title: Option<String>,
    pub description: Option<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: bool,
    pub deprecation_reason: Option<String>,
}

/// Everything declared for one route.
pub struct RouteConfig {
    pub auth: Auth,
    pub params: FieldSchemas,
    pub query: FieldSchemas,
    pub headers: FieldSchemas,
    pub body: Option<SchemaRef>,
    pub response: Option<SchemaRef>,
    /// Business error catalog: code → message
    pub errors: BTreeMap<String, String>,
    /// Handler-visible name → dependency
    pub services: Vec<(String, ServiceDescriptor)>,
    pub handler: Arc<dyn RouteHandler>,
    pub doc: RouteDoc,
}

impl RouteConfig {
    /// Private route with no schemas around an async closure.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(HandlerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
    {
        Self::with_handler(handler)
    }

    /// Like [`RouteConfig::new`] for types implementing [`RouteHandler`].
    pub fn with_handler(handler: impl RouteHandler) -> Self {
        Self {
            auth: Auth::default(),
            params: FieldSchemas::new(),
            query: FieldSchemas::new(),
            headers: FieldSchemas::new(),
            body: None,
            response: None,
            errors: BTreeMap::new(),
            services: Vec::new(),
            handler: Arc::new(handler),
            doc: RouteDoc::default(),
        }
    }

    #[must_use]
    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn public(self) -> Self {
        self.auth(Auth::Public)
    }

    #[must_use]
    pub fn permission(self, token: impl Into<String>) -> Self {
        self.auth(Auth::Permission(token.into()))
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, schema: impl SchemaDescriptor + 'static) -> Self {
        self.params.insert(name, Arc::new(schema));
        self
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, schema: impl SchemaDescriptor + 'static) -> Self {
        self.query.insert(name, Arc::new(schema));
        self
    }

    /// Declare a header field. Lookup is case-insensitive; the parsed value
    /// is keyed by `name` as written here.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, schema: impl SchemaDescriptor + 'static) -> Self {
        self.headers.insert(name, Arc::new(schema));
        self
    }

    #[must_use]
    pub fn body(mut self, schema: impl SchemaDescriptor + 'static) -> Self {
        self.body = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn response(mut self, schema: impl SchemaDescriptor + 'static) -> Self {
        self.response = Some(Arc::new(schema));
        self
    }

    #[must_use]
    pub fn error(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors.insert(code.into(), message.into());
        self
    }

    #[must_use]
    pub fn service(mut self, name: impl Into<String>, descriptor: ServiceDescriptor) -> Self {
        self.services.push((name.into(), descriptor));
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.doc.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.doc.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn section(mut self, section: impl Into<String>) -> Self {
        self.doc.section = Some(section.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.doc.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self, reason: Option<&str>) -> Self {
        self.doc.deprecated = true;
        self.doc.deprecation_reason = reason.map(str::to_string);
        self
    }
}

impl fmt::Debug for RouteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteConfig")
            .field("auth", &self.auth)
            .field("params", &self.params)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body.is_some())
            .field("response", &self.response.is_some())
            .field("errors", &self.errors)
            .field("services", &self.services)
            .field("doc", &self.doc)
            .finish_non_exhaustive()
    }
}

/// A registered route. Immutable once registered.
#[derive(Debug)]
pub struct Route {
    pub(crate) key: String,
    pub(crate) method: Method,
    pub(crate) url: String,
    pub(crate) config: RouteConfig,
}

impl Route {
    /// `METHOD` plus the url with every `:name` segment replaced by `:<index>`.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Url as registered, without the mount path.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn config(&self) -> &RouteConfig {
        &self.config
    }

    #[must_use]
    pub fn is_rpc(&self) -> bool {
        self.method == Method::Rpc
    }

    /// JSON description of the route for documentation and client generators.
    #[must_use]
    pub fn describe(&self) -> JsonValue {
        let config = &self.config;
        let auth = match &config.auth {
            Auth::Public => json!("public"),
            Auth::Private => json!("private"),
            Auth::Permission(token) => json!({ "permission": token }),
        };

        let mut doc = JsonMap::new();
        doc.insert("key".into(), json!(self.key));
        doc.insert("method".into(), json!(self.method.as_str()));
        doc.insert("url".into(), json!(self.url));
        doc.insert("isRpc".into(), json!(self.is_rpc()));
        doc.insert("auth".into(), auth);
        for (facet, fields) in [
            ("params", &config.params),
            ("query", &config.query),
            ("headers", &config.headers),
        ] {
            if !fields.is_empty() {
                doc.insert(facet.into(), fields.json_schema());
            }
        }
        if let Some(body) = &config.body {
            doc.insert("body".into(), body.json_schema());
        }
        if let Some(response) = &config.response {
            doc.insert("response".into(), response.json_schema());
        }
        if !config.errors.is_empty() {
            doc.insert("errors".into(), json!(config.errors));
        }
        if !config.services.is_empty() {
            let names: Vec<&str> = config.services.iter().map(|(n, _)| n.as_str()).collect();
            doc.insert("services".into(), json!(names));
        }

        let meta = &config.doc;
        for (name, value) in [
            ("title", &meta.title),
            ("description", &meta.description),
            ("section", &meta.section),
        ] {
            if let Some(value) = value {
                doc.insert(name.into(), json!(value));
            }
        }
        if !meta.tags.is_empty() {
            doc.insert("tags".into(), json!(meta.tags));
        }
        if meta.deprecated {
            let deprecated = match &meta.deprecation_reason {
                Some(reason) => json!(reason),
                None => json!(true),
            };
            doc.insert("deprecated".into(), deprecated);
        }
        JsonValue::Object(doc)
    }
}
