//! # schemaroute
//!
//! **schemaroute** is a typed request pipeline for Rust HTTP services. Every
//! route declares schemas for its inputs and output, an access requirement,
//! the services it depends on and a catalog of business errors; the pipeline
//! turns each incoming request into exactly one well-formed response.
//!
//! ## Architecture
//!
//! - **[`router`]** - route registry, uniqueness check and transport binding
//! - **[`pipeline`]** - per-request state machine, handler invocation and
//!   outcome classification
//! - **[`schema`]** - validation adapter over JSON Schema, plus an inline shorthand
//! - **[`security`]** - sessions and permission checks
//! - **[`services`]** - dependency resolution for handlers
//! - **[`error`]** - the status-bearing error taxonomy
//! - **[`encoding`]** - tagged date encoding for generated clients
//! - **[`transport`]** - the seam to the HTTP server, plus an in-memory transport
//! - **[`logging`]** - buffered per-request loggers on top of `tracing`
//! - **[`runtime_config`]** - router configuration from code, YAML or environment
//!
//! ### Request Handling Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Transport
//!     participant Pipeline as RequestPipeline
//!     participant Schema as SchemaDescriptor
//!     participant Auth as Session/Permission
//!     participant Services as ServiceResolver
//!     participant Handler as Handler<br/>(tokio task)
//!
//!     Client->>Transport: GET /api/users/42
//!     Transport->>Pipeline: IncomingRequest + ResponseWriter
//!     Pipeline->>Schema: validate params, query, body, headers
//!     alt Any facet invalid
//!         Pipeline-->>Client: 400 with every issue
//!     end
//!     Pipeline->>Auth: session? permission?
//!     alt No session / refused
//!         Pipeline-->>Client: 401 / 403
//!     end
//!     Pipeline->>Services: resolve declared dependencies
//!     Pipeline->>Handler: spawn, race against timeout
//!     alt Timeout wins
//!         Pipeline-->>Client: 503 (handler keeps running)
//!     end
//!     Handler-->>Pipeline: Reply / error
//!     Pipeline->>Schema: check response contract
//!     Pipeline-->>Client: 200 / 400 / 500
//!     Pipeline->>Pipeline: slow-response check, flush logger
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use schemaroute::router::{RouteConfig, Router};
//! use schemaroute::schema::JsonSchemaDescriptor;
//! use schemaroute::transport::{MemoryRequest, MemoryTransport};
//! use schemaroute::{Reply, RouterConfig, Value};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let n = JsonSchemaDescriptor::compile(json!({"type": "integer"}))
//!     .expect("valid schema")
//!     .coerce();
//! let mut router = Router::new(MemoryTransport::new(), RouterConfig::default());
//! router
//!     .get(
//!         "/double/:n",
//!         RouteConfig::new(|ctx| async move {
//!             let n = ctx.param("n").and_then(Value::as_i64).unwrap_or_default();
//!             Ok(Reply::Value(Value::from(n * 2)))
//!         })
//!         .public()
//!         .param("n", n),
//!     )
//!     .expect("unique route");
//!
//! let response = router.transport().dispatch(MemoryRequest::get("/double/21")).await;
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, Some(json!(42)));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Handlers return `anyhow::Result<Reply>`. A business error is returned as
//! [`Reply::Error`]; an [`HttpError`] raised through `anyhow` keeps its status;
//! anything else, including a panic, becomes a 500. Diagnostics (`devInfo`)
//! are only serialized in the development environment.

pub mod encoding;
pub mod error;
pub mod ids;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod router;
pub mod runtime_config;
pub mod schema;
pub mod security;
pub mod services;
pub mod transport;
pub mod value;

pub use error::{ApiError, ConflictError, HttpError, HttpErrorKind};
pub use pipeline::{HandlerContext, Outcome, Reply, RouteHandler};
pub use router::{Method, Route, RouteConfig, Router};
pub use runtime_config::{Environment, RouterConfig};
pub use security::{Auth, Session};
pub use value::Value;
