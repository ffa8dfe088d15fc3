//! # Router Module
//!
//! Route registry: owns the registered routes, rejects ambiguous ones and
//! binds each to the transport.
//!
//! ## Overview
//!
//! Uniqueness is decided on a normalized key. Parameter segments are matched
//! by position, not by name, so `/users/:id` and `/users/:name` collide:
//!
//! ```text
//! GET /users/:id   →  GET /users/:2
//! ```
//!
//! Routes are bound under `mount_path + url` (the mount path loses one
//! trailing slash). `rpc` routes are bound to POST but keep their own method
//! so documentation can tell them apart.
//!
//! ## Example
//!
//! ```rust
//! use schemaroute::router::{RouteConfig, Router};
//! use schemaroute::schema::Schema;
//! use schemaroute::transport::MemoryTransport;
//! use schemaroute::{Reply, RouterConfig};
//!
//! let mut router = Router::new(MemoryTransport::new(), RouterConfig::default());
//! router
//!     .get(
//!         "/:id",
//!         RouteConfig::new(|ctx| async move {
//!             Ok(Reply::Value(ctx.params.get("id").cloned().unwrap_or_default()))
//!         })
//!         .public()
//!         .param("id", Schema::number().coerce()),
//!     )
//!     .expect("unique route");
//! assert_eq!(router.routes()[0].key(), "GET /:1");
//! ```

mod core;
mod route;

pub use core::{route_key, Router, RouterBuilder};
pub use route::{Method, Route, RouteConfig, RouteDoc};
