//! # Pipeline Module
//!
//! Per-request state machine that turns an [`crate::transport::IncomingRequest`]
//! into exactly one response.
//!
//! ## Stages
//!
//! ```text
//! Received → Parsed → Authorized → ServicesResolved → Invoked → Classified → Sent
//! ```
//!
//! 1. **parse** - every facet is validated; issues from all facets are
//!    reported together as a 400
//! 2. **auth** - public routes skip it; otherwise a session is required
//!    (401) and a declared permission must be granted (403)
//! 3. **services** - declared dependencies are resolved; any failure is a 500
//! 4. **invoke** - the handler runs on its own tokio task, raced against the
//!    configured timeout
//! 5. **classify** - the settled handler becomes one [`Outcome`]; a timeout
//!    becomes a 503, a business error a 400 with the catalog message, and a
//!    response that breaks the route's response schema a 500
//! 6. **send** - one write to the transport, tagged encoding for generated
//!    clients
//!
//! After the send, whatever the path: slow responses are logged, metrics are
//! recorded and the request logger is flushed exactly once.
//!
//! ## Timeouts
//!
//! A handler that loses the timeout race is **abandoned, not cancelled**. Its
//! task keeps running to completion (with any side effects it has) and its
//! result is discarded. The response already sent is never changed.

mod core;
mod handler;
mod outcome;

pub use core::{ParsedRequest, PipelineContext, PipelineState, RequestPipeline, SendError};
pub use handler::{HandlerContext, Reply, RouteHandler};
pub use outcome::{Outcome, Rejection};
