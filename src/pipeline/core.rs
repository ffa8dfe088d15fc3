use super::handler::HandlerContext;
use super::outcome::{panic_message, Outcome, Rejection};
use crate::encoding::{encode_tagged, is_generated_client};
use crate::error::{unknown_error_payload, HttpError};
use crate::ids::RequestId;
use crate::logging::{LogLevel, LoggerProvider, RequestLogger};
use crate::metrics::PipelineMetrics;
use crate::router::Route;
use crate::runtime_config::RouterConfig;
use crate::schema::{validate_fields, validate_value, Facet, FacetReport, SchemaFault, Validation};
use crate::security::{PermissionChecker, RequestContext, Session, SessionProvider};
use crate::services::{RequestContainer, ResolvedServices, ServiceResolver, ServiceScope};
use crate::transport::{IncomingRequest, ResponseWriter};
use crate::value::{format_date, Object, Value};
use futures::FutureExt;
use http::StatusCode;
use serde_json::{json, Map as JsonMap, Value as JsonValue};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// Collaborators shared by every pipeline of one router.
pub struct PipelineContext {
    pub config: RouterConfig,
    pub sessions: Arc<dyn SessionProvider>,
    pub permissions: Arc<dyn PermissionChecker>,
    pub resolver: Arc<dyn ServiceResolver>,
    pub loggers: Arc<dyn LoggerProvider>,
    pub metrics: Arc<PipelineMetrics>,
}

/// Forward-only lifecycle of one pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineState {
    Received,
    Parsed,
    Authorized,
    ServicesResolved,
    Invoked,
    Classified,
    Sent,
}

/// Coerced request facets. Facets without a schema are empty objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRequest {
    pub params: Value,
    pub query: Value,
    pub body: Value,
    pub headers: Value,
}

#[derive(Debug, thiserror::Error)]
#[error("response already sent with status {0}")]
pub struct SendError(pub StatusCode);

/// State machine for exactly one request.
///
/// Stages run in order: parse → auth → services → handler → classification
/// → send. A failing stage skips straight to sending its error. Elapsed
/// time, metrics and the logger flush happen after the send on every path.
pub struct RequestPipeline {
    route: Arc<Route>,
    shared: Arc<PipelineContext>,
    request: IncomingRequest,
    writer: Box<dyn ResponseWriter>,
    logger: Box<dyn RequestLogger>,
    session: Option<Session>,
    request_id: RequestId,
    state: PipelineState,
    scope: ServiceScope,
    sent: Option<StatusCode>,
    timed_out: bool,
}

impl RequestPipeline {
    pub fn new(
        route: Arc<Route>,
        shared: Arc<PipelineContext>,
        request: IncomingRequest,
        writer: Box<dyn ResponseWriter>,
    ) -> Self {
        let request_id = RequestId::from_headers(&request.headers);
        let logger = shared.loggers.logger(request_id, route.key());
        let session = shared.sessions.session(&RequestContext::from_request(&request));
        Self {
            route,
            shared,
            request,
            writer,
            logger,
            session,
            request_id,
            state: PipelineState::Received,
            scope: ServiceScope::default(),
            sent: None,
            timed_out: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    fn dev_mode(&self) -> bool {
        self.shared.config.diagnostics_enabled()
    }

    fn advance(&mut self, next: PipelineState) {
        if next > self.state {
            self.state = next;
        }
    }

    /// Log `reason` at `level` and build the error to answer with. The
    /// error's diagnostics are `{reason, ...payload}`.
    fn reject(
        &mut self,
        error: HttpError,
        level: LogLevel,
        reason: &str,
        payload: Option<JsonValue>,
    ) -> Rejection {
        self.logger.log(level, reason, payload.clone());
        let mut info = JsonMap::new();
        info.insert("reason".into(), JsonValue::String(reason.to_string()));
        match payload {
            Some(JsonValue::Object(fields)) => info.extend(fields),
            Some(other) => {
                info.insert("payload".into(), other);
            }
            None => {}
        }
        Rejection::Http(error.with_dev_info(JsonValue::Object(info)))
    }

    fn schema_fault(&mut self, facet: &str, fault: &SchemaFault) -> Rejection {
        self.reject(
            HttpError::server_error(),
            LogLevel::Error,
            "Schema validation could not be evaluated.",
            Some(json!({ "facet": facet, "message": fault.to_string() })),
        )
    }

    /// Validate all four facets, collecting every issue before failing.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` listing `<facet>.<path>: <message>` lines, or
    /// `ServerError` when a schema cannot be evaluated.
    pub fn parse_request(&mut self) -> Result<ParsedRequest, Rejection> {
        let route = Arc::clone(&self.route);
        let config = route.config();
        let mut report = FacetReport::new();

        let raw_params = Value::object(
            self.request
                .params
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone()))),
        );
        let params = validate_fields(&config.params, &raw_params)
            .map_err(|f| self.schema_fault(Facet::Params.as_str(), &f))?;
        let params = report.take(Facet::Params, params);

        let raw_query = Value::Object(self.request.query.clone());
        let query = validate_fields(&config.query, &raw_query)
            .map_err(|f| self.schema_fault(Facet::Query.as_str(), &f))?;
        let query = report.take(Facet::Query, query);

        let body = match &config.body {
            Some(schema) => {
                let raw_body = self.request.body.clone().map(Value::from);
                let checked = validate_value(schema.as_ref(), raw_body.as_ref())
                    .map_err(|f| self.schema_fault(Facet::Body.as_str(), &f))?;
                report.take(Facet::Body, checked)
            }
            None => Some(Value::empty_object()),
        };

        let mut raw_headers = Object::new();
        for name in config.headers.names() {
            if let Some(value) = self.request.headers.get(name).and_then(|v| v.to_str().ok()) {
                raw_headers.insert(name.to_string(), Value::from(value));
            }
        }
        let headers = validate_fields(&config.headers, &Value::Object(raw_headers))
            .map_err(|f| self.schema_fault(Facet::Headers.as_str(), &f))?;
        let headers = report.take(Facet::Headers, headers);

        if !report.is_empty() {
            let errors = report.into_lines();
            return Err(self.reject(
                HttpError::invalid_request(),
                LogLevel::Verbose,
                "Could not parse incoming request",
                Some(json!({ "errors": errors })),
            ));
        }

        self.advance(PipelineState::Parsed);
        Ok(ParsedRequest {
            params: params.unwrap_or_else(Value::empty_object),
            query: query.unwrap_or_else(Value::empty_object),
            body: body.unwrap_or_else(Value::empty_object),
            headers: headers.unwrap_or_else(Value::empty_object),
        })
    }

    /// Enforce the route's [`crate::security::Auth`] requirement.
    ///
    /// # Errors
    ///
    /// `Unauthorized` without a session, `Forbidden` when the permission
    /// checker refuses the route's permission.
    pub async fn check_auth(&mut self) -> Result<(), Rejection> {
        let route = Arc::clone(&self.route);
        let auth = &route.config().auth;
        if auth.is_public() {
            self.advance(PipelineState::Authorized);
            return Ok(());
        }

        let Some(session) = self.session.clone() else {
            return Err(self.reject(HttpError::unauthorized(), LogLevel::Verbose, "Unauthorized", None));
        };

        if let Some(permission) = auth.required_permission() {
            let checker = Arc::clone(&self.shared.permissions);
            let ctx = RequestContext::from_request(&self.request);
            let granted = checker.check(&ctx, &session, permission).await;
            if !granted {
                return Err(self.reject(HttpError::forbidden(), LogLevel::Verbose, "Forbidden", None));
            }
        }

        self.advance(PipelineState::Authorized);
        Ok(())
    }

    /// Resolve every declared service through the router's resolver.
    ///
    /// The request's scope is kept for the handler's
    /// [`HandlerContext::container`].
    ///
    /// # Errors
    ///
    /// `ServerError` carrying `{message, stack}` of the failure, for resolver
    /// errors and resolver panics alike.
    pub fn resolve_services(&mut self) -> Result<ResolvedServices, Rejection> {
        let route = Arc::clone(&self.route);
        let resolver = Arc::clone(&self.shared.resolver);
        let mut scope = std::mem::take(&mut self.scope);
        let mut services = ResolvedServices::default();

        for (name, descriptor) in &route.config().services {
            let resolved = catch_unwind(AssertUnwindSafe(|| resolver.resolve(descriptor, &mut scope)));
            let payload = match resolved {
                Ok(Ok(instance)) => {
                    services.insert(name.clone(), instance);
                    continue;
                }
                Ok(Err(err)) => unknown_error_payload(&anyhow::Error::new(err)),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    json!({ "message": message, "stack": [format!("resolver panicked while resolving {name}")] })
                }
            };
            return Err(self.reject(
                HttpError::server_error(),
                LogLevel::Error,
                "Could not resolve service dependencies.",
                Some(payload),
            ));
        }

        self.scope = scope;
        self.advance(PipelineState::ServicesResolved);
        Ok(services)
    }

    /// Run the handler on its own task, raced against the configured timeout.
    ///
    /// When the timeout wins, the task is abandoned rather than cancelled: it
    /// keeps running and its eventual result is dropped unobserved.
    pub async fn invoke_handler(&mut self, parsed: ParsedRequest, services: ResolvedServices) -> Outcome {
        let ctx = HandlerContext {
            params: parsed.params,
            query: parsed.query,
            body: parsed.body,
            headers: parsed.headers,
            services,
            session: self.session.clone(),
            container: RequestContainer::new(
                Arc::clone(&self.shared.resolver),
                std::mem::take(&mut self.scope),
            ),
            request_id: self.request_id,
        };
        let handler = Arc::clone(&self.route.config().handler);
        let task = tokio::spawn(async move { handler.call(ctx).await });

        // a zero timeout disables the race
        let limit = self.shared.config.handler_timeout.filter(|d| !d.is_zero());
        let joined = match limit {
            Some(limit) => tokio::select! {
                joined = task => Some(joined),
                () = tokio::time::sleep(limit) => None,
            },
            None => Some(task.await),
        };
        self.advance(PipelineState::Invoked);

        match joined {
            Some(joined) => {
                let outcome = Outcome::from_join(joined);
                if let Outcome::Success(result) = &outcome {
                    let result = result.as_ref().map(Value::to_json);
                    self.logger.debug("Raw response from handler invokation", Some(json!({ "result": result })));
                }
                outcome
            }
            None => Outcome::Timeout,
        }
    }

    /// Check a successful value against the route's response schema.
    ///
    /// Without a response schema the value passes through unchanged.
    ///
    /// # Errors
    ///
    /// `ServerError` with `response.<path>: <message>` lines on a mismatch.
    pub fn parse_invocation_result(&mut self, value: Option<Value>) -> Result<Option<Value>, Rejection> {
        let route = Arc::clone(&self.route);
        let response = match &route.config().response {
            None => value,
            Some(schema) => match validate_value(schema.as_ref(), value.as_ref()) {
                Ok(Validation::Valid(Value::Null)) if value.is_none() => None,
                Ok(Validation::Valid(v)) => Some(v),
                Ok(Validation::Invalid(issues)) => {
                    let errors: Vec<String> = issues.iter().map(|i| i.format_with("response")).collect();
                    let result = value.as_ref().map(Value::to_json);
                    return Err(self.reject(
                        HttpError::server_error(),
                        LogLevel::Warn,
                        "Result from request handler did not conform to the expected type.",
                        Some(json!({ "result": result, "errors": errors })),
                    ));
                }
                Err(fault) => return Err(self.schema_fault("response", &fault)),
            },
        };

        let logged = response.as_ref().map(Value::to_json);
        self.logger.verbose("Request handler returned successfully", Some(json!({ "response": logged })));
        Ok(response)
    }

    /// Turn an outcome into the value to send or the error to answer with.
    ///
    /// # Errors
    ///
    /// Every non-success outcome becomes a [`Rejection`].
    pub fn classify(&mut self, outcome: Outcome) -> Result<Option<Value>, Rejection> {
        self.advance(PipelineState::Classified);
        match outcome {
            Outcome::Success(value) => self.parse_invocation_result(value),
            Outcome::Timeout => {
                self.timed_out = true;
                let limit = self
                    .shared
                    .config
                    .handler_timeout
                    .map_or(0, |d| d.as_millis());
                Err(self.reject(
                    HttpError::service_unavailable(),
                    LogLevel::Warn,
                    &format!("Handler execution timed out after {limit} milliseconds."),
                    None,
                ))
            }
            Outcome::ApiError(err) => {
                let route = Arc::clone(&self.route);
                let err = err.resolve_message(|code| route.config().errors.get(code).map(String::as_str));
                self.logger.verbose("Request handler returned with error", Some(err.to_json(true)));
                Err(Rejection::Api(err))
            }
            Outcome::HttpError(err) => {
                self.logger.verbose("Request handler returned with error", Some(err.to_json(true)));
                Err(Rejection::Http(err))
            }
            Outcome::Unknown(err) => Err(self.reject(
                HttpError::server_error(),
                LogLevel::Error,
                "Error executing route handler",
                Some(unknown_error_payload(&err)),
            )),
        }
    }

    /// Write the response. Only the first call reaches the transport.
    ///
    /// # Errors
    ///
    /// [`SendError`] when a response has already been written.
    pub fn send(&mut self, status: StatusCode, data: Option<JsonValue>) -> Result<(), SendError> {
        if let Some(previous) = self.sent {
            return Err(SendError(previous));
        }
        self.sent = Some(status);
        self.writer.write(status, data);
        self.advance(PipelineState::Sent);
        Ok(())
    }

    fn session_summary(&self) -> JsonValue {
        match &self.session {
            Some(s) => json!({
                "userId": s.user_id,
                "expiresOn": s.expires_on.as_ref().map(format_date),
            }),
            None => JsonValue::Null,
        }
    }

    async fn run(&mut self) -> Result<Option<Value>, Rejection> {
        let incoming = json!({
            "method": self.request.method.as_str(),
            "url": self.request.path,
            "session": self.session_summary(),
        });
        self.logger.verbose("Incoming request", Some(incoming));

        let parsed = self.parse_request()?;
        self.check_auth().await?;
        let services = self.resolve_services()?;
        let outcome = self.invoke_handler(parsed, services).await;
        self.classify(outcome)
    }

    fn encode_success(&self, value: Option<Value>) -> Option<JsonValue> {
        let value = value?;
        if is_generated_client(&self.request.headers) {
            Some(encode_tagged(&value))
        } else {
            Some(value.to_json())
        }
    }

    /// Drive the request to completion.
    ///
    /// Whatever happens, exactly one response is written, then elapsed time
    /// is checked against the slow-response threshold and the logger is
    /// flushed once.
    pub async fn execute(mut self) {
        let started = Instant::now();
        let dev_mode = self.dev_mode();

        let settled = AssertUnwindSafe(self.run()).catch_unwind().await;
        let (status, body) = match settled {
            Ok(Ok(value)) => (StatusCode::OK, self.encode_success(value)),
            Ok(Err(rejection)) => (rejection.status(), Some(rejection.to_json(dev_mode))),
            Err(panic) => {
                let payload = json!({ "message": panic_message(panic.as_ref()), "stack": [] });
                self.logger.error("Route handler returned unexpected error", Some(payload.clone()));
                let err = HttpError::server_error().with_dev_info(payload);
                (err.status(), Some(err.to_json(dev_mode)))
            }
        };

        if let Err(e) = self.send(status, body) {
            self.logger.error("Response could not be sent", Some(json!({ "message": e.to_string() })));
        }

        let elapsed = started.elapsed();
        let slow = elapsed > self.shared.config.slow_response_threshold;
        if slow {
            self.logger.warn(
                "Slow endpoint response time.",
                Some(json!({ "responseTime": format!("{} ms", elapsed.as_millis()) })),
            );
        }
        self.shared.metrics.record(status, elapsed, slow, self.timed_out);
        self.logger.flush();
    }
}
