mod common;

use common::auth::{GrantList, HeaderSessions};
use common::logs::{LogSink, RecordingLoggers};
use http::StatusCode;
use schemaroute::logging::LogLevel;
use schemaroute::schema::{Schema, SchemaDescriptor, SchemaFault, Validation};
use schemaroute::services::{ServiceDescriptor, ServiceRegistry};
use schemaroute::transport::{MemoryRequest, MemoryTransport};
use schemaroute::{ApiError, HttpError, Reply, RouteConfig, Router, RouterConfig, Value};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    router: Router<MemoryTransport>,
    logs: LogSink,
    grants: GrantList,
}

impl Harness {
    fn new(config: RouterConfig) -> Self {
        Self::with_registry(config, ServiceRegistry::new())
    }

    fn with_registry(config: RouterConfig, registry: ServiceRegistry) -> Self {
        let loggers = RecordingLoggers::default();
        let logs = loggers.sink.clone();
        let grants = GrantList::new(&["items:write"]);
        let router = Router::builder(MemoryTransport::new())
            .config(config)
            .sessions(HeaderSessions)
            .permissions(grants.clone())
            .resolver(registry)
            .loggers(loggers)
            .build();
        Self {
            router,
            logs,
            grants,
        }
    }

    async fn send(&self, request: MemoryRequest) -> schemaroute::transport::RecordedResponse {
        self.router.transport().dispatch(request).await
    }
}

fn counting_handler(calls: &Arc<AtomicUsize>) -> RouteConfig {
    let calls = Arc::clone(calls);
    RouteConfig::new(move |_ctx| {
        let calls = Arc::clone(&calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Reply::Value(Value::from("ok")))
        }
    })
}

#[tokio::test]
async fn test_issues_from_every_facet_are_reported_in_order() {
    let mut h = Harness::new(RouterConfig::development());
    h.router
        .post(
            "/items/:id",
            RouteConfig::new(|_ctx| async { Ok(Reply::Empty) })
                .public()
                .param("id", Schema::integer().coerce())
                .query("limit", Schema::number().coerce())
                .body(Schema::object([("name", Schema::string())]))
                .header("x-tenant", Schema::string()),
        )
        .unwrap();

    let response = h
        .send(MemoryRequest::post("/items/abc?limit=many").json(json!({"name": 5})))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let body = response.body.unwrap();
    assert_eq!(body["message"], "Invalid Request");
    assert_eq!(body["devInfo"]["reason"], "Could not parse incoming request");
    assert_eq!(
        body["devInfo"]["errors"],
        json!([
            "params.id: Expected integer, received nan",
            "query.limit: Expected number, received nan",
            "body.name: Expected string, received number",
            "headers.x-tenant: Required",
        ])
    );
    let entry = h.logs.find("Could not parse incoming request").unwrap();
    assert_eq!(entry.level, LogLevel::Verbose);
}

#[tokio::test]
async fn test_coerced_facets_reach_the_handler() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .post(
            "/items/:id",
            RouteConfig::new(|ctx| async move {
                Ok(Reply::Value(Value::object([
                    ("id", ctx.param("id").cloned().unwrap_or_default()),
                    ("limit", ctx.query_value("limit").cloned().unwrap_or_default()),
                    ("name", ctx.body.get("name").cloned().unwrap_or_default()),
                    ("tenant", ctx.header("x-tenant").cloned().unwrap_or_default()),
                ])))
            })
            .public()
            .param("id", Schema::integer().coerce())
            .query("limit", Schema::number().coerce().optional())
            .body(Schema::object([("name", Schema::string())]))
            .header("x-tenant", Schema::string()),
        )
        .unwrap();

    let response = h
        .send(
            MemoryRequest::post("/items/7?limit=2.5&extra=1")
                .header("X-Tenant", "acme")
                .json(json!({"name": "bolt", "ignored": true})),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.body,
        Some(json!({"id": 7, "limit": 2.5, "name": "bolt", "tenant": "acme"}))
    );
}

#[tokio::test]
async fn test_missing_session_is_401_before_the_handler_runs() {
    let mut h = Harness::new(RouterConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    h.router.get("/me", counting_handler(&calls)).unwrap();

    let response = h.send(MemoryRequest::get("/me")).await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body, Some(json!({"message": "Unauthorized"})));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.logs.levels_of("Unauthorized"), vec![LogLevel::Verbose]);

    let response = h.send(MemoryRequest::get("/me").header("x-user", "u1")).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_permission_is_checked_with_the_session() {
    let mut h = Harness::new(RouterConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    h.router
        .put("/items", counting_handler(&calls).permission("items:write"))
        .unwrap();
    h.router
        .delete("/items", counting_handler(&calls).permission("items:delete"))
        .unwrap();

    let granted = h.send(MemoryRequest::put("/items").header("x-user", "u1")).await;
    assert_eq!(granted.status, StatusCode::OK);

    let refused = h.send(MemoryRequest::delete("/items").header("x-user", "u1")).await;
    assert_eq!(refused.status, StatusCode::FORBIDDEN);
    assert_eq!(refused.body, Some(json!({"message": "Forbidden"})));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.grants.calls(), 2);

    // without a session the checker is never consulted
    let anonymous = h.send(MemoryRequest::delete("/items")).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.grants.calls(), 2);
}

#[tokio::test]
async fn test_public_routes_skip_the_gate() {
    let mut h = Harness::new(RouterConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    h.router.get("/health", counting_handler(&calls).public()).unwrap();

    let response = h.send(MemoryRequest::get("/health")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!("ok")));
    assert_eq!(h.grants.calls(), 0);
}

#[tokio::test]
async fn test_business_errors_use_the_route_catalog() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .post(
            "/orders",
            RouteConfig::new(|_ctx| async { Ok(Reply::Error(ApiError::new("OUT_OF_STOCK"))) })
                .public()
                .error("OUT_OF_STOCK", "Item is out of stock"),
        )
        .unwrap();
    h.router
        .put(
            "/orders",
            RouteConfig::new(|_ctx| async { Err(anyhow::Error::new(ApiError::new("UNDECLARED"))) }).public(),
        )
        .unwrap();

    let declared = h.send(MemoryRequest::post("/orders")).await;
    assert_eq!(declared.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        declared.body,
        Some(json!({"message": "Item is out of stock", "code": "OUT_OF_STOCK"}))
    );

    let raised = h.send(MemoryRequest::put("/orders")).await;
    assert_eq!(raised.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        raised.body,
        Some(json!({"message": "Invalid Request", "code": "UNDECLARED"}))
    );
    assert_eq!(
        h.logs.levels_of("Request handler returned with error"),
        vec![LogLevel::Verbose, LogLevel::Verbose]
    );
}

#[tokio::test]
async fn test_raised_http_errors_keep_their_status() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .get(
            "/things/:id",
            RouteConfig::new(|_ctx| async {
                Err(anyhow::Error::new(
                    HttpError::not_found().with_message("No such thing"),
                ))
            })
            .public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/things/1")).await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, Some(json!({"message": "No such thing"})));
}

#[tokio::test]
async fn test_raised_error_diagnostics_reach_the_logger_in_production() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .get(
            "/quota",
            RouteConfig::new(|_ctx| async {
                Err(anyhow::Error::new(
                    HttpError::forbidden().with_dev_info(json!({"why": "quota"})),
                ))
            })
            .public(),
        )
        .unwrap();
    h.router
        .post(
            "/quota",
            RouteConfig::new(|_ctx| async {
                Ok(Reply::Error(ApiError::new("OVER").with_dev_info(json!({"used": 11}))))
            })
            .public()
            .error("OVER", "Quota exceeded"),
        )
        .unwrap();

    let raised = h.send(MemoryRequest::get("/quota")).await;
    assert_eq!(raised.status, StatusCode::FORBIDDEN);
    assert_eq!(raised.body, Some(json!({"message": "Forbidden"})));

    let returned = h.send(MemoryRequest::post("/quota")).await;
    assert_eq!(
        returned.body,
        Some(json!({"message": "Quota exceeded", "code": "OVER"}))
    );

    let logged: Vec<_> = h
        .logs
        .entries()
        .into_iter()
        .filter(|e| e.message == "Request handler returned with error")
        .filter_map(|e| e.payload)
        .collect();
    assert_eq!(logged.len(), 2);
    assert_eq!(logged[0]["devInfo"]["why"], "quota");
    assert_eq!(logged[1]["devInfo"]["used"], 11);
}

#[tokio::test]
async fn test_unknown_handler_errors_are_500() {
    let mut h = Harness::new(RouterConfig::development());
    h.router
        .get(
            "/fail",
            RouteConfig::new(|_ctx| async { Err(anyhow::anyhow!("db down").context("loading")) })
                .public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/fail")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.unwrap();
    assert_eq!(body["message"], "Server Error");
    assert_eq!(body["devInfo"]["reason"], "Error executing route handler");
    assert_eq!(body["devInfo"]["stack"], json!(["loading", "db down"]));
    assert_eq!(h.logs.levels_of("Error executing route handler"), vec![LogLevel::Error]);
}

#[tokio::test]
async fn test_timeout_answers_503_and_abandons_the_handler() {
    let config = RouterConfig::default().with_handler_timeout(Duration::from_millis(20));
    let mut h = Harness::new(config);
    let finished = Arc::new(AtomicBool::new(false));
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let done_tx = Arc::new(std::sync::Mutex::new(Some(done_tx)));
    {
        let finished = Arc::clone(&finished);
        h.router
            .get(
                "/slow",
                RouteConfig::new(move |_ctx| {
                    let finished = Arc::clone(&finished);
                    let done_tx = Arc::clone(&done_tx);
                    async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        finished.store(true, Ordering::SeqCst);
                        if let Some(tx) = done_tx.lock().unwrap().take() {
                            let _ = tx.send(());
                        }
                        Ok(Reply::Value(Value::from("late")))
                    }
                })
                .public(),
            )
            .unwrap();
    }

    let response = h.send(MemoryRequest::get("/slow")).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body, Some(json!({"message": "Service Unavailable"})));
    assert_eq!(response.writes, 1);
    assert!(!finished.load(Ordering::SeqCst));
    let warned = h
        .logs
        .find("Handler execution timed out after 20 milliseconds.")
        .unwrap();
    assert_eq!(warned.level, LogLevel::Warn);

    // the abandoned handler still runs to completion
    tokio::time::timeout(Duration::from_secs(2), done_rx)
        .await
        .unwrap()
        .unwrap();
    assert!(finished.load(Ordering::SeqCst));
    assert_eq!(h.logs.flushes(), 1);
    assert_eq!(h.router.metrics().snapshot().timeouts, 1);
}

#[tokio::test]
async fn test_zero_timeout_never_races() {
    let config = RouterConfig::default().with_handler_timeout(Duration::ZERO);
    let mut h = Harness::new(config);
    h.router
        .get(
            "/yielding",
            RouteConfig::new(|_ctx| async {
                for _ in 0..4 {
                    tokio::task::yield_now().await;
                }
                Ok(Reply::Value(Value::from("done")))
            })
            .public(),
        )
        .unwrap();

    for _ in 0..200 {
        let response = h.send(MemoryRequest::get("/yielding")).await;
        assert_eq!(response.status, StatusCode::OK);
    }
    let snapshot = h.router.metrics().snapshot();
    assert_eq!(snapshot.success, 200);
    assert_eq!(snapshot.timeouts, 0);
}

#[tokio::test]
async fn test_raised_503_is_not_counted_as_a_timeout() {
    let config = RouterConfig::default().with_handler_timeout(Duration::from_secs(5));
    let mut h = Harness::new(config);
    h.router
        .get(
            "/maintenance",
            RouteConfig::new(|_ctx| async { Err(anyhow::Error::new(HttpError::service_unavailable())) })
                .public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/maintenance")).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    let snapshot = h.router.metrics().snapshot();
    assert_eq!(snapshot.timeouts, 0);
    assert_eq!(snapshot.server_errors, 1);
    assert!(h.logs.find_prefix("Handler execution timed out").is_none());
}

#[tokio::test]
async fn test_fast_handler_beats_the_timeout() {
    let config = RouterConfig::default().with_handler_timeout(Duration::from_secs(5));
    let mut h = Harness::new(config);
    h.router
        .get(
            "/fast",
            RouteConfig::new(|_ctx| async { Ok(Reply::Value(Value::from(1))) }).public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/fast")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!(1)));
}

#[tokio::test]
async fn test_response_contract_mismatch_is_500() {
    let mut h = Harness::new(RouterConfig::development());
    h.router
        .get(
            "/user",
            RouteConfig::new(|_ctx| async {
                Ok(Reply::Value(Value::from(json!({"id": "not-a-number"}))))
            })
            .public()
            .response(Schema::object([("id", Schema::integer())])),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/user")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    let body = response.body.unwrap();
    assert_eq!(body["message"], "Server Error");
    assert_eq!(
        body["devInfo"]["errors"],
        json!(["response.id: Expected integer, received string"])
    );
    let entry = h
        .logs
        .find("Result from request handler did not conform to the expected type.")
        .unwrap();
    assert_eq!(entry.level, LogLevel::Warn);
    assert_eq!(entry.payload.unwrap()["result"], json!({"id": "not-a-number"}));
}

#[tokio::test]
async fn test_response_schema_strips_undeclared_fields() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .get(
            "/user",
            RouteConfig::new(|_ctx| async {
                Ok(Reply::Value(Value::from(json!({"id": 1, "password": "hunter2"}))))
            })
            .public()
            .response(Schema::object([("id", Schema::integer())])),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/user")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, Some(json!({"id": 1})));
    assert!(h.logs.find("Request handler returned successfully").is_some());
}

struct Broken;

impl SchemaDescriptor for Broken {
    fn validate(&self, _value: &Value) -> Result<Validation, SchemaFault> {
        Err(SchemaFault("regex failed to compile".to_string()))
    }
}

#[tokio::test]
async fn test_schema_fault_is_500_not_400() {
    let mut h = Harness::new(RouterConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    h.router
        .post("/broken", counting_handler(&calls).public().body(Broken))
        .unwrap();

    let response = h.send(MemoryRequest::post("/broken").json(json!({}))).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, Some(json!({"message": "Server Error"})));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handler_panic_is_contained() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .get(
            "/panic",
            RouteConfig::new(|ctx| async move {
                if ctx.params.is_null() {
                    return Ok(Reply::Empty);
                }
                panic!("kaboom");
            })
            .public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/panic")).await;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.writes, 1);
    let entry = h.logs.find("Error executing route handler").unwrap();
    let message = entry.payload.unwrap()["message"].as_str().unwrap().to_string();
    assert!(message.contains("kaboom"), "{message}");
    assert_eq!(h.logs.flushes(), 1);
}

struct Counter(AtomicUsize);

#[tokio::test]
async fn test_declared_services_are_resolved_by_name() {
    let registry = ServiceRegistry::new().singleton("counter", Counter(AtomicUsize::new(41)));
    let mut h = Harness::with_registry(RouterConfig::default(), registry);
    h.router
        .post(
            "/count",
            RouteConfig::new(|ctx| async move {
                let counter = ctx
                    .services
                    .get::<Counter>("hits")
                    .ok_or_else(|| anyhow::anyhow!("missing service"))?;
                let next = counter.0.fetch_add(1, Ordering::SeqCst) + 1;
                anyhow::Ok(Reply::Value(Value::from(next as u64)))
            })
            .public()
            .service("hits", ServiceDescriptor::of::<Counter>("counter")),
        )
        .unwrap();

    let first = h.send(MemoryRequest::post("/count")).await;
    let second = h.send(MemoryRequest::post("/count")).await;

    assert_eq!(first.body, Some(json!(42)));
    assert_eq!(second.body, Some(json!(43)));
}

#[tokio::test]
async fn test_container_lookups_share_the_request_scope() {
    let built = Arc::new(AtomicUsize::new(0));
    let registry = {
        let built = Arc::clone(&built);
        ServiceRegistry::new().scoped("db", move || {
            built.fetch_add(1, Ordering::SeqCst);
            anyhow::Ok(Counter(AtomicUsize::new(0)))
        })
    };
    let mut h = Harness::with_registry(RouterConfig::default(), registry);
    h.router
        .get(
            "/same",
            RouteConfig::new(|ctx| async move {
                let declared = ctx
                    .services
                    .get::<Counter>("db")
                    .ok_or_else(|| anyhow::anyhow!("missing service"))?;
                let looked_up = ctx.container.get::<Counter>("db")?;
                anyhow::Ok(Reply::Value(Value::from(Arc::ptr_eq(&declared, &looked_up))))
            })
            .public()
            .service("db", ServiceDescriptor::of::<Counter>("db")),
        )
        .unwrap();

    let first = h.send(MemoryRequest::get("/same")).await;
    assert_eq!(first.body, Some(json!(true)));
    assert_eq!(built.load(Ordering::SeqCst), 1);

    h.send(MemoryRequest::get("/same")).await;
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_service_resolution_failure_is_500() {
    let registry = ServiceRegistry::new().scoped("db", || -> anyhow::Result<Counter> {
        Err(anyhow::anyhow!("connection refused"))
    });
    let mut h = Harness::with_registry(RouterConfig::development(), registry);
    let calls = Arc::new(AtomicUsize::new(0));
    h.router
        .get(
            "/db",
            counting_handler(&calls)
                .public()
                .service("db", ServiceDescriptor::of::<Counter>("db")),
        )
        .unwrap();
    h.router
        .get(
            "/missing",
            counting_handler(&calls)
                .public()
                .service("cache", ServiceDescriptor::of::<Counter>("cache")),
        )
        .unwrap();

    let failing = h.send(MemoryRequest::get("/db")).await;
    assert_eq!(failing.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        failing.body.unwrap()["devInfo"]["reason"],
        "Could not resolve service dependencies."
    );

    let missing = h.send(MemoryRequest::get("/missing")).await;
    assert_eq!(missing.status, StatusCode::INTERNAL_SERVER_ERROR);
    let stack = missing.body.unwrap()["devInfo"]["stack"].clone();
    assert_eq!(stack[0], "Unknown dependency: cache");

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.logs.levels_of("Could not resolve service dependencies."),
        vec![LogLevel::Error, LogLevel::Error]
    );
}

#[tokio::test]
async fn test_logger_is_flushed_once_on_every_path() {
    let mut h = Harness::new(RouterConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    h.router.get("/ok", counting_handler(&calls).public()).unwrap();
    h.router.get("/private", counting_handler(&calls)).unwrap();
    h.router
        .get(
            "/bad/:n",
            counting_handler(&calls).public().param("n", Schema::integer().coerce()),
        )
        .unwrap();

    h.send(MemoryRequest::get("/ok")).await;
    assert_eq!(h.logs.flushes(), 1);
    h.send(MemoryRequest::get("/private")).await;
    assert_eq!(h.logs.flushes(), 2);
    h.send(MemoryRequest::get("/bad/x")).await;
    assert_eq!(h.logs.flushes(), 3);
}

#[tokio::test]
async fn test_slow_responses_are_logged() {
    let config = RouterConfig::default().with_slow_response_threshold(Duration::from_millis(1));
    let mut h = Harness::new(config);
    h.router
        .get(
            "/sleepy",
            RouteConfig::new(|_ctx| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok(Reply::Empty)
            })
            .public(),
        )
        .unwrap();

    let response = h.send(MemoryRequest::get("/sleepy")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, None);
    let entry = h.logs.find("Slow endpoint response time.").unwrap();
    assert_eq!(entry.level, LogLevel::Warn);
    let took = entry.payload.unwrap()["responseTime"].as_str().unwrap().to_string();
    assert!(took.ends_with(" ms"), "{took}");
    assert_eq!(h.router.metrics().snapshot().slow_responses, 1);
}

#[tokio::test]
async fn test_diagnostics_only_in_development() {
    for (config, expose) in [
        (RouterConfig::default(), false),
        (RouterConfig::development(), true),
    ] {
        let mut h = Harness::new(config);
        h.router
            .get(
                "/n/:n",
                RouteConfig::new(|_ctx| async { Ok(Reply::Empty) })
                    .public()
                    .param("n", Schema::integer().coerce()),
            )
            .unwrap();

        let body = h.send(MemoryRequest::get("/n/x")).await.body.unwrap();

        assert_eq!(body["message"], "Invalid Request");
        assert_eq!(body.get("devInfo").is_some(), expose);
        // the logger sees the diagnostics regardless
        let entry = h.logs.find("Could not parse incoming request").unwrap();
        assert_eq!(
            entry.payload.unwrap()["errors"],
            json!(["params.n: Expected integer, received nan"])
        );
    }
}

#[tokio::test]
async fn test_generated_clients_receive_tagged_dates() {
    let mut h = Harness::new(RouterConfig::default());
    h.router
        .post(
            "/events",
            RouteConfig::new(|ctx| async move {
                Ok(Reply::Value(Value::object([(
                    "at",
                    ctx.body.get("at").cloned().unwrap_or_default(),
                )])))
            })
            .public()
            .body(Schema::object([("at", Schema::date().coerce())])),
        )
        .unwrap();

    let plain = h
        .send(MemoryRequest::post("/events").json(json!({"at": "2023-07-09"})))
        .await;
    assert_eq!(plain.body, Some(json!({"at": "2023-07-09T00:00:00Z"})));

    let tagged = h
        .send(
            MemoryRequest::post("/events")
                .header("api-client", "ts/1.0")
                .json(json!({"at": "2023-07-09"})),
        )
        .await;
    assert_eq!(
        tagged.body,
        Some(json!({"at": {"$date": "2023-07-09T00:00:00Z"}}))
    );
}
