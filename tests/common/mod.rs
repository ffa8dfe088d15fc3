#![allow(dead_code)]

pub mod logs {
    use schemaroute::ids::RequestId;
    use schemaroute::logging::{LogEntry, LogLevel, LoggerProvider, RequestLogger};
    use serde_json::Value as JsonValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared sink for every logger handed out by [`RecordingLoggers`]
    #[derive(Clone, Default)]
    pub struct LogSink {
        pub entries: Arc<Mutex<Vec<LogEntry>>>,
        pub flushes: Arc<AtomicUsize>,
    }

    impl LogSink {
        pub fn entries(&self) -> Vec<LogEntry> {
            self.entries.lock().unwrap().clone()
        }

        pub fn flushes(&self) -> usize {
            self.flushes.load(Ordering::SeqCst)
        }

        pub fn find(&self, message: &str) -> Option<LogEntry> {
            self.entries().into_iter().find(|e| e.message == message)
        }

        pub fn find_prefix(&self, prefix: &str) -> Option<LogEntry> {
            self.entries().into_iter().find(|e| e.message.starts_with(prefix))
        }

        pub fn levels_of(&self, message: &str) -> Vec<LogLevel> {
            self.entries()
                .into_iter()
                .filter(|e| e.message == message)
                .map(|e| e.level)
                .collect()
        }
    }

    pub struct RecordingLogger {
        sink: LogSink,
    }

    impl RequestLogger for RecordingLogger {
        fn log(&mut self, level: LogLevel, message: &str, payload: Option<JsonValue>) {
            self.sink.entries.lock().unwrap().push(LogEntry {
                level,
                message: message.to_string(),
                payload,
            });
        }

        fn flush(&mut self) {
            self.sink.flushes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Clone, Default)]
    pub struct RecordingLoggers {
        pub sink: LogSink,
    }

    impl LoggerProvider for RecordingLoggers {
        fn logger(&self, _request_id: RequestId, _route_key: &str) -> Box<dyn RequestLogger> {
            Box::new(RecordingLogger {
                sink: self.sink.clone(),
            })
        }
    }
}

pub mod auth {
    use async_trait::async_trait;
    use schemaroute::security::{PermissionChecker, RequestContext, Session, SessionProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Session for any request carrying `x-user`
    pub struct HeaderSessions;

    impl SessionProvider for HeaderSessions {
        fn session(&self, req: &RequestContext<'_>) -> Option<Session> {
            req.get_header("x-user")
                .map(|user| Session::new(format!("token-{user}"), user))
        }
    }

    /// Grants only the listed permissions and counts every question asked
    #[derive(Clone, Default)]
    pub struct GrantList {
        pub granted: Vec<String>,
        pub calls: Arc<AtomicUsize>,
    }

    impl GrantList {
        pub fn new(granted: &[&str]) -> Self {
            Self {
                granted: granted.iter().map(|s| s.to_string()).collect(),
                calls: Arc::default(),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PermissionChecker for GrantList {
        async fn check(&self, _req: &RequestContext<'_>, _session: &Session, permission: &str) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.granted.iter().any(|p| p == permission)
        }
    }
}
