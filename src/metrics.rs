use http::StatusCode;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Request statistics shared by every pipeline of a router.
///
/// All counters use `Ordering::Relaxed`: values are eventually consistent and
/// never block a request.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    request_count: AtomicUsize,
    success: AtomicUsize,
    client_errors: AtomicUsize,
    server_errors: AtomicUsize,
    timeouts: AtomicUsize,
    auth_failures: AtomicUsize,
    slow_responses: AtomicUsize,
    total_latency_ns: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub requests: usize,
    pub success: usize,
    pub client_errors: usize,
    pub server_errors: usize,
    pub timeouts: usize,
    pub auth_failures: usize,
    pub slow_responses: usize,
    pub average_latency: Duration,
}

impl PipelineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one finished request by its response status.
    ///
    /// `timed_out` marks requests answered because the handler lost the
    /// timeout race; any other 5xx, including a raised 503, is a server error.
    pub fn record(&self, status: StatusCode, latency: Duration, slow: bool, timed_out: bool) {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(latency.as_nanos()).unwrap_or(u64::MAX);
        self.total_latency_ns.fetch_add(nanos, Ordering::Relaxed);

        let counter = match status {
            _ if timed_out => &self.timeouts,
            s if s.is_server_error() => &self.server_errors,
            s if s.is_client_error() => &self.client_errors,
            _ => &self.success,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.auth_failures.fetch_add(1, Ordering::Relaxed);
        }
        if slow {
            self.slow_responses.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Mean processing time across all recorded requests.
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count.load(Ordering::Relaxed) as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.request_count(),
            success: self.success.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            slow_responses: self.slow_responses.load(Ordering::Relaxed),
            average_latency: self.average_latency(),
        }
    }
}
