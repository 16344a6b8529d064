//! Request handlers and interceptors
//!
//! Every service operation is reachable through the `Handler` trait.
//! Cross-cutting behavior (logging, timing) is layered on top as an ordered
//! chain of `Interceptor`s; the first interceptor added sits closest to the
//! base handler.

use super::events::{StreamClose, StreamFrame};
use super::orchestrator::AnalysisService;
use crate::domain::{Analysis, AnalysisOptions};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::Instrument;

/// An operation on the analysis service
#[derive(Debug, Clone)]
pub enum Request {
    StartAnalysis { url: String, options: AnalysisOptions },
    FetchAnalysis { id: String },
    /// Streams frames into `sink` until the stream closes
    StreamAnalysis {
        id: String,
        sink: mpsc::Sender<StreamFrame>,
        keepalive: Duration,
    },
    ExecuteAnalysis { id: String, options: AnalysisOptions },
    DeleteAnalysis { id: String },
}

impl Request {
    /// Stable name used in logs and counters
    pub fn action(&self) -> &'static str {
        match self {
            Self::StartAnalysis { .. } => "start_analysis",
            Self::FetchAnalysis { .. } => "fetch_analysis",
            Self::StreamAnalysis { .. } => "stream_analysis",
            Self::ExecuteAnalysis { .. } => "execute_analysis",
            Self::DeleteAnalysis { .. } => "delete_analysis",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Analysis(Analysis),
    StreamClosed(StreamClose),
    Deleted { id: String },
}

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: Request) -> Result<Response>;
}

/// Wraps the handler behind it
///
/// Implementations call `next.handle(request)` to continue the chain, or
/// return early to short-circuit it.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, request: Request, next: &dyn Handler) -> Result<Response>;
}

/// Dispatches requests to `AnalysisService`
pub struct ServiceHandler {
    service: Arc<AnalysisService>,
}

impl ServiceHandler {
    pub fn new(service: Arc<AnalysisService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl Handler for ServiceHandler {
    async fn handle(&self, request: Request) -> Result<Response> {
        match request {
            Request::StartAnalysis { url, options } => self
                .service
                .start_analysis(&url, &options)
                .await
                .map(Response::Analysis),
            Request::FetchAnalysis { id } => {
                self.service.fetch_analysis(&id).await.map(Response::Analysis)
            }
            // Lookup failures reach the client as an `Error` frame
            Request::StreamAnalysis {
                id,
                sink,
                keepalive,
            } => Ok(Response::StreamClosed(
                self.service.stream_analysis(&id, sink, keepalive).await,
            )),
            Request::ExecuteAnalysis { id, options } => self
                .service
                .execute_analysis(&id, &options)
                .await
                .map(Response::Analysis),
            Request::DeleteAnalysis { id } => {
                self.service.delete_analysis(&id).await?;
                Ok(Response::Deleted { id })
            }
        }
    }
}

/// Logs each request and its outcome
#[derive(Debug, Default)]
pub struct LoggingInterceptor;

#[async_trait]
impl Interceptor for LoggingInterceptor {
    async fn intercept(&self, request: Request, next: &dyn Handler) -> Result<Response> {
        let action = request.action();
        tracing::debug!(action, ?request, "Handling request");

        let result = next.handle(request).await;
        match &result {
            Ok(_) => tracing::info!(action, "Request succeeded"),
            Err(e) => tracing::warn!(action, code = e.code(), error = %e, "Request failed"),
        }

        result
    }
}

/// Per-action call statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionStats {
    pub calls: u64,
    pub failures: u64,
    pub total_ms: u64,
}

/// Times each request inside a `tracing` span and keeps per-action counters
#[derive(Debug, Default)]
pub struct TimingInterceptor {
    stats: Mutex<HashMap<&'static str, ActionStats>>,
}

impl TimingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, action: &str) -> ActionStats {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(action)
            .copied()
            .unwrap_or_default()
    }

    fn record(&self, action: &'static str, elapsed_ms: u64, failed: bool) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let entry = stats.entry(action).or_default();
        entry.calls += 1;
        entry.total_ms += elapsed_ms;
        if failed {
            entry.failures += 1;
        }
    }
}

#[async_trait]
impl Interceptor for TimingInterceptor {
    async fn intercept(&self, request: Request, next: &dyn Handler) -> Result<Response> {
        let action = request.action();
        let span = tracing::info_span!("request", action, elapsed_ms = tracing::field::Empty);

        let started = Instant::now();
        let result = next.handle(request).instrument(span.clone()).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        span.record("elapsed_ms", elapsed_ms);
        self.record(action, elapsed_ms, result.is_err());

        result
    }
}

/// A base handler wrapped by an ordered list of interceptors
pub struct HandlerChain {
    base: Arc<dyn Handler>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl HandlerChain {
    pub fn new(base: Arc<dyn Handler>) -> Self {
        Self {
            base,
            interceptors: Vec::new(),
        }
    }

    /// Adds an interceptor outside all previously added ones
    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }
}

/// The remainder of a chain, seen from one interceptor
struct Next<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    base: &'a dyn Handler,
}

#[async_trait]
impl Handler for Next<'_> {
    async fn handle(&self, request: Request) -> Result<Response> {
        match self.interceptors.split_last() {
            Some((outer, rest)) => {
                let next = Next {
                    interceptors: rest,
                    base: self.base,
                };
                outer.intercept(request, &next).await
            }
            None => self.base.handle(request).await,
        }
    }
}

#[async_trait]
impl Handler for HandlerChain {
    async fn handle(&self, request: Request) -> Result<Response> {
        Next {
            interceptors: &self.interceptors,
            base: self.base.as_ref(),
        }
        .handle(request)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LensError;

    /// Records the order in which interceptors run
    struct Tracer {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Interceptor for Tracer {
        async fn intercept(&self, request: Request, next: &dyn Handler) -> Result<Response> {
            self.log.lock().unwrap().push(format!("{}:before", self.name));
            let result = next.handle(request).await;
            self.log.lock().unwrap().push(format!("{}:after", self.name));
            result
        }
    }

    struct Blocker;

    #[async_trait]
    impl Interceptor for Blocker {
        async fn intercept(&self, request: Request, _next: &dyn Handler) -> Result<Response> {
            Err(LensError::Internal(format!("blocked {}", request.action())))
        }
    }

    struct EchoHandler {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Handler for EchoHandler {
        async fn handle(&self, request: Request) -> Result<Response> {
            self.log.lock().unwrap().push("base".to_string());
            match request {
                Request::DeleteAnalysis { id } => Ok(Response::Deleted { id }),
                Request::FetchAnalysis { id } => Err(LensError::AnalysisNotFound(id)),
                other => Err(LensError::Internal(format!("unsupported {}", other.action()))),
            }
        }
    }

    fn delete(id: &str) -> Request {
        Request::DeleteAnalysis { id: id.to_string() }
    }

    #[tokio::test]
    async fn test_first_added_is_innermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::new(Arc::new(EchoHandler { log: log.clone() }))
            .with(Arc::new(Tracer {
                name: "inner",
                log: log.clone(),
            }))
            .with(Arc::new(Tracer {
                name: "outer",
                log: log.clone(),
            }));

        let response = chain.handle(delete("abc")).await.unwrap();

        assert_eq!(response, Response::Deleted { id: "abc".to_string() });
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "base", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn test_interceptor_can_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::new(Arc::new(EchoHandler { log: log.clone() }))
            .with(Arc::new(Blocker));

        let err = chain.handle(delete("abc")).await.unwrap_err();

        assert!(err.to_string().contains("blocked delete_analysis"));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_chain_calls_base() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = HandlerChain::new(Arc::new(EchoHandler { log: log.clone() }));

        assert!(chain.handle(delete("x")).await.is_ok());
        assert_eq!(*log.lock().unwrap(), vec!["base"]);
    }

    #[tokio::test]
    async fn test_timing_counts_calls_and_failures() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let timing = Arc::new(TimingInterceptor::new());
        let chain = HandlerChain::new(Arc::new(EchoHandler { log }))
            .with(Arc::new(LoggingInterceptor))
            .with(timing.clone());

        chain.handle(delete("a")).await.unwrap();
        chain.handle(delete("b")).await.unwrap();
        let _ = chain
            .handle(Request::FetchAnalysis {
                id: "missing".to_string(),
            })
            .await;

        let deletes = timing.stats("delete_analysis");
        assert_eq!(deletes.calls, 2);
        assert_eq!(deletes.failures, 0);

        let fetches = timing.stats("fetch_analysis");
        assert_eq!(fetches.calls, 1);
        assert_eq!(fetches.failures, 1);

        assert_eq!(timing.stats("start_analysis"), ActionStats::default());
    }

    #[tokio::test]
    async fn test_streaming_passes_through_interceptors() {
        use crate::cache::{AnalysisCache, MemoryStore};
        use crate::storage::SqliteRepository;
        use crate::{analyzer, checker, config::Config, fetcher};

        let config = Config::default();
        let service = Arc::new(AnalysisService::new(
            Arc::new(SqliteRepository::new_in_memory().unwrap()),
            Arc::new(AnalysisCache::new(
                Arc::new(MemoryStore::new()),
                Duration::from_secs(60),
            )),
            Arc::new(fetcher::WebPageFetcher::new(&config.fetcher).unwrap()),
            Arc::new(analyzer::DocumentAnalyzer::new()),
            Arc::new(checker::ConcurrentLinkChecker::new(&config.link_checker).unwrap()),
        ));
        let created = service
            .start_analysis("https://example.com", &AnalysisOptions::default())
            .await
            .unwrap();

        let timing = Arc::new(TimingInterceptor::new());
        let chain = HandlerChain::new(Arc::new(ServiceHandler::new(service)))
            .with(timing.clone())
            .with(Arc::new(LoggingInterceptor));

        let (sink, mut frames) = mpsc::channel(16);
        let response = chain
            .handle(Request::StreamAnalysis {
                id: created.id.to_string(),
                sink,
                keepalive: Duration::from_secs(15),
            })
            .await
            .unwrap();

        assert_eq!(response, Response::StreamClosed(StreamClose::Exhausted));
        assert_eq!(frames.recv().await, Some(StreamFrame::Connected));
        assert!(matches!(frames.recv().await, Some(StreamFrame::Event(e)) if e.event_id == created.id));
        assert_eq!(frames.recv().await, Some(StreamFrame::End));
        assert_eq!(timing.stats("stream_analysis").calls, 1);
    }

    #[test]
    fn test_request_actions() {
        assert_eq!(
            Request::StartAnalysis {
                url: "https://example.com".to_string(),
                options: AnalysisOptions::default(),
            }
            .action(),
            "start_analysis"
        );
        assert_eq!(
            Request::ExecuteAnalysis {
                id: "x".to_string(),
                options: AnalysisOptions::default(),
            }
            .action(),
            "execute_analysis"
        );
    }
}
