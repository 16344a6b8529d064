//! Circuit breaker
//!
//! An explicit closed/open/half-open state machine with rolling counters.
//! Each collaborator owns its own instance; state is shared by every caller
//! of that instance.
//!
//! - **Closed**: calls pass through. Counters reset every `interval`. When the
//!   trip policy matches after a failure, the breaker opens.
//! - **Open**: calls fail immediately with [`BreakerError::Open`]. After
//!   `timeout` the breaker moves to half-open.
//! - **HalfOpen**: up to `max_requests` probe calls are admitted. That many
//!   consecutive successes close the breaker; any failure reopens it.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    HalfOpen,
    Open,
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Closed => "closed",
            Self::HalfOpen => "half-open",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

/// Request outcomes observed in the current generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub requests: u32,
    pub total_successes: u32,
    pub total_failures: u32,
    pub consecutive_successes: u32,
    pub consecutive_failures: u32,
}

impl Counts {
    fn on_request(&mut self) {
        self.requests += 1;
    }

    fn on_success(&mut self) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
    }

    fn on_failure(&mut self) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
    }

    /// Fraction of requests in this generation that failed
    pub fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            0.0
        } else {
            f64::from(self.total_failures) / f64::from(self.requests)
        }
    }
}

/// Decides when a closed breaker should open
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripPolicy {
    pub min_requests: u32,
    pub failure_ratio: f64,
}

impl TripPolicy {
    pub fn ready_to_trip(&self, counts: &Counts) -> bool {
        counts.requests >= self.min_requests && counts.failure_ratio() >= self.failure_ratio
    }
}

/// Breaker configuration
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub name: String,
    /// Probe calls admitted while half-open; 0 is treated as 1
    pub max_requests: u32,
    /// Rolling window for closed-state counters; zero never resets them
    pub interval: Duration,
    /// Cooldown spent open before going half-open
    pub timeout: Duration,
    pub trip: TripPolicy,
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug)]
pub enum BreakerError<E> {
    /// The breaker is open and the call was not attempted
    Open,
    /// The breaker is half-open and its probe budget is used up
    TooManyRequests,
    /// The call ran and failed
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the call was rejected without running
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Open | Self::TooManyRequests)
    }
}

impl<E: fmt::Display> fmt::Display for BreakerError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("circuit breaker is open"),
            Self::TooManyRequests => f.write_str("too many requests"),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for BreakerError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    generation: u64,
    counts: Counts,
    expiry: Option<Instant>,
}

/// Circuit breaker guarding calls to one collaborator
#[derive(Debug)]
pub struct CircuitBreaker {
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker
    pub fn new(mut settings: BreakerSettings) -> Self {
        if settings.max_requests == 0 {
            settings.max_requests = 1;
        }

        let expiry = if settings.interval.is_zero() {
            None
        } else {
            Instant::now().checked_add(settings.interval)
        };

        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                generation: 0,
                counts: Counts::default(),
                expiry,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Current state, after applying any elapsed interval or cooldown
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.state
    }

    /// Counters of the current generation
    pub fn counts(&self) -> Counts {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());
        inner.counts
    }

    /// Runs `call` if the breaker admits it and records the outcome
    ///
    /// `Ok` counts as a success and `Err` as a failure. If the returned
    /// future is dropped before completing, the call is recorded as a
    /// failure.
    pub async fn execute<T, E, F, Fut>(&self, call: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.before_request::<E>()?;
        let mut guard = PendingCall {
            breaker: self,
            generation,
            finished: false,
        };

        let result = call().await;

        guard.finished = true;
        self.after_request(generation, result.is_ok());
        result.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        // A poisoned lock only means another caller panicked mid-update;
        // the counters are still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn before_request<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut inner = self.lock();
        self.refresh(&mut inner, Instant::now());

        match inner.state {
            BreakerState::Open => return Err(BreakerError::Open),
            BreakerState::HalfOpen if inner.counts.requests >= self.settings.max_requests => {
                return Err(BreakerError::TooManyRequests)
            }
            _ => {}
        }

        inner.counts.on_request();
        Ok(inner.generation)
    }

    fn after_request(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        self.refresh(&mut inner, now);

        // Outcome belongs to a generation that has already been reset
        if inner.generation != generation {
            return;
        }

        if success {
            inner.counts.on_success();
            if inner.state == BreakerState::HalfOpen
                && inner.counts.consecutive_successes >= self.settings.max_requests
            {
                self.set_state(&mut inner, BreakerState::Closed, now);
            }
        } else {
            inner.counts.on_failure();
            match inner.state {
                BreakerState::Closed => {
                    if self.settings.trip.ready_to_trip(&inner.counts) {
                        self.set_state(&mut inner, BreakerState::Open, now);
                    }
                }
                BreakerState::HalfOpen => self.set_state(&mut inner, BreakerState::Open, now),
                BreakerState::Open => {}
            }
        }
    }

    fn refresh(&self, inner: &mut BreakerInner, now: Instant) {
        match inner.state {
            BreakerState::Closed => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.new_generation(inner, now);
                }
            }
            BreakerState::Open => {
                if inner.expiry.is_some_and(|expiry| expiry <= now) {
                    self.set_state(inner, BreakerState::HalfOpen, now);
                }
            }
            BreakerState::HalfOpen => {}
        }
    }

    fn set_state(&self, inner: &mut BreakerInner, next: BreakerState, now: Instant) {
        if inner.state == next {
            return;
        }

        let previous = inner.state;
        inner.state = next;
        self.new_generation(inner, now);

        tracing::info!(
            name = %self.settings.name,
            from = %previous,
            to = %next,
            "Circuit breaker state changed"
        );
    }

    fn new_generation(&self, inner: &mut BreakerInner, now: Instant) {
        inner.generation += 1;
        inner.counts = Counts::default();
        inner.expiry = match inner.state {
            BreakerState::Closed if self.settings.interval.is_zero() => None,
            // An unrepresentable deadline never arrives
            BreakerState::Closed => now.checked_add(self.settings.interval),
            BreakerState::Open => now.checked_add(self.settings.timeout),
            BreakerState::HalfOpen => None,
        };
    }
}

/// Records a failure if an admitted call is dropped before it completes
struct PendingCall<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    finished: bool,
}

impl Drop for PendingCall<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.breaker.after_request(self.generation, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(timeout: Duration) -> BreakerSettings {
        BreakerSettings {
            name: "test".to_string(),
            max_requests: 1,
            interval: Duration::from_secs(60),
            timeout,
            trip: TripPolicy {
                min_requests: 3,
                failure_ratio: 0.6,
            },
        }
    }

    async fn fail(breaker: &CircuitBreaker) -> Result<(), BreakerError<&'static str>> {
        breaker.execute(|| async { Err::<(), _>("boom") }).await
    }

    async fn succeed(breaker: &CircuitBreaker) -> Result<u32, BreakerError<&'static str>> {
        breaker.execute(|| async { Ok::<_, &'static str>(7) }).await
    }

    #[tokio::test]
    async fn test_passes_results_through_when_closed() {
        let breaker = CircuitBreaker::new(settings(Duration::from_secs(60)));

        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert!(matches!(fail(&breaker).await, Err(BreakerError::Inner("boom"))));
        assert_eq!(breaker.state(), BreakerState::Closed);

        let counts = breaker.counts();
        assert_eq!(counts.requests, 2);
        assert_eq!(counts.total_failures, 1);
    }

    #[tokio::test]
    async fn test_opens_when_threshold_reached() {
        let breaker = CircuitBreaker::new(settings(Duration::from_secs(60)));

        // Two failures stay under the minimum request count
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_ratio_below_threshold_stays_closed() {
        let breaker = CircuitBreaker::new(settings(Duration::from_secs(60)));

        let _ = succeed(&breaker).await;
        let _ = succeed(&breaker).await;
        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;

        // 2 of 4 failed: ratio 0.5 < 0.6
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_open_rejects_without_calling() {
        let breaker = CircuitBreaker::new(settings(Duration::from_secs(60)));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        let mut called = false;
        let result = breaker
            .execute(|| {
                called = true;
                async { Ok::<_, &'static str>(()) }
            })
            .await;

        assert!(matches!(result, Err(BreakerError::Open)));
        assert!(result.unwrap_err().is_rejected());
        assert!(!called);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let breaker = CircuitBreaker::new(settings(Duration::from_millis(30)));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(settings(Duration::from_millis(30)));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test]
    async fn test_half_open_limits_probe_calls() {
        let breaker = CircuitBreaker::new(settings(Duration::from_millis(30)));
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // First probe is admitted and still running when the second arrives
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let probe = breaker.execute(|| async move {
            let _ = rx.await;
            Ok::<_, &'static str>(())
        });
        tokio::pin!(probe);

        // Poll once so the probe is admitted
        assert!(futures_poll_once(probe.as_mut()).await.is_none());

        let second = succeed(&breaker).await;
        assert!(matches!(second, Err(BreakerError::TooManyRequests)));

        let _ = tx.send(());
        assert!(probe.await.is_ok());
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_interval_resets_closed_counts() {
        let mut s = settings(Duration::from_secs(60));
        s.interval = Duration::from_millis(30);
        let breaker = CircuitBreaker::new(s);

        let _ = fail(&breaker).await;
        let _ = fail(&breaker).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(breaker.counts(), Counts::default());
        let _ = fail(&breaker).await;
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn test_dropped_call_counts_as_failure() {
        let breaker = CircuitBreaker::new(settings(Duration::from_secs(60)));

        let pending = breaker.execute(|| std::future::pending::<Result<(), &'static str>>());
        let _ = tokio::time::timeout(Duration::from_millis(10), pending).await;

        let counts = breaker.counts();
        assert_eq!(counts.requests, 1);
        assert_eq!(counts.total_failures, 1);
    }

    #[tokio::test]
    async fn test_unbounded_windows_do_not_overflow() {
        let mut s = settings(Duration::MAX);
        s.interval = Duration::MAX;
        let breaker = CircuitBreaker::new(s);

        assert_eq!(succeed(&breaker).await.unwrap(), 7);
        for _ in 0..3 {
            let _ = fail(&breaker).await;
        }

        // 3 of 4 failed: opens, and the open deadline is never reached
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(succeed(&breaker).await, Err(BreakerError::Open)));
    }

    /// Polls a future exactly once, returning its output if it was ready
    async fn futures_poll_once<F: Future + Unpin>(fut: F) -> Option<F::Output> {
        let mut fut = fut;
        std::future::poll_fn(|cx| {
            std::task::Poll::Ready(match std::pin::Pin::new(&mut fut).poll(cx) {
                std::task::Poll::Ready(v) => Some(v),
                std::task::Poll::Pending => None,
            })
        })
        .await
    }
}
