//! Resilience primitives shared by the outbound collaborators
//!
//! # Components
//!
//! - `CircuitBreaker`: Closed/open/half-open guard around a collaborator
//! - `RetryPolicy`: Bounded exponential backoff for transient failures

mod breaker;
mod retry;

pub use breaker::{
    BreakerError, BreakerSettings, BreakerState, CircuitBreaker, Counts, TripPolicy,
};
pub use retry::RetryPolicy;
