//! Analysis service layer
//!
//! - `orchestrator`: the `AnalysisService` use cases
//! - `events`: progress events and the streaming worker
//! - `handlers`: request dispatch with an interceptor chain

pub mod events;
pub mod handlers;
mod orchestrator;

pub use events::{stream_events, AnalysisEvent, EventType, StreamClose, StreamFrame};
pub use handlers::{
    ActionStats, Handler, HandlerChain, Interceptor, LoggingInterceptor, Request, Response,
    ServiceHandler, TimingInterceptor,
};
pub use orchestrator::AnalysisService;
