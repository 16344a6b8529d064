//! Progress events for analyses
//!
//! An `AnalysisEvent` is a tagged snapshot of an analysis. `stream_events`
//! is the long-lived worker that forwards events to one connected client,
//! interleaving keep-alive frames, until the client disconnects or the
//! analysis reaches a terminal state.

use crate::domain::{Analysis, AnalysisStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use uuid::Uuid;

/// Delay between a terminal event and closing the stream
pub const TERMINAL_GRACE: Duration = Duration::from_millis(100);

/// Bounds applied to a requested keep-alive interval
pub const MIN_KEEPALIVE: Duration = Duration::from_secs(1);
pub const MAX_KEEPALIVE: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    AnalysisStarted,
    AnalysisProgress,
    AnalysisCompleted,
    AnalysisFailed,
}

impl EventType {
    pub fn from_status(status: AnalysisStatus) -> Self {
        match status {
            AnalysisStatus::Requested => Self::AnalysisStarted,
            AnalysisStatus::InProgress => Self::AnalysisProgress,
            AnalysisStatus::Completed => Self::AnalysisCompleted,
            AnalysisStatus::Failed => Self::AnalysisFailed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AnalysisCompleted | Self::AnalysisFailed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AnalysisStarted => "analysis_started",
            Self::AnalysisProgress => "analysis_progress",
            Self::AnalysisCompleted => "analysis_completed",
            Self::AnalysisFailed => "analysis_failed",
        }
    }
}

/// A point-in-time snapshot of an analysis, tagged by its status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub event_type: EventType,
    pub event_id: Uuid,
    pub data: Analysis,
}

impl From<Analysis> for AnalysisEvent {
    fn from(analysis: Analysis) -> Self {
        Self {
            event_type: EventType::from_status(analysis.status),
            event_id: analysis.id,
            data: analysis,
        }
    }
}

/// One unit delivered to a streaming client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    Connected,
    KeepAlive,
    Event(AnalysisEvent),
    Error { code: String, message: String },
    End,
}

/// Why a stream worker stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamClose {
    /// A terminal event was delivered
    Terminal,
    /// The event source closed without a terminal event
    Exhausted,
    /// The client went away
    Disconnected,
}

/// Forwards `events` to `sink` until the stream is finished
///
/// Sends `Connected` first, then a `KeepAlive` every `keepalive` while
/// waiting. `keepalive` is clamped to `MIN_KEEPALIVE..=MAX_KEEPALIVE`.
/// A terminal event is followed by `TERMINAL_GRACE` before the
/// worker returns. If the event source closes first, `End` is sent.
pub async fn stream_events(
    mut events: mpsc::Receiver<AnalysisEvent>,
    sink: mpsc::Sender<StreamFrame>,
    keepalive: Duration,
) -> StreamClose {
    if sink.send(StreamFrame::Connected).await.is_err() {
        return StreamClose::Disconnected;
    }

    let period = keepalive.clamp(MIN_KEEPALIVE, MAX_KEEPALIVE);
    if period != keepalive {
        tracing::debug!(requested = ?keepalive, used = ?period, "Keep-alive interval clamped");
    }

    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = sink.closed() => {
                tracing::debug!("Stream client disconnected");
                return StreamClose::Disconnected;
            }
            _ = ticker.tick() => {
                if sink.send(StreamFrame::KeepAlive).await.is_err() {
                    return StreamClose::Disconnected;
                }
            }
            next = events.recv() => {
                let Some(event) = next else {
                    let _ = sink.send(StreamFrame::End).await;
                    return StreamClose::Exhausted;
                };

                let terminal = event.event_type.is_terminal();
                tracing::debug!(
                    analysis_id = %event.event_id,
                    event_type = event.event_type.as_str(),
                    "Streaming analysis event"
                );

                if sink.send(StreamFrame::Event(event)).await.is_err() {
                    return StreamClose::Disconnected;
                }

                if terminal {
                    tokio::time::sleep(TERMINAL_GRACE).await;
                    return StreamClose::Terminal;
                }
            }
        }
    }
}
