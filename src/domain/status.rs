/// Analysis status definitions
///
/// This module defines the lifecycle an analysis record moves through. Status
/// only ever advances; `Completed` and `Failed` are terminal.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents the current state of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Analysis was submitted and persisted but has not started
    Requested,

    /// Analysis pipeline is running
    InProgress,

    // ===== Terminal States =====
    /// Analysis finished and carries results
    Completed,

    /// Analysis finished with an error
    Failed,
}

impl AnalysisStatus {
    /// Returns true if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the lifecycle permits moving from `self` to `next`
    ///
    /// Allowed edges: requested → in_progress, requested → failed,
    /// in_progress → completed, in_progress → failed.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::InProgress)
                | (Self::Requested, Self::Failed)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    /// Converts the status to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from a database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "requested" => Some(Self::Requested),
            "in_progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible statuses (useful for testing and iteration)
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Requested,
            Self::InProgress,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
