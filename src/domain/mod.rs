//! Domain model for page analyses
//!
//! This module defines the records that flow between the fetcher, the analyzer,
//! the link checker and the persistence layer.
//!
//! # Components
//!
//! - `Analysis`: One analysis request with its status and eventual outcome
//! - `AnalysisStatus`: Forward-only lifecycle (requested, in_progress, completed, failed)
//! - `AnalysisData`: Structural facts extracted from a page

mod analysis;
mod status;
mod types;

// Re-export main types
pub use analysis::{Analysis, AnalysisError, AnalysisOptions};
pub use status::AnalysisStatus;
pub use types::{
    AnalysisData, FormAnalysis, FormMethod, HeadingCounts, HtmlVersion, InaccessibleLink, Link,
    LinkAnalysis, LinkKind, LoginForm, WebPageContent,
};
