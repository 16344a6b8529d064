/// The analysis record and its request options
use super::status::AnalysisStatus;
use super::types::AnalysisData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// One request to analyze a URL, with its status and eventual outcome
///
/// `id` and `url` never change after creation. Optional fields are omitted
/// from the JSON snapshot when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(rename = "analysis_id")]
    pub id: Uuid,
    pub url: String,
    pub status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "opt_millis")]
    pub duration: Option<Duration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<AnalysisData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AnalysisError>,
}

impl Analysis {
    /// Creates a freshly submitted analysis with a new v4 id
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            status: AnalysisStatus::Requested,
            created_at: Utc::now(),
            completed_at: None,
            duration: None,
            results: None,
            error: None,
        }
    }

    /// Moves a requested analysis into `in_progress`
    ///
    /// Returns false (and leaves the record untouched) if the transition is
    /// not allowed from the current status.
    pub fn mark_in_progress(&mut self) -> bool {
        self.advance(AnalysisStatus::InProgress)
    }

    /// Records a successful outcome
    pub fn mark_completed(&mut self, results: AnalysisData, duration: Duration) -> bool {
        if !self.advance(AnalysisStatus::Completed) {
            return false;
        }
        self.results = Some(results);
        self.error = None;
        self.finish(duration);
        true
    }

    /// Records a failed outcome
    pub fn mark_failed(&mut self, error: AnalysisError, duration: Duration) -> bool {
        if !self.advance(AnalysisStatus::Failed) {
            return false;
        }
        self.error = Some(error);
        self.results = None;
        self.finish(duration);
        true
    }

    fn advance(&mut self, next: AnalysisStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        true
    }

    fn finish(&mut self, duration: Duration) {
        self.completed_at = Some(Utc::now());
        self.duration = Some(duration);
    }
}

/// Error recorded on a failed analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Knobs controlling which extraction steps run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub include_headings: bool,
    pub check_links: bool,
    pub detect_forms: bool,
    /// Page fetch timeout, serialized as milliseconds
    #[serde(with = "millis")]
    pub timeout: Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            include_headings: true,
            check_links: true,
            detect_forms: true,
            timeout: Duration::from_secs(30),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

mod opt_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_analysis_is_requested() {
        let analysis = Analysis::new("https://example.com");

        assert_eq!(analysis.status, AnalysisStatus::Requested);
        assert_eq!(analysis.id.get_version_num(), 4);
        assert!(analysis.completed_at.is_none());
        assert!(analysis.results.is_none());
    }

    #[test]
    fn test_snapshot_omits_absent_fields() {
        let analysis = Analysis::new("https://example.com");
        let value = serde_json::to_value(&analysis).unwrap();
        let object = value.as_object().unwrap();

        assert!(object.contains_key("analysis_id"));
        assert_eq!(object["status"], "requested");
        assert!(!object.contains_key("completed_at"));
        assert!(!object.contains_key("duration"));
        assert!(!object.contains_key("results"));
        assert!(!object.contains_key("error"));
    }

    #[test]
    fn test_completed_snapshot_roundtrip() {
        let mut analysis = Analysis::new("https://example.com");
        assert!(analysis.mark_in_progress());
        assert!(analysis.mark_completed(AnalysisData::default(), Duration::from_millis(1500)));

        let json = serde_json::to_string(&analysis).unwrap();
        assert!(json.contains("\"duration\":1500"));

        let parsed: Analysis = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, analysis);
    }

    #[test]
    fn test_mark_completed_requires_in_progress() {
        let mut analysis = Analysis::new("https://example.com");

        assert!(!analysis.mark_completed(AnalysisData::default(), Duration::ZERO));
        assert_eq!(analysis.status, AnalysisStatus::Requested);
        assert!(analysis.results.is_none());
    }

    #[test]
    fn test_mark_failed_from_requested() {
        let mut analysis = Analysis::new("https://example.com");
        let error = AnalysisError {
            code: "INVALID_URL".to_string(),
            message: "bad".to_string(),
            status_code: Some(400),
            details: None,
        };

        assert!(analysis.mark_failed(error.clone(), Duration::from_millis(3)));
        assert_eq!(analysis.status, AnalysisStatus::Failed);
        assert_eq!(analysis.error, Some(error));
        assert!(analysis.completed_at.is_some());

        // Terminal: nothing moves it again
        assert!(!analysis.mark_in_progress());
    }

    #[test]
    fn test_options_defaults_and_millis() {
        let options: AnalysisOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, AnalysisOptions::default());
        assert_eq!(options.timeout, Duration::from_secs(30));

        let options: AnalysisOptions =
            serde_json::from_str(r#"{"check_links": false, "timeout": 2500}"#).unwrap();
        assert!(!options.check_links);
        assert!(options.include_headings);
        assert_eq!(options.timeout, Duration::from_millis(2500));

        let value = serde_json::to_value(AnalysisOptions::default()).unwrap();
        assert_eq!(value["timeout"], 30000);
    }
}
