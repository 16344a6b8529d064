/// Structural facts extracted from an analyzed page
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Document type family detected from the doctype declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HtmlVersion {
    #[serde(rename = "HTML5")]
    Html5,
    #[serde(rename = "HTML 4.01")]
    Html401,
    #[serde(rename = "XHTML 1.0")]
    Xhtml10,
    #[serde(rename = "XHTML 1.1")]
    Xhtml11,
    #[default]
    #[serde(rename = "Unknown")]
    Unknown,
}

impl HtmlVersion {
    /// Label used in serialized results
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Html5 => "HTML5",
            Self::Html401 => "HTML 4.01",
            Self::Xhtml10 => "XHTML 1.0",
            Self::Xhtml11 => "XHTML 1.1",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for HtmlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full result of a successful analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AnalysisData {
    pub html_version: HtmlVersion,
    pub title: String,
    pub heading_counts: HeadingCounts,
    pub links: LinkAnalysis,
    pub forms: FormAnalysis,
}

/// Number of h1..h6 elements in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct HeadingCounts {
    pub h1: usize,
    pub h2: usize,
    pub h3: usize,
    pub h4: usize,
    pub h5: usize,
    pub h6: usize,
}

impl HeadingCounts {
    /// Total headings across all levels
    pub fn total(&self) -> usize {
        self.h1 + self.h2 + self.h3 + self.h4 + self.h5 + self.h6
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LinkAnalysis {
    pub internal_count: usize,
    pub external_count: usize,
    pub total_count: usize,
    pub inaccessible_links: Vec<InaccessibleLink>,
}

impl LinkAnalysis {
    /// Builds link counts from extracted links, with no probe results yet
    pub fn from_links(links: &[Link]) -> Self {
        let internal_count = links.iter().filter(|l| l.kind == LinkKind::Internal).count();
        Self {
            internal_count,
            external_count: links.len() - internal_count,
            total_count: links.len(),
            inaccessible_links: Vec::new(),
        }
    }
}

/// An external link whose probe failed
///
/// `status_code` is 0 when the failure happened before any HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InaccessibleLink {
    pub url: String,
    pub status_code: u16,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FormAnalysis {
    pub total_count: usize,
    pub login_forms_detected: usize,
    pub login_form_details: Vec<LoginForm>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub method: FormMethod,
    pub action: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl FormMethod {
    /// Normalizes a raw `method` attribute
    ///
    /// Anything other than POST (case-insensitive, surrounding whitespace
    /// ignored) is treated as GET.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|m| m.trim().to_ascii_uppercase()) {
            Some(m) if m == "POST" => Self::Post,
            _ => Self::Get,
        }
    }
}

/// Whether a link points at the analyzed page's own host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Internal,
    External,
}

/// An absolute link discovered in the document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
    pub kind: LinkKind,
}

impl Link {
    pub fn new(url: impl Into<String>, kind: LinkKind) -> Self {
        Self {
            url: url.into(),
            kind,
        }
    }

    pub fn is_external(&self) -> bool {
        self.kind == LinkKind::External
    }
}

/// A fetched page, as handed from the fetcher to the analyzer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebPageContent {
    /// Final URL after redirects
    pub url: String,
    pub status_code: u16,
    pub html: String,
    pub content_type: String,
    /// First value per header name
    pub headers: HashMap<String, String>,
}
