//! HTML structural analyzer
//!
//! This module extracts structural facts from raw HTML:
//! - Document type (HTML5, HTML 4.01, XHTML 1.0, XHTML 1.1)
//! - Page title
//! - Heading counts per level
//! - Anchor links, classified internal or external
//! - Forms, with a login-form heuristic
//!
//! Everything here is pure: no network access and no shared state.

mod forms;
mod links;
mod version;

use crate::domain::{
    AnalysisData, AnalysisOptions, FormAnalysis, HeadingCounts, HtmlVersion, Link, LinkAnalysis,
    WebPageContent,
};
use crate::{LensError, Result};
use scraper::{Html, Selector};
use url::Url;

pub use version::extract_html_version;

/// Result of analyzing one page: the facts plus the links for probing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedPage {
    pub data: AnalysisData,
    pub links: Vec<Link>,
}

/// Stateless HTML analysis
pub trait HtmlAnalyzer: Send + Sync {
    fn extract_html_version(&self, html: &str) -> HtmlVersion;

    fn extract_title(&self, html: &str) -> String;

    fn extract_heading_counts(&self, html: &str) -> HeadingCounts;

    /// Fails only when `base_url` is not a valid URL
    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<Link>>;

    fn extract_forms(&self, html: &str, base_url: &str) -> FormAnalysis;

    /// Runs the extractors selected by `options` over a fetched page
    ///
    /// Skipped steps report zero counts. Link counts are always computed
    /// because the link checker needs them.
    fn analyze(&self, content: &WebPageContent, options: &AnalysisOptions) -> Result<AnalyzedPage>;
}

/// `HtmlAnalyzer` built on `scraper`
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAnalyzer;

impl DocumentAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl HtmlAnalyzer for DocumentAnalyzer {
    fn extract_html_version(&self, html: &str) -> HtmlVersion {
        version::extract_html_version(html)
    }

    fn extract_title(&self, html: &str) -> String {
        title_of(&Html::parse_document(html))
    }

    fn extract_heading_counts(&self, html: &str) -> HeadingCounts {
        heading_counts_of(&Html::parse_document(html))
    }

    fn extract_links(&self, html: &str, base_url: &str) -> Result<Vec<Link>> {
        let base = parse_base(base_url)?;
        Ok(links::extract_links(&Html::parse_document(html), &base))
    }

    fn extract_forms(&self, html: &str, base_url: &str) -> FormAnalysis {
        match Url::parse(base_url) {
            Ok(base) => forms::extract_forms(&Html::parse_document(html), &base),
            Err(e) => {
                tracing::error!(base_url = %base_url, error = %e, "Failed to parse base URL for form analysis");
                FormAnalysis::default()
            }
        }
    }

    fn analyze(&self, content: &WebPageContent, options: &AnalysisOptions) -> Result<AnalyzedPage> {
        let base = parse_base(&content.url)?;
        let document = Html::parse_document(&content.html);

        let heading_counts = if options.include_headings {
            heading_counts_of(&document)
        } else {
            HeadingCounts::default()
        };

        let links = links::extract_links(&document, &base);

        let forms = if options.detect_forms {
            forms::extract_forms(&document, &base)
        } else {
            FormAnalysis::default()
        };

        let data = AnalysisData {
            html_version: version::extract_html_version(&content.html),
            title: title_of(&document),
            heading_counts,
            links: LinkAnalysis::from_links(&links),
            forms,
        };

        Ok(AnalyzedPage { data, links })
    }
}

fn parse_base(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| LensError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

/// First `<title>` text with whitespace runs collapsed
fn title_of(document: &Html) -> String {
    let Ok(selector) = Selector::parse("title") else {
        return String::new();
    };

    document
        .select(&selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .unwrap_or_default()
}

fn heading_counts_of(document: &Html) -> HeadingCounts {
    let count = |tag: &str| {
        Selector::parse(tag)
            .map(|selector| document.select(&selector).count())
            .unwrap_or(0)
    };

    let counts = HeadingCounts {
        h1: count("h1"),
        h2: count("h2"),
        h3: count("h3"),
        h4: count("h4"),
        h5: count("h5"),
        h6: count("h6"),
    };

    tracing::debug!(
        h1 = counts.h1,
        h2 = counts.h2,
        h3 = counts.h3,
        h4 = counts.h4,
        h5 = counts.h5,
        h6 = counts.h6,
        "Extracted heading counts"
    );

    counts
}
