use crate::domain::{Link, LinkKind};
use crate::url::same_authority;
use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracts every anchor link from the document
///
/// # Extraction Rules
///
/// **Skip:**
/// - Empty hrefs
/// - Fragment-only hrefs (same page anchors)
/// - `javascript:`, `mailto:` and `tel:` links
/// - hrefs that cannot be resolved against the base URL
///
/// Links are deduplicated by their resolved absolute URL. The first
/// occurrence wins, so the result keeps document order.
///
/// A link is internal when its host and effective port match the base URL.
pub fn extract_links(document: &Html, base_url: &Url) -> Vec<Link> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        let Some(resolved) = resolve_link(href, base_url) else {
            continue;
        };

        let absolute = resolved.to_string();
        if !seen.insert(absolute.clone()) {
            continue;
        }

        let kind = if same_authority(&resolved, base_url) {
            LinkKind::Internal
        } else {
            LinkKind::External
        };

        links.push(Link::new(absolute, kind));
    }

    tracing::debug!(
        total_links = links.len(),
        base_url = %base_url,
        "Extracted links"
    );

    links
}

/// Resolves an href against the base URL
///
/// Returns None if the link should be excluded.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
    {
        return None;
    }

    base_url.join(href).ok()
}
