use crate::domain::HtmlVersion;
use regex::Regex;
use std::sync::OnceLock;

/// Doctype patterns in priority order
const PATTERNS: &[(&str, HtmlVersion)] = &[
    (r"(?i)<!DOCTYPE\s+html\s*>", HtmlVersion::Html5),
    (
        r#"(?i)<!DOCTYPE\s+html\s+PUBLIC\s+"-//W3C//DTD\s+HTML\s+4\.01(\s+(Transitional|Frameset))?//EN""#,
        HtmlVersion::Html401,
    ),
    (
        r#"(?i)<!DOCTYPE\s+html\s+PUBLIC\s+"-//W3C//DTD\s+XHTML\s+1\.0\s+(Strict|Transitional|Frameset)//EN""#,
        HtmlVersion::Xhtml10,
    ),
    (
        r#"(?i)<!DOCTYPE\s+html\s+PUBLIC\s+"-//W3C//DTD\s+XHTML\s+1\.1//EN""#,
        HtmlVersion::Xhtml11,
    ),
    // An XML declaration without a recognized doctype is taken as XHTML 1.0
    (r"(?i)<\?xml\s+version", HtmlVersion::Xhtml10),
];

fn compiled() -> &'static [(Regex, HtmlVersion)] {
    static COMPILED: OnceLock<Vec<(Regex, HtmlVersion)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .filter_map(|(pattern, version)| Regex::new(pattern).ok().map(|re| (re, *version)))
            .collect()
    })
}

/// Detects the document type from its doctype declaration
///
/// Matching is case-insensitive and tolerates arbitrary whitespace inside
/// the declaration. The first matching pattern wins:
/// HTML5, HTML 4.01, XHTML 1.0, XHTML 1.1, then a bare XML declaration
/// (reported as XHTML 1.0). Anything else is `Unknown`.
pub fn extract_html_version(html: &str) -> HtmlVersion {
    let html = html.trim();

    compiled()
        .iter()
        .find(|(re, _)| re.is_match(html))
        .map(|(_, version)| *version)
        .unwrap_or(HtmlVersion::Unknown)
}
