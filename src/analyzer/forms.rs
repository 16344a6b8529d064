use crate::domain::{FormAnalysis, FormMethod, LoginForm};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

const USERNAME_FIELDS: &[&str] = &[
    "username",
    "user",
    "email",
    "login",
    "userid",
    "user_name",
    "user_email",
    "account",
];

const PASSWORD_FIELDS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "pass",
    "user_password",
    "userpassword",
];

const LOGIN_PHRASES: &[&str] = &["login", "sign in", "log in", "signin", "authenticate"];

const LOGIN_MARKERS: &[&str] = &["login", "signin"];

/// Counts forms and collects the ones that look like login forms
pub fn extract_forms(document: &Html, base_url: &Url) -> FormAnalysis {
    let Ok(form_selector) = Selector::parse("form") else {
        return FormAnalysis::default();
    };

    let mut total_count = 0;
    let mut login_forms = Vec::new();

    for form in document.select(&form_selector) {
        total_count += 1;

        let method = FormMethod::parse(form.value().attr("method"));
        let action = resolve_action(form.value().attr("action").unwrap_or(""), base_url);
        let fields = field_names(form);

        if is_likely_login_form(form, &fields) {
            login_forms.push(LoginForm {
                method,
                action,
                fields,
            });
        }
    }

    tracing::debug!(
        total_forms = total_count,
        login_forms = login_forms.len(),
        "Extracted form analysis"
    );

    FormAnalysis {
        total_count,
        login_forms_detected: login_forms.len(),
        login_form_details: login_forms,
    }
}

/// An empty action stays empty; unresolvable actions are kept verbatim
fn resolve_action(action: &str, base_url: &Url) -> String {
    if action.is_empty() {
        return String::new();
    }

    base_url
        .join(action)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| action.to_string())
}

/// Names of input/select/textarea descendants, first occurrence wins
fn field_names(form: ElementRef<'_>) -> Vec<String> {
    let Ok(selector) = Selector::parse("input, select, textarea") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    form.select(&selector)
        .filter_map(|field| field.value().attr("name"))
        .filter(|name| !name.is_empty())
        .filter(|name| seen.insert(name.to_string()))
        .map(str::to_string)
        .collect()
}

/// Login heuristic
///
/// A form is flagged if ANY of these hold:
/// 1. It has both a username-like and a password-like field name
/// 2. It has an `<input type="password">`
/// 3. Its text mentions logging in and it has a username- or password-like field
/// 4. A descendant's class or id contains "login" or "signin"
fn is_likely_login_form(form: ElementRef<'_>, fields: &[String]) -> bool {
    let lowered: HashSet<String> = fields.iter().map(|f| f.to_lowercase()).collect();
    let has_username = USERNAME_FIELDS.iter().any(|f| lowered.contains(*f));
    let has_password = PASSWORD_FIELDS.iter().any(|f| lowered.contains(*f));

    if has_username && has_password {
        return true;
    }

    if has_password_input(form) {
        return true;
    }

    let text = form.text().collect::<String>().to_lowercase();
    let has_login_text = LOGIN_PHRASES.iter().any(|p| text.contains(p));
    if has_login_text && (has_username || has_password) {
        return true;
    }

    has_login_marker(form)
}

fn has_password_input(form: ElementRef<'_>) -> bool {
    let Ok(selector) = Selector::parse("input") else {
        return false;
    };

    form.select(&selector).any(|input| {
        input
            .value()
            .attr("type")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("password"))
    })
}

/// Checks descendants (not the form itself) for login-ish class or id
fn has_login_marker(form: ElementRef<'_>) -> bool {
    let Ok(selector) = Selector::parse("*") else {
        return false;
    };

    form.select(&selector)
        .filter(|el| el.id() != form.id())
        .any(|el| {
            let class = el.value().attr("class").unwrap_or("").to_lowercase();
            let id = el.value().attr("id").unwrap_or("").to_lowercase();
            LOGIN_MARKERS
                .iter()
                .any(|m| class.contains(m) || id.contains(m))
        })
}
