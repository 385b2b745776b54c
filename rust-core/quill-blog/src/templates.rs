//! Minimal HTML shell for template replies.
//!
//! Full page templates live outside this crate. The shell renders enough to
//! browse the site without them: a header with the signed-in user, the
//! listings found in the context, and the context itself as embedded JSON for
//! client-side scripts.

use crate::models::now;
use crate::session::current_user;
use chrono::DateTime;
use quill_core::response::TEMPLATE_KEY;
use quill_core::{Error, Request, Result, TemplateRenderer};
use serde_json::{Map, Value};
use std::fmt::Write;

/// Escape text for HTML content and quoted attribute values
#[must_use]
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Human-readable age of an epoch timestamp
#[must_use]
pub fn datetime_filter(t: f64) -> String {
    datetime_since(t, now())
}

/// Age of `t` as seen at `now`: minutes, hours and days up to a week, then
/// the UTC date
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn datetime_since(t: f64, now: f64) -> String {
    let delta = (now - t) as i64;
    match delta {
        ..=59 => "1 minute ago".to_string(),
        60..=3599 => plural(delta / 60, "minute"),
        3600..=86_399 => plural(delta / 3600, "hour"),
        86_400..=604_799 => plural(delta / 86_400, "day"),
        _ => DateTime::from_timestamp(t as i64, 0)
            .map_or_else(|| t.to_string(), |dt| dt.format("%Y-%m-%d").to_string()),
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {unit} ago")
    } else {
        format!("{n} {unit}s ago")
    }
}

/// Renders every template name into the same HTML shell
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRenderer;

impl ShellRenderer {
    /// Create the renderer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

fn item_html(item: &Value) -> String {
    let title = item
        .get("name")
        .or_else(|| item.get("user_name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut html = format!("<li><strong>{}</strong>", escape_html(title));
    if let Some(t) = item.get("created_at").and_then(Value::as_f64) {
        let _ = write!(html, " <time>{}</time>", datetime_filter(t));
    }
    // html_content is produced by text2html and already escaped
    match item.get("html_content").and_then(Value::as_str) {
        Some(content) => html.push_str(content),
        None => {
            if let Some(summary) = item.get("summary").and_then(Value::as_str) {
                let _ = write!(html, "<p>{}</p>", escape_html(summary));
            }
        }
    }
    html.push_str("</li>");
    html
}

impl TemplateRenderer for ShellRenderer {
    fn render(&self, template: &str, context: &Map<String, Value>, req: &Request) -> Result<String> {
        let mut html = String::from("<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">");
        let _ = write!(html, "<title>{}</title></head>", escape_html(template));
        let _ = write!(html, "<body data-template=\"{}\"><header>", escape_html(template));
        match current_user(req) {
            Some(user) => {
                let _ = write!(
                    html,
                    "<span class=\"user\">{}</span> <a href=\"/signout\">Sign out</a>",
                    escape_html(&user.name)
                );
            }
            None => html.push_str("<a href=\"/signin\">Sign in</a> <a href=\"/register\">Register</a>"),
        }
        html.push_str("</header><main>");

        for (key, value) in context.iter().filter(|(k, _)| k.as_str() != TEMPLATE_KEY) {
            match value {
                Value::Array(items) => {
                    let _ = write!(html, "<ul class=\"{}\">", escape_html(key));
                    for item in items {
                        html.push_str(&item_html(item));
                    }
                    html.push_str("</ul>");
                }
                Value::Object(_) if value.get("name").is_some() => {
                    let _ = write!(html, "<ul class=\"{}\">{}</ul>", escape_html(key), item_html(value));
                }
                _ => {}
            }
        }

        let mut data = context.clone();
        if let Some(user) = current_user(req) {
            let user = serde_json::to_value(user).map_err(|e| Error::Template {
                template: template.to_string(),
                reason: e.to_string(),
            })?;
            data.insert("__user__".to_string(), user);
        }
        let json = serde_json::to_string(&data).map_err(|e| Error::Template {
            template: template.to_string(),
            reason: e.to_string(),
        })?;
        let _ = write!(
            html,
            "</main><script type=\"application/json\" id=\"context\">{}</script></body></html>",
            json.replace("</", "<\\/")
        );
        Ok(html)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use quill_core::Method;
    use serde_json::json;
    use std::collections::HashMap;

    fn req() -> Request {
        Request::new(Method::Get, "/".to_string(), HashMap::new(), None)
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > d"), "a &lt; b &amp;&amp; c &gt; d");
    }

    #[test]
    fn test_datetime_since() {
        let now = 1_700_000_000.0;
        assert_eq!(datetime_since(now - 5.0, now), "1 minute ago");
        assert_eq!(datetime_since(now - 61.0, now), "1 minute ago");
        assert_eq!(datetime_since(now - 300.0, now), "5 minutes ago");
        assert_eq!(datetime_since(now - 7200.0, now), "2 hours ago");
        assert_eq!(datetime_since(now - 86_400.0 * 3.0, now), "3 days ago");
        assert_eq!(datetime_since(now - 86_400.0 * 30.0, now), "2023-10-15");
    }

    #[test]
    fn test_datetime_since_dates() {
        let now = 1_800_000_000.0;
        assert_eq!(datetime_since(951_782_400.0, now), "2000-02-29");
        assert_eq!(datetime_since(1_700_000_000.0, now), "2023-11-14");
        assert_eq!(datetime_since(-86_400.0, now), "1969-12-31");
        assert_eq!(datetime_since(1e20, 2e20), "100000000000000000000");
    }

    #[test]
    fn test_escape_html_attribute_quotes() {
        assert_eq!(escape_html(r#"x" onload="y"#), "x&quot; onload=&quot;y");
        assert_eq!(escape_html("it's"), "it&#39;s");
    }

    #[test]
    fn test_shell_escapes_attribute_values() {
        let context = json!({"a\" onclick=\"x": [{"name": "n"}]});
        let html = ShellRenderer::new()
            .render("t\"x.html", context.as_object().unwrap(), &req())
            .unwrap();
        assert!(html.contains("data-template=\"t&quot;x.html\""));
        assert!(html.contains("<ul class=\"a&quot; onclick=&quot;x\">"));
    }

    #[test]
    fn test_shell_lists_context_items() {
        let context = json!({
            "__template__": "blogs.html",
            "blogs": [{"name": "First <post>", "summary": "s", "created_at": 1.0}],
        });
        let html = ShellRenderer::new()
            .render("blogs.html", context.as_object().unwrap(), &req())
            .unwrap();
        assert!(html.contains("<title>blogs.html</title>"));
        assert!(html.contains("First &lt;post&gt;"));
        assert!(html.contains("1970-01-01"));
        assert!(html.contains("Sign in"));
        assert!(!html.contains("</post>"));
    }

    #[test]
    fn test_shell_shows_current_user() {
        let mut req = req();
        req.extensions_mut().insert(User {
            name: "Ann".to_string(),
            ..User::default()
        });
        let html = ShellRenderer::new()
            .render("signin.html", &Map::new(), &req)
            .unwrap();
        assert!(html.contains("<span class=\"user\">Ann</span>"));
        assert!(html.contains("\"__user__\""));
    }
}
