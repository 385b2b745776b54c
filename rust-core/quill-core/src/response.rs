//! # Responses
//!
//! [`Response`] is the concrete HTTP response; [`Reply`] is whatever a handler
//! chose to return. [`normalize`] maps a reply onto a response by its shape:
//!
//! | Reply                          | Response                                   |
//! |--------------------------------|--------------------------------------------|
//! | `Response`                     | passthrough                                |
//! | bytes                          | `application/octet-stream`                 |
//! | `"redirect:/x"`                | 302 to `/x`                                |
//! | other string                   | `text/html;charset=utf-8`                  |
//! | map with `__template__`        | rendered by the [`TemplateRenderer`]       |
//! | other map                      | `application/json;charset=utf-8`           |
//! | integer in 100..600            | bare status                                |
//! | (integer in 100..600, string)  | status with the string as body             |
//! | anything else                  | stringified, `text/plain;charset=utf-8`    |

use crate::error::{Error, Result};
use crate::json::to_json;
use crate::request::Request;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use serde_json::{Map, Value};

/// Key naming the template to render a map reply with
pub const TEMPLATE_KEY: &str = "__template__";

/// Redirect directive prefix for string replies
pub const REDIRECT_PREFIX: &str = "redirect:";

const HTML: &str = "text/html;charset=utf-8";
const JSON: &str = "application/json;charset=utf-8";
const TEXT: &str = "text/plain;charset=utf-8";
const BINARY: &str = "application/octet-stream";

/// HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: Bytes,
    /// Content type
    pub content_type: String,
    /// Additional headers; repeated names are sent repeatedly
    pub headers: Vec<(String, String)>,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: 200,
            body: Bytes::new(),
            content_type: TEXT.to_string(),
            headers: Vec::new(),
        }
    }
}

impl Response {
    /// Empty response with a status
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), HTML)
    }

    /// JSON response from already serialized text
    #[must_use]
    pub fn json_text(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), JSON)
    }

    /// JSON response from any serializable value
    ///
    /// # Errors
    ///
    /// `Error::Json` if the value does not serialize.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::json_text(to_json(value)?))
    }

    /// Plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_body(body.into(), TEXT)
    }

    /// Binary response
    #[must_use]
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: BINARY.to_string(),
            ..Self::default()
        }
    }

    /// 302 redirect
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::status(302).with_header("Location", location)
    }

    fn with_body(body: String, content_type: &str) -> Self {
        Self {
            body: Bytes::from(body),
            content_type: content_type.to_string(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
            return;
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
        self.headers.push((key.to_string(), value.to_string()));
    }

    /// First header value with this name
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Append a `Set-Cookie` header
    pub fn set_cookie(&mut self, name: &str, value: &str, max_age: i64, http_only: bool) {
        let mut cookie = format!("{name}={value}; Max-Age={max_age}; Path=/");
        if http_only {
            cookie.push_str("; HttpOnly");
        }
        self.headers.push(("Set-Cookie".to_string(), cookie));
    }

    /// Body as UTF-8 text, lossily
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert to hyper Response
    #[must_use]
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = hyper::Response::new(Full::new(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Ok(value) = hyper::header::HeaderValue::from_str(&self.content_type) {
            headers.insert(hyper::header::CONTENT_TYPE, value);
        }
        for (k, v) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(v),
            ) {
                headers.append(name, value);
            }
        }
        response
    }
}

/// Value returned by a handler
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// A finished response
    Response(Response),
    /// Raw bytes
    Bytes(Bytes),
    /// HTML text or a `redirect:` directive
    Text(String),
    /// Structured data, optionally naming a template
    Map(Map<String, Value>),
    /// Integer, a status code when in range
    Int(i64),
    /// Integer and text, a status with body when in range
    Pair(i64, String),
    /// Any other value
    Other(Value),
}

impl Reply {
    /// Serialize any value into a reply by its JSON shape
    ///
    /// # Errors
    ///
    /// `Error::Json` if the value does not serialize.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(serde_json::to_value(value)?.into())
    }

    /// Redirect directive
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::Text(format!("{REDIRECT_PREFIX}{location}"))
    }
}

impl From<Response> for Reply {
    fn from(value: Response) -> Self {
        Self::Response(value)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value.into())
    }
}

impl From<Bytes> for Reply {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for Reply {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Map<String, Value>> for Reply {
    fn from(value: Map<String, Value>) -> Self {
        Self::Map(value)
    }
}

impl From<i64> for Reply {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u16> for Reply {
    fn from(value: u16) -> Self {
        Self::Int(i64::from(value))
    }
}

impl<S: Into<String>> From<(u16, S)> for Reply {
    fn from((status, body): (u16, S)) -> Self {
        Self::Pair(i64::from(status), body.into())
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Self::Map(map),
            Value::String(s) => Self::Text(s),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Other(Value::Number(n)),
            },
            other => Self::Other(other),
        }
    }
}

/// Renders named templates for map replies
///
/// The map is the template context; the request is available for values such
/// as the signed-in user placed in its extensions by middlewares.
pub trait TemplateRenderer: Send + Sync {
    /// Render `template` with `context`
    ///
    /// # Errors
    ///
    /// `Error::Template` when the template is unknown or fails to render.
    fn render(&self, template: &str, context: &Map<String, Value>, req: &Request) -> Result<String>;
}

fn is_status(code: i64) -> bool {
    (100..600).contains(&code)
}

/// Map a handler reply to a response
///
/// # Errors
///
/// `Error::Template` when a template reply cannot be rendered, and
/// `Error::Json` when a map fails to serialize.
pub fn normalize(
    reply: Reply,
    req: &Request,
    templates: Option<&dyn TemplateRenderer>,
) -> Result<Response> {
    match reply {
        Reply::Response(response) => Ok(response),
        Reply::Bytes(body) => Ok(Response::bytes(body)),
        Reply::Text(text) => Ok(match text.strip_prefix(REDIRECT_PREFIX) {
            Some(location) => Response::redirect(location),
            None => Response::html(text),
        }),
        Reply::Map(map) => match map.get(TEMPLATE_KEY) {
            Some(name) => {
                let name = name.as_str().map_or_else(|| name.to_string(), str::to_string);
                let renderer = templates.ok_or_else(|| Error::Template {
                    template: name.clone(),
                    reason: "no template renderer configured".to_string(),
                })?;
                Ok(Response::html(renderer.render(&name, &map, req)?))
            }
            None => Response::json(&map),
        },
        Reply::Int(code) if is_status(code) => Ok(Response::status(status_u16(code))),
        Reply::Pair(code, body) if is_status(code) => Ok(Response::text(body).with_status(status_u16(code))),
        Reply::Int(code) => Ok(Response::text(code.to_string())),
        Reply::Pair(code, body) => Ok(Response::text(format!("({code}, {body:?})"))),
        Reply::Other(value) => Ok(Response::text(value.to_string())),
    }
}

fn status_u16(code: i64) -> u16 {
    u16::try_from(code).unwrap_or(500)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;
    use serde_json::json;
    use std::collections::HashMap;

    fn req() -> Request {
        Request::new(Method::Get, "/".to_string(), HashMap::new(), None)
    }

    struct EchoRenderer;

    impl TemplateRenderer for EchoRenderer {
        fn render(&self, template: &str, context: &Map<String, Value>, _req: &Request) -> Result<String> {
            Ok(format!("<{template}:{}>", context.len()))
        }
    }

    #[test]
    fn test_passthrough() {
        let original = Response::text("hi").with_status(201);
        let out = normalize(original.clone().into(), &req(), None).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn test_bytes_are_binary() {
        let out = normalize(vec![1_u8, 2, 3].into(), &req(), None).unwrap();
        assert_eq!(out.content_type, "application/octet-stream");
        assert_eq!(out.body.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_redirect_directive() {
        let out = normalize("redirect:/x".into(), &req(), None).unwrap();
        assert_eq!(out.status, 302);
        assert_eq!(out.header("location"), Some("/x"));
    }

    #[test]
    fn test_plain_string_is_html() {
        let out = normalize("<h1>hi</h1>".into(), &req(), None).unwrap();
        assert_eq!(out.status, 200);
        assert_eq!(out.content_type, "text/html;charset=utf-8");
        assert_eq!(out.body_text(), "<h1>hi</h1>");
    }

    #[test]
    fn test_map_without_template_is_json() {
        let reply = Reply::json(&json!({"page": {"page_index": 1}, "blogs": []})).unwrap();
        let out = normalize(reply, &req(), None).unwrap();
        assert_eq!(out.content_type, "application/json;charset=utf-8");
        let body: Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(body["page"]["page_index"], 1);
    }

    #[test]
    fn test_map_with_template_is_rendered() {
        let reply = Reply::json(&json!({"__template__": "blogs.html", "page": 1})).unwrap();
        let out = normalize(reply, &req(), Some(&EchoRenderer)).unwrap();
        assert_eq!(out.body_text(), "<blogs.html:2>");
        assert_eq!(out.content_type, "text/html;charset=utf-8");
    }

    #[test]
    fn test_template_without_renderer_fails() {
        let reply = Reply::json(&json!({"__template__": "blogs.html"})).unwrap();
        let result = normalize(reply, &req(), None);
        assert!(matches!(result, Err(Error::Template { .. })));
    }

    #[test]
    fn test_status_codes() {
        let out = normalize(204_u16.into(), &req(), None).unwrap();
        assert_eq!(out.status, 204);
        assert!(out.body.is_empty());

        let out = normalize((404, "missing").into(), &req(), None).unwrap();
        assert_eq!(out.status, 404);
        assert_eq!(out.body_text(), "missing");
    }

    #[test]
    fn test_out_of_range_integer_is_stringified() {
        let out = normalize(Reply::Int(42), &req(), None).unwrap();
        assert_eq!(out.status, 200);
        assert_eq!(out.body_text(), "42");
        assert_eq!(out.content_type, "text/plain;charset=utf-8");
    }

    #[test]
    fn test_other_values_are_stringified() {
        let out = normalize(Reply::json(&json!([1, 2])).unwrap(), &req(), None).unwrap();
        assert_eq!(out.body_text(), "[1,2]");
    }

    #[test]
    fn test_cookies_accumulate() {
        let mut res = Response::redirect("/");
        res.set_cookie("awesession", "-deleted-", 0, true);
        res.set_cookie("theme", "dark", 60, false);
        let hyper_res = res.into_hyper();
        assert_eq!(hyper_res.headers().get_all("set-cookie").iter().count(), 2);
        assert_eq!(hyper_res.status(), 302);
    }
}
