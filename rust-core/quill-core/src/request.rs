//! # HTTP Request
//!
//! Request wrapper handed to middlewares and handlers.
//!
//! The body is collected once; the query string is parsed up front. The
//! body-parsing middleware fills [`Request::parsed_body`], and other
//! middlewares attach request-scoped values (such as the signed-in user)
//! through [`Request::extensions_mut`].

use crate::error::{Error, Result};
use crate::router::Method;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::http::Extensions;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Parsed request body: a JSON object or decoded form fields
pub type ParsedBody = Map<String, Value>;

/// HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Request path (without query string)
    pub path: String,
    /// Raw query string (e.g., "page=1&limit=10")
    query_string: Option<String>,
    /// Parsed query parameters
    query_params: HashMap<String, String>,
    /// Request headers
    headers: hyper::HeaderMap,
    /// Request body (collected)
    body: Option<Bytes>,
    /// Body parsed by the body-parsing middleware (POST only)
    pub parsed_body: Option<ParsedBody>,
    /// Request-scoped values set by middlewares
    extensions: Extensions,
}

impl Request {
    /// Create a request manually (for in-process dispatch and tests)
    #[must_use]
    pub fn new(
        method: Method,
        path: String,
        headers_map: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Self {
        let (path, query_string) = match path.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (path, None),
        };

        let mut headers = hyper::HeaderMap::new();
        for (k, v) in headers_map {
            if let (Ok(n), Ok(v)) = (
                hyper::header::HeaderName::from_bytes(k.as_bytes()),
                hyper::header::HeaderValue::from_str(&v),
            ) {
                headers.insert(n, v);
            }
        }

        Self {
            method,
            path,
            query_params: parse_query_string(query_string.as_deref()),
            query_string,
            headers,
            body,
            parsed_body: None,
            extensions: Extensions::new(),
        }
    }

    /// Create from hyper request with body size limit
    ///
    /// # Errors
    ///
    /// `Error::PayloadTooLarge` when the declared or collected body exceeds
    /// `max_body_size`, `Error::RouteNotFound` for methods no route can use.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_http(req.method()).ok_or_else(|| Error::RouteNotFound {
            path: req.uri().path().to_string(),
        })?;

        let uri = req.uri();
        let path = uri.path().to_string();
        let query_string = uri.query().map(String::from);
        let query_params = parse_query_string(query_string.as_deref());

        let headers = req.headers().clone();
        let declared = headers
            .get(hyper::header::CONTENT_LENGTH)
            .and_then(|len| len.to_str().ok())
            .and_then(|len| len.parse::<usize>().ok());
        if let Some(content_len) = declared {
            if content_len > max_body_size {
                return Err(Error::PayloadTooLarge {
                    limit: max_body_size,
                    actual: content_len,
                });
            }
        }

        let collected = BodyExt::collect(req.into_body()).await?.to_bytes();
        if collected.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: collected.len(),
            });
        }
        let body = (!collected.is_empty()).then_some(collected);

        Ok(Self {
            method,
            path,
            query_string,
            query_params,
            headers,
            body,
            parsed_body: None,
            extensions: Extensions::new(),
        })
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            hyper::header::HeaderName::from_bytes(name.as_bytes()),
            hyper::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(n, v);
        }
    }

    /// Content type without parameters, lowercased
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Value of a cookie sent with the request
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(hyper::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v)
    }

    /// Get query parameters as a HashMap
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Get one query parameter
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    /// Get raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Request-scoped values
    #[must_use]
    pub const fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Mutable request-scoped values
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}

/// Parse an `application/x-www-form-urlencoded` string
///
/// Duplicate keys: last value wins.
#[must_use]
pub fn parse_query_string(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .map(|pair| {
                    let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                    (url_decode(key), url_decode(value))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Form/query decoding: `+` is a space, then percent escapes
#[must_use]
pub fn url_decode(s: &str) -> String {
    percent_decode(&s.replace('+', " "))
}

/// Decode `%XX` escapes as UTF-8; malformed escapes are kept literally
#[must_use]
pub fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let (hi, lo) = (bytes[i + 1], bytes[i + 2]);
            if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() {
                out.push((hex_value(hi) << 4) | hex_value(lo));
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

const fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_string_simple() {
        let result = parse_query_string(Some("page=1&limit=10"));
        assert_eq!(result.get("page"), Some(&"1".to_string()));
        assert_eq!(result.get("limit"), Some(&"10".to_string()));
    }

    #[test]
    fn test_parse_query_string_empty() {
        assert!(parse_query_string(None).is_empty());
        assert!(parse_query_string(Some("")).is_empty());
    }

    #[test]
    fn test_parse_query_string_url_encoded() {
        let result = parse_query_string(Some("name=John+Doe&city=New%20York&flag"));
        assert_eq!(result.get("name"), Some(&"John Doe".to_string()));
        assert_eq!(result.get("city"), Some(&"New York".to_string()));
        assert_eq!(result.get("flag"), Some(&String::new()));
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("hello+world"), "hello world");
        assert_eq!(url_decode("hello%20world"), "hello world");
        assert_eq!(url_decode("100%25"), "100%");
        assert_eq!(url_decode("caf%C3%A9"), "café");
        assert_eq!(url_decode("50%"), "50%");
        assert_eq!(url_decode("%zz"), "%zz");
    }

    #[test]
    fn test_percent_decode_keeps_plus() {
        assert_eq!(percent_decode("a+b%2Fc"), "a+b/c");
    }

    #[test]
    fn test_new_splits_query() {
        let req = Request::new(Method::Get, "/api/blogs?page=2".to_string(), HashMap::new(), None);
        assert_eq!(req.path, "/api/blogs");
        assert_eq!(req.query("page"), Some("2"));
        assert_eq!(req.query_string(), Some("page=2"));
    }

    #[test]
    fn test_cookie_lookup() {
        let headers = HashMap::from([(
            "cookie".to_string(),
            "theme=dark; awesession=abc-123-ff".to_string(),
        )]);
        let req = Request::new(Method::Get, "/".to_string(), headers, None);
        assert_eq!(req.cookie("awesession"), Some("abc-123-ff"));
        assert_eq!(req.cookie("missing"), None);
    }

    #[test]
    fn test_content_type_strips_parameters() {
        let headers = HashMap::from([(
            "Content-Type".to_string(),
            "Application/JSON; charset=utf-8".to_string(),
        )]);
        let req = Request::new(Method::Post, "/".to_string(), headers, None);
        assert_eq!(req.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_extensions_round_trip() {
        let mut req = Request::new(Method::Get, "/".to_string(), HashMap::new(), None);
        req.extensions_mut().insert(7_u32);
        assert_eq!(req.extensions().get::<u32>(), Some(&7));
    }
}
