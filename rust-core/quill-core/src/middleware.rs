//! # Middleware System
//!
//! Request/response interception around route dispatch.
//!
//! Middlewares run `before_request` in registration order and
//! `after_response` in reverse order. Both hooks are async so a link may await
//! the database (the blog's session middleware resolves users this way).

use crate::api::ApiError;
use crate::json::parse_json_object;
use crate::request::{parse_query_string, ParsedBody, Request};
use crate::response::Response;
use crate::router::Method;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Middleware trait for request/response interception
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Called before the request handler
    ///
    /// Can modify the request or return early with a response.
    async fn before_request(&self, _req: &mut Request) -> MiddlewareResult {
        MiddlewareResult::Continue
    }

    /// Called after the request handler
    ///
    /// Can modify the response or perform logging.
    async fn after_response(&self, _req: &Request, _res: &mut Response) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(Response),
}

/// Middleware chain for processing requests
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Execute before_request for all middlewares
    ///
    /// Stops at the first middleware that responds.
    pub async fn run_before(&self, req: &mut Request) -> MiddlewareResult {
        for mw in &self.middlewares {
            if let MiddlewareResult::Respond(res) = mw.before_request(req).await {
                debug!(middleware = mw.name(), "Request short-circuited");
                return MiddlewareResult::Respond(res);
            }
        }
        MiddlewareResult::Continue
    }

    /// Execute after_response for all middlewares (in reverse order)
    pub async fn run_after(&self, req: &Request, res: &mut Response) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res).await;
        }
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

/// Logging middleware - logs method and path of every request
#[derive(Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn before_request(&self, req: &mut Request) -> MiddlewareResult {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        MiddlewareResult::Continue
    }

    async fn after_response(&self, req: &Request, res: &mut Response) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Parses POST bodies into [`Request::parsed_body`]
///
/// `application/json` bodies must be objects; `application/x-www-form-urlencoded`
/// bodies become string fields. Other content types are left alone. A body
/// that fails to parse is answered with a `value:invalid` error.
#[derive(Default)]
pub struct BodyParserMiddleware;

impl BodyParserMiddleware {
    /// Create a new body-parsing middleware
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn parse(req: &Request) -> Result<Option<ParsedBody>, ApiError> {
        let Some(content_type) = req.content_type() else {
            return Ok(None);
        };
        let body = req.body_bytes().unwrap_or_default();

        if content_type.starts_with("application/json") {
            if body.is_empty() {
                return Ok(Some(ParsedBody::new()));
            }
            return parse_json_object(body)
                .map(Some)
                .map_err(|e| ApiError::value("body", e.to_string()));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let text = std::str::from_utf8(body)
                .map_err(|_| ApiError::value("body", "form body is not valid UTF-8"))?;
            let form = parse_query_string(Some(text))
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            return Ok(Some(form));
        }

        Ok(None)
    }
}

#[async_trait]
impl Middleware for BodyParserMiddleware {
    async fn before_request(&self, req: &mut Request) -> MiddlewareResult {
        if req.method != Method::Post {
            return MiddlewareResult::Continue;
        }
        match Self::parse(req) {
            Ok(Some(parsed)) => {
                debug!(path = %req.path, fields = parsed.len(), "Request body parsed");
                req.parsed_body = Some(parsed);
                MiddlewareResult::Continue
            }
            Ok(None) => MiddlewareResult::Continue,
            Err(err) => MiddlewareResult::Respond(err.into_response()),
        }
    }

    fn name(&self) -> &'static str {
        "BodyParserMiddleware"
    }
}
