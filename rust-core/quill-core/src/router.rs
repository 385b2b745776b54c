//! # Router
//!
//! Radix-trie based route table using `matchit`.
//!
//! ## Features
//!
//! - Path parameter extraction (`/blog/{id}`)
//! - Typed parameters (`/users/{id:int}`)
//! - Exact method + path matching; a known path under another method is a miss

use crate::error::{Error, Result};
use crate::request::percent_decode;
use crate::route::{Param, RouteInfo};
use matchit::Router as MatchitRouter;
use std::collections::HashMap;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method; extension methods have no routes
    #[must_use]
    pub fn from_http(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

/// Route handler identifier
pub type HandlerId = usize;

/// Matched route with its extracted path segments
#[derive(Debug)]
pub struct Match<'a> {
    /// The handler ID for this route
    pub handler_id: HandlerId,
    /// Route metadata, including the parameter contract
    pub route: &'a RouteInfo,
    /// Percent-decoded path segments keyed by placeholder name
    pub params: HashMap<String, String>,
}

impl Match<'_> {
    /// Raw path segment by placeholder name
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// HTTP route table using a radix trie per method
#[derive(Clone, Default)]
pub struct Router {
    /// Per-method routers for efficient matching
    method_routes: HashMap<Method, MatchitRouter<HandlerId>>,
    /// Route metadata indexed by handler ID
    routes: Vec<RouteInfo>,
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route with its parameter contract
    ///
    /// Handler IDs are assigned sequentially from 0 in registration order.
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoute` if the contract cannot be satisfied, and
    /// `Error::InvalidRoutePattern` if the pattern is malformed or conflicts
    /// with an existing route.
    pub fn add_route(&mut self, method: Method, path: &str, params: Vec<Param>) -> Result<HandlerId> {
        let handler_id = self.routes.len();
        let route_info = RouteInfo::new(handler_id, method, path, params)?;

        self.method_routes
            .entry(method)
            .or_default()
            .insert(route_info.match_pattern.clone(), handler_id)
            .map_err(|e| Error::InvalidRoutePattern {
                pattern: path.to_string(),
                reason: e.to_string(),
            })?;

        self.routes.push(route_info);
        Ok(handler_id)
    }

    /// Match a request path against registered routes
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no route exists for this method and path
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match<'_>> {
        let not_found = || Error::RouteNotFound {
            path: path.to_string(),
        };

        let matched = self
            .method_routes
            .get(&method)
            .ok_or_else(not_found)?
            .at(path)
            .map_err(|_| not_found())?;

        let handler_id = *matched.value;
        let route = self.routes.get(handler_id).ok_or_else(not_found)?;

        let params = matched
            .params
            .iter()
            .map(|(name, value)| (name.to_string(), percent_decode(value)))
            .collect();

        Ok(Match {
            handler_id,
            route,
            params,
        })
    }

    /// All registered routes in registration order
    #[must_use]
    pub fn routes(&self) -> &[RouteInfo] {
        &self.routes
    }

    /// Convenience method to add a GET route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn get(&mut self, path: &str, params: Vec<Param>) -> Result<HandlerId> {
        self.add_route(Method::Get, path, params)
    }

    /// Convenience method to add a POST route
    ///
    /// # Errors
    ///
    /// See [`Router::add_route`].
    pub fn post(&mut self, path: &str, params: Vec<Param>) -> Result<HandlerId> {
        self.add_route(Method::Post, path, params)
    }
}
