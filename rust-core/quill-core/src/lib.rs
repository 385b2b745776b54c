//! # Quill Core
//!
//! Core runtime library for the Quill blog platform: a small entity mapper
//! over `sqlx` and an HTTP dispatch pipeline over `hyper`.
//!
//! ## Architecture
//!
//! Incoming request → middleware chain → route lookup → parameter binding →
//! handler → response normalization. Handlers use entities, which derive
//! their SQL from a cached schema description and run it through a pooled
//! statement executor.
//!
//! ## Modules
//!
//! - `database` - Connection pool and statement executor (SQLite, PostgreSQL)
//! - `schema` - Entity descriptions and derived statement templates
//! - `entity` - Entity CRUD on top of `schema` and `database`
//! - `page` - Pagination math
//! - `route` - Route metadata and parameter contracts
//! - `router` - Route table using matchit (radix trie)
//! - `types` - Parameter types and conversion
//! - `binder` - Fills parameter contracts from requests
//! - `request` - HTTP request wrapper with headers, cookies and query parsing
//! - `middleware` - Request/response middleware system
//! - `response` - Responses, handler replies and normalization
//! - `api` - Business errors rendered as JSON
//! - `json` - Request body parsing with simd-json
//! - `server` - HTTP server built on Hyper
//! - `error` - Error types and handling

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod binder;
pub mod database;
pub mod entity;
pub mod error;
pub mod json;
pub mod middleware;
pub mod page;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod schema;
pub mod server;
pub mod types;

pub use api::ApiError;
pub use binder::Args;
pub use database::{Backend, DatabasePool, DbValue, FromDbValue, PoolConfig, Row};
pub use entity::{Entity, FindOptions, Limit};
pub use error::{Error, Result};
pub use middleware::{
    BodyParserMiddleware, LoggingMiddleware, Middleware, MiddlewareChain, MiddlewareResult,
};
pub use page::Page;
pub use request::Request;
pub use response::{Reply, Response, TemplateRenderer};
pub use route::{Param, RouteInfo};
pub use router::{Method, Router};
pub use schema::{ColumnType, EntityDescriptor, Field};
pub use server::{handler, Handler, Server, ServerConfig};
pub use types::{ParamType, ParamValue};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, "0.1.0");
    }
}
