//! # Quill Blog
//!
//! A small blog on top of `quill-core`: users register and sign in with a
//! session cookie, admins write posts, signed-in users comment.
//!
//! ## Modules
//!
//! - `config` - Defaults, JSON override file and environment
//! - `models` - `User`, `Blog` and `Comment` entities
//! - `session` - Session cookies and the session middleware
//! - `handlers` - Page and API handlers and the route table
//! - `templates` - Minimal HTML shell for template replies

pub mod config;
pub mod handlers;
pub mod models;
pub mod session;
pub mod templates;

pub use config::{Config, ConfigError};
pub use handlers::{build_server, AppState};
