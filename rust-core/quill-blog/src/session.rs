//! Session cookies and the session middleware.
//!
//! A cookie reads `<user id>-<expires>-<digest>`, where `digest` is the hex
//! SHA-1 of `<user id>-<stored password hash>-<expires>-<server secret>`.
//! Changing the password therefore invalidates every outstanding cookie.

use crate::models::User;
use async_trait::async_trait;
use quill_core::{DatabasePool, Entity, Middleware, MiddlewareResult, Request, Response};
use sha1::{Digest, Sha1};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

/// Prefix of the admin area
pub const MANAGE_PREFIX: &str = "/manage/";

/// Where anonymous visitors of the admin area are sent
pub const SIGNIN_PATH: &str = "/signin";

fn epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Hex SHA-1 of `input`
#[must_use]
pub fn sha1_hex(input: &str) -> String {
    format!("{:x}", Sha1::digest(input.as_bytes()))
}

fn digest(uid: &str, passwd: &str, expires: &str, secret: &str) -> String {
    sha1_hex(&format!("{uid}-{passwd}-{expires}-{secret}"))
}

/// Build a session cookie valid for `max_age` seconds
#[must_use]
pub fn user2cookie(user: &User, max_age: i64, secret: &str) -> String {
    let expires = (epoch_secs() + max_age).to_string();
    let sha1 = digest(user.id(), &user.passwd, &expires, secret);
    format!("{}-{expires}-{sha1}", user.id())
}

/// Resolve a session cookie to its user, password masked
///
/// `None` for malformed, expired or forged cookies and for unknown users.
pub async fn cookie2user(pool: &DatabasePool, cookie: &str, secret: &str) -> Option<User> {
    let mut parts = cookie.split('-');
    let (Some(uid), Some(expires), Some(sha1), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };
    if uid.is_empty() || expires.parse::<i64>().ok()? < epoch_secs() {
        return None;
    }

    let user = match User::find(pool, uid.into()).await {
        Ok(found) => found?,
        Err(err) => {
            warn!(error = %err, "session lookup failed");
            return None;
        }
    };
    if sha1 != digest(uid, &user.passwd, expires, secret) {
        info!("invalid sha1");
        return None;
    }
    Some(user.masked())
}

/// The signed-in user of a request, if any
#[must_use]
pub fn current_user(req: &Request) -> Option<&User> {
    req.extensions().get::<User>()
}

/// Resolves the session cookie and guards the admin area
///
/// The user lands in the request extensions (see [`current_user`]). Requests
/// under `/manage/` without an admin are redirected to `/signin`.
pub struct SessionMiddleware {
    pool: DatabasePool,
    secret: String,
    cookie_name: String,
}

impl SessionMiddleware {
    /// Create a session middleware
    #[must_use]
    pub fn new(pool: DatabasePool, secret: impl Into<String>, cookie_name: impl Into<String>) -> Self {
        Self {
            pool,
            secret: secret.into(),
            cookie_name: cookie_name.into(),
        }
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    async fn before_request(&self, req: &mut Request) -> MiddlewareResult {
        let cookie = req.cookie(&self.cookie_name).map(str::to_string);
        if let Some(cookie) = cookie {
            if let Some(user) = cookie2user(&self.pool, &cookie, &self.secret).await {
                info!(email = %user.email, "set current user");
                req.extensions_mut().insert(user);
            }
        }

        let is_admin = current_user(req).is_some_and(|u| u.admin);
        if req.path.starts_with(MANAGE_PREFIX) && !is_admin {
            return MiddlewareResult::Respond(Response::redirect(SIGNIN_PATH));
        }
        MiddlewareResult::Continue
    }

    fn name(&self) -> &'static str {
        "SessionMiddleware"
    }
}
