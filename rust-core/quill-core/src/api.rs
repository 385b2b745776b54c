//! # API Errors
//!
//! Business errors raised by handlers, rendered as structured JSON bodies:
//!
//! ```json
//! {"error": "value:invalid", "data": "email", "message": "Invalid email."}
//! ```
//!
//! Core failures bubbling up through `?` become [`ApiError::Internal`], which
//! is logged and answered with a generic 500.

use crate::error::Error;
use crate::response::Response;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Handler-facing error taxonomy
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad input value for a named field (400)
    #[error("value:invalid {field}: {message}")]
    Value {
        /// Offending field
        field: String,
        /// Human-readable message
        message: String,
    },

    /// Referenced resource does not exist (404)
    #[error("value:notfound {resource}: {message}")]
    ResourceNotFound {
        /// Resource kind or key
        resource: String,
        /// Human-readable message
        message: String,
    },

    /// Caller lacks the required rights (403)
    #[error("permission:forbidden {message}")]
    Permission {
        /// Human-readable message
        message: String,
    },

    /// Catch-all business error (400)
    #[error("{error} {data}: {message}")]
    Generic {
        /// Machine-readable code such as `register:failed`
        error: String,
        /// Related field or value
        data: String,
        /// Human-readable message
        message: String,
    },

    /// Infrastructure failure (500)
    #[error(transparent)]
    Internal(#[from] Error),
}

/// JSON body of an API error
#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    data: &'a str,
    message: &'a str,
}

impl ApiError {
    /// Invalid value for `field`
    pub fn value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Value {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Missing resource
    pub fn not_found(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceNotFound {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Forbidden
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    /// Business error with a custom code
    pub fn generic(
        error: impl Into<String>,
        data: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Generic {
            error: error.into(),
            data: data.into(),
            message: message.into(),
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Value { .. } | Self::Generic { .. } => 400,
            Self::ResourceNotFound { .. } => 404,
            Self::Permission { .. } => 403,
            Self::Internal(_) => 500,
        }
    }

    /// Render as an HTTP response
    #[must_use]
    pub fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Value { field, message } => ErrorBody {
                error: "value:invalid",
                data: field,
                message,
            },
            Self::ResourceNotFound { resource, message } => ErrorBody {
                error: "value:notfound",
                data: resource,
                message,
            },
            Self::Permission { message } => ErrorBody {
                error: "permission:forbidden",
                data: "permission",
                message,
            },
            Self::Generic {
                error,
                data,
                message,
            } => ErrorBody {
                error,
                data,
                message,
            },
            Self::Internal(err) => {
                error!(error = %err, "Unhandled error while serving request");
                return Response::json_text(r#"{"error": "Internal Server Error"}"#).with_status(status);
            }
        };

        match serde_json::to_string(&body) {
            Ok(json) => Response::json_text(json).with_status(status),
            Err(err) => ApiError::Internal(err.into()).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn body_json(res: &Response) -> Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    #[test]
    fn test_value_error_shape() {
        let res = ApiError::value("email", "Invalid email.").into_response();
        assert_eq!(res.status, 400);
        assert!(res.content_type.starts_with("application/json"));
        let json = body_json(&res);
        assert_eq!(json["error"], "value:invalid");
        assert_eq!(json["data"], "email");
        assert_eq!(json["message"], "Invalid email.");
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::not_found("Blog", "missing").status(), 404);
        assert_eq!(ApiError::permission("admin only").status(), 403);
        assert_eq!(ApiError::generic("register:failed", "email", "taken").status(), 400);
    }

    #[test]
    fn test_generic_code_is_kept() {
        let res = ApiError::generic("register:failed", "email", "Email is already in use.").into_response();
        assert_eq!(body_json(&res)["error"], "register:failed");
    }

    #[test]
    fn test_internal_hides_details() {
        let err: ApiError = Error::Query {
            message: "no such table: users".to_string(),
        }
        .into();
        let res = err.into_response();
        assert_eq!(res.status, 500);
        assert!(!String::from_utf8_lossy(&res.body).contains("users"));
    }
}
