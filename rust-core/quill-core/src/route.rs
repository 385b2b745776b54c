//! # Route Metadata
//!
//! A registered route: its path pattern and the handler's parameter contract.
//!
//! Handlers declare their parameters explicitly with [`Param`]. At
//! registration the declarations are resolved against the path pattern into a
//! contract of [`ParamSpec`]s, and contracts that can never be satisfied are
//! rejected before the server starts.

use crate::error::{Error, Result};
use crate::router::{HandlerId, Method};
use crate::types::{convert_param, ParamType, ParamValue};
use std::collections::HashMap;

/// Reserved parameter name for raw request injection
pub const REQUEST_PARAM: &str = "request";

/// How a parameter was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Bare required argument; only a path placeholder can supply it
    Positional,
    /// Named argument from path, body or query
    Keyword,
    /// The raw request object
    Request,
}

/// A handler parameter declaration
#[derive(Debug, Clone)]
pub struct Param {
    name: String,
    kind: ParamKind,
    param_type: Option<ParamType>,
    default: Option<String>,
}

impl Param {
    /// Required argument that must come from a path placeholder
    pub fn positional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Positional,
            param_type: None,
            default: None,
        }
    }

    /// Required named argument (path, body or query)
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Keyword,
            param_type: None,
            default: None,
        }
    }

    /// Named argument with a default used when absent
    pub fn optional(name: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::Keyword,
            param_type: None,
            default: Some(default.into()),
        }
    }

    /// Inject the raw request
    #[must_use]
    pub fn request() -> Self {
        Self {
            name: REQUEST_PARAM.to_string(),
            kind: ParamKind::Request,
            param_type: None,
            default: None,
        }
    }

    /// Coerce the bound value to `param_type`
    #[must_use]
    pub const fn typed(mut self, param_type: ParamType) -> Self {
        self.param_type = Some(param_type);
        self
    }

    /// Declared name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Where a parameter's value is taken from at dispatch time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamSource {
    /// Extracted path segment
    Path,
    /// Parsed JSON body, parsed form body, then query string
    Body,
    /// The request itself
    Request,
}

/// One resolved entry of a parameter contract
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name
    pub name: String,
    /// Value source
    pub source: ParamSource,
    /// Coercion target
    pub param_type: ParamType,
    /// Binding fails when absent and no default exists
    pub required: bool,
    /// Value bound when absent
    pub default: Option<ParamValue>,
}

/// Route metadata containing handler and contract information
#[derive(Debug, Clone)]
pub struct RouteInfo {
    /// Unique handler identifier
    pub handler_id: HandlerId,
    /// HTTP method
    pub method: Method,
    /// Original path pattern (e.g., "/users/{id:int}")
    pub path_pattern: String,
    /// Normalized path for matchit (e.g., "/users/{id}")
    pub match_pattern: String,
    /// Path placeholder name to type mapping
    pub param_types: HashMap<String, ParamType>,
    /// Ordered parameter contract
    pub params: Vec<ParamSpec>,
}

impl RouteInfo {
    /// Resolve a route and its parameter contract
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoute` when a positional parameter names no placeholder,
    /// a name is declared twice, or a default does not convert to its type.
    pub fn new(handler_id: HandlerId, method: Method, path: &str, params: Vec<Param>) -> Result<Self> {
        let (match_pattern, param_types) = Self::parse_path_pattern(path);

        let invalid = |param: &str, reason: &str| Error::InvalidRoute {
            method: method.to_string(),
            pattern: path.to_string(),
            param: param.to_string(),
            reason: reason.to_string(),
        };

        let mut specs: Vec<ParamSpec> = Vec::with_capacity(params.len());
        for param in params {
            if specs.iter().any(|s| s.name == param.name) {
                return Err(invalid(&param.name, "is declared twice"));
            }

            let in_path = param_types.get(&param.name).copied();
            let spec = match (param.kind, in_path) {
                (ParamKind::Request, _) => ParamSpec {
                    name: param.name,
                    source: ParamSource::Request,
                    param_type: ParamType::String,
                    required: true,
                    default: None,
                },
                (ParamKind::Positional, None) => {
                    return Err(invalid(
                        &param.name,
                        "is required but is not a path placeholder and has no default",
                    ));
                }
                (_, Some(path_type)) => ParamSpec {
                    name: param.name,
                    source: ParamSource::Path,
                    param_type: param.param_type.unwrap_or(path_type),
                    required: true,
                    default: None,
                },
                (ParamKind::Keyword, None) => {
                    let param_type = param.param_type.unwrap_or_default();
                    let default = match &param.default {
                        Some(raw) => Some(
                            convert_param(raw, param_type)
                                .map_err(|_| invalid(&param.name, "has a default that does not match its type"))?,
                        ),
                        None => None,
                    };
                    ParamSpec {
                        required: default.is_none(),
                        name: param.name,
                        source: ParamSource::Body,
                        param_type,
                        default,
                    }
                }
            };
            specs.push(spec);
        }

        Ok(Self {
            handler_id,
            method,
            path_pattern: path.to_string(),
            match_pattern,
            param_types,
            params: specs,
        })
    }

    /// Parse path pattern to extract parameter types
    ///
    /// Converts `{name:type}` to `{name}` for matchit compatibility
    /// and builds the param_types map.
    fn parse_path_pattern(path: &str) -> (String, HashMap<String, ParamType>) {
        let mut param_types = HashMap::new();
        let mut normalized_parts = Vec::new();

        for segment in path.split('/') {
            if segment.is_empty() {
                continue;
            }

            if let Some((name, param_type)) = crate::types::parse_param_pattern(segment) {
                normalized_parts.push(format!("{{{name}}}"));
                param_types.insert(name, param_type);
            } else {
                normalized_parts.push(segment.to_string());
            }
        }

        let mut normalized = if normalized_parts.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", normalized_parts.join("/"))
        };
        if path.len() > 1 && path.ends_with('/') {
            normalized.push('/');
        }

        (normalized, param_types)
    }

    /// Get the type for a path parameter by name
    ///
    /// Returns `ParamType::String` if parameter not found
    #[must_use]
    pub fn get_param_type(&self, name: &str) -> ParamType {
        self.param_types.get(name).copied().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_info_simple() {
        let info = RouteInfo::new(0, Method::Get, "/users", vec![]).unwrap();
        assert_eq!(info.match_pattern, "/users");
        assert!(info.param_types.is_empty());
        assert!(info.params.is_empty());
    }

    #[test]
    fn test_trailing_slash_is_kept() {
        let info = RouteInfo::new(0, Method::Get, "/manage/", vec![]).unwrap();
        assert_eq!(info.match_pattern, "/manage/");
        let root = RouteInfo::new(0, Method::Get, "/", vec![]).unwrap();
        assert_eq!(root.match_pattern, "/");
    }

    #[test]
    fn test_route_info_with_typed_param() {
        let info = RouteInfo::new(0, Method::Get, "/users/{id:int}", vec![Param::positional("id")]).unwrap();
        assert_eq!(info.match_pattern, "/users/{id}");
        assert_eq!(info.get_param_type("id"), ParamType::Int);
        assert_eq!(info.params[0].source, ParamSource::Path);
        assert_eq!(info.params[0].param_type, ParamType::Int);
    }

    #[test]
    fn test_contract_classification() {
        let info = RouteInfo::new(
            3,
            Method::Post,
            "/api/blogs/{id}",
            vec![
                Param::positional("id"),
                Param::request(),
                Param::required("name"),
                Param::optional("page", "1").typed(ParamType::Int),
            ],
        )
        .unwrap();

        let sources: Vec<_> = info.params.iter().map(|p| p.source).collect();
        assert_eq!(
            sources,
            vec![
                ParamSource::Path,
                ParamSource::Request,
                ParamSource::Body,
                ParamSource::Body
            ]
        );
        assert!(info.params[2].required);
        assert!(!info.params[3].required);
        assert_eq!(info.params[3].default, Some(ParamValue::Int(1)));
    }

    #[test]
    fn test_keyword_matching_placeholder_is_path_sourced() {
        let info = RouteInfo::new(0, Method::Post, "/api/blog/{id}/delete", vec![Param::required("id")]).unwrap();
        assert_eq!(info.params[0].source, ParamSource::Path);
    }

    #[test]
    fn test_unsatisfiable_positional_fails() {
        let err = RouteInfo::new(0, Method::Get, "/blog", vec![Param::positional("id")]).unwrap_err();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    fn test_duplicate_param_fails() {
        let result = RouteInfo::new(
            0,
            Method::Get,
            "/x",
            vec![Param::required("a"), Param::optional("a", "1")],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_default_fails() {
        let result = RouteInfo::new(
            0,
            Method::Get,
            "/x",
            vec![Param::optional("page", "one").typed(ParamType::Int)],
        );
        assert!(result.is_err());
    }
}
