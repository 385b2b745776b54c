//! # Parameter Binder
//!
//! Fills a route's parameter contract from a request. Path parameters come
//! from the matched path segments; everything else from the parsed body, then
//! the query string. Binding failures are value errors, never panics.

use crate::api::ApiError;
use crate::request::Request;
use crate::route::{ParamSource, ParamSpec, RouteInfo};
use crate::types::{convert_json, convert_param, ParamValue};
use std::collections::HashMap;
use std::sync::Arc;

/// Arguments bound for one handler invocation
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: HashMap<String, ParamValue>,
    request: Option<Arc<Request>>,
}

impl Args {
    /// Bound value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Bound value rendered as a string
    ///
    /// # Errors
    ///
    /// `ApiError::Value` if the parameter was not bound.
    pub fn string(&self, name: &str) -> Result<String, ApiError> {
        self.require(name).map(ParamValue::as_string)
    }

    /// Bound integer
    ///
    /// # Errors
    ///
    /// `ApiError::Value` if absent or not an integer.
    pub fn int(&self, name: &str) -> Result<i64, ApiError> {
        self.require(name)?
            .as_int()
            .ok_or_else(|| ApiError::value(name, format!("{name} must be an integer")))
    }

    /// Bound float
    ///
    /// # Errors
    ///
    /// `ApiError::Value` if absent or not a float.
    pub fn float(&self, name: &str) -> Result<f64, ApiError> {
        self.require(name)?
            .as_float()
            .ok_or_else(|| ApiError::value(name, format!("{name} must be a number")))
    }

    /// Bound boolean
    ///
    /// # Errors
    ///
    /// `ApiError::Value` if absent or not a boolean.
    pub fn bool(&self, name: &str) -> Result<bool, ApiError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| ApiError::value(name, format!("{name} must be a boolean")))
    }

    /// The raw request, when the contract asked for it
    #[must_use]
    pub fn request(&self) -> Option<&Request> {
        self.request.as_deref()
    }

    /// Number of bound values, excluding the request
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no value is bound
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> Result<&ParamValue, ApiError> {
        self.values
            .get(name)
            .ok_or_else(|| ApiError::value(name, format!("{name} is required")))
    }
}

/// Bind every contract entry of `route`, in declaration order
///
/// # Errors
///
/// `ApiError::Value` naming the first parameter that is missing or does not
/// convert to its declared type.
pub fn bind(
    route: &RouteInfo,
    path_params: &HashMap<String, String>,
    req: &Arc<Request>,
) -> Result<Args, ApiError> {
    let mut args = Args::default();

    for spec in &route.params {
        let value = match spec.source {
            ParamSource::Request => {
                args.request = Some(Arc::clone(req));
                continue;
            }
            ParamSource::Path => path_params
                .get(&spec.name)
                .map(|raw| convert_param(raw, spec.param_type))
                .transpose()
                .map_err(|_| type_error(spec))?,
            ParamSource::Body => body_or_query(spec, req)?,
        };

        match value.or_else(|| spec.default.clone()) {
            Some(value) => {
                args.values.insert(spec.name.clone(), value);
            }
            None if spec.required => {
                return Err(ApiError::value(&spec.name, format!("{} is required", spec.name)));
            }
            None => {}
        }
    }

    Ok(args)
}

fn body_or_query(spec: &ParamSpec, req: &Request) -> Result<Option<ParamValue>, ApiError> {
    let from_body = req
        .parsed_body
        .as_ref()
        .and_then(|body| body.get(&spec.name))
        .map(|value| convert_json(value, spec.param_type))
        .transpose()
        .map_err(|_| type_error(spec))?
        .flatten();
    if from_body.is_some() {
        return Ok(from_body);
    }

    req.query(&spec.name)
        .map(|raw| convert_param(raw, spec.param_type))
        .transpose()
        .map_err(|_| type_error(spec))
}

fn type_error(spec: &ParamSpec) -> ApiError {
    ApiError::value(
        &spec.name,
        format!("{} must be of type {}", spec.name, spec.param_type),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::Param;
    use crate::router::Method;
    use crate::types::ParamType;
    use serde_json::json;

    fn route(path: &str, params: Vec<Param>) -> RouteInfo {
        RouteInfo::new(0, Method::Post, path, params).unwrap()
    }

    fn request(uri: &str, body: Option<serde_json::Value>) -> Arc<Request> {
        let mut req = Request::new(Method::Post, uri.to_string(), HashMap::new(), None);
        req.parsed_body = body.and_then(|b| b.as_object().cloned());
        Arc::new(req)
    }

    fn path(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_path_value_binds() {
        let route = route("/blog/{id}", vec![Param::positional("id")]);
        let args = bind(&route, &path(&[("id", "0017")]), &request("/blog/0017", None)).unwrap();
        assert_eq!(args.string("id").unwrap(), "0017");
    }

    #[test]
    fn test_body_wins_over_query() {
        let route = route("/api/blogs", vec![Param::required("name")]);
        let req = request("/api/blogs?name=query", Some(json!({"name": "body"})));
        let args = bind(&route, &HashMap::new(), &req).unwrap();
        assert_eq!(args.string("name").unwrap(), "body");
    }

    #[test]
    fn test_query_used_without_body() {
        let route = route(
            "/api/blogs",
            vec![Param::optional("page", "1").typed(ParamType::Int)],
        );
        let args = bind(&route, &HashMap::new(), &request("/api/blogs?page=3", None)).unwrap();
        assert_eq!(args.int("page").unwrap(), 3);
    }

    #[test]
    fn test_default_applies_when_absent() {
        let route = route(
            "/api/blogs",
            vec![Param::optional("page", "1").typed(ParamType::Int)],
        );
        let args = bind(&route, &HashMap::new(), &request("/api/blogs", None)).unwrap();
        assert_eq!(args.int("page").unwrap(), 1);
    }

    #[test]
    fn test_json_null_counts_as_absent() {
        let route = route("/api/users", vec![Param::required("email")]);
        let req = request("/api/users", Some(json!({"email": null})));
        let err = bind(&route, &HashMap::new(), &req).unwrap_err();
        assert!(matches!(err, ApiError::Value { ref field, .. } if field == "email"));
    }

    #[test]
    fn test_missing_required_is_value_error() {
        let route = route("/api/users", vec![Param::required("email"), Param::required("name")]);
        let req = request("/api/users", Some(json!({"email": "a@b.io"})));
        let err = bind(&route, &HashMap::new(), &req).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(matches!(err, ApiError::Value { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_type_mismatch_is_value_error() {
        let route = route(
            "/api/blogs",
            vec![Param::optional("page", "1").typed(ParamType::Int)],
        );
        let err = bind(&route, &HashMap::new(), &request("/api/blogs?page=two", None)).unwrap_err();
        assert!(matches!(err, ApiError::Value { .. }));
    }

    #[test]
    fn test_request_injection() {
        let route = route("/api/blogs", vec![Param::request()]);
        let args = bind(&route, &HashMap::new(), &request("/api/blogs?x=1", None)).unwrap();
        assert_eq!(args.request().map(|r| r.path.as_str()), Some("/api/blogs"));
        assert!(args.is_empty());
    }

    #[test]
    fn test_request_absent_unless_declared() {
        let route = route("/api/blogs", vec![]);
        let args = bind(&route, &HashMap::new(), &request("/api/blogs", None)).unwrap();
        assert!(args.request().is_none());
    }
}
