//! # HTTP Server
//!
//! HTTP server built on Hyper and Tokio.
//! Implements graceful shutdown with signal handling.
//!
//! Every request runs the same pipeline, over the network or through
//! [`Server::test_request`]:
//!
//! 1. assign an `x-request-id`
//! 2. middleware `before_request` hooks (may short-circuit)
//! 3. route lookup (404 when nothing matches)
//! 4. parameter binding (value errors become 400 responses)
//! 5. handler invocation
//! 6. response normalization
//! 7. middleware `after_response` hooks, in reverse order

use crate::api::ApiError;
use crate::binder::{bind, Args};
use crate::error::{Error, Result};
use crate::middleware::{Middleware, MiddlewareChain, MiddlewareResult};
use crate::request::Request;
use crate::response::{normalize, Reply, Response, TemplateRenderer};
use crate::route::Param;
use crate::router::{HandlerId, Method, Router};
pub use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// HTTP Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub address: SocketAddr,
    /// Enable keep-alive connections
    pub keep_alive: bool,
    /// Shutdown timeout for graceful shutdown (default: 30 seconds)
    pub shutdown_timeout: Duration,
    /// Max request body size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: ([127, 0, 0, 1], 9000).into(),
            keep_alive: true,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 1024 * 1024,
        }
    }
}

/// Boxed future returned by a handler
pub type HandlerFuture = Pin<Box<dyn Future<Output = std::result::Result<Reply, ApiError>> + Send>>;

/// Handler function type (async)
pub type Handler = Arc<dyn Fn(Args) -> HandlerFuture + Send + Sync>;

/// Wrap an async function or closure as a [`Handler`]
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<Reply, ApiError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Everything a request needs once the server is running
#[derive(Clone)]
struct Dispatch {
    router: Router,
    handlers: Vec<Handler>,
    middleware: MiddlewareChain,
    templates: Option<Arc<dyn TemplateRenderer>>,
}

/// HTTP server
pub struct Server {
    config: ServerConfig,
    dispatch: Dispatch,
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Server {
    /// Create a new Server instance
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a Server with explicit configuration
    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        Self {
            config,
            dispatch: Dispatch {
                router: Router::new(),
                handlers: Vec::new(),
                middleware: MiddlewareChain::new(),
                templates: None,
            },
        }
    }

    /// Bind the server to an address
    #[must_use]
    pub const fn bind(mut self, addr: SocketAddr) -> Self {
        self.config.address = addr;
        self
    }

    /// Set max request body size
    pub fn set_max_body_size(&mut self, bytes: usize) {
        self.config.max_body_size = bytes;
    }

    /// Add a middleware to the chain
    pub fn add_middleware<M: Middleware + 'static>(&mut self, middleware: M) {
        self.dispatch.middleware.add(middleware);
    }

    /// Install the renderer used for template replies
    pub fn set_templates<T: TemplateRenderer + 'static>(&mut self, templates: T) {
        self.dispatch.templates = Some(Arc::new(templates));
    }

    /// Add a route, its parameter contract and its handler
    ///
    /// # Errors
    ///
    /// `Error::InvalidRoute` when the contract cannot be satisfied and
    /// `Error::InvalidRoutePattern` when the pattern is malformed.
    pub fn add_route(
        &mut self,
        method: Method,
        path: &str,
        params: Vec<Param>,
        handler: Handler,
    ) -> Result<HandlerId> {
        let names: Vec<String> = params.iter().map(|p| p.name().to_string()).collect();
        let id = self.dispatch.router.add_route(method, path, params)?;
        self.dispatch.handlers.push(handler);
        info!("add route {} {} => ({})", method, path, names.join(", "));
        Ok(id)
    }

    /// Start the server with graceful shutdown
    ///
    /// # Errors
    ///
    /// `Error::BindError` when the address cannot be bound, `Error::Io` when
    /// accepting fails.
    pub async fn serve(&self) -> Result<()> {
        let addr = self.config.address;
        let bind_error = |source| Error::BindError {
            address: addr.to_string(),
            source,
        };

        let socket = if addr.is_ipv4() {
            tokio::net::TcpSocket::new_v4()
        } else {
            tokio::net::TcpSocket::new_v6()
        }?;
        socket.set_reuseaddr(true)?;
        socket.bind(addr).map_err(bind_error)?;
        let listener = socket.listen(1024).map_err(bind_error)?;

        info!("Server listening on http://{}", addr);

        let dispatch = Arc::new(self.dispatch.clone());
        let active = Arc::new(AtomicUsize::new(0));
        let max_body_size = self.config.max_body_size;
        let keep_alive = self.config.keep_alive;

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    let (stream, remote_addr) = accept_result?;
                    let io = TokioIo::new(stream);

                    let dispatch = dispatch.clone();
                    let active = active.clone();

                    tokio::task::spawn(async move {
                        active.fetch_add(1, Ordering::Relaxed);

                        let service = service_fn(move |req: hyper::Request<hyper::body::Incoming>| {
                            let dispatch = dispatch.clone();
                            async move {
                                let method = req.method().clone();
                                let path = req.uri().path().to_string();
                                let version = req.version();

                                let response = handle_request(req, &dispatch, remote_addr, max_body_size).await;
                                info!(
                                    "    {} - \"{} {} {:?}\" {}",
                                    remote_addr,
                                    method,
                                    path,
                                    version,
                                    response.status()
                                );
                                Ok::<_, std::convert::Infallible>(response)
                            }
                        });

                        if let Err(err) = http1::Builder::new()
                            .keep_alive(keep_alive)
                            .serve_connection(io, service)
                            .await
                        {
                            error!("Error serving connection: {:?}", err);
                        }
                        active.fetch_sub(1, Ordering::Relaxed);
                    });
                }
                () = &mut shutdown => {
                    info!("Shutdown signal received, stopping server...");
                    break;
                }
            }
        }

        let drain = async {
            while active.load(Ordering::Relaxed) > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, drain).await.is_err() {
            info!(
                open = active.load(Ordering::Relaxed),
                "Shutdown timeout reached with connections still open"
            );
        }
        Ok(())
    }

    /// Execute a test request directly without network stack
    pub async fn test_request(
        &self,
        method: Method,
        path: &str,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
    ) -> Response {
        if let Some(b) = body.as_ref() {
            if b.len() > self.config.max_body_size {
                return payload_too_large();
            }
        }
        let mut req = Request::new(method, path.to_string(), headers, body);
        req.set_header("x-client-ip", "test");

        process_request(req, &self.dispatch).await
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", err);
        std::future::pending::<()>().await;
    }
}

fn not_found() -> Response {
    Response::json_text(r#"{"error": "Not Found"}"#).with_status(404)
}

fn payload_too_large() -> Response {
    Response::json_text(r#"{"error": "Payload Too Large"}"#).with_status(413)
}

/// Core request processing logic (network agnostic)
async fn process_request(mut req: Request, dispatch: &Dispatch) -> Response {
    if req.header("x-request-id").is_none() {
        let request_id = generate_request_id();
        req.set_header("x-request-id", &request_id);
    }

    let mut response = match dispatch.middleware.run_before(&mut req).await {
        MiddlewareResult::Respond(res) => res,
        MiddlewareResult::Continue => dispatch_route(&req, dispatch).await,
    };

    if let Some(request_id) = req.header("x-request-id") {
        response.set_header("x-request-id", request_id);
    }
    dispatch.middleware.run_after(&req, &mut response).await;
    response
}

async fn dispatch_route(req: &Request, dispatch: &Dispatch) -> Response {
    let Ok(matched) = dispatch.router.match_route(req.method, &req.path) else {
        return not_found();
    };
    let Some(handler) = dispatch.handlers.get(matched.handler_id) else {
        return not_found();
    };

    // Handlers may hold the request past this call, so they see a snapshot.
    let shared = Arc::new(req.clone());
    let result = match bind(matched.route, &matched.params, &shared) {
        Ok(args) => handler(args).await,
        Err(err) => Err(err),
    };

    let normalized = result.and_then(|reply| {
        normalize(reply, req, dispatch.templates.as_deref()).map_err(ApiError::from)
    });
    normalized.unwrap_or_else(ApiError::into_response)
}

async fn handle_request(
    req: hyper::Request<hyper::body::Incoming>,
    dispatch: &Dispatch,
    remote_addr: SocketAddr,
    max_body_size: usize,
) -> hyper::Response<http_body_util::Full<Bytes>> {
    let mut request = match Request::from_hyper_with_limit(req, max_body_size).await {
        Ok(r) => r,
        Err(Error::PayloadTooLarge { .. }) => return payload_too_large().into_hyper(),
        Err(Error::RouteNotFound { .. }) => return not_found().into_hyper(),
        Err(e) => {
            error!("Failed to parse request: {}", e);
            return Response::text("Bad Request").with_status(400).into_hyper();
        }
    };

    request.set_header("x-client-ip", &remote_addr.ip().to_string());
    process_request(request, dispatch).await.into_hyper()
}

static REQUEST_COUNTER: AtomicUsize = AtomicUsize::new(1);

fn generate_request_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let counter = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{:x}-{:x}", now.as_nanos(), counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::BodyParserMiddleware;
    use crate::types::ParamType;
    use serde_json::{json, Map, Value};

    fn json_headers() -> HashMap<String, String> {
        HashMap::from([("content-type".to_string(), "application/json".to_string())])
    }

    async fn show_blog(args: Args) -> std::result::Result<Reply, ApiError> {
        let id = args.string("id")?;
        Ok(Reply::json(&json!({ "id": id }))?)
    }

    async fn create_blog(args: Args) -> std::result::Result<Reply, ApiError> {
        let name = args.string("name")?;
        let page = args.int("page")?;
        Ok(Reply::json(&json!({ "name": name, "page": page }))?)
    }

    async fn signout(_args: Args) -> std::result::Result<Reply, ApiError> {
        Ok(Reply::redirect("/"))
    }

    async fn missing(_args: Args) -> std::result::Result<Reply, ApiError> {
        Ok((404, "missing").into())
    }

    async fn forbidden(_args: Args) -> std::result::Result<Reply, ApiError> {
        Err(ApiError::permission("admin only"))
    }

    async fn templated(_args: Args) -> std::result::Result<Reply, ApiError> {
        let mut map = Map::new();
        map.insert("__template__".to_string(), Value::from("blogs.html"));
        Ok(map.into())
    }

    fn app() -> Server {
        let mut server = Server::new();
        server.add_middleware(BodyParserMiddleware::new());
        server
            .add_route(Method::Get, "/blog/{id}", vec![Param::positional("id")], handler(show_blog))
            .unwrap();
        server
            .add_route(
                Method::Post,
                "/api/blogs",
                vec![
                    Param::required("name"),
                    Param::optional("page", "1").typed(ParamType::Int),
                ],
                handler(create_blog),
            )
            .unwrap();
        server.add_route(Method::Get, "/signout", vec![], handler(signout)).unwrap();
        server.add_route(Method::Get, "/missing", vec![], handler(missing)).unwrap();
        server.add_route(Method::Get, "/forbidden", vec![], handler(forbidden)).unwrap();
        server.add_route(Method::Get, "/page", vec![], handler(templated)).unwrap();
        server
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address.port(), 9000);
        assert!(config.keep_alive);
    }

    #[test]
    fn test_unsatisfiable_route_rejected() {
        let mut server = Server::new();
        let result = server.add_route(
            Method::Get,
            "/blog",
            vec![Param::positional("id")],
            handler(signout),
        );
        assert!(matches!(result, Err(Error::InvalidRoute { .. })));
    }

    #[tokio::test]
    async fn test_path_param_dispatch() {
        let res = app()
            .test_request(Method::Get, "/blog/0017", HashMap::new(), None)
            .await;
        assert_eq!(res.status, 200);
        assert_eq!(body(&res)["id"], "0017");
        assert!(res.header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn test_json_body_binding() {
        let res = app()
            .test_request(
                Method::Post,
                "/api/blogs",
                json_headers(),
                Some(Bytes::from(r#"{"name": "First", "page": 3}"#)),
            )
            .await;
        assert_eq!(body(&res), json!({"name": "First", "page": 3}));
    }

    #[tokio::test]
    async fn test_missing_param_is_400() {
        let res = app()
            .test_request(Method::Post, "/api/blogs", json_headers(), Some(Bytes::from("{}")))
            .await;
        assert_eq!(res.status, 400);
        assert_eq!(body(&res)["error"], "value:invalid");
        assert_eq!(body(&res)["data"], "name");
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method_are_404() {
        let server = app();
        let res = server.test_request(Method::Get, "/nope", HashMap::new(), None).await;
        assert_eq!(res.status, 404);
        let res = server.test_request(Method::Post, "/signout", HashMap::new(), None).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn test_normalized_replies() {
        let server = app();
        let res = server.test_request(Method::Get, "/signout", HashMap::new(), None).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/"));

        let res = server.test_request(Method::Get, "/missing", HashMap::new(), None).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body_text(), "missing");

        let res = server.test_request(Method::Get, "/forbidden", HashMap::new(), None).await;
        assert_eq!(res.status, 403);
        assert_eq!(body(&res)["error"], "permission:forbidden");
    }

    #[tokio::test]
    async fn test_template_without_renderer_is_500() {
        let res = app().test_request(Method::Get, "/page", HashMap::new(), None).await;
        assert_eq!(res.status, 500);
    }

    #[tokio::test]
    async fn test_payload_too_large() {
        let mut server = app();
        server.set_max_body_size(4);
        let res = server
            .test_request(Method::Post, "/api/blogs", json_headers(), Some(Bytes::from("{\"name\":1}")))
            .await;
        assert_eq!(res.status, 413);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let headers = HashMap::from([("x-request-id".to_string(), "abc".to_string())]);
        let res = app().test_request(Method::Get, "/blog/1", headers, None).await;
        assert_eq!(res.header("x-request-id"), Some("abc"));
    }
}
