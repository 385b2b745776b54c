//! Page and API handlers and the route table that wires them up.

use crate::config::Config;
use crate::models::{next_id, Blog, Comment, User};
use crate::session::{current_user, sha1_hex, user2cookie, SessionMiddleware};
use crate::templates::{escape_html, ShellRenderer};
use md5::{Digest, Md5};
use quill_core::page::page_index;
use quill_core::response::TEMPLATE_KEY;
use quill_core::{
    handler, ApiError, Args, BodyParserMiddleware, DatabasePool, DbValue, Entity, FindOptions,
    Handler, LoggingMiddleware, Method, Page, Param, Reply, Response, Server, ServerConfig,
};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::{Arc, LazyLock};
use tracing::info;

type HandlerResult = std::result::Result<Reply, ApiError>;

/// Shared state handed to every handler
pub struct AppState {
    /// Database pool
    pub pool: DatabasePool,
    /// Loaded configuration
    pub config: Config,
}

type State = Arc<AppState>;

/// Rejects requests whose signed-in user is not an admin
///
/// # Errors
///
/// `ApiError::Permission` when nobody is signed in or the user is no admin.
pub fn check_admin(args: &Args) -> Result<&User, ApiError> {
    args.request()
        .and_then(current_user)
        .filter(|user| user.admin)
        .ok_or_else(|| ApiError::permission("admin required"))
}

/// Escape plain text and wrap each non-blank line in a paragraph
#[must_use]
pub fn text2html(text: &str) -> String {
    text.split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(|line| format!("<p>{}</p>", escape_html(line)))
        .collect()
}

static EMAIL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.\-_]+@[a-z0-9\-_]+(\.[a-z0-9\-_]+){1,4}$").ok());

static SHA1: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").ok());

/// Lowercase `local@domain.tld` with two to five domain labels
#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL.as_ref().is_some_and(|re| re.is_match(email))
}

/// 40 lowercase hex digits
#[must_use]
pub fn valid_sha1(passwd: &str) -> bool {
    SHA1.as_ref().is_some_and(|re| re.is_match(passwd))
}

fn gravatar(email: &str) -> String {
    format!(
        "http://www.gravatar.com/avatar/{:x}?d=mm&s=120",
        Md5::digest(email.as_bytes())
    )
}

fn template(name: &str, context: Value) -> Reply {
    let mut map = match context {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert(TEMPLATE_KEY.to_string(), Value::from(name));
    Reply::Map(map)
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::Internal(e.into()))
}

fn non_blank(args: &Args, name: &str) -> Result<String, ApiError> {
    let value = args.string(name)?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::value(name, format!("{name} cannot be empty.")));
    }
    Ok(trimmed.to_string())
}

async fn count<E: Entity>(pool: &DatabasePool) -> Result<i64, ApiError> {
    let num = E::find_number(pool, "count(id)", None, Vec::new()).await?;
    Ok(num.map(DbValue::decode::<i64>).transpose()?.unwrap_or(0))
}

/// One page of an entity listing, newest first
async fn page_of<E: Entity>(pool: &DatabasePool, index: i64) -> Result<(Page, Vec<E>), ApiError> {
    let page = Page::new(count::<E>(pool).await?, index);
    if page.is_empty() {
        return Ok((page, Vec::new()));
    }
    let items = E::find_all(
        pool,
        FindOptions::new()
            .order_by("created_at desc")
            .limit((page.offset, page.limit)),
    )
    .await?;
    Ok((page, items))
}

fn page_param() -> Param {
    Param::optional("page", "1")
}

fn signed_in(res: &mut Response, state: &AppState, user: &User) {
    let session = &state.config.session;
    let cookie = user2cookie(user, session.max_age_secs, &session.secret);
    res.set_cookie(&session.cookie_name, &cookie, session.max_age_secs, true);
}

async fn find_blog(pool: &DatabasePool, id: &str) -> Result<Blog, ApiError> {
    Blog::find(pool, id.into())
        .await?
        .ok_or_else(|| ApiError::not_found("blog", format!("blog {id} was not found")))
}

// Pages

async fn index(state: State, args: Args) -> HandlerResult {
    let (page, blogs) = page_of::<Blog>(&state.pool, page_index(&args.string("page")?)).await?;
    Ok(template("blogs.html", json!({ "page": page, "blogs": blogs })))
}

async fn get_blog(state: State, args: Args) -> HandlerResult {
    let id = args.string("id")?;
    let blog = find_blog(&state.pool, &id).await?;
    let comments = Comment::find_all(
        &state.pool,
        FindOptions::new()
            .filter("blog_id=?", vec![id.into()])
            .order_by("created_at desc"),
    )
    .await?;

    let comments = comments
        .iter()
        .map(|c| -> Result<Value, ApiError> {
            let mut value = to_value(c)?;
            value["html_content"] = Value::from(text2html(&c.content));
            Ok(value)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let mut blog_value = to_value(&blog)?;
    blog_value["html_content"] = Value::from(text2html(&blog.content));

    Ok(template("blog.html", json!({ "blog": blog_value, "comments": comments })))
}

async fn register(_state: State, _args: Args) -> HandlerResult {
    Ok(template("register.html", json!({})))
}

async fn signin(_state: State, _args: Args) -> HandlerResult {
    Ok(template("signin.html", json!({})))
}

async fn signout(state: State, args: Args) -> HandlerResult {
    let referer = args.request().and_then(|req| req.header("Referer")).unwrap_or("/");
    let mut res = Response::redirect(referer);
    res.set_cookie(&state.config.session.cookie_name, "-deleted-", 0, true);
    info!("user signed out.");
    Ok(res.into())
}

async fn manage(_state: State, _args: Args) -> HandlerResult {
    Ok(Reply::redirect("/manage/comments"))
}

async fn manage_comments(_state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    Ok(template("manage_comments.html", json!({ "page_index": index })))
}

async fn manage_blogs(_state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    Ok(template("manage_blogs.html", json!({ "page_index": index })))
}

async fn manage_create_blog(_state: State, _args: Args) -> HandlerResult {
    Ok(template(
        "manage_blog_edit.html",
        json!({ "id": "", "action": "/api/blogs" }),
    ))
}

async fn manage_edit_blog(_state: State, args: Args) -> HandlerResult {
    let id = args.string("id")?;
    let action = format!("/api/blogs/{id}");
    Ok(template("manage_blog_edit.html", json!({ "id": id, "action": action })))
}

async fn manage_users(_state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    Ok(template("manage_users.html", json!({ "page_index": index })))
}

// Users

async fn authenticate(state: State, args: Args) -> HandlerResult {
    let email = args.string("email")?;
    let passwd = args.string("passwd")?;
    if email.is_empty() {
        return Err(ApiError::value("email", "Invalid email."));
    }
    if passwd.is_empty() {
        return Err(ApiError::value("passwd", "Invalid password."));
    }

    let users = User::find_all(
        &state.pool,
        FindOptions::new().filter("email=?", vec![email.into()]),
    )
    .await?;
    let Some(user) = users.into_iter().next() else {
        return Err(ApiError::value("email", "Email not exist."));
    };
    if user.passwd != sha1_hex(&format!("{}:{passwd}", user.id())) {
        return Err(ApiError::value("passwd", "Invalid password."));
    }

    let mut res = Response::json(&user.clone().masked())?;
    signed_in(&mut res, &state, &user);
    Ok(res.into())
}

async fn register_user(state: State, args: Args) -> HandlerResult {
    let name = args.string("name")?;
    let email = args.string("email")?;
    let passwd = args.string("passwd")?;
    if name.trim().is_empty() {
        return Err(ApiError::value("name", "Invalid name."));
    }
    if !valid_email(&email) {
        return Err(ApiError::value("email", "Invalid email."));
    }
    if !valid_sha1(&passwd) {
        return Err(ApiError::value("passwd", "Invalid password."));
    }

    let existing = User::find_all(
        &state.pool,
        FindOptions::new().filter("email=?", vec![email.clone().into()]),
    )
    .await?;
    if !existing.is_empty() {
        return Err(ApiError::generic("register:failed", "email", "Email is already in use."));
    }

    let uid = next_id();
    let mut user = User {
        passwd: sha1_hex(&format!("{uid}:{passwd}")),
        id: Some(uid),
        name: name.trim().to_string(),
        image: gravatar(&email),
        email,
        ..User::default()
    };
    user.save(&state.pool).await?;

    let mut res = Response::json(&user.clone().masked())?;
    signed_in(&mut res, &state, &user);
    Ok(res.into())
}

async fn api_users(state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    let (page, users) = page_of::<User>(&state.pool, index).await?;
    let users: Vec<User> = users.into_iter().map(User::masked).collect();
    Ok(Reply::json(&json!({ "page": page, "users": users }))?)
}

// Blogs

async fn api_blogs(state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    let (page, blogs) = page_of::<Blog>(&state.pool, index).await?;
    Ok(Reply::json(&json!({ "page": page, "blogs": blogs }))?)
}

async fn api_get_blog(state: State, args: Args) -> HandlerResult {
    let blog = find_blog(&state.pool, &args.string("id")?).await?;
    Ok(Reply::json(&blog)?)
}

async fn api_create_blog(state: State, args: Args) -> HandlerResult {
    let user = check_admin(&args)?;
    let mut blog = Blog {
        user_id: user.id().to_string(),
        user_name: user.name.clone(),
        user_image: user.image.clone(),
        name: non_blank(&args, "name")?,
        summary: non_blank(&args, "summary")?,
        content: non_blank(&args, "content")?,
        ..Blog::default()
    };
    blog.save(&state.pool).await?;
    Ok(Reply::json(&blog)?)
}

async fn api_update_blog(state: State, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let mut blog = find_blog(&state.pool, &args.string("id")?).await?;
    blog.name = non_blank(&args, "name")?;
    blog.summary = non_blank(&args, "summary")?;
    blog.content = non_blank(&args, "content")?;
    blog.update(&state.pool).await?;
    Ok(Reply::json(&blog)?)
}

async fn api_delete_blog(state: State, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let id = args.string("id")?;
    find_blog(&state.pool, &id).await?.remove(&state.pool).await?;
    Ok(Reply::json(&json!({ "id": id }))?)
}

// Comments

async fn api_comments(state: State, args: Args) -> HandlerResult {
    let index = page_index(&args.string("page")?);
    let (page, comments) = page_of::<Comment>(&state.pool, index).await?;
    Ok(Reply::json(&json!({ "page": page, "comments": comments }))?)
}

async fn api_create_comment(state: State, args: Args) -> HandlerResult {
    let user = args
        .request()
        .and_then(current_user)
        .ok_or_else(|| ApiError::permission("Please sign in first."))?;
    let content = non_blank(&args, "content")?;
    let blog = find_blog(&state.pool, &args.string("id")?).await?;

    let mut comment = Comment {
        blog_id: blog.id().to_string(),
        user_id: user.id().to_string(),
        user_name: user.name.clone(),
        user_image: user.image.clone(),
        content,
        ..Comment::default()
    };
    comment.save(&state.pool).await?;
    Ok(Reply::json(&comment)?)
}

async fn api_delete_comment(state: State, args: Args) -> HandlerResult {
    check_admin(&args)?;
    let id = args.string("id")?;
    let comment = Comment::find(&state.pool, id.as_str().into())
        .await?
        .ok_or_else(|| ApiError::not_found("comment", format!("comment {id} was not found")))?;
    comment.remove(&state.pool).await?;
    Ok(Reply::json(&json!({ "id": id }))?)
}

fn bound<F, Fut>(state: &State, f: F) -> Handler
where
    F: Fn(State, Args) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let state = Arc::clone(state);
    handler(move |args| f(Arc::clone(&state), args))
}

/// Build the blog server: middleware, templates and every route
///
/// # Errors
///
/// Route registration errors (`quill_core::Error::InvalidRoute`).
pub fn build_server(state: Arc<AppState>, config: ServerConfig) -> quill_core::Result<Server> {
    let mut server = Server::with_config(config);
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(BodyParserMiddleware::new());
    server.add_middleware(SessionMiddleware::new(
        state.pool.clone(),
        state.config.session.secret.clone(),
        state.config.session.cookie_name.clone(),
    ));
    server.set_templates(ShellRenderer::new());

    let s = &state;
    let get = Method::Get;
    let post = Method::Post;

    server.add_route(get, "/", vec![page_param()], bound(s, index))?;
    server.add_route(get, "/blog/{id}", vec![Param::positional("id")], bound(s, get_blog))?;
    server.add_route(get, "/register", vec![], bound(s, register))?;
    server.add_route(get, "/signin", vec![], bound(s, signin))?;
    server.add_route(get, "/signout", vec![Param::request()], bound(s, signout))?;

    server.add_route(get, "/manage/", vec![], bound(s, manage))?;
    server.add_route(get, "/manage/comments", vec![page_param()], bound(s, manage_comments))?;
    server.add_route(get, "/manage/blogs", vec![page_param()], bound(s, manage_blogs))?;
    server.add_route(get, "/manage/blogs/create", vec![], bound(s, manage_create_blog))?;
    server.add_route(
        get,
        "/manage/blogs/edit",
        vec![Param::required("id")],
        bound(s, manage_edit_blog),
    )?;
    server.add_route(get, "/manage/users", vec![page_param()], bound(s, manage_users))?;

    server.add_route(
        post,
        "/api/authenticate",
        vec![Param::required("email"), Param::required("passwd")],
        bound(s, authenticate),
    )?;
    server.add_route(
        post,
        "/api/users",
        vec![
            Param::required("email"),
            Param::required("name"),
            Param::required("passwd"),
        ],
        bound(s, register_user),
    )?;
    server.add_route(get, "/api/users", vec![page_param()], bound(s, api_users))?;

    let blog_fields = || {
        vec![
            Param::request(),
            Param::required("name"),
            Param::required("summary"),
            Param::required("content"),
        ]
    };
    server.add_route(get, "/api/blogs", vec![page_param()], bound(s, api_blogs))?;
    server.add_route(get, "/api/blogs/{id}", vec![Param::positional("id")], bound(s, api_get_blog))?;
    server.add_route(post, "/api/blogs", blog_fields(), bound(s, api_create_blog))?;
    let mut update_fields = vec![Param::positional("id")];
    update_fields.extend(blog_fields());
    server.add_route(post, "/api/blogs/{id}", update_fields, bound(s, api_update_blog))?;
    server.add_route(
        post,
        "/api/blog/{id}/delete",
        vec![Param::request(), Param::required("id")],
        bound(s, api_delete_blog),
    )?;

    server.add_route(get, "/api/comments", vec![page_param()], bound(s, api_comments))?;
    server.add_route(
        post,
        "/api/blogs/{id}/comments",
        vec![Param::positional("id"), Param::request(), Param::required("content")],
        bound(s, api_create_comment),
    )?;
    server.add_route(
        post,
        "/api/comments/{id}/delete",
        vec![Param::positional("id"), Param::request()],
        bound(s, api_delete_comment),
    )?;

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tests::memory_pool;
    use quill_core::server::Bytes;
    use std::collections::HashMap;

    const CLIENT_PASSWD: &str = "a9993e364706816aba3e25717850c26c9cd0d89d";

    async fn app() -> (Server, State) {
        let state = Arc::new(AppState {
            pool: memory_pool().await,
            config: Config::default(),
        });
        (build_server(Arc::clone(&state), ServerConfig::default()).unwrap(), state)
    }

    async fn admin_cookie(state: &AppState) -> String {
        let uid = next_id();
        let mut admin = User {
            passwd: sha1_hex(&format!("{uid}:{CLIENT_PASSWD}")),
            id: Some(uid),
            email: "admin@example.com".to_string(),
            admin: true,
            name: "Admin".to_string(),
            image: "about:blank".to_string(),
            ..User::default()
        };
        admin.save(&state.pool).await.unwrap();
        format!("awesession={}", user2cookie(&admin, 3600, &state.config.session.secret))
    }

    fn headers(cookie: Option<&str>) -> HashMap<String, String> {
        let mut headers =
            HashMap::from([("content-type".to_string(), "application/json".to_string())]);
        if let Some(cookie) = cookie {
            headers.insert("cookie".to_string(), cookie.to_string());
        }
        headers
    }

    async fn post(server: &Server, path: &str, cookie: Option<&str>, body: Value) -> Response {
        server
            .test_request(
                Method::Post,
                path,
                headers(cookie),
                Some(Bytes::from(body.to_string())),
            )
            .await
    }

    async fn get(server: &Server, path: &str, cookie: Option<&str>) -> Response {
        server.test_request(Method::Get, path, headers(cookie), None).await
    }

    fn body(res: &Response) -> Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    fn session_cookie(res: &Response) -> String {
        let header = res
            .headers
            .iter()
            .find(|(k, _)| k == "Set-Cookie")
            .map(|(_, v)| v.clone())
            .unwrap();
        header.split(';').next().unwrap().to_string()
    }

    #[test]
    fn test_text2html() {
        assert_eq!(text2html("a < b\n\n  \nc & d"), "<p>a &lt; b</p><p>c &amp; d</p>");
        assert_eq!(text2html(""), "");
    }

    #[test]
    fn test_valid_email() {
        assert!(valid_email("ann@example.com"));
        assert!(valid_email("a.b-c_d@mail.co.uk"));
        assert!(!valid_email("Ann@example.com"));
        assert!(!valid_email("ann@example"));
        assert!(!valid_email("@example.com"));
        assert!(!valid_email("ann@example..com"));
        assert!(!valid_email("ann@a.b.c.d.e.f"));
        assert!(!valid_email("ann@@example.com"));
        assert!(valid_email("ann@a.b.c.d.e"));
        assert!(!valid_email("ann@example.COM"));
        assert!(!valid_email("ann@example.com\n"));
        assert!(!valid_email("ann+tag@example.com"));
    }

    #[test]
    fn test_valid_sha1() {
        assert!(valid_sha1(CLIENT_PASSWD));
        assert!(!valid_sha1(&CLIENT_PASSWD.to_uppercase()));
        assert!(!valid_sha1("abc"));
        assert!(!valid_sha1(&CLIENT_PASSWD[..39]));
        assert!(!valid_sha1(&format!("{CLIENT_PASSWD}0")));
        assert!(!valid_sha1(&format!("{}g", &CLIENT_PASSWD[..39])));
    }

    #[test]
    fn test_gravatar() {
        assert_eq!(
            gravatar("ann@example.com"),
            format!("http://www.gravatar.com/avatar/{:x}?d=mm&s=120", Md5::digest(b"ann@example.com"))
        );
        assert!(gravatar("x@y.io").ends_with("?d=mm&s=120"));
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let (server, _state) = app().await;
        let res = post(
            &server,
            "/api/users",
            None,
            json!({"email": "ann@example.com", "name": " Ann ", "passwd": CLIENT_PASSWD}),
        )
        .await;
        assert_eq!(res.status, 200);
        let user = body(&res);
        assert_eq!(user["name"], "Ann");
        assert_eq!(user["passwd"], "******");
        assert!(session_cookie(&res).starts_with("awesession="));

        let res = post(
            &server,
            "/api/authenticate",
            None,
            json!({"email": "ann@example.com", "passwd": CLIENT_PASSWD}),
        )
        .await;
        assert_eq!(res.status, 200);
        assert_eq!(body(&res)["email"], "ann@example.com");

        let res = post(
            &server,
            "/api/authenticate",
            None,
            json!({"email": "ann@example.com", "passwd": "wrong"}),
        )
        .await;
        assert_eq!(res.status, 400);
        assert_eq!(body(&res)["data"], "passwd");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let (server, _state) = app().await;
        let user = json!({"email": "ann@example.com", "name": "Ann", "passwd": CLIENT_PASSWD});
        assert_eq!(post(&server, "/api/users", None, user.clone()).await.status, 200);

        let res = post(&server, "/api/users", None, user).await;
        assert_eq!(res.status, 400);
        assert_eq!(body(&res)["error"], "register:failed");

        let res = post(
            &server,
            "/api/users",
            None,
            json!({"email": "not-an-email", "name": "Bob", "passwd": CLIENT_PASSWD}),
        )
        .await;
        assert_eq!(body(&res)["data"], "email");

        let res = post(
            &server,
            "/api/users",
            None,
            json!({"email": "bob@example.com", "name": "Bob", "passwd": "plain"}),
        )
        .await;
        assert_eq!(body(&res)["data"], "passwd");
    }

    #[tokio::test]
    async fn test_blog_lifecycle_as_admin() {
        let (server, state) = app().await;
        let cookie = admin_cookie(&state).await;
        let cookie = Some(cookie.as_str());

        let res = post(
            &server,
            "/api/blogs",
            cookie,
            json!({"name": " Hello ", "summary": "Short", "content": "Body"}),
        )
        .await;
        assert_eq!(res.status, 200);
        let id = body(&res)["id"].as_str().unwrap().to_string();
        assert_eq!(body(&res)["name"], "Hello");
        assert_eq!(body(&res)["user_name"], "Admin");

        let res = post(
            &server,
            &format!("/api/blogs/{id}"),
            cookie,
            json!({"name": "Hello again", "summary": "Short", "content": "Body"}),
        )
        .await;
        assert_eq!(body(&res)["name"], "Hello again");

        let res = get(&server, &format!("/api/blogs/{id}"), None).await;
        assert_eq!(body(&res)["name"], "Hello again");

        let res = get(&server, "/api/blogs", None).await;
        assert_eq!(body(&res)["page"]["item_count"], 1);
        assert_eq!(body(&res)["blogs"][0]["id"], id.as_str());

        let res = post(&server, &format!("/api/blog/{id}/delete"), cookie, json!({})).await;
        assert_eq!(body(&res), json!({"id": id}));

        let res = get(&server, &format!("/api/blogs/{id}"), None).await;
        assert_eq!(res.status, 404);
    }

    #[tokio::test]
    async fn test_blog_writes_require_admin() {
        let (server, _state) = app().await;
        let res = post(
            &server,
            "/api/blogs",
            None,
            json!({"name": "n", "summary": "s", "content": "c"}),
        )
        .await;
        assert_eq!(res.status, 403);
        assert_eq!(body(&res)["error"], "permission:forbidden");
    }

    #[tokio::test]
    async fn test_blank_fields_rejected() {
        let (server, state) = app().await;
        let cookie = admin_cookie(&state).await;
        let res = post(
            &server,
            "/api/blogs",
            Some(&cookie),
            json!({"name": "n", "summary": "   ", "content": "c"}),
        )
        .await;
        assert_eq!(res.status, 400);
        assert_eq!(body(&res)["data"], "summary");
    }

    #[tokio::test]
    async fn test_comments() {
        let (server, state) = app().await;
        let cookie = admin_cookie(&state).await;
        let cookie = Some(cookie.as_str());
        let blog = post(
            &server,
            "/api/blogs",
            cookie,
            json!({"name": "n", "summary": "s", "content": "c"}),
        )
        .await;
        let blog_id = body(&blog)["id"].as_str().unwrap().to_string();

        let path = format!("/api/blogs/{blog_id}/comments");
        let res = post(&server, &path, None, json!({"content": "hi"})).await;
        assert_eq!(res.status, 403);

        let res = post(&server, "/api/blogs/missing/comments", cookie, json!({"content": "hi"})).await;
        assert_eq!(res.status, 404);
        assert_eq!(body(&res)["error"], "value:notfound");

        let res = post(&server, &path, cookie, json!({"content": "first <b>"})).await;
        assert_eq!(res.status, 200);
        let comment_id = body(&res)["id"].as_str().unwrap().to_string();

        let res = get(&server, &format!("/blog/{blog_id}"), None).await;
        assert_eq!(res.status, 200);
        assert!(res.body_text().contains("&lt;b&gt;"));

        let res = get(&server, "/api/comments", None).await;
        assert_eq!(body(&res)["page"]["item_count"], 1);

        let res = post(&server, &format!("/api/comments/{comment_id}/delete"), cookie, json!({})).await;
        assert_eq!(body(&res)["id"], comment_id.as_str());
        let res = get(&server, "/api/comments", None).await;
        assert_eq!(body(&res)["comments"], json!([]));
    }

    #[tokio::test]
    async fn test_users_listing_masks_passwords() {
        let (server, state) = app().await;
        admin_cookie(&state).await;
        let res = get(&server, "/api/users?page=abc", None).await;
        let body = body(&res);
        assert_eq!(body["page"]["page_index"], 1);
        assert_eq!(body["users"][0]["passwd"], "******");
    }

    #[tokio::test]
    async fn test_pages_render() {
        let (server, _state) = app().await;
        let res = get(&server, "/", None).await;
        assert_eq!(res.status, 200);
        assert!(res.body_text().contains("data-template=\"blogs.html\""));

        let res = get(&server, "/signin", None).await;
        assert!(res.body_text().contains("signin.html"));
    }

    #[tokio::test]
    async fn test_manage_area() {
        let (server, state) = app().await;
        let res = get(&server, "/manage/blogs", None).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/signin"));

        let cookie = admin_cookie(&state).await;
        let res = get(&server, "/manage/", Some(&cookie)).await;
        assert_eq!(res.header("Location"), Some("/manage/comments"));

        let res = get(&server, "/manage/blogs/edit?id=42", Some(&cookie)).await;
        assert_eq!(res.status, 200);
        assert!(res.body_text().contains("/api/blogs/42"));

        let res = get(&server, "/manage/blogs/edit", Some(&cookie)).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn test_signout_clears_cookie() {
        let (server, _state) = app().await;
        let mut headers = headers(None);
        headers.insert("referer".to_string(), "/blog/1".to_string());
        let res = server.test_request(Method::Get, "/signout", headers, None).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/blog/1"));
        assert_eq!(session_cookie(&res), "awesession=-deleted-");

        let res = get(&server, "/signout", None).await;
        assert_eq!(res.header("Location"), Some("/"));
    }
}
