//! Route registration and per-request dispatch.
//!
//! [`App`] owns everything configured before the server starts: one
//! matchit radix tree per HTTP method, the ordered pre and json
//! middleware lists, and the debug flag. Registration chains by value;
//! [`Server::serve`](crate::Server::serve) then consumes the `App`, so
//! registering after the server is up is a compile error, not a race.
//!
//! Per request, dispatch rebuilds both chains from the registered lists
//! (an Arc clone per link — cheap) and runs them:
//!
//! ```text
//! request ──► pre chain ──► decode params ──► json chain ──► handler
//!                │                               │
//!                └── may answer directly         └── may answer with a Reply
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use matchit::Router as PathTree;
use tracing::{error, info};

use crate::chain::{BoxFuture, Chain, Next, Ware};
use crate::controller::Controller;
use crate::handler::{BoxedJsonHandler, BoxedRawHandler, JsonHandler, RawHandler};
use crate::middleware::{BoxJsonWare, BoxPreWare, JsonCtx, JsonOutcome, PreCtx, PreOutcome};
use crate::params::Params;
use crate::reply::Reply;
use crate::request::Request;
use crate::response::Response;

#[derive(Clone)]
enum Route {
    Json(BoxedJsonHandler),
    Raw(BoxedRawHandler),
}

/// The application: routes, middleware, debug flag.
///
/// Build it once at startup and hand it to
/// [`Server::serve`](crate::Server::serve). Every registration method
/// returns `self` so calls chain naturally.
pub struct App {
    routes: HashMap<Method, PathTree<Route>>,
    pre_wares: Vec<BoxPreWare>,
    json_wares: Vec<BoxJsonWare>,
    debug: bool,
}

impl App {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            pre_wares: Vec::new(),
            json_wares: Vec::new(),
            debug: false,
        }
    }

    /// Debug mode keeps `dev_message` in serialized replies. Off by
    /// default so internals never leak to clients.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Appends a pre middleware. Runs in registration order, before any
    /// parameter decoding.
    pub fn wrap(mut self, ware: impl Ware<PreCtx, PreOutcome> + 'static) -> Self {
        self.pre_wares.push(Arc::new(ware));
        self
    }

    /// Appends a json middleware. Runs in registration order, between
    /// parameter decoding and the handler.
    pub fn wrap_json(mut self, ware: impl Ware<JsonCtx, JsonOutcome> + 'static) -> Self {
        self.json_wares.push(Arc::new(ware));
        self
    }

    /// Registers a JSON handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and arrive in the handler's
    /// second argument.
    pub fn handle_json(self, method: Method, path: &str, handler: impl JsonHandler) -> Self {
        self.add(method, path, Route::Json(handler.into_boxed_handler()))
    }

    /// Registers a raw handler: full transport access, no envelope, no
    /// json middleware.
    pub fn handle_raw(self, method: Method, path: &str, handler: impl RawHandler) -> Self {
        self.add(method, path, Route::Raw(handler.into_boxed_handler()))
    }

    pub fn get(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::PATCH, path, handler)
    }

    pub fn head(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::HEAD, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl JsonHandler) -> Self {
        self.handle_json(Method::DELETE, path, handler)
    }

    /// Lets a [`Controller`] register its route group.
    pub fn mount(self, controller: impl Controller) -> Self {
        controller.register(self)
    }

    fn add(mut self, method: Method, path: &str, route: Route) -> Self {
        self.routes
            .entry(method)
            .or_insert_with(PathTree::new)
            .insert(path, route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(Route, Params)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let mut params = Params::new();
        for (key, value) in matched.params.iter() {
            params.set(key, value);
        }
        Some((matched.value.clone(), params))
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    /// Routes one request and produces exactly one response.
    pub(crate) async fn dispatch(&self, req: Request) -> Response {
        let start = Instant::now();

        let Some((route, path_params)) = self.lookup(req.method(), req.path()) else {
            return Response::status(StatusCode::NOT_FOUND);
        };

        // The route core is the synthetic tail of the pre chain: user
        // middleware sees the rest of the request as one more link.
        let core: BoxPreWare = match route {
            Route::Json(handler) => Arc::new(JsonRoute {
                wares: self.json_wares.clone(),
                handler,
                debug: self.debug,
            }),
            Route::Raw(handler) => Arc::new(RawRoute { handler }),
        };
        let mut wares = self.pre_wares.clone();
        wares.push(core);

        let method = req.method().clone();
        let uri = req.uri().clone();
        let remote = req.remote_addr();

        let chain = Chain::new(wares);
        let outcome = chain.run((req, path_params)).await;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(method = %method, uri = %uri, remote = %remote, elapsed_ms, "request served");

        // A fully silent chain answers like a handler that never touched
        // its response: empty 200.
        outcome.unwrap_or_else(|| Response::status(StatusCode::OK))
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

// ── Route cores ───────────────────────────────────────────────────────────────

/// Tail of the pre chain for JSON routes: decodes parameters, runs the
/// json chain, translates its outcome to the wire. Ignores `next`.
struct JsonRoute {
    wares: Vec<BoxJsonWare>,
    handler: BoxedJsonHandler,
    debug: bool,
}

impl Ware<PreCtx, PreOutcome> for JsonRoute {
    fn invoke<'a>(&'a self, (req, path_params): PreCtx, _next: Next<'a, PreCtx, PreOutcome>) -> BoxFuture<'a, PreOutcome> {
        Box::pin(async move {
            let query_params = decode_query(&req);
            let uri = req.uri().clone();

            let mut wares = self.wares.clone();
            wares.push(Arc::new(JsonCore {
                handler: Arc::clone(&self.handler),
            }) as BoxJsonWare);
            let chain = Chain::new(wares);
            let outcome = chain.run((query_params, path_params)).await;

            let response = match outcome {
                Err(err) => {
                    error!(uri = %uri, error = %err, "handler error");
                    internal_error_response(&err.to_string())
                }
                Ok(reply) => {
                    // A chain that ran to its terminal produced no reply;
                    // answer with an empty-handed OK envelope.
                    let mut reply = reply.unwrap_or_else(|| Reply::ok(serde_json::Value::Null));
                    if !self.debug {
                        reply.dev_message.clear();
                    }
                    match serde_json::to_vec(&reply) {
                        Ok(body) => Response::json(body),
                        Err(err) => {
                            error!(uri = %uri, error = %err, "reply serialization failed");
                            internal_error_response(&err.to_string())
                        }
                    }
                }
            };
            Some(response)
        })
    }
}

/// Tail of the json chain: the application handler as a pseudo-middleware.
/// Ignores `next` — user json middleware never sees the true terminal.
struct JsonCore {
    handler: BoxedJsonHandler,
}

impl Ware<JsonCtx, JsonOutcome> for JsonCore {
    fn invoke<'a>(&'a self, (query, path): JsonCtx, _next: Next<'a, JsonCtx, JsonOutcome>) -> BoxFuture<'a, JsonOutcome> {
        let fut = self.handler.call(query, path);
        Box::pin(async move { fut.await.map(Some) })
    }
}

/// Tail of the pre chain for raw routes.
struct RawRoute {
    handler: BoxedRawHandler,
}

impl Ware<PreCtx, PreOutcome> for RawRoute {
    fn invoke<'a>(&'a self, (req, path_params): PreCtx, _next: Next<'a, PreCtx, PreOutcome>) -> BoxFuture<'a, PreOutcome> {
        let fut = self.handler.call(req, path_params);
        Box::pin(async move { Some(fut.await) })
    }
}

/// GET reads the URL query string; every other method reads the
/// urlencoded body, with query-string pairs appended after it so body
/// values win first-value lookups.
fn decode_query(req: &Request) -> Params {
    if req.method() == Method::GET {
        Params::from_urlencoded(req.query().unwrap_or("").as_bytes())
    } else {
        let mut params = Params::from_urlencoded(req.body());
        if let Some(query) = req.query() {
            for (key, value) in Params::from_urlencoded(query.as_bytes()).iter() {
                params.append(key, value);
            }
        }
        params
    }
}

/// The generic failure path: 503 plus the sentinel envelope, error text
/// carried only in `dev_message`.
fn internal_error_response(dev_message: &str) -> Response {
    let body = serde_json::to_vec(&Reply::internal_error(dev_message)).unwrap_or_default();
    Response::builder()
        .status(StatusCode::SERVICE_UNAVAILABLE)
        .json(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Recovery;
    use crate::reply::{CODE_OK, MESSAGE_OK};
    use anyhow::anyhow;
    use serde_json::{Value, json};

    async fn ok_user(_query: Params, _path: Params) -> anyhow::Result<Reply> {
        Ok(Reply::ok(json!({"id": 1})))
    }

    async fn boom(_query: Params, _path: Params) -> anyhow::Result<Reply> {
        Err(anyhow!("boom"))
    }

    async fn with_dev(_query: Params, _path: Params) -> anyhow::Result<Reply> {
        Ok(Reply::new(CODE_OK, MESSAGE_OK, Value::Null, "secret detail"))
    }

    async fn echo_id(_query: Params, path: Params) -> anyhow::Result<Reply> {
        Ok(Reply::ok(json!({"id": path.get_i64("id")?})))
    }

    async fn sum(query: Params, _path: Params) -> anyhow::Result<Reply> {
        let total = query.get_i64("a")? + query.get_i64("b")?;
        Ok(Reply::ok(json!({"sum": total})))
    }

    async fn panics(_query: Params, _path: Params) -> anyhow::Result<Reply> {
        panic!("kaboom")
    }

    async fn raw_echo(req: Request, _path: Params) -> Response {
        Response::text(format!("{} {}", req.method(), req.path()))
    }

    async fn send(app: &App, method: Method, uri: &str, body: &[u8]) -> Response {
        app.dispatch(Request::test(method, uri, body)).await
    }

    fn reply_of(response: &Response) -> Reply {
        serde_json::from_slice(response.body()).expect("envelope body")
    }

    #[tokio::test]
    async fn success_envelope_shape() {
        let app = App::new().get("/users", ok_user);
        let response = send(&app, Method::GET, "/users", b"").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(
            response.header("content-type"),
            Some("application/json;charset=UTF-8")
        );
        assert_eq!(
            response.body(),
            br#"{"code":0,"message":"OK","data":{"id":1},"dev_message":""}"#
        );
    }

    #[tokio::test]
    async fn handler_error_becomes_503_envelope() {
        let app = App::new().get("/users", boom);
        let response = send(&app, Method::GET, "/users", b"").await;

        assert_eq!(response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.body(),
            br#"{"code":-1,"message":"internal server error","data":null,"dev_message":"boom"}"#
        );
    }

    #[tokio::test]
    async fn dev_message_is_scrubbed_unless_debug() {
        let app = App::new().get("/x", with_dev);
        let response = send(&app, Method::GET, "/x", b"").await;
        assert_eq!(reply_of(&response).dev_message, "");

        let app = App::new().debug(true).get("/x", with_dev);
        let response = send(&app, Method::GET, "/x", b"").await;
        assert_eq!(reply_of(&response).dev_message, "secret detail");
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let app = App::new().get("/users/{id}", echo_id);
        let response = send(&app, Method::GET, "/users/42", b"").await;
        assert_eq!(reply_of(&response).data, json!({"id": 42}));
    }

    #[tokio::test]
    async fn get_reads_the_query_string() {
        let app = App::new().get("/sum", sum);
        let response = send(&app, Method::GET, "/sum?a=2&b=3", b"").await;
        assert_eq!(reply_of(&response).data, json!({"sum": 5}));
    }

    #[tokio::test]
    async fn post_reads_the_form_body() {
        let app = App::new().post("/sum", sum);
        let response = send(&app, Method::POST, "/sum", b"a=2&b=3").await;
        assert_eq!(reply_of(&response).data, json!({"sum": 5}));

        // Body values win over the query string.
        let response = send(&app, Method::POST, "/sum?a=9", b"a=2&b=3").await;
        assert_eq!(reply_of(&response).data, json!({"sum": 5}));
    }

    #[tokio::test]
    async fn unmatched_requests_are_404() {
        let app = App::new().get("/users", ok_user);
        let response = send(&app, Method::GET, "/nope", b"").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

        // Same path, unregistered method.
        let response = send(&app, Method::DELETE, "/users", b"").await;
        assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn pre_middleware_can_answer_directly() {
        /// Rejects everything without an `authorization` header.
        struct Deny;

        impl Ware<PreCtx, PreOutcome> for Deny {
            fn invoke<'a>(&'a self, ctx: PreCtx, next: Next<'a, PreCtx, PreOutcome>) -> BoxFuture<'a, PreOutcome> {
                Box::pin(async move {
                    if ctx.0.header("authorization").is_none() {
                        return Some(Response::status(StatusCode::UNAUTHORIZED));
                    }
                    next.run(ctx).await
                })
            }
        }

        let app = App::new().wrap(Deny).get("/users", ok_user);
        let response = send(&app, Method::GET, "/users", b"").await;
        assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
        assert!(response.body().is_empty());
    }

    #[tokio::test]
    async fn json_middleware_can_answer_with_a_reply() {
        /// Replies early unless the query carries a token.
        struct RequireToken;

        impl Ware<JsonCtx, JsonOutcome> for RequireToken {
            fn invoke<'a>(&'a self, ctx: JsonCtx, next: Next<'a, JsonCtx, JsonOutcome>) -> BoxFuture<'a, JsonOutcome> {
                Box::pin(async move {
                    if ctx.0.get("token").is_none() {
                        return Ok(Some(Reply::new(42, "token required", Value::Null, "")));
                    }
                    next.run(ctx).await
                })
            }
        }

        let app = App::new().wrap_json(RequireToken).get("/users", ok_user);

        let response = send(&app, Method::GET, "/users", b"").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        let reply = reply_of(&response);
        assert_eq!(reply.code, 42);
        assert_eq!(reply.message, "token required");

        let response = send(&app, Method::GET, "/users?token=t", b"").await;
        assert_eq!(reply_of(&response).code, CODE_OK);
    }

    #[tokio::test]
    async fn recovered_panic_answers_500_and_serving_continues() {
        let app = App::new()
            .wrap(Recovery::new(false))
            .get("/boom", panics)
            .get("/users", ok_user);

        let response = send(&app, Method::GET, "/boom", b"").await;
        assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = send(&app, Method::GET, "/users", b"").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn raw_routes_bypass_the_envelope() {
        let app = App::new().handle_raw(Method::GET, "/raw", raw_echo);
        let response = send(&app, Method::GET, "/raw", b"").await;

        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.body(), b"GET /raw");
        assert_eq!(
            response.header("content-type"),
            Some("text/plain; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn controllers_register_route_groups() {
        struct Ping;

        impl Controller for Ping {
            fn register(&self, app: App) -> App {
                app.get("/ping", ok_user)
            }
        }

        let app = App::new().mount(Ping);
        let response = send(&app, Method::GET, "/ping", b"").await;
        assert_eq!(response.status_code(), StatusCode::OK);
    }
}
