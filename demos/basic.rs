//! Minimal weft example — JSON endpoints behind both middleware chains.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl 'http://localhost:3000/users/42?verbose=true'
//!   curl -X POST http://localhost:3000/users -d 'name=alice'
//!   curl http://localhost:3000/boom

use weft::middleware::{JsonCtx, JsonOutcome, Recovery};
use weft::{App, BoxFuture, Next, Params, Reply, Server, Ware};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let app = App::new()
        .debug(true)
        .wrap(Recovery::new(true))
        .wrap_json(RequireName)
        .get("/users/{id}", get_user)
        .post("/users", create_user)
        .get("/boom", boom);

    Server::bind("0.0.0.0:3000")
        .serve(app)
        .await
        .expect("server error");
}

// GET /users/{id}
async fn get_user(query: Params, path: Params) -> anyhow::Result<Reply> {
    let id = path.get_i64("id")?;
    let verbose = query.get_bool("verbose").unwrap_or(false);
    let mut reply = Reply::ok(serde_json::json!({ "id": id, "name": "alice" }));
    if verbose {
        reply.dev_message = format!("user {id} served from memory");
    }
    Ok(reply)
}

// POST /users — form-encoded body, e.g. `name=alice`
async fn create_user(query: Params, _path: Params) -> anyhow::Result<Reply> {
    let name = query.get("name").unwrap_or("anonymous").to_owned();
    Ok(Reply::ok(serde_json::json!({ "id": 99, "name": name })))
}

// GET /boom — recovered by the Recovery middleware, answers 500.
async fn boom(_query: Params, _path: Params) -> anyhow::Result<Reply> {
    panic!("demo panic")
}

/// Json middleware: POSTs without a `name` field never reach the handler.
struct RequireName;

impl Ware<JsonCtx, JsonOutcome> for RequireName {
    fn invoke<'a>(&'a self, ctx: JsonCtx, next: Next<'a, JsonCtx, JsonOutcome>) -> BoxFuture<'a, JsonOutcome> {
        Box::pin(async move {
            let (query, _path) = &ctx;
            if query.get("name").map(str::is_empty).unwrap_or(false) {
                return Ok(Some(Reply::new(
                    1001,
                    "name must not be empty",
                    serde_json::Value::Null,
                    "",
                )));
            }
            next.run(ctx).await
        })
    }
}
