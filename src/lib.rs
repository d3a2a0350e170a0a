//! # weft
//!
//! A minimal JSON REST layer: two middleware chains and one response
//! envelope. Nothing more. Nothing less.
//!
//! ## The contract
//!
//! Every request flows through two ordered chains before it reaches your
//! handler:
//!
//! ```text
//! request ─► pre chain ─► decode params ─► json chain ─► handler ─► envelope
//! ```
//!
//! - **Pre middleware** works on the raw transport request — auth, panic
//!   recovery, rate limiting. It may answer directly and stop everything
//!   downstream.
//! - **Json middleware** works on decoded `(query, path)` parameters and
//!   deals in [`Reply`] envelopes — validation, enrichment.
//!
//! A middleware continues the chain by running its `next` handle, or
//! short-circuits by not doing so. Your handler is just the last link;
//! middleware cannot tell it apart from another middleware.
//!
//! Every JSON handler result is serialized into one wire shape:
//!
//! ```json
//! {"code": 0, "message": "OK", "data": {...}, "dev_message": ""}
//! ```
//!
//! Handler errors become `{"code": -1, "message": "internal server
//! error"}` with status 503 and the error text in `dev_message` — which
//! is scrubbed unless the app runs in debug mode.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weft::middleware::Recovery;
//! use weft::{App, Params, Reply, Server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::new()
//!         .wrap(Recovery::new(false))
//!         .get("/users/{id}", get_user);
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await.unwrap();
//! }
//!
//! async fn get_user(_query: Params, path: Params) -> anyhow::Result<Reply> {
//!     let id = path.get_i64("id")?;
//!     Ok(Reply::ok(serde_json::json!({ "id": id, "name": "alice" })))
//! }
//! ```

mod app;
mod chain;
mod controller;
mod error;
mod handler;
mod params;
mod reply;
mod request;
mod response;
mod server;

pub mod middleware;

pub use app::App;
pub use chain::{BoxFuture, Next, Terminate, Ware};
pub use controller::Controller;
pub use error::Error;
pub use handler::{JsonHandler, RawHandler};
pub use params::{ParamError, Params};
pub use reply::{CODE_INTERNAL_ERROR, CODE_OK, MESSAGE_INTERNAL_ERROR, MESSAGE_OK, Reply};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use server::Server;
