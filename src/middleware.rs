//! Middleware layer.
//!
//! Two chains run per request, in this order:
//!
//! 1. **Pre middleware** — sees the raw [`Request`] and the router's path
//!    captures. Short-circuits by returning `Some(response)` without
//!    running `next`; auth, rate limiting and panic recovery live here.
//! 2. **Json middleware** — sees the decoded `(query, path)` parameter
//!    pair and deals in [`Reply`](crate::Reply) envelopes. Short-circuits
//!    by returning `Ok(Some(reply))`; validation and enrichment live here.
//!
//! Implement [`Ware`] over the matching `(Ctx, Out)` pair and register
//! with [`App::wrap`](crate::App::wrap) or
//! [`App::wrap_json`](crate::App::wrap_json). Registration order is
//! invocation order.

use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use tracing::error;

use crate::chain::{BoxFuture, Next, Ware};
use crate::params::Params;
use crate::reply::Reply;
use crate::request::Request;
use crate::response::Response;

/// Context handed to pre middleware: the raw request plus path captures.
pub type PreCtx = (Request, Params);

/// Outcome of the pre chain. `None` means nothing downstream wrote a
/// response.
pub type PreOutcome = Option<Response>;

/// Context handed to json middleware: `(query_params, path_params)`.
pub type JsonCtx = (Params, Params);

/// Outcome of the json chain. `Ok(None)` is the terminal no-op;
/// `Err` becomes the generic 503 envelope.
pub type JsonOutcome = anyhow::Result<Option<Reply>>;

pub type BoxPreWare = Arc<dyn Ware<PreCtx, PreOutcome>>;
pub type BoxJsonWare = Arc<dyn Ware<JsonCtx, JsonOutcome>>;

// ── Recovery ──────────────────────────────────────────────────────────────────

/// Bound on the backtrace text captured for one panic.
const STACK_LIMIT: usize = 8 * 1024;

/// Pre middleware that catches panics from everything downstream.
///
/// On a panic it answers `500 Internal Server Error`, logs the panic
/// message with a backtrace, and — only when built with
/// `expose_panics = true` — writes both into the response body.
///
/// The dispatcher installs no recovery of its own; register this **first**
/// so it wraps every other middleware and the handler. A request that
/// panics with no recovery installed gets no response at all.
pub struct Recovery {
    expose_panics: bool,
}

impl Recovery {
    /// `expose_panics` belongs in debug builds only — it leaks internals.
    pub fn new(expose_panics: bool) -> Self {
        Self { expose_panics }
    }
}

impl Ware<PreCtx, PreOutcome> for Recovery {
    fn invoke<'a>(&'a self, ctx: PreCtx, next: Next<'a, PreCtx, PreOutcome>) -> BoxFuture<'a, PreOutcome> {
        Box::pin(async move {
            match AssertUnwindSafe(next.run(ctx)).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(payload) => {
                    let msg = panic_message(payload.as_ref());
                    let trace = bounded_backtrace();
                    error!(panic = %msg, "panic in request chain\n{trace}");
                    Some(if self.expose_panics {
                        Response::builder()
                            .status(StatusCode::INTERNAL_SERVER_ERROR)
                            .text(format!("PANIC: {msg}\n{trace}"))
                    } else {
                        Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                    })
                }
            }
        })
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

fn bounded_backtrace() -> String {
    let mut trace = Backtrace::force_capture().to_string();
    if trace.len() > STACK_LIMIT {
        let mut cut = STACK_LIMIT;
        while !trace.is_char_boundary(cut) {
            cut -= 1;
        }
        trace.truncate(cut);
    }
    trace
}
