//! Handler traits and type erasure.
//!
//! Routes hold handlers of *different* concrete types in one structure,
//! so each handler is hidden behind a trait object and stored uniformly:
//!
//! ```text
//! async fn get_user(query: Params, path: Params) -> anyhow::Result<Reply>
//!        ↓ app.get("/users/{id}", get_user)
//! get_user.into_boxed_handler()        ← JsonHandler blanket impl
//!        ↓
//! Arc::new(JsonFn(get_user))           ← heap-allocated wrapper
//!        ↓ stored as BoxedJsonHandler
//! handler.call(query, path)            ← one vtable dispatch per request
//! ```
//!
//! Two handler kinds exist, mirroring the two middleware kinds:
//!
//! - [`JsonHandler`] — `async fn(Params, Params) -> anyhow::Result<Reply>`;
//!   the dispatcher serializes its envelope.
//! - [`RawHandler`] — `async fn(Request, Params) -> Response`; full control
//!   over the transport response, no envelope involved.
//!
//! Both traits are sealed: the blanket impls below are the only way to
//! satisfy them, which keeps the API surface stable.

use std::future::Future;
use std::sync::Arc;

use crate::chain::BoxFuture;
use crate::params::Params;
use crate::reply::Reply;
use crate::request::Request;
use crate::response::Response;

// ── Internal dispatch interfaces ──────────────────────────────────────────────

/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public handler traits' `into_boxed_handler` methods.
#[doc(hidden)]
pub trait ErasedJsonHandler: Send + Sync {
    fn call(&self, query: Params, path: Params) -> BoxFuture<'static, anyhow::Result<Reply>>;
}

#[doc(hidden)]
pub trait ErasedRawHandler: Send + Sync {
    fn call(&self, req: Request, path: Params) -> BoxFuture<'static, Response>;
}

#[doc(hidden)]
pub type BoxedJsonHandler = Arc<dyn ErasedJsonHandler>;

#[doc(hidden)]
pub type BoxedRawHandler = Arc<dyn ErasedRawHandler>;

// ── Public handler traits ─────────────────────────────────────────────────────

/// Implemented for every valid JSON route handler:
/// any `async fn(Params, Params) -> anyhow::Result<Reply>`.
/// You never implement this yourself.
pub trait JsonHandler: private::SealedJson + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedJsonHandler;
}

/// Implemented for every valid raw route handler:
/// any `async fn(Request, Params) -> Response`.
/// You never implement this yourself.
pub trait RawHandler: private::SealedRaw + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedRawHandler;
}

/// The sealing module. External crates cannot name these traits and
/// therefore cannot add their own handler impls.
mod private {
    pub trait SealedJson {}
    pub trait SealedRaw {}
}

// ── Blanket implementations ───────────────────────────────────────────────────

impl<F, Fut> private::SealedJson for F
where
    F: Fn(Params, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
}

impl<F, Fut> JsonHandler for F
where
    F: Fn(Params, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedJsonHandler {
        Arc::new(JsonFn(self))
    }
}

impl<F, Fut> private::SealedRaw for F
where
    F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
}

impl<F, Fut> RawHandler for F
where
    F: Fn(Request, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedRawHandler {
        Arc::new(RawFn(self))
    }
}

// ── Concrete wrappers ─────────────────────────────────────────────────────────

/// Bridges a concrete JSON handler to the trait-object world.
struct JsonFn<F>(F);

impl<F, Fut> ErasedJsonHandler for JsonFn<F>
where
    F: Fn(Params, Params) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Reply>> + Send + 'static,
{
    fn call(&self, query: Params, path: Params) -> BoxFuture<'static, anyhow::Result<Reply>> {
        Box::pin((self.0)(query, path))
    }
}

struct RawFn<F>(F);

impl<F, Fut> ErasedRawHandler for RawFn<F>
where
    F: Fn(Request, Params) -> Fut + Send + Sync,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn call(&self, req: Request, path: Params) -> BoxFuture<'static, Response> {
        Box::pin((self.0)(req, path))
    }
}
