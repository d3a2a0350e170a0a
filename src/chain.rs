//! Middleware chain: construction and dispatch.
//!
//! Both middleware kinds — pre (raw transport objects) and json (decoded
//! parameters) — share one shape: take a context, take a [`Next`] handle,
//! produce an outcome. So there is exactly one chain implementation,
//! generic over `(Ctx, Out)`, instead of one linked list per kind.
//!
//! # How a chain is built
//!
//! ```text
//! [ware A] → [ware B] → [core] → [terminal]
//! ```
//!
//! Registration order is invocation order. The caller appends the
//! application handler (wrapped as a pseudo-middleware that ignores its
//! `next`) before building, so user middleware sees the handler as just
//! another link. The builder then adds a terminal node whose invocation
//! yields the no-op outcome ([`Terminate::terminate`]) — it has no next
//! pointer to dereference by construction.
//!
//! # Control flow
//!
//! - Not calling [`Next::run`] short-circuits: nothing downstream executes.
//! - Calling it more than once re-runs the downstream chain. That is legal
//!   and entirely the caller's responsibility.
//! - Chains are cheap stateless values; one is built per request from the
//!   registered list, and chains built from the same list never share
//!   mutable state.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A heap-allocated, type-erased future.
///
/// Middleware returns this from [`Ware::invoke`] — `Box::pin(async move { … })`
/// is the whole recipe. `Send` lets tokio move it across threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// One unit of request processing in a chain.
///
/// Implementations may inspect or mutate `ctx`, decide to continue by
/// running `next`, short-circuit by not running it, or post-process the
/// downstream outcome after `next` resolves.
///
/// ```rust,ignore
/// impl Ware<PreCtx, PreOutcome> for RequestId {
///     fn invoke<'a>(&'a self, mut ctx: PreCtx, next: Next<'a, PreCtx, PreOutcome>)
///         -> BoxFuture<'a, PreOutcome>
///     {
///         Box::pin(async move {
///             ctx.0.headers_mut().insert("x-request-id", self.fresh_id());
///             next.run(ctx).await
///         })
///     }
/// }
/// ```
pub trait Ware<Ctx, Out>: Send + Sync {
    fn invoke<'a>(&'a self, ctx: Ctx, next: Next<'a, Ctx, Out>) -> BoxFuture<'a, Out>;
}

/// The no-op outcome produced by a chain's terminal node.
///
/// Reaching the terminal means every link ran `next` and none of them —
/// including the handler pseudo-middleware, which never does — produced
/// a result.
pub trait Terminate {
    fn terminate() -> Self;
}

/// Nothing was written.
impl<T> Terminate for Option<T> {
    fn terminate() -> Self {
        None
    }
}

/// `Ok(None)`: no reply, no error.
impl<T, E> Terminate for Result<Option<T>, E> {
    fn terminate() -> Self {
        Ok(None)
    }
}

// ── Chain nodes ───────────────────────────────────────────────────────────────

/// A link in the chain: one middleware plus exclusive ownership of the rest.
///
/// The terminal carries nothing — the invalid state "terminal with a next
/// pointer" cannot be expressed.
pub(crate) enum ChainNode<Ctx, Out> {
    Link {
        ware: Arc<dyn Ware<Ctx, Out>>,
        next: Box<ChainNode<Ctx, Out>>,
    },
    Terminal,
}

impl<Ctx, Out> ChainNode<Ctx, Out>
where
    Ctx: Send + 'static,
    Out: Terminate + Send + 'static,
{
    fn handle<'a>(&'a self, ctx: Ctx) -> BoxFuture<'a, Out> {
        match self {
            Self::Link { ware, next } => ware.invoke(ctx, Next { node: next }),
            Self::Terminal => Box::pin(async { Out::terminate() }),
        }
    }
}

/// Handle to the next link in the chain.
///
/// `Copy`, so a middleware may run the downstream chain as many times as
/// it likes — once per owned `Ctx` it can produce.
pub struct Next<'a, Ctx, Out> {
    node: &'a ChainNode<Ctx, Out>,
}

impl<Ctx, Out> Clone for Next<'_, Ctx, Out> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Ctx, Out> Copy for Next<'_, Ctx, Out> {}

impl<'a, Ctx, Out> Next<'a, Ctx, Out>
where
    Ctx: Send + 'static,
    Out: Terminate + Send + 'static,
{
    /// Invokes the rest of the chain.
    pub fn run(self, ctx: Ctx) -> BoxFuture<'a, Out> {
        self.node.handle(ctx)
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

/// An ordered middleware composition, invoked head-first.
pub(crate) struct Chain<Ctx, Out> {
    head: ChainNode<Ctx, Out>,
}

impl<Ctx, Out> Chain<Ctx, Out>
where
    Ctx: Send + 'static,
    Out: Terminate + Send + 'static,
{
    /// Builds the linked nodes right-to-left so that node *i*'s next is
    /// node *i + 1*, with the terminal as tail. An empty list is just the
    /// terminal.
    pub(crate) fn new(wares: Vec<Arc<dyn Ware<Ctx, Out>>>) -> Self {
        let mut node = ChainNode::Terminal;
        for ware in wares.into_iter().rev() {
            node = ChainNode::Link {
                ware,
                next: Box::new(node),
            };
        }
        Self { head: node }
    }

    pub(crate) fn run(&self, ctx: Ctx) -> BoxFuture<'_, Out> {
        self.head.handle(ctx)
    }
}
