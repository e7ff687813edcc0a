//! The path-dispatch boundary: the history/URL engine the [`Router`](crate::router::Router)
//! registers its routes with.
//!
//! The router only relies on the [`Dispatcher`] trait. [`MemoryDispatcher`] is a complete
//! in-memory engine (pattern matching, callback chain, exit callbacks, history stack) used
//! for headless navigation and tests.

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use std::{future::Future, rc::Rc};

use crate::{context::Context, error::RouterError};

pub mod memory;
pub mod pattern;

pub use memory::MemoryDispatcher;
pub use pattern::PathPattern;

/// Continues the callback chain. Leaving it uncalled halts dispatch for this navigation.
pub type Next = Box<dyn FnOnce()>;

pub type RouteCallback = Rc<dyn Fn(Rc<Context>, Next) -> LocalBoxFuture<'static, ()>>;

/// Wrap an async closure as a [`RouteCallback`].
pub fn route_callback<F, Fut>(callback: F) -> RouteCallback
where
    F: Fn(Rc<Context>, Next) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    Rc::new(move |ctx, next| Box::pin(callback(ctx, next)))
}

#[async_trait(?Send)]
pub trait Dispatcher {
    /// Invoke `callback` whenever the current path matches `pattern`.
    fn register(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError>;

    /// Invoke `callback` with the previous context when navigating away from a path
    /// matching `pattern`.
    fn exit(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError>;

    /// Navigate to `path`, pushing a history entry once the navigation is handled.
    async fn show(
        &self,
        path: &str,
        state: Option<serde_json::Value>,
        dispatch: bool,
        push: bool,
    ) -> Result<Rc<Context>, RouterError>;

    /// Navigate to `path`, replacing the current history entry.
    async fn replace(
        &self,
        path: &str,
        state: Option<serde_json::Value>,
        dispatch: bool,
    ) -> Result<Rc<Context>, RouterError>;

    /// Overwrite the current history entry with `ctx`.
    fn save(&self, ctx: &Context);

    /// Append `ctx` as a new history entry.
    fn push(&self, ctx: &Context);

    /// Dispatch the current location.
    async fn start(&self) -> Result<(), RouterError>;
}
