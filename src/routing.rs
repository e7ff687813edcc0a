//! The routing capability an element exposes to the activation algorithm.

use async_trait::async_trait;

use crate::{context::Context, error::RouterError, tree::RouteNode};

/// Result of an enter hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnterOutcome {
    /// Keep entering the remaining nodes of the entry path.
    #[default]
    Continue,
    /// Stop the entry phase of this activation.
    Halt,
}

/// Enter/exit hooks invoked on mounted route elements.
///
/// Components that need custom behaviour typically hold an
/// [`ElementReconciler`](crate::reconciler::ElementReconciler) and delegate to it around their
/// own logic.
#[async_trait(?Send)]
pub trait RoutingCapable {
    /// Called on the element of `current` while entering. `next` is the following node of
    /// the entry path, whose element this hook is expected to mount.
    async fn route_enter(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<EnterOutcome, RouterError>;

    /// Called on the element of `current` while exiting. `next` is the following node of
    /// the exit path (towards the root).
    async fn route_exit(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<(), RouterError>;
}
