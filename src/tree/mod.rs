//! The route tree.
//!
//! - [`RouteNode`]: tree structure holding a [`RouteRecord`](crate::record::RouteRecord) and
//!   the element mounted for it
//! - [`ActivationPlan`] / [`RouteNode::activate`]: the exit/entry hook sequencing run on
//!   every navigation

mod activation;
mod node;

pub use activation::ActivationPlan;
pub use node::{RouteNode, Traversal};
