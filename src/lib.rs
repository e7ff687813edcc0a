//! # element-router
//!
//! Hierarchical client-side routing for trees of custom elements.
//!
//! ## Overview
//!
//! Routes form a tree that mirrors nested URL segments. Every route names the element tag
//! that renders it; a route's element is mounted inside the element of its parent route.
//! When the active route changes, the router computes the common ancestor of the old and
//! new routes, runs **exit hooks** leaf-to-root for the routes being left, then runs
//! **entry hooks** root-to-leaf along the new path. Elements of shared ancestors stay
//! mounted and only have their parameter attributes refreshed.
//!
//! ```text
//!      _Root_
//!     /      \
//!    A        D
//!   / \        \
//!  B   C        E
//! ```
//!
//! With `B` active, navigating to `E` runs `B.exit, A.exit, Root.enter, D.enter, E.enter`.
//!
//! ## Architecture
//!
//! - **[`tree`]**: the route tree (`RouteNode`) and the activation algorithm
//! - **[`record`]**: per-route data (`RouteRecord`) and the `BeforeEnterHook`
//! - **[`routing`]**: the `RoutingCapable` hooks an element exposes to participate in routing
//! - **[`reconciler`]**: `ElementReconciler`, the default hooks that create, reuse, mount and
//!   detach elements
//! - **[`dom`]**: the DOM boundary (`Element`, `Document`) with an in-memory implementation
//!   and, under the `wasm` feature, a browser implementation
//! - **[`dispatch`]**: the URL/history boundary (`Dispatcher`) with the in-memory
//!   `MemoryDispatcher` and the `PathPattern` matcher
//! - **[`context`]**: the per-navigation `Context`
//! - **[`router`]**: `Router`, which ties a route tree to a dispatcher
//! - **[`config`]**: declarative route configuration loaded from TOML or JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use element_router::{
//!     config::{RouteConfig, RouterOptions},
//!     dispatch::MemoryDispatcher,
//!     dom::MemoryDocument,
//!     router::Router,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RouteConfig::load("routes.toml")?;
//!     let dispatcher = MemoryDispatcher::new("/");
//!     let router = Router::with_routes(&config, dispatcher.clone(), RouterOptions::default())?;
//!
//!     // Every routed tag delegates to the router's default hooks.
//!     let document = MemoryDocument::new();
//!     router.route_tree().unwrap().traverse(&mut |node| {
//!         document.define(&node.tag_name(), Some(router.reconciler()));
//!         element_router::tree::Traversal::Continue
//!     });
//!     router.set_root_element(document.element(&config.tag_name)?)?;
//!
//!     router.start().await?;
//!     router.go("/users/:userId", [("userId", "42")]).await?;
//!     println!("active route: {:?}", router.current_node_id());
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **default**: route tree, activation, in-memory DOM and dispatcher
//! - **wasm**: browser DOM backend over `web-sys` and `tracing-wasm` logging
//! - **bin**: the `element-router` command line tool

pub mod config;
pub mod context;
pub mod dispatch;
pub mod dom;
pub mod error;
pub mod reconciler;
pub mod record;
pub mod router;
pub mod routing;
#[cfg(test)]
mod tests;
pub mod tree;
#[cfg(feature = "wasm")]
pub mod wasm;

pub use error::*;
