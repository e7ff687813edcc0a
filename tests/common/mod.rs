//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use async_trait::async_trait;
use element_router::{
    config::{RouteConfig, RouterOptions},
    context::Context,
    dispatch::MemoryDispatcher,
    dom::{MemoryDocument, MemoryElement},
    router::Router,
    routing::{EnterOutcome, RoutingCapable},
    tree::{RouteNode, Traversal},
    RouterError,
};
use std::{cell::RefCell, path::PathBuf, rc::Rc};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// The demo application's route configuration:
///
/// ```text
/// base
/// ├── dashboard     /
/// ├── section-a     /section-a
/// │   └── section-a1
/// └── section-b     /section-b (public)
///     ├── section-b1
///     └── section-b2
///         └── section-b2a
/// ```
#[allow(dead_code)]
pub fn demo_config() -> RouteConfig {
    RouteConfig::load(fixture_path("demo-routes.toml")).expect("demo route configuration loads")
}

/// Records `<route id>-enter` / `<route id>-exit` and delegates to the router's hooks.
pub struct TracingRouting {
    inner: Rc<dyn RoutingCapable>,
    trace: Rc<RefCell<Vec<String>>>,
}

#[async_trait(?Send)]
impl RoutingCapable for TracingRouting {
    async fn route_enter(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<EnterOutcome, RouterError> {
        self.trace
            .borrow_mut()
            .push(format!("{}-enter", current.key()));
        self.inner.route_enter(current, next, route_id, ctx).await
    }

    async fn route_exit(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        self.trace
            .borrow_mut()
            .push(format!("{}-exit", current.key()));
        self.inner.route_exit(current, next, route_id, ctx).await
    }
}

pub struct Harness {
    pub router: Router,
    pub dispatcher: Rc<MemoryDispatcher>,
    pub document: Rc<MemoryDocument>,
    pub root_element: Rc<MemoryElement>,
    pub trace: Rc<RefCell<Vec<String>>>,
}

#[allow(dead_code)]
impl Harness {
    /// A router over `config` with every routed tag defined on a memory document, not yet
    /// started.
    pub fn new(config: &RouteConfig, initial_path: &str) -> Harness {
        init_logging();
        let dispatcher = MemoryDispatcher::new(initial_path);
        let router = Router::with_routes(config, dispatcher.clone(), RouterOptions::default())
            .expect("route tree builds");
        let trace = Rc::new(RefCell::new(Vec::new()));
        let routing: Rc<dyn RoutingCapable> = Rc::new(TracingRouting {
            inner: router.reconciler(),
            trace: trace.clone(),
        });

        let document = MemoryDocument::new();
        let root = router.route_tree().expect("router has a route tree");
        root.traverse(&mut |node| {
            document.define(&node.tag_name(), Some(routing.clone()));
            Traversal::Continue
        });
        let root_element = document
            .element(&root.tag_name())
            .expect("root element is created");
        router
            .set_root_element(root_element.clone())
            .expect("root element binds");

        Harness {
            router,
            dispatcher,
            document,
            root_element,
            trace,
        }
    }

    pub fn take_trace(&self) -> Vec<String> {
        self.trace.borrow_mut().drain(..).collect()
    }

    pub fn markup(&self) -> String {
        self.root_element.markup()
    }

    pub fn node(&self, key: &str) -> RouteNode {
        self.router
            .route_tree()
            .and_then(|root| root.node_by_key(key))
            .unwrap_or_else(|| panic!("no route '{key}'"))
    }
}
