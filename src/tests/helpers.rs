//! Shared test utilities for route tree and router testing

use async_trait::async_trait;
use std::{cell::RefCell, rc::Rc};

use crate::{
    context::Context,
    dom::{ElementRef, MemoryDocument},
    error::RouterError,
    reconciler::ElementReconciler,
    record::RouteRecord,
    routing::{EnterOutcome, RoutingCapable},
    tree::RouteNode,
};

pub type HookLog = Rc<RefCell<Vec<String>>>;

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

/// Routing capability that records every hook call as `<route id>-enter` / `<route id>-exit`
/// and delegates the DOM work to an [`ElementReconciler`].
pub struct RecordingRouting {
    log: HookLog,
    inner: ElementReconciler,
    halt_at: Option<String>,
}

impl RecordingRouting {
    pub fn new(log: HookLog) -> Self {
        RecordingRouting {
            log,
            inner: ElementReconciler::default(),
            halt_at: None,
        }
    }

    /// Return [`EnterOutcome::Halt`] from the entry hook of `route_id`.
    pub fn halting_at(log: HookLog, route_id: &str) -> Self {
        RecordingRouting {
            halt_at: Some(route_id.to_string()),
            ..RecordingRouting::new(log)
        }
    }
}

#[async_trait(?Send)]
impl RoutingCapable for RecordingRouting {
    async fn route_enter(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<EnterOutcome, RouterError> {
        self.log
            .borrow_mut()
            .push(format!("{}-enter", current.key()));
        let outcome = self.inner.route_enter(current, next, route_id, ctx).await?;
        if self.halt_at.as_deref() == Some(current.key()) {
            return Ok(EnterOutcome::Halt);
        }
        Ok(outcome)
    }

    async fn route_exit(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        route_id: &str,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        self.log.borrow_mut().push(format!("{}-exit", current.key()));
        self.inner.route_exit(current, next, route_id, ctx).await
    }
}

pub const SCENARIO_TAGS: [&str; 6] = ["root-el", "a-el", "b-el", "c-el", "d-el", "e-el"];

/// The route tree used across activation tests:
///
/// ```text
///      _Root_
///     /      \
///    A        D
///   / \        \
///  B   C        E
/// ```
///
/// Root does not require authentication; every other route does by default.
pub fn build_scenario_tree() -> RouteNode {
    let no_params: [&str; 0] = [];
    let root = RouteNode::new(
        RouteRecord::new("Root", "root-el", "", no_params).with_authentication(false),
    );
    let a = RouteNode::new(RouteRecord::new("A", "a-el", "", no_params));
    let b = RouteNode::new(RouteRecord::new("B", "b-el", "/B/:bData", ["bData"]));
    let c = RouteNode::new(RouteRecord::new("C", "c-el", "/C", no_params));
    let d = RouteNode::new(RouteRecord::new("D", "d-el", "/D", no_params));
    let e = RouteNode::new(RouteRecord::new("E", "e-el", "/D/E", no_params));

    a.add_child(b).ok();
    a.add_child(c).ok();
    d.add_child(e).ok();
    root.add_child(a).ok();
    root.add_child(d).ok();
    root
}

pub struct Scenario {
    pub document: Rc<MemoryDocument>,
    pub root: RouteNode,
    pub root_element: ElementRef,
    pub log: HookLog,
}

impl Scenario {
    pub fn node(&self, key: &str) -> RouteNode {
        self.root
            .node_by_key(key)
            .unwrap_or_else(|| panic!("no route '{key}' in the scenario tree"))
    }

    /// Drain the hook log.
    pub fn take_log(&self) -> Vec<String> {
        self.log.borrow_mut().drain(..).collect()
    }

    /// Tag names of the mounted element chain, following first children from the root
    /// element.
    pub fn mounted_chain(&self) -> Vec<String> {
        let mut chain = vec![self.root_element.tag_name()];
        let mut element = self.root_element.children().into_iter().next();
        while let Some(current) = element {
            chain.push(current.tag_name());
            element = current.children().into_iter().next();
        }
        chain
    }
}

/// Scenario tree with every tag defined on a fresh memory document using `routing`, and the
/// root route bound to a `root-el` element.
pub fn scenario_with(routing: Rc<dyn RoutingCapable>, log: HookLog) -> Scenario {
    init_logging();
    let document = MemoryDocument::new();
    for tag in SCENARIO_TAGS {
        document.define(tag, Some(routing.clone()));
    }
    let root = build_scenario_tree();
    let root_element: ElementRef = document
        .element("root-el")
        .expect("memory document creates elements");
    root.set_element(Some(root_element.clone()));
    Scenario {
        document,
        root,
        root_element,
        log,
    }
}

pub fn scenario() -> Scenario {
    let log = HookLog::default();
    scenario_with(Rc::new(RecordingRouting::new(log.clone())), log)
}
