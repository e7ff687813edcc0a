//! The DOM boundary consumed by the reconciler.
//!
//! The router never touches a concrete DOM. It works with [`ElementRef`] handles and the
//! owning [`Document`], both of which are implemented by a backend:
//!
//! - [`memory`] - an in-memory document for headless use and tests
//! - `web` (feature `wasm`) - the browser DOM through `web-sys`

use async_trait::async_trait;
use std::{any::Any, fmt, rc::Rc};

use crate::{error::RouterError, routing::RoutingCapable};

pub mod memory;
#[cfg(feature = "wasm")]
pub mod web;

pub use memory::{MemoryDocument, MemoryElement};

/// Cheaply clonable handle to an element. Holding one does not keep the element mounted.
pub type ElementRef = Rc<dyn Element>;

/// Constructor for a registered custom element.
pub type ElementConstructor = Rc<dyn Fn() -> Result<ElementRef, RouterError>>;

pub trait Element: fmt::Debug {
    /// Tag name as reported by the backend.
    fn tag_name(&self) -> String;

    fn get_attribute(&self, name: &str) -> Option<String>;

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), RouterError>;

    fn remove_attribute(&self, name: &str) -> Result<(), RouterError>;

    fn parent(&self) -> Option<ElementRef>;

    fn children(&self) -> Vec<ElementRef>;

    fn append_child(&self, child: &ElementRef) -> Result<(), RouterError>;

    fn remove_child(&self, child: &ElementRef) -> Result<(), RouterError>;

    /// First descendant (pre-order) whose tag matches `tag_name`, ignoring case.
    fn query_selector(&self, tag_name: &str) -> Option<ElementRef>;

    /// Node identity, independent of how many handles point at the node.
    fn is_same_node(&self, other: &dyn Element) -> bool;

    fn owner_document(&self) -> Rc<dyn Document>;

    /// The routing hooks this element exposes, if any.
    fn routing(&self) -> Option<Rc<dyn RoutingCapable>>;

    fn as_any(&self) -> &dyn Any;
}

#[async_trait(?Send)]
pub trait Document {
    /// Create a plain (non custom) element.
    fn create_element(&self, tag_name: &str) -> Result<ElementRef, RouterError>;

    /// Constructor for `tag_name` if a custom element with that name is registered.
    fn custom_element(&self, tag_name: &str) -> Option<ElementConstructor>;

    /// Resolves once `tag_name` is registered as a custom element.
    async fn when_defined(&self, tag_name: &str) -> Result<(), RouterError>;
}

pub fn same_element(a: &ElementRef, b: &ElementRef) -> bool {
    a.is_same_node(b.as_ref())
}

/// True when `child`'s parent is `parent`.
pub fn is_child_of(child: &ElementRef, parent: &ElementRef) -> bool {
    child
        .parent()
        .is_some_and(|actual| same_element(&actual, parent))
}
