//! An in-memory DOM for headless routing and tests.

use async_trait::async_trait;
use futures::channel::oneshot;
use std::{
    any::Any,
    cell::{Cell, RefCell},
    collections::BTreeMap,
    fmt,
    rc::{Rc, Weak},
};

use super::{Document, Element, ElementConstructor, ElementRef};
use crate::{error::RouterError, routing::RoutingCapable};

#[derive(Clone, Default)]
struct Definition {
    routing: Option<Rc<dyn RoutingCapable>>,
}

pub struct MemoryDocument {
    self_ref: Weak<MemoryDocument>,
    definitions: RefCell<BTreeMap<String, Definition>>,
    waiters: RefCell<BTreeMap<String, Vec<oneshot::Sender<()>>>>,
    attribute_failures: Cell<u32>,
}

impl MemoryDocument {
    pub fn new() -> Rc<MemoryDocument> {
        Rc::new_cyclic(|self_ref| MemoryDocument {
            self_ref: self_ref.clone(),
            definitions: RefCell::new(BTreeMap::new()),
            waiters: RefCell::new(BTreeMap::new()),
            attribute_failures: Cell::new(0),
        })
    }

    fn handle(&self) -> Result<Rc<MemoryDocument>, RouterError> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| RouterError::Dom("document has been dropped".to_string()))
    }

    /// Register `tag_name` as a custom element whose instances expose `routing`, and resolve
    /// every pending [`Document::when_defined`] for it.
    pub fn define(&self, tag_name: &str, routing: Option<Rc<dyn RoutingCapable>>) {
        let tag = tag_name.to_lowercase();
        tracing::debug!("Defining custom element '{tag}'");
        self.definitions
            .borrow_mut()
            .insert(tag.clone(), Definition { routing });
        let waiters = self.waiters.borrow_mut().remove(&tag).unwrap_or_default();
        for waiter in waiters {
            waiter.send(()).ok();
        }
    }

    pub fn is_defined(&self, tag_name: &str) -> bool {
        self.definitions
            .borrow()
            .contains_key(&tag_name.to_lowercase())
    }

    /// Number of tasks waiting for `tag_name` to be defined.
    pub fn pending_definitions(&self, tag_name: &str) -> usize {
        self.waiters
            .borrow()
            .get(&tag_name.to_lowercase())
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Make the next `count` attribute writes fail with a transient error.
    pub fn fail_next_attribute_writes(&self, count: u32) {
        self.attribute_failures.set(count);
    }

    fn take_attribute_failure(&self) -> bool {
        let remaining = self.attribute_failures.get();
        if remaining == 0 {
            return false;
        }
        self.attribute_failures.set(remaining - 1);
        true
    }

    /// Create a detached element; defined custom elements get their registered routing.
    pub fn element(&self, tag_name: &str) -> Result<Rc<MemoryElement>, RouterError> {
        let tag = tag_name.to_lowercase();
        let routing = self
            .definitions
            .borrow()
            .get(&tag)
            .and_then(|definition| definition.routing.clone());
        Ok(MemoryElement::new(&tag, self.handle()?, routing))
    }
}

#[async_trait(?Send)]
impl Document for MemoryDocument {
    fn create_element(&self, tag_name: &str) -> Result<ElementRef, RouterError> {
        Ok(self.element(tag_name)?)
    }

    fn custom_element(&self, tag_name: &str) -> Option<ElementConstructor> {
        let tag = tag_name.to_lowercase();
        let definition = self.definitions.borrow().get(&tag).cloned()?;
        let document = self.self_ref.upgrade()?;
        Some(Rc::new(move || -> Result<ElementRef, RouterError> {
            Ok(MemoryElement::new(
                &tag,
                document.clone(),
                definition.routing.clone(),
            ))
        }))
    }

    async fn when_defined(&self, tag_name: &str) -> Result<(), RouterError> {
        if self.is_defined(tag_name) {
            return Ok(());
        }
        let (tx, rx) = oneshot::channel();
        self.waiters
            .borrow_mut()
            .entry(tag_name.to_lowercase())
            .or_default()
            .push(tx);
        tracing::debug!("Waiting for custom element '{tag_name}' to be defined");
        rx.await.map_err(|_| {
            RouterError::Dom(format!("wait for definition of '{tag_name}' was cancelled"))
        })
    }
}

impl fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDocument")
            .field("definitions", &self.definitions.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct MemoryElement {
    self_ref: Weak<MemoryElement>,
    tag_name: String,
    document: Rc<MemoryDocument>,
    attributes: RefCell<BTreeMap<String, String>>,
    parent: RefCell<Weak<MemoryElement>>,
    children: RefCell<Vec<Rc<MemoryElement>>>,
    routing: Option<Rc<dyn RoutingCapable>>,
}

impl MemoryElement {
    fn new(
        tag_name: &str,
        document: Rc<MemoryDocument>,
        routing: Option<Rc<dyn RoutingCapable>>,
    ) -> Rc<MemoryElement> {
        Rc::new_cyclic(|self_ref| MemoryElement {
            self_ref: self_ref.clone(),
            tag_name: tag_name.to_string(),
            document,
            attributes: RefCell::new(BTreeMap::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            routing,
        })
    }

    pub fn attributes(&self) -> BTreeMap<String, String> {
        self.attributes.borrow().clone()
    }

    /// Serialized view of this element and its subtree, e.g. `<app-main><b-el b-data="x"></b-el></app-main>`.
    pub fn markup(&self) -> String {
        let mut out = format!("<{}", self.tag_name);
        for (name, value) in self.attributes.borrow().iter() {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push('>');
        for child in self.children.borrow().iter() {
            out.push_str(&child.markup());
        }
        out.push_str(&format!("</{}>", self.tag_name));
        out
    }

    fn downcast(element: &ElementRef) -> Result<Rc<MemoryElement>, RouterError> {
        element
            .as_any()
            .downcast_ref::<MemoryElement>()
            .and_then(|e| e.self_ref.upgrade())
            .ok_or_else(|| {
                RouterError::Dom(format!(
                    "element '{}' does not belong to an in-memory document",
                    element.tag_name()
                ))
            })
    }

    fn is_inclusive_ancestor_of(&self, other: &MemoryElement) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        let mut node = other.parent.borrow().upgrade();
        while let Some(current) = node {
            if std::ptr::eq(self, current.as_ref()) {
                return true;
            }
            node = current.parent.borrow().upgrade();
        }
        false
    }

    fn detach(child: &Rc<MemoryElement>) {
        let parent = child.parent.borrow().upgrade();
        if let Some(parent) = parent {
            parent
                .children
                .borrow_mut()
                .retain(|c| !Rc::ptr_eq(c, child));
        }
        *child.parent.borrow_mut() = Weak::new();
    }
}

impl Element for MemoryElement {
    fn tag_name(&self) -> String {
        self.tag_name.clone()
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.attributes.borrow().get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), RouterError> {
        if self.document.take_attribute_failure() {
            return Err(RouterError::TransientDom(format!(
                "could not set '{name}' on '{}'",
                self.tag_name
            )));
        }
        self.attributes
            .borrow_mut()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_attribute(&self, name: &str) -> Result<(), RouterError> {
        self.attributes.borrow_mut().remove(name);
        Ok(())
    }

    fn parent(&self) -> Option<ElementRef> {
        let parent = self.parent.borrow().upgrade()?;
        Some(parent)
    }

    fn children(&self) -> Vec<ElementRef> {
        self.children
            .borrow()
            .iter()
            .map(|c| -> ElementRef { c.clone() })
            .collect()
    }

    fn append_child(&self, child: &ElementRef) -> Result<(), RouterError> {
        let child = MemoryElement::downcast(child)?;
        if child.is_inclusive_ancestor_of(self) {
            return Err(RouterError::Dom(format!(
                "cannot append '{}' inside itself",
                child.tag_name
            )));
        }
        MemoryElement::detach(&child);
        *child.parent.borrow_mut() = self.self_ref.clone();
        self.children.borrow_mut().push(child);
        Ok(())
    }

    fn remove_child(&self, child: &ElementRef) -> Result<(), RouterError> {
        let child = MemoryElement::downcast(child)?;
        let is_child = self
            .children
            .borrow()
            .iter()
            .any(|c| Rc::ptr_eq(c, &child));
        if !is_child {
            return Err(RouterError::Dom(format!(
                "'{}' is not a child of '{}'",
                child.tag_name, self.tag_name
            )));
        }
        MemoryElement::detach(&child);
        Ok(())
    }

    fn query_selector(&self, tag_name: &str) -> Option<ElementRef> {
        for child in self.children.borrow().iter() {
            if child.tag_name.eq_ignore_ascii_case(tag_name) {
                return Some(child.clone());
            }
            if let Some(found) = child.query_selector(tag_name) {
                return Some(found);
            }
        }
        None
    }

    fn is_same_node(&self, other: &dyn Element) -> bool {
        other
            .as_any()
            .downcast_ref::<MemoryElement>()
            .is_some_and(|o| std::ptr::eq(self, o))
    }

    fn owner_document(&self) -> Rc<dyn Document> {
        self.document.clone()
    }

    fn routing(&self) -> Option<Rc<dyn RoutingCapable>> {
        self.routing.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for MemoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryElement")
            .field("tag_name", &self.tag_name)
            .field("attributes", &self.attributes.borrow())
            .field("children", &self.children.borrow().len())
            .field("routing", &self.routing.is_some())
            .finish()
    }
}
