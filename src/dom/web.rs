//! The browser DOM through `web-sys`.
//!
//! Custom element classes are looked up in the window's `CustomElementRegistry`. Their
//! routing hooks live on the Rust side and are registered per tag with
//! [`WebDocument::register_routing`].

use async_trait::async_trait;
use js_sys::{Array, Function, Reflect};
use std::{
    any::Any,
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    rc::{Rc, Weak},
};
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::CustomElementRegistry;

use super::{Document, Element, ElementConstructor, ElementRef};
use crate::{error::RouterError, routing::RoutingCapable};

pub struct WebDocument {
    self_ref: Weak<WebDocument>,
    document: web_sys::Document,
    registry: CustomElementRegistry,
    routing: RefCell<BTreeMap<String, Rc<dyn RoutingCapable>>>,
}

impl WebDocument {
    /// The document of the current window.
    pub fn new() -> Result<Rc<WebDocument>, RouterError> {
        let window =
            web_sys::window().ok_or_else(|| RouterError::Dom("no global window".to_string()))?;
        let document = window
            .document()
            .ok_or_else(|| RouterError::Dom("window has no document".to_string()))?;
        let registry = window.custom_elements();
        Ok(Rc::new_cyclic(|self_ref| WebDocument {
            self_ref: self_ref.clone(),
            document,
            registry,
            routing: RefCell::new(BTreeMap::new()),
        }))
    }

    fn handle(&self) -> Result<Rc<WebDocument>, RouterError> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| RouterError::Dom("document has been dropped".to_string()))
    }

    /// Routing hooks for every element with `tag_name`.
    pub fn register_routing(&self, tag_name: &str, routing: Rc<dyn RoutingCapable>) {
        self.routing
            .borrow_mut()
            .insert(tag_name.to_lowercase(), routing);
    }

    fn routing_for(&self, tag_name: &str) -> Option<Rc<dyn RoutingCapable>> {
        self.routing.borrow().get(&tag_name.to_lowercase()).cloned()
    }

    /// Wrap an element obtained from `web-sys`, e.g. the application's root element.
    pub fn wrap(&self, element: web_sys::Element) -> Result<ElementRef, RouterError> {
        Ok(Rc::new(WebElement {
            element,
            document: self.handle()?,
        }))
    }

    /// `document.querySelector(selector)`, wrapped.
    pub fn query_selector(&self, selector: &str) -> Result<Option<ElementRef>, RouterError> {
        match self.document.query_selector(selector)? {
            Some(element) => Ok(Some(self.wrap(element)?)),
            None => Ok(None),
        }
    }
}

#[async_trait(?Send)]
impl Document for WebDocument {
    fn create_element(&self, tag_name: &str) -> Result<ElementRef, RouterError> {
        let element = self.document.create_element(tag_name)?;
        self.wrap(element)
    }

    fn custom_element(&self, tag_name: &str) -> Option<ElementConstructor> {
        let tag = tag_name.to_lowercase();
        let class = self.registry.get(&tag);
        if class.is_undefined() {
            return None;
        }
        let class: Function = class.dyn_into().ok()?;
        let document = self.self_ref.upgrade()?;
        Some(Rc::new(move || -> Result<ElementRef, RouterError> {
            let instance = Reflect::construct(&class, &Array::new())?;
            let element: web_sys::Element = instance.dyn_into().map_err(|_| {
                RouterError::Dom(format!("constructor of '{tag}' did not return an element"))
            })?;
            document.wrap(element)
        }))
    }

    async fn when_defined(&self, tag_name: &str) -> Result<(), RouterError> {
        let promise = self.registry.when_defined(&tag_name.to_lowercase())?;
        tracing::debug!("Waiting for custom element '{tag_name}' to be defined");
        JsFuture::from(promise).await?;
        Ok(())
    }
}

impl fmt::Debug for WebDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDocument")
            .field("routing", &self.routing.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct WebElement {
    element: web_sys::Element,
    document: Rc<WebDocument>,
}

impl WebElement {
    pub fn raw(&self) -> &web_sys::Element {
        &self.element
    }

    fn downcast(element: &ElementRef) -> Result<&WebElement, RouterError> {
        element.as_any().downcast_ref::<WebElement>().ok_or_else(|| {
            RouterError::Dom(format!(
                "element '{}' does not belong to the browser document",
                element.tag_name()
            ))
        })
    }

    fn wrap(&self, element: web_sys::Element) -> ElementRef {
        Rc::new(WebElement {
            element,
            document: self.document.clone(),
        })
    }
}

impl Element for WebElement {
    fn tag_name(&self) -> String {
        self.element.tag_name().to_lowercase()
    }

    fn get_attribute(&self, name: &str) -> Option<String> {
        self.element.get_attribute(name)
    }

    fn set_attribute(&self, name: &str, value: &str) -> Result<(), RouterError> {
        Ok(self.element.set_attribute(name, value)?)
    }

    fn remove_attribute(&self, name: &str) -> Result<(), RouterError> {
        Ok(self.element.remove_attribute(name)?)
    }

    fn parent(&self) -> Option<ElementRef> {
        self.element.parent_element().map(|parent| self.wrap(parent))
    }

    fn children(&self) -> Vec<ElementRef> {
        let children = self.element.children();
        (0..children.length())
            .filter_map(|idx| children.item(idx))
            .map(|child| self.wrap(child))
            .collect()
    }

    fn append_child(&self, child: &ElementRef) -> Result<(), RouterError> {
        let child = WebElement::downcast(child)?;
        self.element.append_child(&child.element)?;
        Ok(())
    }

    fn remove_child(&self, child: &ElementRef) -> Result<(), RouterError> {
        let child = WebElement::downcast(child)?;
        self.element.remove_child(&child.element)?;
        Ok(())
    }

    fn query_selector(&self, tag_name: &str) -> Option<ElementRef> {
        match self.element.query_selector(tag_name) {
            Ok(found) => found.map(|element| self.wrap(element)),
            Err(err) => {
                tracing::warn!("Invalid selector '{tag_name}': {err:?}");
                None
            }
        }
    }

    fn is_same_node(&self, other: &dyn Element) -> bool {
        other
            .as_any()
            .downcast_ref::<WebElement>()
            .is_some_and(|other| self.element.is_same_node(Some(other.element.as_ref())))
    }

    fn owner_document(&self) -> Rc<dyn Document> {
        self.document.clone()
    }

    fn routing(&self) -> Option<Rc<dyn RoutingCapable>> {
        self.document.routing_for(&self.element.tag_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for WebElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebElement")
            .field("tag_name", &self.element.tag_name())
            .finish()
    }
}
