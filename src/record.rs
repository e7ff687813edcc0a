//! Per-route metadata held by every [`RouteNode`](crate::tree::RouteNode).

use futures::future::LocalBoxFuture;
use std::{collections::BTreeMap, fmt, rc::Rc};

use crate::{dom::ElementRef, error::RouterError};

/// Asynchronous setup run before a route's custom element is constructed for the first
/// time, e.g. to load the code that defines the element.
#[derive(Clone)]
pub struct BeforeEnterHook(Rc<dyn Fn() -> LocalBoxFuture<'static, Result<(), RouterError>>>);

impl BeforeEnterHook {
    pub fn new<F, Fut>(hook: F) -> Self
    where
        F: Fn() -> Fut + 'static,
        Fut: std::future::Future<Output = Result<(), RouterError>> + 'static,
    {
        BeforeEnterHook(Rc::new(move || Box::pin(hook())))
    }

    pub async fn run(&self) -> Result<(), RouterError> {
        (self.0)().await
    }
}

impl fmt::Debug for BeforeEnterHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BeforeEnterHook")
    }
}

/// Convert a camelCase parameter name into its attribute form (`userId` -> `user-id`).
pub fn param_to_attribute(param: &str) -> String {
    let mut attribute = String::with_capacity(param.len() + 4);
    for c in param.chars() {
        if c.is_ascii_uppercase() {
            attribute.push('-');
            attribute.push(c.to_ascii_lowercase());
        } else {
            attribute.push(c);
        }
    }
    attribute
}

#[derive(Debug, Clone)]
pub struct RouteRecord {
    pub id: String,
    pub tag_name: String,
    pub path: String,
    /// camelCase parameter name -> hyphenated attribute name
    pub attributes: BTreeMap<String, String>,
    pub requires_authentication: bool,
    pub before_enter: Option<BeforeEnterHook>,
    pub meta_data: serde_json::Map<String, serde_json::Value>,
    /// Element currently representing this route. The record never owns the element's
    /// lifecycle; the exit step clears it.
    pub element: Option<ElementRef>,
}

impl RouteRecord {
    pub fn new<I, S>(id: &str, tag_name: &str, path: &str, params: I) -> RouteRecord
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let attributes = params
            .into_iter()
            .map(|p| (p.as_ref().to_string(), param_to_attribute(p.as_ref())))
            .collect();
        RouteRecord {
            id: id.to_string(),
            tag_name: tag_name.to_string(),
            path: path.to_string(),
            attributes,
            requires_authentication: true,
            before_enter: None,
            meta_data: serde_json::Map::new(),
            element: None,
        }
    }

    pub fn with_authentication(mut self, required: bool) -> Self {
        self.requires_authentication = required;
        self
    }

    pub fn with_before_enter(mut self, hook: BeforeEnterHook) -> Self {
        self.before_enter = Some(hook);
        self
    }

    pub fn with_meta_data(mut self, meta_data: serde_json::Map<String, serde_json::Value>) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Routes with an empty path only exist to wrap sub-routes.
    pub fn is_abstract(&self) -> bool {
        self.path.is_empty()
    }

    /// Custom element tags contain a hyphen after the first character.
    pub fn is_custom_element(&self) -> bool {
        self.tag_name.find('-').is_some_and(|idx| idx > 0)
    }

    pub async fn before_enter(&self) -> Result<(), RouterError> {
        match &self.before_enter {
            Some(hook) => hook.run().await,
            None => Ok(()),
        }
    }
}
