//! Default routing hooks: mount the element of the next route under the current route's
//! element, reusing an existing element when possible.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    context::Context,
    dom::{is_child_of, ElementRef},
    error::RouterError,
    record::RouteRecord,
    routing::{EnterOutcome, RoutingCapable},
    tree::RouteNode,
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerOptions {
    /// Total attempts for mounting an element when the DOM reports transient failures.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        ReconcilerOptions {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementReconciler {
    options: ReconcilerOptions,
}

impl ElementReconciler {
    pub fn new(options: ReconcilerOptions) -> Self {
        ElementReconciler { options }
    }

    pub fn options(&self) -> &ReconcilerOptions {
        &self.options
    }

    /// Construct a fresh element for `record`, waiting for custom element definitions (and
    /// running the record's `before_enter` hook) when the tag is not registered yet.
    async fn create_element(
        &self,
        record: &RouteRecord,
        current_element: &ElementRef,
    ) -> Result<ElementRef, RouterError> {
        let document = current_element.owner_document();
        let tag = record.tag_name.to_lowercase();
        if !record.is_custom_element() {
            tracing::debug!("Creating element '{tag}' for route '{}'", record.id);
            return document.create_element(&record.tag_name);
        }

        let constructor = match document.custom_element(&tag) {
            Some(constructor) => constructor,
            None => {
                tracing::debug!("'{tag}' is not defined yet; running before_enter for '{}'", record.id);
                record.before_enter().await?;
                document.when_defined(&tag).await?;
                document.custom_element(&tag).ok_or_else(|| {
                    RouterError::Dom(format!("custom element '{tag}' is still not defined"))
                })?
            }
        };
        tracing::debug!("Constructing custom element '{tag}' for route '{}'", record.id);
        constructor()
    }

    fn mount(
        &self,
        current_element: &ElementRef,
        next_node: &RouteNode,
        next_element: &ElementRef,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        let attributes = next_node.value().attributes.clone();
        {
            let params = ctx.params();
            for (param, attribute) in attributes.iter() {
                match params.get(param) {
                    Some(Some(value)) => next_element.set_attribute(attribute, value)?,
                    Some(None) => next_element.remove_attribute(attribute)?,
                    None => {}
                }
            }
        }

        if next_element.parent().is_none() {
            for child in current_element.children() {
                current_element.remove_child(&child)?;
            }
            current_element.append_child(next_element)?;
        }

        next_node.set_element(Some(next_element.clone()));
        Ok(())
    }

    async fn mount_with_retry(
        &self,
        current_element: &ElementRef,
        next_node: &RouteNode,
        next_element: &ElementRef,
        ctx: &Context,
    ) -> Result<(), RouterError> {
        let mut attempt = 1;
        loop {
            match self.mount(current_element, next_node, next_element, ctx) {
                Err(err) if err.is_transient() && attempt < self.options.max_attempts => {
                    tracing::warn!(
                        "Mounting '{}' failed on attempt {attempt}: {err}; retrying",
                        next_node.key()
                    );
                    attempt += 1;
                    tokio::task::yield_now().await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait(?Send)]
impl RoutingCapable for ElementReconciler {
    async fn route_enter(
        &self,
        current: &RouteNode,
        next: Option<&RouteNode>,
        _route_id: &str,
        ctx: &Context,
    ) -> Result<EnterOutcome, RouterError> {
        ctx.mark_handled();
        let Some(next_node) = next else {
            return Ok(EnterOutcome::Continue);
        };
        let current_element = current
            .element()
            .ok_or_else(|| RouterError::Unmounted(current.key().to_string()))?;

        let (reusable, next_record) = {
            let record = next_node.value();
            let reusable = record
                .element
                .clone()
                .or_else(|| current_element.query_selector(&record.tag_name));
            (reusable, record.clone())
        };

        let next_element = match reusable {
            Some(element) if is_child_of(&element, &current_element) => {
                tracing::debug!("Reusing element '{}' for route '{}'", element.tag_name(), next_record.id);
                element
            }
            _ => self.create_element(&next_record, &current_element).await?,
        };

        self.mount_with_retry(&current_element, next_node, &next_element, ctx)
            .await?;
        Ok(EnterOutcome::Continue)
    }

    async fn route_exit(
        &self,
        current: &RouteNode,
        _next: Option<&RouteNode>,
        _route_id: &str,
        _ctx: &Context,
    ) -> Result<(), RouterError> {
        if let Some(element) = current.element() {
            if let Some(parent) = element.parent() {
                tracing::debug!("Detaching element of route '{}'", current.key());
                parent.remove_child(&element)?;
            }
        }
        current.set_element(None);
        Ok(())
    }
}
