use regex::Error as RegexError;
use serde::{Deserialize, Serialize};
use serde_json::Error as JsonError;
use std::io;
use thiserror::Error;

#[cfg(feature = "wasm")]
use wasm_bindgen::JsValue;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum RouterError {
    #[error("Route node '{0}' has an existing parent")]
    ExistingParent(String),
    #[error("Index {index} out of bounds for {len} children")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("Attaching route node '{0}' would create a cycle")]
    Cycle(String),
    #[error("Duplicate route id '{0}'")]
    DuplicateRoute(String),
    #[error("Element '{tag_name}' does not implement {hook}")]
    MissingCapability { tag_name: String, hook: String },
    #[error("Route '{0}' has no mounted element")]
    Unmounted(String),
    #[error("DOM operation failed: {0}")]
    Dom(String),
    #[error("Transient DOM failure: {0}")]
    TransientDom(String),
    #[error("Navigation hook failed: {0}")]
    Hook(String),
    #[error("Dispatch error: {0}")]
    Dispatch(String),
    #[error("Item Not Found: {0}")]
    NotFound(String),
    #[error("(De)Serialization error: {0}")]
    Serialization(String),
}

impl RouterError {
    /// True for failures the reconciler may retry after yielding a tick.
    pub fn is_transient(&self) -> bool {
        matches!(self, RouterError::TransientDom(_))
    }

    /// True for violations of the route tree invariants.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RouterError::ExistingParent(_)
                | RouterError::IndexOutOfBounds { .. }
                | RouterError::Cycle(_)
                | RouterError::DuplicateRoute(_)
        )
    }
}

impl From<toml::de::Error> for RouterError {
    fn from(src: toml::de::Error) -> RouterError {
        RouterError::Serialization(format!("Toml deserialization error: {src}"))
    }
}

impl From<toml::ser::Error> for RouterError {
    fn from(src: toml::ser::Error) -> RouterError {
        RouterError::Serialization(format!("Toml serialization error: {src}"))
    }
}

impl From<JsonError> for RouterError {
    fn from(src: JsonError) -> RouterError {
        RouterError::Serialization(format!("JSON (de)serialization error: {src}"))
    }
}

impl From<RegexError> for RouterError {
    fn from(x: RegexError) -> Self {
        RouterError::Serialization(format!("Regex parse failed: {x}"))
    }
}

impl From<io::Error> for RouterError {
    fn from(x: io::Error) -> Self {
        match x.kind() {
            io::ErrorKind::NotFound => RouterError::NotFound(format!("{x}")),
            _ => RouterError::Serialization(format!("IOError: {}", x.kind())),
        }
    }
}

#[cfg(feature = "wasm")]
impl From<JsValue> for RouterError {
    fn from(js_error: JsValue) -> Self {
        RouterError::Dom(format!("{js_error:?}"))
    }
}
