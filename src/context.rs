//! The per-navigation [`Context`] handed to every dispatch callback and routing hook.

use percent_encoding::percent_decode_str;
use std::{
    cell::{Cell, Ref, RefCell},
    collections::BTreeMap,
    rc::Weak,
};

use crate::{dispatch::Dispatcher, error::RouterError};

/// Remove URL encoding, accepting both `+` and `%20` for spaces.
pub fn decode_component(val: &str) -> String {
    let spaced = val.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// Parse a raw querystring into decoded key/value pairs. Later duplicates win.
pub fn parse_query(querystring: &str) -> BTreeMap<String, String> {
    querystring
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_component(k), decode_component(v)),
            None => (decode_component(pair), String::new()),
        })
        .collect()
}

pub struct Context {
    canonical_path: String,
    path: String,
    pathname: String,
    querystring: String,
    hash: String,
    query: BTreeMap<String, String>,
    params: RefCell<BTreeMap<String, Option<String>>>,
    state: RefCell<serde_json::Value>,
    route_path: RefCell<Option<String>>,
    handled: Cell<bool>,
    init: Cell<bool>,
    popped: Cell<bool>,
    dispatcher: Option<Weak<dyn Dispatcher>>,
}

impl Context {
    /// A detached context for `path`, with no base path and no owning dispatcher.
    pub fn new(path: &str) -> Context {
        Context::build(path, serde_json::Value::Null, "", None)
    }

    /// A context owned by `dispatcher`. Absolute paths are prefixed with `base`.
    pub fn for_dispatch(
        path: &str,
        state: serde_json::Value,
        base: &str,
        dispatcher: Weak<dyn Dispatcher>,
    ) -> Context {
        Context::build(path, state, base, Some(dispatcher))
    }

    fn build(
        path: &str,
        state: serde_json::Value,
        base: &str,
        dispatcher: Option<Weak<dyn Dispatcher>>,
    ) -> Context {
        let canonical_path = if path.starts_with('/') && !path.starts_with(base) {
            format!("{base}{path}")
        } else {
            path.to_string()
        };

        let mut local_path = canonical_path
            .strip_prefix(base)
            .unwrap_or(&canonical_path)
            .to_string();
        if local_path.is_empty() {
            local_path = "/".to_string();
        }

        let (raw_pathname, raw_query) = match canonical_path.split_once('?') {
            Some((p, q)) => (p, q),
            None => (canonical_path.as_str(), ""),
        };
        let mut pathname = decode_component(raw_pathname);
        let mut querystring = decode_component(raw_query);
        let mut query_source = raw_query.to_string();
        let mut hash = String::new();

        if let Some((before, after)) = local_path.split_once('#') {
            let before = before.to_string();
            hash = decode_component(after);
            if let Some((q, _)) = querystring.split_once('#') {
                querystring = q.to_string();
            }
            if let Some((q, _)) = query_source.split_once('#') {
                query_source = q.to_string();
            }
            pathname = decode_component(before.split('?').next().unwrap_or_default());
            local_path = before;
        }

        let mut state = state;
        if let serde_json::Value::Object(map) = &mut state {
            map.insert(
                "path".to_string(),
                serde_json::Value::String(canonical_path.clone()),
            );
        }

        Context {
            query: parse_query(&query_source),
            canonical_path,
            path: local_path,
            pathname,
            querystring,
            hash,
            params: RefCell::new(BTreeMap::new()),
            state: RefCell::new(state),
            route_path: RefCell::new(None),
            handled: Cell::new(false),
            init: Cell::new(false),
            popped: Cell::new(false),
            dispatcher,
        }
    }

    /// Path relative to the dispatcher base, including the querystring.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn canonical_path(&self) -> &str {
        &self.canonical_path
    }

    pub fn pathname(&self) -> &str {
        &self.pathname
    }

    pub fn querystring(&self) -> &str {
        &self.querystring
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    /// Decoded path parameters of the route currently being dispatched. A `None` value
    /// means the parameter exists in the pattern but matched nothing.
    pub fn params(&self) -> Ref<'_, BTreeMap<String, Option<String>>> {
        self.params.borrow()
    }

    /// `None` if the parameter is absent, `Some(None)` if it is present without a value.
    pub fn param(&self, name: &str) -> Option<Option<String>> {
        self.params.borrow().get(name).cloned()
    }

    pub fn set_param(&self, name: &str, value: Option<String>) {
        self.params.borrow_mut().insert(name.to_string(), value);
    }

    pub fn state(&self) -> Ref<'_, serde_json::Value> {
        self.state.borrow()
    }

    pub fn set_state(&self, state: serde_json::Value) {
        *self.state.borrow_mut() = state;
    }

    /// Pattern of the route that matched this context, if any.
    pub fn route_path(&self) -> Option<String> {
        self.route_path.borrow().clone()
    }

    pub fn set_route_path(&self, pattern: &str) {
        *self.route_path.borrow_mut() = Some(pattern.to_string());
    }

    pub fn handled(&self) -> bool {
        self.handled.get()
    }

    pub fn mark_handled(&self) {
        self.handled.set(true);
    }

    /// Once handled, a context stays handled; resetting is ignored.
    pub fn set_handled(&self, handled: bool) {
        if handled {
            self.handled.set(true);
        } else if self.handled.get() {
            tracing::debug!(
                "Ignoring attempt to reset handled flag on context for '{}'",
                self.path
            );
        }
    }

    pub fn is_init(&self) -> bool {
        self.init.get()
    }

    pub fn set_init(&self, init: bool) {
        self.init.set(init);
    }

    /// True when this navigation restores a history entry (back/forward).
    pub fn is_popped(&self) -> bool {
        self.popped.get()
    }

    pub fn set_popped(&self, popped: bool) {
        self.popped.set(popped);
    }

    pub fn dispatcher(&self) -> Option<std::rc::Rc<dyn Dispatcher>> {
        self.dispatcher.as_ref().and_then(Weak::upgrade)
    }

    /// Replace the current history entry with this context.
    pub fn save(&self) -> Result<(), RouterError> {
        match self.dispatcher() {
            Some(dispatcher) => {
                dispatcher.save(self);
                Ok(())
            }
            None => Err(RouterError::Dispatch(format!(
                "context for '{}' has no dispatcher",
                self.path
            ))),
        }
    }

    /// Push this context as a new history entry.
    pub fn push_state(&self) -> Result<(), RouterError> {
        match self.dispatcher() {
            Some(dispatcher) => {
                dispatcher.push(self);
                Ok(())
            }
            None => Err(RouterError::Dispatch(format!(
                "context for '{}' has no dispatcher",
                self.path
            ))),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("path", &self.path)
            .field("canonical_path", &self.canonical_path)
            .field("query", &self.query)
            .field("params", &self.params.borrow())
            .field("handled", &self.handled.get())
            .finish()
    }
}
