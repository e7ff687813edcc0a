use async_trait::async_trait;
use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use super::{Dispatcher, Next, PathPattern, RouteCallback};
use crate::{context::Context, error::RouterError};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub path: String,
    pub state: serde_json::Value,
}

#[derive(Clone)]
struct Registration {
    pattern: PathPattern,
    callback: RouteCallback,
}

/// An in-memory history engine.
///
/// Entry callbacks run in registration order against every navigation. A callback whose
/// pattern does not match is skipped; a matching callback must call its `next` before its
/// future completes for dispatch to continue. Exit callbacks run the same way against the
/// previous context before the entry callbacks of a new navigation.
pub struct MemoryDispatcher {
    self_ref: Weak<MemoryDispatcher>,
    base: String,
    initial_path: String,
    callbacks: RefCell<Vec<Registration>>,
    exits: RefCell<Vec<Registration>>,
    history: RefCell<Vec<HistoryEntry>>,
    current: RefCell<String>,
    prev_context: RefCell<Option<Rc<Context>>>,
    unhandled: RefCell<Vec<String>>,
}

impl MemoryDispatcher {
    pub fn new(initial_path: &str) -> Rc<MemoryDispatcher> {
        MemoryDispatcher::with_base(initial_path, "")
    }

    pub fn with_base(initial_path: &str, base: &str) -> Rc<MemoryDispatcher> {
        Rc::new_cyclic(|self_ref| MemoryDispatcher {
            self_ref: self_ref.clone(),
            base: base.to_string(),
            initial_path: initial_path.to_string(),
            callbacks: RefCell::new(Vec::new()),
            exits: RefCell::new(Vec::new()),
            history: RefCell::new(Vec::new()),
            current: RefCell::new(String::new()),
            prev_context: RefCell::new(None),
            unhandled: RefCell::new(Vec::new()),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Path of the navigation in progress or last completed.
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.borrow().clone()
    }

    /// Canonical paths of navigations no callback handled.
    pub fn unhandled(&self) -> Vec<String> {
        self.unhandled.borrow().clone()
    }

    /// Step back one history entry and dispatch it. Returns `None` when there is nothing to
    /// go back to.
    pub async fn back(&self) -> Result<Option<Rc<Context>>, RouterError> {
        let entry = {
            let mut history = self.history.borrow_mut();
            if history.len() < 2 {
                return Ok(None);
            }
            history.pop();
            history.last().cloned()
        };
        match entry {
            Some(entry) => {
                tracing::debug!("Popping history back to '{}'", entry.path);
                let ctx = self
                    .navigate_replace(&entry.path, Some(entry.state), false, true, true)
                    .await?;
                Ok(Some(ctx))
            }
            None => Ok(None),
        }
    }

    fn make_context(&self, path: &str, state: Option<serde_json::Value>) -> Rc<Context> {
        let dispatcher: Weak<dyn Dispatcher> = self.self_ref.clone();
        let state = state.unwrap_or_else(|| serde_json::Value::Object(serde_json::Map::new()));
        Rc::new(Context::for_dispatch(path, state, &self.base, dispatcher))
    }

    async fn navigate_replace(
        &self,
        path: &str,
        state: Option<serde_json::Value>,
        init: bool,
        dispatch: bool,
        popped: bool,
    ) -> Result<Rc<Context>, RouterError> {
        let ctx = self.make_context(path, state);
        ctx.set_popped(popped);
        let prev = self.prev_context.replace(Some(ctx.clone()));
        *self.current.borrow_mut() = ctx.path().to_string();
        ctx.set_init(init);
        // Saved before dispatching, which may redirect.
        self.save(&ctx);
        if dispatch {
            self.dispatch(ctx.clone(), prev).await;
        }
        Ok(ctx)
    }

    async fn dispatch(&self, ctx: Rc<Context>, prev: Option<Rc<Context>>) {
        if let Some(prev) = prev {
            let exits = self.exits.borrow().clone();
            for registration in exits.iter() {
                if !run_callback(registration, prev.clone()).await {
                    tracing::debug!("Exit chain halted at '{}'", registration.pattern.pattern());
                    break;
                }
            }
        }

        let callbacks = self.callbacks.borrow().clone();
        for registration in callbacks.iter() {
            if !run_callback(registration, ctx.clone()).await {
                tracing::debug!("Dispatch chain halted at '{}'", registration.pattern.pattern());
                break;
            }
        }

        if !ctx.handled() {
            tracing::warn!("Navigation to '{}' was not handled", ctx.canonical_path());
            self.unhandled
                .borrow_mut()
                .push(ctx.canonical_path().to_string());
        }
    }
}

/// Run `registration` against `ctx` if its pattern matches. Returns whether dispatch should
/// continue with the following callback.
async fn run_callback(registration: &Registration, ctx: Rc<Context>) -> bool {
    let Some(params) = registration.pattern.matches(ctx.path()) else {
        return true;
    };
    for (key, value) in params {
        let known = ctx.params().contains_key(&key);
        if value.is_some() || !known {
            ctx.set_param(&key, value);
        }
    }
    ctx.set_route_path(registration.pattern.pattern());

    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    let next: Next = Box::new(move || flag.set(true));
    (registration.callback)(ctx, next).await;
    called.get()
}

#[async_trait(?Send)]
impl Dispatcher for MemoryDispatcher {
    fn register(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError> {
        let pattern = PathPattern::new(pattern)?;
        self.callbacks
            .borrow_mut()
            .push(Registration { pattern, callback });
        Ok(())
    }

    fn exit(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError> {
        let pattern = PathPattern::new(pattern)?;
        self.exits.borrow_mut().push(Registration { pattern, callback });
        Ok(())
    }

    async fn show(
        &self,
        path: &str,
        state: Option<serde_json::Value>,
        dispatch: bool,
        push: bool,
    ) -> Result<Rc<Context>, RouterError> {
        let ctx = self.make_context(path, state);
        let prev = self.prev_context.replace(Some(ctx.clone()));
        *self.current.borrow_mut() = ctx.path().to_string();
        if dispatch {
            self.dispatch(ctx.clone(), prev).await;
        }
        if push && (!dispatch || ctx.handled()) {
            self.push(&ctx);
        }
        Ok(ctx)
    }

    async fn replace(
        &self,
        path: &str,
        state: Option<serde_json::Value>,
        dispatch: bool,
    ) -> Result<Rc<Context>, RouterError> {
        self.navigate_replace(path, state, false, dispatch, false).await
    }

    fn save(&self, ctx: &Context) {
        let entry = HistoryEntry {
            path: ctx.canonical_path().to_string(),
            state: ctx.state().clone(),
        };
        let mut history = self.history.borrow_mut();
        match history.last_mut() {
            Some(last) => *last = entry,
            None => history.push(entry),
        }
    }

    fn push(&self, ctx: &Context) {
        self.history.borrow_mut().push(HistoryEntry {
            path: ctx.canonical_path().to_string(),
            state: ctx.state().clone(),
        });
    }

    async fn start(&self) -> Result<(), RouterError> {
        let location = self
            .history
            .borrow()
            .last()
            .map(|entry| entry.path.clone())
            .unwrap_or_else(|| self.initial_path.clone());
        tracing::info!("Starting dispatch at '{location}'");
        self.navigate_replace(&location, None, true, true, false).await?;
        Ok(())
    }
}
