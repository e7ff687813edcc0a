//! The [`Router`]: owns the route tree, registers every routable node with a
//! [`Dispatcher`], and serializes activations.

use futures::lock::Mutex;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::{Captures, Regex};
use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
    future::Future,
    rc::{Rc, Weak},
};

use crate::{
    config::{RouteConfig, RouterOptions},
    context::Context,
    dispatch::{route_callback, Dispatcher, Next, RouteCallback},
    dom::ElementRef,
    error::RouterError,
    reconciler::ElementReconciler,
    record::RouteRecord,
    routing::RoutingCapable,
    tree::{RouteNode, Traversal},
};

/// Characters `encodeURIComponent` leaves untouched.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

const UNFILLED_OPTIONAL_PARAM: &str = r":[a-zA-Z]+(\([^)]*\))?\?(/|$)";

fn encode_uri_component(val: &str) -> String {
    utf8_percent_encode(val, URI_COMPONENT).to_string()
}

/// Handle returned when registering a route change observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallbackId(u64);

pub type RouteChangeStartCallback = Rc<dyn Fn() -> Result<(), RouterError>>;
pub type RouteChangeCompleteCallback = Rc<dyn Fn(Option<&RouterError>) -> Result<(), RouterError>>;

struct RouterInner {
    dispatcher: Rc<dyn Dispatcher>,
    options: RouterOptions,
    reconciler: Rc<ElementReconciler>,
    route_tree: RefCell<Option<RouteNode>>,
    current_node_id: RefCell<Option<String>>,
    prev_node_id: RefCell<Option<String>>,
    start_callbacks: RefCell<Vec<(CallbackId, RouteChangeStartCallback)>>,
    complete_callbacks: RefCell<Vec<(CallbackId, RouteChangeCompleteCallback)>>,
    next_callback_id: Cell<u64>,
    activation_lock: Mutex<()>,
    /// Set while an activation future is being polled.
    in_activation: Cell<bool>,
    /// Route changes dispatched from inside a routing hook.
    deferred: RefCell<VecDeque<(RouteNode, Rc<Context>)>>,
    next_state_was_popped: Cell<bool>,
}

/// Cheaply clonable handle to a router. Clones share the same route tree, dispatcher and
/// observers.
#[derive(Clone)]
pub struct Router(Rc<RouterInner>);

impl Router {
    /// A router without a route tree; install one with [`Router::set_route_tree`].
    pub fn new(dispatcher: Rc<dyn Dispatcher>, options: RouterOptions) -> Router {
        Router(Rc::new(RouterInner {
            dispatcher,
            options,
            reconciler: Rc::new(ElementReconciler::new(options.reconciler)),
            route_tree: RefCell::new(None),
            current_node_id: RefCell::new(None),
            prev_node_id: RefCell::new(None),
            start_callbacks: RefCell::new(Vec::new()),
            complete_callbacks: RefCell::new(Vec::new()),
            next_callback_id: Cell::new(0),
            activation_lock: Mutex::new(()),
            in_activation: Cell::new(false),
            deferred: RefCell::new(VecDeque::new()),
            next_state_was_popped: Cell::new(false),
        }))
    }

    pub fn with_routes(
        config: &RouteConfig,
        dispatcher: Rc<dyn Dispatcher>,
        options: RouterOptions,
    ) -> Result<Router, RouterError> {
        let router = Router::new(dispatcher, options);
        router.set_route_tree(Some(Router::build_route_tree(config)?));
        Ok(router)
    }

    /// Build a route tree from `config`. Routes default to requiring authentication.
    pub fn build_route_tree(config: &RouteConfig) -> Result<RouteNode, RouterError> {
        let mut seen = BTreeSet::new();
        build_node(config, &mut seen)
    }

    pub fn route_tree(&self) -> Option<RouteNode> {
        self.0.route_tree.borrow().clone()
    }

    pub fn set_route_tree(&self, root: Option<RouteNode>) {
        *self.0.route_tree.borrow_mut() = root;
    }

    pub fn dispatcher(&self) -> Rc<dyn Dispatcher> {
        self.0.dispatcher.clone()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.0.options
    }

    /// The default routing hooks, configured with this router's reconciler options. Custom
    /// elements delegate to it for `routeEnter` / `routeExit`.
    pub fn reconciler(&self) -> Rc<dyn RoutingCapable> {
        self.0.reconciler.clone()
    }

    /// Bind the element the root route renders into.
    pub fn set_root_element(&self, element: ElementRef) -> Result<(), RouterError> {
        let root = self
            .route_tree()
            .ok_or_else(|| RouterError::NotFound("router has no route tree".to_string()))?;
        root.set_element(Some(element));
        Ok(())
    }

    pub fn current_node_id(&self) -> Option<String> {
        self.0.current_node_id.borrow().clone()
    }

    pub fn prev_node_id(&self) -> Option<String> {
        self.0.prev_node_id.borrow().clone()
    }

    /// Register every route with a non-empty path and dispatch the current location.
    pub async fn start(&self) -> Result<(), RouterError> {
        self.register_routes()?;
        self.0.dispatcher.start().await
    }

    fn register_routes(&self) -> Result<(), RouterError> {
        let root = self
            .route_tree()
            .ok_or_else(|| RouterError::NotFound("router has no route tree".to_string()))?;
        let mut routable = Vec::new();
        root.traverse(&mut |node| {
            // Abstract routes only wrap sub-routes.
            if !node.value().is_abstract() {
                routable.push(node.clone());
            }
            Traversal::Continue
        });

        for node in routable {
            let path = node.value().path.clone();
            tracing::debug!("Registering route '{}' at '{path}'", node.key());
            self.0
                .dispatcher
                .register(&path, self.route_change_callback(node))?;
        }
        Ok(())
    }

    fn route_change_callback(&self, node: RouteNode) -> RouteCallback {
        let router: Weak<RouterInner> = Rc::downgrade(&self.0);
        route_callback(move |ctx, next| {
            let router = router.upgrade().map(Router);
            let node = node.clone();
            async move {
                match router {
                    Some(router) => router.route_change(node, ctx, next).await,
                    None => {
                        tracing::warn!("Router dropped; skipping activation of '{}'", node.key());
                        next();
                    }
                }
            }
        })
    }

    /// Activations run one at a time under the activation lock. A route change dispatched
    /// by a routing hook (a guard redirecting elsewhere) cannot wait for that lock, since the
    /// hook holds it; it is queued instead and activated once the current activation ends.
    async fn route_change(&self, node: RouteNode, ctx: Rc<Context>, next: Next) {
        if self.0.in_activation.get() {
            tracing::info!(
                "Route change to '{}' ({}) requested during an activation; deferring it",
                node.key(),
                ctx.path()
            );
            ctx.mark_handled();
            self.0.deferred.borrow_mut().push_back((node, ctx));
            next();
            return;
        }

        if ctx.is_popped() {
            self.0.next_state_was_popped.set(true);
        }
        self.notify_route_change_start();
        let _activation = self.0.activation_lock.lock().await;
        let result = self.activate(&node, &ctx).await;
        next();
        self.0.next_state_was_popped.set(false);
        self.notify_route_change_complete(result.err().as_ref());

        while let Some((node, ctx)) = self.pop_deferred() {
            self.notify_route_change_start();
            self.0.next_state_was_popped.set(ctx.is_popped());
            let result = self.activate(&node, &ctx).await;
            self.0.next_state_was_popped.set(false);
            self.notify_route_change_complete(result.err().as_ref());
        }
    }

    fn pop_deferred(&self) -> Option<(RouteNode, Rc<Context>)> {
        self.0.deferred.borrow_mut().pop_front()
    }

    async fn activate(&self, node: &RouteNode, ctx: &Context) -> Result<(), RouterError> {
        let previous = self
            .0
            .current_node_id
            .replace(Some(node.key().to_string()));
        *self.0.prev_node_id.borrow_mut() = previous.clone();
        tracing::info!("Route change {previous:?} -> '{}' ({})", node.key(), ctx.path());

        let activation = node.activate(previous.as_deref(), ctx);
        futures::pin_mut!(activation);
        let in_activation = &self.0.in_activation;
        let result = futures::future::poll_fn(|cx| {
            let outer = in_activation.replace(true);
            let poll = activation.as_mut().poll(cx);
            in_activation.set(outer);
            poll
        })
        .await;

        if let Err(err) = &result {
            tracing::warn!("Activation of '{}' failed: {err}", node.key());
        }
        result
    }

    /// Whether the route change in progress restores a history entry. Reset once the
    /// route change completes.
    pub fn next_state_was_popped(&self) -> bool {
        self.0.next_state_was_popped.get()
    }

    /// Flag the next route change as a history pop, for dispatchers that learn about
    /// back/forward navigation out of band (a `popstate` listener).
    pub fn mark_state_popped(&self) {
        self.0.next_state_was_popped.set(true);
    }

    /// Navigate to `path` after filling in `params` (see [`Router::url`]).
    pub async fn go<I, K, V>(&self, path: &str, params: I) -> Result<Rc<Context>, RouterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: fmt::Display,
    {
        let url = Router::url(path, params)?;
        self.0.dispatcher.show(&url, None, true, true).await
    }

    /// Like [`Router::go`], but replaces the current history entry.
    pub async fn redirect<I, K, V>(&self, path: &str, params: I) -> Result<Rc<Context>, RouterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: fmt::Display,
    {
        let url = Router::url(path, params)?;
        self.0.dispatcher.replace(&url, None, true).await
    }

    /// Fill the `:name` placeholders of a route pattern.
    ///
    /// Each param replaces the first placeholder of the same name, keeping the separator that
    /// followed it; params without a placeholder are appended as query parameters in the
    /// given order. Optional placeholders left without a value are removed with their
    /// trailing slash.
    ///
    /// ```
    /// use element_router::router::Router;
    ///
    /// let url = Router::url("/pay/:mode(bill|person)?/:id([0-9]+)?", [("mode", "bill")]).unwrap();
    /// assert_eq!(url, "/pay/bill/");
    /// ```
    pub fn url<I, K, V>(path: &str, params: I) -> Result<String, RouterError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: fmt::Display,
    {
        let mut url = path.to_string();
        for (key, val) in params {
            let key = key.as_ref();
            let val = val.to_string();
            let placeholder = Regex::new(&format!(
                r":{}(\([^)]*\))?\??(/|$)",
                regex::escape(key)
            ))?;
            if placeholder.is_match(&url) {
                url = placeholder
                    .replacen(&url, 1, |caps: &Captures| format!("{val}{}", &caps[2]))
                    .into_owned();
            } else {
                let delimiter = if url.contains('?') { '&' } else { '?' };
                url.push(delimiter);
                url.push_str(&encode_uri_component(key));
                url.push('=');
                url.push_str(&encode_uri_component(&val));
            }
        }

        let unfilled = Regex::new(UNFILLED_OPTIONAL_PARAM)?;
        Ok(unfilled.replace_all(&url, "").into_owned())
    }

    /// `ctx.path()` with every segment equal to a param value replaced by the param name.
    pub fn route_url_without_params(ctx: &Context) -> String {
        let names: BTreeMap<String, String> = ctx
            .params()
            .iter()
            .filter_map(|(name, value)| value.clone().map(|value| (value, name.clone())))
            .collect();
        ctx.path()
            .split('/')
            .map(|segment| names.get(segment).map(String::as_str).unwrap_or(segment))
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Register an additional entry callback with the dispatcher.
    pub fn add_route_handler(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError> {
        self.0.dispatcher.register(pattern, callback)
    }

    pub fn add_exit_handler(&self, pattern: &str, callback: RouteCallback) -> Result<(), RouterError> {
        self.0.dispatcher.exit(pattern, callback)
    }

    /// Exit callback invoked on every route change.
    pub fn add_global_exit_handler(&self, callback: RouteCallback) -> Result<(), RouterError> {
        self.0.dispatcher.exit("*", callback)
    }

    fn next_callback_id(&self) -> CallbackId {
        let id = self.0.next_callback_id.get();
        self.0.next_callback_id.set(id + 1);
        CallbackId(id)
    }

    pub fn add_route_change_start_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn() -> Result<(), RouterError> + 'static,
    {
        let id = self.next_callback_id();
        self.0
            .start_callbacks
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    /// Returns whether a callback was registered under `id`.
    pub fn remove_route_change_start_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.0.start_callbacks.borrow_mut();
        let len = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        callbacks.len() != len
    }

    /// `callback` receives the activation error, if any.
    pub fn add_route_change_complete_callback<F>(&self, callback: F) -> CallbackId
    where
        F: Fn(Option<&RouterError>) -> Result<(), RouterError> + 'static,
    {
        let id = self.next_callback_id();
        self.0
            .complete_callbacks
            .borrow_mut()
            .push((id, Rc::new(callback)));
        id
    }

    pub fn remove_route_change_complete_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.0.complete_callbacks.borrow_mut();
        let len = callbacks.len();
        callbacks.retain(|(cb_id, _)| *cb_id != id);
        callbacks.len() != len
    }

    fn notify_route_change_start(&self) {
        let callbacks: Vec<RouteChangeStartCallback> = self
            .0
            .start_callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            if let Err(err) = callback() {
                tracing::warn!("Route change start callback failed: {err}");
            }
        }
    }

    fn notify_route_change_complete(&self, error: Option<&RouterError>) {
        let callbacks: Vec<RouteChangeCompleteCallback> = self
            .0
            .complete_callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            if let Err(err) = callback(error) {
                tracing::warn!("Route change complete callback failed: {err}");
            }
        }
    }
}

fn build_node(config: &RouteConfig, seen: &mut BTreeSet<String>) -> Result<RouteNode, RouterError> {
    if !seen.insert(config.id.clone()) {
        return Err(RouterError::DuplicateRoute(config.id.clone()));
    }
    let mut record = RouteRecord::new(&config.id, &config.tag_name, &config.path, &config.params)
        .with_authentication(config.authenticated.unwrap_or(true))
        .with_meta_data(config.meta_data.clone());
    if let Some(hook) = &config.before_enter {
        record = record.with_before_enter(hook.clone());
    }
    let node = RouteNode::new(record);
    for route in config.sub_routes.iter() {
        node.add_child(build_node(route, seen)?)?;
    }
    Ok(node)
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("route_tree", &self.0.route_tree.borrow())
            .field("current_node_id", &self.0.current_node_id.borrow())
            .field("prev_node_id", &self.0.prev_node_id.borrow())
            .field("start_callbacks", &self.0.start_callbacks.borrow().len())
            .field("complete_callbacks", &self.0.complete_callbacks.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dispatch::MemoryDispatcher, record::BeforeEnterHook};
    use test_log::test;

    const NO_PARAMS: [(&str, &str); 0] = [];

    fn app_config() -> RouteConfig {
        RouteConfig::new("app", "APP-MAIN", "")
            .with_sub_route(
                RouteConfig::new("app-user", "APP-USER-PAGE", "/users/:userId([0-9]{1,6})")
                    .with_params(["userId"])
                    .with_before_enter(BeforeEnterHook::new(|| async { Ok(()) })),
            )
            .with_sub_route(
                RouteConfig::new(
                    "app-user-account",
                    "APP-ACCOUNT-PAGE",
                    "/users/:userId([0-9]{1,6})/accounts/:accountId([0-9]{1,6})",
                )
                .with_params(["userId", "accountId"]),
            )
            .with_sub_route(
                RouteConfig::new("app-about", "APP-ABOUT", "/about").with_authenticated(false),
            )
    }

    #[test]
    fn url_without_params_is_the_path() {
        assert_eq!(Router::url("/A", NO_PARAMS).unwrap(), "/A");
    }

    #[test]
    fn url_replaces_path_params_in_any_order() {
        let pattern = "/account/:accountId([-a-fA-F0-9]{36})/documents/:docId";
        assert_eq!(
            Router::url(pattern, [("accountId", "1234"), ("docId", "6789")]).unwrap(),
            "/account/1234/documents/6789"
        );
        assert_eq!(
            Router::url(pattern, [("docId", "6789"), ("accountId", "1234")]).unwrap(),
            "/account/1234/documents/6789"
        );
        assert_eq!(
            Router::url(
                "/account/:accountId([-a-fA-F0-9]{36})?/documents/:docId?",
                [("accountId", "2345"), ("docId", "7890")]
            )
            .unwrap(),
            "/account/2345/documents/7890"
        );
    }

    #[test]
    fn url_keeps_trailing_slashes() {
        assert_eq!(
            Router::url("/account/:accountId/", [("accountId", "1234")]).unwrap(),
            "/account/1234/"
        );
        assert_eq!(
            Router::url("/account/:accountId([-a-fA-F0-9]{36})/", [("accountId", "1234")])
                .unwrap(),
            "/account/1234/"
        );
    }

    #[test]
    fn url_appends_unknown_params_as_encoded_query() {
        let url = Router::url(
            "/B/:bData",
            [("bData", "bdata"), ("foo", "1"), ("bar[]", "ABC & abc & 123")],
        )
        .unwrap();
        assert_eq!(url, "/B/bdata?foo=1&bar%5B%5D=ABC%20%26%20abc%20%26%20123");

        assert_eq!(
            Router::url("/search", [("q", 42)]).unwrap(),
            "/search?q=42"
        );
        assert_eq!(
            Router::url("/search", [("q", "it's (fine)!")]).unwrap(),
            "/search?q=it's%20(fine)!"
        );
    }

    #[test]
    fn url_removes_unfilled_optional_params() {
        assert_eq!(
            Router::url("/account/:accountId([0-9]+)?", NO_PARAMS).unwrap(),
            "/account/"
        );
        assert_eq!(
            Router::url(
                "/pay/:mode(bill|person|edit)?/:billOrPaymentId([-a-fA-F0-9]{36})?",
                [("mode", "bill")]
            )
            .unwrap(),
            "/pay/bill/"
        );
        assert_eq!(
            Router::url(
                "/account/:fromAccountId([0-9]+)?/:toAccountId([0-9]+)?/",
                NO_PARAMS
            )
            .unwrap(),
            "/account/"
        );
        // Required placeholders without a value stay in place.
        assert_eq!(
            Router::url("/users/:userId", NO_PARAMS).unwrap(),
            "/users/:userId"
        );
    }

    #[test]
    fn build_route_tree_copies_the_configuration() {
        let tree = Router::build_route_tree(&app_config()).unwrap();
        assert_eq!(tree.key(), "app");
        assert!(tree.requires_authentication());

        let routes = tree.children();
        assert_eq!(routes.len(), 3);
        let account = routes[1].value();
        assert_eq!(account.tag_name, "APP-ACCOUNT-PAGE");
        assert_eq!(
            account.attributes.keys().collect::<Vec<_>>(),
            vec!["accountId", "userId"]
        );
        assert_eq!(account.attributes["userId"], "user-id");
        assert!(routes[0].value().before_enter.is_some());
        assert!(routes[1].value().before_enter.is_none());
        assert!(routes[0].value().requires_authentication);
        assert!(!routes[2].value().requires_authentication);
    }

    #[test]
    fn duplicate_route_ids_are_rejected() {
        let config = RouteConfig::new("app", "APP-MAIN", "")
            .with_sub_route(RouteConfig::new("page", "APP-PAGE", "/a"))
            .with_sub_route(
                RouteConfig::new("other", "APP-OTHER", "/b")
                    .with_sub_route(RouteConfig::new("page", "APP-PAGE", "/b/c")),
            );
        assert_eq!(
            Router::build_route_tree(&config).unwrap_err(),
            RouterError::DuplicateRoute("page".to_string())
        );
    }

    #[test]
    fn route_url_without_params_names_the_segments() {
        let ctx = Context::new("/users/123/accounts/456");
        ctx.set_param("userId", Some("123".to_string()));
        ctx.set_param("accountId", Some("456".to_string()));
        ctx.set_param("tab", None);
        assert_eq!(
            Router::route_url_without_params(&ctx),
            "/users/userId/accounts/accountId"
        );
    }

    #[test]
    fn observers_can_be_removed_and_errors_do_not_stop_the_others() {
        let router = Router::new(MemoryDispatcher::new("/"), RouterOptions::default());
        let calls = Rc::new(RefCell::new(Vec::new()));

        let log = calls.clone();
        let failing = router.add_route_change_start_callback(move || {
            log.borrow_mut().push("failing");
            Err(RouterError::Hook("observer failed".to_string()))
        });
        let log = calls.clone();
        let counting = router.add_route_change_start_callback(move || {
            log.borrow_mut().push("counting");
            Ok(())
        });
        assert_ne!(failing, counting);

        router.notify_route_change_start();
        assert_eq!(*calls.borrow(), vec!["failing", "counting"]);

        assert!(router.remove_route_change_start_callback(failing));
        assert!(!router.remove_route_change_start_callback(failing));
        router.notify_route_change_start();
        assert_eq!(*calls.borrow(), vec!["failing", "counting", "counting"]);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = seen.clone();
        let complete = router.add_route_change_complete_callback(move |err| {
            log.borrow_mut().push(err.cloned());
            Ok(())
        });
        router.notify_route_change_complete(None);
        router.notify_route_change_complete(Some(&RouterError::Unmounted("A".to_string())));
        assert_eq!(
            *seen.borrow(),
            vec![None, Some(RouterError::Unmounted("A".to_string()))]
        );
        assert!(router.remove_route_change_complete_callback(complete));
    }

    #[test(tokio::test)]
    async fn start_without_a_route_tree_fails() {
        let router = Router::new(MemoryDispatcher::new("/"), RouterOptions::default());
        assert!(router.route_tree().is_none());
        assert!(matches!(
            router.start().await,
            Err(RouterError::NotFound(_))
        ));
    }
}
