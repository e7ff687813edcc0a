//! WASM bindings for element-router
//!
//! The router itself is used from Rust code compiled to WASM (see [`crate::dom::web`]). This
//! module exposes the pieces that are useful to call directly from JavaScript:
//!
//! ```javascript,ignore
//! import init, { initLogging, routeUrl, RouteTreeWasm } from './element_router.js';
//!
//! await init();
//! initLogging();
//!
//! routeUrl('/users/:userId([0-9]+)', '{"userId": "42", "tab": "profile"}');
//! // "/users/42?tab=profile"
//!
//! const tree = RouteTreeWasm.fromJson(await (await fetch('routes.json')).text());
//! tree.routeIds();   // ["app", "app-user", ...]
//! ```

use wasm_bindgen::prelude::*;
use web_sys::console;

use crate::{
    config::RouteConfig,
    router::Router,
    tree::{RouteNode, Traversal},
};

/// Route `tracing` output to the browser console.
#[wasm_bindgen(js_name = initLogging)]
pub fn init_wasm_logging() {
    tracing_wasm::set_as_global_default();
}

/// [`Router::url`] for JavaScript callers. `params_json` is a JSON object of param values;
/// params without a placeholder are appended in key order.
#[wasm_bindgen(js_name = routeUrl)]
pub fn route_url(path: &str, params_json: &str) -> Result<String, JsValue> {
    let params: serde_json::Map<String, serde_json::Value> = if params_json.trim().is_empty() {
        serde_json::Map::new()
    } else {
        serde_json::from_str(params_json).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    let params = params.into_iter().map(|(key, val)| match val {
        serde_json::Value::String(s) => (key, s),
        other => (key, other.to_string()),
    });
    Router::url(path, params).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// A validated route tree.
#[wasm_bindgen]
pub struct RouteTreeWasm {
    root: RouteNode,
}

#[wasm_bindgen]
impl RouteTreeWasm {
    #[wasm_bindgen(js_name = fromJson)]
    pub fn from_json(config_json: &str) -> Result<RouteTreeWasm, JsValue> {
        let root = RouteConfig::from_json_str(config_json)
            .and_then(|config| Router::build_route_tree(&config))
            .map_err(|e| {
                let msg = format!("Failed to build route tree: {e}");
                console::error_1(&msg.clone().into());
                JsValue::from_str(&msg)
            })?;
        Ok(RouteTreeWasm { root })
    }

    /// Route ids in depth-first order.
    #[wasm_bindgen(js_name = routeIds)]
    pub fn route_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.root.traverse(&mut |node| {
            ids.push(node.key().to_string());
            Traversal::Continue
        });
        ids
    }

    #[wasm_bindgen(js_name = requiresAuthentication)]
    pub fn requires_authentication(&self, route_id: &str) -> Option<bool> {
        self.root
            .node_by_key(route_id)
            .map(|node| node.requires_authentication())
    }
}
