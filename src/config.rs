//! Route configuration (TOML or JSON) and router options.

use serde::{Deserialize, Serialize};
use std::{fs::read_to_string, path::Path};

use crate::{error::RouterError, reconciler::ReconcilerOptions, record::BeforeEnterHook};

/// Declarative description of a route and its sub-routes.
///
/// TOML and JSON documents use camelCase keys:
///
/// ```toml
/// id = "app"
/// tagName = "APP-MAIN"
/// path = ""
///
/// [[subRoutes]]
/// id = "app-user"
/// tagName = "APP-USER-PAGE"
/// path = "/users/:userId([0-9]{1,6})"
/// params = ["userId"]
/// ```
///
/// `before_enter` cannot be expressed in a document; attach it with
/// [`RouteConfig::with_before_enter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteConfig {
    pub id: String,
    pub tag_name: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    /// Defaults to `true` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_routes: Vec<RouteConfig>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub meta_data: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    pub before_enter: Option<BeforeEnterHook>,
}

impl RouteConfig {
    pub fn new(id: &str, tag_name: &str, path: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            tag_name: tag_name.to_string(),
            path: path.to_string(),
            params: Vec::new(),
            authenticated: None,
            sub_routes: Vec::new(),
            meta_data: serde_json::Map::new(),
            before_enter: None,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<RouteConfig, RouterError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json_str(content: &str) -> Result<RouteConfig, RouterError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Read a route configuration file. `.json` files are parsed as JSON, anything else as
    /// TOML.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<RouteConfig, RouterError> {
        let path = path.as_ref();
        tracing::debug!("Loading route configuration from {:?}", path);
        if !path.exists() {
            return Err(RouterError::NotFound(format!(
                "route configuration {path:?} does not exist"
            )));
        }
        let content = read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => RouteConfig::from_json_str(&content),
            _ => RouteConfig::from_toml_str(&content),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, RouterError> {
        Ok(toml::to_string(self)?)
    }

    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = Some(authenticated);
        self
    }

    pub fn with_sub_route(mut self, route: RouteConfig) -> Self {
        self.sub_routes.push(route);
        self
    }

    pub fn with_before_enter(mut self, hook: BeforeEnterHook) -> Self {
        self.before_enter = Some(hook);
        self
    }

    /// Find the configuration of route `id` in this subtree, for attaching hooks after a
    /// configuration was loaded from a file.
    pub fn route_mut(&mut self, id: &str) -> Option<&mut RouteConfig> {
        if self.id == id {
            return Some(self);
        }
        self.sub_routes
            .iter_mut()
            .find_map(|route| route.route_mut(id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterOptions {
    #[serde(default)]
    pub reconciler: ReconcilerOptions,
}

impl RouterOptions {
    pub fn from_toml_str(content: &str) -> Result<RouterOptions, RouterError> {
        Ok(toml::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const APP_ROUTES: &str = r#"
id = "app"
tagName = "APP-MAIN"
path = ""

[[subRoutes]]
id = "app-user"
tagName = "APP-USER-PAGE"
path = "/users/:userId([0-9]{1,6})"
params = ["userId"]

[[subRoutes]]
id = "app-user-account"
tagName = "APP-ACCOUNT-PAGE"
path = "/users/:userId([0-9]{1,6})/accounts/:accountId([0-9]{1,6})"
params = ["userId", "accountId"]

[[subRoutes]]
id = "app-about"
tagName = "APP-ABOUT"
path = "/about"
authenticated = false

[subRoutes.metaData]
title = "About"
"#;

    #[test]
    fn parses_nested_toml_routes() {
        let config = RouteConfig::from_toml_str(APP_ROUTES).unwrap();
        assert_eq!(config.id, "app");
        assert_eq!(config.tag_name, "APP-MAIN");
        assert!(config.path.is_empty());
        assert_eq!(config.sub_routes.len(), 3);
        assert_eq!(config.sub_routes[1].params, vec!["userId", "accountId"]);
        assert_eq!(config.sub_routes[0].authenticated, None);
        assert_eq!(config.sub_routes[2].authenticated, Some(false));
        assert_eq!(
            config.sub_routes[2].meta_data.get("title"),
            Some(&serde_json::Value::String("About".to_string()))
        );
    }

    #[test]
    fn parses_json_routes() {
        let config = RouteConfig::from_json_str(
            r#"{
                "id": "base",
                "tagName": "base-route",
                "path": "",
                "subRoutes": [
                    {"id": "dashboard", "tagName": "dashboard-route", "path": "/",
                     "metaData": {"title": "Dashboard"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.sub_routes[0].id, "dashboard");
        assert!(config.sub_routes[0].sub_routes.is_empty());
    }

    #[test]
    fn missing_fields_are_serialization_errors() {
        let err = RouteConfig::from_json_str(r#"{"id": "x"}"#).unwrap_err();
        assert!(matches!(err, RouterError::Serialization(_)));
        let err = RouteConfig::from_toml_str("id = 'x'\ntagName = 'X-VIEW'").unwrap_err();
        assert!(matches!(err, RouterError::Serialization(_)));
    }

    #[test]
    fn load_picks_the_format_from_the_extension() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = dir.path().join("routes.toml");
        std::fs::File::create(&toml_path)
            .unwrap()
            .write_all(APP_ROUTES.as_bytes())
            .unwrap();
        assert_eq!(RouteConfig::load(&toml_path).unwrap().sub_routes.len(), 3);

        let json_path = dir.path().join("routes.json");
        std::fs::write(&json_path, r#"{"id": "a", "tagName": "A-VIEW", "path": "/a"}"#).unwrap();
        assert_eq!(RouteConfig::load(&json_path).unwrap().id, "a");

        let missing = RouteConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(missing, RouterError::NotFound(_)));
    }

    #[test]
    fn builders_and_lookup() {
        let mut config = RouteConfig::new("app", "APP-MAIN", "").with_sub_route(
            RouteConfig::new("about", "APP-ABOUT", "/about")
                .with_authenticated(false)
                .with_params(["tab"]),
        );
        let hook = BeforeEnterHook::new(|| async { Ok(()) });
        config.route_mut("about").unwrap().before_enter = Some(hook);
        assert!(config.sub_routes[0].before_enter.is_some());
        assert!(config.route_mut("missing").is_none());

        let serialized = config.to_toml_string().unwrap();
        let reparsed = RouteConfig::from_toml_str(&serialized).unwrap();
        assert_eq!(reparsed.sub_routes[0].params, vec!["tab"]);
        assert!(reparsed.sub_routes[0].before_enter.is_none());
    }

    #[test]
    fn router_options_default_to_four_attempts() {
        assert_eq!(RouterOptions::default().reconciler.max_attempts, 4);
        assert_eq!(
            RouterOptions::from_toml_str("").unwrap(),
            RouterOptions::default()
        );
        let options = RouterOptions::from_toml_str("[reconciler]\nmaxAttempts = 2").unwrap();
        assert_eq!(options.reconciler.max_attempts, 2);
    }
}
