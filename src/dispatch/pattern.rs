//! Express-style path patterns (`/users/:userId([0-9]{1,6})`, `/pay/:mode?`, `*`) compiled to
//! anchored regular expressions.

use percent_encoding::percent_decode_str;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;

use crate::{context::decode_component, error::RouterError};

const DEFAULT_GROUP: &str = "[^/]+?";

#[derive(Debug, Clone)]
pub struct PathPattern {
    pattern: String,
    regex: Regex,
    keys: Vec<String>,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<PathPattern, RouterError> {
        let source = if pattern == "*" { "(.*)" } else { pattern };
        let (expr, keys) = compile(source)?;
        let regex = RegexBuilder::new(&expr).case_insensitive(true).build()?;
        tracing::debug!("Compiled path pattern '{pattern}' into /{expr}/ with keys {keys:?}");
        Ok(PathPattern {
            pattern: pattern.to_string(),
            regex,
            keys,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Match `path` (any querystring is ignored). On success returns every key of the
    /// pattern, with `None` for optional groups that matched nothing.
    pub fn matches(&self, path: &str) -> Option<BTreeMap<String, Option<String>>> {
        let pathname = path.split_once('?').map(|(p, _)| p).unwrap_or(path);
        let decoded = percent_decode_str(pathname).decode_utf8_lossy();
        let captures = self.regex.captures(&decoded)?;
        let params = self
            .keys
            .iter()
            .enumerate()
            .map(|(idx, key)| {
                let value = captures
                    .get(idx + 1)
                    .map(|m| decode_component(m.as_str()));
                (key.clone(), value)
            })
            .collect();
        Some(params)
    }
}

/// Read a balanced `( ... )` group starting at `chars[start] == '('`. Returns the inner
/// expression and the index just past the closing paren.
fn read_group(chars: &[char], start: usize, pattern: &str) -> Result<(String, usize), RouterError> {
    let mut depth = 0usize;
    let mut idx = start;
    while idx < chars.len() {
        match chars[idx] {
            '\\' => idx += 1,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    let inner: String = chars[start + 1..idx].iter().collect();
                    return Ok((inner, idx + 1));
                }
            }
            _ => {}
        }
        idx += 1;
    }
    Err(RouterError::Serialization(format!(
        "Unbalanced group in path pattern '{pattern}'"
    )))
}

fn compile(pattern: &str) -> Result<(String, Vec<String>), RouterError> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut expr = String::from("^");
    let mut keys = Vec::new();
    let mut unnamed = 0usize;
    let mut idx = 0usize;

    while idx < chars.len() {
        let c = chars[idx];
        let named = c == ':'
            && chars
                .get(idx + 1)
                .is_some_and(|n| n.is_ascii_alphanumeric() || *n == '_');
        if !named && c != '(' {
            let mut buf = [0u8; 4];
            expr.push_str(&regex::escape(c.encode_utf8(&mut buf)));
            idx += 1;
            continue;
        }

        let name = if named {
            let start = idx + 1;
            let mut end = start;
            while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_') {
                end += 1;
            }
            idx = end;
            chars[start..end].iter().collect::<String>()
        } else {
            let name = unnamed.to_string();
            unnamed += 1;
            name
        };

        let group = if chars.get(idx) == Some(&'(') {
            let (inner, next) = read_group(&chars, idx, pattern)?;
            idx = next;
            inner
        } else {
            DEFAULT_GROUP.to_string()
        };

        let modifier = match chars.get(idx) {
            Some(m @ ('?' | '*' | '+')) => {
                idx += 1;
                Some(*m)
            }
            _ => None,
        };

        // An optional parameter also swallows the separator in front of it.
        let prefixed = expr.ends_with('/');
        if prefixed && matches!(modifier, Some('?') | Some('*')) {
            expr.pop();
            let repeat = if modifier == Some('*') {
                format!("(?:{group})(?:/(?:{group}))*")
            } else {
                format!("(?:{group})")
            };
            expr.push_str(&format!("(?:/({repeat}))?"));
        } else {
            match modifier {
                Some('?') => expr.push_str(&format!("((?:{group}))?")),
                Some('*') => expr.push_str(&format!("((?:{group})(?:/(?:{group}))*)?")),
                Some('+') => expr.push_str(&format!("((?:{group})(?:/(?:{group}))*)")),
                _ => expr.push_str(&format!("((?:{group}))")),
            }
        }
        keys.push(name);
    }

    if expr.ends_with('/') {
        expr.pop();
    }
    expr.push_str("/?$");
    Ok((expr, keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn value(params: &BTreeMap<String, Option<String>>, key: &str) -> Option<String> {
        params.get(key).cloned().flatten()
    }

    #[test]
    fn named_params_with_custom_groups() {
        let pattern = PathPattern::new("/users/:userId([0-9]{1,6})/accounts/:accountId").unwrap();
        assert_eq!(pattern.keys(), ["userId", "accountId"]);
        let params = pattern.matches("/users/42/accounts/abc?x=1").unwrap();
        assert_eq!(value(&params, "userId").as_deref(), Some("42"));
        assert_eq!(value(&params, "accountId").as_deref(), Some("abc"));
        assert!(pattern.matches("/users/abc/accounts/abc").is_none());
        assert!(pattern.matches("/users/1234567/accounts/abc").is_none());
    }

    #[test]
    fn optional_params_match_nothing_as_none() {
        let pattern = PathPattern::new("/pay/:mode(bill|person)?").unwrap();
        let params = pattern.matches("/pay").unwrap();
        assert_eq!(params.get("mode"), Some(&None));
        let params = pattern.matches("/pay/bill").unwrap();
        assert_eq!(value(&params, "mode").as_deref(), Some("bill"));
        assert!(pattern.matches("/pay/other").is_none());
    }

    #[test]
    fn trailing_slash_and_case_are_lenient() {
        let pattern = PathPattern::new("/about").unwrap();
        assert!(pattern.matches("/about/").is_some());
        assert!(pattern.matches("/ABOUT").is_some());
        assert!(pattern.matches("/about/more").is_none());
    }

    #[test]
    fn wildcard_matches_everything() {
        let pattern = PathPattern::new("*").unwrap();
        let params = pattern.matches("/anything/at/all").unwrap();
        assert_eq!(value(&params, "0").as_deref(), Some("/anything/at/all"));
    }

    #[test]
    fn values_are_decoded() {
        let pattern = PathPattern::new("/B/:bData").unwrap();
        let params = pattern.matches("/B/hello%20world").unwrap();
        assert_eq!(value(&params, "bData").as_deref(), Some("hello world"));
    }

    #[test]
    fn unbalanced_groups_are_rejected() {
        assert!(PathPattern::new("/x/:id([0-9]").is_err());
    }
}
