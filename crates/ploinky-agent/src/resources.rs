//! Resource templates: a declared `uri` containing `{param}` placeholders is
//! matched against an incoming `resources/read` request, the matched
//! parameters are passed to `command` as environment variables, and the
//! command's stdout becomes the resource's content.

use std::collections::HashMap;

use regex::Regex;

use crate::config::ResourceSpec;
use crate::error::{AgentError, AgentResult};

/// Compile a `{param}`-style URI template into a regex capturing each
/// placeholder by name, e.g. `file:///{path}` -> `^file:///(?P<path>[^/]+)$`.
fn template_regex(template: &str) -> Regex {
    let mut pattern = String::from("^");
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for inner in chars.by_ref() {
                if inner == '}' {
                    break;
                }
                name.push(inner);
            }
            pattern.push_str(&format!("(?P<{name}>[^/]+)"));
        } else {
            pattern.push_str(&regex::escape(&c.to_string()));
        }
    }
    pattern.push('$');
    Regex::new(&pattern).expect("uri template compiles to a valid regex")
}

/// Match `uri` against every declared resource's template and return the
/// matching spec plus its extracted placeholder values.
pub fn resolve<'a>(resources: &'a [ResourceSpec], uri: &str) -> AgentResult<(&'a ResourceSpec, HashMap<String, String>)> {
    for spec in resources {
        let re = template_regex(&spec.uri);
        if let Some(captures) = re.captures(uri) {
            let mut params = HashMap::new();
            for name in re.capture_names().flatten() {
                if let Some(value) = captures.name(name) {
                    params.insert(name.to_string(), value.as_str().to_string());
                }
            }
            return Ok((spec, params));
        }
    }
    Err(AgentError::UnknownResource(uri.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, uri: &str) -> ResourceSpec {
        ResourceSpec {
            name: name.to_string(),
            uri: uri.to_string(),
            command: "cat {path}".to_string(),
            description: None,
            mime_type: None,
        }
    }

    #[test]
    fn matches_template_and_extracts_params() {
        let resources = vec![spec("file", "file:///{path}")];
        let (matched, params) = resolve(&resources, "file:///etc/hosts").unwrap();
        assert_eq!(matched.name, "file");
        assert_eq!(params.get("path"), Some(&"etc/hosts".to_string()));
    }

    #[test]
    fn unmatched_uri_errors() {
        let resources = vec![spec("file", "file:///{path}")];
        assert!(resolve(&resources, "other://thing").is_err());
    }

    #[test]
    fn picks_first_matching_template() {
        let resources = vec![spec("a", "res://{id}"), spec("b", "res://fixed")];
        let (matched, _) = resolve(&resources, "res://fixed").unwrap();
        assert_eq!(matched.name, "a");
    }
}
