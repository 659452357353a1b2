//! Explicit component selection by name or glob pattern
//!
//! A request list is comma separated; each entry is a component name or
//! glob pattern, optionally prefixed with `-` to exclude. Patterns are
//! evaluated in request order and the last matching pattern wins, so a
//! later inclusion can override an earlier exclusion and vice versa.

use glob::Pattern;

use airlift_core::{Component, Package};

use crate::error::Result;
use crate::filters::ComponentFilter;

/// The outcome of matching one component against a request list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectState {
    /// A non-excluding pattern matched last
    Included,
    /// An excluding pattern matched last
    Excluded,
    /// No pattern matched
    Unknown,
}

/// Evaluate a component name against every request pattern in order.
///
/// Returns the final state plus each request token that matched, so
/// callers can verify that every token was consumed by some component.
pub(crate) fn included_or_excluded<'a>(
    component_name: &str,
    requested: &'a [String],
) -> (SelectState, Vec<&'a str>) {
    let mut state = SelectState::Unknown;
    let mut matched = Vec::new();
    for request in requested {
        let (pattern, exclude) = match request.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (request.as_str(), false),
        };
        let is_match = Pattern::new(pattern)
            .map(|p| p.matches(component_name))
            .unwrap_or(component_name == pattern);
        if is_match {
            matched.push(request.as_str());
            state = if exclude {
                SelectState::Excluded
            } else {
                SelectState::Included
            };
        }
    }
    (state, matched)
}

/// Split a comma-separated request list into trimmed, non-empty tokens
pub(crate) fn parse_request_list(requested: &str) -> Vec<String> {
    requested
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps components explicitly selected by the request list.
///
/// With no request list at all, every component is included; with one,
/// unmatched components are dropped.
#[derive(Debug, Clone)]
pub struct BySelectState {
    requested: Vec<String>,
}

impl BySelectState {
    pub fn new(requested: &str) -> Self {
        Self {
            requested: parse_request_list(requested),
        }
    }
}

impl ComponentFilter for BySelectState {
    fn name(&self) -> &'static str {
        "select"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        if self.requested.is_empty() {
            return Ok(pkg.components.clone());
        }
        let filtered: Vec<Component> = pkg
            .components
            .iter()
            .filter(|c| {
                let (state, _) = included_or_excluded(&c.name, &self.requested);
                state == SelectState::Included
            })
            .cloned()
            .collect();
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::package_of;

    fn components() -> Vec<Component> {
        ["component1", "component2", "component3"]
            .iter()
            .map(|name| Component {
                name: name.to_string(),
                ..Default::default()
            })
            .collect()
    }

    fn apply(requested: &str) -> Vec<String> {
        let pkg = package_of(components());
        BySelectState::new(requested)
            .apply(&pkg)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect()
    }

    #[test]
    fn test_no_request_list_includes_everything() {
        assert_eq!(apply(""), vec!["component1", "component2", "component3"]);
    }

    #[test]
    fn test_exact_selection() {
        assert_eq!(apply("component2"), vec!["component2"]);
    }

    #[test]
    fn test_glob_with_exclusion_last_match_wins() {
        assert_eq!(apply("comp*,-component2"), vec!["component1", "component3"]);
    }

    #[test]
    fn test_later_inclusion_overrides_exclusion() {
        assert_eq!(
            apply("-component2,comp*"),
            vec!["component1", "component2", "component3"]
        );
    }

    #[test]
    fn test_matched_tokens_are_reported() {
        let requested = parse_request_list("comp*,-component2,unrelated");
        let (state, matched) = included_or_excluded("component2", &requested);
        assert_eq!(state, SelectState::Excluded);
        assert_eq!(matched, vec!["comp*", "-component2"]);

        let (state, matched) = included_or_excluded("elsewhere", &requested);
        assert_eq!(state, SelectState::Unknown);
        assert!(matched.is_empty());
    }
}
