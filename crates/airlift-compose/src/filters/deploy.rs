//! Deploy-time component selection
//!
//! Guarantees at most one selected component per legacy group (an ungrouped
//! component is its own singleton group): an explicit inclusion wins
//! outright, a `default` member is chosen in its absence, and a group with
//! neither is a hard error naming the candidates. Required components are
//! always selected. Every request token must match at least one component
//! or the filter fails with near-miss suggestions.

use std::collections::HashSet;

use indexmap::IndexMap;

use airlift_core::{Component, Package};

use crate::error::{ComposeError, Result};
use crate::filters::select::{included_or_excluded, parse_request_list, SelectState};
use crate::filters::ComponentFilter;

/// Maximum edit distance for near-miss suggestions on unmatched requests
const MAX_SUGGESTION_DISTANCE: usize = 5;

/// The default filter for deployments
#[derive(Debug, Clone)]
pub struct ForDeploy {
    requested: Vec<String>,
}

impl ForDeploy {
    pub fn new(requested: &str) -> Self {
        Self {
            requested: parse_request_list(requested),
        }
    }
}

impl ComponentFilter for ForDeploy {
    fn name(&self) -> &'static str {
        "deploy"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        // Group components by the legacy group key while maintaining order.
        let mut groups: IndexMap<String, Vec<&Component>> = IndexMap::new();
        for component in &pkg.components {
            let key = if component.group.is_empty() {
                component.name.clone()
            } else {
                component.group.clone()
            };
            groups.entry(key).or_default().push(component);
        }

        if self.requested.is_empty() {
            self.select_defaults(&groups)
        } else {
            self.select_requested(pkg, &groups)
        }
    }
}

impl ForDeploy {
    /// Non-interactive selection when no request list was given: required
    /// components plus defaults.
    fn select_defaults(&self, groups: &IndexMap<String, Vec<&Component>>) -> Result<Vec<Component>> {
        let mut selected = Vec::new();
        for members in groups.values() {
            if members.len() > 1 {
                let defaults: Vec<&&Component> =
                    members.iter().filter(|c| c.default).collect();
                match defaults.as_slice() {
                    [one] => selected.push((**one).clone()),
                    _ => {
                        return Err(ComposeError::NoDefaultOrSelection {
                            candidates: member_names(members),
                        })
                    }
                }
            } else if members[0].is_required() || members[0].default {
                selected.push(members[0].clone());
            }
        }
        Ok(selected)
    }

    fn select_requested(
        &self,
        pkg: &Package,
        groups: &IndexMap<String, Vec<&Component>>,
    ) -> Result<Vec<Component>> {
        let mut selected = Vec::new();
        let mut matched_requests: HashSet<&str> = HashSet::new();

        for (group_key, members) in groups {
            let mut group_default: Option<&Component> = None;
            let mut group_selected: Option<&Component> = None;

            for &component in members {
                let (mut state, matched) = included_or_excluded(&component.name, &self.requested);
                matched_requests.extend(matched);

                if component.is_required() {
                    // Required components ignore the request list entirely.
                    state = SelectState::Included;
                } else if state == SelectState::Excluded {
                    continue;
                } else if state == SelectState::Unknown
                    && component.default
                    && group_default.is_none()
                {
                    group_default = Some(component);
                }

                if state == SelectState::Included {
                    if let Some(first) = group_selected {
                        return Err(ComposeError::MultipleSelectedInGroup {
                            group: group_key.clone(),
                            first: first.name.clone(),
                            second: component.name.clone(),
                        });
                    }
                    selected.push(component.clone());
                    group_selected = Some(component);
                }
            }

            if group_selected.is_none() {
                if let Some(default) = group_default {
                    selected.push(default.clone());
                } else if members.len() > 1 {
                    return Err(ComposeError::NoDefaultOrSelection {
                        candidates: member_names(members),
                    });
                }
            }
        }

        // Every request token must have matched something by now.
        let mut failures = Vec::new();
        for request in &self.requested {
            if !matched_requests.contains(request.as_str()) {
                let close_enough: Vec<&str> = pkg
                    .components
                    .iter()
                    .filter(|c| strsim::levenshtein(&c.name, request) <= MAX_SUGGESTION_DISTANCE)
                    .map(|c| c.name.as_str())
                    .collect();
                if close_enough.is_empty() {
                    failures.push(request.clone());
                } else {
                    failures.push(format!("{request} (did you mean {}?)", close_enough.join(", ")));
                }
            }
        }
        if !failures.is_empty() {
            return Err(ComposeError::UnmatchedRequests {
                details: failures.join("; "),
            });
        }

        Ok(selected)
    }
}

fn member_names(members: &[&Component]) -> String {
    members
        .iter()
        .map(|c| c.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
