//! Component filter strategies
//!
//! Each strategy takes the full component list of a package and returns an
//! order-stable subset. Strategies are stateless and composable; the
//! [`FilterChain`] combinator threads a package through an ordered list of
//! them, attaching the failing strategy's name to the first error.

mod arch_os;
mod deploy;
mod diff;
mod select;

pub use arch_os::ByArchAndOs;
pub use deploy::ForDeploy;
pub use diff::ByDifferential;
pub use select::{BySelectState, SelectState};

use airlift_core::{Component, Package};

use crate::error::{ComposeError, Result};

/// A stateless predicate over an ordered component list
pub trait ComponentFilter {
    /// Short identifier attached to errors by the combinator
    fn name(&self) -> &'static str;

    /// Narrow the package's component list
    fn apply(&self, pkg: &Package) -> Result<Vec<Component>>;
}

/// The identity filter
#[derive(Debug, Clone, Copy, Default)]
pub struct Empty;

impl ComponentFilter for Empty {
    fn name(&self) -> &'static str {
        "empty"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        Ok(pkg.components.clone())
    }
}

/// Threads a package through an ordered list of strategies
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn ComponentFilter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    /// Append a strategy to the end of the chain
    #[must_use]
    pub fn with(mut self, filter: impl ComponentFilter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }
}

impl ComponentFilter for FilterChain {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        let mut current = pkg.clone();
        for filter in &self.filters {
            current.components =
                filter
                    .apply(&current)
                    .map_err(|source| ComposeError::FilterFailed {
                        filter: filter.name(),
                        source: Box::new(source),
                    })?;
        }
        Ok(current.components)
    }
}

#[cfg(test)]
pub(crate) fn package_of(components: Vec<Component>) -> Package {
    Package {
        metadata: airlift_core::Metadata {
            name: "fixture".to_string(),
            ..Default::default()
        },
        components,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> Component {
        Component {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let pkg = package_of(vec![named("a"), named("b")]);
        let result = Empty.apply(&pkg).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_chain_applies_in_order_and_names_failures() {
        let mut one = named("one");
        one.only.cluster.architecture = "arm64".to_string();
        let pkg = package_of(vec![one, named("two")]);

        let chain = FilterChain::new()
            .with(ByArchAndOs::new("amd64", "linux"))
            .with(BySelectState::new("two"));
        let result = chain.apply(&pkg).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "two");

        // A failing step surfaces its own identity.
        let chain = FilterChain::new().with(ForDeploy::new("missing-component"));
        let err = chain.apply(&pkg).unwrap_err();
        match err {
            ComposeError::FilterFailed { filter, .. } => assert_eq!(filter, "deploy"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
