//! Differential exclusion against a reference package
//!
//! A differential build drops images and repositories that the reference
//! package already carries, except where the reference could have moved:
//! floating image tags (`latest`/`stable`/`nightly`) and git refs that are
//! empty, branches, or otherwise not a fixed tag or commit are always
//! re-included.

use std::collections::HashSet;

use airlift_core::reference::{classify_git_ref, git_url_split_ref};
use airlift_core::{Component, ImageRef, Package};

use crate::error::Result;
use crate::filters::ComponentFilter;

/// Drops images/repos already present in a reference package
#[derive(Debug, Clone)]
pub struct ByDifferential {
    images: HashSet<String>,
    repos: HashSet<String>,
}

impl ByDifferential {
    /// Build the exclusion sets from the reference package's components
    pub fn new(reference: &Package) -> Self {
        let mut images = HashSet::new();
        let mut repos = HashSet::new();
        for component in &reference.components {
            images.extend(component.images.iter().cloned());
            repos.extend(component.repos.iter().cloned());
        }
        Self { images, repos }
    }
}

impl ComponentFilter for ByDifferential {
    fn name(&self) -> &'static str {
        "differential"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        let mut filtered = Vec::with_capacity(pkg.components.len());
        for component in &pkg.components {
            let mut component = component.clone();

            let mut images = Vec::new();
            for image in component.images {
                let parsed = ImageRef::parse(&image)?;
                // Floating tags can change between builds and must always
                // ship again.
                if parsed.has_floating_tag() || !self.images.contains(&image) {
                    images.push(image);
                } else {
                    tracing::debug!(image, "already present in the reference package");
                }
            }
            component.images = images;

            let mut repos = Vec::new();
            for repo in component.repos {
                let (_, reference) = git_url_split_ref(&repo);
                let mutable = classify_git_ref(reference).is_mutable();
                if mutable || !self.repos.contains(&repo) {
                    repos.push(repo);
                } else {
                    tracing::debug!(repo, "already present in the reference package");
                }
            }
            component.repos = repos;

            filtered.push(component);
        }
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::package_of;

    const DIGEST: &str =
        "sha256:9f1f1a3f5f2f3cce2dc6e30ad1b6b63b1ea6c51a1d2fdd3b5a7aad1e84f9d5e8";

    fn component_with(images: &[&str], repos: &[&str]) -> Component {
        Component {
            name: "app".to_string(),
            images: images.iter().map(|s| s.to_string()).collect(),
            repos: repos.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_pinned_duplicates_are_dropped() {
        let pinned_digest = format!("ghcr.io/org/app@{DIGEST}");
        let reference = package_of(vec![component_with(
            &["nginx:1.25", &pinned_digest],
            &["https://github.com/org/repo.git@v1.0.0"],
        )]);
        let pkg = package_of(vec![component_with(
            &["nginx:1.25", &pinned_digest, "redis:7.2"],
            &[
                "https://github.com/org/repo.git@v1.0.0",
                "https://github.com/org/other.git@v2.0.0",
            ],
        )]);

        let filtered = ByDifferential::new(&reference).apply(&pkg).unwrap();
        assert_eq!(filtered[0].images, vec!["redis:7.2"]);
        assert_eq!(
            filtered[0].repos,
            vec!["https://github.com/org/other.git@v2.0.0"]
        );
    }

    #[test]
    fn test_floating_tags_are_always_kept() {
        let reference = package_of(vec![component_with(
            &["nginx:latest", "redis:stable", "app:nightly"],
            &[],
        )]);
        let pkg = package_of(vec![component_with(
            &["nginx:latest", "redis:stable", "app:nightly"],
            &[],
        )]);

        let filtered = ByDifferential::new(&reference).apply(&pkg).unwrap();
        assert_eq!(
            filtered[0].images,
            vec!["nginx:latest", "redis:stable", "app:nightly"]
        );
    }

    #[test]
    fn test_mutable_git_refs_are_always_kept() {
        let repos = [
            "https://github.com/org/no-ref.git",
            "https://github.com/org/branch.git@refs/heads/main",
        ];
        let reference = package_of(vec![component_with(&[], &repos)]);
        let pkg = package_of(vec![component_with(&[], &repos)]);

        let filtered = ByDifferential::new(&reference).apply(&pkg).unwrap();
        assert_eq!(filtered[0].repos, repos.to_vec());
    }

    #[test]
    fn test_digest_dropped_only_on_exact_match() {
        let pinned = format!("ghcr.io/org/app@{DIGEST}");
        let reference = package_of(vec![component_with(&[pinned.as_str()], &[])]);
        let pkg = package_of(vec![component_with(
            &[pinned.as_str(), "ghcr.io/org/app:1.0.0"],
            &[],
        )]);

        let filtered = ByDifferential::new(&reference).apply(&pkg).unwrap();
        // Same repository under a different reference string survives.
        assert_eq!(filtered[0].images, vec!["ghcr.io/org/app:1.0.0"]);
    }
}
