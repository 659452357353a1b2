//! The import chain - a singly linked, acyclic sequence of component
//! definitions connected by import references
//!
//! Nodes live in an arena addressed by index with explicit prev/next links,
//! which keeps ownership unambiguous and makes the structural checks
//! (cycles, remote hops) simple index walks. A chain exists only for the
//! duration of one composition pass.

use std::fmt;
use std::path::PathBuf;

use airlift_core::{BuildData, Component, Constant, Package, Variable};

use crate::compose::normalize_path;
use crate::error::{ComposeError, Result};
use crate::migrations;

/// One resolved component definition plus its resolution context
#[derive(Debug)]
pub(crate) struct Node {
    pub component: Component,
    /// `metadata.name` of the package manifest this node came from
    pub package_name: String,
    pub vars: Vec<Variable>,
    pub consts: Vec<Constant>,
    /// Accumulated path from the head package root to this node's package
    /// root. Empty for a remote tail until its skeleton is materialized.
    pub relative_to_head: PathBuf,
    pub prev: Option<usize>,
    pub next: Option<usize>,
}

/// The import chain built for one top-level component.
///
/// The head is the originally declared component; the tail is the most
/// deeply imported one.
#[derive(Debug)]
pub struct ImportChain {
    pub(crate) nodes: Vec<Node>,
}

impl ImportChain {
    fn push(
        &mut self,
        component: Component,
        package_name: String,
        relative_to_head: PathBuf,
        vars: Vec<Variable>,
        consts: Vec<Constant>,
    ) {
        let index = self.nodes.len();
        let prev = index.checked_sub(1);
        if let Some(prev_index) = prev {
            self.nodes[prev_index].next = Some(index);
        }
        self.nodes.push(Node {
            component,
            package_name,
            vars,
            consts,
            relative_to_head,
            prev,
            next: None,
        });
    }

    pub(crate) fn head(&self) -> &Node {
        &self.nodes[0]
    }

    pub(crate) fn tail(&self) -> &Node {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Number of nodes in the chain
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether the chain ends in a registry-resolved component.
    ///
    /// Only the second-to-last node may carry a remote import; the
    /// structural checks during build enforce that.
    pub fn contains_remote_import(&self) -> bool {
        self.tail()
            .prev
            .map(|prev| !self.nodes[prev].component.import.url.is_empty())
            .unwrap_or(false)
    }

    /// Build the import chain for `head`, following local and remote import
    /// references until a component imports nothing.
    pub async fn build(
        head: Component,
        package_name: &str,
        ctx: &crate::compose::ComposeContext<'_>,
    ) -> Result<Self> {
        if ctx.arch.is_empty() {
            return Err(ComposeError::ArchitectureRequired);
        }

        let mut chain = ImportChain { nodes: Vec::new() };
        chain.push(
            head,
            package_name.to_string(),
            PathBuf::from("."),
            Vec::new(),
            Vec::new(),
        );

        // Declared import paths, in order, for cycle reporting.
        let mut history: Vec<String> = Vec::new();

        loop {
            let index = chain.nodes.len() - 1;
            let component_name = chain.nodes[index].component.name.clone();
            let import = chain.nodes[index].component.import.clone();

            let is_local = !import.path.is_empty();
            let is_remote = !import.url.is_empty();
            if !is_local && !is_remote {
                break;
            }

            validate_import(&chain.nodes[index].component)?;

            // A node resolved via a registry URL may not import further.
            if let Some(prev) = chain.nodes[index].prev {
                if !chain.nodes[prev].component.import.url.is_empty() {
                    if is_remote {
                        return Err(ComposeError::TwoHopRemote {
                            component: component_name,
                        });
                    }
                    return Err(ComposeError::LocalFromRemote {
                        component: component_name,
                    });
                }
            }

            let import_name = chain.nodes[index].component.import_name().to_string();

            let (pkg, relative_to_head, source) = if is_local {
                history.push(import.path.clone());
                let rel = normalize_path(&history.iter().collect::<PathBuf>());

                // Cycle detection keys on the accumulated resolved path; a
                // self-import resolves to "." and collides with the head.
                for ancestor in &chain.nodes {
                    if ancestor.relative_to_head == rel {
                        return Err(ComposeError::CircularImport {
                            history: history.join(" -> "),
                        });
                    }
                }

                let pkg = Package::load(ctx.package_root.join(&rel))?;
                let source = rel.display().to_string();
                (pkg, rel, source)
            } else {
                let pkg = ctx.resolver.fetch_manifest(&import.url).await?;
                // The relative path of a remote tail is only known once its
                // skeleton is materialized during compose.
                (pkg, PathBuf::new(), import.url.clone())
            };

            let found: Vec<&Component> = pkg
                .components
                .iter()
                .filter(|c| c.name == import_name && c.is_compatible(ctx.arch, ctx.flavor))
                .collect();
            let component = match found.as_slice() {
                [] => {
                    return Err(ComposeError::ComponentNotFound {
                        name: import_name,
                        location: source,
                    })
                }
                [one] => (*one).clone(),
                _ => {
                    return Err(ComposeError::MultipleComponentsFound {
                        name: import_name,
                        location: source,
                        arch: ctx.arch.to_string(),
                    })
                }
            };

            chain.push(
                component,
                pkg.metadata.name.clone(),
                relative_to_head,
                pkg.variables.clone(),
                pkg.constants.clone(),
            );
        }

        tracing::debug!(chain = %chain, "built import chain");
        Ok(chain)
    }

    /// Rewrite deprecated fields on every node, collecting advisory
    /// warnings.
    pub fn migrate(&mut self, build: &BuildData) -> Vec<String> {
        let mut warnings = Vec::new();
        for node in &mut self.nodes {
            let (component, mut w) =
                migrations::migrate_component(build, std::mem::take(&mut node.component));
            node.component = component;
            warnings.append(&mut w);
        }
        if !warnings.is_empty() {
            warnings.push(format!(
                "Migrations were performed on the import chain of {:?}",
                self.head().component.name
            ));
        }
        warnings
    }

    /// Merge package variables across the chain.
    ///
    /// Walks tail to head deduplicating by name, then lets already-declared
    /// variables win over imported ones.
    pub fn merge_variables(&self, existing: &[Variable]) -> Vec<Variable> {
        let mut merged: Vec<Variable> = Vec::new();
        let mut index = Some(self.nodes.len() - 1);
        while let Some(i) = index {
            merged = merge_by_name(self.nodes[i].vars.clone(), merged, |v| v.name.clone());
            index = self.nodes[i].prev;
        }
        merge_by_name(existing.to_vec(), merged, |v| v.name.clone())
    }

    /// Merge package constants across the chain (same precedence as
    /// variables).
    pub fn merge_constants(&self, existing: &[Constant]) -> Vec<Constant> {
        let mut merged: Vec<Constant> = Vec::new();
        let mut index = Some(self.nodes.len() - 1);
        while let Some(i) = index {
            merged = merge_by_name(self.nodes[i].consts.clone(), merged, |c| c.name.clone());
            index = self.nodes[i].prev;
        }
        merge_by_name(existing.to_vec(), merged, |c| c.name.clone())
    }
}

impl fmt::Display for ImportChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nodes.len() == 1 {
            return write!(f, "component {:?} imports nothing", self.head().component.name);
        }
        write!(f, "component {:?}", self.head().component.name)?;
        for node in &self.nodes[..self.nodes.len() - 1] {
            let import = &node.component.import;
            let location = if import.path.is_empty() {
                &import.url
            } else {
                &import.path
            };
            write!(
                f,
                " imports {:?} in {location},",
                node.component.import_name()
            )?;
        }
        write!(f, " which terminates in {:?}", self.tail().package_name)
    }
}

/// Keep `base`, appending entries of `extra` whose key is not already
/// present.
fn merge_by_name<T, K, F>(base: Vec<T>, extra: Vec<T>, key: F) -> Vec<T>
where
    K: PartialEq,
    F: Fn(&T) -> K,
{
    let mut merged = base;
    for item in extra {
        if !merged.iter().any(|existing| key(existing) == key(&item)) {
            merged.push(item);
        }
    }
    merged
}

/// Validate that a component's import reference is well formed
fn validate_import(component: &Component) -> Result<()> {
    let path = &component.import.path;
    let url = &component.import.url;
    let mut problems = Vec::new();

    if path.is_empty() && url.is_empty() {
        problems.push("neither a path nor a URL was provided");
    }
    if !path.is_empty() && !url.is_empty() {
        problems.push("both a path and a URL were provided");
    }
    if url.is_empty() && !path.is_empty() && std::path::Path::new(path).is_absolute() {
        problems.push("path cannot be an absolute path");
    }
    if path.is_empty() && !url.is_empty() && !url.starts_with("oci://") {
        problems.push("URL is not a valid OCI URL");
    }
    if path.contains("###") || url.contains("###") {
        problems.push("package templates are not supported for import path or URL");
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ComposeError::InvalidImport {
            component: component.name.clone(),
            message: problems.join("; "),
        })
    }
}
