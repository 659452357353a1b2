//! Flattening an import chain into a single component
//!
//! Composition walks from the tail (the most deeply imported component)
//! back to the head, rewriting each node's relative resource paths to be
//! valid from the head package root and then layering the ancestor's
//! overrides on top. List-valued resources therefore end up child-first:
//! the deepest import's entries precede the importer's own.

use std::path::{Component as PathSegment, Path, PathBuf};

use airlift_core::reference::is_url;
use airlift_core::{ActionSet, Component};

use crate::chain::ImportChain;
use crate::error::{ComposeError, Result};
use crate::resolver::ImportResolver;

/// Everything the composer needs beyond the component itself
pub struct ComposeContext<'a> {
    /// Target architecture (must be resolved before composing)
    pub arch: &'a str,
    /// Build flavor, or "" when none was requested
    pub flavor: &'a str,
    /// Directory containing the head package's manifest
    pub package_root: &'a Path,
    /// Supplies remote package manifests and skeleton archives
    pub resolver: &'a dyn ImportResolver,
}

impl ImportChain {
    /// Flatten the chain into one component, fixing paths and applying
    /// overrides.
    pub async fn compose(&mut self, ctx: &ComposeContext<'_>) -> Result<Component> {
        if self.len() == 1 {
            let mut composed = self.head().component.clone();
            strip_resolved_fields(&mut composed);
            return Ok(composed);
        }

        self.fetch_remote_skeleton(ctx).await?;

        let mut composed = Component::default();
        let mut index = Some(self.len() - 1);
        while let Some(i) = index {
            let node = &self.nodes[i];
            let mut current = node.component.clone();
            fix_paths(&mut current, &node.relative_to_head, ctx.package_root);

            override_metadata(&mut composed, &current)?;
            override_resources(&mut composed, &current);
            override_actions(&mut composed, &current);

            index = node.prev;
        }

        strip_resolved_fields(&mut composed);
        Ok(composed)
    }

    /// Materialize the skeleton archive backing a remote tail and anchor
    /// the tail's relative path at its cache directory.
    async fn fetch_remote_skeleton(&mut self, ctx: &ComposeContext<'_>) -> Result<()> {
        if !self.contains_remote_import() {
            return Ok(());
        }
        let tail = self.len() - 1;
        let Some(prev) = self.nodes[tail].prev else {
            return Ok(());
        };
        let url = self.nodes[prev].component.import.url.clone();
        let name = self.nodes[prev].component.import_name().to_string();

        let cache_dir = ctx.resolver.fetch_skeleton(&url, &name).await?;
        let package_root = std::path::absolute(ctx.package_root)?;
        // Contrary to local nodes, the remote tail is anchored by the
        // package-root-to-cache relationship rather than by its importer.
        self.nodes[tail].relative_to_head = relative_from(&cache_dir, &package_root);
        Ok(())
    }
}

/// Compose every top-level component of a package in place.
///
/// Incompatible components (architecture/flavor) are dropped, each
/// remaining component's import chain is migrated and flattened, and
/// package variables/constants picked up along the chains are merged in.
/// Returns the advisory warnings gathered along the way.
pub async fn compose_package(
    pkg: &mut airlift_core::Package,
    ctx: &ComposeContext<'_>,
) -> Result<Vec<String>> {
    let mut warnings = Vec::new();
    let mut components = Vec::new();
    let mut variables = pkg.variables.clone();
    let mut constants = pkg.constants.clone();

    for component in pkg.components.clone() {
        if !component.is_compatible(ctx.arch, ctx.flavor) {
            continue;
        }
        let mut chain = ImportChain::build(component, &pkg.metadata.name, ctx).await?;
        warnings.extend(chain.migrate(&pkg.build));
        let composed = chain.compose(ctx).await?;
        variables = chain.merge_variables(&variables);
        constants = chain.merge_constants(&constants);
        components.push(composed);
    }

    pkg.components = components;
    pkg.variables = variables;
    pkg.constants = constants;
    Ok(warnings)
}

/// Clear fields that are fully resolved by composition and only bloat the
/// built artifact: the matched architecture/flavor constraints and the
/// import reference itself.
fn strip_resolved_fields(component: &mut Component) {
    component.only.flavor.clear();
    component.only.cluster.architecture.clear();
    component.import = Default::default();
}

/// Apply ancestor metadata on top of the composed component.
///
/// Name, default, and required always take the ancestor's value;
/// description and flavor only when non-empty. `only.localOS` may be set by
/// at most one node in the chain.
fn override_metadata(composed: &mut Component, override_with: &Component) -> Result<()> {
    composed.name = override_with.name.clone();
    composed.default = override_with.default;
    composed.required = override_with.required;

    if !override_with.description.is_empty() {
        composed.description = override_with.description.clone();
    }
    if !override_with.only.flavor.is_empty() {
        composed.only.flavor = override_with.only.flavor.clone();
    }
    if !override_with.only.local_os.is_empty() {
        if !composed.only.local_os.is_empty() {
            return Err(ComposeError::LocalOsRedefined {
                component: composed.name.clone(),
                existing: composed.only.local_os.clone(),
                redefined: override_with.only.local_os.clone(),
            });
        }
        composed.only.local_os = override_with.only.local_os.clone();
    }

    // Legacy fields ride along so the deploy-time group filter still works.
    composed.group = override_with.group.clone();
    if !override_with.cosign_key_path.is_empty() {
        composed.cosign_key_path = override_with.cosign_key_path.clone();
    }
    Ok(())
}

/// Append or merge the ancestor's resources onto the composed component
fn override_resources(composed: &mut Component, override_with: &Component) {
    composed
        .data_injections
        .extend(override_with.data_injections.iter().cloned());
    composed.files.extend(override_with.files.iter().cloned());
    composed.images.extend(override_with.images.iter().cloned());
    composed.repos.extend(override_with.repos.iter().cloned());
    composed
        .health_checks
        .extend(override_with.health_checks.iter().cloned());

    // Charts merge by name so an importer can adjust an imported chart
    // without duplicating it.
    for override_chart in &override_with.charts {
        if let Some(existing) = composed
            .charts
            .iter_mut()
            .find(|c| c.name == override_chart.name)
        {
            if !override_chart.namespace.is_empty() {
                existing.namespace = override_chart.namespace.clone();
            }
            if !override_chart.release_name.is_empty() {
                existing.release_name = override_chart.release_name.clone();
            }
            existing
                .values_files
                .extend(override_chart.values_files.iter().cloned());
        } else {
            composed.charts.push(override_chart.clone());
        }
    }

    // Manifests merge by name the same way.
    for override_manifest in &override_with.manifests {
        if let Some(existing) = composed
            .manifests
            .iter_mut()
            .find(|m| m.name == override_manifest.name)
        {
            if !override_manifest.namespace.is_empty() {
                existing.namespace = override_manifest.namespace.clone();
            }
            existing
                .files
                .extend(override_manifest.files.iter().cloned());
            existing
                .kustomizations
                .extend(override_manifest.kustomizations.iter().cloned());
        } else {
            composed.manifests.push(override_manifest.clone());
        }
    }
}

/// Append the ancestor's lifecycle actions; action-set defaults follow the
/// overriding node.
fn override_actions(composed: &mut Component, override_with: &Component) {
    merge_action_set(&mut composed.actions.on_create, &override_with.actions.on_create);
    merge_action_set(&mut composed.actions.on_deploy, &override_with.actions.on_deploy);
    merge_action_set(&mut composed.actions.on_remove, &override_with.actions.on_remove);
}

fn merge_action_set(composed: &mut ActionSet, override_with: &ActionSet) {
    composed.defaults = override_with.defaults.clone();
    composed.before.extend(override_with.before.iter().cloned());
    composed.after.extend(override_with.after.iter().cloned());
    composed
        .on_success
        .extend(override_with.on_success.iter().cloned());
    composed
        .on_failure
        .extend(override_with.on_failure.iter().cloned());
}

/// Rewrite every relative resource path in `component` to be valid from the
/// head package root.
///
/// URLs and absolute paths are never touched. Kustomizations are only
/// rewritten when the rewritten path exists locally, since kustomize
/// accepts non-standard remote URLs that must not be mangled.
pub(crate) fn fix_paths(component: &mut Component, relative_to_head: &Path, package_root: &Path) {
    for file in &mut component.files {
        file.source = make_path_relative_to(&file.source, relative_to_head);
    }

    for chart in &mut component.charts {
        for values_file in &mut chart.values_files {
            *values_file = make_path_relative_to(values_file, relative_to_head);
        }
        if !chart.local_path.is_empty() {
            chart.local_path = make_path_relative_to(&chart.local_path, relative_to_head);
        }
    }

    for manifest in &mut component.manifests {
        for file in &mut manifest.files {
            *file = make_path_relative_to(file, relative_to_head);
        }
        for kustomization in &mut manifest.kustomizations {
            let composed = make_path_relative_to(kustomization, relative_to_head);
            if package_root.join(&composed).exists() {
                *kustomization = composed;
            }
        }
    }

    for injection in &mut component.data_injections {
        injection.source = make_path_relative_to(&injection.source, relative_to_head);
    }

    fix_action_set_paths(&mut component.actions.on_create, relative_to_head);
    fix_action_set_paths(&mut component.actions.on_deploy, relative_to_head);
    fix_action_set_paths(&mut component.actions.on_remove, relative_to_head);

    if !component.cosign_key_path.is_empty() {
        component.cosign_key_path =
            make_path_relative_to(&component.cosign_key_path, relative_to_head);
    }
}

/// Rewrite every action's working directory relative to the node that
/// declared it, falling back to the set-level default directory.
fn fix_action_set_paths(set: &mut ActionSet, relative_to_head: &Path) {
    let default_dir = set.defaults.dir.clone();
    for action in set
        .before
        .iter_mut()
        .chain(set.after.iter_mut())
        .chain(set.on_success.iter_mut())
        .chain(set.on_failure.iter_mut())
    {
        let dir = action.dir.clone().unwrap_or_else(|| default_dir.clone());
        action.dir = Some(make_path_relative_to(&dir, relative_to_head));
    }
}

/// Prefix a relative path with the node's accumulated path; URLs and
/// absolute paths pass through unchanged.
pub(crate) fn make_path_relative_to(path: &str, relative_to: &Path) -> String {
    if is_url(path) || Path::new(path).is_absolute() {
        return path.to_string();
    }
    normalize_path(&relative_to.join(path))
        .display()
        .to_string()
}

/// Lexically clean a path: resolve `.` and `..` segments without touching
/// the filesystem.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut cleaned = PathBuf::new();
    for segment in path.components() {
        match segment {
            PathSegment::CurDir => {}
            PathSegment::ParentDir => {
                let last_is_normal = matches!(
                    cleaned.components().next_back(),
                    Some(PathSegment::Normal(_))
                );
                if last_is_normal {
                    cleaned.pop();
                } else {
                    cleaned.push("..");
                }
            }
            other => cleaned.push(other),
        }
    }
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

/// Compute the relative path from `base` to `target` (both absolute)
pub(crate) fn relative_from(target: &Path, base: &Path) -> PathBuf {
    let target_segments: Vec<_> = target.components().collect();
    let base_segments: Vec<_> = base.components().collect();

    let common = target_segments
        .iter()
        .zip(base_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..base_segments.len() {
        relative.push("..");
    }
    for segment in &target_segments[common..] {
        relative.push(segment);
    }
    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::LocalOnlyResolver;
    use tempfile::TempDir;

    fn write_package(dir: &Path, yaml: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("zarf.yaml"), yaml).unwrap();
    }

    async fn compose_from(root: &Path, head: Component) -> Result<Component> {
        let resolver = LocalOnlyResolver;
        let ctx = ComposeContext {
            arch: "amd64",
            flavor: "",
            package_root: root,
            resolver: &resolver,
        };
        let mut chain = ImportChain::build(head, "pkg", &ctx).await?;
        chain.compose(&ctx).await
    }

    fn head_importing(path: &str) -> Component {
        serde_yaml::from_str(&format!(
            r#"
name: app
required: true
description: Head component
files:
  - source: config/head.yaml
    target: /etc/head.yaml
images:
  - ghcr.io/org/head:1.0.0
import:
  path: {path}
"#
        ))
        .unwrap()
    }

    const CHILD_PACKAGE: &str = r#"
metadata:
  name: child
components:
  - name: app
    description: Child component
    default: true
    files:
      - source: files/child.txt
        target: /opt/child.txt
    images:
      - ghcr.io/org/child:2.0.0
    charts:
      - name: shared
        url: https://charts.example.com
        version: 1.2.3
        valuesFiles:
          - values/child.yaml
    manifests:
      - name: workload
        files:
          - manifests/deploy.yaml
    actions:
      onDeploy:
        before:
          - cmd: ./child-setup.sh
"#;

    #[tokio::test]
    async fn test_compose_orders_child_resources_first() {
        let temp = TempDir::new().unwrap();
        write_package(&temp.path().join("child"), CHILD_PACKAGE);

        let composed = compose_from(temp.path(), head_importing("child"))
            .await
            .unwrap();

        // Head metadata wins.
        assert_eq!(composed.name, "app");
        assert!(composed.is_required());
        assert_eq!(composed.description, "Head component");

        // Child entries precede the importer's own, with child paths
        // rewritten under the import directory.
        assert_eq!(composed.files.len(), 2);
        assert_eq!(composed.files[0].source, "child/files/child.txt");
        assert_eq!(composed.files[1].source, "config/head.yaml");
        assert_eq!(
            composed.images,
            vec!["ghcr.io/org/child:2.0.0", "ghcr.io/org/head:1.0.0"]
        );

        assert_eq!(composed.charts.len(), 1);
        assert_eq!(composed.charts[0].values_files[0], "child/values/child.yaml");
        assert_eq!(composed.manifests[0].files[0], "child/manifests/deploy.yaml");

        // Action dirs anchor at the declaring node's directory.
        assert_eq!(
            composed.actions.on_deploy.before[0].dir.as_deref(),
            Some("child")
        );

        // Resolved filter fields are stripped from the artifact.
        assert!(composed.import.is_empty());
        assert!(composed.only.flavor.is_empty());
        assert!(composed.only.cluster.architecture.is_empty());
    }

    #[tokio::test]
    async fn test_compose_merges_charts_by_name() {
        let temp = TempDir::new().unwrap();
        write_package(&temp.path().join("child"), CHILD_PACKAGE);

        let head: Component = serde_yaml::from_str(
            r#"
name: app
charts:
  - name: shared
    namespace: override-ns
    releaseName: renamed
    valuesFiles:
      - values/head.yaml
import:
  path: child
"#,
        )
        .unwrap();

        let composed = compose_from(temp.path(), head).await.unwrap();
        assert_eq!(composed.charts.len(), 1);
        let chart = &composed.charts[0];
        assert_eq!(chart.namespace, "override-ns");
        assert_eq!(chart.release_name, "renamed");
        assert_eq!(chart.version, "1.2.3");
        assert_eq!(
            chart.values_files,
            vec!["child/values/child.yaml", "values/head.yaml"]
        );
    }

    #[tokio::test]
    async fn test_compose_rejects_local_os_redefinition() {
        let temp = TempDir::new().unwrap();
        write_package(
            &temp.path().join("child"),
            r#"
metadata:
  name: child
components:
  - name: app
    only:
      localOS: linux
"#,
        );

        let head: Component = serde_yaml::from_str(
            r#"
name: app
only:
  localOS: darwin
import:
  path: child
"#,
        )
        .unwrap();

        let err = compose_from(temp.path(), head).await.unwrap_err();
        assert!(matches!(err, ComposeError::LocalOsRedefined { .. }));
    }

    #[tokio::test]
    async fn test_compose_single_node_strips_resolved_fields() {
        let temp = TempDir::new().unwrap();
        let head: Component = serde_yaml::from_str(
            r#"
name: solo
only:
  flavor: upstream
  cluster:
    architecture: amd64
"#,
        )
        .unwrap();

        let composed = compose_from(temp.path(), head).await.unwrap();
        assert!(composed.only.flavor.is_empty());
        assert!(composed.only.cluster.architecture.is_empty());
    }

    struct SkeletonResolver {
        manifest: Component,
        skeleton_dir: std::path::PathBuf,
    }

    #[async_trait::async_trait]
    impl crate::resolver::ImportResolver for SkeletonResolver {
        async fn fetch_manifest(&self, _url: &str) -> Result<airlift_core::Package> {
            Ok(airlift_core::Package {
                metadata: airlift_core::Metadata {
                    name: "skeleton".to_string(),
                    ..Default::default()
                },
                components: vec![self.manifest.clone()],
                ..Default::default()
            })
        }

        async fn fetch_skeleton(
            &self,
            _url: &str,
            _component_name: &str,
        ) -> Result<std::path::PathBuf> {
            Ok(self.skeleton_dir.clone())
        }
    }

    #[tokio::test]
    async fn test_compose_anchors_remote_tail_at_cache_dir() {
        let package_root = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        let skeleton_dir = std::path::absolute(cache.path()).unwrap();

        let imported: Component = serde_yaml::from_str(
            r#"
name: app
files:
  - source: files/config.yaml
    target: /etc/config.yaml
"#,
        )
        .unwrap();
        let resolver = SkeletonResolver {
            manifest: imported,
            skeleton_dir: skeleton_dir.clone(),
        };
        let ctx = ComposeContext {
            arch: "amd64",
            flavor: "",
            package_root: package_root.path(),
            resolver: &resolver,
        };

        let head: Component = serde_yaml::from_str(
            r#"
name: app
import:
  url: oci://example/skeleton:1.0.0
"#,
        )
        .unwrap();
        let mut chain = ImportChain::build(head, "pkg", &ctx).await.unwrap();
        assert!(chain.contains_remote_import());
        let composed = chain.compose(&ctx).await.unwrap();

        // The remote tail's paths anchor at the content-addressed cache
        // directory, expressed relative to the package root.
        let expected_prefix = relative_from(
            &skeleton_dir,
            &std::path::absolute(package_root.path()).unwrap(),
        );
        assert_eq!(
            composed.files[0].source,
            expected_prefix.join("files/config.yaml").display().to_string()
        );
    }

    #[test]
    fn test_make_path_relative_to() {
        let rel = Path::new("common");
        assert_eq!(make_path_relative_to("files/a.txt", rel), "common/files/a.txt");
        assert_eq!(
            make_path_relative_to("https://example.com/a.yaml", rel),
            "https://example.com/a.yaml"
        );
        assert_eq!(make_path_relative_to("/abs/a.txt", rel), "/abs/a.txt");
        // A "." root leaves already-rewritten paths untouched.
        assert_eq!(
            make_path_relative_to("common/files/a.txt", Path::new(".")),
            "common/files/a.txt"
        );
    }

    #[test]
    fn test_fix_paths_idempotent_for_neutral_root() {
        let mut component: Component = serde_yaml::from_str(
            r#"
name: app
files:
  - source: common/files/a.txt
    target: /a.txt
"#,
        )
        .unwrap();
        let root = Path::new("/nonexistent");
        fix_paths(&mut component, Path::new("."), root);
        let once = component.clone();
        fix_paths(&mut component, Path::new("."), root);
        assert_eq!(component.files[0].source, once.files[0].source);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("a/../b")), PathBuf::from("b"));
        assert_eq!(normalize_path(Path::new("a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize_path(Path::new("a/..")), PathBuf::from("."));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    #[test]
    fn test_relative_from() {
        assert_eq!(
            relative_from(Path::new("/cache/dirs/abc"), Path::new("/work/pkg")),
            PathBuf::from("../../cache/dirs/abc")
        );
        assert_eq!(
            relative_from(Path::new("/work/pkg/sub"), Path::new("/work/pkg")),
            PathBuf::from("sub")
        );
        assert_eq!(
            relative_from(Path::new("/work/pkg"), Path::new("/work/pkg")),
            PathBuf::from(".")
        );
    }
}
