//! Component definition - the independently selectable unit of a package

use serde::{Deserialize, Serialize};

/// A named, independently selectable unit of deployable resources inside a
/// package.
///
/// Components are immutable once composed; the import-chain composer produces
/// a fresh flattened component on every composition pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// Component name (unique within a package)
    pub name: String,

    /// Description shown during deploy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Default Y/N state for installing this component on deploy
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,

    /// Required components are always selected and never prompted for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Filters restricting when this component is included
    #[serde(default, skip_serializing_if = "ComponentOnly::is_empty")]
    pub only: ComponentOnly,

    /// Legacy selector group; components sharing a group are mutually
    /// exclusive at deploy time
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub group: String,

    /// Legacy path to a public key used to validate signed online resources
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cosign_key_path: String,

    /// Import a component from another package manifest
    #[serde(default, skip_serializing_if = "ComponentImport::is_empty")]
    pub import: ComponentImport,

    /// Raw Kubernetes manifests deployed as a generated chart
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub manifests: Vec<Manifest>,

    /// Helm charts to install during deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<Chart>,

    /// Datasets to inject into a container in the target cluster
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data_injections: Vec<DataInjection>,

    /// Files or folders to place on disk during deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<File>,

    /// OCI images to include in the package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,

    /// Git repositories to include in the package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repos: Vec<String>,

    /// Lifecycle command hooks
    #[serde(default, skip_serializing_if = "ComponentActions::is_empty")]
    pub actions: ComponentActions,

    /// Cluster resources to wait on after deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub health_checks: Vec<HealthCheck>,
}

impl Component {
    /// Whether this component must always be deployed
    #[inline]
    pub fn is_required(&self) -> bool {
        self.required.unwrap_or(false)
    }

    /// Whether this component declares an import reference
    #[inline]
    pub fn has_import(&self) -> bool {
        !self.import.is_empty()
    }

    /// The name of the component to import (defaults to this component's
    /// own name when no explicit rename is given)
    pub fn import_name(&self) -> &str {
        if self.import.name.is_empty() {
            &self.name
        } else {
            &self.import.name
        }
    }

    /// Whether this component is compatible with the given architecture and
    /// flavor under its `only` constraints
    pub fn is_compatible(&self, arch: &str, flavor: &str) -> bool {
        let satisfies_arch = self.only.cluster.architecture.is_empty()
            || self.only.cluster.architecture == arch;
        let satisfies_flavor = self.only.flavor.is_empty() || self.only.flavor == flavor;
        satisfies_arch && satisfies_flavor
    }
}

/// Inclusion filters for a component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOnly {
    /// Only deploy this component from the given local OS
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_os: String,

    /// Cluster-side restrictions
    #[serde(default, skip_serializing_if = "OnlyCluster::is_empty")]
    pub cluster: OnlyCluster,

    /// Only include this component when a matching build flavor is requested
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
}

impl ComponentOnly {
    pub fn is_empty(&self) -> bool {
        self.local_os.is_empty() && self.cluster.is_empty() && self.flavor.is_empty()
    }
}

/// Cluster architecture and distribution restrictions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlyCluster {
    /// Only create and deploy to clusters of the given architecture
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    /// Kubernetes distributions this component works with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distros: Vec<String>,
}

impl OnlyCluster {
    pub fn is_empty(&self) -> bool {
        self.architecture.is_empty() && self.distros.is_empty()
    }
}

/// An import reference to a component in another package manifest.
///
/// Exactly one of `path` (local directory) or `url` (OCI skeleton package)
/// must be set when an import is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentImport {
    /// Name of the component to import (defaults to the importing
    /// component's name)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    /// Relative path to the directory containing the package manifest
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,

    /// `oci://` URL of a published skeleton package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl ComponentImport {
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.path.is_empty() && self.url.is_empty()
    }
}

/// A file or folder to place on disk during deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    /// Local path or remote URL to pull into the package
    pub source: String,

    /// Optional SHA256 checksum of the file
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub shasum: String,

    /// Destination path during deploy
    pub target: String,

    /// Make the file executable during deploy
    #[serde(default, skip_serializing_if = "is_false")]
    pub executable: bool,

    /// Symlinks to create pointing at the target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub symlinks: Vec<String>,

    /// File or folder to extract from a `source` archive
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub extract_path: String,
}

/// A Helm chart to install during deploy
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chart {
    /// Name of the chart within the package (unique per component)
    pub name: String,

    /// Chart version to deploy
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Chart repository, OCI registry, or git URL hosting the chart
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Name of the chart within a Helm repository (defaults to `name`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub repo_name: String,

    /// Sub directory to the chart within a git repo
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub git_path: String,

    /// Path to a local chart folder or archive
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub local_path: String,

    /// Namespace to deploy the chart to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Helm release name (defaults to `name`)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub release_name: String,

    /// Skip waiting for chart resources to become ready
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_wait: bool,

    /// Values file paths or URLs merged together on deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_files: Vec<String>,
}

/// A collection of raw Kubernetes manifests deployed as one generated chart
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Name of the manifest collection (unique per component)
    pub name: String,

    /// Namespace to deploy the manifests to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Local YAML files or remote URLs to deploy, in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Allow kustomizations to traverse above the current directory
    #[serde(default, skip_serializing_if = "is_false")]
    pub kustomize_allow_any_directory: bool,

    /// Local kustomization paths or remote URLs to include
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kustomizations: Vec<String>,

    /// Skip waiting for manifest resources to become ready
    #[serde(default, skip_serializing_if = "is_false")]
    pub no_wait: bool,
}

/// A dataset to inject into a container in the target cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInjection {
    /// Local folder/file path or remote URL of the data to inject
    pub source: String,

    /// The pod and container to inject into
    pub target: DataInjectionTarget,

    /// Compress the data with gzip before transmitting
    #[serde(default, skip_serializing_if = "is_false")]
    pub compress: bool,
}

/// The pod + container targeted by a data injection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInjectionTarget {
    pub namespace: String,
    pub selector: String,
    pub container: String,
    pub path: String,
}

/// Lifecycle action sets keyed by package operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentActions {
    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_create: ActionSet,

    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_deploy: ActionSet,

    #[serde(default, skip_serializing_if = "ActionSet::is_empty")]
    pub on_remove: ActionSet,
}

impl ComponentActions {
    pub fn is_empty(&self) -> bool {
        self.on_create.is_empty() && self.on_deploy.is_empty() && self.on_remove.is_empty()
    }
}

/// Actions to run around one package operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionSet {
    /// Default configuration for all actions in this set
    #[serde(default, skip_serializing_if = "ActionDefaults::is_empty")]
    pub defaults: ActionDefaults,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<Action>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<Action>,
}

impl ActionSet {
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty()
            && self.before.is_empty()
            && self.after.is_empty()
            && self.on_success.is_empty()
            && self.on_failure.is_empty()
    }
}

/// Default configuration applied to every action in a set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefaults {
    #[serde(default, skip_serializing_if = "is_false")]
    pub mute: bool,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_total_seconds: u64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub max_retries: u64,

    /// Working directory for commands (defaults to the package root)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dir: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
}

impl ActionDefaults {
    pub fn is_empty(&self) -> bool {
        !self.mute
            && self.max_total_seconds == 0
            && self.max_retries == 0
            && self.dir.is_empty()
            && self.env.is_empty()
    }
}

/// A single command run during a package operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mute: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_seconds: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u64>,

    /// Working directory to run the command in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// The command to run
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cmd: String,

    /// Description displayed during execution instead of the command
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// A cluster resource to wait on after a component deploys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthCheck {
    pub api_version: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    pub name: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(n: &u64) -> bool {
    *n == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_deserialize_minimal() {
        let yaml = "name: base\n";
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(component.name, "base");
        assert!(!component.is_required());
        assert!(!component.has_import());
    }

    #[test]
    fn test_component_import_name_defaults_to_own_name() {
        let yaml = r#"
name: flux
import:
  path: ../common
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(component.import_name(), "flux");

        let yaml = r#"
name: flux
import:
  name: flux-base
  path: ../common
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(component.import_name(), "flux-base");
    }

    #[test]
    fn test_component_compatibility() {
        let yaml = r#"
name: amd-only
only:
  cluster:
    architecture: amd64
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert!(component.is_compatible("amd64", ""));
        assert!(!component.is_compatible("arm64", ""));

        let yaml = r#"
name: flavored
only:
  flavor: upstream
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert!(component.is_compatible("amd64", "upstream"));
        assert!(!component.is_compatible("amd64", "registry1"));
    }

    #[test]
    fn test_component_roundtrip_skips_empty_fields() {
        let component = Component {
            name: "tiny".to_string(),
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&component).unwrap();
        assert_eq!(yaml.trim(), "name: tiny");
    }

    #[test]
    fn test_actions_deserialize() {
        let yaml = r#"
name: hooks
actions:
  onDeploy:
    defaults:
      dir: scripts
    before:
      - cmd: ./setup.sh
    onSuccess:
      - cmd: echo done
        description: Celebrate
"#;
        let component: Component = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(component.actions.on_deploy.defaults.dir, "scripts");
        assert_eq!(component.actions.on_deploy.before.len(), 1);
        assert_eq!(component.actions.on_deploy.on_success[0].description, "Celebrate");
        assert!(component.actions.on_create.is_empty());
    }
}
