//! Package definition and loading
//!
//! A package is the unit of air-gapped delivery: metadata, build provenance,
//! an ordered list of components, and package-level variables/constants,
//! declared in a `zarf.yaml` manifest at the package root.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::component::Component;
use crate::error::{CoreError, Result};
use crate::layout::PACKAGE_MANIFEST;

/// Allowed shape for package and component names
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*$").expect("static pattern"));

/// Package type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PackageKind {
    /// A regular deployable package
    #[default]
    PackageConfig,
    /// The cluster bootstrap package
    InitConfig,
}

/// A package manifest document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    /// Package type
    #[serde(default)]
    pub kind: PackageKind,

    /// Package metadata
    pub metadata: Metadata,

    /// Generated build provenance (written at create time)
    #[serde(default, skip_serializing_if = "BuildData::is_empty")]
    pub build: BuildData,

    /// Components to deploy, in order
    #[serde(default)]
    pub components: Vec<Component>,

    /// Constant template values applied on deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constants: Vec<Constant>,

    /// Variable template values applied on deploy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<Variable>,
}

/// Package metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Package name (required)
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Free-form package version set by the package author
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Link to package information when online
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Disable compression of this package
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uncompressed: bool,

    /// The target cluster architecture for this package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    /// Comma-separated list of package authors
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub authors: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub documentation: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,

    /// Name of the distributing entity, organization or individual
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vendor: String,

    /// SHA256 of the checksums file covering all package layers
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub aggregate_checksum: String,

    /// Arbitrary package annotations
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// Build provenance recorded at package create time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildData {
    /// Hostname of the machine that created this package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub terminal: String,

    /// Username that created this package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,

    /// Architecture this package was created for
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub architecture: String,

    /// RFC 1123 timestamp of package creation
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timestamp: String,

    /// Tool version used to build this package
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// Migrations applied while composing this package
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub migrations: Vec<String>,

    /// Whether this package was created as a differential against a
    /// reference package
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub differential: bool,

    /// Version of the reference package a differential build was based on
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub differential_package_version: String,

    /// Components excluded entirely by differential packaging
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differential_missing: Vec<String>,

    /// Build flavor used to select component variants
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flavor: String,
}

impl BuildData {
    pub fn is_empty(&self) -> bool {
        self == &BuildData::default()
    }
}

/// An interactive template value resolved at deploy time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default: String,

    /// Prompt the user for this value when not supplied
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub prompt: bool,

    /// Redact this value from logs
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
}

/// A constant template value fixed at create time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constant {
    pub name: String,

    pub value: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl Package {
    /// Load a package manifest from the directory containing it
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let manifest_path = dir.as_ref().join(PACKAGE_MANIFEST);
        if !manifest_path.exists() {
            return Err(CoreError::ManifestNotFound {
                path: manifest_path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(&manifest_path)?;
        Self::parse(&content)
    }

    /// Parse a package manifest from its YAML representation
    pub fn parse(content: &str) -> Result<Self> {
        let pkg: Package = serde_yaml::from_str(content)?;
        if pkg.metadata.name.is_empty() {
            return Err(CoreError::InvalidManifest {
                message: "package must have a metadata.name".to_string(),
            });
        }
        Ok(pkg)
    }

    /// Write the package manifest into the given directory
    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(dir.as_ref().join(PACKAGE_MANIFEST), content)?;
        Ok(())
    }

    /// Whether this package is the cluster bootstrap package
    #[inline]
    pub fn is_init_config(&self) -> bool {
        self.kind == PackageKind::InitConfig
    }

    /// Whether any component carries container images
    pub fn has_images(&self) -> bool {
        self.components.iter().any(|c| !c.images.is_empty())
    }

    /// Whether the package has contents an SBOM can describe
    pub fn is_sbom_able(&self) -> bool {
        self.components
            .iter()
            .any(|c| !c.images.is_empty() || !c.files.is_empty() || !c.data_injections.is_empty())
    }

    /// Look up a component by name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    /// The architecture this package targets (build data wins over metadata)
    pub fn architecture(&self) -> &str {
        if !self.build.architecture.is_empty() {
            &self.build.architecture
        } else {
            &self.metadata.architecture
        }
    }

    /// Validate the package definition.
    ///
    /// Returns advisory warnings for deprecated-but-accepted fields; hard
    /// errors cover malformed names, duplicate components, and inconsistent
    /// group declarations.
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut warnings = Vec::new();

        if !NAME_PATTERN.is_match(&self.metadata.name) {
            return Err(CoreError::InvalidManifest {
                message: format!(
                    "package name {:?} must be lowercase alphanumeric with dashes",
                    self.metadata.name
                ),
            });
        }

        let mut seen = HashSet::new();
        let mut group_defaults: HashMap<&str, &str> = HashMap::new();
        for component in &self.components {
            if !NAME_PATTERN.is_match(&component.name) {
                return Err(CoreError::InvalidManifest {
                    message: format!(
                        "component name {:?} must be lowercase alphanumeric with dashes",
                        component.name
                    ),
                });
            }
            if !seen.insert(component.name.as_str()) {
                return Err(CoreError::InvalidManifest {
                    message: format!("component {:?} is declared more than once", component.name),
                });
            }
            if !component.group.is_empty() {
                warnings.push(format!(
                    "component {:?} uses the deprecated group key; use only.flavor instead",
                    component.name
                ));
                if component.is_required() {
                    return Err(CoreError::InvalidManifest {
                        message: format!(
                            "component {:?} cannot be both grouped and required",
                            component.name
                        ),
                    });
                }
                if component.default {
                    if let Some(existing) =
                        group_defaults.insert(component.group.as_str(), component.name.as_str())
                    {
                        return Err(CoreError::InvalidManifest {
                            message: format!(
                                "group {:?} has multiple defaults: {} and {}",
                                component.group, existing, component.name
                            ),
                        });
                    }
                }
            }
        }

        Ok(warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
kind: PackageConfig
metadata:
  name: example
  version: 0.1.0
components:
  - name: base
    required: true
"#;

    #[test]
    fn test_package_parse() {
        let pkg = Package::parse(MINIMAL).unwrap();
        assert_eq!(pkg.metadata.name, "example");
        assert_eq!(pkg.kind, PackageKind::PackageConfig);
        assert_eq!(pkg.components.len(), 1);
        assert!(pkg.components[0].is_required());
    }

    #[test]
    fn test_package_parse_requires_name() {
        let err = Package::parse("metadata: {}\ncomponents: []\n").unwrap_err();
        assert!(err.to_string().contains("metadata.name"));
    }

    #[test]
    fn test_package_load_missing_manifest() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = Package::load(temp.path()).unwrap_err();
        assert!(matches!(err, CoreError::ManifestNotFound { .. }));
    }

    #[test]
    fn test_package_save_roundtrip() {
        let temp = tempfile::TempDir::new().unwrap();
        let pkg = Package::parse(MINIMAL).unwrap();
        pkg.save(temp.path()).unwrap();
        let loaded = Package::load(temp.path()).unwrap();
        assert_eq!(loaded.metadata.name, pkg.metadata.name);
        assert_eq!(loaded.components.len(), 1);
    }

    #[test]
    fn test_validate_rejects_duplicate_components() {
        let yaml = r#"
metadata:
  name: dupes
components:
  - name: one
  - name: one
"#;
        let pkg = Package::parse(yaml).unwrap();
        let err = pkg.validate().unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let yaml = "metadata:\n  name: Has_Caps\ncomponents: []\n";
        let pkg = Package::parse(yaml).unwrap();
        assert!(pkg.validate().is_err());
    }

    #[test]
    fn test_validate_group_rules() {
        let yaml = r#"
metadata:
  name: grouped
components:
  - name: one
    group: db
    default: true
  - name: two
    group: db
    default: true
"#;
        let pkg = Package::parse(yaml).unwrap();
        let err = pkg.validate().unwrap_err();
        assert!(err.to_string().contains("multiple defaults"));

        let yaml = r#"
metadata:
  name: grouped
components:
  - name: one
    group: db
"#;
        let pkg = Package::parse(yaml).unwrap();
        let warnings = pkg.validate().unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deprecated group"));
    }

    #[test]
    fn test_architecture_prefers_build_data() {
        let mut pkg = Package::parse(MINIMAL).unwrap();
        pkg.metadata.architecture = "amd64".to_string();
        assert_eq!(pkg.architecture(), "amd64");
        pkg.build.architecture = "arm64".to_string();
        assert_eq!(pkg.architecture(), "arm64");
    }
}
