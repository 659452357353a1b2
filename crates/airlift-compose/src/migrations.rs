//! Deprecated-field migrations applied while walking an import chain
//!
//! Migrations never fail; they rewrite what they can and report the rest as
//! advisory warnings. A package whose build data already records a
//! migration id has been migrated before, so the warning is suppressed.

use airlift_core::{BuildData, Component};

/// Migration id recorded when a legacy `group` key was encountered
pub const DEPRECATED_GROUP: &str = "scoped-group-to-flavor";
/// Migration id recorded when a legacy `cosignKeyPath` was encountered
pub const DEPRECATED_COSIGN_KEY_PATH: &str = "scoped-cosign-key-path";

/// All migration ids, in the order they are applied
pub const ALL_MIGRATIONS: &[&str] = &[DEPRECATED_GROUP, DEPRECATED_COSIGN_KEY_PATH];

/// Rewrite deprecated fields on one component, returning it with any
/// advisory warnings.
pub fn migrate_component(build: &BuildData, component: Component) -> (Component, Vec<String>) {
    let mut warnings = Vec::new();

    if !component.group.is_empty() && !build.migrations.iter().any(|m| m == DEPRECATED_GROUP) {
        warnings.push(format!(
            "Component {:?} is using the deprecated group key {:?}; define a variant with only.flavor instead",
            component.name, component.group
        ));
    }

    if !component.cosign_key_path.is_empty()
        && !build
            .migrations
            .iter()
            .any(|m| m == DEPRECATED_COSIGN_KEY_PATH)
    {
        warnings.push(format!(
            "Component {:?} is using the deprecated cosignKeyPath key; supply the key at deploy time instead",
            component.name
        ));
    }

    (component, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_warns_on_group() {
        let component = Component {
            name: "db".to_string(),
            group: "database".to_string(),
            ..Default::default()
        };
        let (migrated, warnings) = migrate_component(&BuildData::default(), component);
        assert_eq!(migrated.group, "database");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("deprecated group"));
    }

    #[test]
    fn test_migrate_silent_when_already_recorded() {
        let build = BuildData {
            migrations: vec![DEPRECATED_GROUP.to_string()],
            ..Default::default()
        };
        let component = Component {
            name: "db".to_string(),
            group: "database".to_string(),
            ..Default::default()
        };
        let (_, warnings) = migrate_component(&build, component);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_migrate_clean_component_is_untouched() {
        let component = Component {
            name: "clean".to_string(),
            ..Default::default()
        };
        let (migrated, warnings) = migrate_component(&BuildData::default(), component);
        assert!(warnings.is_empty());
        assert_eq!(migrated.name, "clean");
    }
}
