//! Architecture and local-OS filtering

use airlift_core::{Component, Package};

use crate::error::Result;
use crate::filters::ComponentFilter;

/// Keeps components whose `only` constraints are empty or match the target
/// architecture and local OS exactly.
#[derive(Debug, Clone)]
pub struct ByArchAndOs {
    arch: String,
    os: String,
}

impl ByArchAndOs {
    pub fn new(arch: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            os: os.into(),
        }
    }
}

impl ComponentFilter for ByArchAndOs {
    fn name(&self) -> &'static str {
        "arch-os"
    }

    fn apply(&self, pkg: &Package) -> Result<Vec<Component>> {
        let filtered: Vec<Component> = pkg
            .components
            .iter()
            .filter(|c| {
                let arch_ok = c.only.cluster.architecture.is_empty()
                    || c.only.cluster.architecture == self.arch;
                let os_ok = c.only.local_os.is_empty() || c.only.local_os == self.os;
                arch_ok && os_ok
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

    fn constrained(name: &str, arch: &str, os: &str) -> Component {
        let mut component = Component {
            name: name.to_string(),
            ..Default::default()
        };
        component.only.cluster.architecture = arch.to_string();
        component.only.local_os = os.to_string();
        component
    }

    #[test]
    fn test_filters_by_arch_and_os() {
        let pkg = package_of(vec![
            constrained("any", "", ""),
            constrained("amd-only", "amd64", ""),
            constrained("arm-only", "arm64", ""),
            constrained("mac-only", "", "darwin"),
            constrained("amd-linux", "amd64", "linux"),
        ]);

        let result = ByArchAndOs::new("amd64", "linux").apply(&pkg).unwrap();
        let names: Vec<&str> = result.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["any", "amd-only", "amd-linux"]);
    }
}
