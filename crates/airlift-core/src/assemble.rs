//! Materialize a composed package into a layout directory
//!
//! Assembly copies every component's local resources into a per-component
//! staging tree, archives each tree as `components/<name>.tar`, and leaves
//! the layout ready for checksum generation and signing. Remote resources
//! (URLs) are recorded in the manifest but fetched by collaborators, not
//! here.

use std::path::Path;

use crate::archive;
use crate::component::Component;
use crate::error::Result;
use crate::layout::{PackageLayout, COMPONENTS_DIR};
use crate::package::Package;
use crate::reference::is_url;

/// Assemble a composed package into `staging_dir`, returning the layout
/// with its checksums written and the aggregate checksum recorded.
///
/// `package_root` anchors the relative resource paths produced by
/// composition.
pub fn assemble_package(
    pkg: Package,
    package_root: &Path,
    staging_dir: &Path,
) -> Result<PackageLayout> {
    std::fs::create_dir_all(staging_dir.join(COMPONENTS_DIR))?;

    for component in &pkg.components {
        assemble_component(component, package_root, staging_dir)?;
    }

    let mut layout = PackageLayout::new(staging_dir.to_path_buf(), pkg);
    layout.write_checksums()?;
    Ok(layout)
}

/// Copy one component's local resources into a staging tree and archive it
fn assemble_component(
    component: &Component,
    package_root: &Path,
    staging_dir: &Path,
) -> Result<()> {
    let component_dir = staging_dir.join(".staging").join(&component.name);
    std::fs::create_dir_all(&component_dir)?;

    for (index, file) in component.files.iter().enumerate() {
        if is_url(&file.source) {
            continue;
        }
        let source = package_root.join(&file.source);
        let dest = component_dir
            .join("files")
            .join(index.to_string())
            .join(file_name_of(&file.source));
        copy_recursive(&source, &dest)?;
        if file.executable {
            set_executable(&dest)?;
        }
    }

    for chart in &component.charts {
        if !chart.local_path.is_empty() && !is_url(&chart.local_path) {
            let dest = component_dir.join("charts").join(&chart.name);
            copy_recursive(&package_root.join(&chart.local_path), &dest)?;
        }
        for (index, values_file) in chart.values_files.iter().enumerate() {
            if is_url(values_file) {
                continue;
            }
            let dest = component_dir
                .join("values")
                .join(format!("{}-{index}.yaml", chart.name));
            copy_recursive(&package_root.join(values_file), &dest)?;
        }
    }

    for manifest in &component.manifests {
        for (index, file) in manifest.files.iter().enumerate() {
            if is_url(file) {
                continue;
            }
            let dest = component_dir
                .join("manifests")
                .join(format!("{}-{index}.yaml", manifest.name));
            copy_recursive(&package_root.join(file), &dest)?;
        }
        for (index, kustomization) in manifest.kustomizations.iter().enumerate() {
            if is_url(kustomization) {
                continue;
            }
            let dest = component_dir
                .join("manifests")
                .join(format!("kustomize-{}-{index}", manifest.name));
            copy_recursive(&package_root.join(kustomization), &dest)?;
        }
    }

    for (index, injection) in component.data_injections.iter().enumerate() {
        if is_url(&injection.source) {
            continue;
        }
        let dest = component_dir
            .join("data")
            .join(index.to_string())
            .join(file_name_of(&injection.source));
        copy_recursive(&package_root.join(&injection.source), &dest)?;
    }

    let tarball = staging_dir
        .join(COMPONENTS_DIR)
        .join(format!("{}.tar", component.name));
    archive::tar_dir(&component_dir, &component.name, &tarball)?;
    std::fs::remove_dir_all(staging_dir.join(".staging"))?;
    Ok(())
}

fn file_name_of(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// Copy a file or directory tree
pub fn copy_recursive(source: &Path, dest: &Path) -> Result<()> {
    if source.is_dir() {
        std::fs::create_dir_all(dest)?;
        for entry in std::fs::read_dir(source)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, dest)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}
