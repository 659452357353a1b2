//! The registry abstraction consumed by the layer selector, the skeleton
//! cache, and the package sources
//!
//! The engine only ever needs four registry operations - resolve the root
//! manifest, fetch a blob, push a blob, and copy blobs into a local layout.
//! Everything else (package manifests, image indexes) is decoded client
//! side from fetched blobs.

use async_trait::async_trait;
use oci_distribution::manifest::{OciDescriptor, OciImageIndex, OciImageManifest};
use std::path::Path;

use airlift_core::layout::{IMAGES_INDEX, PACKAGE_MANIFEST};
use airlift_core::Package;

use crate::error::{OciError, Result};

/// Media types and annotation keys used by published packages
pub mod media {
    /// Package root config blob
    pub const PACKAGE_CONFIG: &str = "application/vnd.airlift.config.v1+json";
    /// Opaque package layer blob; image manifests inside a package are
    /// reclassified to this type since they are transported as package
    /// blobs, not as independently-typed OCI manifests
    pub const PACKAGE_BLOB: &str = "application/vnd.airlift.layer.v1.blob";
    /// Annotation carrying a layer's path within the package layout
    pub const ANNOTATION_TITLE: &str = "org.opencontainers.image.title";
    /// Annotation carrying an image layer's original reference
    pub const ANNOTATION_BASE_IMAGE_NAME: &str = "org.opencontainers.image.base.name";
}

/// The four registry operations the package engine depends on
#[async_trait]
pub trait PackageRegistry: Send + Sync {
    /// Resolve and fetch the root manifest of the published package
    async fn fetch_root(&self) -> Result<OciImageManifest>;

    /// Fetch one content-addressed blob
    async fn fetch(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>>;

    /// Push one content-addressed blob
    async fn push(&self, descriptor: &OciDescriptor, data: Vec<u8>) -> Result<()>;

    /// Copy the given blobs into a local directory, materializing each at
    /// its annotated layout path.
    async fn copy(&self, descriptors: &[OciDescriptor], dest_dir: &Path) -> Result<()>;
}

/// Find the layer whose title annotation matches the given layout path
pub fn locate(root: &OciImageManifest, path: &str) -> Option<OciDescriptor> {
    root.layers
        .iter()
        .find(|layer| {
            layer
                .annotations
                .as_ref()
                .and_then(|a| a.get(media::ANNOTATION_TITLE))
                .is_some_and(|title| title == path)
        })
        .cloned()
}

/// Like [`locate`], but a missing layer is an error naming the path
pub fn locate_required(root: &OciImageManifest, path: &str) -> Result<OciDescriptor> {
    locate(root, path).ok_or_else(|| OciError::LayerNotFound {
        path: path.to_string(),
    })
}

/// The hex portion of an OCI digest string (`sha256:<hex>` -> `<hex>`)
pub fn digest_encoded(digest: &str) -> &str {
    digest.split_once(':').map(|(_, hex)| hex).unwrap_or(digest)
}

/// Fetch and decode the package manifest published as the `zarf.yaml`
/// layer.
pub async fn fetch_package_manifest(registry: &dyn PackageRegistry) -> Result<Package> {
    let root = registry.fetch_root().await?;
    let descriptor = locate_required(&root, PACKAGE_MANIFEST)?;
    let bytes = registry.fetch(&descriptor).await?;
    let pkg = Package::parse(std::str::from_utf8(&bytes).map_err(|e| {
        OciError::Serialization(format!("package manifest is not UTF-8: {e}"))
    })?)?;
    Ok(pkg)
}

/// Fetch and decode the package's image index (`images/index.json` layer)
pub async fn fetch_image_index(registry: &dyn PackageRegistry) -> Result<OciImageIndex> {
    let root = registry.fetch_root().await?;
    let descriptor = locate_required(&root, IMAGES_INDEX)?;
    let bytes = registry.fetch(&descriptor).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
