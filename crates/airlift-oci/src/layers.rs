//! Partial layer selection
//!
//! Given a requested subset of component names, compute the minimal set of
//! remote content-addressed layers needed to deploy that subset plus any
//! required components - without fetching the full package.

use oci_distribution::manifest::{OciDescriptor, OciImageIndex, OciImageManifest};
use std::collections::HashSet;

use airlift_core::layout::{
    CHECKSUMS_TXT, IMAGES_BLOBS_DIR, IMAGES_INDEX, OCI_LAYOUT_FILE, PACKAGE_MANIFEST, SBOM_TAR,
    SIGNATURE,
};
use airlift_core::{ImageRef, Package};

use crate::error::{OciError, Result};
use crate::registry::{digest_encoded, locate, locate_required, media, PackageRegistry};

/// Metadata layers pulled for every package, whatever was requested
pub const PACKAGE_ALWAYS_PULL: &[&str] = &[PACKAGE_MANIFEST, CHECKSUMS_TXT, SIGNATURE];

/// Compute the layers required to deploy `requested` (plus required
/// components) from the published package behind `registry`.
///
/// The returned descriptors are deduplicated by digest and include the
/// package metadata files, each selected component's archive, the SBOM
/// archive when present, and - when any selected component carries images -
/// the shared image index/layout plus every manifest, config, and layer
/// blob those images need.
pub async fn assemble_layers(
    registry: &dyn PackageRegistry,
    requested: &[String],
) -> Result<Vec<OciDescriptor>> {
    let root = registry.fetch_root().await?;

    let manifest_layer = locate_required(&root, PACKAGE_MANIFEST)?;
    let manifest_bytes = registry.fetch(&manifest_layer).await?;
    let pkg = Package::parse(std::str::from_utf8(&manifest_bytes).map_err(|e| {
        OciError::Serialization(format!("package manifest is not UTF-8: {e}"))
    })?)?;

    for name in requested {
        if pkg.component(name).is_none() {
            return Err(OciError::ComponentNotFound { name: name.clone() });
        }
    }

    let mut descriptors: Vec<OciDescriptor> = Vec::new();
    for path in PACKAGE_ALWAYS_PULL {
        if let Some(descriptor) = locate(&root, path) {
            descriptors.push(descriptor);
        }
    }

    // Requested plus required components, in package order; images are
    // deduplicated by reference string.
    let mut images: Vec<String> = Vec::new();
    let mut seen_images: HashSet<&str> = HashSet::new();
    for component in &pkg.components {
        if !component.is_required() && !requested.iter().any(|r| r == &component.name) {
            continue;
        }
        for image in &component.images {
            if seen_images.insert(image) {
                images.push(image.clone());
            }
        }
        // A skeleton component with no archived resources has no layer.
        if let Some(descriptor) =
            locate(&root, &format!("components/{}.tar", component.name))
        {
            descriptors.push(descriptor);
        }
    }

    // The SBOM archive is cheap relative to the rest; always include it.
    if let Some(descriptor) = locate(&root, SBOM_TAR) {
        descriptors.push(descriptor);
    }

    if !images.is_empty() {
        descriptors.push(locate_required(&root, IMAGES_INDEX)?);
        descriptors.push(locate_required(&root, OCI_LAYOUT_FILE)?);
        descriptors.extend(layers_from_images(registry, &root, &images).await?);
    }

    let mut seen_digests = HashSet::new();
    descriptors.retain(|d| seen_digests.insert(d.digest.clone()));

    tracing::debug!(
        requested = requested.len(),
        layers = descriptors.len(),
        "assembled partial layer selection"
    );
    Ok(descriptors)
}

/// Resolve each image reference to its manifest inside the package's image
/// index and collect the manifest, config, and layer blobs.
async fn layers_from_images(
    registry: &dyn PackageRegistry,
    root: &OciImageManifest,
    images: &[String],
) -> Result<Vec<OciDescriptor>> {
    let index_layer = locate_required(root, IMAGES_INDEX)?;
    let index: OciImageIndex = serde_json::from_slice(&registry.fetch(&index_layer).await?)?;

    let mut descriptors = Vec::new();
    for image in images {
        let parsed = ImageRef::parse(image)?;
        let reference = parsed.reference();
        let short_reference = parsed.path_and_ref();

        let entry = index
            .manifests
            .iter()
            .find(|entry| {
                let annotated = entry
                    .annotations
                    .as_ref()
                    .and_then(|a| a.get(media::ANNOTATION_BASE_IMAGE_NAME));
                match annotated {
                    Some(name) if name == &reference => true,
                    // Older packages left the registry host off docker.io
                    // image annotations.
                    Some(name) => parsed.host == "docker.io" && name == &short_reference,
                    None => false,
                }
            })
            .ok_or_else(|| OciError::ImageNotFound {
                image: image.clone(),
            })?;

        // Image manifests travel as opaque package blobs, not as
        // independently-typed OCI manifests.
        let manifest_descriptor = OciDescriptor {
            media_type: media::PACKAGE_BLOB.to_string(),
            digest: entry.digest.clone(),
            size: entry.size,
            ..Default::default()
        };
        let image_manifest: OciImageManifest =
            serde_json::from_slice(&registry.fetch(&manifest_descriptor).await?)?;

        let manifest_blob = format!(
            "{IMAGES_BLOBS_DIR}/{}",
            digest_encoded(&manifest_descriptor.digest)
        );
        descriptors.push(locate_required(root, &manifest_blob)?);

        let config_blob = format!(
            "{IMAGES_BLOBS_DIR}/{}",
            digest_encoded(&image_manifest.config.digest)
        );
        descriptors.push(locate_required(root, &config_blob)?);

        for layer in &image_manifest.layers {
            let layer_blob = format!("{IMAGES_BLOBS_DIR}/{}", digest_encoded(&layer.digest));
            descriptors.push(locate_required(root, &layer_blob)?);
        }
    }
    Ok(descriptors)
}
