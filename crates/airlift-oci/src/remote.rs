//! Registry-backed implementation of [`PackageRegistry`]
//!
//! Thin wrapper around `oci-distribution`; authentication is whatever that
//! client supports (anonymous or basic), supplied by the caller.

use async_trait::async_trait;
use oci_distribution::client::{Client, ClientConfig, ClientProtocol, Config, ImageLayer};
use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use oci_distribution::secrets::RegistryAuth;
use oci_distribution::Reference;
use std::path::Path;

use airlift_core::PackageLayout;

use crate::error::{OciError, Result};
use crate::registry::{digest_encoded, media, PackageRegistry};

/// Strip the `oci://` scheme and parse the remainder as a registry
/// reference.
pub fn parse_package_reference(url: &str) -> Result<Reference> {
    let trimmed = url
        .strip_prefix("oci://")
        .ok_or_else(|| OciError::InvalidReference {
            reference: url.to_string(),
            reason: "package references must use the oci:// scheme".to_string(),
        })?;
    trimmed
        .parse::<Reference>()
        .map_err(|e| OciError::InvalidReference {
            reference: url.to_string(),
            reason: e.to_string(),
        })
}

/// A published package in a remote registry
pub struct Remote {
    client: Client,
    reference: Reference,
    auth: RegistryAuth,
}

impl Remote {
    /// Open a remote package with anonymous authentication
    pub fn new(url: &str) -> Result<Self> {
        Self::with_auth(url, RegistryAuth::Anonymous)
    }

    /// Open a remote package with the given authentication
    pub fn with_auth(url: &str, auth: RegistryAuth) -> Result<Self> {
        let reference = parse_package_reference(url)?;
        let config = ClientConfig {
            protocol: ClientProtocol::Https,
            ..Default::default()
        };
        Ok(Self {
            client: Client::new(config),
            reference,
            auth,
        })
    }

    /// The parsed registry reference
    pub fn reference(&self) -> &Reference {
        &self.reference
    }

    /// Publish a local package layout: one blob per layout file annotated
    /// with its relative path, plus a config blob carrying the package
    /// document.
    ///
    /// Returns the pushed manifest URL.
    pub async fn push_package(&self, layout: &PackageLayout) -> Result<String> {
        let mut layers = Vec::new();
        for (path, rel) in layout.files()? {
            let data = std::fs::read(&path)?;
            let mut annotations = std::collections::HashMap::new();
            annotations.insert(media::ANNOTATION_TITLE.to_string(), rel.clone());
            layers.push(ImageLayer {
                data,
                media_type: media::PACKAGE_BLOB.to_string(),
                annotations: Some(annotations),
            });
        }

        let config = Config {
            data: serde_json::to_vec(&layout.pkg)?,
            media_type: media::PACKAGE_CONFIG.to_string(),
            annotations: None,
        };
        let manifest = OciImageManifest::build(&layers, &config, None);

        let response = self
            .client
            .push(
                &self.reference,
                &layers,
                config,
                &self.auth,
                Some(manifest),
            )
            .await?;
        tracing::debug!(url = %response.manifest_url, "pushed package");
        Ok(response.manifest_url)
    }
}

#[async_trait]
impl PackageRegistry for Remote {
    async fn fetch_root(&self) -> Result<OciImageManifest> {
        let (manifest, _digest) = self
            .client
            .pull_image_manifest(&self.reference, &self.auth)
            .await
            .map_err(|e| OciError::RootNotFound {
                url: self.reference.whole(),
                message: e.to_string(),
            })?;
        Ok(manifest)
    }

    async fn fetch(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>> {
        let mut data: Vec<u8> = Vec::new();
        self.client
            .pull_blob(&self.reference, descriptor, &mut data)
            .await?;
        Ok(data)
    }

    async fn push(&self, descriptor: &OciDescriptor, data: Vec<u8>) -> Result<()> {
        self.client
            .push_blob(&self.reference, &data, &descriptor.digest)
            .await?;
        Ok(())
    }

    async fn copy(&self, descriptors: &[OciDescriptor], dest_dir: &Path) -> Result<()> {
        for descriptor in descriptors {
            let data = self.fetch(descriptor).await?;
            // Blobs land at their annotated layout path; image blobs fall
            // back to the content-addressed store.
            let rel = descriptor
                .annotations
                .as_ref()
                .and_then(|a| a.get(media::ANNOTATION_TITLE).cloned())
                .unwrap_or_else(|| {
                    format!(
                        "{}/{}",
                        airlift_core::layout::IMAGES_BLOBS_DIR,
                        digest_encoded(&descriptor.digest)
                    )
                });
            let dest = dest_dir.join(rel);
            if let Some(parent) = dest.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&dest, data).await?;
            tracing::debug!(path = %dest.display(), "materialized package layer");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_package_reference() {
        let reference = parse_package_reference("oci://ghcr.io/org/pkg:1.0.0").unwrap();
        assert_eq!(reference.registry(), "ghcr.io");
        assert_eq!(reference.repository(), "org/pkg");
        assert_eq!(reference.tag(), Some("1.0.0"));
    }

    #[test]
    fn test_parse_rejects_other_schemes() {
        assert!(parse_package_reference("https://ghcr.io/org/pkg").is_err());
        assert!(parse_package_reference("ghcr.io/org/pkg").is_err());
    }
}
