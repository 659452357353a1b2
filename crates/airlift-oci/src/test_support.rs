//! In-memory registry fake shared by the crate's tests

use async_trait::async_trait;
use oci_distribution::manifest::{OciDescriptor, OciImageManifest};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{OciError, Result};
use crate::registry::{media, PackageRegistry};

/// Build a root package manifest whose layers carry title annotations
pub(crate) fn root_manifest(layers: &[(&str, &str, i64)]) -> OciImageManifest {
    let layer_values: Vec<serde_json::Value> = layers
        .iter()
        .map(|(title, digest, size)| {
            serde_json::json!({
                "mediaType": media::PACKAGE_BLOB,
                "digest": format!("sha256:{digest}"),
                "size": size,
                "annotations": { media::ANNOTATION_TITLE: title },
            })
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "schemaVersion": 2,
        "mediaType": "application/vnd.oci.image.manifest.v1+json",
        "config": {
            "mediaType": media::PACKAGE_CONFIG,
            "digest": "sha256:00",
            "size": 2,
        },
        "layers": layer_values,
    }))
    .expect("static manifest")
}

/// A registry fake backed by a digest-keyed blob map
pub(crate) struct FakeRegistry {
    pub root: OciImageManifest,
    pub blobs: HashMap<String, Vec<u8>>,
}

impl FakeRegistry {
    pub fn new(root: OciImageManifest) -> Self {
        Self {
            root,
            blobs: HashMap::new(),
        }
    }

    pub fn with_blob(mut self, digest: &str, data: impl Into<Vec<u8>>) -> Self {
        self.blobs.insert(format!("sha256:{digest}"), data.into());
        self
    }
}

#[async_trait]
impl PackageRegistry for FakeRegistry {
    async fn fetch_root(&self) -> Result<OciImageManifest> {
        Ok(self.root.clone())
    }

    async fn fetch(&self, descriptor: &OciDescriptor) -> Result<Vec<u8>> {
        self.blobs
            .get(&descriptor.digest)
            .cloned()
            .ok_or_else(|| OciError::Registry {
                message: format!("blob {} not found", descriptor.digest),
            })
    }

    async fn push(&self, _descriptor: &OciDescriptor, _data: Vec<u8>) -> Result<()> {
        Ok(())
    }

    async fn copy(&self, descriptors: &[OciDescriptor], dest_dir: &Path) -> Result<()> {
        for descriptor in descriptors {
            let data = self.fetch(descriptor).await?;
            let rel = descriptor
                .annotations
                .as_ref()
                .and_then(|a| a.get(media::ANNOTATION_TITLE).cloned())
                .unwrap_or_else(|| {
                    format!(
                        "images/blobs/sha256/{}",
                        crate::registry::digest_encoded(&descriptor.digest)
                    )
                });
            let dest = dest_dir.join(rel);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(dest, data)?;
        }
        Ok(())
    }
}
