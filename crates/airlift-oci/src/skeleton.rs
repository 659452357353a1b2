//! The content-addressed skeleton cache used by remote imports
//!
//! A remote import pulls the named component's archive out of a published
//! skeleton package into a cache directory keyed by the archive digest (or
//! by a hash of the URL + component name when the component has no archived
//! resources). The composer then rewrites the imported component's relative
//! paths against that directory.

use async_trait::async_trait;
use std::path::PathBuf;

use airlift_compose::{ComposeError, ImportResolver};
use airlift_core::{archive, checksum, Package};

use crate::error::Result;
use crate::registry::{digest_encoded, fetch_package_manifest, locate, PackageRegistry};
use crate::remote::Remote;

/// Default cache root under the user's home directory
pub fn default_cache_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".airlift").join("cache"))
        .unwrap_or_else(|| PathBuf::from(".airlift-cache"))
}

/// Content-addressed cache for skeleton component archives
#[derive(Debug, Clone)]
pub struct SkeletonCache {
    root: PathBuf,
}

impl SkeletonCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Materialize the named component of the published skeleton package
    /// into the cache, returning the absolute directory holding its
    /// contents.
    pub async fn fetch(
        &self,
        registry: &dyn PackageRegistry,
        url: &str,
        component_name: &str,
    ) -> Result<PathBuf> {
        let root = registry.fetch_root().await?;
        let descriptor = locate(&root, &format!("components/{component_name}.tar"));
        let oci_cache = self.root.join("oci");

        let dir = match descriptor {
            None => {
                // All of the component's resources are remote; an empty
                // directory keyed by url + name stands in for the archive.
                let id = checksum::sha256_bytes(format!("{url}{component_name}").as_bytes());
                let dir = oci_cache.join("dirs").join(id);
                std::fs::create_dir_all(&dir)?;
                dir
            }
            Some(descriptor) => {
                let encoded = digest_encoded(&descriptor.digest).to_string();
                let blob = oci_cache.join("blobs").join("sha256").join(&encoded);
                let dir = oci_cache.join("dirs").join(&encoded);

                if !blob.exists() {
                    if let Some(parent) = blob.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    let data = registry.fetch(&descriptor).await?;
                    std::fs::write(&blob, data)?;
                    tracing::debug!(digest = %descriptor.digest, "cached skeleton archive");
                }

                std::fs::create_dir_all(&dir)?;
                // Archives carry a leading <component-name>/ segment.
                archive::untar_strip(&blob, &dir, 1)?;
                dir
            }
        };
        Ok(std::path::absolute(dir)?)
    }
}

/// The production [`ImportResolver`]: opens a remote per URL and caches
/// skeleton archives locally.
#[derive(Debug, Clone)]
pub struct RemoteImportResolver {
    cache: SkeletonCache,
}

impl RemoteImportResolver {
    pub fn new(cache_root: PathBuf) -> Self {
        Self {
            cache: SkeletonCache::new(cache_root),
        }
    }
}

fn remote_error(url: &str, error: impl std::fmt::Display) -> ComposeError {
    ComposeError::Remote {
        url: url.to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl ImportResolver for RemoteImportResolver {
    async fn fetch_manifest(&self, url: &str) -> airlift_compose::Result<Package> {
        let remote = Remote::new(url).map_err(|e| remote_error(url, e))?;
        fetch_package_manifest(&remote)
            .await
            .map_err(|e| remote_error(url, e))
    }

    async fn fetch_skeleton(
        &self,
        url: &str,
        component_name: &str,
    ) -> airlift_compose::Result<PathBuf> {
        let remote = Remote::new(url).map_err(|e| remote_error(url, e))?;
        self.cache
            .fetch(&remote, url, component_name)
            .await
            .map_err(|e| remote_error(url, e))
    }
}
