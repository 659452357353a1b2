//! Remote import resolution
//!
//! The composer only ever touches a registry through this trait; the OCI
//! crate provides the real implementation, and local-only callers (lint,
//! tests) use [`LocalOnlyResolver`].

use async_trait::async_trait;
use std::path::PathBuf;

use airlift_core::Package;

use crate::error::{ComposeError, Result};

/// Resolves registry-hosted package imports for the composer
#[async_trait]
pub trait ImportResolver: Send + Sync {
    /// Fetch the package manifest published at the given `oci://` URL
    async fn fetch_manifest(&self, url: &str) -> Result<Package>;

    /// Materialize the named component's skeleton archive into a
    /// content-addressed cache directory and return that directory's
    /// absolute path.
    ///
    /// A skeleton component with no archived resources still yields an
    /// (empty) directory so relative paths resolve consistently.
    async fn fetch_skeleton(&self, url: &str, component_name: &str) -> Result<PathBuf>;
}

/// Resolver for local-only composition; any remote import is an error
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnlyResolver;

#[async_trait]
impl ImportResolver for LocalOnlyResolver {
    async fn fetch_manifest(&self, url: &str) -> Result<Package> {
        Err(ComposeError::Remote {
            url: url.to_string(),
            message: "remote imports are not available in this context".to_string(),
        })
    }

    async fn fetch_skeleton(&self, url: &str, _component_name: &str) -> Result<PathBuf> {
        Err(ComposeError::Remote {
            url: url.to_string(),
            message: "remote imports are not available in this context".to_string(),
        })
    }
}
