//! Airlift OCI - registry transport, partial layer selection, and package
//! sources
//!
//! This crate connects the synchronous package engine to the outside
//! world:
//!
//! - [`PackageRegistry`]: the four registry operations the engine depends
//!   on (resolve root, fetch, push, copy), implemented for real registries
//!   by [`Remote`] over `oci-distribution`.
//! - [`layers`]: computes the minimal layer set needed to deploy a subset
//!   of a published package's components.
//! - [`SkeletonCache`] / [`RemoteImportResolver`]: content-addressed cache
//!   backing the composer's remote imports.
//! - [`PackageSource`]: resolves tarballs, split tarballs, OCI references,
//!   and HTTP URLs into verified local package layouts.

pub mod error;
pub mod layers;
pub mod registry;
pub mod remote;
pub mod skeleton;
pub mod source;

#[cfg(test)]
mod test_support;

pub use error::{OciError, Result};
pub use layers::{assemble_layers, PACKAGE_ALWAYS_PULL};
pub use registry::{fetch_image_index, fetch_package_manifest, locate, media, PackageRegistry};
pub use remote::{parse_package_reference, Remote};
pub use skeleton::{default_cache_root, RemoteImportResolver, SkeletonCache};
pub use source::{pull_selected, PackageSource};
