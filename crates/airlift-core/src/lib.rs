//! Airlift Core - types and engines for the air-gap Kubernetes package
//! manager
//!
//! This crate provides the foundational pieces used throughout airlift:
//! - `Package` / `Component`: the package manifest data model
//! - `PackageLayout`: the canonical on-disk package layout
//! - `checksum`: deterministic integrity manifest generation/validation
//! - `signature`: detached minisign signing and verification
//! - `split`: chunked transport for oversized package archives
//! - `archive`: tar/zstd helpers shared by the layout and transports
//! - `reference`: image and git reference parsing
//!
//! Everything here is synchronous and holds no shared mutable state;
//! independent packages can be processed concurrently without coordination.

pub mod archive;
pub mod assemble;
pub mod checksum;
pub mod component;
pub mod error;
pub mod layout;
pub mod package;
pub mod reference;
pub mod signature;
pub mod split;

pub use assemble::assemble_package;
pub use component::{
    Action, ActionDefaults, ActionSet, Chart, Component, ComponentActions, ComponentImport,
    ComponentOnly, DataInjection, File, HealthCheck, Manifest, OnlyCluster,
};
pub use error::{CoreError, Result};
pub use layout::{LayoutOptions, PackageLayout};
pub use package::{BuildData, Constant, Metadata, Package, PackageKind, Variable};
pub use reference::{GitRefKind, ImageRef};
pub use split::SplitHeader;
