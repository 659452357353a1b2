//! Airlift Compose - import-chain composition and component filtering
//!
//! This crate implements the two narrowing pipelines of the package
//! engine:
//!
//! - **Composition**: each top-level component may import a component from
//!   another package manifest, locally or from a registry-published
//!   skeleton. [`ImportChain`] resolves that single-parent chain and
//!   flattens it into one component with merged resources and rewritten
//!   paths.
//! - **Filtering**: [`filters`] holds the stateless strategies that narrow
//!   a package's component list at build and deploy time.
//!
//! Registry access is abstracted behind [`ImportResolver`]; the OCI crate
//! provides the production implementation.

pub mod chain;
pub mod compose;
pub mod error;
pub mod filters;
pub mod migrations;
pub mod resolver;

pub use chain::ImportChain;
pub use compose::{compose_package, ComposeContext};
pub use error::{ComposeError, Result};
pub use filters::{
    ByArchAndOs, ByDifferential, BySelectState, ComponentFilter, Empty, FilterChain, ForDeploy,
};
pub use resolver::{ImportResolver, LocalOnlyResolver};
