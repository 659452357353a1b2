//! Composition and filtering error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("Cannot build import chain: architecture must be provided")]
    ArchitectureRequired,

    #[error("Invalid import definition in component {component}: {message}")]
    InvalidImport { component: String, message: String },

    #[error("Malformed import chain: cannot import remote components from remote components")]
    TwoHopRemote { component: String },

    #[error("Malformed import chain: cannot import local components from remote components")]
    LocalFromRemote { component: String },

    #[error("Detected circular import chain: {history}")]
    CircularImport { history: String },

    #[error("Component {name} not found in {location}")]
    ComponentNotFound { name: String, location: String },

    #[error("Multiple components named {name} found in {location} satisfying {arch}")]
    MultipleComponentsFound {
        name: String,
        location: String,
        arch: String,
    },

    #[error(
        "Component {component}: only.localOS {existing:?} cannot be redefined as {redefined:?} during compose"
    )]
    LocalOsRedefined {
        component: String,
        existing: String,
        redefined: String,
    },

    #[error("Remote import from {url} failed: {message}")]
    Remote { url: String, message: String },

    #[error("No compatible components found for requested selections: {details}")]
    UnmatchedRequests { details: String },

    #[error(
        "Group {group} already has {first} selected; cannot also select {second} - only one component per group may be deployed"
    )]
    MultipleSelectedInGroup {
        group: String,
        first: String,
        second: String,
    },

    #[error("No default or selected component among the grouped components: {candidates}")]
    NoDefaultOrSelection { candidates: String },

    #[error("Filter {filter} failed: {source}")]
    FilterFailed {
        filter: &'static str,
        #[source]
        source: Box<ComposeError>,
    },

    #[error(transparent)]
    Core(#[from] airlift_core::CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ComposeError>;
