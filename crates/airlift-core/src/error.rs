//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Package manifest not found: {path}")]
    ManifestNotFound { path: String },

    #[error("Invalid package manifest: {message}")]
    InvalidManifest { message: String },

    #[error("Component {name} does not exist in package")]
    ComponentNotFound { name: String },

    #[error("Invalid checksum line: {line}")]
    InvalidChecksumLine { line: String },

    #[error("Invalid checksum for {path}: expected {expected}, received {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid aggregate checksum: expected {expected}, received {actual}")]
    AggregateChecksumMismatch { expected: String, actual: String },

    #[error("Unable to validate checksums - missing file: {path}")]
    MissingFile { path: String },

    #[error("Package contains additional files not present in the checksums: {paths}")]
    UnexpectedFiles { paths: String },

    #[error("Package is signed but no key was provided")]
    SignedButNoKey,

    #[error("A key was provided but the package is not signed")]
    KeyButUnsigned,

    #[error("Package signature did not match the provided key: {message}")]
    SignatureMismatch { message: String },

    #[error("Signing error: {message}")]
    Signing { message: String },

    #[error("Package is missing parts: expected {expected}, found {found}")]
    MissingParts { expected: usize, found: usize },

    #[error("Invalid split header: {message}")]
    InvalidSplitHeader { message: String },

    #[error("Split archive hash mismatch: expected {expected}, received {actual}")]
    SplitHashMismatch { expected: String, actual: String },

    #[error("Unable to split the package archive into multiple files: must be less than 1,000 files")]
    TooManyParts,

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Invalid image reference {reference}: {message}")]
    InvalidImageRef { reference: String, message: String },

    #[error("Package must include a build architecture")]
    MissingArchitecture,

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
