//! Image and git reference parsing
//!
//! The differential filter and the partial layer selector both need to
//! compare references exactly as they were written by package authors, so
//! parsing normalizes but never rewrites the original string.

use crate::error::{CoreError, Result};

/// Floating image tags whose content can change between builds; these are
/// always re-included by differential builds.
pub const FLOATING_TAGS: &[&str] = &["latest", "stable", "nightly"];

/// A parsed container image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// Registry host (defaults to `docker.io`)
    pub host: String,
    /// Repository path (short Docker Hub names gain the `library/` prefix)
    pub path: String,
    /// Tag, when referenced by tag
    pub tag: Option<String>,
    /// Digest, when pinned by digest
    pub digest: Option<String>,
}

impl ImageRef {
    /// Parse an image reference, normalizing the registry host and Docker
    /// Hub library paths.
    pub fn parse(reference: &str) -> Result<Self> {
        if reference.is_empty() {
            return Err(CoreError::InvalidImageRef {
                reference: reference.to_string(),
                message: "reference is empty".to_string(),
            });
        }

        let (remainder, digest) = match reference.split_once('@') {
            Some((rest, digest)) => {
                if !digest.starts_with("sha256:") {
                    return Err(CoreError::InvalidImageRef {
                        reference: reference.to_string(),
                        message: "digest must use sha256".to_string(),
                    });
                }
                (rest, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        // A ':' after the last '/' separates the tag from the repository.
        let (remainder, tag) = match remainder.rsplit_once(':') {
            Some((rest, tag)) if !tag.contains('/') => (rest, Some(tag.to_string())),
            _ => (remainder, None),
        };

        let (host, path) = match remainder.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            Some(_) => ("docker.io".to_string(), remainder.to_string()),
            None => ("docker.io".to_string(), format!("library/{remainder}")),
        };

        if path.is_empty() {
            return Err(CoreError::InvalidImageRef {
                reference: reference.to_string(),
                message: "reference has no repository path".to_string(),
            });
        }

        let tag = match (&tag, &digest) {
            (None, None) => Some("latest".to_string()),
            _ => tag,
        };

        Ok(Self {
            host,
            path,
            tag,
            digest,
        })
    }

    /// The fully normalized reference string
    pub fn reference(&self) -> String {
        format!("{}/{}{}", self.host, self.path, self.tag_or_digest())
    }

    /// The `:tag` or `@digest` suffix (digest wins when both are present)
    pub fn tag_or_digest(&self) -> String {
        if let Some(digest) = &self.digest {
            format!("@{digest}")
        } else if let Some(tag) = &self.tag {
            format!(":{tag}")
        } else {
            String::new()
        }
    }

    /// The reference without its registry host, as written by older tools
    pub fn path_and_ref(&self) -> String {
        format!("{}{}", self.path, self.tag_or_digest())
    }

    /// Whether the tag is one of the floating tags that must always be
    /// re-fetched
    pub fn has_floating_tag(&self) -> bool {
        self.digest.is_none()
            && self
                .tag
                .as_deref()
                .is_some_and(|t| FLOATING_TAGS.contains(&t))
    }
}

/// How a git repository URL pins its checkout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitRefKind {
    /// No ref - the default branch moves
    None,
    /// An explicit branch ref - moves
    Branch,
    /// A tag - fixed
    Tag,
    /// A commit sha - fixed
    Hash,
}

impl GitRefKind {
    /// Whether the ref can change between fetches
    pub fn is_mutable(self) -> bool {
        matches!(self, GitRefKind::None | GitRefKind::Branch)
    }
}

/// Split a git URL of the form `https://host/repo.git@ref` into the plain
/// URL and the ref portion (empty when no ref is given).
pub fn git_url_split_ref(url: &str) -> (&str, &str) {
    let path_start = match url.find("://") {
        Some(idx) => idx + 3,
        None => 0,
    };
    match url[path_start..].find('@') {
        Some(idx) => {
            let at = path_start + idx;
            (&url[..at], &url[at + 1..])
        }
        None => (url, ""),
    }
}

/// Classify the ref portion of a git URL.
///
/// Bare names are assumed to be tags; full `refs/` paths other than
/// `refs/tags/` are treated as branch-like (mutable).
pub fn classify_git_ref(reference: &str) -> GitRefKind {
    if reference.is_empty() {
        GitRefKind::None
    } else if is_commit_hash(reference) {
        GitRefKind::Hash
    } else if reference.starts_with("refs/tags/") {
        GitRefKind::Tag
    } else if reference.starts_with("refs/") {
        GitRefKind::Branch
    } else {
        GitRefKind::Tag
    }
}

fn is_commit_hash(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether a path string is actually a remote URL that must not be rewritten
pub fn is_url(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://") || path.starts_with("oci://")
}
