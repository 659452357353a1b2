//! Package sources
//!
//! A source resolves a user-supplied location - local tarball, split
//! tarball, `oci://` reference, or HTTP(S) URL - into a verified local
//! [`PackageLayout`].

use futures::StreamExt;
use std::path::{Path, PathBuf};

use airlift_core::layout::PACKAGE_MANIFEST;
use airlift_core::{split, LayoutOptions, PackageLayout};

use crate::error::{OciError, Result};
use crate::layers::assemble_layers;
use crate::registry::PackageRegistry;
use crate::remote::Remote;

/// Where a package comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    /// A local package tarball
    Tarball(PathBuf),
    /// The header part of a split package
    Split(PathBuf),
    /// A published package in an OCI registry
    Oci(String),
    /// A package tarball behind an HTTP(S) URL
    Http(String),
}

impl PackageSource {
    /// Identify a source from its location string
    pub fn identify(location: &str) -> Result<Self> {
        if location.starts_with("oci://") {
            return Ok(Self::Oci(location.to_string()));
        }
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(Self::Http(location.to_string()));
        }
        let path = Path::new(location);
        if location.ends_with(".part000") {
            return Ok(Self::Split(path.to_path_buf()));
        }
        if path.exists() {
            return Ok(Self::Tarball(path.to_path_buf()));
        }
        Err(OciError::UnknownSource {
            location: location.to_string(),
        })
    }

    /// Materialize the full package into `staging_dir` and load it.
    ///
    /// Returns the verified layout plus any advisory warnings. For partial
    /// OCI pulls use [`pull_selected`] instead.
    pub async fn resolve(
        &self,
        staging_dir: &Path,
        opts: &LayoutOptions,
    ) -> Result<(PackageLayout, Vec<String>)> {
        std::fs::create_dir_all(staging_dir)?;
        match self {
            Self::Tarball(path) => {
                let (layout, warnings) =
                    PackageLayout::load_from_tar(path, &staging_dir.join("pkg"), opts)?;
                Ok((layout, warnings))
            }
            Self::Split(header) => {
                let file_name = header
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default();
                let reassembled = staging_dir.join(file_name.trim_end_matches(".part000"));
                split::assemble(header, &reassembled, None)?;
                let (layout, warnings) =
                    PackageLayout::load_from_tar(&reassembled, &staging_dir.join("pkg"), opts)?;
                Ok((layout, warnings))
            }
            Self::Oci(url) => {
                let remote = Remote::new(url)?;
                let root = remote.fetch_root().await?;
                remote.copy(&root.layers, staging_dir).await?;
                let (layout, warnings) = PackageLayout::load_from_dir(staging_dir, opts)?;
                Ok((layout, warnings))
            }
            Self::Http(url) => {
                let tarball = download(url, staging_dir).await?;
                let (layout, warnings) =
                    PackageLayout::load_from_tar(&tarball, &staging_dir.join("pkg"), opts)?;
                Ok((layout, warnings))
            }
        }
    }
}

/// Pull only the layers needed for the requested components from an OCI
/// source and load the result as a partial package.
///
/// The caller must have confirmed non-interactive semantics before
/// narrowing a pull this way.
pub async fn pull_selected(
    url: &str,
    requested: &[String],
    staging_dir: &Path,
    opts: &LayoutOptions,
) -> Result<(PackageLayout, Vec<String>)> {
    let remote = Remote::new(url)?;
    let layers = assemble_layers(&remote, requested).await?;
    std::fs::create_dir_all(staging_dir)?;
    remote.copy(&layers, staging_dir).await?;

    let opts = LayoutOptions {
        is_partial: true,
        ..opts.clone()
    };
    let (layout, warnings) = PackageLayout::load_from_dir(staging_dir, &opts)?;
    Ok((layout, warnings))
}

/// Stream a remote tarball to disk without materializing it in memory
async fn download(url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = url
        .rsplit('/')
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("package.tar.zst");
    let dest = dest_dir.join(file_name);

    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(OciError::Http {
            url: url.to_string(),
            message: format!("unexpected status {}", response.status()),
        });
    }

    let mut file = std::fs::File::create(&dest)?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        std::io::Write::write_all(&mut file, &chunk)?;
    }
    Ok(dest)
}

/// Whether a directory already looks like an unpacked package layout
pub fn is_layout_dir(path: &Path) -> bool {
    path.join(PACKAGE_MANIFEST).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlift_core::{archive, checksum, Package};
    use tempfile::TempDir;

    fn build_package_tarball(dir: &Path) -> PathBuf {
        let layout_dir = dir.join("layout");
        std::fs::create_dir_all(&layout_dir).unwrap();
        let pkg = Package::parse(
            "metadata:\n  name: demo\n  architecture: amd64\ncomponents:\n  - name: base\n",
        )
        .unwrap();
        pkg.save(&layout_dir).unwrap();
        let mut layout = PackageLayout::new(layout_dir.clone(), pkg);
        layout.write_checksums().unwrap();

        let tarball = dir.join("demo.tar");
        archive::tar_dir_contents(&layout_dir, &tarball).unwrap();
        tarball
    }

    #[test]
    fn test_identify_sources() {
        let temp = TempDir::new().unwrap();
        let tarball = build_package_tarball(temp.path());

        assert_eq!(
            PackageSource::identify("oci://ghcr.io/org/pkg:1.0.0").unwrap(),
            PackageSource::Oci("oci://ghcr.io/org/pkg:1.0.0".to_string())
        );
        assert_eq!(
            PackageSource::identify("https://example.com/p.tar.zst").unwrap(),
            PackageSource::Http("https://example.com/p.tar.zst".to_string())
        );
        assert!(matches!(
            PackageSource::identify("pkg.tar.zst.part000").unwrap(),
            PackageSource::Split(_)
        ));
        assert!(matches!(
            PackageSource::identify(&tarball.display().to_string()).unwrap(),
            PackageSource::Tarball(_)
        ));
        assert!(matches!(
            PackageSource::identify("no/such/file.tar").unwrap_err(),
            OciError::UnknownSource { .. }
        ));
    }

    #[tokio::test]
    async fn test_resolve_tarball() {
        let temp = TempDir::new().unwrap();
        let tarball = build_package_tarball(temp.path());

        let staging = TempDir::new().unwrap();
        let source = PackageSource::identify(&tarball.display().to_string()).unwrap();
        let (layout, warnings) = source
            .resolve(staging.path(), &LayoutOptions::default())
            .await
            .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(layout.pkg.metadata.name, "demo");
    }

    #[tokio::test]
    async fn test_resolve_split_tarball() {
        let temp = TempDir::new().unwrap();
        let tarball = build_package_tarball(temp.path());
        let original = checksum::sha256_file(&tarball).unwrap();
        let header = split::split_file(&tarball, 512).unwrap();

        let staging = TempDir::new().unwrap();
        let source = PackageSource::identify(&header.display().to_string()).unwrap();
        let (layout, _) = source
            .resolve(staging.path(), &LayoutOptions::default())
            .await
            .unwrap();
        assert_eq!(layout.pkg.metadata.name, "demo");

        let reassembled = staging.path().join("demo.tar");
        assert_eq!(checksum::sha256_file(&reassembled).unwrap(), original);
    }
}
