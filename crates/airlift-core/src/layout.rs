//! Package layout - the canonical mapping from logical package contents to
//! on-disk paths
//!
//! A layout is a base directory (local, or materialized from a registry
//! pull) holding the manifest, the checksums file, an optional detached
//! signature, one tarball per component, an OCI image store, and an SBOM
//! archive. Checksums and signature, when present, cover every file under
//! the base directory except themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::checksum;
use crate::error::{CoreError, Result};
use crate::package::Package;
use crate::signature;
use crate::split;

/// Package manifest file name
pub const PACKAGE_MANIFEST: &str = "zarf.yaml";
/// Checksums file name
pub const CHECKSUMS_TXT: &str = "checksums.txt";
/// Detached signature file name
pub const SIGNATURE: &str = "zarf.yaml.sig";
/// Directory holding one tarball per component
pub const COMPONENTS_DIR: &str = "components";
/// Directory holding the OCI image store
pub const IMAGES_DIR: &str = "images";
/// OCI image index within the image store
pub const IMAGES_INDEX: &str = "images/index.json";
/// OCI layout marker within the image store
pub const OCI_LAYOUT_FILE: &str = "images/oci-layout";
/// Blob directory within the image store
pub const IMAGES_BLOBS_DIR: &str = "images/blobs/sha256";
/// SBOM archive file name
pub const SBOM_TAR: &str = "sboms.tar";

/// Options used when loading and validating a package layout
#[derive(Debug, Clone, Default)]
pub struct LayoutOptions {
    /// Public key used to verify a detached signature
    pub public_key_path: Option<PathBuf>,
    /// Downgrade a present-but-unverifiable signature to a warning
    /// (metadata-only inspection paths)
    pub skip_signature_validation: bool,
    /// Whether only a subset of the package's files were materialized
    pub is_partial: bool,
}

/// A package layout rooted at a local directory
#[derive(Debug)]
pub struct PackageLayout {
    dir: PathBuf,
    /// The parsed package manifest
    pub pkg: Package,
}

impl PackageLayout {
    /// Wrap an assembled directory without validating it (build pipeline)
    pub fn new(dir: PathBuf, pkg: Package) -> Self {
        Self { dir, pkg }
    }

    /// Load and validate a package from a directory.
    ///
    /// Runs in order: manifest parse, integrity validation (full or
    /// partial), signature validation. Returns the layout plus advisory
    /// warnings (legacy unverifiable package, skipped signature).
    pub fn load_from_dir(dir: &Path, opts: &LayoutOptions) -> Result<(Self, Vec<String>)> {
        let pkg = Package::load(dir)?;
        let layout = Self {
            dir: dir.to_path_buf(),
            pkg,
        };
        let mut warnings = layout.validate_integrity(opts.is_partial)?;
        warnings.extend(layout.validate_signature(opts)?);
        Ok((layout, warnings))
    }

    /// Unpack a package tarball into `staging_dir` and load it from there
    pub fn load_from_tar(
        tar_path: &Path,
        staging_dir: &Path,
        opts: &LayoutOptions,
    ) -> Result<(Self, Vec<String>)> {
        archive::decompress(tar_path, staging_dir)?;
        Self::load_from_dir(staging_dir, opts)
    }

    /// Base directory of the layout
    pub fn dir_path(&self) -> &Path {
        &self.dir
    }

    /// Absolute path of the package manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(PACKAGE_MANIFEST)
    }

    /// Absolute path of the checksums file
    pub fn checksums_path(&self) -> PathBuf {
        self.dir.join(CHECKSUMS_TXT)
    }

    /// Absolute path of the detached signature
    pub fn signature_path(&self) -> PathBuf {
        self.dir.join(SIGNATURE)
    }

    /// Absolute path of the OCI image store
    pub fn image_dir(&self) -> PathBuf {
        self.dir.join(IMAGES_DIR)
    }

    /// Absolute path of a component's tarball, which must exist
    pub fn component_tarball(&self, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(COMPONENTS_DIR).join(format!("{name}.tar"));
        if !path.exists() {
            return Err(CoreError::ComponentNotFound {
                name: name.to_string(),
            });
        }
        Ok(path)
    }

    /// Unpack a component's tarball into `dest`, stripping the leading
    /// `<name>/` path segment.
    pub fn unpack_component(&self, name: &str, dest: &Path) -> Result<PathBuf> {
        let tarball = self.component_tarball(name)?;
        archive::untar_strip(&tarball, dest, 1)?;
        Ok(dest.to_path_buf())
    }

    /// Whether the package ships an SBOM archive
    pub fn contains_sbom(&self) -> bool {
        self.dir.join(SBOM_TAR).exists()
    }

    /// Extract the SBOM archive into `dest`
    pub fn extract_sbom(&self, dest: &Path) -> Result<PathBuf> {
        if !self.contains_sbom() {
            return Err(CoreError::Archive {
                message: format!("package {} has no SBOM archive", self.pkg.metadata.name),
            });
        }
        archive::decompress(&self.dir.join(SBOM_TAR), dest)?;
        Ok(dest.to_path_buf())
    }

    /// Every regular file in the layout, mapped from absolute path to
    /// slash-separated relative name
    pub fn files(&self) -> Result<BTreeMap<PathBuf, String>> {
        let mut files = BTreeMap::new();
        for entry in walkdir::WalkDir::new(&self.dir)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(&self.dir)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.insert(entry.path().to_path_buf(), rel);
        }
        Ok(files)
    }

    /// Generate the checksums file, record the aggregate checksum in the
    /// manifest, and rewrite the manifest.
    ///
    /// Must run after every other file in the layout has been written.
    pub fn write_checksums(&mut self) -> Result<String> {
        // The manifest has to carry the final aggregate, so it is written
        // first and excluded from the checksums.
        self.pkg.save(&self.dir)?;
        let aggregate = checksum::write(&self.dir)?;
        self.pkg.metadata.aggregate_checksum = aggregate.clone();
        self.pkg.save(&self.dir)?;
        Ok(aggregate)
    }

    /// Sign the package manifest, writing the detached signature into the
    /// layout.
    pub fn sign(&self, key_path: &Path, password: Option<String>) -> Result<PathBuf> {
        signature::sign_file(
            &self.manifest_path(),
            &self.signature_path(),
            key_path,
            password,
        )
    }

    /// The file name this package uses when exported to disk
    pub fn archive_file_name(&self) -> Result<String> {
        let arch = self.pkg.architecture();
        if arch.is_empty() {
            return Err(CoreError::MissingArchitecture);
        }

        let mut name = if self.pkg.is_init_config() {
            format!("airlift-init-{arch}")
        } else {
            format!("airlift-package-{}-{arch}", self.pkg.metadata.name)
        };

        if self.pkg.build.differential {
            name = format!(
                "{name}-{}-differential-{}",
                self.pkg.build.differential_package_version, self.pkg.metadata.version
            );
        } else if !self.pkg.metadata.version.is_empty() {
            name = format!("{name}-{}", self.pkg.metadata.version);
        }
        if !self.pkg.build.flavor.is_empty() {
            name = format!("{name}-{}", self.pkg.build.flavor);
        }

        if self.pkg.metadata.uncompressed {
            Ok(format!("{name}.tar"))
        } else {
            Ok(format!("{name}.tar.zst"))
        }
    }

    /// Export the layout as a tarball under `dest_dir`, splitting it into
    /// parts when it exceeds `max_package_size_mb` (0 disables splitting).
    ///
    /// Returns the tarball path, or the header part path when split.
    pub fn archive(&self, dest_dir: &Path, max_package_size_mb: usize) -> Result<PathBuf> {
        let file_name = self.archive_file_name()?;
        let tarball_path = dest_dir.join(&file_name);
        if tarball_path.exists() {
            std::fs::remove_file(&tarball_path)?;
        }

        tracing::debug!(path = %tarball_path.display(), "writing package archive");
        if self.pkg.metadata.uncompressed {
            archive::tar_dir_contents(&self.dir, &tarball_path)?;
        } else {
            archive::compress_dir(&self.dir, &tarball_path)?;
        }

        let chunk_size = max_package_size_mb * 1000 * 1000;
        let size = std::fs::metadata(&tarball_path)?.len();
        if max_package_size_mb > 0 && size > chunk_size as u64 {
            return split::split_file(&tarball_path, chunk_size);
        }
        Ok(tarball_path)
    }

    fn validate_integrity(&self, is_partial: bool) -> Result<Vec<String>> {
        let aggregate = &self.pkg.metadata.aggregate_checksum;
        if aggregate.is_empty() && !self.checksums_path().exists() {
            // Legacy package built before checksums existed; tolerated but
            // reported.
            return Ok(vec![format!(
                "package {} carries no checksums and cannot be verified",
                self.pkg.metadata.name
            )]);
        }
        if aggregate.is_empty() {
            return Err(CoreError::InvalidManifest {
                message: "package has a checksums file but records no aggregate checksum"
                    .to_string(),
            });
        }
        checksum::verify(&self.dir, aggregate, is_partial)?;
        Ok(Vec::new())
    }

    fn validate_signature(&self, opts: &LayoutOptions) -> Result<Vec<String>> {
        let signature_path = self.signature_path();
        let signature_exists = signature_path.exists();

        if opts.skip_signature_validation {
            if signature_exists {
                return Ok(vec![format!(
                    "package {} is signed but signature validation was skipped",
                    self.pkg.metadata.name
                )]);
            }
            return Ok(Vec::new());
        }

        match (&opts.public_key_path, signature_exists) {
            // Nobody was expecting a signature
            (None, false) => Ok(Vec::new()),
            (None, true) => Err(CoreError::SignedButNoKey),
            (Some(_), false) => Err(CoreError::KeyButUnsigned),
            (Some(key), true) => {
                signature::verify_file(&self.manifest_path(), &signature_path, key)?;
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageKind;
    use tempfile::TempDir;

    fn build_layout(dir: &Path) -> PackageLayout {
        let yaml = r#"
metadata:
  name: demo
  version: 1.0.0
  architecture: amd64
components:
  - name: base
"#;
        let pkg = Package::parse(yaml).unwrap();
        std::fs::create_dir_all(dir.join(COMPONENTS_DIR)).unwrap();

        let staging = dir.join(".staging-base");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("notes.txt"), b"component payload").unwrap();
        archive::tar_dir(
            &staging,
            "base",
            &dir.join(COMPONENTS_DIR).join("base.tar"),
        )
        .unwrap();
        std::fs::remove_dir_all(&staging).unwrap();

        let mut layout = PackageLayout::new(dir.to_path_buf(), pkg);
        layout.write_checksums().unwrap();
        layout
    }

    #[test]
    fn test_load_from_dir_roundtrip() {
        let temp = TempDir::new().unwrap();
        build_layout(temp.path());

        let (layout, warnings) =
            PackageLayout::load_from_dir(temp.path(), &LayoutOptions::default()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(layout.pkg.metadata.name, "demo");
        assert_eq!(layout.pkg.metadata.aggregate_checksum.len(), 64);
    }

    #[test]
    fn test_load_detects_tampering() {
        let temp = TempDir::new().unwrap();
        build_layout(temp.path());

        std::fs::write(
            temp.path().join(COMPONENTS_DIR).join("base.tar"),
            b"tampered",
        )
        .unwrap();
        let err =
            PackageLayout::load_from_dir(temp.path(), &LayoutOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_legacy_package_without_checksums_warns() {
        let temp = TempDir::new().unwrap();
        let pkg = Package::parse("metadata:\n  name: legacy\n").unwrap();
        pkg.save(temp.path()).unwrap();

        let (_, warnings) =
            PackageLayout::load_from_dir(temp.path(), &LayoutOptions::default()).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("cannot be verified"));
    }

    #[test]
    fn test_signature_truth_table() {
        let temp = TempDir::new().unwrap();
        let layout = build_layout(temp.path());

        let keys = TempDir::new().unwrap();
        let minisign::KeyPair { pk, sk } =
            minisign::KeyPair::generate_unencrypted_keypair().unwrap();
        let sk_path = keys.path().join("signing.key");
        let pk_path = keys.path().join("signing.pub");
        std::fs::write(&sk_path, sk.to_box(None).unwrap().to_string()).unwrap();
        std::fs::write(&pk_path, pk.to_box().unwrap().to_string()).unwrap();

        // Unsigned + key supplied -> error
        let opts = LayoutOptions {
            public_key_path: Some(pk_path.clone()),
            ..Default::default()
        };
        let err = PackageLayout::load_from_dir(temp.path(), &opts).unwrap_err();
        assert!(matches!(err, CoreError::KeyButUnsigned));

        layout.sign(&sk_path, None).unwrap();

        // Signed + key supplied -> ok
        PackageLayout::load_from_dir(temp.path(), &opts).unwrap();

        // Signed + no key -> error
        let err =
            PackageLayout::load_from_dir(temp.path(), &LayoutOptions::default()).unwrap_err();
        assert!(matches!(err, CoreError::SignedButNoKey));

        // Signed + no key + skip -> warning only
        let opts = LayoutOptions {
            skip_signature_validation: true,
            ..Default::default()
        };
        let (_, warnings) = PackageLayout::load_from_dir(temp.path(), &opts).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("skipped"));
    }

    #[test]
    fn test_unpack_component() {
        let temp = TempDir::new().unwrap();
        let layout = build_layout(temp.path());

        let dest = TempDir::new().unwrap();
        layout.unpack_component("base", dest.path()).unwrap();
        assert!(dest.path().join("notes.txt").exists());

        let err = layout.unpack_component("nope", dest.path()).unwrap_err();
        assert!(matches!(err, CoreError::ComponentNotFound { .. }));
    }

    #[test]
    fn test_archive_file_name_variants() {
        let temp = TempDir::new().unwrap();
        let mut layout = build_layout(temp.path());

        assert_eq!(
            layout.archive_file_name().unwrap(),
            "airlift-package-demo-amd64-1.0.0.tar.zst"
        );

        layout.pkg.kind = PackageKind::InitConfig;
        assert_eq!(
            layout.archive_file_name().unwrap(),
            "airlift-init-amd64-1.0.0.tar.zst"
        );

        layout.pkg.kind = PackageKind::PackageConfig;
        layout.pkg.build.differential = true;
        layout.pkg.build.differential_package_version = "0.9.0".to_string();
        assert_eq!(
            layout.archive_file_name().unwrap(),
            "airlift-package-demo-amd64-0.9.0-differential-1.0.0.tar.zst"
        );

        layout.pkg.build.differential = false;
        layout.pkg.build.flavor = "upstream".to_string();
        layout.pkg.metadata.uncompressed = true;
        assert_eq!(
            layout.archive_file_name().unwrap(),
            "airlift-package-demo-amd64-1.0.0-upstream.tar"
        );

        layout.pkg.metadata.architecture = String::new();
        layout.pkg.build.architecture = String::new();
        assert!(layout.archive_file_name().is_err());
    }

    #[test]
    fn test_archive_and_reload() {
        let temp = TempDir::new().unwrap();
        let layout = build_layout(temp.path());

        let out = TempDir::new().unwrap();
        let tarball = layout.archive(out.path(), 0).unwrap();
        assert!(tarball.exists());

        let staging = TempDir::new().unwrap();
        let (reloaded, warnings) =
            PackageLayout::load_from_tar(&tarball, staging.path(), &LayoutOptions::default())
                .unwrap();
        assert!(warnings.is_empty());
        assert_eq!(reloaded.pkg.metadata.name, "demo");
    }

    #[test]
    fn test_archive_splits_oversized_packages() {
        let temp = TempDir::new().unwrap();
        let mut layout = build_layout(temp.path());
        layout.pkg.metadata.uncompressed = true;

        // Pad the layout so the tarball comfortably exceeds 1 MB.
        std::fs::write(temp.path().join("filler.bin"), vec![0u8; 3_000_000]).unwrap();
        layout.write_checksums().unwrap();

        let out = TempDir::new().unwrap();
        let header = layout.archive(out.path(), 1).unwrap();
        assert!(header.display().to_string().ends_with(".part000"));

        let restored = out.path().join("restored.tar");
        split::assemble(&header, &restored, None).unwrap();

        let staging = TempDir::new().unwrap();
        let (reloaded, _) =
            PackageLayout::load_from_tar(&restored, staging.path(), &LayoutOptions::default())
                .unwrap();
        assert_eq!(reloaded.pkg.metadata.name, "demo");
    }
}
