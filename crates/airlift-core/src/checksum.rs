//! Checksum generation and validation for package layouts
//!
//! The checksums file is a sorted sequence of `<sha256> <relative-path>`
//! lines covering every file under the package root except the manifest and
//! the checksums file itself. Sorting makes the file byte-identical across
//! filesystems and platforms; its own sha256 is the package's aggregate
//! checksum, recorded in package metadata.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};
use crate::layout::{CHECKSUMS_TXT, PACKAGE_MANIFEST, SIGNATURE};

/// Compute the streaming SHA256 of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = std::fs::File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the SHA256 of an in-memory buffer
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Generate the checksums file content for a package directory.
///
/// Returns the newline-terminated content and its aggregate sha256.
pub fn generate(dir: &Path) -> Result<(String, String)> {
    let mut lines = Vec::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rel == PACKAGE_MANIFEST || rel == CHECKSUMS_TXT {
            continue;
        }
        let sum = sha256_file(entry.path())?;
        lines.push(format!("{sum} {rel}"));
    }
    lines.sort();

    let content = if lines.is_empty() {
        String::new()
    } else {
        format!("{}\n", lines.join("\n"))
    };
    let aggregate = sha256_bytes(content.as_bytes());
    Ok((content, aggregate))
}

/// Generate and write `checksums.txt` into the package directory, returning
/// the aggregate checksum to record in package metadata.
pub fn write(dir: &Path) -> Result<String> {
    let (content, aggregate) = generate(dir)?;
    std::fs::write(dir.join(CHECKSUMS_TXT), content)?;
    Ok(aggregate)
}

/// Verify the checksums of a package directory against the recorded
/// aggregate checksum.
///
/// Full packages require every line to match an existing file and every
/// physical file (beyond the manifest, checksums, and signature) to appear
/// in the checksums. Partial packages tolerate listed-but-absent files, but
/// any file that is present must match, and files outside the checksums are
/// always an error.
pub fn verify(dir: &Path, aggregate: &str, is_partial: bool) -> Result<()> {
    let checksums_path = dir.join(CHECKSUMS_TXT);
    if !checksums_path.exists() {
        return Err(CoreError::MissingFile {
            path: CHECKSUMS_TXT.to_string(),
        });
    }

    let actual_aggregate = sha256_file(&checksums_path)?;
    if actual_aggregate != aggregate {
        return Err(CoreError::AggregateChecksumMismatch {
            expected: aggregate.to_string(),
            actual: actual_aggregate,
        });
    }

    // Map of every file physically present, minus the files the checksums
    // never cover.
    let mut remaining: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in walkdir::WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        remaining.insert(rel, entry.path().to_path_buf());
    }
    remaining.remove(PACKAGE_MANIFEST);
    remaining.remove(CHECKSUMS_TXT);
    remaining.remove(SIGNATURE);

    let file = std::fs::File::open(&checksums_path)?;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let (sha, rel) = line.split_once(' ').ok_or_else(|| CoreError::InvalidChecksumLine {
            line: line.clone(),
        })?;
        if sha.is_empty() || rel.is_empty() {
            return Err(CoreError::InvalidChecksumLine { line: line.clone() });
        }

        match remaining.remove(rel) {
            Some(path) => {
                let actual = sha256_file(&path)?;
                if actual != sha {
                    return Err(CoreError::ChecksumMismatch {
                        path: rel.to_string(),
                        expected: sha.to_string(),
                        actual,
                    });
                }
            }
            None if is_partial => continue,
            None => {
                return Err(CoreError::MissingFile {
                    path: rel.to_string(),
                });
            }
        }
    }

    if !remaining.is_empty() {
        let paths: Vec<String> = remaining.keys().cloned().collect();
        return Err(CoreError::UnexpectedFiles {
            paths: paths.join(", "),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_layout(dir: &Path) {
        std::fs::write(dir.join(PACKAGE_MANIFEST), "metadata:\n  name: t\n").unwrap();
        std::fs::create_dir_all(dir.join("components")).unwrap();
        std::fs::write(dir.join("components/base.tar"), b"tar bytes").unwrap();
        std::fs::write(dir.join("sboms.tar"), b"sbom bytes").unwrap();
    }

    #[test]
    fn test_generate_is_sorted_and_excludes_self() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());

        let (content, aggregate) = generate(temp.path()).unwrap();
        assert_eq!(aggregate.len(), 64);
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
        assert!(!content.contains(PACKAGE_MANIFEST));
        assert!(content.contains("components/base.tar"));
    }

    #[test]
    fn test_verify_roundtrip() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());
        let aggregate = write(temp.path()).unwrap();
        verify(temp.path(), &aggregate, false).unwrap();
    }

    #[test]
    fn test_verify_detects_mutation() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());
        let aggregate = write(temp.path()).unwrap();

        std::fs::write(temp.path().join("components/base.tar"), b"tar byteX").unwrap();
        let err = verify(temp.path(), &aggregate, false).unwrap_err();
        match err {
            CoreError::ChecksumMismatch { path, .. } => {
                assert_eq!(path, "components/base.tar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_detects_missing_file_when_full() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());
        let aggregate = write(temp.path()).unwrap();

        std::fs::remove_file(temp.path().join("sboms.tar")).unwrap();
        let err = verify(temp.path(), &aggregate, false).unwrap_err();
        assert!(matches!(err, CoreError::MissingFile { .. }));

        // Partial packages tolerate the same absence.
        verify(temp.path(), &aggregate, true).unwrap();
    }

    #[test]
    fn test_verify_rejects_extra_files() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());
        let aggregate = write(temp.path()).unwrap();

        std::fs::write(temp.path().join("smuggled.bin"), b"oops").unwrap();
        let err = verify(temp.path(), &aggregate, true).unwrap_err();
        assert!(matches!(err, CoreError::UnexpectedFiles { .. }));
    }

    #[test]
    fn test_verify_rejects_bad_aggregate() {
        let temp = TempDir::new().unwrap();
        write_layout(temp.path());
        write(temp.path()).unwrap();

        let err = verify(temp.path(), &"0".repeat(64), false).unwrap_err();
        assert!(matches!(err, CoreError::AggregateChecksumMismatch { .. }));
    }
}
