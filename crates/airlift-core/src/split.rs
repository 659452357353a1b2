//! Split oversized package archives into fixed-size parts and reassemble
//! them
//!
//! Parts are named `<file>.partNNN` with a zero-indexed JSON header part
//! carrying the reconstruction contract: part count, total byte length, and
//! the sha256 of the whole. Both directions stream with a fixed buffer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::checksum::sha256_file;
use crate::error::{CoreError, Result};

/// Reconstruction contract persisted as the `.part000` header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitHeader {
    /// Number of data parts, excluding this header
    pub count: usize,
    /// Total byte length of the reassembled file
    pub bytes: u64,
    /// SHA256 of the reassembled file
    pub sha256_sum: String,
}

fn part_path(src: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}.part{:03}", src.display(), index))
}

/// Split a file into `chunk_size`-byte parts, replacing the original.
///
/// Returns the path of the header part. The original file is removed once
/// all data parts are written; a trailing zero-byte part (source length
/// divides evenly) is never left behind.
pub fn split_file(src: &Path, chunk_size: usize) -> Result<PathBuf> {
    // Clear any leftovers from a previous interrupted split.
    for stale in glob::glob(&format!("{}.part*", src.display()))? {
        if let Ok(path) = stale {
            std::fs::remove_file(path)?;
        }
    }

    let mut src_file = File::open(src)?;
    let total_bytes = src_file.metadata()?.len();

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];
    let mut count = 0usize;

    loop {
        if count >= 999 {
            return Err(CoreError::TooManyParts);
        }

        let path = part_path(src, count + 1);
        let mut dst = File::create(&path)?;
        let mut written = 0u64;
        let mut take = (&mut src_file).take(chunk_size as u64);
        loop {
            let n = take.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
            dst.write_all(&buffer[..n])?;
            written += n as u64;
        }
        dst.flush()?;
        drop(dst);

        if written == 0 {
            // Source length divided evenly into the previous part.
            std::fs::remove_file(&path)?;
            break;
        }

        count += 1;
        if written < chunk_size as u64 {
            break;
        }
    }

    drop(src_file);
    std::fs::remove_file(src)?;

    let header = SplitHeader {
        count,
        bytes: total_bytes,
        sha256_sum: hex::encode(hasher.finalize()),
    };
    let header_path = part_path(src, 0);
    std::fs::write(&header_path, serde_json::to_vec(&header)?)?;

    tracing::debug!(parts = count + 1, bytes = total_bytes, "split package archive");
    Ok(header_path)
}

/// Reassemble split parts back into a single file at `dest`.
///
/// `src` is the header part. The part count and the reassembled sha256 must
/// both match the header before the parts are deleted; a caller-supplied
/// `expected_sha` is additionally checked against the header up front.
pub fn assemble(src: &Path, dest: &Path, expected_sha: Option<&str>) -> Result<()> {
    let pattern = src.display().to_string().replace(".part000", ".part*");
    let mut parts: Vec<PathBuf> = glob::glob(&pattern)?.filter_map(|p| p.ok()).collect();
    // Lexical order puts the header first and the data parts in sequence.
    parts.sort();

    if parts.is_empty() {
        return Err(CoreError::InvalidSplitHeader {
            message: format!("no parts found matching {pattern}"),
        });
    }

    let header: SplitHeader =
        serde_json::from_slice(&std::fs::read(&parts[0])?).map_err(|e| {
            CoreError::InvalidSplitHeader {
                message: e.to_string(),
            }
        })?;

    let found = parts.len() - 1;
    if found != header.count {
        return Err(CoreError::MissingParts {
            expected: header.count,
            found,
        });
    }

    if let Some(expected) = expected_sha {
        if expected != header.sha256_sum {
            return Err(CoreError::SplitHashMismatch {
                expected: expected.to_string(),
                actual: header.sha256_sum,
            });
        }
    }

    let mut out = File::create(dest)?;
    for part in &parts[1..] {
        let mut f = File::open(part)?;
        std::io::copy(&mut f, &mut out)?;
    }
    out.flush()?;
    drop(out);

    let actual = sha256_file(dest)?;
    if actual != header.sha256_sum {
        return Err(CoreError::SplitHashMismatch {
            expected: header.sha256_sum,
            actual,
        });
    }

    // The reassembled file checked out, so the parts are no longer needed.
    for part in parts {
        std::fs::remove_file(part)?;
    }
    Ok(())
}
