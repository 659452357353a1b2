//! Archive creation and extraction for package layouts
//!
//! Package tarballs are zstd-compressed by default with gzip and plain tar
//! accepted on the read path; per-component archives are always plain tar.

use flate2::read::GzDecoder;
use std::fs::File;
use std::path::{Component as PathComponent, Path, PathBuf};
use tar::{Archive, Builder};

use crate::error::{CoreError, Result};

/// Create a zstd-compressed tarball of a directory's contents.
///
/// The directory's entries land at the archive root.
pub fn compress_dir(src_dir: &Path, dest: &Path) -> Result<()> {
    let file = File::create(dest)?;
    let encoder = zstd::stream::write::Encoder::new(file, 0)?;
    let mut builder = Builder::new(encoder);
    append_dir_contents(&mut builder, src_dir)?;
    let encoder = builder.into_inner()?;
    encoder.finish()?;
    Ok(())
}

/// Create an uncompressed tarball of a directory's contents
pub fn tar_dir_contents(src_dir: &Path, dest: &Path) -> Result<()> {
    let file = File::create(dest)?;
    let mut builder = Builder::new(file);
    append_dir_contents(&mut builder, src_dir)?;
    builder.into_inner()?;
    Ok(())
}

/// Create an uncompressed tarball of a directory, keeping the directory
/// itself as the top-level entry (the layout used by component archives).
pub fn tar_dir(src_dir: &Path, top_level: &str, dest: &Path) -> Result<()> {
    let file = File::create(dest)?;
    let mut builder = Builder::new(file);
    builder.append_dir_all(top_level, src_dir)?;
    builder.into_inner()?;
    Ok(())
}

fn append_dir_contents<W: std::io::Write>(builder: &mut Builder<W>, src_dir: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let path = entry.path();
        if path.is_dir() {
            builder.append_dir_all(Path::new(&name), &path)?;
        } else {
            builder.append_path_with_name(&path, Path::new(&name))?;
        }
    }
    Ok(())
}

/// Extract an archive to a destination directory, detecting zstd, gzip, or
/// plain tar from the file name.
pub fn decompress(archive_path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(archive_path)?;

    let name = archive_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if name.ends_with(".zst") {
        let decoder = zstd::stream::read::Decoder::new(file)?;
        Archive::new(decoder).unpack(dest)?;
    } else if name.ends_with(".gz") || name.ends_with(".tgz") {
        let decoder = GzDecoder::new(file);
        Archive::new(decoder).unpack(dest)?;
    } else {
        Archive::new(file).unpack(dest)?;
    }
    Ok(())
}

/// Extract a plain tarball, stripping the given number of leading path
/// components from every entry (component archives carry a `<name>/`
/// prefix that callers usually do not want).
pub fn untar_strip(archive_path: &Path, dest: &Path, strip: usize) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(file);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let stripped: PathBuf = entry
            .path()?
            .components()
            .filter(|c| matches!(c, PathComponent::Normal(_)))
            .skip(strip)
            .collect();
        if stripped.as_os_str().is_empty() {
            continue;
        }
        let out = dest.join(stripped);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&out)?;
    }
    Ok(())
}

/// Read one file's bytes out of a plain tarball without unpacking the rest
pub fn read_file_from_tar(archive_path: &Path, file_path: &str) -> Result<Vec<u8>> {
    let file = File::open(archive_path)?;
    let mut archive = Archive::new(file);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path()?.to_string_lossy().to_string();
        if path == file_path {
            let mut content = Vec::new();
            std::io::Read::read_to_end(&mut entry, &mut content)?;
            return Ok(content);
        }
    }

    Err(CoreError::Archive {
        message: format!("File not found in archive: {file_path}"),
    })
}
