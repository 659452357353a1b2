//! Sign command - sign an existing package tarball

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use airlift_core::{LayoutOptions, PackageLayout};

use crate::util::default_key_dir;

pub fn run(package: &Path, signing_key: Option<&Path>) -> Result<()> {
    let key = signing_key
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_key_dir().join("airlift.key"));
    if !key.exists() {
        return Err(miette::miette!(
            "Secret key not found at {}.\nRun 'airlift keygen' to generate keys.",
            key.display()
        ));
    }
    if !package.exists() {
        return Err(miette::miette!("Package not found: {}", package.display()));
    }

    println!(
        "{} {}...",
        style("Signing").cyan().bold(),
        package.display()
    );

    // The package may be unsigned or signed with a different key; only the
    // checksums have to hold before re-signing.
    let staging = tempfile::tempdir().into_diagnostic()?;
    let opts = LayoutOptions {
        skip_signature_validation: true,
        ..Default::default()
    };
    let (layout, _) =
        PackageLayout::load_from_tar(package, staging.path(), &opts).into_diagnostic()?;

    if layout.sign(&key, None).is_err() {
        let password = rpassword::prompt_password("Enter key password: ").into_diagnostic()?;
        layout.sign(&key, Some(password)).into_diagnostic()?;
    }

    let output = package.parent().unwrap_or_else(|| Path::new("."));
    let tarball = layout.archive(output, 0).into_diagnostic()?;
    println!("{} {}", style("Signed").green().bold(), tarball.display());
    Ok(())
}
