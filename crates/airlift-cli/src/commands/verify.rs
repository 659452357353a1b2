//! Verify command - validate a package's checksums and signature

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use airlift_core::LayoutOptions;
use airlift_oci::PackageSource;

use crate::util::{print_warnings, truncate_hash};

pub async fn run(source: &str, key: Option<&Path>) -> Result<()> {
    println!("{} {source}", style("Verifying").cyan().bold());

    let staging = tempfile::tempdir().into_diagnostic()?;
    let opts = LayoutOptions {
        public_key_path: key.map(Path::to_path_buf),
        skip_signature_validation: false,
        is_partial: false,
    };

    let source = PackageSource::identify(source).into_diagnostic()?;
    let (layout, warnings) = source.resolve(staging.path(), &opts).await.into_diagnostic()?;
    print_warnings(&warnings);

    println!(
        "  {} checksums match (aggregate {})",
        style("[OK]").green().bold(),
        truncate_hash(&layout.pkg.metadata.aggregate_checksum, 16)
    );
    match key {
        Some(_) => println!("  {} signature valid", style("[OK]").green().bold()),
        None => println!(
            "  {} package is unsigned",
            style("[SKIP]").yellow().bold()
        ),
    }
    println!();
    println!(
        "{}",
        style(format!(
            "Package {} verified.",
            layout.pkg.metadata.name
        ))
        .green()
    );
    Ok(())
}
