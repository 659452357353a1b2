//! Publish command - push a built package to a registry

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use airlift_core::{LayoutOptions, PackageLayout};
use airlift_oci::{PackageSource, Remote};

use crate::util::print_warnings;

pub async fn run(package: &str, url: &str, key: Option<&Path>) -> Result<()> {
    let staging = tempfile::tempdir().into_diagnostic()?;
    let opts = LayoutOptions {
        public_key_path: key.map(Path::to_path_buf),
        skip_signature_validation: key.is_none(),
        is_partial: false,
    };

    let package_path = Path::new(package);
    let (layout, warnings) = if package_path.is_dir() {
        PackageLayout::load_from_dir(package_path, &opts).into_diagnostic()?
    } else {
        PackageSource::identify(package)
            .into_diagnostic()?
            .resolve(staging.path(), &opts)
            .await
            .into_diagnostic()?
    };
    print_warnings(&warnings);

    println!(
        "{} {} to {url}",
        style("Publishing").cyan().bold(),
        layout.pkg.metadata.name
    );
    let remote = Remote::new(url).into_diagnostic()?;
    let manifest_url = remote.push_package(&layout).await.into_diagnostic()?;
    println!("{} {manifest_url}", style("Published").green().bold());
    Ok(())
}
