//! Pull command - fetch a published package out of a registry

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};
use std::path::Path;
use std::time::Duration;

use airlift_core::LayoutOptions;
use airlift_oci::{pull_selected, PackageSource};

use crate::util::print_warnings;

pub async fn run(
    url: &str,
    output: &Path,
    components: &str,
    confirm: bool,
    key: Option<&Path>,
) -> Result<()> {
    let requested: Vec<String> = components
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    // Narrowing a pull changes what lands on disk, so it has to be an
    // explicit, confirmed decision.
    if !requested.is_empty() && !confirm {
        return Err(miette::miette!(
            "pulling a subset of components requires --confirm"
        ));
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").into_diagnostic()?);
    spinner.set_message(format!("Pulling {url}"));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let staging = tempfile::tempdir().into_diagnostic()?;
    let opts = LayoutOptions {
        public_key_path: key.map(Path::to_path_buf),
        skip_signature_validation: key.is_none(),
        is_partial: false,
    };

    let (layout, warnings) = if requested.is_empty() {
        PackageSource::Oci(url.to_string())
            .resolve(staging.path(), &opts)
            .await
            .into_diagnostic()?
    } else {
        pull_selected(url, &requested, staging.path(), &opts)
            .await
            .into_diagnostic()?
    };
    spinner.finish_and_clear();
    print_warnings(&warnings);

    std::fs::create_dir_all(output).into_diagnostic()?;
    let tarball = layout.archive(output, 0).into_diagnostic()?;
    println!("{} {}", style("Pulled").green().bold(), tarball.display());
    Ok(())
}
