//! Inspect command - show a package's manifest and preview its deploy-time
//! component selection

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use airlift_compose::{ByArchAndOs, ComponentFilter, FilterChain, ForDeploy};
use airlift_core::LayoutOptions;
use airlift_oci::PackageSource;

use crate::util::print_warnings;

pub async fn run(source: &str, components: &str, key: Option<&Path>) -> Result<()> {
    let staging = tempfile::tempdir().into_diagnostic()?;
    // Metadata-only path: a signed package without a key downgrades to a
    // warning instead of failing.
    let opts = LayoutOptions {
        public_key_path: key.map(Path::to_path_buf),
        skip_signature_validation: key.is_none(),
        is_partial: false,
    };

    let source = PackageSource::identify(source).into_diagnostic()?;
    let (layout, warnings) = source.resolve(staging.path(), &opts).await.into_diagnostic()?;
    print_warnings(&warnings);

    println!("{}", serde_yaml::to_string(&layout.pkg).into_diagnostic()?);

    let chain = FilterChain::new()
        .with(ByArchAndOs::new(
            layout.pkg.architecture(),
            std::env::consts::OS,
        ))
        .with(ForDeploy::new(components));
    let selected = chain.apply(&layout.pkg).into_diagnostic()?;

    println!("{}:", style("Deploy selection").bold());
    for component in &selected {
        let marker = if component.is_required() {
            style("required").dim()
        } else {
            style("selected").dim()
        };
        println!("  {} {} ({marker})", style("-").green(), component.name);
    }
    if selected.is_empty() {
        println!("  {}", style("(no components selected)").dim());
    }
    Ok(())
}
