//! Create command - compose a package manifest into a built package

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use airlift_compose::{compose_package, ComposeContext};
use airlift_core::{assemble_package, Package};
use airlift_oci::{default_cache_root, RemoteImportResolver};

use crate::util::print_warnings;

pub async fn run(
    path: &Path,
    output: &Path,
    architecture: Option<&str>,
    flavor: &str,
    max_package_size: usize,
    signing_key: Option<&Path>,
) -> Result<()> {
    let mut pkg = Package::load(path).into_diagnostic()?;
    print_warnings(&pkg.validate().into_diagnostic()?);

    let arch = architecture
        .map(str::to_string)
        .filter(|a| !a.is_empty())
        .or_else(|| {
            (!pkg.metadata.architecture.is_empty()).then(|| pkg.metadata.architecture.clone())
        })
        .unwrap_or_else(local_architecture);

    println!(
        "{} {} for {arch}",
        style("Composing").cyan().bold(),
        pkg.metadata.name
    );

    let resolver = RemoteImportResolver::new(default_cache_root());
    let ctx = ComposeContext {
        arch: &arch,
        flavor,
        package_root: path,
        resolver: &resolver,
    };
    let warnings = compose_package(&mut pkg, &ctx).await.into_diagnostic()?;
    print_warnings(&warnings);

    record_build_metadata(&mut pkg, &arch, flavor);

    let staging = tempfile::tempdir().into_diagnostic()?;
    let layout = assemble_package(pkg, path, staging.path()).into_diagnostic()?;

    if let Some(key) = signing_key {
        if layout.sign(key, None).is_err() {
            let password = rpassword::prompt_password("Enter key password: ").into_diagnostic()?;
            layout.sign(key, Some(password)).into_diagnostic()?;
        }
        println!("{} package manifest", style("Signed").green().bold());
    }

    std::fs::create_dir_all(output).into_diagnostic()?;
    let tarball = layout.archive(output, max_package_size).into_diagnostic()?;
    println!("{} {}", style("Created").green().bold(), tarball.display());
    Ok(())
}

fn record_build_metadata(pkg: &mut Package, arch: &str, flavor: &str) {
    pkg.metadata.architecture = arch.to_string();
    pkg.build.architecture = arch.to_string();
    pkg.build.timestamp = chrono::Utc::now().to_rfc3339();
    pkg.build.version = env!("CARGO_PKG_VERSION").to_string();
    pkg.build.flavor = flavor.to_string();
    pkg.build.user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default();
    pkg.build.terminal = std::env::var("HOSTNAME").unwrap_or_default();
}

/// The architecture of the local machine, in cluster terms
fn local_architecture() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "amd64".to_string(),
        "aarch64" => "arm64".to_string(),
        other => other.to_string(),
    }
}
