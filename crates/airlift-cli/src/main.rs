//! Airlift CLI - build, verify, and ship packages into air-gapped
//! Kubernetes clusters

use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

mod commands;
mod util;

#[derive(Parser)]
#[command(name = "airlift")]
#[command(author = "Airlift Contributors")]
#[command(version)]
#[command(about = "The air-gap Kubernetes package manager", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose and build a package from a package manifest
    Create {
        /// Directory containing the package manifest
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output directory for the built package
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Target cluster architecture
        #[arg(short, long, env = "AIRLIFT_ARCHITECTURE")]
        architecture: Option<String>,

        /// Build flavor selecting among component variants
        #[arg(short, long, default_value = "")]
        flavor: String,

        /// Split the package into parts over this many megabytes (0 disables)
        #[arg(long, default_value_t = 0)]
        max_package_size: usize,

        /// Sign the package with this minisign secret key
        #[arg(long)]
        signing_key: Option<PathBuf>,
    },

    /// Show a package's manifest and deploy-time component selection
    Inspect {
        /// Package source: tarball, .part000, oci:// or http(s) URL
        source: String,

        /// Comma-separated component names/globs to preview a deployment
        #[arg(short, long, default_value = "")]
        components: String,

        /// Public key used to verify the package signature
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Pull a published package out of a registry
    Pull {
        /// oci:// reference of the published package
        url: String,

        /// Output directory for the pulled package
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// Pull only these components (plus required ones)
        #[arg(short, long, default_value = "")]
        components: String,

        /// Confirm non-interactive semantics for a partial pull
        #[arg(long)]
        confirm: bool,

        /// Public key used to verify the package signature
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Publish a built package to a registry
    Publish {
        /// Package tarball or unpacked layout directory
        package: String,

        /// oci:// reference to publish to
        url: String,

        /// Public key used to verify the package signature before publishing
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Sign an existing package tarball
    Sign {
        /// Package tarball to sign
        package: PathBuf,

        /// Minisign secret key (defaults to ~/.airlift/airlift.key)
        #[arg(long)]
        signing_key: Option<PathBuf>,
    },

    /// Verify a package's checksums and signature
    Verify {
        /// Package source: tarball, .part000, oci:// or http(s) URL
        source: String,

        /// Public key used to verify the package signature
        #[arg(short, long)]
        key: Option<PathBuf>,
    },

    /// Generate a minisign keypair for package signing
    Keygen {
        /// Output directory (defaults to ~/.airlift)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Overwrite existing keys
        #[arg(long)]
        force: bool,

        /// Do not protect the secret key with a password
        #[arg(long)]
        no_password: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            path,
            output,
            architecture,
            flavor,
            max_package_size,
            signing_key,
        } => {
            commands::create::run(
                &path,
                &output,
                architecture.as_deref(),
                &flavor,
                max_package_size,
                signing_key.as_deref(),
            )
            .await
        }
        Commands::Inspect {
            source,
            components,
            key,
        } => commands::inspect::run(&source, &components, key.as_deref()).await,
        Commands::Pull {
            url,
            output,
            components,
            confirm,
            key,
        } => commands::pull::run(&url, &output, &components, confirm, key.as_deref()).await,
        Commands::Publish { package, url, key } => {
            commands::publish::run(&package, &url, key.as_deref()).await
        }
        Commands::Sign {
            package,
            signing_key,
        } => commands::sign::run(&package, signing_key.as_deref()),
        Commands::Verify { source, key } => commands::verify::run(&source, key.as_deref()).await,
        Commands::Keygen {
            output,
            force,
            no_password,
        } => commands::keygen::run(output.as_deref(), force, no_password),
    }
}
