//! Keygen command - generate minisign signing keys

use console::style;
use miette::{IntoDiagnostic, Result};
use minisign::KeyPair;
use std::path::Path;

use crate::util::default_key_dir;

pub fn run(output_dir: Option<&Path>, force: bool, no_password: bool) -> Result<()> {
    let key_dir = output_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(default_key_dir);

    let secret_key_path = key_dir.join("airlift.key");
    let public_key_path = key_dir.join("airlift.pub");

    if !force && (secret_key_path.exists() || public_key_path.exists()) {
        return Err(miette::miette!(
            "Keys already exist at {}. Use --force to overwrite.",
            key_dir.display()
        ));
    }

    std::fs::create_dir_all(&key_dir).into_diagnostic()?;

    println!("{}", style("Generating signing keys...").cyan().bold());

    let password: Option<String> = if no_password {
        None
    } else {
        let password = rpassword::prompt_password(
            "Enter password to protect secret key (leave empty for no password): ",
        )
        .into_diagnostic()?;
        if password.is_empty() {
            None
        } else {
            let confirm = rpassword::prompt_password("Confirm password: ").into_diagnostic()?;
            if password != confirm {
                return Err(miette::miette!("Passwords do not match"));
            }
            Some(password)
        }
    };

    let KeyPair { pk, sk } = match password {
        Some(password) => KeyPair::generate_encrypted_keypair(Some(password)),
        None => KeyPair::generate_unencrypted_keypair(),
    }
    .map_err(|e| miette::miette!("Failed to generate keypair: {e}"))?;

    let sk_box = sk
        .to_box(Some("airlift signing key"))
        .map_err(|e| miette::miette!("Failed to box secret key: {e}"))?;
    std::fs::write(&secret_key_path, sk_box.to_string()).into_diagnostic()?;

    let pk_box = pk
        .to_box()
        .map_err(|e| miette::miette!("Failed to box public key: {e}"))?;
    std::fs::write(&public_key_path, pk_box.to_string()).into_diagnostic()?;

    println!(
        "  {} {}",
        style("Secret key").bold(),
        secret_key_path.display()
    );
    println!(
        "  {} {}",
        style("Public key").bold(),
        public_key_path.display()
    );
    Ok(())
}
