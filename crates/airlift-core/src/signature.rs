//! Detached package signing and verification with minisign
//!
//! The signature covers the package manifest only; the manifest's recorded
//! aggregate checksum extends that trust to every other file in the layout.

use minisign::{PublicKeyBox, SecretKeyBox, SignatureBox};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, Result};

/// Sign a manifest file, writing the detached signature next to the caller's
/// chosen path.
///
/// An encrypted secret key requires `password`; an unencrypted key ignores
/// it.
pub fn sign_file(
    file_path: &Path,
    signature_path: &Path,
    key_path: &Path,
    password: Option<String>,
) -> Result<PathBuf> {
    let key_content = std::fs::read_to_string(key_path)?;
    let sk_box = SecretKeyBox::from_string(&key_content).map_err(|e| CoreError::Signing {
        message: format!("failed to parse secret key: {e}"),
    })?;

    let sk = match sk_box.clone().into_unencrypted_secret_key() {
        Ok(sk) => sk,
        Err(_) => sk_box
            .into_secret_key(password)
            .map_err(|e| CoreError::Signing {
                message: format!("failed to decrypt secret key: {e}"),
            })?,
    };

    let mut reader = File::open(file_path)?;
    let trusted_comment = format!(
        "file:{}",
        file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    );
    let signature_box = minisign::sign(None, &sk, &mut reader, Some(&trusted_comment), None)
        .map_err(|e| CoreError::Signing {
            message: e.to_string(),
        })?;

    std::fs::write(signature_path, signature_box.to_string())?;
    Ok(signature_path.to_path_buf())
}

/// Verify a detached signature against a file with the given public key
pub fn verify_file(file_path: &Path, signature_path: &Path, public_key_path: &Path) -> Result<()> {
    let pk_content = std::fs::read_to_string(public_key_path)?;
    let pk = PublicKeyBox::from_string(&pk_content)
        .and_then(|b| b.into_public_key())
        .map_err(|e| CoreError::Signing {
            message: format!("failed to parse public key: {e}"),
        })?;

    let sig_content = std::fs::read_to_string(signature_path)?;
    let sig_box = SignatureBox::from_string(&sig_content).map_err(|e| CoreError::Signing {
        message: format!("failed to parse signature: {e}"),
    })?;

    let mut reader = File::open(file_path)?;
    minisign::verify(&pk, &sig_box, &mut reader, true, false, false).map_err(|e| {
        CoreError::SignatureMismatch {
            message: e.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use minisign::KeyPair;
    use tempfile::TempDir;

    fn write_keypair(dir: &Path) -> (PathBuf, PathBuf) {
        let KeyPair { pk, sk } = KeyPair::generate_unencrypted_keypair().unwrap();
        let sk_path = dir.join("signing.key");
        let pk_path = dir.join("signing.pub");
        std::fs::write(&sk_path, sk.to_box(None).unwrap().to_string()).unwrap();
        std::fs::write(&pk_path, pk.to_box().unwrap().to_string()).unwrap();
        (sk_path, pk_path)
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let temp = TempDir::new().unwrap();
        let (sk_path, pk_path) = write_keypair(temp.path());

        let manifest = temp.path().join("zarf.yaml");
        std::fs::write(&manifest, "metadata:\n  name: signed\n").unwrap();
        let sig = temp.path().join("zarf.yaml.sig");

        sign_file(&manifest, &sig, &sk_path, None).unwrap();
        assert!(sig.exists());
        verify_file(&manifest, &sig, &pk_path).unwrap();
    }

    #[test]
    fn test_verify_rejects_tampered_manifest() {
        let temp = TempDir::new().unwrap();
        let (sk_path, pk_path) = write_keypair(temp.path());

        let manifest = temp.path().join("zarf.yaml");
        std::fs::write(&manifest, "metadata:\n  name: signed\n").unwrap();
        let sig = temp.path().join("zarf.yaml.sig");
        sign_file(&manifest, &sig, &sk_path, None).unwrap();

        std::fs::write(&manifest, "metadata:\n  name: tampered\n").unwrap();
        let err = verify_file(&manifest, &sig, &pk_path).unwrap_err();
        assert!(matches!(err, CoreError::SignatureMismatch { .. }));
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let temp = TempDir::new().unwrap();
        let (sk_path, _) = write_keypair(temp.path());
        let other = TempDir::new().unwrap();
        let (_, other_pk) = write_keypair(other.path());

        let manifest = temp.path().join("zarf.yaml");
        std::fs::write(&manifest, "metadata:\n  name: signed\n").unwrap();
        let sig = temp.path().join("zarf.yaml.sig");
        sign_file(&manifest, &sig, &sk_path, None).unwrap();

        assert!(verify_file(&manifest, &sig, &other_pk).is_err());
    }
}
