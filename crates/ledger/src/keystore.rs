//! JSON keystore loading.

use crate::error::{LedgerError, Result};
use alloy::signers::local::PrivateKeySigner;
use std::path::Path;
use tracing::info;

/// Decrypt the keystore at `path` into a local signer.
///
/// Blocks for the duration of the key derivation.
pub fn load_signer(path: &Path, password: &str) -> Result<PrivateKeySigner> {
    if !path.is_file() {
        return Err(LedgerError::Keystore(format!(
            "keystore file not found: {}",
            path.display()
        )));
    }

    let signer = PrivateKeySigner::decrypt_keystore(path, password).map_err(|e| {
        LedgerError::Keystore(format!("failed to decrypt {}: {}", path.display(), e))
    })?;

    info!(address = %signer.address(), "Unlocked keystore");
    Ok(signer)
}
