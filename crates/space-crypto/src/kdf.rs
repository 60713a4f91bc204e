//! Key derivation: Argon2id passphrase → master key

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use space_core::config::CryptoConfig;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::ContentKey;
use crate::KEY_SIZE;

/// A 256-bit key derived from the keystore passphrase. Zeroized on drop.
#[derive(Clone)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// View as a content key for sealing the keystore secret.
    pub(crate) fn to_content_key(&self) -> ContentKey {
        ContentKey::from_bytes(self.bytes)
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Argon2id parameters, stored next to the salt in the keystore file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub mem_cost_kib: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::from(&CryptoConfig::default())
    }
}

impl From<&CryptoConfig> for KdfParams {
    fn from(config: &CryptoConfig) -> Self {
        Self {
            mem_cost_kib: config.argon2_mem_cost_kib,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
        }
    }
}

/// Derive a 256-bit master key from a passphrase and a 16-byte salt.
pub fn derive_master_key(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfParams,
) -> CryptoResult<MasterKey> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::InvalidKey(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut key)
        .map_err(|e| CryptoError::InvalidKey(format!("Argon2id KDF failed: {e}")))?;

    Ok(MasterKey::from_bytes(key))
}
