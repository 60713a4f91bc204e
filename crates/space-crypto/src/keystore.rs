//! Passphrase-protected storage for an alias's keys.
//!
//! On-disk JSON:
//! ```text
//! { alias, public_key, verify_key, salt, kdf: {mem_cost_kib, time_cost, parallelism}, sealed_identity }
//! ```
//! `sealed_identity` is `{identity, signing_seed}` (the `AGE-SECRET-KEY-1...`
//! string and the Ed25519 seed) sealed under the Argon2id master key with the
//! alias as AAD.

use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use space_core::{SpaceError, SpaceResult};
use std::path::Path;
use zeroize::Zeroize;

use crate::envelope::{open, seal};
use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_master_key, KdfParams};
use crate::keys::{KeyPair, PublicKey};
use crate::sign::VerifyKey;

#[derive(Serialize, Deserialize)]
struct SealedKeys {
    identity: String,
    #[serde(with = "space_core::encoding::bytes")]
    signing_seed: Vec<u8>,
}

impl Drop for SealedKeys {
    fn drop(&mut self) {
        self.identity.zeroize();
        self.signing_seed.zeroize();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    pub alias: String,
    pub public_key: PublicKey,
    pub verify_key: VerifyKey,
    #[serde(with = "space_core::encoding::bytes")]
    salt: Vec<u8>,
    pub kdf: KdfParams,
    #[serde(with = "space_core::encoding::bytes")]
    sealed_identity: Vec<u8>,
}

impl Keystore {
    /// Generate a fresh key pair for `alias` and seal it under `passphrase`.
    pub fn create(
        alias: &str,
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> CryptoResult<(Self, KeyPair)> {
        let keys = KeyPair::generate();
        let store = Self::seal_keys(alias, &keys, passphrase, kdf)?;
        Ok((store, keys))
    }

    /// Seal an existing key pair.
    pub fn seal_keys(
        alias: &str,
        keys: &KeyPair,
        passphrase: &SecretString,
        kdf: KdfParams,
    ) -> CryptoResult<Self> {
        let mut salt = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut salt);

        let master = derive_master_key(passphrase, &salt, &kdf)?;
        let secrets = SealedKeys {
            identity: keys.secret(),
            signing_seed: keys.signing_seed().to_vec(),
        };
        let mut plain = serde_json::to_vec(&secrets)
            .map_err(|e| CryptoError::Encrypt(format!("encoding keys: {e}")))?;
        let sealed_identity = seal(&master.to_content_key(), alias.as_bytes(), &plain);
        plain.zeroize();
        let sealed_identity = sealed_identity?;

        Ok(Self {
            alias: alias.to_string(),
            public_key: keys.public_key(),
            verify_key: keys.verify_key(),
            salt: salt.to_vec(),
            kdf,
            sealed_identity,
        })
    }

    pub fn unlock(&self, passphrase: &SecretString) -> CryptoResult<KeyPair> {
        let salt: [u8; 16] = self
            .salt
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidKey(format!("bad salt length {}", self.salt.len())))?;
        let master = derive_master_key(passphrase, &salt, &self.kdf)?;

        let mut plain = open(
            &master.to_content_key(),
            self.alias.as_bytes(),
            &self.sealed_identity,
        )
        .map_err(|_| CryptoError::Decrypt("wrong passphrase or corrupted keystore".into()))?;
        let secrets = serde_json::from_slice::<SealedKeys>(&plain);
        plain.zeroize();
        let secrets = secrets
            .map_err(|e| CryptoError::InvalidKey(format!("keystore secrets unreadable: {e}")))?;

        let keys = KeyPair::from_secrets(&secrets.identity, &secrets.signing_seed)?;
        if keys.public_key() != self.public_key || keys.verify_key() != self.verify_key {
            return Err(CryptoError::InvalidKey(
                "keystore public keys do not match sealed identity".into(),
            ));
        }
        tracing::debug!(alias = %self.alias, "keystore unlocked");
        Ok(keys)
    }

    pub fn load(path: &Path) -> SpaceResult<Self> {
        if !path.exists() {
            return Err(SpaceError::NotFound(format!(
                "keystore {} (run `space init` first)",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write atomically (temp file then rename).
    pub fn save(&self, path: &Path) -> SpaceResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}
