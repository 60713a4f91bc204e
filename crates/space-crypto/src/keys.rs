//! Content keys and alias key pairs

use age::secrecy::ExposeSecret;
use ed25519_dalek::{Signer, SigningKey};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::sign::VerifyKey;
use crate::KEY_SIZE;

/// A per-record 256-bit symmetric key. Zeroized on drop.
#[derive(Clone)]
pub struct ContentKey {
    bytes: [u8; KEY_SIZE],
}

impl ContentKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKey(format!(
                "content key has wrong size: {} bytes (expected {})",
                bytes.len(),
                KEY_SIZE
            )));
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self::from_bytes(key))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl Drop for ContentKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit content key.
pub fn generate_content_key() -> ContentKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    ContentKey::from_bytes(bytes)
}

/// An alias's public key: an age X25519 recipient (`age1...`).
#[derive(Clone)]
pub struct PublicKey(age::x25519::Recipient);

impl PublicKey {
    pub fn recipient(&self) -> &age::x25519::Recipient {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.0)
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for PublicKey {}

impl FromStr for PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<age::x25519::Recipient>()
            .map(PublicKey)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid public key '{s}': {e}")))
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// An alias's private keys: an age identity that unwraps content keys and
/// an Ed25519 key that signs the records the alias creates.
#[derive(Clone)]
pub struct KeyPair {
    identity: age::x25519::Identity,
    signing: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            identity: age::x25519::Identity::generate(),
            signing: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }

    /// Rebuild from an `AGE-SECRET-KEY-1...` string and a 32-byte signing seed.
    pub fn from_secrets(secret: &str, signing_seed: &[u8]) -> CryptoResult<Self> {
        let identity = secret
            .trim()
            .parse::<age::x25519::Identity>()
            .map_err(|e| CryptoError::InvalidKey(format!("invalid secret key: {e}")))?;
        let seed: [u8; 32] = signing_seed.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "signing seed has wrong size: {} bytes",
                signing_seed.len()
            ))
        })?;
        Ok(Self {
            identity,
            signing: SigningKey::from_bytes(&seed),
        })
    }

    /// The `AGE-SECRET-KEY-1...` encoding. Handle with care.
    pub fn secret(&self) -> String {
        self.identity.to_string().expose_secret().to_string()
    }

    /// The Ed25519 seed. Handle with care.
    pub fn signing_seed(&self) -> [u8; 32] {
        self.signing.to_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.identity.to_public())
    }

    pub fn verify_key(&self) -> VerifyKey {
        VerifyKey::new(self.signing.verifying_key())
    }

    pub fn identity(&self) -> &age::x25519::Identity {
        &self.identity
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing.sign(message).to_bytes().to_vec()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key().to_string())
            .field("verify_key", &self.verify_key().to_string())
            .field("identity", &"[REDACTED]")
            .finish()
    }
}
