//! Ed25519 record signatures.
//!
//! Every record is signed by its creator. The verifying key is published
//! next to the age recipient in the creator's alias binding, so a reader
//! can check that `creator` really wrote the record before trusting it.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{CryptoError, CryptoResult};

/// An alias's public signing key, displayed as unpadded URL-safe base64.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct VerifyKey(VerifyingKey);

impl VerifyKey {
    pub(crate) fn new(key: VerifyingKey) -> Self {
        Self(key)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    /// Check `signature` over `message`. Any mismatch, including a
    /// malformed signature, is `InvalidSignature`.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        let signature = Signature::from_slice(signature)
            .map_err(|e| CryptoError::InvalidSignature(format!("malformed signature: {e}")))?;
        self.0
            .verify(message, &signature)
            .map_err(|_| CryptoError::InvalidSignature("signature does not match".into()))
    }
}

impl fmt::Display for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&space_core::encoding::encode(&self.to_bytes()))
    }
}

impl fmt::Debug for VerifyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VerifyKey({self})")
    }
}

impl FromStr for VerifyKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = space_core::encoding::decode(s.trim())
            .map_err(|e| CryptoError::InvalidKey(format!("invalid verify key '{s}': {e}")))?;
        let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            CryptoError::InvalidKey(format!("verify key has wrong size: {} bytes", bytes.len()))
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map(VerifyKey)
            .map_err(|e| CryptoError::InvalidKey(format!("invalid verify key '{s}': {e}")))
    }
}

impl Serialize for VerifyKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VerifyKey {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
