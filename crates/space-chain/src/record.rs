use serde::{Deserialize, Serialize};
use space_core::{RecordHash, Reference, SpaceError, SpaceResult, Timestamp};
use space_crypto::{AccessGrant, KeyPair, VerifyKey};

const SIGNING_CONTEXT: &str = "space-rs 2024 record signature v1";

/// One entry's content: who wrote it, who may read it, and what it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub timestamp: Timestamp,
    pub creator: String,
    /// Wrapped content keys. Empty means the payload is stored in the clear.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub access: Vec<AccessGrant>,
    #[serde(with = "space_core::encoding::bytes")]
    pub payload: Vec<u8>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    /// Ed25519 signature by `creator` over [`Record::signing_digest`].
    #[serde(default, with = "space_core::encoding::bytes")]
    pub signature: Vec<u8>,
}

impl Record {
    /// BLAKE3 over the record's JSON encoding, signature included.
    pub fn hash(&self) -> SpaceResult<RecordHash> {
        let encoded = serde_json::to_vec(self)?;
        Ok(space_chunks::record_hash(&encoded))
    }

    /// Keyed BLAKE3 over every field except the signature. Variable-length
    /// fields are length-prefixed.
    pub fn signing_digest(&self) -> SpaceResult<[u8; 32]> {
        let mut hasher = blake3::Hasher::new_derive_key(SIGNING_CONTEXT);
        hasher.update(&self.timestamp.to_be_bytes());
        update_framed(&mut hasher, self.creator.as_bytes());
        update_framed(&mut hasher, &serde_json::to_vec(&self.access)?);
        update_framed(&mut hasher, &self.payload);
        update_framed(&mut hasher, &serde_json::to_vec(&self.references)?);
        Ok(*hasher.finalize().as_bytes())
    }

    /// Sign with the creator's keys.
    pub fn sign(&mut self, keys: &KeyPair) -> SpaceResult<()> {
        self.signature = keys.sign(&self.signing_digest()?);
        Ok(())
    }

    /// Check the signature against the creator's bound verify key.
    pub fn verify(&self, key: &VerifyKey) -> SpaceResult<()> {
        key.verify(&self.signing_digest()?, &self.signature)
            .map_err(|e| SpaceError::InvalidSignature {
                record: self.hash().map(|h| h.to_string()).unwrap_or_default(),
                reason: format!("creator {}: {e}", self.creator),
            })
    }

    pub fn is_public(&self) -> bool {
        self.access.is_empty()
    }

    pub fn aad(&self) -> Vec<u8> {
        record_aad(&self.creator, self.timestamp)
    }

    pub fn references_hash(&self, hash: &RecordHash) -> bool {
        self.references.iter().any(|r| &r.record_hash == hash)
    }
}

fn update_framed(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Additional data bound into every sealed payload: `creator || timestamp (BE)`.
pub fn record_aad(creator: &str, timestamp: Timestamp) -> Vec<u8> {
    let mut aad = Vec::with_capacity(creator.len() + 8);
    aad.extend_from_slice(creator.as_bytes());
    aad.extend_from_slice(&timestamp.to_be_bytes());
    aad
}
