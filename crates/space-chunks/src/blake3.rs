//! BLAKE3 content hashing
//!
//! Records and blocks are addressed by the BLAKE3 digest of their canonical
//! JSON encoding; the digest doubles as the `metaId` of a Meta record.

use space_core::RecordHash;

pub type Hash = blake3::Hash;

pub fn hash_bytes(data: &[u8]) -> Hash {
    blake3::hash(data)
}

pub fn hash_to_record_hash(hash: &Hash) -> RecordHash {
    RecordHash::from_bytes(*hash.as_bytes())
}

/// Hash `data` straight into a `RecordHash`.
pub fn record_hash(data: &[u8]) -> RecordHash {
    hash_to_record_hash(&hash_bytes(data))
}
