//! space-crypto: the per-record cryptographic envelope
//!
//! Every restricted record is sealed with its own random content key:
//! ```text
//! Record payload
//!   └── XChaCha20-Poly1305 (key=content_key, nonce=random_192bit, AAD=creator||timestamp)
//! Content key
//!   └── wrapped once per ACL member with age (X25519 recipient = member's public key)
//! ```
//!
//! Every record is also signed with its creator's Ed25519 key (`sign`).
//!
//! Delegating access (sharing) re-wraps content keys; it never touches
//! sealed payload bytes.

pub mod acl;
pub mod envelope;
pub mod error;
pub mod kdf;
pub mod keys;
pub mod keystore;
pub mod sign;
pub mod wrap;

pub use acl::Acl;
pub use envelope::{
    decrypt_record, decrypt_with_key, encrypt_record, find_grant, open, seal, AccessGrant,
    EncryptedPayload,
};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_master_key, KdfParams, MasterKey};
pub use keys::{generate_content_key, ContentKey, KeyPair, PublicKey};
pub use keystore::Keystore;
pub use sign::VerifyKey;
pub use wrap::{unwrap_key, wrap_key};

/// Size of a content key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of an XChaCha20-Poly1305 nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;
