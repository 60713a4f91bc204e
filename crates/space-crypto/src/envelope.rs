//! Record envelope: seal a payload once, wrap its key per ACL member.
//!
//! Sealed format (binary):
//! ```text
//! [24 bytes: random nonce][N bytes: ciphertext][16 bytes: Poly1305 tag]
//! ```
//!
//! The AAD is supplied by the caller. Records use `creator || timestamp`
//! so a sealed payload cannot be replayed under another author or time.

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::acl::Acl;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{generate_content_key, ContentKey, KeyPair};
use crate::wrap::{unwrap_key, wrap_key};
use crate::{NONCE_SIZE, TAG_SIZE};

/// A content key wrapped for one alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    pub alias: String,
    #[serde(with = "space_core::encoding::bytes")]
    pub wrapped_key: Vec<u8>,
}

/// Output of [`encrypt_record`].
#[derive(Debug)]
pub struct EncryptedPayload {
    pub ciphertext: Vec<u8>,
    pub access: Vec<AccessGrant>,
}

/// Encrypt `plaintext` with XChaCha20-Poly1305 under `key`.
///
/// Returns `[24-byte nonce][ciphertext][16-byte tag]`.
pub fn seal(key: &ContentKey, aad: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CryptoError::Encrypt(format!("payload encryption failed: {e}")))?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);
    Ok(result)
}

/// Reverse [`seal`]. Fails on a wrong key, wrong AAD, or tampered bytes.
pub fn open(key: &ContentKey, aad: &[u8], sealed: &[u8]) -> CryptoResult<Vec<u8>> {
    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CryptoError::Decrypt(format!(
            "sealed payload too short: {} bytes (minimum {})",
            sealed.len(),
            NONCE_SIZE + TAG_SIZE
        )));
    }

    let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| {
            CryptoError::Decrypt("payload decryption failed: wrong key, AAD, or corrupted data".into())
        })
}

/// Seal `payload` under a fresh content key and wrap that key for every
/// member of `acl`.
pub fn encrypt_record(payload: &[u8], acl: &Acl, aad: &[u8]) -> CryptoResult<EncryptedPayload> {
    let key = generate_content_key();
    let ciphertext = seal(&key, aad, payload)?;

    let access = acl
        .iter()
        .map(|(alias, public_key)| {
            Ok(AccessGrant {
                alias: alias.to_string(),
                wrapped_key: wrap_key(public_key, &key)?,
            })
        })
        .collect::<CryptoResult<Vec<_>>>()?;

    tracing::trace!(
        members = access.len(),
        bytes = payload.len(),
        "record sealed"
    );

    Ok(EncryptedPayload { ciphertext, access })
}

/// Decrypt a record using the caller's own wrapped key.
pub fn decrypt_record(
    ciphertext: &[u8],
    wrapped_key: &[u8],
    identity: &KeyPair,
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    let key = unwrap_key(identity, wrapped_key)?;
    open(&key, aad, ciphertext)
}

/// Decrypt a record with a content key obtained some other way (a Share).
pub fn decrypt_with_key(ciphertext: &[u8], key: &ContentKey, aad: &[u8]) -> CryptoResult<Vec<u8>> {
    open(key, aad, ciphertext)
}

pub fn find_grant<'a>(access: &'a [AccessGrant], alias: &str) -> Option<&'a AccessGrant> {
    access.iter().find(|g| g.alias == alias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn acl_for(owner: &KeyPair) -> Acl {
        Acl::new("alice", owner.public_key())
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = generate_content_key();
        let sealed = seal(&key, b"aad", b"hello, encrypted world!").unwrap();
        assert_eq!(open(&key, b"aad", &sealed).unwrap(), b"hello, encrypted world!");
    }

    #[test]
    fn test_sealed_size() {
        let key = generate_content_key();
        let sealed = seal(&key, b"", &[0u8; 1000]).unwrap();
        // nonce (24) + plaintext (1000) + tag (16)
        assert_eq!(sealed.len(), NONCE_SIZE + 1000 + TAG_SIZE);
    }

    #[test]
    fn test_open_wrong_aad() {
        let key = generate_content_key();
        let sealed = seal(&key, b"alice|1", b"secret").unwrap();
        assert!(open(&key, b"mallory|1", &sealed).is_err());
    }

    #[test]
    fn test_open_tampered() {
        let key = generate_content_key();
        let mut sealed = seal(&key, b"", b"secret data").unwrap();
        sealed[NONCE_SIZE + 1] ^= 0xFF;
        let err = open(&key, b"", &sealed).unwrap_err();
        assert!(matches!(err, CryptoError::Decrypt(_)));
    }

    #[test]
    fn test_open_too_short() {
        let key = generate_content_key();
        assert!(open(&key, b"", &[0u8; 10]).is_err());
    }

    #[test]
    fn test_encrypt_record_grants_every_member() {
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let acl = acl_for(&alice).with_member("bob", bob.public_key());

        let out = encrypt_record(b"payload", &acl, b"aad").unwrap();
        assert_eq!(out.access.len(), 2);

        for (alias, pair) in [("alice", &alice), ("bob", &bob)] {
            let grant = find_grant(&out.access, alias).unwrap();
            let plain = decrypt_record(&out.ciphertext, &grant.wrapped_key, pair, b"aad").unwrap();
            assert_eq!(plain, b"payload");
        }
    }

    #[test]
    fn test_non_member_is_denied() {
        let alice = KeyPair::generate();
        let carol = KeyPair::generate();
        let out = encrypt_record(b"payload", &acl_for(&alice), b"aad").unwrap();

        assert!(find_grant(&out.access, "carol").is_none());

        // Even if carol tries alice's grant, age refuses it.
        let grant = find_grant(&out.access, "alice").unwrap();
        let err = decrypt_record(&out.ciphertext, &grant.wrapped_key, &carol, b"aad").unwrap_err();
        assert!(matches!(err, CryptoError::AccessDenied(_)));
    }

    #[test]
    fn test_decrypt_with_unwrapped_key() {
        let alice = KeyPair::generate();
        let out = encrypt_record(b"payload", &acl_for(&alice), b"aad").unwrap();
        let grant = find_grant(&out.access, "alice").unwrap();
        let key = unwrap_key(&alice, &grant.wrapped_key).unwrap();
        let plain = decrypt_with_key(&out.ciphertext, &key, b"aad").unwrap();
        assert_eq!(plain, b"payload");
    }

    #[test]
    fn test_grant_json_is_base64() {
        let grant = AccessGrant {
            alias: "alice".into(),
            wrapped_key: vec![1, 2, 3],
        };
        let json = serde_json::to_string(&grant).unwrap();
        assert_eq!(json, r#"{"alias":"alice","wrapped_key":"AQID"}"#);
    }

    proptest! {
        #[test]
        fn prop_seal_open(data in proptest::collection::vec(any::<u8>(), 0..4096),
                          aad in proptest::collection::vec(any::<u8>(), 0..64)) {
            let key = generate_content_key();
            let sealed = seal(&key, &aad, &data).unwrap();
            prop_assert_eq!(open(&key, &aad, &sealed).unwrap(), data);
        }
    }
}
