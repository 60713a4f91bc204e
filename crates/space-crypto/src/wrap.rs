//! Per-recipient content key wrapping with age (X25519)

use std::io::{Read, Write};
use std::iter;

use crate::error::{CryptoError, CryptoResult};
use crate::keys::{ContentKey, KeyPair, PublicKey};

/// Wrap a content key for one recipient. Output is a binary age file.
pub fn wrap_key(recipient: &PublicKey, key: &ContentKey) -> CryptoResult<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_recipients(iter::once(recipient.recipient() as &dyn age::Recipient))
            .map_err(|e| CryptoError::Encrypt(format!("age encryptor: {e}")))?;

    let mut wrapped = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut wrapped)
        .map_err(|e| CryptoError::Encrypt(format!("age wrap_output: {e}")))?;
    writer
        .write_all(key.as_bytes())
        .map_err(|e| CryptoError::Encrypt(format!("age write: {e}")))?;
    writer
        .finish()
        .map_err(|e| CryptoError::Encrypt(format!("age finish: {e}")))?;

    Ok(wrapped)
}

/// Recover a content key wrapped for `identity`.
///
/// A wrapped key made for a different recipient yields `AccessDenied`;
/// a corrupted one yields `Decrypt`.
pub fn unwrap_key(identity: &KeyPair, wrapped: &[u8]) -> CryptoResult<ContentKey> {
    let decryptor = age::Decryptor::new(wrapped)
        .map_err(|e| CryptoError::Decrypt(format!("age header: {e}")))?;

    let mut reader = decryptor
        .decrypt(iter::once(identity.identity() as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys => {
                CryptoError::AccessDenied(identity.public_key().to_string())
            }
            other => CryptoError::Decrypt(format!("age unwrap: {other}")),
        })?;

    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| CryptoError::Decrypt(format!("age read: {e}")))?;
    ContentKey::from_slice(&bytes)
}
