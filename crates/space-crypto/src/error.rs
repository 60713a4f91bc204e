use space_core::SpaceError;
use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error)]
pub enum CryptoError {
    /// No wrapped key for this identity, or the wrapped key was made for someone else.
    #[error("access denied for {0}")]
    AccessDenied(String),

    /// The key was ours but the ciphertext or wrapped key failed authentication.
    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid access control list: {0}")]
    InvalidAcl(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

impl From<CryptoError> for SpaceError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::AccessDenied(alias) => SpaceError::AccessDenied {
                alias,
                record: "<unknown>".into(),
            },
            CryptoError::Decrypt(msg) => SpaceError::Decrypt(msg),
            CryptoError::Encrypt(msg) => SpaceError::Encrypt(msg),
            CryptoError::InvalidKey(msg) => SpaceError::Decrypt(msg),
            CryptoError::InvalidAcl(msg) => SpaceError::InvalidAcl(msg),
            CryptoError::InvalidSignature(msg) => SpaceError::InvalidSignature {
                record: "<unknown>".into(),
                reason: msg,
            },
        }
    }
}
