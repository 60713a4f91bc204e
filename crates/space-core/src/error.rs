use thiserror::Error;

pub type SpaceResult<T> = Result<T, SpaceError>;

#[derive(Debug, Error)]
pub enum SpaceError {
    /// The caller holds no usable wrapped key for the record.
    #[error("access denied: {alias} cannot decrypt record {record}")]
    AccessDenied { alias: String, record: String },

    /// A referenced record, block, or channel head is absent locally and remotely.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed delta: offset {offset} delete {delete} against buffer of {len} bytes")]
    MalformedDelta { offset: u64, delete: u64, len: u64 },

    #[error("serialization error: {0}")]
    Serialization(String),

    /// Key unwrap or payload decryption failed for a key the caller does hold.
    #[error("decryption failed: {0}")]
    Decrypt(String),

    #[error("encryption failed: {0}")]
    Encrypt(String),

    /// Peer propagation failed. Logged by callers, never fatal to a write.
    #[error("propagation failed: {0}")]
    Propagation(String),

    #[error("unknown alias: {0}")]
    UnknownAlias(String),

    /// The alias is already bound to a different public key.
    #[error("alias already registered with another key: {0}")]
    AliasConflict(String),

    #[error("invalid access control list: {0}")]
    InvalidAcl(String),

    /// The record's signature does not verify under its creator's bound key.
    #[error("invalid signature on record {record}: {reason}")]
    InvalidSignature { record: String, reason: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("{failed} of {total} items failed: {detail}")]
    Batch {
        failed: usize,
        total: usize,
        detail: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpaceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SpaceError::NotFound(_))
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, SpaceError::AccessDenied { .. })
    }

    pub fn is_invalid_signature(&self) -> bool {
        matches!(self, SpaceError::InvalidSignature { .. })
    }
}

impl From<serde_json::Error> for SpaceError {
    fn from(e: serde_json::Error) -> Self {
        SpaceError::Serialization(e.to_string())
    }
}

/// Result of an operation applied to several independent items
/// (recipients of a share, values of a tag batch).
///
/// Every item is attempted; one failure does not stop the rest.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub succeeded: Vec<(String, T)>,
    pub failed: Vec<(String, SpaceError)>,
}

impl<T> Default for BatchOutcome<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchOutcome<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, item: impl Into<String>, result: SpaceResult<T>) {
        match result {
            Ok(value) => self.succeeded.push((item.into(), value)),
            Err(e) => self.failed.push((item.into(), e)),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    /// Collapse into the successful values, or a `Batch` error naming every failure.
    pub fn into_result(self) -> SpaceResult<Vec<T>> {
        if self.failed.is_empty() {
            return Ok(self.succeeded.into_iter().map(|(_, v)| v).collect());
        }
        let total = self.total();
        let detail = self
            .failed
            .iter()
            .map(|(item, e)| format!("{item}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(SpaceError::Batch {
            failed: self.failed.len(),
            total,
            detail,
        })
    }
}
