use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::encoding;
use crate::error::SpaceError;

/// Nanoseconds since the Unix epoch.
pub type Timestamp = u64;

pub fn timestamp_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default()
}

/// BLAKE3 digest identifying a record or block.
///
/// The textual form (unpadded URL-safe base64) is the `metaId` users pass
/// around and the suffix of per-file channel names.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordHash([u8; 32]);

impl RecordHash {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SpaceError> {
        let array: [u8; 32] = bytes.try_into().map_err(|_| {
            SpaceError::Serialization(format!(
                "record hash must be {} bytes, got {}",
                Self::LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn encode(&self) -> String {
        encoding::encode(&self.0)
    }
}

impl fmt::Display for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for RecordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordHash({})", self.encode())
    }
}

impl FromStr for RecordHash {
    type Err = SpaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_slice(&encoding::decode(s.trim())?)
    }
}

impl Serialize for RecordHash {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for RecordHash {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let text = String::deserialize(d)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Pointer to a record on a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub timestamp: Timestamp,
    pub channel_name: String,
    pub record_hash: RecordHash,
    /// Block the record was mined into, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_hash: Option<RecordHash>,
}

/// Descriptor of one logical file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    #[serde(rename = "type")]
    pub mime: String,
    /// Bytes stored as chunks; zero for files held purely as deltas.
    #[serde(default)]
    pub size: u64,
}

/// One edit: delete `delete` bytes at `offset`, then splice `insert` there.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub offset: u64,
    #[serde(default)]
    pub delete: u64,
    #[serde(default, with = "encoding::bytes")]
    pub insert: Vec<u8>,
}

impl Delta {
    pub fn new(offset: u64, delete: u64, insert: impl Into<Vec<u8>>) -> Self {
        Self {
            offset,
            delete,
            insert: insert.into(),
        }
    }

    /// Insert-only delta, as produced when a file's initial content is stored.
    pub fn insert(offset: u64, data: impl Into<Vec<u8>>) -> Self {
        Self::new(offset, 0, data)
    }

    pub fn is_noop(&self) -> bool {
        self.delete == 0 && self.insert.is_empty()
    }
}

impl fmt::Debug for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delta")
            .field("offset", &self.offset)
            .field("delete", &self.delete)
            .field("insert_len", &self.insert.len())
            .finish()
    }
}

/// Grant of read access to another alias's Meta (and its chunks).
///
/// The keys are raw content keys; the Share record itself is sealed for the
/// recipient and the owner, so they never travel in the clear.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub meta_reference: Reference,
    #[serde(with = "encoding::bytes")]
    pub meta_key: Vec<u8>,
    /// Parallel to the Meta record's reference list; empty for delta-only files.
    #[serde(default, with = "encoding::bytes_list")]
    pub chunk_keys: Vec<Vec<u8>>,
    /// Keys of the file's delta records in append order, as of the share.
    #[serde(default, with = "encoding::bytes_list")]
    pub delta_keys: Vec<Vec<u8>>,
}

impl fmt::Debug for Share {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Share")
            .field("meta_reference", &self.meta_reference)
            .field("meta_key", &"[REDACTED]")
            .field("chunk_keys", &self.chunk_keys.len())
            .field("delta_keys", &self.delta_keys.len())
            .finish()
    }
}

/// Free-text label attached to a Meta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub value: String,
}

/// Public binding of an alias to its age recipient key and its record
/// signing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub alias: String,
    pub public_key: String,
    pub verify_key: String,
}
