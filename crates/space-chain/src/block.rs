use serde::{Deserialize, Serialize};
use space_core::{RecordHash, SpaceResult, Timestamp};

use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub record_hash: RecordHash,
    pub record: Record,
}

/// A mined batch of entries on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: Timestamp,
    pub channel_name: String,
    /// Number of blocks in the chain ending here (genesis = 1).
    pub length: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<RecordHash>,
    pub miner: String,
    pub entries: Vec<BlockEntry>,
}

impl Block {
    pub fn hash(&self) -> SpaceResult<RecordHash> {
        let encoded = serde_json::to_vec(self)?;
        Ok(space_chunks::record_hash(&encoded))
    }
}

/// Latest block of a channel as seen by a cache or peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Head {
    pub channel_name: String,
    pub block_hash: RecordHash,
    pub timestamp: Timestamp,
    pub length: u64,
}

impl Head {
    pub fn of(hash: RecordHash, block: &Block) -> Self {
        Self {
            channel_name: block.channel_name.clone(),
            block_hash: hash,
            timestamp: block.timestamp,
            length: block.length,
        }
    }
}
