//! Peer collaborator. Peers keep the longest chain they have been offered.

use std::collections::HashMap;
use std::sync::Mutex;

use space_core::{RecordHash, SpaceError, SpaceResult};

use crate::block::{Block, Head};

pub trait Network: Send + Sync {
    fn head(&self, channel: &str) -> SpaceResult<Option<Head>>;
    fn block(&self, hash: &RecordHash) -> SpaceResult<Option<Block>>;
    /// Offer a new head together with the blocks the peer may be missing.
    fn broadcast(&self, head: &Head, blocks: &[(RecordHash, Block)]) -> SpaceResult<()>;
}

#[derive(Default)]
struct Peer {
    heads: HashMap<String, Head>,
    blocks: HashMap<RecordHash, Block>,
}

/// A single in-process peer shared by every node that holds it.
#[derive(Default)]
pub struct MemoryNetwork {
    peer: Mutex<Peer>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Network for MemoryNetwork {
    fn head(&self, channel: &str) -> SpaceResult<Option<Head>> {
        let peer = self.peer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(peer.heads.get(channel).cloned())
    }

    fn block(&self, hash: &RecordHash) -> SpaceResult<Option<Block>> {
        let peer = self.peer.lock().unwrap_or_else(|e| e.into_inner());
        Ok(peer.blocks.get(hash).cloned())
    }

    fn broadcast(&self, head: &Head, blocks: &[(RecordHash, Block)]) -> SpaceResult<()> {
        let mut peer = self.peer.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(current) = peer.heads.get(&head.channel_name) {
            if current.block_hash == head.block_hash {
                return Ok(());
            }
            if current.length >= head.length {
                return Err(SpaceError::Propagation(format!(
                    "{}: peer chain length {} not shorter than offered {}",
                    head.channel_name, current.length, head.length
                )));
            }
        }

        for (hash, block) in blocks {
            peer.blocks.entry(*hash).or_insert_with(|| block.clone());
        }
        if !peer.blocks.contains_key(&head.block_hash) {
            return Err(SpaceError::Propagation(format!(
                "{}: head block {} not supplied",
                head.channel_name, head.block_hash
            )));
        }
        peer.heads.insert(head.channel_name.clone(), head.clone());
        tracing::debug!(channel = %head.channel_name, length = head.length, "peer accepted head");
        Ok(())
    }
}
