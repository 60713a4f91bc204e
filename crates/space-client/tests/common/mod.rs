//! Fixtures shared by the client integration tests: several aliases, each
//! with its own cache, all gossiping through one in-process peer.

#![allow(dead_code)]

use std::sync::Arc;

use space_chain::{
    AliasRegistry, Cache, MemoryCache, MemoryNetwork, Network, Node, NoopMiningListener,
};
use space_chunks::ChunkSizes;
use space_client::SpaceClient;
use space_crypto::KeyPair;

pub const LISTENER: NoopMiningListener = NoopMiningListener;

pub fn small_chunks() -> ChunkSizes {
    ChunkSizes::new(64, 256, 1024).expect("valid sizes")
}

pub struct Party {
    pub client: SpaceClient,
    pub cache: Arc<MemoryCache>,
}

/// A registered alias on `network` with a fresh key pair and cache.
pub fn party(alias: &str, network: &Arc<MemoryNetwork>) -> Party {
    let cache = Arc::new(MemoryCache::new());
    let network: Arc<dyn Network> = network.clone();
    party_with(alias, cache, Some(network))
}

pub fn party_with(
    alias: &str,
    cache: Arc<MemoryCache>,
    network: Option<Arc<dyn Network>>,
) -> Party {
    let node_cache: Arc<dyn Cache> = cache.clone();
    let node = Node::new(alias, KeyPair::generate(), node_cache, network);
    let registry = AliasRegistry::for_node(&node);
    registry
        .register(&node, &LISTENER)
        .expect("alias registration");
    let client = SpaceClient::new(node, Arc::new(registry)).with_chunk_sizes(small_chunks());
    Party { client, cache }
}

/// Deterministic, non-repeating test content.
pub fn content(len: usize) -> Vec<u8> {
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
