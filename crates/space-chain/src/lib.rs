//! space-chain: the append-only record substrate the client is built on
//!
//! A channel is a named chain of blocks; each block carries entries
//! (record hash + record) and points at its predecessor. Restricted records
//! carry a sealed payload plus one wrapped key per reader.
//!
//! - `record` / `block`: wire types and their BLAKE3 addressing
//! - `cache`: local block/head/pending storage (`MemoryCache`, `FileCache`)
//! - `network`: peer collaborator (`MemoryNetwork` for tests and demos)
//! - `channel`: head tracking, pull/push, newest-first iteration
//! - `node`: an alias writing, signing, mining, and decrypting records
//! - `listener`: mining progress observers
//! - `alias`: public alias → key registry on the `Alias` channel

pub mod alias;
pub mod block;
pub mod cache;
pub mod channel;
pub mod listener;
pub mod network;
pub mod node;
pub mod record;

pub use alias::{AliasKeys, AliasRegistry, AliasResolver};
pub use block::{Block, BlockEntry, Head};
pub use cache::{Cache, FileCache, MemoryCache};
pub use channel::{Channel, Entries};
pub use listener::{LoggingMiningListener, MiningListener, NoopMiningListener};
pub use network::{MemoryNetwork, Network};
pub use node::Node;
pub use record::{record_aad, Record};
