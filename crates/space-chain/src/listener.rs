//! Mining progress observers. Purely informational; they cannot veto a block.

use space_core::RecordHash;

use crate::block::Block;

pub trait MiningListener {
    fn on_mining_started(&self, _channel: &str, _entries: usize) {}

    fn on_mining_completed(&self, _channel: &str, _hash: &RecordHash, _block: &Block) {}
}

/// Ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMiningListener;

impl MiningListener for NoopMiningListener {}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMiningListener;

impl MiningListener for LoggingMiningListener {
    fn on_mining_started(&self, channel: &str, entries: usize) {
        tracing::debug!(channel, entries, "mining started");
    }

    fn on_mining_completed(&self, channel: &str, hash: &RecordHash, block: &Block) {
        tracing::info!(
            channel,
            block = %hash,
            length = block.length,
            entries = block.entries.len(),
            "mined block"
        );
    }
}
