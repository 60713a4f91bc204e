//! space-client: encrypted file storage on top of `space-chain`
//!
//! Every operation is a method on [`SpaceClient`], an explicit context
//! holding the acting node, chunking bounds, and file mode.
//!
//! - `files`: add, list, read (own and shared)
//! - `deltas`: append/amend and whole-file rewrite
//! - `share`: grant other aliases read access by re-wrapping content keys
//! - `tags`: label metas
//! - `search`: name/type/tag filters and ranked search

pub mod clock;
pub mod deltas;
pub mod files;
pub mod records;
pub mod search;
pub mod share;
pub mod tags;

use std::sync::Arc;

use space_chain::{AliasResolver, Block, Channel, MiningListener, Node};
use space_chunks::ChunkSizes;
use space_core::config::{FileMode, SpaceConfig};
use space_core::{RecordHash, SpaceResult, Timestamp};

pub use clock::MonotonicClock;
pub use files::{FileSource, SharedMeta};
pub use records::Decrypted;
pub use search::{MetaFilter, NameFilter, SearchHit, SearchQuery, TagFilter, TypeFilter};

pub struct SpaceClient {
    node: Node,
    resolver: Arc<dyn AliasResolver>,
    sizes: ChunkSizes,
    mode: FileMode,
    push: bool,
    clock: MonotonicClock,
}

impl SpaceClient {
    pub fn new(node: Node, resolver: Arc<dyn AliasResolver>) -> Self {
        Self {
            node,
            resolver,
            sizes: ChunkSizes::default(),
            mode: FileMode::default(),
            push: true,
            clock: MonotonicClock::new(),
        }
    }

    pub fn from_config(
        node: Node,
        resolver: Arc<dyn AliasResolver>,
        config: &SpaceConfig,
    ) -> SpaceResult<Self> {
        Ok(Self::new(node, resolver)
            .with_chunk_sizes(ChunkSizes::try_from(&config.chunks)?)
            .with_mode(config.files.mode)
            .with_push(config.network.push))
    }

    pub fn with_chunk_sizes(mut self, sizes: ChunkSizes) -> Self {
        self.sizes = sizes;
        self
    }

    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn alias(&self) -> &str {
        self.node.alias()
    }

    pub fn mode(&self) -> FileMode {
        self.mode
    }

    pub fn chunk_sizes(&self) -> ChunkSizes {
        self.sizes
    }

    pub(crate) fn resolver(&self) -> &dyn AliasResolver {
        self.resolver.as_ref()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.next()
    }

    /// Mine `channel`, then push it if propagation is enabled.
    pub(crate) fn publish(
        &self,
        channel: &mut Channel,
        listener: &dyn MiningListener,
    ) -> SpaceResult<(RecordHash, Block)> {
        let mined = self.node.mine(channel, listener)?;
        if self.push {
            self.node.push(channel);
        }
        Ok(mined)
    }

    /// Drop entries written to `channel` but never mined.
    pub(crate) fn discard_pending(&self, channel: &Channel, written: &[RecordHash]) {
        if written.is_empty() {
            return;
        }
        if let Err(e) = self.node.cache().clear_pending(channel.name(), written) {
            tracing::warn!(channel = channel.name(), "discarding pending entries: {e}");
        }
    }
}
