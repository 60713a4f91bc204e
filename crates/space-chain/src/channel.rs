use space_core::{RecordHash, SpaceError, SpaceResult};

use crate::block::{Block, BlockEntry, Head};
use crate::cache::Cache;
use crate::network::Network;

/// A named chain of blocks, tracked by its latest known head.
#[derive(Debug, Clone)]
pub struct Channel {
    name: String,
    head: Option<Head>,
}

impl Channel {
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            head: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn head(&self) -> Option<&Head> {
        self.head.as_ref()
    }

    /// Number of blocks in the chain (0 when empty).
    pub fn length(&self) -> u64 {
        self.head.as_ref().map_or(0, |h| h.length)
    }

    /// Adopt the head recorded in the local cache, if any.
    pub fn load_head(&mut self, cache: &dyn Cache) -> SpaceResult<()> {
        if let Some(head) = cache.head(&self.name)? {
            self.head = Some(head);
        }
        Ok(())
    }

    /// Pull a longer chain from `network`, caching every block it is missing.
    /// Returns whether the head moved.
    pub fn refresh(&mut self, cache: &dyn Cache, network: &dyn Network) -> SpaceResult<bool> {
        let Some(remote) = network.head(&self.name)? else {
            return Ok(false);
        };
        if let Some(local) = &self.head {
            if local.block_hash == remote.block_hash || local.length >= remote.length {
                return Ok(false);
            }
        }

        let mut next = Some(remote.block_hash);
        let mut fetched = 0usize;
        while let Some(hash) = next {
            if cache.block(&hash)?.is_some() {
                break;
            }
            let block = network
                .block(&hash)?
                .ok_or_else(|| SpaceError::NotFound(format!("block {hash} on {}", self.name)))?;
            self.verify(&hash, &block)?;
            next = block.previous;
            cache.put_block(&hash, &block)?;
            fetched += 1;
        }

        tracing::debug!(channel = %self.name, length = remote.length, fetched, "pulled remote head");
        cache.put_head(&remote)?;
        self.head = Some(remote);
        Ok(true)
    }

    /// Offer the local head, plus every block the peer lacks, to `network`.
    pub fn push(&self, cache: &dyn Cache, network: &dyn Network) -> SpaceResult<()> {
        let Some(head) = &self.head else {
            return Ok(());
        };

        let mut missing = Vec::new();
        let mut next = Some(head.block_hash);
        while let Some(hash) = next {
            if network.block(&hash)?.is_some() {
                break;
            }
            let block = cache
                .block(&hash)?
                .ok_or_else(|| SpaceError::NotFound(format!("block {hash} on {}", self.name)))?;
            next = block.previous;
            missing.push((hash, block));
        }
        network.broadcast(head, &missing)
    }

    /// Append a freshly mined block and move the head to it.
    pub fn update(&mut self, cache: &dyn Cache, hash: RecordHash, block: &Block) -> SpaceResult<Head> {
        let expected = self.head.as_ref().map(|h| h.block_hash);
        if block.previous != expected || block.channel_name != self.name {
            return Err(SpaceError::Serialization(format!(
                "block {hash} does not extend {} at {:?}",
                self.name, expected
            )));
        }
        cache.put_block(&hash, block)?;
        let head = Head::of(hash, block);
        cache.put_head(&head)?;
        self.head = Some(head.clone());
        Ok(head)
    }

    /// Blocks from the head back to genesis, fetched lazily.
    pub fn blocks<'a>(&self, cache: &'a dyn Cache, network: Option<&'a dyn Network>) -> Blocks<'a> {
        Blocks {
            channel: self.name.clone(),
            cache,
            network,
            next: self.head.as_ref().map(|h| h.block_hash),
        }
    }

    /// Entries newest first.
    pub fn entries<'a>(&self, cache: &'a dyn Cache, network: Option<&'a dyn Network>) -> Entries<'a> {
        Entries {
            blocks: self.blocks(cache, network),
            current: Vec::new(),
        }
    }

    /// Entries in append order, oldest first.
    pub fn entries_in_order(
        &self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
    ) -> SpaceResult<Vec<BlockEntry>> {
        let mut entries = self.entries(cache, network).collect::<SpaceResult<Vec<_>>>()?;
        entries.reverse();
        Ok(entries)
    }

    pub fn find_entry(
        &self,
        cache: &dyn Cache,
        network: Option<&dyn Network>,
        record_hash: &RecordHash,
    ) -> SpaceResult<BlockEntry> {
        for entry in self.entries(cache, network) {
            let entry = entry?;
            if &entry.record_hash == record_hash {
                return Ok(entry);
            }
        }
        Err(SpaceError::NotFound(format!(
            "record {record_hash} on {}",
            self.name
        )))
    }

    fn verify(&self, hash: &RecordHash, block: &Block) -> SpaceResult<()> {
        verify_block(&self.name, hash, block)
    }
}

fn verify_block(channel: &str, hash: &RecordHash, block: &Block) -> SpaceResult<()> {
    if &block.hash()? != hash {
        return Err(SpaceError::Serialization(format!(
            "block {hash} on {channel} does not match its hash"
        )));
    }
    if block.channel_name != channel {
        return Err(SpaceError::Serialization(format!(
            "block {hash} belongs to {}, not {channel}",
            block.channel_name
        )));
    }
    Ok(())
}

/// Look a block up locally, falling back to the network (and caching it).
pub fn fetch_block(
    channel: &str,
    cache: &dyn Cache,
    network: Option<&dyn Network>,
    hash: &RecordHash,
) -> SpaceResult<Block> {
    if let Some(block) = cache.block(hash)? {
        return Ok(block);
    }
    if let Some(network) = network {
        if let Some(block) = network.block(hash)? {
            verify_block(channel, hash, &block)?;
            cache.put_block(hash, &block)?;
            return Ok(block);
        }
    }
    Err(SpaceError::NotFound(format!("block {hash} on {channel}")))
}

pub struct Blocks<'a> {
    channel: String,
    cache: &'a dyn Cache,
    network: Option<&'a dyn Network>,
    next: Option<RecordHash>,
}

impl Iterator for Blocks<'_> {
    type Item = SpaceResult<(RecordHash, Block)>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match fetch_block(&self.channel, self.cache, self.network, &hash) {
            Ok(block) => {
                self.next = block.previous;
                Some(Ok((hash, block)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Newest-first entry iterator. Stops after the first fetch error.
pub struct Entries<'a> {
    blocks: Blocks<'a>,
    current: Vec<BlockEntry>,
}

impl Iterator for Entries<'_> {
    type Item = SpaceResult<BlockEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.pop() {
                return Some(Ok(entry));
            }
            match self.blocks.next()? {
                Ok((_, block)) => self.current = block.entries,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
