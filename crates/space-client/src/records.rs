use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use space_chain::{BlockEntry, Channel, Entries, Node};
use space_core::SpaceResult;

/// Newest-first `(entry, value)` pairs from a channel, decrypted with the
/// node's own grants. Entries it holds no grant for, or whose signature
/// does not verify, are skipped.
pub struct Decrypted<'a, T> {
    node: &'a Node,
    entries: Entries<'a>,
    _marker: PhantomData<T>,
}

impl<'a, T> Decrypted<'a, T> {
    pub(crate) fn new(node: &'a Node, channel: &Channel) -> Self {
        Self {
            node,
            entries: channel.entries(node.cache(), node.network()),
            _marker: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for Decrypted<'_, T> {
    type Item = SpaceResult<(BlockEntry, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(e)),
            };
            match self.node.decrypt_entry(&entry) {
                Ok(bytes) => return Some(decode(&bytes).map(|value| (entry, value))),
                Err(e) if e.is_access_denied() => {
                    tracing::trace!(record = %entry.record_hash, "skipping record without grant");
                }
                Err(e) if e.is_invalid_signature() => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> SpaceResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

pub(crate) fn encode<T: serde::Serialize>(value: &T) -> SpaceResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}
