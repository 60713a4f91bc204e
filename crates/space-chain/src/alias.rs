//! Alias → public key resolution.
//!
//! Bindings are public records on the `Alias` channel carrying the alias's
//! age recipient and its Ed25519 verify key. A binding counts only when the
//! record is signed by the verify key it publishes. The first such record
//! created by an alias for itself wins; later ones are ignored.

use std::sync::Arc;

use space_core::channels::ALIAS_CHANNEL;
use space_core::{timestamp_now, Alias, Reference, SpaceError, SpaceResult};
use space_crypto::{PublicKey, VerifyKey};

use crate::cache::Cache;
use crate::channel::Channel;
use crate::listener::MiningListener;
use crate::network::Network;
use crate::node::Node;

pub trait AliasResolver: Send + Sync {
    /// The public key bound to `alias`, or `UnknownAlias`.
    fn resolve(&self, alias: &str) -> SpaceResult<PublicKey>;
}

/// The keys an alias binding publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasKeys {
    pub public_key: PublicKey,
    pub verify_key: VerifyKey,
}

pub struct AliasRegistry {
    cache: Arc<dyn Cache>,
    network: Option<Arc<dyn Network>>,
}

impl AliasRegistry {
    pub fn new(cache: Arc<dyn Cache>, network: Option<Arc<dyn Network>>) -> Self {
        Self { cache, network }
    }

    /// A registry reading through the same cache and network as `node`.
    pub fn for_node(node: &Node) -> Self {
        Self::new(node.cache_handle(), node.network_handle())
    }

    fn channel(&self) -> SpaceResult<Channel> {
        let mut channel = Channel::open(ALIAS_CHANNEL);
        channel.load_head(self.cache.as_ref())?;
        if let Some(network) = self.network.as_deref() {
            if let Err(e) = channel.refresh(self.cache.as_ref(), network) {
                tracing::warn!(channel = ALIAS_CHANNEL, "pull failed: {e}");
            }
        }
        Ok(channel)
    }

    pub fn lookup(&self, alias: &str) -> SpaceResult<Option<PublicKey>> {
        Ok(self.lookup_keys(alias)?.map(|keys| keys.public_key))
    }

    pub fn lookup_keys(&self, alias: &str) -> SpaceResult<Option<AliasKeys>> {
        let channel = self.channel()?;
        for entry in channel.entries_in_order(self.cache.as_ref(), self.network.as_deref())? {
            let record = &entry.record;
            if record.creator != alias || !record.is_public() {
                continue;
            }
            let binding: Alias = match serde_json::from_slice(&record.payload) {
                Ok(binding) => binding,
                Err(e) => {
                    tracing::debug!(record = %entry.record_hash, "skipping malformed alias record: {e}");
                    continue;
                }
            };
            if binding.alias != alias {
                continue;
            }
            let verify_key: VerifyKey = match binding.verify_key.parse() {
                Ok(key) => key,
                Err(e) => {
                    tracing::debug!(record = %entry.record_hash, "skipping alias record: {e}");
                    continue;
                }
            };
            if let Err(e) = record.verify(&verify_key) {
                tracing::warn!(alias, record = %entry.record_hash, "skipping alias record: {e}");
                continue;
            }
            return Ok(Some(AliasKeys {
                public_key: binding.public_key.parse()?,
                verify_key,
            }));
        }
        Ok(None)
    }

    /// Publish `node`'s alias binding. Returns `None` when the same binding
    /// already exists; a different key under the same alias is refused.
    pub fn register(
        &self,
        node: &Node,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Option<Reference>> {
        let own = AliasKeys {
            public_key: node.public_key(),
            verify_key: node.keys().verify_key(),
        };
        match self.lookup_keys(node.alias())? {
            Some(existing) if existing == own => {
                tracing::debug!(alias = node.alias(), "alias already registered");
                return Ok(None);
            }
            Some(_) => return Err(SpaceError::AliasConflict(node.alias().to_string())),
            None => {}
        }

        let binding = Alias {
            alias: node.alias().to_string(),
            public_key: own.public_key.to_string(),
            verify_key: own.verify_key.to_string(),
        };
        let payload = serde_json::to_vec(&binding)?;

        let mut channel = node.open_channel(ALIAS_CHANNEL)?;
        let reference = node.write(timestamp_now(), &channel, None, Vec::new(), &payload)?;
        node.mine(&mut channel, listener)?;
        node.push(&channel);

        tracing::info!(alias = node.alias(), "alias registered");
        Ok(Some(reference))
    }
}

impl AliasResolver for AliasRegistry {
    fn resolve(&self, alias: &str) -> SpaceResult<PublicKey> {
        self.lookup(alias)?
            .ok_or_else(|| SpaceError::UnknownAlias(alias.to_string()))
    }
}
