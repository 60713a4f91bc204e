use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use space_core::{timestamp_now, RecordHash, Reference, SpaceError, SpaceResult, Timestamp};
use space_crypto::{
    decrypt_record, encrypt_record, find_grant, unwrap_key, Acl, ContentKey, CryptoError, KeyPair,
    PublicKey, VerifyKey,
};

use crate::alias::AliasRegistry;
use crate::block::{Block, BlockEntry};
use crate::cache::Cache;
use crate::channel::{fetch_block, Channel};
use crate::listener::MiningListener;
use crate::network::Network;
use crate::record::{record_aad, Record};

/// An alias acting on the chain: writes, signs, and mines records, and
/// decrypts the ones it holds a grant for once their signature checks out.
pub struct Node {
    alias: String,
    keys: KeyPair,
    cache: Arc<dyn Cache>,
    network: Option<Arc<dyn Network>>,
    /// Verify keys of other aliases. Bindings never change once published.
    signers: Mutex<HashMap<String, VerifyKey>>,
}

impl Node {
    pub fn new(
        alias: impl Into<String>,
        keys: KeyPair,
        cache: Arc<dyn Cache>,
        network: Option<Arc<dyn Network>>,
    ) -> Self {
        Self {
            alias: alias.into(),
            keys,
            cache,
            network,
            signers: Mutex::new(HashMap::new()),
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn keys(&self) -> &KeyPair {
        &self.keys
    }

    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub fn network(&self) -> Option<&dyn Network> {
        self.network.as_deref()
    }

    pub fn cache_handle(&self) -> Arc<dyn Cache> {
        Arc::clone(&self.cache)
    }

    pub fn network_handle(&self) -> Option<Arc<dyn Network>> {
        self.network.clone()
    }

    /// ACL granting only this node's alias.
    pub fn owner_acl(&self) -> Acl {
        Acl::new(self.alias.clone(), self.public_key())
    }

    /// Open `name` at its cached head, then pull from the network.
    pub fn open_channel(&self, name: impl Into<String>) -> SpaceResult<Channel> {
        let mut channel = Channel::open(name);
        channel.load_head(self.cache())?;
        self.pull(&mut channel);
        Ok(channel)
    }

    /// Pull failures are logged, never returned: the local cache stays authoritative.
    pub fn pull(&self, channel: &mut Channel) {
        if let Some(network) = self.network() {
            if let Err(e) = channel.refresh(self.cache(), network) {
                tracing::warn!(channel = channel.name(), "pull failed: {e}");
            }
        }
    }

    /// Push failures are logged, never returned.
    pub fn push(&self, channel: &Channel) {
        if let Some(network) = self.network() {
            if let Err(e) = channel.push(self.cache(), network) {
                tracing::warn!(channel = channel.name(), "push failed: {e}");
            }
        }
    }

    /// Store a signed record as a pending entry on `channel`.
    ///
    /// With an ACL the payload is sealed and its key wrapped for every
    /// member; without one it is stored in the clear.
    pub fn write(
        &self,
        timestamp: Timestamp,
        channel: &Channel,
        acl: Option<&Acl>,
        references: Vec<Reference>,
        payload: &[u8],
    ) -> SpaceResult<Reference> {
        let (access, payload) = match acl {
            Some(acl) => {
                if !acl.contains(&self.alias) {
                    return Err(SpaceError::InvalidAcl(format!(
                        "writer {} is not a member",
                        self.alias
                    )));
                }
                let sealed = encrypt_record(payload, acl, &record_aad(&self.alias, timestamp))?;
                (sealed.access, sealed.ciphertext)
            }
            None => (Vec::new(), payload.to_vec()),
        };

        let mut record = Record {
            timestamp,
            creator: self.alias.clone(),
            access,
            payload,
            references,
            signature: Vec::new(),
        };
        record.sign(&self.keys)?;
        let record_hash = record.hash()?;
        self.cache.put_pending(
            channel.name(),
            &BlockEntry {
                record_hash,
                record,
            },
        )?;
        tracing::debug!(channel = channel.name(), record = %record_hash, "record written");

        Ok(Reference {
            timestamp,
            channel_name: channel.name().to_string(),
            record_hash,
            block_hash: None,
        })
    }

    /// Seal every pending entry of `channel` into a new block on its head.
    pub fn mine(
        &self,
        channel: &mut Channel,
        listener: &dyn MiningListener,
    ) -> SpaceResult<(RecordHash, Block)> {
        let mut entries = self.cache.pending(channel.name())?;
        if entries.is_empty() {
            return Err(SpaceError::NotFound(format!(
                "no pending entries on {}",
                channel.name()
            )));
        }
        entries.sort_by_key(|e| e.record.timestamp);
        listener.on_mining_started(channel.name(), entries.len());

        let block = Block {
            timestamp: timestamp_now(),
            channel_name: channel.name().to_string(),
            length: channel.length() + 1,
            previous: channel.head().map(|h| h.block_hash),
            miner: self.alias.clone(),
            entries,
        };
        let hash = block.hash()?;
        let mined: Vec<RecordHash> = block.entries.iter().map(|e| e.record_hash).collect();

        channel.update(self.cache(), hash, &block)?;
        self.cache.clear_pending(channel.name(), &mined)?;
        listener.on_mining_completed(channel.name(), &hash, &block);

        Ok((hash, block))
    }

    /// Decrypt an entry with this node's own grant, then check that its
    /// creator signed it.
    pub fn decrypt_entry(&self, entry: &BlockEntry) -> SpaceResult<Vec<u8>> {
        let record = &entry.record;
        let plain = if record.is_public() {
            record.payload.clone()
        } else {
            let grant = find_grant(&record.access, &self.alias)
                .ok_or_else(|| self.denied(&entry.record_hash))?;
            decrypt_record(&record.payload, &grant.wrapped_key, &self.keys, &record.aad())
                .map_err(|e| self.crypto_error(e, &entry.record_hash))?
        };
        self.verify_entry(entry)?;
        Ok(plain)
    }

    /// Recover the content key of a signed entry this node has a grant for.
    pub fn content_key(&self, entry: &BlockEntry) -> SpaceResult<ContentKey> {
        let grant = find_grant(&entry.record.access, &self.alias)
            .ok_or_else(|| self.denied(&entry.record_hash))?;
        let key = unwrap_key(&self.keys, &grant.wrapped_key)
            .map_err(|e| self.crypto_error(e, &entry.record_hash))?;
        self.verify_entry(entry)?;
        Ok(key)
    }

    /// Check the entry's signature against the verify key bound to its
    /// creator. A creator with no binding fails like a bad signature.
    pub fn verify_entry(&self, entry: &BlockEntry) -> SpaceResult<()> {
        let creator = &entry.record.creator;
        let key = if creator == &self.alias {
            self.keys.verify_key()
        } else {
            self.signer(creator, &entry.record_hash)?
        };
        entry
            .record
            .verify(&key)
            .map_err(|e| self.invalid_signature(&entry.record_hash, e))
    }

    fn signer(&self, alias: &str, record: &RecordHash) -> SpaceResult<VerifyKey> {
        let mut signers = self.signers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(key) = signers.get(alias) {
            return Ok(*key);
        }
        let registry = AliasRegistry::new(self.cache_handle(), self.network_handle());
        match registry.lookup_keys(alias)? {
            Some(keys) => {
                signers.insert(alias.to_string(), keys.verify_key);
                Ok(keys.verify_key)
            }
            None => Err(SpaceError::InvalidSignature {
                record: record.to_string(),
                reason: format!("creator {alias} has no alias binding"),
            }),
        }
    }

    /// Resolve a reference to its entry, using the block hash when known.
    pub fn fetch_reference(&self, reference: &Reference) -> SpaceResult<BlockEntry> {
        if let Some(block_hash) = &reference.block_hash {
            let block = fetch_block(
                &reference.channel_name,
                self.cache(),
                self.network(),
                block_hash,
            )?;
            return block
                .entries
                .into_iter()
                .find(|e| e.record_hash == reference.record_hash)
                .ok_or_else(|| {
                    SpaceError::NotFound(format!(
                        "record {} in block {block_hash}",
                        reference.record_hash
                    ))
                });
        }
        let channel = self.open_channel(reference.channel_name.clone())?;
        channel.find_entry(self.cache(), self.network(), &reference.record_hash)
    }

    fn denied(&self, record: &RecordHash) -> SpaceError {
        SpaceError::AccessDenied {
            alias: self.alias.clone(),
            record: record.to_string(),
        }
    }

    fn invalid_signature(&self, record: &RecordHash, e: SpaceError) -> SpaceError {
        let reason = match e {
            SpaceError::InvalidSignature { reason, .. } => reason,
            other => other.to_string(),
        };
        tracing::warn!(record = %record, "rejecting record: {reason}");
        SpaceError::InvalidSignature {
            record: record.to_string(),
            reason,
        }
    }

    fn crypto_error(&self, e: CryptoError, record: &RecordHash) -> SpaceError {
        match e {
            CryptoError::AccessDenied(_) => self.denied(record),
            other => other.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::listener::NoopMiningListener;
    use crate::network::MemoryNetwork;

    fn node(alias: &str, network: Option<Arc<dyn Network>>) -> Node {
        Node::new(alias, KeyPair::generate(), Arc::new(MemoryCache::new()), network)
    }

    fn registered(alias: &str, network: &Arc<dyn Network>) -> Node {
        let node = node(alias, Some(Arc::clone(network)));
        AliasRegistry::for_node(&node)
            .register(&node, &NoopMiningListener)
            .unwrap();
        node
    }

    #[test]
    fn write_mine_decrypt() {
        let alice = node("alice", None);
        let mut channel = alice.open_channel("Space-Meta-alice").unwrap();
        let reference = alice
            .write(1, &channel, Some(&alice.owner_acl()), vec![], b"secret")
            .unwrap();
        let (block_hash, block) = alice.mine(&mut channel, &NoopMiningListener).unwrap();

        assert_eq!(block.entries.len(), 1);
        assert_eq!(block.length, 1);
        assert_ne!(block.entries[0].record.payload, b"secret");

        let entry = alice
            .fetch_reference(&Reference {
                block_hash: Some(block_hash),
                ..reference.clone()
            })
            .unwrap();
        assert_eq!(alice.decrypt_entry(&entry).unwrap(), b"secret");
        assert_eq!(alice.fetch_reference(&reference).unwrap(), entry);
    }

    #[test]
    fn mine_without_pending_fails() {
        let alice = node("alice", None);
        let mut channel = alice.open_channel("Space-Meta-alice").unwrap();
        assert!(alice.mine(&mut channel, &NoopMiningListener).is_err());
    }

    #[test]
    fn writer_must_be_in_acl() {
        let alice = node("alice", None);
        let bob = KeyPair::generate();
        let channel = Channel::open("Space-Meta-alice");
        let acl = Acl::new("bob", bob.public_key());
        let err = alice.write(1, &channel, Some(&acl), vec![], b"x").unwrap_err();
        assert!(matches!(err, SpaceError::InvalidAcl(_)));
    }

    #[test]
    fn public_records_readable_by_anyone() {
        let net: Arc<dyn Network> = Arc::new(MemoryNetwork::new());
        let alice = registered("alice", &net);
        let carol = node("carol", Some(net));

        let mut channel = alice.open_channel("Space-Public-alice").unwrap();
        let reference = alice.write(1, &channel, None, vec![], b"hello").unwrap();
        alice.mine(&mut channel, &NoopMiningListener).unwrap();
        alice.push(&channel);

        let entry = carol.fetch_reference(&reference).unwrap();
        assert_eq!(carol.decrypt_entry(&entry).unwrap(), b"hello");
    }

    #[test]
    fn non_member_gets_access_denied() {
        let net: Arc<dyn Network> = Arc::new(MemoryNetwork::new());
        let alice = node("alice", Some(Arc::clone(&net)));
        let carol = node("carol", Some(net));

        let mut channel = alice.open_channel("Space-Meta-alice").unwrap();
        let reference = alice
            .write(1, &channel, Some(&alice.owner_acl()), vec![], b"secret")
            .unwrap();
        alice.mine(&mut channel, &NoopMiningListener).unwrap();
        alice.push(&channel);

        let entry = carol.fetch_reference(&reference).unwrap();
        let err = carol.decrypt_entry(&entry).unwrap_err();
        assert!(err.is_access_denied(), "got {err:?}");
        assert!(carol.content_key(&entry).unwrap_err().is_access_denied());
    }

    #[test]
    fn forged_grant_is_access_denied() {
        let alice = node("alice", None);
        let mut channel = alice.open_channel("Space-Meta-alice").unwrap();
        alice
            .write(1, &channel, Some(&alice.owner_acl()), vec![], b"secret")
            .unwrap();
        let (_, block) = alice.mine(&mut channel, &NoopMiningListener).unwrap();

        // Relabel alice's grant with carol's alias.
        let carol = Node::new("carol", KeyPair::generate(), alice.cache_handle(), None);
        let mut entry = block.entries[0].clone();
        entry.record.access[0].alias = "carol".into();
        assert!(carol.decrypt_entry(&entry).unwrap_err().is_access_denied());
    }

    #[test]
    fn forged_creator_is_rejected() {
        let net: Arc<dyn Network> = Arc::new(MemoryNetwork::new());
        let alice = registered("alice", &net);
        // Another key pair claiming alice's alias.
        let mallory = node("alice", Some(Arc::clone(&net)));

        let mut channel = mallory.open_channel("Space-Delta-x").unwrap();
        let reference = mallory
            .write(1, &channel, Some(&Acl::new("alice", alice.public_key())), vec![], b"pwned")
            .unwrap();
        mallory.mine(&mut channel, &NoopMiningListener).unwrap();
        mallory.push(&channel);

        let entry = alice.fetch_reference(&reference).unwrap();
        assert_eq!(entry.record.creator, "alice");
        assert!(alice.decrypt_entry(&entry).unwrap_err().is_invalid_signature());
        assert!(alice.content_key(&entry).unwrap_err().is_invalid_signature());
        assert!(alice.verify_entry(&entry).is_err());
    }

    #[test]
    fn unbound_creator_is_rejected() {
        let net: Arc<dyn Network> = Arc::new(MemoryNetwork::new());
        let alice = node("alice", Some(Arc::clone(&net)));
        let carol = node("carol", Some(net));

        let mut channel = alice.open_channel("Space-Public-alice").unwrap();
        let reference = alice.write(1, &channel, None, vec![], b"hello").unwrap();
        alice.mine(&mut channel, &NoopMiningListener).unwrap();
        alice.push(&channel);

        let entry = carol.fetch_reference(&reference).unwrap();
        assert!(carol.decrypt_entry(&entry).unwrap_err().is_invalid_signature());
        assert_eq!(alice.decrypt_entry(&entry).unwrap(), b"hello");
    }

    #[test]
    fn entries_sorted_by_timestamp_within_block() {
        let alice = node("alice", None);
        let mut channel = alice.open_channel("Space-Delta-x").unwrap();
        alice.write(5, &channel, None, vec![], b"b").unwrap();
        alice.write(3, &channel, None, vec![], b"a").unwrap();
        let (_, block) = alice.mine(&mut channel, &NoopMiningListener).unwrap();
        let ts: Vec<u64> = block.entries.iter().map(|e| e.record.timestamp).collect();
        assert_eq!(ts, vec![3, 5]);
    }
}
