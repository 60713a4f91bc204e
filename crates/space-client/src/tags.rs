//! Tags: free-text labels on a Meta, one record each on `Space-Tag-<metaId>`.
//!
//! A tag is readable only by the alias that wrote it, whether the Meta is
//! its own or shared with it.

use space_chain::{BlockEntry, Channel, MiningListener};
use space_core::channels::{meta_channel, tag_channel};
use space_core::{BatchOutcome, RecordHash, Reference, SpaceError, SpaceResult, Tag};

use crate::files::FileSource;
use crate::records::{encode, Decrypted};
use crate::SpaceClient;

impl SpaceClient {
    /// Attach each of `tags` to `meta_id`, an own or shared file.
    ///
    /// Every tag is written and mined on its own; failures are collected
    /// per tag in the returned outcome.
    pub fn add_tag<S: AsRef<str>>(
        &self,
        meta_id: &RecordHash,
        tags: &[S],
        listener: &dyn MiningListener,
    ) -> SpaceResult<BatchOutcome<Reference>> {
        let meta_reference = match self.locate(meta_id)? {
            FileSource::Own { entry, .. } => Reference {
                timestamp: entry.record.timestamp,
                channel_name: meta_channel(self.alias()),
                record_hash: entry.record_hash,
                block_hash: None,
            },
            FileSource::Shared(shared) => shared.share.meta_reference,
        };

        let mut channel = self.node().open_channel(tag_channel(meta_id))?;
        let mut outcome = BatchOutcome::new();
        for value in tags {
            let value = value.as_ref();
            let result = self.write_tag(&mut channel, &meta_reference, value, listener);
            if let Err(e) = &result {
                tracing::warn!(meta_id = %meta_id, tag = value, "tag failed: {e}");
            }
            outcome.record(value, result);
        }
        tracing::info!(
            meta_id = %meta_id,
            added = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "tags written"
        );
        Ok(outcome)
    }

    fn write_tag(
        &self,
        channel: &mut Channel,
        meta_reference: &Reference,
        value: &str,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SpaceError::Other(anyhow::anyhow!("empty tag")));
        }
        let node = self.node();
        let payload = encode(&Tag {
            value: value.to_string(),
        })?;
        let mut reference = node.write(
            self.now(),
            channel,
            Some(&node.owner_acl()),
            vec![meta_reference.clone()],
            &payload,
        )?;
        match self.publish(channel, listener) {
            Ok((block_hash, _)) => {
                reference.block_hash = Some(block_hash);
                Ok(reference)
            }
            Err(e) => {
                self.discard_pending(channel, &[reference.record_hash]);
                Err(e)
            }
        }
    }

    /// Tags the caller can read on `meta_id`, oldest first.
    pub fn tags_for_hash(&self, meta_id: &RecordHash) -> SpaceResult<Vec<(BlockEntry, Tag)>> {
        let channel = self.node().open_channel(tag_channel(meta_id))?;
        let mut tags = Decrypted::<Tag>::new(self.node(), &channel)
            .filter(|item| match item {
                Ok((entry, _)) => entry.record.references_hash(meta_id),
                Err(_) => true,
            })
            .collect::<SpaceResult<Vec<_>>>()?;
        tags.reverse();
        Ok(tags)
    }
}
