//! Sharing: hand another alias the content keys of a file.
//!
//! Only keys move. The Share record carries the raw Meta, chunk, and delta
//! keys, sealed for exactly the recipient and the owner; no file bytes are
//! decrypted or re-encrypted.

use space_chain::MiningListener;
use space_core::channels::{meta_channel, share_channel};
use space_core::{BatchOutcome, RecordHash, Reference, Share, SpaceResult};

use crate::records::encode;
use crate::SpaceClient;

impl SpaceClient {
    /// Share one of the caller's own files with each of `recipients`.
    ///
    /// Errors locating the file or its keys abort the call. After that every
    /// recipient is attempted; per-recipient failures (an unknown alias, a
    /// failed write) are collected in the returned outcome.
    pub fn share<S: AsRef<str>>(
        &self,
        meta_id: &RecordHash,
        recipients: &[S],
        listener: &dyn MiningListener,
    ) -> SpaceResult<BatchOutcome<Reference>> {
        let share = self.build_share(meta_id)?;
        let payload = encode(&share)?;

        let mut outcome = BatchOutcome::new();
        for recipient in recipients {
            let recipient = recipient.as_ref();
            let result = self.send_share(recipient, &share, &payload, listener);
            match &result {
                Ok(reference) => tracing::info!(
                    meta_id = %meta_id,
                    recipient,
                    record = %reference.record_hash,
                    "file shared"
                ),
                Err(e) => tracing::warn!(meta_id = %meta_id, recipient, "share failed: {e}"),
            }
            outcome.record(recipient, result);
        }
        Ok(outcome)
    }

    fn build_share(&self, meta_id: &RecordHash) -> SpaceResult<Share> {
        let node = self.node();
        let (entry, _meta) = self.meta_for_hash(meta_id)?;
        let meta_key = node.content_key(&entry)?;

        let chunk_keys = entry
            .record
            .references
            .iter()
            .map(|reference| {
                let chunk = node.fetch_reference(reference)?;
                Ok(node.content_key(&chunk)?.to_vec())
            })
            .collect::<SpaceResult<Vec<_>>>()?;

        let delta_keys = self
            .delta_entries(&entry)?
            .iter()
            .map(|delta| Ok(node.content_key(delta)?.to_vec()))
            .collect::<SpaceResult<Vec<_>>>()?;

        Ok(Share {
            meta_reference: Reference {
                timestamp: entry.record.timestamp,
                channel_name: meta_channel(node.alias()),
                record_hash: entry.record_hash,
                block_hash: None,
            },
            meta_key: meta_key.to_vec(),
            chunk_keys,
            delta_keys,
        })
    }

    fn send_share(
        &self,
        recipient: &str,
        share: &Share,
        payload: &[u8],
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let node = self.node();
        let public_key = self.resolver().resolve(recipient)?;
        let acl = node.owner_acl().with_member(recipient, public_key);

        let mut channel = node.open_channel(share_channel(recipient))?;
        let mut reference = node.write(
            self.now(),
            &channel,
            Some(&acl),
            vec![share.meta_reference.clone()],
            payload,
        )?;
        match self.publish(&mut channel, listener) {
            Ok((block_hash, _)) => {
                reference.block_hash = Some(block_hash);
                Ok(reference)
            }
            Err(e) => {
                self.discard_pending(&channel, &[reference.record_hash]);
                Err(e)
            }
        }
    }
}
