//! Appending edits to an existing file. The Meta itself is never rewritten.

use std::io::Read;

use space_chain::{Channel, MiningListener};
use space_chunks::{diff, reconstruct_from};
use space_core::channels::delta_channel;
use space_core::{Delta, RecordHash, Reference, SpaceError, SpaceResult};

use crate::records::encode;
use crate::SpaceClient;

impl SpaceClient {
    /// Append `deltas` to one of the caller's own files.
    ///
    /// The deltas are checked against the current content first, so a
    /// delta that would not apply is refused before anything is written.
    pub fn append(
        &self,
        meta_id: &RecordHash,
        deltas: &[Delta],
        listener: &dyn MiningListener,
    ) -> SpaceResult<Vec<Reference>> {
        if deltas.is_empty() {
            return Ok(Vec::new());
        }
        let (entry, meta) = self.meta_for_hash(meta_id)?;
        let current = self.own_content(entry, meta)?;
        reconstruct_from(current, deltas)?;

        self.write_deltas(meta_id, deltas.iter().cloned().map(Ok), listener)
    }

    /// Append a single delta.
    pub fn amend(
        &self,
        meta_id: &RecordHash,
        delta: Delta,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let mut references = self.append(meta_id, std::slice::from_ref(&delta), listener)?;
        Ok(references.remove(0))
    }

    /// Replace a file's content with everything `reader` yields, stored as
    /// the one delta that turns the old content into the new. Returns
    /// `None` when nothing changed.
    pub fn write_file<R: Read>(
        &self,
        meta_id: &RecordHash,
        mut reader: R,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Option<Reference>> {
        let (entry, meta) = self.meta_for_hash(meta_id)?;
        let current = self.own_content(entry, meta)?;

        let mut replacement = Vec::new();
        reader.read_to_end(&mut replacement)?;

        match diff(&current, &replacement) {
            Some(delta) => {
                let mut references =
                    self.write_deltas(meta_id, std::iter::once(Ok(delta)), listener)?;
                Ok(references.pop())
            }
            None => {
                tracing::debug!(meta_id = %meta_id, "content unchanged");
                Ok(None)
            }
        }
    }

    /// Write each delta as its own record, then mine them in one block.
    pub(crate) fn write_deltas<I>(
        &self,
        meta_id: &RecordHash,
        deltas: I,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Vec<Reference>>
    where
        I: IntoIterator<Item = SpaceResult<Delta>>,
    {
        let mut channel = self.node().open_channel(delta_channel(meta_id))?;
        let references = self.stage_deltas(&channel, deltas)?;
        self.commit_deltas(meta_id, &mut channel, references, listener)
    }

    /// Write each delta as a pending record on `channel`. Timestamps
    /// strictly increase so replay order is unambiguous. On error nothing
    /// written here stays pending.
    pub(crate) fn stage_deltas<I>(&self, channel: &Channel, deltas: I) -> SpaceResult<Vec<Reference>>
    where
        I: IntoIterator<Item = SpaceResult<Delta>>,
    {
        let node = self.node();
        let acl = node.owner_acl();

        let mut references: Vec<Reference> = Vec::new();
        let written = deltas.into_iter().try_for_each(|delta| {
            let payload = encode(&delta?)?;
            references.push(node.write(self.now(), channel, Some(&acl), Vec::new(), &payload)?);
            Ok::<_, SpaceError>(())
        });
        if let Err(e) = written {
            self.discard_pending(channel, &record_hashes(&references));
            return Err(e);
        }
        Ok(references)
    }

    /// Mine staged deltas in one block. On failure they are discarded.
    pub(crate) fn commit_deltas(
        &self,
        meta_id: &RecordHash,
        channel: &mut Channel,
        mut references: Vec<Reference>,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Vec<Reference>> {
        if references.is_empty() {
            return Ok(references);
        }
        let block_hash = match self.publish(channel, listener) {
            Ok((block_hash, _)) => block_hash,
            Err(e) => {
                self.discard_pending(channel, &record_hashes(&references));
                return Err(e);
            }
        };
        for reference in &mut references {
            reference.block_hash = Some(block_hash);
        }
        tracing::info!(meta_id = %meta_id, deltas = references.len(), "deltas appended");
        Ok(references)
    }
}

fn record_hashes(references: &[Reference]) -> Vec<RecordHash> {
    references.iter().map(|r| r.record_hash).collect()
}
