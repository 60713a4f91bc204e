//! Meta/File protocol: storing, listing, and reading files.
//!
//! A file is a Meta record on its owner's meta channel. Its content is the
//! concatenation of the chunk records the Meta references, followed by the
//! replay of every Delta on `Space-Delta-<metaId>` in append order. Either
//! part may be empty.

use std::io::{Read, Write};

use space_chain::{BlockEntry, Channel, MiningListener};
use space_chunks::{chunk_reader, reconstruct_from};
use space_core::channels::{delta_channel, file_channel, meta_channel, share_channel};
use space_core::config::FileMode;
use space_core::{Delta, Meta, RecordHash, Reference, Share, SpaceError, SpaceResult};
use space_crypto::{decrypt_with_key, ContentKey};

use crate::records::{decode, encode, Decrypted};
use crate::SpaceClient;

/// Upper bound on the buffer preallocated from a Meta's recorded size.
const MAX_SIZE_HINT: u64 = 64 * 1024 * 1024;

/// A Meta that another alias shared with this client.
#[derive(Debug, Clone)]
pub struct SharedMeta {
    pub owner: String,
    pub share: Share,
    pub entry: BlockEntry,
    pub meta: Meta,
}

/// Where a readable file comes from, and which keys open its records.
#[derive(Debug, Clone)]
pub enum FileSource {
    Own { entry: BlockEntry, meta: Meta },
    Shared(SharedMeta),
}

impl FileSource {
    pub fn entry(&self) -> &BlockEntry {
        match self {
            FileSource::Own { entry, .. } => entry,
            FileSource::Shared(shared) => &shared.entry,
        }
    }

    pub fn meta(&self) -> &Meta {
        match self {
            FileSource::Own { meta, .. } => meta,
            FileSource::Shared(shared) => &shared.meta,
        }
    }

    pub fn meta_id(&self) -> RecordHash {
        self.entry().record_hash
    }
}

impl SpaceClient {
    /// Store a new file using the configured [`FileMode`].
    pub fn add<R: Read>(
        &self,
        name: &str,
        mime: &str,
        reader: R,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        match self.mode {
            FileMode::Chunked => self.add_chunked(name, mime, reader, listener),
            FileMode::Delta => self.add_delta(name, mime, reader, listener),
        }
    }

    /// Split `reader` into encrypted chunk records and write a Meta
    /// referencing them in order.
    pub fn add_chunked<R: Read>(
        &self,
        name: &str,
        mime: &str,
        reader: R,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let node = &self.node;
        let acl = node.owner_acl();
        let mut files = node.open_channel(file_channel(node.alias()))?;

        let mut references = Vec::new();
        let mut size = 0u64;
        let written = chunk_reader(reader, self.sizes).try_for_each(|chunk| {
            let chunk = chunk?;
            size += chunk.len() as u64;
            references.push(node.write(self.now(), &files, Some(&acl), Vec::new(), &chunk.data)?);
            Ok::<_, SpaceError>(())
        });
        let hashes: Vec<RecordHash> = references.iter().map(|r| r.record_hash).collect();
        if let Err(e) = written {
            self.discard_pending(&files, &hashes);
            return Err(e);
        }

        if !references.is_empty() {
            let block_hash = match self.publish(&mut files, listener) {
                Ok((block_hash, _)) => block_hash,
                Err(e) => {
                    self.discard_pending(&files, &hashes);
                    return Err(e);
                }
            };
            for reference in &mut references {
                reference.block_hash = Some(block_hash);
            }
        }
        tracing::debug!(name, chunks = references.len(), size, "chunks stored");

        self.write_meta(
            Meta {
                name: name.to_string(),
                mime: mime.to_string(),
                size,
            },
            references,
            listener,
        )
    }

    /// Store the content as insert-only deltas under a Meta of size zero.
    ///
    /// The Meta and the deltas are written as pending records first. The
    /// deltas are mined before the Meta, so a failed read or write leaves
    /// no Meta behind and nothing pending.
    pub fn add_delta<R: Read>(
        &self,
        name: &str,
        mime: &str,
        reader: R,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let meta = Meta {
            name: name.to_string(),
            mime: mime.to_string(),
            size: 0,
        };
        let mut metas = self.node.open_channel(meta_channel(self.alias()))?;
        let meta_ref = self.stage_meta(&metas, &meta, Vec::new())?;
        let meta_id = meta_ref.record_hash;

        let stored = self
            .node
            .open_channel(delta_channel(&meta_id))
            .and_then(|mut deltas_channel| {
                let deltas = chunk_reader(reader, self.sizes)
                    .map(|chunk| chunk.map(|c| Delta::insert(c.offset, c.data)));
                let references = self.stage_deltas(&deltas_channel, deltas)?;
                self.commit_deltas(&meta_id, &mut deltas_channel, references, listener)
            });
        let references = match stored {
            Ok(references) => references,
            Err(e) => {
                self.discard_pending(&metas, &[meta_id]);
                return Err(e);
            }
        };
        tracing::debug!(name, deltas = references.len(), "content stored as deltas");

        self.commit_meta(&mut metas, &meta, meta_ref, listener)
    }

    fn write_meta(
        &self,
        meta: Meta,
        references: Vec<Reference>,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        let mut metas = self.node.open_channel(meta_channel(self.alias()))?;
        let reference = self.stage_meta(&metas, &meta, references)?;
        self.commit_meta(&mut metas, &meta, reference, listener)
    }

    fn stage_meta(
        &self,
        metas: &Channel,
        meta: &Meta,
        references: Vec<Reference>,
    ) -> SpaceResult<Reference> {
        let node = &self.node;
        let payload = encode(meta)?;
        node.write(
            self.now(),
            metas,
            Some(&node.owner_acl()),
            references,
            &payload,
        )
    }

    /// Mine a staged Meta. On failure it is discarded.
    fn commit_meta(
        &self,
        metas: &mut Channel,
        meta: &Meta,
        mut reference: Reference,
        listener: &dyn MiningListener,
    ) -> SpaceResult<Reference> {
        match self.publish(metas, listener) {
            Ok((block_hash, _)) => reference.block_hash = Some(block_hash),
            Err(e) => {
                self.discard_pending(metas, &[reference.record_hash]);
                return Err(e);
            }
        }

        tracing::info!(
            name = %meta.name,
            mime = %meta.mime,
            size = meta.size,
            meta_id = %reference.record_hash,
            "file added"
        );
        Ok(reference)
    }

    /// The caller's own Metas, newest first.
    pub fn metas(&self) -> SpaceResult<Decrypted<'_, Meta>> {
        let channel = self.node.open_channel(meta_channel(self.alias()))?;
        Ok(Decrypted::new(&self.node, &channel))
    }

    /// One of the caller's own Metas.
    pub fn meta_for_hash(&self, meta_id: &RecordHash) -> SpaceResult<(BlockEntry, Meta)> {
        let channel = self.node.open_channel(meta_channel(self.alias()))?;
        let entry = channel.find_entry(self.node.cache(), self.node.network(), meta_id)?;
        let meta = decode(&self.node.decrypt_entry(&entry)?)?;
        Ok((entry, meta))
    }

    /// Shares addressed to the caller, newest first.
    pub fn shares(&self) -> SpaceResult<Decrypted<'_, Share>> {
        let channel = self.node.open_channel(share_channel(self.alias()))?;
        Ok(Decrypted::new(&self.node, &channel))
    }

    /// Every Meta shared with the caller, newest share first. A Meta shared
    /// more than once is listed once, from its newest share.
    pub fn shared_metas(&self) -> SpaceResult<Vec<SharedMeta>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for item in self.shares()? {
            let (share_entry, share) = item?;
            if !seen.insert(share.meta_reference.record_hash) {
                continue;
            }
            out.push(self.open_share(share_entry, share)?);
        }
        Ok(out)
    }

    /// The newest share of `meta_id` addressed to the caller, if any.
    pub fn shared_meta_for_hash(&self, meta_id: &RecordHash) -> SpaceResult<Option<SharedMeta>> {
        for item in self.shares()? {
            let (share_entry, share) = item?;
            if &share.meta_reference.record_hash == meta_id {
                return self.open_share(share_entry, share).map(Some);
            }
        }
        Ok(None)
    }

    fn open_share(&self, share_entry: BlockEntry, share: Share) -> SpaceResult<SharedMeta> {
        let entry = self.node.fetch_reference(&share.meta_reference)?;
        if entry.record.creator != share_entry.record.creator {
            return Err(SpaceError::InvalidSignature {
                record: entry.record_hash.to_string(),
                reason: format!(
                    "shared by {} but created by {}",
                    share_entry.record.creator, entry.record.creator
                ),
            });
        }
        self.node.verify_entry(&entry)?;
        let key = ContentKey::from_slice(&share.meta_key)?;
        let plain = decrypt_with_key(&entry.record.payload, &key, &entry.record.aad())?;
        Ok(SharedMeta {
            owner: share_entry.record.creator,
            share,
            entry,
            meta: decode(&plain)?,
        })
    }

    /// Find `meta_id` among the caller's own files, then among files shared
    /// with the caller.
    pub fn locate(&self, meta_id: &RecordHash) -> SpaceResult<FileSource> {
        match self.meta_for_hash(meta_id) {
            Ok((entry, meta)) => return Ok(FileSource::Own { entry, meta }),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        self.shared_meta_for_hash(meta_id)?
            .map(FileSource::Shared)
            .ok_or_else(|| SpaceError::NotFound(format!("file {meta_id}")))
    }

    /// Delta entries signed by the file's owner, in append order.
    pub(crate) fn delta_entries(&self, meta_entry: &BlockEntry) -> SpaceResult<Vec<BlockEntry>> {
        let channel = self
            .node
            .open_channel(delta_channel(&meta_entry.record_hash))?;
        let owner = &meta_entry.record.creator;
        let mut deltas = Vec::new();
        for entry in channel.entries_in_order(self.node.cache(), self.node.network())? {
            if &entry.record.creator != owner {
                continue;
            }
            match self.node.verify_entry(&entry) {
                Ok(()) => deltas.push(entry),
                Err(e) if e.is_invalid_signature() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(deltas)
    }

    fn chunk_plaintext(
        &self,
        source: &FileSource,
        index: usize,
        reference: &Reference,
    ) -> SpaceResult<Vec<u8>> {
        let entry = self.node.fetch_reference(reference)?;
        match source {
            FileSource::Own { .. } => self.node.decrypt_entry(&entry),
            FileSource::Shared(shared) => {
                let key = shared
                    .share
                    .chunk_keys
                    .get(index)
                    .ok_or_else(|| self.denied(&entry.record_hash))?;
                let key = ContentKey::from_slice(key)?;
                Ok(decrypt_with_key(&entry.record.payload, &key, &entry.record.aad())?)
            }
        }
    }

    fn deltas(&self, source: &FileSource) -> SpaceResult<Vec<Delta>> {
        self.delta_entries(source.entry())?
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let plain = match source {
                    FileSource::Own { .. } => self.node.decrypt_entry(entry)?,
                    FileSource::Shared(shared) => {
                        let key = shared
                            .share
                            .delta_keys
                            .get(i)
                            .ok_or_else(|| self.denied(&entry.record_hash))?;
                        let key = ContentKey::from_slice(key)?;
                        decrypt_with_key(&entry.record.payload, &key, &entry.record.aad())?
                    }
                };
                decode(&plain)
            })
            .collect()
    }

    fn denied(&self, record: &RecordHash) -> SpaceError {
        SpaceError::AccessDenied {
            alias: self.alias().to_string(),
            record: record.to_string(),
        }
    }

    /// Write the current content of `meta_id` to `writer`, returning the
    /// byte count. Nothing is written unless the whole file could be read.
    pub fn read_file<W: Write>(&self, meta_id: &RecordHash, mut writer: W) -> SpaceResult<u64> {
        let source = self.locate(meta_id)?;
        let deltas = self.deltas(&source)?;

        // Every chunk is fetched before the first byte goes out.
        let content = reconstruct_from(self.base_content(&source)?, &deltas)?;
        writer.write_all(&content)?;
        writer.flush()?;
        let written = content.len() as u64;

        tracing::debug!(meta_id = %meta_id, bytes = written, "file read");
        Ok(written)
    }

    pub fn read_file_to_vec(&self, meta_id: &RecordHash) -> SpaceResult<Vec<u8>> {
        let mut out = Vec::new();
        self.read_file(meta_id, &mut out)?;
        Ok(out)
    }

    /// Concatenated chunk content, before any delta.
    fn base_content(&self, source: &FileSource) -> SpaceResult<Vec<u8>> {
        // A shared Meta's size is only a hint from another alias.
        let hint = source.meta().size.min(MAX_SIZE_HINT) as usize;
        let mut base = Vec::with_capacity(hint);
        for (i, reference) in source.entry().record.references.iter().enumerate() {
            base.extend_from_slice(&self.chunk_plaintext(source, i, reference)?);
        }
        Ok(base)
    }

    /// Current content of one of the caller's own files.
    pub(crate) fn own_content(&self, entry: BlockEntry, meta: Meta) -> SpaceResult<Vec<u8>> {
        let source = FileSource::Own { entry, meta };
        let deltas = self.deltas(&source)?;
        reconstruct_from(self.base_content(&source)?, &deltas)
    }
}
