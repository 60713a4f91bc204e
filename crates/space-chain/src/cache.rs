//! Local storage for blocks, channel heads, and not-yet-mined entries.
//!
//! Two backends are available:
//!   - **Memory**: `HashMap`s behind a mutex, for tests and one-shot tools.
//!   - **File**: one JSON document per block, head, and pending entry,
//!     written atomically via temp+rename.
//!
//! Both implement `Cache`, so a `Node` can use either transparently.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use space_core::{encoding, timestamp_now, RecordHash, SpaceResult};

use crate::block::{Block, BlockEntry, Head};

pub trait Cache: Send + Sync {
    fn head(&self, channel: &str) -> SpaceResult<Option<Head>>;
    fn put_head(&self, head: &Head) -> SpaceResult<()>;
    fn block(&self, hash: &RecordHash) -> SpaceResult<Option<Block>>;
    fn put_block(&self, hash: &RecordHash, block: &Block) -> SpaceResult<()>;
    /// Entries written to `channel` but not yet mined, in write order.
    fn pending(&self, channel: &str) -> SpaceResult<Vec<BlockEntry>>;
    fn put_pending(&self, channel: &str, entry: &BlockEntry) -> SpaceResult<()>;
    /// Drop the given entries from `channel`'s pending list.
    fn clear_pending(&self, channel: &str, mined: &[RecordHash]) -> SpaceResult<()>;
}

#[derive(Default)]
struct MemoryState {
    heads: HashMap<String, Head>,
    blocks: HashMap<RecordHash, Block>,
    pending: HashMap<String, Vec<BlockEntry>>,
}

/// Cache held entirely in memory.
#[derive(Default)]
pub struct MemoryCache {
    state: Mutex<MemoryState>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_count(&self) -> usize {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).blocks.len()
    }
}

impl Cache for MemoryCache {
    fn head(&self, channel: &str) -> SpaceResult<Option<Head>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.heads.get(channel).cloned())
    }

    fn put_head(&self, head: &Head) -> SpaceResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.heads.insert(head.channel_name.clone(), head.clone());
        Ok(())
    }

    fn block(&self, hash: &RecordHash) -> SpaceResult<Option<Block>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.blocks.get(hash).cloned())
    }

    fn put_block(&self, hash: &RecordHash, block: &Block) -> SpaceResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.blocks.insert(*hash, block.clone());
        Ok(())
    }

    fn pending(&self, channel: &str) -> SpaceResult<Vec<BlockEntry>> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.pending.get(channel).cloned().unwrap_or_default())
    }

    fn put_pending(&self, channel: &str, entry: &BlockEntry) -> SpaceResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state
            .pending
            .entry(channel.to_string())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    fn clear_pending(&self, channel: &str, mined: &[RecordHash]) -> SpaceResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = state.pending.get_mut(channel) {
            entries.retain(|e| !mined.contains(&e.record_hash));
        }
        Ok(())
    }
}

/// Cache persisted under a directory:
/// ```text
/// <root>/blocks/<block hash>.json
/// <root>/heads/<encoded channel name>.json
/// <root>/pending/<encoded channel name>/<sequence>-<record hash>.json
/// ```
/// Channel names are base64-encoded so any alias is a safe file name.
/// Each pending entry is its own file, so writing one never rewrites the
/// others; the zero-padded sequence keeps write order in name order.
pub struct FileCache {
    root: PathBuf,
    /// Last pending sequence number issued.
    sequence: AtomicU64,
}

impl FileCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn open(root: &Path) -> SpaceResult<Self> {
        for sub in ["blocks", "heads", "pending"] {
            std::fs::create_dir_all(root.join(sub))?;
        }
        tracing::debug!("file cache at {}", root.display());
        Ok(Self {
            root: root.to_path_buf(),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn head_path(&self, channel: &str) -> PathBuf {
        self.root
            .join("heads")
            .join(format!("{}.json", encoding::encode(channel.as_bytes())))
    }

    fn block_path(&self, hash: &RecordHash) -> PathBuf {
        self.root.join("blocks").join(format!("{hash}.json"))
    }

    fn pending_dir(&self, channel: &str) -> PathBuf {
        self.root
            .join("pending")
            .join(encoding::encode(channel.as_bytes()))
    }

    /// Strictly increasing, and ahead of anything written before a reopen.
    fn next_sequence(&self) -> u64 {
        let now = timestamp_now();
        let previous = self
            .sequence
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(previous + 1)
    }

    /// Pending entry files of `channel`, sorted by name.
    fn pending_files(&self, channel: &str) -> SpaceResult<Vec<(String, PathBuf)>> {
        let dir = self.pending_dir(channel);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for item in std::fs::read_dir(&dir)? {
            let path = item?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push((name.to_string(), path.clone()));
            }
        }
        files.sort();
        Ok(files)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> SpaceResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

/// Atomic write: temp file, then rename over the target.
fn write_json<T: Serialize>(path: &Path, value: &T) -> SpaceResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

impl Cache for FileCache {
    fn head(&self, channel: &str) -> SpaceResult<Option<Head>> {
        read_json(&self.head_path(channel))
    }

    fn put_head(&self, head: &Head) -> SpaceResult<()> {
        write_json(&self.head_path(&head.channel_name), head)
    }

    fn block(&self, hash: &RecordHash) -> SpaceResult<Option<Block>> {
        read_json(&self.block_path(hash))
    }

    fn put_block(&self, hash: &RecordHash, block: &Block) -> SpaceResult<()> {
        let path = self.block_path(hash);
        if path.exists() {
            return Ok(());
        }
        write_json(&path, block)
    }

    fn pending(&self, channel: &str) -> SpaceResult<Vec<BlockEntry>> {
        let mut entries = Vec::new();
        for (_, path) in self.pending_files(channel)? {
            if let Some(entry) = read_json(&path)? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    fn put_pending(&self, channel: &str, entry: &BlockEntry) -> SpaceResult<()> {
        let dir = self.pending_dir(channel);
        std::fs::create_dir_all(&dir)?;
        let name = format!("{:020}-{}.json", self.next_sequence(), entry.record_hash);
        write_json(&dir.join(name), entry)
    }

    fn clear_pending(&self, channel: &str, mined: &[RecordHash]) -> SpaceResult<()> {
        let suffixes: HashSet<String> = mined.iter().map(|h| format!("-{h}.json")).collect();
        for (name, path) in self.pending_files(channel)? {
            let Some(split) = name.find('-') else {
                continue;
            };
            if suffixes.contains(&name[split..]) {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}
