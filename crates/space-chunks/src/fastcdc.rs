//! FastCDC content-defined chunking
//!
//! Files are split into variable-size chunks before encryption, so an edit
//! near the start of a file leaves later chunk boundaries where they were.
//! `max_size` is a hard ceiling: no chunk record ever carries more plaintext.

use space_core::config::ChunkConfig;
use space_core::{SpaceError, SpaceResult};
use std::io::{self, Read};

/// One chunk of plaintext, owned so it can be sealed and written directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Byte offset within the source
    pub offset: u64,
    pub data: Vec<u8>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Validated FastCDC bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSizes {
    min_size: u32,
    avg_size: u32,
    max_size: u32,
}

impl ChunkSizes {
    /// Small bounds, handy for tests and small files.
    pub const SMALL: ChunkSizes = ChunkSizes {
        min_size: 2 * 1024,  // 2KB
        avg_size: 4 * 1024,  // 4KB
        max_size: 16 * 1024, // 16KB
    };

    pub fn new(min_size: u32, avg_size: u32, max_size: u32) -> SpaceResult<Self> {
        let config = ChunkConfig {
            min_size,
            avg_size,
            max_size,
        };
        config.validate()?;
        Ok(Self {
            min_size,
            avg_size,
            max_size,
        })
    }

    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    pub fn avg_size(&self) -> u32 {
        self.avg_size
    }

    pub fn max_size(&self) -> u32 {
        self.max_size
    }
}

impl Default for ChunkSizes {
    fn default() -> Self {
        let config = ChunkConfig::default();
        Self {
            min_size: config.min_size,
            avg_size: config.avg_size,
            max_size: config.max_size,
        }
    }
}

impl TryFrom<&ChunkConfig> for ChunkSizes {
    type Error = SpaceError;

    fn try_from(config: &ChunkConfig) -> SpaceResult<Self> {
        Self::new(config.min_size, config.avg_size, config.max_size)
    }
}

/// Streaming chunker over any reader. Yields chunks in source order.
pub struct ChunkReader<R: Read> {
    inner: fastcdc::v2020::StreamCDC<R>,
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = SpaceResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|res| {
            res.map(|c| Chunk {
                offset: c.offset,
                data: c.data,
            })
            .map_err(|e| SpaceError::Io(io::Error::other(format!("chunking: {e}"))))
        })
    }
}

/// Chunk `reader` lazily. An empty reader yields no chunks.
pub fn chunk_reader<R: Read>(reader: R, sizes: ChunkSizes) -> ChunkReader<R> {
    ChunkReader {
        inner: fastcdc::v2020::StreamCDC::new(
            reader,
            sizes.min_size,
            sizes.avg_size,
            sizes.max_size,
        ),
    }
}

/// Chunk an in-memory buffer.
pub fn chunk_data(data: &[u8], sizes: ChunkSizes) -> Vec<Chunk> {
    if data.is_empty() {
        return vec![];
    }

    fastcdc::v2020::FastCDC::new(data, sizes.min_size, sizes.avg_size, sizes.max_size)
        .map(|c| Chunk {
            offset: c.offset as u64,
            data: data[c.offset..c.offset + c.length].to_vec(),
        })
        .collect()
}
