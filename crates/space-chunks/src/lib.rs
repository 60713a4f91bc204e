//! space-chunks: content hashing, chunking, and the delta engine
//!
//! # Overview
//! - `blake3`: record and block addressing (BLAKE3 → `RecordHash`)
//! - `fastcdc`: streaming content-defined chunking with a hard size ceiling
//! - `delta`: pure offset/delete/insert replay used to rebuild file content

pub mod blake3;
pub mod delta;
pub mod fastcdc;

pub use blake3::{hash_bytes, hash_to_record_hash, record_hash, Hash};
pub use delta::{apply_delta, diff, reconstruct, reconstruct_from};
pub use fastcdc::{chunk_data, chunk_reader, Chunk, ChunkReader, ChunkSizes};
