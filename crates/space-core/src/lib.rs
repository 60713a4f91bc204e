//! space-core: types shared by every layer of the space client
//!
//! - `types`: the protocol entities (Meta, Delta, Share, Tag, Alias) and
//!   the record addressing they are built on (RecordHash, Reference)
//! - `channels`: deterministic channel names for each entity kind
//! - `config`: `space.toml` schema
//! - `error`: the error taxonomy surfaced by client operations

pub mod channels;
pub mod config;
pub mod encoding;
pub mod error;
pub mod types;

pub use error::{BatchOutcome, SpaceError, SpaceResult};
pub use types::{
    timestamp_now, Alias, Delta, Meta, RecordHash, Reference, Share, Tag, Timestamp,
};
