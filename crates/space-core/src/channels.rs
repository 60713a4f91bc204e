//! Deterministic channel names.
//!
//! Per-alias channels hold what an identity owns or receives; per-file
//! channels are keyed by the `metaId` of the file they annotate or edit.

use crate::types::RecordHash;

pub const ALIAS_CHANNEL: &str = "Alias";

pub const META_PREFIX: &str = "Space-Meta-";
pub const FILE_PREFIX: &str = "Space-File-";
pub const SHARE_PREFIX: &str = "Space-Share-";
pub const TAG_PREFIX: &str = "Space-Tag-";
pub const DELTA_PREFIX: &str = "Space-Delta-";

/// Metas created by `alias`.
pub fn meta_channel(alias: &str) -> String {
    format!("{META_PREFIX}{alias}")
}

/// Encrypted chunk records created by `alias`.
pub fn file_channel(alias: &str) -> String {
    format!("{FILE_PREFIX}{alias}")
}

/// Shares addressed to `alias`.
pub fn share_channel(alias: &str) -> String {
    format!("{SHARE_PREFIX}{alias}")
}

pub fn tag_channel(meta_id: &RecordHash) -> String {
    format!("{TAG_PREFIX}{meta_id}")
}

pub fn delta_channel(meta_id: &RecordHash) -> String {
    format!("{DELTA_PREFIX}{meta_id}")
}
