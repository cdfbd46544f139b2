//! Snapshot Codec
//!
//! On-disk layout of one shard's snapshot file:
//!
//! ```text
//! <json_body>\n<hex_md5>
//! ```
//!
//! The body is the shard's entry map as a single JSON object; the
//! trailer is the lowercase-hex MD5 of the body bytes, with no newline
//! after it. JSON string values may contain escaped content but the body
//! itself may legitimately contain newline bytes, so the decoder splits
//! on the LAST newline in the file and treats everything before it as
//! the body.
//!
//! MD5 here is a corruption detector, not a security primitive. The
//! format trades speed for being human-inspectable: `head -c 200
//! shard-0` shows real JSON, and the trailer is easy to recompute with
//! `md5sum` when debugging a refused load.

use std::collections::HashMap;

use thiserror::Error;

use crate::storage::engine::Entry;

/// Why a snapshot file could not be decoded. The reason string ends up
/// inside [`StoreError::UnloadableShard`](crate::storage::StoreError).
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The file has no newline, so there is no digest trailer to check.
    #[error("missing integrity digest")]
    MissingDigest,

    /// The recomputed MD5 of the body does not match the trailer.
    #[error("integrity hash mismatch")]
    DigestMismatch,

    /// The body is not a valid entry map.
    #[error("malformed shard body: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Serializes an entry map into the snapshot file layout.
pub(crate) fn encode(entries: &HashMap<String, Entry>) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = serde_json::to_vec(entries)?;
    let digest = md5::compute(&out);
    out.push(b'\n');
    out.extend_from_slice(format!("{digest:x}").as_bytes());
    Ok(out)
}

/// Verifies and deserializes a snapshot file read back from disk.
pub(crate) fn decode(raw: &[u8]) -> Result<HashMap<String, Entry>, SnapshotError> {
    let split = raw
        .iter()
        .rposition(|&b| b == b'\n')
        .ok_or(SnapshotError::MissingDigest)?;
    let (body, trailer) = (&raw[..split], &raw[split + 1..]);

    let computed = format!("{:x}", md5::compute(body));
    if computed.as_bytes() != trailer {
        return Err(SnapshotError::DigestMismatch);
    }

    Ok(serde_json::from_slice(body)?)
}
