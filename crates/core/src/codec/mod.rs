//! Durable Record Codec
//!
//! Turns a [`Store`] into carrier-sized text chunks and back.
//!
//! - `record`: versioned JSON schema of one logical payload
//! - `chunk`: exact, char-boundary splitting of the payload
//! - `carrier`: per-message framing (marker, generation, part index)

pub mod carrier;
pub mod chunk;
pub mod record;

pub use carrier::{assemble, CarrierFrame, CARRIER_HEADER_RESERVE, CARRIER_MARKER};
pub use record::RECORD_VERSION;

use crate::domain::Store;
use crate::error::{AppError, Result};

/// Encode a store into chunks of at most `max_chunk_chars` characters
pub fn encode(store: &Store, max_chunk_chars: usize) -> Result<Vec<String>> {
    if max_chunk_chars == 0 {
        return Err(AppError::Config(
            "max chunk size must be at least one character".to_string(),
        ));
    }
    let payload = record::encode_payload(store)?;
    Ok(chunk::split(&payload, max_chunk_chars))
}

/// Decode chunks (in order) back into a store
pub fn decode<S: AsRef<str>>(chunks: &[S]) -> Result<Store> {
    if chunks.is_empty() {
        return Err(AppError::CorruptRecord("empty record: no chunks".to_string()));
    }
    record::decode_payload(&chunk::join(chunks))
}
