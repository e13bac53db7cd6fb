// Versioned record schema
//
// Wire form (version field first, keys sorted):
//   {"v":1,"queues":{"boss-a":[1,2]},"settings":{"lang":"en"}}

use crate::domain::store::validate_language;
use crate::domain::{DomainError, Queue, QueueKey, Store, StoreSettings, UserId, DEFAULT_LANGUAGE};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current schema version
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct RecordV1 {
    v: u32,
    queues: BTreeMap<String, Vec<UserId>>,
    #[serde(default)]
    settings: SettingsV1,
}

#[derive(Debug, Serialize, Deserialize)]
struct SettingsV1 {
    #[serde(default = "default_language")]
    lang: String,
}

impl Default for SettingsV1 {
    fn default() -> Self {
        Self {
            lang: default_language(),
        }
    }
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

/// Reads only the version marker
#[derive(Deserialize)]
struct VersionHeader {
    v: Option<u32>,
}

/// Serialize the full store into one logical payload
pub fn encode_payload(store: &Store) -> Result<String> {
    let record = RecordV1 {
        v: RECORD_VERSION,
        queues: store
            .iter()
            .map(|(key, queue)| (key.as_str().to_string(), queue.members().to_vec()))
            .collect(),
        settings: SettingsV1 {
            lang: store.settings.language.clone(),
        },
    };
    Ok(serde_json::to_string(&record)?)
}

/// Parse one logical payload
pub fn decode_payload(payload: &str) -> Result<Store> {
    let header: VersionHeader = serde_json::from_str(payload)
        .map_err(|e| AppError::CorruptRecord(format!("malformed payload: {}", e)))?;

    match header.v {
        Some(RECORD_VERSION) => {}
        Some(other) => return Err(AppError::UnsupportedVersion(other)),
        None => {
            return Err(AppError::CorruptRecord(
                "payload has no version marker".to_string(),
            ))
        }
    }

    let record: RecordV1 = serde_json::from_str(payload)
        .map_err(|e| AppError::CorruptRecord(format!("invalid v1 record: {}", e)))?;

    let mut store = Store::new();
    for (raw_key, members) in record.queues {
        let key = QueueKey::parse(raw_key).map_err(corrupt)?;
        let queue = Queue::from_members(key.as_str(), members).map_err(corrupt)?;
        store.put(key, queue);
    }
    validate_language(&record.settings.lang).map_err(corrupt)?;
    store.settings = StoreSettings {
        language: record.settings.lang,
    };

    Ok(store)
}

fn corrupt(err: DomainError) -> AppError {
    AppError::CorruptRecord(err.to_string())
}
