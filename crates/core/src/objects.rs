//! Content-addressed blob storage.
//!
//! Blobs are keyed by the hex SHA-256 digest of their bytes. A blob is stored
//! once per distinct content and is never mutated or removed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::ObjectError;

/// Length in hex characters of every object id.
pub const HASH_LEN: usize = 64;

/// Compute the hex digest of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Mapping from digest to file content.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlobStore {
    #[serde(with = "base64_map")]
    blobs: BTreeMap<String, Vec<u8>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` if absent and return their id. Idempotent.
    pub fn put(&mut self, bytes: &[u8]) -> String {
        let id = digest(bytes);
        if !self.blobs.contains_key(&id) {
            debug!(blob = %id, size = bytes.len(), "storing blob");
            self.blobs.insert(id.clone(), bytes.to_vec());
        }
        id
    }

    /// Fetch the bytes stored under `id`.
    pub fn get(&self, id: &str) -> Result<&[u8], ObjectError> {
        self.blobs
            .get(id)
            .map(Vec::as_slice)
            .ok_or_else(|| ObjectError::missing_blob(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.blobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Serializes blob bytes as base64 strings so the state record stays compact.
mod base64_map {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut out = serializer.serialize_map(Some(map.len()))?;
        for (id, bytes) in map {
            out.serialize_entry(id, &STANDARD.encode(bytes))?;
        }
        out.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = BTreeMap::<String, String>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(id, text)| {
                STANDARD
                    .decode(text)
                    .map(|bytes| (id, bytes))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}
