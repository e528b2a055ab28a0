#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use serde_json::json;
use shardstream::{
    DataType, RangedTransport, ShardLocation, TransportError,
};

/// Serialize a complete safetensors blob: length prefix, JSON header, packed
/// data. Offsets are assigned in the order the entries are given.
pub fn build_shard(
    entries: &[(&str, DataType, &[usize], &[u8])],
) -> Vec<u8> {
    build_shard_with_metadata(entries, &[])
}

pub fn build_shard_with_metadata(
    entries: &[(&str, DataType, &[usize], &[u8])],
    metadata: &[(&str, &str)],
) -> Vec<u8> {
    let mut header = serde_json::Map::new();
    if !metadata.is_empty() {
        let entries: HashMap<&str, &str> = metadata.iter().copied().collect();
        header.insert("__metadata__".to_string(), json!(entries));
    }
    let mut data = Vec::new();
    for (name, dtype, shape, bytes) in entries {
        let start = data.len();
        data.extend_from_slice(bytes);
        header.insert(
            name.to_string(),
            json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [start, data.len()],
            }),
        );
    }
    let header_json =
        serde_json::to_vec(&serde_json::Value::Object(header)).unwrap();
    blob_from_parts(&header_json, &data)
}

/// Assemble a blob from an arbitrary header body, for malformed-header cases.
pub fn blob_from_parts(header: &[u8], data: &[u8]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(8 + header.len() + data.len());
    blob.extend_from_slice(&(header.len() as u64).to_le_bytes());
    blob.extend_from_slice(header);
    blob.extend_from_slice(data);
    blob
}

pub fn header_byte_length(blob: &[u8]) -> u64 {
    8 + u64::from_le_bytes(blob[..8].try_into().unwrap())
}

/// In-memory shard source. Failures can be scripted per range start offset;
/// each scripted failure is consumed by one fetch attempt.
pub struct MockTransport {
    url: String,
    blob: Vec<u8>,
    failures: Mutex<HashMap<u64, u32>>,
    fetch_calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(url: &str, blob: Vec<u8>) -> Self {
        Self {
            url: url.to_string(),
            blob,
            failures: Mutex::new(HashMap::new()),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    /// Make the next `times` fetches of the range starting at `file_start`
    /// answer HTTP 500. Use `u32::MAX` for a permanently broken range.
    pub fn fail_range(self, file_start: u64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(file_start, times);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::Relaxed)
    }
}

impl RangedTransport for MockTransport {
    async fn resolve(
        &self,
        _url: &str,
    ) -> Result<ShardLocation, TransportError> {
        Ok(ShardLocation {
            url: self.url.clone(),
            content_length: self.blob.len() as u64,
        })
    }

    async fn fetch_range(
        &self,
        url: &str,
        start: u64,
        end: u64,
    ) -> Result<Bytes, TransportError> {
        self.fetch_calls.fetch_add(1, Ordering::Relaxed);
        if let Some(remaining) = self.failures.lock().unwrap().get_mut(&start) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                return Err(TransportError::UnexpectedStatus {
                    url: url.to_string(),
                    status: 500,
                });
            }
        }
        if end > self.blob.len() as u64 || start >= end {
            return Err(TransportError::UnexpectedStatus {
                url: url.to_string(),
                status: 416,
            });
        }
        Ok(Bytes::copy_from_slice(&self.blob[start as usize..end as usize]))
    }
}
