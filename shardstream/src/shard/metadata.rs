// Header layout follows the safetensors format:
// https://github.com/huggingface/safetensors

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    DataType,
    transport::{RangedTransport, ShardLocation, TransportError},
};

/// Bytes occupied by the little-endian u64 header length prefix.
pub const LENGTH_PREFIX_SIZE: u64 = 8;

const MAX_HEADER_SIZE: u64 = 100_000_000;

#[derive(Debug, Error)]
pub enum HeaderFormatError {
    #[error("could not read the shard header")]
    Unreachable(#[from] TransportError),
    #[error("the shard is shorter than the 8-byte header length prefix")]
    PrefixTooShort,
    #[error("the header length prefix is zero")]
    EmptyHeader,
    #[error(
        "declared header length {0} exceeds the {MAX_HEADER_SIZE}-byte cap"
    )]
    HeaderTooLarge(u64),
    #[error(
        "the header claims {header_byte_length} bytes, but the shard is only \
        {content_length} bytes long"
    )]
    HeaderExceedsShard {
        header_byte_length: u64,
        content_length: u64,
    },
    #[error("the header is not valid UTF-8")]
    InvalidUtf8,
    #[error("the header is not a valid descriptor table: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// One tensor's entry in the header. `data_offsets` is relative to the start
/// of the data region, not to the start of the file.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TensorInfo {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub data_offsets: (u64, u64),
}

#[derive(Debug, Serialize, Deserialize)]
struct RawHeader {
    #[serde(rename = "__metadata__")]
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<HashMap<String, String>>,
    #[serde(flatten)]
    tensors: HashMap<String, TensorInfo>,
}

/// Decoded shard header. The reserved `__metadata__` entry is kept aside and
/// never appears in the tensor table.
#[derive(Debug, Clone)]
pub struct ShardMetadata {
    /// Length prefix plus JSON body, i.e. the file offset where the data
    /// region starts.
    pub header_byte_length: u64,
    pub metadata: Option<HashMap<String, String>>,
    pub tensors: HashMap<String, TensorInfo>,
}

/// Read and decode the header of a remote shard: 8 bytes of little-endian
/// length prefix, then that many bytes of JSON descriptor table.
pub async fn read_metadata<T: RangedTransport>(
    transport: &T,
    location: &ShardLocation,
) -> Result<ShardMetadata, HeaderFormatError> {
    if location.content_length < LENGTH_PREFIX_SIZE {
        return Err(HeaderFormatError::PrefixTooShort);
    }
    let prefix =
        transport.fetch_range(&location.url, 0, LENGTH_PREFIX_SIZE).await?;
    let prefix: [u8; LENGTH_PREFIX_SIZE as usize] = prefix
        .as_ref()
        .try_into()
        .map_err(|_| HeaderFormatError::PrefixTooShort)?;
    let header_len = u64::from_le_bytes(prefix);
    if header_len == 0 {
        return Err(HeaderFormatError::EmptyHeader);
    }
    if header_len > MAX_HEADER_SIZE {
        return Err(HeaderFormatError::HeaderTooLarge(header_len));
    }
    let header_byte_length = LENGTH_PREFIX_SIZE
        .checked_add(header_len)
        .ok_or(HeaderFormatError::HeaderTooLarge(header_len))?;
    if header_byte_length > location.content_length {
        return Err(HeaderFormatError::HeaderExceedsShard {
            header_byte_length,
            content_length: location.content_length,
        });
    }

    let body = transport
        .fetch_range(&location.url, LENGTH_PREFIX_SIZE, header_byte_length)
        .await?;
    let text = core::str::from_utf8(&body)
        .map_err(|_| HeaderFormatError::InvalidUtf8)?;
    let raw: RawHeader = serde_json::from_str(text)?;
    log::debug!(
        "parsed shard header of {}: {} tensors, data region starts at byte {}",
        location.url,
        raw.tensors.len(),
        header_byte_length
    );
    Ok(ShardMetadata {
        header_byte_length,
        metadata: raw.metadata,
        tensors: raw.tensors,
    })
}
