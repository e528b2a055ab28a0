mod common;

use common::{MockTransport, blob_from_parts, build_shard, build_shard_with_metadata};
use shardstream::{
    DataType, HeaderFormatError, RangedTransport, read_metadata,
};

async fn parse(blob: Vec<u8>) -> Result<shardstream::ShardMetadata, HeaderFormatError> {
    let transport = MockTransport::new("mock://shard", blob);
    let location = transport.resolve("mock://shard").await.unwrap();
    read_metadata(&transport, &location).await
}

#[tokio::test]
async fn header_length_is_prefix_plus_eight() {
    let blob = build_shard(&[("t1", DataType::F32, &[4], &[1u8; 16])]);
    let declared = u64::from_le_bytes(blob[..8].try_into().unwrap());

    let metadata = parse(blob).await.unwrap();
    assert_eq!(metadata.header_byte_length, 8 + declared);
    assert_eq!(metadata.tensors.len(), 1);

    let info = &metadata.tensors["t1"];
    assert_eq!(info.dtype, DataType::F32);
    assert_eq!(info.shape, vec![4]);
    assert_eq!(info.data_offsets, (0, 16));
}

#[tokio::test]
async fn metadata_key_is_not_a_tensor() {
    let blob = build_shard_with_metadata(
        &[("t1", DataType::BF16, &[2], &[0u8; 4])],
        &[("format", "pt")],
    );

    let metadata = parse(blob).await.unwrap();
    assert_eq!(metadata.tensors.len(), 1);
    assert!(!metadata.tensors.contains_key("__metadata__"));
    assert_eq!(
        metadata.metadata.as_ref().unwrap().get("format"),
        Some(&"pt".to_string())
    );
}

#[tokio::test]
async fn truncated_prefix_fails() {
    let err = parse(vec![1, 2, 3]).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::PrefixTooShort));
}

#[tokio::test]
async fn zero_length_header_fails_without_a_body_fetch() {
    // A blob whose prefix declares an empty header. Only the prefix itself
    // may be fetched; an empty [8, 8) body range must never hit the
    // transport.
    let blob = 0u64.to_le_bytes().to_vec();
    let transport = MockTransport::new("mock://shard", blob);
    let location = transport.resolve("mock://shard").await.unwrap();

    let err = read_metadata(&transport, &location).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::EmptyHeader));
    assert_eq!(transport.fetch_calls(), 1);
}

#[tokio::test]
async fn header_longer_than_shard_fails() {
    // Prefix declares a 1000-byte header, but the blob ends right after it.
    let blob = 1000u64.to_le_bytes().to_vec();
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::HeaderExceedsShard { .. }));
}

#[tokio::test]
async fn oversized_header_length_fails() {
    let blob = u64::MAX.to_le_bytes().to_vec();
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::HeaderTooLarge(_)));
}

#[tokio::test]
async fn non_utf8_header_fails() {
    let blob = blob_from_parts(&[0xff, 0xfe, 0x80], &[]);
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::InvalidUtf8));
}

#[tokio::test]
async fn non_json_header_fails() {
    let blob = blob_from_parts(b"not json", &[]);
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::InvalidJson(_)));
}

#[tokio::test]
async fn descriptor_missing_required_field_fails() {
    // data_offsets is absent.
    let blob = blob_from_parts(
        br#"{"t1": {"dtype": "F32", "shape": [4]}}"#,
        &[0u8; 16],
    );
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::InvalidJson(_)));
}

#[tokio::test]
async fn unknown_dtype_tag_fails() {
    let blob = blob_from_parts(
        br#"{"t1": {"dtype": "F128", "shape": [4], "data_offsets": [0, 16]}}"#,
        &[0u8; 16],
    );
    let err = parse(blob).await.unwrap_err();
    assert!(matches!(err, HeaderFormatError::InvalidJson(_)));
}
