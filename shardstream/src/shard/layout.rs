use thiserror::Error;

use super::metadata::ShardMetadata;

/// One worker's slice of the file: the absolute byte span to fetch and the
/// device-buffer offset it lands at. Spans are half-open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchRange {
    pub file_start: u64,
    pub file_end: u64,
    pub buffer_offset: u64,
}

impl FetchRange {
    pub fn len(&self) -> u64 {
        self.file_end - self.file_start
    }
}

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("num_workers must be at least 1")]
    NoWorkers,
    #[error(
        "content length {content_length} cannot hold the \
        {header_byte_length}-byte header"
    )]
    HeaderExceedsContent {
        header_byte_length: u64,
        content_length: u64,
    },
    #[error(
        "tensor \"{name}\" declares data_offsets [{start}, {end}), \
        which is not a forward range"
    )]
    InvalidRange { name: String, start: u64, end: u64 },
    #[error(
        "tensor \"{name}\" ends at byte {end}, past the \
        {data_region_length}-byte data region"
    )]
    OutOfBounds {
        name: String,
        end: u64,
        data_region_length: u64,
    },
    #[error("tensors \"{first}\" and \"{second}\" declare overlapping data ranges")]
    Overlap { first: String, second: String },
    #[error("data region of {0} bytes does not fit in addressable memory")]
    DataRegionTooLarge(u64),
}

/// Validated fetch plan for one shard.
#[derive(Debug, Clone)]
pub struct LayoutPlan {
    pub header_byte_length: u64,
    pub content_length: u64,
    pub data_region_length: u64,
    /// Partition of `[header_byte_length, content_length)`: contiguous,
    /// non-empty, covering every byte exactly once.
    pub ranges: Vec<FetchRange>,
}

/// Validate the descriptor table against the real content length and split
/// the data region into `num_workers` fetch ranges. The split does not align
/// with tensor boundaries; placement happens at byte granularity, and a
/// tensor's device offset is simply its `data_offsets.0`.
pub fn plan_layout(
    metadata: &ShardMetadata,
    content_length: u64,
    num_workers: usize,
) -> Result<LayoutPlan, LayoutError> {
    if num_workers == 0 {
        return Err(LayoutError::NoWorkers);
    }
    let data_region_length = content_length
        .checked_sub(metadata.header_byte_length)
        .ok_or(LayoutError::HeaderExceedsContent {
            header_byte_length: metadata.header_byte_length,
            content_length,
        })?;

    let mut spans: Vec<(&str, u64, u64)> =
        Vec::with_capacity(metadata.tensors.len());
    for (name, info) in &metadata.tensors {
        let (start, end) = info.data_offsets;
        if end <= start {
            return Err(LayoutError::InvalidRange {
                name: name.clone(),
                start,
                end,
            });
        }
        if end > data_region_length {
            return Err(LayoutError::OutOfBounds {
                name: name.clone(),
                end,
                data_region_length,
            });
        }
        spans.push((name, start, end));
    }
    spans.sort_by_key(|&(_, start, _)| start);
    for pair in spans.windows(2) {
        let (first, _, first_end) = pair[0];
        let (second, second_start, _) = pair[1];
        if first_end > second_start {
            return Err(LayoutError::Overlap {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
    }

    let ranges =
        partition(metadata.header_byte_length, content_length, num_workers);
    log::debug!(
        "planned {} fetch ranges over a {}-byte data region",
        ranges.len(),
        data_region_length
    );
    Ok(LayoutPlan {
        header_byte_length: metadata.header_byte_length,
        content_length,
        data_region_length,
        ranges,
    })
}

/// Near-equal contiguous split of `[data_start, content_length)`. Integer
/// division leaves a remainder; the last slice absorbs it. Empty slices
/// (more workers than bytes) are dropped.
fn partition(
    data_start: u64,
    content_length: u64,
    num_workers: usize,
) -> Vec<FetchRange> {
    let total = content_length - data_start;
    if total == 0 {
        return Vec::new();
    }
    let chunk = total / num_workers as u64;
    let mut ranges = Vec::with_capacity(num_workers);
    let mut start = data_start;
    for index in 0..num_workers {
        let end = if index == num_workers - 1 {
            content_length
        } else {
            start + chunk
        };
        if end > start {
            ranges.push(FetchRange {
                file_start: start,
                file_end: end,
                buffer_offset: start - data_start,
            });
        }
        start = end;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_covers(ranges: &[FetchRange], data_start: u64, content_length: u64) {
        let mut cursor = data_start;
        for range in ranges {
            assert_eq!(range.file_start, cursor);
            assert!(range.file_end > range.file_start);
            assert_eq!(range.buffer_offset, range.file_start - data_start);
            cursor = range.file_end;
        }
        assert_eq!(cursor, content_length);
    }

    #[test]
    fn last_worker_absorbs_the_remainder() {
        let ranges = partition(100, 117, 4);
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges[0].len(), 4);
        assert_eq!(ranges[3].len(), 5);
        assert_covers(&ranges, 100, 117);
    }

    #[test]
    fn more_workers_than_bytes() {
        let ranges = partition(10, 13, 8);
        assert_eq!(ranges.len(), 1);
        assert_covers(&ranges, 10, 13);
    }

    #[test]
    fn empty_data_region_yields_no_ranges() {
        assert!(partition(42, 42, 4).is_empty());
    }
}
