use thiserror::Error;

/// A write landed outside the allocation. Ranges are planned before any fetch
/// starts, so this always indicates a planning bug rather than bad input.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error(
    "write of {len} bytes at offset {offset} overruns the \
    {buffer_length}-byte device buffer"
)]
pub struct PlacementError {
    pub offset: usize,
    pub len: usize,
    pub buffer_length: usize,
}

/// One contiguous device allocation. Loaded shard bytes are placed into it at
/// precomputed offsets; fetch workers write disjoint ranges concurrently, so
/// `write` takes `&self` and implementations must be safe for parallel
/// non-overlapping writers.
pub trait DeviceBuffer: Send + Sync {
    /// Size of the allocation in bytes.
    fn length(&self) -> usize;

    /// Device address of the first byte. Tensor view addresses are computed
    /// relative to this.
    fn base_address(&self) -> usize;

    /// Place `bytes` starting at `offset`. Must reject writes that would end
    /// past `length()` instead of truncating or wrapping.
    fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), PlacementError>;
}
