use thiserror::Error;

use super::buffer::DeviceBuffer;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to allocate {nbytes} bytes on device: {reason}")]
    AllocationFailed { nbytes: usize, reason: String },
}

/// Handle to one device. A context is passed explicitly into every load so
/// shards on different devices can coexist without shared global state.
pub trait DeviceContext {
    type Buffer: DeviceBuffer;

    /// Allocate a zero-initialized buffer of `nbytes` bytes. The label is
    /// diagnostic only.
    fn allocate(
        &self,
        nbytes: usize,
        label: &str,
    ) -> Result<Self::Buffer, DeviceError>;
}
