mod buffer;
mod context;
mod cpu;

pub use buffer::{DeviceBuffer, PlacementError};
pub use context::{DeviceContext, DeviceError};
pub use cpu::{CpuBuffer, CpuContext};
