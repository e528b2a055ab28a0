pub mod data_type;
pub mod device;
pub mod shard;
pub mod transport;

pub use data_type::{ArrayElement, DataType};
pub use device::{
    CpuBuffer, CpuContext, DeviceBuffer, DeviceContext, DeviceError,
    PlacementError,
};
pub use shard::{
    FetchError, FetchRange, HeaderFormatError, LayoutError, LayoutPlan,
    LoaderOptions, ShardHandle, ShardLoadError, ShardMetadata, TensorInfo,
    TensorView, ValidationError, open_shard, plan_layout, read_metadata,
};
pub use transport::{
    HttpTransport, RangedTransport, ShardLocation, TransportError,
};
