mod fetch;
mod layout;
mod loader;
mod metadata;

pub use fetch::{FetchError, FetchFailure};
pub use layout::{FetchRange, LayoutError, LayoutPlan, plan_layout};
pub use loader::{
    LoaderOptions, ShardHandle, ShardLoadError, TensorView, ValidationError,
    open_shard,
};
pub use metadata::{
    HeaderFormatError, LENGTH_PREFIX_SIZE, ShardMetadata, TensorInfo,
    read_metadata,
};
