use std::{collections::HashMap, time::Duration};

use thiserror::Error;

use super::{
    fetch::{self, FetchError, RegionFetchError},
    layout::{self, LayoutError},
    metadata::{self, HeaderFormatError, ShardMetadata, TensorInfo},
};
use crate::{
    DataType,
    device::{DeviceBuffer, DeviceContext, DeviceError, PlacementError},
    transport::{RangedTransport, ShardLocation, TransportError},
};

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Concurrent ranged fetches; the data region is split into this many
    /// slices.
    pub num_workers: usize,
    /// Attempt budget per range before the whole load is abandoned.
    pub max_retries: u32,
    /// Delay before the first retry of a range; doubles after every further
    /// failure.
    pub retry_backoff: Duration,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            num_workers: 4,
            max_retries: 3,
            retry_backoff: Duration::from_millis(250),
        }
    }
}

/// A tensor descriptor is inconsistent with the bytes it points at. Carries
/// the tensor name so the offending entry can be found without re-running.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(
        "tensor \"{name}\": {byte_length}-byte range is not divisible by the \
        {width}-byte width of {data_type:?}"
    )]
    Indivisible {
        name: String,
        byte_length: usize,
        data_type: DataType,
        width: usize,
    },
    #[error(
        "tensor \"{name}\": shape {shape:?} holds {shape_elements} elements, \
        but the byte range holds {range_elements}"
    )]
    ShapeMismatch {
        name: String,
        shape: Box<[usize]>,
        shape_elements: usize,
        range_elements: usize,
    },
    #[error(
        "tensor \"{name}\": view ends at byte {end}, past the \
        {buffer_length}-byte buffer"
    )]
    OutOfBuffer {
        name: String,
        end: u64,
        buffer_length: usize,
    },
}

#[derive(Debug, Error)]
pub enum ShardLoadError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Header(#[from] HeaderFormatError),
    #[error(transparent)]
    Layout(#[from] LayoutError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("tensor \"{0}\" not found in shard")]
    KeyNotFound(String),
}

impl From<RegionFetchError> for ShardLoadError {
    fn from(value: RegionFetchError) -> Self {
        match value {
            RegionFetchError::Fetch(err) => Self::Fetch(err),
            RegionFetchError::Placement(err) => Self::Placement(err),
        }
    }
}

/// Typed, shaped window over loaded shard bytes: a device address plus the
/// metadata a consuming runtime needs to wrap it. Never owns or copies the
/// bytes; valid for as long as the originating handle is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorView {
    address: usize,
    data_type: DataType,
    shape: Box<[usize]>,
    byte_length: usize,
}

impl TensorView {
    pub fn address(&self) -> usize {
        self.address
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn size_in_bytes(&self) -> usize {
        self.byte_length
    }

    pub fn num_elements(&self) -> usize {
        self.byte_length / self.data_type.size_in_bytes()
    }
}

/// A fully loaded shard: every byte of the data region placed, every view
/// validated. Dropping (or `close`ing) the handle releases the device buffer,
/// which invalidates all views derived from it.
#[derive(Debug)]
pub struct ShardHandle<B: DeviceBuffer> {
    location: ShardLocation,
    metadata: Option<HashMap<String, String>>,
    buffer: B,
    views: HashMap<String, TensorView>,
}

impl<B: DeviceBuffer> ShardHandle<B> {
    pub fn location(&self) -> &ShardLocation {
        &self.location
    }

    /// Free-form `__metadata__` entries from the shard header, if present.
    pub fn metadata(&self) -> Option<&HashMap<String, String>> {
        self.metadata.as_ref()
    }

    /// Tensor names in the shard. The reserved `__metadata__` key is not a
    /// tensor and never appears here.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn views(&self) -> impl Iterator<Item = (&str, &TensorView)> {
        self.views.iter().map(|(name, view)| (name.as_str(), view))
    }

    pub fn view(&self, name: &str) -> Result<&TensorView, ShardLoadError> {
        self.views
            .get(name)
            .ok_or_else(|| ShardLoadError::KeyNotFound(name.to_string()))
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn data_region_length(&self) -> usize {
        self.buffer.length()
    }

    /// Release the device buffer. All views over this shard become dangling.
    pub fn close(self) {}
}

/// Load a shard: resolve the URL, parse the header, plan the byte layout,
/// fetch the data region into one device allocation, and validate a view per
/// tensor. All-or-nothing: any failure releases the buffer and no views
/// survive.
pub async fn open_shard<T, C>(
    url: &str,
    transport: &T,
    context: &C,
    options: LoaderOptions,
) -> Result<ShardHandle<C::Buffer>, ShardLoadError>
where
    T: RangedTransport,
    C: DeviceContext,
{
    let location = transport.resolve(url).await?;
    log::info!(
        "opening shard {} ({} bytes)",
        location.url,
        location.content_length
    );
    let shard_metadata = metadata::read_metadata(transport, &location).await?;
    let plan = layout::plan_layout(
        &shard_metadata,
        location.content_length,
        options.num_workers,
    )?;
    let nbytes = usize::try_from(plan.data_region_length)
        .map_err(|_| LayoutError::DataRegionTooLarge(plan.data_region_length))?;
    let buffer = context.allocate(nbytes, &buffer_label(&location.url))?;
    fetch::fetch_data_region(
        transport,
        &location,
        &plan,
        &buffer,
        options.max_retries.max(1),
        options.retry_backoff,
    )
    .await?;
    let views = build_views(&shard_metadata, &buffer)?;
    log::info!(
        "loaded {} tensors ({nbytes} bytes) from {}",
        views.len(),
        location.url
    );
    Ok(ShardHandle {
        location,
        metadata: shard_metadata.metadata,
        buffer,
        views,
    })
}

fn buffer_label(url: &str) -> String {
    let name = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    format!("shard_{name}")
}

fn build_views<B: DeviceBuffer>(
    metadata: &ShardMetadata,
    buffer: &B,
) -> Result<HashMap<String, TensorView>, ValidationError> {
    let base = buffer.base_address();
    let buffer_length = buffer.length();
    let mut views = HashMap::with_capacity(metadata.tensors.len());
    for (name, info) in &metadata.tensors {
        let view = build_view(name, info, base, buffer_length)?;
        views.insert(name.clone(), view);
    }
    Ok(views)
}

fn build_view(
    name: &str,
    info: &TensorInfo,
    base: usize,
    buffer_length: usize,
) -> Result<TensorView, ValidationError> {
    let (start, end) = info.data_offsets;
    let byte_length = (end - start) as usize;
    let width = info.dtype.size_in_bytes();
    if byte_length % width != 0 {
        return Err(ValidationError::Indivisible {
            name: name.to_string(),
            byte_length,
            data_type: info.dtype,
            width,
        });
    }
    let range_elements = byte_length / width;
    let shape_elements: usize = info.shape.iter().product();
    if shape_elements != range_elements {
        return Err(ValidationError::ShapeMismatch {
            name: name.to_string(),
            shape: info.shape.clone().into_boxed_slice(),
            shape_elements,
            range_elements,
        });
    }
    if end as usize > buffer_length {
        return Err(ValidationError::OutOfBuffer {
            name: name.to_string(),
            end,
            buffer_length,
        });
    }
    Ok(TensorView {
        address: base + start as usize,
        data_type: info.dtype,
        shape: info.shape.clone().into_boxed_slice(),
        byte_length,
    })
}
