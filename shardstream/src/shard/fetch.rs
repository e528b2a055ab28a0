use std::time::Duration;

use futures::future::try_join_all;
use thiserror::Error;

use super::layout::{FetchRange, LayoutPlan};
use crate::{
    device::{DeviceBuffer, PlacementError},
    transport::{RangedTransport, ShardLocation, TransportError},
};

/// A byte range could not be retrieved within its attempt budget. The whole
/// load fails with this; a partial buffer can never produce valid views.
#[derive(Debug, Error)]
#[error(
    "range [{file_start}, {file_end}) of {url} failed after {attempts} attempts"
)]
pub struct FetchError {
    pub url: String,
    pub file_start: u64,
    pub file_end: u64,
    pub attempts: u32,
    #[source]
    pub source: FetchFailure,
}

/// Why a single fetch attempt was counted as failed.
#[derive(Debug, Error)]
pub enum FetchFailure {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("received {actual} bytes for a {expected}-byte range")]
    WrongBodyLength { expected: u64, actual: u64 },
}

#[derive(Debug, Error)]
pub(crate) enum RegionFetchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Placement(#[from] PlacementError),
}

/// Fetch every range of the plan concurrently and place the bytes into the
/// buffer. Resolves only once all ranges are placed; the first range to
/// exhaust its budget fails the join and drops the remaining in-flight
/// fetches.
pub(crate) async fn fetch_data_region<T, B>(
    transport: &T,
    location: &ShardLocation,
    plan: &LayoutPlan,
    buffer: &B,
    max_retries: u32,
    retry_backoff: Duration,
) -> Result<(), RegionFetchError>
where
    T: RangedTransport,
    B: DeviceBuffer,
{
    let workers = plan.ranges.iter().map(|range| {
        fetch_one_range(
            transport,
            location,
            *range,
            buffer,
            max_retries,
            retry_backoff,
        )
    });
    try_join_all(workers).await?;
    log::debug!(
        "placed {} bytes across {} ranges from {}",
        plan.data_region_length,
        plan.ranges.len(),
        location.url
    );
    Ok(())
}

async fn fetch_one_range<T, B>(
    transport: &T,
    location: &ShardLocation,
    range: FetchRange,
    buffer: &B,
    max_retries: u32,
    retry_backoff: Duration,
) -> Result<(), RegionFetchError>
where
    T: RangedTransport,
    B: DeviceBuffer,
{
    let expected = range.len();
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let failure = match transport
            .fetch_range(&location.url, range.file_start, range.file_end)
            .await
        {
            Ok(body) if body.len() as u64 == expected => {
                // A placement failure is a planning bug, not a network
                // hiccup; retrying it cannot help.
                buffer.write(range.buffer_offset as usize, &body)?;
                return Ok(());
            },
            Ok(body) => FetchFailure::WrongBodyLength {
                expected,
                actual: body.len() as u64,
            },
            Err(err) => FetchFailure::Transport(err),
        };
        if attempt >= max_retries {
            return Err(FetchError {
                url: location.url.clone(),
                file_start: range.file_start,
                file_end: range.file_end,
                attempts: attempt,
                source: failure,
            }
            .into());
        }
        let delay = retry_backoff * 2u32.saturating_pow(attempt - 1);
        log::warn!(
            "range [{}, {}) of {} failed (attempt {attempt}/{max_retries}): \
            {failure}; retrying in {delay:?}",
            range.file_start,
            range.file_end,
            location.url
        );
        tokio::time::sleep(delay).await;
    }
}
