use std::sync::{
    Arc, Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
};

use super::{
    buffer::{DeviceBuffer, PlacementError},
    context::{DeviceContext, DeviceError},
};

/// Host-memory device. Useful on machines without an accelerator and as the
/// reference backend for tests: the allocation is ordinary heap memory, so a
/// view address is directly dereferenceable.
pub struct CpuContext {
    live_buffers: Arc<AtomicUsize>,
}

impl CpuContext {
    pub fn new() -> Self {
        Self {
            live_buffers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of buffers allocated from this context that have not been
    /// released yet.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers.load(Ordering::Relaxed)
    }
}

impl Default for CpuContext {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceContext for CpuContext {
    type Buffer = CpuBuffer;

    fn allocate(
        &self,
        nbytes: usize,
        label: &str,
    ) -> Result<Self::Buffer, DeviceError> {
        let data = vec![0u8; nbytes].into_boxed_slice();
        self.live_buffers.fetch_add(1, Ordering::Relaxed);
        Ok(CpuBuffer {
            length: nbytes,
            data: Mutex::new(data),
            label: label.to_string(),
            live_buffers: Arc::clone(&self.live_buffers),
        })
    }
}

#[derive(Debug)]
pub struct CpuBuffer {
    length: usize,
    data: Mutex<Box<[u8]>>,
    label: String,
    live_buffers: Arc<AtomicUsize>,
}

impl CpuBuffer {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Copy of the full buffer contents.
    pub fn contents(&self) -> Vec<u8> {
        self.lock().to_vec()
    }

    fn lock(&self) -> MutexGuard<'_, Box<[u8]>> {
        // A poisoned lock only means another writer panicked mid-copy; the
        // bytes are still addressable.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DeviceBuffer for CpuBuffer {
    fn length(&self) -> usize {
        self.length
    }

    fn base_address(&self) -> usize {
        self.lock().as_ptr() as usize
    }

    fn write(&self, offset: usize, bytes: &[u8]) -> Result<(), PlacementError> {
        let end = offset.checked_add(bytes.len()).filter(|&end| end <= self.length);
        let Some(end) = end else {
            return Err(PlacementError {
                offset,
                len: bytes.len(),
                buffer_length: self.length,
            });
        };
        self.lock()[offset..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl Drop for CpuBuffer {
    fn drop(&mut self) {
        self.live_buffers.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_land_at_their_offset() {
        let context = CpuContext::new();
        let buffer = context.allocate(8, "test").unwrap();
        buffer.write(2, &[7, 8, 9]).unwrap();
        assert_eq!(buffer.contents(), vec![0, 0, 7, 8, 9, 0, 0, 0]);
    }

    #[test]
    fn out_of_bounds_write_is_rejected() {
        let context = CpuContext::new();
        let buffer = context.allocate(4, "test").unwrap();
        let err = buffer.write(2, &[1, 2, 3]).unwrap_err();
        assert_eq!(
            err,
            PlacementError {
                offset: 2,
                len: 3,
                buffer_length: 4
            }
        );
    }

    #[test]
    fn drop_releases_the_allocation() {
        let context = CpuContext::new();
        let buffer = context.allocate(4, "test").unwrap();
        assert_eq!(context.live_buffers(), 1);
        drop(buffer);
        assert_eq!(context.live_buffers(), 0);
    }
}
