//! Device session: a device plus the buffers cached on it

use crate::error::{Error, Result};
use crate::runtime::{BufferCache, ComputeDevice, DeviceBuffer};

/// Owns one compute device and its buffer cache.
///
/// Created once at setup and torn down once by [`DeviceSession::release`].
pub struct DeviceSession<D: ComputeDevice> {
    device: D,
    cache: BufferCache<D::Buffer>,
}

impl<D: ComputeDevice> DeviceSession<D> {
    /// Open the device described by `config`.
    pub fn open(config: &D::Config) -> Result<Self> {
        let device = D::open(config)?;
        log::debug!("{} session opened on {}", D::name(), device.description());
        Ok(Self {
            device,
            cache: BufferCache::new(),
        })
    }

    /// Shared access to the device
    #[inline]
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Exclusive access to the device
    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// The session's buffer cache
    #[inline]
    pub fn cache(&self) -> &BufferCache<D::Buffer> {
        &self.cache
    }

    /// Cached buffer for `(tag, len)`, allocated on first use.
    pub fn acquire(&mut self, tag: &'static str, len: usize) -> Result<D::Buffer> {
        let device = &mut self.device;
        self.cache
            .acquire(tag, len, |tag, len| device.allocate(tag, len))
    }

    /// Free every cached buffer, then the device.
    ///
    /// Teardown does not stop at the first failure: every buffer and the
    /// device are still released, and the first error is returned.
    pub fn release(mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;
        let buffers: Vec<_> = self.cache.drain().map(|(_, buffer)| buffer).collect();
        let count = buffers.len();

        for buffer in buffers {
            let (tag, len) = (buffer.tag(), buffer.len());
            if let Err(e) = self.device.free(buffer) {
                log::warn!("failed to free buffer tag={} len={}: {}", tag, len, e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.device.release() {
            log::warn!("failed to release {} device: {}", D::name(), e);
            first_error.get_or_insert(e);
        }

        log::debug!("{} session released ({} cached buffers)", D::name(), count);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
