//! GPU backend: transfer/dispatch pipeline over a [`ComputeDevice`]
//!
//! Every `matmul` call:
//!
//! 1. acquires cached device buffers for `xout`, `x` and `w`
//! 2. starts both input transfers without blocking in between
//! 3. waits for both; a failed transfer aborts before dispatch
//! 4. computes the launch geometry from `d`
//! 5. dispatches the kernel and waits for it
//! 6. copies exactly `d` elements back into `xout`
//!
//! [`GpuBackend::matmul_device`] runs steps 4 and 5 on buffers that are
//! already resident, returning the kernel's completion instead of blocking.

use super::{Backend, validate_matmul_args};
use crate::error::{Error, Result};
use crate::runtime::{
    Completion, ComputeDevice, DeviceBuffer, DeviceSession, KERNEL_ENTRY_POINT, LaunchGeometry,
    TAG_W, TAG_X, TAG_XOUT,
};

/// GPU implementation of [`Backend`], generic over the device it drives.
pub struct GpuBackend<D: ComputeDevice> {
    config: D::Config,
    session: Option<DeviceSession<D>>,
}

impl<D: ComputeDevice> GpuBackend<D> {
    /// Create an empty backend; no device is touched until `setup_context`.
    pub fn new(config: D::Config) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Device configuration
    pub fn config(&self) -> &D::Config {
        &self.config
    }

    /// Whether a device session is live
    pub fn is_initialized(&self) -> bool {
        self.session.is_some()
    }

    /// Description of the device in use
    pub fn device_name(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.device().description())
    }

    /// Number of buffers held by the cache (zero without a session)
    pub fn cached_buffers(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.cache().len())
    }

    /// Device memory held by the cache, in bytes
    pub fn cached_bytes(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.cache().size_bytes())
    }

    /// The live session
    pub fn session(&self) -> Option<&DeviceSession<D>> {
        self.session.as_ref()
    }

    fn session_mut(&mut self, op: &'static str) -> Result<&mut DeviceSession<D>> {
        self.session
            .as_mut()
            .ok_or(Error::NotInitialized { op })
    }

    /// Allocate an uncached, unpopulated device buffer.
    ///
    /// The caller owns it and frees it with [`GpuBackend::free_buffer`].
    pub fn create_buffer(&mut self, tag: &'static str, len: usize) -> Result<D::Buffer> {
        self.session_mut("create_buffer")?
            .device_mut()
            .allocate(tag, len)
    }

    /// Allocate an uncached device buffer and start copying `data` into it.
    ///
    /// The buffer may only be used once the returned completion resolved.
    pub fn upload(&mut self, tag: &'static str, data: &[f32]) -> Result<(D::Buffer, Completion)> {
        let session = self.session_mut("upload")?;
        let buffer = session.device_mut().allocate(tag, data.len())?;
        let pending = session.device().write(&buffer, data);
        Ok((buffer, pending))
    }

    /// Copy the first `dst.len()` elements of a resident buffer to the host.
    pub fn read_buffer(&mut self, src: &D::Buffer, dst: &mut [f32]) -> Result<()> {
        if dst.len() > src.len() {
            return Err(Error::length_mismatch("read_buffer", "dst", src.len(), dst.len()));
        }
        self.session_mut("read_buffer")?.device().read(src, dst)
    }

    /// Free a buffer obtained from `create_buffer` or `upload`.
    pub fn free_buffer(&mut self, buffer: D::Buffer) -> Result<()> {
        self.session_mut("free_buffer")?.device_mut().free(buffer)
    }

    /// Run the kernel on already-resident buffers without host round-trips.
    ///
    /// `x` must hold at least `n` elements, `w` at least `n * d` and `xout`
    /// at least `d`. Returns the kernel's completion; the caller waits on it
    /// (or chains further device work) before reading `xout`.
    pub fn matmul_device(
        &mut self,
        xout: &D::Buffer,
        x: &D::Buffer,
        w: &D::Buffer,
        n: usize,
        d: usize,
    ) -> Result<Completion> {
        let weights = n
            .checked_mul(d)
            .ok_or(Error::DimensionOverflow { op: "matmul_device", n, d })?;
        for (arg, buffer, needed) in [("xout", xout, d), ("x", x, n), ("w", w, weights)] {
            if buffer.len() < needed {
                return Err(Error::length_mismatch("matmul_device", arg, needed, buffer.len()));
            }
        }

        let session = self.session_mut("matmul_device")?;
        Ok(dispatch(session.device(), xout, x, w, n, d))
    }
}

/// Launch the kernel over the geometry derived from `d`.
fn dispatch<D: ComputeDevice>(
    device: &D,
    xout: &D::Buffer,
    x: &D::Buffer,
    w: &D::Buffer,
    n: usize,
    d: usize,
) -> Completion {
    let geometry = LaunchGeometry::for_rows(d);
    log::trace!(
        "{}: n={} d={} global={} local={}",
        KERNEL_ENTRY_POINT,
        n,
        d,
        geometry.global_size,
        geometry.local_size
    );
    device.dispatch(xout, x, w, n, d, geometry)
}

impl<D: ComputeDevice> Backend for GpuBackend<D> {
    fn name(&self) -> &'static str {
        D::name()
    }

    fn setup_context(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        self.session = Some(DeviceSession::open(&self.config)?);
        Ok(())
    }

    fn matmul(
        &mut self,
        xout: &mut [f32],
        x: &[f32],
        w: &[f32],
        n: usize,
        d: usize,
    ) -> Result<()> {
        validate_matmul_args(xout, x, w, n, d)?;
        let session = self.session_mut("matmul")?;
        if d == 0 {
            return Ok(());
        }

        let xout_dev = session.acquire(TAG_XOUT, d)?;
        let x_dev = session.acquire(TAG_X, x.len())?;
        let w_dev = session.acquire(TAG_W, w.len())?;

        let device = session.device();
        let x_copied = device.write(&x_dev, x);
        let w_copied = device.write(&w_dev, w);
        Completion::join(x_copied, w_copied)?;

        dispatch(device, &xout_dev, &x_dev, &w_dev, n, d).wait()?;

        device.read(&xout_dev, xout)
    }

    fn release(&mut self) -> Result<()> {
        self.session
            .take()
            .ok_or(Error::NotInitialized { op: "release" })?
            .release()
    }
}
