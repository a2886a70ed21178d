//! Device runtime for the GPU backend
//!
//! This module defines the `ComputeDevice` trait that a concrete GPU device
//! implements, and the device-independent pieces the GPU backend is built
//! from.
//!
//! # Architecture
//!
//! ```text
//! DeviceSession<D: ComputeDevice>
//! ├── D (device handle, queue, compiled kernel)
//! └── BufferCache<D::Buffer> ((tag, len) -> resident buffer)
//!
//! Completion (one-shot signal for transfers and kernel launches)
//! LaunchGeometry (work-group count and size, derived per call)
//! ```

pub mod cache;
pub mod completion;
pub mod geometry;
pub mod session;

#[cfg(feature = "wgpu")]
pub mod wgpu;

pub use cache::{BufferCache, BufferKey};
pub use completion::{Completion, Signal};
pub use geometry::{LOCAL_GROUP_SIZE, LaunchGeometry};
pub use session::DeviceSession;

use crate::error::Result;

/// Logical tag of the output vector buffer
pub const TAG_XOUT: &str = "xout";
/// Logical tag of the input activation buffer
pub const TAG_X: &str = "x";
/// Logical tag of the weight matrix buffer
pub const TAG_W: &str = "w";

/// Entry point every matmul kernel program must export
pub const KERNEL_ENTRY_POINT: &str = "matmul";

/// Device-resident f32 buffer handle.
///
/// Handles are cheap to clone; clones refer to the same device memory and
/// report the same [`DeviceBuffer::id`].
pub trait DeviceBuffer: Clone + Send + 'static {
    /// Identity of the underlying device allocation
    fn id(&self) -> u64;

    /// Logical tag the buffer was created with
    fn tag(&self) -> &'static str;

    /// Capacity in f32 elements
    fn len(&self) -> usize;

    /// Whether the buffer holds no elements
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Capacity in bytes
    fn size_bytes(&self) -> usize {
        self.len() * std::mem::size_of::<f32>()
    }
}

/// A compute device able to run the matmul kernel.
///
/// A device owns its handle, execution context, queue and compiled kernel.
/// It is exclusively owned by one [`DeviceSession`] and is not shared across
/// threads; operations are issued sequentially.
///
/// Transfers and launches are asynchronous: they return a [`Completion`]
/// that resolves once the device has finished. Readback blocks.
pub trait ComputeDevice: Send + Sized + 'static {
    /// Device configuration
    type Config: Clone + Send + 'static;

    /// Buffer handle type
    type Buffer: DeviceBuffer;

    /// Human-readable name of this device kind
    fn name() -> &'static str;

    /// Acquire the device, create its queue and compile the kernel program.
    fn open(config: &Self::Config) -> Result<Self>;

    /// Adapter or device description
    fn description(&self) -> String {
        Self::name().to_string()
    }

    /// Allocate a buffer of `len` f32 elements.
    fn allocate(&mut self, tag: &'static str, len: usize) -> Result<Self::Buffer>;

    /// Start copying `src` into the start of `dst`.
    fn write(&self, dst: &Self::Buffer, src: &[f32]) -> Completion;

    /// Launch the kernel with arguments `(xout, x, w, n)` over `geometry`.
    ///
    /// `d` is the number of output rows; the launch covers exactly `d` work
    /// items.
    fn dispatch(
        &self,
        xout: &Self::Buffer,
        x: &Self::Buffer,
        w: &Self::Buffer,
        n: usize,
        d: usize,
        geometry: LaunchGeometry,
    ) -> Completion;

    /// Copy the first `dst.len()` elements of `src` back to the host.
    fn read(&self, src: &Self::Buffer, dst: &mut [f32]) -> Result<()>;

    /// Free one buffer.
    fn free(&mut self, buffer: Self::Buffer) -> Result<()>;

    /// Tear down the device. Called once, after every buffer was freed.
    fn release(self) -> Result<()>;
}
