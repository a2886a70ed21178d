//! # accelerated
//!
//! **Pluggable hardware acceleration for the matrix-vector multiply at the
//! heart of transformer inference.**
//!
//! Every forward pass spends most of its time computing `xout = W · x`.
//! This crate exposes that operation behind one [`Backend`](backend::Backend)
//! contract so the inference loop never depends on which device runs it.
//!
//! ## Backends
//!
//! - **CPU**: synchronous reference implementation and correctness oracle
//! - **GPU** (WebGPU): reusable device buffers, overlapping host→device
//!   transfers, kernel dispatch and readback, plus a device-resident entry
//!   point for chaining stages without host round-trips
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use accelerated::prelude::*;
//!
//! let mut backend = create_backend("gpu".parse()?)?;
//! backend.setup_context()?;
//!
//! let (n, d) = (4, 2);
//! let w = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
//! let x = [1.0; 4];
//! let mut xout = [0.0; 2];
//! backend.matmul(&mut xout, &x, &w, n, d)?;
//! assert_eq!(xout, [10.0, 26.0]);
//!
//! backend.release()?;
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu` (default): WebGPU device
//! - `rayon`: Multi-threaded rows in the CPU backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod runtime;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::backend::{Backend, BackendKind, CpuBackend, GpuBackend, create_backend};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::runtime::{Completion, ComputeDevice, DeviceBuffer, LaunchGeometry};

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::{WgpuBackend, WgpuConfig};
}
