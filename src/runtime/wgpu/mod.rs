//! WebGPU device implementation (requires `wgpu` feature)
//!
//! Cross-platform GPU acceleration via WebGPU (Vulkan, Metal, DX12).
//!
//! # Example
//!
//! ```ignore
//! use accelerated::prelude::*;
//!
//! let mut backend = WgpuBackend::new(WgpuConfig::default());
//! backend.setup_context()?;
//! backend.matmul(&mut xout, &x, &w, n, d)?;
//! backend.release()?;
//! ```

mod client;
mod device;
pub mod shaders;

pub use client::{WgpuBuffer, WgpuClient};
pub use device::{AdapterInfo, WgpuConfig, is_wgpu_available};

/// GPU backend driving a WebGPU device
pub type WgpuBackend = crate::backend::GpuBackend<WgpuClient>;

impl Default for WgpuBackend {
    fn default() -> Self {
        Self::new(WgpuConfig::default())
    }
}
