//! WGSL compute shader infrastructure for the WebGPU device
//!
//! # Module Structure
//!
//! - `matmul_wgsl` - the built-in kernel program
//! - `pipeline` - shader compilation and per-group-size pipeline caching
//! - `matmul` - kernel launcher

pub mod matmul;
pub mod matmul_wgsl;
pub mod pipeline;

pub use matmul::{MatmulParams, launch_matmul};
pub use matmul_wgsl::MATMUL_SHADER;
pub use pipeline::PipelineCache;
