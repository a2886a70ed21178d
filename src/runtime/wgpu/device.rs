//! WebGPU adapter discovery and configuration.
//!
//! Adapters are selected by index in enumeration order; an out-of-range index
//! falls back to the preferred adapter for the configured power preference.

use std::borrow::Cow;
use std::fmt;
use wgpu::{Adapter, Backend, Limits, PowerPreference};

use super::shaders::MATMUL_SHADER;
use crate::error::{Error, Result};

/// Configuration of the WebGPU device.
#[derive(Clone, Debug)]
pub struct WgpuConfig {
    /// Adapter index in enumeration order
    pub adapter_index: usize,
    /// Preference used when `adapter_index` is out of range
    pub power_preference: PowerPreference,
    /// WGSL kernel program exporting `matmul`
    pub kernel_source: Cow<'static, str>,
    /// Debug label for the device
    pub label: &'static str,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            power_preference: PowerPreference::HighPerformance,
            kernel_source: Cow::Borrowed(MATMUL_SHADER),
            label: "accelerated WebGPU Device",
        }
    }
}

impl WgpuConfig {
    /// Select an adapter by index
    pub fn with_adapter(mut self, index: usize) -> Self {
        self.adapter_index = index;
        self
    }

    /// Replace the kernel program
    pub fn with_kernel_source(mut self, source: impl Into<Cow<'static, str>>) -> Self {
        self.kernel_source = source.into();
        self
    }
}

/// Cached information about the selected adapter.
#[derive(Clone)]
pub struct AdapterInfo {
    /// Adapter name (e.g., "NVIDIA GeForce RTX 4090")
    pub name: String,
    /// Backend type (Vulkan, Metal, DX12, etc.)
    pub backend: Backend,
    /// Device limits
    pub limits: Limits,
}

impl AdapterInfo {
    /// Largest number of f32 elements a single storage binding may hold
    pub fn max_buffer_elements(&self) -> usize {
        let bytes = (self.limits.max_storage_buffer_binding_size as u64)
            .min(self.limits.max_buffer_size);
        (bytes / std::mem::size_of::<f32>() as u64) as usize
    }

    /// Largest work-group count per dispatch dimension
    pub fn max_workgroups(&self) -> usize {
        self.limits.max_compute_workgroups_per_dimension as usize
    }
}

impl fmt::Debug for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterInfo")
            .field("name", &self.name)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.name, self.backend)
    }
}

// ============================================================================
// Adapter Discovery
// ============================================================================

/// Request the adapter described by `config`.
pub(crate) async fn query_adapter(config: &WgpuConfig) -> Result<(Adapter, AdapterInfo)> {
    let instance = wgpu::Instance::default();

    let mut adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;

    let adapter = if config.adapter_index < adapters.len() {
        adapters.swap_remove(config.adapter_index)
    } else {
        if !adapters.is_empty() {
            log::debug!(
                "adapter index {} out of range ({} adapters), using preferred adapter",
                config.adapter_index,
                adapters.len()
            );
        }
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| Error::NoDevice {
                reason: format!("{e}"),
            })?
    };

    let wgpu_info = adapter.get_info();
    let info = AdapterInfo {
        name: wgpu_info.name,
        backend: wgpu_info.backend,
        limits: adapter.limits(),
    };

    Ok((adapter, info))
}

/// Query the adapter synchronously using pollster.
pub(crate) fn query_adapter_blocking(config: &WgpuConfig) -> Result<(Adapter, AdapterInfo)> {
    pollster::block_on(query_adapter(config))
}

/// Whether a WebGPU adapter can be acquired.
pub fn is_wgpu_available() -> bool {
    query_adapter_blocking(&WgpuConfig::default()).is_ok()
}

// ============================================================================
// Tests
// ============================================================================
