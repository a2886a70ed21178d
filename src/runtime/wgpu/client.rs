//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device, its queue and the compiled matmul
//! kernel, and implements [`ComputeDevice`] for the GPU backend.
//!
//! # Error Reporting
//!
//! wgpu reports validation and out-of-memory failures through the device's
//! uncaptured-error handler rather than return values. The client records
//! the first such error and checks for it after each operation, attributing
//! it to the operation that observes it.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Queue};

use super::device::{AdapterInfo, WgpuConfig, query_adapter_blocking};
use super::shaders::{MatmulParams, PipelineCache, launch_matmul};
use crate::error::{Error, Result};
use crate::runtime::completion::{self, Completion};
use crate::runtime::{ComputeDevice, DeviceBuffer, KERNEL_ENTRY_POINT, LaunchGeometry};

/// Counter for generating unique buffer IDs.
static BUFFER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// WgpuBuffer
// ============================================================================

/// Device-resident f32 storage buffer.
#[derive(Clone)]
pub struct WgpuBuffer {
    id: u64,
    tag: &'static str,
    len: usize,
    raw: Arc<Buffer>,
}

impl WgpuBuffer {
    /// Underlying wgpu buffer
    #[inline]
    pub fn raw(&self) -> &Buffer {
        &self.raw
    }
}

impl DeviceBuffer for WgpuBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn tag(&self) -> &'static str {
        self.tag
    }

    fn len(&self) -> usize {
        self.len
    }
}

impl std::fmt::Debug for WgpuBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuBuffer")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("len", &self.len)
            .finish()
    }
}

/// Byte size of a storage buffer holding `len` f32 elements.
///
/// Bindings must be non-empty, so empty buffers still occupy one element.
#[inline]
fn storage_size(len: usize) -> u64 {
    (len.max(1) * std::mem::size_of::<f32>()) as u64
}

// ============================================================================
// Uncaptured errors
// ============================================================================

/// First error reported by the device since it was last taken.
#[derive(Clone, Default)]
struct ErrorSlot(Arc<Mutex<Option<String>>>);

impl ErrorSlot {
    fn install(&self, device: &Device) {
        let slot = self.0.clone();
        device.on_uncaptured_error(Arc::new(move |error: wgpu::Error| {
            log::debug!("wgpu uncaptured error: {error}");
            slot.lock().get_or_insert_with(|| error.to_string());
        }));
    }

    fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}

/// Operation a completion belongs to, for error attribution.
#[derive(Clone, Copy)]
enum Pending {
    Write { tag: &'static str, len: usize },
    Kernel { n: usize, d: usize },
}

impl Pending {
    fn error(self, reason: impl Into<String>) -> Error {
        match self {
            Self::Write { tag, len } => Error::transfer("write", tag, len, reason),
            Self::Kernel { n, d } => Error::compute(KERNEL_ENTRY_POINT, n, d, reason),
        }
    }
}

// ============================================================================
// WgpuClient
// ============================================================================

/// WebGPU compute device.
///
/// Owns the WebGPU device and queue and the compiled kernel program. All
/// transfers and launches are submitted through this client's queue.
pub struct WgpuClient {
    info: AdapterInfo,
    device: Arc<Device>,
    queue: Arc<Queue>,
    pipeline_cache: PipelineCache,
    errors: ErrorSlot,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("adapter", &self.info)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Adapter information
    #[inline]
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.info
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.device
    }

    /// Get reference to the WebGPU queue.
    #[inline]
    pub fn wgpu_queue(&self) -> &Queue {
        &self.queue
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Block until all submitted work has finished.
    fn wait_idle(&self) -> std::result::Result<(), String> {
        self.device
            .poll(wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            })
            .map(|_| ())
            .map_err(|e| format!("GPU poll failed: {e}"))
    }

    /// Completion resolved by the queue once the work submitted so far is done.
    ///
    /// Waiting drives the device with a blocking poll and then checks for a
    /// device error raised in the meantime.
    fn completion(&self, pending: Pending) -> Completion {
        let (signal, completion) =
            completion::signal(pending.error("completion callback was never invoked"));
        self.queue.on_submitted_work_done(move || signal.complete(Ok(())));

        let device = self.device.clone();
        let errors = self.errors.clone();
        completion.with_driver(move || {
            device
                .poll(wgpu::PollType::Wait {
                    submission_index: None,
                    timeout: None,
                })
                .map_err(|e| pending.error(format!("GPU poll failed: {e}")))?;
            match errors.take() {
                Some(reason) => Err(pending.error(reason)),
                None => Ok(()),
            }
        })
    }

    /// Create a staging buffer for CPU readback.
    fn create_staging_buffer(&self, size: u64) -> Buffer {
        self.device.create_buffer(&BufferDescriptor {
            label: Some("readback_staging"),
            size,
            usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }
}

impl ComputeDevice for WgpuClient {
    type Config = WgpuConfig;
    type Buffer = WgpuBuffer;

    fn name() -> &'static str {
        "wgpu"
    }

    /// Request the device, install error capture and compile the kernel.
    ///
    /// Pipelines for both launch geometries (groups of 64 and of 1) are
    /// created here so that compilation failures surface at setup.
    fn open(config: &WgpuConfig) -> Result<Self> {
        let (adapter, info) = query_adapter_blocking(config)?;
        log::debug!("wgpu: selected adapter {}", info);

        let (device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some(config.label),
                    required_features: wgpu::Features::empty(),
                    required_limits: info.limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| Error::setup("request_device", format!("{e}")))?;

        let errors = ErrorSlot::default();
        errors.install(&device);

        let device = Arc::new(device);
        let queue = Arc::new(queue);

        let pipeline_cache =
            PipelineCache::new(device.clone(), &config.kernel_source, KERNEL_ENTRY_POINT);
        for size in [crate::runtime::LOCAL_GROUP_SIZE as u32, 1] {
            pipeline_cache.get_or_create_pipeline(size);
        }

        let client = Self {
            info,
            device,
            queue,
            pipeline_cache,
            errors,
        };

        client
            .wait_idle()
            .map_err(|reason| Error::setup("compile", reason))?;
        if let Some(reason) = client.errors.take() {
            return Err(Error::setup("compile", reason));
        }

        Ok(client)
    }

    fn description(&self) -> String {
        self.info.to_string()
    }

    fn allocate(&mut self, tag: &'static str, len: usize) -> Result<WgpuBuffer> {
        let max = self.info.max_buffer_elements();
        if len > max {
            return Err(Error::out_of_memory(
                tag,
                len,
                format!("exceeds device storage binding limit of {max} elements"),
            ));
        }

        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: Some(tag),
            size: storage_size(len),
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        if let Some(reason) = self.errors.take() {
            buffer.destroy();
            return Err(Error::out_of_memory(tag, len, reason));
        }

        Ok(WgpuBuffer {
            id: BUFFER_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            tag,
            len,
            raw: Arc::new(buffer),
        })
    }

    fn write(&self, dst: &WgpuBuffer, src: &[f32]) -> Completion {
        let pending = Pending::Write {
            tag: dst.tag,
            len: src.len(),
        };
        if src.len() > dst.len {
            return Completion::ready(Err(pending.error(format!(
                "source of {} elements exceeds buffer capacity {}",
                src.len(),
                dst.len
            ))));
        }

        if !src.is_empty() {
            self.queue
                .write_buffer(&dst.raw, 0, bytemuck::cast_slice(src));
        }
        // Flush the staged write so the queue callback tracks it.
        self.queue.submit(std::iter::empty());
        self.completion(pending)
    }

    fn dispatch(
        &self,
        xout: &WgpuBuffer,
        x: &WgpuBuffer,
        w: &WgpuBuffer,
        n: usize,
        d: usize,
        geometry: LaunchGeometry,
    ) -> Completion {
        let pending = Pending::Kernel { n, d };
        let max_groups = self.info.max_workgroups();
        if geometry.global_size > max_groups {
            return Completion::ready(Err(pending.error(format!(
                "{} work groups exceed the device limit of {} per dispatch",
                geometry.global_size, max_groups
            ))));
        }
        let (Ok(n32), Ok(d32)) = (u32::try_from(n), u32::try_from(d)) else {
            return Completion::ready(Err(pending.error("dimensions exceed u32 range")));
        };

        launch_matmul(
            &self.pipeline_cache,
            &self.device,
            &self.queue,
            &xout.raw,
            &x.raw,
            &w.raw,
            MatmulParams::new(n32, d32),
            geometry,
        );
        self.completion(pending)
    }

    fn read(&self, src: &WgpuBuffer, dst: &mut [f32]) -> Result<()> {
        if dst.is_empty() {
            return Ok(());
        }
        let (tag, len) = (src.tag, dst.len());
        let read_error = move |reason: String| Error::transfer("read", tag, len, reason);
        if len > src.len {
            return Err(read_error(format!(
                "destination of {} elements exceeds buffer capacity {}",
                len, src.len
            )));
        }

        let size = (len * std::mem::size_of::<f32>()) as u64;
        let staging = self.create_staging_buffer(size);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(&src.raw, 0, &staging, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wait_idle().map_err(&read_error)?;

        // Check map_async result
        let map_result = receiver
            .recv()
            .map_err(|_| read_error("map_async callback was not invoked".into()))?;
        map_result.map_err(|e| read_error(format!("map_async failed: {e}")))?;
        if let Some(reason) = self.errors.take() {
            return Err(read_error(reason));
        }

        {
            let data = slice.get_mapped_range();
            dst.copy_from_slice(bytemuck::cast_slice(&data[..]));
        }

        staging.unmap();
        Ok(())
    }

    fn free(&mut self, buffer: WgpuBuffer) -> Result<()> {
        buffer.raw.destroy();
        match self.errors.take() {
            Some(reason) => Err(Error::release(
                format!("buffer '{}' ({} elements)", buffer.tag, buffer.len),
                reason,
            )),
            None => Ok(()),
        }
    }

    fn release(self) -> Result<()> {
        let idle = self.wait_idle();
        let pending = self.errors.take();
        self.device.destroy();
        log::debug!("wgpu: released device {}", self.info);

        idle.map_err(|reason| Error::release("wgpu device", reason))?;
        match pending {
            Some(reason) => Err(Error::release("wgpu device", reason)),
            None => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
