//! Common test utilities
#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use accelerated::backend::GpuBackend;
use accelerated::error::{Error, Result};
use accelerated::runtime::completion::{self, Completion};
use accelerated::runtime::{ComputeDevice, DeviceBuffer, LaunchGeometry};

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Deterministic pseudo-random values in [-1, 1)
pub fn test_values(len: usize, seed: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (((i * 7919 + seed * 104_729) % 2000) as f32 / 1000.0) - 1.0)
        .collect()
}

// ============================================================================
// Host-emulated compute device
// ============================================================================

/// Something the emulated device did, in the order it happened
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    WriteStarted(&'static str),
    WriteFinished(&'static str),
    DispatchStarted(LaunchGeometry),
    DispatchFinished,
    Read(&'static str),
    Freed(&'static str, usize),
    Released,
}

/// Counters shared between a test and the device it configured
#[derive(Default)]
pub struct HostStats {
    pub allocations: AtomicUsize,
    pub frees: AtomicUsize,
    pub dispatches: AtomicUsize,
    pub released: AtomicBool,
    pub events: Mutex<Vec<Event>>,
}

impl HostStats {
    pub fn live_buffers(&self) -> usize {
        self.allocations.load(Ordering::SeqCst) - self.frees.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    fn record(&self, event: Event) {
        self.events.lock().push(event);
    }
}

/// Faults and delays injected into the emulated device
#[derive(Clone, Default)]
pub struct HostConfig {
    /// Per-tag delay before a write lands in device memory
    pub write_delays: Vec<(&'static str, Duration)>,
    /// Writes to this tag fail
    pub fail_write: Option<&'static str>,
    /// Allocations of this tag fail
    pub fail_alloc: Option<&'static str>,
    /// Freeing buffers of this tag fails
    pub fail_free: Option<&'static str>,
    /// Every kernel launch fails
    pub fail_dispatch: bool,
    /// Opening the device fails
    pub fail_open: bool,
    /// Releasing the device fails
    pub fail_release: bool,
    pub stats: Arc<HostStats>,
}

impl HostConfig {
    pub fn delay_write(mut self, tag: &'static str, delay: Duration) -> Self {
        self.write_delays.push((tag, delay));
        self
    }

    fn write_delay(&self, tag: &str) -> Option<Duration> {
        self.write_delays
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, delay)| *delay)
    }
}

static HOST_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Buffer in host memory standing in for device memory
#[derive(Clone)]
pub struct HostBuffer {
    id: u64,
    tag: &'static str,
    data: Arc<Mutex<Vec<f32>>>,
}

impl HostBuffer {
    pub fn snapshot(&self) -> Vec<f32> {
        self.data.lock().clone()
    }
}

impl DeviceBuffer for HostBuffer {
    fn id(&self) -> u64 {
        self.id
    }

    fn tag(&self) -> &'static str {
        self.tag
    }

    fn len(&self) -> usize {
        self.data.lock().len()
    }
}

/// Compute device that runs transfers and kernels on background threads.
///
/// The kernel honours the launch geometry: row `g * local + l` is computed
/// by work item `l` of group `g`, reading whatever the input buffers hold
/// at that moment.
pub struct HostDevice {
    config: HostConfig,
}

impl ComputeDevice for HostDevice {
    type Config = HostConfig;
    type Buffer = HostBuffer;

    fn name() -> &'static str {
        "host"
    }

    fn open(config: &HostConfig) -> Result<Self> {
        if config.fail_open {
            return Err(Error::NoDevice {
                reason: "no emulated adapter".into(),
            });
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    fn allocate(&mut self, tag: &'static str, len: usize) -> Result<HostBuffer> {
        if self.config.fail_alloc == Some(tag) {
            return Err(Error::out_of_memory(tag, len, "injected allocation failure"));
        }
        self.config.stats.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(HostBuffer {
            id: HOST_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            tag,
            data: Arc::new(Mutex::new(vec![0.0; len])),
        })
    }

    fn write(&self, dst: &HostBuffer, src: &[f32]) -> Completion {
        let tag = dst.tag;
        let lost = Error::transfer("write", tag, src.len(), "write thread vanished");
        let (signal, completion) = completion::signal(lost);

        let data = dst.data.clone();
        let src = src.to_vec();
        let delay = self.config.write_delay(tag);
        let fail = self.config.fail_write == Some(tag);
        let stats = self.config.stats.clone();

        stats.record(Event::WriteStarted(tag));
        thread::spawn(move || {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            if fail {
                signal.complete(Err(Error::transfer(
                    "write",
                    tag,
                    src.len(),
                    "injected transfer failure",
                )));
                return;
            }
            data.lock()[..src.len()].copy_from_slice(&src);
            stats.record(Event::WriteFinished(tag));
            signal.complete(Ok(()));
        });
        completion
    }

    fn dispatch(
        &self,
        xout: &HostBuffer,
        x: &HostBuffer,
        w: &HostBuffer,
        n: usize,
        d: usize,
        geometry: LaunchGeometry,
    ) -> Completion {
        let lost = Error::compute("matmul", n, d, "kernel thread vanished");
        let (signal, completion) = completion::signal(lost);
        let stats = self.config.stats.clone();
        stats.dispatches.fetch_add(1, Ordering::SeqCst);
        stats.record(Event::DispatchStarted(geometry));

        if self.config.fail_dispatch {
            signal.complete(Err(Error::compute(
                "matmul",
                n,
                d,
                "injected kernel failure",
            )));
            return completion;
        }

        let (xout, x, w) = (xout.data.clone(), x.data.clone(), w.data.clone());
        thread::spawn(move || {
            let x = x.lock().clone();
            let w = w.lock().clone();
            let mut out = xout.lock();
            let mut covered = vec![0usize; d];
            for group in 0..geometry.global_size {
                for item in 0..geometry.local_size {
                    let i = group * geometry.local_size + item;
                    if i >= d {
                        continue;
                    }
                    covered[i] += 1;
                    let mut val = 0.0f32;
                    for j in 0..n {
                        val += w[i * n + j] * x[j];
                    }
                    out[i] = val;
                }
            }
            drop(out);
            if let Some(row) = covered.iter().position(|&c| c != 1) {
                signal.complete(Err(Error::compute(
                    "matmul",
                    n,
                    d,
                    format!("row {row} covered {} times", covered[row]),
                )));
                return;
            }
            stats.record(Event::DispatchFinished);
            signal.complete(Ok(()));
        });
        completion
    }

    fn read(&self, src: &HostBuffer, dst: &mut [f32]) -> Result<()> {
        self.config.stats.record(Event::Read(src.tag));
        let data = src.data.lock();
        dst.copy_from_slice(&data[..dst.len()]);
        Ok(())
    }

    fn free(&mut self, buffer: HostBuffer) -> Result<()> {
        let stats = &self.config.stats;
        stats.record(Event::Freed(buffer.tag, buffer.len()));
        if self.config.fail_free == Some(buffer.tag) {
            return Err(Error::release(
                format!("buffer '{}'", buffer.tag),
                "injected free failure",
            ));
        }
        stats.frees.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(self) -> Result<()> {
        let stats = &self.config.stats;
        stats.record(Event::Released);
        stats.released.store(true, Ordering::SeqCst);
        if self.config.fail_release {
            return Err(Error::release("host device", "injected release failure"));
        }
        Ok(())
    }
}

/// GPU backend over the emulated device, already set up
pub fn host_backend(config: HostConfig) -> GpuBackend<HostDevice> {
    use accelerated::backend::Backend;
    let mut backend = GpuBackend::new(config);
    backend
        .setup_context()
        .expect("host device setup cannot fail without injection");
    backend
}

/// Create a set-up WebGPU backend, returning None if WebGPU is unavailable
#[cfg(feature = "wgpu")]
pub fn create_wgpu_backend() -> Option<accelerated::runtime::wgpu::WgpuBackend> {
    use accelerated::backend::Backend;
    if !accelerated::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    let mut backend = accelerated::runtime::wgpu::WgpuBackend::default();
    backend.setup_context().ok()?;
    Some(backend)
}
