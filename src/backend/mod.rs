//! Matrix-vector multiply backends
//!
//! The inference loop depends only on the [`Backend`] trait: it calls
//! `setup_context` once, `matmul` once per weight matrix per layer per
//! forward step, and `release` once at shutdown.
//!
//! - [`CpuBackend`]: synchronous reference implementation, the correctness oracle
//! - [`GpuBackend`]: cached device buffers, asynchronous transfers and kernel dispatch

pub mod cpu;
pub mod gpu;

pub use cpu::CpuBackend;
pub use gpu::GpuBackend;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Capability interface implemented identically by every execution strategy.
///
/// # Lifecycle
///
/// Backends are constructed empty. `setup_context` acquires device state,
/// `release` frees it. `matmul` must only be called in between.
pub trait Backend: Send {
    /// Human-readable backend name
    fn name(&self) -> &'static str;

    /// Acquire the compute device and compile the kernel.
    ///
    /// Failure is fatal: abort startup rather than retrying.
    fn setup_context(&mut self) -> Result<()>;

    /// Compute `xout[i] = sum_j w[i*n + j] * x[j]` for `i` in `0..d`.
    ///
    /// `w` is row-major: row `i` occupies `w[i*n .. i*n + n]`. Requires
    /// `xout.len() == d`, `x.len() == n` and `w.len() == n * d`; violations
    /// are rejected before any device work.
    fn matmul(&mut self, xout: &mut [f32], x: &[f32], w: &[f32], n: usize, d: usize)
    -> Result<()>;

    /// Free every device resource. Call exactly once at shutdown.
    fn release(&mut self) -> Result<()>;
}

/// Check the slice lengths of a matmul call against its dimensions.
pub fn validate_matmul_args(
    xout: &[f32],
    x: &[f32],
    w: &[f32],
    n: usize,
    d: usize,
) -> Result<()> {
    if xout.len() != d {
        return Err(Error::length_mismatch("matmul", "xout", d, xout.len()));
    }
    if x.len() != n {
        return Err(Error::length_mismatch("matmul", "x", n, x.len()));
    }
    let weights = n
        .checked_mul(d)
        .ok_or(Error::DimensionOverflow { op: "matmul", n, d })?;
    if w.len() != weights {
        return Err(Error::length_mismatch("matmul", "w", weights, w.len()));
    }
    Ok(())
}

/// Backend variants selectable at startup
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum BackendKind {
    /// Host reference implementation
    #[default]
    Cpu,
    /// WebGPU device (requires the `wgpu` feature)
    Wgpu,
}

impl BackendKind {
    /// Canonical name
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Wgpu => "wgpu",
        }
    }

    /// Whether this variant is compiled into the current build
    pub fn is_compiled(&self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Wgpu => cfg!(feature = "wgpu"),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cpu" => Ok(Self::Cpu),
            "gpu" | "wgpu" | "webgpu" => Ok(Self::Wgpu),
            other => Err(format!(
                "unknown backend '{other}', expected one of: cpu, gpu, wgpu"
            )),
        }
    }
}

/// Construct an empty backend of the given kind.
///
/// The returned backend still needs `setup_context`.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn Backend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(CpuBackend::new())),
        #[cfg(feature = "wgpu")]
        BackendKind::Wgpu => Ok(Box::new(crate::runtime::wgpu::WgpuBackend::default())),
        #[cfg(not(feature = "wgpu"))]
        BackendKind::Wgpu => Err(Error::BackendUnavailable {
            backend: "wgpu",
            feature: "wgpu",
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_validate_accepts_matching_lengths() {
        assert!(validate_matmul_args(&[0.0; 2], &[0.0; 4], &[0.0; 8], 4, 2).is_ok());
        assert!(validate_matmul_args(&[], &[0.0; 3], &[], 3, 0).is_ok());
    }

    #[test]
    fn test_validate_rejects_xout_mismatch() {
        for d in [0usize, 1, 5] {
            let xout = vec![0.0; d + 1];
            let w = vec![0.0; 2 * d];
            let err = validate_matmul_args(&xout, &[0.0; 2], &w, 2, d).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
            assert!(err.to_string().contains("xout"));
        }
    }

    #[test]
    fn test_validate_rejects_x_and_w_mismatch() {
        let err = validate_matmul_args(&[0.0; 2], &[0.0; 3], &[0.0; 8], 4, 2).unwrap_err();
        assert!(err.to_string().contains("'x'"));
        let err = validate_matmul_args(&[0.0; 2], &[0.0; 4], &[0.0; 7], 4, 2).unwrap_err();
        assert!(err.to_string().contains("'w'"));
    }

    #[test]
    fn test_validate_checks_xout_first() {
        let err = validate_matmul_args(&[], &[], &[], usize::MAX, 2).unwrap_err();
        assert!(err.to_string().contains("xout"));
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("cpu".parse::<BackendKind>(), Ok(BackendKind::Cpu));
        assert_eq!(" GPU ".parse::<BackendKind>(), Ok(BackendKind::Wgpu));
        assert_eq!("wgpu".parse::<BackendKind>(), Ok(BackendKind::Wgpu));
        assert!("cuda".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Wgpu.to_string(), "wgpu");
    }

    #[test]
    fn test_create_cpu_backend() {
        let mut backend = create_backend(BackendKind::Cpu).unwrap();
        assert_eq!(backend.name(), "cpu");
        backend.setup_context().unwrap();
        let mut xout = [0.0f32; 2];
        backend
            .matmul(&mut xout, &[1.0; 4], &[1., 2., 3., 4., 5., 6., 7., 8.], 4, 2)
            .unwrap();
        assert_eq!(xout, [10.0, 26.0]);
        backend.release().unwrap();
    }

    #[cfg(not(feature = "wgpu"))]
    #[test]
    fn test_create_wgpu_backend_without_feature() {
        let err = create_backend(BackendKind::Wgpu).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Setup);
    }
}
