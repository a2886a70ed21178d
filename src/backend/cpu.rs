//! CPU reference backend
//!
//! Direct, synchronous multiply over host memory. Each row is accumulated
//! sequentially in IEEE-754 single precision; this summation order is the
//! oracle the GPU backend is validated against.

use super::{Backend, validate_matmul_args};
use crate::error::Result;

/// Host reference implementation of [`Backend`].
///
/// Holds no device state; setup and release are no-ops.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuBackend;

impl CpuBackend {
    /// Create a CPU backend
    pub fn new() -> Self {
        Self
    }
}

/// One output row: `sum_j row[j] * x[j]`, summed left to right.
#[inline]
fn dot_row(row: &[f32], x: &[f32]) -> f32 {
    let mut val = 0.0f32;
    for (w, x) in row.iter().zip(x) {
        val += w * x;
    }
    val
}

/// Reference matmul kernel. Lengths must already be validated.
///
/// With the `rayon` feature rows are computed in parallel; each row keeps the
/// same sequential summation order.
pub fn matmul_kernel(xout: &mut [f32], x: &[f32], w: &[f32], n: usize) {
    if n == 0 {
        xout.fill(0.0);
        return;
    }

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;
        xout.par_iter_mut()
            .zip(w.par_chunks_exact(n))
            .for_each(|(out, row)| *out = dot_row(row, x));
    }

    #[cfg(not(feature = "rayon"))]
    for (out, row) in xout.iter_mut().zip(w.chunks_exact(n)) {
        *out = dot_row(row, x);
    }
}

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn setup_context(&mut self) -> Result<()> {
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
        matmul_kernel(xout, x, w, n);
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn run(x: &[f32], w: &[f32], n: usize, d: usize) -> Vec<f32> {
        let mut backend = CpuBackend::new();
        backend.setup_context().unwrap();
        let mut xout = vec![f32::NAN; d];
        backend.matmul(&mut xout, x, w, n, d).unwrap();
        backend.release().unwrap();
        xout
    }

    #[test]
    fn test_cpu_matmul_row_sums() {
        let w = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert_eq!(run(&[1.0; 4], &w, 4, 2), vec![10.0, 26.0]);
    }

    #[test]
    fn test_cpu_matmul_identity_and_sum_row() {
        let w = [1.0, 0.0, 0.0, 1.0, 2.0, 2.0];
        assert_eq!(run(&[3.0, 4.0], &w, 2, 3), vec![3.0, 4.0, 14.0]);
    }

    #[test]
    fn test_cpu_matmul_empty_dimensions() {
        assert!(run(&[1.0, 2.0], &[], 2, 0).is_empty());
        assert_eq!(run(&[], &[], 0, 3), vec![0.0; 3]);
    }

    #[test]
    fn test_cpu_matmul_overwrites_output() {
        let mut backend = CpuBackend::new();
        let mut xout = vec![100.0f32; 2];
        backend
            .matmul(&mut xout, &[1.0, 1.0], &[1.0, 1.0, 2.0, 2.0], 2, 2)
            .unwrap();
        assert_eq!(xout, vec![2.0, 4.0]);
    }

    #[test]
    fn test_cpu_matmul_sequential_summation_order() {
        // (1e8 + 1) - 1e8 in f32 is 0 when summed left to right.
        let w = [1.0e8, 1.0, -1.0e8];
        let got = run(&[1.0; 3], &w, 3, 1);
        let expected = (1.0e8f32 + 1.0f32) + -1.0e8f32;
        assert_eq!(got[0], expected);
    }

    #[test]
    fn test_cpu_matmul_rejects_bad_output_length() {
        let mut backend = CpuBackend::new();
        let mut xout = vec![0.0f32; 3];
        let err = backend
            .matmul(&mut xout, &[1.0; 4], &[0.0; 8], 4, 2)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(xout, vec![0.0; 3]);
    }
}
