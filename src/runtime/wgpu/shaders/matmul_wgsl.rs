//! WGSL shader source code for matrix-vector multiplication
//!
//! One invocation per output row. The work-group size is an override
//! constant so the same module serves both launch geometries.

/// Matrix-vector multiplication shader module source (F32 only)
///
/// Exports `matmul` with bindings `(xout, x, w, params)`.
pub const MATMUL_SHADER: &str = r#"
// ============================================================================
// Workgroup Configuration
// ============================================================================

// Set per pipeline: 64 when d is a multiple of 64, 1 otherwise
override WORKGROUP_SIZE: u32 = 64u;

// ============================================================================
// Parameters
// ============================================================================

struct MatmulParams {
    n: u32,     // Columns of W, length of x
    d: u32,     // Rows of W, length of xout
    _pad0: u32,
    _pad1: u32,
}

@group(0) @binding(0) var<storage, read_write> xout: array<f32>;
@group(0) @binding(1) var<storage, read> x: array<f32>;
@group(0) @binding(2) var<storage, read> w: array<f32>;
@group(0) @binding(3) var<uniform> params: MatmulParams;

// ============================================================================
// xout = W @ x
// ============================================================================

// W is row-major: row i occupies w[i*n .. i*n + n].
// Each row is accumulated left to right, like the host reference.

@compute @workgroup_size(WORKGROUP_SIZE)
fn matmul(@builtin(global_invocation_id) global_id: vec3<u32>) {
    let i = global_id.x;
    if (i >= params.d) {
        return;
    }

    let n = params.n;
    let row = i * n;

    var val: f32 = 0.0;
    for (var j: u32 = 0u; j < n; j = j + 1u) {
        val = val + w[row + j] * x[j];
    }

    xout[i] = val;
}
"#;
