//! Matrix-vector multiplication WGSL kernel launcher

use wgpu::util::DeviceExt;
use wgpu::{Buffer, Device, Queue, SubmissionIndex};

use super::pipeline::PipelineCache;
use crate::runtime::LaunchGeometry;

/// Uniform parameters of the `matmul` kernel (must match the shader struct)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MatmulParams {
    /// Columns of W, length of x
    pub n: u32,
    /// Rows of W, length of xout
    pub d: u32,
    /// Uniform buffers are 16-byte aligned
    pub _pad: [u32; 2],
}

impl MatmulParams {
    /// Parameters for an `n`-column, `d`-row multiply
    pub fn new(n: u32, d: u32) -> Self {
        Self { n, d, _pad: [0; 2] }
    }
}

/// Encode and submit one `matmul` launch.
///
/// Computes xout = W @ x over `geometry.global_size` work groups of
/// `geometry.local_size` invocations. Returns without waiting.
#[allow(clippy::too_many_arguments)]
pub fn launch_matmul(
    cache: &PipelineCache,
    device: &Device,
    queue: &Queue,
    xout: &Buffer,
    x: &Buffer,
    w: &Buffer,
    params: MatmulParams,
    geometry: LaunchGeometry,
) -> SubmissionIndex {
    let pipeline = cache.get_or_create_pipeline(geometry.local_size as u32);

    let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("matmul_params"),
        contents: bytemuck::bytes_of(&params),
        usage: wgpu::BufferUsages::UNIFORM,
    });

    let bind_group = cache.create_bind_group(&[xout, x, w, &params_buffer]);

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("matmul"),
    });

    {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("matmul"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, Some(&bind_group), &[]);
        if geometry.global_size > 0 {
            pass.dispatch_workgroups(geometry.global_size as u32, 1, 1);
        }
    }

    queue.submit(std::iter::once(encoder.finish()))
}
