//! WGSL compute pipeline infrastructure
//!
//! The kernel program is compiled once into a shader module. One compute
//! pipeline is created per work-group size, specialised through the
//! `WORKGROUP_SIZE` override constant, and cached.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, PipelineCompilationOptions, PipelineLayout,
    PipelineLayoutDescriptor, ShaderModule, ShaderModuleDescriptor, ShaderSource, ShaderStages,
};

/// Name of the override constant holding the work-group size
pub const WORKGROUP_SIZE_CONSTANT: &str = "WORKGROUP_SIZE";

// ============================================================================
// Pipeline Cache
// ============================================================================

/// Compiled kernel program plus its pipelines, keyed by work-group size
pub struct PipelineCache {
    device: Arc<Device>,
    entry_point: &'static str,
    module: ShaderModule,
    layout: BindGroupLayout,
    pipeline_layout: PipelineLayout,
    pipelines: Mutex<HashMap<u32, Arc<ComputePipeline>>>,
}

impl PipelineCache {
    /// Compile `source` and prepare the `(xout, x, w, params)` layout.
    pub fn new(device: Arc<Device>, source: &str, entry_point: &'static str) -> Self {
        let module = device.create_shader_module(ShaderModuleDescriptor {
            label: Some(entry_point),
            source: ShaderSource::Wgsl(source.into()),
        });

        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("matmul_layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, true),
                BindGroupLayoutEntry {
                    binding: 3,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("matmul_pipeline_layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0, // Not using push constants
        });

        Self {
            device,
            entry_point,
            module,
            layout,
            pipeline_layout,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the pipeline for a work-group size
    pub fn get_or_create_pipeline(&self, workgroup_size: u32) -> Arc<ComputePipeline> {
        let mut pipelines = self.pipelines.lock();
        if let Some(pipeline) = pipelines.get(&workgroup_size) {
            return pipeline.clone();
        }

        let constants = [(WORKGROUP_SIZE_CONSTANT, workgroup_size as f64)];
        let pipeline = self
            .device
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&format!("{}_wg{}", self.entry_point, workgroup_size)),
                layout: Some(&self.pipeline_layout),
                module: &self.module,
                entry_point: Some(self.entry_point),
                compilation_options: PipelineCompilationOptions {
                    constants: &constants,
                    zero_initialize_workgroup_memory: true,
                },
                cache: None,
            });

        let pipeline = Arc::new(pipeline);
        pipelines.insert(workgroup_size, pipeline.clone());
        pipeline
    }

    /// Number of compiled pipelines
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.lock().len()
    }

    /// Create a bind group from buffers, in binding order
    pub fn create_bind_group(&self, buffers: &[&Buffer]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("matmul_bind_group"),
            layout: &self.layout,
            entries: &entries,
        })
    }
}

fn storage_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
