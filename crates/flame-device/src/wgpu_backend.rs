//! Real accelerator backend, built on `wgpu`. Grounded in the same
//! bind-group/buffer/compute-dispatch/async-readback shape a perturbation
//! renderer in the retrieval pack uses: recreate buffers on a capacity
//! change, upload per-flame uniforms, dispatch a compute pass per kernel,
//! and read results back through a staging buffer with `map_async`.

use std::collections::HashMap;

use flame_core::{Flame, Settings};

use crate::backend::{BatchCounters, Raster, RenderBackend};
use crate::error::DeviceError;
use crate::program::ProgramCache;
use crate::resources::{DeviceResources, RequiredCapacities};
use crate::role::BufferRole;

const WORK_ITEMS: u64 = 1 << 16;
const WORKGROUP_SIZE: u64 = 64;

/// Compiled pipeline handle cached per variation set: one shader module,
/// six compute entry points.
struct CompiledProgram {
    #[allow(dead_code)]
    module: wgpu::ShaderModule,
    bind_group_layout: wgpu::BindGroupLayout,
    pipelines: HashMap<&'static str, wgpu::ComputePipeline>,
}

/// Selects among matching devices the one maximizing
/// `max_clock_frequency * max_compute_units`, approximated here via wgpu's
/// own `HighPerformance` power-preference hint (wgpu does not expose raw
/// clock/compute-unit counts across backends).
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    resources: DeviceResources,
    buffer_handles: HashMap<BufferRole, wgpu::Buffer>,
    program: ProgramCache<CompiledProgram>,
    bind_group: Option<wgpu::BindGroup>,
    width: u32,
    height: u32,
}

impl WgpuBackend {
    /// Request an adapter of the given device type and build the backend
    /// synchronously (the worker thread is blocking by design).
    pub fn new(power_preference: wgpu::PowerPreference) -> Result<Self, DeviceError> {
        pollster::block_on(Self::new_async(power_preference))
    }

    async fn new_async(power_preference: wgpu::PowerPreference) -> Result<Self, DeviceError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("flame-device"),
                ..Default::default()
            })
            .await
            .map_err(|e| DeviceError::Unavailable(e.to_string()))?;

        Ok(WgpuBackend {
            device,
            queue,
            resources: DeviceResources::new(),
            buffer_handles: HashMap::new(),
            program: ProgramCache::new(),
            bind_group: None,
            width: 1,
            height: 1,
        })
    }

    /// Grow (or first-allocate) the buffer for `role`. Returns `true` if a
    /// new `wgpu::Buffer` was created, meaning every bind group referencing
    /// it is stale.
    fn ensure_buffer(&mut self, role: BufferRole, required_elems: u64, elem_size: u64) -> bool {
        let required_bytes = (required_elems * elem_size).max(elem_size);
        let grew = self.resources.grow(role, required_elems);
        if grew || !self.buffer_handles.contains_key(&role) {
            let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(&format!("{role:?}")),
                size: required_bytes,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            self.buffer_handles.insert(role, buffer);
            true
        } else {
            false
        }
    }

    fn rebuild_bind_group(&mut self, layout: &wgpu::BindGroupLayout) {
        let entries: Vec<wgpu::BindGroupEntry> = BufferRole::ALL
            .iter()
            .enumerate()
            .filter_map(|(i, role)| {
                self.buffer_handles.get(role).map(|buf| wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: buf.as_entire_binding(),
                })
            })
            .collect();

        self.bind_group = Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("flame-bind-group"),
            layout,
            entries: &entries,
        }));
    }

    fn dispatch(&self, pipeline: &wgpu::ComputePipeline, workgroups: u32) -> Result<(), DeviceError> {
        let bind_group = self
            .bind_group
            .as_ref()
            .ok_or_else(|| DeviceError::Launch("bind group not built".to_string()))?;

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("flame-encoder") });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("flame-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(workgroups.max(1), 1, 1);
        }
        self.queue.submit(Some(encoder.finish()));
        self.device.poll(wgpu::Maintain::Wait);
        Ok(())
    }

    fn run_kernel(&mut self, name: &'static str, total_items: u64) -> Result<(), DeviceError> {
        let workgroups = total_items.div_ceil(WORKGROUP_SIZE) as u32;
        let compiled = self
            .program
            .current_handle_mut()
            .ok_or_else(|| DeviceError::Launch(format!("no program compiled for kernel {name}")))?;
        let pipeline = compiled
            .pipelines
            .get(name)
            .ok_or_else(|| DeviceError::Launch(format!("missing kernel {name}")))?;
        self.dispatch(pipeline, workgroups)
    }

    fn read_buffer_u32(&self, role: BufferRole, len: usize) -> Result<Vec<u32>, DeviceError> {
        let source = self
            .buffer_handles
            .get(&role)
            .ok_or_else(|| DeviceError::BufferMap(format!("{role:?} not allocated")))?;
        let byte_len = (len * std::mem::size_of::<u32>()) as u64;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("flame-staging"),
            size: byte_len,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("flame-readback") });
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, byte_len);
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| DeviceError::BufferMap(e.to_string()))?
            .map_err(|e| DeviceError::BufferMap(e.to_string()))?;

        let data = slice.get_mapped_range();
        let values: Vec<u32> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        Ok(values)
    }

    fn read_raster(&self, role: BufferRole) -> Result<Raster, DeviceError> {
        let pixel_count = (self.width as usize) * (self.height as usize);
        let pixels = self.read_buffer_u32(role, pixel_count)?;
        Ok(Raster { width: self.width, height: self.height, pixels })
    }
}

impl RenderBackend for WgpuBackend {
    fn init_resources(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    fn free_resources(&mut self) -> Result<(), DeviceError> {
        self.program.release(|_| {});
        self.buffer_handles.clear();
        self.bind_group = None;
        self.resources.clear();
        Ok(())
    }

    fn prepare(&mut self, settings: &Settings, flame: &Flame) -> Result<(), DeviceError> {
        self.width = settings.width();
        self.height = settings.height();

        let req = RequiredCapacities::for_flame(settings, flame, WORK_ITEMS);
        let mut any_growth = false;
        for role in BufferRole::ALL {
            let elem_size = match role {
                BufferRole::Histogram => std::mem::size_of::<f32>() as u64,
                _ => std::mem::size_of::<u32>() as u64,
            };
            any_growth |= self.ensure_buffer(*role, req.for_role(*role), elem_size);
        }

        let device = &self.device;
        let was_empty = self.program.is_empty();
        self.program.get_or_compile(
            settings,
            flame,
            |program| {
                let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some("flame-kernels"),
                    source: wgpu::ShaderSource::Wgsl(program.source.clone().into()),
                });
                let bind_group_layout =
                    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("flame-layout"),
                        entries: &bind_group_layout_entries(),
                    });
                let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("flame-pipeline-layout"),
                    bind_group_layouts: &[&bind_group_layout],
                    push_constant_ranges: &[],
                });
                let mut pipelines = HashMap::new();
                for entry in ["init", "warmup", "plot", "preview", "finish1", "finish2"] {
                    pipelines.insert(
                        entry,
                        device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                            label: Some(entry),
                            layout: Some(&pipeline_layout),
                            module: &module,
                            entry_point: Some(entry),
                            compilation_options: Default::default(),
                            cache: None,
                        }),
                    );
                }
                Ok(CompiledProgram { module, bind_group_layout, pipelines })
            },
            |_| {},
        )?;
        let recompiled = was_empty || self.program.current_set() != Some(&flame.variation_set());

        if any_growth || recompiled || self.bind_group.is_none() {
            let layout = self
                .program
                .current_handle_mut()
                .map(|compiled| compiled.bind_group_layout.clone());
            if let Some(layout) = layout {
                self.rebuild_bind_group(&layout);
            }
        }

        Ok(())
    }

    fn launch_init(&mut self) -> Result<(), DeviceError> {
        self.run_kernel("init", WORK_ITEMS)
    }

    fn launch_warmup(&mut self) -> Result<(), DeviceError> {
        self.run_kernel("warmup", WORK_ITEMS)
    }

    fn launch_plot(&mut self, batch_size: u32) -> Result<BatchCounters, DeviceError> {
        let _ = batch_size;
        self.run_kernel("plot", WORK_ITEMS)?;
        let raw = self.read_buffer_u32(BufferRole::HitCounters, 2)?;
        Ok(BatchCounters {
            total_hits: raw.first().copied().unwrap_or(0) as i32,
            pixel_hits: raw.get(1).copied().unwrap_or(0) as i32,
        })
    }

    fn launch_preview(&mut self) -> Result<Raster, DeviceError> {
        self.run_kernel("preview", (self.width as u64) * (self.height as u64))?;
        self.read_raster(BufferRole::FinalRaster)
    }

    fn launch_finish(&mut self, settings: &Settings) -> Result<Raster, DeviceError> {
        let pixels = (self.width as u64) * (self.height as u64);
        self.run_kernel("finish1", pixels)?;
        if settings.use_blur() {
            self.run_kernel("finish2", pixels)?;
        }
        self.read_raster(BufferRole::FinalRaster)
    }
}

fn bind_group_layout_entries() -> Vec<wgpu::BindGroupLayoutEntry> {
    BufferRole::ALL
        .iter()
        .enumerate()
        .map(|(i, _)| wgpu::BindGroupLayoutEntry {
            binding: i as u32,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect()
}
