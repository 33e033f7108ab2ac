// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The GPU backend: a single wgpu compute dispatch per render.
//!
//! The sample grid is uploaded as a read-only storage buffer, the
//! iteration cap and grid size travel in a uniform, and the kernel
//! writes a count and a squared modulus per pixel into two output
//! buffers.  Those are copied into mappable staging buffers and read
//! back in the same row-major layout the CPU backend produces.
//!
//! Double precision needs the adapter to offer `SHADER_F64`.  Without
//! it, or without any adapter at all, construction fails with
//! `BackendUnavailable`.

use bytemuck::{Pod, Zeroable};
use log::{debug, error, info};
use num::traits::AsPrimitive;
use std::mem;
use std::sync::mpsc;
use std::time::Instant;
use wgpu::util::DeviceExt;

use crate::config::Precision;
use crate::engine::{Backend, CancelFlag};
use crate::errors::{Error, Result};
use crate::escape::{IterationResult, Real};
use crate::grid::ResultGrid;
use crate::planes::SampleGrid;

const KERNEL: &str = include_str!("shaders/escape.wgsl");

/// Must agree with `@workgroup_size` in the kernel.
const WORKGROUP_SIZE: u32 = 64;

/// The scalar type the kernel computes in, and its typed constants.
fn scalar(precision: Precision) -> (&'static str, &'static str) {
    match precision {
        Precision::Single => ("f32", "f"),
        Precision::Double => ("f64", "lf"),
    }
}

/// The kernel text for a precision.  WGSL type aliases cannot stand in
/// as a vector component type, so the scalar type is written into the
/// source directly.
pub(crate) fn kernel_source(precision: Precision) -> String {
    let (real, suffix) = scalar(precision);
    format!(
        "const ZERO: {real} = 0.0{suffix};\n\
         const TWO: {real} = 2.0{suffix};\n\
         const BAILOUT: {real} = 4.0{suffix};\n\n{kernel}",
        real = real,
        suffix = suffix,
        kernel = KERNEL.replace("REAL", real)
    )
}

/// The uniform block the kernel reads.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct Params {
    width: u32,
    height: u32,
    max_iter: u32,
    pixels: u32,
}

/// The reason given when no adapter could be found at all.
pub const NO_ADAPTER: &str = "no compatible adapter found";

/// The reason given when the adapter cannot run a double precision
/// kernel.
pub const NO_SHADER_F64: &str = "double precision shaders are not supported";

fn unavailable<S: Into<String>>(reason: S) -> Error {
    Error::backend_unavailable("gpu", reason)
}

/// Renders with a wgpu compute pipeline.  Built once and reused; the
/// device, queue and pipeline live as long as the backend does.
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    precision: Precision,
    adapter_name: String,
    limits: wgpu::Limits,
}

impl GpuBackend {
    /// Find an adapter, open a device, and compile the kernel for the
    /// requested precision.
    pub fn new(precision: Precision) -> Result<Self> {
        pollster::block_on(GpuBackend::init(precision))
    }

    async fn init(precision: Precision) -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::PRIMARY),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| unavailable(NO_ADAPTER))?;

        let info = adapter.get_info();
        info!(
            "gpu: using {} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );

        let mut required_features = wgpu::Features::empty();
        if precision == Precision::Double {
            if !adapter.features().contains(wgpu::Features::SHADER_F64) {
                return Err(unavailable(format!("{}: {}", info.name, NO_SHADER_F64)));
            }
            required_features |= wgpu::Features::SHADER_F64;
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Escape Time Device"),
                    required_features,
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| unavailable(format!("device request failed: {}", e)))?;

        device.on_uncaptured_error(Box::new(|e: wgpu::Error| error!("gpu: {}", e)));

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let source = kernel_source(precision);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Escape Time Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Escape Time Pipeline"),
            layout: None,
            module: &shader,
            entry_point: "main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        if let Some(e) = device.pop_error_scope().await {
            return Err(unavailable(format!("kernel failed to compile: {}", e)));
        }

        let limits = device.limits();
        Ok(GpuBackend {
            device,
            queue,
            pipeline,
            precision,
            adapter_name: info.name,
            limits,
        })
    }

    /// Name of the adapter the device was opened on.
    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Precision the kernel was compiled for.
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// How many workgroups to launch for a grid.  One invocation per
    /// pixel, unless that would exceed what a single dimension of a
    /// dispatch allows; the kernel strides over the rest.
    fn workgroups(&self, pixels: u32) -> u32 {
        let wanted = (pixels + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
        wanted
            .min(self.limits.max_compute_workgroups_per_dimension)
            .max(1)
    }

    fn check_fits(&self, pixels: usize, sample_size: usize) -> Result<u32> {
        let largest = (pixels * sample_size) as u64;
        let cap = u64::from(self.limits.max_storage_buffer_binding_size)
            .min(self.limits.max_buffer_size);
        if largest > cap || pixels > u32::max_value() as usize {
            return Err(unavailable(format!(
                "a grid of {} pixels needs {} bytes per buffer, the device allows {}",
                pixels, largest, cap
            )));
        }
        Ok(pixels as u32)
    }

    fn dispatch<R>(
        &self,
        grid: &SampleGrid,
        max_iter: u32,
        cancel: &CancelFlag,
    ) -> Result<ResultGrid>
    where
        R: Real + Pod,
        f64: AsPrimitive<R>,
    {
        let pixels = self.check_fits(grid.len(), mem::size_of::<[R; 2]>())?;

        let samples: Vec<[R; 2]> = grid
            .points()
            .iter()
            .map(|c| [AsPrimitive::<R>::as_(c.re), AsPrimitive::<R>::as_(c.im)])
            .collect();
        let params = Params {
            width: grid.width() as u32,
            height: grid.height() as u32,
            max_iter,
            pixels,
        };

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Params Buffer"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let sample_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Sample Buffer"),
                contents: bytemuck::cast_slice(&samples),
                usage: wgpu::BufferUsages::STORAGE,
            });

        let count_size = (grid.len() * mem::size_of::<u32>()) as u64;
        let modulus_size = (grid.len() * mem::size_of::<R>()) as u64;
        let output = |label, size| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        };
        let staging = |label, size| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let count_buffer = output("Count Buffer", count_size);
        let modulus_buffer = output("Modulus Buffer", modulus_size);
        let count_staging = staging("Count Staging Buffer", count_size);
        let modulus_staging = staging("Modulus Staging Buffer", modulus_size);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Escape Time Bind Group"),
            layout: &self.pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sample_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: count_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: modulus_buffer.as_entire_binding(),
                },
            ],
        });

        if cancel.is_cancelled() {
            return Err(Error::ComputationAborted);
        }

        let groups = self.workgroups(pixels);
        debug!(
            "gpu: {} pixels in {} workgroups of {}",
            pixels, groups, WORKGROUP_SIZE
        );

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Escape Time Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Escape Time Pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        encoder.copy_buffer_to_buffer(&count_buffer, 0, &count_staging, 0, count_size);
        encoder.copy_buffer_to_buffer(&modulus_buffer, 0, &modulus_staging, 0, modulus_size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let counts: Vec<u32> = self.read_back(&count_staging)?;
        let moduli: Vec<R> = self.read_back(&modulus_staging)?;

        if cancel.is_cancelled() {
            return Err(Error::ComputationAborted);
        }

        let cells = counts
            .into_iter()
            .zip(moduli.into_iter())
            .map(|(count, modulus)| {
                IterationResult::from_count(count, AsPrimitive::<f64>::as_(modulus), max_iter)
            })
            .collect();
        Ok(ResultGrid::from_cells(
            grid.width(),
            grid.height(),
            max_iter,
            cells,
        ))
    }

    /// Maps a staging buffer, waits for the device, and copies its
    /// contents out.
    fn read_back<T: Pod>(&self, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
        let slice = buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |v| {
            let _ = sender.send(v);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        receiver
            .recv()
            .map_err(|_| unavailable("device lost before readback completed"))?
            .map_err(|e| unavailable(format!("readback failed: {}", e)))?;

        let data = slice.get_mapped_range();
        let values = bytemuck::cast_slice::<u8, T>(&data).to_vec();
        drop(data);
        buffer.unmap();
        Ok(values)
    }
}

impl Backend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn compute(
        &self,
        grid: &SampleGrid,
        max_iter: u32,
        cancel: &CancelFlag,
    ) -> Result<ResultGrid> {
        if cancel.is_cancelled() {
            return Err(Error::ComputationAborted);
        }
        if max_iter == 0 {
            return Ok(ResultGrid::degenerate(grid.width(), grid.height()));
        }

        let started = Instant::now();
        let result = match self.precision {
            Precision::Single => self.dispatch::<f32>(grid, max_iter, cancel),
            Precision::Double => self.dispatch::<f64>(grid, max_iter, cancel),
        }?;
        debug!(
            "gpu: {} pixels on {} in {:?}",
            grid.len(),
            self.adapter_name,
            started.elapsed()
        );
        Ok(result)
    }
}
