//! WebGPU implementation of [`GraphicsBackend`].
//!
//! One pipeline per [`RenderPass`], one buffer pair per named key and a
//! per-frame ring of transform uniforms addressed with dynamic offsets. Draws
//! are queued between `begin_frame` and `end_frame` and replayed into a
//! single render pass.

use super::backend::{FrameStats, GraphicsBackend, RenderPass, check_upload};
use super::buffers::BufferRegistry;
use super::gpu_structures::TransformUniform;
use crate::domain::errors::RenderingResult;
use crate::domain::logging::{LogComponent, get_logger};
use std::collections::HashMap;

mod initialization;
mod pipelines;
mod render_loop;

pub use initialization::is_webgpu_supported;

/// Transform slots available per frame.
pub const MAX_DRAWS_PER_FRAME: u64 = 64;

/// GPU storage behind one buffer key.
pub struct GpuBuffers {
    positions: wgpu::Buffer,
    colors: wgpu::Buffer,
    indices: Option<wgpu::Buffer>,
}

struct DrawCommand {
    key: String,
    pass: RenderPass,
    slot: u32,
}

pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,

    pipelines: HashMap<RenderPass, wgpu::RenderPipeline>,
    transform_buffer: wgpu::Buffer,
    transform_bind_group: wgpu::BindGroup,
    buffers: BufferRegistry<GpuBuffers>,

    clear: wgpu::Color,
    commands: Vec<DrawCommand>,
    stats: FrameStats,
    in_frame: bool,
    released: bool,
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        self.resize_surface(css_width, css_height, device_pixel_ratio);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn begin_frame(&mut self, clear: [f64; 4]) {
        self.clear = wgpu::Color { r: clear[0], g: clear[1], b: clear[2], a: clear[3] };
        self.commands.clear();
        self.stats = FrameStats::default();
        self.in_frame = !self.released;
    }

    fn upload(
        &mut self,
        key: &str,
        positions: &[[f32; 2]],
        colors: &[[f32; 4]],
        indices: Option<&[u32]>,
    ) -> RenderingResult<()> {
        check_upload(key, positions, colors)?;
        if self.released {
            return Ok(());
        }
        self.write_buffers(key, positions, colors, indices);
        Ok(())
    }

    fn draw(&mut self, key: &str, pass: RenderPass, transform: &TransformUniform) {
        self.queue_draw(key, pass, transform);
    }

    fn end_frame(&mut self) -> RenderingResult<FrameStats> {
        self.submit_frame()
    }

    fn has_pass(&self, pass: RenderPass) -> bool {
        self.pipelines.contains_key(&pass)
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.buffers.clear(|_, gpu| {
            gpu.positions.destroy();
            gpu.colors.destroy();
            if let Some(indices) = gpu.indices {
                indices.destroy();
            }
        });
        self.transform_buffer.destroy();
        self.pipelines.clear();
        self.commands.clear();
        self.in_frame = false;
        self.released = true;
        get_logger().info(LogComponent::Infrastructure("WgpuBackend"), "GPU resources released");
    }
}

impl Drop for WgpuBackend {
    fn drop(&mut self) {
        self.release();
    }
}
