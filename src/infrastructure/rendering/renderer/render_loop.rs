use super::{DrawCommand, GpuBuffers, MAX_DRAWS_PER_FRAME, WgpuBackend};
use crate::domain::errors::{RenderingError, RenderingResult};
use crate::domain::logging::{LogComponent, get_logger};
use crate::infrastructure::rendering::backend::{FrameStats, RenderPass};
use crate::infrastructure::rendering::gpu_structures::{TRANSFORM_SLOT_STRIDE, TransformUniform};
use crate::{log_trace, log_warn};

const POSITION_STRIDE: u64 = 8;
const COLOR_STRIDE: u64 = 16;
const INDEX_STRIDE: u64 = 4;

fn vertex_buffer(device: &wgpu::Device, label: String, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(&label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl WgpuBackend {
    pub(super) fn write_buffers(
        &mut self,
        key: &str,
        positions: &[[f32; 2]],
        colors: &[[f32; 4]],
        indices: Option<&[u32]>,
    ) {
        let device = &self.device;
        let index_len = indices.map_or(0, <[u32]>::len);
        let (slot, fresh) = self.buffers.ensure(key, positions.len(), index_len, |vertex_capacity, index_capacity| {
            GpuBuffers {
                positions: vertex_buffer(device, format!("{key} positions"), vertex_capacity as u64 * POSITION_STRIDE),
                colors: vertex_buffer(device, format!("{key} colors"), vertex_capacity as u64 * COLOR_STRIDE),
                indices: (index_capacity > 0).then(|| {
                    device.create_buffer(&wgpu::BufferDescriptor {
                        label: Some(&format!("{key} indices")),
                        size: index_capacity as u64 * INDEX_STRIDE,
                        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                        mapped_at_creation: false,
                    })
                }),
            }
        });
        if fresh {
            log_trace!(
                LogComponent::Infrastructure("WgpuBackend"),
                "allocated {} for {} vertices / {} indices",
                key,
                slot.vertex_capacity,
                slot.index_capacity
            );
        }
        let Some(gpu) = slot.storage.as_ref() else {
            return;
        };

        if !positions.is_empty() {
            self.queue.write_buffer(&gpu.positions, 0, bytemuck::cast_slice(positions));
            self.queue.write_buffer(&gpu.colors, 0, bytemuck::cast_slice(colors));
        }
        if let (Some(buffer), Some(indices)) = (gpu.indices.as_ref(), indices)
            && !indices.is_empty()
        {
            self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(indices));
        }
        self.stats.account_upload(positions.len(), index_len);
    }

    pub(super) fn queue_draw(&mut self, key: &str, pass: RenderPass, transform: &TransformUniform) {
        if !self.in_frame {
            return;
        }
        if !self.pipelines.contains_key(&pass) {
            log_trace!(LogComponent::Infrastructure("WgpuBackend"), "pass {} unavailable, skipping {}", pass, key);
            return;
        }
        let Some(slot) = self.buffers.get(key) else {
            log_warn!(LogComponent::Infrastructure("WgpuBackend"), "draw of unknown buffer '{}'", key);
            return;
        };
        if slot.vertex_count == 0 || (pass.is_indexed() && slot.index_count == 0) {
            return;
        }
        let slot_index = self.commands.len() as u64;
        if slot_index >= MAX_DRAWS_PER_FRAME {
            log_warn!(LogComponent::Infrastructure("WgpuBackend"), "draw limit reached, dropping {}", key);
            return;
        }
        self.queue.write_buffer(
            &self.transform_buffer,
            slot_index * TRANSFORM_SLOT_STRIDE,
            bytemuck::bytes_of(transform),
        );
        self.stats.account_draw(pass, slot.vertex_count, slot.index_count);
        self.commands.push(DrawCommand { key: key.to_string(), pass, slot: slot_index as u32 });
    }

    pub(super) fn submit_frame(&mut self) -> RenderingResult<FrameStats> {
        if !std::mem::take(&mut self.in_frame) {
            return Ok(FrameStats::default());
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                self.surface.configure(&self.device, &self.config);
                self.commands.clear();
                return Err(RenderingError::SurfaceTexture(err.to_string()).into());
            }
            Err(err) => {
                self.commands.clear();
                return Err(RenderingError::SurfaceTexture(err.to_string()).into());
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Chart Encoder") });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Chart Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Clear(self.clear), store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for command in &self.commands {
                let (Some(pipeline), Some(slot)) = (self.pipelines.get(&command.pass), self.buffers.get(&command.key))
                else {
                    continue;
                };
                let Some(gpu) = slot.storage.as_ref() else {
                    continue;
                };
                render_pass.set_pipeline(pipeline);
                render_pass.set_bind_group(
                    0,
                    &self.transform_bind_group,
                    &[(command.slot as u64 * TRANSFORM_SLOT_STRIDE) as u32],
                );
                let vertices = slot.vertex_count as u64;
                render_pass.set_vertex_buffer(0, gpu.positions.slice(..vertices * POSITION_STRIDE));
                render_pass.set_vertex_buffer(1, gpu.colors.slice(..vertices * COLOR_STRIDE));
                match (command.pass.is_indexed(), gpu.indices.as_ref()) {
                    (true, Some(indices)) => {
                        render_pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        render_pass.draw_indexed(0..slot.index_count as u32, 0, 0..1);
                    }
                    (true, None) => {}
                    (false, _) => render_pass.draw(0..slot.vertex_count as u32, 0..1),
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        self.commands.clear();

        if self.stats.draw_calls == 0 {
            get_logger().debug(LogComponent::Infrastructure("WgpuBackend"), "frame submitted without draws");
        }
        Ok(self.stats)
    }
}
