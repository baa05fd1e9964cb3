use crate::domain::errors::RenderingError;
use crate::domain::logging::{LogComponent, get_logger};
use crate::infrastructure::rendering::backend::RenderPass;
use crate::infrastructure::rendering::gpu_structures::{ColorVertex, PositionVertex};
use std::collections::HashMap;
use strum::IntoEnumIterator;

const SHADER_SOURCE: &str = include_str!("../shaders/chart.wgsl");

fn fragment_entry(pass: RenderPass) -> &'static str {
    match pass {
        RenderPass::GradientArea => "fs_gradient",
        _ => "fs_main",
    }
}

fn blend_state(pass: RenderPass) -> wgpu::BlendState {
    match pass {
        RenderPass::GradientArea => wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING,
        _ => wgpu::BlendState::ALPHA_BLENDING,
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    format: wgpu::TextureFormat,
    pass: RenderPass,
) -> wgpu::RenderPipeline {
    let label = format!("{pass} pipeline");
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&label),
        source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(&label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[PositionVertex::desc(), ColorVertex::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some(fragment_entry(pass)),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend_state(pass)),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: pass.topology(),
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // quads are emitted in both windings
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

/// Build one pipeline per pass. A pass whose shader or pipeline fails
/// validation is logged and left out.
pub(super) async fn create_pipelines(
    device: &wgpu::Device,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> HashMap<RenderPass, wgpu::RenderPipeline> {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Chart Pipeline Layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    let mut pipelines = HashMap::new();
    for pass in RenderPass::iter() {
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = build_pipeline(device, &layout, format, pass);
        match device.pop_error_scope().await {
            None => {
                pipelines.insert(pass, pipeline);
            }
            Some(error) => {
                let error = RenderingError::ShaderCompilation { pass: pass.to_string(), reason: error.to_string() };
                get_logger().error(LogComponent::Infrastructure("WgpuBackend"), &error.to_string());
            }
        }
    }
    pipelines
}
