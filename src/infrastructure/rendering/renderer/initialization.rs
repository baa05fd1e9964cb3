use super::{MAX_DRAWS_PER_FRAME, WgpuBackend, pipelines};
use crate::domain::errors::{ChartResult, InitializationError};
use crate::domain::logging::{LogComponent, get_logger};
use crate::infrastructure::rendering::backend::{FrameStats, physical_size};
use crate::infrastructure::rendering::buffers::BufferRegistry;
use crate::infrastructure::rendering::gpu_structures::{TRANSFORM_SLOT_STRIDE, TransformUniform};
use std::num::NonZeroU64;
use web_sys::HtmlCanvasElement;

/// Whether the browser exposes `navigator.gpu`.
pub fn is_webgpu_supported() -> bool {
    web_sys::window()
        .map(|window| js_sys::Reflect::has(&window.navigator(), &"gpu".into()).unwrap_or(false))
        .unwrap_or(false)
}

impl WgpuBackend {
    /// Acquire adapter, device and surface for `canvas` and build every pipeline
    /// that validates. Any failure up to the device is fatal.
    pub async fn new(
        canvas: HtmlCanvasElement,
        css_width: f64,
        css_height: f64,
        device_pixel_ratio: f64,
    ) -> ChartResult<Self> {
        let (width, height) = physical_size(css_width, css_height, device_pixel_ratio);
        canvas.set_width(width);
        canvas.set_height(height);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| InitializationError::SurfaceCreation(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| InitializationError::AdapterUnavailable(format!("{e:?}")))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Chart Device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| InitializationError::DeviceRequest(format!("{e:?}")))?;

        let max_dimension = adapter.limits().max_texture_dimension_2d;
        let (width, height) = (width.min(max_dimension), height.min(max_dimension));

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            return Err(InitializationError::SurfaceCreation("surface reports no formats".into()).into());
        };
        let surface_format = surface_caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(first_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: surface_caps.present_modes.first().copied().unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        get_logger().info(
            LogComponent::Infrastructure("WgpuBackend"),
            &format!("Surface configured: {}x{}, format: {:?}", config.width, config.height, config.format),
        );

        let transform_size = NonZeroU64::new(std::mem::size_of::<TransformUniform>() as u64);
        let transform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: transform_size,
                },
                count: None,
            }],
            label: Some("transform_bind_group_layout"),
        });

        let transform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Transform Ring"),
            size: TRANSFORM_SLOT_STRIDE * MAX_DRAWS_PER_FRAME,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let transform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &transform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &transform_buffer,
                    offset: 0,
                    size: transform_size,
                }),
            }],
            label: Some("transform_bind_group"),
        });

        let pipelines = pipelines::create_pipelines(&device, &transform_layout, config.format).await;
        if pipelines.is_empty() {
            get_logger().error(
                LogComponent::Infrastructure("WgpuBackend"),
                "No render pipeline passed validation; frames will only clear",
            );
        }

        Ok(Self {
            surface,
            device,
            queue,
            config,
            pipelines,
            transform_buffer,
            transform_bind_group,
            buffers: BufferRegistry::new(),
            clear: wgpu::Color::BLACK,
            commands: Vec::with_capacity(MAX_DRAWS_PER_FRAME as usize),
            stats: FrameStats::default(),
            in_frame: false,
            released: false,
        })
    }

    pub(super) fn resize_surface(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        if self.released {
            return;
        }
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let (width, height) = physical_size(css_width, css_height, device_pixel_ratio);
        let (width, height) = (width.min(max_dimension), height.min(max_dimension));
        if (width, height) == (self.config.width, self.config.height) {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }
}
