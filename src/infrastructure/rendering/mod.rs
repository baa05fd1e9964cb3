pub mod backend;
pub mod buffers;
pub mod drawings;
pub mod geometry;
pub mod gpu_structures;
pub mod performance;
#[cfg(target_arch = "wasm32")]
pub mod renderer;

pub use backend::{FrameStats, GraphicsBackend, RecordingBackend, RenderPass};
pub use gpu_structures::TransformUniform;
pub use performance::{PerformanceMonitor, PerformanceStats};
#[cfg(target_arch = "wasm32")]
pub use renderer::WgpuBackend;
