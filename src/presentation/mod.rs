//! Browser-facing layer: DOM input binding and the JavaScript API.

pub mod canvas_surface;
#[cfg(target_arch = "wasm32")]
pub mod wasm_api;

pub use canvas_surface::CanvasSurface;
#[cfg(target_arch = "wasm32")]
pub use wasm_api::{ChartApi, ChartHost};
