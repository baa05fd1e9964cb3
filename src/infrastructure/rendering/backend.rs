use super::buffers::BufferRegistry;
use super::gpu_structures::TransformUniform;
use crate::domain::errors::{RenderingError, RenderingResult};
use derive_more::Display;
use serde::Serialize;
use std::collections::HashSet;
use strum::{AsRefStr, EnumIter};

/// One pipeline per pass; the pass fixes the primitive topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum RenderPass {
    /// Indexed triangle list for candle bodies.
    #[display(fmt = "candlestick")]
    Candlestick,
    #[display(fmt = "wick")]
    Wick,
    #[display(fmt = "line")]
    Line,
    #[display(fmt = "point")]
    Point,
    /// Indexed triangle list for annotation fills.
    #[display(fmt = "area")]
    Area,
    #[display(fmt = "gradient-area")]
    GradientArea,
}

impl RenderPass {
    pub fn topology(self) -> wgpu::PrimitiveTopology {
        match self {
            Self::Candlestick | Self::Area => wgpu::PrimitiveTopology::TriangleList,
            Self::Wick => wgpu::PrimitiveTopology::LineList,
            Self::Line => wgpu::PrimitiveTopology::LineStrip,
            Self::Point => wgpu::PrimitiveTopology::PointList,
            Self::GradientArea => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }

    pub fn is_indexed(self) -> bool {
        matches!(self, Self::Candlestick | Self::Area)
    }

    /// Triangles rasterised for a draw of this pass.
    pub fn triangle_count(self, vertices: usize, indices: usize) -> usize {
        match self {
            Self::Candlestick | Self::Area => indices / 3,
            Self::GradientArea => vertices.saturating_sub(2),
            Self::Wick | Self::Line | Self::Point => 0,
        }
    }
}

/// Work submitted in one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameStats {
    pub draw_calls: usize,
    pub vertices: usize,
    pub triangles: usize,
    pub bytes_uploaded: usize,
}

impl FrameStats {
    pub fn account_draw(&mut self, pass: RenderPass, vertices: usize, indices: usize) {
        self.draw_calls += 1;
        self.vertices += vertices;
        self.triangles += pass.triangle_count(vertices, indices);
    }

    pub fn account_upload(&mut self, vertices: usize, indices: usize) {
        self.bytes_uploaded += vertices * (8 + 16) + indices * 4;
    }
}

/// Minimal drawing surface the chart renderer targets.
///
/// Calls within a frame follow `begin_frame`, any number of `upload`/`draw`,
/// then `end_frame`. Drawing a key that was never uploaded, or a pass whose
/// pipeline is unavailable, is a logged no-op.
pub trait GraphicsBackend {
    fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64);

    /// Physical surface size in pixels.
    fn surface_size(&self) -> (u32, u32);

    fn begin_frame(&mut self, clear: [f64; 4]);

    /// Write vertex data under `key`, reusing its buffers when they fit.
    fn upload(
        &mut self,
        key: &str,
        positions: &[[f32; 2]],
        colors: &[[f32; 4]],
        indices: Option<&[u32]>,
    ) -> RenderingResult<()>;

    fn draw(&mut self, key: &str, pass: RenderPass, transform: &TransformUniform);

    fn end_frame(&mut self) -> RenderingResult<FrameStats>;

    fn has_pass(&self, pass: RenderPass) -> bool;

    /// Free GPU resources. The backend is unusable afterwards.
    fn release(&mut self);
}

impl<B: GraphicsBackend + ?Sized> GraphicsBackend for Box<B> {
    fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        (**self).resize(css_width, css_height, device_pixel_ratio);
    }

    fn surface_size(&self) -> (u32, u32) {
        (**self).surface_size()
    }

    fn begin_frame(&mut self, clear: [f64; 4]) {
        (**self).begin_frame(clear);
    }

    fn upload(
        &mut self,
        key: &str,
        positions: &[[f32; 2]],
        colors: &[[f32; 4]],
        indices: Option<&[u32]>,
    ) -> RenderingResult<()> {
        (**self).upload(key, positions, colors, indices)
    }

    fn draw(&mut self, key: &str, pass: RenderPass, transform: &TransformUniform) {
        (**self).draw(key, pass, transform);
    }

    fn end_frame(&mut self) -> RenderingResult<FrameStats> {
        (**self).end_frame()
    }

    fn has_pass(&self, pass: RenderPass) -> bool {
        (**self).has_pass(pass)
    }

    fn release(&mut self) {
        (**self).release();
    }
}

/// Backing-store size for a CSS box at the given device pixel ratio. Never zero.
pub fn physical_size(css_width: f64, css_height: f64, device_pixel_ratio: f64) -> (u32, u32) {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 { device_pixel_ratio } else { 1.0 };
    let scale = |v: f64| if v.is_finite() { (v.max(0.0) * dpr).round().max(1.0) as u32 } else { 1 };
    (scale(css_width), scale(css_height))
}

pub(crate) fn check_upload(key: &str, positions: &[[f32; 2]], colors: &[[f32; 4]]) -> RenderingResult<()> {
    if positions.len() != colors.len() {
        return Err(RenderingError::MissingBuffer(format!(
            "{key}: {} positions but {} colors",
            positions.len(),
            colors.len()
        ))
        .into());
    }
    Ok(())
}

/// Last data written under a key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedMesh {
    pub positions: Vec<[f32; 2]>,
    pub colors: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedDraw {
    pub key: String,
    pub pass: RenderPass,
    pub transform: TransformUniform,
    pub vertex_count: usize,
}

/// Headless backend that keeps every upload and draw for inspection.
#[derive(Debug)]
pub struct RecordingBackend {
    registry: BufferRegistry<RecordedMesh>,
    unavailable: HashSet<RenderPass>,
    size: (u32, u32),
    clear: Option<[f64; 4]>,
    in_frame: bool,
    pending: Vec<RecordedDraw>,
    stats: FrameStats,
    last_frame: Vec<RecordedDraw>,
    frames: usize,
    fail_next_frame: bool,
    released: bool,
}

impl Default for RecordingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            registry: BufferRegistry::new(),
            unavailable: HashSet::new(),
            size: (0, 0),
            clear: None,
            in_frame: false,
            pending: Vec::new(),
            stats: FrameStats::default(),
            last_frame: Vec::new(),
            frames: 0,
            fail_next_frame: false,
            released: false,
        }
    }

    /// Behave as if the pipeline for `pass` failed validation.
    pub fn without_pass(mut self, pass: RenderPass) -> Self {
        self.unavailable.insert(pass);
        self
    }

    /// Make the next `end_frame` report a lost surface.
    pub fn fail_next_frame(&mut self) {
        self.fail_next_frame = true;
    }

    pub fn mesh(&self, key: &str) -> Option<&RecordedMesh> {
        self.registry.get(key).and_then(|slot| slot.storage.as_ref())
    }

    pub fn last_frame(&self) -> &[RecordedDraw] {
        &self.last_frame
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn allocations(&self) -> usize {
        self.registry.allocations()
    }

    pub fn clear_color(&self) -> Option<[f64; 4]> {
        self.clear
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl GraphicsBackend for RecordingBackend {
    fn resize(&mut self, css_width: f64, css_height: f64, device_pixel_ratio: f64) {
        self.size = physical_size(css_width, css_height, device_pixel_ratio);
    }

    fn surface_size(&self) -> (u32, u32) {
        self.size
    }

    fn begin_frame(&mut self, clear: [f64; 4]) {
        self.clear = Some(clear);
        self.in_frame = true;
        self.pending.clear();
        self.stats = FrameStats::default();
    }

    fn upload(
        &mut self,
        key: &str,
        positions: &[[f32; 2]],
        colors: &[[f32; 4]],
        indices: Option<&[u32]>,
    ) -> RenderingResult<()> {
        check_upload(key, positions, colors)?;
        let index_len = indices.map_or(0, <[u32]>::len);
        let (slot, _) = self.registry.ensure(key, positions.len(), index_len, |_, _| RecordedMesh::default());
        if let Some(mesh) = slot.storage.as_mut() {
            mesh.positions.clear();
            mesh.positions.extend_from_slice(positions);
            mesh.colors.clear();
            mesh.colors.extend_from_slice(colors);
            mesh.indices.clear();
            mesh.indices.extend_from_slice(indices.unwrap_or_default());
        }
        self.stats.account_upload(positions.len(), index_len);
        Ok(())
    }

    fn draw(&mut self, key: &str, pass: RenderPass, transform: &TransformUniform) {
        if !self.in_frame || self.unavailable.contains(&pass) {
            return;
        }
        let Some(slot) = self.registry.get(key) else {
            return;
        };
        if slot.vertex_count == 0 {
            return;
        }
        self.stats.account_draw(pass, slot.vertex_count, slot.index_count);
        self.pending.push(RecordedDraw {
            key: key.to_string(),
            pass,
            transform: *transform,
            vertex_count: slot.vertex_count,
        });
    }

    fn end_frame(&mut self) -> RenderingResult<FrameStats> {
        self.in_frame = false;
        if std::mem::take(&mut self.fail_next_frame) {
            self.pending.clear();
            return Err(RenderingError::SurfaceTexture("surface lost".into()).into());
        }
        self.last_frame = std::mem::take(&mut self.pending);
        self.frames += 1;
        Ok(self.stats)
    }

    fn has_pass(&self, pass: RenderPass) -> bool {
        !self.released && !self.unavailable.contains(&pass)
    }

    fn release(&mut self) {
        self.registry.clear(|_, _| {});
        self.pending.clear();
        self.released = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draws_of_unknown_keys_are_skipped() {
        let mut backend = RecordingBackend::new();
        backend.begin_frame([0.0, 0.0, 0.0, 1.0]);
        backend.upload("line::series", &[[0.0, 0.0], [1.0, 1.0]], &[[1.0; 4]; 2], None).unwrap();
        backend.draw("line::series", RenderPass::Line, &TransformUniform::identity());
        backend.draw("area::series", RenderPass::GradientArea, &TransformUniform::identity());
        let stats = backend.end_frame().unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(backend.last_frame()[0].key, "line::series");
    }

    #[test]
    fn surface_tracks_device_pixel_ratio() {
        assert_eq!(physical_size(400.0, 300.0, 2.0), (800, 600));
        assert_eq!(physical_size(0.0, f64::NAN, 0.0), (1, 1));
    }

    #[test]
    fn mismatched_upload_is_rejected() {
        let mut backend = RecordingBackend::new();
        assert!(backend.upload("x", &[[0.0, 0.0]], &[], None).is_err());
    }
}
