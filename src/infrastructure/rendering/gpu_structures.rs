use crate::domain::chart::ViewState;
use bytemuck::{Pod, Zeroable};

/// Byte stride between transform slots in the per-frame uniform ring.
/// WebGPU guarantees `min_uniform_buffer_offset_alignment <= 256`.
pub const TRANSFORM_SLOT_STRIDE: u64 = 256;

/// Vertex position in original x / clip y space. Bound at slot 0.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 2],
}

impl PositionVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PositionVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-vertex RGBA. Bound at slot 1.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub color: [f32; 4],
}

impl ColorVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x4];

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// 2D affine transform laid out as a WGSL `mat3x3<f32>` (three padded columns).
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TransformUniform {
    pub columns: [[f32; 4]; 3],
}

impl TransformUniform {
    pub fn identity() -> Self {
        Self { columns: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0]] }
    }

    pub fn from_view(view: &ViewState) -> Self {
        Self {
            columns: [
                [view.scale_x as f32, 0.0, 0.0, 0.0],
                [0.0, view.scale_y as f32, 0.0, 0.0],
                [view.translate_x as f32, view.translate_y as f32, 1.0, 0.0],
            ],
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    /// Apply to a point the way the vertex shader does.
    pub fn transform_point(&self, x: f32, y: f32) -> [f32; 2] {
        let [c0, c1, c2] = self.columns;
        [c0[0] * x + c1[0] * y + c2[0], c0[1] * x + c1[1] * y + c2[1]]
    }
}

impl Default for TransformUniform {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<&ViewState> for TransformUniform {
    fn from(view: &ViewState) -> Self {
        Self::from_view(view)
    }
}
