use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use half::f16;
use prism_common::PixelFormat;
use prism_scene::{ColorSpace, ImageData, ImagePixels, LightInstance, Material, MeshData, Shading, Side};

pub(crate) const MAX_LIGHTS: usize = 4;
pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct Vertex {
    position: [f32; 3],
    normal: [f32; 3],
    uv: [f32; 2],
}

impl Vertex {
    pub(crate) const ATTRIBUTES: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2,
    ];

    pub(crate) fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Interleave mesh attributes into GPU vertices.
pub(crate) fn pack_vertices(mesh: &MeshData) -> Vec<Vertex> {
    mesh.positions
        .iter()
        .zip(&mesh.normals)
        .zip(&mesh.uvs)
        .map(|((p, n), uv)| Vertex {
            position: p.to_array(),
            normal: n.to_array(),
            uv: uv.to_array(),
        })
        .collect()
}

/// Per-pass constants. Mirrors `Frame` in the WGSL source.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    view_proj: [[f32; 4]; 4],
    inv_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    light_dir: [[f32; 4]; MAX_LIGHTS],
    light_color: [[f32; 4]; MAX_LIGHTS],
    /// x: light count, y: exposure, z: environment present, w: winding sign.
    params: [f32; 4],
}

impl FrameUniforms {
    pub(crate) fn new(
        view_proj: Mat4,
        camera_pos: Vec3,
        lights: &[LightInstance],
        exposure: f32,
        has_environment: bool,
        mirrored_view: bool,
    ) -> Self {
        if lights.len() > MAX_LIGHTS {
            tracing::debug!(lights = lights.len(), "only the first {MAX_LIGHTS} lights are used");
        }
        let mut light_dir = [[0.0; 4]; MAX_LIGHTS];
        let mut light_color = [[0.0; 4]; MAX_LIGHTS];
        for (i, light) in lights.iter().take(MAX_LIGHTS).enumerate() {
            light_dir[i] = light.direction.extend(light.intensity).to_array();
            light_color[i] = light.color.extend(1.0).to_array();
        }
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            inv_view_proj: view_proj.inverse().to_cols_array_2d(),
            camera_pos: camera_pos.extend(1.0).to_array(),
            light_dir,
            light_color,
            params: [
                lights.len().min(MAX_LIGHTS) as f32,
                exposure,
                if has_environment { 1.0 } else { 0.0 },
                if mirrored_view { -1.0 } else { 1.0 },
            ],
        }
    }
}

/// Per-draw constants. Mirrors `Object` in the WGSL source.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
pub(crate) struct ObjectUniforms {
    model: [[f32; 4]; 4],
    normal_matrix: [[f32; 4]; 4],
    base_color: [f32; 4],
    /// x: metallic, y: roughness, z: environment intensity, w: 1 when lit.
    params: [f32; 4],
    /// x: winding sign of the model transform.
    flags: [f32; 4],
}

impl ObjectUniforms {
    pub(crate) fn new(world: Mat4, material: &Material) -> Self {
        let normal = Mat3::from_mat4(world).inverse().transpose();
        Self {
            model: world.to_cols_array_2d(),
            normal_matrix: Mat4::from_mat3(normal).to_cols_array_2d(),
            base_color: material.base_color.to_array(),
            params: [
                material.metallic,
                material.roughness,
                material.env_intensity,
                if material.shading == Shading::Standard { 1.0 } else { 0.0 },
            ],
            flags: [if world.determinant() < 0.0 { -1.0 } else { 1.0 }, 0.0, 0.0, 0.0],
        }
    }
}

/// Round `size` up to a multiple of `alignment`.
pub(crate) fn aligned(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

/// Which triangles to drop for a material side. `flip` is set when the
/// view or model transform mirrors the winding.
pub(crate) fn cull_mode(side: Side, flip: bool) -> Option<wgpu::Face> {
    match (side, flip) {
        (Side::Double, _) => None,
        (Side::Front, false) | (Side::Back, true) => Some(wgpu::Face::Back),
        (Side::Back, false) | (Side::Front, true) => Some(wgpu::Face::Front),
    }
}

/// Storage format of a cube render target.
pub(crate) fn cube_format(format: PixelFormat) -> wgpu::TextureFormat {
    match format {
        PixelFormat::Standard => wgpu::TextureFormat::Rgba8Unorm,
        PixelFormat::Float => wgpu::TextureFormat::Rgba16Float,
    }
}

/// Texture format and tightly packed bytes for an image upload.
pub(crate) fn image_bytes(image: &ImageData) -> (wgpu::TextureFormat, Vec<u8>) {
    match &image.pixels {
        ImagePixels::Rgba8(px) => {
            let format = match image.color_space {
                ColorSpace::Srgb => wgpu::TextureFormat::Rgba8UnormSrgb,
                ColorSpace::Linear => wgpu::TextureFormat::Rgba8Unorm,
            };
            (format, px.clone())
        }
        ImagePixels::Rgba32F(px) => {
            let halves: Vec<f16> = px.iter().map(|v| f16::from_f32(*v)).collect();
            (
                wgpu::TextureFormat::Rgba16Float,
                bytemuck::cast_slice(&halves).to_vec(),
            )
        }
    }
}
