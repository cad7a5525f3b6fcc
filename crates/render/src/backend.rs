use prism_common::{MeshHandle, PixelFormat, TextureHandle, ViewportSize};
use prism_scene::{ImageData, MeshData, SceneGraph};

use crate::camera::{CubeCamera, PerspectiveCamera};

/// Errors from render backends.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("cannot allocate {resolution}x{resolution} {format} cube target: {reason}")]
    ResourceAllocation {
        resolution: u32,
        format: PixelFormat,
        reason: String,
    },
    #[error("texture upload failed: {0}")]
    TextureUpload(String),
    #[error("mesh upload failed: {0}")]
    MeshUpload(String),
    #[error("surface error: {0}")]
    Surface(String),
}

/// A six-face render target usable as an environment texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CubeTexture {
    pub handle: TextureHandle,
    /// Edge length of each face in texels.
    pub resolution: u32,
    pub format: PixelFormat,
}

/// Rendering contract shared by the GPU and CPU backends.
///
/// A backend owns the device, the output framebuffer and every GPU resource;
/// scenes refer to those resources by handle only. Renders never mutate the
/// scene.
pub trait RenderBackend {
    /// Upload geometry and return a handle for mesh nodes.
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError>;

    /// Upload a 2D image and return a handle for materials.
    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError>;

    /// Free a texture from [`RenderBackend::upload_texture`]. Unknown handles
    /// are ignored.
    fn release_texture(&mut self, handle: TextureHandle);

    /// Allocate a cubemap render target. The handle doubles as a texture
    /// handle for scene environments.
    fn create_cube_target(
        &mut self,
        resolution: u32,
        format: PixelFormat,
    ) -> Result<CubeTexture, RenderError>;

    /// Resize the output framebuffer.
    fn set_size(&mut self, size: ViewportSize);

    /// Current output framebuffer size.
    fn size(&self) -> ViewportSize;

    /// Linear multiplier applied before output encoding.
    fn set_exposure(&mut self, exposure: f32);

    /// Draw `scene` from `camera` into the output framebuffer.
    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera);

    /// Draw `scene` six times from `camera` into the faces of `target`.
    fn capture_cube(&mut self, scene: &SceneGraph, camera: &CubeCamera, target: &CubeTexture);
}
