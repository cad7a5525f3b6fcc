//! Live environment reflections from a rotating proxy scene.

use glam::{Quat, Vec3, Vec4};
use prism_common::{NodeId, PixelFormat, TextureHandle, Transform};
use prism_scene::{Material, MeshData, NodeKind, SceneGraph, Shading, Side};
use std::sync::Arc;

use crate::backend::{CubeTexture, RenderBackend, RenderError};
use crate::camera::CubeCamera;

const SPHERE_WIDTH_SEGMENTS: u32 = 60;
const SPHERE_HEIGHT_SEGMENTS: u32 = 40;

/// Parameters fixed at construction of a [`ReflectionCapture`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Edge length of each cube face in texels.
    pub resolution: u32,
    pub format: PixelFormat,
    /// Proxy rotation about +Y, radians per second.
    pub angular_speed: f32,
    pub sphere_radius: f32,
    /// World point the reflections are captured from.
    pub origin: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            resolution: 256,
            format: PixelFormat::Float,
            angular_speed: 0.1,
            sphere_radius: 10.0,
            origin: Vec3::ZERO,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Keeps a cubemap in sync with a spinning, image-textured proxy sphere.
///
/// The unit owns an isolated proxy scene holding one inward-facing sphere.
/// Each [`tick`](ReflectionCapture::tick) advances the sphere's rotation and
/// re-renders all six cube faces, so the texture returned by
/// [`reflection_texture`](ReflectionCapture::reflection_texture) is never more
/// than one frame behind. Swapping the source image only changes a texture
/// handle on the proxy material; nothing is decoded per frame.
#[derive(Debug)]
pub struct ReflectionCapture {
    proxy: SceneGraph,
    sphere: NodeId,
    camera: CubeCamera,
    target: Arc<CubeTexture>,
    image: Option<TextureHandle>,
    angle: f32,
    angular_speed: f32,
    captures: u64,
}

impl ReflectionCapture {
    /// Upload the proxy sphere and allocate the cube target.
    ///
    /// Fails with [`RenderError::ResourceAllocation`] when the backend cannot
    /// provide a target of the requested resolution and format.
    pub fn new<B: RenderBackend + ?Sized>(
        backend: &mut B,
        settings: CaptureSettings,
    ) -> Result<Self, RenderError> {
        let target = backend.create_cube_target(settings.resolution, settings.format)?;
        let mesh = backend.upload_mesh(&MeshData::uv_sphere(
            settings.sphere_radius,
            SPHERE_WIDTH_SEGMENTS,
            SPHERE_HEIGHT_SEGMENTS,
        ))?;

        let mut proxy = SceneGraph::new();
        let sphere = proxy.add(
            "reflection_proxy",
            Transform::from_position(settings.origin),
            NodeKind::Mesh {
                mesh,
                material: proxy_material(None),
            },
        );

        tracing::debug!(
            resolution = target.resolution,
            format = %target.format,
            "reflection capture ready"
        );

        Ok(Self {
            proxy,
            sphere,
            camera: CubeCamera::new(settings.origin, settings.near, settings.far),
            target: Arc::new(target),
            image: None,
            angle: 0.0,
            angular_speed: settings.angular_speed,
            captures: 0,
        })
    }

    /// Assign or replace the equirectangular image on the sphere's interior.
    /// Returns the image it replaced.
    pub fn set_reflection_image(&mut self, image: TextureHandle) -> Option<TextureHandle> {
        self.proxy.set_material(self.sphere, proxy_material(Some(image)));
        self.image.replace(image)
    }

    /// Advance the rotation by `speed * dt` and re-capture all six faces.
    ///
    /// Negative, NaN and infinite deltas count as zero.
    pub fn tick<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.angle += self.angular_speed * dt;

        if let Some(node) = self.proxy.get_mut(self.sphere) {
            node.transform.rotation = Quat::from_rotation_y(self.angle);
        }

        backend.capture_cube(&self.proxy, &self.camera, &self.target);
        self.captures += 1;
    }

    /// The cube target. The same resource is returned for the unit's lifetime.
    pub fn reflection_texture(&self) -> &Arc<CubeTexture> {
        &self.target
    }

    /// Accumulated rotation in radians.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn speed(&self) -> f32 {
        self.angular_speed
    }

    pub fn set_speed(&mut self, radians_per_second: f32) {
        self.angular_speed = radians_per_second;
    }

    pub fn image(&self) -> Option<TextureHandle> {
        self.image
    }

    /// Number of completed six-face captures.
    pub fn capture_count(&self) -> u64 {
        self.captures
    }

    pub fn resolution(&self) -> u32 {
        self.target.resolution
    }

    pub fn format(&self) -> PixelFormat {
        self.target.format
    }

    /// The proxy scene, for inspection.
    pub fn proxy_scene(&self) -> &SceneGraph {
        &self.proxy
    }
}

/// Unlit, inside-facing material. Without an image the interior is black.
fn proxy_material(image: Option<TextureHandle>) -> Material {
    let base_color = if image.is_some() {
        Vec4::ONE
    } else {
        Vec4::new(0.0, 0.0, 0.0, 1.0)
    };
    Material {
        base_color,
        base_color_texture: image,
        shading: Shading::Unlit,
        side: Side::Back,
        env_intensity: 0.0,
        ..Material::default()
    }
}
