//! CPU ray-casting backend.
//!
//! Implements [`RenderBackend`] without a GPU: every pixel (or cube texel) is
//! a ray cast against the scene's triangles. Slow, but exact enough for
//! headless runs and for tests that need to look at captured pixels.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};
use prism_common::{MeshHandle, PixelFormat, TextureHandle, ViewportSize};
use prism_scene::{Background, ImageData, LightInstance, Material, MeshData, SceneGraph, Shading};
use std::collections::HashMap;

use crate::backend::{CubeTexture, RenderBackend, RenderError};
use crate::camera::{CubeCamera, CubeFace, PerspectiveCamera};

const BARY_EPSILON: f32 = 1e-6;
const DET_EPSILON: f32 = 1e-12;

/// Capabilities the software device pretends to have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Largest accepted cube face edge, in texels.
    pub max_cube_dimension: u32,
    /// Whether [`PixelFormat::Float`] targets can be allocated.
    pub float_targets: bool,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_cube_dimension: 2048,
            float_targets: true,
        }
    }
}

/// Call counters, for instrumentation and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub resizes: u64,
    pub renders: u64,
    pub captures: u64,
    pub meshes: usize,
    pub textures: usize,
    pub cube_targets: usize,
}

/// Frame-level backend operations, in the order they were issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Resize,
    Capture,
    Render,
}

struct CpuMesh {
    data: MeshData,
    radius: f32,
}

struct CpuCube {
    resolution: u32,
    format: PixelFormat,
    faces: Vec<Vec<Vec4>>,
}

/// A mesh instance with everything needed to intersect it in local space.
struct Prepared<'a> {
    mesh: &'a CpuMesh,
    material: &'a Material,
    to_local: Mat4,
    normal_matrix: Mat3,
    mirrored: bool,
}

struct Hit<'a> {
    t: f32,
    normal: Vec3,
    uv: Vec2,
    front_facing: bool,
    material: &'a Material,
}

/// Headless CPU implementation of [`RenderBackend`].
pub struct SoftwareBackend {
    limits: DeviceLimits,
    rasterize: bool,
    size: ViewportSize,
    exposure: f32,
    next_id: u64,
    meshes: HashMap<MeshHandle, CpuMesh>,
    textures: HashMap<TextureHandle, ImageData>,
    cubes: HashMap<TextureHandle, CpuCube>,
    framebuffer: Vec<Vec4>,
    stats: BackendStats,
    calls: Vec<BackendCall>,
}

impl SoftwareBackend {
    pub fn new(limits: DeviceLimits) -> Self {
        Self {
            limits,
            rasterize: true,
            size: ViewportSize::new(1, 1),
            exposure: 1.0,
            next_id: 1,
            meshes: HashMap::new(),
            textures: HashMap::new(),
            cubes: HashMap::new(),
            framebuffer: vec![Vec4::ZERO],
            stats: BackendStats::default(),
            calls: Vec::new(),
        }
    }

    /// When disabled, renders and captures only update counters.
    pub fn set_rasterize(&mut self, rasterize: bool) {
        self.rasterize = rasterize;
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Every resize, capture and render since construction.
    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    /// Linear RGBA output of the last render, row-major, top row first.
    pub fn framebuffer(&self) -> &[Vec4] {
        &self.framebuffer
    }

    /// Output encoded as 8-bit sRGB RGBA, ready for an image encoder.
    pub fn framebuffer_srgb8(&self) -> Vec<u8> {
        self.framebuffer
            .iter()
            .flat_map(|p| {
                [
                    encode_srgb(p.x),
                    encode_srgb(p.y),
                    encode_srgb(p.z),
                    (p.w.clamp(0.0, 1.0) * 255.0).round() as u8,
                ]
            })
            .collect()
    }

    /// Texels of one face of a cube target, row-major.
    pub fn cube_face(&self, handle: TextureHandle, face: CubeFace) -> Option<&[Vec4]> {
        self.cubes
            .get(&handle)
            .map(|cube| cube.faces[face.layer() as usize].as_slice())
    }

    /// Nearest-texel lookup of a cube target along `direction`.
    pub fn sample_cube(&self, handle: TextureHandle, direction: Vec3) -> Option<Vec4> {
        let cube = self.cubes.get(&handle)?;
        let (face, s, t) = CubeFace::from_direction(direction);
        let res = cube.resolution;
        let x = (((s + 1.0) * 0.5 * res as f32) as u32).min(res - 1);
        let y = (((t + 1.0) * 0.5 * res as f32) as u32).min(res - 1);
        Some(cube.faces[face.layer() as usize][(y * res + x) as usize])
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn prepare<'a>(&'a self, scene: &'a SceneGraph) -> Vec<Prepared<'a>> {
        scene
            .meshes()
            .into_iter()
            .filter_map(|instance| {
                let Some(mesh) = self.meshes.get(&instance.mesh) else {
                    tracing::trace!(mesh = ?instance.mesh, "skipping unknown mesh");
                    return None;
                };
                Some(Prepared {
                    mesh,
                    material: instance.material,
                    to_local: instance.world.inverse(),
                    normal_matrix: Mat3::from_mat4(instance.world).inverse().transpose(),
                    mirrored: instance.world.determinant() < 0.0,
                })
            })
            .collect()
    }

    fn trace<'a>(
        &self,
        prepared: &'a [Prepared<'a>],
        origin: Vec3,
        dir: Vec3,
        t_min: f32,
        t_max: f32,
    ) -> Option<Hit<'a>> {
        let mut best: Option<Hit<'a>> = None;
        for p in prepared {
            let o = p.to_local.transform_point3(origin);
            let d = p.to_local.transform_vector3(dir);
            let limit = best.as_ref().map_or(t_max, |h| h.t);
            if !ray_hits_sphere(o, d, p.mesh.radius, t_min, limit) {
                continue;
            }

            let data = &p.mesh.data;
            for tri in data.indices.chunks_exact(3) {
                let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                let limit = best.as_ref().map_or(t_max, |h| h.t);
                let Some((t, u, v, det)) = intersect_triangle(
                    o,
                    d,
                    data.positions[i0],
                    data.positions[i1],
                    data.positions[i2],
                ) else {
                    continue;
                };
                if t < t_min || t >= limit {
                    continue;
                }
                let front_facing = (det > 0.0) != p.mirrored;
                if !p.material.side.accepts(front_facing) {
                    continue;
                }
                let w = 1.0 - u - v;
                let local_normal = data.normals[i0] * w + data.normals[i1] * u + data.normals[i2] * v;
                let normal = (p.normal_matrix * local_normal).normalize_or_zero();
                let uv = data.uvs[i0] * w + data.uvs[i1] * u + data.uvs[i2] * v;
                best = Some(Hit {
                    t,
                    normal,
                    uv,
                    front_facing,
                    material: p.material,
                });
            }
        }
        best
    }

    /// Linear color seen along a ray.
    #[allow(clippy::too_many_arguments)]
    fn shade(
        &self,
        prepared: &[Prepared<'_>],
        lights: &[LightInstance],
        environment: Option<TextureHandle>,
        background: Background,
        origin: Vec3,
        dir: Vec3,
        t_min: f32,
        t_max: f32,
    ) -> Vec4 {
        let Some(hit) = self.trace(prepared, origin, dir, t_min, t_max) else {
            return match background {
                Background::Color(c) => c.extend(1.0),
                Background::Environment => environment
                    .and_then(|env| self.sample_cube(env, dir))
                    .map_or(Vec4::new(0.0, 0.0, 0.0, 1.0), |c| c.xyz().extend(1.0)),
            };
        };

        let material = hit.material;
        let mut albedo = material.base_color;
        if let Some(texture) = material.base_color_texture.and_then(|t| self.textures.get(&t)) {
            albedo *= texture.sample(hit.uv);
        }
        if material.shading == Shading::Unlit {
            return albedo;
        }

        let n = if hit.front_facing { hit.normal } else { -hit.normal };
        let base = albedo.xyz();
        let mut direct = Vec3::ZERO;
        for light in lights {
            direct += light.color * light.intensity * n.dot(light.direction).max(0.0);
        }
        let diffuse_weight = 1.0 - material.metallic;
        let mut color = base * direct * diffuse_weight;

        if let Some(env) = environment {
            let irradiance = self.sample_cube(env, n).map_or(Vec3::ZERO, |c| c.xyz());
            let reflected = dir - 2.0 * dir.dot(n) * n;
            let specular = self.sample_cube(env, reflected).map_or(Vec3::ZERO, |c| c.xyz());
            let reflectance = Vec3::splat(0.04).lerp(base, material.metallic)
                * (1.0 - 0.75 * material.roughness);
            color += (base * irradiance * diffuse_weight + reflectance * specular)
                * material.env_intensity;
        }
        color.extend(albedo.w)
    }
}

impl RenderBackend for SoftwareBackend {
    fn upload_mesh(&mut self, mesh: &MeshData) -> Result<MeshHandle, RenderError> {
        mesh.validate()
            .map_err(|e| RenderError::MeshUpload(e.to_string()))?;
        let handle = MeshHandle(self.allocate_id());
        self.meshes.insert(
            handle,
            CpuMesh {
                radius: mesh.bounding_radius(),
                data: mesh.clone(),
            },
        );
        self.stats.meshes = self.meshes.len();
        Ok(handle)
    }

    fn upload_texture(&mut self, image: &ImageData) -> Result<TextureHandle, RenderError> {
        if image.width == 0 || image.height == 0 {
            return Err(RenderError::TextureUpload(format!(
                "empty image {}x{}",
                image.width, image.height
            )));
        }
        let handle = TextureHandle(self.allocate_id());
        self.textures.insert(handle, image.clone());
        self.stats.textures = self.textures.len();
        Ok(handle)
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        self.textures.remove(&handle);
        self.stats.textures = self.textures.len();
    }

    fn create_cube_target(
        &mut self,
        resolution: u32,
        format: PixelFormat,
    ) -> Result<CubeTexture, RenderError> {
        let reason = if resolution == 0 {
            Some("resolution must be positive".to_string())
        } else if resolution > self.limits.max_cube_dimension {
            Some(format!(
                "exceeds device limit of {}",
                self.limits.max_cube_dimension
            ))
        } else if format == PixelFormat::Float && !self.limits.float_targets {
            Some("floating-point render targets are not supported".to_string())
        } else {
            None
        };
        if let Some(reason) = reason {
            return Err(RenderError::ResourceAllocation {
                resolution,
                format,
                reason,
            });
        }

        let handle = TextureHandle(self.allocate_id());
        let texels = (resolution * resolution) as usize;
        self.cubes.insert(
            handle,
            CpuCube {
                resolution,
                format,
                faces: vec![vec![Vec4::ZERO; texels]; 6],
            },
        );
        self.stats.cube_targets = self.cubes.len();
        Ok(CubeTexture {
            handle,
            resolution,
            format,
        })
    }

    fn set_size(&mut self, size: ViewportSize) {
        self.size = size.clamped();
        self.framebuffer = vec![Vec4::ZERO; (self.size.width * self.size.height) as usize];
        self.stats.resizes += 1;
        self.calls.push(BackendCall::Resize);
    }

    fn size(&self) -> ViewportSize {
        self.size
    }

    fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    fn render(&mut self, scene: &SceneGraph, camera: &PerspectiveCamera) {
        self.stats.renders += 1;
        self.calls.push(BackendCall::Render);
        if !self.rasterize {
            return;
        }

        let prepared = self.prepare(scene);
        let lights = scene.lights();
        let ViewportSize { width, height } = self.size;
        let inverse = camera.view_projection().inverse();
        let mut out = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let ndc = Vec2::new(
                    (x as f32 + 0.5) / width as f32 * 2.0 - 1.0,
                    1.0 - (y as f32 + 0.5) / height as f32 * 2.0,
                );
                let far = inverse.project_point3(ndc.extend(1.0));
                let dir = (far - camera.position).normalize_or_zero();
                let color = self.shade(
                    &prepared,
                    &lights,
                    scene.environment(),
                    scene.background(),
                    camera.position,
                    dir,
                    camera.near,
                    camera.far,
                );
                out.push((color.xyz() * self.exposure).extend(color.w));
            }
        }
        drop(prepared);
        self.framebuffer = out;
    }

    fn capture_cube(&mut self, scene: &SceneGraph, camera: &CubeCamera, target: &CubeTexture) {
        self.stats.captures += 1;
        self.calls.push(BackendCall::Capture);
        if !self.rasterize {
            return;
        }
        let Some((res, format)) = self
            .cubes
            .get(&target.handle)
            .map(|c| (c.resolution, c.format))
        else {
            tracing::warn!(target = ?target.handle, "capture into unknown cube target");
            return;
        };

        // A target cannot be sampled while it is being written.
        let environment = scene.environment().filter(|env| *env != target.handle);
        let prepared = self.prepare(scene);
        let lights = scene.lights();
        let mut faces = Vec::with_capacity(6);
        for face in CubeFace::ALL {
            let mut texels = Vec::with_capacity((res * res) as usize);
            for y in 0..res {
                for x in 0..res {
                    let s = (x as f32 + 0.5) / res as f32 * 2.0 - 1.0;
                    let t = (y as f32 + 0.5) / res as f32 * 2.0 - 1.0;
                    let dir = face.direction(s, t).normalize();
                    let color = self.shade(
                        &prepared,
                        &lights,
                        environment,
                        scene.background(),
                        camera.position,
                        dir,
                        camera.near,
                        camera.far,
                    );
                    texels.push(store(color, format));
                }
            }
            faces.push(texels);
        }
        drop(prepared);
        if let Some(cube) = self.cubes.get_mut(&target.handle) {
            cube.faces = faces;
        }
    }
}

/// Quantize a color the way a target of `format` would store it.
fn store(color: Vec4, format: PixelFormat) -> Vec4 {
    match format {
        PixelFormat::Float => color,
        PixelFormat::Standard => {
            (color.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0
        }
    }
}

fn encode_srgb(linear: f32) -> u8 {
    let c = linear.clamp(0.0, 1.0);
    let encoded = if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    };
    (encoded * 255.0).round() as u8
}

/// Whether a ray can touch a sphere of `radius` at the origin within `[t_min, t_max]`.
fn ray_hits_sphere(origin: Vec3, dir: Vec3, radius: f32, t_min: f32, t_max: f32) -> bool {
    let a = dir.length_squared();
    if a <= 0.0 {
        return false;
    }
    let b = origin.dot(dir);
    let c = origin.length_squared() - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return false;
    }
    let root = disc.sqrt();
    let t0 = (-b - root) / a;
    let t1 = (-b + root) / a;
    t1 >= t_min && t0 <= t_max
}

/// Moller-Trumbore. Returns `(t, u, v, det)`; `det > 0` means the ray sees the
/// counter-clockwise (front) side.
fn intersect_triangle(
    origin: Vec3,
    dir: Vec3,
    v0: Vec3,
    v1: Vec3,
    v2: Vec3,
) -> Option<(f32, f32, f32, f32)> {
    let e1 = v1 - v0;
    let e2 = v2 - v0;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < DET_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - v0;
    let u = s.dot(p) * inv_det;
    if !(-BARY_EPSILON..=1.0 + BARY_EPSILON).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < -BARY_EPSILON || u + v > 1.0 + BARY_EPSILON {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    Some((t, u, v, det))
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_common::Transform;
    use prism_scene::{DirectionalLight, NodeKind, Side};

    fn quad() -> MeshData {
        // Unit quad in the XY plane facing +Z.
        MeshData {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            uvs: vec![
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, 0.0),
            ],
            indices: vec![0, 1, 2, 2, 3, 0],
        }
    }

    fn looking_at_quad() -> PerspectiveCamera {
        PerspectiveCamera {
            position: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            aspect: 1.0,
            ..PerspectiveCamera::default()
        }
    }

    #[test]
    fn triangle_intersection_reports_facing() {
        let hit = intersect_triangle(
            Vec3::new(0.2, 0.2, 1.0),
            Vec3::NEG_Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        )
        .unwrap();
        assert!((hit.0 - 1.0).abs() < 1e-6);
        assert!(hit.3 > 0.0);

        let back = intersect_triangle(
            Vec3::new(0.2, 0.2, -1.0),
            Vec3::Z,
            Vec3::ZERO,
            Vec3::X,
            Vec3::Y,
        )
        .unwrap();
        assert!(back.3 < 0.0);

        assert!(
            intersect_triangle(Vec3::new(2.0, 2.0, 1.0), Vec3::NEG_Z, Vec3::ZERO, Vec3::X, Vec3::Y)
                .is_none()
        );
    }

    #[test]
    fn allocation_limits() {
        let mut gpu = SoftwareBackend::new(DeviceLimits {
            max_cube_dimension: 64,
            float_targets: false,
        });
        assert!(gpu.create_cube_target(0, PixelFormat::Standard).is_err());
        assert!(gpu.create_cube_target(65, PixelFormat::Standard).is_err());
        assert!(gpu.create_cube_target(64, PixelFormat::Float).is_err());
        let cube = gpu.create_cube_target(64, PixelFormat::Standard).unwrap();
        assert_eq!(cube.resolution, 64);
        assert_eq!(gpu.stats().cube_targets, 1);
    }

    #[test]
    fn unlit_quad_fills_centre() {
        let mut gpu = SoftwareBackend::new(DeviceLimits::default());
        gpu.set_size(ViewportSize::new(16, 16));
        let mesh = gpu.upload_mesh(&quad()).unwrap();
        let mut scene = SceneGraph::new();
        scene.set_background(Background::Color(Vec3::new(0.0, 0.0, 1.0)));
        scene.add(
            "quad",
            Transform::default(),
            NodeKind::Mesh {
                mesh,
                material: Material::unlit(Vec4::new(1.0, 0.0, 0.0, 1.0)),
            },
        );
        gpu.render(&scene, &looking_at_quad());

        let fb = gpu.framebuffer();
        assert_eq!(fb.len(), 256);
        assert_eq!(fb[8 * 16 + 8], Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(fb[0], Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(gpu.stats().renders, 1);
    }

    #[test]
    fn back_faces_are_culled_for_front_materials() {
        let mut gpu = SoftwareBackend::new(DeviceLimits::default());
        gpu.set_size(ViewportSize::new(4, 4));
        let mesh = gpu.upload_mesh(&quad()).unwrap();
        let mut scene = SceneGraph::new();
        let node = scene.add(
            "quad",
            // Turned around: camera sees the back.
            Transform {
                rotation: glam::Quat::from_rotation_y(std::f32::consts::PI),
                ..Transform::default()
            },
            NodeKind::Mesh {
                mesh,
                material: Material::unlit(Vec4::ONE),
            },
        );
        gpu.render(&scene, &looking_at_quad());
        assert_eq!(gpu.framebuffer()[5].x, 0.0);

        scene.set_material(
            node,
            Material {
                side: Side::Double,
                ..Material::unlit(Vec4::ONE)
            },
        );
        gpu.render(&scene, &looking_at_quad());
        assert_eq!(gpu.framebuffer()[5].x, 1.0);
    }

    #[test]
    fn lit_quad_responds_to_light_and_exposure() {
        let mut gpu = SoftwareBackend::new(DeviceLimits::default());
        gpu.set_size(ViewportSize::new(4, 4));
        let mesh = gpu.upload_mesh(&quad()).unwrap();
        let mut scene = SceneGraph::new();
        scene.add(
            "quad",
            Transform::default(),
            NodeKind::Mesh {
                mesh,
                material: Material::default(),
            },
        );
        gpu.render(&scene, &looking_at_quad());
        assert_eq!(gpu.framebuffer()[5].x, 0.0);

        scene.add(
            "sun",
            Transform::from_position(Vec3::Z),
            NodeKind::Light(DirectionalLight::default()),
        );
        gpu.render(&scene, &looking_at_quad());
        assert!((gpu.framebuffer()[5].x - 1.0).abs() < 1e-5);

        gpu.set_exposure(0.5);
        gpu.render(&scene, &looking_at_quad());
        assert!((gpu.framebuffer()[5].x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn standard_targets_clamp_and_quantize() {
        assert_eq!(
            store(Vec4::new(2.0, -1.0, 0.5, 1.0), PixelFormat::Standard),
            Vec4::new(1.0, 0.0, 128.0 / 255.0, 1.0)
        );
        assert_eq!(
            store(Vec4::new(2.0, -1.0, 0.5, 1.0), PixelFormat::Float),
            Vec4::new(2.0, -1.0, 0.5, 1.0)
        );
    }

    #[test]
    fn environment_reflects_on_metal() {
        let mut gpu = SoftwareBackend::new(DeviceLimits::default());
        gpu.set_size(ViewportSize::new(4, 4));
        let cube = gpu.create_cube_target(4, PixelFormat::Float).unwrap();

        // Fill the cube with a flat green environment via an unlit proxy.
        let sphere = gpu.upload_mesh(&MeshData::uv_sphere(5.0, 16, 8)).unwrap();
        let mut proxy = SceneGraph::new();
        proxy.add(
            "env",
            Transform::default(),
            NodeKind::Mesh {
                mesh: sphere,
                material: Material {
                    side: Side::Back,
                    ..Material::unlit(Vec4::new(0.0, 2.0, 0.0, 1.0))
                },
            },
        );
        gpu.capture_cube(&proxy, &CubeCamera::new(Vec3::ZERO, 0.1, 50.0), &cube);
        assert_eq!(
            gpu.sample_cube(cube.handle, Vec3::X).unwrap(),
            Vec4::new(0.0, 2.0, 0.0, 1.0)
        );

        let mesh = gpu.upload_mesh(&quad()).unwrap();
        let mut scene = SceneGraph::new();
        scene.set_environment(Some(cube.handle));
        scene.add(
            "mirror",
            Transform::default(),
            NodeKind::Mesh {
                mesh,
                material: Material {
                    metallic: 1.0,
                    roughness: 0.0,
                    ..Material::default()
                },
            },
        );
        gpu.render(&scene, &looking_at_quad());
        let centre = gpu.framebuffer()[5];
        assert!((centre.y - 2.0).abs() < 1e-4);
        assert_eq!(centre.x, 0.0);
    }

    #[test]
    fn srgb_encoding_endpoints() {
        assert_eq!(encode_srgb(0.0), 0);
        assert_eq!(encode_srgb(1.0), 255);
        assert_eq!(encode_srgb(4.0), 255);
        assert_eq!(encode_srgb(0.2158), 128);
    }
}
