use glam::{Quat, Vec3};
use prism_assets::{
    AssetError, AssetLoader, AssetRegistry, AssetSummary, EnvironmentAsset, ModelAsset,
    PendingAsset,
};
use prism_common::{NodeId, Transform, ViewportSize};
use prism_render::{
    OrbitControls, PerspectiveCamera, ReflectionCapture, RenderBackend, RenderError,
};
use prism_scene::{Background, DirectionalLight, NodeKind, SceneGraph};
use std::path::PathBuf;

use crate::canvas::Canvas;
use crate::config::{ConfigError, ModelEntry, ViewerConfig};

#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("render error: {0}")]
    Render(#[from] RenderError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

struct PendingModel {
    entry: ModelEntry,
    load: PendingAsset<ModelAsset>,
}

/// The running viewer: one backend, one main scene, one camera, one
/// reflection capture unit.
pub struct Viewer<B: RenderBackend> {
    backend: B,
    config: ViewerConfig,
    scene: SceneGraph,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    reflection: ReflectionCapture,
    last_size: ViewportSize,
    loader: AssetLoader,
    pending_models: Vec<PendingModel>,
    pending_environment: Option<PendingAsset<EnvironmentAsset>>,
    registry: AssetRegistry,
    models: Vec<NodeId>,
    frames: u64,
}

impl<B: RenderBackend> Viewer<B> {
    /// Build the scene, size the backend to the canvas and allocate the
    /// reflection target. Allocation failure aborts construction.
    pub fn new(
        mut backend: B,
        config: ViewerConfig,
        canvas_size: ViewportSize,
    ) -> Result<Self, ViewerError> {
        backend.set_size(canvas_size);
        backend.set_exposure(config.exposure);

        let mut scene = SceneGraph::new();
        for light in &config.lights {
            scene.add(
                light.name.clone(),
                Transform::from_position(light.direction.normalize_or_zero()),
                NodeKind::Light(DirectionalLight {
                    color: light.color,
                    intensity: light.intensity,
                }),
            );
        }

        let camera = config.build_camera(canvas_size.aspect());
        let mut controls = OrbitControls::new(config.camera.target);
        controls.enable_damping = config.controls.enable_damping;
        controls.damping_factor = config.controls.damping_factor;
        controls.set_viewport_height(canvas_size.height as f32);

        let reflection = ReflectionCapture::new(&mut backend, config.capture_settings())?;
        scene.set_environment(Some(reflection.reflection_texture().handle));
        scene.set_background(Background::Environment);

        tracing::info!(
            width = canvas_size.width,
            height = canvas_size.height,
            resolution = reflection.resolution(),
            format = %reflection.format(),
            "viewer ready"
        );

        Ok(Self {
            backend,
            config,
            scene,
            camera,
            controls,
            reflection,
            last_size: canvas_size,
            loader: AssetLoader::new(),
            pending_models: Vec::new(),
            pending_environment: None,
            registry: AssetRegistry::new(),
            models: Vec::new(),
            frames: 0,
        })
    }

    /// Start loading every model and the environment named in the config.
    pub fn load_configured_assets(&mut self) {
        for entry in self.config.models.clone() {
            self.request_model(entry);
        }
        if let Some(path) = self.config.environment.clone() {
            self.request_environment(path);
        }
    }

    pub fn request_model(&mut self, entry: ModelEntry) {
        tracing::info!(path = %entry.path.display(), "loading model");
        let load = self.loader.load_model(entry.path.clone());
        self.pending_models.push(PendingModel { entry, load });
    }

    /// Start loading a reflection image. A newer request supersedes one still
    /// in flight.
    pub fn request_environment(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        tracing::info!(path = %path.display(), "loading environment");
        let load = self.loader.load_environment(path);
        if let Some(previous) = self.pending_environment.replace(load) {
            tracing::debug!(path = %previous.path().display(), "superseded environment load");
        }
    }

    /// Block until every in-flight load resolves, then integrate the results.
    /// Headless runs use this; the interactive loop only polls.
    pub fn finish_loads(&mut self) {
        for pending in std::mem::take(&mut self.pending_models) {
            match pending.load.wait() {
                Ok(model) => self.add_model(&pending.entry, model),
                Err(e) => log_failed_load(&pending.entry.path, &e),
            }
        }
        if let Some(pending) = self.pending_environment.take() {
            let path = pending.path().to_path_buf();
            match pending.wait() {
                Ok(env) => self.set_environment(env),
                Err(e) => log_failed_load(&path, &e),
            }
        }
    }

    /// Advance one frame.
    pub fn tick(&mut self, dt: f32, canvas: &impl Canvas) {
        self.integrate_loads();

        self.controls.update(&mut self.camera);

        let size = canvas.size();
        if size != self.last_size {
            tracing::debug!(width = size.width, height = size.height, "canvas resized");
            self.backend.set_size(size);
            self.camera.set_aspect(size.aspect());
            self.controls.set_viewport_height(size.height as f32);
            self.last_size = size;
        }

        self.reflection.tick(&mut self.backend, dt);

        self.backend.render(&self.scene, &self.camera);
        self.frames += 1;
    }

    fn integrate_loads(&mut self) {
        let mut still_pending = Vec::with_capacity(self.pending_models.len());
        for mut pending in std::mem::take(&mut self.pending_models) {
            match pending.load.poll() {
                None => still_pending.push(pending),
                Some(Ok(model)) => self.add_model(&pending.entry, model),
                Some(Err(e)) => log_failed_load(&pending.entry.path, &e),
            }
        }
        self.pending_models = still_pending;

        if let Some(pending) = &mut self.pending_environment {
            match pending.poll() {
                None => {}
                Some(result) => {
                    let path = pending.path().to_path_buf();
                    self.pending_environment = None;
                    match result {
                        Ok(env) => self.set_environment(env),
                        Err(e) => log_failed_load(&path, &e),
                    }
                }
            }
        }
    }

    fn add_model(&mut self, entry: &ModelEntry, model: ModelAsset) {
        let textures: Vec<_> = model
            .textures
            .iter()
            .map(|image| match self.backend.upload_texture(image) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!(model = %model.name, "texture upload failed: {e}");
                    None
                }
            })
            .collect();

        let root = self.scene.add(
            model.name.clone(),
            Transform {
                position: entry.position,
                rotation: Quat::from_rotation_y(entry.rotation_y_degrees.to_radians()),
                scale: Vec3::splat(entry.scale),
            },
            NodeKind::Group,
        );

        let mut added = 0;
        for primitive in &model.primitives {
            let mesh = match self.backend.upload_mesh(&primitive.mesh) {
                Ok(mesh) => mesh,
                Err(e) => {
                    tracing::warn!(model = %model.name, primitive = %primitive.name, "{e}");
                    continue;
                }
            };
            let mut material = primitive.material.clone();
            material.base_color_texture = primitive
                .texture
                .and_then(|i| textures.get(i).copied().flatten());
            match self.scene.add_child(
                root,
                primitive.name.clone(),
                Transform::from_matrix(primitive.transform),
                NodeKind::Mesh { mesh, material },
            ) {
                Ok(_) => added += 1,
                Err(e) => tracing::warn!(model = %model.name, "{e}"),
            }
        }

        self.registry.register(AssetSummary::of_model(&model));
        self.models.push(root);
        tracing::info!(model = %model.name, id = %model.id, primitives = added, "model added");
    }

    fn set_environment(&mut self, env: EnvironmentAsset) {
        match self.backend.upload_texture(&env.image) {
            Ok(handle) => {
                if let Some(previous) = self.reflection.set_reflection_image(handle) {
                    self.backend.release_texture(previous);
                }
                self.registry.register(AssetSummary::of_environment(&env));
                tracing::info!(environment = %env.name, id = %env.id, "reflection image set");
            }
            Err(e) => tracing::warn!(environment = %env.name, "environment upload failed: {e}"),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn reflection(&self) -> &ReflectionCapture {
        &self.reflection
    }

    pub fn reflection_mut(&mut self) -> &mut ReflectionCapture {
        &mut self.reflection
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    /// Root nodes of the models added so far.
    pub fn models(&self) -> &[NodeId] {
        &self.models
    }

    /// Loads still in flight.
    pub fn pending_loads(&self) -> usize {
        self.pending_models.len() + usize::from(self.pending_environment.is_some())
    }

    /// Canvas size seen on the last tick.
    pub fn last_size(&self) -> ViewportSize {
        self.last_size
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }
}

fn log_failed_load(path: &std::path::Path, error: &AssetError) {
    tracing::warn!(path = %path.display(), "asset load failed, continuing without it: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_common::PixelFormat;
    use prism_render::{BackendCall, CubeFace, DeviceLimits, SoftwareBackend};

    fn small_config() -> ViewerConfig {
        let mut config = ViewerConfig::default();
        config.capture.resolution = 4;
        config
    }

    fn headless() -> SoftwareBackend {
        let mut backend = SoftwareBackend::new(DeviceLimits::default());
        backend.set_rasterize(false);
        backend
    }

    fn viewer(size: ViewportSize) -> Viewer<SoftwareBackend> {
        Viewer::new(headless(), small_config(), size).unwrap()
    }

    /// Tick until nothing is loading, with an upper bound.
    fn settle(viewer: &mut Viewer<SoftwareBackend>, size: ViewportSize) {
        for _ in 0..2000 {
            if viewer.pending_loads() == 0 {
                return;
            }
            viewer.tick(0.0, &size);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        panic!("loads did not settle");
    }

    #[test]
    fn startup_sizes_once_and_wires_environment() {
        let size = ViewportSize::new(800, 600);
        let viewer = viewer(size);
        assert_eq!(viewer.backend().stats().resizes, 1);
        assert_eq!(viewer.backend().size(), size);
        assert_eq!(viewer.camera().aspect, 800.0 / 600.0);
        let handle = viewer.reflection().reflection_texture().handle;
        assert_eq!(viewer.scene().environment(), Some(handle));
        assert_eq!(viewer.scene().background(), Background::Environment);
    }

    #[test]
    fn default_scene_has_the_sun() {
        let viewer = viewer(ViewportSize::new(64, 64));
        let lights = viewer.scene().lights();
        assert_eq!(lights.len(), 1);
        let expected = Vec3::new(1.0, 1.0, 0.5).normalize();
        assert!((lights[0].direction - expected).length() < 1e-5);
        assert_eq!(lights[0].intensity, 1.0);
    }

    #[test]
    fn resize_happens_once_per_distinct_size() {
        let mut viewer = viewer(ViewportSize::new(800, 600));
        let a = ViewportSize::new(800, 600);
        let b = ViewportSize::new(1024, 300);

        viewer.tick(0.016, &a);
        viewer.tick(0.016, &a);
        assert_eq!(viewer.backend().stats().resizes, 1);

        viewer.tick(0.016, &b);
        assert_eq!(viewer.backend().stats().resizes, 2);
        assert_eq!(viewer.camera().aspect, 1024.0 / 300.0);
        viewer.tick(0.016, &b);
        viewer.tick(0.016, &b);
        assert_eq!(viewer.backend().stats().resizes, 2);

        viewer.tick(0.016, &a);
        assert_eq!(viewer.backend().stats().resizes, 3);
        assert_eq!(viewer.camera().aspect, 800.0 / 600.0);
        assert_eq!(viewer.last_size(), a);
    }

    #[test]
    fn each_tick_captures_then_renders() {
        let size = ViewportSize::new(32, 32);
        let mut viewer = viewer(size);
        for _ in 0..3 {
            viewer.tick(0.016, &size);
        }
        let stats = viewer.backend().stats();
        assert_eq!(stats.captures, 3);
        assert_eq!(stats.renders, 3);
        assert_eq!(viewer.frame_count(), 3);
        assert!((viewer.reflection().angle() - 3.0 * 0.1 * 0.016).abs() < 1e-6);
    }

    #[test]
    fn resize_precedes_capture_precedes_render() {
        let start = ViewportSize::new(32, 32);
        let mut viewer = viewer(start);
        viewer.tick(0.016, &start);
        viewer.tick(0.016, &ViewportSize::new(64, 16));

        use BackendCall::*;
        assert_eq!(
            viewer.backend().calls(),
            &[Resize, Capture, Render, Resize, Capture, Render]
        );
    }

    #[test]
    fn oversize_capture_aborts_construction() {
        let backend = SoftwareBackend::new(DeviceLimits {
            max_cube_dimension: 128,
            float_targets: true,
        });
        let result = Viewer::new(backend, ViewerConfig::default(), ViewportSize::new(64, 64));
        assert!(matches!(
            result,
            Err(ViewerError::Render(RenderError::ResourceAllocation {
                resolution: 256,
                format: PixelFormat::Float,
                ..
            }))
        ));
    }

    #[test]
    fn environment_load_reaches_the_proxy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([255, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let size = ViewportSize::new(16, 16);
        let mut backend = SoftwareBackend::new(DeviceLimits::default());
        backend.set_rasterize(true);
        let mut viewer = Viewer::new(backend, small_config(), size).unwrap();
        viewer.request_environment(&path);
        assert_eq!(viewer.pending_loads(), 1);
        settle(&mut viewer, size);

        assert!(viewer.reflection().image().is_some());
        assert_eq!(viewer.registry().len(), 1);

        viewer.tick(0.016, &size);
        let target = viewer.reflection().reflection_texture().handle;
        let face = viewer.backend().cube_face(target, CubeFace::PositiveZ).unwrap();
        assert!(face.iter().all(|t| t.x > 0.99 && t.y < 0.01));
    }

    #[test]
    fn newer_environment_request_wins() {
        let dir = tempfile::tempdir().unwrap();
        let red = dir.path().join("red.png");
        let green = dir.path().join("green.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([255, 0, 0, 255]))
            .save(&red)
            .unwrap();
        image::RgbaImage::from_pixel(8, 4, image::Rgba([0, 255, 0, 255]))
            .save(&green)
            .unwrap();

        let size = ViewportSize::new(16, 16);
        let mut backend = SoftwareBackend::new(DeviceLimits::default());
        backend.set_rasterize(true);
        let mut viewer = Viewer::new(backend, small_config(), size).unwrap();
        viewer.request_environment(&red);
        viewer.request_environment(&green);
        assert_eq!(viewer.pending_loads(), 1);
        viewer.finish_loads();
        assert_eq!(viewer.registry().len(), 1);

        viewer.tick(0.016, &size);
        let target = viewer.reflection().reflection_texture().handle;
        let face = viewer.backend().cube_face(target, CubeFace::PositiveZ).unwrap();
        assert!(face.iter().all(|t| t.y > 0.99 && t.x < 0.01));
    }

    #[test]
    fn replaced_environment_texture_is_released() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("first.png");
        let second = dir.path().join("second.png");
        image::RgbaImage::from_pixel(8, 4, image::Rgba([10, 20, 30, 255]))
            .save(&first)
            .unwrap();
        image::RgbaImage::from_pixel(8, 4, image::Rgba([40, 50, 60, 255]))
            .save(&second)
            .unwrap();

        let mut viewer = viewer(ViewportSize::new(16, 16));
        viewer.request_environment(&first);
        viewer.finish_loads();
        let old = viewer.reflection().image();
        assert_eq!(viewer.backend().stats().textures, 1);

        viewer.request_environment(&second);
        viewer.finish_loads();
        assert_ne!(viewer.reflection().image(), old);
        assert_eq!(viewer.backend().stats().textures, 1);
        assert_eq!(viewer.registry().len(), 2);
    }

    #[test]
    fn failed_loads_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let size = ViewportSize::new(16, 16);
        let mut viewer = viewer(size);
        viewer.request_model(ModelEntry::at_origin(dir.path().join("missing.glb")));
        viewer.request_environment(dir.path().join("missing.hdr"));
        settle(&mut viewer, size);

        assert_eq!(viewer.scene().mesh_count(), 0);
        assert!(viewer.reflection().image().is_none());
        assert!(viewer.registry().is_empty());
    }

    #[test]
    fn model_load_adds_meshes_under_a_group() {
        let dir = tempfile::tempdir().unwrap();
        let mut bin = Vec::new();
        for v in [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0] {
            bin.extend_from_slice(&v.to_le_bytes());
        }
        std::fs::write(dir.path().join("tri.bin"), &bin).unwrap();
        let gltf = r#"{
            "asset": { "version": "2.0" },
            "scenes": [{ "nodes": [0] }],
            "nodes": [{ "mesh": 0 }],
            "meshes": [{ "name": "tri", "primitives": [{ "attributes": { "POSITION": 0 } }] }],
            "buffers": [{ "uri": "tri.bin", "byteLength": 36 }],
            "bufferViews": [{ "buffer": 0, "byteLength": 36 }],
            "accessors": [{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                            "min": [0, 0, 0], "max": [1, 1, 0] }]
        }"#;
        let path = dir.path().join("tri.gltf");
        std::fs::write(&path, gltf).unwrap();

        let size = ViewportSize::new(16, 16);
        let mut viewer = viewer(size);
        viewer.request_model(ModelEntry {
            position: Vec3::new(0.0, 2.0, 0.0),
            ..ModelEntry::at_origin(&path)
        });
        settle(&mut viewer, size);

        assert_eq!(viewer.models().len(), 1);
        assert_eq!(viewer.scene().mesh_count(), 1);
        let meshes = viewer.scene().meshes();
        let p = meshes[0].world.transform_point3(Vec3::X);
        assert!((p - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);
        assert_eq!(viewer.registry().len(), 1);
    }

    #[test]
    fn finish_loads_integrates_without_ticking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 0, 255, 255]))
            .save(&path)
            .unwrap();
        let mut viewer = viewer(ViewportSize::new(16, 16));
        viewer.request_environment(&path);
        viewer.request_model(ModelEntry::at_origin(dir.path().join("missing.glb")));
        viewer.finish_loads();

        assert_eq!(viewer.pending_loads(), 0);
        assert!(viewer.reflection().image().is_some());
        assert_eq!(viewer.registry().len(), 1);
        assert_eq!(viewer.frame_count(), 0);
    }

    #[test]
    fn negative_delta_does_not_rewind() {
        let size = ViewportSize::new(16, 16);
        let mut viewer = viewer(size);
        viewer.tick(0.5, &size);
        viewer.tick(-1.0, &size);
        viewer.tick(f32::NAN, &size);
        viewer.tick(f32::INFINITY, &size);
        assert!((viewer.reflection().angle() - 0.05).abs() < 1e-6);
    }
}
