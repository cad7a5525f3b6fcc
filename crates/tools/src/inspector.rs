use glam::Vec3;
use prism_common::{NodeId, PixelFormat};
use prism_render::RenderBackend;
use prism_scene::{NodeKind, SceneGraph};
use prism_viewer::Viewer;
use serde::Serialize;
use std::collections::VecDeque;

/// Viewer inspector for developer tooling.
///
/// Read-only queries against a running viewer for the desktop overlay and
/// the CLI.
pub struct ViewerInspector;

impl ViewerInspector {
    pub fn summary<B: RenderBackend>(viewer: &Viewer<B>) -> ViewerSummary {
        let scene = viewer.scene();
        let reflection = viewer.reflection();
        let camera = viewer.camera();
        let size = viewer.last_size();
        ViewerSummary {
            frames: viewer.frame_count(),
            width: size.width,
            height: size.height,
            nodes: scene.len(),
            meshes: scene.mesh_count(),
            lights: scene.lights().len(),
            models: viewer.models().len(),
            assets: viewer.registry().len(),
            pending_loads: viewer.pending_loads(),
            has_reflection_image: reflection.image().is_some(),
            reflection_angle: reflection.angle(),
            reflection_speed: reflection.speed(),
            captures: reflection.capture_count(),
            capture_resolution: reflection.resolution(),
            capture_format: reflection.format(),
            camera_position: camera.position,
            camera_target: camera.target,
            aspect: camera.aspect,
        }
    }

    pub fn inspect_node(scene: &SceneGraph, id: NodeId) -> Option<NodeInfo> {
        scene.get(id).map(|node| {
            let kind = match &node.kind {
                NodeKind::Group => "group",
                NodeKind::Mesh { .. } => "mesh",
                NodeKind::Light(_) => "light",
            };
            NodeInfo {
                id,
                name: node.name.clone(),
                kind,
                position: node.transform.position,
                scale: node.transform.scale,
                children: node.children().len(),
                visible: node.visible,
            }
        })
    }

    /// Every node, roots first, in insertion order within each level.
    pub fn list_nodes(scene: &SceneGraph) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(scene.len());
        let mut queue: VecDeque<NodeId> = scene.roots().iter().copied().collect();
        while let Some(id) = queue.pop_front() {
            out.push(id);
            if let Some(node) = scene.get(id) {
                queue.extend(node.children().iter().copied());
            }
        }
        out
    }
}

/// Snapshot of viewer state.
#[derive(Debug, Clone, Serialize)]
pub struct ViewerSummary {
    pub frames: u64,
    pub width: u32,
    pub height: u32,
    pub nodes: usize,
    pub meshes: usize,
    pub lights: usize,
    pub models: usize,
    pub assets: usize,
    pub pending_loads: usize,
    pub has_reflection_image: bool,
    pub reflection_angle: f32,
    pub reflection_speed: f32,
    pub captures: u64,
    pub capture_resolution: u32,
    pub capture_format: PixelFormat,
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    pub aspect: f32,
}

impl std::fmt::Display for ViewerSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Viewer: frames={} size={}x{} nodes={} meshes={} pending={} reflection: angle={:.4} captures={} {}x{} {}",
            self.frames,
            self.width,
            self.height,
            self.nodes,
            self.meshes,
            self.pending_loads,
            self.reflection_angle,
            self.captures,
            self.capture_resolution,
            self.capture_resolution,
            self.capture_format,
        )
    }
}

/// Detailed info about a single scene node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub position: Vec3,
    pub scale: Vec3,
    pub children: usize,
    pub visible: bool,
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {} pos=({:.2}, {:.2}, {:.2}) children={}",
            self.name,
            self.id.short(),
            self.kind,
            self.position.x,
            self.position.y,
            self.position.z,
            self.children,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_common::{Transform, ViewportSize};
    use prism_render::{DeviceLimits, SoftwareBackend};
    use prism_viewer::ViewerConfig;

    fn viewer() -> Viewer<SoftwareBackend> {
        let mut backend = SoftwareBackend::new(DeviceLimits::default());
        backend.set_rasterize(false);
        let mut config = ViewerConfig::default();
        config.capture.resolution = 4;
        Viewer::new(backend, config, ViewportSize::new(320, 240)).unwrap()
    }

    #[test]
    fn summary_of_fresh_viewer() {
        let summary = ViewerInspector::summary(&viewer());
        assert_eq!(summary.frames, 0);
        assert_eq!((summary.width, summary.height), (320, 240));
        assert_eq!(summary.lights, 1);
        assert_eq!(summary.meshes, 0);
        assert_eq!(summary.captures, 0);
        assert_eq!(summary.capture_resolution, 4);
        assert!(!summary.has_reflection_image);
    }

    #[test]
    fn summary_tracks_ticks() {
        let mut viewer = viewer();
        let size = ViewportSize::new(320, 240);
        viewer.tick(0.5, &size);
        viewer.tick(0.5, &size);
        let summary = ViewerInspector::summary(&viewer);
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.captures, 2);
        assert!((summary.reflection_angle - 0.1).abs() < 1e-6);
        assert!(format!("{summary}").contains("frames=2"));
    }

    #[test]
    fn list_and_inspect_nodes() {
        let mut scene = SceneGraph::new();
        let root = scene.add("root", Transform::default(), NodeKind::Group);
        let child = scene
            .add_child(
                root,
                "child",
                Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
                NodeKind::Group,
            )
            .unwrap();

        assert_eq!(ViewerInspector::list_nodes(&scene), vec![root, child]);
        let info = ViewerInspector::inspect_node(&scene, child).unwrap();
        assert_eq!(info.name, "child");
        assert_eq!(info.kind, "group");
        assert_eq!(info.position, Vec3::new(1.0, 2.0, 3.0));
        assert!(ViewerInspector::inspect_node(&scene, NodeId::new()).is_none());
        assert_eq!(ViewerInspector::inspect_node(&scene, root).unwrap().children, 1);
    }
}
