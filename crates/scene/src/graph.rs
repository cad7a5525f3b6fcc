use glam::{Mat4, Vec3};
use prism_common::{MeshHandle, NodeId, TextureHandle, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::material::Material;

/// Errors from scene graph operations.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeId),
    #[error("cannot attach {child:?} under {parent:?}: would create a cycle")]
    InvalidParent { parent: NodeId, child: NodeId },
    #[error("invalid mesh: {0}")]
    InvalidMesh(String),
    #[error("image data has {actual} values, expected {expected}")]
    InvalidImage { expected: usize, actual: usize },
}

/// A light that shines from its node's world position toward the origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

/// What a node contributes to the rendered image.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Pure transform node.
    Group,
    Mesh { mesh: MeshHandle, material: Material },
    Light(DirectionalLight),
}

/// How pixels not covered by geometry are filled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Background {
    /// Flat linear color.
    Color(Vec3),
    /// Sample the scene's environment texture along the view ray.
    Environment,
}

impl Default for Background {
    fn default() -> Self {
        Self::Color(Vec3::ZERO)
    }
}

/// A node in the scene tree.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    pub transform: Transform,
    pub kind: NodeKind,
    pub visible: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl SceneNode {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// A mesh node flattened for drawing.
#[derive(Debug, Clone, Copy)]
pub struct MeshInstance<'a> {
    pub node: NodeId,
    pub world: Mat4,
    pub mesh: MeshHandle,
    pub material: &'a Material,
}

/// A light flattened for shading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightInstance {
    /// Unit vector pointing from the lit surface toward the light.
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

/// A mutable tree of spatial nodes forming a world to be drawn.
///
/// Nodes live in a BTreeMap keyed by id; roots are kept in insertion order so
/// traversal is stable between frames.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, SceneNode>,
    roots: Vec<NodeId>,
    environment: Option<TextureHandle>,
    background: Background,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the scene.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes, in insertion order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Add a node at the top level. Returns its id.
    pub fn add(&mut self, name: impl Into<String>, transform: Transform, kind: NodeKind) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, Self::make_node(name.into(), transform, kind, None));
        self.roots.push(id);
        id
    }

    /// Add a node under an existing parent.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        transform: Transform,
        kind: NodeKind,
    ) -> Result<NodeId, SceneError> {
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or(SceneError::NodeNotFound(parent))?;
        let id = NodeId::new();
        parent_node.children.push(id);
        self.nodes
            .insert(id, Self::make_node(name.into(), transform, kind, Some(parent)));
        Ok(id)
    }

    /// Move an existing node (and its subtree) under a new parent, or to the
    /// top level when `parent` is `None`.
    pub fn reparent(&mut self, id: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&id) {
            return Err(SceneError::NodeNotFound(id));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(SceneError::NodeNotFound(p));
            }
            if p == id || self.is_ancestor(id, p) {
                return Err(SceneError::InvalidParent { parent: p, child: id });
            }
        }

        self.detach(id);
        match parent {
            Some(p) => {
                if let Some(node) = self.nodes.get_mut(&p) {
                    node.children.push(id);
                }
            }
            None => self.roots.push(id),
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = parent;
        }
        Ok(())
    }

    /// Remove a node and all of its descendants. Returns the removed node.
    pub fn remove(&mut self, id: NodeId) -> Option<SceneNode> {
        if !self.nodes.contains_key(&id) {
            return None;
        }
        self.detach(id);

        let mut stack = vec![id];
        let mut removed = None;
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(&current) {
                stack.extend(node.children.iter().copied());
                if current == id {
                    removed = Some(node);
                }
            }
        }
        removed
    }

    /// Remove every node. Environment and background are kept.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    /// Get a reference to a node.
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    /// Get a mutable reference to a node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(&id)
    }

    /// Replace a node's local transform.
    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> bool {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.transform = transform;
            true
        } else {
            false
        }
    }

    /// Replace the material of a mesh node. Returns false for other node kinds.
    pub fn set_material(&mut self, id: NodeId, material: Material) -> bool {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(NodeKind::Mesh { material: slot, .. }) => {
                *slot = material;
                true
            }
            _ => false,
        }
    }

    /// Find the first node with the given name.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, node)| node.name == name)
            .map(|(id, _)| *id)
    }

    /// Local-to-world matrix of a node, composing all ancestors.
    pub fn world_matrix(&self, id: NodeId) -> Option<Mat4> {
        let mut node = self.nodes.get(&id)?;
        let mut matrix = node.transform.matrix();
        while let Some(parent) = node.parent {
            node = self.nodes.get(&parent)?;
            matrix = node.transform.matrix() * matrix;
        }
        Some(matrix)
    }

    /// Visible mesh nodes with their world matrices, depth-first from the roots.
    pub fn meshes(&self) -> Vec<MeshInstance<'_>> {
        let mut out = Vec::new();
        self.walk(|id, node, world| {
            if let NodeKind::Mesh { mesh, material } = &node.kind {
                out.push(MeshInstance {
                    node: id,
                    world,
                    mesh: *mesh,
                    material,
                });
            }
        });
        out
    }

    /// Visible directional lights.
    pub fn lights(&self) -> Vec<LightInstance> {
        let mut out = Vec::new();
        self.walk(|_, node, world| {
            if let NodeKind::Light(light) = &node.kind {
                let position = world.transform_point3(Vec3::ZERO);
                let direction = position.try_normalize().unwrap_or(Vec3::Y);
                out.push(LightInstance {
                    direction,
                    color: light.color,
                    intensity: light.intensity,
                });
            }
        });
        out
    }

    /// Number of mesh nodes, visible or not.
    pub fn mesh_count(&self) -> usize {
        self.nodes
            .values()
            .filter(|n| matches!(n.kind, NodeKind::Mesh { .. }))
            .count()
    }

    /// Texture used for ambient reflections, if any.
    pub fn environment(&self) -> Option<TextureHandle> {
        self.environment
    }

    pub fn set_environment(&mut self, texture: Option<TextureHandle>) {
        self.environment = texture;
    }

    pub fn background(&self) -> Background {
        self.background
    }

    pub fn set_background(&mut self, background: Background) {
        self.background = background;
    }

    fn make_node(
        name: String,
        transform: Transform,
        kind: NodeKind,
        parent: Option<NodeId>,
    ) -> SceneNode {
        SceneNode {
            name,
            transform,
            kind,
            visible: true,
            parent,
            children: Vec::new(),
        }
    }

    /// Unlink a node from its parent's child list (or from the roots).
    fn detach(&mut self, id: NodeId) {
        let parent = self.nodes.get(&id).and_then(|n| n.parent);
        match parent {
            Some(p) => {
                if let Some(parent_node) = self.nodes.get_mut(&p) {
                    parent_node.children.retain(|c| *c != id);
                }
            }
            None => self.roots.retain(|r| *r != id),
        }
    }

    /// Whether `ancestor` appears on the parent chain of `node`.
    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.nodes.get(&node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        false
    }

    fn walk<'a>(&'a self, mut visit: impl FnMut(NodeId, &'a SceneNode, Mat4)) {
        let mut stack: Vec<(NodeId, Mat4)> = self
            .roots
            .iter()
            .rev()
            .map(|id| (*id, Mat4::IDENTITY))
            .collect();
        while let Some((id, parent_world)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if !node.visible {
                continue;
            }
            let world = parent_world * node.transform.matrix();
            visit(id, node, world);
            for child in node.children.iter().rev() {
                stack.push((*child, world));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn mesh_kind(id: u64) -> NodeKind {
        NodeKind::Mesh {
            mesh: MeshHandle(id),
            material: Material::default(),
        }
    }

    #[test]
    fn add_and_get() {
        let mut scene = SceneGraph::new();
        let id = scene.add("cube", Transform::default(), mesh_kind(1));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get(id).map(|n| n.name.as_str()), Some("cube"));
        assert_eq!(scene.roots(), &[id]);
    }

    #[test]
    fn child_world_matrix_composes_parent() {
        let mut scene = SceneGraph::new();
        let parent = scene.add(
            "parent",
            Transform::from_position(Vec3::new(1.0, 0.0, 0.0)),
            NodeKind::Group,
        );
        let child = scene
            .add_child(
                parent,
                "child",
                Transform::from_position(Vec3::new(0.0, 2.0, 0.0)),
                mesh_kind(1),
            )
            .unwrap();

        let world = scene.world_matrix(child).unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-6);

        let meshes = scene.meshes();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].node, child);
        assert!((meshes[0].world.transform_point3(Vec3::ZERO) - origin).length() < 1e-6);
    }

    #[test]
    fn add_child_to_missing_parent_fails() {
        let mut scene = SceneGraph::new();
        let result = scene.add_child(NodeId::new(), "orphan", Transform::default(), NodeKind::Group);
        assert!(matches!(result, Err(SceneError::NodeNotFound(_))));
        assert!(scene.is_empty());
    }

    #[test]
    fn remove_drops_subtree() {
        let mut scene = SceneGraph::new();
        let root = scene.add("root", Transform::default(), NodeKind::Group);
        let child = scene
            .add_child(root, "child", Transform::default(), NodeKind::Group)
            .unwrap();
        scene
            .add_child(child, "leaf", Transform::default(), mesh_kind(2))
            .unwrap();
        let other = scene.add("other", Transform::default(), mesh_kind(3));

        let removed = scene.remove(root).unwrap();
        assert_eq!(removed.name, "root");
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.roots(), &[other]);
        assert!(scene.get(child).is_none());
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut scene = SceneGraph::new();
        let a = scene.add("a", Transform::default(), NodeKind::Group);
        let b = scene.add_child(a, "b", Transform::default(), NodeKind::Group).unwrap();

        assert!(matches!(
            scene.reparent(a, Some(b)),
            Err(SceneError::InvalidParent { .. })
        ));

        scene.reparent(b, None).unwrap();
        assert_eq!(scene.roots(), &[a, b]);
        assert!(scene.get(a).unwrap().children().is_empty());
        assert_eq!(scene.get(b).unwrap().parent(), None);
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let mut scene = SceneGraph::new();
        let group = scene.add("group", Transform::default(), NodeKind::Group);
        scene
            .add_child(group, "mesh", Transform::default(), mesh_kind(1))
            .unwrap();
        scene.get_mut(group).unwrap().visible = false;
        assert!(scene.meshes().is_empty());
        assert_eq!(scene.mesh_count(), 1);
    }

    #[test]
    fn light_direction_points_toward_light() {
        let mut scene = SceneGraph::new();
        scene.add(
            "sun",
            Transform::from_position(Vec3::new(2.0, 2.0, 0.0)),
            NodeKind::Light(DirectionalLight::default()),
        );
        let lights = scene.lights();
        assert_eq!(lights.len(), 1);
        let expected = Vec3::new(1.0, 1.0, 0.0).normalize();
        assert!((lights[0].direction - expected).length() < 1e-6);
    }

    #[test]
    fn set_material_only_affects_meshes() {
        let mut scene = SceneGraph::new();
        let mesh = scene.add("mesh", Transform::default(), mesh_kind(1));
        let group = scene.add("group", Transform::default(), NodeKind::Group);
        let red = Material {
            base_color: glam::Vec4::new(1.0, 0.0, 0.0, 1.0),
            ..Material::default()
        };
        assert!(scene.set_material(mesh, red.clone()));
        assert!(!scene.set_material(group, red));

        let meshes = scene.meshes();
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].node, mesh);
        assert_eq!(meshes[0].material.base_color.x, 1.0);
        assert_eq!(meshes[0].material.base_color.y, 0.0);
    }

    #[test]
    fn rotation_applies_to_children() {
        let mut scene = SceneGraph::new();
        let pivot = scene.add(
            "pivot",
            Transform {
                rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                ..Transform::default()
            },
            NodeKind::Group,
        );
        let child = scene
            .add_child(
                pivot,
                "arm",
                Transform::from_position(Vec3::X),
                NodeKind::Group,
            )
            .unwrap();
        let p = scene.world_matrix(child).unwrap().transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn environment_slot() {
        let mut scene = SceneGraph::new();
        assert_eq!(scene.environment(), None);
        scene.set_environment(Some(TextureHandle(7)));
        scene.set_background(Background::Environment);
        scene.clear();
        assert_eq!(scene.environment(), Some(TextureHandle(7)));
        assert_eq!(scene.background(), Background::Environment);
    }
}
