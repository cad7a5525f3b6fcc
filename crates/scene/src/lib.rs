//! Scene graph: a mutable tree of spatial nodes plus the CPU-side data that
//! render backends consume (mesh geometry, materials, images).
//!
//! # Invariants
//! - Every node except a root has exactly one parent, and appears exactly once
//!   in that parent's child list.
//! - Removing a node removes its whole subtree.
//! - The scene only references GPU resources by handle; it never owns them.

mod geometry;
mod graph;
mod image;
mod material;

pub use geometry::{MeshData, equirect_uv};
pub use graph::{
    Background, DirectionalLight, LightInstance, MeshInstance, NodeKind, SceneError, SceneGraph,
    SceneNode,
};
pub use image::{ColorSpace, ImageData, ImagePixels};
pub use material::{Material, Shading, Side};

pub fn crate_info() -> &'static str {
    "prism-scene v0.1.0"
}
