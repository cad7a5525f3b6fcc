//! wgpu render backend for the viewer.
//!
//! Draws scene meshes with the shared unlit/standard shading model, fills
//! the background from the scene environment and renders cubemap captures
//! into six-layer textures.
//!
//! # Invariants
//! - The backend never mutates the scene.
//! - A cube target is never sampled by the capture writing it.
//! - Only the main render applies exposure; captures store linear values.

mod gpu;
mod resources;
mod shaders;

pub use gpu::WgpuBackend;
