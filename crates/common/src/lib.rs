//! Shared types for the prism viewer: node ids, transforms, GPU resource
//! handles and viewport sizes.
//!
//! # Invariants
//! - Handles are plain ids; the backend that issued them owns the resource.

mod types;

pub use types::{MeshHandle, NodeId, PixelFormat, TextureHandle, Transform, ViewportSize};

pub fn crate_info() -> &'static str {
    "prism-common v0.1.0"
}
