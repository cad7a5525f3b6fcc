//! Asset pipeline: glTF models and equirectangular environment images.
//!
//! Decoding happens on worker threads; callers receive a [`PendingAsset`] and
//! poll it from their frame loop. Every decoded asset carries a
//! content-addressed [`AssetId`] computed from the source file's bytes.

mod environment;
mod id;
mod loader;
mod model;
mod registry;

pub use environment::{EnvironmentAsset, decode_environment};
pub use id::AssetId;
pub use loader::{AssetLoader, PendingAsset};
pub use model::{ModelAsset, ModelPrimitive, decode_model};
pub use registry::{AssetKind, AssetRegistry, AssetSummary};

/// Errors from asset operations.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("model {0} contains no triangle meshes")]
    EmptyModel(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid asset data: {0}")]
    Invalid(#[from] prism_scene::SceneError),
    #[error("asset worker for {0} exited without a result")]
    Disconnected(String),
}

pub fn crate_info() -> &'static str {
    "prism-assets v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("assets"));
    }
}
