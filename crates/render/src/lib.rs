//! Rendering layer: backend contract, cameras, orbit controls and the
//! environment reflection capture.
//!
//! # Invariants
//! - Backends never mutate a scene; they read it and draw.
//! - The reflection target handle is stable for the lifetime of a capture
//!   unit; only its contents change between ticks.
//! - Cube faces are ordered +X, -X, +Y, -Y, +Z, -Z.

mod backend;
mod camera;
mod controls;
mod reflection;
mod software;

pub use backend::{CubeTexture, RenderBackend, RenderError};
pub use camera::{CubeCamera, CubeFace, PerspectiveCamera};
pub use controls::OrbitControls;
pub use reflection::{CaptureSettings, ReflectionCapture};
pub use software::{BackendCall, BackendStats, DeviceLimits, SoftwareBackend};

pub fn crate_info() -> &'static str {
    "prism-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
