//! Viewer orchestration.
//!
//! Owns one render backend, the main scene, the main camera with its orbit
//! controls and the reflection capture unit, and drives them once per tick in
//! a fixed order: integrate finished loads, update controls, follow canvas
//! size, refresh reflections, render.

mod canvas;
mod clock;
mod config;
mod viewer;

pub use canvas::Canvas;
pub use clock::FrameClock;
pub use config::{
    CameraConfig, CaptureConfig, ConfigError, ControlsConfig, LightConfig, ModelEntry,
    ViewerConfig,
};
pub use viewer::{Viewer, ViewerError};

pub fn crate_info() -> &'static str {
    "prism-viewer v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("viewer"));
    }
}
