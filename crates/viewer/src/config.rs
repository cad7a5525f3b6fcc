use glam::Vec3;
use prism_common::PixelFormat;
use prism_render::{CaptureSettings, PerspectiveCamera};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Reflection capture parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub resolution: u32,
    pub pixel_format: PixelFormat,
    /// Radians per second.
    pub rotation_speed: f32,
    pub sphere_radius: f32,
    pub origin: Vec3,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let settings = CaptureSettings::default();
        Self {
            resolution: settings.resolution,
            pixel_format: settings.format,
            rotation_speed: settings.angular_speed,
            sphere_radius: settings.sphere_radius,
            origin: settings.origin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_degrees: f32,
    pub position: Vec3,
    pub target: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let camera = PerspectiveCamera::default();
        Self {
            fov_degrees: camera.fov_y.to_degrees(),
            position: camera.position,
            target: camera.target,
            near: camera.near,
            far: camera.far,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub enable_damping: bool,
    pub damping_factor: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            enable_damping: false,
            damping_factor: 0.05,
        }
    }
}

/// A directional light shining from `direction` toward the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(default = "default_light_name")]
    pub name: String,
    pub direction: Vec3,
    #[serde(default = "white")]
    pub color: Vec3,
    #[serde(default = "one")]
    pub intensity: f32,
}

impl LightConfig {
    pub fn sun() -> Self {
        Self {
            name: default_light_name(),
            direction: Vec3::new(1.0, 1.0, 0.5).normalize(),
            color: white(),
            intensity: 1.0,
        }
    }
}

/// A model to load at startup and where to put it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default = "one")]
    pub scale: f32,
    #[serde(default)]
    pub rotation_y_degrees: f32,
}

impl ModelEntry {
    pub fn at_origin(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            position: Vec3::ZERO,
            scale: 1.0,
            rotation_y_degrees: 0.0,
        }
    }
}

/// Everything the viewer needs at startup. Every field has a default, so an
/// empty YAML document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub capture: CaptureConfig,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    pub lights: Vec<LightConfig>,
    pub models: Vec<ModelEntry>,
    pub environment: Option<PathBuf>,
    /// Linear tone mapping multiplier.
    pub exposure: f32,
    /// Largest delta, in seconds, a single tick may advance.
    pub max_frame_delta: f32,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            lights: vec![LightConfig::sun()],
            models: Vec::new(),
            environment: None,
            exposure: 1.0,
            max_frame_delta: 0.1,
        }
    }
}

impl ViewerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.as_ref().display(), "loaded viewer config");
        Ok(config)
    }

    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            resolution: self.capture.resolution,
            format: self.capture.pixel_format,
            angular_speed: self.capture.rotation_speed,
            sphere_radius: self.capture.sphere_radius,
            origin: self.capture.origin,
            ..CaptureSettings::default()
        }
    }

    /// Main camera for a canvas of the given aspect ratio.
    pub fn build_camera(&self, aspect: f32) -> PerspectiveCamera {
        PerspectiveCamera {
            position: self.camera.position,
            target: self.camera.target,
            fov_y: self.camera.fov_degrees.to_radians(),
            aspect,
            near: self.camera.near,
            far: self.camera.far,
            ..PerspectiveCamera::default()
        }
    }
}

fn default_light_name() -> String {
    "sun".to_string()
}

fn white() -> Vec3 {
    Vec3::ONE
}

fn one() -> f32 {
    1.0
}
