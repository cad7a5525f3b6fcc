use glam::Vec4;
use prism_common::TextureHandle;
use serde::{Deserialize, Serialize};

/// Lighting model applied to a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Shading {
    /// Base color only, no lights or reflections.
    Unlit,
    /// Lambert diffuse from lights plus environment reflection.
    #[default]
    Standard,
}

/// Which triangle faces are drawn. Front faces wind counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

impl Side {
    /// Whether a triangle seen from its front (or back) is drawn.
    pub fn accepts(&self, front_facing: bool) -> bool {
        match self {
            Self::Front => front_facing,
            Self::Back => !front_facing,
            Self::Double => true,
        }
    }
}

/// Surface description shared by all backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Linear RGBA multiplier.
    pub base_color: Vec4,
    pub base_color_texture: Option<TextureHandle>,
    pub metallic: f32,
    pub roughness: f32,
    pub shading: Shading,
    pub side: Side,
    /// Scale applied to the scene environment's contribution.
    pub env_intensity: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            base_color_texture: None,
            metallic: 0.0,
            roughness: 1.0,
            shading: Shading::Standard,
            side: Side::Front,
            env_intensity: 1.0,
        }
    }
}

impl Material {
    /// Flat, unlit material.
    pub fn unlit(base_color: Vec4) -> Self {
        Self {
            base_color,
            shading: Shading::Unlit,
            ..Self::default()
        }
    }
}
