use image::{ColorType, DynamicImage};
use prism_scene::ImageData;
use std::path::Path;

use crate::AssetError;
use crate::id::AssetId;

/// An equirectangular panorama decoded to linear RGBA32F.
#[derive(Debug, Clone)]
pub struct EnvironmentAsset {
    pub id: AssetId,
    pub name: String,
    pub image: ImageData,
}

/// Decode any image format the `image` crate understands.
///
/// Float sources (HDR, EXR) are taken as linear; integer sources are treated
/// as sRGB and linearized. A panorama that is not 2:1 is accepted with a
/// warning.
pub fn decode_environment(path: impl AsRef<Path>) -> Result<EnvironmentAsset, AssetError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    let id = AssetId::from_bytes(&bytes);
    let decoded = image::load_from_memory(&bytes)?;
    let image = to_linear(decoded)?;

    if image.width != image.height * 2 {
        tracing::warn!(
            path = %path.display(),
            width = image.width,
            height = image.height,
            "environment image is not 2:1, mapping will stretch"
        );
    }
    tracing::debug!(path = %path.display(), %id, "decoded environment");

    Ok(EnvironmentAsset {
        id,
        name: file_name(path),
        image,
    })
}

fn to_linear(decoded: DynamicImage) -> Result<ImageData, AssetError> {
    let is_float = matches!(decoded.color(), ColorType::Rgb32F | ColorType::Rgba32F);
    let rgba = decoded.to_rgba32f();
    let (width, height) = rgba.dimensions();
    let mut pixels = rgba.into_raw();
    if !is_float {
        for px in pixels.chunks_exact_mut(4) {
            for c in &mut px[..3] {
                *c = srgb_to_linear(*c);
            }
        }
    }
    Ok(ImageData::rgba32f(width, height, pixels)?)
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
