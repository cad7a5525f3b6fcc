use glam::{Vec2, Vec4};

use crate::graph::SceneError;

/// How stored 8-bit values map to linear light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Linear,
}

/// Tightly packed RGBA pixels, row-major, top row first.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePixels {
    Rgba8(Vec<u8>),
    Rgba32F(Vec<f32>),
}

/// A decoded image ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub pixels: ImagePixels,
}

impl ImageData {
    pub fn rgba8(
        width: u32,
        height: u32,
        color_space: ColorSpace,
        pixels: Vec<u8>,
    ) -> Result<Self, SceneError> {
        check_len(width, height, pixels.len())?;
        Ok(Self {
            width,
            height,
            color_space,
            pixels: ImagePixels::Rgba8(pixels),
        })
    }

    /// Float pixels are always linear.
    pub fn rgba32f(width: u32, height: u32, pixels: Vec<f32>) -> Result<Self, SceneError> {
        check_len(width, height, pixels.len())?;
        Ok(Self {
            width,
            height,
            color_space: ColorSpace::Linear,
            pixels: ImagePixels::Rgba32F(pixels),
        })
    }

    /// A 1x1 linear image of a single color.
    pub fn solid(color: Vec4) -> Self {
        Self {
            width: 1,
            height: 1,
            color_space: ColorSpace::Linear,
            pixels: ImagePixels::Rgba32F(color.to_array().to_vec()),
        }
    }

    pub fn is_hdr(&self) -> bool {
        matches!(self.pixels, ImagePixels::Rgba32F(_))
    }

    /// Linear RGBA of one texel. Coordinates are clamped to the image.
    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        let x = x.min(self.width.saturating_sub(1)) as usize;
        let y = y.min(self.height.saturating_sub(1)) as usize;
        let i = (y * self.width as usize + x) * 4;
        match &self.pixels {
            ImagePixels::Rgba32F(p) => Vec4::new(p[i], p[i + 1], p[i + 2], p[i + 3]),
            ImagePixels::Rgba8(p) => {
                let channel = |v: u8| {
                    let c = v as f32 / 255.0;
                    match self.color_space {
                        ColorSpace::Srgb => srgb_to_linear(c),
                        ColorSpace::Linear => c,
                    }
                };
                Vec4::new(
                    channel(p[i]),
                    channel(p[i + 1]),
                    channel(p[i + 2]),
                    p[i + 3] as f32 / 255.0,
                )
            }
        }
    }

    /// Nearest-texel lookup. `u` repeats, `v` clamps; (0, 0) is the top-left corner.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::ZERO;
        }
        let u = uv.x.rem_euclid(1.0);
        let v = uv.y.clamp(0.0, 1.0);
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        self.texel(x, y)
    }

    /// All pixels as linear RGBA floats.
    pub fn to_linear_f32(&self) -> Vec<f32> {
        match (&self.pixels, self.color_space) {
            (ImagePixels::Rgba32F(p), _) => p.clone(),
            (ImagePixels::Rgba8(p), ColorSpace::Linear) => {
                p.iter().map(|v| *v as f32 / 255.0).collect()
            }
            (ImagePixels::Rgba8(p), ColorSpace::Srgb) => p
                .chunks_exact(4)
                .flat_map(|px| {
                    [
                        srgb_to_linear(px[0] as f32 / 255.0),
                        srgb_to_linear(px[1] as f32 / 255.0),
                        srgb_to_linear(px[2] as f32 / 255.0),
                        px[3] as f32 / 255.0,
                    ]
                })
                .collect(),
        }
    }
}

fn check_len(width: u32, height: u32, actual: usize) -> Result<(), SceneError> {
    let expected = width as usize * height as usize * 4;
    if expected != actual {
        return Err(SceneError::InvalidImage { expected, actual });
    }
    Ok(())
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        let err = ImageData::rgba8(2, 2, ColorSpace::Srgb, vec![0; 15]).unwrap_err();
        assert!(matches!(
            err,
            SceneError::InvalidImage {
                expected: 16,
                actual: 15
            }
        ));
    }

    #[test]
    fn srgb_texels_are_linearized() {
        let img = ImageData::rgba8(1, 1, ColorSpace::Srgb, vec![255, 128, 0, 255]).unwrap();
        let t = img.texel(0, 0);
        assert!((t.x - 1.0).abs() < 1e-6);
        assert!((t.y - 0.2158).abs() < 1e-3);
        assert_eq!(t.z, 0.0);
        assert_eq!(t.w, 1.0);
    }

    #[test]
    fn sample_wraps_u_and_clamps_v() {
        // 2x1: red, green
        let img = ImageData::rgba32f(2, 1, vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]).unwrap();
        assert_eq!(img.sample(Vec2::new(0.25, 0.5)).x, 1.0);
        assert_eq!(img.sample(Vec2::new(0.75, 0.5)).y, 1.0);
        assert_eq!(img.sample(Vec2::new(1.25, 2.0)).x, 1.0);
        assert_eq!(img.sample(Vec2::new(-0.25, -1.0)).y, 1.0);
    }

    #[test]
    fn solid_is_hdr_linear() {
        let img = ImageData::solid(Vec4::new(4.0, 2.0, 1.0, 1.0));
        assert!(img.is_hdr());
        assert_eq!(img.color_space, ColorSpace::Linear);
        assert_eq!(img.to_linear_f32(), vec![4.0, 2.0, 1.0, 1.0]);
    }
}
