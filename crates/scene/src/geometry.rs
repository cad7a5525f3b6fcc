use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use crate::graph::SceneError;

/// Indexed triangle mesh. Front faces wind counter-clockwise; texture
/// coordinates use a top-left origin.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub indices: Vec<u32>,
}

impl MeshData {
    /// UV sphere centred on the origin.
    ///
    /// `u` runs around the equator starting at -X and heading toward +Z;
    /// `v` runs from the +Y pole (0) to the -Y pole (1). An equirectangular
    /// image mapped with these coordinates appears upright when viewed from
    /// inside.
    pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let w = width_segments.max(3);
        let h = height_segments.max(2);
        let mut mesh = Self::default();

        for iy in 0..=h {
            let v = iy as f32 / h as f32;
            for ix in 0..=w {
                let u = ix as f32 / w as f32;
                let phi = u * TAU;
                let theta = v * PI;
                let normal = Vec3::new(
                    -phi.cos() * theta.sin(),
                    theta.cos(),
                    phi.sin() * theta.sin(),
                );
                mesh.positions.push(normal * radius);
                mesh.normals.push(normal);
                mesh.uvs.push(Vec2::new(u, v));
            }
        }

        let row = w + 1;
        for iy in 0..h {
            for ix in 0..w {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    mesh.indices.extend_from_slice(&[a, b, d]);
                }
                if iy != h - 1 {
                    mesh.indices.extend_from_slice(&[b, c, d]);
                }
            }
        }
        mesh
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Axis-aligned bounds, or `None` for an empty mesh.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        let first = *self.positions.first()?;
        Some(
            self.positions
                .iter()
                .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p))),
        )
    }

    /// Largest distance of any vertex from the local origin.
    pub fn bounding_radius(&self) -> f32 {
        self.positions
            .iter()
            .map(|p| p.length())
            .fold(0.0, f32::max)
    }

    /// Replace normals with area-weighted face normals.
    pub fn compute_normals(&mut self) {
        let mut normals = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let n = (self.positions[b] - self.positions[a])
                .cross(self.positions[c] - self.positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        self.normals = normals
            .into_iter()
            .map(|n| n.try_normalize().unwrap_or(Vec3::Y))
            .collect();
    }

    /// Check attribute lengths and index bounds.
    pub fn validate(&self) -> Result<(), SceneError> {
        let n = self.positions.len();
        if n == 0 {
            return Err(SceneError::InvalidMesh("no vertices".into()));
        }
        if self.normals.len() != n || self.uvs.len() != n {
            return Err(SceneError::InvalidMesh(format!(
                "attribute length mismatch: {} positions, {} normals, {} uvs",
                n,
                self.normals.len(),
                self.uvs.len()
            )));
        }
        if self.indices.len() % 3 != 0 {
            return Err(SceneError::InvalidMesh(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        if let Some(bad) = self.indices.iter().find(|i| **i as usize >= n) {
            return Err(SceneError::InvalidMesh(format!(
                "index {bad} out of range for {n} vertices"
            )));
        }
        Ok(())
    }
}

/// Texture coordinate on a [`MeshData::uv_sphere`] for a local direction.
pub fn equirect_uv(direction: Vec3) -> Vec2 {
    let d = direction.normalize_or_zero();
    let u = (d.z.atan2(-d.x) / TAU).rem_euclid(1.0);
    let v = d.y.clamp(-1.0, 1.0).acos() / PI;
    Vec2::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sphere_counts() {
        let sphere = MeshData::uv_sphere(1.0, 8, 4);
        assert_eq!(sphere.vertex_count(), 9 * 5);
        // Pole rows contribute one triangle per segment, others two.
        assert_eq!(sphere.triangle_count(), 8 * (4 * 2 - 2));
        sphere.validate().unwrap();
    }

    #[test]
    fn sphere_faces_point_outward() {
        let sphere = MeshData::uv_sphere(2.0, 16, 8);
        for tri in sphere.indices.chunks_exact(3) {
            let [a, b, c] = [
                sphere.positions[tri[0] as usize],
                sphere.positions[tri[1] as usize],
                sphere.positions[tri[2] as usize],
            ];
            let normal = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(normal.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn equirect_uv_matches_sphere_layout() {
        let sphere = MeshData::uv_sphere(1.0, 12, 6);
        // Skip the poles and the u = 1 seam column where u is ambiguous.
        for (p, uv) in sphere.positions.iter().zip(&sphere.uvs) {
            if uv.y <= 0.0 || uv.y >= 1.0 || uv.x >= 1.0 {
                continue;
            }
            let got = equirect_uv(*p);
            assert!((got - *uv).length() < 1e-4, "{p:?}: {got:?} vs {uv:?}");
        }
    }

    #[test]
    fn bounds_and_radius() {
        let sphere = MeshData::uv_sphere(3.0, 8, 4);
        let (min, max) = sphere.bounds().unwrap();
        assert!((max.y - 3.0).abs() < 1e-5);
        assert!((min.y + 3.0).abs() < 1e-5);
        assert!((sphere.bounding_radius() - 3.0).abs() < 1e-5);
        assert!(MeshData::default().bounds().is_none());
    }

    #[test]
    fn validate_catches_bad_index() {
        let mut mesh = MeshData {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: vec![Vec3::Z; 3],
            uvs: vec![Vec2::ZERO; 3],
            indices: vec![0, 1, 3],
        };
        assert!(mesh.validate().is_err());
        mesh.indices = vec![0, 1, 2];
        mesh.validate().unwrap();
    }

    #[test]
    fn computed_normals_follow_winding() {
        let mut mesh = MeshData {
            positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            normals: Vec::new(),
            uvs: vec![Vec2::ZERO; 3],
            indices: vec![0, 1, 2],
        };
        mesh.compute_normals();
        assert!(mesh.normals.iter().all(|n| (*n - Vec3::Z).length() < 1e-6));
    }
}
