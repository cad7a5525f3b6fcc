use glam::{Mat4, Vec2, Vec3, Vec4Swizzles};

/// Perspective camera looking from `position` at `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 2.0),
            target: Vec3::new(0.0, 0.5, 0.0),
            up: Vec3::Y,
            fov_y: 75.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl PerspectiveCamera {
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// World-space ray through a point in normalized device coordinates
    /// (x right, y up, both in `[-1, 1]`). Returns origin and unit direction.
    pub fn ray(&self, ndc: Vec2) -> (Vec3, Vec3) {
        let inverse = self.view_projection().inverse();
        let near = inverse * ndc.extend(0.0).extend(1.0);
        let far = inverse * ndc.extend(1.0).extend(1.0);
        let near = near.xyz() / near.w;
        let far = far.xyz() / far.w;
        (self.position, (far - near).normalize_or_zero())
    }
}

/// One face of a cubemap. Discriminants are the array layer indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX = 0,
    NegativeX = 1,
    PositiveY = 2,
    NegativeY = 3,
    PositiveZ = 4,
    NegativeZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::PositiveX => "+x",
            Self::NegativeX => "-x",
            Self::PositiveY => "+y",
            Self::NegativeY => "-y",
            Self::PositiveZ => "+z",
            Self::NegativeZ => "-z",
        }
    }

    /// Direction through the face centre.
    pub fn forward(self) -> Vec3 {
        self.direction(0.0, 0.0)
    }

    /// Camera up vector that makes a left-handed view of this face match the
    /// texel layout of [`CubeFace::direction`].
    pub fn up(self) -> Vec3 {
        match self {
            Self::PositiveY => Vec3::NEG_Z,
            Self::NegativeY => Vec3::Z,
            _ => Vec3::Y,
        }
    }

    /// Unnormalized direction for face coordinates `s` (right) and `t` (down),
    /// both in `[-1, 1]`.
    pub fn direction(self, s: f32, t: f32) -> Vec3 {
        match self {
            Self::PositiveX => Vec3::new(1.0, -t, -s),
            Self::NegativeX => Vec3::new(-1.0, -t, s),
            Self::PositiveY => Vec3::new(s, 1.0, t),
            Self::NegativeY => Vec3::new(s, -1.0, -t),
            Self::PositiveZ => Vec3::new(s, -t, 1.0),
            Self::NegativeZ => Vec3::new(-s, -t, -1.0),
        }
    }

    /// Face and `(s, t)` coordinates hit by a direction. Inverse of
    /// [`CubeFace::direction`].
    pub fn from_direction(d: Vec3) -> (CubeFace, f32, f32) {
        let a = d.abs();
        if a.x >= a.y && a.x >= a.z {
            let m = a.x.max(f32::MIN_POSITIVE);
            if d.x >= 0.0 {
                (Self::PositiveX, -d.z / m, -d.y / m)
            } else {
                (Self::NegativeX, d.z / m, -d.y / m)
            }
        } else if a.y >= a.z {
            let m = a.y;
            if d.y >= 0.0 {
                (Self::PositiveY, d.x / m, d.z / m)
            } else {
                (Self::NegativeY, d.x / m, -d.z / m)
            }
        } else {
            let m = a.z;
            if d.z >= 0.0 {
                (Self::PositiveZ, d.x / m, -d.y / m)
            } else {
                (Self::NegativeZ, -d.x / m, -d.y / m)
            }
        }
    }
}

/// Six 90 degree views from a single point, one per cube face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubeCamera {
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl CubeCamera {
    pub fn new(position: Vec3, near: f32, far: f32) -> Self {
        Self {
            position,
            near,
            far,
        }
    }

    pub fn view_matrix(&self, face: CubeFace) -> Mat4 {
        Mat4::look_to_lh(self.position, face.forward(), face.up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(std::f32::consts::FRAC_PI_2, 1.0, self.near, self.far)
    }

    pub fn view_projection(&self, face: CubeFace) -> Mat4 {
        self.projection_matrix() * self.view_matrix(face)
    }
}
