use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

use crate::camera::PerspectiveCamera;

const POLAR_EPSILON: f32 = 1e-6;
const MOVE_EPSILON: f32 = 1e-5;

/// Orbit camera controls: rotate around a target, dolly in and out, pan.
///
/// Input handlers accumulate deltas; [`OrbitControls::update`] applies them to
/// a camera once per frame. With damping enabled only a fraction of the
/// pending motion is applied each update, so the camera eases to a stop.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Vec3,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    viewport_height: f32,
    pending_theta: f32,
    pending_phi: f32,
    pending_scale: f32,
    pending_pan: Vec2,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

impl OrbitControls {
    pub fn new(target: Vec3) -> Self {
        Self {
            target,
            enable_damping: false,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
            min_distance: 0.01,
            max_distance: f32::INFINITY,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            viewport_height: 1.0,
            pending_theta: 0.0,
            pending_phi: 0.0,
            pending_scale: 1.0,
            pending_pan: Vec2::ZERO,
        }
    }

    /// Height of the viewport in pixels; drag distances are relative to it.
    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(1.0);
    }

    /// Drag by `(dx, dy)` pixels. Dragging the full viewport height turns the
    /// camera a full circle.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.pending_theta -= TAU * dx / self.viewport_height * self.rotate_speed;
        self.pending_phi -= TAU * dy / self.viewport_height * self.rotate_speed;
    }

    /// Dolly toward the target for positive steps, away for negative.
    pub fn zoom(&mut self, steps: f32) {
        self.pending_scale *= 0.95_f32.powf(steps * self.zoom_speed);
    }

    /// Move the target (and camera) by `(dx, dy)` pixels in screen space.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pending_pan += Vec2::new(dx, dy) * self.pan_speed;
    }

    /// Whether any input is still waiting to be applied.
    pub fn is_settled(&self) -> bool {
        self.pending_theta.abs() < POLAR_EPSILON
            && self.pending_phi.abs() < POLAR_EPSILON
            && (self.pending_scale - 1.0).abs() < POLAR_EPSILON
            && self.pending_pan.length() < POLAR_EPSILON
    }

    /// Apply pending input to `camera`. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera) -> bool {
        let factor = if self.enable_damping {
            self.damping_factor.clamp(0.0, 1.0)
        } else {
            1.0
        };

        let offset = camera.position - self.target;
        let radius = offset.length().max(POLAR_EPSILON);
        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        theta += self.pending_theta * factor;
        phi += self.pending_phi * factor;
        phi = phi.clamp(
            self.min_polar_angle.max(POLAR_EPSILON),
            self.max_polar_angle.min(PI - POLAR_EPSILON),
        );
        let radius = (radius * self.pending_scale).clamp(self.min_distance, self.max_distance);

        if self.pending_pan != Vec2::ZERO {
            // Scale so the point under the cursor follows it at the target's depth.
            let target_distance = radius * (camera.fov_y * 0.5).tan();
            let world_per_pixel = 2.0 * target_distance / self.viewport_height;
            let forward = -offset / radius;
            let right = forward.cross(camera.up).normalize_or_zero();
            let up = right.cross(forward);
            let pan = self.pending_pan * factor * world_per_pixel;
            self.target += -right * pan.x + up * pan.y;
        }

        let sin_phi = phi.sin();
        let new_offset = Vec3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );
        let new_position = self.target + new_offset;
        let moved = (new_position - camera.position).length() > MOVE_EPSILON
            || (self.target - camera.target).length() > MOVE_EPSILON;

        camera.position = new_position;
        camera.target = self.target;

        if self.enable_damping {
            let keep = 1.0 - factor;
            self.pending_theta *= keep;
            self.pending_phi *= keep;
            self.pending_pan *= keep;
        } else {
            self.pending_theta = 0.0;
            self.pending_phi = 0.0;
            self.pending_pan = Vec2::ZERO;
        }
        self.pending_scale = 1.0;

        moved
    }
}
