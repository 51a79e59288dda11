use glam::{Mat4, Vec3};

/// Fixed-lens look-at camera.
///
/// Orientation comes from re-aiming at a target point; there is no free-look
/// state. Camera motion is NOT deterministic input ... it follows whatever
/// the controller aims it at each frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 4.0),
            target: Vec3::ZERO,
            fov: 40.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

impl Camera {
    /// Re-aim at a world-space point. Snap, no smoothing.
    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    /// Match the projection to a window size in pixels. Zero dimensions are
    /// clamped so a minimized window cannot poison the aspect ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_lens() {
        let cam = Camera::default();
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(cam.near, 1.0);
        assert_eq!(cam.far, 100.0);
        assert!((cam.fov - 40.0_f32.to_radians()).abs() < 1e-6);
    }

    #[test]
    fn look_at_snaps_target() {
        let mut cam = Camera::default();
        cam.look_at(Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(cam.target, Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn viewport_sets_aspect() {
        let mut cam = Camera::default();
        cam.set_viewport(1280, 720);
        assert!((cam.aspect - 1280.0 / 720.0).abs() < 1e-6);
    }

    #[test]
    fn zero_viewport_keeps_aspect_finite() {
        let mut cam = Camera::default();
        cam.set_viewport(0, 0);
        assert!(cam.aspect.is_finite());
        assert!(cam.aspect > 0.0);
        assert!(!cam.view_projection().col(0).x.is_nan());
    }

    #[test]
    fn view_projection_is_finite() {
        let cam = Camera::default();
        let vp = cam.view_projection();
        for col in 0..4 {
            assert!(vp.col(col).is_finite());
        }
    }
}
