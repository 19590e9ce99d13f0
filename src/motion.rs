//! Time-driven motion laws.
//!
//! Every law is a pure function of absolute clock time and element index.
//! Transforms are recomputed from the element's rest transform each frame,
//! so a paused or throttled tab resumes exactly where the clock says it
//! should be.

use std::f64::consts::TAU;

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::scene_graph::Transform;

/// A sinusoid `sin(t * frequency + index) * amplitude`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Wave {
    pub amplitude: f32,
    /// Angular frequency in radians per second.
    pub frequency: f32,
}

impl Wave {
    pub fn new(amplitude: f32, frequency: f32) -> Self {
        Self { amplitude, frequency }
    }

    pub fn at(&self, t: f64, index: usize) -> f32 {
        ((t * self.frequency as f64 + index as f64).sin() * self.amplitude as f64) as f32
    }
}

/// Motion parameters for a group of elements.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Motion {
    /// Continuous rotation rate per axis, radians per second.
    pub spin: [f32; 3],
    /// Extra rotation rate per element index, radians per second.
    pub spin_per_index: [f32; 3],
    /// Vertical floating oscillation.
    pub float: Option<Wave>,
    /// Uniform scale pulse around 1.0.
    pub pulse: Option<Wave>,
    /// Orbit about the Z axis, radians per second. Orbiting elements keep
    /// facing the origin.
    pub orbit: Option<f32>,
}

impl Motion {
    pub fn spinning(x: f32, y: f32, z: f32) -> Self {
        Self {
            spin: [x, y, z],
            ..Self::default()
        }
    }

    pub fn is_static(&self) -> bool {
        self.spin == [0.0; 3]
            && self.spin_per_index == [0.0; 3]
            && self.float.is_none()
            && self.pulse.is_none()
            && self.orbit.is_none()
    }

    /// Evaluate the motion laws at time `t` for element `index`.
    pub fn sample(&self, t: f64, index: usize) -> MotionSample {
        let i = index as f64;
        let spin_axis = |axis: usize| -> f32 {
            let rate = self.spin[axis] as f64 + i * self.spin_per_index[axis] as f64;
            (rate * t).rem_euclid(TAU) as f32
        };

        let rotation = Vec3::new(spin_axis(0), spin_axis(1), spin_axis(2));
        let position_delta = match self.float {
            Some(wave) => Vec3::new(0.0, wave.at(t, index), 0.0),
            None => Vec3::ZERO,
        };
        let scale = match self.pulse {
            Some(wave) => 1.0 + wave.at(t, index),
            None => 1.0,
        };
        let orbit = self
            .orbit
            .map(|speed| (speed as f64 * t).rem_euclid(TAU) as f32);

        MotionSample {
            rotation,
            position_delta,
            scale,
            orbit,
        }
    }
}

/// Result of evaluating [`Motion`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    /// Rotation added to the rest rotation (Euler XYZ, radians).
    pub rotation: Vec3,
    /// Offset added to the rest position.
    pub position_delta: Vec3,
    /// Uniform scale factor.
    pub scale: f32,
    /// Orbit angle about Z, if the element orbits.
    pub orbit: Option<f32>,
}

impl MotionSample {
    /// Produce the animated transform from a rest transform.
    pub fn apply(&self, rest: &Transform) -> Transform {
        let (position, base_rotation) = match self.orbit {
            Some(angle) => {
                let position = Quat::from_rotation_z(angle) * rest.position;
                (position, facing_origin(position))
            }
            None => (rest.position, rest.rotation),
        };

        Transform {
            position: position + self.position_delta,
            rotation: base_rotation + self.rotation,
            scale: rest.scale * self.scale,
        }
    }
}

/// Euler XYZ rotation that points an object's +Z axis at the origin.
pub fn facing_origin(position: Vec3) -> Vec3 {
    let Some(direction) = (-position).try_normalize() else {
        return Vec3::ZERO;
    };
    let (x, y, z) = Quat::from_rotation_arc(Vec3::Z, direction).to_euler(EulerRot::XYZ);
    Vec3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rest() -> Transform {
        Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.5, 0.0, 0.0),
            scale: Vec3::ONE,
        }
    }

    #[test]
    fn test_sample_is_pure() {
        let motion = Motion {
            spin: [0.18, 0.24, 0.0],
            spin_per_index: [0.006, 0.006, 0.0],
            float: Some(Wave::new(0.12, 1.0)),
            pulse: Some(Wave::new(0.2, 1.0)),
            orbit: Some(0.3),
        };

        for &(t, i) in &[(0.0, 0), (1.5, 3), (12345.678, 19)] {
            assert_eq!(motion.sample(t, i), motion.sample(t, i));
            assert_eq!(motion.sample(t, i).apply(&rest()), motion.sample(t, i).apply(&rest()));
        }
    }

    #[test]
    fn test_spin_law() {
        let motion = Motion {
            spin: [0.2, 0.0, 0.0],
            spin_per_index: [0.01, 0.0, 0.0],
            ..Motion::default()
        };
        let sample = motion.sample(2.0, 5);
        // (0.2 + 5 * 0.01) * 2.0
        assert!((sample.rotation.x - 0.5).abs() < 1e-6);
        assert_eq!(sample.rotation.y, 0.0);
    }

    #[test]
    fn test_spin_wraps_for_large_times() {
        let motion = Motion::spinning(1.0, 0.0, 0.0);
        let sample = motion.sample(1.0e7, 0);
        assert!(sample.rotation.x >= 0.0 && sample.rotation.x < std::f32::consts::TAU);
    }

    #[test]
    fn test_float_law() {
        let motion = Motion {
            float: Some(Wave::new(0.5, 2.0)),
            ..Motion::default()
        };
        let t = 0.75;
        let index = 4;
        let expected = ((t * 2.0 + index as f64).sin() * 0.5) as f32;
        let sample = motion.sample(t, index);
        assert!((sample.position_delta.y - expected).abs() < 1e-6);
        assert_eq!(sample.position_delta.x, 0.0);

        let moved = sample.apply(&rest());
        assert!((moved.position.y - (2.0 + expected)).abs() < 1e-6);
    }

    #[test]
    fn test_pulse_law() {
        let motion = Motion {
            pulse: Some(Wave::new(0.1, 1.0)),
            ..Motion::default()
        };
        let sample = motion.sample(3.0, 2);
        let expected = 1.0 + 0.1 * (3.0f64 + 2.0).sin() as f32;
        assert!((sample.scale - expected).abs() < 1e-6);
        assert!((sample.apply(&rest()).scale.x - expected).abs() < 1e-6);
    }

    #[test]
    fn test_static_motion_keeps_rest_transform() {
        let motion = Motion::default();
        assert!(motion.is_static());
        let moved = motion.sample(42.0, 7).apply(&rest());
        assert_eq!(moved, rest());
    }

    #[test]
    fn test_orbit_keeps_radius_and_faces_origin() {
        let motion = Motion {
            orbit: Some(0.3),
            ..Motion::default()
        };
        let rest = Transform {
            position: Vec3::new(3.0, 0.0, 0.0),
            rotation: facing_origin(Vec3::new(3.0, 0.0, 0.0)),
            scale: Vec3::ONE,
        };
        let moved = motion.sample(2.0, 0).apply(&rest);
        assert!((moved.position.length() - 3.0).abs() < 1e-5);

        let orientation = Quat::from_euler(EulerRot::XYZ, moved.rotation.x, moved.rotation.y, moved.rotation.z);
        let forward = orientation * Vec3::Z;
        let to_origin = (-moved.position).normalize();
        assert!(forward.dot(to_origin) > 0.999);
    }

    #[test]
    fn test_facing_origin_at_origin_is_identity() {
        assert_eq!(facing_origin(Vec3::ZERO), Vec3::ZERO);
    }
}
