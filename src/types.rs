//! Core type definitions for the swarm simulation

use core::fmt;
use core::ops::{Add, AddAssign, Mul, Neg, Sub};
use serde::{Deserialize, Serialize};

/// Result type for swarm operations
pub type Result<T> = core::result::Result<T, SwarmError>;

/// Vectors shorter than this are treated as zero when normalizing.
pub const VEC_EPSILON: f32 = 1e-6;

/// 3D vector used for positions, velocities and forces
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
    /// Z coordinate (altitude)
    pub z: f32,
}

impl Vec3 {
    /// Zero vector
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    /// Create a new vector
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Squared Euclidean length
    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Euclidean length
    pub fn length(&self) -> f32 {
        libm::sqrtf(self.length_squared())
    }

    /// Euclidean distance to another vector
    pub fn distance_to(&self, other: &Vec3) -> f32 {
        (*other - *self).length()
    }

    /// Unit vector in the same direction, or zero for degenerate input
    pub fn normalized(&self) -> Vec3 {
        let len = self.length();
        if len < VEC_EPSILON {
            Vec3::ZERO
        } else {
            Vec3::new(self.x / len, self.y / len, self.z / len)
        }
    }

    /// Same direction, length capped at `max`
    pub fn clamped_length(&self, max: f32) -> Vec3 {
        let len = self.length();
        if len > max {
            self.normalized() * max
        } else {
            *self
        }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

impl fmt::Display for Vec3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

/// Error types for the swarm system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwarmError {
    /// No formation resource matches the requested count/name pair
    FormationNotFound(String),
    /// A formation resource exists but cannot be parsed
    FormationFormat(String),
    /// Invalid configuration or command parameters
    Configuration(String),
    /// Radio link open/send failure
    Link(String),
    /// Estimator did not converge within the configured timeout
    EstimatorTimeout,
    /// A blocking wait was cancelled by a disconnect request
    Cancelled,
    /// Operation requires a connected bridge
    NotConnected,
}

impl fmt::Display for SwarmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwarmError::FormationNotFound(id) => write!(f, "formation not found: {id}"),
            SwarmError::FormationFormat(msg) => write!(f, "malformed formation file: {msg}"),
            SwarmError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            SwarmError::Link(msg) => write!(f, "radio link error: {msg}"),
            SwarmError::EstimatorTimeout => write!(f, "estimator did not converge in time"),
            SwarmError::Cancelled => write!(f, "operation cancelled"),
            SwarmError::NotConnected => write!(f, "bridge is not connected"),
        }
    }
}

impl std::error::Error for SwarmError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length() {
        let v = Vec3::new(3.0, 4.0, 0.0);
        assert!((v.length() - 5.0).abs() < 1e-6);
        assert!((v.length_squared() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized() {
        let n = Vec3::new(3.0, 4.0, 0.0).normalized();
        assert!((n.x - 0.6).abs() < 1e-6);
        assert!((n.y - 0.8).abs() < 1e-6);
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalized_degenerate() {
        assert_eq!(Vec3::ZERO.normalized(), Vec3::ZERO);
        assert_eq!(Vec3::new(1e-9, 0.0, 0.0).normalized(), Vec3::ZERO);
    }

    #[test]
    fn test_clamped_length() {
        let v = Vec3::new(10.0, 0.0, 0.0);
        assert_eq!(v.clamped_length(2.0), Vec3::new(2.0, 0.0, 0.0));
        // Already short enough: unchanged
        let w = Vec3::new(0.5, 0.5, 0.0);
        assert_eq!(w.clamped_length(2.0), w);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(1.0, 2.0, 8.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
        assert!((b.distance_to(&a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_error_display() {
        let err = SwarmError::FormationNotFound("2D/3_default".into());
        assert_eq!(err.to_string(), "formation not found: 2D/3_default");
        assert_eq!(
            SwarmError::EstimatorTimeout.to_string(),
            "estimator did not converge in time"
        );
    }
}
