//! Configuration for the swarm simulation and hardware bridge

use crate::types::{Result, SwarmError};
use serde::{Deserialize, Serialize};

/// Tuning parameters for the force model, formation heights and the
/// hardware bridge protocol.
///
/// The avoidance blend coefficients and the force clamp are empirically
/// tuned values carried over from the reference behavior; change them
/// here rather than in the force code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmConfig {
    /// Distance below which the target force ramps down linearly (meters)
    pub proximity_radius: f32,
    /// Gain applied to the target-seeking force
    pub target_force_gain: f32,
    /// Distance below which other drones trigger avoidance (meters)
    pub avoidance_radius: f32,
    /// Gain applied to the avoidance force
    pub avoidance_force_gain: f32,
    /// Weight of the per-drone bias in the avoidance escape direction
    pub avoidance_bias_weight: f32,
    /// Weight of the collision vector in the avoidance escape direction
    pub avoidance_direction_weight: f32,
    /// Upper bound on the resultant force magnitude per tick
    pub max_total_force: f32,
    /// Target altitude after takeoff (meters)
    pub flight_height: f32,
    /// Target altitude after landing (meters, slightly above ground)
    pub land_height: f32,
    /// Spacing of the default grid formation (meters)
    pub formation_spacing: f32,
    /// Directory holding formation tables
    pub formation_dir: String,
    /// Variance threshold for estimator convergence
    pub convergence_threshold: f32,
    /// Time to wait for estimator convergence before re-issuing a reset (ms)
    pub convergence_timeout_ms: u64,
    /// Estimator reset attempts before `connect()` gives up
    pub max_reset_attempts: u32,
    /// Grace period after the stop command before closing the link (ms)
    pub stop_grace_ms: u64,
    /// Yaw streamed with every position setpoint (radians)
    pub setpoint_yaw: f32,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            proximity_radius: 0.5,
            target_force_gain: 1.0,
            avoidance_radius: 0.6,
            avoidance_force_gain: 10.0,
            avoidance_bias_weight: 2.0,
            avoidance_direction_weight: 10.0,
            max_total_force: 2.0,
            flight_height: 1.0,
            land_height: 0.1,
            formation_spacing: 0.8,
            formation_dir: "formations".into(),
            convergence_threshold: 0.001,
            convergence_timeout_ms: 10_000,
            max_reset_attempts: 3,
            stop_grace_ms: 100,
            setpoint_yaw: 0.0,
        }
    }
}

impl SwarmConfig {
    /// Configuration for tests: no grace waits, short convergence timeout
    pub fn test_config() -> Self {
        Self {
            convergence_timeout_ms: 200,
            max_reset_attempts: 2,
            stop_grace_ms: 0,
            ..Self::default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.proximity_radius <= 0.0 {
            return Err(SwarmError::Configuration(
                "proximity_radius must be positive".into(),
            ));
        }
        if self.avoidance_radius <= 0.0 {
            return Err(SwarmError::Configuration(
                "avoidance_radius must be positive".into(),
            ));
        }
        if self.max_total_force <= 0.0 {
            return Err(SwarmError::Configuration(
                "max_total_force must be positive".into(),
            ));
        }
        if self.convergence_threshold <= 0.0 {
            return Err(SwarmError::Configuration(
                "convergence_threshold must be positive".into(),
            ));
        }
        if self.max_reset_attempts == 0 {
            return Err(SwarmError::Configuration(
                "max_reset_attempts must be at least 1".into(),
            ));
        }
        if self.flight_height <= self.land_height {
            return Err(SwarmError::Configuration(
                "flight_height must exceed land_height".into(),
            ));
        }
        Ok(())
    }
}
