//! Physics-body abstraction consumed by the force model
//!
//! The force law never integrates motion itself; it only applies central
//! forces to a body and reads its state back. `PointBody` is a reference
//! implementation so the swarm simulates standalone; an engine-backed
//! body can implement the trait and no-op [`PhysicsBody::step`], leaving
//! integration to the engine.

use crate::types::Vec3;

/// Minimal rigid-body surface the swarm core needs.
pub trait PhysicsBody: Send {
    /// Add a force acting on the center of mass for the current tick.
    /// Forces accumulate; they are not overwritten.
    fn apply_central_force(&mut self, force: Vec3);

    /// Total force accumulated since the last clear
    fn total_force(&self) -> Vec3;

    /// Drop all accumulated force
    fn clear_forces(&mut self);

    /// Current position
    fn position(&self) -> Vec3;

    /// Teleport to a position without any transition or flight
    fn set_position(&mut self, position: Vec3);

    /// Current velocity
    fn velocity(&self) -> Vec3;

    /// Advance the body by `dt` seconds and consume accumulated forces.
    fn step(&mut self, dt: f32);
}

/// Point-mass body with linear damping.
///
/// Tuning matches the reference simulation: 0.5 kg, damping factor 0.95
/// per step, no friction.
#[derive(Debug, Clone)]
pub struct PointBody {
    position: Vec3,
    velocity: Vec3,
    force: Vec3,
    mass: f32,
    linear_damping: f32,
}

impl PointBody {
    /// Default rigid-body mass (kg)
    pub const DEFAULT_MASS: f32 = 0.5;
    /// Default linear damping factor applied each step
    pub const DEFAULT_LINEAR_DAMPING: f32 = 0.95;

    /// Create a body at the given position with reference tuning
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            mass: Self::DEFAULT_MASS,
            linear_damping: Self::DEFAULT_LINEAR_DAMPING,
        }
    }

    /// Create a body with explicit mass and damping
    pub fn with_tuning(position: Vec3, mass: f32, linear_damping: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            force: Vec3::ZERO,
            mass,
            linear_damping,
        }
    }
}

impl PhysicsBody for PointBody {
    fn apply_central_force(&mut self, force: Vec3) {
        self.force += force;
    }

    fn total_force(&self) -> Vec3 {
        self.force
    }

    fn clear_forces(&mut self) {
        self.force = Vec3::ZERO;
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::ZERO;
        self.force = Vec3::ZERO;
    }

    fn velocity(&self) -> Vec3 {
        self.velocity
    }

    fn step(&mut self, dt: f32) {
        // Semi-implicit Euler with per-step damping
        self.velocity += self.force * (dt / self.mass);
        self.velocity = self.velocity * self.linear_damping;
        self.position += self.velocity * dt;
        self.force = Vec3::ZERO;
    }
}
