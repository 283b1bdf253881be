//! A single swarm member and its force law
//!
//! Each drone steers by applying one combined central force per tick to
//! its physics body: a target-seeking term with a proximity ramp, a
//! biased mutual-avoidance term, and a magnitude clamp. The drone never
//! moves itself; integration belongs to the body.

use crate::bridge::HardwareBridge;
use crate::config::SwarmConfig;
use crate::physics::PhysicsBody;
use crate::types::{Vec3, VEC_EPSILON};
use rand::Rng;

/// One swarm member, simulated and optionally hardware-bridged.
pub struct Drone {
    body: Box<dyn PhysicsBody>,
    target: Vec3,
    /// Unit vector breaking avoidance symmetry; fixed at construction
    avoidance_bias: Vec3,
    bridge: Option<HardwareBridge>,
}

impl Drone {
    /// Create a drone over a physics body. `avoidance_bias` is
    /// normalized; a degenerate bias falls back to +X.
    pub fn new(body: Box<dyn PhysicsBody>, avoidance_bias: Vec3) -> Self {
        let bias = avoidance_bias.normalized();
        let bias = if bias == Vec3::ZERO {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            bias
        };
        Self {
            body,
            target: Vec3::ZERO,
            avoidance_bias: bias,
            bridge: None,
        }
    }

    /// Current position (read from the physics body)
    pub fn position(&self) -> Vec3 {
        self.body.position()
    }

    /// Current velocity (read from the physics body)
    pub fn velocity(&self) -> Vec3 {
        self.body.velocity()
    }

    /// Current target position
    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Set the target position. Targets are only ever written from
    /// outside; the drone itself never moves its own target.
    pub fn set_target(&mut self, target: Vec3) {
        self.target = target;
    }

    /// The symmetry-breaking avoidance bias (unit length)
    pub fn avoidance_bias(&self) -> Vec3 {
        self.avoidance_bias
    }

    /// Teleport the drone to its target, without any flight
    pub fn snap_to_target(&mut self) {
        self.body.set_position(self.target);
    }

    /// Attach a hardware bridge
    pub fn set_bridge(&mut self, bridge: HardwareBridge) {
        self.bridge = Some(bridge);
    }

    /// Detach and return the hardware bridge, if any
    pub fn take_bridge(&mut self) -> Option<HardwareBridge> {
        self.bridge.take()
    }

    /// Bridge handle, if hardware-linked
    pub fn bridge(&self) -> Option<&HardwareBridge> {
        self.bridge.as_ref()
    }

    /// Mutable bridge handle, if hardware-linked
    pub fn bridge_mut(&mut self) -> Option<&mut HardwareBridge> {
        self.bridge.as_mut()
    }

    /// Direct access to the physics body (tests, integrators)
    pub fn body_mut(&mut self) -> &mut dyn PhysicsBody {
        self.body.as_mut()
    }

    /// Recompute and apply this tick's combined force.
    ///
    /// `positions` is the snapshot of every drone's settled position from
    /// the previous tick; `own_index` is this drone's slot in it. Only
    /// forces are applied here; the caller integrates afterwards.
    pub fn update(&mut self, own_index: usize, positions: &[Vec3], config: &SwarmConfig) {
        let position = positions[own_index];

        self.apply_target_force(position, config);
        self.apply_avoidance_force(own_index, position, positions, config);
        self.clamp_total_force(config);
    }

    /// Target-seeking force with a linear ramp inside the proximity
    /// radius, so drones slow into the target instead of overshooting.
    fn apply_target_force(&mut self, position: Vec3, config: &SwarmConfig) {
        let distance = self.target - position;

        let direction = if distance.length() > config.proximity_radius {
            distance.normalized()
        } else {
            distance * (1.0 / config.proximity_radius)
        };

        self.body
            .apply_central_force(direction * config.target_force_gain);
    }

    /// Repulsion from every other drone inside the avoidance radius.
    ///
    /// The escape direction blends the personal bias against the straight
    /// collision vector so two approaching drones peel off differently
    /// instead of mirroring each other.
    fn apply_avoidance_force(
        &mut self,
        own_index: usize,
        position: Vec3,
        positions: &[Vec3],
        config: &SwarmConfig,
    ) {
        let mut avoidance = Vec3::ZERO;

        for (index, &other) in positions.iter().enumerate() {
            if index == own_index {
                continue;
            }

            let toward_other = other - position;
            let distance = toward_other.length();
            // Coincident drones are a defined no-op, not an error
            if distance >= config.avoidance_radius || distance < VEC_EPSILON {
                continue;
            }

            let escape = (self.avoidance_bias * config.avoidance_bias_weight
                - toward_other.normalized() * config.avoidance_direction_weight)
                .normalized();
            let magnitude =
                (config.avoidance_radius - distance) * config.avoidance_force_gain;
            avoidance += escape * magnitude;
        }

        if avoidance != Vec3::ZERO {
            self.body.apply_central_force(avoidance);
        }
    }

    /// Cap the body's resultant force regardless of how many avoidance
    /// partners contributed.
    fn clamp_total_force(&mut self, config: &SwarmConfig) {
        let total = self.body.total_force();
        if total.length() > config.max_total_force {
            self.body.clear_forces();
            self.body
                .apply_central_force(total.normalized() * config.max_total_force);
        }
    }
}

/// Random unit vector for a drone's avoidance bias
pub(crate) fn random_unit_bias<R: Rng>(rng: &mut R) -> Vec3 {
    loop {
        let candidate = Vec3::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let length = candidate.length();
        if length > VEC_EPSILON && length <= 1.0 {
            return candidate.normalized();
        }
    }
}
