//! # Drone Swarm Simulation and Hardware Bridge
//!
//! Force-based positioning for a swarm of simulated drones, with an
//! optional per-drone bridge that mirrors simulated motion onto
//! physical drones over a radio link.
//!
//! ## Features
//! - Target-seeking force model with proximity ramp-down
//! - Biased mutual collision avoidance (deterministic deadlock breaking)
//! - Resultant force clamp for bounded accelerations
//! - CSV formation tables keyed by dimensionality, count and name
//! - Grid, spiral and random built-in formations
//! - Hardware bridge: estimator reset, variance-window convergence
//!   detection, setpoint streaming, safe stop on disconnect
//! - MAVLink transport behind the `mavlink` cargo feature
//!
//! ## Design notes
//! - The simulation core never names a concrete transport; drivers are
//!   injected through [`link::RadioDriver`]
//! - Forces are computed from a per-tick position snapshot, so outcomes
//!   never depend on drone iteration order
//! - Hardware connects run on background workers and are cancellable at
//!   every stage

#![forbid(unsafe_code)]
#![allow(clippy::excessive_precision)]
#![allow(clippy::cast_precision_loss)] // Intentional f32 casts
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Per-drone state and the force model
pub mod agent;
/// Hardware bridge protocol state machine
pub mod bridge;
/// Tuning parameters for forces, formations and the bridge
pub mod config;
/// Position-variance convergence detection
pub mod convergence;
/// CSV formation tables and built-in formation generators
pub mod formation;
/// Radio-link traits and transports
pub mod link;
/// Point-mass physics bodies
pub mod physics;
/// Swarm collection lifecycle and tick orchestration
pub mod swarm;
/// Core types (Vec3, errors)
pub mod types;

// Re-export the types nearly every caller needs
pub use config::SwarmConfig;
pub use swarm::{BridgeFault, SwarmManager};
pub use types::{Result, SwarmError, Vec3};
