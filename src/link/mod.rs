//! Radio-link abstraction between simulated drones and physical ones
//!
//! The bridge protocol only ever talks to these traits; the concrete
//! transport lives behind them. The MAVLink backend is compiled in with
//! the `mavlink` cargo feature.

use crate::types::{Result, SwarmError};
use serde::{Deserialize, Serialize};

#[cfg(feature = "mavlink")]
pub mod mavlink;

/// One telemetry delivery from a physical drone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TelemetrySample {
    /// Position variance per axis, emitted while the estimator settles
    Variance {
        /// X-axis variance
        x: f32,
        /// Y-axis variance
        y: f32,
        /// Z-axis variance
        z: f32,
    },
    /// Estimated position during normal flight
    Position {
        /// X coordinate (meters)
        x: f32,
        /// Y coordinate (meters)
        y: f32,
        /// Z coordinate (meters)
        z: f32,
    },
}

/// Callback invoked for every telemetry sample the link delivers.
pub type TelemetryCallback = Box<dyn FnMut(TelemetrySample) + Send>;

/// An open link to one physical drone.
pub trait RadioLink: Send {
    /// Command the drone to a position setpoint
    fn send_setpoint(&mut self, x: f32, y: f32, z: f32, yaw: f32) -> Result<()>;

    /// Command the drone to stop actuation immediately
    fn send_stop(&mut self) -> Result<()>;

    /// Ask the onboard state estimator to reset
    fn send_estimator_reset(&mut self) -> Result<()>;

    /// Register a callback for periodic telemetry. The link may deliver
    /// samples from its own reader thread.
    fn subscribe_telemetry(&mut self, callback: TelemetryCallback);

    /// Close the link. Further sends fail.
    fn close(&mut self);
}

/// Opens links and scans for reachable drones.
///
/// Injected into [`crate::swarm::SwarmManager`] so the simulation core
/// never names a concrete transport.
pub trait RadioDriver: Send + Sync {
    /// Open a link to the drone at `uri`. Fails with a `Link` error if
    /// the peer is unreachable.
    fn open(&self, uri: &str) -> Result<Box<dyn RadioLink>>;

    /// Enumerate URIs of currently reachable drones. Long-running; must
    /// not be called from the simulation tick thread.
    fn scan(&self) -> Vec<String>;
}

/// Driver for simulation-only swarms: scans empty, refuses to open.
pub struct NullDriver;

impl RadioDriver for NullDriver {
    fn open(&self, uri: &str) -> Result<Box<dyn RadioLink>> {
        Err(SwarmError::Link(format!(
            "no radio transport configured (cannot open {uri})"
        )))
    }

    fn scan(&self) -> Vec<String> {
        Vec::new()
    }
}
