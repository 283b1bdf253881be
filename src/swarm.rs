//! Swarm collection lifecycle and tick orchestration
//!
//! [`SwarmManager`] owns every drone. External collaborators (GUI, CLI,
//! timers) mutate drones only through the manager's operations, never by
//! holding drone references across ticks, so resizing cannot race with a
//! command that references a destroyed drone.

use crate::agent::{random_unit_bias, Drone};
use crate::bridge::HardwareBridge;
use crate::config::SwarmConfig;
use crate::formation::{grid_points, random_points, spiral_points, FormationLoader};
use crate::link::{NullDriver, RadioDriver};
use crate::physics::PointBody;
use crate::types::{Result, SwarmError, Vec3};
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;

/// The formation a resize re-applies so newly created drones always get
/// a sane target.
#[derive(Debug, Clone, PartialEq)]
enum ActiveFormation {
    /// Default centered grid (the go-home formation)
    Grid,
    /// Rising spiral
    Spiral,
    /// Random scatter
    Random,
    /// A named formation table, re-resolved for the current drone count
    Named(String),
    /// Explicitly assigned points
    Custom(Vec<Vec3>),
}

/// One per-agent bridge failure surfaced by [`SwarmManager::tick`]
#[derive(Debug)]
pub struct BridgeFault {
    /// Index of the affected drone
    pub index: usize,
    /// The underlying link failure
    pub error: SwarmError,
}

/// Owns the drone collection and drives it once per simulation tick.
pub struct SwarmManager {
    config: SwarmConfig,
    drones: Vec<Drone>,
    loader: FormationLoader,
    driver: Arc<dyn RadioDriver>,
    active_formation: ActiveFormation,
    rng: SmallRng,
    debug: bool,
}

impl SwarmManager {
    /// Create a manager without a radio transport (simulation only)
    pub fn new(config: SwarmConfig) -> Self {
        Self::with_driver(config, Arc::new(NullDriver))
    }

    /// Create a manager with an injected radio driver
    pub fn with_driver(config: SwarmConfig, driver: Arc<dyn RadioDriver>) -> Self {
        let loader = FormationLoader::new(&config.formation_dir);
        Self {
            config,
            drones: Vec::new(),
            loader,
            driver,
            active_formation: ActiveFormation::Grid,
            rng: SmallRng::from_entropy(),
            debug: false,
        }
    }

    /// Number of drones
    pub fn len(&self) -> usize {
        self.drones.len()
    }

    /// True if the swarm is empty
    pub fn is_empty(&self) -> bool {
        self.drones.is_empty()
    }

    /// Read-only view of the drones
    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    /// One drone by index
    pub fn drone(&self, index: usize) -> Option<&Drone> {
        self.drones.get(index)
    }

    /// The active configuration
    pub fn config(&self) -> &SwarmConfig {
        &self.config
    }

    /// Grow or shrink the swarm to exactly `count` drones.
    ///
    /// Shrinking destroys drones from the tail (closing any hardware
    /// link first) and never reorders or disturbs survivors. Growing
    /// constructs drones at the origin, re-applies the active formation
    /// at the new count and snaps every drone onto its target so the
    /// swarm starts coherent.
    pub fn resize(&mut self, count: usize) {
        let grew = count > self.drones.len();

        while self.drones.len() > count {
            if let Some(mut drone) = self.drones.pop() {
                if let Some(mut bridge) = drone.take_bridge() {
                    bridge.disconnect();
                }
            }
        }

        while self.drones.len() < count {
            let bias = random_unit_bias(&mut self.rng);
            self.drones
                .push(Drone::new(Box::new(PointBody::new(Vec3::ZERO)), bias));
        }

        if grew {
            self.reapply_active_formation();
            for drone in &mut self.drones {
                drone.snap_to_target();
            }
        }
        debug!("swarm resized to {count}");
    }

    /// Assign one target per drone. All-or-nothing: a length mismatch
    /// changes no target.
    pub fn assign_formation(&mut self, points: &[Vec3]) -> Result<()> {
        if points.len() != self.drones.len() {
            return Err(SwarmError::Configuration(format!(
                "formation has {} points for {} drones",
                points.len(),
                self.drones.len()
            )));
        }
        for (drone, &point) in self.drones.iter_mut().zip(points) {
            drone.set_target(point);
        }
        self.active_formation = ActiveFormation::Custom(points.to_vec());
        Ok(())
    }

    /// Assign a formation table by id (`"2D/3_default"`) or by bare name
    /// (`"default"`, resolved against the current drone count).
    ///
    /// Planar tables get the configured flight height as z. Prior
    /// targets stay untouched on any failure.
    pub fn assign_named_formation(&mut self, formation: &str) -> Result<()> {
        let id = if formation.contains('/') {
            formation.to_string()
        } else {
            self.loader.resolve(self.drones.len(), formation)?
        };

        let loaded = self.loader.load(&id)?;
        if loaded.len() != self.drones.len() {
            return Err(SwarmError::Configuration(format!(
                "formation {id} has {} points for {} drones",
                loaded.len(),
                self.drones.len()
            )));
        }

        let points = loaded.with_height(self.config.flight_height);
        for (drone, &point) in self.drones.iter_mut().zip(&points) {
            drone.set_target(point);
        }
        self.active_formation = ActiveFormation::Named(formation_name(&id));
        info!("assigned formation {id}");
        Ok(())
    }

    /// Add `delta` to each indexed drone's target. All-or-nothing: an
    /// out-of-range index changes nothing.
    pub fn set_targets_relative(&mut self, indices: &[usize], delta: Vec3) -> Result<()> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.drones.len()) {
            return Err(SwarmError::Configuration(format!(
                "drone index {bad} out of range ({} drones)",
                self.drones.len()
            )));
        }
        for &index in indices {
            let target = self.drones[index].target();
            self.drones[index].set_target(target + delta);
        }
        Ok(())
    }

    /// Send every drone to the flight height, keeping its x/y.
    /// Pure target mutation; actual climbing is up to the force model.
    pub fn takeoff(&mut self) {
        let height = self.config.flight_height;
        for drone in &mut self.drones {
            let position = drone.position();
            drone.set_target(Vec3::new(position.x, position.y, height));
        }
        info!("takeoff: {} drones to {height} m", self.drones.len());
    }

    /// Send every drone to the land height, keeping its x/y
    pub fn land(&mut self) {
        let height = self.config.land_height;
        for drone in &mut self.drones {
            let position = drone.position();
            drone.set_target(Vec3::new(position.x, position.y, height));
        }
        info!("land: {} drones to {height} m", self.drones.len());
    }

    /// Freeze the swarm: every drone's target becomes its current position
    pub fn stop_movement(&mut self) {
        for drone in &mut self.drones {
            let position = drone.position();
            drone.set_target(position);
        }
    }

    /// Default centered grid at flight height (the go-home formation)
    pub fn default_formation(&mut self) {
        let points = grid_points(
            self.drones.len(),
            self.config.formation_spacing,
            self.config.flight_height,
        );
        self.set_all_targets(&points);
        self.active_formation = ActiveFormation::Grid;
    }

    /// Rising spiral around the origin
    pub fn spiral_formation(&mut self) {
        let points = self.spiral_points_for(self.drones.len());
        self.set_all_targets(&points);
        self.active_formation = ActiveFormation::Spiral;
    }

    /// Random scatter around the flight height
    pub fn random_formation(&mut self) {
        let points = random_points(
            self.drones.len(),
            self.config.formation_spacing * 2.0,
            self.config.flight_height,
            &mut self.rng,
        );
        self.set_all_targets(&points);
        self.active_formation = ActiveFormation::Random;
    }

    /// Toggle force-vector debug output for visualization consumers.
    /// Produces no core state change.
    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Whether debug visualization is requested
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Advance the simulation by one tick.
    ///
    /// Two-phase: every drone's force is computed from a snapshot of the
    /// previous tick's settled positions before any body integrates, so
    /// avoidance outcomes cannot depend on iteration order. Streaming
    /// bridges then receive the new positions as setpoints; per-agent
    /// link faults are collected and returned, never aborting the tick.
    pub fn tick(&mut self, dt: f32) -> Vec<BridgeFault> {
        let positions: Vec<Vec3> = self.drones.iter().map(|d| d.position()).collect();

        for (index, drone) in self.drones.iter_mut().enumerate() {
            drone.update(index, &positions, &self.config);
        }

        for drone in &mut self.drones {
            drone.body_mut().step(dt);
        }

        let mut faults = Vec::new();
        for (index, drone) in self.drones.iter_mut().enumerate() {
            let position = drone.position();
            if let Some(bridge) = drone.bridge_mut() {
                if let Err(error) = bridge.stream_tick(position) {
                    faults.push(BridgeFault { index, error });
                }
            }
        }
        faults
    }

    /// Resize to match `uris` and open one hardware bridge per drone.
    ///
    /// Connects run on background workers; poll each drone's bridge
    /// state to observe progress. A failing bridge never blocks the
    /// others.
    pub fn connect_hardware(&mut self, uris: &[String]) {
        self.resize(uris.len());
        for (drone, uri) in self.drones.iter_mut().zip(uris) {
            if let Some(mut stale) = drone.take_bridge() {
                stale.disconnect();
            }
            let mut bridge =
                HardwareBridge::new(Arc::clone(&self.driver), uri.clone(), self.config.clone());
            bridge.connect_in_background();
            drone.set_bridge(bridge);
        }
        info!("connecting {} hardware bridges", uris.len());
    }

    /// Stop and close every hardware bridge, then clear the swarm.
    /// Cancels convergence waits still in flight.
    pub fn disconnect_hardware(&mut self) {
        for drone in &mut self.drones {
            if let Some(mut bridge) = drone.take_bridge() {
                bridge.disconnect();
            }
        }
        self.resize(0);
        info!("hardware disconnected");
    }

    /// Enumerate reachable physical drones. Long-running; do not call
    /// from the tick thread.
    pub fn scan_for_drones(&self) -> Vec<String> {
        self.driver.scan()
    }

    fn set_all_targets(&mut self, points: &[Vec3]) {
        for (drone, &point) in self.drones.iter_mut().zip(points) {
            drone.set_target(point);
        }
    }

    fn spiral_points_for(&mut self, count: usize) -> Vec<Vec3> {
        spiral_points(
            count,
            self.config.formation_spacing,
            0.5,
            0.15,
            self.config.flight_height,
        )
    }

    /// Re-key the active formation to the current drone count. Falls
    /// back to the default grid when the formation cannot be re-applied
    /// at this count.
    fn reapply_active_formation(&mut self) {
        let count = self.drones.len();
        let points = match self.active_formation.clone() {
            ActiveFormation::Grid => grid_points(
                count,
                self.config.formation_spacing,
                self.config.flight_height,
            ),
            ActiveFormation::Spiral => self.spiral_points_for(count),
            ActiveFormation::Random => random_points(
                count,
                self.config.formation_spacing * 2.0,
                self.config.flight_height,
                &mut self.rng,
            ),
            ActiveFormation::Named(name) => match self
                .loader
                .resolve(count, &name)
                .and_then(|id| self.loader.load(&id))
            {
                Ok(loaded) if loaded.len() == count => {
                    loaded.with_height(self.config.flight_height)
                }
                _ => {
                    warn!("formation {name} has no table for {count} drones, using grid");
                    self.active_formation = ActiveFormation::Grid;
                    grid_points(
                        count,
                        self.config.formation_spacing,
                        self.config.flight_height,
                    )
                }
            },
            ActiveFormation::Custom(points) => {
                if points.len() >= count {
                    points[..count].to_vec()
                } else {
                    warn!("custom formation too small for {count} drones, using grid");
                    self.active_formation = ActiveFormation::Grid;
                    grid_points(
                        count,
                        self.config.formation_spacing,
                        self.config.flight_height,
                    )
                }
            }
        };
        self.set_all_targets(&points);
    }
}

fn formation_name(id: &str) -> String {
    // "2D/3_default" -> "default"
    let tail = id.rsplit('/').next().unwrap_or(id);
    match tail.split_once('_') {
        Some((_, name)) => name.to_string(),
        None => tail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> SwarmManager {
        SwarmManager::new(SwarmConfig::test_config())
    }

    #[test]
    fn test_resize_grows_and_snaps() {
        let mut swarm = manager();
        swarm.resize(4);
        assert_eq!(swarm.len(), 4);
        for drone in swarm.drones() {
            // Snapped onto the default grid target
            assert_eq!(drone.position(), drone.target());
            assert_eq!(drone.target().z, swarm.config().flight_height);
        }
    }

    #[test]
    fn test_shrink_keeps_survivors_untouched() {
        let mut swarm = manager();
        swarm.resize(5);
        let targets: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 0.0, 1.0)).collect();
        swarm.assign_formation(&targets).unwrap();
        let position_1 = swarm.drone(1).unwrap().position();

        swarm.resize(2);
        assert_eq!(swarm.len(), 2);
        assert_eq!(swarm.drone(0).unwrap().target(), targets[0]);
        assert_eq!(swarm.drone(1).unwrap().target(), targets[1]);
        assert_eq!(swarm.drone(1).unwrap().position(), position_1);
    }

    #[test]
    fn test_assign_formation_length_mismatch_is_all_or_nothing() {
        let mut swarm = manager();
        swarm.resize(3);
        let before: Vec<Vec3> = swarm.drones().iter().map(|d| d.target()).collect();

        let wrong = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        let result = swarm.assign_formation(&wrong);
        assert!(matches!(result, Err(SwarmError::Configuration(_))));

        let after: Vec<Vec3> = swarm.drones().iter().map(|d| d.target()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_takeoff_and_land_preserve_xy() {
        let mut swarm = manager();
        swarm.resize(3);
        let xy: Vec<(f32, f32)> = swarm
            .drones()
            .iter()
            .map(|d| (d.position().x, d.position().y))
            .collect();

        swarm.takeoff();
        for (drone, &(x, y)) in swarm.drones().iter().zip(&xy) {
            assert_eq!(drone.target(), Vec3::new(x, y, swarm.config().flight_height));
        }

        swarm.land();
        for (drone, &(x, y)) in swarm.drones().iter().zip(&xy) {
            assert_eq!(drone.target(), Vec3::new(x, y, swarm.config().land_height));
        }
    }

    #[test]
    fn test_stop_movement_freezes_targets() {
        let mut swarm = manager();
        swarm.resize(2);
        swarm.assign_formation(&[Vec3::new(5.0, 5.0, 1.0), Vec3::new(-5.0, 5.0, 1.0)])
            .unwrap();
        swarm.tick(0.02);
        swarm.stop_movement();
        for drone in swarm.drones() {
            assert_eq!(drone.target(), drone.position());
        }
    }

    #[test]
    fn test_set_targets_relative() {
        let mut swarm = manager();
        swarm.resize(3);
        let before: Vec<Vec3> = swarm.drones().iter().map(|d| d.target()).collect();

        let delta = Vec3::new(0.5, 0.0, 0.2);
        swarm.set_targets_relative(&[0, 2], delta).unwrap();
        assert_eq!(swarm.drone(0).unwrap().target(), before[0] + delta);
        assert_eq!(swarm.drone(1).unwrap().target(), before[1]);
        assert_eq!(swarm.drone(2).unwrap().target(), before[2] + delta);
    }

    #[test]
    fn test_set_targets_relative_bounds_checked() {
        let mut swarm = manager();
        swarm.resize(2);
        let before: Vec<Vec3> = swarm.drones().iter().map(|d| d.target()).collect();

        let result = swarm.set_targets_relative(&[0, 5], Vec3::new(1.0, 0.0, 0.0));
        assert!(matches!(result, Err(SwarmError::Configuration(_))));
        let after: Vec<Vec3> = swarm.drones().iter().map(|d| d.target()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_tick_converges_on_target() {
        let mut swarm = manager();
        swarm.resize(1);
        let target = Vec3::new(2.0, 1.0, 1.0);
        swarm.assign_formation(&[target]).unwrap();

        for _ in 0..2000 {
            swarm.tick(0.02);
        }
        assert!(swarm.drone(0).unwrap().position().distance_to(&target) < 0.1);
    }

    #[test]
    fn test_close_drones_separate() {
        let mut swarm = manager();
        swarm.resize(2);
        // Park both drones almost on top of each other, targets where they sit
        swarm
            .assign_formation(&[Vec3::new(0.0, 0.0, 1.0), Vec3::new(0.05, 0.0, 1.0)])
            .unwrap();
        for drone in &mut swarm.drones {
            drone.snap_to_target();
        }
        for drone in swarm.drones() {
            assert!(drone.position().distance_to(&drone.target()) < 1e-6);
        }
        let initial = swarm.drone(0).unwrap().position()
            .distance_to(&swarm.drone(1).unwrap().position());

        for _ in 0..50 {
            swarm.tick(0.02);
        }
        let settled = swarm.drone(0).unwrap().position()
            .distance_to(&swarm.drone(1).unwrap().position());
        assert!(settled > initial);
    }

    #[test]
    fn test_growth_reapplies_custom_formation_or_grid() {
        let mut swarm = manager();
        swarm.resize(2);
        swarm
            .assign_formation(&[Vec3::new(1.0, 0.0, 1.0), Vec3::new(2.0, 0.0, 1.0)])
            .unwrap();

        // Custom formation cannot cover 4 drones: grid fallback
        swarm.resize(4);
        assert_eq!(swarm.len(), 4);
        for drone in swarm.drones() {
            assert_eq!(drone.position(), drone.target());
        }
    }

    #[test]
    fn test_formation_name_extraction() {
        assert_eq!(formation_name("2D/3_default"), "default");
        assert_eq!(formation_name("3D/12_double_helix"), "double_helix");
        assert_eq!(formation_name("plain"), "plain");
    }

    #[test]
    fn test_debug_flag_is_inert() {
        let mut swarm = manager();
        swarm.resize(1);
        let target = swarm.drone(0).unwrap().target();
        swarm.set_debug(true);
        assert!(swarm.debug());
        assert_eq!(swarm.drone(0).unwrap().target(), target);
    }
}
