//! MAVLink-backed radio link
//!
//! Talks to PX4/ArduPilot-style flight controllers: position setpoints as
//! `SET_POSITION_TARGET_LOCAL_NED`, stop as a force-disarm, estimator
//! reset as a preflight calibration command. A reader thread maps
//! incoming `LOCAL_POSITION_NED` / `LOCAL_POSITION_NED_COV` messages into
//! [`TelemetrySample`]s for subscribers.
//!
//! The simulation uses z-up altitude; NED is z-down. The conversion
//! happens entirely inside this module.

use super::{RadioDriver, RadioLink, TelemetryCallback, TelemetrySample};
use crate::types::{Result, SwarmError};
use log::{debug, warn};
use mavlink::common::{
    MavCmd, MavMessage, PositionTargetTypemask, COMMAND_LONG_DATA,
    SET_POSITION_TARGET_LOCAL_NED_DATA,
};
use mavlink::MavHeader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Diagonal indices of x/y/z position variance in the 9x9 upper-triangular
/// covariance of `LOCAL_POSITION_NED_COV`.
const COV_DIAG: [usize; 3] = [0, 9, 17];

type SharedCallbacks = Arc<Mutex<Vec<TelemetryCallback>>>;

/// Opens [`MavlinkLink`]s for a set of candidate endpoints.
pub struct MavlinkDriver {
    /// Endpoint addresses to probe during a scan, e.g. `udpin:0.0.0.0:14540`
    candidates: Vec<String>,
}

impl MavlinkDriver {
    /// Create a driver with the endpoints a scan should probe
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

impl RadioDriver for MavlinkDriver {
    fn open(&self, uri: &str) -> Result<Box<dyn RadioLink>> {
        Ok(Box::new(MavlinkLink::open(uri)?))
    }

    fn scan(&self) -> Vec<String> {
        self.candidates
            .iter()
            .filter(|uri| match MavlinkLink::open(uri) {
                Ok(mut link) => {
                    link.close();
                    true
                }
                Err(e) => {
                    debug!("scan: {uri} unreachable: {e}");
                    false
                }
            })
            .cloned()
            .collect()
    }
}

/// One open MAVLink connection
pub struct MavlinkLink {
    connection: Arc<dyn mavlink::MavConnection<MavMessage> + Send + Sync>,
    target_system: u8,
    target_component: u8,
    system_id: u8,
    component_id: u8,
    sequence: u8,
    closed: Arc<AtomicBool>,
    callbacks: SharedCallbacks,
}

impl MavlinkLink {
    /// Connect to a MAVLink endpoint and start the telemetry reader
    pub fn open(address: &str) -> Result<Self> {
        let connection = mavlink::connect::<MavMessage>(address)
            .map_err(|e| SwarmError::Link(format!("{address}: {e}")))?;
        let connection: Arc<dyn mavlink::MavConnection<MavMessage> + Send + Sync> =
            Arc::from(connection);

        let closed = Arc::new(AtomicBool::new(false));
        let callbacks: SharedCallbacks = Arc::new(Mutex::new(Vec::new()));

        let reader_conn = Arc::clone(&connection);
        let reader_closed = Arc::clone(&closed);
        let reader_callbacks = Arc::clone(&callbacks);
        thread::spawn(move || {
            Self::reader_loop(reader_conn, reader_closed, reader_callbacks);
        });

        Ok(Self {
            connection,
            target_system: 1,
            target_component: 1,
            system_id: 255,
            component_id: 0,
            sequence: 0,
            closed,
            callbacks,
        })
    }

    fn reader_loop(
        connection: Arc<dyn mavlink::MavConnection<MavMessage> + Send + Sync>,
        closed: Arc<AtomicBool>,
        callbacks: SharedCallbacks,
    ) {
        loop {
            if closed.load(Ordering::Relaxed) {
                break;
            }
            match connection.recv() {
                Ok((_header, msg)) => {
                    if let Some(sample) = Self::map_message(&msg) {
                        let mut callbacks = match callbacks.lock() {
                            Ok(guard) => guard,
                            Err(_) => break,
                        };
                        for callback in callbacks.iter_mut() {
                            callback(sample);
                        }
                    }
                }
                Err(e) => {
                    if !closed.load(Ordering::Relaxed) {
                        warn!("telemetry reader stopping: {e}");
                    }
                    break;
                }
            }
        }
    }

    /// Map a MAVLink message to a telemetry sample, NED converted to z-up
    fn map_message(msg: &MavMessage) -> Option<TelemetrySample> {
        match msg {
            MavMessage::LOCAL_POSITION_NED(pos) => Some(TelemetrySample::Position {
                x: pos.x,
                y: pos.y,
                z: -pos.z,
            }),
            MavMessage::LOCAL_POSITION_NED_COV(cov) => Some(TelemetrySample::Variance {
                x: cov.covariance[COV_DIAG[0]],
                y: cov.covariance[COV_DIAG[1]],
                z: cov.covariance[COV_DIAG[2]],
            }),
            _ => None,
        }
    }

    fn make_header(&mut self) -> MavHeader {
        let seq = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: seq,
        }
    }

    fn send_command(&mut self, cmd: MavCmd, params: [f32; 7]) -> Result<()> {
        let header = self.make_header();

        let msg = MavMessage::COMMAND_LONG(COMMAND_LONG_DATA {
            target_system: self.target_system,
            target_component: self.target_component,
            command: cmd,
            confirmation: 0,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        });

        self.connection
            .send(&header, &msg)
            .map_err(|e| SwarmError::Link(e.to_string()))?;

        Ok(())
    }
}

impl RadioLink for MavlinkLink {
    fn send_setpoint(&mut self, x: f32, y: f32, z: f32, yaw: f32) -> Result<()> {
        let header = self.make_header();

        let msg = MavMessage::SET_POSITION_TARGET_LOCAL_NED(SET_POSITION_TARGET_LOCAL_NED_DATA {
            time_boot_ms: 0,
            target_system: self.target_system,
            target_component: self.target_component,
            coordinate_frame: mavlink::common::MavFrame::MAV_FRAME_LOCAL_NED,
            type_mask: PositionTargetTypemask::empty(),
            x,
            y,
            z: -z, // altitude to NED down
            vx: 0.0,
            vy: 0.0,
            vz: 0.0,
            afx: 0.0,
            afy: 0.0,
            afz: 0.0,
            yaw,
            yaw_rate: 0.0,
        });

        self.connection
            .send(&header, &msg)
            .map_err(|e| SwarmError::Link(e.to_string()))?;

        Ok(())
    }

    fn send_stop(&mut self) -> Result<()> {
        // Force disarm even in flight; 21196 is the MAVLink magic value
        self.send_command(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [0.0, 21196.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn send_estimator_reset(&mut self) -> Result<()> {
        self.send_command(
            MavCmd::MAV_CMD_PREFLIGHT_CALIBRATION,
            [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    fn subscribe_telemetry(&mut self, callback: TelemetryCallback) {
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.push(callback);
        }
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
        if let Ok(mut callbacks) = self.callbacks.lock() {
            callbacks.clear();
        }
        // The reader thread exits on its next recv error or flag check.
    }
}
