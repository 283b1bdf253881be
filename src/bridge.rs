//! Virtual-to-physical bridge protocol
//!
//! Mirrors one simulated drone onto a physical counterpart:
//! connect the radio link, reset the onboard estimator and wait for its
//! variance stream to converge, then stream the simulated position as a
//! setpoint every tick until disconnect.
//!
//! `connect()` blocks for a variable, potentially long time and must not
//! run on the simulation tick thread; [`HardwareBridge::connect_in_background`]
//! runs it on a worker and publishes state transitions through the shared
//! handle. Disconnecting while the convergence wait is in flight cancels
//! it without a single setpoint being sent.

use crate::config::SwarmConfig;
use crate::convergence::ConvergenceDetector;
use crate::link::{RadioDriver, TelemetrySample};
use crate::types::{Result, SwarmError, Vec3};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How long one telemetry wait may block before the cancel flag and the
/// convergence deadline are re-checked.
const TELEMETRY_POLL_MS: u64 = 50;

/// Protocol state of one bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// No link open
    Disconnected,
    /// Opening the radio link
    Connecting,
    /// Reset command sent, estimator restarting
    EstimatorResetting,
    /// Watching the variance stream for convergence
    AwaitingConvergence,
    /// Converged; setpoints stream every tick
    Streaming,
    /// A stream-time link failure; requires an explicit reconnect
    Faulted,
}

struct Inner {
    state: BridgeState,
    link: Option<Box<dyn crate::link::RadioLink>>,
}

/// Per-agent link to a physical drone.
pub struct HardwareBridge {
    uri: String,
    driver: Arc<dyn RadioDriver>,
    config: SwarmConfig,
    inner: Arc<Mutex<Inner>>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

fn lock_inner(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HardwareBridge {
    /// Create a disconnected bridge for the drone at `uri`
    pub fn new(driver: Arc<dyn RadioDriver>, uri: impl Into<String>, config: SwarmConfig) -> Self {
        Self {
            uri: uri.into(),
            driver,
            config,
            inner: Arc::new(Mutex::new(Inner {
                state: BridgeState::Disconnected,
                link: None,
            })),
            cancel: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    /// URI of the physical counterpart
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current protocol state
    pub fn state(&self) -> BridgeState {
        lock_inner(&self.inner).state
    }

    /// Open the link, reset the estimator and block until it converges.
    ///
    /// Expiry of the convergence timeout re-issues the reset, up to the
    /// configured attempt count, then fails with `EstimatorTimeout`. The
    /// whole call is cancellable through `disconnect()` from another
    /// thread. Must not run on the simulation tick thread.
    pub fn connect(&self) -> Result<()> {
        self.cancel.store(false, Ordering::SeqCst);
        Self::run_connect(
            &self.inner,
            &self.cancel,
            self.driver.as_ref(),
            &self.uri,
            &self.config,
        )
    }

    /// Run `connect()` on a worker thread, publishing state transitions
    /// through this handle. Failures are logged, not returned.
    pub fn connect_in_background(&mut self) {
        self.cancel.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let cancel = Arc::clone(&self.cancel);
        let driver = Arc::clone(&self.driver);
        let uri = self.uri.clone();
        let config = self.config.clone();

        self.worker = Some(thread::spawn(move || {
            if let Err(e) = Self::run_connect(&inner, &cancel, driver.as_ref(), &uri, &config) {
                warn!("bridge {uri}: connect failed: {e}");
            }
        }));
    }

    fn run_connect(
        inner: &Mutex<Inner>,
        cancel: &AtomicBool,
        driver: &dyn RadioDriver,
        uri: &str,
        config: &SwarmConfig,
    ) -> Result<()> {
        lock_inner(inner).state = BridgeState::Connecting;
        debug!("bridge {uri}: connecting");

        let mut link = match driver.open(uri) {
            Ok(link) => link,
            Err(e) => {
                lock_inner(inner).state = BridgeState::Disconnected;
                return Err(e);
            }
        };

        // Telemetry flows into a channel so the convergence wait can
        // poll cooperatively instead of spinning on the link.
        let (tx, rx) = mpsc::channel::<TelemetrySample>();
        link.subscribe_telemetry(Box::new(move |sample| {
            tx.send(sample).ok();
        }));

        if let Err(e) = link.send_estimator_reset() {
            link.close();
            lock_inner(inner).state = BridgeState::Disconnected;
            return Err(e);
        }
        {
            let mut guard = lock_inner(inner);
            guard.link = Some(link);
            guard.state = BridgeState::EstimatorResetting;
        }

        let mut detector = ConvergenceDetector::new();
        let mut attempts: u32 = 1;
        let mut deadline = Instant::now() + Duration::from_millis(config.convergence_timeout_ms);
        lock_inner(inner).state = BridgeState::AwaitingConvergence;

        loop {
            if cancel.load(Ordering::SeqCst) {
                debug!("bridge {uri}: convergence wait cancelled");
                Self::teardown(inner);
                return Err(SwarmError::Cancelled);
            }

            match rx.recv_timeout(Duration::from_millis(TELEMETRY_POLL_MS)) {
                Ok(TelemetrySample::Variance { x, y, z }) => {
                    detector.observe(x, y, z);
                    if detector.is_converged(config.convergence_threshold) {
                        lock_inner(inner).state = BridgeState::Streaming;
                        info!("bridge {uri}: estimator converged, streaming");
                        return Ok(());
                    }
                }
                Ok(TelemetrySample::Position { .. }) => {}
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    Self::teardown(inner);
                    return Err(SwarmError::Link(format!(
                        "{uri}: telemetry stream ended during convergence wait"
                    )));
                }
            }

            if Instant::now() >= deadline {
                if attempts >= config.max_reset_attempts {
                    warn!("bridge {uri}: estimator never converged, giving up");
                    Self::teardown(inner);
                    return Err(SwarmError::EstimatorTimeout);
                }
                attempts += 1;
                debug!("bridge {uri}: convergence timeout, re-issuing reset (attempt {attempts})");
                let reset_result = {
                    let mut guard = lock_inner(inner);
                    guard.state = BridgeState::EstimatorResetting;
                    let result = match guard.link.as_mut() {
                        Some(link) => link.send_estimator_reset(),
                        None => Err(SwarmError::NotConnected),
                    };
                    guard.state = BridgeState::AwaitingConvergence;
                    result
                };
                if let Err(e) = reset_result {
                    Self::teardown(inner);
                    return Err(e);
                }
                detector.reset();
                deadline = Instant::now() + Duration::from_millis(config.convergence_timeout_ms);
            }
        }
    }

    fn teardown(inner: &Mutex<Inner>) {
        let mut guard = lock_inner(inner);
        if let Some(mut link) = guard.link.take() {
            link.close();
        }
        guard.state = BridgeState::Disconnected;
    }

    /// Send the current simulated position as a setpoint.
    ///
    /// A no-op unless the bridge is `Streaming`. A send failure parks the
    /// bridge in `Faulted` (no auto-retry) and surfaces the error.
    pub fn stream_tick(&mut self, position: Vec3) -> Result<()> {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            // Connect worker holds the lock; nothing to stream yet
            Err(std::sync::TryLockError::WouldBlock) => return Ok(()),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        if guard.state != BridgeState::Streaming {
            return Ok(());
        }

        let yaw = self.config.setpoint_yaw;
        let result = match guard.link.as_mut() {
            Some(link) => link.send_setpoint(position.x, position.y, position.z, yaw),
            None => Err(SwarmError::NotConnected),
        };

        if let Err(e) = result {
            warn!("bridge {}: setpoint send failed: {e}", self.uri);
            guard.state = BridgeState::Faulted;
            return Err(e);
        }
        Ok(())
    }

    /// Stop the physical drone and close the link.
    ///
    /// Cancels an in-flight convergence wait. In `Streaming`, a stop
    /// command is sent and given a fixed fire-and-forget grace period to
    /// flush before the link closes.
    pub fn disconnect(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }

        let mut guard = lock_inner(&self.inner);
        if let Some(mut link) = guard.link.take() {
            if guard.state == BridgeState::Streaming {
                if let Err(e) = link.send_stop() {
                    warn!("bridge {}: stop command failed: {e}", self.uri);
                }
                if self.config.stop_grace_ms > 0 {
                    thread::sleep(Duration::from_millis(self.config.stop_grace_ms));
                }
            }
            link.close();
        }
        guard.state = BridgeState::Disconnected;
        debug!("bridge {}: disconnected", self.uri);
    }
}

// Unconditional: checking the state first would race with a connect
// worker that has not yet stored `Connecting`, leaking its link.
impl Drop for HardwareBridge {
    fn drop(&mut self) {
        self.disconnect();
    }
}
