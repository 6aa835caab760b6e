//! Tracking session: device lifecycle and the acquisition loop.

use crate::config::TrackerConfig;
use crate::convert::{self, PhysicalSample};
use crate::estimator::{self, Estimator, SampleClock};
use crate::protocol::{self, DecodeError, ACTIVATION_PAYLOAD, HID_INTERFACE, PID, REPORT_SIZE, VID};
use crate::state::SharedOrientation;
use crate::{Result, TrackerError};
use crossbeam_channel::{Receiver, Sender};
use hidapi::{HidApi, HidDevice};
use nalgebra::UnitQuaternion;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Check if a hidapi DeviceInfo matches the glasses' IMU interface.
/// The IMU stream lives on logical interface 3.
fn is_air_imu(d: &hidapi::DeviceInfo) -> bool {
    d.vendor_id() == VID && d.product_id() == PID && d.interface_number() == HID_INTERFACE
}

fn create_hid_api() -> Result<HidApi> {
    let api = HidApi::new()?;
    #[cfg(target_os = "macos")]
    {
        // Keep HID opens shared on macOS to avoid seizing the interface.
        api.set_open_exclusive(false);
    }
    Ok(api)
}

/// Commands serviced by the acquisition thread between reads.
enum Command {
    Recenter(UnitQuaternion<f32>),
}

/// An active head-tracking session.
///
/// Owns the device handle (via the reader thread), the lock-guarded
/// orientation, and the estimator state. Constructed by [`Tracker::start`];
/// dropping or calling [`Tracker::stop`] shuts the reader down and joins it,
/// so multiple independent sessions can be created and torn down cleanly.
pub struct Tracker {
    shared: Arc<SharedOrientation>,
    stop_flag: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<TrackerError>>>,
    command_tx: Sender<Command>,
    sample_rx: Option<Receiver<PhysicalSample>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Tracker {
    /// Open the glasses, perform the activation handshake, and start the
    /// acquisition loop on a dedicated thread.
    pub fn start(config: TrackerConfig) -> Result<Tracker> {
        let api = create_hid_api()?;

        let hid_info = api
            .device_list()
            .find(|d| is_air_imu(d))
            .ok_or(TrackerError::DeviceNotFound)?;
        let device = api.open_path(hid_info.path())?;

        device
            .write(&ACTIVATION_PAYLOAD)
            .map_err(|e| TrackerError::Handshake(e.to_string()))?;

        log::info!(
            "Opened Air glasses at {:?}, layout {:?}, estimator {:?}",
            hid_info.path(),
            config.layout,
            config.estimator
        );

        let shared = Arc::new(SharedOrientation::new());
        let stop_flag = Arc::new(AtomicBool::new(false));
        let fault = Arc::new(Mutex::new(None));
        let (command_tx, command_rx) = crossbeam_channel::unbounded();
        let (sample_tx, sample_rx) = crossbeam_channel::bounded(config.sample_tap_capacity);

        let thread = std::thread::Builder::new()
            .name("air-tracker".into())
            .spawn({
                let shared = shared.clone();
                let stop_flag = stop_flag.clone();
                let fault = fault.clone();
                move || {
                    // HidApi must outlive the device handle on the thread.
                    let _api = api;
                    acquisition_loop(device, config, shared, stop_flag, fault, command_rx, sample_tx);
                }
            })
            .map_err(|e| TrackerError::Spawn(e.to_string()))?;

        Ok(Tracker {
            shared,
            stop_flag,
            fault,
            command_tx,
            sample_rx: Some(sample_rx),
            thread: Some(thread),
        })
    }

    /// Latest orientation snapshot. Cheap; call once per frame.
    pub fn orientation(&self) -> UnitQuaternion<f32> {
        self.shared.get()
    }

    /// Force-reset the orientation to a reference (a "recenter" action).
    ///
    /// Takes effect immediately for readers; the estimator picks up the
    /// reference before its next update, without halting acquisition.
    /// A report already in flight when this is called may republish the
    /// old pose for one cycle; the acquisition thread rewrites the shared
    /// orientation with the reference as soon as it services the command.
    pub fn recenter(&self, reference: UnitQuaternion<f32>) {
        self.shared.set(reference);
        let _ = self.command_tx.send(Command::Recenter(reference));
    }

    /// Physical-unit samples as they are decoded, for recording or
    /// diagnostics. Samples are dropped when the receiver falls behind.
    /// Can be taken once per session.
    pub fn samples(&mut self) -> Option<Receiver<PhysicalSample>> {
        self.sample_rx.take()
    }

    /// Whether the acquisition loop is still running. Turns false after
    /// `stop()` or a fatal read error.
    pub fn is_running(&self) -> bool {
        !self.stop_flag.load(Ordering::Relaxed)
    }

    /// The read error that terminated the session, if any.
    pub fn take_fault(&self) -> Option<TrackerError> {
        self.fault.lock().unwrap_or_else(|e| e.into_inner()).take()
    }

    /// Stop tracking and wait for the reader thread to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The acquisition loop runs on its own thread for the device's lifetime:
/// read one report, decode, convert, estimate, publish.
///
/// A read error is fatal to the session; unrecognized report types and
/// wrong-sized buffers only skip the cycle.
fn acquisition_loop(
    device: HidDevice,
    config: TrackerConfig,
    shared: Arc<SharedOrientation>,
    stop_flag: Arc<AtomicBool>,
    fault: Arc<Mutex<Option<TrackerError>>>,
    command_rx: Receiver<Command>,
    sample_tx: Sender<PhysicalSample>,
) {
    let mut clock = SampleClock::new(config.layout);
    let mut estimator: Box<dyn Estimator> = estimator::build(config.estimator, config.fusion);
    let mut buf = [0u8; REPORT_SIZE];

    log::info!("acquisition loop started");

    while !stop_flag.load(Ordering::Relaxed) {
        // Recenter commands arrive between reads so estimator state is
        // never touched from another thread.
        while let Ok(Command::Recenter(reference)) = command_rx.try_recv() {
            estimator.reset(reference);
            // Overwrite any stale pose a cycle in flight during recenter()
            // may have published after the caller's own write.
            shared.set(reference);
        }

        // Short timeout so the stop flag is polled between reports.
        let len = match device.read_timeout(&mut buf, 100) {
            Ok(0) => continue, // timeout, no data
            Ok(n) => n,
            Err(e) => {
                log::error!("device read failed, stopping session: {}", e);
                *fault.lock().unwrap_or_else(|p| p.into_inner()) =
                    Some(TrackerError::Read(e.to_string()));
                break;
            }
        };

        let sample = match protocol::decode(&buf[..len], config.layout) {
            Ok(sample) => sample,
            Err(DecodeError::Ignored) => continue,
            Err(e @ DecodeError::InvalidLength(_)) => {
                log::warn!("skipping report: {}", e);
                continue;
            }
        };

        let physical = convert::physical(&sample, config.layout);
        let dt = clock.dt(sample.tick);
        estimator.update(&physical, dt);
        shared.set(estimator.orientation());

        // Best-effort tap; never blocks the loop.
        let _ = sample_tx.try_send(physical);
    }

    stop_flag.store(true, Ordering::Relaxed);
    log::info!("acquisition loop exited");
}
