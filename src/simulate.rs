//! Synthetic IMU source for running the pipeline without hardware.
//!
//! Samples are generated as if a sensor were being waved gently, encoded
//! into the peripheral's 24-byte wire format and decoded again, so the
//! simulator exercises the same decoder as a real connection.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::parse::{decode_sample, encode_sample};
use crate::types::{ImuEvent, ImuSample};

/// Device name reported in [`ImuEvent::Connected`].
pub const SIMULATED_DEVICE: &str = "Simulated IMU";

/// Default notification rate of the simulator, close to the firmware's.
pub const DEFAULT_RATE_HZ: f64 = 50.0;

/// Fastest supported simulator rate.
pub const MAX_RATE_HZ: f64 = 1_000.0;

/// Synthetic reading at time `t` seconds.
///
/// | Channel | Signal |
/// |---|---|
/// | ax, ay | ±0.3 g sway at 0.7 / 1.1 Hz |
/// | az     | −1 g gravity ± 0.05 g bounce at 2 Hz |
/// | gx..gz | ±40 / 25 / 10 °/s rotation at 0.5 / 0.9 / 0.3 Hz |
///
/// A small deterministic noise term is added to every channel.
pub fn sim_sample(t: f64) -> ImuSample {
    let noise = |ch: f64| {
        let nx = t * 1000.7 + ch * 137.508;
        ((nx.sin() * 9973.1).fract() - 0.5) * 0.02
    };
    let wave = |amp: f64, hz: f64, phase: f64| amp * (2.0 * PI * hz * t + phase).sin();
    ImuSample {
        ax: (wave(0.3, 0.7, 0.0) + noise(0.0)) as f32,
        ay: (wave(0.3, 1.1, PI / 3.0) + noise(1.0)) as f32,
        az: (-1.0 + wave(0.05, 2.0, 0.0) + noise(2.0)) as f32,
        gx: (wave(40.0, 0.5, 0.0) + noise(3.0) * 50.0) as f32,
        gy: (wave(25.0, 0.9, PI / 2.0) + noise(4.0) * 50.0) as f32,
        gz: (wave(10.0, 0.3, PI) + noise(5.0) * 50.0) as f32,
    }
}

/// Running simulator; the counterpart of [`crate::imu_client::ImuHandle`].
pub struct SimulatorHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SimulatorHandle {
    /// Stop generating. The task emits [`ImuEvent::Disconnected`] and exits.
    pub fn disconnect(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Stop forwarding immediately without emitting further events.
    pub fn teardown(self) {
        self.stop.store(true, Ordering::Release);
        self.task.abort();
    }
}

/// `rate_hz` limited to `(0, MAX_RATE_HZ]`; unusable values fall back to
/// [`DEFAULT_RATE_HZ`].
///
/// ```
/// use imu_collect::simulate::{effective_rate, DEFAULT_RATE_HZ, MAX_RATE_HZ};
/// assert_eq!(effective_rate(f64::NAN), DEFAULT_RATE_HZ);
/// assert_eq!(effective_rate(1e12), MAX_RATE_HZ);
/// ```
pub fn effective_rate(rate_hz: f64) -> f64 {
    if rate_hz.is_nan() || rate_hz <= 0.0 {
        DEFAULT_RATE_HZ
    } else {
        rate_hz.min(MAX_RATE_HZ)
    }
}

/// Start streaming synthetic samples at `rate_hz` (see [`effective_rate`]).
pub fn spawn_simulator(rate_hz: f64) -> (mpsc::Receiver<ImuEvent>, SimulatorHandle) {
    let (tx, rx) = mpsc::channel::<ImuEvent>(256);
    let stop = Arc::new(AtomicBool::new(false));
    let requested = rate_hz;
    let rate_hz = effective_rate(requested);
    if rate_hz != requested {
        warn!("Simulator rate {requested} Hz out of range, using {rate_hz} Hz");
    }

    let task = {
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            info!("Simulator started at {rate_hz} Hz");
            let _ = tx.send(ImuEvent::Connected(SIMULATED_DEVICE.into())).await;

            let dt = 1.0 / rate_hz;
            let mut ticker = tokio::time::interval(Duration::from_secs_f64(dt));
            let mut t = 0.0_f64;
            loop {
                ticker.tick().await;
                if stop.load(Ordering::Acquire) {
                    break;
                }
                let payload = encode_sample(&sim_sample(t));
                if let Some(sample) = decode_sample(&payload) {
                    if tx.send(ImuEvent::Sample(sample)).await.is_err() {
                        return;
                    }
                }
                t += dt;
            }
            info!("Simulator stopped");
            let _ = tx.send(ImuEvent::Disconnected).await;
        })
    };

    (rx, SimulatorHandle { stop, task })
}
