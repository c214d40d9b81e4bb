//! The controller that ties connection state, recording and the live view
//! together.
//!
//! Both binaries own exactly one [`Session`] and feed it the user's actions
//! and the connection's events; all UI state (status line, which controls are
//! enabled, the chart window) is read back from it.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::Utc;
use log::{info, warn};

use crate::display::{RateTracker, SampleWindow};
use crate::recording::{Recorder, RecordingError};
use crate::types::{ConnectionState, ImuSample};

/// Which user controls are currently usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub connect: bool,
    pub disconnect: bool,
    pub record: bool,
    pub label_edit: bool,
    pub save: bool,
}

/// Outcome of a save request, phrased for the user.
#[derive(Debug)]
pub enum SaveOutcome {
    Saved(PathBuf),
    /// Non-fatal; the text is shown as an alert.
    Alert(String),
}

#[derive(Debug)]
pub struct Session {
    state: ConnectionState,
    device: Option<String>,
    status: String,
    label: String,
    recorder: Recorder,
    window: SampleWindow,
    rate: RateTracker,
    latest: Option<ImuSample>,
    /// Arm recording as soon as a connection comes up.
    auto_record: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            device: None,
            status: "Disconnected".into(),
            label: String::new(),
            recorder: Recorder::new(),
            window: SampleWindow::default(),
            rate: RateTracker::new(),
            latest: None,
            auto_record: false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn rate(&self) -> &RateTracker {
        &self.rate
    }

    pub fn latest(&self) -> Option<&ImuSample> {
        self.latest.as_ref()
    }

    pub fn controls(&self) -> Controls {
        let connected = self.state == ConnectionState::Connected;
        Controls {
            connect: !self.state.is_busy(),
            disconnect: connected,
            record: connected,
            label_edit: self.recorder.label_editable(),
            save: self.recorder.save_enabled(),
        }
    }

    // ── Connection events ─────────────────────────────────────────────────────

    /// Mirror a progress report from [`crate::imu_client::ImuClient`].
    pub fn on_status(&mut self, state: ConnectionState, message: &str) {
        self.state = state;
        self.status = message.to_owned();
    }

    pub fn on_connected(&mut self, name: &str) {
        self.state = ConnectionState::Connected;
        self.device = Some(name.to_owned());
        self.status = "Connected!".into();
        if self.auto_record && !self.recorder.is_armed() {
            self.toggle_recording();
        }
    }

    /// Single handler for user- and peripheral-initiated disconnects.
    ///
    /// Recording is disarmed before anything else so no sample is captured
    /// against a dead link.
    pub fn on_disconnected(&mut self) {
        if self.recorder.is_armed() {
            info!("Link lost while recording; disarming");
            self.recorder.disarm();
        }
        self.state = ConnectionState::Disconnected;
        self.device = None;
        self.status = "Disconnected".into();
    }

    /// Fan a decoded sample out to the live view and, when armed, the recorder.
    pub fn on_sample(&mut self, sample: ImuSample, timestamp: i64) {
        self.latest = Some(sample);
        self.window.push(sample);
        self.rate.record(Instant::now());
        self.recorder.append(sample, self.label.trim(), timestamp);
    }

    // ── User actions ──────────────────────────────────────────────────────────

    /// Start recording on every subsequent connect.
    pub fn set_auto_record(&mut self, on: bool) {
        self.auto_record = on;
    }

    /// Replace the label text.  Ignored while recording.
    pub fn set_label(&mut self, label: &str) -> bool {
        if !self.recorder.label_editable() {
            return false;
        }
        self.label = label.to_owned();
        true
    }

    /// Start or stop a recording session.  Only possible while connected.
    pub fn toggle_recording(&mut self) -> bool {
        if self.recorder.is_armed() {
            self.recorder.disarm();
            self.status = "Connected!".into();
            return true;
        }
        if self.state != ConnectionState::Connected {
            warn!("Cannot record while {:?}", self.state);
            return false;
        }
        self.recorder.arm();
        self.status = "Recording...".into();
        true
    }

    /// Save the last session into `dir`.
    ///
    /// An empty buffer is reported as an alert; other failures are errors.
    pub fn save(&self, dir: &Path) -> Result<SaveOutcome, RecordingError> {
        match self.recorder.save_to(dir, Utc::now()) {
            Ok(path) => Ok(SaveOutcome::Saved(path)),
            Err(e @ RecordingError::EmptyBuffer) => Ok(SaveOutcome::Alert(e.to_string())),
            Err(e) => Err(e),
        }
    }

    /// Empty the chart, readout and rate tracker.
    pub fn clear_view(&mut self) {
        self.window.clear();
        self.rate.clear();
        self.latest = None;
    }
}

/// Milliseconds since Unix epoch, used to stamp recorded entries.
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected() -> Session {
        let mut s = Session::new();
        s.on_status(ConnectionState::Discovering, "Requesting Bluetooth Device...");
        s.on_status(ConnectionState::Connecting, "Connecting to GATT Server...");
        s.on_status(ConnectionState::SubscribingNotifications, "Starting Notifications...");
        s.on_connected("IMU");
        s
    }

    fn sample() -> ImuSample {
        ImuSample::from_channels([0.1, 0.2, 0.3, 1.0, 2.0, 3.0])
    }

    #[test]
    fn controls_track_connection() {
        let mut s = Session::new();
        let c = s.controls();
        assert!(c.connect && !c.disconnect && !c.record);

        s.on_status(ConnectionState::Connecting, "Connecting to GATT Server...");
        assert!(!s.controls().connect);
        assert_eq!(s.status(), "Connecting to GATT Server...");

        s.on_connected("IMU");
        let c = s.controls();
        assert!(!c.connect && c.disconnect && c.record);
        assert_eq!(s.device(), Some("IMU"));

        s.on_disconnected();
        let c = s.controls();
        assert!(c.connect && !c.disconnect && !c.record);
        assert_eq!(s.status(), "Disconnected");
    }

    #[test]
    fn failed_connect_returns_to_idle() {
        let mut s = Session::new();
        s.on_status(ConnectionState::Discovering, "Requesting Bluetooth Device...");
        s.on_status(ConnectionState::Disconnected, "Error: No IMU device found");
        assert!(s.controls().connect);
        assert!(s.status().starts_with("Error:"));
    }

    #[test]
    fn disconnect_while_armed_disarms() {
        let mut s = connected();
        s.set_label("walk");
        assert!(s.toggle_recording());
        s.on_sample(sample(), 1);
        assert_eq!(s.recorder().len(), 1);

        s.on_disconnected();
        assert!(!s.recorder().is_armed());
        assert!(s.controls().save);

        // Samples still in flight are not recorded.
        s.on_sample(sample(), 2);
        assert_eq!(s.recorder().len(), 1);
    }

    #[test]
    fn samples_fan_out() {
        let mut s = connected();
        s.on_sample(sample(), 1);
        assert_eq!(s.window().len(), 1);
        assert_eq!(s.latest(), Some(&sample()));
        // Not armed, so nothing recorded.
        assert!(s.recorder().is_empty());

        s.set_label("  jump  ");
        s.toggle_recording();
        s.on_sample(sample(), 2);
        s.on_sample(sample(), 3);
        assert_eq!(s.window().len(), 3);
        assert_eq!(s.recorder().entries()[0].label, "jump");
    }

    #[test]
    fn label_locked_while_recording() {
        let mut s = connected();
        assert!(s.set_label("a"));
        s.toggle_recording();
        assert!(!s.controls().label_edit);
        assert!(!s.set_label("b"));
        assert_eq!(s.label(), "a");
        s.toggle_recording();
        assert!(s.set_label("b"));
    }

    #[test]
    fn auto_record_arms_on_connect() {
        let mut s = Session::new();
        s.set_auto_record(true);
        s.on_sample(sample(), 1);
        assert!(!s.recorder().is_armed());

        s.on_connected("IMU");
        assert!(s.recorder().is_armed());
        assert_eq!(s.status(), "Recording...");
        s.on_sample(sample(), 2);
        assert_eq!(s.recorder().len(), 1);

        // Re-arms after a reconnect.
        s.on_disconnected();
        s.on_connected("IMU");
        assert!(s.recorder().is_armed());
    }

    #[test]
    fn recording_requires_connection() {
        let mut s = Session::new();
        assert!(!s.toggle_recording());
        assert!(!s.recorder().is_armed());
    }

    #[test]
    fn status_follows_recording() {
        let mut s = connected();
        s.toggle_recording();
        assert_eq!(s.status(), "Recording...");
        s.toggle_recording();
        assert_eq!(s.status(), "Connected!");
    }

    #[test]
    fn save_without_data_alerts() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = connected();
        s.toggle_recording();
        match s.save(dir.path()).unwrap() {
            SaveOutcome::Alert(msg) => assert_eq!(msg, "No data to save!"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn save_after_session_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = connected();
        s.set_label("walk");
        s.toggle_recording();
        for t in 0..3 {
            s.on_sample(sample(), t);
        }
        s.toggle_recording();
        let SaveOutcome::Saved(path) = s.save(dir.path()).unwrap() else {
            panic!("expected a saved file");
        };
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }
}
