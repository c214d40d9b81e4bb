//! Labeled recording buffer and CSV export.
//!
//! A [`Recorder`] is either idle or armed.  While armed every sample handed to
//! [`Recorder::append`] is stored with its label and capture time; disarming
//! freezes the buffer until it is exported or the next session is armed.
//!
//! The export is a plain comma-separated table:
//!
//! ```text
//! timestamp,label,ax,ay,az,gx,gy,gz
//! 1715000000000,walk,0.01,-0.98,0.02,1.5,-0.3,0.1
//! ```
//!
//! Labels are written verbatim.  A label containing a comma produces a row
//! with extra columns; this matches the format consumed by the training
//! scripts and is not escaped.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::protocol::{export_file_name, CSV_HEADER};
use crate::types::{ImuSample, RecordedEntry};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure to export or save a recording.
#[derive(Debug)]
pub enum RecordingError {
    /// Nothing has been captured since the last [`Recorder::arm`].
    /// Shown to the user as an alert; never fatal.
    EmptyBuffer,
    Csv(csv::Error),
    Io(io::Error),
}

impl fmt::Display for RecordingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingError::EmptyBuffer => write!(f, "No data to save!"),
            RecordingError::Csv(e) => write!(f, "CSV encoding failed: {e}"),
            RecordingError::Io(e) => write!(f, "could not write recording: {e}"),
        }
    }
}

impl std::error::Error for RecordingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RecordingError::EmptyBuffer => None,
            RecordingError::Csv(e) => Some(e),
            RecordingError::Io(e) => Some(e),
        }
    }
}

impl From<csv::Error> for RecordingError {
    fn from(e: csv::Error) -> Self {
        RecordingError::Csv(e)
    }
}

impl From<io::Error> for RecordingError {
    fn from(e: io::Error) -> Self {
        RecordingError::Io(e)
    }
}

// ── Recorder ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingState {
    #[default]
    Idle,
    Armed,
}

/// In-memory buffer of [`RecordedEntry`] values for one labeled session.
#[derive(Debug, Default)]
pub struct Recorder {
    state: RecordingState,
    entries: Vec<RecordedEntry>,
    save_enabled: bool,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        self.state == RecordingState::Armed
    }

    /// The label can only be edited between sessions.
    pub fn label_editable(&self) -> bool {
        !self.is_armed()
    }

    /// `true` after a session that captured at least one entry has been disarmed.
    pub fn save_enabled(&self) -> bool {
        self.save_enabled
    }

    pub fn entries(&self) -> &[RecordedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start a new session, discarding whatever the previous one captured.
    pub fn arm(&mut self) {
        if !self.entries.is_empty() {
            debug!("Discarding {} entries from previous session", self.entries.len());
        }
        self.entries.clear();
        self.state = RecordingState::Armed;
        self.save_enabled = false;
        info!("Recording armed");
    }

    /// Stop capturing. Entries stay available for export until the next [`arm`](Self::arm).
    pub fn disarm(&mut self) {
        self.state = RecordingState::Idle;
        if !self.entries.is_empty() {
            self.save_enabled = true;
        }
        info!("Recording disarmed ({} entries)", self.entries.len());
    }

    /// Store one sample. No-op unless armed; returns whether it was stored.
    pub fn append(&mut self, sample: ImuSample, label: &str, timestamp: i64) -> bool {
        if !self.is_armed() {
            return false;
        }
        self.entries.push(RecordedEntry {
            timestamp,
            label: label.to_owned(),
            sample,
        });
        true
    }

    /// Serialize every entry as CSV text (header row first).
    pub fn export(&self) -> Result<String, RecordingError> {
        if self.entries.is_empty() {
            return Err(RecordingError::EmptyBuffer);
        }

        let mut writer = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for e in &self.entries {
            let mut row = Vec::with_capacity(CSV_HEADER.len());
            row.push(e.timestamp.to_string());
            row.push(e.label.clone());
            row.extend(e.sample.channels().iter().map(|v| v.to_string()));
            writer.write_record(&row)?;
        }

        let bytes = writer.into_inner().map_err(|e| e.into_error())?;
        String::from_utf8(bytes)
            .map_err(|e| RecordingError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
    }

    /// File name the export would be saved under at time `now`.
    ///
    /// Uses the label of the first entry (or `"data"`) and the UTC save time.
    pub fn file_name(&self, now: DateTime<Utc>) -> String {
        let first_label = self.entries.first().map(|e| e.label.as_str()).unwrap_or("");
        export_file_name(first_label, &now.format("%Y-%m-%d_%H-%M-%S").to_string())
    }

    /// Write the export into `dir` and return the path of the new file.
    pub fn save_to(&self, dir: &Path, now: DateTime<Utc>) -> Result<PathBuf, RecordingError> {
        let csv = self.export()?;
        let path = dir.join(self.file_name(now));
        std::fs::write(&path, csv)?;
        info!("Saved {} entries to {}", self.entries.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(v: f32) -> ImuSample {
        ImuSample::from_channels([v, v + 1.0, v + 2.0, -v, 0.5, 0.25])
    }

    fn rows(csv: &str) -> Vec<&str> {
        csv.lines().collect()
    }

    #[test]
    fn export_while_armed_and_empty_fails() {
        let mut r = Recorder::new();
        r.arm();
        assert!(matches!(r.export(), Err(RecordingError::EmptyBuffer)));
    }

    #[test]
    fn export_without_any_session_fails() {
        assert!(matches!(Recorder::new().export(), Err(RecordingError::EmptyBuffer)));
    }

    #[test]
    fn three_walk_rows() {
        let mut r = Recorder::new();
        r.arm();
        for i in 0..3 {
            assert!(r.append(sample(i as f32), "walk", 1_000 + i));
        }
        r.disarm();

        let csv = r.export().unwrap();
        let lines = rows(&csv);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "timestamp,label,ax,ay,az,gx,gy,gz");
        for line in &lines[1..] {
            assert_eq!(line.split(',').nth(1), Some("walk"));
        }
        assert_eq!(lines[1], "1000,walk,0,1,2,-0,0.5,0.25");
    }

    #[test]
    fn rearm_discards_previous_entries() {
        let mut r = Recorder::new();
        r.arm();
        r.append(sample(1.0), "a", 1);
        r.append(sample(2.0), "a", 2);
        r.arm();
        r.append(sample(3.0), "b", 3);
        r.disarm();

        let csv = r.export().unwrap();
        assert_eq!(rows(&csv).len(), 2);
        assert!(rows(&csv)[1].starts_with("3,b,3,"));
    }

    #[test]
    fn append_is_ignored_while_idle() {
        let mut r = Recorder::new();
        assert!(!r.append(sample(0.0), "x", 0));
        r.arm();
        r.disarm();
        assert!(!r.append(sample(0.0), "x", 0));
        assert!(r.is_empty());
    }

    #[test]
    fn control_flags_follow_state() {
        let mut r = Recorder::new();
        assert!(r.label_editable());
        assert!(!r.save_enabled());

        r.arm();
        assert!(!r.label_editable());
        assert!(!r.save_enabled());

        r.disarm();
        // Nothing captured, so save stays off.
        assert!(!r.save_enabled());

        r.arm();
        r.append(sample(0.0), "x", 0);
        r.disarm();
        assert!(r.save_enabled());
        assert!(r.label_editable());

        r.arm();
        assert!(!r.save_enabled());
    }

    #[test]
    fn comma_in_label_is_not_escaped() {
        let mut r = Recorder::new();
        r.arm();
        r.append(sample(0.0), "left,right", 7);
        r.disarm();
        let csv = r.export().unwrap();
        assert!(rows(&csv)[1].starts_with("7,left,right,"));
    }

    #[test]
    fn file_name_uses_first_label_and_utc_stamp() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let mut r = Recorder::new();
        r.arm();
        r.append(sample(0.0), "jump", 0);
        r.append(sample(0.0), "other", 1);
        assert_eq!(r.file_name(now), "imu-jump-2024-03-09_14-05-07.csv");

        r.arm();
        r.append(sample(0.0), "", 0);
        assert_eq!(r.file_name(now), "imu-data-2024-03-09_14-05-07.csv");
    }

    #[test]
    fn save_writes_export_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut r = Recorder::new();
        r.arm();
        r.append(sample(1.0), "idle", 42);
        r.disarm();

        let path = r.save_to(dir.path(), now).unwrap();
        assert_eq!(path.file_name().unwrap(), "imu-idle-2024-01-02_03-04-05.csv");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r.export().unwrap());
    }

    #[test]
    fn save_with_separator_in_label() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let mut r = Recorder::new();
        r.arm();
        r.append(sample(1.0), "sit/stand", 1);
        r.disarm();

        let path = r.save_to(dir.path(), now).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path());
        assert_eq!(path.file_name().unwrap(), "imu-sit_stand-2024-01-02_03-04-05.csv");
        // The CSV keeps the label as typed.
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.lines().nth(1).unwrap().starts_with("1,sit/stand,"));
    }

    #[test]
    fn save_with_no_data_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Recorder::new().save_to(dir.path(), Utc::now()).unwrap_err();
        assert!(matches!(err, RecordingError::EmptyBuffer));
        assert_eq!(err.to_string(), "No data to save!");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
