//! # imu-collect
//!
//! Async Rust library, CLI and terminal UI for collecting labeled
//! accelerometer/gyroscope sessions from a BLE IMU peripheral.
//!
//! The peripheral advertises one custom service with a single notify
//! characteristic; every notification is six little-endian `f32`
//! (`ax ay az gx gy gz`).  Samples are charted live and, while recording is
//! armed, buffered with the current activity label so the session can be
//! saved as a CSV training file.
//!
//! ## Quick start
//!
//! ```no_run
//! use imu_collect::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ImuClient::new(ImuClientConfig::default());
//!     let (mut rx, handle) = client.connect().await?;
//!
//!     let mut session = Session::new();
//!     session.set_label("walk");
//!     while let Some(event) = rx.recv().await {
//!         match event {
//!             ImuEvent::Connected(name) => {
//!                 session.on_connected(&name);
//!                 session.toggle_recording();
//!             }
//!             ImuEvent::Sample(s) => session.on_sample(s, now_ms()),
//!             ImuEvent::Disconnected => break,
//!         }
//!     }
//!     handle.teardown().await;
//!     session.on_disconnected();
//!     session.save(std::path::Path::new("."))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`prelude`] | One-line glob import of the most commonly needed types |
//! | [`imu_client`] | BLE discovery, connection lifecycle and [`imu_client::ImuHandle`] |
//! | [`link`] | A running source: BLE connection or simulator |
//! | [`config`] | Command-line arguments shared by both binaries |
//! | [`session`] | The controller tying connection, recording and display together |
//! | [`recording`] | Armed/idle recording buffer and CSV export |
//! | [`display`] | Rolling chart window, numeric readout, rate tracking |
//! | [`parse`] | 24-byte sample codec |
//! | [`protocol`] | GATT UUIDs, payload layout and export constants |
//! | [`simulate`] | Synthetic sample source for running without hardware |
//! | [`types`] | Samples, recorded entries, events and connection states |

pub mod config;
pub mod display;
pub mod imu_client;
pub mod link;
pub mod parse;
pub mod protocol;
pub mod recording;
pub mod session;
pub mod simulate;
pub mod types;

// ── Prelude ───────────────────────────────────────────────────────────────────

/// Convenience re-exports for downstream crates.
pub mod prelude {
    // ── Client ────────────────────────────────────────────────────────────────
    pub use crate::imu_client::{ImuClient, ImuClientConfig, ImuDevice, ImuHandle, StatusCallback};
    pub use crate::link::Link;

    // ── Controller ────────────────────────────────────────────────────────────
    pub use crate::recording::{Recorder, RecordingError, RecordingState};
    pub use crate::session::{now_ms, Controls, SaveOutcome, Session};

    // ── Events and data types ─────────────────────────────────────────────────
    pub use crate::types::{ConnectionState, ImuEvent, ImuSample, RecordedEntry};

    // ── Protocol constants ────────────────────────────────────────────────────
    pub use crate::protocol::{AXIS_LABELS, AXIS_NAMES, DATA_CHARACTERISTIC, SERVICE_UUID};
}
