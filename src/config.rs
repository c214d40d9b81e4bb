//! Command-line configuration shared by the `imu-collect` and `tui` binaries.

use std::path::PathBuf;

use clap::Parser;

use crate::imu_client::ImuClientConfig;
use crate::simulate::DEFAULT_RATE_HZ;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Stream, chart and record labeled IMU sessions over BLE")]
pub struct Args {
    /// Use the built-in signal generator instead of a BLE device.
    #[arg(long)]
    pub simulate: bool,

    /// Simulator notification rate in Hz.
    #[arg(long, default_value_t = DEFAULT_RATE_HZ)]
    pub sim_rate: f64,

    /// Activity label attached to recorded samples.
    #[arg(short, long, default_value = "")]
    pub label: String,

    /// Directory recordings are saved into.
    #[arg(short, long, default_value = ".")]
    pub out_dir: PathBuf,

    /// Seconds to scan for the peripheral.
    #[arg(long, default_value_t = 10)]
    pub scan_timeout: u64,

    /// Only connect to devices whose name starts with this prefix.
    #[arg(long)]
    pub name_prefix: Option<String>,

    /// Give up on the GATT connect step after this many seconds.
    #[arg(long)]
    pub connect_timeout: Option<u64>,

    /// List nearby IMU peripherals and exit.
    #[arg(long)]
    pub list: bool,

    /// Start recording as soon as the connection is up.
    #[arg(long)]
    pub record: bool,
}

impl Args {
    pub fn client_config(&self) -> ImuClientConfig {
        ImuClientConfig {
            scan_timeout_secs: self.scan_timeout,
            name_prefix: self.name_prefix.clone(),
            connect_timeout_secs: self.connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["imu-collect"]);
        assert!(!args.simulate);
        assert_eq!(args.label, "");
        assert_eq!(args.out_dir, PathBuf::from("."));
        let cfg = args.client_config();
        assert_eq!(cfg.scan_timeout_secs, 10);
        assert!(cfg.name_prefix.is_none());
        assert!(cfg.connect_timeout_secs.is_none());
    }

    #[test]
    fn flags_reach_client_config() {
        let args = Args::parse_from([
            "imu-collect",
            "--scan-timeout",
            "3",
            "--name-prefix",
            "Nano",
            "--connect-timeout",
            "8",
            "-l",
            "walk",
            "--record",
        ]);
        let cfg = args.client_config();
        assert_eq!(cfg.scan_timeout_secs, 3);
        assert_eq!(cfg.name_prefix.as_deref(), Some("Nano"));
        assert_eq!(cfg.connect_timeout_secs, Some(8));
        assert_eq!(args.label, "walk");
        assert!(args.record);
    }
}
