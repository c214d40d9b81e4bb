//! GATT UUIDs, payload layout, and export-format constants for the IMU peripheral.
//!
//! The peripheral exposes one custom service with a single notify-only data
//! characteristic. Both share the vendor namespace
//! `19b1XXXX-e8f2-537e-4f6c-d104768a1214`.

use uuid::Uuid;

// ── Service ──────────────────────────────────────────────────────────────────

/// Custom GATT service advertised by the sensor.
///
/// Used as the scan filter so only IMU peripherals are discovered.
pub const SERVICE_UUID: Uuid = Uuid::from_u128(0x19b10000_e8f2_537e_4f6c_d104768a1214);

// ── Characteristics ───────────────────────────────────────────────────────────

/// Sample characteristic — one [`SAMPLE_PAYLOAD_LEN`]-byte notification per reading.
pub const DATA_CHARACTERISTIC: Uuid = Uuid::from_u128(0x19b10001_e8f2_537e_4f6c_d104768a1214);

// ── Payload layout ────────────────────────────────────────────────────────────

/// Exact size of a sample notification: six little-endian `f32` values.
///
/// | Offset | Field |
/// |--------|-------|
/// | 0      | ax    |
/// | 4      | ay    |
/// | 8      | az    |
/// | 12     | gx    |
/// | 16     | gy    |
/// | 20     | gz    |
pub const SAMPLE_PAYLOAD_LEN: usize = 24;

/// Number of `f32` channels in one sample.
pub const SAMPLE_CHANNELS: usize = 6;

// ── Human-readable labels ─────────────────────────────────────────────────────

/// Short channel names in payload order. Also the tail of [`CSV_HEADER`].
pub const AXIS_NAMES: [&str; SAMPLE_CHANNELS] = ["ax", "ay", "az", "gx", "gy", "gz"];

/// Chart legend names in payload order.
pub const AXIS_LABELS: [&str; SAMPLE_CHANNELS] =
    ["Accel X", "Accel Y", "Accel Z", "Gyro X", "Gyro Y", "Gyro Z"];

// ── Export format ─────────────────────────────────────────────────────────────

/// Header row of a recording export.
pub const CSV_HEADER: [&str; 8] = ["timestamp", "label", "ax", "ay", "az", "gx", "gy", "gz"];

/// Label substituted into the export filename when the first entry has none.
pub const DEFAULT_FILE_LABEL: &str = "data";

/// Build the export filename for a recording.
///
/// `stamp` is the already-formatted save time (`YYYY-MM-DD_HH-MM-SS`).
/// Characters that cannot appear in a file name (path separators, `:` and
/// the other Windows-reserved ones, control characters) become `_`, so the
/// result is always a single path component.
///
/// ```
/// # use imu_collect::protocol::export_file_name;
/// assert_eq!(export_file_name("walk", "2024-05-01_12-00-00"), "imu-walk-2024-05-01_12-00-00.csv");
/// assert_eq!(export_file_name("", "2024-05-01_12-00-00"), "imu-data-2024-05-01_12-00-00.csv");
/// assert_eq!(export_file_name("sit/stand", "2024-05-01_12-00-00"), "imu-sit_stand-2024-05-01_12-00-00.csv");
/// ```
pub fn export_file_name(first_label: &str, stamp: &str) -> String {
    let label: String = if first_label.is_empty() {
        DEFAULT_FILE_LABEL.into()
    } else {
        first_label
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect()
    };
    format!("imu-{label}-{stamp}.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_tail_matches_axis_names() {
        assert_eq!(&CSV_HEADER[2..], &AXIS_NAMES[..]);
    }

    #[test]
    fn characteristic_shares_service_namespace() {
        let svc = SERVICE_UUID.as_u128();
        let chr = DATA_CHARACTERISTIC.as_u128();
        let tail = (1u128 << 96) - 1;
        assert_eq!(svc & tail, chr & tail);
        assert_ne!(svc, chr);
    }

    #[test]
    fn file_name_is_one_path_component() {
        let name = export_file_name("a/b\\c:d*e?f\"g<h>i|j\tk", "2024-05-01_12-00-00");
        assert_eq!(name, "imu-a_b_c_d_e_f_g_h_i_j_k-2024-05-01_12-00-00.csv");
        assert_eq!(std::path::Path::new(&name).components().count(), 1);
    }

    #[test]
    fn payload_len_is_six_floats() {
        assert_eq!(SAMPLE_PAYLOAD_LEN, SAMPLE_CHANNELS * std::mem::size_of::<f32>());
    }
}
