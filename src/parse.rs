//! Binary codec for IMU sample notifications.
//!
//! Both functions are pure and allocation-free apart from the returned
//! payload in [`encode_sample`].
//!
//! | Function | Direction | Format |
//! |---|---|---|
//! | [`decode_sample`] | wire → [`ImuSample`] | 6 × `f32` LE, exactly 24 bytes |
//! | [`encode_sample`] | [`ImuSample`] → wire | same layout (simulator) |

use crate::protocol::SAMPLE_PAYLOAD_LEN;
use crate::types::ImuSample;

/// Read a little-endian `f32` from `data` at byte `offset`.
///
/// # Panics
/// Panics if `offset + 3 >= data.len()`.
fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Decode one sample notification.
///
/// Returns `None` unless `data` is exactly [`SAMPLE_PAYLOAD_LEN`] bytes.
/// Short or oversized payloads are never partially decoded; the caller is
/// expected to drop them silently.
///
/// ```
/// # use imu_collect::parse::decode_sample;
/// assert!(decode_sample(&[0u8; 23]).is_none());
/// assert_eq!(decode_sample(&[0u8; 24]).unwrap().az, 0.0);
/// ```
pub fn decode_sample(data: &[u8]) -> Option<ImuSample> {
    if data.len() != SAMPLE_PAYLOAD_LEN {
        return None;
    }
    Some(ImuSample {
        ax: read_f32_le(data, 0),
        ay: read_f32_le(data, 4),
        az: read_f32_le(data, 8),
        gx: read_f32_le(data, 12),
        gy: read_f32_le(data, 16),
        gz: read_f32_le(data, 20),
    })
}

/// Encode a sample in the peripheral's wire format.
pub fn encode_sample(sample: &ImuSample) -> [u8; SAMPLE_PAYLOAD_LEN] {
    let mut out = [0u8; SAMPLE_PAYLOAD_LEN];
    for (chunk, v) in out.chunks_exact_mut(4).zip(sample.channels()) {
        chunk.copy_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_every_other_length() {
        let buf = [0x3fu8; 64];
        for len in (0..=64).filter(|&l| l != SAMPLE_PAYLOAD_LEN) {
            assert!(decode_sample(&buf[..len]).is_none(), "len {len} decoded");
        }
    }

    #[test]
    fn decodes_known_bytes() {
        // 1.0, -1.0, 0.5, 2.0, -0.25, 100.0 as little-endian f32
        let data: [u8; 24] = [
            0x00, 0x00, 0x80, 0x3f, //
            0x00, 0x00, 0x80, 0xbf, //
            0x00, 0x00, 0x00, 0x3f, //
            0x00, 0x00, 0x00, 0x40, //
            0x00, 0x00, 0x80, 0xbe, //
            0x00, 0x00, 0xc8, 0x42, //
        ];
        let s = decode_sample(&data).unwrap();
        assert_eq!(s.channels(), [1.0, -1.0, 0.5, 2.0, -0.25, 100.0]);
    }

    #[test]
    fn encoded_values_decode_unchanged() {
        let s = ImuSample {
            ax: 0.0123,
            ay: -0.98,
            az: 9.80665,
            gx: 123.456,
            gy: -0.0001,
            gz: f32::MAX,
        };
        assert_eq!(decode_sample(&encode_sample(&s)), Some(s));
    }

    #[test]
    fn field_order_follows_offsets() {
        let mut data = [0u8; 24];
        for i in 0..6 {
            data[i * 4..i * 4 + 4].copy_from_slice(&(i as f32).to_le_bytes());
        }
        let s = decode_sample(&data).unwrap();
        assert_eq!((s.ax, s.ay, s.az, s.gx, s.gy, s.gz), (0.0, 1.0, 2.0, 3.0, 4.0, 5.0));
    }
}
