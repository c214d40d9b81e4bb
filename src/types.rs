/// One decoded inertial reading from the peripheral.
///
/// Accelerometer values are in g, gyroscope values in °/s, exactly as the
/// sensor firmware encodes them.  A sample is only ever built from a full
/// 24-byte notification (see [`crate::parse::decode_sample`]) and is never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuSample {
    pub ax: f32,
    pub ay: f32,
    pub az: f32,
    pub gx: f32,
    pub gy: f32,
    pub gz: f32,
}

impl ImuSample {
    /// The six channels in wire order `[ax, ay, az, gx, gy, gz]`.
    pub fn channels(&self) -> [f32; 6] {
        [self.ax, self.ay, self.az, self.gx, self.gy, self.gz]
    }

    /// Inverse of [`ImuSample::channels`].
    pub fn from_channels(c: [f32; 6]) -> Self {
        Self {
            ax: c[0],
            ay: c[1],
            az: c[2],
            gx: c[3],
            gy: c[4],
            gz: c[5],
        }
    }
}

/// A sample captured while recording was armed.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedEntry {
    /// Wall-clock capture time in milliseconds since Unix epoch.
    pub timestamp: i64,
    /// Activity label typed by the user when recording started (trimmed).
    pub label: String,
    pub sample: ImuSample,
}

/// Connection lifecycle of the Connection Manager.
///
/// ```text
/// Disconnected → Discovering → Connecting → SubscribingNotifications → Connected
///       ↑______________________________________________________________|
/// ```
///
/// Any failed step drops straight back to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    /// Scanning for a peripheral advertising the IMU service.
    Discovering,
    /// GATT connect plus service and characteristic lookup.
    Connecting,
    /// Enabling notifications on the data characteristic.
    SubscribingNotifications,
    Connected,
}

impl ConnectionState {
    /// `true` while a connect attempt is running or a link is up; the
    /// connect control is disabled in these states.
    pub fn is_busy(self) -> bool {
        !matches!(self, ConnectionState::Disconnected)
    }
}

/// Events delivered through the receiver returned by
/// [`crate::imu_client::ImuClient::connect`].
#[derive(Debug, Clone, PartialEq)]
pub enum ImuEvent {
    /// Notifications are flowing. Carries the advertised device name.
    Connected(String),
    /// One decoded notification.
    Sample(ImuSample),
    /// The link is gone (user request, power-off, out of range).
    ///
    /// Sent exactly once per connection; the channel closes afterwards.
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_round_trip() {
        let c = [1.0, -2.0, 3.5, 0.25, -0.125, 9.81];
        assert_eq!(ImuSample::from_channels(c).channels(), c);
    }

    #[test]
    fn only_disconnected_is_idle() {
        assert!(!ConnectionState::Disconnected.is_busy());
        assert!(ConnectionState::Discovering.is_busy());
        assert!(ConnectionState::Connecting.is_busy());
        assert!(ConnectionState::SubscribingNotifications.is_busy());
        assert!(ConnectionState::Connected.is_busy());
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
    }
}
