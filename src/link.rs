//! A running sample source: a BLE connection or the simulator.
//!
//! Both binaries hold at most one `Link` and drive it through the same
//! disconnect / teardown calls.

use anyhow::Result;
use log::info;

use crate::imu_client::ImuHandle;
use crate::simulate::SimulatorHandle;

pub enum Link {
    Ble(ImuHandle),
    Simulated(SimulatorHandle),
}

impl Link {
    pub fn name(&self) -> &str {
        match self {
            Link::Ble(h) => h.name(),
            Link::Simulated(_) => crate::simulate::SIMULATED_DEVICE,
        }
    }

    /// Request a disconnect.  Completion arrives as
    /// [`crate::types::ImuEvent::Disconnected`].
    pub async fn disconnect(&self) -> Result<()> {
        match self {
            Link::Ble(h) => h.disconnect().await,
            Link::Simulated(s) => {
                s.disconnect();
                Ok(())
            }
        }
    }

    /// Store `link` in `slot`, releasing whatever was there before.
    ///
    /// The previous link is torn down on a background task, so a source the
    /// caller lost track of is never simply dropped.
    pub fn replace(slot: &mut Option<Link>, link: Link) {
        if let Some(old) = slot.replace(link) {
            info!("Releasing stale link to {}", old.name());
            tokio::spawn(old.teardown());
        }
    }

    /// Detach the listener and release the source.
    pub async fn teardown(self) {
        match self {
            Link::Ble(h) => h.teardown().await,
            Link::Simulated(s) => s.teardown(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::spawn_simulator;
    use crate::types::ImuEvent;

    #[tokio::test]
    async fn replace_tears_down_previous_link() {
        let (mut old_rx, old) = spawn_simulator(100.0);
        let (mut new_rx, new) = spawn_simulator(100.0);
        assert!(matches!(old_rx.recv().await, Some(ImuEvent::Connected(_))));

        let mut slot = Some(Link::Simulated(old));
        Link::replace(&mut slot, Link::Simulated(new));

        // The old source stops without a Disconnected event; queued samples may remain.
        while let Some(ev) = old_rx.recv().await {
            assert!(matches!(ev, ImuEvent::Sample(_)), "unexpected {ev:?}");
        }
        assert!(matches!(new_rx.recv().await, Some(ImuEvent::Connected(_))));
        assert!(matches!(new_rx.recv().await, Some(ImuEvent::Sample(_))));

        if let Some(l) = slot.take() {
            l.teardown().await;
        }
    }

    #[tokio::test]
    async fn replace_into_empty_slot() {
        let (_rx, sim) = spawn_simulator(100.0);
        let mut slot = None;
        Link::replace(&mut slot, Link::Simulated(sim));
        assert_eq!(slot.as_ref().map(Link::name), Some(crate::simulate::SIMULATED_DEVICE));
        if let Some(l) = slot.take() {
            l.teardown().await;
        }
    }
}
