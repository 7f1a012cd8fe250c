//! # Bus: fan-in of runtime events.
//!
//! Runners and the supervisor push [`Event`]s into one [`tokio::sync::broadcast`]
//! channel. Tests and the supervisor's listener read from it.
//!
//! ```text
//! run_once (per operation) ─┐
//! TaskSupervisor::spawn     ├─► Bus ─► Receiver(s)
//! TaskSupervisor::cancel    │           ├─ supervisor listener ─► SubscriberSet
//! TaskSupervisor::shutdown ─┘           └─ bus().subscribe() in tests / apps
//! ```
//!
//! Publishing never waits. Events sent while nobody is subscribed are gone, and a
//! receiver that falls more than `capacity` events behind sees `Lagged(n)`.

use tokio::sync::broadcast;

use super::event::Event;

/// Clonable sender side of the event channel.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Ring buffer of `capacity` events; 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Sends `ev` to every current receiver.
    pub fn publish(&self, ev: Event) {
        // No receivers is not an error here.
        let _ = self.tx.send(ev);
    }

    /// New receiver; sees only events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn late_receiver_misses_earlier_events() {
        let bus = Bus::new(0);
        bus.publish(Event::new(EventKind::ShutdownRequested));

        let mut rx = bus.subscribe();
        bus.publish(Event::new(EventKind::AllStoppedWithin));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::AllStoppedWithin);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn slow_receiver_reports_lag() {
        let bus = Bus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(Event::new(EventKind::OperationSpawned));
        }
        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(3))));
    }
}
