//! Frame timestamps and active-zone change events.
//!
//! Zone events are plain snapshots. They are handed to a zone's
//! [`ZoneEventHandler`] synchronously during the zone update and collected in
//! the frame report. A handler must not call back into the pipeline.

use crate::core_modules::active_zone::ZoneId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

/// Host-supplied time of a frame: wall-clock milliseconds and a monotonic
/// frame counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash, Serialize, Deserialize)]
pub struct FrameStamp {
    pub millis: u64,
    pub frame: u64,
}

impl FrameStamp {
    pub fn new(millis: u64, frame: u64) -> Self {
        Self { millis, frame }
    }
}

/// A zone's state at the moment its occupancy flipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneEvent {
    pub id: ZoneId,
    /// New occupancy.
    pub occupied: bool,
    pub fill_ratio: f64,
    pub stamp: FrameStamp,
}

/// Receives zone change events.
pub trait ZoneEventHandler {
    fn on_zone_change(&mut self, event: &ZoneEvent);
}

impl<F> ZoneEventHandler for F
where
    F: FnMut(&ZoneEvent),
{
    fn on_zone_change(&mut self, event: &ZoneEvent) {
        self(event)
    }
}

/// Forwards events to an async consumer. Sending never blocks the frame loop;
/// a closed channel drops the event.
impl ZoneEventHandler for UnboundedSender<ZoneEvent> {
    fn on_zone_change(&mut self, event: &ZoneEvent) {
        if self.send(event.clone()).is_err() {
            debug!(zone = %event.id, "zone event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(occupied: bool) -> ZoneEvent {
        ZoneEvent {
            id: ZoneId::Int(3),
            occupied,
            fill_ratio: 0.25,
            stamp: FrameStamp::new(1000, 30),
        }
    }

    #[test]
    fn closures_are_handlers() {
        let mut count = 0;
        {
            let mut handler = |e: &ZoneEvent| {
                if e.occupied {
                    count += 1;
                }
            };
            handler.on_zone_change(&event(true));
            handler.on_zone_change(&event(false));
        }
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn channel_sender_forwards_events() {
        let (mut tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.on_zone_change(&event(true));
        drop(tx);
        let received = rx.recv().await.unwrap();
        assert_eq!(received, event(true));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (mut tx, rx) = tokio::sync::mpsc::unbounded_channel::<ZoneEvent>();
        drop(rx);
        tx.on_zone_change(&event(false));
    }

    #[test]
    fn events_serialize_to_json() {
        let json = serde_json::to_string(&event(true)).unwrap();
        assert!(json.contains("\"id\":3"));
        assert!(json.contains("\"frame\":30"));
    }
}
