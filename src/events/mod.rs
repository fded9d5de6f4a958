//! Notifications from the explorer to views.
//!
//! Views subscribe to an [`EventBus`] and receive [`ExplorerEvent`]s in the
//! order the control thread published them. Subscribers that dropped their
//! receiver are pruned on the next publish.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::aggregation::{AggregationResult, Generation};
use crate::references::ReferenceDelivery;
use crate::session::{ConnectionFault, SessionState};
use crate::timeline::FrameRange;

/// Something views may want to redraw for.
#[derive(Debug, Clone)]
pub enum ExplorerEvent {
    /// The visible frame range changed.
    ViewportChanged(FrameRange),
    /// The timeline series for the visible range was recomputed.
    RegionRefreshed(FrameRange),
    /// An aggregation started; `total` initializes the progress indicator.
    AggregationStarted {
        /// Request generation.
        generation: Generation,
        /// Frames being aggregated.
        range: FrameRange,
        /// Records to scan.
        total: usize,
    },
    /// Aggregation progress.
    AggregationProgress {
        /// Request generation.
        generation: Generation,
        /// Records scanned.
        current: usize,
        /// Records to scan.
        total: usize,
    },
    /// A new aggregation result is current.
    AggregationPublished(Arc<AggregationResult>),
    /// An aggregation failed; the previous result stays visible.
    AggregationWarning {
        /// Request generation.
        generation: Generation,
        /// What went wrong.
        message: String,
    },
    /// The latest reference query was answered.
    ReferencesResolved(ReferenceDelivery),
    /// The session changed state.
    SessionChanged(SessionState),
    /// The session ended with a fault.
    SessionFault(ConnectionFault),
}

/// Ordered fan-out of explorer events.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<ExplorerEvent>>,
}

impl EventBus {
    /// Bus without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> Receiver<ExplorerEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Live subscriber count.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Send `event` to every live subscriber.
    pub fn publish(&mut self, event: ExplorerEvent) {
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_in_order_and_prunes_dropped() {
        let mut bus = EventBus::new();
        let kept = bus.subscribe();
        let dropped = bus.subscribe();
        drop(dropped);

        bus.publish(ExplorerEvent::ViewportChanged(FrameRange::new(0, 10)));
        bus.publish(ExplorerEvent::SessionChanged(SessionState::Stopped));
        assert_eq!(bus.subscriber_count(), 1);

        let received: Vec<_> = kept.try_iter().collect();
        assert!(matches!(received[0], ExplorerEvent::ViewportChanged(r) if r == FrameRange::new(0, 10)));
        assert!(matches!(received[1], ExplorerEvent::SessionChanged(SessionState::Stopped)));
    }
}
