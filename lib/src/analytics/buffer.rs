use std::collections::VecDeque;

use super::AnalyticsEvent;

/// An ordered, bounded queue of events waiting to be sent.
///
/// When full, the oldest event makes room for the newest.
///
/// ```rust
/// use gazette::analytics::{EventBuffer, Session};
///
/// let session = Session::new(None);
/// let mut buffer = EventBuffer::new(2);
/// for kind in ["a", "b", "c"] {
///     buffer.push(session.event(kind).build());
/// }
///
/// let kinds: Vec<_> = buffer.iter().map(|e| e.event_type.as_str()).collect();
/// assert_eq!(kinds, ["b", "c"]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct EventBuffer {
    events: VecDeque<AnalyticsEvent>,
    max: usize,
}

impl EventBuffer {
    pub fn new(max: usize) -> Self {
        EventBuffer { events: VecDeque::with_capacity(max.min(1024)), max }
    }

    /// Appends `event`, returning the event dropped to make room, if any.
    /// With a capacity of zero, `event` itself is dropped.
    pub fn push(&mut self, event: AnalyticsEvent) -> Option<AnalyticsEvent> {
        if self.max == 0 {
            tracing::warn!(event = %event.event_type, "analytics buffer has no capacity, dropping event");
            return Some(event);
        }

        let dropped = match self.events.len() >= self.max {
            true => self.events.pop_front(),
            false => None,
        };

        if let Some(dropped) = &dropped {
            tracing::warn!(
                dropped = %dropped.event_type,
                max = self.max,
                "analytics buffer full, dropping oldest event"
            );
        }

        self.events.push_back(event);
        dropped
    }

    /// Removes and returns every buffered event, oldest first.
    pub fn take_all(&mut self) -> Vec<AnalyticsEvent> {
        self.events.drain(..).collect()
    }

    /// Puts `batch` back in front of any events buffered since it was taken,
    /// then drops the oldest events until the buffer fits its capacity.
    /// Returns the number of events dropped.
    pub fn requeue_front(&mut self, batch: Vec<AnalyticsEvent>) -> usize {
        let newer = std::mem::take(&mut self.events);
        self.events = batch.into();
        self.events.extend(newer);

        let excess = self.events.len().saturating_sub(self.max);
        self.events.drain(..excess);
        if excess > 0 {
            tracing::warn!(dropped = excess, max = self.max, "requeued batch overflows analytics buffer");
        }

        excess
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnalyticsEvent> + '_ {
        self.events.iter()
    }
}
