//! Tracker event notifications.

use std::sync::Arc;

use crate::{chunk::Chunk, representation::Representation, segment::StreamFormat};

/// One-shot notification from a [`crate::SegmentTracker`].
///
/// Payloads are borrowed: an event is valid for the duration of the listener
/// call and cannot be stored, which keeps ownership of chunks and
/// representations with the tracker.
#[derive(Clone, Copy, Debug)]
pub enum TrackerEvent<'a> {
    /// A break in presentation continuity; the demuxer must re-synchronize
    /// timing across `chunk`.
    Discontinuity { chunk: &'a Chunk },
    /// The tracker moved from `from` to `to`. `to` is `None` when the
    /// tracker dropped its representation entirely (reset).
    Switching {
        from: Option<&'a Arc<Representation>>,
        to: Option<&'a Arc<Representation>>,
    },
    /// The stream format changed; the demuxer must re-instantiate its
    /// parser before consuming the chunk this event precedes.
    FormatChange { format: StreamFormat },
}

/// Callback contract for tracker subscribers (the demuxer, the adaptation
/// logic). Delivered synchronously, in registration order, on the thread
/// driving the tracker.
pub trait SegmentTrackerListener: Send + Sync {
    fn on_tracker_event(&self, event: &TrackerEvent<'_>);
}

/// Ordered listener list.
#[derive(Clone, Default)]
pub(crate) struct ListenerRegistry {
    listeners: Vec<Arc<dyn SegmentTrackerListener>>,
}

impl ListenerRegistry {
    pub fn register(&mut self, listener: Arc<dyn SegmentTrackerListener>) {
        self.listeners.push(listener);
    }

    pub fn notify(&self, event: &TrackerEvent<'_>) {
        for listener in &self.listeners {
            listener.on_tracker_event(event);
        }
    }
}
