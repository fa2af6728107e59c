//! Per-stream orchestration: which segment of which representation next.

use std::{sync::Arc, time::Duration};

use tracing::{debug, trace};

use crate::{
    adaptation::AdaptationLogic,
    adaptation_set::AdaptationSet,
    chunk::{Chunk, ConnectionManager},
    events::{ListenerRegistry, SegmentTrackerListener, TrackerEvent},
    representation::Representation,
    segment::{SegmentKind, StreamFormat},
};

/// Single authority for "what to download next" for one elementary stream.
///
/// Exactly one demuxer thread drives a tracker; all methods are plain
/// synchronous bookkeeping. The only suspension point of a fetch — the byte
/// transfer itself — lives behind the [`ConnectionManager`] seam and is
/// owned by the external connection layer.
///
/// Every "not found" condition is a `None`/`false` return, never an error:
/// the caller stalls and retries (live) or stops (end of a VOD stream).
pub struct SegmentTracker {
    adaptation_set: Arc<AdaptationSet>,
    /// Next media segment number. Advances only when a media chunk was
    /// actually produced.
    count: u64,
    current: Option<Arc<Representation>>,
    /// Last observed stream format.
    format: StreamFormat,
    /// Live start position not yet seeded.
    first: bool,
    index_sent: bool,
    init_sent: bool,
    /// A freshly adopted representation has not yet produced its first
    /// media chunk.
    initializing: bool,
    listeners: ListenerRegistry,
    logic: Arc<dyn AdaptationLogic>,
}

impl SegmentTracker {
    pub fn new(adaptation_set: Arc<AdaptationSet>, logic: Arc<dyn AdaptationLogic>) -> Self {
        Self {
            adaptation_set,
            count: 0,
            current: None,
            format: StreamFormat::Unknown,
            first: true,
            index_sent: false,
            init_sent: false,
            initializing: true,
            listeners: ListenerRegistry::default(),
            logic,
        }
    }

    /// Subscribe to tracker events. Listeners are notified synchronously in
    /// registration order.
    pub fn register_listener(&mut self, listener: Arc<dyn SegmentTrackerListener>) {
        self.listeners.register(listener);
    }

    pub fn current_representation(&self) -> Option<&Arc<Representation>> {
        self.current.as_ref()
    }

    /// Number of the next media segment to fetch.
    pub fn segment_number(&self) -> u64 {
        self.count
    }

    /// Decide and materialize the next chunk to download.
    ///
    /// `None` is not an error: it means "retry later" on a live stream that
    /// has not published the next segment yet, or "end of stream" on VOD.
    pub fn next_chunk(
        &mut self,
        mut switch_allowed: bool,
        connections: &dyn ConnectionManager,
    ) -> Option<Chunk> {
        // A freshly adopted representation must deliver its first media
        // chunk before any further switch; with none adopted yet the first
        // pick is always free.
        if self.current.is_none() {
            switch_allowed = true;
        } else if self.initializing {
            switch_allowed = false;
        }

        let keep_current =
            !switch_allowed || self.current.as_ref().is_some_and(|r| !r.is_switchable());
        let rep = if keep_current {
            self.current.clone()
        } else {
            self.logic
                .next_representation(&self.adaptation_set, self.current.as_ref())
        };
        let Some(rep) = rep else {
            debug!("no representation available");
            return None;
        };

        let mut prev = None;
        let switched = self
            .current
            .as_ref()
            .is_none_or(|current| !Arc::ptr_eq(current, &rep));
        if switched {
            self.listeners.notify(&TrackerEvent::Switching {
                from: self.current.as_ref(),
                to: Some(&rep),
            });
            debug!(
                from = self.current.as_ref().map(|r| r.id()),
                to = rep.id(),
                "representation adopted"
            );
            prev = self.current.replace(Arc::clone(&rep));
            self.init_sent = false;
            self.index_sent = false;
            self.initializing = true;
        }

        // Ephemeral (live) content refreshes from freshly parsed manifest
        // data; successful refreshes also bound memory and re-arm.
        if rep.needs_update() {
            let playback_time = self.playback_time();
            if rep.run_local_updates(playback_time, self.count, false) {
                rep.prune_by_segment_number(self.count);
                rep.schedule_next_update(self.count);
            }
        }

        // Carry the position across differently-cut variants, or seed it at
        // the live edge on the very first chunk of a live stream.
        if let Some(prev) = prev.as_ref() {
            if !rep.consistent_numbering() {
                if let Some(translated) = rep.translate_segment_number(self.count, prev) {
                    trace!(from = self.count, to = translated, "segment number translated");
                    self.count = translated;
                }
            }
        } else if self.first && rep.is_live() {
            self.count = rep.live_start_segment_number(self.count);
            self.first = false;
            debug!(count = self.count, "live start position seeded");
        }

        // Delivery order per activation: INIT exactly once, INDEX exactly
        // once, then media in increasing order. Init/index chunks return
        // early and do not advance the segment counter.
        if !self.init_sent {
            self.init_sent = true;
            if let Some(init) = rep.segment(SegmentKind::Init, None) {
                trace!(id = rep.id(), "delivering init segment");
                return init.to_chunk(self.count, &rep, connections);
            }
        }
        if !self.index_sent {
            self.index_sent = true;
            if let Some(index) = rep.segment(SegmentKind::Index, None) {
                trace!(id = rep.id(), "delivering index segment");
                return index.to_chunk(self.count, &rep, connections);
            }
        }

        let Some(next) = rep.next_segment(self.count) else {
            debug!(count = self.count, id = rep.id(), "no segment at position");
            self.reset();
            return None;
        };

        let chunk = next.segment.to_chunk(next.number, &rep, connections)?;
        self.initializing = false;
        self.count = next.number + 1;

        if (next.gap && next.number > 0) || chunk.discontinuity() {
            debug!(number = next.number, gap = next.gap, "discontinuity");
            self.listeners
                .notify(&TrackerEvent::Discontinuity { chunk: &chunk });
        }

        if chunk.format() != self.format {
            let previous = std::mem::replace(&mut self.format, chunk.format());
            // The very first observed format is adopted silently; there is
            // no last-known format to differ from.
            if previous != StreamFormat::Unknown {
                debug!(?previous, format = ?self.format, "stream format changed");
                self.listeners.notify(&TrackerEvent::FormatChange {
                    format: self.format,
                });
            }
        }

        Some(chunk)
    }

    /// Map a presentation time onto a segment position.
    ///
    /// With `try_only` the feasibility check runs without mutating state.
    /// `restarted` additionally forces re-delivery of INIT/INDEX, as after
    /// a seek.
    pub fn set_position_by_time(&mut self, time: Duration, restarted: bool, try_only: bool) -> bool {
        let probe = self
            .current
            .clone()
            .or_else(|| self.adaptation_set.representations().first().cloned());
        let Some(rep) = probe else {
            return false;
        };
        let Some(number) = rep.segment_number_by_time(time) else {
            return false;
        };
        if try_only {
            return true;
        }
        self.set_position_by_number(number, restarted)
    }

    pub fn set_position_by_number(&mut self, number: u64, restarted: bool) -> bool {
        debug!(number, restarted, "position set");
        self.count = number;
        if restarted {
            self.initializing = true;
            self.init_sent = false;
            self.index_sent = false;
        }
        true
    }

    /// Presentation time of the segment at the current position, or zero
    /// when no representation is selected.
    pub fn playback_time(&self) -> Duration {
        self.current
            .as_ref()
            .and_then(|rep| rep.segment_start_time(self.count))
            .unwrap_or_default()
    }

    /// Media time already available ahead of the current position without
    /// further fetching. Backpressure signal for the caller.
    pub fn min_ahead_time(&self) -> Duration {
        self.current
            .as_ref()
            .map(|rep| rep.min_ahead_time(self.count))
            .unwrap_or_default()
    }

    /// Let an ephemeral representation refresh and reschedule even when no
    /// chunk is currently requested. Idempotent.
    pub fn update_selected(&self) {
        let Some(rep) = self.current.as_ref() else {
            return;
        };
        if rep.needs_update() {
            rep.run_local_updates(self.playback_time(), self.count, true);
            rep.schedule_next_update(self.count);
        }
    }

    /// Drop the active representation and return to the initial delivery
    /// state. The next [`Self::next_chunk`] picks a representation afresh
    /// and re-sends INIT, then INDEX, then media.
    pub fn reset(&mut self) {
        debug!("tracker reset");
        let prev = self.current.take();
        self.listeners.notify(&TrackerEvent::Switching {
            from: prev.as_ref(),
            to: None,
        });
        self.init_sent = false;
        self.index_sent = false;
        self.initializing = true;
        self.format = StreamFormat::Unknown;
    }
}
