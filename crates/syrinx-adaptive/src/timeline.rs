//! Live segment timeline.
//!
//! Run-length encoded: one entry covers `repeat + 1` equal-duration segments
//! starting at a given media time. All times are in the owning template's
//! timescale units; segment numbers are absolute and survive pruning.

use tracing::{debug, trace};

/// One run of equal-duration segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimelineEntry {
    /// Number of the first segment of the run.
    pub number: u64,
    /// Media start time of the run, timescale units.
    pub start: u64,
    /// Per-segment duration, timescale units.
    pub duration: u64,
    /// Additional segments after the first.
    pub repeat: u64,
}

impl TimelineEntry {
    fn last_number(&self) -> u64 {
        self.number + self.repeat
    }

    fn end(&self) -> u64 {
        self.start + self.duration * (self.repeat + 1)
    }

    fn contains(&self, number: u64) -> bool {
        number >= self.number && number <= self.last_number()
    }

    fn start_of(&self, number: u64) -> u64 {
        self.start + (number - self.number) * self.duration
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SegmentTimeline {
    entries: Vec<TimelineEntry>,
}

impl SegmentTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a run continuing the current numbering and time.
    pub fn push(&mut self, duration: u64, repeat: u64) {
        let (number, start) = match self.entries.last() {
            Some(last) => (last.last_number() + 1, last.end()),
            None => (0, 0),
        };
        self.entries.push(TimelineEntry {
            number,
            start,
            duration,
            repeat,
        });
    }

    /// Append a run with explicit numbering and start time.
    pub fn push_numbered(&mut self, number: u64, start: u64, duration: u64, repeat: u64) {
        debug_assert!(
            self.entries
                .last()
                .is_none_or(|last| number > last.last_number()),
            "timeline entries must be appended in increasing number order"
        );
        self.entries.push(TimelineEntry {
            number,
            start,
            duration,
            repeat,
        });
    }

    pub fn first_number(&self) -> Option<u64> {
        self.entries.first().map(|e| e.number)
    }

    pub fn last_number(&self) -> Option<u64> {
        self.entries.last().map(TimelineEntry::last_number)
    }

    /// Media start time of `number`, if the timeline still covers it.
    pub fn start_of(&self, number: u64) -> Option<u64> {
        self.entries
            .iter()
            .find(|e| e.contains(number))
            .map(|e| e.start_of(number))
    }

    /// Number of the segment covering `time`.
    ///
    /// Times before the first covered segment clamp to it; times at or past
    /// the end yield `None`.
    pub fn number_at(&self, time: u64) -> Option<u64> {
        let first = self.entries.first()?;
        if time < first.start {
            return Some(first.number);
        }
        for entry in &self.entries {
            if time >= entry.start && time < entry.end() {
                let offset = (time - entry.start) / entry.duration.max(1);
                return Some(entry.number + offset.min(entry.repeat));
            }
        }
        None
    }

    /// The segment at or after `number`, with a gap flag.
    ///
    /// The gap flag is set when `number` itself is no longer (or not yet)
    /// present and a later segment is returned instead. `None` means nothing
    /// at or past `number` exists yet.
    pub fn next_from(&self, number: u64) -> Option<(u64, bool)> {
        for entry in &self.entries {
            if entry.contains(number) {
                return Some((number, false));
            }
            if entry.number > number {
                return Some((entry.number, true));
            }
        }
        None
    }

    /// Drop all segments numbered below `number`.
    pub fn prune_below(&mut self, number: u64) {
        let before = self.entries.len();
        self.entries.retain_mut(|entry| {
            if entry.last_number() < number {
                return false;
            }
            if entry.number < number {
                let cut = number - entry.number;
                entry.start += cut * entry.duration;
                entry.repeat -= cut;
                entry.number = number;
            }
            true
        });
        if self.entries.len() != before {
            debug!(below = number, dropped = before - self.entries.len(), "timeline pruned");
        }
    }

    /// Append the parts of `other` that lie past our live edge.
    ///
    /// Returns whether anything was appended. Entries entirely covered by
    /// the current timeline are ignored; an entry straddling the edge is
    /// split and only its tail is taken.
    pub fn merge_from(&mut self, other: &SegmentTimeline) -> bool {
        let Some(edge) = self.last_number() else {
            self.entries = other.entries.clone();
            return !self.entries.is_empty();
        };

        let mut appended = 0u64;
        for entry in &other.entries {
            if entry.last_number() <= edge {
                continue;
            }
            let mut tail = *entry;
            if tail.number <= edge {
                let cut = edge + 1 - tail.number;
                tail.start += cut * tail.duration;
                tail.repeat -= cut;
                tail.number = edge + 1;
            }
            appended += tail.repeat + 1;
            self.entries.push(tail);
        }

        if appended > 0 {
            trace!(appended, edge, "timeline extended");
        }
        appended > 0
    }

    /// Total duration (timescale units) of segments numbered `>= number`.
    pub fn ahead_of(&self, number: u64) -> u64 {
        let mut ahead = 0;
        for entry in &self.entries {
            if entry.last_number() < number {
                continue;
            }
            let from = number.max(entry.number);
            ahead += (entry.last_number() - from + 1) * entry.duration;
        }
        ahead
    }
}
