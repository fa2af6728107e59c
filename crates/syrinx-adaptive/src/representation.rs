//! One quality/codec variant of a stream and its segment source.

use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use url::Url;

use crate::{
    error::AdaptiveResult,
    segment::{Segment, SegmentKind, StreamFormat},
    timeline::SegmentTimeline,
    url::{SegmentUrl, UrlContext},
};

/// How far behind the newest segment a live session starts, in segments.
const LIVE_EDGE_DISTANCE: u64 = 3;

/// A media segment positioned by [`Representation::next_segment`].
#[derive(Clone, Debug)]
pub struct NextSegment {
    pub segment: Segment,
    /// The segment's actual number (may differ from the requested one).
    pub number: u64,
    /// Set when the requested number is no longer (or not yet) present.
    pub gap: bool,
}

/// Explicit segment list: optional init/index plus media segments in
/// playback order, each carrying its own duration.
#[derive(Clone, Debug, Default)]
pub struct SegmentList {
    base_time: Duration,
    index: Option<Segment>,
    init: Option<Segment>,
    next_number: u64,
    segments: Vec<Segment>,
}

impl SegmentList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start media numbering at `number` instead of 0.
    pub fn starting_at(number: u64) -> Self {
        Self {
            next_number: number,
            ..Self::default()
        }
    }

    pub fn with_init(mut self, init: Segment) -> Self {
        self.init = Some(init);
        self
    }

    pub fn with_index(mut self, index: Segment) -> Self {
        self.index = Some(index);
        self
    }

    /// Append a media segment, numbering it if it has no explicit number.
    pub fn push(&mut self, mut segment: Segment) {
        match segment.number() {
            Some(number) => self.next_number = number + 1,
            None => {
                segment.set_number(self.next_number);
                self.next_number += 1;
            }
        }
        self.segments.push(segment);
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.push(segment);
        self
    }

    fn first_number(&self) -> Option<u64> {
        self.segments.first().and_then(Segment::number)
    }

    fn last_number(&self) -> Option<u64> {
        self.segments.last().and_then(Segment::number)
    }

    fn media_at(&self, number: u64) -> Option<&Segment> {
        self.segments.iter().find(|s| s.number() == Some(number))
    }

    fn next_from(&self, number: u64) -> Option<NextSegment> {
        let segment = self
            .segments
            .iter()
            .find(|s| s.number().is_some_and(|n| n >= number))?;
        let actual = segment.number()?;
        Some(NextSegment {
            segment: segment.clone(),
            number: actual,
            gap: actual != number,
        })
    }

    fn start_time(&self, number: u64) -> Option<Duration> {
        let mut at = self.base_time;
        for segment in &self.segments {
            let n = segment.number()?;
            if n == number {
                return Some(at);
            }
            if n > number {
                break;
            }
            at += segment.duration().unwrap_or_default();
        }
        None
    }

    fn number_by_time(&self, time: Duration) -> Option<u64> {
        let first = self.segments.first()?;
        let mut at = self.base_time;
        if time < at {
            return first.number();
        }
        for segment in &self.segments {
            let end = at + segment.duration().unwrap_or_default();
            if time < end {
                return segment.number();
            }
            at = end;
        }
        None
    }

    fn ahead_of(&self, number: u64) -> Duration {
        self.segments
            .iter()
            .filter(|s| s.number().is_some_and(|n| n >= number))
            .map(|s| s.duration().unwrap_or_default())
            .sum()
    }

    fn prune_below(&mut self, number: u64) {
        let mut dropped = Duration::ZERO;
        self.segments.retain(|s| {
            let keep = s.number().is_some_and(|n| n >= number);
            if !keep {
                dropped += s.duration().unwrap_or_default();
            }
            keep
        });
        self.base_time += dropped;
    }

    /// Append media segments past our last number. Returns whether anything
    /// was appended.
    fn merge_from(&mut self, update: SegmentList) -> bool {
        let edge = self.last_number();
        let mut appended = 0usize;
        for segment in update.segments {
            if edge.is_some_and(|edge| segment.number().is_some_and(|n| n <= edge)) {
                continue;
            }
            self.push(segment);
            appended += 1;
        }
        appended > 0
    }
}

/// Template-addressed segments: URL templates plus nominal timing, with an
/// optional live timeline refining both.
#[derive(Clone, Debug)]
pub struct SegmentTemplate {
    /// Per-segment duration in timescale units (nominal when a timeline is
    /// present).
    duration: u64,
    init: Option<SegmentUrl>,
    media: SegmentUrl,
    start_number: u64,
    timeline: Option<SegmentTimeline>,
    timescale: u64,
    /// Bounds a VOD template; `None` with no timeline means an unbounded
    /// live edge.
    total_segments: Option<u64>,
}

impl SegmentTemplate {
    pub fn new(media: impl Into<SegmentUrl>, duration: u64) -> Self {
        Self {
            duration: duration.max(1),
            init: None,
            media: media.into(),
            start_number: 0,
            timeline: None,
            timescale: 1,
            total_segments: None,
        }
    }

    pub fn with_init(mut self, init: impl Into<SegmentUrl>) -> Self {
        self.init = Some(init.into());
        self
    }

    pub fn with_timescale(mut self, timescale: u64) -> Self {
        self.timescale = timescale.max(1);
        self
    }

    pub fn with_start_number(mut self, start_number: u64) -> Self {
        self.start_number = start_number;
        self
    }

    pub fn with_total_segments(mut self, total: u64) -> Self {
        self.total_segments = Some(total);
        self
    }

    pub fn with_timeline(mut self, timeline: SegmentTimeline) -> Self {
        self.timeline = Some(timeline);
        self
    }

    fn scaled(&self, units: u64) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        Duration::from_secs_f64(units as f64 / self.timescale as f64)
    }

    fn media_segment(&self, number: u64) -> Segment {
        let duration = self
            .timeline
            .as_ref()
            .and_then(|t| {
                t.start_of(number)
                    .and_then(|s| t.start_of(number + 1).map(|e| e - s))
            })
            .unwrap_or(self.duration);
        Segment::media(self.media.clone())
            .with_number(number)
            .with_duration(self.scaled(duration))
    }

    fn first_number(&self) -> u64 {
        match &self.timeline {
            Some(t) => t.first_number().unwrap_or(self.start_number),
            None => self.start_number,
        }
    }

    fn last_number(&self) -> Option<u64> {
        match &self.timeline {
            Some(t) => t.last_number(),
            None => self
                .total_segments
                .map(|total| self.start_number + total.saturating_sub(1)),
        }
    }

    fn next_from(&self, number: u64) -> Option<NextSegment> {
        if let Some(timeline) = &self.timeline {
            let (actual, gap) = timeline.next_from(number)?;
            return Some(NextSegment {
                segment: self.media_segment(actual),
                number: actual,
                gap,
            });
        }

        let actual = number.max(self.start_number);
        if let Some(last) = self.last_number() {
            if actual > last {
                return None;
            }
        }
        Some(NextSegment {
            segment: self.media_segment(actual),
            number: actual,
            gap: false,
        })
    }

    fn start_time(&self, number: u64) -> Option<Duration> {
        if let Some(timeline) = &self.timeline {
            return timeline.start_of(number).map(|t| self.scaled(t));
        }
        if number < self.start_number {
            return None;
        }
        if let Some(last) = self.last_number() {
            if number > last {
                return None;
            }
        }
        Some(self.scaled((number - self.start_number) * self.duration))
    }

    fn number_by_time(&self, time: Duration) -> Option<u64> {
        if let Some(timeline) = &self.timeline {
            let units = (time.as_secs_f64() * self.timescale as f64) as u64;
            return timeline.number_at(units);
        }
        let number = self.start_number
            + (time.as_secs_f64() * self.timescale as f64 / self.duration as f64) as u64;
        match self.last_number() {
            Some(last) if number > last => None,
            _ => Some(number),
        }
    }

    fn ahead_of(&self, number: u64) -> Duration {
        if let Some(timeline) = &self.timeline {
            return self.scaled(timeline.ahead_of(number));
        }
        match self.last_number() {
            Some(last) if number <= last => {
                self.scaled((last - number + 1) * self.duration)
            }
            // Unbounded live edge: nothing is known to be ahead.
            _ => Duration::ZERO,
        }
    }

    fn prune_below(&mut self, number: u64) {
        if let Some(timeline) = &mut self.timeline {
            timeline.prune_below(number);
        }
    }

    fn merge_from(&mut self, update: SegmentTemplate) -> bool {
        let mut changed = false;
        match (&mut self.timeline, update.timeline) {
            (Some(current), Some(new)) => changed = current.merge_from(&new),
            (None, Some(new)) => {
                self.timeline = Some(new);
                changed = true;
            }
            _ => {}
        }
        if let Some(total) = update.total_segments {
            if self.total_segments.is_none_or(|cur| total > cur) {
                self.total_segments = Some(total);
                changed = true;
            }
        }
        changed
    }
}

/// Where a representation's segments come from.
#[derive(Clone, Debug)]
pub enum SegmentSource {
    List(SegmentList),
    Template(SegmentTemplate),
}

impl SegmentSource {
    fn init_segment(&self) -> Option<Segment> {
        match self {
            Self::List(list) => list.init.clone(),
            Self::Template(template) => template
                .init
                .as_ref()
                .map(|url| Segment::init(url.clone())),
        }
    }

    fn index_segment(&self) -> Option<Segment> {
        match self {
            Self::List(list) => list.index.clone(),
            Self::Template(_) => None,
        }
    }

    fn media_at(&self, number: u64) -> Option<Segment> {
        match self {
            Self::List(list) => list.media_at(number).cloned(),
            Self::Template(template) => {
                let first = template.first_number();
                let in_range = number >= first
                    && template.last_number().is_none_or(|last| number <= last);
                in_range.then(|| template.media_segment(number))
            }
        }
    }

    fn next_from(&self, number: u64) -> Option<NextSegment> {
        match self {
            Self::List(list) => list.next_from(number),
            Self::Template(template) => template.next_from(number),
        }
    }

    fn first_number(&self) -> Option<u64> {
        match self {
            Self::List(list) => list.first_number(),
            Self::Template(template) => Some(template.first_number()),
        }
    }

    fn last_number(&self) -> Option<u64> {
        match self {
            Self::List(list) => list.last_number(),
            Self::Template(template) => template.last_number(),
        }
    }

    fn start_time(&self, number: u64) -> Option<Duration> {
        match self {
            Self::List(list) => list.start_time(number),
            Self::Template(template) => template.start_time(number),
        }
    }

    fn number_by_time(&self, time: Duration) -> Option<u64> {
        match self {
            Self::List(list) => list.number_by_time(time),
            Self::Template(template) => template.number_by_time(time),
        }
    }

    fn ahead_of(&self, number: u64) -> Duration {
        match self {
            Self::List(list) => list.ahead_of(number),
            Self::Template(template) => template.ahead_of(number),
        }
    }

    fn prune_below(&mut self, number: u64) {
        match self {
            Self::List(list) => list.prune_below(number),
            Self::Template(template) => template.prune_below(number),
        }
    }

    fn merge_from(&mut self, update: SegmentSource) -> bool {
        match (self, update) {
            (Self::List(current), Self::List(new)) => current.merge_from(new),
            (Self::Template(current), Self::Template(new)) => current.merge_from(new),
            (current, new) => {
                warn!("segment source kind changed on refresh");
                *current = new;
                true
            }
        }
    }
}

impl From<SegmentList> for SegmentSource {
    fn from(list: SegmentList) -> Self {
        Self::List(list)
    }
}

impl From<SegmentTemplate> for SegmentSource {
    fn from(template: SegmentTemplate) -> Self {
        Self::Template(template)
    }
}

/// One quality variant: bandwidth, codecs, and a segment source.
///
/// Created when the manifest is parsed, owned by its adaptation set, shared
/// with trackers as `Arc`. Live refreshes mutate the segment source in place
/// behind the lock, copy-on-update, so sibling trackers can keep reading
/// concurrently.
pub struct Representation {
    bandwidth_bps: u64,
    base_url: Option<Url>,
    codecs: Vec<String>,
    /// Whether segment indices stay aligned across a switch to/from this
    /// representation.
    consistent_numbering: bool,
    dimensions: Option<(u32, u32)>,
    format: StreamFormat,
    id: String,
    live: bool,
    next_update_at: Mutex<Option<Instant>>,
    pending_update: Mutex<Option<SegmentSource>>,
    source: RwLock<SegmentSource>,
    switchable: bool,
}

impl Representation {
    pub fn new(id: impl Into<String>, bandwidth_bps: u64, source: impl Into<SegmentSource>) -> Self {
        Self {
            bandwidth_bps,
            base_url: None,
            codecs: Vec::new(),
            consistent_numbering: true,
            dimensions: None,
            format: StreamFormat::Unknown,
            id: id.into(),
            live: false,
            next_update_at: Mutex::new(None),
            pending_update: Mutex::new(None),
            source: RwLock::new(source.into()),
            switchable: true,
        }
    }

    pub fn with_codecs(mut self, codecs: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.codecs = codecs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    pub fn with_format(mut self, format: StreamFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_consistent_numbering(mut self, consistent: bool) -> Self {
        self.consistent_numbering = consistent;
        self
    }

    pub fn with_switchable(mut self, switchable: bool) -> Self {
        self.switchable = switchable;
        self
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bandwidth_bps(&self) -> u64 {
        self.bandwidth_bps
    }

    pub fn codecs(&self) -> &[String] {
        &self.codecs
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn consistent_numbering(&self) -> bool {
        self.consistent_numbering
    }

    /// Whether the tracker may switch away from this representation.
    pub fn is_switchable(&self) -> bool {
        self.switchable
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Segment of the given kind; `number` positions media segments and is
    /// ignored for init/index.
    pub fn segment(&self, kind: SegmentKind, number: Option<u64>) -> Option<Segment> {
        let source = self.source.read();
        match kind {
            SegmentKind::Init => source.init_segment(),
            SegmentKind::Index => source.index_segment(),
            SegmentKind::Media => source.media_at(number?),
        }
    }

    /// The media segment at or after `number`.
    pub fn next_segment(&self, number: u64) -> Option<NextSegment> {
        self.source.read().next_from(number)
    }

    /// Number of the segment covering `time`.
    pub fn segment_number_by_time(&self, time: Duration) -> Option<u64> {
        self.source.read().number_by_time(time)
    }

    /// Presentation start time of segment `number`.
    pub fn segment_start_time(&self, number: u64) -> Option<Duration> {
        self.source.read().start_time(number)
    }

    /// Map a segment number of `from` onto this representation via media
    /// time. Used when the two variants cut segments differently.
    pub fn translate_segment_number(&self, number: u64, from: &Representation) -> Option<u64> {
        let time = from.segment_start_time(number)?;
        self.segment_number_by_time(time)
    }

    /// Start position for a live session: a fixed distance behind the live
    /// edge, clamped to the first available segment. Falls back to `default`
    /// when no edge is known.
    pub fn live_start_segment_number(&self, default: u64) -> u64 {
        let source = self.source.read();
        match (source.first_number(), source.last_number()) {
            (Some(first), Some(last)) => last.saturating_sub(LIVE_EDGE_DISTANCE).max(first),
            _ => default,
        }
    }

    /// Media time available at or after segment `number` without further
    /// manifest refreshes.
    pub fn min_ahead_time(&self, number: u64) -> Duration {
        self.source.read().ahead_of(number)
    }

    /// Hand freshly parsed manifest data to this representation. It is
    /// applied on the next [`Self::run_local_updates`].
    pub fn queue_update(&self, update: impl Into<SegmentSource>) {
        *self.pending_update.lock() = Some(update.into());
    }

    /// Whether this representation is ephemeral and due for a refresh.
    pub fn needs_update(&self) -> bool {
        if !self.live {
            return false;
        }
        if self.pending_update.lock().is_some() {
            return true;
        }
        self.next_update_at
            .lock()
            .is_none_or(|at| Instant::now() >= at)
    }

    /// Apply a queued manifest refresh. Returns whether the segment source
    /// changed. `force` applies even when no refresh is due yet.
    pub fn run_local_updates(&self, playback_time: Duration, count: u64, force: bool) -> bool {
        if !self.live {
            return false;
        }
        if !force && !self.needs_update() {
            return false;
        }
        let Some(update) = self.pending_update.lock().take() else {
            return false;
        };

        let mut source = self.source.read().clone();
        let changed = source.merge_from(update);
        if changed {
            *self.source.write() = source;
            debug!(
                id = %self.id,
                ?playback_time,
                count,
                "segment source refreshed"
            );
        }
        changed
    }

    /// Discard timeline state below `number` to bound memory.
    pub fn prune_by_segment_number(&self, number: u64) {
        self.source.write().prune_below(number);
    }

    /// Arm the next live refresh: half the remaining buffered duration from
    /// `number`, at least one second out.
    pub fn schedule_next_update(&self, number: u64) {
        if !self.live {
            return;
        }
        let ahead = self.min_ahead_time(number);
        let delay = (ahead / 2).max(Duration::from_secs(1));
        *self.next_update_at.lock() = Some(Instant::now() + delay);
        trace!(id = %self.id, number, ?delay, "next manifest refresh armed");
    }

    pub(crate) fn resolve_segment_url(&self, url: &SegmentUrl, number: u64) -> AdaptiveResult<Url> {
        // $Time$ substitutes timescale units for templates, milliseconds for
        // explicit lists.
        let time = {
            let source = self.source.read();
            match &*source {
                SegmentSource::Template(template) => match &template.timeline {
                    Some(timeline) => timeline.start_of(number).unwrap_or(0),
                    None => number.saturating_sub(template.start_number) * template.duration,
                },
                SegmentSource::List(list) => list
                    .start_time(number)
                    .map_or(0, |t| t.as_millis() as u64),
            }
        };
        url.resolve(&UrlContext {
            base: self.base_url.as_ref(),
            number,
            time,
            bandwidth_bps: self.bandwidth_bps,
            representation_id: &self.id,
        })
    }
}

impl std::fmt::Debug for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Representation")
            .field("id", &self.id)
            .field("bandwidth_bps", &self.bandwidth_bps)
            .field("consistent_numbering", &self.consistent_numbering)
            .field("live", &self.live)
            .finish_non_exhaustive()
    }
}
