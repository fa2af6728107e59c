//! The fetchable units of a representation.

use std::{ops::Range, time::Duration};

use tracing::warn;

use crate::{
    chunk::{Chunk, ConnectionManager},
    representation::Representation,
    url::SegmentUrl,
};

/// Role of a segment within its representation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    /// Decoder initialization data, fetched at most once per activation.
    Init,
    /// Random-access index data, fetched at most once per activation.
    Index,
    /// Actual media data.
    Media,
}

/// Container format of the bytes a representation produces.
///
/// The tracker reports format transitions to the demuxer, which must
/// re-instantiate its parser when the format changes mid-stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StreamFormat {
    #[default]
    Unknown,
    MpegTs,
    Fmp4,
    WebM,
    WebVtt,
    PackedAudio,
}

/// One fetchable unit: a URL fragment, an optional byte range, and optional
/// byte-range partitions of the same resource.
#[derive(Clone, Debug)]
pub struct Segment {
    byte_range: Option<Range<u64>>,
    discontinuity: bool,
    duration: Option<Duration>,
    kind: SegmentKind,
    number: Option<u64>,
    sub_segments: Vec<SubSegment>,
    url: SegmentUrl,
}

/// Byte-range partition of a single physical segment resource.
///
/// Holds only a range — a partition cannot itself be partitioned, so segment
/// nesting is capped at one level by construction.
#[derive(Clone, Debug)]
pub struct SubSegment {
    byte_range: Range<u64>,
}

impl Segment {
    fn with_kind(url: SegmentUrl, kind: SegmentKind) -> Self {
        Self {
            byte_range: None,
            discontinuity: false,
            duration: None,
            kind,
            number: None,
            sub_segments: Vec::new(),
            url,
        }
    }

    pub fn media(url: impl Into<SegmentUrl>) -> Self {
        Self::with_kind(url.into(), SegmentKind::Media)
    }

    pub fn init(url: impl Into<SegmentUrl>) -> Self {
        Self::with_kind(url.into(), SegmentKind::Init)
    }

    pub fn index(url: impl Into<SegmentUrl>) -> Self {
        Self::with_kind(url.into(), SegmentKind::Index)
    }

    pub fn with_byte_range(mut self, range: Range<u64>) -> Self {
        self.byte_range = Some(range);
        self
    }

    pub fn with_number(mut self, number: u64) -> Self {
        self.number = Some(number);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_discontinuity(mut self) -> Self {
        self.discontinuity = true;
        self
    }

    pub fn with_sub_segment(mut self, byte_range: Range<u64>) -> Self {
        self.sub_segments.push(SubSegment { byte_range });
        self
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn number(&self) -> Option<u64> {
        self.number
    }

    pub(crate) fn set_number(&mut self, number: u64) {
        self.number = Some(number);
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn discontinuity(&self) -> bool {
        self.discontinuity
    }

    pub fn byte_range(&self) -> Option<&Range<u64>> {
        self.byte_range.as_ref()
    }

    pub fn url(&self) -> &SegmentUrl {
        &self.url
    }

    pub fn sub_segments(&self) -> &[SubSegment] {
        &self.sub_segments
    }

    /// Materialize this segment as a downloadable [`Chunk`].
    ///
    /// Resolves the URL template with `(number, representation)` context,
    /// asks the connection manager for a chunk, then stamps byte range,
    /// bandwidth and format. Template or allocation failure yields `None`;
    /// the caller retries on its next iteration.
    pub fn to_chunk(
        &self,
        number: u64,
        representation: &Representation,
        connections: &dyn ConnectionManager,
    ) -> Option<Chunk> {
        let url = match representation.resolve_segment_url(&self.url, number) {
            Ok(url) => url,
            Err(error) => {
                warn!(%error, number, kind = ?self.kind, "segment URL resolution failed");
                return None;
            }
        };

        let mut chunk = connections.make_chunk(&url)?;
        if let Some(range) = &self.byte_range {
            chunk.set_byte_range(range.clone());
        }
        chunk.set_bandwidth(representation.bandwidth_bps());
        chunk.set_representation(representation.id());
        chunk.set_kind(self.kind);
        chunk.set_discontinuity(self.discontinuity);
        chunk.set_format(representation.format());
        Some(chunk)
    }
}

impl SubSegment {
    pub fn byte_range(&self) -> &Range<u64> {
        &self.byte_range
    }

    /// Materialize this partition of `parent` as a downloadable [`Chunk`].
    pub fn to_chunk(
        &self,
        parent: &Segment,
        number: u64,
        representation: &Representation,
        connections: &dyn ConnectionManager,
    ) -> Option<Chunk> {
        let mut chunk = parent.to_chunk(number, representation, connections)?;
        chunk.set_byte_range(self.byte_range.clone());
        Some(chunk)
    }
}
