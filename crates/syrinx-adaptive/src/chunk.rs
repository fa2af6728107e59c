//! The in-flight handle for downloading one segment.

use std::ops::Range;

use url::Url;

use crate::segment::{SegmentKind, StreamFormat};

/// Descriptor of one pending transfer, handed to the demuxer.
///
/// A `Chunk` is allocated by the external [`ConnectionManager`] and stamped
/// by the engine with everything the transport and demuxer need: byte range,
/// owning representation, advertised bandwidth (for throughput accounting),
/// and the flags the demuxer reacts to.
#[derive(Clone, Debug)]
pub struct Chunk {
    bandwidth_bps: Option<u64>,
    byte_range: Option<Range<u64>>,
    discontinuity: bool,
    format: StreamFormat,
    kind: SegmentKind,
    representation_id: Option<String>,
    url: Url,
}

impl Chunk {
    pub fn new(url: Url) -> Self {
        Self {
            bandwidth_bps: None,
            byte_range: None,
            discontinuity: false,
            format: StreamFormat::Unknown,
            kind: SegmentKind::Media,
            representation_id: None,
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Byte range `[start, end)` within the resource, if partial.
    pub fn byte_range(&self) -> Option<&Range<u64>> {
        self.byte_range.as_ref()
    }

    pub fn bandwidth_bps(&self) -> Option<u64> {
        self.bandwidth_bps
    }

    pub fn representation_id(&self) -> Option<&str> {
        self.representation_id.as_deref()
    }

    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    pub fn discontinuity(&self) -> bool {
        self.discontinuity
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub(crate) fn set_byte_range(&mut self, range: Range<u64>) {
        self.byte_range = Some(range);
    }

    pub(crate) fn set_bandwidth(&mut self, bps: u64) {
        self.bandwidth_bps = Some(bps);
    }

    pub(crate) fn set_representation(&mut self, id: &str) {
        self.representation_id = Some(id.to_string());
    }

    pub(crate) fn set_kind(&mut self, kind: SegmentKind) {
        self.kind = kind;
    }

    pub(crate) fn set_discontinuity(&mut self, discontinuity: bool) {
        self.discontinuity = discontinuity;
    }

    pub(crate) fn set_format(&mut self, format: StreamFormat) {
        self.format = format;
    }
}

/// External connection layer.
///
/// Given a resolved segment URL, allocates the [`Chunk`] that the demuxer
/// will later drive through the actual byte transfer. Allocation may fail
/// transiently (connection pool exhausted, shutting down); `None` means the
/// caller retries on its next iteration — it is not an error.
pub trait ConnectionManager: Send + Sync {
    fn make_chunk(&self, url: &Url) -> Option<Chunk>;
}
