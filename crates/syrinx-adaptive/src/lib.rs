//! Adaptive bitrate streaming engine.
//!
//! For a single elementary stream (video, audio, ...) this crate decides
//! which segment of which quality variant to fetch next, tracks the playback
//! position across an evolving (possibly live) manifest, and signals the
//! transitions a downstream demuxer must honor: representation switches,
//! discontinuities, init/index injection and stream-format changes.
//!
//! Out of scope, consumed through trait seams instead: manifest parsing
//! (this crate receives the parsed [`Period`]/[`AdaptationSet`]/
//! [`Representation`] tree), the HTTP layer (a [`ConnectionManager`]
//! allocates [`Chunk`]s), the demuxer, and DRM.
//!
//! The entry point is [`SegmentTracker`]: one per elementary stream, driven
//! synchronously by the owning demuxer thread.

#![forbid(unsafe_code)]

pub mod adaptation;
pub mod adaptation_set;
pub mod chunk;
pub mod error;
pub mod events;
pub mod representation;
pub mod segment;
pub mod timeline;
pub mod tracker;
pub mod url;

pub use adaptation::{AdaptationLogic, FixedRateAdaptationLogic, RateBasedAdaptationLogic};
pub use adaptation_set::{AdaptationSet, MediaType, Period};
pub use chunk::{Chunk, ConnectionManager};
pub use error::{AdaptiveError, AdaptiveResult};
pub use events::{SegmentTrackerListener, TrackerEvent};
pub use representation::{
    NextSegment, Representation, SegmentList, SegmentSource, SegmentTemplate,
};
pub use segment::{Segment, SegmentKind, StreamFormat, SubSegment};
pub use timeline::SegmentTimeline;
pub use tracker::SegmentTracker;
pub use self::url::{SegmentUrl, UrlContext};
