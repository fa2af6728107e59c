//! Sequencing and numbering invariants of the segment tracker.


use std::{sync::Arc, time::Duration};

use fixture::{
    chunk_number, init_tracing, template_rep, tracker_with, DenyingConnections, PinnedLogic,
    RecordedEvent, StubConnections,
};
use syrinx_adaptive::{
    FixedRateAdaptationLogic, Representation, Segment, SegmentKind, SegmentList, StreamFormat,
};

#[test]
fn media_numbers_are_contiguous_without_switching() {
    init_tracing();
    let (mut tracker, listener) =
        tracker_with(vec![template_rep("a", 300_000, 2000, 5)], PinnedLogic::new(0));

    for expected in 0..5 {
        let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
        assert_eq!(chunk.kind(), SegmentKind::Media);
        assert_eq!(chunk_number(&chunk), expected);
    }

    // Past the last index: reset, then a null chunk.
    assert!(tracker.next_chunk(true, &StubConnections).is_none());
    assert!(tracker.current_representation().is_none());
    assert_eq!(
        listener.switching_events().last(),
        Some(&RecordedEvent::Switching {
            from: Some("a".to_string()),
            to: None,
        })
    );

    // Still none, still no panic.
    assert!(tracker.next_chunk(true, &StubConnections).is_none());
}

#[test]
fn init_then_index_then_media() {
    init_tracing();
    let mut list = SegmentList::new()
        .with_init(Segment::init("https://cdn.example/a/init.mp4"))
        .with_index(Segment::index("https://cdn.example/a/index.sidx"));
    for n in 0..3 {
        list.push(
            Segment::media(format!("https://cdn.example/a/seg-{n}.m4s").as_str())
                .with_duration(Duration::from_secs(2)),
        );
    }
    let (mut tracker, _) =
        tracker_with(vec![Representation::new("a", 300_000, list)], PinnedLogic::new(0));

    let first = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(first.kind(), SegmentKind::Init);
    assert_eq!(tracker.segment_number(), 0, "init must not advance the counter");

    let second = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(second.kind(), SegmentKind::Index);
    assert_eq!(tracker.segment_number(), 0, "index must not advance the counter");

    let third = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(third.kind(), SegmentKind::Media);
    assert_eq!(tracker.segment_number(), 1);

    // Init and index are never re-delivered within this activation.
    let fourth = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(fourth.kind(), SegmentKind::Media);
    assert_eq!(chunk_number(&fourth), 1);
}

#[test]
fn switch_translates_position_and_emits_one_switching_event() {
    init_tracing();
    // A cuts 2 s segments, B cuts 4 s segments and is numbered differently.
    let a = template_rep("a", 300_000, 2000, 8);
    let b = template_rep("b", 800_000, 4000, 4).with_consistent_numbering(false);
    let logic = PinnedLogic::new(0);
    let (mut tracker, listener) = tracker_with(vec![a, b], logic.clone());

    for expected in 0..3 {
        let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
        assert_eq!(chunk_number(&chunk), expected);
    }
    assert_eq!(tracker.segment_number(), 3);

    logic.pin(1);
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();

    // t = 6 s lands in B's segment 1 (2:1 duration ratio).
    assert!(chunk.url().path().starts_with("/b/"));
    assert_eq!(chunk_number(&chunk), 1);
    assert_eq!(chunk.bandwidth_bps(), Some(800_000));

    let switches = listener.switching_events();
    assert_eq!(
        switches,
        vec![
            RecordedEvent::Switching {
                from: None,
                to: Some("a".to_string()),
            },
            RecordedEvent::Switching {
                from: Some("a".to_string()),
                to: Some("b".to_string()),
            },
        ],
        "exactly one switching event per adoption"
    );
}

#[test]
fn no_switch_while_initializing() {
    init_tracing();
    let a = template_rep("a", 300_000, 2000, 8);
    let b = template_rep("b", 800_000, 2000, 8);
    let logic = PinnedLogic::new(0);
    let (mut tracker, _) = tracker_with(vec![a, b], logic.clone());

    // Adopt B, but fail its first media allocation: B stays initializing.
    logic.pin(1);
    assert!(tracker.next_chunk(true, &DenyingConnections).is_none());

    // Even though the logic now prefers A again, the tracker must finish
    // initializing B first.
    logic.pin(0);
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert!(chunk.url().path().starts_with("/b/"));
    assert_eq!(tracker.current_representation().unwrap().id(), "b");
}

#[test]
fn unswitchable_representation_is_kept() {
    init_tracing();
    let a = template_rep("a", 300_000, 2000, 8).with_switchable(false);
    let b = template_rep("b", 800_000, 2000, 8);
    let logic = PinnedLogic::new(0);
    let (mut tracker, _) = tracker_with(vec![a, b], logic.clone());

    let first = tracker.next_chunk(true, &StubConnections).unwrap();
    assert!(first.url().path().starts_with("/a/"));

    logic.pin(1);
    let second = tracker.next_chunk(true, &StubConnections).unwrap();
    assert!(
        second.url().path().starts_with("/a/"),
        "switch policy forbids leaving this representation"
    );
}

#[test]
fn allocation_failure_does_not_advance_position() {
    init_tracing();
    let (mut tracker, _) =
        tracker_with(vec![template_rep("a", 300_000, 2000, 4)], PinnedLogic::new(0));

    assert!(tracker.next_chunk(true, &DenyingConnections).is_none());
    assert_eq!(tracker.segment_number(), 0);

    // The retry fetches the same segment.
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(chunk_number(&chunk), 0);
    assert_eq!(tracker.segment_number(), 1);
}

#[test]
fn reset_returns_to_initial_delivery_state() {
    init_tracing();
    let list = SegmentList::new()
        .with_init(Segment::init("https://cdn.example/a/init.mp4"))
        .with_segment(
            Segment::media("https://cdn.example/a/seg-0.m4s").with_duration(Duration::from_secs(2)),
        )
        .with_segment(
            Segment::media("https://cdn.example/a/seg-1.m4s").with_duration(Duration::from_secs(2)),
        )
        .with_segment(
            Segment::media("https://cdn.example/a/seg-2.m4s").with_duration(Duration::from_secs(2)),
        );
    let (mut tracker, listener) =
        tracker_with(vec![Representation::new("a", 300_000, list)], PinnedLogic::new(0));

    assert_eq!(
        tracker.next_chunk(true, &StubConnections).unwrap().kind(),
        SegmentKind::Init
    );
    assert_eq!(
        tracker.next_chunk(true, &StubConnections).unwrap().kind(),
        SegmentKind::Media
    );

    tracker.reset();
    assert_eq!(
        listener.switching_events().last(),
        Some(&RecordedEvent::Switching {
            from: Some("a".to_string()),
            to: None,
        })
    );

    // Even with switching disallowed the tracker picks a representation
    // afresh and re-sends INIT before media.
    let chunk = tracker.next_chunk(false, &StubConnections).unwrap();
    assert_eq!(chunk.kind(), SegmentKind::Init);
    let chunk = tracker.next_chunk(false, &StubConnections).unwrap();
    assert_eq!(chunk.kind(), SegmentKind::Media);
    assert_eq!(chunk_number(&chunk), 1, "position survives a reset");
}

#[test]
fn restarted_seek_redelivers_init() {
    init_tracing();
    let list = SegmentList::new()
        .with_init(Segment::init("https://cdn.example/a/init.mp4"))
        .with_segment(
            Segment::media("https://cdn.example/a/seg-0.m4s").with_duration(Duration::from_secs(2)),
        )
        .with_segment(
            Segment::media("https://cdn.example/a/seg-1.m4s").with_duration(Duration::from_secs(2)),
        );
    let (mut tracker, _) =
        tracker_with(vec![Representation::new("a", 300_000, list)], PinnedLogic::new(0));

    assert_eq!(
        tracker.next_chunk(true, &StubConnections).unwrap().kind(),
        SegmentKind::Init
    );
    assert_eq!(
        chunk_number(&tracker.next_chunk(true, &StubConnections).unwrap()),
        0
    );

    assert!(tracker.set_position_by_time(Duration::from_secs(2), true, false));
    assert_eq!(tracker.segment_number(), 1);

    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(chunk.kind(), SegmentKind::Init, "restart re-delivers init");
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(chunk_number(&chunk), 1);
}

#[test]
fn try_only_seek_never_mutates_position() {
    init_tracing();
    let (mut tracker, _) =
        tracker_with(vec![template_rep("a", 300_000, 2000, 8)], PinnedLogic::new(0));

    assert_eq!(chunk_number(&tracker.next_chunk(true, &StubConnections).unwrap()), 0);

    assert!(tracker.set_position_by_time(Duration::from_secs(10), false, true));
    assert_eq!(tracker.segment_number(), 1);

    // Out-of-range probe fails without touching state either.
    assert!(!tracker.set_position_by_time(Duration::from_secs(100), false, true));
    assert_eq!(tracker.segment_number(), 1);

    assert_eq!(chunk_number(&tracker.next_chunk(true, &StubConnections).unwrap()), 1);
}

#[test]
fn min_ahead_time_shrinks_as_position_advances() {
    init_tracing();
    let (mut tracker, _) =
        tracker_with(vec![template_rep("a", 300_000, 2000, 4)], PinnedLogic::new(0));

    let mut previous = Duration::MAX;
    for _ in 0..4 {
        tracker.next_chunk(true, &StubConnections).unwrap();
        let ahead = tracker.min_ahead_time();
        assert!(ahead < previous, "min-ahead must be non-increasing");
        previous = ahead;
    }
    assert_eq!(previous, Duration::ZERO);
}

#[test]
fn fixed_rate_logic_picks_the_matching_representation() {
    init_tracing();
    let reps = vec![
        template_rep("low", 300_000, 2000, 4),
        template_rep("mid", 500_000, 2000, 4),
        template_rep("high", 800_000, 2000, 4),
    ];
    let (mut tracker, _) = tracker_with(reps, Arc::new(FixedRateAdaptationLogic::new(500_000)));

    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(chunk.bandwidth_bps(), Some(500_000));
    assert!(chunk.url().path().starts_with("/mid/"));
}

#[test]
fn format_change_is_signalled_once_per_transition() {
    init_tracing();
    let a = template_rep("a", 300_000, 2000, 8).with_format(StreamFormat::MpegTs);
    let b = template_rep("b", 800_000, 2000, 8).with_format(StreamFormat::Fmp4);
    let logic = PinnedLogic::new(0);
    let (mut tracker, listener) = tracker_with(vec![a, b], logic.clone());

    tracker.next_chunk(true, &StubConnections).unwrap();
    tracker.next_chunk(true, &StubConnections).unwrap();
    assert!(
        listener
            .events()
            .iter()
            .all(|e| !matches!(e, RecordedEvent::FormatChange { .. })),
        "the first observed format is adopted silently"
    );

    logic.pin(1);
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert_eq!(chunk.format(), StreamFormat::Fmp4);
    let format_changes: Vec<_> = listener
        .events()
        .into_iter()
        .filter(|e| matches!(e, RecordedEvent::FormatChange { .. }))
        .collect();
    assert_eq!(
        format_changes,
        vec![RecordedEvent::FormatChange {
            format: StreamFormat::Fmp4,
        }]
    );
}

#[test]
fn discontinuity_flag_on_segment_reaches_listeners() {
    init_tracing();
    let list = SegmentList::new()
        .with_segment(
            Segment::media("https://cdn.example/a/seg-0.m4s").with_duration(Duration::from_secs(2)),
        )
        .with_segment(
            Segment::media("https://cdn.example/a/seg-1.m4s")
                .with_duration(Duration::from_secs(2))
                .with_discontinuity(),
        );
    let (mut tracker, listener) =
        tracker_with(vec![Representation::new("a", 300_000, list)], PinnedLogic::new(0));

    tracker.next_chunk(true, &StubConnections).unwrap();
    let chunk = tracker.next_chunk(true, &StubConnections).unwrap();
    assert!(chunk.discontinuity());
    assert_eq!(
        listener
            .events()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Discontinuity { .. }))
            .count(),
        1
    );
}

#[test]
fn sub_segments_partition_one_resource() {
    init_tracing();
    let segment = Segment::media("https://cdn.example/a/all.m4s")
        .with_duration(Duration::from_secs(2))
        .with_sub_segment(0..1000)
        .with_sub_segment(1000..2500);
    let rep = Representation::new(
        "a",
        300_000,
        SegmentList::new().with_segment(segment.clone()),
    );

    let parts: Vec<_> = segment
        .sub_segments()
        .iter()
        .map(|s| s.to_chunk(&segment, 0, &rep, &StubConnections).unwrap())
        .collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[0].byte_range(), Some(&(0..1000)));
    assert_eq!(parts[1].byte_range(), Some(&(1000..2500)));
    assert_eq!(parts[0].url(), parts[1].url());
}
