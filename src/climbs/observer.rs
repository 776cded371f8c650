//! Hooks for visualising what the climb scan decides.

use serde::{Deserialize, Serialize};

use crate::climbs::segment::Segment;

/// Decision points of the scan and acceptance steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentEvent {
    /// A candidate was opened
    Opened,
    /// A candidate was dropped before it reached the minimum length
    Discarded,
    /// The candidate was closed because it levelled off
    Leveled,
    /// The candidate was closed because it peaked
    Peaked,
    /// The candidate was closed at the end of the track
    EndOfTrack,
    /// A leading opposite-direction run was split off
    Trimmed,
    /// Rejected by direction switch or height floor; not retried
    Ignored,
    /// Rejected by grade; retried with a shorter start
    Rejected,
    Accepted,
    /// No free point was found for an annotation
    PlacementFailed,
}

/// Receives scan decisions. Both methods default to doing nothing.
///
/// Point indices refer to the caller's point slice.
pub trait ClimbObserver {
    fn on_point_tag(&mut self, _index: usize, _label: &str) {}

    fn on_segment_event(&mut self, _event: SegmentEvent, _segment: &Segment) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ClimbObserver for NoopObserver {}

/// Observer that keeps every event, mostly useful in tests and debugging.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub tags: Vec<(usize, String)>,
    pub events: Vec<(SegmentEvent, Segment)>,
}

impl RecordingObserver {
    pub fn count(&self, event: SegmentEvent) -> usize {
        self.events.iter().filter(|(e, _)| *e == event).count()
    }
}

impl ClimbObserver for RecordingObserver {
    fn on_point_tag(&mut self, index: usize, label: &str) {
        self.tags.push((index, label.to_string()));
    }

    fn on_segment_event(&mut self, event: SegmentEvent, segment: &Segment) {
        self.events.push((event, segment.clone()));
    }
}
