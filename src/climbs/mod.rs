//! # Climb detection
//!
//! Finds climbs and descents in an elevation profile and marks them on the
//! route as course points, so a device can announce them while riding.
//!
//! ## Pipeline
//!
//! 1. [`profile`]: dedup, elevation gap fill, per-interval deltas, smoothing
//! 2. Scan: grow candidate segments while the grade keeps its direction; end
//!    them once they have *levelled off* (long flat or reverse stretch) or
//!    *peaked* (enough height given back)
//! 3. Acceptance: split off a leading reverse run, cut back to the summit,
//!    check height and average grade; shallow lead-ins are dropped one
//!    interval at a time until the rest qualifies
//! 4. [`placement`]: categorise by score and annotate the start (and for long
//!    segments the end) on a free point
//!
//! # Example
//!
//! ```
//! use fit_course::climbs::{find_climbs, ClimbConfig};
//! use fit_course::{Point, TurnKind};
//!
//! // 5 km at 6%
//! let mut points: Vec<Point> = (0..=50)
//!     .map(|i| Point::new(46.0 + i as f64 * 0.001, 8.0, i as f64 * 100.0).with_ele(i as f64 * 6.0))
//!     .collect();
//!
//! let report = find_climbs(&mut points, &ClimbConfig::default());
//! assert_eq!(report.climbs.len(), 1);
//! assert_eq!(points[0].turn, Some(TurnKind::ThirdCategory));
//! assert_eq!(points[50].turn, Some(TurnKind::Summit));
//! ```

pub mod config;
pub mod observer;
pub mod placement;
pub mod profile;
pub mod segment;

use serde::{Deserialize, Serialize};

pub use config::{ClimbConfig, ClimbPresets, ClimbSelection, EndDetection, WaveProfile};
pub use observer::{ClimbObserver, NoopObserver, RecordingObserver, SegmentEvent};
pub use profile::ProfilePoint;
pub use segment::Segment;

use crate::route::{Point, TurnKind};
use placement::{
    climb_category, climb_score, end_label, place_marker, segment_label, END_SEARCHES,
    START_SEARCHES,
};

/// Direction of a detected segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClimbKind {
    Climb,
    Descent,
}

/// An accepted climb or descent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedClimb {
    pub kind: ClimbKind,
    /// Category marker for climbs, `danger` for descents
    pub category: TurnKind,
    /// First point of the segment (index into the route points)
    pub start_index: usize,
    /// Summit or valley point (index into the route points)
    pub end_index: usize,
    /// Length in meters
    pub distance: f64,
    /// Ascent of a climb or descent of a descent, in meters
    pub height: f64,
    /// Average grade in percent (negative for descents)
    pub avg_grade: f64,
    /// Category score, climbs only
    pub score: Option<f64>,
    pub label: String,
    /// Where the start marker ended up; `None` if no free point was found
    pub marker_index: Option<usize>,
    /// Where the summit/valley marker ended up, if one was placed
    pub end_marker_index: Option<usize>,
}

/// Result of a climb detection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimbReport {
    /// Number of markers written to the points
    pub annotations: usize,
    pub climbs: Vec<DetectedClimb>,
}

/// Outcome of one acceptance attempt.
enum Attempt {
    Accepted,
    /// Rejected for a reason shrinking cannot fix
    Ignored,
    /// Rejected by grade; a shorter start may qualify
    Rejected,
}

/// Climb detection over one route.
pub struct ClimbFinder<'a> {
    config: &'a ClimbConfig,
    observer: &'a mut dyn ClimbObserver,
    profile: Vec<ProfilePoint>,
    report: ClimbReport,
}

impl<'a> ClimbFinder<'a> {
    pub fn new(config: &'a ClimbConfig, observer: &'a mut dyn ClimbObserver) -> Self {
        Self {
            config,
            observer,
            profile: Vec::new(),
            report: ClimbReport::default(),
        }
    }

    /// Detect climbs and annotate `points` in place.
    pub fn run(mut self, points: &mut [Point]) -> ClimbReport {
        self.profile = profile::load_points(points);
        if self.config.smooth {
            profile::smooth_points(&mut self.profile, self.config, self.observer);
        }
        log::debug!(
            "[Climbs] Scanning {} profile points ({} route points)",
            self.profile.len(),
            points.len()
        );

        self.scan(points);

        log::info!(
            "[Climbs] Found {} climbs/descents, {} annotations",
            self.report.climbs.len(),
            self.report.annotations
        );
        self.report
    }

    /// Whether a climb has gone flat (or reverse) for long enough.
    fn has_leveled_off(&self, cur: &Segment, end: &Segment) -> bool {
        let config = self.config;
        if end.len() > config.end_slack_points && end.distance > cur.distance / 2.0 {
            return true;
        }
        if end.distance < config.leveled_distance {
            return false;
        }
        let scaled = (config.leveled_distance + config.leveled_factor * cur.relevant_height())
            .min(config.leveled_max);
        end.distance >= scaled
    }

    /// Whether a climb has given back enough height to have passed its top.
    fn has_peaked(&self, cur: &Segment, end: &Segment) -> bool {
        let config = self.config;
        let give_back = if cur.is_climb() { end.descent } else { end.ascent };
        if end.len() > config.end_slack_points && give_back > cur.relevant_height() / 2.0 {
            return true;
        }
        if give_back < config.peak_drop {
            return false;
        }
        let scaled =
            (config.peak_drop + config.peak_factor * cur.relevant_height()).min(config.peak_max);
        give_back >= scaled
    }

    fn scan(&mut self, points: &mut [Point]) {
        let n = self.profile.len();
        let mut cur: Option<Segment> = None;
        let mut cur_end: Option<Segment> = None;
        let mut idx = 1;

        while idx < n {
            let point = self.profile[idx];

            let Some(candidate) = cur.as_mut() else {
                // idle: only a real slope opens a candidate
                if point.grade.abs() >= self.config.consider_as_flat_till {
                    let opened = Segment::open(&self.profile, idx);
                    self.observer.on_segment_event(SegmentEvent::Opened, &opened);
                    cur = Some(opened);
                    cur_end = None;
                }
                idx += 1;
                continue;
            };

            let interrupted = if candidate.is_climb() {
                point.grade < self.config.min_climb_grade
            } else {
                point.grade > -self.config.min_climb_grade
            };

            if !interrupted {
                if let Some(end) = cur_end.take() {
                    // the stretch was only a pause
                    candidate.absorb(&end);
                }
                candidate.extend(&self.profile);
                idx += 1;
                continue;
            }

            if cur_end.is_none() && candidate.distance < self.config.min_candidate_distance {
                self.observer.on_segment_event(SegmentEvent::Discarded, candidate);
                cur = None;
                idx += 1;
                continue;
            }

            // the end run starts where the candidate stops
            let end = cur_end.get_or_insert_with(|| Segment::empty(idx - 1));
            end.extend(&self.profile);

            let leveled = self.has_leveled_off(candidate, end);
            let peaked = !leveled && self.has_peaked(candidate, end);
            if !(leveled || peaked) {
                idx += 1;
                continue;
            }

            let closed = candidate.clone();
            debug_assert_eq!(closed.end_point, end.start_point);
            let event = if leveled {
                SegmentEvent::Leveled
            } else {
                SegmentEvent::Peaked
            };
            self.observer.on_segment_event(event, &closed);
            self.observer.on_point_tag(
                self.profile[closed.end_point].orig_index,
                if leveled { "leveled" } else { "peaked" },
            );

            // rescan what followed the end; it may be a segment of its own
            let resume = (closed.end_point + 1).max(closed.start_point + 2);
            cur = None;
            cur_end = None;
            self.process(closed, points);
            idx = resume;
        }

        if let Some(mut candidate) = cur {
            if let Some(end) = cur_end {
                candidate.absorb(&end);
            }
            self.observer.on_segment_event(SegmentEvent::EndOfTrack, &candidate);
            self.process(candidate, points);
        }
    }

    /// Accept a closed segment, or pieces of it.
    ///
    /// Split-off leading runs are queued and processed on their own after
    /// the segment they came from.
    fn process(&mut self, segment: Segment, points: &mut [Point]) {
        let mut pending = vec![segment];
        while let Some(mut segment) = pending.pop() {
            loop {
                match self.attempt(&mut segment, &mut pending, points) {
                    Attempt::Accepted | Attempt::Ignored => break,
                    Attempt::Rejected if segment.len() > 1 => segment.drop_first(&self.profile),
                    Attempt::Rejected => break,
                }
            }
        }
    }

    fn below_floor(&self, segment: &Segment) -> bool {
        let config = self.config;
        if segment.is_climb() {
            !config.use_climbs || segment.ascent < config.ignore_ascent_less_than
        } else {
            !config.use_descents || segment.descent < config.ignore_descent_less_than
        }
    }

    fn attempt(
        &mut self,
        segment: &mut Segment,
        pending: &mut Vec<Segment>,
        points: &mut [Point],
    ) -> Attempt {
        if self.below_floor(segment) {
            self.observer.on_segment_event(SegmentEvent::Ignored, segment);
            return Attempt::Ignored;
        }

        if let Some(trimmed) = segment.trim_opposite_start(&self.profile) {
            self.observer.on_segment_event(SegmentEvent::Trimmed, &trimmed);
            pending.push(trimmed);
        }
        segment.trim_after_max(&self.profile);
        if self.below_floor(segment) {
            self.observer.on_segment_event(SegmentEvent::Ignored, segment);
            return Attempt::Ignored;
        }

        let config = self.config;
        let avg_grade = segment.avg_grade(&self.profile, config.max_grade_clamp);
        let keep = if segment.is_climb() {
            avg_grade >= config.ignore_ascent_grades_less_than
                || (segment.ascent > config.long_ascent_min
                    && avg_grade > config.keep_avg_grade_long_ascent)
        } else {
            avg_grade <= config.ignore_descent_grades_less_than
                || (segment.descent > config.long_descent_min
                    && avg_grade < config.keep_avg_grade_long_descent)
        };
        if !keep {
            self.observer.on_segment_event(SegmentEvent::Rejected, segment);
            return Attempt::Rejected;
        }

        self.observer.on_segment_event(SegmentEvent::Accepted, segment);
        self.insert(segment, avg_grade, points);
        Attempt::Accepted
    }

    /// Categorise an accepted segment and place its markers.
    fn insert(&mut self, segment: &Segment, avg_grade: f64, points: &mut [Point]) {
        let climb = segment.is_climb();
        let start = self.profile[segment.start_point];
        let end = self.profile[segment.end_point];

        let (kind, category, score) = if climb {
            let score = climb_score(segment.distance, avg_grade);
            (ClimbKind::Climb, climb_category(score), Some(score))
        } else {
            (ClimbKind::Descent, TurnKind::Danger, None)
        };
        let label = segment_label(
            end.ele,
            climb,
            segment.relevant_height(),
            segment.distance,
            avg_grade,
        );

        let marker_index =
            place_marker(points, start.orig_index, &START_SEARCHES, category, label.clone());
        match marker_index {
            Some(index) => {
                self.report.annotations += 1;
                self.observer.on_point_tag(index, category.as_str());
            }
            None => {
                log::warn!(
                    "[Climbs] No free point for {} marker near point {}",
                    category,
                    start.orig_index
                );
                self.observer.on_segment_event(SegmentEvent::PlacementFailed, segment);
            }
        }

        let mut end_marker_index = None;
        if self.config.add_endpoint && segment.distance > self.config.min_end_marker_distance {
            let turn = if climb { TurnKind::Summit } else { TurnKind::Valley };
            end_marker_index =
                place_marker(points, end.orig_index, &END_SEARCHES, turn, end_label(end.ele));
            match end_marker_index {
                Some(index) => {
                    self.report.annotations += 1;
                    self.observer.on_point_tag(index, turn.as_str());
                }
                None => {
                    log::warn!(
                        "[Climbs] No free point for {} marker near point {}",
                        turn,
                        end.orig_index
                    );
                    self.observer.on_segment_event(SegmentEvent::PlacementFailed, segment);
                }
            }
        }

        self.report.climbs.push(DetectedClimb {
            kind,
            category,
            start_index: start.orig_index,
            end_index: end.orig_index,
            distance: segment.distance,
            height: segment.relevant_height(),
            avg_grade,
            score,
            label,
            marker_index,
            end_marker_index,
        });
    }
}

/// Detect climbs and descents and annotate `points` in place.
pub fn find_climbs(points: &mut [Point], config: &ClimbConfig) -> ClimbReport {
    let mut observer = NoopObserver;
    ClimbFinder::new(config, &mut observer).run(points)
}

/// Like [`find_climbs`], reporting every decision to `observer`.
pub fn find_climbs_with_observer(
    points: &mut [Point],
    config: &ClimbConfig,
    observer: &mut dyn ClimbObserver,
) -> ClimbReport {
    ClimbFinder::new(config, observer).run(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Points every `spacing` meters following `ele(distance)`.
    fn track(length: f64, spacing: f64, ele: impl Fn(f64) -> f64) -> Vec<Point> {
        let count = (length / spacing).round() as usize;
        (0..=count)
            .map(|i| {
                let d = i as f64 * spacing;
                Point::new(46.0 + d * 1e-5, 8.0, d).with_ele(ele(d))
            })
            .collect()
    }

    #[test]
    fn test_linear_climb() {
        let mut points = track(10_000.0, 100.0, |d| d * 0.05);
        let report = find_climbs(&mut points, &ClimbConfig::default());

        assert_eq!(report.climbs.len(), 1);
        let climb = &report.climbs[0];
        assert_eq!(climb.kind, ClimbKind::Climb);
        assert_eq!(climb.start_index, 0);
        assert_eq!(climb.end_index, 100);
        assert!((climb.avg_grade - 5.0).abs() < 1e-9);
        assert!((climb.height - 500.0).abs() < 1e-9);
        assert_eq!(climb.category, TurnKind::SecondCategory);
        assert_eq!(report.annotations, 2);
        assert_eq!(points[0].turn, Some(TurnKind::SecondCategory));
        assert_eq!(points[0].name.as_deref(), Some("500m ↗ 500m/10.0km 5.0%"));
        assert_eq!(points[100].turn, Some(TurnKind::Summit));
        assert_eq!(points[100].name.as_deref(), Some("500m"));
    }

    #[test]
    fn test_flat_profile_never_opens() {
        // +/-0.5% zigzag
        let mut points = track(20_000.0, 100.0, |d| if (d / 100.0) as u64 % 2 == 0 { 0.0 } else { 0.5 });
        let mut observer = RecordingObserver::default();
        let config = ClimbConfig {
            smooth: false,
            ..Default::default()
        };
        let report = find_climbs_with_observer(&mut points, &config, &mut observer);
        assert!(report.climbs.is_empty());
        assert_eq!(report.annotations, 0);
        assert_eq!(observer.count(SegmentEvent::Opened), 0);
        assert!(points.iter().all(|p| p.turn.is_none()));
    }

    #[test]
    fn test_climb_then_descent() {
        // 5 km at 6% up, then 3 km at 10% down
        let mut points = track(8_000.0, 100.0, |d| {
            if d <= 5000.0 {
                d * 0.06
            } else {
                300.0 - (d - 5000.0) * 0.1
            }
        });
        let mut observer = RecordingObserver::default();
        let report = find_climbs_with_observer(&mut points, &ClimbConfig::default(), &mut observer);

        assert_eq!(report.climbs.len(), 2);
        let climb = &report.climbs[0];
        assert_eq!(climb.kind, ClimbKind::Climb);
        assert_eq!((climb.start_index, climb.end_index), (0, 50));
        assert_eq!(climb.category, TurnKind::ThirdCategory);
        assert_eq!(observer.count(SegmentEvent::Peaked), 1);

        let descent = &report.climbs[1];
        assert_eq!(descent.kind, ClimbKind::Descent);
        assert_eq!(descent.category, TurnKind::Danger);
        assert_eq!((descent.start_index, descent.end_index), (50, 80));
        assert!((descent.avg_grade + 10.0).abs() < 1e-9);
        assert_eq!(descent.score, None);

        // the summit already holds the climb's end marker
        assert_eq!(points[50].turn, Some(TurnKind::Summit));
        assert_eq!(descent.marker_index, Some(49));
        assert_eq!(points[49].turn, Some(TurnKind::Danger));
        assert_eq!(points[80].turn, Some(TurnKind::Valley));
        assert_eq!(report.annotations, 4);
    }

    #[test]
    fn test_shallow_lead_in_is_dropped() {
        // 4 km at 2.5% then 1 km at 9%: 3.8% overall
        let mut points = track(5_000.0, 100.0, |d| {
            if d <= 4000.0 {
                d * 0.025
            } else {
                100.0 + (d - 4000.0) * 0.09
            }
        });
        let mut observer = RecordingObserver::default();
        let report = find_climbs_with_observer(&mut points, &ClimbConfig::default(), &mut observer);

        assert_eq!(report.climbs.len(), 1);
        assert_eq!(report.climbs[0].start_index, 7);
        assert!(report.climbs[0].avg_grade >= 4.0);
        assert_eq!(observer.count(SegmentEvent::Rejected), 7);
        assert_eq!(observer.count(SegmentEvent::Accepted), 1);
    }

    #[test]
    fn test_disabled_climbs() {
        let mut points = track(10_000.0, 100.0, |d| d * 0.05);
        let config = ClimbConfig::from_presets(
            ClimbSelection::None,
            ClimbSelection::Medium,
            EndDetection::Normal,
        );
        let report = find_climbs(&mut points, &config);
        assert!(report.climbs.is_empty());
        assert!(points.iter().all(|p| p.turn.is_none()));
    }

    #[test]
    fn test_short_bump_is_discarded() {
        // a single 20 m interval at 10% inside flat terrain
        let mut points: Vec<Point> = (0..=20)
            .map(|i| {
                let d = i as f64 * 20.0;
                let ele = if i >= 10 { 2.0 } else { 0.0 };
                Point::new(46.0, 8.0 + d * 1e-5, d).with_ele(ele)
            })
            .collect();
        let config = ClimbConfig {
            smooth: false,
            ..Default::default()
        };
        let mut observer = RecordingObserver::default();
        find_climbs_with_observer(&mut points, &config, &mut observer);
        assert_eq!(observer.count(SegmentEvent::Opened), 1);
        assert_eq!(observer.count(SegmentEvent::Discarded), 1);
    }

    #[test]
    fn test_segment_totals_match_profile() {
        let mut points = track(12_000.0, 50.0, |d| 200.0 * (d / 1500.0).sin() + d * 0.02);
        let mut observer = RecordingObserver::default();
        let config = ClimbConfig {
            smooth: false,
            ..Default::default()
        };
        find_climbs_with_observer(&mut points, &config, &mut observer);
        assert!(!observer.events.is_empty());

        let profile = profile::load_points(&points);
        for (event, segment) in &observer.events {
            let mut ascent = 0.0;
            let mut descent = 0.0;
            for p in &profile[segment.start_point + 1..=segment.end_point] {
                ascent += p.delta_ele.max(0.0);
                descent += (-p.delta_ele).max(0.0);
            }
            assert!((segment.ascent - ascent).abs() < 1e-6, "{:?} {:?}", event, segment);
            assert!((segment.descent - descent).abs() < 1e-6, "{:?} {:?}", event, segment);
        }
    }

    #[test]
    fn test_existing_turns_are_kept() {
        let mut points = track(10_000.0, 100.0, |d| d * 0.05);
        points[0].turn = Some(TurnKind::Left);
        points[0].name = Some("Main St".to_string());

        let report = find_climbs(&mut points, &ClimbConfig::default());
        assert_eq!(points[0].turn, Some(TurnKind::Left));
        assert_eq!(points[0].name.as_deref(), Some("Main St"));
        // nothing earlier, so the marker moves later
        assert_eq!(report.climbs[0].marker_index, Some(1));
    }

    #[test]
    fn test_empty_and_tiny_input() {
        let mut none: Vec<Point> = Vec::new();
        assert_eq!(find_climbs(&mut none, &ClimbConfig::default()), ClimbReport::default());

        let mut one = vec![Point::new(0.0, 0.0, 0.0).with_ele(10.0)];
        assert!(find_climbs(&mut one, &ClimbConfig::default()).climbs.is_empty());
    }
}
