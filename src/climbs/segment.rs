//! A contiguous stretch of the elevation profile with running ascent and
//! descent totals.

use serde::{Deserialize, Serialize};

use crate::climbs::profile::ProfilePoint;

/// Stretch `[start_point, end_point]` of profile indices.
///
/// `distance`, `ascent` and `descent` always equal the sums over the
/// intervals `start_point + 1 ..= end_point`. The mutating methods keep it
/// that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_point: usize,
    pub end_point: usize,
    pub distance: f64,
    pub ascent: f64,
    pub descent: f64,
}

impl Segment {
    /// Segment spanning the single interval that ends at `idx`.
    pub fn open(profile: &[ProfilePoint], idx: usize) -> Self {
        let mut segment = Self::empty(idx - 1);
        segment.extend(profile);
        segment
    }

    /// Zero-length segment at `idx`.
    pub fn empty(idx: usize) -> Self {
        Self {
            start_point: idx,
            end_point: idx,
            distance: 0.0,
            ascent: 0.0,
            descent: 0.0,
        }
    }

    /// Number of intervals covered.
    pub fn len(&self) -> usize {
        self.end_point - self.start_point
    }

    pub fn is_empty(&self) -> bool {
        self.end_point == self.start_point
    }

    pub fn is_climb(&self) -> bool {
        self.ascent > self.descent
    }

    /// Ascent for a climb, descent otherwise.
    pub fn relevant_height(&self) -> f64 {
        if self.is_climb() {
            self.ascent
        } else {
            self.descent
        }
    }

    /// Height gained against the segment's direction.
    pub fn other_height(&self) -> f64 {
        if self.is_climb() {
            self.descent
        } else {
            self.ascent
        }
    }

    fn add(&mut self, point: &ProfilePoint) {
        self.distance += point.delta_distance;
        if point.delta_ele > 0.0 {
            self.ascent += point.delta_ele;
        } else {
            self.descent -= point.delta_ele;
        }
    }

    fn remove(&mut self, point: &ProfilePoint) {
        self.distance -= point.delta_distance;
        if point.delta_ele > 0.0 {
            self.ascent -= point.delta_ele;
        } else {
            self.descent += point.delta_ele;
        }
    }

    /// Take in the next interval.
    pub fn extend(&mut self, profile: &[ProfilePoint]) {
        self.end_point += 1;
        self.add(&profile[self.end_point]);
    }

    /// Take in a segment that starts where this one ends.
    pub fn absorb(&mut self, other: &Segment) {
        debug_assert_eq!(self.end_point, other.start_point);
        self.end_point = other.end_point;
        self.distance += other.distance;
        self.ascent += other.ascent;
        self.descent += other.descent;
    }

    /// Drop the first interval.
    pub fn drop_first(&mut self, profile: &[ProfilePoint]) {
        if self.is_empty() {
            return;
        }
        self.start_point += 1;
        self.remove(&profile[self.start_point]);
    }

    /// Drop the last interval.
    pub fn drop_last(&mut self, profile: &[ProfilePoint]) {
        if self.is_empty() {
            return;
        }
        self.remove(&profile[self.end_point]);
        self.end_point -= 1;
    }

    /// Split off a leading run that is flat or goes against the segment's
    /// direction. Returns the split part, or `None` if the segment starts
    /// in its own direction.
    pub fn trim_opposite_start(&mut self, profile: &[ProfilePoint]) -> Option<Segment> {
        let climb = self.is_climb();
        let mut trimmed = Segment::empty(self.start_point);

        while self.len() > 1 {
            let delta = profile[self.start_point + 1].delta_ele;
            let opposite = delta == 0.0 || (climb && delta < 0.0) || (!climb && delta > 0.0);
            if !opposite {
                break;
            }
            trimmed.extend(profile);
            self.drop_first(profile);
        }

        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// Cut the segment back to its highest point (climb) or lowest point
    /// (descent), dropping any overshoot past the summit or valley.
    pub fn trim_after_max(&mut self, profile: &[ProfilePoint]) {
        let climb = self.is_climb();
        let mut best = self.start_point;
        for idx in self.start_point + 1..=self.end_point {
            let better = if climb {
                profile[idx].ele > profile[best].ele
            } else {
                profile[idx].ele < profile[best].ele
            };
            if better {
                best = idx;
            }
        }
        if best == self.start_point {
            return;
        }
        while self.end_point > best {
            self.drop_last(profile);
        }
    }

    /// Average grade over the intervals that go in the segment's direction,
    /// each clamped to `max_grade` percent. Falls back to the plain
    /// height over distance if no interval qualifies.
    pub fn avg_grade(&self, profile: &[ProfilePoint], max_grade: f64) -> f64 {
        let climb = self.is_climb();
        let mut height = 0.0;
        let mut distance = 0.0;

        for point in &profile[self.start_point + 1..=self.end_point] {
            let matches = if climb { point.grade > 0.0 } else { point.grade < 0.0 };
            if !matches {
                continue;
            }
            let grade = point.grade.clamp(-max_grade, max_grade);
            height += grade * point.delta_distance / 100.0;
            distance += point.delta_distance;
        }

        if distance > 0.0 {
            return height / distance * 100.0;
        }
        if self.distance <= 0.0 {
            return 0.0;
        }
        let grade = self.relevant_height() / self.distance * 100.0;
        if climb {
            grade
        } else {
            -grade
        }
    }
}
