//! In-memory route model shared by the FIT codec and the climb engine.
//!
//! A route is an ordered list of [`Point`]s with a monotonic distance along
//! the track. Points may carry a turn annotation ([`TurnKind`]) plus a short
//! label, which become FIT course points on export.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Course point types understood by FIT devices.
///
/// The discriminant is the value written on the wire for the
/// `course_point` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TurnKind {
    Generic = 0,
    Summit = 1,
    Valley = 2,
    Water = 3,
    Food = 4,
    Danger = 5,
    Left = 6,
    Right = 7,
    Straight = 8,
    FirstAid = 9,
    FourthCategory = 10,
    ThirdCategory = 11,
    SecondCategory = 12,
    FirstCategory = 13,
    HorsCategory = 14,
    Sprint = 15,
    LeftFork = 16,
    RightFork = 17,
    MiddleFork = 18,
    SlightLeft = 19,
    SharpLeft = 20,
    SlightRight = 21,
    SharpRight = 22,
    UTurn = 23,
    SegmentStart = 24,
    SegmentEnd = 25,
}

impl TurnKind {
    /// Every course point type, in wire-value order.
    pub const ALL: [TurnKind; 26] = [
        TurnKind::Generic,
        TurnKind::Summit,
        TurnKind::Valley,
        TurnKind::Water,
        TurnKind::Food,
        TurnKind::Danger,
        TurnKind::Left,
        TurnKind::Right,
        TurnKind::Straight,
        TurnKind::FirstAid,
        TurnKind::FourthCategory,
        TurnKind::ThirdCategory,
        TurnKind::SecondCategory,
        TurnKind::FirstCategory,
        TurnKind::HorsCategory,
        TurnKind::Sprint,
        TurnKind::LeftFork,
        TurnKind::RightFork,
        TurnKind::MiddleFork,
        TurnKind::SlightLeft,
        TurnKind::SharpLeft,
        TurnKind::SlightRight,
        TurnKind::SharpRight,
        TurnKind::UTurn,
        TurnKind::SegmentStart,
        TurnKind::SegmentEnd,
    ];

    /// FIT symbol name, e.g. `"sharp_right"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Generic => "generic",
            TurnKind::Summit => "summit",
            TurnKind::Valley => "valley",
            TurnKind::Water => "water",
            TurnKind::Food => "food",
            TurnKind::Danger => "danger",
            TurnKind::Left => "left",
            TurnKind::Right => "right",
            TurnKind::Straight => "straight",
            TurnKind::FirstAid => "first_aid",
            TurnKind::FourthCategory => "fourth_category",
            TurnKind::ThirdCategory => "third_category",
            TurnKind::SecondCategory => "second_category",
            TurnKind::FirstCategory => "first_category",
            TurnKind::HorsCategory => "hors_category",
            TurnKind::Sprint => "sprint",
            TurnKind::LeftFork => "left_fork",
            TurnKind::RightFork => "right_fork",
            TurnKind::MiddleFork => "middle_fork",
            TurnKind::SlightLeft => "slight_left",
            TurnKind::SharpLeft => "sharp_left",
            TurnKind::SlightRight => "slight_right",
            TurnKind::SharpRight => "sharp_right",
            TurnKind::UTurn => "u_turn",
            TurnKind::SegmentStart => "segment_start",
            TurnKind::SegmentEnd => "segment_end",
        }
    }

    /// Look up a turn kind by its FIT symbol name.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == symbol)
    }

    /// Wire value of this course point type.
    pub fn wire_value(&self) -> u8 {
        *self as u8
    }

    /// Look up a turn kind by its wire value.
    pub fn from_wire(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    fn is_left(&self) -> bool {
        matches!(self, TurnKind::SharpLeft | TurnKind::Left)
    }

    fn is_right(&self) -> bool {
        matches!(self, TurnKind::SharpRight | TurnKind::Right)
    }
}

impl std::fmt::Display for TurnKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single track point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in degrees
    pub lat: f64,
    /// Longitude in degrees
    pub lon: f64,
    /// Elevation in meters, if known
    pub ele: Option<f64>,
    /// Distance from the start of the route in meters (non-decreasing)
    pub distance: f64,
    /// Unix epoch milliseconds
    pub time: Option<i64>,
    /// Turn or climb annotation at this point
    pub turn: Option<TurnKind>,
    /// Short label shown with the annotation
    pub name: Option<String>,
}

impl Point {
    /// Create a point without elevation, time or annotation.
    pub fn new(lat: f64, lon: f64, distance: f64) -> Self {
        Self {
            lat,
            lon,
            ele: None,
            distance,
            time: None,
            turn: None,
            name: None,
        }
    }

    pub fn with_ele(mut self, ele: f64) -> Self {
        self.ele = Some(ele);
        self
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_turn(mut self, turn: TurnKind, name: Option<&str>) -> Self {
        self.turn = Some(turn);
        self.name = name.map(str::to_string);
        self
    }
}

/// A named route with summary elevation gain and loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub name: String,
    pub points: Vec<Point>,
    /// Total elevation gain in meters
    pub ele_gain: f64,
    /// Total elevation loss in meters
    pub ele_loss: f64,
}

impl Route {
    /// Create a route, computing gain/loss from the point elevations.
    pub fn new(name: &str, points: Vec<Point>) -> Self {
        let change = elevation_change(&points).unwrap_or_default();
        Self {
            name: name.to_string(),
            points,
            ele_gain: change.gain,
            ele_loss: change.loss,
        }
    }

    /// Total distance in meters (distance of the last point).
    pub fn total_distance(&self) -> f64 {
        self.points.last().map(|p| p.distance).unwrap_or(0.0)
    }

    /// Number of points carrying an annotation.
    pub fn turn_count(&self) -> usize {
        self.points.iter().filter(|p| p.turn.is_some()).count()
    }

    /// Spread `duration_ms` over the route proportionally to distance.
    ///
    /// The start time is kept from the first point, or the current time
    /// when the route has no timestamps.
    pub fn set_duration(&mut self, duration_ms: i64) {
        let total = self.total_distance();
        let start = match self.points.first() {
            Some(p) => p.time.unwrap_or_else(now_millis),
            None => return,
        };
        for point in &mut self.points {
            let offset = if total > 0.0 {
                (duration_ms as f64 * (point.distance / total)).round() as i64
            } else {
                0
            };
            point.time = Some(start + offset);
        }
    }
}

/// Elevation gain and loss in meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ElevationChange {
    pub gain: f64,
    pub loss: f64,
}

/// Minimum elevation change (meters) before gain/loss is counted.
pub const ELEVATION_HYSTERESIS: f64 = 4.0;

/// Compute total gain and loss, ignoring changes below
/// [`ELEVATION_HYSTERESIS`].
///
/// Returns `None` if any point lacks an elevation.
pub fn elevation_change(points: &[Point]) -> Option<ElevationChange> {
    let mut change = ElevationChange::default();
    let mut last: Option<f64> = None;

    for point in points {
        let ele = point.ele?;
        let Some(prev) = last else {
            last = Some(ele);
            continue;
        };
        let delta = ele - prev;
        if delta.abs() >= ELEVATION_HYSTERESIS {
            last = Some(ele);
            if delta > 0.0 {
                change.gain += delta;
            } else {
                change.loss -= delta;
            }
        }
    }

    Some(change)
}

/// Distance (meters) within which two opposite turns get a combined note.
pub const DOUBLE_TURN_DISTANCE: f64 = 50.0;

/// Add notes to turn instructions that make them more useful on the road.
///
/// A left turn closely followed by a right turn (or the reverse) gets an
/// `L/R` (or `R/L`) label on the first turn, unless it already has one.
/// Returns the number of notes added.
pub fn improve_instructions(route: &mut Route) -> usize {
    let mut added = 0;
    let mut last_turn: Option<usize> = None;

    for idx in 0..route.points.len() {
        let Some(turn) = route.points[idx].turn else {
            continue;
        };
        if let Some(last_idx) = last_turn {
            let distance = route.points[idx].distance;
            let last = &mut route.points[last_idx];
            if last.name.is_none() && distance - last.distance <= DOUBLE_TURN_DISTANCE {
                let last_kind = last.turn.unwrap_or(TurnKind::Generic);
                if last_kind.is_left() && turn.is_right() {
                    last.name = Some("L/R".to_string());
                    added += 1;
                } else if last_kind.is_right() && turn.is_left() {
                    last.name = Some("R/L".to_string());
                    added += 1;
                }
            }
        }
        last_turn = Some(idx);
    }

    if added > 0 {
        log::debug!("[Route] Added {} double-turn notes", added);
    }
    added
}

/// Current time as Unix epoch milliseconds.
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
