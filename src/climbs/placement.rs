//! Categorisation, labels and collision-free placement of climb markers.

use crate::route::{Point, TurnKind};

/// Which way to walk from the target point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDirection {
    /// Towards the start of the track
    Earlier,
    /// Towards the end of the track
    Later,
}

/// One attempt to find a free point: minimum spacing from the target
/// (meters), direction, and how many occupied points may be skipped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Search {
    pub spacing: f64,
    pub direction: SearchDirection,
    pub skip: usize,
}

const fn search(spacing: f64, direction: SearchDirection, skip: usize) -> Search {
    Search {
        spacing,
        direction,
        skip,
    }
}

/// Searches for the start marker of a segment, tried in order.
pub const START_SEARCHES: [Search; 5] = [
    search(60.0, SearchDirection::Earlier, 0),
    search(60.0, SearchDirection::Later, 0),
    search(50.0, SearchDirection::Earlier, 1),
    search(50.0, SearchDirection::Later, 1),
    search(40.0, SearchDirection::Earlier, 2),
];

/// Searches for summit/valley markers; these are less important.
pub const END_SEARCHES: [Search; 2] = [
    search(60.0, SearchDirection::Earlier, 0),
    search(60.0, SearchDirection::Later, 0),
];

/// Climb score: length in km times the square of the average grade.
pub fn climb_score(distance: f64, avg_grade: f64) -> f64 {
    distance / 1000.0 * avg_grade * avg_grade
}

/// Category marker for a climb score.
pub fn climb_category(score: f64) -> TurnKind {
    if score >= 800.0 {
        TurnKind::HorsCategory
    } else if score >= 400.0 {
        TurnKind::FirstCategory
    } else if score >= 200.0 {
        TurnKind::SecondCategory
    } else if score >= 100.0 {
        TurnKind::ThirdCategory
    } else {
        TurnKind::FourthCategory
    }
}

/// Label of a start marker, e.g. `1120m ↗ 480m/9.6km 5.0%`.
pub fn segment_label(end_ele: f64, climb: bool, height: f64, distance: f64, avg_grade: f64) -> String {
    let arrow = if climb { '↗' } else { '↘' };
    format!(
        "{:.0}m {} {:.0}m/{:.1}km {:.1}%",
        end_ele,
        arrow,
        height,
        distance / 1000.0,
        avg_grade
    )
}

/// Label of a summit/valley marker.
pub fn end_label(ele: f64) -> String {
    format!("{:.0}m", ele)
}

/// Walk from `start` and return the first unannotated point more than
/// `search.spacing` meters away from the last annotated point passed.
///
/// Passing an annotated point restarts the spacing and uses up one skip;
/// with no skips left the search fails.
pub fn find_free_point(points: &[Point], start: usize, search: &Search) -> Option<usize> {
    let mut skip = search.skip;
    let mut sum = 0.0;

    let mut step = |idx: usize, gap: f64| -> Option<Option<usize>> {
        if points[idx].turn.is_some() {
            if skip == 0 {
                return Some(None);
            }
            skip -= 1;
            sum = 0.0;
            return None;
        }
        sum += gap;
        (sum > search.spacing).then_some(Some(idx))
    };

    match search.direction {
        SearchDirection::Earlier => {
            for idx in (0..start).rev() {
                let gap = points[idx + 1].distance - points[idx].distance;
                if let Some(found) = step(idx, gap) {
                    return found;
                }
            }
        }
        SearchDirection::Later => {
            for idx in start + 1..points.len() {
                let gap = points[idx].distance - points[idx - 1].distance;
                if let Some(found) = step(idx, gap) {
                    return found;
                }
            }
        }
    }
    None
}

/// Put `turn` with `label` on `target`, or on the first free point the
/// searches find if `target` already carries an annotation. Returns the
/// index used.
pub fn place_marker(
    points: &mut [Point],
    target: usize,
    searches: &[Search],
    turn: TurnKind,
    label: String,
) -> Option<usize> {
    let index = if points.get(target)?.turn.is_none() {
        target
    } else {
        searches
            .iter()
            .find_map(|search| find_free_point(points, target, search))?
    };
    let point = &mut points[index];
    point.turn = Some(turn);
    point.name = Some(label);
    Some(index)
}
