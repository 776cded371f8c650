//! Elevation profile preparation: deduplication, gap filling, per-interval
//! deltas and smoothing.

use crate::climbs::config::{ClimbConfig, WaveProfile};
use crate::climbs::observer::ClimbObserver;
use crate::route::Point;

/// One sample of the elevation profile.
///
/// The deltas describe the interval from the previous sample to this one;
/// they are zero for the first sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfilePoint {
    /// Index of the source point
    pub orig_index: usize,
    pub distance: f64,
    pub ele: f64,
    pub delta_distance: f64,
    pub delta_ele: f64,
    /// Grade of the interval in percent
    pub grade: f64,
}

impl ProfilePoint {
    fn new(orig_index: usize, distance: f64, ele: f64) -> Self {
        Self {
            orig_index,
            distance,
            ele,
            delta_distance: 0.0,
            delta_ele: 0.0,
            grade: 0.0,
        }
    }
}

/// Build the profile from route points.
///
/// Points repeating the previous distance are dropped. Missing elevations
/// copy the last known one; leading gaps take the first known one. Returns
/// an empty profile if no point has an elevation.
pub fn load_points(points: &[Point]) -> Vec<ProfilePoint> {
    let mut profile: Vec<ProfilePoint> = Vec::with_capacity(points.len());
    let mut last_distance: Option<f64> = None;
    let mut last_ele: Option<f64> = None;

    for (idx, point) in points.iter().enumerate() {
        if last_distance == Some(point.distance) {
            continue;
        }
        last_distance = Some(point.distance);

        let ele = match (point.ele, last_ele) {
            (Some(ele), None) => {
                // backfill everything collected before the first elevation
                for p in profile.iter_mut() {
                    p.ele = ele;
                }
                ele
            }
            (Some(ele), Some(_)) => ele,
            (None, Some(last)) => last,
            (None, None) => f64::NAN,
        };
        if !ele.is_nan() {
            last_ele = Some(ele);
        }
        profile.push(ProfilePoint::new(idx, point.distance, ele));
    }

    if last_ele.is_none() {
        return Vec::new();
    }
    calc_deltas(&mut profile);
    profile
}

/// Recompute deltas and grades from distance and elevation.
pub fn calc_deltas(profile: &mut [ProfilePoint]) {
    if let Some(first) = profile.first_mut() {
        first.delta_distance = 0.0;
        first.delta_ele = 0.0;
        first.grade = 0.0;
    }
    for idx in 1..profile.len() {
        let prev = profile[idx - 1];
        let point = &mut profile[idx];
        point.delta_distance = point.distance - prev.distance;
        point.delta_ele = point.ele - prev.ele;
        point.grade = if point.delta_distance > 0.0 {
            point.delta_ele / point.delta_distance * 100.0
        } else {
            0.0
        };
    }
}

fn same_direction(a: f64, b: f64) -> bool {
    (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0) || (a == 0.0 && b == 0.0)
}

/// Join very short intervals into their predecessor when both go the same
/// way. Returns the number of removed samples.
pub fn join_short_intervals(profile: &mut Vec<ProfilePoint>, config: &ClimbConfig) -> usize {
    let before = profile.len();
    let mut joined: Vec<ProfilePoint> = Vec::with_capacity(before);

    for &point in profile.iter() {
        // the first sample anchors the profile and is never replaced
        if joined.len() > 1 {
            if let Some(prev) = joined.last().copied() {
                let short = prev.delta_distance + point.delta_distance < config.join_distance
                    || point.delta_distance < config.min_delta_distance
                    || prev.delta_distance < config.min_delta_distance;
                if short && same_direction(prev.delta_ele, point.delta_ele) {
                    let mut merged = point;
                    merged.delta_distance += prev.delta_distance;
                    merged.delta_ele += prev.delta_ele;
                    joined.pop();
                    joined.push(merged);
                    continue;
                }
            }
        }
        joined.push(point);
    }

    *profile = joined;
    calc_deltas(profile);
    before - profile.len()
}

/// Level isolated peaks and dips that are most likely elevation noise.
/// Returns the number of flattened samples.
pub fn flatten_waves(
    profile: &mut [ProfilePoint],
    wave: &WaveProfile,
    observer: &mut dyn ClimbObserver,
) -> usize {
    let mut flattened = 0;
    for idx in 2..profile.len() {
        let p1 = profile[idx - 2];
        let p2 = profile[idx - 1];
        let p3 = profile[idx];
        let extremum = (p2.ele > p1.ele && p2.ele > p3.ele) || (p2.ele < p1.ele && p2.ele < p3.ele);
        if (p1.ele - p3.ele).abs() < wave.tolerance
            && extremum
            && p2.delta_distance < wave.max_run
            && p3.delta_distance < wave.max_run
        {
            profile[idx - 1].ele = (p1.ele + p3.ele) / 2.0;
            observer.on_point_tag(p2.orig_index, "flattened");
            flattened += 1;
        }
    }
    calc_deltas(profile);
    flattened
}

/// Run all smoothing passes configured in `config`.
pub fn smooth_points(
    profile: &mut Vec<ProfilePoint>,
    config: &ClimbConfig,
    observer: &mut dyn ClimbObserver,
) {
    let joined = join_short_intervals(profile, config);
    let mut flattened = 0;
    for wave in &config.wave_profiles {
        flattened += flatten_waves(profile, wave, observer);
    }
    log::debug!(
        "[Climbs] Smoothing joined {} samples, flattened {} peaks/valleys ({} left)",
        joined,
        flattened,
        profile.len()
    );
}
