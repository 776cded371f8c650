//! Climb detection scenarios on synthetic profiles.
//!
//! Run with: `cargo test --test climb_scenarios`

use fit_course::climbs::{
    find_climbs, find_climbs_with_observer, ClimbConfig, ClimbKind, ClimbPresets, ClimbSelection,
    EndDetection, RecordingObserver, SegmentEvent,
};
use fit_course::{FitCourseError, Point, TurnKind};

/// Points every 100 m along `length` meters with elevation `ele(distance)`.
fn profile(length: f64, ele: impl Fn(f64) -> f64) -> Vec<Point> {
    let count = (length / 100.0).round() as usize;
    (0..=count)
        .map(|i| {
            let distance = i as f64 * 100.0;
            Point::new(44.1 + i as f64 * 0.0009, 5.3, distance).with_ele(ele(distance))
        })
        .collect()
}

/// 2 km at 6%, 3 km flat, 5 km at 6%.
fn two_climbs() -> Vec<Point> {
    profile(10_000.0, |d| {
        if d <= 2000.0 {
            d * 0.06
        } else if d <= 5000.0 {
            120.0
        } else {
            120.0 + (d - 5000.0) * 0.06
        }
    })
}

#[test]
fn test_medium_preset_marks_both_climbs() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut points = two_climbs();
    let report = find_climbs(&mut points, &ClimbConfig::default());

    assert_eq!(report.climbs.len(), 2);
    let short = &report.climbs[0];
    assert_eq!((short.start_index, short.end_index), (0, 20));
    // 2 km x 6% x 6% = 72
    assert_eq!(short.category, TurnKind::FourthCategory);
    // not longer than 2 km, so no summit marker
    assert_eq!(short.end_marker_index, None);

    let long = &report.climbs[1];
    assert_eq!((long.start_index, long.end_index), (50, 100));
    assert_eq!(long.category, TurnKind::ThirdCategory);
    assert_eq!(long.end_marker_index, Some(100));

    assert_eq!(report.annotations, 3);
    assert_eq!(points[0].turn, Some(TurnKind::FourthCategory));
    assert_eq!(points[50].turn, Some(TurnKind::ThirdCategory));
    assert_eq!(points[100].turn, Some(TurnKind::Summit));
    assert_eq!(points[100].name.as_deref(), Some("420m"));
}

#[test]
fn test_major_preset_skips_small_climb() {
    let mut points = two_climbs();
    let config = ClimbConfig::from_presets(
        ClimbSelection::Major,
        ClimbSelection::Major,
        EndDetection::Normal,
    );
    let mut observer = RecordingObserver::default();
    let report = find_climbs_with_observer(&mut points, &config, &mut observer);

    assert_eq!(report.climbs.len(), 1);
    assert_eq!(report.climbs[0].start_index, 50);
    assert_eq!(observer.count(SegmentEvent::Leveled), 1);
    assert_eq!(observer.count(SegmentEvent::EndOfTrack), 1);
    assert_eq!(observer.count(SegmentEvent::Ignored), 1);
    assert_eq!(observer.count(SegmentEvent::Accepted), 1);
    assert!(points[0].turn.is_none());
}

#[test]
fn test_long_shallow_climb_is_rescued() {
    // 15 km at 3.5%: too shallow for the grade floor, but 525 m of ascent
    let mut points = profile(15_000.0, |d| d * 0.035);
    let report = find_climbs(&mut points, &ClimbConfig::default());
    assert_eq!(report.climbs.len(), 1);
    assert_eq!(report.climbs[0].kind, ClimbKind::Climb);
    assert_eq!(report.climbs[0].start_index, 0);
    assert_eq!(report.climbs[0].category, TurnKind::ThirdCategory);

    // major climbs need 600 m before the rescue applies
    let mut points = profile(15_000.0, |d| d * 0.035);
    let config = ClimbConfig::from_presets(
        ClimbSelection::Major,
        ClimbSelection::Major,
        EndDetection::Normal,
    );
    let mut observer = RecordingObserver::default();
    let report = find_climbs_with_observer(&mut points, &config, &mut observer);
    assert!(report.climbs.is_empty());
    // shrinking stops once the height floor is hit
    assert!(observer.count(SegmentEvent::Rejected) < 150);
    assert_eq!(observer.count(SegmentEvent::Ignored), 1);
}

#[test]
fn test_descent_marked_with_danger() {
    // 4 km down at 8%
    let mut points = profile(4000.0, |d| 1000.0 - d * 0.08);
    let report = find_climbs(&mut points, &ClimbConfig::default());

    assert_eq!(report.climbs.len(), 1);
    let descent = &report.climbs[0];
    assert_eq!(descent.kind, ClimbKind::Descent);
    assert_eq!(descent.category, TurnKind::Danger);
    assert!((descent.avg_grade + 8.0).abs() < 1e-9);
    assert_eq!(points[0].turn, Some(TurnKind::Danger));
    assert_eq!(points[0].name.as_deref(), Some("680m ↘ 320m/4.0km -8.0%"));
    assert_eq!(points[40].turn, Some(TurnKind::Valley));
}

#[test]
fn test_config_from_json() {
    let config = ClimbConfig::from_json(r#"{"use_descents": false, "ignore_ascent_less_than": 150}"#)
        .unwrap();
    assert!(!config.use_descents);
    assert_eq!(config.min_climb_grade, ClimbConfig::default().min_climb_grade);

    let mut points = two_climbs();
    let report = find_climbs(&mut points, &config);
    assert_eq!(report.climbs.len(), 1);
    assert_eq!(report.climbs[0].start_index, 50);

    assert!(matches!(
        ClimbConfig::from_json(r#"{"max_grade_clamp": 0}"#),
        Err(FitCourseError::InvalidConfig { .. })
    ));
    assert!(matches!(
        ClimbConfig::from_json("not json"),
        Err(FitCourseError::InvalidConfig { .. })
    ));
}

#[test]
fn test_stored_presets() {
    let presets: ClimbPresets =
        serde_json::from_str(r#"{"climbs": "all", "descents": "none", "end": "long"}"#).unwrap();
    let config = presets.to_config();
    assert!(config.use_climbs);
    assert!(!config.use_descents);
    assert_eq!(config.leveled_distance, 1500.0);

    let defaults: ClimbPresets = serde_json::from_str("{}").unwrap();
    assert_eq!(defaults, ClimbPresets::default());
    let config = defaults.to_config();
    assert_eq!(config.ignore_ascent_less_than, ClimbConfig::default().ignore_ascent_less_than);
    assert_eq!(config.ignore_descent_less_than, 250.0);
}
