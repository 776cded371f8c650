//! Course round trip integration tests.
//!
//! Builds routes in memory, runs climb detection, writes a FIT course and
//! reads it back.
//!
//! Run with: `cargo test --test course_round_trip`

use fit_course::climbs::{find_climbs, ClimbConfig};
use fit_course::fit::{encode_course, read_route, CourseOptions, FitDecoder, CONTENT_TYPE};
use fit_course::{FitCourseError, Point, Route, TurnKind};

const START_MS: i64 = 1_717_236_000_000;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 10 km climbing linearly from 0 m to 500 m, one point every 100 m,
/// one point per 20 s.
fn linear_climb() -> Vec<Point> {
    (0..=100)
        .map(|i| {
            let distance = i as f64 * 100.0;
            Point::new(46.2 + i as f64 * 0.0009, 7.3 + i as f64 * 0.0001, distance)
                .with_ele(distance * 0.05)
                .with_time(START_MS + i as i64 * 20_000)
        })
        .collect()
}

fn nearest(points: &[Point], distance: f64) -> usize {
    let mut best = 0;
    for (idx, point) in points.iter().enumerate() {
        if (point.distance - distance).abs() < (points[best].distance - distance).abs() {
            best = idx;
        }
    }
    best
}

// ============================================================================
// Round trip
// ============================================================================

#[test]
fn test_turn_survives_round_trip() {
    init_logging();
    let mut points = linear_climb();
    let at = nearest(&points, 2000.0);
    points[at].turn = Some(TurnKind::Left);
    points[at].name = Some("Col road".to_string());
    let route = Route::new("Linear", points);

    let file = encode_course(&route, &CourseOptions::default()).unwrap();
    assert_eq!(file.content_type(), CONTENT_TYPE);

    let decoded = read_route(file.bytes()).unwrap().expect("route has points");
    assert_eq!(decoded.name, "Linear");
    assert_eq!(decoded.points.len(), route.points.len());

    let at_decoded = nearest(&decoded.points, 2000.0);
    assert_eq!(at_decoded, at);
    assert_eq!(decoded.points[at_decoded].turn, Some(TurnKind::Left));
    assert_eq!(decoded.points[at_decoded].name.as_deref(), Some("Col road"));
    assert_eq!(decoded.turn_count(), 1);
}

#[test]
fn test_points_within_quantization() {
    let route = Route::new("Linear", linear_climb());
    let file = encode_course(&route, &CourseOptions::default()).unwrap();
    let decoded = read_route(file.bytes()).unwrap().unwrap();

    // semicircles, 0.2 m altitude, 1 cm distance, 1 s timestamps
    for (orig, back) in route.points.iter().zip(&decoded.points) {
        assert!((orig.lat - back.lat).abs() < 1e-6);
        assert!((orig.lon - back.lon).abs() < 1e-6);
        assert!((orig.ele.unwrap() - back.ele.unwrap()).abs() <= 0.2);
        assert!((orig.distance - back.distance).abs() <= 0.01);
        assert!((orig.time.unwrap() - back.time.unwrap()).abs() < 1000);
    }
    assert!((decoded.ele_gain - route.ele_gain).abs() <= 1.0);
    assert!((decoded.ele_loss - route.ele_loss).abs() <= 1.0);
}

#[test]
fn test_climb_markers_survive_round_trip() {
    init_logging();
    let mut route = Route::new("Linear", linear_climb());
    let report = find_climbs(&mut route.points, &ClimbConfig::default());
    assert_eq!(report.climbs.len(), 1);
    assert_eq!(report.annotations, 2);

    let file = encode_course(&route, &CourseOptions::default()).unwrap();
    let decoded = read_route(file.bytes()).unwrap().unwrap();
    for (orig, back) in route.points.iter().zip(&decoded.points) {
        assert_eq!(orig.turn, back.turn);
        assert_eq!(orig.name, back.name);
    }
    assert_eq!(decoded.points[100].turn, Some(TurnKind::Summit));
}

#[test]
fn test_course_without_turns() {
    let mut points = linear_climb();
    points[10].turn = Some(TurnKind::Right);
    let route = Route::new("Plain", points);
    let options = CourseOptions {
        include_turns: false,
        ..Default::default()
    };

    let file = encode_course(&route, &options).unwrap();
    let decoded = read_route(file.bytes()).unwrap().unwrap();
    assert_eq!(decoded.turn_count(), 0);
}

// ============================================================================
// Decoder failures
// ============================================================================

#[test]
fn test_chained_and_truncated_files() {
    let route = Route::new("Linear", linear_climb());
    let bytes = encode_course(&route, &CourseOptions::default())
        .unwrap()
        .into_bytes();

    let mut chained = bytes.clone();
    chained.extend_from_slice(&bytes);
    assert_eq!(
        read_route(&chained),
        Err(FitCourseError::ChainedFileUnsupported {
            remaining: bytes.len()
        })
    );

    let truncated = &bytes[..bytes.len() - 10];
    assert!(matches!(
        read_route(truncated),
        Err(FitCourseError::TruncatedFile { .. })
    ));
}

#[test]
fn test_decoder_reuse_across_files() {
    let mut decoder = FitDecoder::new();
    let first = encode_course(&Route::new("One", linear_climb()), &CourseOptions::default()).unwrap();
    let second = encode_course(
        &Route::new("Two", linear_climb()[..10].to_vec()),
        &CourseOptions::default(),
    )
    .unwrap();

    assert_eq!(decoder.read_route(first.bytes()).unwrap().unwrap().name, "One");
    let two = decoder.read_route(second.bytes()).unwrap().unwrap();
    assert_eq!(two.name, "Two");
    assert_eq!(two.points.len(), 10);
}
