//! # FIT Course
//!
//! FIT course files for navigation devices, and climb detection for the
//! routes that go into them.
//!
//! This library provides:
//! - A FIT encoder writing course files (file_id, course, lap, record, event
//!   and course_point messages)
//! - A FIT decoder reading course and activity files back into a [`Route`]
//! - Climb and descent detection that annotates a route with category,
//!   summit and valley markers
//!
//! ## Quick Start
//!
//! ```rust
//! use fit_course::climbs::{find_climbs, ClimbConfig};
//! use fit_course::fit::{encode_course, read_route, CourseOptions};
//! use fit_course::{Point, Route};
//!
//! // 8 km at 5%
//! let points: Vec<Point> = (0..=80)
//!     .map(|i| {
//!         let distance = i as f64 * 100.0;
//!         Point::new(46.5 + i as f64 * 0.0009, 7.9, distance).with_ele(600.0 + distance * 0.05)
//!     })
//!     .collect();
//! let mut route = Route::new("Col", points);
//!
//! let report = find_climbs(&mut route.points, &ClimbConfig::default());
//! assert_eq!(report.climbs.len(), 1);
//!
//! let file = encode_course(&route, &CourseOptions::default()).unwrap();
//! let decoded = read_route(file.bytes()).unwrap().unwrap();
//! assert_eq!(decoded.name, "Col");
//! assert_eq!(decoded.turn_count(), report.annotations);
//! ```

// Unified error handling
pub mod error;
pub use error::{FitCourseError, OptionExt, Result};

// Route model and helpers (elevation totals, durations, turn notes)
pub mod route;
pub use route::{
    elevation_change, improve_instructions, ElevationChange, Point, Route, TurnKind,
    DOUBLE_TURN_DISTANCE, ELEVATION_HYSTERESIS,
};

// FIT codec (types, messages, CRC, encoder, decoder)
pub mod fit;
pub use fit::{encode_course, read_route, CourseOptions, FitDecoder, FitEncoder, FitFile};

// Climb and descent detection
pub mod climbs;
pub use climbs::{
    find_climbs, find_climbs_with_observer, ClimbConfig, ClimbKind, ClimbObserver, ClimbPresets,
    ClimbReport, ClimbSelection, DetectedClimb, EndDetection,
};
