//! Climb detection thresholds and the named presets that bundle them.

use serde::{Deserialize, Serialize};

use crate::error::{FitCourseError, Result};

/// One pass of the oscillation flattening: a local peak or dip whose
/// neighbours differ by less than `tolerance` meters is levelled, as long as
/// both adjoining intervals are shorter than `max_run` meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveProfile {
    pub tolerance: f64,
    pub max_run: f64,
}

/// Configuration for climb and descent detection.
///
/// All rules are written for climbs and apply mirrored to descents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbConfig {
    /// Grade (%) below which a point cannot open a new candidate
    pub consider_as_flat_till: f64,
    /// Grade (%) a point needs to keep growing an open candidate
    pub min_climb_grade: f64,
    /// Candidates shorter than this (meters) are dropped at the first
    /// interruption instead of being investigated
    pub min_candidate_distance: f64,
    /// End runs of up to this many intervals are never judged relative to the
    /// candidate, only by the absolute thresholds
    pub end_slack_points: usize,

    /// Flat/reverse distance (meters) after which a climb counts as levelled off
    pub leveled_distance: f64,
    /// Extra levelling distance per meter of climb height
    pub leveled_factor: f64,
    /// Cap on the height scaled levelling distance (meters)
    pub leveled_max: f64,

    /// Give-back (meters) after which a climb counts as peaked
    pub peak_drop: f64,
    /// Extra give-back per meter of climb height
    pub peak_factor: f64,
    /// Cap on the height scaled give-back (meters)
    pub peak_max: f64,

    pub use_climbs: bool,
    pub use_descents: bool,
    /// Add a summit/valley marker at the end of long segments
    pub add_endpoint: bool,

    /// Minimum total ascent of a climb (meters)
    pub ignore_ascent_less_than: f64,
    /// Minimum average grade of a climb (%)
    pub ignore_ascent_grades_less_than: f64,
    /// Climbs with more ascent than this (meters) ...
    pub long_ascent_min: f64,
    /// ... are kept down to this average grade (%)
    pub keep_avg_grade_long_ascent: f64,

    /// Minimum total descent (meters)
    pub ignore_descent_less_than: f64,
    /// Descents must be at least this steep (negative %)
    pub ignore_descent_grades_less_than: f64,
    /// Descents with more descent than this (meters) ...
    pub long_descent_min: f64,
    /// ... are kept down to this average grade (negative %)
    pub keep_avg_grade_long_descent: f64,

    /// Single interval grades are clamped to +/- this (%) when averaging
    pub max_grade_clamp: f64,
    /// Segments need to be longer than this (meters) to get an end marker
    pub min_end_marker_distance: f64,

    /// Run the smoothing passes before scanning
    pub smooth: bool,
    /// Neighbouring intervals shorter than this in sum (meters) are joined
    pub join_distance: f64,
    /// Intervals shorter than this (meters) are always joined
    pub min_delta_distance: f64,
    /// Oscillation flattening passes, applied in order
    pub wave_profiles: Vec<WaveProfile>,
}

impl Default for ClimbConfig {
    fn default() -> Self {
        Self {
            consider_as_flat_till: 1.5,
            min_climb_grade: 1.0,
            min_candidate_distance: 50.0,
            end_slack_points: 2,

            leveled_distance: 1000.0,
            leveled_factor: 1.5,
            leveled_max: 2000.0,

            peak_drop: 20.0,
            peak_factor: 0.1,
            peak_max: 150.0, // long alpine passes dip that much before the top

            use_climbs: true,
            use_descents: true,
            add_endpoint: true,

            ignore_ascent_less_than: 80.0,
            ignore_ascent_grades_less_than: 4.0,
            long_ascent_min: 400.0,
            keep_avg_grade_long_ascent: 3.0,

            ignore_descent_less_than: 100.0,
            ignore_descent_grades_less_than: -5.0,
            long_descent_min: 400.0,
            keep_avg_grade_long_descent: -3.0,

            max_grade_clamp: 25.0,
            min_end_marker_distance: 2000.0,

            smooth: true,
            join_distance: 25.0,
            min_delta_distance: 2.0,
            wave_profiles: vec![
                WaveProfile {
                    tolerance: 0.5,
                    max_run: 20.0,
                },
                WaveProfile {
                    tolerance: 1.5,
                    max_run: 10.0,
                },
            ],
        }
    }
}

/// Which climbs (or descents) to mark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClimbSelection {
    None,
    All,
    Medium,
    Major,
}

/// How much plateau and give-back is tolerated before a climb ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndDetection {
    Short,
    Normal,
    Long,
}

/// A stored preset choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimbPresets {
    pub climbs: ClimbSelection,
    pub descents: ClimbSelection,
    pub end: EndDetection,
}

impl Default for ClimbPresets {
    fn default() -> Self {
        Self {
            climbs: ClimbSelection::Medium,
            descents: ClimbSelection::Major,
            end: EndDetection::Normal,
        }
    }
}

impl ClimbPresets {
    pub fn to_config(self) -> ClimbConfig {
        ClimbConfig::from_presets(self.climbs, self.descents, self.end)
    }
}

impl ClimbConfig {
    /// Build a configuration from preset choices.
    ///
    /// `Medium` climbs/descents and `Normal` end detection reproduce the
    /// defaults.
    pub fn from_presets(climbs: ClimbSelection, descents: ClimbSelection, end: EndDetection) -> Self {
        let mut config = Self::default();

        match climbs {
            ClimbSelection::None => config.use_climbs = false,
            ClimbSelection::All => {
                config.ignore_ascent_less_than = 30.0;
                config.ignore_ascent_grades_less_than = 3.0;
                config.long_ascent_min = 300.0;
                config.keep_avg_grade_long_ascent = 2.0;
            }
            ClimbSelection::Medium => {}
            ClimbSelection::Major => {
                config.ignore_ascent_less_than = 200.0;
                config.ignore_ascent_grades_less_than = 5.0;
                config.long_ascent_min = 600.0;
                config.keep_avg_grade_long_ascent = 4.0;
            }
        }

        match descents {
            ClimbSelection::None => config.use_descents = false,
            ClimbSelection::All => {
                config.ignore_descent_less_than = 50.0;
                config.ignore_descent_grades_less_than = -4.0;
                config.long_descent_min = 300.0;
                config.keep_avg_grade_long_descent = -2.0;
            }
            ClimbSelection::Medium => {}
            ClimbSelection::Major => {
                config.ignore_descent_less_than = 250.0;
                config.ignore_descent_grades_less_than = -6.0;
                config.long_descent_min = 600.0;
                config.keep_avg_grade_long_descent = -4.0;
            }
        }

        match end {
            EndDetection::Short => {
                config.leveled_distance = 500.0;
                config.leveled_factor = 1.0;
                config.leveled_max = 1000.0;
                config.peak_drop = 10.0;
                config.peak_factor = 0.05;
                config.peak_max = 75.0;
            }
            EndDetection::Normal => {}
            EndDetection::Long => {
                config.leveled_distance = 1500.0;
                config.leveled_factor = 2.0;
                config.leveled_max = 3000.0;
                config.peak_drop = 30.0;
                config.peak_factor = 0.15;
                config.peak_max = 250.0;
            }
        }

        config
    }

    /// Parse a stored configuration; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject thresholds the scan cannot work with.
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("consider_as_flat_till", self.consider_as_flat_till),
            ("min_climb_grade", self.min_climb_grade),
            ("min_candidate_distance", self.min_candidate_distance),
            ("leveled_distance", self.leveled_distance),
            ("leveled_factor", self.leveled_factor),
            ("leveled_max", self.leveled_max),
            ("peak_drop", self.peak_drop),
            ("peak_factor", self.peak_factor),
            ("peak_max", self.peak_max),
            ("ignore_ascent_less_than", self.ignore_ascent_less_than),
            ("ignore_descent_less_than", self.ignore_descent_less_than),
            ("min_end_marker_distance", self.min_end_marker_distance),
            ("join_distance", self.join_distance),
            ("min_delta_distance", self.min_delta_distance),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(FitCourseError::InvalidConfig {
                    message: format!("{} must be a non-negative number (got {})", name, value),
                });
            }
        }
        if self.max_grade_clamp.is_nan() || self.max_grade_clamp <= 0.0 {
            return Err(FitCourseError::InvalidConfig {
                message: format!("max_grade_clamp must be positive (got {})", self.max_grade_clamp),
            });
        }
        if self
            .wave_profiles
            .iter()
            .any(|w| w.tolerance.is_nan() || w.tolerance < 0.0 || w.max_run.is_nan() || w.max_run < 0.0)
        {
            return Err(FitCourseError::InvalidConfig {
                message: "wave profiles need non-negative tolerance and run length".to_string(),
            });
        }
        Ok(())
    }
}
