//! Tunables for the matcher and the segmenter coordinator.
//!
//! Defaults mirror the newer of the two parallel pipelines found in the
//! original implementation (see `DESIGN.md` for the open-question ledger);
//! the older monolithic pipeline's `max_hours = 12` / `max_open_segments = 20`
//! and its legacy "reserved speed value" range filters are intentionally not
//! reproduced.

/// Every knob the matcher and segmenter recognize, with `Default` set to the
/// values in the design's §4 component write-ups.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum hours allowed between two points in a segment.
    pub max_hours: f64,
    /// Hours at which the penalized-hours correction starts biting.
    pub penalty_hours: f64,
    /// Exponent used by the penalized-hours correction.
    pub hours_exp: f64,
    /// Extra hours of padding applied before converting a discrepancy to a metric.
    pub buffer_hours: f64,
    /// Maximum speed, in knots, considered plausible between two points.
    pub max_knots: f64,
    /// How many non-dropped tail messages of a segment to consider for lookback.
    pub lookback: usize,
    /// Divisor applied per lookback depth; higher means lookback is used more sparingly.
    pub lookback_factor: f64,
    /// Segments with fewer messages than this are down-weighted during ambiguity resolution.
    pub short_seg_threshold: f64,
    /// Multiplier applied to the stationarity and perpendicular-offset discrepancy sub-metrics.
    pub shape_factor: f64,
    /// Multiplier applied to the match metric when transponder classes don't overlap.
    pub transponder_mismatch_weight: f64,
    /// Speed, relative to the expected position, above which a match is strongly discouraged.
    pub penalty_speed: f64,
    /// Maximum number of segments kept open at once.
    pub max_open_segments: usize,
    /// A winning `AIS.27` match closer than this many hours to its segment is treated as noise.
    pub min_type_27_hours: f64,
    /// An alternate match within `1 / ambiguity_factor` of the best is considered ambiguous.
    pub ambiguity_factor: f64,
    /// Speed, in knots, at or below which a missing course is tolerated.
    pub very_slow: f64,
    /// Pre-bind the SSVID this run should process; `None` latches onto the first message seen.
    pub ssvid: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_hours: 8.0,
            penalty_hours: 4.0,
            hours_exp: 0.5,
            buffer_hours: 0.25,
            max_knots: 25.0,
            lookback: 5,
            lookback_factor: 2.0,
            short_seg_threshold: 10.0,
            shape_factor: 4.0,
            transponder_mismatch_weight: 0.1,
            penalty_speed: 5.0,
            max_open_segments: 100,
            min_type_27_hours: 1.0,
            ambiguity_factor: 10.0,
            very_slow: 0.35,
            ssvid: None,
        }
    }
}
