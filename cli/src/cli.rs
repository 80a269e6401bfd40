use clap::Parser;

/// Run the trajseg vessel-trajectory segmenter over a newline-delimited JSON
/// message stream.
#[derive(Parser, Debug)]
#[command(name = "trajseg-cli", author, version, about, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// Input NDJSON file; reads from stdin when omitted.
    #[arg(short = 'f', long = "input", value_name = "FILE")]
    pub input: Option<String>,

    /// Output NDJSON file; writes to stdout when omitted.
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<String>,

    /// Input is gzip-compressed.
    #[arg(long)]
    pub gzip_input: bool,

    /// Gzip-compress the output.
    #[arg(long)]
    pub gzip_output: bool,

    /// NDJSON file of `SegmentState` snapshots to resume from.
    #[arg(short = 'r', long = "resume-from", value_name = "FILE")]
    pub resume_from: Option<String>,

    /// Pre-bind the SSVID to process; by default the first message's SSVID is used.
    #[arg(long)]
    pub ssvid: Option<String>,

    /// Maximum hours allowed between two points in a segment.
    #[arg(long, default_value_t = trajseg::Config::default().max_hours)]
    pub max_hours: f64,

    /// Hours at which the penalized-hours correction starts biting.
    #[arg(long, default_value_t = trajseg::Config::default().penalty_hours)]
    pub penalty_hours: f64,

    /// Exponent used by the penalized-hours correction.
    #[arg(long, default_value_t = trajseg::Config::default().hours_exp)]
    pub hours_exp: f64,

    /// Extra hours of padding applied before converting a discrepancy to a metric.
    #[arg(long, default_value_t = trajseg::Config::default().buffer_hours)]
    pub buffer_hours: f64,

    /// Maximum speed, in knots, considered plausible between two points.
    #[arg(long, default_value_t = trajseg::Config::default().max_knots)]
    pub max_knots: f64,

    /// How many non-dropped tail messages of a segment to consider for lookback.
    #[arg(long, default_value_t = trajseg::Config::default().lookback)]
    pub lookback: usize,

    /// Divisor applied per lookback depth.
    #[arg(long, default_value_t = trajseg::Config::default().lookback_factor)]
    pub lookback_factor: f64,

    /// Segments with fewer messages than this are down-weighted during ambiguity resolution.
    #[arg(long, default_value_t = trajseg::Config::default().short_seg_threshold)]
    pub short_seg_threshold: f64,

    /// Multiplier applied to the stationarity and perpendicular-offset discrepancy sub-metrics.
    #[arg(long, default_value_t = trajseg::Config::default().shape_factor)]
    pub shape_factor: f64,

    /// Multiplier applied to the match metric when transponder classes don't overlap.
    #[arg(long, default_value_t = trajseg::Config::default().transponder_mismatch_weight)]
    pub transponder_mismatch_weight: f64,

    /// Speed, relative to the expected position, above which a match is strongly discouraged.
    #[arg(long, default_value_t = trajseg::Config::default().penalty_speed)]
    pub penalty_speed: f64,

    /// Maximum number of segments kept open at once.
    #[arg(long, default_value_t = trajseg::Config::default().max_open_segments)]
    pub max_open_segments: usize,

    /// A winning AIS.27 match closer than this many hours to its segment is treated as noise.
    #[arg(long, default_value_t = trajseg::Config::default().min_type_27_hours)]
    pub min_type_27_hours: f64,

    /// An alternate match within `1 / ambiguity_factor` of the best is considered ambiguous.
    #[arg(long, default_value_t = trajseg::Config::default().ambiguity_factor)]
    pub ambiguity_factor: f64,

    /// Speed, in knots, at or below which a missing course is tolerated.
    #[arg(long, default_value_t = trajseg::Config::default().very_slow)]
    pub very_slow: f64,
}

impl Cli {
    pub fn config(&self) -> trajseg::Config {
        trajseg::Config {
            max_hours: self.max_hours,
            penalty_hours: self.penalty_hours,
            hours_exp: self.hours_exp,
            buffer_hours: self.buffer_hours,
            max_knots: self.max_knots,
            lookback: self.lookback,
            lookback_factor: self.lookback_factor,
            short_seg_threshold: self.short_seg_threshold,
            shape_factor: self.shape_factor,
            transponder_mismatch_weight: self.transponder_mismatch_weight,
            penalty_speed: self.penalty_speed,
            max_open_segments: self.max_open_segments,
            min_type_27_hours: self.min_type_27_hours,
            ambiguity_factor: self.ambiguity_factor,
            very_slow: self.very_slow,
            ssvid: self.ssvid.clone(),
        }
    }
}
