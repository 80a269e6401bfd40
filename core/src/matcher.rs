//! Score a candidate position message against each open segment, and
//! resolve across segments to a single winner, an ambiguous tie, noise, or
//! no match at all.
use std::collections::{BTreeMap, HashSet};

use crate::config::Config;
use crate::discrepancy::{hours_between, DiscrepancyCalculator};
use crate::message::{transponder_classes, Message};
use crate::segment::Segment;

/// The result of matching one message against one segment. `metric` is
/// `None` until a lookback depth produces a feasible, improving candidate;
/// segments whose match stays `None` take no further part in resolution.
#[derive(Debug, Clone)]
pub(crate) struct SegmentMatch {
    pub segment_id: String,
    pub msg_count: usize,
    pub metric: Option<f64>,
    pub hours: Option<f64>,
    /// Indices (into the segment's own live message list) to mark `drop`.
    /// Lookback candidates reconstructed from a carried-over `SegmentState`
    /// have no index and can never be dropped.
    pub msgs_to_drop: Vec<usize>,
}

impl SegmentMatch {
    fn empty(segment_id: String, msg_count: usize) -> Self {
        Self {
            segment_id,
            msg_count,
            metric: None,
            hours: None,
            msgs_to_drop: Vec::new(),
        }
    }
}

/// What [`Matcher::compute_best_match`] resolved to.
#[derive(Debug, Clone)]
pub(crate) enum MatchOutcome {
    NoMatch,
    Noise,
    Single(SegmentMatch),
    Ambiguous(Vec<SegmentMatch>),
}

pub(crate) struct Matcher {
    max_hours: f64,
    penalty_hours: f64,
    hours_exp: f64,
    buffer_hours: f64,
    max_knots: f64,
    lookback: usize,
    lookback_factor: f64,
    short_seg_threshold: f64,
    transponder_mismatch_weight: f64,
    ambiguity_factor: f64,
    min_type_27_hours: f64,
    discrepancy: DiscrepancyCalculator,
    /// `max_knots / penalty_speed`, precomputed once per matcher instance.
    alpha0: f64,
}

impl Matcher {
    pub fn new(config: &Config) -> Self {
        Self {
            max_hours: config.max_hours,
            penalty_hours: config.penalty_hours,
            hours_exp: config.hours_exp,
            buffer_hours: config.buffer_hours,
            max_knots: config.max_knots,
            lookback: config.lookback,
            lookback_factor: config.lookback_factor,
            short_seg_threshold: config.short_seg_threshold,
            transponder_mismatch_weight: config.transponder_mismatch_weight,
            ambiguity_factor: config.ambiguity_factor,
            min_type_27_hours: config.min_type_27_hours,
            discrepancy: DiscrepancyCalculator {
                very_slow: config.very_slow,
                shape_factor: config.shape_factor,
            },
            alpha0: config.max_knots / config.penalty_speed,
        }
    }

    /// Shorten the effective travel time for long gaps: vessels travel less
    /// predictably straight the longer they go unobserved.
    fn penalized_hours(&self, hours: f64) -> f64 {
        hours / (1.0 + (hours / self.penalty_hours).powf(1.0 - self.hours_exp))
    }

    fn compute_metric(&self, discrepancy: f64, hours: f64) -> f64 {
        let padded_hours = hours.hypot(self.buffer_hours);
        let max_allowed = padded_hours * self.max_knots;
        if discrepancy > max_allowed {
            return 0.0;
        }
        let alpha = self.alpha0 * discrepancy / max_allowed;
        (-(alpha * alpha)).exp() / padded_hours
    }

    /// Score `msg` against a single segment, considering up to `lookback`
    /// non-dropped tail messages.
    fn compute_segment_match(&self, segment: &Segment, msg: &Message, transponder_msg: &HashSet<crate::message::TransponderClass>) -> SegmentMatch {
        struct Candidate {
            existing_metric: f64,
            drop_indices: Vec<usize>,
            hours: f64,
            discrepancy: Option<f64>,
        }

        let mut candidates = Vec::new();
        let mut transponder_types = HashSet::new();
        let mut running_metric = 0.0_f64;
        let mut drop_indices: Vec<usize> = Vec::new();
        let mut remaining = segment.live_len() as i64;

        for entry in segment.lookback_entries() {
            // Every raw stored message counts against the budget, dropped or
            // not — only non-dropped ones are filtered out before this point
            // in the original, but the budget itself is spent unconditionally
            // as each is examined, so a dropped live message doesn't leave a
            // surplus that lets lookback reach further into `prev_state`.
            remaining -= 1;
            let Some(candidate) = entry else {
                if remaining < 0 {
                    break;
                }
                continue;
            };

            transponder_types.extend(transponder_classes(&candidate.message.msg_type));
            let hours = hours_between(candidate.message.timestamp, msg.timestamp);
            let penalized_hours = self.penalized_hours(hours.max(0.0));
            let discrepancy = self.discrepancy.discrepancy(candidate.message, msg, penalized_hours);

            candidates.push(Candidate {
                existing_metric: running_metric,
                drop_indices: drop_indices.clone(),
                hours,
                discrepancy,
            });

            if candidates.len() >= self.lookback || remaining < 0 {
                break;
            }
            if let Some(idx) = candidate.index {
                drop_indices.push(idx);
            }
            running_metric = candidate.existing_metric;
        }

        let transponder_match = !transponder_types.is_disjoint(transponder_msg);

        let mut best = SegmentMatch::empty(segment.id.to_string(), segment.msg_count());
        let mut best_metric_lb = 0.0_f64;

        for (depth, candidate) in candidates.into_iter().enumerate() {
            if candidate.hours > self.max_hours {
                break;
            }
            let Some(discrepancy) = candidate.discrepancy else {
                continue;
            };
            let mut metric = self.compute_metric(discrepancy, candidate.hours);
            if metric <= 0.0 {
                continue;
            }
            if !transponder_match {
                metric *= self.transponder_mismatch_weight;
            }
            let metric_lb = metric / 1.0_f64.max(depth as f64 * self.lookback_factor);
            if metric_lb <= candidate.existing_metric {
                continue;
            }
            if metric_lb > best_metric_lb {
                best_metric_lb = metric_lb;
                best.metric = Some(metric);
                best.hours = Some(candidate.hours);
                best.msgs_to_drop = candidate.drop_indices;
            }
        }

        best
    }

    /// Determine which, if any, open segment(s) best match `msg`.
    pub fn compute_best_match(&self, msg: &Message, segments: &BTreeMap<String, Segment>) -> MatchOutcome {
        let transponder_msg = transponder_classes(&msg.msg_type);
        let raw: Vec<SegmentMatch> = segments
            .values()
            .map(|seg| self.compute_segment_match(seg, msg, &transponder_msg))
            .collect();
        let matches: Vec<SegmentMatch> = raw.into_iter().filter(|m| m.metric.is_some()).collect();

        let resolved = if matches.is_empty() {
            return MatchOutcome::NoMatch;
        } else if matches.len() == 1 {
            Resolution::Single(matches.into_iter().next().unwrap())
        } else {
            let mut weighted: Vec<(f64, SegmentMatch)> = matches
                .into_iter()
                .map(|m| {
                    let a = m.msg_count as f64 / self.short_seg_threshold;
                    let weight = a / (1.0 + a * a).sqrt();
                    (m.metric.unwrap() * weight, m)
                })
                .collect();
            weighted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

            let best_score = weighted[0].0;
            let mut close = vec![weighted.remove(0).1];
            weighted.retain(|(score, _)| *score * self.ambiguity_factor >= best_score);
            close.extend(weighted.into_iter().map(|(_, m)| m));

            if close.len() > 1 {
                Resolution::Ambiguous(close)
            } else {
                Resolution::Single(close.into_iter().next().unwrap())
            }
        };

        match resolved {
            Resolution::Single(best) => {
                let hours = best.hours.unwrap_or(0.0);
                if msg.msg_type == "AIS.27" && hours < self.min_type_27_hours {
                    MatchOutcome::Noise
                } else {
                    MatchOutcome::Single(best)
                }
            }
            Resolution::Ambiguous(matches) => {
                let hours = matches.iter().filter_map(|m| m.hours).fold(f64::INFINITY, f64::min);
                if msg.msg_type == "AIS.27" && hours < self.min_type_27_hours {
                    MatchOutcome::Noise
                } else {
                    MatchOutcome::Ambiguous(matches)
                }
            }
        }
    }
}

enum Resolution {
    Single(SegmentMatch),
    Ambiguous(Vec<SegmentMatch>),
}
