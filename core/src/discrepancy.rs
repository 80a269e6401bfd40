//! Pure kinematic math: time deltas, dead reckoning, and the three-way
//! discrepancy metric used by the [`crate::matcher::Matcher`].
use hifitime::{Duration, Epoch, Unit};

use crate::message::Message;

/// Longitude/latitude pair in degrees.
type LonLat = (f64, f64);

/// Wrap a longitude delta (in degrees) to `(-180, 180]`.
fn wrap_deg(x: f64) -> f64 {
    let wrapped = (x + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Difference between two timestamps, in (signed) hours.
pub fn hours_between(t1: Epoch, t2: Epoch) -> f64 {
    (t2 - t1).to_seconds() / 3600.0
}

/// A bundle of the pure, stateless kinematic computations that the matcher
/// builds on. Kept as free functions plus a small struct of tunables rather
/// than a Python-style mixin base class.
#[derive(Debug, Clone, Copy)]
pub struct DiscrepancyCalculator {
    /// Speed (knots) at or below which a missing course is tolerated and
    /// treated as zero heading / zero speed for dead reckoning.
    pub very_slow: f64,
    /// Multiplier applied to the stationarity and perpendicular-offset
    /// sub-metrics, making them harder to win against the endpoint-error metric.
    pub shape_factor: f64,
}

impl Default for DiscrepancyCalculator {
    fn default() -> Self {
        Self {
            very_slow: 0.35,
            shape_factor: 4.0,
        }
    }
}

impl DiscrepancyCalculator {
    /// Dead-reckon a message's position forward (or, with negative `hours`,
    /// backward) by `hours`, using its own speed and course.
    ///
    /// `course` is reported with `0` pointing north, clockwise, as AIS does;
    /// this is converted to the standard math convention (`0` east,
    /// counter-clockwise) before projecting.
    fn expected_position(&self, msg: &Message, hours: f64) -> LonLat {
        const EPSILON: f64 = 1e-3;
        let x = msg.lon.expect("expected_position requires lon");
        let y = msg.lat.expect("expected_position requires lat");
        let (speed, course) = match msg.course {
            Some(course) if !course.is_nan() => (msg.speed.unwrap_or(0.0), course),
            _ => {
                debug_assert!(msg.speed.unwrap_or(0.0) <= self.very_slow);
                (0.0, 0.0)
            }
        };

        let dist = speed * hours;
        let math_course = (90.0_f64 - course).to_radians();
        let deg_lat_per_nm = 1.0 / 60.0;
        let deg_lon_per_nm = deg_lat_per_nm / (y.to_radians().cos() + EPSILON);

        let dx = math_course.cos() * dist * deg_lon_per_nm;
        let dy = math_course.sin() * dist * deg_lat_per_nm;
        (x + dx, y + dy)
    }

    /// Minimum of the three motion-consistency sub-metrics, in nautical miles.
    ///
    /// `m1` is the older message, `m2` the newer one, and `hours` the
    /// (possibly penalized) elapsed time used to dead-reckon between them.
    pub fn discrepancy(&self, m1: &Message, m2: &Message, hours: f64) -> Option<f64> {
        debug_assert!(hours >= 0.0);
        let (x1, y1) = (m1.lon?, m1.lat?);
        let (x2, y2) = (m2.lon?, m2.lat?);

        let (x2p, y2p) = self.expected_position(m1, hours);
        let (x1p, y1p) = self.expected_position(m2, -hours);

        let mean_lat = 0.5 * (y1 + y2);
        let nm_per_deg_lat = 60.0_f64;
        let nm_per_deg_lon = nm_per_deg_lat * mean_lat.to_radians().cos();

        // Sub-metric 1: mean endpoint error.
        let err1 = (nm_per_deg_lon * wrap_deg(x1p - x1)).hypot(nm_per_deg_lat * (y1p - y1));
        let err2 = (nm_per_deg_lon * wrap_deg(x2p - x2)).hypot(nm_per_deg_lat * (y2p - y2));
        let discrepancy1 = 0.5 * (err1 + err2);

        // Sub-metric 2: stationarity.
        let dist = (nm_per_deg_lat * (y2 - y1)).hypot(nm_per_deg_lon * wrap_deg(x2 - x1));
        let discrepancy2 = dist * self.shape_factor;

        // Sub-metric 3: perpendicular offset from the straight-line path.
        let rads21 = (nm_per_deg_lat * (y2 - y1)).atan2(nm_per_deg_lon * wrap_deg(x2 - x1));
        let course1 = safe_course(m1.course);
        let course2 = safe_course(m2.course);

        let delta21 = (90.0_f64 - course1).to_radians() - rads21;
        let tangential21 = delta21.cos() * dist;
        let normal21 = if tangential21 > 0.0 && tangential21 <= m1.speed.unwrap_or(0.0) * hours {
            delta21.sin().abs() * dist
        } else {
            f64::INFINITY
        };

        let delta12 = (90.0_f64 - course2).to_radians() - rads21;
        let tangential12 = delta12.cos() * dist;
        let normal12 = if tangential12 > 0.0 && tangential12 <= m2.speed.unwrap_or(0.0) * hours {
            delta12.sin().abs() * dist
        } else {
            f64::INFINITY
        };

        let discrepancy3 = 0.5 * (normal12 + normal21) * self.shape_factor;

        Some(discrepancy1.min(discrepancy2).min(discrepancy3))
    }
}

/// `course`, treated as zero when unavailable (`NaN`/`None`).
fn safe_course(course: Option<f64>) -> f64 {
    match course {
        Some(c) if !c.is_nan() => c,
        _ => 0.0,
    }
}

/// Convenience: hours between two messages' timestamps.
pub fn msg_delta_hours(m1: &Message, m2: &Message) -> f64 {
    hours_between(m1.timestamp, m2.timestamp)
}

/// Build a [`Duration`] from a (possibly fractional, possibly negative) hour count.
pub fn duration_hours(hours: f64) -> Duration {
    hours * Unit::Hour
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg_at(lon: f64, lat: f64, speed: f64, course: f64, t: Epoch) -> Message {
        Message {
            msgid: "1".into(),
            ssvid: "1".into(),
            timestamp: t,
            msg_type: "AIS.1".into(),
            lon: Some(lon),
            lat: Some(lat),
            course: Some(course),
            speed: Some(speed),
            heading: None,
            shipname: None,
            callsign: None,
            imo: None,
            destination: None,
            length: None,
            width: None,
            receiver_type: None,
            source: None,
        }
    }

    #[test]
    fn wrap_handles_antimeridian() {
        assert!((wrap_deg(190.0) - (-170.0)).abs() < 1e-9);
        assert!((wrap_deg(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_deg(180.0) - 180.0).abs() < 1e-9);
    }

    #[test]
    fn straight_line_travel_has_near_zero_discrepancy() {
        let calc = DiscrepancyCalculator::default();
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg_at(0.0, 0.0, 10.0, 90.0, t0);
        // ~10nm east after 1 hour at 10kn, course 90 (east).
        let m2 = msg_at(10.0 / 60.0, 0.0, 10.0, 90.0, t0 + 1.0 * Unit::Hour);
        let d = calc.discrepancy(&m1, &m2, 1.0).unwrap();
        assert!(d < 0.5, "discrepancy too large: {d}");
    }

    #[test]
    fn impossible_jump_has_large_discrepancy() {
        let calc = DiscrepancyCalculator::default();
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let m1 = msg_at(0.0, 0.0, 10.0, 90.0, t0);
        let m2 = msg_at(140.0, 30.0, 10.0, 90.0, t0 + 1.0 * Unit::Hour);
        let d = calc.discrepancy(&m1, &m2, 1.0).unwrap();
        assert!(d > 1000.0);
    }

    #[test]
    fn hours_between_is_signed() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let t1 = t0 + 2.0 * Unit::Hour;
        assert!((hours_between(t0, t1) - 2.0).abs() < 1e-9);
        assert!((hours_between(t1, t0) - (-2.0)).abs() < 1e-9);
    }
}
