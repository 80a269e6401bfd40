//! The input record shape and the derived classification used to route it.
use std::collections::HashSet;

use hifitime::Epoch;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

/// A single position or identity report for one SSVID.
///
/// Messages are immutable once read: the two fields the engine itself needs
/// to mutate during matching (the lookback `drop` marker and the winning
/// `metric`) live on [`crate::segment::StoredMessage`], not here, so that a
/// `Message` handed in by a host is never written back to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Message {
    pub msgid: String,
    pub ssvid: String,
    pub timestamp: Epoch,
    /// Message type tag, e.g. `AIS.1`, `AIS.5`, `VMS`.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub msg_type: String,
    pub lon: Option<f64>,
    pub lat: Option<f64>,
    /// Degrees, 0 = north, clockwise.
    pub course: Option<f64>,
    /// Knots.
    pub speed: Option<f64>,
    pub heading: Option<f64>,

    pub shipname: Option<String>,
    pub callsign: Option<String>,
    pub imo: Option<String>,
    pub destination: Option<String>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub receiver_type: Option<String>,
    pub source: Option<String>,
}

impl Message {
    /// `true` if `lat`/`lon`/`course`/`speed` are all unset: an info-only carrier.
    pub(crate) fn has_no_kinematics(&self) -> bool {
        self.lat.is_none() && self.lon.is_none() && self.course.is_none() && self.speed.is_none()
    }
}

/// Result of classifying a [`Message`], mirroring the sentinel objects
/// `POSITION_MESSAGE` / `INFO_ONLY_MESSAGE` / `BAD_MESSAGE` of the original
/// implementation as a tagged enum instead of dynamic-dispatch sentinels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MessageClass {
    Position,
    InfoOnly,
    Bad,
}

/// Transponder class derived from a message's `type` tag.
///
/// `AIS.27` reports from low-resolution long-range transponders and is
/// considered compatible with both `A` and `B` equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TransponderClass {
    A,
    B,
    Vms,
}

/// Maps a message `type` tag to the set of transponder classes it reports under.
pub fn transponder_classes(msg_type: &str) -> HashSet<TransponderClass> {
    use TransponderClass::*;
    match msg_type {
        "AIS.1" | "AIS.2" | "AIS.3" => [A].into_iter().collect(),
        "AIS.18" | "AIS.19" => [B].into_iter().collect(),
        "AIS.27" => [A, B].into_iter().collect(),
        "VMS" => [Vms].into_iter().collect(),
        _ => HashSet::new(),
    }
}

/// Maps a message `type` tag to the single transponder class used for
/// identity-cache bucketing of *info* messages (`AIS.5`, `AIS.19`, `AIS.24`, `VMS`).
///
/// Distinct from [`transponder_classes`]: `AIS.19` is both a class-B position
/// report and an identity-bearing report, and `AIS.24` (static data) carries
/// identity fields but never a position.
pub fn info_transponder_class(msg_type: &str) -> Option<TransponderClass> {
    use TransponderClass::*;
    match msg_type {
        "AIS.5" => Some(A),
        "AIS.19" | "AIS.24" => Some(B),
        "VMS" => Some(Vms),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transponder_classes_cover_known_types() {
        assert_eq!(
            transponder_classes("AIS.1"),
            [TransponderClass::A].into_iter().collect()
        );
        assert_eq!(
            transponder_classes("AIS.27"),
            [TransponderClass::A, TransponderClass::B]
                .into_iter()
                .collect()
        );
        assert!(transponder_classes("AIS.99").is_empty());
    }

    #[test]
    fn info_transponder_class_matches_known_tags() {
        assert_eq!(info_transponder_class("AIS.5"), Some(TransponderClass::A));
        assert_eq!(info_transponder_class("AIS.24"), Some(TransponderClass::B));
        assert_eq!(info_transponder_class("AIS.1"), None);
    }
}
