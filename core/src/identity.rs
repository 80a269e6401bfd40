//! Time-windowed identity cache: associates identity/destination fields
//! carried by info (or info-bearing position) messages with nearby position
//! messages of a compatible transponder class.
use std::collections::HashMap;

use hifitime::{Epoch, Unit};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::message::{info_transponder_class, transponder_classes, Message, TransponderClass};

/// Info messages land on every minute within this many minutes of their own
/// minute-truncated timestamp; annotation then only has to look up the
/// position message's own minute.
const INFO_PING_INTERVAL_MINS: i64 = 15;

/// `f64` isn't `Hash`/`Eq`; stash length/width by bit pattern for multiset
/// keys and convert back to the public summary type on the way out.
fn bits(v: Option<f64>) -> Option<u64> {
    v.map(f64::to_bits)
}

fn unbits(v: Option<u64>) -> Option<f64> {
    v.map(f64::from_bits)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct IdentityKey {
    shipname: Option<String>,
    callsign: Option<String>,
    imo: Option<String>,
    transponder_type: Option<TransponderClass>,
    length: Option<u64>,
    width: Option<u64>,
}

impl IdentityKey {
    fn from_msg(msg: &Message, transponder_type: Option<TransponderClass>) -> Self {
        Self {
            shipname: msg.shipname.clone(),
            callsign: msg.callsign.clone(),
            imo: msg.imo.clone(),
            transponder_type,
            length: bits(msg.length),
            width: bits(msg.width),
        }
    }

    fn into_summary(self) -> IdentitySummary {
        IdentitySummary {
            shipname: self.shipname,
            callsign: self.callsign,
            imo: self.imo,
            transponder_type: self.transponder_type,
            length: unbits(self.length),
            width: unbits(self.width),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DestinationKey(Option<String>);

/// `(transponder type, receiver type, source)`: the narrower key identity
/// buckets are additionally indexed by, so e.g. a VMS identity ping never
/// bleeds into an AIS position's annotation.
type MatchKey = (TransponderClass, Option<String>, Option<String>);

/// The identity fields observed near a position message, with counts (a
/// position may fall within the ping interval of more than one info message,
/// or of conflicting ones — the host decides how to pick among them).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdentitySummary {
    pub shipname: Option<String>,
    pub callsign: Option<String>,
    pub imo: Option<String>,
    pub transponder_type: Option<TransponderClass>,
    pub length: Option<f64>,
    pub width: Option<f64>,
}

#[derive(Debug, Default)]
pub(crate) struct IdentityCache {
    identities: HashMap<(Epoch, MatchKey), HashMap<IdentityKey, u32>>,
    destinations: HashMap<(Epoch, MatchKey), HashMap<DestinationKey, u32>>,
}

impl IdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `msg`'s identity/destination fields against every minute
    /// within `INFO_PING_INTERVAL_MINS` of its own minute-truncated timestamp.
    /// No-op for messages whose `type` isn't a recognized identity-bearing tag.
    pub fn store(&mut self, msg: &Message) {
        let Some(transponder_type) = info_transponder_class(&msg.msg_type) else {
            return;
        };
        let match_key = (transponder_type, msg.receiver_type.clone(), msg.source.clone());
        let identity = IdentityKey::from_msg(msg, Some(transponder_type));
        let destination = DestinationKey(msg.destination.clone());
        let rounded = msg.timestamp.round(1 * Unit::Minute);

        for offset in -INFO_PING_INTERVAL_MINS..=INFO_PING_INTERVAL_MINS {
            let time_key = rounded + (offset as f64) * Unit::Minute;
            *self
                .identities
                .entry((time_key, match_key.clone()))
                .or_default()
                .entry(identity.clone())
                .or_insert(0) += 1;
            *self
                .destinations
                .entry((time_key, match_key.clone()))
                .or_default()
                .entry(destination.clone())
                .or_insert(0) += 1;
        }
    }

    /// Accumulate identity/destination counts for `msg`'s own minute across
    /// every transponder class `msg.type` is compatible with.
    pub fn annotate(&self, msg: &Message) -> (Vec<(IdentitySummary, u32)>, Vec<(Option<String>, u32)>) {
        let rounded = msg.timestamp.round(1 * Unit::Minute);
        let mut idents: HashMap<IdentityKey, u32> = HashMap::new();
        let mut dests: HashMap<DestinationKey, u32> = HashMap::new();

        for transponder_type in transponder_classes(&msg.msg_type) {
            let match_key = (transponder_type, msg.receiver_type.clone(), msg.source.clone());
            if let Some(bucket) = self.identities.get(&(rounded, match_key.clone())) {
                for (k, v) in bucket {
                    *idents.entry(k.clone()).or_insert(0) += v;
                }
            }
            if let Some(bucket) = self.destinations.get(&(rounded, match_key)) {
                for (k, v) in bucket {
                    *dests.entry(k.clone()).or_insert(0) += v;
                }
            }
        }

        (
            idents.into_iter().map(|(k, v)| (k.into_summary(), v)).collect(),
            dests.into_iter().map(|(k, v)| (k.0, v)).collect(),
        )
    }

    /// Drop every bucket whose minute is older than `before`.
    pub fn prune(&mut self, before: Epoch) {
        self.identities.retain(|(t, _), _| *t >= before);
        self.destinations.retain(|(t, _), _| *t >= before);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::Epoch;

    fn info_msg(t: Epoch, shipname: &str) -> Message {
        Message {
            msgid: "i1".into(),
            ssvid: "1".into(),
            timestamp: t,
            msg_type: "AIS.5".into(),
            lon: None,
            lat: None,
            course: None,
            speed: None,
            heading: None,
            shipname: Some(shipname.into()),
            callsign: None,
            imo: None,
            destination: None,
            length: None,
            width: None,
            receiver_type: None,
            source: None,
        }
    }

    fn position_msg(t: Epoch) -> Message {
        Message {
            msgid: "p1".into(),
            ssvid: "1".into(),
            timestamp: t,
            msg_type: "AIS.1".into(),
            lon: Some(0.0),
            lat: Some(0.0),
            course: Some(0.0),
            speed: Some(1.0),
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
    fn position_within_window_is_annotated() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let mut cache = IdentityCache::new();
        cache.store(&info_msg(t0, "SHIPX"));

        let (idents, _) = cache.annotate(&position_msg(t0 + 10.0 * Unit::Minute));
        assert_eq!(idents.len(), 1);
        assert_eq!(idents[0].0.shipname.as_deref(), Some("SHIPX"));
        assert_eq!(idents[0].1, 1);
    }

    #[test]
    fn position_outside_window_is_not_annotated() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let mut cache = IdentityCache::new();
        cache.store(&info_msg(t0, "SHIPX"));

        let (idents, _) = cache.annotate(&position_msg(t0 + 60.0 * Unit::Minute));
        assert!(idents.is_empty());
    }

    #[test]
    fn prune_drops_old_buckets() {
        let t0 = Epoch::from_gregorian_utc_at_midnight(2024, 1, 1);
        let mut cache = IdentityCache::new();
        cache.store(&info_msg(t0, "SHIPX"));
        cache.prune(t0 + 1.0 * Unit::Hour);

        let (idents, _) = cache.annotate(&position_msg(t0 + 10.0 * Unit::Minute));
        assert!(idents.is_empty());
    }
}
