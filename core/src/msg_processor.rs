//! Validates and classifies the raw message stream: ordering and duplicate
//! checks, SSVID gating, message classification, and identity-cache upkeep.
//! Grounded on `gpsdio_segment/msg_processor.py`'s `MsgProcessor`.
use std::collections::HashMap;

use hifitime::Epoch;

use crate::errors::InputError;
use crate::identity::{IdentityCache, IdentitySummary};
use crate::message::{Message, MessageClass};

/// A location rounded to fixed-point units, used to dedup jitter the way the
/// original implementation's `extract_normalized_location` does: lat/lon to
/// 1/60000th of a degree, course to a tenth of a degree, speed to a tenth of
/// a knot, heading to the nearest degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct NormalizedLocation {
    lat: i64,
    lon: i64,
    course: Option<i64>,
    speed: i64,
    heading: Option<i64>,
}

impl NormalizedLocation {
    fn from_msg(msg: &Message) -> Self {
        Self {
            lat: (msg.lat.unwrap_or(0.0) * 60000.0).round() as i64,
            lon: (msg.lon.unwrap_or(0.0) * 60000.0).round() as i64,
            course: non_null(msg.course).map(|c| (c * 10.0).round() as i64),
            speed: (msg.speed.unwrap_or(0.0) * 10.0).round() as i64,
            heading: non_null(msg.heading).map(|h| h.round() as i64),
        }
    }
}

fn non_null(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan())
}

/// `None`, or `NaN`: the original implementation's `is_null` treats both as
/// "not really there".
fn is_null(v: Option<f64>) -> bool {
    v.map_or(true, f64::is_nan)
}

/// Classify a message the way `_message_type` does: `InfoOnly` if none of the
/// four kinematic fields are present, `Position` if lon/lat/speed are present
/// and a missing course is tolerated only below `very_slow` knots, `Bad`
/// otherwise.
pub(crate) fn classify(msg: &Message, very_slow: f64) -> MessageClass {
    let (x, y, course, speed) = (msg.lon, msg.lat, msg.course, msg.speed);
    if is_null(x) && is_null(y) && is_null(course) && is_null(speed) {
        return MessageClass::InfoOnly;
    }
    let course_missing = is_null(course);
    if !is_null(x) && !is_null(y) && !is_null(speed) && !(speed.unwrap() > very_slow && course_missing) {
        MessageClass::Position
    } else {
        MessageClass::Bad
    }
}

/// The outcome of [`MsgProcessor::admit`].
pub(crate) enum Admitted {
    Ok(Message),
    /// A duplicate `msgid` or a non-matching `ssvid`; drop and move on.
    Skip,
}

/// Stateful gate in front of the segmenter: checks ordering, dedups, latches
/// the SSVID, classifies, and feeds/serves the identity cache.
pub(crate) struct MsgProcessor {
    very_slow: f64,
    ssvid: Option<String>,
    cur_msgids: HashMap<String, Epoch>,
    cur_locations: HashMap<NormalizedLocation, Epoch>,
    prev_timestamp: Option<Epoch>,
    identity_cache: IdentityCache,
}

impl MsgProcessor {
    pub fn new(very_slow: f64, ssvid: Option<String>) -> Self {
        Self {
            very_slow,
            ssvid,
            cur_msgids: HashMap::new(),
            cur_locations: HashMap::new(),
            prev_timestamp: None,
            identity_cache: IdentityCache::new(),
        }
    }

    pub fn ssvid(&self) -> Option<&str> {
        self.ssvid.as_deref()
    }

    /// Pre-bind the SSVID, e.g. when resuming from carried-over segment state.
    pub fn bind_ssvid(&mut self, ssvid: String) {
        self.ssvid = Some(ssvid);
    }

    pub fn observe_timestamp(&mut self, timestamp: Epoch) {
        self.prev_timestamp = Some(match self.prev_timestamp {
            Some(prev) if prev > timestamp => prev,
            _ => timestamp,
        });
    }

    /// Check ordering, dedup by `msgid`, and gate on `ssvid`. Ordering is
    /// checked before the duplicate check so a truly out-of-order stream
    /// fails fast even if the out-of-order message happens to be a duplicate.
    pub fn admit(&mut self, msg: Message) -> Result<Admitted, InputError> {
        if let Some(previous) = self.prev_timestamp {
            if msg.timestamp < previous {
                return Err(InputError::OutOfOrder {
                    previous,
                    got: msg.timestamp,
                });
            }
        }
        self.prev_timestamp = Some(msg.timestamp);

        if self.cur_msgids.contains_key(&msg.msgid) {
            log::debug!("skipping duplicate msgid {}", msg.msgid);
            return Ok(Admitted::Skip);
        }
        self.cur_msgids.insert(msg.msgid.clone(), msg.timestamp);

        match &self.ssvid {
            None => self.ssvid = Some(msg.ssvid.clone()),
            Some(expected) if *expected != msg.ssvid => {
                log::warn!("skipping non-matching ssvid {:?}, expected {:?}", msg.ssvid, expected);
                return Ok(Admitted::Skip);
            }
            _ => {}
        }

        Ok(Admitted::Ok(msg))
    }

    /// Classify an admitted message, storing it in the identity cache unless
    /// it's `Bad`. Returns `None` for a position message whose rounded
    /// location duplicates one already seen at non-zero speed.
    pub fn classify(&mut self, msg: Message) -> Option<(MessageClass, Message)> {
        let class = classify(&msg, self.very_slow);
        if class != MessageClass::Bad {
            self.identity_cache.store(&msg);
        }
        if class == MessageClass::Position {
            let loc = NormalizedLocation::from_msg(&msg);
            let already_seen = msg.speed.unwrap_or(0.0) > 0.0 && self.cur_locations.contains_key(&loc);
            if already_seen {
                log::debug!("skipping already seen location for msgid {}", msg.msgid);
                return None;
            }
            self.cur_locations.insert(loc, msg.timestamp);
        }
        Some((class, msg))
    }

    pub fn annotate(&self, msg: &Message) -> (Vec<(IdentitySummary, u32)>, Vec<(Option<String>, u32)>) {
        self.identity_cache.annotate(msg)
    }

    /// Drop bookkeeping older than `before`.
    pub fn prune(&mut self, before: Epoch) {
        self.cur_locations.retain(|_, t| *t >= before);
        self.cur_msgids.retain(|_, t| *t >= before);
        self.identity_cache.prune(before);
    }
}
