//! The streaming coordinator: classifies each incoming message, matches
//! positions against open segments, and emits finished segments lazily.
//! Grounded on `gpsdio_segment/segmenter.py`'s `Segmenter`.
use std::collections::{BTreeMap, HashSet, VecDeque};

use hifitime::Epoch;

use crate::config::Config;
use crate::discrepancy::{duration_hours, msg_delta_hours};
use crate::errors::InputError;
use crate::matcher::{MatchOutcome, Matcher, SegmentMatch};
use crate::message::{Message, MessageClass};
use crate::msg_processor::{Admitted, MsgProcessor};
use crate::segment::{AnnotatedMessage, OutputSegment, Segment, SegmentState, SegmentVariant};

/// Groups a stream of position/identity messages for one vessel into
/// related segments, based on plausible speed and distance between points.
///
/// `Segmenter` is itself a [`std::iter::Iterator`] over finished segments: it
/// pulls from `instream` only as far as it needs to in order to produce the
/// next one, so a caller can process an unbounded stream without buffering it.
pub struct Segmenter<I> {
    instream: I,
    max_hours: f64,
    max_open_segments: usize,
    matcher: Matcher,
    msg_processor: MsgProcessor,
    segments: BTreeMap<String, Segment>,
    used_ids: HashSet<String>,
    pending: VecDeque<OutputSegment>,
    input_exhausted: bool,
    /// Set once `pump` reports a fatal [`InputError`]. Per §7, a structural
    /// error makes the stream unrecoverable: no further segments are
    /// produced, not even the open segments still sitting in `segments`.
    errored: bool,
}

impl<I: Iterator<Item = Message>> Segmenter<I> {
    /// Start fresh, with no segments carried over from a previous run.
    pub fn new(instream: I, config: Config) -> Self {
        Self::with_segments(instream, config, BTreeMap::new())
    }

    /// Resume from a previous run's [`SegmentState`] snapshots. States marked
    /// `closed` are dropped; everything else seeds an open segment that
    /// lookback matching can still reach into.
    pub fn from_states(instream: I, config: Config, states: impl IntoIterator<Item = SegmentState>) -> Self {
        let mut segments = BTreeMap::new();
        let mut latest_last: Option<Epoch> = None;
        for state in states {
            if state.closed {
                continue;
            }
            let seg = Segment::from_state(state);
            if let Some(last) = seg.last_msg() {
                latest_last = Some(latest_last.map_or(last.timestamp, |t| t.max(last.timestamp)));
            }
            segments.insert(seg.id.clone(), seg);
        }
        let mut this = Self::with_segments(instream, config, segments);
        if let Some(t) = latest_last {
            this.msg_processor.observe_timestamp(t);
        }
        this
    }

    fn with_segments(instream: I, config: Config, segments: BTreeMap<String, Segment>) -> Self {
        let used_ids = segments.keys().cloned().collect();
        let matcher = Matcher::new(&config);
        let msg_processor = MsgProcessor::new(config.very_slow, config.ssvid.clone());
        Self {
            instream,
            max_hours: config.max_hours,
            max_open_segments: config.max_open_segments,
            matcher,
            msg_processor,
            segments,
            used_ids,
            pending: VecDeque::new(),
            input_exhausted: false,
            errored: false,
        }
    }

    /// The SSVID this run is processing, once latched (either pre-bound via
    /// [`Config::ssvid`] or taken from the first admitted message).
    pub fn ssvid(&self) -> Option<&str> {
        self.msg_processor.ssvid()
    }

    /// Snapshot every currently open segment as a [`SegmentState`], without
    /// disturbing them. A host that stops consuming this iterator mid-stream
    /// (to shut down, or to split a run at a timestamp boundary) should call
    /// this first and persist the result — segments still open at that point
    /// are otherwise discarded, never emitted, once the iterator is dropped.
    pub fn open_states(&self) -> Vec<SegmentState> {
        self.segments.values().filter_map(Segment::state).collect()
    }

    /// A unique id for a new segment: SSVID, timestamp, and a disambiguating
    /// index for the rare case two messages share a timestamp.
    fn segment_unique_id(&mut self, msg: &Message) -> String {
        let (year, month, day, hour, minute, second, nanos) = msg.timestamp.to_gregorian_utc();
        let mut index = 1u64;
        loop {
            let id = format!(
                "{}-{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{:06}Z-{index}",
                msg.ssvid,
                nanos / 1_000
            );
            if self.used_ids.insert(id.clone()) {
                return id;
            }
            index += 1;
        }
    }

    fn create_segment(&mut self, msg: Message) -> Segment {
        let id = self.segment_unique_id(&msg);
        let ssvid = msg.ssvid.clone();
        let mut seg = Segment::new(id, ssvid);
        seg.add_message(msg);
        seg
    }

    /// Build a single-message [`OutputSegment`] under `variant` without
    /// registering it as an open segment. `Bad`/`Info` messages never went
    /// through identity annotation upstream (that cache is only ever
    /// consulted for messages that survive to be cleaned), so they're left
    /// unannotated here too.
    fn singleton_output(&mut self, msg: Message, variant: SegmentVariant) -> OutputSegment {
        let id = self.segment_unique_id(&msg);
        let ssvid = msg.ssvid.clone();
        let (identities, destinations) = match variant {
            SegmentVariant::Bad | SegmentVariant::Info => (Vec::new(), Vec::new()),
            _ => self.msg_processor.annotate(&msg),
        };
        let annotated = AnnotatedMessage {
            message: msg,
            identities,
            destinations,
        };
        OutputSegment::singleton(id, ssvid, variant, annotated)
    }

    /// Clean a finished segment (annotate every message, split off any
    /// dropped ones as their own `Discarded` singletons) and queue it for
    /// emission under `variant`.
    fn clean_segment(&mut self, segment: Segment, variant: SegmentVariant) {
        let (id, ssvid, msgs, prev_state) = segment.into_parts();
        let mut cleaned = Vec::with_capacity(msgs.len());
        for stored in msgs {
            let (identities, destinations) = self.msg_processor.annotate(&stored.message);
            let annotated = AnnotatedMessage {
                message: stored.message,
                identities,
                destinations,
            };
            if stored.drop {
                log::debug!(
                    "dropping message from ssvid {:?} timestamp {:?}",
                    annotated.message.ssvid,
                    annotated.message.timestamp
                );
                let discard_id = self.segment_unique_id(&annotated.message);
                self.pending.push_back(OutputSegment::singleton(
                    discard_id,
                    ssvid.clone(),
                    SegmentVariant::Discarded,
                    annotated,
                ));
            } else {
                cleaned.push(annotated);
            }
        }
        log::debug!("yielding cleaned segment {id} with {} messages", cleaned.len());
        self.pending.push_back(OutputSegment::new(id, ssvid, variant, cleaned, prev_state));
    }

    /// Close out the oldest open segment(s) once `max_open_segments` is reached.
    fn remove_excess_segments(&mut self) {
        while self.segments.len() >= self.max_open_segments {
            let stalest = self
                .segments
                .values()
                .min_by(|a, b| stalest_sort_key(a).partial_cmp(&stalest_sort_key(b)).unwrap_or(std::cmp::Ordering::Equal))
                .map(|s| s.id.clone());
            let Some(id) = stalest else { break };
            log::info!("removing stale segment {id}");
            if let Some(seg) = self.segments.remove(&id) {
                self.clean_segment(seg, SegmentVariant::Closed);
            }
        }
    }

    fn add_segment(&mut self, msg: Message, why: &str) {
        log::info!("adding new segment because {why}");
        self.remove_excess_segments();
        let seg = self.create_segment(msg);
        self.segments.insert(seg.id.clone(), seg);
    }

    /// Close any segment whose last message is more than `max_hours` away
    /// from `msg`'s timestamp — it can no longer plausibly be matched.
    fn finalize_old_segments(&mut self, msg: &Message) {
        let stale: Vec<String> = self
            .segments
            .values()
            .filter(|seg| seg.last_msg().is_some_and(|last| msg_delta_hours(last, msg) > self.max_hours))
            .map(|seg| seg.id.clone())
            .collect();
        for id in stale {
            if let Some(seg) = self.segments.remove(&id) {
                self.clean_segment(seg, SegmentVariant::Closed);
            }
        }
    }

    fn apply_match(&mut self, msg: Message, best: SegmentMatch) {
        let SegmentMatch {
            segment_id,
            metric,
            msgs_to_drop,
            ..
        } = best;
        if let Some(seg) = self.segments.get_mut(&segment_id) {
            for index in msgs_to_drop {
                seg.mark_drop(index);
            }
            seg.add_message(msg);
            if let Some(metric) = metric {
                seg.set_last_metric(metric);
            }
        }
    }

    /// The matcher found more than one equally good segment: close every one
    /// of them (as `AmbiguousClosed`, per the redesign that keeps this case
    /// distinguishable from an ordinary timeout close) and start a fresh
    /// segment for `msg` instead of guessing.
    fn process_ambiguous_match(&mut self, msg: Message, matches: Vec<SegmentMatch>) {
        let count = matches.len();
        for m in matches {
            if let Some(seg) = self.segments.remove(&m.segment_id) {
                self.clean_segment(seg, SegmentVariant::AmbiguousClosed);
            }
        }
        self.add_segment(msg, &format!("of ambiguity with {count} segments"));
    }

    fn process_position_msg(&mut self, msg: Message) {
        let timestamp = msg.timestamp;
        if self.segments.is_empty() {
            self.add_segment(msg, "there are no current segments");
        } else {
            self.finalize_old_segments(&msg);
            match self.matcher.compute_best_match(&msg, &self.segments) {
                MatchOutcome::NoMatch => self.add_segment(msg, "no match"),
                MatchOutcome::Noise => {
                    let out = self.singleton_output(msg, SegmentVariant::Bad);
                    self.pending.push_back(out);
                }
                MatchOutcome::Single(best) => self.apply_match(msg, best),
                MatchOutcome::Ambiguous(matches) => self.process_ambiguous_match(msg, matches),
            }
        }
        // Anything stored in the identity cache (or the msgid/location dedup
        // sets) older than `max_hours` before the latest seen timestamp can
        // never again be referenced by a future match, by the matcher's own
        // time gate — safe to drop now, bounding memory on long-running streams.
        self.msg_processor.prune(timestamp - duration_hours(self.max_hours));
    }

    fn process_bad_msg(&mut self, msg: Message) {
        log::debug!(
            "rejected bad message from ssvid {:?} lat {:?} lon {:?} timestamp {:?} course {:?} speed {:?}",
            msg.ssvid,
            msg.lat,
            msg.lon,
            msg.timestamp,
            msg.course,
            msg.speed
        );
        let out = self.singleton_output(msg, SegmentVariant::Bad);
        self.pending.push_back(out);
    }

    fn process_info_only_msg(&mut self, msg: Message) {
        log::debug!("skipping info-only message from ssvid {:?}", msg.ssvid);
        let out = self.singleton_output(msg, SegmentVariant::Info);
        self.pending.push_back(out);
    }

    /// Pull and admit one raw message, advancing internal state, without
    /// necessarily producing output. Returns `Ok(false)` once `instream` is
    /// exhausted.
    fn pump(&mut self) -> Result<bool, InputError> {
        let Some(msg) = self.instream.next() else {
            return Ok(false);
        };
        let admitted = match self.msg_processor.admit(msg)? {
            Admitted::Ok(msg) => msg,
            Admitted::Skip => return Ok(true),
        };
        let Some((class, msg)) = self.msg_processor.classify(admitted) else {
            return Ok(true);
        };
        match class {
            MessageClass::Bad => self.process_bad_msg(msg),
            MessageClass::InfoOnly => self.process_info_only_msg(msg),
            MessageClass::Position => self.process_position_msg(msg),
        }
        Ok(true)
    }
}

/// `(timestamp, msgid, course, speed)` of a segment's last message: the key
/// used to pick which open segment is stalest when `max_open_segments` forces
/// an eviction.
fn stalest_sort_key(seg: &Segment) -> (Epoch, String, f64, f64) {
    let last = seg.last_msg().expect("a segment always holds at least one message");
    (last.timestamp, last.msgid.clone(), last.course.unwrap_or(0.0), last.speed.unwrap_or(0.0))
}

impl<I: Iterator<Item = Message>> Iterator for Segmenter<I> {
    type Item = Result<OutputSegment, InputError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.errored {
            return None;
        }
        loop {
            if let Some(out) = self.pending.pop_front() {
                return Some(Ok(out));
            }
            if self.input_exhausted {
                let next_id = self.segments.keys().next().cloned()?;
                let seg = self.segments.remove(&next_id).expect("key just read from the map");
                self.clean_segment(seg, SegmentVariant::Closed);
                continue;
            }
            match self.pump() {
                Ok(true) => continue,
                Ok(false) => self.input_exhausted = true,
                Err(e) => {
                    self.errored = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
