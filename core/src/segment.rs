//! Segment data model: the append-only message list the matcher scores
//! against, the resumable snapshot that survives across runs, and the
//! finished-segment shape handed back to the host.
use std::rc::Rc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::identity::IdentitySummary;
use crate::message::Message;

/// A message owned by a [`Segment`], plus the two fields the matcher itself
/// mutates. Per the "mutable in-band flags" redesign note, these never touch
/// the host-provided [`Message`] — they live in this wrapper instead.
#[derive(Debug, Clone)]
pub(crate) struct StoredMessage {
    pub message: Message,
    pub drop: bool,
    pub metric: Option<f64>,
}

/// A resumable snapshot of a segment's extremities, sufficient to seed
/// lookback matching in a later run without retaining the full message list.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SegmentState {
    pub id: String,
    pub ssvid: String,
    pub first_msg: Message,
    pub last_msg: Message,
    pub msg_count: usize,
    pub closed: bool,
}

/// One lookback candidate: either a live message still owned by the segment
/// (droppable, at `index`) or a synthetic tail entry reconstructed from a
/// [`SegmentState`] carried across a resume boundary (never droppable).
pub(crate) struct LookbackCandidate<'a> {
    pub message: &'a Message,
    /// The metric stored on this candidate, used as the "existing metric"
    /// a deeper lookback candidate must beat to steal this one's place.
    pub existing_metric: f64,
    pub index: Option<usize>,
}

/// An open, append-only sequence of messages attributed to one vessel.
pub(crate) struct Segment {
    pub id: String,
    pub ssvid: String,
    msgs: Vec<StoredMessage>,
    prev_state: Option<Rc<SegmentState>>,
}

impl Segment {
    pub fn new(id: String, ssvid: String) -> Self {
        Self {
            id,
            ssvid,
            msgs: Vec::new(),
            prev_state: None,
        }
    }

    pub fn from_state(state: SegmentState) -> Self {
        Self {
            id: state.id.clone(),
            ssvid: state.ssvid.clone(),
            msgs: Vec::new(),
            prev_state: Some(Rc::new(state)),
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.msgs.push(StoredMessage {
            message,
            drop: false,
            metric: None,
        });
    }

    pub fn mark_drop(&mut self, index: usize) {
        self.msgs[index].drop = true;
    }

    /// Record the metric that won the most recently appended message its place.
    pub fn set_last_metric(&mut self, metric: f64) {
        if let Some(last) = self.msgs.last_mut() {
            last.metric = Some(metric);
        }
    }

    pub fn msg_count(&self) -> usize {
        self.msgs.len() + self.prev_state.as_ref().map_or(0, |s| s.msg_count)
    }

    /// Count of messages this run has itself appended (excludes any count
    /// carried over via `prev_state`). Used only to bound how deep lookback
    /// is allowed to peek into the synthetic `prev_state` tail.
    pub fn live_len(&self) -> usize {
        self.msgs.len()
    }

    pub fn first_msg(&self) -> Option<&Message> {
        if let Some(state) = &self.prev_state {
            return Some(&state.first_msg);
        }
        self.msgs.first().map(|m| &m.message)
    }

    pub fn last_msg(&self) -> Option<&Message> {
        if let Some(m) = self.msgs.last() {
            return Some(&m.message);
        }
        self.prev_state.as_ref().map(|s| &s.last_msg)
    }

    /// Walk the tail backwards, most recent first: every one of the
    /// segment's own live messages (`None` where `drop` is set), then the
    /// synthetic `(last_msg, first_msg)` pair of a carried-over
    /// [`SegmentState`] once the live messages are exhausted.
    ///
    /// Unlike [`Segment::lookback_candidates`], dropped live messages are
    /// still yielded (as `None`) rather than skipped outright, so a caller
    /// counting raw messages consumed (independent of the drop filter) can
    /// keep its budget in step with [`Segment::live_len`] — this is what
    /// bounds lookback to reaching exactly one message into the
    /// `prev_state` tail, regardless of how many live messages were dropped.
    pub fn lookback_entries(&self) -> impl Iterator<Item = Option<LookbackCandidate<'_>>> {
        let live = self.msgs.iter().enumerate().rev().map(|(i, m)| {
            if m.drop {
                None
            } else {
                Some(LookbackCandidate {
                    message: &m.message,
                    existing_metric: m.metric.unwrap_or(0.0),
                    index: Some(i),
                })
            }
        });
        let tail = self.prev_state.as_deref().into_iter().flat_map(|s| {
            [
                Some(LookbackCandidate {
                    message: &s.last_msg,
                    existing_metric: 0.0,
                    index: None,
                }),
                Some(LookbackCandidate {
                    message: &s.first_msg,
                    existing_metric: 0.0,
                    index: None,
                }),
            ]
        });
        live.chain(tail)
    }

    /// Same walk as [`Segment::lookback_entries`], but with dropped live
    /// messages filtered out rather than surfaced as `None`.
    pub fn lookback_candidates(&self) -> impl Iterator<Item = LookbackCandidate<'_>> {
        self.lookback_entries().flatten()
    }

    pub fn state(&self) -> Option<SegmentState> {
        Some(SegmentState {
            id: self.id.clone(),
            ssvid: self.ssvid.clone(),
            first_msg: self.first_msg()?.clone(),
            last_msg: self.last_msg()?.clone(),
            msg_count: self.msg_count(),
            closed: false,
        })
    }

    /// Consume the segment, handing back its identity plus the prior-run
    /// snapshot (if any) and the live messages to clean.
    pub fn into_parts(self) -> (String, String, Vec<StoredMessage>, Option<SegmentState>) {
        let prev_state = self.prev_state.map(|rc| (*rc).clone());
        (self.id, self.ssvid, self.msgs, prev_state)
    }
}

/// The tag a finished segment is emitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentVariant {
    Open,
    Closed,
    Bad,
    Info,
    Discarded,
    AmbiguousClosed,
}

/// A message as handed back to the host: the original [`Message`] plus
/// whatever identity/destination information the cache could associate with
/// its minute. Empty for message classes that never go through cleaning
/// (`Bad`, `Info` — an info message is the annotation *source*, not itself
/// annotated).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnnotatedMessage {
    pub message: Message,
    pub identities: Vec<(IdentitySummary, u32)>,
    pub destinations: Vec<(Option<String>, u32)>,
}

/// A finished segment, as produced by the [`crate::Segmenter`] iterator.
pub struct OutputSegment {
    pub id: String,
    pub ssvid: String,
    pub variant: SegmentVariant,
    messages: Vec<AnnotatedMessage>,
    prev_state: Option<SegmentState>,
}

impl OutputSegment {
    pub(crate) fn new(
        id: String,
        ssvid: String,
        variant: SegmentVariant,
        messages: Vec<AnnotatedMessage>,
        prev_state: Option<SegmentState>,
    ) -> Self {
        Self {
            id,
            ssvid,
            variant,
            messages,
            prev_state,
        }
    }

    pub(crate) fn singleton(id: String, ssvid: String, variant: SegmentVariant, message: AnnotatedMessage) -> Self {
        Self::new(id, ssvid, variant, vec![message], None)
    }

    pub fn first_msg(&self) -> Option<&Message> {
        if let Some(state) = &self.prev_state {
            return Some(&state.first_msg);
        }
        self.messages.first().map(|m| &m.message)
    }

    pub fn last_msg(&self) -> Option<&Message> {
        if let Some(m) = self.messages.last() {
            return Some(&m.message);
        }
        self.prev_state.as_ref().map(|s| &s.last_msg)
    }

    pub fn msg_count(&self) -> usize {
        self.messages.len() + self.prev_state.as_ref().map_or(0, |s| s.msg_count)
    }

    pub fn messages(&self) -> &[AnnotatedMessage] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<AnnotatedMessage> {
        self.messages
    }
}
