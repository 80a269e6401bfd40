//! Segmentation engine errors.
use thiserror::Error;

/// Fatal, stream-ending errors.
///
/// Everything else the engine encounters (a malformed position, a duplicate,
/// a mismatched SSVID) is recoverable: it is reported as a
/// [`crate::segment::SegmentVariant::Bad`] segment or a log line instead of
/// an [`InputError`], per the propagation policy.
///
/// The distilled design also calls out "missing `type`" and "missing
/// `timestamp`" as fail-fast conditions; here those are enforced at compile
/// time instead, since [`crate::message::Message::msg_type`] and
/// [`crate::message::Message::timestamp`] are required fields rather than
/// optional ones. A host parsing a raw wire format that might omit them
/// should catch that while building a `Message`, before calling into this
/// crate — that parsing step is explicitly out of scope (see `SPEC_FULL.md`).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("input data is unsorted: timestamp {got} is before previous timestamp {previous}")]
    OutOfOrder {
        previous: hifitime::Epoch,
        got: hifitime::Epoch,
    },
}

pub type Result<T> = std::result::Result<T, InputError>;
