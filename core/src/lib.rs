#![doc = include_str!("../../README.md")]
#![cfg_attr(docrs, feature(doc_cfg))]

//! `trajseg` partitions a chronologically sorted stream of vessel position
//! and identity messages into segments: maximal contiguous subsequences
//! whose positions are kinematically consistent with a single vessel.
//!
//! ```
//! use trajseg::prelude::*;
//!
//! let messages: Vec<Message> = Vec::new();
//! let mut closed = 0;
//! for segment in Segmenter::new(messages.into_iter(), Config::default()) {
//!     let segment = segment.expect("well-formed input");
//!     if segment.variant == SegmentVariant::Closed {
//!         closed += 1;
//!     }
//! }
//! assert_eq!(closed, 0);
//! ```
//!
//! # Resuming across runs
//!
//! Calling [`Segmenter::open_states`] before dropping a `Segmenter` snapshots
//! every segment still open at that point; a later [`Segmenter`] seeded with
//! those states via [`Segmenter::from_states`] picks matching up where it
//! left off without retaining the full message history:
//!
//! ```
//! use trajseg::prelude::*;
//!
//! let messages: Vec<Message> = Vec::new();
//! let segmenter = Segmenter::new(messages.into_iter(), Config::default());
//! let states = segmenter.open_states();
//!
//! let rest: Vec<Message> = Vec::new();
//! let _resumed = Segmenter::from_states(rest.into_iter(), Config::default(), states);
//! ```

mod discrepancy;
mod matcher;
mod msg_processor;

pub mod config;
pub mod errors;
pub mod identity;
pub mod message;
pub mod segment;
pub mod segmenter;

pub use config::Config;
pub use errors::{InputError, Result};
pub use identity::IdentitySummary;
pub use message::{info_transponder_class, transponder_classes, Message, MessageClass, TransponderClass};
pub use segment::{AnnotatedMessage, OutputSegment, SegmentState, SegmentVariant};
pub use segmenter::Segmenter;

/// Re-exports the types most hosts need, plus the `hifitime` time types used
/// throughout the public API.
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::errors::{InputError, Result};
    pub use crate::identity::IdentitySummary;
    pub use crate::message::{Message, MessageClass, TransponderClass};
    pub use crate::segment::{AnnotatedMessage, OutputSegment, SegmentState, SegmentVariant};
    pub use crate::segmenter::Segmenter;
    pub use hifitime::prelude::{Duration, Epoch, TimeScale};
}
