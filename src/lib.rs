//! TMFRAME: a compact self-describing framing format for time-stamped
//! events, and stream-processing primitives built on it.
//!
//! A TMFRAME stream is nothing but a concatenation of frames; there are
//! no container records, magic numbers, or length prefixes outside of
//! the frames themselves. Each frame leads with a little-endian 64-bit
//! primary word combining a nanosecond Unix timestamp (truncated to a
//! multiple of 8) with a 3-bit payload-type indicator:
//!
//! ```text
//! +---------------- 8B ----------------+-- 0, 8, or 16B --+-- variable --+
//! |  tm (low 3 bits: PTI)              |  value word(s)   |  UDE payload |
//! +------------------------------------+------------------+--------------+
//! ```
//!
//! See the [`frame`] module for the exact per-variant layout.
//!
//! On top of the codec sit a size-peeking [`reader`], a buffered
//! [`writer`] with a k-way time-sorted merge, sliding-window [`dedup`],
//! tie-aware timestamp search over a [`series`], and a circular frame
//! [`ring`].
//!
//! # Example
//!
//! ```
//! use tmframe::frame::{Frame, EV_UTF8};
//!
//! // 2016-02-16T00:00:00Z, a UTF-8 payload frame
//! let frame = Frame::new(1_455_580_800_000_000_000, EV_UTF8, 0.0, 0, b"fake msg")?;
//! let bytes = frame.encode();
//! assert_eq!(bytes.len(), 16 + 8 + 1); // header, payload, trailing NUL
//!
//! let (decoded, rest) = Frame::decode(&bytes)?;
//! assert!(rest.is_empty());
//! assert_eq!(decoded, frame);
//! assert_eq!(decoded.data(), b"fake msg");
//! # Ok::<(), tmframe::frame::FrameError>(())
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(
    future_incompatible,
    nonstandard_style,
    rust_2018_idioms,
    missing_copy_implementations,
    missing_debug_implementations
)]
#![warn(
    unused,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    variant_size_differences
)]

mod error;
mod merge;

pub mod dedup;
pub mod frame;
pub mod reader;
pub mod ring;
pub mod series;
pub mod writer;

pub use self::error::{Error, Result};
