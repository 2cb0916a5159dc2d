//! The TMFRAME frame value type and its exact bit-level codec.
//!
//! Every frame begins with a little-endian 64-bit *primary word*:
//! nanoseconds since the Unix epoch, truncated to a multiple of 8, with
//! the low three bits holding the payload-type indicator ([`Pti`]). The
//! PTI selects the rest of the layout:
//!
//! ```text
//! pti          total   word 0     word 1        word 2     tail
//! Zero             8   tm | 0     .             .          .
//! OneInt64        16   tm | 1     v1: i64       .          .
//! OneFloat64      16   tm | 2     v0: f64 bits  .          .
//! Two64           24   tm | 3     v0: f64 bits  v1: i64    .
//! Null             8   tm | 4     .             .          .
//! NA               8   tm | 5     .             .          .
//! NaN              8   tm | 6     .             .          .
//! UDE (empty)     16   tm | 7     ude word      .          .
//! UDE (len L)   16+L+1 tm | 7     ude word      data[..L]  0x00
//! ```
//!
//! For UDE frames the second word packs the event number (`evtnum`, a
//! signed 21-bit integer in the high bits, recovered with an arithmetic
//! right shift by 43) and `ucount` (low 43 bits), the on-wire payload
//! length. A non-empty payload always carries one trailing NUL byte on
//! the wire, so `ucount == data.len() + 1`; the NUL is never part of the
//! payload handed to or received from callers.

use std::{
    error,
    fmt::{self, Display, Formatter},
};

use byteorder::{ByteOrder, LE};

/// Mask keeping the `ucount` field of a UDE word.
pub const KEEP_LOW_43_BITS: u64 = 0x0000_07FF_FFFF_FFFF;

/// Smallest valid event number.
pub const EVTNUM_MIN: i32 = -1_048_576;

/// Largest valid event number.
pub const EVTNUM_MAX: i32 = 1_048_575;

/// Reserved event numbers 0..=7 mirror the [`Pti`] variants one-to-one.
pub const EV_ZERO: i32 = 0;
pub const EV_ONE_INT64: i32 = 1;
pub const EV_ONE_FLOAT64: i32 = 2;
pub const EV_TWO64: i32 = 3;
pub const EV_NULL: i32 = 4;
pub const EV_NA: i32 = 5;
pub const EV_NAN: i32 = 6;
pub const EV_UDE: i32 = 7;

/// A frame whose payload is a TMFRAME header block.
pub const EV_HEADER: i32 = 8;
/// A msgpack-encoded payload.
pub const EV_MSGPACK: i32 = 9;
/// A binc-encoded payload.
pub const EV_BINC: i32 = 10;
/// A capnproto-encoded payload.
pub const EV_CAPNP: i32 = 11;
/// A zygomys s-expression payload.
pub const EV_ZYGO: i32 = 12;
/// A UTF-8 text payload.
pub const EV_UTF8: i32 = 13;
/// A JSON payload.
pub const EV_JSON: i32 = 14;
/// A msgpack payload as archived from Kafka.
pub const EV_MSGP_KAFKA: i32 = 15;
/// A zebrapack-encoded payload.
pub const EV_ZEBRAPACK: i32 = 16;

/// The payload-type indicator, packed into the low 3 bits of the primary
/// word.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum Pti {
    /// An 8-byte frame with no payload.
    Zero = 0,
    /// A 16-byte frame carrying one `i64`.
    OneInt64 = 1,
    /// A 16-byte frame carrying one `f64`.
    OneFloat64 = 2,
    /// A 24-byte frame carrying one `f64` and one `i64`.
    Two64 = 3,
    /// An 8-byte frame denoting an explicit null.
    Null = 4,
    /// An 8-byte frame denoting "not available".
    Na = 5,
    /// An 8-byte frame denoting a not-a-number value.
    NaN = 6,
    /// A frame with a user-defined-encoding word and optional payload.
    Ude = 7,
}

impl Pti {
    /// Extracts the payload-type indicator from the low 3 bits of a
    /// primary word.
    pub fn from_low_bits(word: u64) -> Pti {
        match word & Primary::MASK_PTI {
            0 => Pti::Zero,
            1 => Pti::OneInt64,
            2 => Pti::OneFloat64,
            3 => Pti::Two64,
            4 => Pti::Null,
            5 => Pti::Na,
            6 => Pti::NaN,
            _ => Pti::Ude,
        }
    }
}

/// The primary word of a frame: timestamp plus payload-type indicator.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Default)]
struct Primary(u64);

impl Primary {
    /// A mask over the payload-type indicator bits.
    const MASK_PTI: u64 = 0b111;

    fn new(tm: i64, pti: Pti) -> Primary {
        Primary((tm as u64 & !Primary::MASK_PTI) | pti as u64)
    }

    fn from_raw(word: u64) -> Primary {
        Primary(word)
    }

    fn raw(self) -> u64 {
        self.0
    }

    fn tm(self) -> i64 {
        (self.0 & !Primary::MASK_PTI) as i64
    }

    fn pti(self) -> Pti {
        Pti::from_low_bits(self.0)
    }
}

/// The error type returned when a frame cannot be constructed or decoded.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum FrameError {
    /// The supplied bytes are too short to hold the announced frame.
    TooShort,
    /// The event number lies outside `[EVTNUM_MIN, EVTNUM_MAX]`.
    EvtnumOutOfRange(i32),
    /// Event numbers 0..=6 select fixed layouts that carry no payload.
    NoDataAllowed,
    /// The payload length does not fit the 43-bit `ucount` field.
    DataTooBig(usize),
}

impl Display for FrameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooShort => {
                f.write_str("data supplied is too short to represent a TMFRAME frame")
            }
            FrameError::EvtnumOutOfRange(ev) => {
                write!(f, "evtnum {} outside the signed 21-bit range", ev)
            }
            FrameError::NoDataAllowed => {
                f.write_str("payload data not allowed for evtnum 0..=6")
            }
            FrameError::DataTooBig(len) => {
                write!(f, "payload of {} bytes exceeds the ucount field", len)
            }
        }
    }
}

impl error::Error for FrameError {}

fn wire_len(pti: Pti, ucount: u64) -> usize {
    match pti {
        Pti::Zero | Pti::Null | Pti::Na | Pti::NaN => 8,
        Pti::OneInt64 | Pti::OneFloat64 => 16,
        Pti::Two64 => 24,
        Pti::Ude => 16 + ucount as usize,
    }
}

/// One TMFRAME frame, owning its payload.
///
/// Frames are created by the validating constructor [`Frame::new`] or by
/// decoding bytes; both paths uphold the wire invariants, which is why
/// encoding is infallible.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    prim: Primary,
    v0: f64,
    ude: u64,
    data: Vec<u8>,
}

impl Frame {
    /// Constructs a frame from a timestamp in nanoseconds since the Unix
    /// epoch, an event number, the two value slots, and a payload.
    ///
    /// Event numbers 0..=6 select the fixed layouts and reject payload
    /// data; evtnum 7, negative values, and values >= 8 produce UDE
    /// frames. The low 3 bits of `tm` are discarded; they belong to the
    /// payload-type indicator on the wire.
    pub fn new(tm: i64, evtnum: i32, v0: f64, v1: i64, data: &[u8]) -> Result<Frame, FrameError> {
        if evtnum < EVTNUM_MIN || evtnum > EVTNUM_MAX {
            return Err(FrameError::EvtnumOutOfRange(evtnum));
        }
        if (0..=6).contains(&evtnum) {
            if !data.is_empty() {
                return Err(FrameError::NoDataAllowed);
            }
            let pti = Pti::from_low_bits(evtnum as u64);
            let frame = match pti {
                Pti::OneInt64 => Frame {
                    prim: Primary::new(tm, pti),
                    ude: v1 as u64,
                    ..Frame::default()
                },
                Pti::OneFloat64 => Frame {
                    prim: Primary::new(tm, pti),
                    v0,
                    ..Frame::default()
                },
                Pti::Two64 => Frame {
                    prim: Primary::new(tm, pti),
                    v0,
                    ude: v1 as u64,
                    ..Frame::default()
                },
                _ => Frame {
                    prim: Primary::new(tm, pti),
                    ..Frame::default()
                },
            };
            return Ok(frame);
        }

        if data.len() as u64 >= KEEP_LOW_43_BITS {
            return Err(FrameError::DataTooBig(data.len()));
        }
        let ucount = if data.is_empty() {
            0
        } else {
            data.len() as u64 + 1
        };
        // low 21 bits of the two's-complement evtnum, positioned at bits
        // 43..=63 so that an arithmetic shift right recovers the sign
        let en = ((evtnum as i64 as u64) & 0x1F_FFFF) << 43;
        Ok(Frame {
            prim: Primary::new(tm, Pti::Ude),
            ude: en | ucount,
            data: data.to_vec(),
            ..Frame::default()
        })
    }

    /// Decodes exactly one frame, copying the payload out of `by`.
    /// Returns the frame and the remainder of the buffer.
    ///
    /// For zero-copy decoding see [`FrameView::decode`].
    pub fn decode(by: &[u8]) -> Result<(Frame, &[u8]), FrameError> {
        let (view, rest) = FrameView::decode(by)?;
        Ok((view.to_frame(), rest))
    }

    /// The timestamp in nanoseconds since the Unix epoch. The low 3 bits
    /// are always zero.
    pub fn tm(&self) -> i64 {
        self.prim.tm()
    }

    /// Replaces the timestamp, preserving the payload-type indicator.
    /// The low 3 bits of `tm` are discarded.
    pub fn set_tm(&mut self, tm: i64) {
        self.prim = Primary::new(tm, self.prim.pti());
    }

    /// The payload-type indicator.
    pub fn pti(&self) -> Pti {
        self.prim.pti()
    }

    /// The raw primary word, exactly as it appears on the wire.
    pub fn primary(&self) -> u64 {
        self.prim.raw()
    }

    /// The float64 slot; meaningful for `OneFloat64` and `Two64`.
    pub fn v0(&self) -> f64 {
        self.v0
    }

    /// The int64 slot; meaningful for `OneInt64` and `Two64`.
    pub fn v1(&self) -> i64 {
        self.ude as i64
    }

    /// The raw secondary word.
    pub fn ude(&self) -> u64 {
        self.ude
    }

    /// The event number: the PTI value for fixed layouts, or the signed
    /// high 21 bits of the UDE word.
    pub fn evtnum(&self) -> i32 {
        match self.pti() {
            Pti::Ude => ((self.ude as i64) >> 43) as i32,
            pti => pti as i32,
        }
    }

    /// The on-wire payload length of a UDE frame (including the trailing
    /// NUL), or 0 for every other variant.
    pub fn ucount(&self) -> u64 {
        match self.pti() {
            Pti::Ude => self.ude & KEEP_LOW_43_BITS,
            _ => 0,
        }
    }

    /// The payload. Empty for everything but UDE frames with `ucount > 0`.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The exact number of bytes this frame occupies on the wire.
    pub fn num_bytes(&self) -> usize {
        wire_len(self.pti(), self.ucount())
    }

    /// Appends this frame's wire encoding to `dst`.
    pub fn encode_into(&self, dst: &mut Vec<u8>) {
        let start = dst.len();
        dst.resize(start + self.num_bytes(), 0);
        let out = &mut dst[start..];
        LE::write_u64(&mut out[..8], self.prim.raw());
        match self.pti() {
            Pti::Zero | Pti::Null | Pti::Na | Pti::NaN => {}
            Pti::OneInt64 => LE::write_u64(&mut out[8..16], self.ude),
            Pti::OneFloat64 => LE::write_u64(&mut out[8..16], self.v0.to_bits()),
            Pti::Two64 => {
                LE::write_u64(&mut out[8..16], self.v0.to_bits());
                LE::write_u64(&mut out[16..24], self.ude);
            }
            Pti::Ude => {
                LE::write_u64(&mut out[8..16], self.ude);
                // the trailing NUL is already present from the resize
                out[16..16 + self.data.len()].copy_from_slice(&self.data);
            }
        }
    }

    /// This frame's wire encoding as a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut by = Vec::with_capacity(self.num_bytes());
        self.encode_into(&mut by);
        by
    }

    /// The 64-byte BLAKE2b digest of this frame's exact wire encoding,
    /// trailing NUL included. This is the identity used by the dedup
    /// engine.
    pub fn content_hash(&self) -> [u8; 64] {
        use blake2::{Blake2b512, Digest};

        let mut hasher = Blake2b512::new();
        hasher.update(&self.encode());
        let mut out = [0u8; 64];
        out.copy_from_slice(hasher.finalize().as_slice());
        out
    }
}

/// Two frames are equal iff their wire encodings are byte-identical.
/// The comparison below covers exactly the fields each variant transmits,
/// bit-for-bit (`f64` slots via their bit patterns), so no encoding is
/// materialized.
impl PartialEq for Frame {
    fn eq(&self, other: &Frame) -> bool {
        if self.prim != other.prim {
            return false;
        }
        match self.pti() {
            Pti::Zero | Pti::Null | Pti::Na | Pti::NaN => true,
            Pti::OneInt64 => self.ude == other.ude,
            Pti::OneFloat64 => self.v0.to_bits() == other.v0.to_bits(),
            Pti::Two64 => {
                self.v0.to_bits() == other.v0.to_bits() && self.ude == other.ude
            }
            Pti::Ude => self.ude == other.ude && self.data == other.data,
        }
    }
}

impl Eq for Frame {}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TMFRAME tm:{} pti:{:?} evtnum:{}",
            self.tm(),
            self.pti(),
            self.evtnum()
        )?;
        match self.pti() {
            Pti::OneInt64 => write!(f, " v1:{}", self.v1()),
            Pti::OneFloat64 => write!(f, " v0:{}", self.v0()),
            Pti::Two64 => write!(f, " v0:{} v1:{}", self.v0(), self.v1()),
            Pti::Ude => write!(f, " ucount:{}", self.ucount()),
            _ => Ok(()),
        }
    }
}

/// A zero-copy view of one decoded frame. The payload borrows the decode
/// buffer, so a view is only valid as long as that buffer is; convert
/// with [`FrameView::to_frame`] to keep a frame across buffer reuse.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    prim: Primary,
    v0: f64,
    ude: u64,
    data: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// Decodes exactly one frame without copying the payload. Returns the
    /// view and the remainder of the buffer.
    ///
    /// The raw primary word is preserved verbatim. Decoding a `NaN` frame
    /// leaves `v0` at `0.0` rather than materializing a NaN, so that
    /// structural equality keeps working.
    pub fn decode(by: &'a [u8]) -> Result<(FrameView<'a>, &'a [u8]), FrameError> {
        if by.len() < 8 {
            return Err(FrameError::TooShort);
        }
        let prim = Primary::from_raw(LE::read_u64(&by[..8]));
        let empty = FrameView {
            prim,
            v0: 0.0,
            ude: 0,
            data: &by[..0],
        };
        match prim.pti() {
            Pti::Zero | Pti::Null | Pti::Na | Pti::NaN => Ok((empty, &by[8..])),
            Pti::OneInt64 => {
                if by.len() < 16 {
                    return Err(FrameError::TooShort);
                }
                let ude = LE::read_u64(&by[8..16]);
                Ok((FrameView { ude, ..empty }, &by[16..]))
            }
            Pti::OneFloat64 => {
                if by.len() < 16 {
                    return Err(FrameError::TooShort);
                }
                let v0 = f64::from_bits(LE::read_u64(&by[8..16]));
                Ok((FrameView { v0, ..empty }, &by[16..]))
            }
            Pti::Two64 => {
                if by.len() < 24 {
                    return Err(FrameError::TooShort);
                }
                let v0 = f64::from_bits(LE::read_u64(&by[8..16]));
                let ude = LE::read_u64(&by[16..24]);
                Ok((FrameView { v0, ude, ..empty }, &by[24..]))
            }
            Pti::Ude => {
                if by.len() < 16 {
                    return Err(FrameError::TooShort);
                }
                let ude = LE::read_u64(&by[8..16]);
                let ucount = ude & KEEP_LOW_43_BITS;
                if (by.len() as u64) < 16 + ucount {
                    return Err(FrameError::TooShort);
                }
                let total = 16 + ucount as usize;
                // strip the on-wire trailing NUL; ucount == 0 leaves an
                // empty (non-null) payload
                let data = if ucount > 0 {
                    &by[16..total - 1]
                } else {
                    &by[16..16]
                };
                Ok((FrameView { ude, data, ..empty }, &by[total..]))
            }
        }
    }

    /// Copies this view into an owned [`Frame`].
    pub fn to_frame(&self) -> Frame {
        Frame {
            prim: self.prim,
            v0: self.v0,
            ude: self.ude,
            data: self.data.to_vec(),
        }
    }

    /// The timestamp in nanoseconds since the Unix epoch.
    pub fn tm(&self) -> i64 {
        self.prim.tm()
    }

    /// The payload-type indicator.
    pub fn pti(&self) -> Pti {
        self.prim.pti()
    }

    /// The raw primary word.
    pub fn primary(&self) -> u64 {
        self.prim.raw()
    }

    /// The float64 slot.
    pub fn v0(&self) -> f64 {
        self.v0
    }

    /// The int64 slot.
    pub fn v1(&self) -> i64 {
        self.ude as i64
    }

    /// The raw secondary word.
    pub fn ude(&self) -> u64 {
        self.ude
    }

    /// The event number.
    pub fn evtnum(&self) -> i32 {
        match self.pti() {
            Pti::Ude => ((self.ude as i64) >> 43) as i32,
            pti => pti as i32,
        }
    }

    /// The on-wire payload length of a UDE frame, trailing NUL included.
    pub fn ucount(&self) -> u64 {
        match self.pti() {
            Pti::Ude => self.ude & KEEP_LOW_43_BITS,
            _ => 0,
        }
    }

    /// The borrowed payload.
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// The exact number of bytes this frame occupies on the wire.
    pub fn num_bytes(&self) -> usize {
        wire_len(self.pti(), self.ucount())
    }
}
