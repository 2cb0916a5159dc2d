//! A fixed-capacity circular FIFO of frames.
//!
//! The ring keeps its frames in two implicit contiguous segments of the
//! backing storage: `[a0, a_last]` and, once the data wraps, `[b0,
//! b_last]`. [`FrameRing::legal_pos`] exposes the segments directly and
//! [`FrameRing::nextpos`]/[`FrameRing::prevpos`] navigate the logical
//! order across the wrap without unwrapping the buffer.

use crate::{
    error::{Error, Result},
    frame::Frame,
};

/// Outcome of a ring position query.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum Pos {
    /// The neighbouring position.
    At(usize),
    /// No neighbour in that direction.
    NotFound,
    /// The starting position is outside the ring's storage.
    InvalidArgument,
}

/// A fixed-capacity circular FIFO of frames.
///
/// The logical order is `[beg, beg + readable) mod capacity`; reads
/// happen at the front, writes at the back.
#[derive(Debug, Clone)]
pub struct FrameRing {
    slots: Vec<Frame>,
    beg: usize,
    readable: usize,
}

impl FrameRing {
    /// Creates a ring with room for `n` frames.
    ///
    /// # Panics
    ///
    /// Panics if `n` is zero.
    pub fn new(n: usize) -> FrameRing {
        assert!(n > 0, "ring capacity must be at least 1");
        FrameRing {
            slots: vec![Frame::default(); n],
            beg: 0,
            readable: 0,
        }
    }

    /// The total number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// The number of frames available to read.
    pub fn avail(&self) -> usize {
        self.readable
    }

    /// The number of frames that can still be written before the ring is
    /// full.
    pub fn write_capacity(&self) -> usize {
        self.slots.len() - self.readable
    }

    /// All readable frames as two contiguous slices of the backing
    /// storage. The second slice is empty unless the data wraps. Do not
    /// advance or write while iterating the returned slices.
    pub fn two_contig(&self) -> (&[Frame], &[Frame]) {
        let extent = self.beg + self.readable;
        if extent <= self.slots.len() {
            (&self.slots[self.beg..extent], &self.slots[..0])
        } else {
            (
                &self.slots[self.beg..],
                &self.slots[..extent % self.slots.len()],
            )
        }
    }

    fn read_and_maybe_advance(&mut self, dst: &mut [Frame], do_advance: bool) -> Result<usize> {
        if dst.is_empty() {
            return Ok(0);
        }
        if self.readable == 0 {
            return Err(Error::Eof);
        }
        let cap = self.slots.len();
        let take = dst.len().min(self.readable);
        let extent = self.beg + self.readable;
        if extent <= cap {
            dst[..take].clone_from_slice(&self.slots[self.beg..self.beg + take]);
        } else {
            let first = (cap - self.beg).min(take);
            dst[..first].clone_from_slice(&self.slots[self.beg..self.beg + first]);
            if first < take {
                dst[first..take].clone_from_slice(&self.slots[..take - first]);
            }
        }
        if do_advance {
            self.advance(take);
        }
        Ok(take)
    }

    /// Copies up to `dst.len()` frames out of the ring in FIFO order,
    /// advancing past them. Returns [`Error::Eof`] only when the ring is
    /// empty (and `dst` is not).
    pub fn read(&mut self, dst: &mut [Frame]) -> Result<usize> {
        self.read_and_maybe_advance(dst, true)
    }

    /// Like [`read`], but leaves the frames in the ring, to peek ahead.
    ///
    /// [`read`]: FrameRing::read
    pub fn read_without_advance(&mut self, dst: &mut [Frame]) -> Result<usize> {
        self.read_and_maybe_advance(dst, false)
    }

    /// Copies up to `write_capacity()` frames from `src` into the ring.
    /// When `src` holds more than fits, the leading frames are still
    /// written and the error reports how many.
    pub fn write(&mut self, src: &[Frame]) -> Result<usize> {
        let cap = self.slots.len();
        let take = src.len().min(self.write_capacity());
        for (k, frame) in src[..take].iter().enumerate() {
            self.slots[(self.beg + self.readable + k) % cap] = frame.clone();
        }
        self.readable += take;
        if take < src.len() {
            Err(Error::ShortWrite { written: take })
        } else {
            Ok(take)
        }
    }

    /// Discards up to `n` frames from the front without copying them out.
    pub fn advance(&mut self, n: usize) {
        let cap = self.slots.len();
        let n = n.min(self.readable);
        for k in 0..n {
            // drop vacated payloads promptly
            self.slots[(self.beg + k) % cap] = Frame::default();
        }
        self.readable -= n;
        self.beg = (self.beg + n) % cap;
    }

    /// Forgets all stored frames.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Frame::default();
        }
        self.beg = 0;
        self.readable = 0;
    }

    /// Takes ownership of `frames` as ring contents. A slice larger than
    /// the current capacity becomes the backing storage outright; a
    /// smaller one is copied into the existing storage.
    pub fn adopt(&mut self, frames: Vec<Frame>) {
        let n = frames.len();
        if n > self.slots.len() {
            self.slots = frames;
        } else {
            for (k, frame) in frames.into_iter().enumerate() {
                self.slots[k] = frame;
            }
            for slot in self.slots[n..].iter_mut() {
                *slot = Frame::default();
            }
        }
        self.beg = 0;
        self.readable = n;
    }

    /// The `k`-th frame in logical order, counting from the front.
    /// `None` when `k` is out of bounds or the ring is empty.
    pub fn kth(&self, k: usize) -> Option<&Frame> {
        if k >= self.readable {
            return None;
        }
        Some(&self.slots[(self.beg + k) % self.slots.len()])
    }

    /// The storage index of the front frame, or `None` when empty.
    pub fn first(&self) -> Option<usize> {
        if self.readable == 0 {
            None
        } else {
            Some(self.beg)
        }
    }

    /// The storage index of the back frame, or `None` when empty.
    pub fn last(&self) -> Option<usize> {
        if self.readable == 0 {
            return None;
        }
        Some((self.beg + self.readable - 1) % self.slots.len())
    }

    /// The two in-use storage segments, `[a0, a_last]` and `[b0, b_last]`
    /// inclusive. A segment is `None` when unused; the second is only
    /// used when the data wraps.
    pub fn legal_pos(&self) -> (Option<(usize, usize)>, Option<(usize, usize)>) {
        if self.readable == 0 {
            return (None, None);
        }
        let cap = self.slots.len();
        let last = self.beg + self.readable - 1;
        if last < cap {
            (Some((self.beg, last)), None)
        } else {
            (Some((self.beg, cap - 1)), Some((0, last % cap)))
        }
    }

    /// The storage index following `from` in logical order.
    pub fn nextpos(&self, from: usize) -> Pos {
        if from >= self.slots.len() {
            return Pos::InvalidArgument;
        }
        if self.readable == 0 {
            return Pos::NotFound;
        }
        if Some(from) == self.last() {
            return Pos::NotFound;
        }
        let (a, b) = self.legal_pos();
        if let Some((a0, a_last)) = a {
            if from >= a0 && from < a_last {
                return Pos::At(from + 1);
            }
            if from == a_last {
                return match b {
                    Some((b0, _)) => Pos::At(b0),
                    None => Pos::NotFound,
                };
            }
        }
        if let Some((b0, b_last)) = b {
            if from >= b0 && from < b_last {
                return Pos::At(from + 1);
            }
        }
        Pos::NotFound
    }

    /// The storage index preceding `from` in logical order.
    pub fn prevpos(&self, from: usize) -> Pos {
        if from >= self.slots.len() {
            return Pos::InvalidArgument;
        }
        if self.readable == 0 {
            return Pos::NotFound;
        }
        if from == self.beg {
            return Pos::NotFound;
        }
        let (a, b) = self.legal_pos();
        if let Some((a0, a_last)) = a {
            if from > a0 && from <= a_last {
                return Pos::At(from - 1);
            }
        }
        if let Some((b0, b_last)) = b {
            if from == b0 {
                if let Some((_, a_last)) = a {
                    return Pos::At(a_last);
                }
            }
            if from > b0 && from <= b_last {
                return Pos::At(from - 1);
            }
        }
        Pos::NotFound
    }
}
