//! Timestamp search over an in-memory sequence of frames.
//!
//! A [`Series`] is a sequence of frames whose timestamps are
//! non-decreasing; runs of equal timestamps (tie groups) are permitted
//! and each search primitive states exactly which member of a tie group
//! it lands on. All searches run in O(log m) using at most two binary
//! searches.

use crate::{
    error::Result,
    frame::Frame,
    reader::FrameReader,
};
use std::io::Read;

/// Where a searched timestamp fell relative to the series.
///
/// The discriminant values are stable across versions.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
pub enum SearchStatus {
    /// The query precedes every frame; no index qualifies.
    InPast = 0,
    /// The returned index satisfies the query exactly.
    Avail = 1,
    /// The query follows every frame; the returned index is clamped to
    /// the end of the series.
    InFuture = 2,
}

/// Stable sort of `frames` by timestamp. Ties keep their current order,
/// so sorting each input before a merge preserves per-input insertion
/// order.
pub fn sort_frames_by_time(frames: &mut [Frame]) {
    frames.sort_by_key(Frame::tm);
}

/// An immutable, time-ordered sequence of frames supporting the
/// "in-force" searches.
#[derive(Debug, Clone, Default)]
pub struct Series {
    frames: Vec<Frame>,
}

impl Series {
    /// Wraps an already time-sorted sequence of frames.
    pub fn new(frames: Vec<Frame>) -> Series {
        debug_assert!(
            frames.windows(2).all(|w| w[0].tm() <= w[1].tm()),
            "series frames must be sorted by tm"
        );
        Series { frames }
    }

    /// Loads every frame from `r`, in stream order, discarding nothing.
    pub fn from_reader<R: Read>(r: R, max_frame_bytes: u64) -> Result<Series> {
        let mut fr = FrameReader::new(r, max_frame_bytes);
        Ok(Series::new(fr.read_all()?))
    }

    /// The frames, in insertion order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// The number of frames held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the series holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Smallest index whose timestamp is >= `utm`, or `len()` if none.
    fn smallest_ge(&self, utm: i64) -> usize {
        self.frames.partition_point(|f| f.tm() < utm)
    }

    /// The last frame strictly before `tm`: the record "in force" at that
    /// instant. Within a tie group this is the group's last member.
    pub fn last_in_force_before(&self, tm: i64) -> (Option<usize>, SearchStatus) {
        let utm = tm & !7;
        let m = self.frames.len();
        if m == 0 {
            return (None, SearchStatus::InPast);
        }
        let i = self.smallest_ge(utm);
        if i == m {
            (Some(m - 1), SearchStatus::InFuture)
        } else if i == 0 {
            (None, SearchStatus::InPast)
        } else {
            (Some(i - 1), SearchStatus::Avail)
        }
    }

    /// Like [`last_in_force_before`], but lands on the *first* member of
    /// the chosen timestamp's tie group.
    ///
    /// [`last_in_force_before`]: Series::last_in_force_before
    pub fn first_in_force_before(&self, tm: i64) -> (Option<usize>, SearchStatus) {
        let utm = tm & !7;
        let m = self.frames.len();
        if m == 0 {
            return (None, SearchStatus::InPast);
        }
        let i = self.smallest_ge(utm);
        if i == m {
            let t = self.frames[m - 1].tm();
            (Some(self.smallest_ge(t)), SearchStatus::InFuture)
        } else if i == 0 {
            (None, SearchStatus::InPast)
        } else {
            let t = self.frames[i - 1].tm();
            (Some(self.smallest_ge(t)), SearchStatus::Avail)
        }
    }

    /// The first frame whose timestamp is at or before `tm`. An exact hit
    /// lands on the first member of the tie group at `tm`.
    pub fn first_at_or_before(&self, tm: i64) -> (Option<usize>, SearchStatus) {
        let utm = tm & !7;
        let m = self.frames.len();
        if m == 0 {
            return (None, SearchStatus::InPast);
        }
        let i = self.smallest_ge(utm);
        if i == m {
            let t = self.frames[m - 1].tm();
            return (Some(self.smallest_ge(t)), SearchStatus::InFuture);
        }
        // smallest_ge already lands on the first member of a tie group
        if self.frames[i].tm() == utm {
            (Some(i), SearchStatus::Avail)
        } else if i == 0 {
            (None, SearchStatus::InPast)
        } else {
            (Some(i - 1), SearchStatus::Avail)
        }
    }

    /// The last frame whose timestamp is at or before `tm`. An exact hit
    /// lands on the last member of the tie group at `tm`.
    pub fn last_at_or_before(&self, tm: i64) -> (Option<usize>, SearchStatus) {
        let utm = tm & !7;
        let m = self.frames.len();
        if m == 0 {
            return (None, SearchStatus::InPast);
        }
        let i = self.smallest_ge(utm);
        if i == m {
            return (Some(m - 1), SearchStatus::InFuture);
        }
        if self.frames[i].tm() == utm {
            // last member of the tie group at utm
            (Some(self.smallest_ge(utm + 1) - 1), SearchStatus::Avail)
        } else if i == 0 {
            (None, SearchStatus::InPast)
        } else {
            // frames[i - 1] is the last index with tm < utm
            (Some(i - 1), SearchStatus::Avail)
        }
    }
}
