//! Sliding-window deduplication of frame streams.
//!
//! Duplicates are detected by content hash over the exact wire encoding
//! ([`Frame::content_hash`]), within a window of the most recent `window`
//! frames. Each hash carries an occurrence count, so a duplicate still
//! inside the window is remembered even after an older copy of the same
//! content rolls out: in `[a, b, a, c, a]` with a window of 3, the final
//! `a` is a duplicate of index 2, which the count preserves when index
//! 0's `a` is evicted.

use crate::{
    error::{Error, Result},
    frame::Frame,
    reader::FrameReader,
    writer::FrameWriter,
};
use log::{debug, trace};
use std::{
    collections::{hash_map::Entry, HashMap},
    io::{Read, Write},
};

/// The 64-byte BLAKE2b digest identifying a frame's content.
pub type FrameHash = [u8; 64];

/// Flush the output writer this often to bound buffered memory.
const FLUSH_EVERY: u64 = 1000;

/// Configures a sliding-window dedup pass.
///
/// ```
/// use tmframe::dedup::Deduper;
///
/// let dd = Deduper::new(1024).detect_only(false);
/// # let _ = dd;
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Deduper {
    window: usize,
    detect_only: bool,
    max_frame_bytes: u64,
}

impl Deduper {
    /// Creates a deduper with the given window size.
    ///
    /// # Panics
    ///
    /// Panics if `window <= 1`; a window of one cannot hold a frame and
    /// its duplicate at the same time.
    pub fn new(window: usize) -> Deduper {
        assert!(window > 1, "dedup window must be larger than 1");
        Deduper {
            window,
            detect_only: false,
            max_frame_bytes: 1024 * 1024,
        }
    }

    /// In detect-only mode the pass fails with [`Error::DupDetected`] at
    /// the first duplicate instead of suppressing it.
    pub fn detect_only(mut self, yes: bool) -> Deduper {
        self.detect_only = yes;
        self
    }

    /// Sets the frame size limit for the input reader. Defaults to 1 MiB.
    pub fn max_frame_bytes(mut self, max: u64) -> Deduper {
        self.max_frame_bytes = max;
        self
    }

    /// Copies `input` to `output`, suppressing frames whose content hash
    /// already occurred within the window.
    pub fn run<R: Read, W: Write>(&self, input: R, output: W) -> Result<()> {
        self.run_inner(input, output, None)
    }

    /// Like [`run`], but also writes each suppressed duplicate to `dups`.
    ///
    /// [`run`]: Deduper::run
    pub fn run_with_dups<R: Read, W: Write, D: Write>(
        &self,
        input: R,
        output: W,
        mut dups: D,
    ) -> Result<()> {
        self.run_inner(input, output, Some(&mut dups))
    }

    fn run_inner<R: Read, W: Write>(
        &self,
        input: R,
        output: W,
        mut dups: Option<&mut dyn Write>,
    ) -> Result<()> {
        let mut fr = FrameReader::new(input, self.max_frame_bytes);
        let mut fw = FrameWriter::new(output);

        // occurrence counts of every hash still inside the window, plus
        // the hashes of the last `window` frames in arrival order
        let mut seen: HashMap<FrameHash, u64> = HashMap::new();
        let mut ring: Vec<Option<FrameHash>> = vec![None; self.window];

        let mut i: u64 = 0;
        loop {
            let frame = match fr.next_frame() {
                Ok((frame, _)) => frame,
                Err(Error::Eof) => break,
                Err(err) => return Err(err),
            };

            let hash = frame.content_hash();
            match seen.entry(hash) {
                Entry::Vacant(entry) => {
                    entry.insert(1);
                    fw.append(frame);
                }
                Entry::Occupied(mut entry) => {
                    *entry.get_mut() += 1;
                    trace!("dedup: duplicate at index {}", i);
                    if self.detect_only {
                        fw.flush()?;
                        return Err(Error::DupDetected {
                            index: i,
                            frame: frame.to_string(),
                        });
                    }
                    if let Some(w) = dups.as_mut() {
                        w.write_all(&frame.encode())?;
                    }
                }
            }

            // evict the frame falling out of the window, then take its slot
            let slot = (i % self.window as u64) as usize;
            if i >= self.window as u64 {
                if let Some(old) = ring[slot].take() {
                    if let Entry::Occupied(mut entry) = seen.entry(old) {
                        *entry.get_mut() -= 1;
                        if *entry.get() == 0 {
                            entry.remove();
                        }
                    }
                }
            }
            ring[slot] = Some(hash);

            i += 1;
            if i % FLUSH_EVERY == 0 {
                debug!("dedup: flushing after {} frames", i);
                fw.flush()?;
            }
        }
        fw.flush()
    }
}

/// Copies the frame stream on `input` to `output`, suppressing duplicate
/// frames within a sliding window of `window` frames.
pub fn dedup<R: Read, W: Write>(input: R, output: W, window: usize) -> Result<()> {
    Deduper::new(window).run(input, output)
}
