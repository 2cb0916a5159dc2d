//! Buffered frame writing.
//!
//! [`FrameWriter`] collects appended frames and marshals them to its sink
//! at well-defined points: an explicit [`flush`], a [`sync`], or any raw
//! byte write through the `io::Write` impl (which always flushes buffered
//! frames first, so frame order and byte order agree).
//!
//! [`flush`]: FrameWriter::flush
//! [`sync`]: FrameWriter::sync

use crate::{error::Result, frame::Frame};
use std::{
    fmt::{self, Debug, Formatter},
    fs::File,
    io::{self, Write},
};

/// Sinks that can force written bytes to durable storage.
///
/// This is the static face of an optional capability: [`FrameWriter::sync`]
/// is only available when the sink implements `Persist`. The default
/// `persist` is a no-op, which is right for in-memory sinks.
pub trait Persist {
    /// Forces previously written bytes to durable storage.
    fn persist(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Persist for File {
    fn persist(&mut self) -> io::Result<()> {
        self.sync_all()
    }
}

impl Persist for Vec<u8> {}
impl<T> Persist for io::Cursor<T> {}
impl Persist for io::Sink {}

impl<'a, P: Persist + ?Sized> Persist for &'a mut P {
    fn persist(&mut self) -> io::Result<()> {
        (**self).persist()
    }
}

/// Writes frames to an underlying `io::Write`, buffering appended frames
/// until a flush point.
///
/// Not safe for concurrent use; the writer owns a mutable marshalling
/// buffer that is reused across flushes.
pub struct FrameWriter<W> {
    frames: Vec<Frame>,
    out: W,
    buf: Vec<u8>,
}

impl<W: Write> FrameWriter<W> {
    /// Creates a new `FrameWriter` over `out`. The marshalling buffer
    /// grows to the largest frame seen and is then reused.
    pub fn new(out: W) -> FrameWriter<W> {
        FrameWriter {
            frames: Vec::new(),
            out,
            buf: Vec::new(),
        }
    }

    /// Adds `frame` to the stream to be written. The writer owns the
    /// frame from here on; it is encoded at the next flush point.
    pub fn append(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// The number of appended frames not yet flushed.
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    fn flush_frames(&mut self) -> io::Result<u64> {
        let FrameWriter { frames, out, buf } = self;
        let mut n = 0u64;
        for frame in frames.drain(..) {
            buf.clear();
            frame.encode_into(buf);
            out.write_all(buf)?;
            n += buf.len() as u64;
        }
        Ok(n)
    }

    /// Marshals all buffered frames to the sink, in append order, and
    /// clears the buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_frames()?;
        Ok(())
    }

    /// Like [`flush`], but writes the buffered frames to `w` instead of
    /// the sink. Returns the number of bytes written.
    ///
    /// [`flush`]: FrameWriter::flush
    pub fn write_frames_to<T: Write + ?Sized>(&mut self, w: &mut T) -> Result<u64> {
        let mut n = 0u64;
        for frame in self.frames.drain(..) {
            self.buf.clear();
            frame.encode_into(&mut self.buf);
            w.write_all(&self.buf)?;
            n += self.buf.len() as u64;
        }
        Ok(n)
    }

    /// Returns a reference to the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    /// Consumes the writer, returning the underlying sink. Buffered
    /// frames that were never flushed are dropped.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Persist> FrameWriter<W> {
    /// Flushes buffered frames and forces the sink to durable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.flush_frames()?;
        self.out.persist()?;
        Ok(())
    }
}

/// Raw byte passthrough: a `write` flushes all buffered frames first,
/// then forwards `p` to the sink, so bytes never jump ahead of frames
/// appended before them.
impl<W: Write> Write for FrameWriter<W> {
    fn write(&mut self, p: &[u8]) -> io::Result<usize> {
        self.flush_frames()?;
        self.out.write(p)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_frames()?;
        self.out.flush()
    }
}

impl<W> Debug for FrameWriter<W> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameWriter")
            .field("pending", &self.frames.len())
            .finish()
    }
}
