//! Streaming readers that carve TMFRAME frames out of a byte stream.
//!
//! [`FrameReader`] buffers just enough of the underlying stream (the
//! first 16 bytes of the next frame) to announce the size of the next
//! frame before consuming it, so callers can budget buffers up front.
//! [`BufferedFrameReader`] layers one frame of lookahead on top, which is
//! what the merge engine needs to compare stream heads.
//!
//! Both readers hold mutable internal buffers and are single-threaded by
//! contract; share them across threads only behind your own lock.

use crate::{
    error::{Error, Result},
    frame::{Frame, FrameView, Pti, KEEP_LOW_43_BITS},
};
use byteorder::{ByteOrder, LE};
use log::trace;
use std::{
    fmt::{self, Debug, Formatter},
    io::{self, Read, Write},
};

fn truncated() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::UnexpectedEof,
        "byte stream ended inside a frame header",
    ))
}

/// Reads successive frames from an `io::Read`, peeking ahead to size
/// each frame before consuming it.
///
/// The `max_frame_bytes` limit sizes the reusable internal decode
/// buffer; any frame announcing a larger size fails with
/// [`Error::FrameTooLarge`].
pub struct FrameReader<R> {
    r: R,
    max_frame_bytes: u64,
    /// Reusable decode buffer; `next_frame_view` hands out borrows into it.
    buf: Vec<u8>,
    /// Peek window over the first 16 bytes of the next frame.
    peek: [u8; 16],
    navail: usize,
    eof: bool,
}

impl<R: Read> FrameReader<R> {
    /// Creates a new `FrameReader` imposing a frame size limit of
    /// `max_frame_bytes`.
    pub fn new(r: R, max_frame_bytes: u64) -> FrameReader<R> {
        FrameReader {
            r,
            max_frame_bytes,
            buf: vec![0; max_frame_bytes as usize],
            peek: [0; 16],
            navail: 0,
            eof: false,
        }
    }

    fn fill_peek(&mut self) -> io::Result<()> {
        while self.navail < 16 && !self.eof {
            match self.r.read(&mut self.peek[self.navail..]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.navail += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Returns the byte length of the next frame without consuming it,
    /// derived from the primary word and, for UDE frames, the ucount
    /// field.
    ///
    /// Fails with [`Error::Eof`] at a clean end of stream, and with the
    /// underlying read error when the stream ends inside a frame header.
    pub fn peek_next_frame_bytes(&mut self) -> Result<u64> {
        self.fill_peek()?;
        if self.navail == 0 {
            return Err(Error::Eof);
        }
        if self.navail < 8 {
            return Err(truncated());
        }
        let prim = LE::read_u64(&self.peek[..8]);
        match Pti::from_low_bits(prim) {
            Pti::Zero | Pti::Null | Pti::Na | Pti::NaN => Ok(8),
            Pti::OneInt64 | Pti::OneFloat64 => {
                if self.navail < 16 {
                    return Err(truncated());
                }
                Ok(16)
            }
            Pti::Two64 => {
                if self.navail < 16 {
                    return Err(truncated());
                }
                Ok(24)
            }
            Pti::Ude => {
                if self.navail < 16 {
                    return Err(truncated());
                }
                let ude = LE::read_u64(&self.peek[8..16]);
                Ok(16 + (ude & KEEP_LOW_43_BITS))
            }
        }
    }

    /// Pulls the next frame's bytes into the internal decode buffer and
    /// returns the frame length.
    fn fill_decode_buf(&mut self) -> Result<usize> {
        let need = self.peek_next_frame_bytes()?;
        if need > self.max_frame_bytes {
            return Err(Error::FrameTooLarge {
                need,
                max: self.max_frame_bytes,
            });
        }
        let need = need as usize;
        let take = need.min(self.navail);
        self.buf[..take].copy_from_slice(&self.peek[..take]);
        self.peek.copy_within(take..self.navail, 0);
        self.navail -= take;
        self.r.read_exact(&mut self.buf[take..need])?;
        trace!("read {} byte frame", need);
        Ok(need)
    }

    /// Reads and decodes the next frame, copying the payload out of the
    /// internal buffer. Returns the frame and the number of wire bytes it
    /// consumed.
    pub fn next_frame(&mut self) -> Result<(Frame, usize)> {
        let (view, nbytes) = self.next_frame_view()?;
        Ok((view.to_frame(), nbytes))
    }

    /// Like [`next_frame`], but zero-copy: the returned view borrows the
    /// reader's internal buffer and is invalidated by the next call on
    /// this reader (the borrow checker enforces this).
    ///
    /// [`next_frame`]: FrameReader::next_frame
    pub fn next_frame_view(&mut self) -> Result<(FrameView<'_>, usize)> {
        let need = self.fill_decode_buf()?;
        let (view, _rest) = FrameView::decode(&self.buf[..need])?;
        Ok((view, need))
    }

    /// Reads the raw bytes of the next frame into `dst` (cleared first),
    /// bypassing decode. Returns the frame length.
    pub fn next_frame_bytes(&mut self, dst: &mut Vec<u8>) -> Result<usize> {
        let need = self.fill_decode_buf()?;
        dst.clear();
        dst.extend_from_slice(&self.buf[..need]);
        Ok(need)
    }

    /// Forwards the rest of the underlying byte stream to `w`, bypassing
    /// framing. Returns the number of bytes copied.
    pub fn write_to<W: Write + ?Sized>(&mut self, w: &mut W) -> Result<u64> {
        let mut n = 0u64;
        if self.navail > 0 {
            w.write_all(&self.peek[..self.navail])?;
            n += self.navail as u64;
            self.navail = 0;
        }
        n += io::copy(&mut self.r, w)?;
        Ok(n)
    }

    /// Reads every remaining frame until a clean end of stream.
    pub fn read_all(&mut self) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        loop {
            match self.next_frame() {
                Ok((frame, _)) => frames.push(frame),
                Err(Error::Eof) => return Ok(frames),
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns a reference to the underlying reader.
    pub fn get_ref(&self) -> &R {
        &self.r
    }

    /// Returns a mutable reference to the underlying reader. Reading from
    /// it directly will corrupt the frame stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.r
    }

    /// Consumes the `FrameReader`, returning the underlying reader. Any
    /// peeked bytes are discarded.
    pub fn into_inner(self) -> R {
        self.r
    }
}

impl<R> Debug for FrameReader<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameReader")
            .field("max_frame_bytes", &self.max_frame_bytes)
            .field("navail", &self.navail)
            .field("eof", &self.eof)
            .finish()
    }
}

/// A [`FrameReader`] with one frame of lookahead: [`peek`] inspects the
/// next frame without consuming it, [`advance`] discards it, and
/// [`read_one`] does both.
///
/// [`peek`]: BufferedFrameReader::peek
/// [`advance`]: BufferedFrameReader::advance
/// [`read_one`]: BufferedFrameReader::read_one
pub struct BufferedFrameReader<R> {
    reader: FrameReader<R>,
    next: Option<Frame>,
}

impl<R: Read> BufferedFrameReader<R> {
    /// Creates a new `BufferedFrameReader` imposing a frame size limit of
    /// `max_frame_bytes`.
    pub fn new(r: R, max_frame_bytes: u64) -> BufferedFrameReader<R> {
        BufferedFrameReader {
            reader: FrameReader::new(r, max_frame_bytes),
            next: None,
        }
    }

    /// Returns the next frame without advancing past it. Repeated peeks
    /// return the same frame.
    pub fn peek(&mut self) -> Result<&Frame> {
        if self.next.is_none() {
            let (frame, _) = self.reader.next_frame()?;
            self.next = Some(frame);
        }
        Ok(self.next.as_ref().unwrap())
    }

    /// Skips one frame: drops the peeked frame if there is one, otherwise
    /// decodes the next frame from the stream and discards it.
    pub fn advance(&mut self) -> Result<()> {
        if self.next.take().is_some() {
            return Ok(());
        }
        self.reader.next_frame().map(|_| ())
    }

    /// Reads the next frame and advances past it. Calling it repeatedly
    /// yields every frame of the stream in order.
    pub fn read_one(&mut self) -> Result<Frame> {
        match self.next.take() {
            Some(frame) => Ok(frame),
            None => self.reader.next_frame().map(|(frame, _)| frame),
        }
    }

    /// Flushes the encoded bytes of any peeked frame to `w`, then copies
    /// the rest of the underlying byte stream directly, bypassing any
    /// further frame handling.
    pub fn write_to<W: Write + ?Sized>(&mut self, w: &mut W) -> Result<u64> {
        let mut n = 0u64;
        if let Some(frame) = self.next.take() {
            let by = frame.encode();
            w.write_all(&by)?;
            n += by.len() as u64;
        }
        Ok(n + self.reader.write_to(w)?)
    }
}

impl<R> Debug for BufferedFrameReader<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferedFrameReader")
            .field("peeked", &self.next.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{EV_NA, EV_ONE_FLOAT64, EV_TWO64, EV_UTF8, EV_ZERO};
    use std::io::Cursor;

    const T0: i64 = 1_455_580_800_000_000_000;

    fn stream(frames: &[Frame]) -> Cursor<Vec<u8>> {
        let mut by = Vec::new();
        for frame in frames {
            frame.encode_into(&mut by);
        }
        Cursor::new(by)
    }

    #[test]
    fn peek_on_empty_stream_is_eof() {
        let mut fr = FrameReader::new(Cursor::new(Vec::new()), 64 * 1024);
        assert!(matches!(fr.peek_next_frame_bytes(), Err(Error::Eof)));
        assert!(matches!(fr.next_frame(), Err(Error::Eof)));
    }

    #[test]
    fn peek_reports_sizes_without_consuming() {
        let frames = [
            Frame::new(T0, EV_ZERO, 0.0, 0, &[]).unwrap(),
            Frame::new(T0, EV_ONE_FLOAT64, 1.0, 0, &[]).unwrap(),
            Frame::new(T0, EV_TWO64, 1.0, 2, &[]).unwrap(),
            Frame::new(T0, EV_UTF8, 0.0, 0, &[0; 20]).unwrap(),
        ];
        let sizes = [8u64, 16, 24, 16 + 20 + 1];
        for (frame, &size) in frames.iter().zip(sizes.iter()) {
            let mut fr = FrameReader::new(stream(std::slice::from_ref(frame)), 64 * 1024);
            assert_eq!(fr.peek_next_frame_bytes().unwrap(), size);
            // still unconsumed
            assert_eq!(fr.peek_next_frame_bytes().unwrap(), size);
            let (back, nbytes) = fr.next_frame().unwrap();
            assert_eq!(nbytes as u64, size);
            assert_eq!(&back, frame);
        }
    }

    #[test]
    fn truncated_header_is_an_io_error() {
        let by = Frame::new(T0, EV_TWO64, 1.0, 2, &[]).unwrap().encode();
        let mut fr = FrameReader::new(Cursor::new(by[..4].to_vec()), 64 * 1024);
        assert!(matches!(fr.peek_next_frame_bytes(), Err(Error::Io(_))));

        // a frame body cut short fails on the read, not with Eof
        let mut fr = FrameReader::new(Cursor::new(by[..20].to_vec()), 64 * 1024);
        assert!(matches!(fr.next_frame(), Err(Error::Io(_))));
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let frame = Frame::new(T0, EV_UTF8, 0.0, 0, &[7; 100]).unwrap();
        let mut fr = FrameReader::new(stream(&[frame]), 64);
        match fr.next_frame() {
            Err(Error::FrameTooLarge { need, max }) => {
                assert_eq!(need, 117);
                assert_eq!(max, 64);
            }
            other => panic!("expected FrameTooLarge, got {:?}", other.map(|p| p.0)),
        }
    }

    #[test]
    fn reads_a_whole_stream_in_order() {
        let frames: Vec<Frame> = (0..10)
            .map(|i| Frame::new(T0 + i * 8, EV_ONE_FLOAT64, i as f64, 0, &[]).unwrap())
            .collect();
        let mut fr = FrameReader::new(stream(&frames), 64 * 1024);
        let all = fr.read_all().unwrap();
        assert_eq!(all, frames);
        // reader stays at Eof
        assert!(matches!(fr.next_frame(), Err(Error::Eof)));
    }

    #[test]
    fn next_frame_bytes_skips_decoding() {
        let frame = Frame::new(T0, EV_UTF8, 0.0, 0, b"raw bytes").unwrap();
        let mut fr = FrameReader::new(stream(std::slice::from_ref(&frame)), 64 * 1024);
        let mut raw = Vec::new();
        let n = fr.next_frame_bytes(&mut raw).unwrap();
        assert_eq!(n, raw.len());
        assert_eq!(raw, frame.encode());
    }

    #[test]
    fn zero_copy_view_borrows_reader_buffer() {
        let frame = Frame::new(T0, EV_UTF8, 0.0, 0, b"borrowed").unwrap();
        let mut fr = FrameReader::new(stream(std::slice::from_ref(&frame)), 64 * 1024);
        let (view, nbytes) = fr.next_frame_view().unwrap();
        assert_eq!(nbytes, frame.num_bytes());
        assert_eq!(view.data(), b"borrowed");
        assert_eq!(view.to_frame(), frame);
    }

    #[test]
    fn write_to_passes_remaining_bytes_through() {
        let frames = [
            Frame::new(T0, EV_NA, 0.0, 0, &[]).unwrap(),
            Frame::new(T0 + 8, EV_UTF8, 0.0, 0, b"tail").unwrap(),
        ];
        let mut fr = FrameReader::new(stream(&frames), 64 * 1024);
        let (first, _) = fr.next_frame().unwrap();
        assert_eq!(first, frames[0]);

        let mut sink = Vec::new();
        let n = fr.write_to(&mut sink).unwrap();
        assert_eq!(n as usize, sink.len());
        assert_eq!(sink, frames[1].encode());
    }

    #[test]
    fn buffered_peek_is_idempotent() {
        let frames = [
            Frame::new(T0, EV_ONE_FLOAT64, 1.0, 0, &[]).unwrap(),
            Frame::new(T0 + 8, EV_ONE_FLOAT64, 2.0, 0, &[]).unwrap(),
        ];
        let mut bfr = BufferedFrameReader::new(stream(&frames), 64 * 1024);
        assert_eq!(bfr.peek().unwrap(), &frames[0]);
        assert_eq!(bfr.peek().unwrap(), &frames[0]);
        assert_eq!(bfr.read_one().unwrap(), frames[0]);
        assert_eq!(bfr.peek().unwrap(), &frames[1]);
        bfr.advance().unwrap();
        assert!(matches!(bfr.peek(), Err(Error::Eof)));
    }

    #[test]
    fn advance_skips_one_unpeeked_frame() {
        let frames = [
            Frame::new(T0, EV_ONE_FLOAT64, 1.0, 0, &[]).unwrap(),
            Frame::new(T0 + 8, EV_ONE_FLOAT64, 2.0, 0, &[]).unwrap(),
        ];
        let mut bfr = BufferedFrameReader::new(stream(&frames), 64 * 1024);
        // nothing peeked: advance decodes and discards exactly one frame
        bfr.advance().unwrap();
        assert_eq!(bfr.read_one().unwrap(), frames[1]);
        assert!(matches!(bfr.advance(), Err(Error::Eof)));
    }

    #[test]
    fn buffered_write_to_flushes_peeked_frame_first() {
        let frames = [
            Frame::new(T0, EV_UTF8, 0.0, 0, b"one").unwrap(),
            Frame::new(T0 + 8, EV_UTF8, 0.0, 0, b"two").unwrap(),
        ];
        let mut bfr = BufferedFrameReader::new(stream(&frames), 64 * 1024);
        bfr.peek().unwrap();

        let mut sink = Vec::new();
        let n = bfr.write_to(&mut sink).unwrap();
        let mut expected = frames[0].encode();
        expected.extend_from_slice(&frames[1].encode());
        assert_eq!(n as usize, expected.len());
        assert_eq!(sink, expected);
    }
}
