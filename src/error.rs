use crate::frame::FrameError;
use std::{
    error,
    fmt::{self, Display, Formatter},
    io, result,
};

/// An error that has occured while encoding, decoding, or streaming
/// TMFRAME frames.
#[derive(Debug)]
#[allow(variant_size_differences)]
pub enum Error {
    /// An error in an underlying I/O operation.
    Io(io::Error),
    /// A frame could not be constructed or decoded.
    Frame(FrameError),
    /// The next frame in a stream announces a size beyond the reader's
    /// configured maximum.
    FrameTooLarge {
        /// The announced frame size.
        need: u64,
        /// The reader's configured maximum.
        max: u64,
    },
    /// Clean end of stream at a frame boundary. This is a control signal,
    /// not a failure; a stream ending inside a frame surfaces as `Io`.
    Eof,
    /// A duplicate frame was observed while deduplicating in detect-only
    /// mode.
    DupDetected {
        /// Position of the duplicate in the input stream, counting from 0.
        index: u64,
        /// Printable form of the offending frame.
        frame: String,
    },
    /// A ring write exceeded the remaining capacity; `written` frames
    /// were still stored.
    ShortWrite {
        /// How many frames were written before capacity ran out.
        written: usize,
    },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => err.fmt(f),
            Error::Frame(err) => err.fmt(f),
            Error::FrameTooLarge { need, max } => write!(
                f,
                "frame of {} bytes is larger than the reader's maximum of {}",
                need, max
            ),
            Error::Eof => f.write_str("end of frame stream"),
            Error::DupDetected { index, frame } => {
                write!(f, "duplicate frame at index {}: {}", index, frame)
            }
            Error::ShortWrite { written } => write!(
                f,
                "short write: ring capacity reached after {} frames",
                written
            ),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Frame(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(from: io::Error) -> Error {
        Error::Io(from)
    }
}

impl From<FrameError> for Error {
    fn from(from: FrameError) -> Error {
        Error::Frame(from)
    }
}

/// A specialized [`Result`] type for TMFRAME operations.
///
/// [`Result`]: https://doc.rust-lang.org/stable/std/result/enum.Result.html
pub type Result<T> = result::Result<T, Error>;
