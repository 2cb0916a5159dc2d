//! k-way time-sorted merging of frame streams.

use crate::{
    error::{Error, Result},
    reader::BufferedFrameReader,
    writer::FrameWriter,
};
use log::debug;
use std::io::{Read, Write};

/// Frames accumulate in the writer between flushes; cap the backlog so a
/// long merge stays in bounded memory.
const FLUSH_EVERY: usize = 1000;

impl<W: Write> FrameWriter<W> {
    /// Merges `inputs` into timestamp order, writing the combined
    /// sequence to this writer's sink.
    ///
    /// Every input must already be sorted by `tm()` internally; the merge
    /// never reorders frames within one input. Emission order is
    /// `(tm, input index)` lexicographic, so when heads tie on the
    /// timestamp the earliest input wins. Once a single input remains its
    /// remaining bytes are copied through wholesale, bypassing per-frame
    /// handling.
    ///
    /// The first error from any input or from the sink aborts the merge.
    pub fn merge<R: Read>(&mut self, inputs: &mut [BufferedFrameReader<R>]) -> Result<()> {
        let mut live: Vec<usize> = Vec::with_capacity(inputs.len());
        for i in 0..inputs.len() {
            match inputs[i].peek() {
                Ok(_) => live.push(i),
                Err(Error::Eof) => debug!("merge: input {} empty at start", i),
                Err(err) => return Err(err),
            }
        }

        let mut emitted = 0usize;
        loop {
            if live.is_empty() {
                return self.flush();
            }
            if live.len() == 1 {
                let idx = live[0];
                debug!("merge: down to input {}, copying it through", idx);
                inputs[idx].write_to(self)?;
                return Ok(());
            }

            // pick the earliest head; ties go to the lowest input index
            let mut best = live[0];
            let mut best_tm = inputs[best].peek()?.tm();
            for &i in live.iter().skip(1) {
                let tm = inputs[i].peek()?.tm();
                if tm < best_tm {
                    best = i;
                    best_tm = tm;
                }
            }

            let frame = inputs[best].read_one()?;
            self.append(frame);
            emitted += 1;
            if emitted % FLUSH_EVERY == 0 {
                self.flush()?;
            }

            match inputs[best].peek() {
                Ok(_) => {}
                Err(Error::Eof) => {
                    debug!("merge: input {} exhausted", best);
                    live.retain(|&i| i != best);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Frame, EV_ONE_FLOAT64, EV_TWO64};
    use std::io::Cursor;

    const T0: i64 = 1_455_580_800_000_000_000;
    const SECOND: i64 = 1_000_000_000;

    fn input(frames: &[Frame]) -> BufferedFrameReader<Cursor<Vec<u8>>> {
        let mut by = Vec::new();
        for frame in frames {
            frame.encode_into(&mut by);
        }
        BufferedFrameReader::new(Cursor::new(by), 64 * 1024)
    }

    #[test]
    fn two_way_merge_interleaves_by_timestamp() {
        let evens: Vec<Frame> = (0..10)
            .step_by(2)
            .map(|i| Frame::new(T0 + i * SECOND, EV_ONE_FLOAT64, i as f64, 0, &[]).unwrap())
            .collect();
        let odds: Vec<Frame> = (1..10)
            .step_by(2)
            .map(|i| Frame::new(T0 + i * SECOND, EV_ONE_FLOAT64, i as f64, 0, &[]).unwrap())
            .collect();

        let mut fw = FrameWriter::new(Vec::new());
        fw.merge(&mut [input(&evens), input(&odds)]).unwrap();

        let mut expected = Vec::new();
        for i in 0..10 {
            Frame::new(T0 + i * SECOND, EV_ONE_FLOAT64, i as f64, 0, &[])
                .unwrap()
                .encode_into(&mut expected);
        }
        assert_eq!(fw.into_inner(), expected);
    }

    #[test]
    fn ties_resolve_to_the_earliest_input() {
        let a = Frame::new(T0, EV_TWO64, 0.0, 0, &[]).unwrap();
        let b = Frame::new(T0, EV_TWO64, 1.0, 1, &[]).unwrap();
        let c = Frame::new(T0, EV_TWO64, 2.0, 2, &[]).unwrap();

        let mut fw = FrameWriter::new(Vec::new());
        fw.merge(&mut [
            input(std::slice::from_ref(&a)),
            input(std::slice::from_ref(&b)),
            input(std::slice::from_ref(&c)),
        ])
        .unwrap();

        let mut expected = a.encode();
        expected.extend_from_slice(&b.encode());
        expected.extend_from_slice(&c.encode());
        assert_eq!(fw.into_inner(), expected);
    }

    #[test]
    fn empty_inputs_are_dropped_up_front() {
        let frames: Vec<Frame> = (0..3)
            .map(|i| Frame::new(T0 + i * SECOND, EV_ONE_FLOAT64, i as f64, 0, &[]).unwrap())
            .collect();

        let mut fw = FrameWriter::new(Vec::new());
        fw.merge(&mut [input(&[]), input(&frames), input(&[])]).unwrap();

        let mut expected = Vec::new();
        for frame in &frames {
            frame.encode_into(&mut expected);
        }
        assert_eq!(fw.into_inner(), expected);
    }

    #[test]
    fn merging_nothing_writes_nothing() {
        let mut fw = FrameWriter::new(Vec::new());
        fw.merge::<Cursor<Vec<u8>>>(&mut []).unwrap();
        assert!(fw.into_inner().is_empty());
    }
}
