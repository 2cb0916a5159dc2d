//! End-to-end pipeline scenarios: streams dealt across several inputs,
//! merged back into time order, and deduplicated, checked byte-for-byte.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::io::Cursor;
use tmframe::{
    dedup::{dedup, Deduper},
    frame::{Frame, EV_MSGP_KAFKA, EV_TWO64, EV_UTF8, EV_ZERO},
    reader::{BufferedFrameReader, FrameReader},
    writer::FrameWriter,
    Error,
};

// 2016-02-16T00:00:00Z
const T0: i64 = 1_455_580_800_000_000_000;
const SECOND: i64 = 1_000_000_000;

/// Frames of mixed variants and randomly varying payload sizes, one per
/// second starting at T0.
fn gen_test_frames(rng: &mut StdRng, n: usize) -> Vec<Frame> {
    (0..n)
        .map(|i| {
            let tm = T0 + i as i64 * SECOND;
            match i % 3 {
                0 => {
                    let len = rng.gen_range(0, 254);
                    let data: Vec<u8> = (0..len).map(|j| j as u8).collect();
                    Frame::new(tm, EV_MSGP_KAFKA, 0.0, 0, &data).unwrap()
                }
                1 => Frame::new(tm, EV_ZERO, 0.0, 0, &[]).unwrap(),
                _ => Frame::new(tm, EV_TWO64, i as f64, i as i64, &[]).unwrap(),
            }
        })
        .collect()
}

fn encode_all(frames: &[Frame]) -> Vec<u8> {
    let mut by = Vec::new();
    for frame in frames {
        frame.encode_into(&mut by);
    }
    by
}

#[test]
fn three_way_merge_reassembles_the_dealt_stream() {
    let mut rng = StdRng::seed_from_u64(0x746d_6672_616d_6531);

    // 100 Two64 frames at 1s, 2s, .. 100s, dealt randomly into 3 piles
    let frames: Vec<Frame> = (1..=100)
        .map(|i| Frame::new(T0 + i * SECOND, EV_TWO64, i as f64, i, &[]).unwrap())
        .collect();

    let mut piles: Vec<Vec<u8>> = vec![Vec::new(); 3];
    for frame in &frames {
        let k = rng.gen_range(0, 3);
        frame.encode_into(&mut piles[k]);
    }

    let mut inputs: Vec<BufferedFrameReader<Cursor<Vec<u8>>>> = piles
        .into_iter()
        .map(|by| BufferedFrameReader::new(Cursor::new(by), 64 * 1024))
        .collect();

    let mut fw = FrameWriter::new(Vec::new());
    fw.merge(&mut inputs).unwrap();

    // byte-exact: merging equals writing the frames in ascending order
    assert_eq!(fw.into_inner(), encode_all(&frames));
}

#[test]
fn merge_of_mixed_variant_streams_is_time_sorted() {
    let mut rng = StdRng::seed_from_u64(7);
    let frames = gen_test_frames(&mut rng, 60);

    let mut piles: Vec<Vec<u8>> = vec![Vec::new(); 5];
    for frame in &frames {
        let k = rng.gen_range(0, 5);
        frame.encode_into(&mut piles[k]);
    }
    let mut inputs: Vec<BufferedFrameReader<Cursor<Vec<u8>>>> = piles
        .into_iter()
        .map(|by| BufferedFrameReader::new(Cursor::new(by), 64 * 1024))
        .collect();

    let mut fw = FrameWriter::new(Vec::new());
    fw.merge(&mut inputs).unwrap();
    assert_eq!(fw.into_inner(), encode_all(&frames));
}

#[test]
fn dedup_restores_a_duplicate_riddled_stream() {
    let mut rng = StdRng::seed_from_u64(30);
    let n = 100;
    let frames = gen_test_frames(&mut rng, n);

    // the clean stream first, then duplicates drawn from earlier frames
    let mut dirty = encode_all(&frames);
    let extra = n * 4;
    for i in 1..=extra {
        let pick = rng.gen_range(0, (i % (n - 1)) + 1);
        dirty.extend_from_slice(&frames[pick].encode());
    }

    // window spanning the whole stream: output equals the clean stream
    let mut out = Vec::new();
    dedup(Cursor::new(dirty), &mut out, n + extra + 1).unwrap();
    assert_eq!(out, encode_all(&frames));
}

#[test]
fn detect_only_pipeline_stops_at_the_first_duplicate() {
    let a = Frame::new(T0, EV_UTF8, 0.0, 0, b"a").unwrap();
    let b = Frame::new(T0 + SECOND, EV_UTF8, 0.0, 0, b"b").unwrap();
    let stream = encode_all(&[a.clone(), b, a]);

    let err = Deduper::new(16)
        .detect_only(true)
        .run(Cursor::new(stream), Vec::new())
        .unwrap_err();
    assert!(matches!(err, Error::DupDetected { index: 2, .. }));
}

#[test]
fn merged_output_reads_back_frame_by_frame() {
    let mut rng = StdRng::seed_from_u64(99);
    let frames = gen_test_frames(&mut rng, 30);

    let mut piles: Vec<Vec<u8>> = vec![Vec::new(); 2];
    for frame in &frames {
        let k = rng.gen_range(0, 2);
        frame.encode_into(&mut piles[k]);
    }
    let mut inputs: Vec<BufferedFrameReader<Cursor<Vec<u8>>>> = piles
        .into_iter()
        .map(|by| BufferedFrameReader::new(Cursor::new(by), 64 * 1024))
        .collect();

    let mut fw = FrameWriter::new(Vec::new());
    fw.merge(&mut inputs).unwrap();

    let mut fr = FrameReader::new(Cursor::new(fw.into_inner()), 64 * 1024);
    let merged = fr.read_all().unwrap();
    assert_eq!(merged, frames);
}
