use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tmframe::frame::{Frame, FrameView, EV_TWO64, EV_UTF8};

const T0: i64 = 1_455_580_800_000_000_000;

fn bench_encode(c: &mut Criterion) {
    let two64 = Frame::new(T0, EV_TWO64, 3.25, -9, &[]).unwrap();
    let ude = Frame::new(T0, EV_UTF8, 0.0, 0, &[0x5a; 256]).unwrap();

    let mut buf = Vec::with_capacity(512);
    c.bench_function("encode_two64", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&two64).encode_into(&mut buf);
            black_box(&buf);
        })
    });
    c.bench_function("encode_ude_256", |b| {
        b.iter(|| {
            buf.clear();
            black_box(&ude).encode_into(&mut buf);
            black_box(&buf);
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let two64 = Frame::new(T0, EV_TWO64, 3.25, -9, &[]).unwrap().encode();
    let ude = Frame::new(T0, EV_UTF8, 0.0, 0, &[0x5a; 256]).unwrap().encode();

    c.bench_function("decode_two64_view", |b| {
        b.iter(|| FrameView::decode(black_box(&two64)).unwrap())
    });
    c.bench_function("decode_ude_256_view", |b| {
        b.iter(|| FrameView::decode(black_box(&ude)).unwrap())
    });
    c.bench_function("decode_ude_256_owned", |b| {
        b.iter(|| Frame::decode(black_box(&ude)).unwrap())
    });
}

fn bench_hash(c: &mut Criterion) {
    let ude = Frame::new(T0, EV_UTF8, 0.0, 0, &[0x5a; 256]).unwrap();
    c.bench_function("content_hash_ude_256", |b| {
        b.iter(|| black_box(&ude).content_hash())
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_hash);
criterion_main!(benches);
