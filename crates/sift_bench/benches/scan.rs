use criterion::{criterion_group, criterion_main, Criterion, black_box};
use sift_core::{CollectionOptions, Cursor, DynSegment, SegmentBuilder, Snapshot};
use std::sync::Arc;

fn segment(n: usize, stride: usize, offset: usize) -> Arc<DynSegment> {
    let mut b = SegmentBuilder::new();
    for i in (offset..n).step_by(stride) {
        let v: u64 = rand::random();
        b.set(format!("key{i:08}").as_bytes(), &v.to_le_bytes());
    }
    Arc::new(b.build().expect("unique keys"))
}

fn scan_all(snap: &Snapshot) -> usize {
    let mut it = snap.start_iterator(None, None);
    let mut n = 0;
    while it.current().is_ok() {
        n += 1;
        if it.next().is_err() { break; }
    }
    let _ = it.close();
    n
}

fn bench_scan(c: &mut Criterion) {
    let opts = Arc::new(CollectionOptions::default());
    let single = Snapshot::new(vec![segment(100_000, 1, 0)], opts.clone());
    let stacked = Snapshot::new(vec![segment(100_000, 2, 0), segment(100_000, 2, 1)], opts);
    c.bench_function("scan_single_segment", |bch| bch.iter(|| black_box(scan_all(&single))));
    c.bench_function("scan_two_segments", |bch| bch.iter(|| black_box(scan_all(&stacked))));
}

criterion_group!(benches, bench_scan);
criterion_main!(benches);
