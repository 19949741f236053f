use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use image::codecs::jpeg::JpegEncoder;
use jpeg_qtable_fingerprint::{
    build_database_with_pool, match_fingerprint, BuildOptions, FileFingerprint,
    FingerprintThreadPool, JpegHeader, MatchOptions, ParseOptions, QuantDatabase,
};

fn synthetic_jpeg(quality: u8, size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 3) as usize);
    for y in 0..size {
        for x in 0..size {
            pixels.extend_from_slice(&[(x ^ y) as u8, (x * 3) as u8, (y * 5) as u8]);
        }
    }

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(&pixels, size, size, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// single thread pool that creates just one threadpool thread
/// useful for benchmarks to measure total end-to-end runtime
struct SingleThreadPool {
    sender: std::sync::Mutex<std::sync::mpsc::Sender<Box<dyn FnOnce() + Send + 'static>>>,
}

impl SingleThreadPool {
    pub fn new() -> Self {
        let (tx, rx) = std::sync::mpsc::channel::<Box<dyn FnOnce() + Send + 'static>>();

        std::thread::spawn(move || {
            while let Ok(f) = rx.recv() {
                f();
            }
        });

        SingleThreadPool {
            sender: std::sync::Mutex::new(tx),
        }
    }
}

impl FingerprintThreadPool for SingleThreadPool {
    fn max_parallelism(&self) -> usize {
        1
    }

    fn run(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.sender.lock().unwrap().send(f).unwrap();
    }
}

fn header_benches(c: &mut Criterion) {
    let jpeg = synthetic_jpeg(85, 512);

    c.bench_function("header parse early stop", |b| {
        b.iter(|| JpegHeader::parse(&jpeg, &ParseOptions::default()))
    });

    c.bench_function("header parse exhaustive", |b| {
        b.iter(|| JpegHeader::parse(&jpeg, &ParseOptions::exhaustive()))
    });

    c.bench_function("fingerprint from bytes", |b| {
        b.iter(|| FileFingerprint::from_bytes(&jpeg, &ParseOptions::default()))
    });
}

fn database_benches(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    for label in ["alpha", "beta", "gamma"] {
        let sub = dir.path().join(label);
        std::fs::create_dir_all(&sub).unwrap();
        for q in (50..=95).step_by(5) {
            std::fs::write(sub.join(format!("q{q}.jpg")), synthetic_jpeg(q, 64)).unwrap();
        }
    }

    let thread_pool = SingleThreadPool::new();
    let options = BuildOptions {
        workers: 2,
        ..BuildOptions::default()
    };

    c.bench_function("build database", |b| {
        b.iter(|| build_database_with_pool(dir.path(), &options, &thread_pool).unwrap())
    });

    let (db, _) = build_database_with_pool(dir.path(), &options, &thread_pool).unwrap();
    let mut big = QuantDatabase::new(db.dataset_root.clone());
    for _ in 0..1000 {
        big.items.extend(db.items.iter().cloned());
    }
    let query = FileFingerprint::from_bytes(&synthetic_jpeg(80, 64), &ParseOptions::default());

    c.bench_function("match 30k records", |b| {
        b.iter(|| match_fingerprint(&query.fingerprint, &big, &MatchOptions::default()).unwrap())
    });

    c.bench_function("match 30k records sharded", |b| {
        let options = MatchOptions {
            threads: 4,
            ..MatchOptions::default()
        };
        b.iter(|| match_fingerprint(&query.fingerprint, &big, &options).unwrap())
    });
}

criterion_group! {
   name = group1;
   config = Criterion::default().warm_up_time(Duration::from_secs(2));
   targets = header_benches
}

criterion_group!(group2, database_benches);

criterion_main!(group1, group2);
