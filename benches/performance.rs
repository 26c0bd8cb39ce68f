//! Performance benchmarks for the board.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use postboard::{
    build_thread, Board, BoardConfig, LogStore, LogStoreConfig, MemoryStore, NewComment, Page,
    Post, Storage,
};
use std::sync::Arc;
use tempfile::TempDir;

fn create_log_store(dir: &TempDir) -> LogStore {
    LogStore::create(LogStoreConfig {
        path: dir.path().join("board"),
        ..Default::default()
    })
    .unwrap()
}

fn seeded_post(store: &dyn Storage, comments: usize) -> Post {
    let post = Post::new("Bench", "Body", "bench", true);
    store.create_post(post.clone()).unwrap();
    for i in 0..comments {
        store
            .create_comment(NewComment::new(post.id.clone(), "bench", format!("{}", i)))
            .unwrap();
    }
    post
}

/// Benchmark comment creation per backend
fn bench_comment_create(c: &mut Criterion) {
    let mut group = c.benchmark_group("comment_create");

    let memory = MemoryStore::new();
    let post = seeded_post(&memory, 0);
    group.bench_function("memory", |b| {
        b.iter(|| {
            black_box(
                memory
                    .create_comment(NewComment::new(post.id.clone(), "bench", "hello"))
                    .unwrap(),
            );
        });
    });

    let dir = TempDir::new().unwrap();
    let log = create_log_store(&dir);
    let post = seeded_post(&log, 0);
    group.bench_function("log", |b| {
        b.iter(|| {
            black_box(
                log.create_comment(NewComment::new(post.id.clone(), "bench", "hello"))
                    .unwrap(),
            );
        });
    });

    group.finish();
}

/// Benchmark a page read deep into a long listing
fn bench_pagination(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagination");

    for size in [100, 1000, 10000] {
        group.bench_with_input(BenchmarkId::new("root_comments", size), &size, |b, &size| {
            let store = MemoryStore::new();
            let post = seeded_post(&store, size);
            let page = Page::new(20, size / 2);

            b.iter(|| {
                black_box(store.comments_by_post(&post.id, page).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark publishing to a crowd of subscribers
fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    for subscribers in [1, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &subscribers| {
                let board = Board::in_memory();
                let post = board.create_post("T", "C", "A", true).unwrap();
                let handles: Vec<_> = (0..subscribers)
                    .map(|_| board.subscribe(&post.id).unwrap())
                    .collect();
                let comment = board.create_comment(&post.id, None, "A", "seed").unwrap();

                b.iter(|| {
                    black_box(board.notifier().publish(&post.id, &comment));
                    for handle in &handles {
                        let _ = handle.try_recv();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark assembling a reply tree
fn bench_thread(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread");

    for depth in [5, 50] {
        group.bench_with_input(BenchmarkId::new("chain_depth", depth), &depth, |b, &depth| {
            let store = Arc::new(MemoryStore::new());
            let board = Board::new(store.clone(), BoardConfig::default());
            let post = board.create_post("T", "C", "A", true).unwrap();

            // A few wide roots, each with a reply chain.
            for _ in 0..10 {
                let mut parent = board.create_comment(&post.id, None, "A", "root").unwrap();
                for _ in 0..depth {
                    parent = board
                        .create_comment(&post.id, Some(&parent.id), "A", "reply")
                        .unwrap();
                }
            }

            b.iter(|| {
                black_box(build_thread(store.as_ref(), &post.id, 100, None).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_comment_create,
    bench_pagination,
    bench_publish,
    bench_thread,
);

criterion_main!(benches);
