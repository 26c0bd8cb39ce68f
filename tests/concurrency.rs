//! Concurrent writers, readers, and subscribers against one shared board.

use postboard::{
    Board, BoardConfig, CommentId, LogStore, LogStoreConfig, MemoryStore, Page, Storage,
};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

const WRITERS: usize = 16;
const PER_WRITER: usize = 25;

fn hammer(board: Arc<Board>) {
    let post = board.create_post("Busy", "Lots of traffic", "A", true).unwrap();
    let barrier = Arc::new(Barrier::new(WRITERS));

    let handles: Vec<_> = (0..WRITERS)
        .map(|w| {
            let board = Arc::clone(&board);
            let barrier = Arc::clone(&barrier);
            let post_id = post.id.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..PER_WRITER)
                    .map(|i| {
                        board
                            .create_comment(&post_id, None, &format!("writer{}", w), &format!("{}", i))
                            .unwrap()
                            .id
                    })
                    .collect::<Vec<CommentId>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate comment identity");
        }
    }

    let total = WRITERS * PER_WRITER;
    assert_eq!(ids.len(), total);

    let listed = board.comments(&post.id, Page::first(total)).unwrap();
    assert_eq!(listed.len(), total);
    let listed_ids: HashSet<_> = listed.iter().map(|c| c.id.clone()).collect();
    assert_eq!(listed_ids, ids);

    // Each writer's own comments keep their relative order.
    for w in 0..WRITERS {
        let author = format!("writer{}", w);
        let texts: Vec<usize> = listed
            .iter()
            .filter(|c| c.author == author)
            .map(|c| c.text.parse().unwrap())
            .collect();
        assert_eq!(texts, (0..PER_WRITER).collect::<Vec<_>>());
    }
}

#[test]
fn test_concurrent_creates_memory() {
    hammer(Arc::new(Board::in_memory()));
}

#[test]
fn test_concurrent_creates_log() {
    let dir = TempDir::new().unwrap();
    let store = LogStore::create(LogStoreConfig {
        path: dir.path().join("board"),
        ..Default::default()
    })
    .unwrap();
    hammer(Arc::new(Board::new(Arc::new(store), BoardConfig::default())));
}

#[test]
fn test_readers_never_see_gaps() {
    let store = Arc::new(MemoryStore::new());
    let board = Arc::new(Board::new(store.clone(), BoardConfig::default()));
    let post = board.create_post("T", "C", "A", true).unwrap();

    let writer = {
        let board = Arc::clone(&board);
        let post_id = post.id.clone();
        thread::spawn(move || {
            for i in 0..500 {
                board.create_comment(&post_id, None, "w", &i.to_string()).unwrap();
            }
        })
    };

    // Whatever prefix a reader sees is contiguous and in creation order.
    let reader = {
        let store = Arc::clone(&store);
        let post_id = post.id.clone();
        thread::spawn(move || {
            for _ in 0..200 {
                let seen = store.comments_by_post(&post_id, Page::first(1000)).unwrap();
                for (expected, comment) in seen.iter().enumerate() {
                    assert_eq!(comment.text, expected.to_string());
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.stats().comment_count, 500);
}

#[test]
fn test_slow_subscriber_does_not_block_writers() {
    let board = Arc::new(Board::in_memory());
    let post = board.create_post("T", "C", "A", true).unwrap();

    // Never read from this one.
    let _stalled = board.subscribe(&post.id).unwrap();
    let live = board.subscribe(&post.id).unwrap();

    let writer = {
        let board = Arc::clone(&board);
        let post_id = post.id.clone();
        thread::spawn(move || {
            for i in 0..200 {
                board.create_comment(&post_id, None, "w", &i.to_string()).unwrap();
            }
        })
    };
    writer.join().unwrap();

    // The live subscriber got at least one comment; the rest may be dropped.
    let first = live.recv_timeout(Duration::from_secs(1)).unwrap();
    assert_eq!(first.post_id, post.id);
    assert_eq!(board.notifier().subscriber_count(&post.id), 2);
}

#[test]
fn test_subscribe_and_cancel_while_publishing() {
    let board = Arc::new(Board::in_memory());
    let post = board.create_post("T", "C", "A", true).unwrap();

    let writer = {
        let board = Arc::clone(&board);
        let post_id = post.id.clone();
        thread::spawn(move || {
            for i in 0..300 {
                board.create_comment(&post_id, None, "w", &i.to_string()).unwrap();
            }
        })
    };

    let churn: Vec<_> = (0..4)
        .map(|_| {
            let board = Arc::clone(&board);
            let post_id = post.id.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let handle = board.subscribe(&post_id).unwrap();
                    let _ = handle.try_recv();
                    handle.cancel();
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for handle in churn {
        handle.join().unwrap();
    }

    assert_eq!(board.notifier().total_subscribers(), 0);
    assert_eq!(board.stats().comment_count, 300);
}
