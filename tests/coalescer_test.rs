//! Coalescer behavior under realistic producer patterns

use async_trait::async_trait;
use bson::{doc, Document};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use undercurrent::coalescer::{
    BatchCoalescer, CoalescerConfig, FlushHandler, OpKind, WriteIntent,
};
use undercurrent::types::Result;

/// Handler that records the size of every dispatched group
struct SizeRecorder {
    sizes: Mutex<Vec<usize>>,
    delay: Option<Duration>,
}

impl SizeRecorder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            sizes: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            sizes: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }
}

#[async_trait]
impl FlushHandler for SizeRecorder {
    async fn apply(&self, _kind: OpKind, _group: &str, payloads: Vec<Document>) -> Result<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.sizes.lock().await.push(payloads.len());
        Ok(())
    }
}

fn build(max_operations: usize, handler: Arc<SizeRecorder>) -> Arc<BatchCoalescer> {
    Arc::new(
        BatchCoalescer::new(CoalescerConfig {
            max_operations,
            flush_delay: Duration::from_millis(40),
        })
        .with_handler(OpKind::Update, "content", handler),
    )
}

fn intent(key: String) -> WriteIntent {
    WriteIntent::update("content", key, doc! { "v": 1 })
}

#[tokio::test]
async fn test_150_distinct_keys_flush_in_two_cycles() {
    let recorder = SizeRecorder::new();
    let coalescer = build(100, Arc::clone(&recorder));

    for i in 0..150 {
        coalescer.enqueue(intent(format!("key-{i}"))).await;
    }
    coalescer.flush().await;

    assert_eq!(*recorder.sizes.lock().await, vec![100, 50]);
}

#[tokio::test]
async fn test_duplicate_heavy_producers_collapse_before_flush() {
    let recorder = SizeRecorder::new();
    let coalescer = build(1000, Arc::clone(&recorder));

    // 20 producers hammering the same 5 keys concurrently
    let mut tasks = Vec::new();
    for p in 0..20 {
        let coalescer = Arc::clone(&coalescer);
        tasks.push(tokio::spawn(async move {
            for i in 0..50 {
                coalescer
                    .enqueue(intent(format!("key-{}", (p + i) % 5)))
                    .await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    coalescer.flush().await;

    // 1000 enqueues over 5 identities collapse to 5 buffered operations
    assert_eq!(*recorder.sizes.lock().await, vec![5]);
}

#[tokio::test]
async fn test_enqueue_during_slow_dispatch_lands_in_fresh_buffer() {
    let recorder = SizeRecorder::slow(Duration::from_millis(100));
    let coalescer = build(1000, Arc::clone(&recorder));

    coalescer.enqueue(intent("a".into())).await;
    coalescer.enqueue(intent("b".into())).await;

    // Kick off a flush and enqueue while the handler is still sleeping
    let flusher = {
        let coalescer = Arc::clone(&coalescer);
        tokio::spawn(async move { coalescer.flush().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    coalescer.enqueue(intent("c".into())).await;
    assert_eq!(coalescer.pending_len().await, 1);

    flusher.await.unwrap();
    // The timer armed by the mid-dispatch enqueue flushes "c" on its own;
    // give its (slow) handler time to finish
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(*recorder.sizes.lock().await, vec![2, 1]);
}

#[tokio::test]
async fn test_timer_fires_once_for_many_small_enqueues() {
    let recorder = SizeRecorder::new();
    let coalescer = build(1000, Arc::clone(&recorder));

    for i in 0..10 {
        coalescer.enqueue(intent(format!("key-{i}"))).await;
    }
    assert!(coalescer.timer_armed().await);

    tokio::time::sleep(Duration::from_millis(120)).await;

    // One timer, one flush, all ten operations
    assert_eq!(*recorder.sizes.lock().await, vec![10]);
    assert!(!coalescer.timer_armed().await);
}
