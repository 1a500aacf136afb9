//! Batch coalescer for duplicate-prone write intents
//!
//! High-frequency counter bumps and notification writes arrive faster than
//! they are worth persisting individually. The coalescer buffers intents
//! keyed by `(kind, target group, dedupe key)` so repeats collapse to the
//! latest payload, then flushes the whole buffer as grouped bulk operations
//! once a size threshold or delay timer fires.
//!
//! Flush swaps the buffer out atomically, so producers keep enqueuing into a
//! fresh buffer while dispatch is in flight. Dispatch is at-most-once: a
//! failed group is logged and dropped, never requeued.

mod store;

pub use store::ContentUpdateHandler;

use async_trait::async_trait;
use bson::Document;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::logging::EventLog;
use crate::types::Result;

/// Kind of storage operation a write intent represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Create => write!(f, "create"),
            OpKind::Update => write!(f, "update"),
            OpKind::Delete => write!(f, "delete"),
        }
    }
}

/// A pending write against one target group
#[derive(Debug, Clone)]
pub struct WriteIntent {
    pub kind: OpKind,
    /// Target group, typically a collection name
    pub target_group: String,
    /// Collapse key; two intents with the same identity keep the later payload
    pub dedupe_key: String,
    pub payload: Document,
}

impl WriteIntent {
    pub fn update(target_group: impl Into<String>, dedupe_key: impl Into<String>, payload: Document) -> Self {
        Self {
            kind: OpKind::Update,
            target_group: target_group.into(),
            dedupe_key: dedupe_key.into(),
            payload,
        }
    }

    fn identity(&self) -> Identity {
        (self.kind, self.target_group.clone(), self.dedupe_key.clone())
    }
}

/// Collapse identity of an intent
type Identity = (OpKind, String, String);

/// Dispatch key of a flush group
type GroupKey = (OpKind, String);

/// Receives one flush group's payloads
///
/// Handlers are invoked independently per group; an error here is contained
/// to that group and the operations are not retried.
#[async_trait]
pub trait FlushHandler: Send + Sync {
    async fn apply(&self, kind: OpKind, target_group: &str, payloads: Vec<Document>)
        -> Result<()>;
}

/// Coalescer tuning knobs
#[derive(Debug, Clone)]
pub struct CoalescerConfig {
    /// Buffer size that triggers a synchronous flush on enqueue
    pub max_operations: usize,
    /// Delay before a partially filled buffer is flushed
    pub flush_delay: Duration,
}

impl Default for CoalescerConfig {
    fn default() -> Self {
        Self {
            max_operations: 100,
            flush_delay: Duration::from_millis(2000),
        }
    }
}

/// Buffer plus its single pending flush timer
struct BufferState {
    pending: HashMap<Identity, WriteIntent>,
    timer: Option<JoinHandle<()>>,
}

/// In-process write-intent buffer with deduplication and timed flushing
pub struct BatchCoalescer {
    config: CoalescerConfig,
    state: Mutex<BufferState>,
    handlers: HashMap<GroupKey, Arc<dyn FlushHandler>>,
    events: EventLog,
}

impl BatchCoalescer {
    pub fn new(config: CoalescerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BufferState {
                pending: HashMap::new(),
                timer: None,
            }),
            handlers: HashMap::new(),
            events: EventLog::disabled("coalescer"),
        }
    }

    /// Register the handler for one `(kind, target group)` pair
    pub fn with_handler(
        mut self,
        kind: OpKind,
        target_group: impl Into<String>,
        handler: Arc<dyn FlushHandler>,
    ) -> Self {
        self.handlers.insert((kind, target_group.into()), handler);
        self
    }

    /// Attach the observability event log
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    /// Insert or replace the buffered intent at its identity.
    ///
    /// Reaching `max_operations` flushes synchronously before returning;
    /// otherwise a single flush timer is armed if none is running.
    pub async fn enqueue(self: &Arc<Self>, intent: WriteIntent) {
        let threshold_reached = {
            let mut state = self.state.lock().await;
            state.pending.insert(intent.identity(), intent);

            if state.pending.len() >= self.config.max_operations {
                true
            } else {
                if state.timer.is_none() {
                    let coalescer = Arc::clone(self);
                    let delay = self.config.flush_delay;
                    state.timer = Some(tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        // Clear our own handle first so flush() doesn't abort
                        // the task that is about to perform the dispatch
                        coalescer.state.lock().await.timer = None;
                        coalescer.flush().await;
                    }));
                }
                false
            }
        };

        if threshold_reached {
            self.flush().await;
        }
    }

    /// Swap out the buffer and dispatch its contents as grouped operations.
    ///
    /// New enqueues land in a fresh buffer while dispatch runs. No-op on an
    /// empty buffer. Each group's handler failure is logged and contained.
    pub async fn flush(&self) {
        let captured = {
            let mut state = self.state.lock().await;
            if let Some(timer) = state.timer.take() {
                timer.abort();
            }
            std::mem::take(&mut state.pending)
        };

        if captured.is_empty() {
            return;
        }

        let mut groups: HashMap<GroupKey, Vec<Document>> = HashMap::new();
        for intent in captured.into_values() {
            groups
                .entry((intent.kind, intent.target_group))
                .or_default()
                .push(intent.payload);
        }

        for ((kind, group), payloads) in groups {
            let count = payloads.len() as u64;

            let Some(handler) = self.handlers.get(&(kind, group.clone())) else {
                // Wiring gap, not a data problem: surface and drop the group
                warn!(
                    "No flush handler registered for {} on '{}'; dropping {} operations",
                    kind, group, count
                );
                self.events
                    .emit(
                        self.events
                            .event(crate::logging::EventKind::GroupDropped)
                            .with_group(group)
                            .with_count(count),
                    )
                    .await;
                continue;
            };

            match handler.apply(kind, &group, payloads).await {
                Ok(()) => {
                    debug!("Flushed {} {} operations for '{}'", count, kind, group);
                    self.events.log_flush(&group, count, None).await;
                }
                Err(e) => {
                    error!(
                        "Flush of {} {} operations for '{}' failed: {}",
                        count, kind, group, e
                    );
                    self.events.log_flush(&group, count, Some(&e.to_string())).await;
                }
            }
        }
    }

    /// Number of currently buffered intents
    pub async fn pending_len(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    /// Whether a flush timer is currently armed
    pub async fn timer_armed(&self) -> bool {
        self.state.lock().await.timer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UndercurrentError;
    use bson::doc;

    /// Records every group dispatch it receives
    struct RecordingHandler {
        calls: Mutex<Vec<(OpKind, String, Vec<Document>)>>,
        fail: bool,
    }

    impl RecordingHandler {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                fail: true,
            })
        }
    }

    #[async_trait]
    impl FlushHandler for RecordingHandler {
        async fn apply(
            &self,
            kind: OpKind,
            target_group: &str,
            payloads: Vec<Document>,
        ) -> Result<()> {
            self.calls
                .lock()
                .await
                .push((kind, target_group.to_string(), payloads));
            if self.fail {
                Err(UndercurrentError::Database("simulated failure".into()))
            } else {
                Ok(())
            }
        }
    }

    fn coalescer(max_operations: usize, handler: Arc<RecordingHandler>) -> Arc<BatchCoalescer> {
        Arc::new(
            BatchCoalescer::new(CoalescerConfig {
                max_operations,
                flush_delay: Duration::from_millis(50),
            })
            .with_handler(OpKind::Update, "content", handler),
        )
    }

    fn intent(key: &str, n: i32) -> WriteIntent {
        WriteIntent::update("content", key, doc! { "n": n })
    }

    #[tokio::test]
    async fn test_identical_identity_keeps_later_payload() {
        let handler = RecordingHandler::new();
        let c = coalescer(100, Arc::clone(&handler));

        c.enqueue(intent("a", 1)).await;
        c.enqueue(intent("a", 2)).await;
        assert_eq!(c.pending_len().await, 1);

        c.flush().await;

        let calls = handler.calls.lock().await;
        assert_eq!(calls.len(), 1);
        let (_, _, payloads) = &calls[0];
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].get_i32("n").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_threshold_flushes_without_waiting_for_timer() {
        let handler = RecordingHandler::new();
        let c = coalescer(3, Arc::clone(&handler));

        c.enqueue(intent("a", 1)).await;
        c.enqueue(intent("b", 2)).await;
        assert!(handler.calls.lock().await.is_empty());

        c.enqueue(intent("c", 3)).await;

        let calls = handler.calls.lock().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2.len(), 3);
        drop(calls);

        assert_eq!(c.pending_len().await, 0);
        assert!(!c.timer_armed().await);
    }

    #[tokio::test]
    async fn test_150_intents_flush_as_100_then_50() {
        let handler = RecordingHandler::new();
        let c = coalescer(100, Arc::clone(&handler));

        for i in 0..150 {
            c.enqueue(intent(&format!("key-{i}"), i)).await;
        }
        c.flush().await;

        let calls = handler.calls.lock().await;
        let sizes: Vec<usize> = calls.iter().map(|(_, _, p)| p.len()).collect();
        assert_eq!(sizes, vec![100, 50]);
    }

    #[tokio::test]
    async fn test_timer_flushes_partial_buffer() {
        let handler = RecordingHandler::new();
        let c = coalescer(100, Arc::clone(&handler));

        c.enqueue(intent("a", 1)).await;
        assert!(c.timer_armed().await);

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(handler.calls.lock().await.len(), 1);
        assert_eq!(c.pending_len().await, 0);
        assert!(!c.timer_armed().await);
    }

    #[tokio::test]
    async fn test_buffer_empty_after_handler_failure() {
        let handler = RecordingHandler::failing();
        let c = coalescer(100, Arc::clone(&handler));

        c.enqueue(intent("a", 1)).await;
        c.flush().await;

        // At-most-once: nothing requeued, timer cleared
        assert_eq!(c.pending_len().await, 0);
        assert!(!c.timer_armed().await);
        assert_eq!(handler.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_one_group_failure_does_not_block_others() {
        let good = RecordingHandler::new();
        let bad = RecordingHandler::failing();
        let c = Arc::new(
            BatchCoalescer::new(CoalescerConfig {
                max_operations: 100,
                flush_delay: Duration::from_millis(50),
            })
            .with_handler(OpKind::Update, "content", Arc::clone(&good) as Arc<dyn FlushHandler>)
            .with_handler(OpKind::Update, "notifications", Arc::clone(&bad) as Arc<dyn FlushHandler>),
        );

        c.enqueue(intent("a", 1)).await;
        c.enqueue(WriteIntent::update("notifications", "n1", doc! { "n": 9 }))
            .await;
        c.flush().await;

        assert_eq!(good.calls.lock().await.len(), 1);
        assert_eq!(bad.calls.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unhandled_group_is_dropped_with_warning() {
        let handler = RecordingHandler::new();
        let c = coalescer(100, Arc::clone(&handler));

        c.enqueue(WriteIntent {
            kind: OpKind::Delete,
            target_group: "content".into(),
            dedupe_key: "x".into(),
            payload: doc! {},
        })
        .await;
        c.flush().await;

        // No delete handler registered: group dropped, buffer still drained
        assert!(handler.calls.lock().await.is_empty());
        assert_eq!(c.pending_len().await, 0);
    }

    #[tokio::test]
    async fn test_flush_on_empty_buffer_is_noop() {
        let handler = RecordingHandler::new();
        let c = coalescer(100, Arc::clone(&handler));

        c.flush().await;
        c.flush().await;

        assert!(handler.calls.lock().await.is_empty());
    }
}
