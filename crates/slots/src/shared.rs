//! Thread-shareable handle over a [`MergeTree`].
//!
//! Mutation is serialized by one mutex. No caller code runs under it: sinks
//! handed to [`SharedMergeTree`] only queue their chunks while the tree is
//! locked, and completion callbacks are collected. Both are replayed after
//! the lock is released, so a sink or a callback may use the tree again.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, SlotError};
use crate::sink::RenderSink;
use crate::tree::{BoxedSink, Callback, Finalize, MergeTree, SlotId};

#[derive(Clone, Debug, Default)]
pub struct SharedMergeTree {
    inner: Arc<Mutex<MergeTree>>,
    /// Outboxes that received sink calls since they were last flushed.
    dirty: Arc<Mutex<Vec<Arc<Outbox>>>>,
}

impl SharedMergeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MergeTree>> {
        self.inner.lock().map_err(|_| SlotError::Poisoned)
    }

    /// Create a root slot, optionally streaming to `sink`.
    pub fn root(&self, sink: Option<BoxedSink>) -> Result<SlotHandle> {
        let sink = sink.map(|s| self.queued(s));
        let id = self.lock()?.create(None, sink)?;
        Ok(self.handle(id))
    }

    pub fn handle(&self, id: SlotId) -> SlotHandle {
        SlotHandle {
            tree: self.clone(),
            id,
        }
    }

    /// Run `f` with exclusive access to the underlying tree.
    ///
    /// Sinks passed to the tree directly inside `f` are called with the lock
    /// held.
    pub fn with<R>(&self, f: impl FnOnce(&mut MergeTree) -> R) -> Result<R> {
        let result = {
            let mut guard = self.lock()?;
            f(&mut guard)
        };
        self.flush_sinks();
        Ok(result)
    }

    fn queued(&self, sink: BoxedSink) -> BoxedSink {
        Box::new(QueuedSink {
            outbox: Arc::new(Outbox {
                queue: Mutex::new(VecDeque::new()),
                sink: Mutex::new(sink),
            }),
            dirty: Arc::clone(&self.dirty),
        })
    }

    /// Replay queued sink calls. Must not be called with the tree locked.
    fn flush_sinks(&self) {
        let dirty = match self.dirty.lock() {
            Ok(mut dirty) => std::mem::take(&mut *dirty),
            Err(_) => return,
        };
        for outbox in dirty {
            outbox.flush();
        }
    }
}

enum SinkCall {
    Write(String),
    End,
}

/// A caller's sink plus the calls queued for it.
///
/// Calls are queued in tree order under the tree lock. Whoever flushes drains
/// the queue in order while holding the sink, so two threads flushing at once
/// cannot reorder output.
struct Outbox {
    queue: Mutex<VecDeque<SinkCall>>,
    sink: Mutex<BoxedSink>,
}

impl fmt::Debug for Outbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queued = self.queue.lock().map(|q| q.len()).unwrap_or(0);
        f.debug_struct("Outbox").field("queued", &queued).finish()
    }
}

impl Outbox {
    fn push(&self, call: SinkCall) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(call);
        }
    }

    fn pop(&self) -> Option<SinkCall> {
        self.queue.lock().ok()?.pop_front()
    }

    fn is_idle(&self) -> bool {
        self.queue.lock().map(|q| q.is_empty()).unwrap_or(true)
    }

    fn flush(&self) {
        loop {
            // Busy means another flush, possibly further up this stack, is
            // draining and will see what was queued.
            let Ok(mut sink) = self.sink.try_lock() else {
                return;
            };
            while let Some(call) = self.pop() {
                match call {
                    SinkCall::Write(chunk) => sink.write(&chunk),
                    SinkCall::End => sink.end(),
                }
            }
            drop(sink);
            if self.is_idle() {
                return;
            }
        }
    }
}

/// Sink installed in the tree in place of the caller's.
struct QueuedSink {
    outbox: Arc<Outbox>,
    dirty: Arc<Mutex<Vec<Arc<Outbox>>>>,
}

impl QueuedSink {
    fn queue(&self, call: SinkCall) {
        self.outbox.push(call);
        let Ok(mut dirty) = self.dirty.lock() else {
            return;
        };
        if !dirty.iter().any(|o| Arc::ptr_eq(o, &self.outbox)) {
            dirty.push(Arc::clone(&self.outbox));
        }
    }
}

impl RenderSink for QueuedSink {
    fn write(&mut self, chunk: &str) {
        self.queue(SinkCall::Write(chunk.to_string()));
    }

    fn end(&mut self) {
        self.queue(SinkCall::End);
    }
}

/// One slot of a [`SharedMergeTree`]; cheap to clone and send to workers.
#[derive(Clone, Debug)]
pub struct SlotHandle {
    tree: SharedMergeTree,
    id: SlotId,
}

impl SlotHandle {
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub fn tree(&self) -> &SharedMergeTree {
        &self.tree
    }

    /// Reserve the next position of this slot for a new child.
    pub fn child(&self) -> Result<SlotHandle> {
        self.child_with_sink(None)
    }

    pub fn child_with_sink(&self, sink: Option<BoxedSink>) -> Result<SlotHandle> {
        let sink = sink.map(|s| self.tree.queued(s));
        let id = self.tree.lock()?.create(Some(self.id), sink)?;
        Ok(self.tree.handle(id))
    }

    pub fn write(&self, text: &str) -> Result<()> {
        let written = self.tree.lock()?.write(self.id, text);
        self.tree.flush_sinks();
        written
    }

    pub fn finalize(&self) -> Result<Finalize> {
        self.finalize_with(None)
    }

    pub fn finalize_with(&self, callback: Option<Callback>) -> Result<Finalize> {
        let (outcome, ready) = {
            let mut guard = self.tree.lock()?;
            guard.finalize_deferred(self.id, callback)?
        };
        self.tree.flush_sinks();
        ready.run();
        Ok(outcome)
    }

    pub fn pending_children(&self) -> Result<usize> {
        self.tree.lock()?.pending_children(self.id)
    }

    pub fn is_finalized(&self) -> Result<bool> {
        self.tree.lock()?.is_finalized(self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::SharedBuffer;

    #[test]
    fn callback_may_reenter_the_tree() {
        let tree = SharedMergeTree::new();
        let root = tree.root(None).unwrap();
        let child = root.child().unwrap();
        let observer = child.clone();
        root.finalize().unwrap();
        child.write("x").unwrap();
        let check: Callback = Box::new(move |_value: &str| {
            assert!(observer.is_finalized().unwrap());
        });
        let outcome = child.finalize_with(Some(check)).unwrap();
        assert_eq!(outcome, Finalize::Delivered("x".to_string()));
    }

    #[test]
    fn with_exposes_inspection() {
        let tree = SharedMergeTree::new();
        let root = tree.root(None).unwrap();
        let _a = root.child().unwrap();
        let len = tree.with(|t| t.len()).unwrap();
        assert_eq!(len, 2);
        assert_eq!(root.pending_children().unwrap(), 1);
    }

    /// Records, on every chunk, how many children its watched slot still
    /// waits for.
    struct PendingWatcher {
        watched: SlotHandle,
        seen: Arc<Mutex<Vec<usize>>>,
        output: SharedBuffer,
    }

    impl RenderSink for PendingWatcher {
        fn write(&mut self, chunk: &str) {
            if let Ok(pending) = self.watched.pending_children() {
                self.seen.lock().unwrap().push(pending);
            }
            self.output.write(chunk);
        }

        fn end(&mut self) {
            self.output.end();
        }
    }

    #[test]
    fn sink_may_reenter_the_tree() {
        let tree = SharedMergeTree::new();
        let root = tree.root(None).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let output = SharedBuffer::new();
        let watcher = PendingWatcher {
            watched: root.clone(),
            seen: Arc::clone(&seen),
            output: output.clone(),
        };
        let child = root.child_with_sink(Some(Box::new(watcher))).unwrap();
        child.write("a").unwrap();
        child.write("b").unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 1]);

        root.finalize().unwrap();
        assert_eq!(
            child.finalize().unwrap(),
            Finalize::Delivered("ab".to_string())
        );
        assert_eq!(output.chunks(), vec!["a", "b"]);
        assert!(output.is_ended());
    }

    #[test]
    fn queued_chunks_keep_their_order() {
        let tree = SharedMergeTree::new();
        let buffer = SharedBuffer::new();
        let root = tree.root(Some(Box::new(buffer.clone()))).unwrap();
        let first = root.child().unwrap();
        let second = root.child().unwrap();
        root.write("!").unwrap();
        second.write("2").unwrap();
        second.finalize().unwrap();
        first.write("1").unwrap();
        first.finalize().unwrap();
        assert_eq!(buffer.contents(), "12!");
        assert!(!buffer.is_ended());
        root.finalize().unwrap();
        assert!(buffer.is_ended());
    }
}
