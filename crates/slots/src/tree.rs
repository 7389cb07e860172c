//! Ordered merge tree.
//!
//! Each slot owns a queue of literal chunks and placeholders for child
//! slots. A child reserves its placeholder when it is created, so output
//! order is fixed by creation order no matter when children finish. A slot
//! completes once its finalize was requested and no children are pending;
//! completion fills the parent's placeholder and may complete the parent in
//! turn.

use std::fmt;

use crate::error::{Result, SlotError};
use crate::sink::RenderSink;

/// Handle to a slot in a [`MergeTree`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u32);

impl SlotId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

fn slot_id_at(index: usize) -> Result<SlotId> {
    u32::try_from(index)
        .map(SlotId)
        .map_err(|_| SlotError::TooManySlots)
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Invoked with a slot's joined output when the slot completes.
pub type Callback = Box<dyn FnOnce(&str) + Send>;

pub type BoxedSink = Box<dyn RenderSink + Send>;

#[derive(Debug, PartialEq, Eq)]
pub enum Finalize {
    /// Children are still pending; the slot completes when the last one does.
    Pending,
    /// The slot completed and filled its parent's placeholder.
    Completed,
    /// The cascade reached a root slot; this is its output.
    Delivered(String),
    /// The slot had already completed. Nothing happened.
    AlreadyFinalized,
}

enum Segment {
    Literal(String),
    Pending(SlotId),
}

struct Slot {
    /// Parent slot and the queue index reserved there.
    parent: Option<(SlotId, usize)>,
    pending: usize,
    queue: Vec<Segment>,
    callback: Option<Callback>,
    finalize_requested: bool,
    finalized: bool,
    sink: Option<BoxedSink>,
    /// Queue segments already written to the sink.
    streamed: usize,
}

/// Callbacks collected during a cascade, to be run by the caller.
#[must_use = "callbacks only run when `run` is called"]
#[derive(Default)]
pub struct ReadyCallbacks {
    ready: Vec<(Callback, String)>,
}

impl ReadyCallbacks {
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    /// Run callbacks innermost first.
    pub fn run(self) {
        for (callback, value) in self.ready {
            callback(&value);
        }
    }
}

/// Single-owner arena of slots. See [`crate::SharedMergeTree`] for a
/// thread-shareable wrapper.
#[derive(Default)]
pub struct MergeTree {
    slots: Vec<Slot>,
}

impl fmt::Debug for MergeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeTree")
            .field("slots", &self.slots.len())
            .finish()
    }
}

impl MergeTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot. With a parent, the next position in the parent's queue
    /// is reserved for it and the parent gains one pending child.
    pub fn create(&mut self, parent: Option<SlotId>, sink: Option<BoxedSink>) -> Result<SlotId> {
        let id = slot_id_at(self.slots.len())?;
        let reserved = match parent {
            Some(parent_id) => {
                let parent = self.slot_mut(parent_id)?;
                if parent.finalized {
                    return Err(SlotError::Finalized(parent_id));
                }
                let index = parent.queue.len();
                parent.queue.push(Segment::Pending(id));
                parent.pending += 1;
                Some((parent_id, index))
            }
            None => None,
        };
        self.slots.push(Slot {
            parent: reserved,
            pending: 0,
            queue: Vec::new(),
            callback: None,
            finalize_requested: false,
            finalized: false,
            sink,
            streamed: 0,
        });
        log::trace!(target: "slots", "create {id} parent={parent:?}");
        Ok(id)
    }

    /// Append literal output. Never waits on anything.
    pub fn write(&mut self, slot: SlotId, text: &str) -> Result<()> {
        let entry = self.slot_mut(slot)?;
        if entry.finalized {
            return Err(SlotError::Finalized(slot));
        }
        if text.is_empty() {
            return Ok(());
        }
        let streamed = entry.streamed;
        let len = entry.queue.len();
        match entry.queue.last_mut() {
            Some(Segment::Literal(last)) if len > streamed => last.push_str(text),
            _ => entry.queue.push(Segment::Literal(text.to_string())),
        }
        self.stream_prefix(slot);
        Ok(())
    }

    /// Request completion of `slot`, running ready callbacks before returning.
    ///
    /// The first callback provided across calls is the one kept.
    pub fn finalize(&mut self, slot: SlotId, callback: Option<Callback>) -> Result<Finalize> {
        let (outcome, ready) = self.finalize_deferred(slot, callback)?;
        ready.run();
        Ok(outcome)
    }

    /// Like [`MergeTree::finalize`] but hands the callbacks back instead of
    /// running them, so a caller holding a lock can release it first.
    pub fn finalize_deferred(
        &mut self,
        slot: SlotId,
        callback: Option<Callback>,
    ) -> Result<(Finalize, ReadyCallbacks)> {
        let entry = self.slot_mut(slot)?;
        if entry.finalized {
            log::warn!(target: "slots", "finalize on completed slot {slot} ignored");
            return Ok((Finalize::AlreadyFinalized, ReadyCallbacks::default()));
        }
        if entry.callback.is_none() {
            entry.callback = callback;
        }
        entry.finalize_requested = true;
        if entry.pending != 0 {
            log::trace!(
                target: "slots",
                "finalize {slot} deferred, {} pending",
                entry.pending
            );
            return Ok((Finalize::Pending, ReadyCallbacks::default()));
        }
        let mut ready = ReadyCallbacks::default();
        let outcome = self.complete(slot, &mut ready);
        Ok((outcome, ready))
    }

    /// Complete `slot` (pending is zero, finalize requested) and cascade.
    fn complete(&mut self, slot: SlotId, ready: &mut ReadyCallbacks) -> Finalize {
        let mut current = slot;
        loop {
            self.stream_prefix(current);
            let entry = &mut self.slots[current.index()];
            let mut value = String::new();
            for segment in entry.queue.drain(..) {
                if let Segment::Literal(text) = segment {
                    value.push_str(&text);
                }
            }
            entry.finalized = true;
            if let Some(sink) = entry.sink.as_mut() {
                sink.end();
            }
            entry.sink = None;
            let parent = entry.parent;
            log::trace!(target: "slots", "complete {current} ({} bytes)", value.len());

            let Some((parent_id, index)) = parent else {
                if let Some(callback) = entry.callback.take() {
                    ready.ready.push((callback, value.clone()));
                }
                return Finalize::Delivered(value);
            };
            if let Some(callback) = entry.callback.take() {
                ready.ready.push((callback, value.clone()));
            }

            let parent = &mut self.slots[parent_id.index()];
            parent.queue[index] = Segment::Literal(value);
            parent.pending -= 1;
            let cascade = parent.finalize_requested && parent.pending == 0;
            self.stream_prefix(parent_id);
            if !cascade {
                return Finalize::Completed;
            }
            current = parent_id;
        }
    }

    /// Write the newly resolved literal prefix of `slot` to its sink.
    fn stream_prefix(&mut self, slot: SlotId) {
        let Some(entry) = self.slots.get_mut(slot.index()) else {
            return;
        };
        let Some(sink) = entry.sink.as_mut() else {
            return;
        };
        while let Some(Segment::Literal(text)) = entry.queue.get(entry.streamed) {
            sink.write(text);
            entry.streamed += 1;
        }
    }

    fn slot_mut(&mut self, slot: SlotId) -> Result<&mut Slot> {
        self.slots
            .get_mut(slot.index())
            .ok_or(SlotError::UnknownSlot(slot))
    }

    fn slot(&self, slot: SlotId) -> Result<&Slot> {
        self.slots
            .get(slot.index())
            .ok_or(SlotError::UnknownSlot(slot))
    }

    /// Children created under `slot` that have not completed yet.
    pub fn pending_children(&self, slot: SlotId) -> Result<usize> {
        self.slot(slot).map(|s| s.pending)
    }

    pub fn is_finalized(&self, slot: SlotId) -> Result<bool> {
        self.slot(slot).map(|s| s.finalized)
    }

    pub fn is_finalize_requested(&self, slot: SlotId) -> Result<bool> {
        self.slot(slot).map(|s| s.finalize_requested)
    }

    pub fn parent(&self, slot: SlotId) -> Result<Option<SlotId>> {
        self.slot(slot).map(|s| s.parent.map(|(p, _)| p))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
