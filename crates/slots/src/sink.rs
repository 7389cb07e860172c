//! Incremental destinations for slot output.

use std::sync::mpsc::Sender;

/// Receives the resolved prefix of a slot's output as it becomes known.
pub trait RenderSink {
    fn write(&mut self, chunk: &str);

    /// Called once, after the last chunk of a finalized slot.
    fn end(&mut self) {}
}

impl RenderSink for String {
    fn write(&mut self, chunk: &str) {
        self.push_str(chunk);
    }
}

/// Keeps chunk boundaries, mostly useful in tests.
impl RenderSink for Vec<String> {
    fn write(&mut self, chunk: &str) {
        self.push(chunk.to_string());
    }
}

/// Forwards chunks to another thread. A disconnected receiver drops output.
impl RenderSink for Sender<String> {
    fn write(&mut self, chunk: &str) {
        let _ = self.send(chunk.to_string());
    }
}

/// Sink writing into a shared buffer the caller keeps a handle to.
#[derive(Clone, Debug, Default)]
pub struct SharedBuffer {
    inner: std::sync::Arc<std::sync::Mutex<BufferState>>,
}

#[derive(Debug, Default)]
struct BufferState {
    chunks: Vec<String>,
    ended: bool,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Chunks written so far.
    pub fn chunks(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|state| state.chunks.clone())
            .unwrap_or_default()
    }

    pub fn contents(&self) -> String {
        self.chunks().concat()
    }

    pub fn is_ended(&self) -> bool {
        self.inner.lock().map(|state| state.ended).unwrap_or(false)
    }
}

impl RenderSink for SharedBuffer {
    fn write(&mut self, chunk: &str) {
        if let Ok(mut state) = self.inner.lock() {
            state.chunks.push(chunk.to_string());
        }
    }

    fn end(&mut self) {
        if let Ok(mut state) = self.inner.lock() {
            state.ended = true;
        }
    }
}
