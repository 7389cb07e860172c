//! Ordered merge tree for render output.
//!
//! A render walk creates one slot per construct whose output may complete
//! later (an include, an async call, a data block). Slots reserve their
//! place in the parent when created, so the joined output follows document
//! order even when slots finish out of order.
//!
//! ```
//! use slots::{Finalize, MergeTree};
//!
//! let mut tree = MergeTree::new();
//! let root = tree.create(None, None)?;
//! let a = tree.create(Some(root), None)?;
//! let b = tree.create(Some(root), None)?;
//! tree.finalize(root, None)?;
//! tree.write(b, "world")?;
//! tree.finalize(b, None)?;
//! tree.write(a, "hello ")?;
//! assert_eq!(tree.finalize(a, None)?, Finalize::Delivered("hello world".into()));
//! # Ok::<(), slots::SlotError>(())
//! ```

mod error;
mod shared;
mod sink;
mod tree;

pub use crate::error::{Result, SlotError};
pub use crate::shared::{SharedMergeTree, SlotHandle};
pub use crate::sink::{RenderSink, SharedBuffer};
pub use crate::tree::{BoxedSink, Callback, Finalize, MergeTree, ReadyCallbacks, SlotId};
