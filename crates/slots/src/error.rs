use crate::tree::SlotId;

/// Misuse of the merge tree API. Ordering problems (a slot that never
/// finalizes) are not errors; they show up as pending counts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    #[error("unknown slot {0}")]
    UnknownSlot(SlotId),
    #[error("slot {0} is already finalized")]
    Finalized(SlotId),
    #[error("merge tree lock poisoned")]
    Poisoned,
    #[error("merge tree has more than {} slots", u32::MAX)]
    TooManySlots,
}

pub type Result<T> = std::result::Result<T, SlotError>;
