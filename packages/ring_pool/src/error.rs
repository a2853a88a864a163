use thiserror::Error;

/// Errors reported to callers that misuse the trace of a [`Slot`][crate::Slot].
///
/// Pool-level conditions (exhaustion, releasing an overflow slot, releasing into a full ring)
/// are not errors. They are logged and otherwise absorbed by the pool.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller tried to mark the most recent trace entry as done but the trace is empty.
    #[error("slot {slot_index} has no trace entry to mark as done")]
    NoActiveTrace {
        /// Index of the slot whose trace was empty.
        slot_index: usize,
    },

    /// The caller tried to mark a trace entry on a slot that is no longer allocated.
    #[error("slot {slot_index} is not allocated, it has already been returned to the pool")]
    NotAllocated {
        /// Index of the slot that was not allocated.
        slot_index: usize,
    },
}

/// A specialized `Result` type for ring pool operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;
