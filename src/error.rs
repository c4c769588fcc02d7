
use core::fmt::Debug;

/// Controller errors, generic over the underlying bus error.
///
/// Malformed peer datagrams never surface here: the receive boundary logs
/// and drops them without touching any state.
#[derive(Debug, Clone, PartialEq)]
pub enum Error<E> {
    /// Event is missing a required field (address or frequency)
    InvalidArgument,

    /// Unknown station or node
    NotFound,

    /// OS randomness unavailable while drawing the local peer id
    NoLocalId,

    /// Wrapper for unhandled / underlying bus errors
    Bus(E),
}

impl<E: Debug> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Error::Bus(e)
    }
}
