use core::alloc::Layout;
use core::fmt;

/// A keyed lookup found nothing.
///
/// Returned by [`HashMap::at`](crate::HashMap::at) and
/// [`HashMap::at_mut`](crate::HashMap::at_mut). The `Index` implementation on
/// the map panics with the same message instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LookupError;

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("key not present in map")
    }
}

impl core::error::Error for LookupError {}

/// The error type for fallible capacity operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TryReserveError {
    /// The requested capacity does not fit in `usize`, or its memory layout
    /// exceeds `isize::MAX` bytes.
    CapacityOverflow,
    /// The allocator refused the request.
    AllocError {
        /// The layout of the rejected allocation.
        layout: Layout,
    },
}

impl fmt::Display for TryReserveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TryReserveError::CapacityOverflow => {
                f.write_str("requested capacity exceeds the maximum table size")
            }
            TryReserveError::AllocError { layout } => write!(
                f,
                "allocator failed to provide {} bytes aligned to {}",
                layout.size(),
                layout.align()
            ),
        }
    }
}

impl core::error::Error for TryReserveError {}
