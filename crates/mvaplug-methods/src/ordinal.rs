//! Construction-order tags for training instances

use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out monotonically increasing ordinals starting at 0.
///
/// One allocator lives for the whole process run, next to the engine it
/// guards; it is never reset.
#[derive(Debug, Default)]
pub struct OrdinalAllocator {
    next: AtomicU32,
}

impl OrdinalAllocator {
    /// Create an allocator whose first ordinal is 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next ordinal
    pub fn allocate(&self) -> u32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of ordinals handed out so far
    pub fn issued(&self) -> u32 {
        self.next.load(Ordering::SeqCst)
    }
}

/// Only the first constructed instance may train the singleton engine
pub fn is_trusted(ordinal: u32) -> bool {
    ordinal == 0
}
