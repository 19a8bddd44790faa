//! Unique handles for meshes, colliders and placed entities.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one renderable, collider or entity across attach/detach calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Atomic generator for monotonically increasing [`ResourceHandle`]s.
///
/// Owned by the streaming session and shared with its generation tasks.
#[derive(Debug)]
pub struct HandleAllocator {
    next: AtomicU64,
}

impl HandleAllocator {
    /// Create a new allocator starting at 1.
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Return the next unique handle.
    pub fn next_handle(&self) -> ResourceHandle {
        ResourceHandle(self.next.fetch_add(1, Ordering::Relaxed))
    }

    /// Number of handles issued so far.
    pub fn issued(&self) -> u64 {
        self.next.load(Ordering::Relaxed) - 1
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_unique_across_threads() {
        let alloc = std::sync::Arc::new(HandleAllocator::new());
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let alloc = alloc.clone();
                std::thread::spawn(move || {
                    (0..250).map(|_| alloc.next_handle()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut all: Vec<_> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
        assert_eq!(alloc.issued(), 1000);
    }
}
