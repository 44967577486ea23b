//! Cooperative cancellation.
//!
//! Layout runs poll a [`Cancellation`] between stages and tiles, and the
//! packer polls it for every island. Nothing is ever interrupted
//! preemptively. Algorithms that stop early return [`Cancelled`].
//!
//! ```
//! use uvlayout::algo::{CancelFlag, Cancellation};
//!
//! let flag = CancelFlag::new();
//! let observer = flag.clone();
//! assert!(!observer.is_cancelled());
//!
//! flag.cancel();
//! assert!(observer.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Marker error of an algorithm that stopped on a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Source of cancellation requests, polled by long-running algorithms.
pub trait Cancellation: Sync {
    /// Returns `true` once the current run should stop.
    fn is_cancelled(&self) -> bool;

    /// `Err(Cancelled)` once the current run should stop, for use with `?`.
    #[inline]
    fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A cancellation source that never fires.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    #[inline]
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl Cancellation for AtomicBool {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.load(Ordering::Acquire)
    }
}

/// A shareable cancellation flag.
///
/// Clones observe the same flag. Once cancelled a flag stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    flag: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create a new, not yet cancelled flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }
}

impl Cancellation for CancelFlag {
    #[inline]
    fn is_cancelled(&self) -> bool {
        self.flag.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_cancel() {
        assert!(!NeverCancel.is_cancelled());
    }

    #[test]
    fn test_atomic_bool() {
        let flag = AtomicBool::new(false);
        assert!(!flag.is_cancelled());
        flag.store(true, Ordering::Release);
        assert!(flag.is_cancelled());
    }

    #[test]
    fn test_check() {
        assert_eq!(NeverCancel.check(), Ok(()));
        let flag = CancelFlag::new();
        flag.cancel();
        let dynamic: &dyn Cancellation = &flag;
        assert_eq!(dynamic.check(), Err(Cancelled));
    }

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clones: Vec<_> = (0..3).map(|_| flag.clone()).collect();
        flag.cancel();
        assert!(clones.iter().all(|c| c.is_cancelled()));
    }
}
