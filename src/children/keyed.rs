//! Mark-and-sweep bookkeeping for reloadable children.
//!
//! A keyed child is tracked under a stable key across reload cycles, one
//! [`Keyed`] entry per key. Reload clears every mark, re-runs the caller's
//! spawn block (which re-marks the keys it still wants), then sweeps: any
//! entry left unmarked is retired and its child stopped. Only workers whose
//! key reappeared in the reload survive, which is how per-config-file
//! worker pools tear down workers for deleted files automatically.

use std::os::fd::RawFd;

use tokio_util::sync::CancellationToken;

/// Identifier of one child incarnation within a container.
///
/// Monotonically assigned; never reused, unlike wait keys (descriptors).
pub type ChildId = u64;

/// One key's entry in the container's keyed map.
#[derive(Debug)]
pub struct Keyed {
    key: String,
    child: ChildId,
    wait_key: RawFd,
    retire: CancellationToken,
    marked: bool,
}

impl Keyed {
    /// Creates a new entry, marked.
    pub fn new(key: String, child: ChildId, wait_key: RawFd, retire: CancellationToken) -> Self {
        Self {
            key,
            child,
            wait_key,
            retire,
            marked: true,
        }
    }

    /// The stable key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tracked child incarnation.
    pub fn child(&self) -> ChildId {
        self.child
    }

    /// The tracked child's wait key.
    pub fn wait_key(&self) -> RawFd {
        self.wait_key
    }

    /// Points the entry at a new incarnation of the same key.
    ///
    /// Restart iterations re-track in place so the entry's mark survives a
    /// reload cycle that happens to overlap a restart.
    pub fn track(&mut self, child: ChildId, wait_key: RawFd) {
        self.child = child;
        self.wait_key = wait_key;
    }

    /// Whether the entry survived the current reload cycle so far.
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    /// Marks the entry as still in use.
    pub fn mark(&mut self) {
        self.marked = true;
    }

    /// Clears the mark at the start of a reload sweep.
    pub fn clear(&mut self) {
        self.marked = false;
    }

    /// Retires the child: its restart loop will not continue after the
    /// current incarnation exits.
    pub fn retire(&self) {
        self.retire.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_marked_and_clears() {
        let mut keyed = Keyed::new("a.conf".into(), 1, 7, CancellationToken::new());
        assert!(keyed.is_marked());

        keyed.clear();
        assert!(!keyed.is_marked());

        keyed.mark();
        assert!(keyed.is_marked());
    }

    #[test]
    fn retire_cancels_token() {
        let retire = CancellationToken::new();
        let keyed = Keyed::new("b.conf".into(), 2, 8, retire.clone());
        keyed.retire();
        assert!(retire.is_cancelled());
    }
}
