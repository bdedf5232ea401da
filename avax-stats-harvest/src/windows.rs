//! Partitioning of a block range into `eth_getLogs` windows.

use serde::{Deserialize, Serialize};

/// An inclusive block range queried with a single `eth_getLogs` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    /// First block of the window.
    pub from: u64,
    /// Last block of the window (inclusive).
    pub to: u64,
}

impl BlockWindow {
    /// Number of blocks covered.
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// Always `false`: a window covers at least one block.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }
}

/// Consecutive windows of at most `size` blocks walking from `start` to `tip`.
///
/// A window is opened at every `start + k * size` below the tip and the last
/// one is clipped to end at the tip. A `start >= tip` yields nothing, and
/// when `tip - start` is a multiple of `size` the tip falls just past the
/// final window and is left for the next run.
#[derive(Debug, Clone)]
pub struct BlockWindows {
    next: u64,
    tip: u64,
    size: u64,
}

impl BlockWindows {
    /// Windows from `start` up to `tip`.
    ///
    /// A `size` of zero is treated as one.
    #[must_use]
    pub fn new(start: u64, tip: u64, size: u64) -> Self {
        Self {
            next: start,
            tip,
            size: size.max(1),
        }
    }
}

impl Iterator for BlockWindows {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<BlockWindow> {
        if self.next >= self.tip {
            return None;
        }
        let from = self.next;
        let to = from.saturating_add(self.size - 1).min(self.tip);
        self.next = to.saturating_add(1);
        Some(BlockWindow { from, to })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let blocks = self.tip.saturating_sub(self.next);
        let n = usize::try_from(blocks.div_ceil(self.size)).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

impl ExactSizeIterator for BlockWindows {}
