//! Outbound channel selection.
//!
//! When the publisher holds more than one bus channel, each publish picks
//! one through this strategy. The strategy is injected so it can be swapped
//! and tested independently of the partition-key logic it must never
//! interfere with.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Picks which outbound channel a publish uses.
pub trait ChannelSelector: Send + Sync {
    /// Return a channel index in `[0, channel_count)`.
    fn select(&self, channel_count: usize) -> usize;
}

/// Atomically incremented ring index: successive publishes cycle through
/// the channels evenly.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    counter: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelSelector for RoundRobinSelector {
    fn select(&self, channel_count: usize) -> usize {
        debug_assert!(channel_count > 0);
        self.counter.fetch_add(1, Ordering::Relaxed) % channel_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_channels() {
        let selector = RoundRobinSelector::new();
        let picks: Vec<usize> = (0..6).map(|_| selector.select(3)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn single_channel_always_zero() {
        let selector = RoundRobinSelector::new();
        assert_eq!(selector.select(1), 0);
        assert_eq!(selector.select(1), 0);
    }
}
