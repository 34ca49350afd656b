//! Client Window Module
//!
//! Request timestamps of one client for one endpoint class.

use std::collections::VecDeque;

// == Client Window ==
/// Admitted request timestamps inside the trailing window, oldest first.
#[derive(Debug, Default, Clone)]
pub struct ClientWindow {
    hits: VecDeque<u64>,
}

impl ClientWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops timestamps that fell out of `(now - window, now]`.
    pub fn prune(&mut self, now_ms: u64, window_ms: u64) {
        while let Some(&oldest) = self.hits.front() {
            if now_ms.saturating_sub(oldest) >= window_ms {
                self.hits.pop_front();
            } else {
                break;
            }
        }
    }

    /// Records a request at `now_ms` if fewer than `ceiling` remain in the window.
    pub fn try_record(&mut self, now_ms: u64, window_ms: u64, ceiling: u32) -> bool {
        self.prune(now_ms, window_ms);
        if self.hits.len() >= ceiling as usize {
            return false;
        }
        self.hits.push_back(now_ms);
        true
    }

    /// Requests counted against the ceiling as of the last prune.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}
