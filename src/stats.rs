//! Process-lifetime usage counters.
//!
//! Shared between request handlers (which increment) and the broadcast hub
//! (which snapshots on every tick). Counters start at zero and only grow.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::tasks::TaskKind;

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub humanize_count: u64,
    pub detect_count: u64,
    pub plagiarize_count: u64,
    pub research_count: u64,
}

impl UsageCounters {
    pub fn get(&self, kind: TaskKind) -> u64 {
        match kind {
            TaskKind::Humanize => self.humanize_count,
            TaskKind::Detect => self.detect_count,
            TaskKind::Plagiarize => self.plagiarize_count,
            TaskKind::Research => self.research_count,
        }
    }

    fn slot(&mut self, kind: TaskKind) -> &mut u64 {
        match kind {
            TaskKind::Humanize => &mut self.humanize_count,
            TaskKind::Detect => &mut self.detect_count,
            TaskKind::Plagiarize => &mut self.plagiarize_count,
            TaskKind::Research => &mut self.research_count,
        }
    }

    pub fn total(&self) -> u64 {
        TaskKind::ALL.iter().map(|k| self.get(*k)).sum()
    }
}

/// Invocation tally per task kind.
///
/// A plain `std` mutex: the critical section is a single add or copy and
/// never awaits.
#[derive(Debug, Default)]
pub struct UsageCounter {
    counts: Mutex<UsageCounters>,
}

impl UsageCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, kind: TaskKind) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        let slot = counts.slot(kind);
        *slot = slot.saturating_add(1);
    }

    pub fn snapshot(&self) -> UsageCounters {
        *self.counts.lock().unwrap_or_else(|e| e.into_inner())
    }
}
