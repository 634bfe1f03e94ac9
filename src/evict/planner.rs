//! Eviction planning: select the minimal set of files to bring a directory
//! back under its budget.
//!
//! The planner is a pure function of one probe snapshot: no filesystem access,
//! no clock. Given the same inputs it always produces the same plan — ordering
//! ties are broken by ascending path so plans are reproducible.

#![allow(missing_docs)]

use std::cmp::Ordering;

use crate::probe::FileCandidate;
use crate::registry::{EvictionOrder, EvictionPolicy};

/// An ordered deletion plan for a single over-budget directory.
///
/// Consumed once by the executor, then discarded; never reused across cycles.
#[derive(Debug, Clone)]
pub struct EvictionPlan {
    /// Files to delete, in deletion order.
    pub files: Vec<FileCandidate>,
    /// Bytes the directory exceeds its budget by (0 when under budget).
    pub over_by: u64,
    /// Sum of the selected files' sizes — what the plan expects to free.
    pub expected_freed_bytes: u64,
    /// True when even deleting every candidate cannot cover `over_by` — the
    /// directory stays over budget. The plan then contains all candidates and
    /// the caller surfaces a warning instead of treating the cycle as a
    /// success. The margin is selection headroom only; a plan that covers
    /// `over_by` but falls short of the margin is still a success.
    pub insufficient: bool,
}

impl EvictionPlan {
    /// A plan that deletes nothing.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            files: Vec::new(),
            over_by: 0,
            expected_freed_bytes: 0,
            insufficient: false,
        }
    }

    /// Whether there is anything to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Build a deletion plan.
///
/// Returns an empty plan when `total_bytes` does not strictly exceed
/// `max_size_bytes`. Otherwise selects candidates in policy order until the
/// accumulated size reaches `over_by + margin`, and never one file more.
#[must_use]
pub fn plan(
    total_bytes: u64,
    max_size_bytes: u64,
    mut candidates: Vec<FileCandidate>,
    policy: EvictionPolicy,
) -> EvictionPlan {
    if total_bytes <= max_size_bytes {
        return EvictionPlan::empty();
    }
    let over_by = total_bytes - max_size_bytes;
    let target = over_by.saturating_add(policy.margin_bytes);

    candidates.sort_by(|a, b| compare(policy.order, a, b));

    let mut selected = Vec::new();
    let mut accumulated: u64 = 0;
    for candidate in candidates {
        if accumulated >= target {
            break;
        }
        accumulated += candidate.size_bytes;
        selected.push(candidate);
    }

    EvictionPlan {
        files: selected,
        over_by,
        expected_freed_bytes: accumulated,
        insufficient: accumulated < over_by,
    }
}

/// Policy-order comparison, tie-broken by ascending path for determinism.
fn compare(order: EvictionOrder, a: &FileCandidate, b: &FileCandidate) -> Ordering {
    let primary = match order {
        EvictionOrder::OldestFirst => a.modified.cmp(&b.modified),
        EvictionOrder::LargestFirst => b.size_bytes.cmp(&a.size_bytes),
    };
    primary.then_with(|| a.path.cmp(&b.path))
}
