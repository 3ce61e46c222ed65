//! The report store: a bounded, de-duplicated, ordered view of live
//! reports.
//!
//! The store is the single source of truth rendered by the UI. It is fed
//! from two directions — bulk snapshots pulled over REST and incremental
//! updates pushed over the live channel — and reconciles them with
//! last-write-wins-by-id semantics.
//!
//! Invariants upheld by every operation:
//!
//! - at most one entry per report id
//! - entries sorted by `created_at` descending (ties broken by id
//!   descending, so ordering is deterministic)
//! - never more than `max_items` entries; the oldest are evicted first
//! - no inactive or out-of-window entry is visible
//!
//! All mutations take the one internal mutex for their full
//! mutate-sort-truncate sequence, so `current_view` can never observe a
//! partially merged state.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::recency::RecencyPolicy;
use crate::report::{Report, ReportId};

/// Default bound on the visible set.
pub const DEFAULT_MAX_ITEMS: usize = 10;

/// What a single merge did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new entry became visible.
    Inserted,
    /// An existing entry with the same id was replaced.
    Replaced,
    /// An existing entry was removed (`active == false`).
    Removed,
    /// The update did not change the store (stale, inactive-and-absent,
    /// or evicted immediately by the size bound).
    Ignored,
}

/// Per-batch accounting for [`ReportStore::replace_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SnapshotSummary {
    /// Entries visible after the replace.
    pub applied: usize,
    /// Payloads dropped for failing validation.
    pub dropped: usize,
    /// Payloads skipped because they were inactive or outside the window.
    pub skipped: usize,
    /// Entries where the in-store version outran the snapshot row and was
    /// kept in its place.
    pub preserved: usize,
}

/// Bounded, de-duplicated, `created_at`-descending set of live reports.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct ReportStore {
    max_items: usize,
    recency: RecencyPolicy,
    entries: Mutex<Vec<Report>>,
    malformed_dropped: AtomicU64,
}

impl ReportStore {
    /// Creates a store bounded to `max_items` entries, windowed by
    /// `recency`. A `max_items` of zero is clamped to one.
    #[must_use]
    pub fn new(max_items: usize, recency: RecencyPolicy) -> Self {
        Self {
            max_items: max_items.max(1),
            recency,
            entries: Mutex::new(Vec::new()),
            malformed_dropped: AtomicU64::new(0),
        }
    }

    /// Returns the configured size bound.
    #[must_use]
    pub const fn max_items(&self) -> usize {
        self.max_items
    }

    /// Returns the recency policy.
    #[must_use]
    pub const fn recency(&self) -> &RecencyPolicy {
        &self.recency
    }

    /// Running count of payloads dropped for failing validation.
    #[must_use]
    pub fn malformed_dropped(&self) -> u64 {
        self.malformed_dropped.load(Ordering::Relaxed)
    }

    /// Wholesale replace of the visible set from a fetched snapshot.
    ///
    /// Each payload is validated independently; one bad row never
    /// discards the rest. Inactive and out-of-window rows are skipped.
    /// When the store already holds a strictly fresher version of a row
    /// (a stream update that landed while the fetch was in flight), the
    /// in-store version wins — a snapshot must not roll back the stream.
    /// Entries absent from the snapshot do not survive it.
    pub fn replace_snapshot(
        &self,
        payload: &[serde_json::Value],
        now: DateTime<Utc>,
    ) -> SnapshotSummary {
        let mut summary = SnapshotSummary::default();
        let mut incoming: Vec<Report> = Vec::with_capacity(payload.len());
        for value in payload {
            match Report::decode(value.clone()) {
                Ok(report) => incoming.push(report),
                Err(error) => {
                    summary.dropped += 1;
                    self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(%error, "dropping malformed snapshot row");
                },
            }
        }

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut next: Vec<Report> = Vec::with_capacity(incoming.len());
        for mut report in incoming {
            if !report.active || !self.recency.is_recent(report.created_at, now) {
                summary.skipped += 1;
                continue;
            }
            if let Some(existing) = entries.iter().find(|e| e.id == report.id) {
                if existing.freshness() > report.freshness() {
                    summary.preserved += 1;
                    report = existing.clone();
                }
            }
            // Last occurrence of a duplicated id within one snapshot wins.
            if let Some(slot) = next.iter_mut().find(|e| e.id == report.id) {
                *slot = report;
            } else {
                next.push(report);
            }
        }
        sort_and_truncate(&mut next, self.max_items);
        summary.applied = next.len();
        *entries = next;
        summary
    }

    /// Idempotent upsert-or-remove of a single report.
    ///
    /// - `active == false` removes any entry with the same id.
    /// - An out-of-window report is ignored; late stale events never
    ///   resurface.
    /// - Otherwise the report replaces its id's entry or is inserted, and
    ///   the view is re-sorted and truncated to the size bound.
    pub fn apply_update(&self, report: Report, now: DateTime<Utc>) -> MergeOutcome {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !report.active {
            return remove_entry(&mut entries, report.id);
        }
        if !self.recency.is_recent(report.created_at, now) {
            debug!(report_id = %report.id, "ignoring out-of-window update");
            return MergeOutcome::Ignored;
        }
        upsert_entry(&mut entries, report, self.max_items)
    }

    /// Folds an authoritative server response (vote acknowledgement,
    /// creation echo) into the store.
    ///
    /// Identical to [`Self::apply_update`] except that a report already
    /// present bypasses the recency check: a vote acknowledgement for a
    /// displayed report must update its tallies even if the report has
    /// drifted to the window's edge meanwhile.
    pub fn apply_vote_result(&self, report: Report, now: DateTime<Utc>) -> MergeOutcome {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if !report.active {
            return remove_entry(&mut entries, report.id);
        }
        let present = entries.iter().any(|e| e.id == report.id);
        if !present && !self.recency.is_recent(report.created_at, now) {
            debug!(report_id = %report.id, "ignoring vote result for stale absent report");
            return MergeOutcome::Ignored;
        }
        upsert_entry(&mut entries, report, self.max_items)
    }

    /// The current visible set, most recent first. Non-blocking beyond
    /// the store mutex and always a fully merged state.
    #[must_use]
    pub fn current_view(&self) -> Vec<Report> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Looks up a single report by id.
    #[must_use]
    pub fn get(&self, id: ReportId) -> Option<Report> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    /// Number of visible entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// True when nothing is visible.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ReportStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ITEMS, RecencyPolicy::default())
    }
}

fn remove_entry(entries: &mut Vec<Report>, id: ReportId) -> MergeOutcome {
    let before = entries.len();
    entries.retain(|e| e.id != id);
    if entries.len() < before {
        debug!(report_id = %id, "removed retired report");
        MergeOutcome::Removed
    } else {
        MergeOutcome::Ignored
    }
}

fn upsert_entry(entries: &mut Vec<Report>, report: Report, max_items: usize) -> MergeOutcome {
    let id = report.id;
    let outcome = if let Some(slot) = entries.iter_mut().find(|e| e.id == id) {
        *slot = report;
        MergeOutcome::Replaced
    } else {
        entries.push(report);
        MergeOutcome::Inserted
    };
    sort_and_truncate(entries, max_items);
    if outcome == MergeOutcome::Inserted && !entries.iter().any(|e| e.id == id) {
        // Inserted below the eviction line: oldest entry, full store.
        return MergeOutcome::Ignored;
    }
    outcome
}

fn sort_and_truncate(entries: &mut Vec<Report>, max_items: usize) {
    entries.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
    entries.truncate(max_items);
}
