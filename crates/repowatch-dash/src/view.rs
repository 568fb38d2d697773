//! Inbound half of the watcher protocol: merging refresh events into
//! the keyed collection of displayed rows.

use chrono::{DateTime, Utc};
use repowatch_core::wire::RefreshEvent;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long an updated row stays highlighted.
const PULSE_DURATION: Duration = Duration::from_millis(600);

#[derive(Debug, Clone)]
pub struct DisplayRow {
    pub repository: String,
    pub star_count: u64,
    pub updated_at: DateTime<Utc>,
    pulse_until: Option<Instant>,
}

impl DisplayRow {
    fn new(repository: String, star_count: u64) -> Self {
        Self {
            repository,
            star_count,
            updated_at: Utc::now(),
            pulse_until: Some(Instant::now() + PULSE_DURATION),
        }
    }

    fn touch(&mut self, star_count: u64) {
        self.star_count = star_count;
        self.updated_at = Utc::now();
        self.pulse_until = Some(Instant::now() + PULSE_DURATION);
    }

    /// True while the row should be rendered highlighted. Cosmetic
    /// only; expiry is checked at render time, no tick bookkeeping.
    pub fn pulsing(&self) -> bool {
        self.pulse_until.is_some_and(|until| Instant::now() < until)
    }
}

/// Keyed view of displayed rows. Insertion order is preserved so the
/// table stays visually stable across updates; all mutation is
/// upsert-by-key or explicit removal, never whole-view churn except on
/// an authoritative snapshot.
#[derive(Default)]
pub struct ViewReconciler {
    rows: Vec<DisplayRow>,
}

impl ViewReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[DisplayRow] {
        &self.rows
    }

    pub fn row(&self, repository: &str) -> Option<&DisplayRow> {
        self.rows.iter().find(|row| row.repository == repository)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Applies one refresh event, last-write-wins per key.
    ///
    /// Deltas upsert: an existing row keeps its position and updates in
    /// place, an unknown key appends a new row. Snapshots replace the
    /// whole view, preserving prior row order for surviving keys so the
    /// table does not reshuffle. Keys the `subscribed` predicate
    /// rejects are dropped: the watcher may push a stray refresh for a
    /// repository that was just unsubscribed locally, and re-displaying
    /// it would undo the optimistic removal.
    pub fn apply_refresh(&mut self, event: RefreshEvent, subscribed: impl Fn(&str) -> bool) {
        match event {
            RefreshEvent::Delta(delta) => {
                if !subscribed(&delta.repository) {
                    debug!(event = "stray_delta_dropped", repository = %delta.repository);
                    return;
                }
                match self.rows.iter_mut().find(|row| row.repository == delta.repository) {
                    Some(row) => row.touch(delta.stars),
                    None => self.rows.push(DisplayRow::new(delta.repository, delta.stars)),
                }
            }
            RefreshEvent::Snapshot(snapshot) => {
                let mut counts = snapshot.counts;
                counts.retain(|repository, _| {
                    let keep = subscribed(repository);
                    if !keep {
                        debug!(event = "stray_snapshot_key_dropped", repository = %repository);
                    }
                    keep
                });

                let mut next = Vec::with_capacity(counts.len());
                for row in self.rows.drain(..) {
                    if let Some(star_count) = counts.remove(&row.repository) {
                        let mut row = row;
                        if row.star_count != star_count {
                            row.touch(star_count);
                        }
                        next.push(row);
                    }
                }
                for (repository, star_count) in counts {
                    next.push(DisplayRow::new(repository, star_count));
                }
                self.rows = next;
            }
        }
    }

    /// Optimistic local removal on unsubscribe; does not wait for the
    /// watcher to acknowledge anything.
    pub fn remove(&mut self, repository: &str) {
        self.rows.retain(|row| row.repository != repository);
    }

    /// Connection-loss reset.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repowatch_core::wire::{SnapshotCounts, StarDelta};
    use std::collections::BTreeMap;

    fn delta(repository: &str, stars: u64) -> RefreshEvent {
        RefreshEvent::Delta(StarDelta {
            repository: repository.to_string(),
            stars,
        })
    }

    fn snapshot(counts: &[(&str, u64)]) -> RefreshEvent {
        RefreshEvent::Snapshot(SnapshotCounts {
            counts: counts
                .iter()
                .map(|(repository, stars)| (repository.to_string(), *stars))
                .collect::<BTreeMap<_, _>>(),
        })
    }

    fn all(_: &str) -> bool {
        true
    }

    fn keys(view: &ViewReconciler) -> Vec<&str> {
        view.rows().iter().map(|row| row.repository.as_str()).collect()
    }

    #[test]
    fn delta_inserts_unknown_key() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), all);

        assert_eq!(view.len(), 1);
        assert_eq!(view.row("a/a").map(|row| row.star_count), Some(42));
    }

    #[test]
    fn delta_updates_existing_row_in_place() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), all);
        view.apply_refresh(delta("b/b", 7), all);
        view.apply_refresh(delta("a/a", 43), all);

        assert_eq!(view.len(), 2);
        assert_eq!(keys(&view), vec!["a/a", "b/b"]);
        assert_eq!(view.row("a/a").map(|row| row.star_count), Some(43));
    }

    #[test]
    fn delta_application_is_idempotent() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), all);
        view.apply_refresh(delta("a/a", 42), all);

        assert_eq!(view.len(), 1);
        assert_eq!(view.row("a/a").map(|row| row.star_count), Some(42));
    }

    #[test]
    fn snapshot_replaces_the_whole_view() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 5), all);
        view.apply_refresh(delta("c/c", 9), all);
        view.apply_refresh(snapshot(&[("a/a", 1), ("b/b", 2)]), all);

        assert_eq!(keys(&view), vec!["a/a", "b/b"]);
        assert_eq!(view.row("a/a").map(|row| row.star_count), Some(1));
        assert_eq!(view.row("b/b").map(|row| row.star_count), Some(2));
        assert!(view.row("c/c").is_none());
    }

    #[test]
    fn snapshot_preserves_prior_row_order_for_surviving_keys() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("z/z", 1), all);
        view.apply_refresh(delta("a/a", 2), all);
        view.apply_refresh(snapshot(&[("a/a", 2), ("m/m", 3), ("z/z", 1)]), all);

        assert_eq!(keys(&view), vec!["z/z", "a/a", "m/m"]);
    }

    #[test]
    fn stray_delta_for_unsubscribed_key_is_dropped() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), |key| key == "a/a");
        view.apply_refresh(delta("b/b", 7), |key| key == "a/a");

        assert_eq!(keys(&view), vec!["a/a"]);
    }

    #[test]
    fn snapshot_filters_unsubscribed_keys() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(snapshot(&[("a/a", 1), ("b/b", 2)]), |key| key == "a/a");

        assert_eq!(keys(&view), vec!["a/a"]);
    }

    #[test]
    fn remove_is_immediate_and_tolerates_unknown_keys() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), all);
        view.remove("a/a");
        view.remove("a/a");

        assert!(view.is_empty());
    }

    #[test]
    fn updated_row_pulses() {
        let mut view = ViewReconciler::new();
        view.apply_refresh(delta("a/a", 42), all);
        assert!(view.row("a/a").is_some_and(DisplayRow::pulsing));
    }
}
