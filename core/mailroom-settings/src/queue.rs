//! Pending-change queues shared between the model and its in-flight batches.

use crate::protocol::{BatchAction, BatchRequest, SettingEntry};
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct Queued {
    seq: u64,
    entry: SettingEntry,
    in_flight: bool,
    announced: bool,
}

/// Point-in-time view of everything not yet confirmed by the endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PendingSnapshot {
    pub modified: Vec<SettingEntry>,
    pub deleted: Vec<String>,
    pub restored: Vec<SettingEntry>,
    pub reset: Vec<String>,
    pub requires_reload: bool,
}

impl PendingSnapshot {
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty()
            && self.deleted.is_empty()
            && self.restored.is_empty()
            && self.reset.is_empty()
    }
}

/// A batch taken out of the queues, waiting for its response.
#[derive(Debug)]
pub(crate) struct OutgoingBatch {
    pub request: BatchRequest,
    pub seqs: Vec<u64>,
}

/// The `modified`, `deleted` and `restored` queues never share a path.
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    next_seq: u64,
    modified: Vec<Queued>,
    deleted: Vec<Queued>,
    restored: Vec<Queued>,
    reset: Vec<Queued>,
    requires_reload: bool,
}

#[derive(Debug, Clone, Copy)]
enum Queue {
    Modified,
    Deleted,
    Restored,
}

impl PendingChanges {
    pub fn push_modified(&mut self, entries: Vec<SettingEntry>) {
        self.enqueue(Queue::Modified, entries);
    }

    pub fn push_deleted(&mut self, paths: Vec<String>) {
        self.enqueue(Queue::Deleted, paths.into_iter().map(SettingEntry::path).collect());
    }

    pub fn push_restored(&mut self, entries: Vec<SettingEntry>) {
        self.enqueue(Queue::Restored, entries);
    }

    pub fn push_reset(&mut self, path: &str) {
        if self.reset.iter().any(|q| q.entry.path == path) {
            return;
        }
        let queued = self.queued(SettingEntry::path(path));
        self.reset.push(queued);
    }

    pub fn set_requires_reload(&mut self, requires_reload: bool) {
        self.requires_reload = requires_reload;
    }

    pub fn requires_reload(&self) -> bool {
        self.requires_reload
    }

    fn queued(&mut self, entry: SettingEntry) -> Queued {
        self.next_seq += 1;
        Queued {
            seq: self.next_seq,
            entry,
            in_flight: false,
            announced: false,
        }
    }

    fn enqueue(&mut self, target: Queue, entries: Vec<SettingEntry>) {
        let mut seen = HashSet::new();
        let entries: Vec<SettingEntry> = entries
            .into_iter()
            .filter(|e| seen.insert(e.path.clone()))
            .collect();

        for queue in [&mut self.modified, &mut self.deleted, &mut self.restored] {
            queue.retain(|q| !seen.contains(&q.entry.path));
        }

        let queued: Vec<Queued> = entries.into_iter().map(|e| self.queued(e)).collect();
        match target {
            Queue::Modified => self.modified.extend(queued),
            Queue::Deleted => self.deleted.extend(queued),
            Queue::Restored => self.restored.extend(queued),
        }
    }

    /// Drains the restored queue.
    pub fn take_restored(&mut self) -> Vec<SettingEntry> {
        self.restored.drain(..).map(|q| q.entry).collect()
    }

    /// Modified entries not yet broadcast, marking them as broadcast.
    pub fn announce_modified(&mut self) -> Vec<SettingEntry> {
        announce(&mut self.modified)
    }

    /// Deleted paths not yet broadcast, marking them as broadcast.
    pub fn announce_deleted(&mut self) -> Vec<String> {
        announce(&mut self.deleted)
            .into_iter()
            .map(|e| e.path)
            .collect()
    }

    /// Whether a save has anything to send for `modified` or `deleted`.
    pub fn has_unsaved(&self) -> bool {
        !self.modified.is_empty() || !self.deleted.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_unsaved() && self.restored.is_empty() && self.reset.is_empty()
    }

    fn queue_for(&mut self, action: BatchAction) -> &mut Vec<Queued> {
        match action {
            BatchAction::Delete => &mut self.deleted,
            BatchAction::Set => &mut self.modified,
            BatchAction::Reset => &mut self.reset,
        }
    }

    /// Takes every entry of `action`'s queue that is not already in flight
    /// and marks it in flight. Returns `None` when there is nothing to send.
    pub fn begin_batch(&mut self, action: BatchAction) -> Option<OutgoingBatch> {
        let requires_reload = self.requires_reload;
        let mut seqs = Vec::new();
        let mut setting = Vec::new();
        for queued in self.queue_for(action).iter_mut().filter(|q| !q.in_flight) {
            queued.in_flight = true;
            seqs.push(queued.seq);
            setting.push(queued.entry.clone());
        }
        if seqs.is_empty() {
            return None;
        }
        Some(OutgoingBatch {
            request: BatchRequest::new(action, setting).with_reload(requires_reload),
            seqs,
        })
    }

    /// Drops the entries of a confirmed batch. Entries that were replaced by
    /// a newer change while in flight are already gone and stay gone.
    pub fn commit(&mut self, action: BatchAction, seqs: &[u64]) {
        self.queue_for(action).retain(|q| !seqs.contains(&q.seq));
        self.requires_reload = false;
    }

    /// Returns the entries of a failed batch to the queue.
    pub fn release(&mut self, action: BatchAction, seqs: &[u64]) {
        for queued in self.queue_for(action).iter_mut() {
            if seqs.contains(&queued.seq) {
                queued.in_flight = false;
            }
        }
    }

    pub fn in_flight_count(&self) -> usize {
        [&self.modified, &self.deleted, &self.reset]
            .iter()
            .map(|queue| queue.iter().filter(|q| q.in_flight).count())
            .sum()
    }

    pub fn snapshot(&self) -> PendingSnapshot {
        let entries = |queue: &[Queued]| queue.iter().map(|q| q.entry.clone()).collect::<Vec<_>>();
        let paths = |queue: &[Queued]| queue.iter().map(|q| q.entry.path.clone()).collect::<Vec<_>>();
        PendingSnapshot {
            modified: entries(&self.modified),
            deleted: paths(&self.deleted),
            restored: entries(&self.restored),
            reset: paths(&self.reset),
            requires_reload: self.requires_reload,
        }
    }
}

fn announce(queue: &mut [Queued]) -> Vec<SettingEntry> {
    queue
        .iter_mut()
        .filter(|q| !q.announced)
        .map(|q| {
            q.announced = true;
            q.entry.clone()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn paths(entries: &[SettingEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn queues_stay_disjoint() {
        let mut pending = PendingChanges::default();
        pending.push_deleted(vec!["a".into(), "b".into()]);
        pending.push_modified(vec![SettingEntry::value("a", json!(1))]);
        pending.push_restored(vec![SettingEntry::value("b", json!(2))]);

        let snap = pending.snapshot();
        assert_eq!(paths(&snap.modified), ["a"]);
        assert!(snap.deleted.is_empty());
        assert_eq!(paths(&snap.restored), ["b"]);
    }

    #[test]
    fn new_list_keeps_first_occurrence() {
        let mut pending = PendingChanges::default();
        pending.push_modified(vec![
            SettingEntry::value("a", json!(1)),
            SettingEntry::value("a", json!(2)),
        ]);
        assert_eq!(pending.snapshot().modified, [SettingEntry::value("a", json!(1))]);
    }

    #[test]
    fn requeued_path_moves_to_the_end() {
        let mut pending = PendingChanges::default();
        pending.push_modified(vec![SettingEntry::value("a", json!(1))]);
        pending.push_modified(vec![SettingEntry::value("b", json!(1))]);
        pending.push_modified(vec![SettingEntry::value("a", json!(3))]);
        let snap = pending.snapshot();
        assert_eq!(paths(&snap.modified), ["b", "a"]);
        assert_eq!(snap.modified[1].value, Some(json!(3)));
    }

    #[test]
    fn in_flight_entries_are_not_taken_twice() {
        let mut pending = PendingChanges::default();
        pending.push_modified(vec![SettingEntry::value("a", json!(1))]);
        let first = pending.begin_batch(BatchAction::Set).unwrap();
        assert!(pending.begin_batch(BatchAction::Set).is_none());

        pending.push_modified(vec![SettingEntry::value("b", json!(2))]);
        let second = pending.begin_batch(BatchAction::Set).unwrap();
        assert_eq!(second.request.paths().collect::<Vec<_>>(), ["b"]);

        pending.commit(BatchAction::Set, &first.seqs);
        assert_eq!(paths(&pending.snapshot().modified), ["b"]);
    }

    #[test]
    fn released_entries_are_sent_again() {
        let mut pending = PendingChanges::default();
        pending.push_deleted(vec!["x".into()]);
        let batch = pending.begin_batch(BatchAction::Delete).unwrap();
        pending.release(BatchAction::Delete, &batch.seqs);

        let retry = pending.begin_batch(BatchAction::Delete).unwrap();
        assert_eq!(retry.request.paths().collect::<Vec<_>>(), ["x"]);
    }

    #[test]
    fn change_during_flight_survives_commit() {
        let mut pending = PendingChanges::default();
        pending.push_modified(vec![SettingEntry::value("a", json!(1))]);
        let batch = pending.begin_batch(BatchAction::Set).unwrap();
        pending.push_modified(vec![SettingEntry::value("a", json!(2))]);

        pending.commit(BatchAction::Set, &batch.seqs);
        assert_eq!(pending.snapshot().modified, [SettingEntry::value("a", json!(2))]);
    }

    #[test]
    fn commit_clears_reload_flag() {
        let mut pending = PendingChanges::default();
        pending.set_requires_reload(true);
        pending.push_reset("a");
        pending.push_reset("a");
        let batch = pending.begin_batch(BatchAction::Reset).unwrap();
        assert!(batch.request.requires_reload);
        assert_eq!(batch.request.setting.len(), 1);

        pending.commit(BatchAction::Reset, &batch.seqs);
        assert!(!pending.requires_reload());
        assert!(pending.is_empty());
    }

    #[test]
    fn announce_reports_each_change_once() {
        let mut pending = PendingChanges::default();
        pending.push_deleted(vec!["a".into()]);
        assert_eq!(pending.announce_deleted(), ["a"]);
        assert!(pending.announce_deleted().is_empty());
    }
}
