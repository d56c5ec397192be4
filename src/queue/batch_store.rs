// In-memory batch queue
//
// Append-only: entries are created by batch submissions and read by status
// queries. Nothing consumes the queue or changes an entry's status.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

use crate::core::types::{QueueEntry, QueueStatus};

/// Thread-safe store of queue entries grouped by batch id.
///
/// A single mutex guards the map. Callers must finish any I/O before calling
/// `append`, which only touches memory while the lock is held.
#[derive(Debug, Default)]
pub struct BatchStore {
    batches: Mutex<BTreeMap<String, Vec<QueueEntry>>>,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append all entries of one submission in a single critical section.
    ///
    /// Entries keep the order they are given in. Entries sharing a batch id with
    /// an earlier submission (same second) extend that batch.
    pub fn append(&self, entries: Vec<QueueEntry>) {
        if entries.is_empty() {
            return;
        }

        let count = entries.len();
        let mut batches = self.batches.lock();
        for entry in entries {
            batches.entry(entry.batch_id.clone()).or_default().push(entry);
        }
        drop(batches);

        debug!("Appended {} queue entries", count);
    }

    /// Entries for `batch_id` in insertion order, or `None` when there are none
    pub fn query_by_batch(&self, batch_id: &str) -> Option<Vec<QueueEntry>> {
        let batches = self.batches.lock();
        batches
            .get(batch_id)
            .filter(|entries| !entries.is_empty())
            .cloned()
    }

    /// Total number of entries across all batches
    pub fn len(&self) -> usize {
        self.batches.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct batch ids seen
    pub fn batch_count(&self) -> usize {
        self.batches.lock().len()
    }
}

/// True iff every entry is `Completed`.
///
/// No code path marks entries completed, so this is false for any non-empty
/// batch. An empty slice is vacuously complete.
pub fn all_completed(entries: &[QueueEntry]) -> bool {
    entries
        .iter()
        .all(|entry| entry.status == QueueStatus::Completed)
}

/// Batch id for a submission made now: epoch seconds as a decimal string.
///
/// Two submissions in the same second get the same id.
pub fn new_batch_id() -> String {
    batch_id_at(SystemTime::now())
}

pub fn batch_id_at(time: SystemTime) -> String {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    fn entry(batch: &str, name: &str) -> QueueEntry {
        QueueEntry::queued(
            batch,
            name.to_string(),
            PathBuf::from(format!("/tmp/uploads/{}_{}", batch, name)),
        )
    }

    #[test]
    fn test_query_unknown_batch() {
        let store = BatchStore::new();
        assert!(store.query_by_batch("doesnotexist").is_none());
    }

    #[test]
    fn test_append_preserves_order() {
        let store = BatchStore::new();
        store.append(vec![entry("1", "a.png"), entry("1", "c.jpg"), entry("1", "b.webp")]);

        let names: Vec<_> = store
            .query_by_batch("1")
            .unwrap()
            .into_iter()
            .map(|e| e.original_name)
            .collect();
        assert_eq!(names, vec!["a.png", "c.jpg", "b.webp"]);
    }

    #[test]
    fn test_empty_append_creates_nothing() {
        let store = BatchStore::new();
        store.append(Vec::new());
        assert!(store.is_empty());
        assert_eq!(store.batch_count(), 0);
    }

    #[test]
    fn test_same_second_submissions_share_batch() {
        let store = BatchStore::new();
        store.append(vec![entry("7", "a.png")]);
        store.append(vec![entry("7", "b.png")]);
        assert_eq!(store.query_by_batch("7").unwrap().len(), 2);
        assert_eq!(store.batch_count(), 1);
    }

    #[test]
    fn test_all_completed_is_false_for_queued() {
        let entries = vec![entry("1", "a.png"), entry("1", "b.png")];
        assert!(!all_completed(&entries));

        let mut done = entries.clone();
        for e in &mut done {
            e.status = QueueStatus::Completed;
        }
        assert!(all_completed(&done));
        assert!(!all_completed(&[done[0].clone(), entries[1].clone()]));
    }

    #[test]
    fn test_batch_id_is_epoch_seconds() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
        assert_eq!(batch_id_at(t), "1700000000");
        assert!(new_batch_id().parse::<u64>().is_ok());
    }

    #[test]
    fn test_concurrent_submitters_do_not_interleave() {
        let store = Arc::new(BatchStore::new());
        let submitters = 16;
        let per_batch = 25;

        let handles: Vec<_> = (0..submitters)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let batch = format!("batch-{}", i);
                    let entries = (0..per_batch)
                        .map(|j| entry(&batch, &format!("{}.png", j)))
                        .collect();
                    store.append(entries);
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), submitters * per_batch);
        for i in 0..submitters {
            let batch = format!("batch-{}", i);
            let entries = store.query_by_batch(&batch).unwrap();
            assert_eq!(entries.len(), per_batch);
            for (j, e) in entries.iter().enumerate() {
                assert_eq!(e.batch_id, batch);
                assert_eq!(e.original_name, format!("{}.png", j));
            }
        }
    }
}
