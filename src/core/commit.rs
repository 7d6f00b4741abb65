use super::reminder::{Calendar, NewReminder};
use crate::store::ReminderStore;
use crate::{Error, Result};

/// Create one reminder per subtask in `calendar`, then commit them in one batch.
///
/// The first save that fails stops the loop, but whatever was already queued is
/// still committed before the error is returned. Nothing is rolled back.
pub fn commit_subtasks<S: ReminderStore>(
    store: &S,
    subtasks: &[String],
    calendar: &Calendar,
) -> Result<usize> {
    let mut queued = 0;
    let mut failure = None;

    for subtask in subtasks {
        match store.save(NewReminder::new(calendar.clone(), subtask.as_str()), false) {
            Ok(()) => queued += 1,
            Err(e) => {
                failure = Some(Error::Queue {
                    queued,
                    reason: e.to_string(),
                });
                break;
            }
        }
    }

    let committed = store.commit();

    match (failure, committed) {
        (None, Ok(())) => {
            log::info!("Added {} reminders to {}", queued, calendar.title);
            Ok(queued)
        }
        (Some(e), committed) => {
            if let Err(commit_err) = committed {
                log::error!("Commit after failed save also failed: {}", commit_err);
            }
            log::error!("Error: {}", e);
            Err(e)
        }
        (None, Err(e)) => {
            log::error!("Error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reminder::Reminder;
    use crate::store::{MemoryStore, StoreChanged};
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    fn home() -> Calendar {
        Calendar::new("home", "Home")
    }

    fn subtasks(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Step {}", i)).collect()
    }

    /// Store wrapper whose `fail_at`-th save (1-based) errors.
    struct FailingStore {
        inner: MemoryStore,
        fail_at: usize,
        saves: Mutex<usize>,
    }

    impl ReminderStore for FailingStore {
        async fn request_access(&self) -> Result<bool> {
            self.inner.request_access().await
        }

        async fn fetch_reminders(&self) -> Result<Vec<Reminder>> {
            self.inner.fetch_reminders().await
        }

        fn save(&self, reminder: NewReminder, commit: bool) -> Result<()> {
            let mut saves = self.saves.lock().unwrap();
            *saves += 1;
            if *saves == self.fail_at {
                return Err(Error::Commit("disk full".into()));
            }
            self.inner.save(reminder, commit)
        }

        fn commit(&self) -> Result<()> {
            self.inner.commit()
        }

        fn subscribe(&self) -> broadcast::Receiver<StoreChanged> {
            self.inner.subscribe()
        }
    }

    #[tokio::test]
    async fn every_subtask_becomes_a_reminder() {
        let store = MemoryStore::new(vec![home()]);
        let added = commit_subtasks(&store, &subtasks(3), &home()).unwrap();
        assert_eq!(added, 3);
        let titles: Vec<_> = store
            .fetch_reminders()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| r.title)
            .collect();
        assert_eq!(titles, subtasks(3));
    }

    #[tokio::test]
    async fn failed_save_commits_what_was_queued() {
        let store = FailingStore {
            inner: MemoryStore::new(vec![home()]),
            fail_at: 3,
            saves: Mutex::new(0),
        };
        let err = commit_subtasks(&store, &subtasks(5), &home()).unwrap_err();
        assert!(matches!(err, Error::Queue { queued: 2, .. }));

        let titles: Vec<_> = store
            .fetch_reminders()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|r| r.title)
            .collect();
        assert_eq!(titles, vec!["Step 1", "Step 2"]);
        // Subtasks 4 and 5 were never offered to the store.
        assert_eq!(*store.saves.lock().unwrap(), 3);
        assert_eq!(store.inner.pending_len(), 0);
    }

    #[test]
    fn nothing_to_commit_is_fine() {
        let store = MemoryStore::new(vec![home()]);
        assert_eq!(commit_subtasks(&store, &[], &home()).unwrap(), 0);
    }
}
