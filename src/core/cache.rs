use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::reminder::Reminder;
use crate::Result;
use crate::store::ReminderStore;

/// In-memory mirror of every incomplete reminder in the store.
///
/// Refreshes swap the whole sequence at once, so readers always see either the
/// previous list or the new one. Clones share the same list.
#[derive(Debug, Clone)]
pub struct ReminderCache {
    reminders: Arc<watch::Sender<Arc<Vec<Reminder>>>>,
}

impl ReminderCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            reminders: Arc::new(tx),
        }
    }

    /// Replace the cached list, keeping only incomplete reminders that have a title.
    pub fn replace(&self, reminders: Vec<Reminder>) -> usize {
        let open: Vec<Reminder> = reminders
            .into_iter()
            .filter(|r| !r.is_completed && r.title.is_some())
            .collect();
        let count = open.len();
        self.reminders.send_replace(Arc::new(open));
        count
    }

    /// Fetch everything from the store and swap it in.
    pub async fn refresh<S: ReminderStore>(&self, store: &S) -> Result<usize> {
        let all = store.fetch_reminders().await?;
        let count = self.replace(all);
        log::debug!("Reminder cache refreshed: {} incomplete", count);
        Ok(count)
    }

    /// The first cached reminder whose title is exactly `title`.
    ///
    /// Duplicate titles resolve to whichever the store listed first.
    pub fn lookup(&self, title: &str) -> Option<Reminder> {
        self.reminders
            .borrow()
            .iter()
            .find(|r| r.title.as_deref() == Some(title))
            .cloned()
    }

    pub fn snapshot(&self) -> Arc<Vec<Reminder>> {
        self.reminders.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.reminders.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe every swap of the cached list.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Reminder>>> {
        self.reminders.subscribe()
    }

    /// Keep the cache in step with `store`: request access once, load, then
    /// reload on every change notification until the store goes away.
    pub fn spawn_sync<S: ReminderStore>(&self, store: Arc<S>) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut changes = store.subscribe();

            match store.request_access().await {
                Ok(true) => {}
                Ok(false) => {
                    log::warn!("Access to reminders denied; cache stays empty");
                    return;
                }
                Err(e) => {
                    log::warn!("Requesting reminder access failed: {}", e);
                    return;
                }
            }

            cache.refresh_or_log(&*store).await;

            loop {
                match changes.recv().await {
                    Ok(_) | Err(RecvError::Lagged(_)) => cache.refresh_or_log(&*store).await,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    async fn refresh_or_log<S: ReminderStore>(&self, store: &S) {
        if let Err(e) = self.refresh(store).await {
            log::error!("Failed to refresh reminders: {}", e);
        }
    }
}

impl Default for ReminderCache {
    fn default() -> Self {
        Self::new()
    }
}
