use std::sync::{Mutex, MutexGuard};

use tokio::sync::broadcast;
use uuid::Uuid;

use super::{ChangeNotifier, ReminderStore, StoreChanged};
use crate::core::reminder::{Calendar, NewReminder, Reminder};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct Inner {
    calendars: Vec<Calendar>,
    reminders: Vec<Reminder>,
    pending: Vec<NewReminder>,
    denied: bool,
}

/// A reminder store that lives in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    changes: ChangeNotifier,
}

impl MemoryStore {
    pub fn new(calendars: Vec<Calendar>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                calendars,
                ..Inner::default()
            }),
            changes: ChangeNotifier::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Refuse every access request from now on.
    pub fn deny_access(&self) {
        self.lock().denied = true;
    }

    /// Add a reminder as if another app had written it.
    pub fn insert(&self, reminder: Reminder) {
        self.lock().reminders.push(reminder);
        self.changes.notify();
    }

    /// Mark a reminder completed. Returns false if the id is unknown.
    pub fn complete(&self, id: &str) -> bool {
        let found = {
            let mut inner = self.lock();
            match inner.reminders.iter_mut().find(|r| r.id == id) {
                Some(r) => {
                    r.is_completed = true;
                    true
                }
                None => false,
            }
        };
        if found {
            self.changes.notify();
        }
        found
    }

    pub fn reminders(&self) -> Vec<Reminder> {
        self.lock().reminders.clone()
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }
}

impl ReminderStore for MemoryStore {
    async fn request_access(&self) -> Result<bool> {
        Ok(!self.lock().denied)
    }

    async fn fetch_reminders(&self) -> Result<Vec<Reminder>> {
        let inner = self.lock();
        if inner.denied {
            return Err(Error::AccessDenied);
        }
        Ok(inner.reminders.clone())
    }

    fn save(&self, reminder: NewReminder, commit: bool) -> Result<()> {
        {
            let mut inner = self.lock();
            if !inner.calendars.iter().any(|c| c.id == reminder.calendar.id) {
                return Err(Error::UnknownCalendar(reminder.calendar.id));
            }
            inner.pending.push(reminder);
        }
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let committed = {
            let mut inner = self.lock();
            let pending = std::mem::take(&mut inner.pending);
            let count = pending.len();
            for draft in pending {
                inner.reminders.push(Reminder::new(
                    Uuid::new_v4().to_string(),
                    draft.title,
                    draft.calendar,
                ));
            }
            count
        };
        if committed > 0 {
            log::debug!("Committed {} reminders to memory store", committed);
            self.changes.notify();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChanged> {
        self.changes.subscribe()
    }
}
