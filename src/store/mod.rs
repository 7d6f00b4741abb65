pub mod memory;
pub mod org;

use std::future::Future;

use tokio::sync::broadcast;

use crate::Result;
use crate::core::reminder::{NewReminder, Reminder};

pub use memory::MemoryStore;
pub use org::OrgStore;

/// Emitted whenever any writer adds, edits or removes a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreChanged;

/// Durable reminder storage grouped into calendars.
///
/// Writes are two-phase: `save(.., false)` queues a reminder and `commit`
/// persists everything queued so far.
pub trait ReminderStore: Send + Sync + 'static {
    /// Ask for permission to read and write reminders.
    fn request_access(&self) -> impl Future<Output = Result<bool>> + Send;

    /// All reminders across all calendars, completed ones included.
    fn fetch_reminders(&self) -> impl Future<Output = Result<Vec<Reminder>>> + Send;

    fn save(&self, reminder: NewReminder, commit: bool) -> Result<()>;

    fn commit(&self) -> Result<()>;

    /// A fresh receiver for change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreChanged>;
}

/// Fan-out of change notifications to every subscriber.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<StoreChanged>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreChanged> {
        self.tx.subscribe()
    }

    pub fn notify(&self) {
        // No subscribers is fine.
        let _ = self.tx.send(StoreChanged);
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
