use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{ChangeNotifier, ReminderStore, StoreChanged};
use crate::core::reminder::{Calendar, NewReminder, Reminder};
use crate::org::parser::{OrgParser, headings_to_reminders};
use crate::org::writer::OrgWriter;
use crate::{Error, Result};

/// Name, length and mtime of every calendar file, sorted by name.
type Fingerprint = Vec<(String, u64, Option<SystemTime>)>;

/// Reminder store backed by a directory of org files, one file per calendar.
///
/// The file stem is the calendar id and the `#+TITLE:` line its display name.
#[derive(Debug)]
pub struct OrgStore {
    directory: PathBuf,
    pending: Mutex<Vec<NewReminder>>,
    last_seen: Mutex<Option<Fingerprint>>,
    changes: ChangeNotifier,
}

impl OrgStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            pending: Mutex::new(Vec::new()),
            last_seen: Mutex::new(None),
            changes: ChangeNotifier::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn calendar_path(&self, id: &str) -> PathBuf {
        self.directory.join(format!("{}.org", id))
    }

    fn pending(&self) -> MutexGuard<'_, Vec<NewReminder>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create an empty calendar file unless one with this id already exists.
    pub fn create_calendar(&self, id: &str, title: &str) -> Result<Calendar> {
        std::fs::create_dir_all(&self.directory)?;
        let path = self.calendar_path(id);
        if !path.exists() {
            std::fs::write(&path, OrgWriter::write_header(title))?;
            self.remember_fingerprint();
            self.changes.notify();
        }
        Ok(Calendar::new(id, title))
    }

    fn calendar_files(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "org"))
            .collect();
        files.sort();
        Ok(files)
    }

    fn fingerprint(&self) -> Fingerprint {
        let files = match self.calendar_files() {
            Ok(files) => files,
            Err(_) => return Vec::new(),
        };
        files
            .into_iter()
            .map(|path| {
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned());
                let meta = std::fs::metadata(&path).ok();
                (
                    name.unwrap_or_default(),
                    meta.as_ref().map(|m| m.len()).unwrap_or(0),
                    meta.and_then(|m| m.modified().ok()),
                )
            })
            .collect()
    }

    fn remember_fingerprint(&self) {
        let current = self.fingerprint();
        *self.last_seen.lock().unwrap_or_else(|e| e.into_inner()) = Some(current);
    }

    /// Poll the directory and broadcast a change when another writer touches a calendar file.
    ///
    /// The task stops once the store is dropped.
    pub fn spawn_watcher(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else { break };
                let current = store.fingerprint();
                let changed = {
                    let mut last = store.last_seen.lock().unwrap_or_else(|e| e.into_inner());
                    let changed = last.as_ref().is_some_and(|seen| *seen != current);
                    *last = Some(current);
                    changed
                };
                if changed {
                    log::debug!("Reminder files changed on disk: {}", store.directory.display());
                    store.changes.notify();
                }
            }
        })
    }
}

async fn read_calendar(path: &Path) -> Result<Vec<Reminder>> {
    let content = tokio::fs::read_to_string(path).await?;
    let file = OrgParser::parse(&content);
    let id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = file.title.clone().unwrap_or_else(|| id.clone());
    Ok(headings_to_reminders(&file, &Calendar::new(id, title)))
}

impl ReminderStore for OrgStore {
    async fn request_access(&self) -> Result<bool> {
        match tokio::fs::create_dir_all(&self.directory).await {
            Ok(()) => Ok(true),
            Err(e) => {
                log::warn!(
                    "Cannot use reminders directory {}: {}",
                    self.directory.display(),
                    e
                );
                Ok(false)
            }
        }
    }

    async fn fetch_reminders(&self) -> Result<Vec<Reminder>> {
        let mut reminders = Vec::new();
        for path in self.calendar_files()? {
            reminders.extend(read_calendar(&path).await?);
        }
        Ok(reminders)
    }

    fn save(&self, reminder: NewReminder, commit: bool) -> Result<()> {
        if !self.calendar_path(&reminder.calendar.id).exists() {
            return Err(Error::UnknownCalendar(reminder.calendar.id));
        }
        self.pending().push(reminder);
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let pending = std::mem::take(&mut *self.pending());
        if pending.is_empty() {
            return Ok(());
        }

        // Keep queue order within each calendar file.
        let mut by_calendar: BTreeMap<String, Vec<NewReminder>> = BTreeMap::new();
        for draft in pending {
            by_calendar
                .entry(draft.calendar.id.clone())
                .or_default()
                .push(draft);
        }

        let created = chrono::Local::now().naive_local();
        let mut written = 0;
        let mut failure = None;
        let mut calendars = by_calendar.into_iter();
        while let Some((id, drafts)) = calendars.next() {
            let path = self.calendar_path(&id);
            let mut out = String::new();
            let existing = std::fs::read_to_string(&path).unwrap_or_default();
            if !existing.is_empty() && !existing.ends_with('\n') {
                out.push('\n');
            }
            for draft in &drafts {
                out.push_str(&OrgWriter::write_reminder(
                    &Uuid::new_v4().to_string(),
                    &draft.title,
                    None,
                    created,
                ));
            }
            let result = std::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .and_then(|mut f| f.write_all(out.as_bytes()));
            match result {
                Ok(()) => written += drafts.len(),
                Err(e) => {
                    log::error!("Failed to write {}: {}", path.display(), e);
                    // Unwritten drafts go back to the queue for the next commit.
                    let mut unwritten = drafts;
                    for (_, rest) in calendars.by_ref() {
                        unwritten.extend(rest);
                    }
                    log::warn!("{} reminders stay queued", unwritten.len());
                    let mut queue = self.pending();
                    unwritten.append(&mut queue);
                    *queue = unwritten;
                    failure = Some(Error::Commit(format!("{}: {}", path.display(), e)));
                    break;
                }
            }
        }

        if written > 0 {
            log::info!("Committed {} reminders to {}", written, self.directory.display());
            self.remember_fingerprint();
            self.changes.notify();
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChanged> {
        self.changes.subscribe()
    }
}
