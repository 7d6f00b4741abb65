use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::cache::ReminderCache;
use super::reminder::Reminder;
use crate::Result;

/// Lazily loaded plain-text data carried by a drag.
pub trait PayloadProvider: Send + Sync + 'static {
    /// The raw bytes, or `None` when the drag carries no text.
    fn load_data(&self) -> BoxFuture<'_, Result<Option<Vec<u8>>>>;
}

impl PayloadProvider for String {
    fn load_data(&self) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        futures::future::ready(Ok(Some(self.as_bytes().to_vec()))).boxed()
    }
}

impl PayloadProvider for &'static str {
    fn load_data(&self) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        futures::future::ready(Ok(Some(self.as_bytes().to_vec()))).boxed()
    }
}

impl PayloadProvider for Vec<u8> {
    fn load_data(&self) -> BoxFuture<'_, Result<Option<Vec<u8>>>> {
        futures::future::ready(Ok(Some(self.clone()))).boxed()
    }
}

pub type Payload = Box<dyn PayloadProvider>;

/// The title a dragged reminder carries: its first non-empty line, without a trailing `\r`.
pub fn extract_title(data: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(data).ok()?;
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Load and decode a payload's title. Every failure reads as "no title".
pub async fn title_from_payload(payload: &dyn PayloadProvider) -> Option<String> {
    match payload.load_data().await {
        Ok(Some(data)) => {
            let title = extract_title(&data);
            if title.is_none() {
                log::debug!("Drop payload is not usable text");
            }
            title
        }
        Ok(None) => {
            log::debug!("Drop payload carries no data");
            None
        }
        Err(e) => {
            log::warn!("Failed to load drop payload: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DropPhase {
    #[default]
    Idle,
    Hovering,
    /// Terminal for the current gesture.
    Dropped,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropState {
    pub phase: DropPhase,
    pub hover_match: Option<Reminder>,
    pub committed_match: Option<Reminder>,
}

pub enum DropEvent {
    Enter(Payload),
    Exit,
    Drop(Payload),
    /// Forget the finished gesture and start over.
    Reset,
}

/// Resolves drags onto the drop target to cached reminders.
///
/// Events are handled one at a time, so a drop that has been committed is never
/// overwritten by a hover that resolves later.
#[derive(Debug)]
pub struct DropResolver {
    cache: ReminderCache,
    state: watch::Sender<DropState>,
}

impl DropResolver {
    pub fn new(cache: ReminderCache) -> Self {
        let (state, _) = watch::channel(DropState::default());
        Self { cache, state }
    }

    pub fn state(&self) -> DropState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DropState> {
        self.state.subscribe()
    }

    async fn resolve(&self, payload: &dyn PayloadProvider) -> Option<Reminder> {
        let title = title_from_payload(payload).await?;
        log::debug!("Drop payload title: {}", title);
        self.cache.lookup(&title)
    }

    pub async fn handle(&self, event: DropEvent) {
        match event {
            DropEvent::Enter(payload) => {
                if self.state.borrow().phase == DropPhase::Dropped {
                    return;
                }
                let found = self.resolve(payload.as_ref()).await;
                self.state.send_modify(|state| {
                    if state.phase == DropPhase::Dropped {
                        return;
                    }
                    match found {
                        Some(reminder) => {
                            log::debug!("Reminder entered: {}", reminder.id);
                            state.phase = DropPhase::Hovering;
                            state.hover_match = Some(reminder);
                        }
                        None => {
                            state.phase = DropPhase::Idle;
                            state.hover_match = None;
                        }
                    }
                });
            }
            DropEvent::Exit => {
                self.state.send_if_modified(|state| {
                    if state.phase != DropPhase::Hovering {
                        return false;
                    }
                    if let Some(ref reminder) = state.hover_match {
                        log::debug!("Reminder exited: {}", reminder.id);
                    }
                    state.phase = DropPhase::Idle;
                    state.hover_match = None;
                    true
                });
            }
            DropEvent::Drop(payload) => {
                if self.state.borrow().phase == DropPhase::Dropped {
                    return;
                }
                let Some(reminder) = self.resolve(payload.as_ref()).await else {
                    log::debug!("Dropped payload matches no reminder");
                    return;
                };
                log::info!("Reminder dropped: {}", reminder.id);
                self.state.send_if_modified(|state| {
                    if state.committed_match.is_some() {
                        return false;
                    }
                    state.phase = DropPhase::Dropped;
                    state.hover_match = None;
                    state.committed_match = Some(reminder);
                    true
                });
            }
            DropEvent::Reset => {
                self.state.send_replace(DropState::default());
            }
        }
    }

    /// Move the resolver onto its own worker task.
    pub fn spawn(self) -> DropTarget {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let state = self.subscribe();
        let worker = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.handle(event).await;
            }
        });
        DropTarget { tx, state, worker }
    }
}

/// Handle given to the UI; every call returns immediately.
#[derive(Debug)]
pub struct DropTarget {
    tx: mpsc::UnboundedSender<DropEvent>,
    state: watch::Receiver<DropState>,
    worker: JoinHandle<()>,
}

impl DropTarget {
    fn send(&self, event: DropEvent) {
        if self.tx.send(event).is_err() {
            log::warn!("Drop worker has stopped");
        }
    }

    pub fn drop_entered(&self, payload: impl PayloadProvider) {
        self.send(DropEvent::Enter(Box::new(payload)));
    }

    pub fn drop_exited(&self) {
        self.send(DropEvent::Exit);
    }

    /// Accepts the drop unconditionally; resolution happens afterwards.
    pub fn perform_drop(&self, payload: impl PayloadProvider) -> bool {
        self.send(DropEvent::Drop(Box::new(payload)));
        true
    }

    pub fn reset(&self) {
        self.send(DropEvent::Reset);
    }

    pub fn state(&self) -> DropState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DropState> {
        self.state.clone()
    }

    /// Stop taking events and wait for the ones already sent to finish.
    pub async fn close(self) -> DropState {
        let Self { tx, state, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            log::error!("Drop worker failed: {}", e);
        }
        state.borrow().clone()
    }
}

impl std::fmt::Debug for DropEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Enter(_) => f.write_str("Enter"),
            Self::Exit => f.write_str("Exit"),
            Self::Drop(_) => f.write_str("Drop"),
            Self::Reset => f.write_str("Reset"),
        }
    }
}
