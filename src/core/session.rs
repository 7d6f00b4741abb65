use super::commit::commit_subtasks;
use super::reminder::{DetailLevel, Reminder};
use super::subtasks::SubtaskGenerator;
use crate::Result;
use crate::chat::ChatClient;
use crate::store::ReminderStore;

/// One pass over a dropped reminder: configure, generate, review, then add or cancel.
///
/// Results live only as long as the session.
#[derive(Debug, Clone)]
pub struct ConfigureSession {
    reminder: Reminder,
    detail_level: DetailLevel,
    results: Vec<String>,
}

impl ConfigureSession {
    pub fn new(reminder: Reminder, detail_level: DetailLevel) -> Self {
        Self {
            reminder,
            detail_level,
            results: Vec::new(),
        }
    }

    pub fn reminder(&self) -> &Reminder {
        &self.reminder
    }

    pub fn detail_level(&self) -> DetailLevel {
        self.detail_level
    }

    pub fn set_detail_level(&mut self, level: DetailLevel) {
        self.detail_level = level;
    }

    pub fn results(&self) -> &[String] {
        &self.results
    }

    pub fn can_figure_out(api_key: &str) -> bool {
        !api_key.is_empty()
    }

    /// Replace the results with a fresh generation.
    pub async fn figure_out<C: ChatClient>(
        &mut self,
        generator: &SubtaskGenerator<C>,
        api_key: &str,
    ) -> &[String] {
        if !Self::can_figure_out(api_key) {
            return &self.results;
        }
        self.results = generator
            .generate(&self.reminder, self.detail_level, api_key)
            .await;
        &self.results
    }

    /// Add every result to the source reminder's calendar.
    pub fn approve<S: ReminderStore>(self, store: &S) -> Result<usize> {
        commit_subtasks(store, &self.results, &self.reminder.calendar)
    }

    pub fn dismiss(self) {
        log::debug!(
            "Dismissed session for {} with {} unsaved results",
            self.reminder.id,
            self.results.len()
        );
    }
}
