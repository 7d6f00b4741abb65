use serde::{Deserialize, Serialize};

/// A named collection of reminders; new subtasks land in the source reminder's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Calendar {
    pub id: String,
    pub title: String,
}

impl Calendar {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    /// Absent only when the store hands back a damaged record.
    pub title: Option<String>,
    pub notes: Option<String>,
    pub calendar: Calendar,
    pub is_completed: bool,
}

impl Reminder {
    pub fn new(id: impl Into<String>, title: impl Into<String>, calendar: Calendar) -> Self {
        Self {
            id: id.into(),
            title: Some(title.into()),
            notes: None,
            calendar,
            is_completed: false,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn completed(mut self) -> Self {
        self.is_completed = true;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Notes, if present and non-empty.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref().filter(|n| !n.is_empty())
    }
}

/// A reminder queued for creation but not yet saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReminder {
    pub calendar: Calendar,
    pub title: String,
}

impl NewReminder {
    pub fn new(calendar: Calendar, title: impl Into<String>) -> Self {
        Self {
            calendar,
            title: title.into(),
        }
    }
}

/// How finely a reminder gets broken down; each level asks for four more subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "u8")]
pub struct DetailLevel(u8);

impl DetailLevel {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    /// Clamps into `1..=5`.
    pub fn new(level: u8) -> Self {
        Self(level.clamp(Self::MIN, Self::MAX))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn subtask_count(self) -> usize {
        usize::from(self.0) * 4
    }
}

impl Default for DetailLevel {
    fn default() -> Self {
        Self(3)
    }
}

impl From<u8> for DetailLevel {
    fn from(level: u8) -> Self {
        Self::new(level)
    }
}

/// Settings files may hold any integer; clamp rather than reject.
impl From<i64> for DetailLevel {
    fn from(level: i64) -> Self {
        Self(level.clamp(i64::from(Self::MIN), i64::from(Self::MAX)) as u8)
    }
}

impl From<DetailLevel> for u8 {
    fn from(level: DetailLevel) -> Self {
        level.0
    }
}
