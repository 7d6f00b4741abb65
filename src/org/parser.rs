use regex::Regex;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::core::reminder::{Calendar, Reminder};

/// UUID v5 namespace for headings that were written without an `:ID:` property.
pub const HEADING_UUID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x52, 0x9e, 0x7a, 0x44, 0x4b, 0x0d, 0x9c, 0x61, 0x2e, 0x85, 0xd0, 0x17, 0xa9,
    0x4b,
]);

static HEADLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<stars>\*+)\s+(?:(?P<state>TODO|DONE)\s+)?(?P<title>.+?)\s*$").unwrap()
});

static FILE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#\+TITLE:\s*(?P<title>.*?)\s*$").unwrap());

static PROPERTY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*:(?P<key>[A-Z_]+):\s+(?P<value>.+)$").unwrap()
});

pub struct OrgParser;

/// One org file: the `#+TITLE:` line and its headings.
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub title: Option<String>,
    pub headings: Vec<ParsedHeading>,
}

#[derive(Debug, Clone)]
pub struct ParsedHeading {
    pub level: usize,
    pub done: bool,
    pub title: String,
    pub properties: Vec<(String, String)>,
    pub notes: String,
}

impl OrgParser {
    pub fn parse(input: &str) -> ParsedFile {
        let lines: Vec<&str> = input.lines().collect();
        let mut file = ParsedFile::default();
        let mut i = 0;

        while i < lines.len() {
            if file.title.is_none() && file.headings.is_empty() {
                if let Some(caps) = FILE_TITLE_RE.captures(lines[i]) {
                    file.title = Some(caps["title"].to_string());
                    i += 1;
                    continue;
                }
            }

            let Some(captures) = HEADLINE_RE.captures(lines[i]) else {
                i += 1;
                continue;
            };

            let level = captures
                .name("stars")
                .map(|m| m.as_str().len())
                .unwrap_or(1);
            let done = captures.name("state").is_some_and(|m| m.as_str() == "DONE");
            let title = captures["title"].to_string();
            i += 1;

            let mut properties = Vec::new();
            if i < lines.len() && lines[i].trim() == ":PROPERTIES:" {
                i += 1;
                while i < lines.len() && lines[i].trim() != ":END:" {
                    if let Some(caps) = PROPERTY_RE.captures(lines[i]) {
                        properties.push((caps["key"].to_string(), caps["value"].to_string()));
                    }
                    i += 1;
                }
                if i < lines.len() {
                    i += 1; // skip :END:
                }
            }

            let mut note_lines = Vec::new();
            while i < lines.len() && !HEADLINE_RE.is_match(lines[i]) {
                note_lines.push(lines[i].strip_prefix("  ").unwrap_or(lines[i]));
                i += 1;
            }
            while note_lines.last().is_some_and(|l| l.trim().is_empty()) {
                note_lines.pop();
            }

            file.headings.push(ParsedHeading {
                level,
                done,
                title,
                properties,
                notes: note_lines.join("\n"),
            });
        }

        file
    }

    pub fn get_property<'a>(properties: &'a [(String, String)], key: &str) -> Option<&'a str> {
        properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Turn the level-1 headings of a calendar file into reminders, in file order.
pub fn headings_to_reminders(file: &ParsedFile, calendar: &Calendar) -> Vec<Reminder> {
    file.headings
        .iter()
        .enumerate()
        .filter(|(_, h)| h.level == 1)
        .map(|(index, h)| {
            let id = OrgParser::get_property(&h.properties, "ID")
                .map(str::to_string)
                .unwrap_or_else(|| {
                    let name = format!("{}:{}:{}", calendar.id, index, h.title);
                    Uuid::new_v5(&HEADING_UUID_NAMESPACE, name.as_bytes()).to_string()
                });
            Reminder {
                id,
                title: Some(h.title.clone()),
                notes: (!h.notes.is_empty()).then(|| h.notes.clone()),
                calendar: calendar.clone(),
                is_completed: h.done,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_file_title_and_headings() {
        let input = "\
#+TITLE: Home

* TODO Clean room
  :PROPERTIES:
  :ID: 550e8400-e29b-41d4-a716-446655440000
  :CREATED: [2026-02-23 Mon 14:00]
  :END:
  before Friday
* DONE Buy milk
";
        let file = OrgParser::parse(input);
        assert_eq!(file.title.as_deref(), Some("Home"));
        assert_eq!(file.headings.len(), 2);

        let h = &file.headings[0];
        assert_eq!(h.title, "Clean room");
        assert!(!h.done);
        assert_eq!(h.notes, "before Friday");
        assert_eq!(
            OrgParser::get_property(&h.properties, "ID"),
            Some("550e8400-e29b-41d4-a716-446655440000")
        );
        assert!(file.headings[1].done);
    }

    #[test]
    fn reminders_keep_file_order_and_calendar() {
        let input = "#+TITLE: Home\n* TODO First\n* Second\n** TODO Nested\n* DONE Third\n";
        let cal = Calendar::new("home", "Home");
        let reminders = headings_to_reminders(&OrgParser::parse(input), &cal);
        let titles: Vec<_> = reminders.iter().filter_map(|r| r.title()).collect();
        assert_eq!(titles, vec!["First", "Second", "Third"]);
        assert!(reminders[2].is_completed);
        assert!(reminders.iter().all(|r| r.calendar == cal));
    }

    #[test]
    fn missing_id_is_stable_across_parses() {
        let input = "* TODO No id here\n";
        let cal = Calendar::new("home", "Home");
        let a = headings_to_reminders(&OrgParser::parse(input), &cal);
        let b = headings_to_reminders(&OrgParser::parse(input), &cal);
        assert_eq!(a[0].id, b[0].id);
    }
}
