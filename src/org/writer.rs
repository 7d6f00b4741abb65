use chrono::NaiveDateTime;

/// Writes reminder calendars in org-mode format.
pub struct OrgWriter;

impl OrgWriter {
    /// Header of a new calendar file.
    pub fn write_header(title: &str) -> String {
        format!("#+TITLE: {}\n#+TODO: TODO | DONE\n\n", title)
    }

    /// A single open reminder as a level-1 heading.
    pub fn write_reminder(
        id: &str,
        title: &str,
        notes: Option<&str>,
        created: NaiveDateTime,
    ) -> String {
        let indent = "  ";
        let mut out = String::new();

        // Titles are single-line in org; fold anything after a newline into the notes.
        let (headline, overflow) = match title.split_once('\n') {
            Some((first, rest)) => (first, Some(rest)),
            None => (title, None),
        };

        out.push_str("* TODO ");
        out.push_str(headline);
        out.push('\n');

        out.push_str(&format!("{indent}:PROPERTIES:\n"));
        out.push_str(&format!("{indent}:ID: {}\n", id));
        out.push_str(&format!(
            "{indent}:CREATED: [{}]\n",
            created.format("%Y-%m-%d %a %H:%M")
        ));
        out.push_str(&format!("{indent}:END:\n"));

        for body in [overflow, notes].into_iter().flatten() {
            for line in body.lines() {
                out.push_str(indent);
                out.push_str(line);
                out.push('\n');
            }
        }

        out
    }
}
