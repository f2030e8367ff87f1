//! Terminal rendering for caledit types.
//!
//! Colors come from owo_colors; the session itself never prints.

use caledit_core::recurrence::{EndCondition, Frequency, MonthlyMode, RecurrenceField};
use caledit_core::{
    Alert, AlertLevel, EditorConfig, EditorView, Event, EventEditSession, LocaleConfig, Reminder,
    RepeatState,
};
use owo_colors::OwoColorize;

/// Extension trait for colored terminal output.
pub trait Render {
    fn render(&self) -> String;
}

impl Render for Alert {
    fn render(&self) -> String {
        match self.level {
            AlertLevel::Info => self.message.dimmed().to_string(),
            AlertLevel::Success => self.message.green().to_string(),
            AlertLevel::Warning => self.message.yellow().to_string(),
            AlertLevel::Error => self.message.red().to_string(),
        }
    }
}

impl Render for Reminder {
    fn render(&self) -> String {
        let minutes = self.minutes;
        if minutes == 0 {
            "at start".to_string()
        } else if minutes % (60 * 24) == 0 {
            format!("{} {} before", minutes / (60 * 24), pluralize("day", minutes / (60 * 24)))
        } else if minutes % 60 == 0 {
            format!("{} {} before", minutes / 60, pluralize("hour", minutes / 60))
        } else {
            format!("{} {} before", minutes, pluralize("minute", minutes))
        }
    }
}

fn pluralize(word: &str, count: i64) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

/// Shows session alerts on stderr.
pub struct TerminalView;

impl EditorView for TerminalView {
    fn alert(&mut self, alert: Alert) {
        eprintln!("  {}", alert.render());
    }

    fn backtrack(&mut self) {
        tracing::debug!("Editor closed");
    }
}

fn field(label: &str, value: &str) -> String {
    format!("  {:<12}{}", format!("{}:", label).dimmed(), value)
}

/// An event as stored, one line per populated field.
pub fn render_event(event: &Event, locale: &LocaleConfig) -> Vec<String> {
    let tz = locale.default_timezone;
    let mut lines = vec![format!("  {}", event.summary.bold())];

    let start = event.start_local(tz);
    let end = event.end_local(tz);
    let when = if event.is_allday() {
        let first = start.date().format(&locale.date_format).to_string();
        let last = end.date().format(&locale.date_format).to_string();
        if first == last { first } else { format!("{} - {}", first, last) }
    } else {
        format!(
            "{} - {}",
            start.format(&locale.date_format, &locale.time_format),
            end.format(&locale.date_format, &locale.time_format)
        )
    };
    lines.push(field("When", &when));

    if let Some(rule) = &event.rrule {
        lines.push(field("Repeats", &rule.to_string()));
    }
    if !event.location.is_empty() {
        lines.push(field("Location", &event.location));
    }
    if !event.categories.is_empty() {
        lines.push(field("Categories", &event.categories));
    }
    if !event.description.is_empty() {
        lines.push(field("Description", &event.description));
    }
    for reminder in &event.reminders {
        lines.push(field("Alarm", &reminder.render()));
    }
    lines.push(field("Calendar", &event.calendar));
    lines.push(field("UID", &event.uid).dimmed().to_string());

    lines
}

/// The editor's current state, with upcoming occurrences for repeating events.
pub fn render_session(
    session: &EventEditSession<'_>,
    config: &EditorConfig,
    preview: u16,
) -> Vec<String> {
    let locale = &config.locale;
    let range = session.range();
    let mut lines = vec![format!("  {}", session.title().bold())];

    lines.push(field("Title", session.summary()));
    lines.push(field("Calendar", session.calendar().active()));

    let start = match range.start_time_text() {
        Some(time) => format!("{} {}", range.start_date_text(), time),
        None => range.start_date_text(),
    };
    let end = match range.end_time_text() {
        Some(time) => format!("{} {}", range.end_date_text(), time),
        None => range.end_date_text(),
    };
    let allday = if range.allday() { " (all day)" } else { "" };
    lines.push(field("When", &format!("{} - {}{}", start, end, allday)));

    for (label, value) in [
        ("Location", session.location()),
        ("Categories", session.categories()),
        ("Description", session.description()),
    ] {
        if !value.is_empty() {
            lines.push(field(label, value));
        }
    }

    for reminder in session.alarms().reminders() {
        lines.push(field("Alarm", &reminder.render()));
    }

    lines.extend(render_recurrence(session));

    if session.recurrence().is_repeating() && preview > 0 {
        match session.recurrence().preview(preview) {
            Ok(dates) => {
                for (i, date) in dates.iter().enumerate() {
                    let label = if i == 0 { "Next" } else { "" };
                    let text = date.format(&locale.date_format, &locale.time_format);
                    lines.push(field(label, &text.dimmed().to_string()));
                }
            }
            Err(e) => lines.push(field("Next", &e.to_string().red().to_string())),
        }
    }

    lines
}

fn render_recurrence(session: &EventEditSession<'_>) -> Vec<String> {
    let recurrence = session.recurrence();
    let mut parts = Vec::new();
    let mut lines = Vec::new();

    for visible in recurrence.visible_fields() {
        match visible {
            RecurrenceField::UnsupportedNotice => {
                let rule = recurrence
                    .original()
                    .map(|r| r.to_string())
                    .unwrap_or_default();
                lines.push(field("Repeats", &rule));
                lines.push(
                    "  Repetition rules can't be edited here; pass --edit-anyway to replace them"
                        .yellow()
                        .to_string(),
                );
            }
            RecurrenceField::EditAnyway => {}
            RecurrenceField::RepeatToggle => {
                if recurrence.state() == RepeatState::NoRepeat {
                    lines.push(field("Repeats", "no"));
                }
            }
            RecurrenceField::Frequency => parts.push(recurrence.frequency().label().to_string()),
            RecurrenceField::Interval => {
                if recurrence.interval() != 1 {
                    parts.push(format!("every {}", recurrence.interval()));
                }
            }
            RecurrenceField::Weekdays => {
                let days: Vec<_> = recurrence
                    .weekdays()
                    .labels()
                    .into_iter()
                    .map(|(token, on)| {
                        if on { token.bold().to_string() } else { token.dimmed().to_string() }
                    })
                    .collect();
                parts.push(days.join(" "));
            }
            RecurrenceField::MonthlyMode => {
                if recurrence.frequency() == Frequency::Monthly
                    && recurrence.monthly_mode() == MonthlyMode::NthWeekday
                {
                    parts.push(recurrence.monthly_label());
                }
            }
            RecurrenceField::EndCondition => {
                if recurrence.end_condition() == EndCondition::Forever {
                    parts.push(EndCondition::Forever.label().to_lowercase());
                }
            }
            RecurrenceField::UntilDate => parts.push(format!("until {}", recurrence.until_text())),
            RecurrenceField::Repetitions => {
                parts.push(format!("{} times", recurrence.repetitions()))
            }
        }
    }

    if !parts.is_empty() {
        lines.push(field("Repeats", &parts.join(", ")));
    }
    lines
}
