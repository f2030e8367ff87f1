//! Small sub-editors owned by the edit session.

use crate::error::{CalEditError, CalEditResult};
use crate::event::Reminder;

/// A piece of the editor that can tell whether the user changed it.
pub trait EditorPart {
    fn changed(&self) -> bool;

    /// Whether the current value may be saved.
    fn validate(&self) -> bool {
        true
    }
}

/// A single-line or multi-line text input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextField {
    value: String,
    original: String,
}

impl TextField {
    pub fn new(original: &str) -> Self {
        TextField {
            value: original.to_string(),
            original: original.to_string(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set(&mut self, value: &str) {
        self.value = value.to_string();
    }
}

impl EditorPart for TextField {
    fn changed(&self) -> bool {
        self.value != self.original
    }
}

/// Picks the calendar an event is stored in.
#[derive(Debug, Clone)]
pub struct CalendarChooser {
    options: Vec<String>,
    active: String,
    original: String,
}

impl CalendarChooser {
    /// `current` is kept even when it is not among the writable options, so an
    /// untouched chooser never reports a change.
    pub fn new(options: Vec<String>, current: &str) -> Self {
        let active = if current.is_empty() {
            options.first().cloned().unwrap_or_default()
        } else {
            current.to_string()
        };
        CalendarChooser {
            options,
            active,
            original: current.to_string(),
        }
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn active(&self) -> &str {
        &self.active
    }

    pub fn select(&mut self, name: &str) -> CalEditResult<()> {
        if !self.options.iter().any(|o| o == name) {
            return Err(CalEditError::CalendarNotFound(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }
}

impl EditorPart for CalendarChooser {
    fn changed(&self) -> bool {
        self.active != self.original
    }
}

/// The list of reminders, edited as offsets before the start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmsEditor {
    reminders: Vec<Reminder>,
    original: Vec<Reminder>,
}

impl AlarmsEditor {
    pub fn new(reminders: &[Reminder]) -> Self {
        AlarmsEditor {
            reminders: reminders.to_vec(),
            original: reminders.to_vec(),
        }
    }

    pub fn reminders(&self) -> &[Reminder] {
        &self.reminders
    }

    /// Add a reminder from a human duration such as "15m" or "1h 30m".
    pub fn add(&mut self, text: &str) -> CalEditResult<Reminder> {
        let duration = humantime::parse_duration(text.trim()).map_err(|e| {
            tracing::debug!(input = text, error = %e, "Rejected alarm offset");
            CalEditError::parse(text, "duration, e.g. 15m or 1h 30m")
        })?;
        // alarms are stored in whole minutes
        if duration.as_secs() % 60 != 0 || duration.subsec_nanos() != 0 {
            tracing::debug!(input = text, "Rejected sub-minute alarm offset");
            return Err(CalEditError::parse(text, "whole minutes, e.g. 15m or 1h 30m"));
        }
        let reminder = Reminder {
            minutes: (duration.as_secs() / 60) as i64,
        };
        self.reminders.push(reminder);
        Ok(reminder)
    }

    pub fn remove(&mut self, index: usize) -> Option<Reminder> {
        (index < self.reminders.len()).then(|| self.reminders.remove(index))
    }

    pub fn clear(&mut self) {
        self.reminders.clear();
    }
}

impl EditorPart for AlarmsEditor {
    fn changed(&self) -> bool {
        self.reminders != self.original
    }
}
