//! What the edit session needs from whatever is displaying it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub message: String,
}

impl Alert {
    pub fn info(message: impl Into<String>) -> Self {
        Alert {
            level: AlertLevel::Info,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Alert {
            level: AlertLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Alert {
            level: AlertLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Alert {
            level: AlertLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub trait EditorView {
    fn alert(&mut self, alert: Alert);

    /// Leave the current pane (close the editor or dismiss a dialog).
    fn backtrack(&mut self);
}

/// A view that only records what it was asked to do.
#[derive(Debug, Default)]
pub struct BufferedView {
    pub alerts: Vec<Alert>,
    pub backtracks: usize,
}

impl BufferedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_alert(&self) -> Option<&Alert> {
        self.alerts.last()
    }
}

impl EditorView for BufferedView {
    fn alert(&mut self, alert: Alert) {
        self.alerts.push(alert);
    }

    fn backtrack(&mut self) {
        self.backtracks += 1;
    }
}
