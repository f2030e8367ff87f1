//! Error types for caledit.

use thiserror::Error;

/// Errors that can occur while editing, persisting or exporting an event.
#[derive(Error, Debug)]
pub enum CalEditError {
    #[error("Could not parse '{input}' (expected format '{format}')")]
    Parse { input: String, format: String },

    #[error("All-day events have no time of day")]
    TimeOnAllDay,

    #[error("Can't save: end date is before start date!")]
    InvalidRange,

    #[error("This event's repetition rules cannot be reproduced; use 'edit anyway' first")]
    UnsupportedRule,

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Failed to save event: {0}")]
    Persistence(String),

    #[error("Failed to export event: {0}")]
    Export(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Event not found: {0}")]
    EventNotFound(String),

    #[error("ICS parse error: {0}")]
    IcsParse(String),

    #[error("ICS generation error: {0}")]
    IcsGenerate(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CalEditError {
    pub(crate) fn parse(input: &str, format: &str) -> Self {
        CalEditError::Parse {
            input: input.to_string(),
            format: format.to_string(),
        }
    }
}

/// Result type alias for caledit operations.
pub type CalEditResult<T> = Result<T, CalEditError>;
