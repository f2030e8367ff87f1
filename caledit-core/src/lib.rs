//! Edit sessions for calendar events.
//!
//! An [`EventEditSession`] opens one [`Event`], lets the caller edit its text
//! fields, date range, recurrence rule, alarms and calendar, and then saves it
//! through a [`Collection`], exports it as an .ics file, or discards the edits.
//! [`LocalCollection`] stores events as .ics files in calendar directories.

pub mod collection;
pub mod config;
pub mod datetime;
pub mod error;
pub mod event;
pub mod fields;
pub mod ics;
pub mod range;
pub mod recurrence;
pub mod session;
pub mod view;

pub use collection::{Collection, LocalCollection};
pub use config::{EditorConfig, KeyAction, KeyMap, LocaleConfig};
pub use datetime::Endpoint;
pub use error::{CalEditError, CalEditResult};
pub use event::{Event, EventStatus, EventTime, RawComponent, RawProperty, Reminder};
pub use fields::EditorPart;
pub use range::DateTimeRangeModel;
pub use recurrence::{RecurrenceRule, RecurrenceRuleModel, RepeatState};
pub use session::{
    AbortOutcome, AbortState, EventEditSession, ExportOutcome, PersistAction, SaveOutcome,
};
pub use view::{Alert, AlertLevel, BufferedView, EditorView};
