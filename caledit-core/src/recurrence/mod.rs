//! Recurrence rules and their editor.

mod editor;
mod expand;
mod rule;
pub mod weekday;

pub use editor::{EndCondition, MonthlyMode, RecurrenceField, RecurrenceRuleModel, RepeatState};
pub use expand::occurrences;
pub use rule::{Frequency, RecurrenceRule, RuleUntil, UNSUPPORTED_PARTS};
pub use weekday::WeekdaySelection;
