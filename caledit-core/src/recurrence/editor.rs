//! Edit model for an event's recurrence rule.
//!
//! The model decodes the event's rule into a handful of editable fields and
//! encodes them back on demand. Rules it cannot reproduce are held in the
//! `RepeatUnsupported` state, where `active()` hands back the original rule
//! untouched and every field edit is refused until the user chooses to
//! override it with [`RecurrenceRuleModel::edit_anyway`].

use chrono::{Datelike, NaiveDate, Utc};

use crate::config::LocaleConfig;
use crate::datetime::{Endpoint, localize};
use crate::error::{CalEditError, CalEditResult};
use crate::fields::EditorPart;
use crate::recurrence::expand;
use crate::recurrence::rule::{Frequency, RecurrenceRule, RuleUntil};
use crate::recurrence::weekday::{WeekdaySelection, weekday_token};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatState {
    NoRepeat,
    RepeatEditable,
    /// A rule exists but uses parts the editor cannot write back.
    RepeatUnsupported,
}

/// How a monthly series is described to the user.
///
/// Only affects the label; the encoded rule carries no BYMONTHDAY or
/// ordinal BYDAY either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyMode {
    DayOfMonth,
    NthWeekday,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    Forever,
    Until,
    Repetitions,
}

impl EndCondition {
    pub fn label(&self) -> &'static str {
        match self {
            EndCondition::Forever => "Forever",
            EndCondition::Until => "Until",
            EndCondition::Repetitions => "Repetitions",
        }
    }
}

/// Sub-fields of the recurrence editor, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurrenceField {
    UnsupportedNotice,
    EditAnyway,
    RepeatToggle,
    Frequency,
    Interval,
    Weekdays,
    MonthlyMode,
    EndCondition,
    UntilDate,
    Repetitions,
}

#[derive(Debug, Clone)]
pub struct RecurrenceRuleModel {
    original: Option<RecurrenceRule>,
    state: RepeatState,

    frequency: Frequency,
    interval: u32,
    weekdays: WeekdaySelection,
    monthly_mode: MonthlyMode,
    end: EndCondition,
    until: NaiveDate,
    repetitions: u32,

    start: Endpoint,
    date_format: String,
}

impl RecurrenceRuleModel {
    pub fn new(rule: Option<&RecurrenceRule>, start: &Endpoint, locale: &LocaleConfig) -> Self {
        let state = match rule {
            None => RepeatState::NoRepeat,
            Some(r) if r.is_understood() => RepeatState::RepeatEditable,
            Some(r) => {
                tracing::debug!(rule = %r, "Recurrence rule cannot be reproduced");
                RepeatState::RepeatUnsupported
            }
        };

        let frequency = rule
            .map(|r| r.frequency)
            .filter(Frequency::is_editable)
            .unwrap_or(Frequency::Weekly);
        let interval = rule.map(|r| r.interval).unwrap_or(1);

        let mut weekdays = WeekdaySelection::new(locale.first_weekday);
        match rule.map(|r| r.by_weekday.as_slice()) {
            Some(days) if !days.is_empty() => days.iter().for_each(|d| weekdays.set(*d, true)),
            _ => weekdays.set(start.date().weekday(), true),
        }

        let (end, until, repetitions) = match rule {
            Some(RecurrenceRule { count: Some(n), .. }) => {
                (EndCondition::Repetitions, start.date(), *n)
            }
            Some(RecurrenceRule {
                until: Some(until), ..
            }) => (EndCondition::Until, until_date(until, start), 1),
            _ => (EndCondition::Forever, start.date(), 1),
        };

        RecurrenceRuleModel {
            original: rule.cloned(),
            state,
            frequency,
            interval,
            weekdays,
            monthly_mode: MonthlyMode::DayOfMonth,
            end,
            until,
            repetitions,
            start: *start,
            date_format: locale.date_format.clone(),
        }
    }

    pub fn state(&self) -> RepeatState {
        self.state
    }

    pub fn original(&self) -> Option<&RecurrenceRule> {
        self.original.as_ref()
    }

    pub fn is_repeating(&self) -> bool {
        self.state != RepeatState::NoRepeat
    }

    /// Take over an unsupported rule. There is no way back for this session.
    pub fn edit_anyway(&mut self) {
        if self.state == RepeatState::RepeatUnsupported {
            tracing::debug!("Overriding unsupported recurrence rule");
            self.state = RepeatState::RepeatEditable;
        }
    }

    pub fn set_repeat(&mut self, repeat: bool) -> CalEditResult<()> {
        self.ensure_editable()?;
        self.state = if repeat {
            RepeatState::RepeatEditable
        } else {
            RepeatState::NoRepeat
        };
        Ok(())
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn set_frequency(&mut self, frequency: Frequency) -> CalEditResult<()> {
        self.ensure_editable()?;
        if !frequency.is_editable() {
            return Err(CalEditError::InvalidRule(format!(
                "{} repetition can't be edited",
                frequency.label()
            )));
        }
        self.frequency = frequency;
        Ok(())
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn set_interval(&mut self, text: &str) -> CalEditResult<u32> {
        self.ensure_editable()?;
        let interval = parse_positive(text)?;
        self.interval = interval;
        Ok(interval)
    }

    pub fn weekdays(&self) -> &WeekdaySelection {
        &self.weekdays
    }

    pub fn toggle_weekday(&mut self, day: chrono::Weekday) -> CalEditResult<bool> {
        self.ensure_editable()?;
        Ok(self.weekdays.toggle(day))
    }

    pub fn monthly_mode(&self) -> MonthlyMode {
        self.monthly_mode
    }

    pub fn set_monthly_mode(&mut self, mode: MonthlyMode) -> CalEditResult<()> {
        self.ensure_editable()?;
        self.monthly_mode = mode;
        Ok(())
    }

    /// Label for the "nth weekday" monthly choice, e.g. "every 2 SA".
    pub fn monthly_label(&self) -> String {
        let date = self.start.date();
        format!(
            "every {} {}",
            (date.day() - 1) / 7 + 1,
            weekday_token(date.weekday())
        )
    }

    pub fn end_condition(&self) -> EndCondition {
        self.end
    }

    pub fn set_end_condition(&mut self, end: EndCondition) -> CalEditResult<()> {
        self.ensure_editable()?;
        self.end = end;
        Ok(())
    }

    pub fn until(&self) -> NaiveDate {
        self.until
    }

    pub fn until_text(&self) -> String {
        self.until.format(&self.date_format).to_string()
    }

    pub fn set_until(&mut self, text: &str) -> CalEditResult<NaiveDate> {
        self.ensure_editable()?;
        let date = NaiveDate::parse_from_str(text.trim(), &self.date_format).map_err(|e| {
            tracing::debug!(input = text, error = %e, "Rejected until date");
            CalEditError::parse(text, &self.date_format)
        })?;
        self.until = date;
        Ok(date)
    }

    pub fn repetitions(&self) -> u32 {
        self.repetitions
    }

    pub fn set_repetitions(&mut self, text: &str) -> CalEditResult<u32> {
        self.ensure_editable()?;
        let count = parse_positive(text)?;
        self.repetitions = count;
        Ok(count)
    }

    /// Follow the event's start as the user edits it.
    pub fn set_start(&mut self, start: &Endpoint) {
        self.start = *start;
    }

    /// The sub-fields to show for the current state.
    pub fn visible_fields(&self) -> Vec<RecurrenceField> {
        match self.state {
            RepeatState::RepeatUnsupported => {
                vec![RecurrenceField::UnsupportedNotice, RecurrenceField::EditAnyway]
            }
            RepeatState::NoRepeat => vec![RecurrenceField::RepeatToggle],
            RepeatState::RepeatEditable => {
                let mut fields = vec![
                    RecurrenceField::RepeatToggle,
                    RecurrenceField::Frequency,
                    RecurrenceField::Interval,
                ];
                match self.frequency {
                    Frequency::Weekly => fields.push(RecurrenceField::Weekdays),
                    Frequency::Monthly => fields.push(RecurrenceField::MonthlyMode),
                    _ => {}
                }
                fields.push(RecurrenceField::EndCondition);
                match self.end {
                    EndCondition::Until => fields.push(RecurrenceField::UntilDate),
                    EndCondition::Repetitions => fields.push(RecurrenceField::Repetitions),
                    EndCondition::Forever => {}
                }
                fields
            }
        }
    }

    /// The rule as it would be saved now.
    pub fn active(&self) -> Option<RecurrenceRule> {
        match self.state {
            RepeatState::NoRepeat => None,
            RepeatState::RepeatUnsupported => self.original.clone(),
            RepeatState::RepeatEditable => Some(self.encode()),
        }
    }

    fn encode(&self) -> RecurrenceRule {
        let mut rule = RecurrenceRule::new(self.frequency);
        rule.interval = self.interval;
        if self.frequency == Frequency::Weekly && self.weekdays.len() > 1 {
            rule.by_weekday = self.weekdays.canonical();
        }
        match self.end {
            EndCondition::Forever => {}
            EndCondition::Repetitions => rule.count = Some(self.repetitions),
            EndCondition::Until => rule.until = Some(self.encode_until()),
        }
        rule
    }

    fn encode_until(&self) -> RuleUntil {
        // Reuse the stored value while it still names the same day, so an
        // untouched UNTIL is written back exactly as read.
        if let Some(original) = self.original.as_ref().and_then(|r| r.until) {
            let same_kind = matches!(original, RuleUntil::Date(_)) == self.start.is_date();
            if same_kind && until_date(&original, &self.start) == self.until {
                return original;
            }
        }

        match self.start {
            Endpoint::Date(_) => RuleUntil::Date(self.until),
            Endpoint::DateTime(dt) => {
                let local = localize(dt.timezone(), self.until.and_time(dt.time()));
                RuleUntil::DateTime(local.with_timezone(&Utc))
            }
        }
    }

    /// The next `count` occurrences of the rule being edited, starting at the
    /// event's start. Empty when the event does not repeat.
    pub fn preview(&self, count: u16) -> CalEditResult<Vec<Endpoint>> {
        match self.active() {
            Some(rule) => expand::occurrences(&rule, &self.start, count),
            None => Ok(Vec::new()),
        }
    }

    fn ensure_editable(&self) -> CalEditResult<()> {
        if self.state == RepeatState::RepeatUnsupported {
            return Err(CalEditError::UnsupportedRule);
        }
        Ok(())
    }
}

impl EditorPart for RecurrenceRuleModel {
    fn changed(&self) -> bool {
        self.active() != self.original
    }
}

fn parse_positive(text: &str) -> CalEditResult<u32> {
    text.trim()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| CalEditError::parse(text, "positive integer"))
}

/// The calendar day an UNTIL value falls on, seen from the series' start.
fn until_date(until: &RuleUntil, start: &Endpoint) -> NaiveDate {
    match (until, start) {
        (RuleUntil::Date(d), _) => *d,
        (RuleUntil::DateTime(dt), Endpoint::DateTime(s)) => {
            dt.with_timezone(&s.timezone()).date_naive()
        }
        (RuleUntil::DateTime(dt), Endpoint::Date(_)) => dt.date_naive(),
        (RuleUntil::Floating(dt), _) => dt.date(),
    }
}
