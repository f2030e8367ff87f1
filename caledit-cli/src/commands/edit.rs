use anyhow::{Context, Result};
use caledit_core::recurrence::weekday::parse_weekday_token;
use caledit_core::recurrence::{EndCondition, Frequency};
use caledit_core::{
    AbortOutcome, EditorConfig, EventEditSession, ExportOutcome, LocalCollection, PersistAction,
    SaveOutcome,
};
use clap::Args;
use dialoguer::Confirm;
use owo_colors::OwoColorize;

use crate::render::{TerminalView, render_session};

/// Field edits shared by `edit` and `new`.
#[derive(Args, Debug, Default)]
pub struct EditArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub categories: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Move the event to this calendar
    #[arg(short, long)]
    pub calendar: Option<String>,

    /// Make the event all-day
    #[arg(long, conflicts_with = "timed")]
    pub allday: bool,

    /// Give the event a time of day
    #[arg(long)]
    pub timed: bool,

    #[arg(long)]
    pub start_date: Option<String>,

    #[arg(long)]
    pub start_time: Option<String>,

    #[arg(long)]
    pub end_date: Option<String>,

    #[arg(long)]
    pub end_time: Option<String>,

    /// daily, weekly, monthly, yearly or none
    #[arg(long, value_name = "FREQ")]
    pub repeat: Option<String>,

    #[arg(long)]
    pub interval: Option<String>,

    /// Weekday for weekly repetition (MO, TU, ...); repeat for several
    #[arg(long = "weekday", value_name = "DAY")]
    pub weekdays: Vec<String>,

    /// Stop after this many occurrences
    #[arg(long, conflicts_with = "until")]
    pub count: Option<String>,

    /// Repeat until this date
    #[arg(long)]
    pub until: Option<String>,

    /// Replace a repetition rule that can't be edited
    #[arg(long)]
    pub edit_anyway: bool,

    /// Reminder before the start, e.g. 15m or 1h; repeat for several
    #[arg(long = "alarm", value_name = "OFFSET")]
    pub alarms: Vec<String>,

    /// Remove existing reminders before adding new ones
    #[arg(long)]
    pub clear_alarms: bool,

    /// Number of upcoming occurrences to list for repeating events
    #[arg(long, default_value_t = 5)]
    pub preview: u16,
}

/// Apply every requested edit to the session, stopping at the first invalid one.
pub fn apply(session: &mut EventEditSession<'_>, args: &EditArgs) -> Result<()> {
    if let Some(title) = &args.title {
        session.set_summary(title);
    }
    if let Some(location) = &args.location {
        session.set_location(location);
    }
    if let Some(categories) = &args.categories {
        session.set_categories(categories);
    }
    if let Some(description) = &args.description {
        session.set_description(description);
    }
    if let Some(calendar) = &args.calendar {
        session.select_calendar(calendar)?;
    }

    if args.allday {
        session.toggle_allday(true);
    } else if args.timed {
        session.toggle_allday(false);
    }

    // dates before times, so a time lands on the new day
    if let Some(date) = &args.start_date {
        session.set_start_date(date).context("Invalid start date")?;
    }
    if let Some(date) = &args.end_date {
        session.set_end_date(date).context("Invalid end date")?;
    }
    if let Some(time) = &args.start_time {
        session.set_start_time(time).context("Invalid start time")?;
    }
    if let Some(time) = &args.end_time {
        session.set_end_time(time).context("Invalid end time")?;
    }

    apply_recurrence(session, args)?;

    if args.clear_alarms {
        session.alarms_mut().clear();
    }
    for alarm in &args.alarms {
        session.alarms_mut().add(alarm).context("Invalid alarm")?;
    }

    Ok(())
}

fn apply_recurrence(session: &mut EventEditSession<'_>, args: &EditArgs) -> Result<()> {
    let touches_rule = args.repeat.is_some()
        || args.interval.is_some()
        || !args.weekdays.is_empty()
        || args.count.is_some()
        || args.until.is_some();
    if !touches_rule && !args.edit_anyway {
        return Ok(());
    }

    let recurrence = session.recurrence_mut();
    if args.edit_anyway {
        recurrence.edit_anyway();
    }

    match args.repeat.as_deref() {
        Some("none") => recurrence.set_repeat(false)?,
        Some(freq) => {
            let frequency = Frequency::from_ics_str(freq)
                .with_context(|| format!("Unknown repetition '{}'", freq))?;
            recurrence.set_repeat(true)?;
            recurrence.set_frequency(frequency)?;
        }
        None => {}
    }

    if let Some(interval) = &args.interval {
        recurrence.set_interval(interval)?;
    }

    if !args.weekdays.is_empty() {
        let wanted = args
            .weekdays
            .iter()
            .map(|t| parse_weekday_token(t).with_context(|| format!("Unknown weekday '{}'", t)))
            .collect::<Result<Vec<_>>>()?;
        let order = recurrence.weekdays().display_order();
        for day in order {
            if recurrence.weekdays().contains(day) != wanted.contains(&day) {
                recurrence.toggle_weekday(day)?;
            }
        }
    }

    if let Some(count) = &args.count {
        recurrence.set_end_condition(EndCondition::Repetitions)?;
        recurrence.set_repetitions(count)?;
    } else if let Some(until) = &args.until {
        recurrence.set_end_condition(EndCondition::Until)?;
        recurrence.set_until(until)?;
    }

    Ok(())
}

pub fn run(
    mut collection: LocalCollection,
    config: &EditorConfig,
    uid: &str,
    args: &EditArgs,
    save: bool,
    export: Option<&str>,
) -> Result<()> {
    let event = collection.find_event(uid)?;
    let mut view = TerminalView;
    let mut session = EventEditSession::new(event, config, &mut collection, &mut view);

    if let Some(target) = export {
        if let ExportOutcome::Failed = session.export(target) {
            anyhow::bail!("Export failed");
        }
    }

    apply(&mut session, args)?;

    for line in render_session(&session, config, args.preview) {
        println!("{}", line);
    }

    if !session.changed() {
        println!("{}", "  No changes".dimmed());
        return Ok(());
    }

    let summary = session.summary().to_string();
    if save {
        return finish_save(session.save(), &summary);
    }

    loop {
        if confirm("Save changes?", true)? {
            return finish_save(session.save(), &summary);
        }

        // The first abort only warns about the unsaved edits; the second discards them.
        if session.request_abort() == AbortOutcome::Closed
            || (confirm("Discard changes?", false)?
                && session.request_abort() == AbortOutcome::Closed)
        {
            println!("{}", "  Discarded".dimmed());
            return Ok(());
        }

        // keep the edits and ask again
        session.resume_editing();
    }
}

fn confirm(prompt: &str, default: bool) -> Result<bool> {
    let answer = Confirm::new()
        .with_prompt(format!("  {}", prompt))
        .default(default)
        .interact()?;
    Ok(answer)
}

/// Report a save, one line per outcome.
pub fn finish_save(outcome: SaveOutcome, summary: &str) -> Result<()> {
    match outcome {
        SaveOutcome::Saved(action) => {
            println!("{}", format!("  {}", saved_message(action, summary)).green());
            Ok(())
        }
        SaveOutcome::Unchanged => {
            println!("{}", "  Nothing to save".dimmed());
            Ok(())
        }
        SaveOutcome::Invalid | SaveOutcome::Failed => anyhow::bail!("Event not saved"),
    }
}

fn saved_message(action: PersistAction, summary: &str) -> String {
    match action {
        PersistAction::Created => format!("Created: {}", summary),
        PersistAction::Updated => format!("Updated: {}", summary),
        PersistAction::Moved => format!("Moved: {}", summary),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caledit_core::collection::CalendarConfig;
    use caledit_core::{BufferedView, Event, EventTime, LocaleConfig, RepeatState};
    use chrono::{NaiveDate, Weekday};

    fn config(root: &std::path::Path) -> EditorConfig {
        EditorConfig {
            calendar_dir: root.to_path_buf(),
            locale: LocaleConfig {
                date_format: "%Y-%m-%d".into(),
                time_format: "%H:%M".into(),
                default_timezone: chrono_tz::UTC,
                first_weekday: Weekday::Mon,
            },
            ..Default::default()
        }
    }

    fn monday_event() -> Event {
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        Event::new(
            "Gym",
            EventTime::Date(day),
            EventTime::Date(day.succ_opt().unwrap()),
            "home",
        )
    }

    #[test]
    fn weekday_flags_replace_selection() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut collection = LocalCollection::from_config(&config);
        collection
            .create_calendar("home", &CalendarConfig::default())
            .unwrap();
        let mut view = BufferedView::new();
        let mut session =
            EventEditSession::new(monday_event(), &config, &mut collection, &mut view);

        let args = EditArgs {
            repeat: Some("weekly".into()),
            weekdays: vec!["TU".into(), "th".into()],
            count: Some("6".into()),
            ..Default::default()
        };
        apply(&mut session, &args).unwrap();

        let recurrence = session.recurrence();
        assert_eq!(recurrence.state(), RepeatState::RepeatEditable);
        assert_eq!(
            recurrence.weekdays().days(),
            vec![Weekday::Tue, Weekday::Thu]
        );
        assert_eq!(recurrence.end_condition(), EndCondition::Repetitions);
        assert_eq!(recurrence.repetitions(), 6);
    }

    #[test]
    fn saved_message_names_action_and_title() {
        assert_eq!(saved_message(PersistAction::Created, "Gym"), "Created: Gym");
        assert_eq!(saved_message(PersistAction::Moved, "Gym"), "Moved: Gym");
    }

    #[test]
    fn bad_input_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let mut collection = LocalCollection::from_config(&config);
        let mut view = BufferedView::new();
        let mut session =
            EventEditSession::new(monday_event(), &config, &mut collection, &mut view);

        let args = EditArgs {
            start_date: Some("3rd of June".into()),
            ..Default::default()
        };
        let err = apply(&mut session, &args).unwrap_err();
        assert_eq!(err.to_string(), "Invalid start date");

        let args = EditArgs {
            repeat: Some("fortnightly".into()),
            ..Default::default()
        };
        assert!(apply(&mut session, &args).is_err());
    }
}
