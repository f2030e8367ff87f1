use anyhow::{Context, Result};
use caledit_core::{Collection, EditorConfig, Event, EventEditSession, EventTime, LocalCollection};
use chrono::{Duration, NaiveDate};
use dialoguer::Select;

use crate::commands::edit::{self, EditArgs};
use crate::render::{TerminalView, render_session};

pub fn run(
    mut collection: LocalCollection,
    config: &EditorConfig,
    title: &str,
    date: &str,
    args: &EditArgs,
) -> Result<()> {
    let day = NaiveDate::parse_from_str(date.trim(), &config.locale.date_format).with_context(
        || format!("Could not parse date '{}' (expected '{}')", date, config.locale.date_format),
    )?;

    let calendar = resolve_calendar(args.calendar.as_deref(), config, &collection)?;
    let event = Event::new(
        title,
        EventTime::Date(day),
        EventTime::Date(day + Duration::days(1)),
        &calendar,
    );

    let mut view = TerminalView;
    let mut session = EventEditSession::new(event, config, &mut collection, &mut view)
        .with_always_save(true);

    edit::apply(&mut session, args)?;

    for line in render_session(&session, config, args.preview) {
        println!("{}", line);
    }

    let summary = session.summary().to_string();
    edit::finish_save(session.save(), &summary)
}

/// Pick the calendar for a new event: flag, configured default, the only one, or ask.
fn resolve_calendar(
    requested: Option<&str>,
    config: &EditorConfig,
    collection: &LocalCollection,
) -> Result<String> {
    let calendars = collection.writable_calendar_names();

    if let Some(name) = requested {
        if calendars.iter().any(|c| c == name) {
            return Ok(name.to_string());
        }
        anyhow::bail!(
            "Calendar '{}' not found or read-only. Available: {}",
            name,
            calendars.join(", ")
        );
    }

    if let Some(default) = &config.default_calendar {
        if calendars.contains(default) {
            return Ok(default.clone());
        }
        tracing::warn!(calendar = %default, "Default calendar is missing or read-only");
    }

    match calendars.as_slice() {
        [] => anyhow::bail!("No writable calendars found"),
        [only] => Ok(only.clone()),
        _ => {
            let selection = Select::new()
                .with_prompt("  Calendar")
                .items(&calendars)
                .default(0)
                .interact()?;
            Ok(calendars[selection].clone())
        }
    }
}
