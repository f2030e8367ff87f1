//! ICS file generation.

use crate::error::CalEditResult;
use crate::event::{Event, EventStatus, EventTime, RawComponent, RawProperty, Reminder};
use crate::ics::parse::alarm_reminder;
use icalendar::{Alarm, Calendar, Component, EventLike, Property, Trigger, ValueType};

/// RFC 5545 content lines are folded after this many octets.
const MAX_LINE_OCTETS: usize = 75;

/// Generate .ics content for an event
pub fn generate_ics(event: &Event) -> CalEditResult<String> {
    let mut cal = Calendar::new();

    let mut ics_event = icalendar::Event::new();
    ics_event.uid(&event.uid);
    ics_event.summary(&event.summary);

    // DTSTAMP is required by RFC 5545; LAST-MODIFIED follows it since
    // generation only happens when the event is written out.
    let now = chrono::Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    ics_event.add_property("DTSTAMP", &now);
    ics_event.add_property("LAST-MODIFIED", &now);
    ics_event.add_property("SEQUENCE", event.sequence.to_string());

    add_datetime_property(&mut ics_event, "DTSTART", &event.start);
    add_datetime_property(&mut ics_event, "DTEND", &event.end);

    if !event.description.is_empty() {
        ics_event.description(&event.description);
    }

    if !event.location.is_empty() {
        ics_event.location(&event.location);
    }

    if !event.categories.is_empty() {
        ics_event.add_property("CATEGORIES", &event.categories);
    }

    // Only emit STATUS if not CONFIRMED (the implied default)
    match event.status {
        EventStatus::Confirmed => {}
        EventStatus::Tentative => {
            ics_event.add_property("STATUS", "TENTATIVE");
        }
        EventStatus::Cancelled => {
            ics_event.add_property("STATUS", "CANCELLED");
        }
    }

    if let Some(ref rrule) = event.rrule {
        ics_event.add_property("RRULE", rrule.to_string());
        for exdate in &event.exdates {
            add_exdate_property(&mut ics_event, exdate);
        }
    }

    let (kept_alarms, new_reminders) = match_alarms(&event.alarms, &event.reminders);
    for reminder in &new_reminders {
        let trigger = Trigger::before_start(chrono::Duration::minutes(reminder.minutes));
        ics_event.alarm(Alarm::display("Reminder", trigger));
    }

    for raw in &event.extra_properties {
        let mut prop = Property::new(&raw.name, &raw.value);
        for (key, value) in &raw.params {
            prop.add_parameter(key, value);
        }
        ics_event.append_multi_property(prop);
    }

    let ics_event = ics_event.done();
    cal.push(ics_event);
    let cal = cal.done();

    let mut event_tail = String::new();
    for alarm in kept_alarms {
        write_component(&mut event_tail, alarm);
    }
    let mut calendar_tail = String::new();
    for component in &event.other_components {
        write_component(&mut calendar_tail, component);
    }

    Ok(strip_ics_bloat(&cal.to_string(), &event_tail, &calendar_tail))
}

/// Split the stored alarms against the wanted reminders.
///
/// Returns the stored alarms to write back verbatim, and the reminders that
/// need a new alarm. A stored alarm the editor can't represent is always
/// kept; one it can is kept while `reminders` still lists its offset.
fn match_alarms<'a>(
    alarms: &'a [RawComponent],
    reminders: &[Reminder],
) -> (Vec<&'a RawComponent>, Vec<Reminder>) {
    let mut pending = reminders.to_vec();
    let kept = alarms
        .iter()
        .filter(|alarm| match alarm_reminder(alarm) {
            None => true,
            Some(reminder) => match pending.iter().position(|r| *r == reminder) {
                Some(i) => {
                    pending.remove(i);
                    true
                }
                None => false,
            },
        })
        .collect();
    (kept, pending)
}

/// Clean up ICS output from the icalendar crate
/// - Replace PRODID with our own
/// - Remove CALSCALE:GREGORIAN (it's the default)
/// - Remove DTSTAMP and UID inside VALARM sections (not required by RFC 5545)
/// - Put `event_tail` at the end of the VEVENT and `calendar_tail` at the
///   end of the VCALENDAR, both already serialized
fn strip_ics_bloat(ics: &str, event_tail: &str, calendar_tail: &str) -> String {
    let mut result =
        String::with_capacity(ics.len() + event_tail.len() + calendar_tail.len());
    let mut in_valarm = false;

    for line in ics.lines() {
        if line.starts_with("PRODID:") {
            result.push_str("PRODID:-//caledit//EN\r\n");
            continue;
        }

        if line == "END:VEVENT" {
            result.push_str(event_tail);
        } else if line == "END:VCALENDAR" {
            result.push_str(calendar_tail);
        }

        if line == "CALSCALE:GREGORIAN" {
            continue;
        }

        if line == "BEGIN:VALARM" {
            in_valarm = true;
        } else if line == "END:VALARM" {
            in_valarm = false;
        }

        if in_valarm && (line.starts_with("DTSTAMP:") || line.starts_with("UID:")) {
            continue;
        }

        result.push_str(line);
        result.push_str("\r\n");
    }

    result
}

fn write_component(out: &mut String, component: &RawComponent) {
    write_line(out, &format!("BEGIN:{}", component.name));
    for property in &component.properties {
        write_line(out, &content_line(property));
    }
    for child in &component.components {
        write_component(out, child);
    }
    write_line(out, &format!("END:{}", component.name));
}

fn content_line(property: &RawProperty) -> String {
    let mut line = property.name.clone();
    for (key, value) in &property.params {
        line.push(';');
        line.push_str(key);
        line.push('=');
        if value.contains([':', ';', ',']) {
            line.push('"');
            line.push_str(value);
            line.push('"');
        } else {
            line.push_str(value);
        }
    }
    line.push(':');
    line.push_str(&property.value);
    line
}

/// Append `line` folded at 75 octets, never splitting a UTF-8 character.
fn write_line(out: &mut String, line: &str) {
    let mut width = 0;
    for c in line.chars() {
        if width + c.len_utf8() > MAX_LINE_OCTETS {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out.push_str("\r\n");
}

fn add_datetime_property(ics_event: &mut icalendar::Event, name: &str, time: &EventTime) {
    match time {
        EventTime::Date(d) => {
            let mut prop = Property::new(name, d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            ics_event.append_property(prop);
        }
        EventTime::DateTimeUtc(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%SZ").to_string());
        }
        EventTime::DateTimeFloating(dt) => {
            ics_event.add_property(name, dt.format("%Y%m%dT%H%M%S").to_string());
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            let mut prop = Property::new(name, datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            ics_event.append_property(prop);
        }
    }
}

fn add_exdate_property(ics_event: &mut icalendar::Event, time: &EventTime) {
    let prop = match time {
        EventTime::Date(d) => {
            let mut prop = Property::new("EXDATE", d.format("%Y%m%d").to_string());
            prop.append_parameter(ValueType::Date);
            prop
        }
        EventTime::DateTimeUtc(dt) => {
            Property::new("EXDATE", dt.format("%Y%m%dT%H%M%SZ").to_string())
        }
        EventTime::DateTimeFloating(dt) => {
            Property::new("EXDATE", dt.format("%Y%m%dT%H%M%S").to_string())
        }
        EventTime::DateTimeZoned { datetime, tzid } => {
            let mut prop = Property::new("EXDATE", datetime.format("%Y%m%dT%H%M%S").to_string());
            prop.add_parameter("TZID", tzid);
            prop
        }
    };
    ics_event.append_multi_property(prop);
}
