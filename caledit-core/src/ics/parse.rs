//! ICS file parsing using the icalendar crate's parser.

use crate::error::{CalEditError, CalEditResult};
use crate::event::{Event, EventStatus, EventTime, RawComponent, RawProperty, Reminder};
use crate::recurrence::RecurrenceRule;
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

/// Properties with a dedicated field on `Event`; everything else is kept raw.
const MODELLED_PROPERTIES: &[&str] = &[
    "UID",
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
    "CATEGORIES",
    "DTSTART",
    "DTEND",
    "DTSTAMP",
    "LAST-MODIFIED",
    "SEQUENCE",
    "STATUS",
    "RRULE",
    "EXDATE",
];

/// Parse ICS content into an Event.
///
/// The edited event is the first VEVENT without a RECURRENCE-ID. Every other
/// component of the calendar is kept raw in `other_components`.
///
/// The returned event carries no calendar or etag; the collection that read
/// it fills those in.
pub fn parse_event(content: &str) -> CalEditResult<Event> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| CalEditError::IcsParse(e.to_string()))?;
    let components = &calendar.components;
    let master = components
        .iter()
        .position(|c| c.name == "VEVENT" && c.find_prop("RECURRENCE-ID").is_none())
        .or_else(|| components.iter().position(|c| c.name == "VEVENT"))
        .ok_or_else(|| CalEditError::IcsParse("No VEVENT component".into()))?;
    let vevent = &components[master];
    let other_components: Vec<RawComponent> = components
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != master)
        .map(|(_, c)| to_raw_component(c))
        .collect();

    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .ok_or_else(|| CalEditError::IcsParse("Missing UID".into()))?;
    let summary = vevent
        .find_prop("SUMMARY")
        .map(|p| p.val.to_string())
        .unwrap_or_default();

    let start = vevent
        .find_prop("DTSTART")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(to_event_time)
        .ok_or_else(|| CalEditError::IcsParse(format!("Missing or invalid DTSTART in {}", uid)))?;
    // RFC 5545: without DTEND a date event lasts one day, a timed one is instantaneous
    let end = match vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
    {
        Some(dpt) => to_event_time(dpt),
        None => match &start {
            EventTime::Date(d) => EventTime::Date(*d + chrono::Duration::days(1)),
            other => other.clone(),
        },
    };

    let description = text_prop(vevent.find_prop("DESCRIPTION"));
    let location = text_prop(vevent.find_prop("LOCATION"));
    let categories = vevent
        .properties
        .iter()
        .filter(|p| p.name == "CATEGORIES")
        .map(|p| p.val.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let sequence = vevent
        .find_prop("SEQUENCE")
        .and_then(|p| p.val.as_ref().parse().ok())
        .unwrap_or(0);

    let status = vevent
        .find_prop("STATUS")
        .map(|p| match p.val.as_ref() {
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        })
        .unwrap_or(EventStatus::Confirmed);

    let rrule = vevent
        .find_prop("RRULE")
        .map(|p| p.val.as_ref().parse::<RecurrenceRule>())
        .transpose()?;
    let exdates: Vec<EventTime> = vevent
        .properties
        .iter()
        .filter(|p| p.name == "EXDATE")
        .flat_map(parse_exdate_property)
        .collect();

    let alarms: Vec<RawComponent> = vevent
        .components
        .iter()
        .filter(|c| c.name == "VALARM")
        .map(to_raw_component)
        .collect();
    let reminders: Vec<Reminder> = alarms.iter().filter_map(alarm_reminder).collect();

    let extra_properties: Vec<RawProperty> = vevent
        .properties
        .iter()
        .filter(|p| !MODELLED_PROPERTIES.contains(&p.name.as_ref()))
        .map(to_raw_property)
        .collect();

    Ok(Event {
        uid,
        summary,
        description,
        location,
        categories,
        start,
        end,
        status,
        rrule,
        exdates,
        reminders,
        alarms,
        sequence,
        extra_properties,
        other_components,
        calendar: String::new(),
        etag: None,
    })
}

fn text_prop(prop: Option<&Property>) -> String {
    prop.map(|p| p.val.to_string()).unwrap_or_default()
}

fn to_raw_property(prop: &Property) -> RawProperty {
    RawProperty {
        name: prop.name.to_string(),
        params: prop
            .params
            .iter()
            .map(|p| {
                let value = p.val.as_ref().map(|v| v.to_string()).unwrap_or_default();
                (p.key.to_string(), value)
            })
            .collect(),
        value: prop.val.to_string(),
    }
}

fn to_raw_component(component: &Component) -> RawComponent {
    RawComponent {
        name: component.name.to_string(),
        properties: component.properties.iter().map(to_raw_property).collect(),
        components: component.components.iter().map(to_raw_component).collect(),
    }
}

/// The reminder a VALARM stands for, if the editor can represent it: a
/// DISPLAY alarm a whole number of minutes before the start.
pub(crate) fn alarm_reminder(alarm: &RawComponent) -> Option<Reminder> {
    let action = alarm.find_property("ACTION")?;
    if !action.value.eq_ignore_ascii_case("DISPLAY") {
        return None;
    }

    let trigger = alarm.find_property("TRIGGER")?;
    if trigger
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE-TIME"))
    {
        return None;
    }
    if trigger
        .param("RELATED")
        .is_some_and(|r| !r.eq_ignore_ascii_case("START"))
    {
        return None;
    }

    let minutes = parse_trigger_minutes(&trigger.value)?;
    (minutes >= 0).then_some(Reminder { minutes })
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Parse an EXDATE property into a list of EventTime values.
///
/// Handles TZID and VALUE=DATE parameters, UTC and floating values, and
/// comma-separated lists.
fn parse_exdate_property(prop: &Property) -> Vec<EventTime> {
    let tzid = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| v.to_string()));

    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                chrono::NaiveDate::parse_from_str(s, "%Y%m%d")
                    .ok()
                    .map(EventTime::Date)
            } else if let Some(ref tz) = tzid {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeZoned {
                        datetime: dt,
                        tzid: tz.clone(),
                    })
            } else if let Some(utc) = s.strip_suffix('Z') {
                chrono::NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTimeUtc(dt.and_utc()))
            } else {
                chrono::NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(EventTime::DateTimeFloating)
            }
        })
        .collect()
}

/// Parse TRIGGER value to minutes before event (-PT30M, -P1D, etc.)
///
/// Offsets that are not whole minutes give `None`.
fn parse_trigger_minutes(value: &str) -> Option<i64> {
    let is_before = value.starts_with('-');
    let duration_str = value.trim_start_matches(['-', '+']);

    let duration = iso8601::duration(duration_str).ok()?;
    let std_duration: std::time::Duration = duration.into();
    if std_duration.as_secs() % 60 != 0 || std_duration.subsec_nanos() != 0 {
        return None;
    }
    let minutes = (std_duration.as_secs() / 60) as i64;

    Some(if is_before { minutes } else { -minutes })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ics::generate_ics;
    use crate::recurrence::Frequency;
    use chrono::NaiveDate;

    #[test]
    fn test_parse_allday_event_with_categories() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:allday-1\r\n\
SUMMARY:Conference\r\n\
DTSTART;VALUE=DATE:20240601\r\n\
DTEND;VALUE=DATE:20240603\r\n\
CATEGORIES:work\r\n\
SEQUENCE:4\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let event = parse_event(ics).expect("Should parse");

        assert_eq!(event.uid, "allday-1");
        assert_eq!(event.categories, "work");
        assert_eq!(event.sequence, 4);
        assert_eq!(
            event.start,
            EventTime::Date(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())
        );
        assert!(event.etag.is_none());
    }

    #[test]
    fn test_parse_missing_dtend_defaults_to_one_day() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:allday-2\r\n\
SUMMARY:Birthday\r\n\
DTSTART;VALUE=DATE:20240601\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let event = parse_event(ics).expect("Should parse");

        assert_eq!(
            event.end,
            EventTime::Date(NaiveDate::from_ymd_opt(2024, 6, 2).unwrap())
        );
    }

    #[test]
    fn test_parse_keeps_unsupported_rrule_parts() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:monthly-1\r\n\
SUMMARY:Rent\r\n\
DTSTART;VALUE=DATE:20240601\r\n\
DTEND;VALUE=DATE:20240602\r\n\
RRULE:FREQ=MONTHLY;BYMONTHDAY=1\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let event = parse_event(ics).expect("Should parse");

        let rule = event.rrule.expect("Should have rrule");
        assert_eq!(rule.frequency, Frequency::Monthly);
        assert_eq!(rule.unknown, vec![("BYMONTHDAY".to_string(), "1".to_string())]);
        assert!(!rule.is_understood());
    }

    #[test]
    fn test_parse_rejects_missing_uid() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
SUMMARY:No uid\r\n\
DTSTART;VALUE=DATE:20240601\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        assert!(matches!(parse_event(ics), Err(CalEditError::IcsParse(_))));
    }

    #[test]
    fn test_parse_line_folding_preserves_whitespace() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:test-123\r\n\
SUMMARY:Test\r\n\
DTSTART:20240101T100000Z\r\n\
DTEND:20240101T110000Z\r\n\
DESCRIPTION:Hello \r\n world and \r\n more text\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let event = parse_event(ics).expect("Should parse");

        assert_eq!(event.description, "Hello world and more text");
    }

    #[test]
    fn test_parse_picks_master_over_overrides() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:gym-1\r\n\
RECURRENCE-ID;VALUE=DATE:20240610\r\n\
SUMMARY:Gym (moved)\r\n\
DTSTART;VALUE=DATE:20240611\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:gym-1\r\n\
SUMMARY:Gym\r\n\
DTSTART;VALUE=DATE:20240603\r\n\
RRULE:FREQ=WEEKLY\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let event = parse_event(ics).expect("Should parse");

        assert_eq!(event.summary, "Gym");
        assert_eq!(event.other_components.len(), 1);
        assert!(event.other_components[0].is_override());
    }

    #[test]
    fn test_only_display_alarms_before_start_become_reminders() {
        let alarm = |action: &str, trigger: &str, params: Vec<(&str, &str)>| RawComponent {
            name: "VALARM".to_string(),
            properties: vec![
                RawProperty {
                    name: "ACTION".to_string(),
                    params: vec![],
                    value: action.to_string(),
                },
                RawProperty {
                    name: "TRIGGER".to_string(),
                    params: params
                        .into_iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    value: trigger.to_string(),
                },
            ],
            components: vec![],
        };

        assert_eq!(
            alarm_reminder(&alarm("DISPLAY", "-PT15M", vec![])),
            Some(Reminder { minutes: 15 })
        );
        assert_eq!(
            alarm_reminder(&alarm("DISPLAY", "-P1D", vec![("RELATED", "START")])),
            Some(Reminder { minutes: 1440 })
        );
        assert_eq!(alarm_reminder(&alarm("AUDIO", "-PT15M", vec![])), None);
        assert_eq!(alarm_reminder(&alarm("EMAIL", "-PT15M", vec![])), None);
        assert_eq!(
            alarm_reminder(&alarm("DISPLAY", "-PT15M", vec![("RELATED", "END")])),
            None
        );
        assert_eq!(
            alarm_reminder(&alarm(
                "DISPLAY",
                "20240601T080000Z",
                vec![("VALUE", "DATE-TIME")]
            )),
            None
        );
        assert_eq!(alarm_reminder(&alarm("DISPLAY", "PT10M", vec![])), None);
        assert_eq!(alarm_reminder(&alarm("DISPLAY", "-PT90S", vec![])), None);
    }

    #[test]
    fn test_roundtrip_keeps_overrides_timezones_and_unmodelled_alarms() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VTIMEZONE
TZID:Europe/Berlin
BEGIN:STANDARD
DTSTART:19701025T030000
TZOFFSETFROM:+0200
TZOFFSETTO:+0100
END:STANDARD
END:VTIMEZONE
BEGIN:VEVENT
UID:gym-1
SUMMARY:Gym
DTSTART;TZID=Europe/Berlin:20240603T180000
DTEND;TZID=Europe/Berlin:20240603T190000
RRULE:FREQ=WEEKLY
BEGIN:VALARM
ACTION:AUDIO
TRIGGER;VALUE=DATE-TIME:20240603T150000Z
END:VALARM
BEGIN:VALARM
ACTION:DISPLAY
DESCRIPTION:Pack the bag
TRIGGER;RELATED=END:-PT5M
END:VALARM
BEGIN:VALARM
ACTION:DISPLAY
DESCRIPTION:Reminder
TRIGGER:-PT15M
END:VALARM
END:VEVENT
BEGIN:VEVENT
UID:gym-1
RECURRENCE-ID;TZID=Europe/Berlin:20240610T180000
SUMMARY:Gym (late)
DTSTART;TZID=Europe/Berlin:20240610T200000
DTEND;TZID=Europe/Berlin:20240610T210000
END:VEVENT
END:VCALENDAR"#;

        let mut event = parse_event(ics).expect("Should parse");
        assert_eq!(event.reminders, vec![Reminder { minutes: 15 }]);
        assert_eq!(event.alarms.len(), 3);

        event.update_location("Downtown");
        let generated = generate_ics(&event).expect("Should generate");
        let reparsed = parse_event(&generated).expect("Should reparse");

        assert_eq!(generated.matches("BEGIN:VEVENT").count(), 2, "ICS:\n{}", generated);
        assert_eq!(reparsed.summary, "Gym");
        assert_eq!(reparsed.location, "Downtown");
        assert_eq!(reparsed.other_components, event.other_components);
        assert_eq!(reparsed.alarms, event.alarms);
        assert_eq!(reparsed.reminders, vec![Reminder { minutes: 15 }]);
    }

    #[test]
    fn test_removed_reminder_keeps_unmodelled_alarms() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:call-1
SUMMARY:Call
DTSTART:20240603T090000Z
DTEND:20240603T093000Z
BEGIN:VALARM
ACTION:EMAIL
SUMMARY:Call soon
DESCRIPTION:Call soon
ATTENDEE:mailto:me@example.com
TRIGGER:-PT1H
END:VALARM
BEGIN:VALARM
ACTION:DISPLAY
DESCRIPTION:Reminder
TRIGGER:-PT15M
END:VALARM
END:VEVENT
END:VCALENDAR"#;

        let mut event = parse_event(ics).expect("Should parse");
        event.update_alarms(Vec::new());
        let generated = generate_ics(&event).expect("Should generate");
        let reparsed = parse_event(&generated).expect("Should reparse");

        assert!(reparsed.reminders.is_empty());
        assert_eq!(reparsed.alarms.len(), 1, "ICS:\n{}", generated);
        assert_eq!(reparsed.alarms[0], event.alarms[0]);
    }

    #[test]
    fn test_roundtrip_preserves_rrule_exdates_and_unmodelled_properties() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:test-123
SUMMARY:Recurring Event
DTSTART;TZID=America/New_York:20240101T100000
DTEND;TZID=America/New_York:20240101T110000
RRULE:FREQ=WEEKLY;BYDAY=MO,WE
EXDATE;TZID=America/New_York:20240108T100000,20240115T100000
ATTENDEE;CN=Alice:mailto:alice@example.com
X-CUSTOM:kept
BEGIN:VALARM
ACTION:DISPLAY
DESCRIPTION:Reminder
TRIGGER:-PT15M
END:VALARM
END:VEVENT
END:VCALENDAR"#;

        let event = parse_event(ics).expect("Should parse");
        let generated = generate_ics(&event).expect("Should generate");
        let reparsed = parse_event(&generated).expect("Should reparse");

        assert_eq!(reparsed.rrule, event.rrule);
        assert_eq!(reparsed.exdates.len(), 2, "Generated ICS:\n{}", generated);
        assert_eq!(reparsed.reminders, vec![Reminder { minutes: 15 }]);
        assert!(
            reparsed.extra_properties.iter().any(|p| p.name == "ATTENDEE"),
            "Generated ICS:\n{}",
            generated
        );
        assert!(
            reparsed.extra_properties.iter().any(|p| p.name == "X-CUSTOM" && p.value == "kept"),
            "Generated ICS:\n{}",
            generated
        );
    }
}
