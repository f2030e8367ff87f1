//! A collection backed by a directory of calendars.
//!
//! ```text
//! ~/calendar/
//!   personal/
//!     .caledit/config.toml
//!     2024-06-01__lunch.ics
//!     2024-06-03T0900__standup.ics
//!     _recurring__gym.ics
//!   work/
//!     ...
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::config::EditorConfig;
use crate::error::{CalEditError, CalEditResult};
use crate::event::{Event, EventTime};
use crate::ics::{generate_ics, parse_event};

const MARKER_DIR: &str = ".caledit";

/// Configuration stored in each calendar's .caledit/config.toml
#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct CalendarConfig {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl CalendarConfig {
    /// Load config from .caledit/config.toml
    pub fn load(calendar_dir: &Path) -> CalEditResult<Self> {
        let path = calendar_dir.join(MARKER_DIR).join("config.toml");

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let config: CalendarConfig =
                toml::from_str(&content).map_err(|e| CalEditError::Config(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to .caledit/config.toml
    pub fn save(&self, calendar_dir: &Path) -> CalEditResult<()> {
        let dir = calendar_dir.join(MARKER_DIR);
        std::fs::create_dir_all(&dir)?;

        let content =
            toml::to_string_pretty(self).map_err(|e| CalEditError::Config(e.to_string()))?;
        std::fs::write(dir.join("config.toml"), content)?;

        Ok(())
    }
}

/// An event together with the file it was read from.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub event: Event,
    pub path: PathBuf,
}

impl StoredEvent {
    fn from_file(path: PathBuf, calendar: &str) -> CalEditResult<Self> {
        let content = std::fs::read_to_string(&path)?;
        let mut event = parse_event(&content)
            .map_err(|e| CalEditError::IcsParse(format!("{}: {}", path.display(), e)))?;
        event.calendar = calendar.to_string();
        event.etag = etag_for(&path);

        Ok(StoredEvent { event, path })
    }
}

#[derive(Debug, Clone)]
pub struct LocalCollection {
    root: PathBuf,
}

impl LocalCollection {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        LocalCollection { root: root.into() }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::open(config.data_path())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn calendar_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Discover calendars: subdirectories carrying a .caledit marker.
    pub fn calendars(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir() && path.join(MARKER_DIR).exists())
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();

        names.sort();
        names
    }

    pub fn calendar_config(&self, name: &str) -> CalEditResult<CalendarConfig> {
        let dir = self.existing_calendar(name)?;
        CalendarConfig::load(&dir)
    }

    pub fn create_calendar(&self, name: &str, config: &CalendarConfig) -> CalEditResult<()> {
        let dir = self.calendar_dir(name);
        std::fs::create_dir_all(&dir)?;
        config.save(&dir)?;
        tracing::info!(calendar = name, "Created calendar");
        Ok(())
    }

    /// Events in a calendar. Files that fail to parse are skipped.
    pub fn events(&self, calendar: &str) -> CalEditResult<Vec<StoredEvent>> {
        let dir = self.existing_calendar(calendar)?;

        let events = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|e| e == "ics"))
            .filter_map(|path| match StoredEvent::from_file(path.clone(), calendar) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable event");
                    None
                }
            })
            .collect();

        Ok(events)
    }

    /// Look an event up by UID across all calendars.
    pub fn find_event(&self, uid: &str) -> CalEditResult<Event> {
        for calendar in self.calendars() {
            if let Some(stored) = self.events(&calendar)?.into_iter().find(|s| s.event.uid == uid) {
                return Ok(stored.event);
            }
        }
        Err(CalEditError::EventNotFound(uid.to_string()))
    }

    fn existing_calendar(&self, name: &str) -> CalEditResult<PathBuf> {
        let dir = self.calendar_dir(name);
        if !dir.join(MARKER_DIR).exists() {
            return Err(CalEditError::CalendarNotFound(name.to_string()));
        }
        Ok(dir)
    }

    fn writable_calendar(&self, name: &str) -> CalEditResult<PathBuf> {
        let dir = self.existing_calendar(name)?;
        if CalendarConfig::load(&dir)?.read_only {
            return Err(CalEditError::Persistence(format!(
                "calendar '{}' is read-only",
                name
            )));
        }
        Ok(dir)
    }

    /// The stored copy of `event`, refusing to touch it if it changed on disk
    /// since the event was read.
    fn stored_copy(&self, event: &Event) -> CalEditResult<StoredEvent> {
        let stored = self
            .events(&event.calendar)?
            .into_iter()
            .find(|s| s.event.uid == event.uid)
            .ok_or_else(|| CalEditError::EventNotFound(event.uid.clone()))?;

        if stored.event.etag != event.etag {
            return Err(CalEditError::Persistence(format!(
                "{} was modified on disk since it was opened",
                stored.path.display()
            )));
        }
        Ok(stored)
    }

    fn write(&self, dir: &Path, event: &mut Event) -> CalEditResult<PathBuf> {
        let content = generate_ics(event)?;
        let path = dir.join(filename_for(event, dir)?);
        write_atomic(&path, &content)?;
        event.etag = etag_for(&path);
        Ok(path)
    }
}

impl Collection for LocalCollection {
    fn writable_calendar_names(&self) -> Vec<String> {
        self.calendars()
            .into_iter()
            .filter(|name| {
                CalendarConfig::load(&self.calendar_dir(name)).is_ok_and(|c| !c.read_only)
            })
            .collect()
    }

    fn create(&mut self, event: &mut Event) -> CalEditResult<()> {
        let dir = self.writable_calendar(&event.calendar)?;
        let path = self.write(&dir, event)?;
        tracing::info!(uid = %event.uid, path = %path.display(), "Created event");
        Ok(())
    }

    fn update(&mut self, event: &mut Event) -> CalEditResult<()> {
        let dir = self.writable_calendar(&event.calendar)?;
        let stored = self.stored_copy(event)?;

        // The filename follows the start date. Keep the stored file while its
        // name still fits, otherwise write the new one before removing it.
        let path = if keeps_filename(&stored.path, event) {
            let content = generate_ics(event)?;
            write_atomic(&stored.path, &content)?;
            event.etag = etag_for(&stored.path);
            stored.path
        } else {
            let path = self.write(&dir, event)?;
            remove_replaced(&stored.path, &path)?;
            path
        };

        tracing::info!(uid = %event.uid, path = %path.display(), "Updated event");
        Ok(())
    }

    fn change_collection(&mut self, event: &mut Event, target: &str) -> CalEditResult<()> {
        let target_dir = self.writable_calendar(target)?;
        let stored = self.stored_copy(event)?;

        let path = self.write(&target_dir, event)?;
        remove_replaced(&stored.path, &path)?;
        let from = std::mem::replace(&mut event.calendar, target.to_string());
        tracing::info!(uid = %event.uid, from = %from, to = target, path = %path.display(), "Moved event");
        Ok(())
    }
}

/// Write through a temporary file in the same directory, so a failed write
/// leaves any existing file untouched.
fn write_atomic(path: &Path, content: &str) -> CalEditResult<()> {
    let dir = path
        .parent()
        .ok_or_else(|| CalEditError::Persistence(format!("{} has no parent", path.display())))?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(content.as_bytes())?;
    file.persist(path).map_err(|e| CalEditError::Io(e.error))?;
    Ok(())
}

/// Remove the file a rewrite replaced. If that fails, drop the new copy so
/// the event is not stored twice.
fn remove_replaced(old: &Path, new: &Path) -> CalEditResult<()> {
    if let Err(e) = std::fs::remove_file(old) {
        if let Err(cleanup) = std::fs::remove_file(new) {
            tracing::warn!(path = %new.display(), error = %cleanup, "Could not remove new copy");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Whether `path` is already named for `event`: its base name, or the base
/// name with a collision suffix.
fn keeps_filename(path: &Path, event: &Event) -> bool {
    let base = base_filename(event);
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };
    match stem.strip_prefix(base.as_str()) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('-')
            .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit())),
        None => false,
    }
}

/// Modification time of the stored file, as nanoseconds since the epoch.
fn etag_for(path: &Path) -> Option<String> {
    std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .map(DateTime::<Utc>::from)
        .and_then(|mtime| mtime.timestamp_nanos_opt())
        .map(|nanos| nanos.to_string())
}

/// Generate a unique filename for an event, handling collisions.
fn filename_for(event: &Event, dir: &Path) -> CalEditResult<String> {
    let base = base_filename(event);

    if !dir.join(format!("{}.ics", base)).exists() {
        return Ok(format!("{}.ics", base));
    }

    for n in 2..=100 {
        let suffixed = format!("{}-{}.ics", base, n);
        if !dir.join(&suffixed).exists() {
            return Ok(suffixed);
        }
    }

    Err(CalEditError::Persistence(format!(
        "Too many filename collisions for {}",
        base
    )))
}

/// Timed events: `YYYY-MM-DDTHHMM__slug`
/// All-day events: `YYYY-MM-DD__slug`
/// Recurring events: `_recurring__slug`
fn base_filename(event: &Event) -> String {
    let mut slug: String = slug::slugify(&event.summary).chars().take(50).collect();
    if slug.is_empty() {
        slug = "event".to_string();
    }

    if event.is_recurring() {
        return format!("_recurring__{}", slug);
    }

    let date = match &event.start {
        EventTime::Date(d) => d.format("%Y-%m-%d").to_string(),
        EventTime::DateTimeUtc(dt) => dt.format("%Y-%m-%dT%H%M").to_string(),
        EventTime::DateTimeFloating(dt) => dt.format("%Y-%m-%dT%H%M").to_string(),
        EventTime::DateTimeZoned { datetime, .. } => datetime.format("%Y-%m-%dT%H%M").to_string(),
    };

    format!("{}__{}", date, slug)
}
