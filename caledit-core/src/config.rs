//! Editor configuration.
//!
//! Loaded from `~/.config/caledit/config.toml`. Every key is optional; a
//! commented default file is written on first load.

use std::path::{Path, PathBuf};

use chrono::Weekday;
use chrono_tz::Tz;
use config::{Config, File};
use serde::Deserialize;

use crate::datetime::parse_timezone;
use crate::error::{CalEditError, CalEditResult};
use crate::recurrence::weekday::parse_weekday_token;

static DEFAULT_CALENDAR_DIR: &str = "~/calendar";
static DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
static DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// How dates and times are typed and shown.
#[derive(Debug, Clone, PartialEq)]
pub struct LocaleConfig {
    pub date_format: String,
    pub time_format: String,
    pub default_timezone: Tz,
    /// First column of the weekday selector
    pub first_weekday: Weekday,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        LocaleConfig {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            default_timezone: system_timezone(),
            first_weekday: Weekday::Mon,
        }
    }
}

/// The zone the system is configured with, or UTC when it can't be determined.
pub fn system_timezone() -> Tz {
    iana_time_zone::get_timezone()
        .ok()
        .and_then(|name| parse_timezone(&name))
        .unwrap_or(Tz::UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Commit,
    Abort,
}

/// Keys bound to the two editor-level actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMap {
    pub commit: Vec<String>,
    pub abort: Vec<String>,
}

impl Default for KeyMap {
    fn default() -> Self {
        KeyMap {
            commit: vec!["meta enter".to_string()],
            abort: vec!["esc".to_string()],
        }
    }
}

impl KeyMap {
    pub fn resolve(&self, key: &str) -> Option<KeyAction> {
        if self.commit.iter().any(|k| k == key) {
            Some(KeyAction::Commit)
        } else if self.abort.iter().any(|k| k == key) {
            Some(KeyAction::Abort)
        } else {
            None
        }
    }

    /// The key named in the "press again to discard" warning.
    pub fn abort_key(&self) -> &str {
        self.abort.first().map(String::as_str).unwrap_or("esc")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditorConfig {
    pub calendar_dir: PathBuf,
    pub default_calendar: Option<String>,
    pub locale: LocaleConfig,
    pub keybindings: KeyMap,
}

impl Default for EditorConfig {
    fn default() -> Self {
        EditorConfig {
            calendar_dir: PathBuf::from(DEFAULT_CALENDAR_DIR),
            default_calendar: None,
            locale: LocaleConfig::default(),
            keybindings: KeyMap::default(),
        }
    }
}

// On-disk shape; converted into EditorConfig after validation.
#[derive(Deserialize, Default)]
struct RawConfig {
    calendar_dir: Option<PathBuf>,
    default_calendar: Option<String>,
    #[serde(default)]
    locale: RawLocale,
    #[serde(default)]
    keybindings: RawKeybindings,
}

#[derive(Deserialize, Default)]
struct RawLocale {
    date_format: Option<String>,
    time_format: Option<String>,
    default_timezone: Option<String>,
    first_weekday: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawKeybindings {
    commit: Option<Vec<String>>,
    abort: Option<Vec<String>>,
}

impl TryFrom<RawConfig> for EditorConfig {
    type Error = CalEditError;

    fn try_from(raw: RawConfig) -> CalEditResult<Self> {
        let default_timezone = match raw.locale.default_timezone {
            Some(name) => parse_timezone(&name)
                .ok_or_else(|| CalEditError::Config(format!("Unknown timezone '{}'", name)))?,
            None => system_timezone(),
        };

        let first_weekday = match raw.locale.first_weekday {
            Some(day) => parse_first_weekday(&day).ok_or_else(|| {
                CalEditError::Config(format!("Unknown first_weekday '{}'", day))
            })?,
            None => Weekday::Mon,
        };

        let defaults = KeyMap::default();

        Ok(EditorConfig {
            calendar_dir: raw
                .calendar_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CALENDAR_DIR)),
            default_calendar: raw.default_calendar,
            locale: LocaleConfig {
                date_format: raw
                    .locale
                    .date_format
                    .unwrap_or_else(|| DEFAULT_DATE_FORMAT.to_string()),
                time_format: raw
                    .locale
                    .time_format
                    .unwrap_or_else(|| DEFAULT_TIME_FORMAT.to_string()),
                default_timezone,
                first_weekday,
            },
            keybindings: KeyMap {
                commit: raw.keybindings.commit.unwrap_or(defaults.commit),
                abort: raw.keybindings.abort.unwrap_or(defaults.abort),
            },
        })
    }
}

/// Accepts "monday", "Mon" or the ICS token "MO".
fn parse_first_weekday(value: &str) -> Option<Weekday> {
    parse_weekday_token(value).or_else(|| value.parse::<Weekday>().ok())
}

impl EditorConfig {
    pub fn config_path() -> CalEditResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalEditError::Config("Could not determine config directory".into()))?
            .join("caledit");

        Ok(config_dir.join("config.toml"))
    }

    /// Load the user's config, creating a commented default file if none exists.
    pub fn load() -> CalEditResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> CalEditResult<Self> {
        let raw: RawConfig = Config::builder()
            .add_source(File::from(path).required(false))
            .build()
            .map_err(|e| CalEditError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalEditError::Config(e.to_string()))?;

        let config = EditorConfig::try_from(raw)?;
        tracing::debug!(
            path = %path.display(),
            timezone = %config.locale.default_timezone.name(),
            "Loaded config"
        );
        Ok(config)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalEditResult<()> {
        let contents = format!(
            "\
# caledit configuration

# Where your calendars live:
# calendar_dir = \"{}\"

# Calendar for new events:
# default_calendar = \"personal\"

# [locale]
# date_format = \"{}\"
# time_format = \"{}\"
# default_timezone = \"Europe/Berlin\"
# first_weekday = \"monday\"

# [keybindings]
# commit = [\"meta enter\"]
# abort = [\"esc\"]
",
            DEFAULT_CALENDAR_DIR, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalEditError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalEditError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// The calendar directory with `~` expanded.
    pub fn data_path(&self) -> PathBuf {
        let full_path_str =
            shellexpand::tilde(&self.calendar_dir.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = EditorConfig::load_from(&dir.path().join("nope.toml")).unwrap();

        assert_eq!(config.calendar_dir, PathBuf::from("~/calendar"));
        assert_eq!(config.locale.date_format, "%Y-%m-%d");
        assert_eq!(config.keybindings.resolve("esc"), Some(KeyAction::Abort));
    }

    #[test]
    fn default_file_loads_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("caledit").join("config.toml");
        EditorConfig::create_default_config(&path).unwrap();

        let config = EditorConfig::load_from(&path).unwrap();

        assert_eq!(config.default_calendar, None);
        assert_eq!(config.locale.first_weekday, Weekday::Mon);
    }

    #[test]
    fn reads_locale_and_keybindings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
calendar_dir = "/tmp/cals"
default_calendar = "work"

[locale]
date_format = "%d.%m.%Y"
default_timezone = "Europe/Berlin"
first_weekday = "SU"

[keybindings]
commit = ["ctrl s"]
"#,
        )
        .unwrap();

        let config = EditorConfig::load_from(&path).unwrap();

        assert_eq!(config.data_path(), PathBuf::from("/tmp/cals"));
        assert_eq!(config.default_calendar.as_deref(), Some("work"));
        assert_eq!(config.locale.date_format, "%d.%m.%Y");
        assert_eq!(config.locale.time_format, "%H:%M");
        assert_eq!(config.locale.default_timezone, chrono_tz::Europe::Berlin);
        assert_eq!(config.locale.first_weekday, Weekday::Sun);
        assert_eq!(config.keybindings.resolve("ctrl s"), Some(KeyAction::Commit));
        assert_eq!(config.keybindings.resolve("meta enter"), None);
        assert_eq!(config.keybindings.abort_key(), "esc");
    }

    #[test]
    fn unknown_timezone_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[locale]\ndefault_timezone = \"Mars/Olympus\"\n").unwrap();

        let err = EditorConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, CalEditError::Config(_)));
    }

    #[test]
    fn first_weekday_accepts_names() {
        assert_eq!(parse_first_weekday("monday"), Some(Weekday::Mon));
        assert_eq!(parse_first_weekday("Sat"), Some(Weekday::Sat));
        assert_eq!(parse_first_weekday("someday"), None);
    }
}
