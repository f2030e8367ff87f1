//! One edit of one event, from opening the editor to closing it.

use std::fmt;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveTime, Weekday};

use crate::collection::Collection;
use crate::config::{EditorConfig, KeyAction, KeyMap};
use crate::datetime::Endpoint;
use crate::error::{CalEditError, CalEditResult};
use crate::event::Event;
use crate::fields::{AlarmsEditor, CalendarChooser, EditorPart, TextField};
use crate::range::DateTimeRangeModel;
use crate::recurrence::RecurrenceRuleModel;
use crate::view::{Alert, EditorView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortState {
    Clean,
    /// Unsaved changes were reported; the next abort discards them.
    PendingAbort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistAction {
    Created,
    Updated,
    Moved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// End before start; nothing was touched.
    Invalid,
    /// Nothing to save; the editor closed.
    Unchanged,
    Saved(PersistAction),
    /// The collection refused the write. The editor stays open.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Exported(PathBuf),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortOutcome {
    Closed,
    ConfirmationRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Save(SaveOutcome),
    Abort(AbortOutcome),
    /// Not an editor-level key.
    Ignored,
}

type SaveHook<'a> = Box<dyn FnMut(Endpoint, Endpoint, bool) + 'a>;

pub struct EventEditSession<'a> {
    event: Event,
    // Snapshot for export, which always writes the event as it was opened
    original: Event,
    collection: &'a mut dyn Collection,
    view: &'a mut dyn EditorView,
    keymap: KeyMap,

    summary: TextField,
    description: TextField,
    location: TextField,
    categories: TextField,
    calendar: CalendarChooser,
    range: DateTimeRangeModel,
    recurrence: RecurrenceRuleModel,
    alarms: AlarmsEditor,

    always_save: bool,
    abort: AbortState,
    closed: bool,
    on_save: Option<SaveHook<'a>>,
}

impl fmt::Debug for EventEditSession<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEditSession")
            .field("uid", &self.event.uid)
            .field("abort", &self.abort)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<'a> EventEditSession<'a> {
    pub fn new(
        event: Event,
        config: &EditorConfig,
        collection: &'a mut dyn Collection,
        view: &'a mut dyn EditorView,
    ) -> Self {
        let tz = config.locale.default_timezone;
        let start = event.start_local(tz);
        let end = event.end_local(tz);

        let mut calendar_name = event.calendar.clone();
        if calendar_name.is_empty() {
            calendar_name = config.default_calendar.clone().unwrap_or_default();
        }
        let calendar = CalendarChooser::new(collection.writable_calendar_names(), &calendar_name);

        tracing::debug!(uid = %event.uid, calendar = %calendar.active(), "Opened event for editing");

        EventEditSession {
            summary: TextField::new(&event.summary),
            description: TextField::new(&event.description),
            location: TextField::new(&event.location),
            categories: TextField::new(&event.categories),
            calendar,
            range: DateTimeRangeModel::new(start, end, &config.locale),
            recurrence: RecurrenceRuleModel::new(event.rrule.as_ref(), &start, &config.locale),
            alarms: AlarmsEditor::new(&event.reminders),
            original: event.clone(),
            event,
            collection,
            view,
            keymap: config.keybindings.clone(),
            always_save: false,
            abort: AbortState::Clean,
            closed: false,
            on_save: None,
        }
    }

    /// Persist on commit even when nothing changed (used for new events).
    pub fn with_always_save(mut self, always_save: bool) -> Self {
        self.always_save = always_save;
        self
    }

    /// Called once per successful save with the new range and whether the
    /// event is, or just stopped being, recurring.
    pub fn on_save(mut self, hook: impl FnMut(Endpoint, Endpoint, bool) + 'a) -> Self {
        self.on_save = Some(Box::new(hook));
        self
    }

    pub fn on_date_change(mut self, hook: impl FnMut(NaiveDate) + 'static) -> Self {
        self.range.set_on_date_change(hook);
        self
    }

    pub fn title(&self) -> String {
        format!("Edit: {}", self.summary.value())
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn into_event(self) -> Event {
        self.event
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn abort_state(&self) -> AbortState {
        self.abort
    }

    pub fn always_save(&self) -> bool {
        self.always_save
    }

    // Any interaction other than a second abort cancels a pending abort.
    fn touch(&mut self) {
        self.abort = AbortState::Clean;
    }

    /// Keep editing after an abort warning.
    pub fn resume_editing(&mut self) {
        self.touch();
    }

    pub fn summary(&self) -> &str {
        self.summary.value()
    }

    pub fn set_summary(&mut self, value: &str) {
        self.touch();
        self.summary.set(value);
    }

    pub fn description(&self) -> &str {
        self.description.value()
    }

    pub fn set_description(&mut self, value: &str) {
        self.touch();
        self.description.set(value);
    }

    pub fn location(&self) -> &str {
        self.location.value()
    }

    pub fn set_location(&mut self, value: &str) {
        self.touch();
        self.location.set(value);
    }

    pub fn categories(&self) -> &str {
        self.categories.value()
    }

    pub fn set_categories(&mut self, value: &str) {
        self.touch();
        self.categories.set(value);
    }

    pub fn calendar(&self) -> &CalendarChooser {
        &self.calendar
    }

    pub fn select_calendar(&mut self, name: &str) -> CalEditResult<()> {
        self.touch();
        self.calendar.select(name)
    }

    pub fn range(&self) -> &DateTimeRangeModel {
        &self.range
    }

    pub fn toggle_allday(&mut self, allday: bool) {
        self.touch();
        self.range.toggle_allday(allday);
        self.recurrence.set_start(&self.range.start());
    }

    pub fn set_start_date(&mut self, text: &str) -> CalEditResult<NaiveDate> {
        self.touch();
        let date = self.range.set_start_date(text)?;
        self.recurrence.set_start(&self.range.start());
        Ok(date)
    }

    pub fn set_start_time(&mut self, text: &str) -> CalEditResult<NaiveTime> {
        self.touch();
        let time = self.range.set_start_time(text)?;
        self.recurrence.set_start(&self.range.start());
        Ok(time)
    }

    pub fn set_end_date(&mut self, text: &str) -> CalEditResult<NaiveDate> {
        self.touch();
        self.range.set_end_date(text)
    }

    pub fn set_end_time(&mut self, text: &str) -> CalEditResult<NaiveTime> {
        self.touch();
        self.range.set_end_time(text)
    }

    pub fn recurrence(&self) -> &RecurrenceRuleModel {
        &self.recurrence
    }

    pub fn recurrence_mut(&mut self) -> &mut RecurrenceRuleModel {
        self.touch();
        &mut self.recurrence
    }

    pub fn toggle_weekday(&mut self, day: Weekday) -> CalEditResult<bool> {
        self.recurrence_mut().toggle_weekday(day)
    }

    pub fn alarms(&self) -> &AlarmsEditor {
        &self.alarms
    }

    pub fn alarms_mut(&mut self) -> &mut AlarmsEditor {
        self.touch();
        &mut self.alarms
    }

    fn parts(&self) -> [&dyn EditorPart; 8] {
        [
            &self.summary,
            &self.description,
            &self.location,
            &self.categories,
            &self.calendar,
            &self.range,
            &self.recurrence,
            &self.alarms,
        ]
    }

    /// Whether anything differs from the event as it was opened.
    pub fn changed(&self) -> bool {
        self.parts().iter().any(|part| part.changed())
    }

    pub fn save(&mut self) -> SaveOutcome {
        self.touch();

        if !self.range.validate() {
            self.view.alert(Alert::error(CalEditError::InvalidRange.to_string()));
            return SaveOutcome::Invalid;
        }

        if !self.always_save && !self.changed() {
            tracing::debug!(uid = %self.event.uid, "Nothing changed, closing");
            self.close();
            return SaveOutcome::Unchanged;
        }

        let recurrence_changed = self.recurrence.changed();
        self.apply_changes();

        match self.persist() {
            Ok(action) => {
                let recurring = self.event.is_recurring() || recurrence_changed;
                if let Some(hook) = self.on_save.as_mut() {
                    hook(self.range.start(), self.range.end(), recurring);
                }
                self.close();
                SaveOutcome::Saved(action)
            }
            Err(e) => {
                tracing::warn!(uid = %self.event.uid, error = %e, "Saving event failed");
                let err = match e {
                    CalEditError::Persistence(_) => e,
                    other => CalEditError::Persistence(other.to_string()),
                };
                self.view.alert(Alert::error(err.to_string()));
                SaveOutcome::Failed
            }
        }
    }

    // Write only what changed so untouched fields keep their stored form.
    // Starts over from the opened event, so a retry after a failed write
    // applies the edits (and the sequence bump) once.
    fn apply_changes(&mut self) {
        self.event = self.original.clone();
        if self.summary.changed() {
            self.event.update_summary(self.summary.value());
        }
        if self.description.changed() {
            self.event.update_description(self.description.value());
        }
        if self.location.changed() {
            self.event.update_location(self.location.value());
        }
        if self.categories.changed() {
            self.event.update_categories(self.categories.value());
        }
        if self.recurrence.changed() {
            self.event.update_rrule(self.recurrence.active());
        }
        if self.alarms.changed() {
            self.event.update_alarms(self.alarms.reminders().to_vec());
        }
        // A range edit, or an all-day form the stored event doesn't have yet
        if self.range.changed() || self.range.allday() != self.event.is_allday() {
            self.event
                .update_start_end(&self.range.start(), &self.range.end());
        }
        self.event.increment_sequence();
    }

    fn persist(&mut self) -> CalEditResult<PersistAction> {
        let target = self.calendar.active().to_string();

        if self.event.etag.is_none() {
            self.event.calendar = target;
            tracing::info!(uid = %self.event.uid, calendar = %self.event.calendar, "Creating event");
            self.collection.create(&mut self.event)?;
            Ok(PersistAction::Created)
        } else if self.calendar.changed() {
            tracing::info!(uid = %self.event.uid, from = %self.event.calendar, to = %target, "Moving event");
            self.collection.change_collection(&mut self.event, &target)?;
            Ok(PersistAction::Moved)
        } else {
            tracing::info!(uid = %self.event.uid, calendar = %self.event.calendar, "Updating event");
            self.collection.update(&mut self.event)?;
            Ok(PersistAction::Updated)
        }
    }

    fn close(&mut self) {
        self.abort = AbortState::Clean;
        if !self.closed {
            self.closed = true;
            self.view.backtrack();
        }
    }

    /// Suggested export target: `~/<title>.ics`.
    pub fn default_export_path(&self) -> String {
        format!("~/{}.ics", self.original.summary.trim())
    }

    /// Write the event as it was opened to `target` (`~` is expanded).
    ///
    /// Edits made in this session are not part of the export and are kept.
    pub fn export(&mut self, target: &str) -> ExportOutcome {
        let path = PathBuf::from(shellexpand::tilde(target.trim()).into_owned());

        // the export dialog goes away either way
        self.view.backtrack();

        match self.original.export_to_file(&path) {
            Ok(()) => {
                self.view.alert(Alert::success("Event successfully exported"));
                ExportOutcome::Exported(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Export failed");
                self.view.alert(Alert::error(e.to_string()));
                ExportOutcome::Failed
            }
        }
    }

    /// First abort with unsaved changes only warns; a second one discards them.
    pub fn request_abort(&mut self) -> AbortOutcome {
        if self.abort == AbortState::PendingAbort || !self.changed() {
            tracing::debug!(uid = %self.event.uid, "Closing without saving");
            self.close();
            return AbortOutcome::Closed;
        }

        self.abort = AbortState::PendingAbort;
        self.view.alert(Alert::warning(format!(
            "Unsaved changes! Press {} again to discard.",
            self.keymap.abort_key()
        )));
        AbortOutcome::ConfirmationRequired
    }

    pub fn handle_key(&mut self, key: &str) -> KeyOutcome {
        match self.keymap.resolve(key) {
            Some(KeyAction::Commit) => KeyOutcome::Save(self.save()),
            Some(KeyAction::Abort) => KeyOutcome::Abort(self.request_abort()),
            None => {
                self.touch();
                KeyOutcome::Ignored
            }
        }
    }
}
