//! Where edited events are stored.

mod local;

pub use local::{CalendarConfig, LocalCollection, StoredEvent};

use crate::error::CalEditResult;
use crate::event::Event;

/// Persistence for events, grouped into named calendars.
///
/// Each write updates `event.etag` to the tag of the stored copy.
pub trait Collection {
    /// Calendars new or moved events may be written to, in display order.
    fn writable_calendar_names(&self) -> Vec<String>;

    /// Store an event that has never been stored, in `event.calendar`.
    fn create(&mut self, event: &mut Event) -> CalEditResult<()>;

    /// Replace the stored copy of `event` in its current calendar.
    fn update(&mut self, event: &mut Event) -> CalEditResult<()>;

    /// Move a stored event into `target`, writing its current content there.
    fn change_collection(&mut self, event: &mut Event, target: &str) -> CalEditResult<()>;
}
