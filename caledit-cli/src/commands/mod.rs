pub mod calendars;
pub mod edit;
pub mod new;
pub mod show;

pub use edit::EditArgs;
