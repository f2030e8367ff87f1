//! Weekday set used by the weekly recurrence editor.

use chrono::Weekday;

/// RFC 5545 weekday token (`MO`, `TU`, ...).
pub fn weekday_token(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

pub fn parse_weekday_token(token: &str) -> Option<Weekday> {
    match token.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

/// Selected weekdays, presented starting from the configured first weekday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdaySelection {
    first_weekday: Weekday,
    // indexed by num_days_from_monday
    selected: [bool; 7],
}

impl WeekdaySelection {
    pub fn new(first_weekday: Weekday) -> Self {
        WeekdaySelection {
            first_weekday,
            selected: [false; 7],
        }
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.set(day, true);
        self
    }

    pub fn set(&mut self, day: Weekday, state: bool) {
        self.selected[day.num_days_from_monday() as usize] = state;
    }

    /// Flip `day`, returning its new state.
    pub fn toggle(&mut self, day: Weekday) -> bool {
        let slot = &mut self.selected[day.num_days_from_monday() as usize];
        *slot = !*slot;
        *slot
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.selected[day.num_days_from_monday() as usize]
    }

    pub fn len(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    /// All seven days in display order.
    pub fn display_order(&self) -> Vec<Weekday> {
        std::iter::successors(Some(self.first_weekday), |d| Some(d.succ()))
            .take(7)
            .collect()
    }

    /// Selected days in display order.
    pub fn days(&self) -> Vec<Weekday> {
        self.display_order()
            .into_iter()
            .filter(|d| self.contains(*d))
            .collect()
    }

    /// Selected days Monday-first, the order rules are compared in.
    pub fn canonical(&self) -> Vec<Weekday> {
        let mut days = self.days();
        days.sort_by_key(|d| d.num_days_from_monday());
        days
    }

    /// `(token, selected)` pairs in display order, for drawing checkboxes.
    pub fn labels(&self) -> Vec<(&'static str, bool)> {
        self.display_order()
            .into_iter()
            .map(|d| (weekday_token(d), self.contains(d)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_order_starts_at_first_weekday() {
        let selection = WeekdaySelection::new(Weekday::Sun);
        let tokens: Vec<_> = selection
            .display_order()
            .into_iter()
            .map(weekday_token)
            .collect();
        assert_eq!(tokens, ["SU", "MO", "TU", "WE", "TH", "FR", "SA"]);
    }

    #[test]
    fn days_follow_display_order_but_canonical_is_monday_first() {
        let selection = WeekdaySelection::new(Weekday::Sun)
            .with(Weekday::Mon)
            .with(Weekday::Sun);
        assert_eq!(selection.days(), vec![Weekday::Sun, Weekday::Mon]);
        assert_eq!(selection.canonical(), vec![Weekday::Mon, Weekday::Sun]);
    }

    #[test]
    fn toggle_flips_and_reports_state() {
        let mut selection = WeekdaySelection::new(Weekday::Mon);
        assert!(selection.toggle(Weekday::Wed));
        assert_eq!(selection.len(), 1);
        assert!(!selection.toggle(Weekday::Wed));
        assert!(selection.is_empty());
    }

    #[test]
    fn labels_mark_selected_days() {
        let selection = WeekdaySelection::new(Weekday::Mon).with(Weekday::Fri);
        let labels = selection.labels();
        assert_eq!(labels[0], ("MO", false));
        assert_eq!(labels[4], ("FR", true));
    }

    #[test]
    fn token_parsing_is_case_insensitive() {
        assert_eq!(parse_weekday_token("th"), Some(Weekday::Thu));
        assert_eq!(parse_weekday_token("1MO"), None);
    }
}
