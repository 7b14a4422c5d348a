//! Pure view model over the entry collection: which entries a view shows,
//! in what order, and the per-category counts for the sidebar.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate};

use crate::entry::{Category, Entry};

/// The currently selected lens over the entry collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Composer pane for new entries; shows no list.
    Chat,
    Search,
    /// "Important" overview: tasks and reminders, notes excluded.
    All,
    Tasks,
    Reminders,
    Notes,
}

impl View {
    /// Category predicate for list views. This table is the single place
    /// the per-view filtering rules live.
    pub fn includes(self, category: Category) -> bool {
        match self {
            View::All => category != Category::Note,
            View::Tasks => category == Category::Task,
            View::Reminders => category == Category::Reminder,
            View::Notes => category == Category::Note,
            View::Chat | View::Search => false,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            View::Chat => "New",
            View::Search => "Search Results",
            View::All => "Important",
            View::Tasks => "Tasks",
            View::Reminders => "Reminders",
            View::Notes => "Notes",
        }
    }

    pub fn is_list(self) -> bool {
        !matches!(self, View::Chat)
    }
}

/// Per-category sizes over the full entry collection, independent of the
/// selected view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewCounts {
    pub all: usize,
    pub tasks: usize,
    pub reminders: usize,
    pub notes: usize,
}

pub fn counts(entries: &[Entry]) -> ViewCounts {
    let mut c = ViewCounts::default();
    for entry in entries {
        match entry.category {
            Category::Task => {
                c.tasks += 1;
                c.all += 1;
            }
            Category::Reminder => {
                c.reminders += 1;
                c.all += 1;
            }
            Category::Note => c.notes += 1,
        }
    }
    c
}

/// An entry is overdue iff its due date is strictly before the start of the
/// current day. Due exactly today is not overdue.
pub fn is_overdue(due: NaiveDate, today: NaiveDate) -> bool {
    due < today
}

/// Produce the entry list for `view`.
///
/// Search results come back from the backend already ranked by relevance
/// and are passed through untouched. Every other list view filters by
/// category and sorts with [`compare`]. `today` is the start of the current
/// calendar day; it is a parameter so ordering never reads the wall clock.
pub fn select(entries: &[Entry], view: View, search_results: &[Entry], today: NaiveDate) -> Vec<Entry> {
    match view {
        View::Search => search_results.to_vec(),
        View::Chat => Vec::new(),
        _ => {
            let mut filtered: Vec<Entry> = entries
                .iter()
                .filter(|e| view.includes(e.category))
                .cloned()
                .collect();
            filtered.sort_by(|a, b| compare(a, b, today));
            filtered
        }
    }
}

/// Total order for list views, first non-equal rule wins:
/// priority rank descending, then due dates (overdue first, then earlier
/// first, any due date before none), then creation time descending.
pub fn compare(a: &Entry, b: &Entry, today: NaiveDate) -> Ordering {
    let by_priority = b.priority_rank().cmp(&a.priority_rank());
    if by_priority != Ordering::Equal {
        return by_priority;
    }

    match (a.due_date, b.due_date) {
        (Some(da), Some(db)) => {
            let (overdue_a, overdue_b) = (is_overdue(da, today), is_overdue(db, today));
            if overdue_a != overdue_b {
                return if overdue_a { Ordering::Less } else { Ordering::Greater };
            }
            // Equal due dates stay equal; sort_by is stable, so the input
            // order decides and stays deterministic.
            da.cmp(&db)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => {
            // Missing creation time is treated as epoch and sorts last.
            let ca = a.created_at.unwrap_or(DateTime::UNIX_EPOCH);
            let cb = b.created_at.unwrap_or(DateTime::UNIX_EPOCH);
            cb.cmp(&ca)
        }
    }
}
