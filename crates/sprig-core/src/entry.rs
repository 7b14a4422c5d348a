use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Backend classification of an entry.
///
/// The backend defaults unclassifiable input to `Note`, so a missing or
/// null category deserializes to `Note` as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Category {
    Task,
    Reminder,
    #[default]
    Note,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Task => write!(f, "TASK"),
            Category::Reminder => write!(f, "REMINDER"),
            Category::Note => write!(f, "NOTE"),
        }
    }
}

impl Category {
    pub fn icon(self) -> &'static str {
        match self {
            Category::Task => "[t]",
            Category::Reminder => "[r]",
            Category::Note => "[n]",
        }
    }
}

/// Backend-assigned priority. Entries may carry none at all; an absent
/// priority ranks below `Low` when ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, higher first. Absent priorities rank 0.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// A single task/reminder/note record as returned by the backend.
///
/// Entries are immutable on the client; every change happens server-side
/// and the whole collection is re-fetched afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub category: Category,
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Calendar date the backend extracted, wire format `YYYY-MM-DD`.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Relevance score in [0, 1]; present only in search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

impl Entry {
    pub fn priority_rank(&self) -> u8 {
        self.priority.map(Priority::rank).unwrap_or(0)
    }
}

/// Backend responses declare several fields nullable; treat an explicit
/// null the same as a missing field.
fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_full_entry() {
        let json = r#"{
            "id": "abc-1",
            "text": "pay rent",
            "category": "TASK",
            "priority": "HIGH",
            "due_date": "2026-09-01",
            "created_at": "2026-08-20T10:00:00+00:00"
        }"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.category, Category::Task);
        assert_eq!(entry.priority, Some(Priority::High));
        assert_eq!(
            entry.due_date,
            Some(NaiveDate::from_ymd_opt(2026, 9, 1).unwrap())
        );
        assert!(entry.similarity.is_none());
    }

    #[test]
    fn null_category_defaults_to_note() {
        let json = r#"{"id": "x", "text": "loose thought", "category": null}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.category, Category::Note);
        assert_eq!(entry.priority, None);
        assert_eq!(entry.priority_rank(), 0);
    }

    #[test]
    fn search_result_carries_similarity() {
        let json = r#"{"id": "x", "text": "buy milk", "category": "TASK", "similarity": 0.83}"#;
        let entry: Entry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.similarity, Some(0.83));
    }
}
