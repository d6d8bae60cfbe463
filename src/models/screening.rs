use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::{normalize, TicketStatus};

/// One screening slot as observed on the schedule page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningRecord {
    pub title: String,
    pub screening_time: String,
    pub status: TicketStatus,
    pub button_text: String,
    pub url: String,
    #[serde(default = "Utc::now")]
    pub observed_at: DateTime<Utc>,
}

impl ScreeningRecord {
    pub fn new(
        title: impl Into<String>,
        screening_time: impl Into<String>,
        status: TicketStatus,
        button_text: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            screening_time: screening_time.into(),
            status,
            button_text: button_text.into(),
            url: url.into(),
            observed_at: Utc::now(),
        }
    }
}

/// Point-in-time map of screening status, keyed by normalized title and time.
///
/// Insertion order is preserved so that diff output follows the order the
/// schedule page listed its screenings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ScheduleSnapshot {
    records: IndexMap<String, ScreeningRecord>,
}

impl ScheduleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key format: `<title>_<screeningTime>`, falling back to the record's
    /// position when the screening has no time of its own.
    pub fn key_for(record: &ScreeningRecord, index: usize) -> String {
        let title = normalize(&record.title);
        let time = normalize(&record.screening_time);
        if time.is_empty() {
            format!("{}_{}", title, index)
        } else {
            format!("{}_{}", title, time)
        }
    }

    pub fn insert(&mut self, record: ScreeningRecord) {
        let key = Self::key_for(&record, self.records.len());
        self.records.insert(key, record);
    }

    pub fn get(&self, key: &str) -> Option<&ScreeningRecord> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ScreeningRecord)> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<ScreeningRecord> for ScheduleSnapshot {
    fn from_iter<I: IntoIterator<Item = ScreeningRecord>>(iter: I) -> Self {
        let mut snapshot = Self::new();
        for record in iter {
            snapshot.insert(record);
        }
        snapshot
    }
}
