use std::collections::BTreeSet;

use crate::models::{Mood, SleepRecord};

/// Ordered collection of sleep records, most recent entry first.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<SleepRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with the three demo nights shown on first launch.
    pub fn with_demo_records() -> Self {
        Self {
            records: demo_records(),
        }
    }

    /// Replace in place when the id exists, otherwise insert at the front.
    ///
    /// Returns `true` when an existing record was replaced.
    pub fn upsert(&mut self, record: SleepRecord) -> bool {
        if let Some(slot) = self.records.iter_mut().find(|r| r.id == record.id) {
            tracing::debug!(id = %record.id, date = %record.date, "Replacing sleep record");
            *slot = record;
            return true;
        }
        tracing::debug!(id = %record.id, date = %record.date, "Inserting sleep record");
        self.records.insert(0, record);
        false
    }

    /// First record in store order on `date`. Later records on the same date
    /// are shadowed; use [`RecordStore::find_all_by_date`] to see them.
    pub fn find_by_date(&self, date: &str) -> Option<&SleepRecord> {
        let mut matches = self.records.iter().filter(|r| r.date == date);
        let first = matches.next();
        let shadowed = matches.count();
        if shadowed > 0 {
            tracing::debug!(date, shadowed, "Multiple records share a date; returning the first");
        }
        first
    }

    pub fn find_all_by_date(&self, date: &str) -> Vec<&SleepRecord> {
        self.records.iter().filter(|r| r.date == date).collect()
    }

    pub fn get(&self, id: &str) -> Option<&SleepRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    pub fn latest(&self) -> Option<&SleepRecord> {
        self.records.first()
    }

    pub fn all(&self) -> &[SleepRecord] {
        &self.records
    }

    /// Dates that have at least one record (calendar highlights).
    pub fn dates_with_records(&self) -> BTreeSet<&str> {
        self.records.iter().map(|r| r.date.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn demo_records() -> Vec<SleepRecord> {
    vec![
        SleepRecord {
            id: "r1".to_string(),
            date: "2024-12-20".to_string(),
            score: 88,
            duration: 480,
            deep_sleep: 30,
            light_sleep: 50,
            rem_sleep: 20,
            mood: Mood::Refreshed,
            satisfaction: 5,
            title: "Slept deeply and woke up fresh".to_string(),
            memo: "Had tea and fell asleep right away. No dreams, woke before the alarm."
                .to_string(),
            tags: vec!["perfect-sleep".to_string(), "refreshed".to_string()],
        },
        SleepRecord {
            id: "r2".to_string(),
            date: "2024-12-19".to_string(),
            score: 65,
            duration: 350,
            deep_sleep: 15,
            light_sleep: 65,
            rem_sleep: 20,
            mood: Mood::Tired,
            satisfaction: 2,
            title: "Kept waking up before dawn".to_string(),
            memo: "Woke around 3am from a nightmare and could not fall back asleep.".to_string(),
            tags: vec!["nightmare".to_string(), "woke-up".to_string()],
        },
        SleepRecord {
            id: "r3".to_string(),
            date: "2024-12-15".to_string(),
            score: 75,
            duration: 420,
            deep_sleep: 20,
            light_sleep: 60,
            rem_sleep: 20,
            mood: Mood::Neutral,
            satisfaction: 3,
            title: "An ordinary night".to_string(),
            memo: "Slept fine. Nothing special to remember.".to_string(),
            tags: vec!["ordinary".to_string()],
        },
    ]
}
