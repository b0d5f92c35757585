use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Calendar key format for `SleepRecord::date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Tag applied to records submitted without any tags.
pub const DEFAULT_TAG: &str = "recorded";

/// Mood right after waking up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Refreshed,
    Tired,
    Anxious,
    Neutral,
    Nightmare,
    Energized,
}

impl Mood {
    pub const ALL: [Mood; 6] = [
        Mood::Refreshed,
        Mood::Tired,
        Mood::Anxious,
        Mood::Neutral,
        Mood::Nightmare,
        Mood::Energized,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Mood::Refreshed => "😊",
            Mood::Tired => "😴",
            Mood::Anxious => "😰",
            Mood::Neutral => "😑",
            Mood::Nightmare => "😖",
            Mood::Energized => "🤩",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mood::Refreshed => "refreshed",
            Mood::Tired => "tired",
            Mood::Anxious => "anxious",
            Mood::Neutral => "neutral",
            Mood::Nightmare => "nightmare",
            Mood::Energized => "energized",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.emoji(), self.label())
    }
}

impl std::str::FromStr for Mood {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Mood::ALL
            .into_iter()
            .find(|m| m.label() == needle)
            .ok_or_else(|| RecordError::UnknownMood(s.to_string()))
    }
}

/// One night of sleep as entered by the user.
///
/// `deep_sleep + light_sleep + rem_sleep` is nominally 100; the store does not
/// enforce it and the aggregator normalises instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub id: String,
    /// Day key, `YYYY-MM-DD`. Not unique across records.
    pub date: String,
    pub score: u8,
    /// Total sleep in minutes.
    pub duration: u32,
    pub deep_sleep: u8,
    pub light_sleep: u8,
    pub rem_sleep: u8,
    pub mood: Mood,
    pub satisfaction: u8,
    pub title: String,
    pub memo: String,
    pub tags: Vec<String>,
}

impl SleepRecord {
    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).ok()
    }

    pub fn duration_hours(&self) -> f64 {
        f64::from(self.duration) / 60.0
    }

    /// `"7h 20m"` style label.
    pub fn duration_label(&self) -> String {
        format!("{}h {}m", self.duration / 60, self.duration % 60)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("date must be YYYY-MM-DD, got {0:?}")]
    InvalidDate(String),

    #[error("score must be within 0..=100, got {0}")]
    ScoreOutOfRange(u8),

    #[error("satisfaction must be within 1..=5, got {0}")]
    SatisfactionOutOfRange(u8),

    #[error("{stage} percentage must be within 0..=100, got {value}")]
    StageOutOfRange { stage: &'static str, value: u8 },

    #[error("title is required")]
    EmptyTitle,

    #[error("unknown mood {0:?}")]
    UnknownMood(String),
}

/// Record-entry form submission. `id` is present when editing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub date: String,
    pub score: u8,
    pub duration: u32,
    pub deep_sleep: u8,
    pub light_sleep: u8,
    pub rem_sleep: u8,
    pub mood: Mood,
    pub satisfaction: u8,
    pub title: String,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewRecord {
    pub fn validate(&self) -> Result<(), RecordError> {
        if NaiveDate::parse_from_str(&self.date, DATE_FORMAT).is_err() {
            return Err(RecordError::InvalidDate(self.date.clone()));
        }
        if self.score > 100 {
            return Err(RecordError::ScoreOutOfRange(self.score));
        }
        if !(1..=5).contains(&self.satisfaction) {
            return Err(RecordError::SatisfactionOutOfRange(self.satisfaction));
        }
        for (stage, value) in [
            ("deep", self.deep_sleep),
            ("light", self.light_sleep),
            ("rem", self.rem_sleep),
        ] {
            if value > 100 {
                return Err(RecordError::StageOutOfRange { stage, value });
            }
        }
        if self.title.trim().is_empty() {
            return Err(RecordError::EmptyTitle);
        }
        Ok(())
    }

    /// Validate and turn the draft into a record, minting an id if needed.
    pub fn into_record(self) -> Result<SleepRecord, RecordError> {
        self.validate()?;
        let tags = if self.tags.is_empty() {
            vec![DEFAULT_TAG.to_string()]
        } else {
            self.tags
        };
        Ok(SleepRecord {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            date: self.date,
            score: self.score,
            duration: self.duration,
            deep_sleep: self.deep_sleep,
            light_sleep: self.light_sleep,
            rem_sleep: self.rem_sleep,
            mood: self.mood,
            satisfaction: self.satisfaction,
            title: self.title,
            memo: self.memo,
            tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewRecord {
        NewRecord {
            id: None,
            date: "2024-12-21".to_string(),
            score: 80,
            duration: 450,
            deep_sleep: 25,
            light_sleep: 55,
            rem_sleep: 20,
            mood: Mood::Refreshed,
            satisfaction: 4,
            title: "Slept through".to_string(),
            memo: String::new(),
            tags: vec![],
        }
    }

    #[test]
    fn test_into_record_mints_id_and_default_tag() {
        let record = draft().into_record().unwrap();
        assert!(!record.id.is_empty());
        assert_eq!(record.tags, vec![DEFAULT_TAG.to_string()]);
    }

    #[test]
    fn test_into_record_keeps_existing_id() {
        let mut d = draft();
        d.id = Some("r1".to_string());
        assert_eq!(d.into_record().unwrap().id, "r1");
    }

    #[test]
    fn test_validate_rejects_out_of_range_values() {
        let mut d = draft();
        d.score = 101;
        assert_eq!(d.validate(), Err(RecordError::ScoreOutOfRange(101)));

        let mut d = draft();
        d.satisfaction = 0;
        assert_eq!(d.validate(), Err(RecordError::SatisfactionOutOfRange(0)));

        let mut d = draft();
        d.date = "2024-12-5x".to_string();
        assert!(matches!(d.validate(), Err(RecordError::InvalidDate(_))));

        let mut d = draft();
        d.title = "   ".to_string();
        assert_eq!(d.validate(), Err(RecordError::EmptyTitle));
    }

    #[test]
    fn test_mood_display_and_parse() {
        assert_eq!(Mood::Tired.to_string(), "😴 tired");
        assert_eq!("Nightmare".parse::<Mood>().unwrap(), Mood::Nightmare);
        assert!("grumpy".parse::<Mood>().is_err());
    }

    #[test]
    fn test_duration_label() {
        let record = draft().into_record().unwrap();
        assert_eq!(record.duration_label(), "7h 30m");
        assert!((record.duration_hours() - 7.5).abs() < 1e-9);
    }
}
