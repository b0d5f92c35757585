use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Icon given to custom routines created without one.
pub const DEFAULT_CUSTOM_ICON: &str = "fa-sparkles";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineItem {
    pub id: String,
    pub name: String,
    pub icon: String,
    /// `HH:MM`, not interpreted by the store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub enabled: bool,
    pub is_custom: bool,
}

/// An entry of the fixed recommendation list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub name: &'static str,
    pub icon: &'static str,
    pub time: &'static str,
}

pub const RECOMMENDED_ROUTINES: [Recommendation; 3] = [
    Recommendation {
        name: "A glass of warm milk",
        icon: "fa-glass-water",
        time: "22:15",
    },
    Recommendation {
        name: "4-7-8 breathing",
        icon: "fa-lungs",
        time: "23:00",
    },
    Recommendation {
        name: "Smell lavender oil",
        icon: "fa-spa",
        time: "22:45",
    },
];

impl Recommendation {
    pub fn find(name: &str) -> Option<&'static Recommendation> {
        RECOMMENDED_ROUTINES.iter().find(|r| r.name == name)
    }
}

/// Parse a strict `HH:MM` time of day.
pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.len() != 5 {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

/// Target bedtime and wake time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SleepGoal {
    pub bedtime: String,
    pub wake_time: String,
}

impl Default for SleepGoal {
    fn default() -> Self {
        Self {
            bedtime: "23:00".to_string(),
            wake_time: "07:30".to_string(),
        }
    }
}

impl SleepGoal {
    /// Minutes between bedtime and wake time, wrapping past midnight.
    /// Falls back to the default goal's window when either time is malformed.
    pub fn in_bed_minutes(&self) -> u32 {
        match (parse_hhmm(&self.bedtime), parse_hhmm(&self.wake_time)) {
            (Some(bed), Some(wake)) => {
                let minutes = (wake - bed).num_minutes();
                let minutes = if minutes <= 0 { minutes + 24 * 60 } else { minutes };
                minutes as u32
            }
            _ => 510,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hhmm_is_strict() {
        assert!(parse_hhmm("22:30").is_some());
        assert!(parse_hhmm("00:00").is_some());
        assert!(parse_hhmm("7:30").is_none());
        assert!(parse_hhmm("24:00").is_none());
        assert!(parse_hhmm("22:3a").is_none());
    }

    #[test]
    fn test_goal_window_crosses_midnight() {
        assert_eq!(SleepGoal::default().in_bed_minutes(), 510);

        let same_day = SleepGoal {
            bedtime: "01:00".to_string(),
            wake_time: "08:00".to_string(),
        };
        assert_eq!(same_day.in_bed_minutes(), 420);
    }

    #[test]
    fn test_find_recommendation() {
        assert_eq!(Recommendation::find("4-7-8 breathing").unwrap().time, "23:00");
        assert!(Recommendation::find("Jogging").is_none());
    }
}
