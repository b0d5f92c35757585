use thiserror::Error;

use crate::models::routine::parse_hhmm;
use crate::models::{Recommendation, RoutineItem, SleepGoal, DEFAULT_CUSTOM_ICON};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutineError {
    #[error("routine name is required")]
    EmptyName,

    #[error("time must be HH:MM, got {0:?}")]
    InvalidTime(String),
}

/// Result of adding an item from the recommendation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecommendationOutcome {
    Added(RoutineItem),
    /// An item with the same name already exists; nothing was added.
    Duplicate,
}

/// Bedtime routine items in display order, plus the sleep goal.
#[derive(Debug, Clone)]
pub struct RoutineStore {
    items: Vec<RoutineItem>,
    goal: SleepGoal,
}

impl Default for RoutineStore {
    fn default() -> Self {
        Self {
            items: default_routines(),
            goal: SleepGoal::default(),
        }
    }
}

impl RoutineStore {
    /// Store seeded with the four default routines.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            goal: SleepGoal::default(),
        }
    }

    /// Flip `enabled`. Returns the new flag, or `None` if the id is unknown.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let item = self.items.iter_mut().find(|r| r.id == id)?;
        item.enabled = !item.enabled;
        Some(item.enabled)
    }

    pub fn add_custom(
        &mut self,
        name: &str,
        icon: Option<&str>,
        time: Option<&str>,
    ) -> Result<RoutineItem, RoutineError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RoutineError::EmptyName);
        }
        let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
            Some(t) if parse_hhmm(t).is_none() => {
                return Err(RoutineError::InvalidTime(t.to_string()));
            }
            other => other.map(str::to_string),
        };

        let item = RoutineItem {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            icon: icon
                .filter(|i| !i.trim().is_empty())
                .unwrap_or(DEFAULT_CUSTOM_ICON)
                .to_string(),
            time,
            enabled: true,
            is_custom: true,
        };
        self.items.push(item.clone());
        Ok(item)
    }

    /// Add a recommended routine unless one with the same name exists.
    pub fn add_from_recommendation(&mut self, rec: &Recommendation) -> RecommendationOutcome {
        if self.items.iter().any(|r| r.name == rec.name) {
            tracing::info!(name = rec.name, "Recommended routine already added");
            return RecommendationOutcome::Duplicate;
        }
        // Recommendation times are fixed and well-formed.
        let item = RoutineItem {
            id: uuid::Uuid::new_v4().to_string(),
            name: rec.name.to_string(),
            icon: rec.icon.to_string(),
            time: Some(rec.time.to_string()),
            enabled: true,
            is_custom: true,
        };
        self.items.push(item.clone());
        RecommendationOutcome::Added(item)
    }

    /// Remove by id. Returns the removed item, `None` if absent.
    pub fn remove(&mut self, id: &str) -> Option<RoutineItem> {
        let idx = self.items.iter().position(|r| r.id == id)?;
        Some(self.items.remove(idx))
    }

    pub fn get(&self, id: &str) -> Option<&RoutineItem> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn all(&self) -> &[RoutineItem] {
        &self.items
    }

    pub fn enabled(&self) -> impl Iterator<Item = &RoutineItem> {
        self.items.iter().filter(|r| r.enabled)
    }

    pub fn goal(&self) -> &SleepGoal {
        &self.goal
    }

    pub fn set_goal(&mut self, goal: SleepGoal) -> Result<(), RoutineError> {
        for t in [&goal.bedtime, &goal.wake_time] {
            if parse_hhmm(t).is_none() {
                return Err(RoutineError::InvalidTime(t.clone()));
            }
        }
        self.goal = goal;
        Ok(())
    }
}

fn default_routines() -> Vec<RoutineItem> {
    [
        ("1", "Drink warm tea", "fa-mug-hot", "22:30", true),
        ("2", "Put the phone away", "fa-mobile-screen-button", "23:00", true),
        ("3", "Stretch for 10 minutes", "fa-person-walking", "22:00", false),
        ("4", "Listen to white noise", "fa-wind", "23:15", true),
    ]
    .into_iter()
    .map(|(id, name, icon, time, enabled)| RoutineItem {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
        time: Some(time.to_string()),
        enabled,
        is_custom: false,
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RECOMMENDED_ROUTINES;

    #[test]
    fn test_seeded_with_four_defaults() {
        let store = RoutineStore::new();
        assert_eq!(store.all().len(), 4);
        assert!(store.all().iter().all(|r| !r.is_custom));
        assert_eq!(store.enabled().count(), 3);
    }

    #[test]
    fn test_toggle_twice_restores_flag() {
        let mut store = RoutineStore::new();
        let before = store.get("3").unwrap().enabled;

        assert_eq!(store.toggle("3"), Some(!before));
        assert_eq!(store.toggle("3"), Some(before));
        assert_eq!(store.get("3").unwrap().enabled, before);
    }

    #[test]
    fn test_toggle_and_remove_unknown_id_are_noops() {
        let mut store = RoutineStore::new();
        assert_eq!(store.toggle("missing"), None);
        assert!(store.remove("missing").is_none());
        assert_eq!(store.all().len(), 4);
    }

    #[test]
    fn test_add_custom_appends_enabled_custom_item() {
        let mut store = RoutineStore::new();
        let item = store.add_custom("Read a book", None, Some("22:10")).unwrap();

        assert!(item.enabled);
        assert!(item.is_custom);
        assert_eq!(item.icon, DEFAULT_CUSTOM_ICON);
        assert_eq!(store.all().last().unwrap().id, item.id);
    }

    #[test]
    fn test_add_custom_rejects_blank_name_and_bad_time() {
        let mut store = RoutineStore::new();
        assert_eq!(store.add_custom("  ", None, None), Err(RoutineError::EmptyName));
        assert_eq!(
            store.add_custom("Meditate", None, Some("10pm")),
            Err(RoutineError::InvalidTime("10pm".to_string()))
        );
        assert_eq!(store.all().len(), 4);
    }

    #[test]
    fn test_recommendation_added_once_then_duplicate() {
        let mut store = RoutineStore::new();
        let rec = &RECOMMENDED_ROUTINES[1];

        let first = store.add_from_recommendation(rec);
        let second = store.add_from_recommendation(rec);

        assert!(matches!(first, RecommendationOutcome::Added(ref item) if item.name == rec.name));
        assert_eq!(second, RecommendationOutcome::Duplicate);
        assert_eq!(store.all().iter().filter(|r| r.name == rec.name).count(), 1);
    }

    #[test]
    fn test_remove_drops_item() {
        let mut store = RoutineStore::new();
        let removed = store.remove("1").unwrap();
        assert_eq!(removed.name, "Drink warm tea");
        assert!(store.get("1").is_none());
    }

    #[test]
    fn test_set_goal_validates_times() {
        let mut store = RoutineStore::empty();
        let goal = SleepGoal {
            bedtime: "22:30".to_string(),
            wake_time: "06:30".to_string(),
        };
        store.set_goal(goal.clone()).unwrap();
        assert_eq!(store.goal(), &goal);

        let bad = SleepGoal {
            bedtime: "late".to_string(),
            wake_time: "06:30".to_string(),
        };
        assert!(store.set_goal(bad).is_err());
        assert_eq!(store.goal(), &goal);
    }
}
