//! JSON records of the board kept in a [`KeyValueStore`]: the task list, one
//! schedule per day and the settings.

use crate::domain::models::{AppSettings, DaySchedule, Task};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::KeyValueStore;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

pub const TASKS_KEY: &str = "tasks";
pub const SETTINGS_KEY: &str = "settings";
pub const SCHEDULE_PREFIX: &str = "schedule:";

pub fn schedule_key(date: &str) -> String {
    format!("{SCHEDULE_PREFIX}{date}")
}

pub fn date_from_schedule_key(key: &str) -> Option<&str> {
    key.strip_prefix(SCHEDULE_PREFIX)
        .filter(|date| !date.is_empty())
}

#[derive(Clone)]
pub struct BoardRepository {
    store: Arc<dyn KeyValueStore>,
}

impl BoardRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// The stored task list. Tasks failing validation are dropped with a warning.
    pub fn load_tasks(&self) -> Result<Vec<Task>, InfraError> {
        let tasks: Vec<Task> = self.read(TASKS_KEY)?.unwrap_or_default();
        Ok(tasks
            .into_iter()
            .filter(|task| match task.validate() {
                Ok(()) => true,
                Err(reason) => {
                    tracing::warn!(task_id = %task.id, %reason, "skipping invalid task record");
                    false
                }
            })
            .collect())
    }

    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), InfraError> {
        self.write(TASKS_KEY, &tasks)
    }

    pub fn load_settings(&self) -> Result<Option<AppSettings>, InfraError> {
        self.read(SETTINGS_KEY)
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), InfraError> {
        self.write(SETTINGS_KEY, settings)
    }

    pub fn has_schedule(&self, date: &str) -> Result<bool, InfraError> {
        Ok(self.store.get(&schedule_key(date))?.is_some())
    }

    pub fn save_schedule(&self, schedule: &DaySchedule) -> Result<(), InfraError> {
        self.write(&schedule_key(&schedule.date), schedule)
    }

    /// Every stored day keyed by date. A record that no longer decodes or fails
    /// validation is skipped with a warning so one bad day cannot hide the rest.
    pub fn load_all_schedules(&self) -> Result<BTreeMap<String, DaySchedule>, InfraError> {
        let mut schedules = BTreeMap::new();
        for key in self.store.keys_with_prefix(SCHEDULE_PREFIX)? {
            let Some(date) = date_from_schedule_key(&key) else {
                continue;
            };
            match self.read::<DaySchedule>(&key) {
                Ok(Some(mut schedule)) => {
                    schedule.date = date.to_string();
                    match schedule.validate() {
                        Ok(()) => {
                            schedules.insert(date.to_string(), schedule);
                        }
                        Err(reason) => {
                            tracing::warn!(%key, %reason, "skipping invalid schedule record")
                        }
                    }
                }
                Ok(None) => {}
                Err(error) => tracing::warn!(%key, %error, "skipping unreadable schedule record"),
            }
        }
        Ok(schedules)
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, InfraError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), InfraError> {
        let encoded = serde_json::to_string(value)?;
        self.store.set(key, &encoded)
    }
}
