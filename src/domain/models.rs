use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

pub const SNAP_INTERVALS: [u32; 4] = [5, 10, 15, 30];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    Doing,
    Done,
    Hold,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [Self::Todo, Self::Doing, Self::Done, Self::Hold];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::Doing => "doing",
            Self::Done => "done",
            Self::Hold => "hold",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(with = "wall_clock")]
    pub created_at: NaiveDateTime,
    #[serde(default, with = "wall_clock_opt", skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default, with = "calendar_date_opt", skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "task.id")?;
        validate_non_empty(&self.title, "task.title")?;
        if self.duration == Some(0) {
            return Err("task.duration must be > 0".to_string());
        }
        if self.completed_at.is_some() && self.status != TaskStatus::Done {
            return Err("task.completed_at must only be set while done".to_string());
        }
        Ok(())
    }

    /// Moves the task to `status`, stamping or clearing `completed_at`.
    pub fn apply_status(&mut self, status: TaskStatus, now: NaiveDateTime) {
        self.status = status;
        self.completed_at = if status == TaskStatus::Done {
            Some(now)
        } else {
            None
        };
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    Event,
    Task,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BlockTodo {
    pub id: String,
    pub text: String,
    pub done: bool,
    #[serde(default)]
    pub doing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TimeBlock {
    pub id: String,
    pub title: String,
    #[serde(with = "wall_clock")]
    pub start_time: NaiveDateTime,
    #[serde(with = "wall_clock")]
    pub end_time: NaiveDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub todos: Vec<BlockTodo>,
}

impl TimeBlock {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.id, "block.id")?;
        validate_non_empty(&self.title, "block.title")?;
        if self.end_time <= self.start_time {
            return Err("block.end_time must be after block.start_time".to_string());
        }
        if self.block_type == BlockType::Task && self.task_id.is_none() {
            return Err("block.task_id is required for task blocks".to_string());
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// The task this block is linked to, for task blocks only.
    pub fn linked_task_id(&self) -> Option<&str> {
        match self.block_type {
            BlockType::Task => self.task_id.as_deref(),
            BlockType::Event => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DaySchedule {
    pub date: String,
    pub blocks: Vec<TimeBlock>,
}

impl DaySchedule {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date: date.format("%Y-%m-%d").to_string(),
            blocks: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_date(&self.date, "schedule.date")?;
        for block in &self.blocks {
            block.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub day_start: u32,
    pub day_end: u32,
    pub snap_interval: u32,
    pub week_start: u32,
    pub default_block_color: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            day_start: 6,
            day_end: 24,
            snap_interval: 15,
            week_start: 1,
            default_block_color: "#6366f1".to_string(),
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.day_start > 23 {
            return Err("settings.day_start must be 0-23".to_string());
        }
        if self.day_end > 24 || self.day_end <= self.day_start {
            return Err("settings.day_end must be after day_start and <= 24".to_string());
        }
        if !SNAP_INTERVALS.contains(&self.snap_interval) {
            return Err(format!(
                "settings.snap_interval must be one of {:?}",
                SNAP_INTERVALS
            ));
        }
        if self.week_start > 1 {
            return Err("settings.week_start must be 0 or 1".to_string());
        }
        validate_non_empty(&self.default_block_color, "settings.default_block_color")
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

const WALL_CLOCK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Parses a stored instant. Naive ISO strings are taken as wall clock; RFC 3339
/// strings keep the wall clock of their own offset.
pub fn parse_wall_clock(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|value| value.naive_local())
        })
}

pub fn format_wall_clock(value: &NaiveDateTime) -> String {
    value.format(WALL_CLOCK_FORMAT).to_string()
}

mod wall_clock {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_wall_clock(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_wall_clock(&raw)
            .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 instant '{raw}'")))
    }
}

mod wall_clock_opt {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&super::format_wall_clock(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| {
            super::parse_wall_clock(&raw)
                .ok_or_else(|| de::Error::custom(format!("invalid ISO-8601 instant '{raw}'")))
        })
        .transpose()
    }
}

mod calendar_date_opt {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_str(&value.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    // Accepts a bare date or a full timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .ok()
                .or_else(|| super::parse_wall_clock(&raw).map(|value| value.date()))
                .ok_or_else(|| de::Error::custom(format!("invalid date '{raw}'")))
        })
        .transpose()
    }
}
