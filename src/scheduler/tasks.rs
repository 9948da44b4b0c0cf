//! Scheduled maintenance task definitions.
//!
//! Defines the [`ScheduledTask`] record pushed by the foreground page and the
//! due-window arithmetic used by the notifier.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Task identifier as assigned by the foreground page.
///
/// The page compares identifiers strictly, so a numeric id must come back as
/// a number and a string id as a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum TaskId {
    Number(i64),
    Text(String),
}

/// Largest integer a JavaScript number holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Integer(i64),
            Float(f64),
            Text(String),
        }

        // Pages hand over JS numbers, so `1.0` is the same id as `1`.
        match Raw::deserialize(deserializer)? {
            Raw::Integer(n) => Ok(Self::Number(n)),
            Raw::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER => {
                Ok(Self::Number(f as i64))
            }
            Raw::Float(f) => Err(D::Error::custom(format!(
                "task id {f} is not an integer"
            ))),
            Raw::Text(s) => Ok(Self::Text(s)),
        }
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for TaskId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One maintenance reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledTask {
    /// Unique task identifier.
    pub id: TaskId,
    /// Subject of the task, e.g. a machine name.
    #[serde(default, alias = "subject")]
    pub machine: String,
    /// Task-type label, e.g. "Oil change".
    #[serde(default, rename = "type", alias = "taskType")]
    pub task_type: String,
    /// Calendar date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Time of day, `HH:MM`, `HH:MM:SS` or `HH:MM:SS.sss`.
    #[serde(default)]
    pub time: String,
    /// Set once a notification has been raised in this worker lifetime.
    #[serde(default)]
    pub notified: bool,
}

impl ScheduledTask {
    /// Create a pending task.
    pub fn new(
        id: impl Into<TaskId>,
        machine: impl Into<String>,
        task_type: impl Into<String>,
        date: impl Into<String>,
        time: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            machine: machine.into(),
            task_type: task_type.into(),
            date: date.into(),
            time: time.into(),
            notified: false,
        }
    }

    /// Local wall-clock time the task is scheduled for.
    ///
    /// Returns `None` when the date or time does not parse.
    pub fn scheduled_at(&self) -> Option<NaiveDateTime> {
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d").ok()?;
        let raw_time = self.time.trim();
        let time = NaiveTime::parse_from_str(raw_time, "%H:%M:%S%.f")
            .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M:%S"))
            .or_else(|_| NaiveTime::parse_from_str(raw_time, "%H:%M"))
            .ok()?;
        Some(date.and_time(time))
    }

    /// Signed time remaining until the scheduled time.
    pub fn due_in(&self, now: NaiveDateTime) -> Option<TimeDelta> {
        self.scheduled_at().map(|at| at - now)
    }

    /// Returns `true` when the task is pending and its scheduled time lies
    /// strictly between `now` and `now + window`.
    pub fn is_due_within(&self, now: NaiveDateTime, window: TimeDelta) -> bool {
        if self.notified {
            return false;
        }
        match self.due_in(now) {
            Some(due) => due > TimeDelta::zero() && due < window,
            None => false,
        }
    }
}
