use chrono::{DateTime, Days, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::errors::{SyncError, SyncResult};

/// Text rendered in place of a date that could not be parsed.
pub const NO_DATE_LABEL: &str = "No date set";

/// Portable form of the invalid-date sentinel in persisted snapshots.
const INVALID_DATE_TEXT: &str = "Invalid Date";

/// A point in time attached to a task, or the sentinel for a date that was
/// missing or malformed at the source.
///
/// Parsing never fails: anything that is not a recognizable date becomes
/// [`TaskDate::Invalid`], and formatting code is expected to check for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskDate {
    Valid(DateTime<Utc>),
    Invalid,
}

impl TaskDate {
    pub fn now() -> Self {
        TaskDate::Valid(Utc::now())
    }

    /// Midnight UTC on the given calendar day.
    pub fn from_calendar_date(date: NaiveDate) -> Self {
        TaskDate::Valid(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
    }

    pub fn from_ymd(year: i32, month: u32, day: u32) -> Self {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self::from_calendar_date)
            .unwrap_or(TaskDate::Invalid)
    }

    /// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` calendar dates.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
            return TaskDate::Valid(dt.with_timezone(&Utc));
        }
        match NaiveDate::parse_from_str(input, "%Y-%m-%d") {
            Ok(date) => Self::from_calendar_date(date),
            Err(_) => TaskDate::Invalid,
        }
    }

    /// Like [`TaskDate::parse`], but rejects input that would become the
    /// sentinel. Used for dates typed in by a user.
    pub fn parse_strict(input: &str) -> SyncResult<Self> {
        match Self::parse(input) {
            TaskDate::Invalid => Err(SyncError::InvalidDate(input.to_string())),
            date => Ok(date),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TaskDate::Valid(_))
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskDate::Valid(dt) => Some(*dt),
            TaskDate::Invalid => None,
        }
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        self.as_datetime().map(|dt| dt.date_naive())
    }

    /// Calendar arithmetic that keeps the time of day. The sentinel stays
    /// invalid, and so does a result past chrono's range.
    pub fn add_days(self, days: u64) -> Self {
        match self {
            TaskDate::Valid(dt) => dt
                .checked_add_days(Days::new(days))
                .map(TaskDate::Valid)
                .unwrap_or(TaskDate::Invalid),
            TaskDate::Invalid => TaskDate::Invalid,
        }
    }

    /// `Jan 8, 2024`, as shown in list rows.
    pub fn format_short(&self) -> String {
        self.format_with("%b %-d, %Y")
    }

    /// `January 8, 2024`, as shown in the detail view.
    pub fn format_long(&self) -> String {
        self.format_with("%B %-d, %Y")
    }

    fn format_with(&self, pattern: &str) -> String {
        match self {
            TaskDate::Valid(dt) => dt.format(pattern).to_string(),
            TaskDate::Invalid => NO_DATE_LABEL.to_string(),
        }
    }

    /// Text form used by persisted snapshots.
    pub fn to_portable_string(&self) -> String {
        match self {
            TaskDate::Valid(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            TaskDate::Invalid => INVALID_DATE_TEXT.to_string(),
        }
    }

    /// Milliseconds since the epoch, with the sentinel ordered first.
    pub fn sort_key(&self) -> i64 {
        self.as_datetime().map(|dt| dt.timestamp_millis()).unwrap_or(0)
    }
}

impl std::fmt::Display for TaskDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_short())
    }
}

impl Serialize for TaskDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_portable_string())
    }
}

impl<'de> Deserialize<'de> for TaskDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(text.as_deref().map(TaskDate::parse).unwrap_or(TaskDate::Invalid))
    }
}

/// Optional dates have no use for the sentinel: an unreadable one is absent.
fn deserialize_known_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<TaskDate>, D::Error> {
    Ok(Option::<TaskDate>::deserialize(deserializer)?.filter(TaskDate::is_valid))
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
pub enum TaskStatus {
    #[default]
    #[serde(rename = "To do")]
    #[strum(serialize = "To do")]
    ToDo,
    #[serde(rename = "In progress")]
    #[strum(serialize = "In progress")]
    InProgress,
    #[serde(rename = "Done")]
    #[strum(serialize = "Done")]
    Done,
}

impl TaskStatus {
    pub fn parse(input: &str) -> SyncResult<Self> {
        input
            .trim()
            .parse()
            .map_err(|_| SyncError::InvalidStatus(input.to_string()))
    }

    /// One step along `To do → In progress → Done`.
    pub fn next(self) -> Option<TaskStatus> {
        match self {
            TaskStatus::ToDo => Some(TaskStatus::InProgress),
            TaskStatus::InProgress => Some(TaskStatus::Done),
            TaskStatus::Done => None,
        }
    }

    pub fn is_done(self) -> bool {
        self == TaskStatus::Done
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

/// How far a task can be pushed back from the list view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DelayOption {
    Tomorrow,
    TwoDays,
    OneWeek,
    TwoWeeks,
}

impl DelayOption {
    pub const ALL: [DelayOption; 4] = [
        DelayOption::Tomorrow,
        DelayOption::TwoDays,
        DelayOption::OneWeek,
        DelayOption::TwoWeeks,
    ];

    pub fn days(self) -> u32 {
        match self {
            DelayOption::Tomorrow => 1,
            DelayOption::TwoDays => 2,
            DelayOption::OneWeek => 7,
            DelayOption::TwoWeeks => 14,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DelayOption::Tomorrow => "Tomorrow",
            DelayOption::TwoDays => "2 Days",
            DelayOption::OneWeek => "1 Week",
            DelayOption::TwoWeeks => "2 Weeks",
        }
    }
}

impl TryFrom<u32> for DelayOption {
    type Error = SyncError;

    fn try_from(days: u32) -> Result<Self, Self::Error> {
        DelayOption::ALL
            .into_iter()
            .find(|option| option.days() == days)
            .ok_or(SyncError::InvalidDelay(days))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: TaskDate,
    pub status: TaskStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_known_date"
    )]
    pub completed_date: Option<TaskDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
}

impl Task {
    /// Returns a copy with every field present in `update` replaced.
    pub fn merged(&self, update: &TaskUpdate) -> Task {
        let mut task = self.clone();
        if let Some(title) = &update.title {
            task.title = title.clone();
        }
        if let Some(description) = &update.description {
            task.description = description.clone();
        }
        if let Some(due_date) = update.due_date {
            task.due_date = due_date;
        }
        if let Some(status) = update.status {
            task.status = status;
        }
        if let Some(completed_date) = update.completed_date {
            task.completed_date = Some(completed_date);
        }
        if let Some(priority) = update.priority {
            task.priority = priority;
        }
        if let Some(images) = &update.images {
            task.images = images.clone();
        }
        if let Some(assignee_id) = &update.assignee_id {
            task.assignee_id = assignee_id.clone();
        }
        task
    }

    pub fn assignee<'a>(&self, employees: &'a [Employee]) -> Option<&'a Employee> {
        let assignee_id = self.assignee_id.as_deref()?;
        employees.iter().find(|employee| employee.id == assignee_id)
    }
}

/// A task that has not been created remotely yet, so it has no id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: TaskDate,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_known_date"
    )]
    pub completed_date: Option<TaskDate>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub assignee_id: Option<String>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>, due_date: TaskDate) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date,
            status: TaskStatus::ToDo,
            completed_date: None,
            priority: Priority::Medium,
            images: Vec::new(),
            assignee_id: None,
        }
    }

    pub fn into_task(self, id: impl Into<String>) -> Task {
        Task {
            id: id.into(),
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status: self.status,
            completed_date: self.completed_date,
            priority: self.priority,
            images: self.images,
            assignee_id: self.assignee_id,
        }
    }
}

/// Partial field set merged over an existing task by an update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<TaskDate>,
    pub status: Option<TaskStatus>,
    pub completed_date: Option<TaskDate>,
    pub priority: Option<Priority>,
    pub images: Option<Vec<String>>,
    /// `Some(None)` clears the assignee.
    pub assignee_id: Option<Option<String>>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    /// Rejects dates that could not be sent to the remote table.
    pub fn validate(&self) -> SyncResult<()> {
        if self.due_date == Some(TaskDate::Invalid) {
            return Err(SyncError::InvalidDate("due date".to_string()));
        }
        if self.completed_date == Some(TaskDate::Invalid) {
            return Err(SyncError::InvalidDate("completed date".to_string()));
        }
        Ok(())
    }
}
