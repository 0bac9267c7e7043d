//! Conversion between remote records and local tasks.
//!
//! Both directions are pure. Reading is lenient: a record with missing or
//! malformed cells still produces a task, with the due date falling back to
//! the invalid sentinel, an unreadable completion date to absent and the
//! status to `To do`.

use crate::models::{Priority, Task, TaskDate, TaskDraft, TaskStatus};
use crate::protocol::{Attachment, RemoteFields, RemoteRecord};

const REMOTE_DATE_FORMAT: &str = "%Y-%m-%d";

pub fn from_remote_record(record: &RemoteRecord) -> Task {
    let fields = &record.fields;

    let status = match fields.status.as_deref() {
        Some(raw) => TaskStatus::parse(raw).unwrap_or_else(|e| {
            tracing::warn!("MAPPER: record {} has {}, using default", record.id, e);
            TaskStatus::default()
        }),
        None => TaskStatus::default(),
    };

    Task {
        id: record.id.clone(),
        title: fields.title.clone().unwrap_or_default(),
        description: fields.notes.clone().unwrap_or_default(),
        due_date: fields
            .due_date
            .as_deref()
            .map(TaskDate::parse)
            .unwrap_or(TaskDate::Invalid),
        status,
        // An unreadable completion cell counts as absent, since it could
        // not be written back.
        completed_date: fields
            .completed_date
            .as_deref()
            .map(TaskDate::parse)
            .filter(TaskDate::is_valid),
        priority: Priority::Medium,
        images: fields
            .photos
            .iter()
            .flatten()
            .map(|photo| photo.url.clone())
            .collect(),
        // The table has no assignee column.
        assignee_id: None,
    }
}

pub fn to_remote_fields(task: &Task) -> RemoteFields {
    build_fields(
        &task.title,
        &task.description,
        task.status,
        task.due_date,
        task.completed_date,
        &task.images,
    )
}

pub fn draft_to_remote_fields(draft: &TaskDraft) -> RemoteFields {
    build_fields(
        &draft.title,
        &draft.description,
        draft.status,
        draft.due_date,
        draft.completed_date,
        &draft.images,
    )
}

fn build_fields(
    title: &str,
    description: &str,
    status: TaskStatus,
    due_date: TaskDate,
    completed_date: Option<TaskDate>,
    images: &[String],
) -> RemoteFields {
    RemoteFields {
        title: Some(title.to_string()),
        notes: Some(description.to_string()),
        status: Some(status.to_string()),
        due_date: remote_date(due_date),
        completed_date: completed_date.and_then(remote_date),
        photos: Some(images.iter().map(Attachment::from_url).collect()),
    }
}

/// Calendar-date text for a date cell. Invalid dates are left out of the
/// payload so the remote cell keeps its value.
fn remote_date(date: TaskDate) -> Option<String> {
    date.as_datetime()
        .map(|dt| dt.format(REMOTE_DATE_FORMAT).to_string())
}
