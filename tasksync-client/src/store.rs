use crate::connectivity::Connectivity;
use crate::errors::{ClientError, ClientResult};
use crate::events::EventDispatcher;
use crate::persistence::{is_corrupt_snapshot, TaskPersistence};
use crate::remote::RemoteTable;
use std::sync::Arc;
use tasksync_core::{
    draft_to_remote_fields, to_remote_fields, DelayOption, SyncError, Task, TaskDate,
    TaskDraft, TaskStatus, TaskUpdate,
};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct StoreState {
    tasks: Vec<Task>,
    selected_task_id: Option<String>,
}

/// Authoritative cache of tasks mirrored from the remote table.
///
/// Every mutation sends the full task to the remote table first and only
/// touches the cache once the write is acknowledged; a failed write leaves
/// the cache as it was. Each committed change is saved through the
/// persistence collaborator. Operations on an id that is not cached are
/// no-ops returning `Ok(None)`.
///
/// The cache lock is never held across a remote call, so two writes to the
/// same task can be in flight together; whichever response lands last wins.
pub struct TaskStore<R: RemoteTable, P: TaskPersistence> {
    remote: Arc<R>,
    persistence: P,
    connectivity: Connectivity,
    event_dispatcher: Arc<EventDispatcher>,
    state: Mutex<StoreState>,
}

impl<R: RemoteTable, P: TaskPersistence> TaskStore<R, P> {
    /// Builds the store and hydrates it from persistence. A first run, or a
    /// snapshot that can no longer be read, starts with an empty cache.
    pub async fn open(
        remote: Arc<R>,
        persistence: P,
        connectivity: Connectivity,
        event_dispatcher: Arc<EventDispatcher>,
    ) -> ClientResult<Self> {
        let tasks = match persistence.load().await {
            Ok(Some(tasks)) => tasks,
            Ok(None) => Vec::new(),
            Err(e) if is_corrupt_snapshot(&e) => {
                tracing::warn!("STORE: discarding unreadable snapshot: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::info!("STORE: opened with {} cached tasks", tasks.len());

        Ok(Self {
            remote,
            persistence,
            connectivity,
            event_dispatcher,
            state: Mutex::new(StoreState {
                tasks,
                selected_task_id: None,
            }),
        })
    }

    pub fn events(&self) -> &Arc<EventDispatcher> {
        &self.event_dispatcher
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.tasks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.tasks.is_empty()
    }

    pub async fn task(&self, id: &str) -> Option<Task> {
        self.state
            .lock()
            .await
            .tasks
            .iter()
            .find(|task| task.id == id)
            .cloned()
    }

    /// Tasks that are not done, earliest due first. Tasks without a usable
    /// due date sort to the front.
    pub async fn pending_tasks(&self) -> Vec<Task> {
        let mut pending: Vec<Task> = self
            .state
            .lock()
            .await
            .tasks
            .iter()
            .filter(|task| !task.status.is_done())
            .cloned()
            .collect();
        pending.sort_by_key(|task| task.due_date.sort_key());
        pending
    }

    /// Replaces the whole cache, as after loading the first page.
    pub async fn replace_all(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock().await;
        state.tasks = tasks;
        tracing::info!("STORE: cache replaced with {} tasks", state.tasks.len());
        self.persist(&state.tasks).await;
    }

    /// Appends in arrival order. Ids already cached are not checked, so a
    /// page fetched twice shows up twice.
    pub async fn append(&self, tasks: Vec<Task>) {
        let mut state = self.state.lock().await;
        let added = tasks.len();
        state.tasks.extend(tasks);
        tracing::info!(
            "STORE: appended {} tasks ({} cached)",
            added,
            state.tasks.len()
        );
        self.persist(&state.tasks).await;
    }

    pub async fn select_task(&self, id: Option<&str>) {
        self.state.lock().await.selected_task_id = id.map(str::to_string);
    }

    pub async fn selected_task_id(&self) -> Option<String> {
        self.state.lock().await.selected_task_id.clone()
    }

    pub async fn selected_task(&self) -> Option<Task> {
        let state = self.state.lock().await;
        let id = state.selected_task_id.as_deref()?;
        state.tasks.iter().find(|task| task.id == id).cloned()
    }

    /// Creates the task remotely, then caches it under the id the remote
    /// table assigned.
    pub async fn create(&self, draft: TaskDraft) -> ClientResult<Task> {
        let result = self.create_remote(&draft).await;

        match result {
            Ok(id) => {
                let task = draft.into_task(id);
                {
                    let mut state = self.state.lock().await;
                    state.tasks.push(task.clone());
                    self.persist(&state.tasks).await;
                }
                tracing::info!("STORE: created task {}", task.id);
                self.event_dispatcher.emit_task_created(&task.id, &task.title);
                self.event_dispatcher.emit_success("Task created successfully");
                Ok(task)
            }
            Err(e) => {
                tracing::error!("STORE: failed to create task: {}", e);
                self.event_dispatcher.emit_failure("Failed to create task", &e);
                Err(e)
            }
        }
    }

    async fn create_remote(&self, draft: &TaskDraft) -> ClientResult<String> {
        self.connectivity.ensure_online()?;
        let record = self
            .remote
            .create_record(draft_to_remote_fields(draft))
            .await?;
        if record.id.is_empty() {
            return Err(ClientError::CreateRejected);
        }
        Ok(record.id)
    }

    /// Merges `update` over the cached task and writes the whole result. An
    /// update carrying an invalid date fails without a remote call.
    pub async fn update(&self, id: &str, update: TaskUpdate) -> ClientResult<Option<Task>> {
        self.mutate(
            id,
            |task| {
                update.validate()?;
                Ok(task.merged(&update))
            },
            |_| "Task updated successfully".to_string(),
            "Failed to update task",
        )
        .await
    }

    /// Sets the status, stamping the completion date when it becomes `Done`.
    /// Moving away from `Done` keeps the old completion date.
    pub async fn advance_status(
        &self,
        id: &str,
        status: TaskStatus,
    ) -> ClientResult<Option<Task>> {
        self.mutate(
            id,
            |task| {
                let mut updated = task.clone();
                updated.status = status;
                if status == TaskStatus::Done {
                    updated.completed_date = Some(TaskDate::now());
                }
                Ok(updated)
            },
            |task| format!("Task marked as {}", task.status),
            "Failed to update task status",
        )
        .await
    }

    /// Pushes the due date back, keeping its time of day. A task without a
    /// usable due date, or one pushed out of range, fails without a remote
    /// call.
    pub async fn delay(&self, id: &str, delay: DelayOption) -> ClientResult<Option<Task>> {
        let days = delay.days();
        self.mutate(
            id,
            |task| {
                let due_date = task.due_date.add_days(u64::from(days));
                if !due_date.is_valid() {
                    return Err(SyncError::InvalidDate(format!(
                        "{} + {} days",
                        task.due_date.to_portable_string(),
                        days
                    ))
                    .into());
                }
                let mut updated = task.clone();
                updated.due_date = due_date;
                Ok(updated)
            },
            |_| format!("Task delayed by {} day{}", days, if days > 1 { "s" } else { "" }),
            "Failed to delay task",
        )
        .await
    }

    async fn mutate<F, M>(
        &self,
        id: &str,
        change: F,
        success_message: M,
        failure_message: &str,
    ) -> ClientResult<Option<Task>>
    where
        F: FnOnce(&Task) -> ClientResult<Task>,
        M: FnOnce(&Task) -> String,
    {
        let Some(current) = self.task(id).await else {
            tracing::debug!("STORE: task {} not cached, nothing to do", id);
            return Ok(None);
        };
        let result = match change(&current) {
            Ok(updated) => self.push_update(&updated).await.map(|()| updated),
            Err(e) => Err(e),
        };

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                tracing::error!("STORE: write for {} failed: {}", id, e);
                self.event_dispatcher.emit_failure(failure_message, &e);
                return Err(e);
            }
        };

        self.commit(&updated).await;
        self.event_dispatcher
            .emit_task_updated(&updated.id, &updated.title);
        self.event_dispatcher.emit_success(success_message(&updated));
        Ok(Some(updated))
    }

    async fn push_update(&self, task: &Task) -> ClientResult<()> {
        self.connectivity.ensure_online()?;
        self.remote
            .update_record(&task.id, to_remote_fields(task))
            .await?;
        Ok(())
    }

    async fn commit(&self, updated: &Task) {
        let mut state = self.state.lock().await;
        let mut replaced = 0;
        for task in state.tasks.iter_mut().filter(|task| task.id == updated.id) {
            *task = updated.clone();
            replaced += 1;
        }
        if replaced == 0 {
            tracing::warn!(
                "STORE: task {} left the cache while its write was in flight",
                updated.id
            );
            return;
        }
        tracing::info!("STORE: committed task {}", updated.id);
        self.persist(&state.tasks).await;
    }

    /// A failed save does not undo a confirmed remote write; the next
    /// committed change writes the full snapshot again.
    async fn persist(&self, tasks: &[Task]) {
        if let Err(e) = self.persistence.save(tasks).await {
            tracing::warn!("STORE: failed to persist {} tasks: {}", tasks.len(), e);
        }
    }
}
