use crate::config::DEFAULT_PAGE_SIZE;
use crate::connectivity::Connectivity;
use crate::errors::ClientError;
use crate::persistence::TaskPersistence;
use crate::remote::{PageQuery, RemoteTable};
use crate::store::TaskStore;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tasksync_core::{from_remote_record, Task};
use tokio::sync::Mutex;

/// The service refuses page sizes above this.
const MAX_PAGE_SIZE: usize = 100;

/// Result of one page request.
///
/// A page that comes back exactly full is assumed to have a successor; the
/// service gives no other end-of-data signal the fetcher relies on, so a
/// table whose size is a multiple of the page size costs one extra empty
/// request at the end.
#[derive(Debug)]
pub enum PageOutcome {
    /// A full page. `next_cursor` is the id of its last record.
    Page { tasks: Vec<Task>, next_cursor: String },
    /// The final page, possibly empty.
    Exhausted { tasks: Vec<Task> },
    /// The request failed. Nothing was read.
    Failed { error: ClientError },
}

impl PageOutcome {
    pub fn tasks(&self) -> &[Task] {
        match self {
            PageOutcome::Page { tasks, .. } | PageOutcome::Exhausted { tasks } => tasks,
            PageOutcome::Failed { .. } => &[],
        }
    }

    pub fn into_tasks(self) -> Vec<Task> {
        match self {
            PageOutcome::Page { tasks, .. } | PageOutcome::Exhausted { tasks } => tasks,
            PageOutcome::Failed { .. } => Vec::new(),
        }
    }

    pub fn next_cursor(&self) -> Option<&str> {
        match self {
            PageOutcome::Page { next_cursor, .. } => Some(next_cursor),
            _ => None,
        }
    }

    pub fn has_more(&self) -> bool {
        matches!(self, PageOutcome::Page { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PageOutcome::Failed { .. })
    }
}

/// Reads the remote task table one page at a time, ordered by due date.
pub struct PaginatedFetcher<R: RemoteTable> {
    remote: Arc<R>,
    page_size: usize,
}

impl<R: RemoteTable> PaginatedFetcher<R> {
    pub fn new(remote: Arc<R>) -> Self {
        Self {
            remote,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Never returns an error: failures are logged and reported as
    /// [`PageOutcome::Failed`] so a loading loop always terminates.
    pub async fn load_page(&self, cursor: Option<&str>) -> PageOutcome {
        let query = PageQuery::by_due_date(self.page_size, cursor);

        let records = match self.remote.select_page(&query).await {
            Ok(records) => records,
            Err(error) => {
                tracing::error!("FETCHER: failed to load tasks (cursor {:?}): {}", cursor, error);
                return PageOutcome::Failed { error };
            }
        };

        let tasks: Vec<Task> = records.iter().map(from_remote_record).collect();
        tracing::info!(
            "FETCHER: loaded {} tasks (cursor {:?}, page size {})",
            tasks.len(),
            cursor,
            self.page_size
        );

        match tasks.last() {
            Some(last) if tasks.len() == self.page_size => {
                let next_cursor = last.id.clone();
                PageOutcome::Page { tasks, next_cursor }
            }
            _ => PageOutcome::Exhausted { tasks },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    Busy,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    Loaded { count: usize, has_more: bool },
    Skipped(SkipReason),
    Failed,
}

#[derive(Debug)]
struct LoaderState {
    cursor: Option<String>,
    has_more: bool,
}

impl Default for LoaderState {
    fn default() -> Self {
        Self {
            cursor: None,
            has_more: true,
        }
    }
}

/// Clears the busy flag however `load_next` exits.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives pagination into a [`TaskStore`]: the first page replaces the
/// cache, later pages are appended. Only one page request is in flight at
/// a time, and loading stops for good after the last page or a failure
/// until [`PageLoader::reset`] is called.
pub struct PageLoader<R: RemoteTable> {
    fetcher: PaginatedFetcher<R>,
    connectivity: Connectivity,
    state: Mutex<LoaderState>,
    is_loading: AtomicBool,
}

impl<R: RemoteTable> PageLoader<R> {
    pub fn new(fetcher: PaginatedFetcher<R>, connectivity: Connectivity) -> Self {
        Self {
            fetcher,
            connectivity,
            state: Mutex::new(LoaderState::default()),
            is_loading: AtomicBool::new(false),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::Acquire)
    }

    pub async fn has_more(&self) -> bool {
        self.state.lock().await.has_more
    }

    /// Start again from the first page on the next load.
    pub async fn reset(&self) {
        *self.state.lock().await = LoaderState::default();
    }

    pub async fn load_next<P: TaskPersistence>(&self, store: &TaskStore<R, P>) -> LoadStatus {
        if !self.connectivity.is_online() {
            return LoadStatus::Skipped(SkipReason::Offline);
        }
        if self.is_loading.swap(true, Ordering::AcqRel) {
            return LoadStatus::Skipped(SkipReason::Busy);
        }
        let _busy = BusyGuard(&self.is_loading);

        let cursor = {
            let state = self.state.lock().await;
            if !state.has_more {
                return LoadStatus::Skipped(SkipReason::Exhausted);
            }
            state.cursor.clone()
        };

        let outcome = self.fetcher.load_page(cursor.as_deref()).await;

        if let PageOutcome::Failed { error } = &outcome {
            self.state.lock().await.has_more = false;
            store.events().emit_page_failed(&error.to_string());
            return LoadStatus::Failed;
        }

        let has_more = outcome.has_more();
        let next_cursor = outcome.next_cursor().map(str::to_string);
        let tasks = outcome.into_tasks();
        let count = tasks.len();

        if cursor.is_some() {
            store.append(tasks).await;
        } else {
            store.replace_all(tasks).await;
        }

        {
            let mut state = self.state.lock().await;
            state.cursor = next_cursor;
            state.has_more = has_more;
        }

        store.events().emit_page_loaded(count, has_more);
        LoadStatus::Loaded { count, has_more }
    }

    /// Loads pages until the loader stops. Returns the number of tasks
    /// applied to the store.
    pub async fn load_all<P: TaskPersistence>(&self, store: &TaskStore<R, P>) -> usize {
        let mut total = 0;
        loop {
            match self.load_next(store).await {
                LoadStatus::Loaded { count, has_more } => {
                    total += count;
                    if !has_more {
                        break;
                    }
                }
                LoadStatus::Skipped(_) | LoadStatus::Failed => break,
            }
        }
        total
    }
}
