use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tasksync_client::{
    ClientError, ClientResult, Connectivity, EventDispatcher, MemoryPersistence, PageQuery,
    RemoteTable, SyncEvent, TaskStore,
};
use tasksync_core::{RemoteFields, RemoteRecord, TaskDate, TaskStatus};

#[derive(Default)]
struct FakeState {
    records: Vec<RemoteRecord>,
    next_id: usize,
    fail_reads: bool,
    fail_writes: bool,
    queries: Vec<PageQuery>,
    writes: Vec<(Option<String>, RemoteFields)>,
}

/// In-process stand-in for the remote table with failure injection.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct FakeTable {
    state: Arc<Mutex<FakeState>>,
}

#[allow(dead_code)]
impl FakeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding `count` records due on consecutive days of 2024.
    pub fn with_records(count: usize) -> Self {
        let table = Self::new();
        for i in 0..count {
            table.insert(make_record(
                &format!("rec{:03}", i + 1),
                &format!("Task {}", i + 1),
                &format!("2024-01-{:02}", (i % 28) + 1),
            ));
        }
        table
    }

    pub fn insert(&self, record: RemoteRecord) {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.records.push(record);
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn queries(&self) -> Vec<PageQuery> {
        self.state.lock().unwrap().queries.clone()
    }

    /// Every create (`None`) and update (`Some(id)`) payload received.
    pub fn writes(&self) -> Vec<(Option<String>, RemoteFields)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.state
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }
}

fn unavailable() -> ClientError {
    ClientError::Remote {
        status: 503,
        message: "SERVICE_UNAVAILABLE".to_string(),
    }
}

#[async_trait]
impl RemoteTable for FakeTable {
    async fn select_page(&self, query: &PageQuery) -> ClientResult<Vec<RemoteRecord>> {
        // Suspend once like a real request would, so overlapping loads can be observed.
        tokio::task::yield_now().await;

        let mut state = self.state.lock().unwrap();
        state.queries.push(query.clone());
        if state.fail_reads {
            return Err(unavailable());
        }

        let start = match &query.offset {
            Some(offset) => state
                .records
                .iter()
                .position(|record| &record.id == offset)
                .map(|index| index + 1)
                .unwrap_or(state.records.len()),
            None => 0,
        };
        Ok(state
            .records
            .iter()
            .skip(start)
            .take(query.page_size)
            .cloned()
            .collect())
    }

    async fn create_record(&self, fields: RemoteFields) -> ClientResult<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(unavailable());
        }
        state.writes.push((None, fields.clone()));
        state.next_id += 1;
        let record = RemoteRecord {
            id: format!("rec{:03}", state.next_id),
            created_time: None,
            fields,
        };
        state.records.push(record.clone());
        Ok(record)
    }

    async fn update_record(
        &self,
        record_id: &str,
        fields: RemoteFields,
    ) -> ClientResult<RemoteRecord> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(unavailable());
        }
        state.writes.push((Some(record_id.to_string()), fields.clone()));
        let record = state
            .records
            .iter_mut()
            .find(|record| record.id == record_id)
            .ok_or_else(|| ClientError::Remote {
                status: 404,
                message: "NOT_FOUND".to_string(),
            })?;
        record.fields = fields;
        Ok(record.clone())
    }
}

#[allow(dead_code)]
pub fn make_record(id: &str, title: &str, due: &str) -> RemoteRecord {
    RemoteRecord {
        id: id.to_string(),
        created_time: None,
        fields: RemoteFields {
            title: Some(title.to_string()),
            status: Some(TaskStatus::ToDo.to_string()),
            due_date: Some(due.to_string()),
            ..Default::default()
        },
    }
}

/// Collects every event the dispatcher delivers.
#[allow(dead_code)]
pub fn record_events(dispatcher: &EventDispatcher) -> Arc<Mutex<Vec<SyncEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    dispatcher
        .register_rust_callback(move |event| {
            seen_clone.lock().unwrap().push(event);
        })
        .unwrap();
    seen
}

#[allow(dead_code)]
pub struct Harness {
    pub table: FakeTable,
    pub store: TaskStore<FakeTable, MemoryPersistence>,
    pub events: Arc<EventDispatcher>,
    pub connectivity: Connectivity,
    pub seen: Arc<Mutex<Vec<SyncEvent>>>,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new(table: FakeTable) -> Self {
        Self::with_persistence(table, MemoryPersistence::new()).await
    }

    pub async fn with_persistence(table: FakeTable, persistence: MemoryPersistence) -> Self {
        let events = Arc::new(EventDispatcher::new());
        let seen = record_events(&events);
        let connectivity = Connectivity::new(true).with_events(events.clone());
        let store = TaskStore::open(
            Arc::new(table.clone()),
            persistence,
            connectivity.clone(),
            events.clone(),
        )
        .await
        .unwrap();

        Self {
            table,
            store,
            events,
            connectivity,
            seen,
        }
    }

    /// Delivers queued events and returns everything seen so far.
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.process_events().unwrap();
        self.seen.lock().unwrap().clone()
    }

    /// Loads the fake table's records straight into the cache.
    pub async fn seed_from_table(&self) {
        let query = PageQuery::by_due_date(100, None);
        let records = self.table.select_page(&query).await.unwrap();
        let tasks = records.iter().map(tasksync_core::from_remote_record).collect();
        self.store.replace_all(tasks).await;
    }
}

#[allow(dead_code)]
pub fn due(year: i32, month: u32, day: u32) -> TaskDate {
    TaskDate::from_ymd(year, month, day)
}
