//! Tasksync - a task list mirrored from an Airtable table
//!
//! This crate provides a unified API over the task store and its remote.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tasksync::{AirtableClient, Connectivity, EventDispatcher, Settings, SqlitePersistence, TaskStore};
//!
//! let settings = Settings::from_env();
//! let events = Arc::new(EventDispatcher::new());
//! let persistence = SqlitePersistence::new(&settings.database_url).await?;
//! let store = TaskStore::open(
//!     Arc::new(AirtableClient::new(settings)),
//!     persistence,
//!     Connectivity::default(),
//!     events,
//! )
//! .await?;
//! store.delay("recXYZ", DelayOption::OneWeek).await?;
//! ```

// Re-export client types
pub use tasksync_client::{
    AirtableClient, ClientError, ClientResult, Connectivity, EventDispatcher, EventType,
    LoadStatus, MemoryPersistence, PageLoader, PageOutcome, PageQuery, PaginatedFetcher,
    RemoteTable, Settings, SkipReason, SqlitePersistence, SyncEvent, TaskPersistence, TaskStore,
};

// Re-export core types that applications work with
pub use tasksync_core::errors::SyncError;
pub use tasksync_core::models::{
    DelayOption, Employee, Priority, Task, TaskDate, TaskDraft, TaskStatus, TaskUpdate,
};
pub use tasksync_core::SyncResult;
