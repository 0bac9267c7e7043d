pub mod config;
pub mod connectivity;
pub mod errors;
pub mod events;
pub mod fetcher;
pub mod persistence;
pub mod queries;
pub mod remote;
pub mod store;

pub use config::Settings;
pub use connectivity::Connectivity;
pub use errors::{ClientError, ClientResult};
pub use events::{EventDispatcher, EventType, SyncEvent};
pub use fetcher::{LoadStatus, PageLoader, PageOutcome, PaginatedFetcher, SkipReason};
pub use persistence::{MemoryPersistence, SqlitePersistence, TaskPersistence};
pub use remote::{AirtableClient, PageQuery, RemoteTable};
pub use store::TaskStore;
