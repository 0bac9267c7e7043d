//! Durable copy of the task cache between sessions.
//!
//! The cache is written as one JSON snapshot under a single key. Dates are
//! stored as RFC 3339 text and parsed back into [`TaskDate`] values on load,
//! before any caller sees the tasks.
//!
//! [`TaskDate`]: tasksync_core::TaskDate

use crate::errors::{ClientError, ClientResult};
use crate::queries::Queries;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use tasksync_core::{SyncError, Task};
use tokio::sync::Mutex;

/// Key the task snapshot is stored under.
pub const STORAGE_KEY: &str = "task-storage";

const SNAPSHOT_VERSION: u32 = 0;

#[async_trait]
pub trait TaskPersistence: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self) -> ClientResult<Option<Vec<Task>>>;

    async fn save(&self, tasks: &[Task]) -> ClientResult<()>;
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    state: SnapshotStateRef<'a>,
    version: u32,
}

#[derive(Serialize)]
struct SnapshotStateRef<'a> {
    tasks: &'a [Task],
}

#[derive(Deserialize)]
struct Snapshot {
    state: SnapshotState,
    #[serde(default)]
    version: u32,
}

#[derive(Deserialize)]
struct SnapshotState {
    #[serde(default)]
    tasks: Vec<Task>,
}

pub fn encode_snapshot(tasks: &[Task]) -> ClientResult<String> {
    let snapshot = SnapshotRef {
        state: SnapshotStateRef { tasks },
        version: SNAPSHOT_VERSION,
    };
    Ok(serde_json::to_string(&snapshot)?)
}

pub fn decode_snapshot(text: &str) -> ClientResult<Vec<Task>> {
    let snapshot: Snapshot = serde_json::from_str(text)?;
    if snapshot.version > SNAPSHOT_VERSION {
        return Err(SyncError::Serialization(format!(
            "unsupported snapshot version {}",
            snapshot.version
        ))
        .into());
    }
    Ok(snapshot.state.tasks)
}

/// Snapshot store backed by a SQLite database.
pub struct SqlitePersistence {
    pub pool: SqlitePool,
    key: String,
}

impl SqlitePersistence {
    /// Opens (creating if the URL allows it) the database and applies
    /// migrations.
    pub async fn new(database_url: &str) -> ClientResult<Self> {
        // One connection: an in-memory database is private to its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;

        let persistence = Self {
            pool,
            key: STORAGE_KEY.to_string(),
        };
        persistence.run_migrations().await?;
        Ok(persistence)
    }

    pub async fn run_migrations(&self) -> ClientResult<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Drops the saved snapshot; the next load reports a first run.
    pub async fn clear(&self) -> ClientResult<()> {
        sqlx::query(Queries::DELETE_VALUE)
            .bind(&self.key)
            .execute(&self.pool)
            .await?;
        tracing::info!("DATABASE: cleared {}", self.key);
        Ok(())
    }
}

#[async_trait]
impl TaskPersistence for SqlitePersistence {
    async fn load(&self) -> ClientResult<Option<Vec<Task>>> {
        let row = sqlx::query(Queries::GET_VALUE)
            .bind(&self.key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            tracing::info!("DATABASE: no saved {}, starting empty", self.key);
            return Ok(None);
        };

        let text: String = row.try_get("value")?;
        let tasks = decode_snapshot(&text)?;
        tracing::info!("DATABASE: loaded {} tasks", tasks.len());
        Ok(Some(tasks))
    }

    async fn save(&self, tasks: &[Task]) -> ClientResult<()> {
        let text = encode_snapshot(tasks)?;

        sqlx::query(Queries::UPSERT_VALUE)
            .bind(&self.key)
            .bind(text)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;

        tracing::debug!("DATABASE: saved {} tasks", tasks.len());
        Ok(())
    }
}

/// Keeps the encoded snapshot in memory. Encoding and decoding still run,
/// so it behaves like the SQLite store minus the file.
#[derive(Default)]
pub struct MemoryPersistence {
    snapshot: Mutex<Option<String>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(text: impl Into<String>) -> Self {
        Self {
            snapshot: Mutex::new(Some(text.into())),
        }
    }

    /// The last saved snapshot text, if any.
    pub async fn snapshot(&self) -> Option<String> {
        self.snapshot.lock().await.clone()
    }
}

#[async_trait]
impl TaskPersistence for MemoryPersistence {
    async fn load(&self) -> ClientResult<Option<Vec<Task>>> {
        match self.snapshot.lock().await.as_deref() {
            Some(text) => decode_snapshot(text).map(Some),
            None => Ok(None),
        }
    }

    async fn save(&self, tasks: &[Task]) -> ClientResult<()> {
        *self.snapshot.lock().await = Some(encode_snapshot(tasks)?);
        Ok(())
    }
}

/// Whether a load error means the stored snapshot is unreadable, as opposed
/// to the store itself being unavailable.
pub(crate) fn is_corrupt_snapshot(error: &ClientError) -> bool {
    matches!(
        error,
        ClientError::Serialization(_) | ClientError::Sync(SyncError::Serialization(_))
    )
}
