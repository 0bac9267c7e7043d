//! Notification system for the task store
//!
//! Store operations and the page loader report what happened through an
//! [`EventDispatcher`]. Emitting never blocks and never fails: events are
//! queued, and registered callbacks only run when the owner of the UI loop
//! calls [`EventDispatcher::process_events`].
//!
//! # Event Kinds
//!
//! - Task changes: `TaskCreated`, `TaskUpdated`
//! - Loading: `PageLoaded`, `PageFailed`
//! - User-facing notices: `OperationSucceeded`, `OperationFailed`
//! - Connectivity: `ConnectionLost`, `ConnectionRestored`

use crate::errors::{ClientError, ClientResult};
use std::sync::{mpsc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
    PageLoaded,
    PageFailed,
    OperationSucceeded,
    OperationFailed,
    ConnectionLost,
    ConnectionRestored,
}

/// Event enum with typed variants.
///
/// # Example
///
/// ```rust,no_run
/// use tasksync_client::events::{EventDispatcher, SyncEvent};
///
/// let dispatcher = EventDispatcher::new();
///
/// dispatcher.register_rust_callback(|event| {
///     match event {
///         SyncEvent::OperationSucceeded { message } => println!("✅ {}", message),
///         SyncEvent::OperationFailed { message, .. } => eprintln!("❌ {}", message),
///         _ => {}
///     }
/// }).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A task was created remotely and added to the cache
    TaskCreated { id: String, title: String },
    /// A cached task was replaced after a confirmed remote write
    TaskUpdated { id: String, title: String },
    /// A page of tasks was applied to the cache
    PageLoaded { count: usize, has_more: bool },
    /// A page request failed and loading stopped
    PageFailed { message: String },
    /// Short confirmation shown to the user
    OperationSucceeded { message: String },
    /// Short failure notice shown to the user, with the underlying error
    OperationFailed { message: String, error: String },
    ConnectionLost,
    ConnectionRestored,
}

impl SyncEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            SyncEvent::TaskCreated { .. } => EventType::TaskCreated,
            SyncEvent::TaskUpdated { .. } => EventType::TaskUpdated,
            SyncEvent::PageLoaded { .. } => EventType::PageLoaded,
            SyncEvent::PageFailed { .. } => EventType::PageFailed,
            SyncEvent::OperationSucceeded { .. } => EventType::OperationSucceeded,
            SyncEvent::OperationFailed { .. } => EventType::OperationFailed,
            SyncEvent::ConnectionLost => EventType::ConnectionLost,
            SyncEvent::ConnectionRestored => EventType::ConnectionRestored,
        }
    }
}

struct RustCallbackEntry {
    callback: Box<dyn Fn(SyncEvent) + Send>,
    event_filter: Option<EventType>,
}

pub struct EventDispatcher {
    rust_callbacks: Mutex<Vec<RustCallbackEntry>>,
    event_queue: Mutex<mpsc::Receiver<SyncEvent>>,
    event_sender: mpsc::Sender<SyncEvent>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            rust_callbacks: Mutex::new(Vec::new()),
            event_queue: Mutex::new(receiver),
            event_sender: sender,
        }
    }

    pub fn register_rust_callback<F>(&self, callback: F) -> ClientResult<()>
    where
        F: Fn(SyncEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), None)
    }

    /// Register a callback that only receives events of one type
    pub fn register_rust_callback_filtered<F>(
        &self,
        callback: F,
        event_filter: EventType,
    ) -> ClientResult<()>
    where
        F: Fn(SyncEvent) + Send + 'static,
    {
        self.push_callback(Box::new(callback), Some(event_filter))
    }

    fn push_callback(
        &self,
        callback: Box<dyn Fn(SyncEvent) + Send>,
        event_filter: Option<EventType>,
    ) -> ClientResult<()> {
        let mut callbacks = self
            .rust_callbacks
            .lock()
            .map_err(|_| ClientError::LockError("rust_callbacks".into()))?;

        callbacks.push(RustCallbackEntry {
            callback,
            event_filter,
        });

        Ok(())
    }

    pub fn emit_task_created(&self, id: &str, title: &str) {
        self.queue_event(SyncEvent::TaskCreated {
            id: id.to_string(),
            title: title.to_string(),
        });
    }

    pub fn emit_task_updated(&self, id: &str, title: &str) {
        self.queue_event(SyncEvent::TaskUpdated {
            id: id.to_string(),
            title: title.to_string(),
        });
    }

    pub fn emit_page_loaded(&self, count: usize, has_more: bool) {
        self.queue_event(SyncEvent::PageLoaded { count, has_more });
    }

    pub fn emit_page_failed(&self, message: &str) {
        self.queue_event(SyncEvent::PageFailed {
            message: message.to_string(),
        });
    }

    pub fn emit_success(&self, message: impl Into<String>) {
        self.queue_event(SyncEvent::OperationSucceeded {
            message: message.into(),
        });
    }

    pub fn emit_failure(&self, message: impl Into<String>, error: &ClientError) {
        self.queue_event(SyncEvent::OperationFailed {
            message: message.into(),
            error: error.to_string(),
        });
    }

    pub fn emit_connection_lost(&self) {
        self.queue_event(SyncEvent::ConnectionLost);
    }

    pub fn emit_connection_restored(&self) {
        self.queue_event(SyncEvent::ConnectionRestored);
    }

    fn queue_event(&self, event: SyncEvent) {
        if self.event_sender.send(event).is_err() {
            tracing::error!("Failed to queue event - receiver may have been dropped");
        }
    }

    /// Deliver all queued events to matching callbacks. Returns how many
    /// events were taken off the queue.
    pub fn process_events(&self) -> ClientResult<usize> {
        let queue = self
            .event_queue
            .lock()
            .map_err(|_| ClientError::LockError("event_queue".into()))?;
        let callbacks = self
            .rust_callbacks
            .lock()
            .map_err(|_| ClientError::LockError("rust_callbacks".into()))?;

        let mut processed_count = 0;
        while let Ok(event) = queue.try_recv() {
            let event_type = event.event_type();
            for entry in callbacks.iter() {
                if entry.event_filter.map_or(true, |filter| filter == event_type) {
                    (entry.callback)(event.clone());
                }
            }
            processed_count += 1;
        }

        Ok(processed_count)
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
