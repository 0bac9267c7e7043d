use crate::errors::{ClientError, ClientResult};
use crate::events::EventDispatcher;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Shared online/offline flag. The host flips it from its network signal;
/// the page loader and the store read it before touching the remote table.
#[derive(Clone)]
pub struct Connectivity {
    is_online: Arc<AtomicBool>,
    event_dispatcher: Option<Arc<EventDispatcher>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        Self {
            is_online: Arc::new(AtomicBool::new(online)),
            event_dispatcher: None,
        }
    }

    pub fn with_events(mut self, event_dispatcher: Arc<EventDispatcher>) -> Self {
        self.event_dispatcher = Some(event_dispatcher);
        self
    }

    pub fn is_online(&self) -> bool {
        self.is_online.load(Ordering::Relaxed)
    }

    /// Returns true when the flag actually changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.is_online.swap(online, Ordering::Relaxed);
        if previous == online {
            return false;
        }

        if online {
            tracing::info!("CONNECTIVITY: back online");
        } else {
            tracing::warn!("CONNECTIVITY: offline, remote operations disabled");
        }
        if let Some(dispatcher) = &self.event_dispatcher {
            if online {
                dispatcher.emit_connection_restored();
            } else {
                dispatcher.emit_connection_lost();
            }
        }
        true
    }

    pub fn ensure_online(&self) -> ClientResult<()> {
        if self.is_online() {
            Ok(())
        } else {
            Err(ClientError::Offline)
        }
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}
