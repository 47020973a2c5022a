use core::fmt;
use std::{
    collections::{BTreeMap, VecDeque},
    sync::atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

const DEFAULT_MAX_SETTLED: usize = 20;
const DEFAULT_MAX_TRANSIENT: usize = 20;

static ATTEMPT_INDEX: AtomicU64 = AtomicU64::new(0);

/// Ties together every notification of one submission attempt
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Allocates a fresh identifier. Never returns the same value twice.
    pub fn generate() -> Self {
        let index = ATTEMPT_INDEX.fetch_add(1, Ordering::Relaxed);
        Self(format!("submission_{index}-{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: CorrelationId,
    pub kind: NotificationKind,
    pub message: String,
}

/// A one-off message not tied to any submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransientMessage {
    pub kind: NotificationKind,
    pub message: String,
}

/// Sink for user-facing progress notifications, keyed by correlation id
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Opens a long-lived loading notification
    async fn open(&self, id: &CorrelationId, message: String);

    async fn update(&self, id: &CorrelationId, kind: NotificationKind, message: String);

    async fn dismiss(&self, id: &CorrelationId);

    /// Shows an uncorrelated message
    async fn show(&self, kind: NotificationKind, message: String);
}

/// Notification activity as seen by listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NotificationEvent {
    Opened { notification: Notification },
    Updated { notification: Notification },
    Dismissed { id: CorrelationId },
    Shown { message: TransientMessage },
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::Opened { notification } => {
                write!(f, "Opened {}: {}", notification.id, notification.message)
            }
            NotificationEvent::Updated { notification } => write!(
                f,
                "Updated {} ({:?}): {}",
                notification.id, notification.kind, notification.message
            ),
            NotificationEvent::Dismissed { id } => write!(f, "Dismissed {id}"),
            NotificationEvent::Shown { message } => {
                write!(f, "Shown ({:?}): {}", message.kind, message.message)
            }
        }
    }
}

/// Trait for notification listeners
#[async_trait::async_trait]
pub trait NotificationListener: Send + Sync {
    async fn on_notification(&self, event: NotificationEvent);
}

/// In-memory notification sink that keeps track of what is currently shown
/// and forwards every change to registered listeners.
///
/// Loading notifications stay until they settle. Settled notifications and
/// transient messages are bounded; the oldest ones are dropped first.
pub struct NotificationCenter {
    listener_index: AtomicU64,
    listeners: RwLock<BTreeMap<String, Box<dyn NotificationListener>>>,
    notifications: RwLock<BTreeMap<CorrelationId, Notification>>,
    settled: Mutex<VecDeque<CorrelationId>>,
    transient: Mutex<VecDeque<TransientMessage>>,
    max_settled: usize,
    max_transient: usize,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_MAX_SETTLED, DEFAULT_MAX_TRANSIENT)
    }

    /// Creates a center keeping at most `max_settled` settled notifications
    /// and `max_transient` transient messages
    pub fn with_limits(max_settled: usize, max_transient: usize) -> Self {
        Self {
            listener_index: AtomicU64::new(0),
            listeners: RwLock::new(BTreeMap::new()),
            notifications: RwLock::new(BTreeMap::new()),
            settled: Mutex::new(VecDeque::new()),
            transient: Mutex::new(VecDeque::new()),
            max_settled,
            max_transient,
        }
    }

    /// Add a listener to receive notification events
    ///
    /// # Returns
    ///
    /// A unique identifier for the listener, which can be used to remove it later
    pub async fn add_listener(&self, listener: Box<dyn NotificationListener>) -> String {
        let index = self.listener_index.fetch_add(1, Ordering::Relaxed);
        let id = format!("listener_{}-{}", index, Uuid::new_v4());
        let mut listeners = self.listeners.write().await;
        listeners.insert(id.clone(), listener);
        id
    }

    /// Remove a listener by its ID, returning `true` if it was registered
    pub async fn remove_listener(&self, id: &str) -> bool {
        let mut listeners = self.listeners.write().await;
        listeners.remove(id).is_some()
    }

    /// Notifications currently on screen, in id order
    pub async fn notifications(&self) -> Vec<Notification> {
        self.notifications.read().await.values().cloned().collect()
    }

    pub async fn get(&self, id: &CorrelationId) -> Option<Notification> {
        self.notifications.read().await.get(id).cloned()
    }

    /// Loading notifications that have not settled yet
    pub async fn pending(&self) -> Vec<Notification> {
        self.notifications
            .read()
            .await
            .values()
            .filter(|n| n.kind == NotificationKind::Loading)
            .cloned()
            .collect()
    }

    pub async fn transient_messages(&self) -> Vec<TransientMessage> {
        self.transient.lock().await.iter().cloned().collect()
    }

    /// Tracks a settled notification, returning the ids evicted to stay
    /// within the limit
    async fn settle(&self, id: &CorrelationId) -> Vec<CorrelationId> {
        let mut settled = self.settled.lock().await;
        if !settled.contains(id) {
            settled.push_back(id.clone());
        }
        let excess = settled.len().saturating_sub(self.max_settled);
        settled.drain(..excess).collect()
    }

    async fn emit(&self, event: NotificationEvent) {
        let listeners = self.listeners.read().await;
        for listener in listeners.values() {
            listener.on_notification(event.clone()).await;
        }
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NotificationSink for NotificationCenter {
    async fn open(&self, id: &CorrelationId, message: String) {
        let notification = Notification {
            id: id.clone(),
            kind: NotificationKind::Loading,
            message,
        };
        self.notifications
            .write()
            .await
            .insert(id.clone(), notification.clone());
        self.emit(NotificationEvent::Opened { notification }).await;
    }

    async fn update(&self, id: &CorrelationId, kind: NotificationKind, message: String) {
        let notification = Notification {
            id: id.clone(),
            kind,
            message,
        };
        self.notifications
            .write()
            .await
            .insert(id.clone(), notification.clone());
        self.emit(NotificationEvent::Updated { notification }).await;

        if kind != NotificationKind::Loading {
            for evicted in self.settle(id).await {
                self.dismiss(&evicted).await;
            }
        }
    }

    async fn dismiss(&self, id: &CorrelationId) {
        self.settled.lock().await.retain(|settled| settled != id);
        let removed = self.notifications.write().await.remove(id);
        if removed.is_some() {
            self.emit(NotificationEvent::Dismissed { id: id.clone() })
                .await;
        }
    }

    async fn show(&self, kind: NotificationKind, message: String) {
        let message = TransientMessage { kind, message };
        {
            let mut transient = self.transient.lock().await;
            transient.push_back(message.clone());
            while transient.len() > self.max_transient {
                transient.pop_front();
            }
        }
        self.emit(NotificationEvent::Shown { message }).await;
    }
}
