use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::EventError;

/// Security events emitted by the [`LockoutService`](crate::LockoutService)
///
/// Events are only emitted after the evaluated state has been saved. The
/// `key` is the record key for key-addressed operations and `None` for
/// snapshot operations on host entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    /// A failed attempt was counted.
    AttemptRecorded {
        key: Option<String>,
        attempts: u32,
        /// Whether the entity is locked after this attempt
        is_locked: bool,
        timestamp: DateTime<Utc>,
    },

    /// The attempt count reached the threshold and a lock was imposed.
    ///
    /// This is a security-critical event that should trigger alerts.
    AccountLocked {
        key: Option<String>,
        attempts: u32,
        locked_until: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// A stale lock was cleared and counting restarted.
    LockRestarted {
        key: Option<String>,
        /// When the cleared lock had expired
        expired_at: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },

    /// Attempts and lock were cleared, e.g. after a successful login.
    AttemptsReset {
        key: String,
        was_locked: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A trait for handling events emitted by the event bus
///
/// # Examples
///
/// ```
/// # use lockout_core::{error::EventError, events::{Event, EventHandler}};
/// # use async_trait::async_trait;
/// struct AuditLog;
///
/// #[async_trait]
/// impl EventHandler for AuditLog {
///     async fn handle_event(&self, event: &Event) -> Result<(), EventError> {
///         println!("{event:?}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    async fn handle_event(&self, event: &Event) -> Result<(), EventError>;
}

/// Event bus that fans events out to registered handlers in registration order
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus").finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register an event handler with the event bus
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().await.push(handler);
    }

    /// Emit an event to all registered handlers
    ///
    /// Stops at the first handler error and returns it.
    pub async fn emit(&self, event: &Event) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.handle_event(event).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct TestEventHandler {
        called: Arc<AtomicBool>,
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventHandler for TestEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            self.called.store(true, Ordering::SeqCst);
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringEventHandler;

    #[async_trait]
    impl EventHandler for ErroringEventHandler {
        async fn handle_event(&self, _event: &Event) -> Result<(), EventError> {
            Err(EventError::HandlerError("Test error".into()))
        }
    }

    fn locked_event() -> Event {
        Event::AccountLocked {
            key: Some("test@example.com".to_string()),
            attempts: 3,
            locked_until: Utc::now(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        event_bus
            .emit(&locked_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let called1 = Arc::new(AtomicBool::new(false));
        let count1 = Arc::new(AtomicUsize::new(0));
        let called2 = Arc::new(AtomicBool::new(false));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(TestEventHandler {
                called: called1.clone(),
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(TestEventHandler {
                called: called2.clone(),
                call_count: count2.clone(),
            }))
            .await;

        event_bus
            .emit(&locked_event())
            .await
            .expect("Failed to emit event");

        assert!(called1.load(Ordering::SeqCst), "First handler was not called");
        assert!(called2.load(Ordering::SeqCst), "Second handler was not called");
        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        event_bus.register(Arc::new(ErroringEventHandler)).await;

        let result = event_bus.emit(&locked_event()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
    }

    #[test]
    fn test_event_serializes() {
        let event = Event::AttemptsReset {
            key: "test@example.com".to_string(),
            was_locked: true,
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["AttemptsReset"]["key"], "test@example.com");
        assert_eq!(json["AttemptsReset"]["was_locked"], true);
    }
}
