use crate::error::EventBusError;
use crate::status::{AlertEvent, MonitorState, MovementStatus, PositionStatus};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Events emitted by the monitoring core for the UI layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MonitorEvent {
    /// A safety alert was raised
    AlertRaised { alert: AlertEvent },
    /// Position or movement status changed
    StatusChanged {
        position: PositionStatus,
        movement: MovementStatus,
        timestamp: SystemTime,
    },
    /// Monitoring lifecycle state changed
    StateChanged {
        state: MonitorState,
        timestamp: SystemTime,
    },
    /// A component reported an internal error
    SystemError { component: String, error: String },
}

impl MonitorEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            MonitorEvent::AlertRaised { alert } => alert.raised_at,
            MonitorEvent::StatusChanged { timestamp, .. } => *timestamp,
            MonitorEvent::StateChanged { timestamp, .. } => *timestamp,
            MonitorEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            MonitorEvent::AlertRaised { alert } => {
                format!("Alert raised: {}", alert.kind.title())
            }
            MonitorEvent::StatusChanged {
                position, movement, ..
            } => {
                format!(
                    "Status changed: {} / {}",
                    position.display_value(),
                    movement.display_value()
                )
            }
            MonitorEvent::StateChanged { state, .. } => {
                format!("Monitoring state: {:?}", state)
            }
            MonitorEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            MonitorEvent::AlertRaised { .. } => "alert_raised",
            MonitorEvent::StatusChanged { .. } => "status_changed",
            MonitorEvent::StateChanged { .. } => "state_changed",
            MonitorEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Async event bus connecting the coordinator to its subscribers.
///
/// Replaces the original notification-center broadcast with an explicit
/// channel: subscribers hold receivers, the coordinator owns the sender.
pub struct EventBus {
    sender: broadcast::Sender<MonitorEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all subscribers
    pub async fn publish(&self, event: MonitorEvent) -> Result<usize, EventBusError> {
        match &event {
            MonitorEvent::AlertRaised { alert } => {
                info!("Alert raised: {} ({:?})", alert.kind.title(), alert.id);
            }
            MonitorEvent::StateChanged { state, .. } => {
                info!("Monitoring state changed: {:?}", state);
            }
            MonitorEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Check if there are any active subscribers
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&MonitorEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &MonitorEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver with filtering
pub struct EventReceiver {
    receiver: broadcast::Receiver<MonitorEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<MonitorEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<MonitorEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        debug!(
                            "Receiver '{}' received event: {}",
                            self.name,
                            event.description()
                        );
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<MonitorEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => {
                    return Ok(None);
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::AlertKind;
    use tokio::time::{timeout, Duration};

    fn alert_event(kind: AlertKind) -> MonitorEvent {
        MonitorEvent::AlertRaised {
            alert: AlertEvent::new(kind, SystemTime::now()),
        }
    }

    #[tokio::test]
    async fn test_event_bus_basic_operations() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let subscriber_count = event_bus
            .publish(alert_event(AlertKind::CryingDetected))
            .await
            .unwrap();
        assert_eq!(subscriber_count, 1);

        let received = receiver.recv().await.unwrap();
        match received {
            MonitorEvent::AlertRaised { alert } => {
                assert_eq!(alert.kind, AlertKind::CryingDetected);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus
            .publish(MonitorEvent::StateChanged {
                state: MonitorState::Active,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        let _ = timeout(Duration::from_millis(100), receiver1.recv())
            .await
            .unwrap()
            .unwrap();
        let _ = timeout(Duration::from_millis(100), receiver2.recv())
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_event_filter() {
        let filter = EventFilter::EventTypes(vec!["alert_raised"]);

        let alert = alert_event(AlertKind::RolledOntoStomach);
        let status = MonitorEvent::StatusChanged {
            position: PositionStatus::OnBack,
            movement: MovementStatus::Still,
            timestamp: SystemTime::now(),
        };

        assert!(filter.matches(&alert));
        assert!(!filter.matches(&status));
    }

    #[tokio::test]
    async fn test_filtered_receiver() {
        let event_bus = EventBus::new(10);
        let receiver = event_bus.subscribe();
        let filter = EventFilter::EventTypes(vec!["alert_raised"]);
        let mut filtered = EventReceiver::new(receiver, filter, "test".to_string());

        event_bus
            .publish(MonitorEvent::StatusChanged {
                position: PositionStatus::OnBack,
                movement: MovementStatus::Still,
                timestamp: SystemTime::now(),
            })
            .await
            .unwrap();

        event_bus
            .publish(alert_event(AlertKind::UnusualStillness))
            .await
            .unwrap();

        let received = timeout(Duration::from_millis(100), filtered.recv())
            .await
            .unwrap()
            .unwrap();
        match received {
            MonitorEvent::AlertRaised { alert } => {
                assert_eq!(alert.kind, AlertKind::UnusualStillness);
            }
            _ => panic!("Unexpected event type"),
        }
    }

    #[test]
    fn test_event_properties() {
        let event = alert_event(AlertKind::FaceMayBeCovered);
        assert_eq!(event.event_type(), "alert_raised");
        assert!(event.description().contains("face may be covered"));
    }

    #[test]
    fn test_event_serialization_round_trip() {
        let event = alert_event(AlertKind::RolledOntoStomach);
        let json = serde_json::to_string(&event).unwrap();
        let back: MonitorEvent = serde_json::from_str(&json).unwrap();
        match back {
            MonitorEvent::AlertRaised { alert } => {
                assert_eq!(alert.kind, AlertKind::RolledOntoStomach);
            }
            _ => panic!("Unexpected event type"),
        }
    }
}
