//! Monitor event system.
//!
//! This module provides the events the advertisement monitor broadcasts:
//! decoded readings, hub relays, completed rotations and pruned devices.

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::broadcast;

use broodminder_types::DeviceIdentity;

use crate::pipeline::DecodedAdvertisement;

/// Events emitted by the advertisement monitor.
///
/// All events are serializable for logging and forwarding.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum MonitorEvent {
    /// A new or changed reading was decoded.
    Reading {
        /// Device key, see [`DecodedAdvertisement::device_id`].
        device: String,
        /// The decoded advertisement.
        advertisement: Box<DecodedAdvertisement>,
        /// When the advertisement was processed.
        #[serde(with = "time::serde::rfc3339")]
        received_at: OffsetDateTime,
    },
    /// A hub relayed a device.
    HubRelay {
        /// Hub key.
        hub: String,
        /// Device being relayed.
        relayed: DeviceIdentity,
        /// First time this hub relayed the device.
        new_member: bool,
    },
    /// A hub completed a rotation.
    CycleCompleted {
        /// Hub key.
        hub: String,
        /// Number of devices in the rotation.
        cycle_length: usize,
        /// Devices in the census.
        members: Vec<DeviceIdentity>,
    },
    /// A device dropped out of a hub's rotation.
    DevicePruned {
        /// Hub key.
        hub: String,
        /// Device that went stale.
        device: DeviceIdentity,
    },
    /// An advertisement could not be decoded.
    DecodeFailed {
        /// Address the advertisement came from.
        address: String,
        /// Error description.
        error: String,
    },
}

/// Sender for monitor events.
pub type EventSender = broadcast::Sender<MonitorEvent>;

/// Receiver for monitor events.
pub type EventReceiver = broadcast::Receiver<MonitorEvent>;

/// Create a new event channel with the given capacity.
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    /// Create a new event dispatcher.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = event_channel(capacity);
        Self { sender }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: MonitorEvent) {
        // No receivers is fine.
        let _ = self.sender.send(event);
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}
