//! Passive monitoring of BroodMinder advertisements.
//!
//! [`AdvertisementMonitor`] consumes a stream of [`RawAdvertisement`]s from
//! whatever scanner the application uses, runs each through the
//! [`DecodePipeline`] in arrival order and broadcasts [`MonitorEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use broodminder_core::monitor::{AdvertisementMonitor, MonitorOptions};
//! use broodminder_core::MonitorEvent;
//! use broodminder_types::RawAdvertisement;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(scanner: impl futures::Stream<Item = RawAdvertisement> + Send + 'static) {
//! let monitor = Arc::new(AdvertisementMonitor::new(MonitorOptions::default()));
//! let mut rx = monitor.subscribe();
//! let cancel = CancellationToken::new();
//!
//! let handle = monitor.start(scanner, cancel.clone());
//!
//! while let Ok(event) = rx.recv().await {
//!     if let MonitorEvent::Reading { device, advertisement, .. } = event {
//!         println!("{}: {:?}", device, advertisement.reading.temperature_f);
//!     }
//! }
//! # }
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use broodminder_types::{RawAdvertisement, SensorReading};

use crate::error::{Error, Result};
use crate::events::{EventDispatcher, EventReceiver, MonitorEvent};
use crate::pipeline::{DecodePipeline, DecodedAdvertisement};
use crate::rotation::{CensusSnapshot, PrunedMember, TrackerOptions};

/// Options for the advertisement monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOptions {
    /// Channel capacity for events.
    pub channel_capacity: usize,
    /// How often stale hub census entries are pruned.
    pub prune_interval: Duration,
    /// Only emit readings when values change.
    pub deduplicate: bool,
    /// Re-emit an unchanged reading once the cached one is this old.
    pub max_reading_age: Duration,
    /// Only emit readings for these devices (identity strings or
    /// addresses; empty = all).
    pub device_filter: Vec<String>,
    /// Hub rotation tracking.
    pub tracker: TrackerOptions,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            prune_interval: Duration::from_secs(5),
            deduplicate: true,
            max_reading_age: Duration::from_secs(60),
            device_filter: Vec::new(),
            tracker: TrackerOptions::default(),
        }
    }
}

impl MonitorOptions {
    /// Create new options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event channel capacity.
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the prune interval.
    pub fn prune_interval(mut self, interval: Duration) -> Self {
        self.prune_interval = interval;
        self
    }

    /// Enable or disable deduplication.
    pub fn deduplicate(mut self, enable: bool) -> Self {
        self.deduplicate = enable;
        self
    }

    /// Set the maximum age of a cached reading.
    pub fn max_reading_age(mut self, age: Duration) -> Self {
        self.max_reading_age = age;
        self
    }

    /// Filter to specific devices.
    pub fn filter_devices(mut self, device_ids: Vec<String>) -> Self {
        self.device_filter = device_ids;
        self
    }

    /// Set the tracker options.
    pub fn tracker(mut self, tracker: TrackerOptions) -> Self {
        self.tracker = tracker;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for a zero capacity or prune interval,
    /// or invalid tracker options.
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(Error::invalid_config("channel capacity must be non-zero"));
        }
        if self.prune_interval.is_zero() {
            return Err(Error::invalid_config("prune interval must be non-zero"));
        }
        self.tracker.validate()
    }
}

/// Cached reading for deduplication.
struct CachedReading {
    reading: SensorReading,
    received_at: Instant,
}

/// Passive monitor for BroodMinder devices and hubs.
pub struct AdvertisementMonitor {
    options: MonitorOptions,
    events: EventDispatcher,
    pipeline: RwLock<DecodePipeline>,
    /// Cache of last readings for deduplication.
    cache: RwLock<HashMap<String, CachedReading>>,
}

impl AdvertisementMonitor {
    /// Create a new monitor with the given options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the options do not validate.
    pub fn try_new(options: MonitorOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::new(options))
    }

    /// Create a new monitor with the given options.
    ///
    /// A zero channel capacity is raised to 1.
    pub fn new(options: MonitorOptions) -> Self {
        let events = EventDispatcher::new(options.channel_capacity.max(1));
        let pipeline = DecodePipeline::new(options.tracker.clone());
        Self {
            options,
            events,
            pipeline: RwLock::new(pipeline),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Monitor options.
    pub fn options(&self) -> &MonitorOptions {
        &self.options
    }

    /// Subscribe to monitor events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    /// Start the monitor on a background task.
    ///
    /// The task runs until the stream ends or the token is cancelled.
    pub fn start<S>(
        self: &Arc<Self>,
        stream: S,
        cancel_token: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<()>>
    where
        S: Stream<Item = RawAdvertisement> + Send + 'static,
    {
        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run(stream, cancel_token).await })
    }

    /// Process advertisements until the stream ends or the token is
    /// cancelled.
    ///
    /// Decode failures are reported as [`MonitorEvent::DecodeFailed`] and do
    /// not stop the monitor.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when stopped by the token.
    pub async fn run<S>(&self, stream: S, cancel_token: CancellationToken) -> Result<()>
    where
        S: Stream<Item = RawAdvertisement>,
    {
        info!("Starting advertisement monitor");
        let mut stream = std::pin::pin!(stream);
        let mut prune = tokio::time::interval(
            self.options
                .prune_interval
                .max(Duration::from_millis(1)),
        );
        prune.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    info!("Advertisement monitor cancelled");
                    return Err(Error::Cancelled);
                }
                _ = prune.tick() => {
                    self.prune().await;
                }
                next = stream.next() => match next {
                    Some(raw) => {
                        if let Err(e) = self.process(&raw).await {
                            debug!(address = %raw.address, error = %e, "Failed to decode advertisement");
                        }
                    }
                    None => {
                        info!("Advertisement stream ended");
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Process one advertisement.
    ///
    /// Returns the decoded advertisement if a `Reading` event was emitted for
    /// it. Hub relays update the rotation census even when the relayed
    /// device is filtered out or its reading is unchanged.
    ///
    /// # Errors
    ///
    /// Returns the decode error; a `DecodeFailed` event is emitted as well.
    pub async fn process(&self, raw: &RawAdvertisement) -> Result<Option<DecodedAdvertisement>> {
        let now = Instant::now();

        let processed = {
            let mut pipeline = self.pipeline.write().await;
            let processed = match pipeline.process(raw, now.into_std()) {
                Ok(processed) => processed,
                Err(e) => {
                    self.events.send(MonitorEvent::DecodeFailed {
                        address: raw.address.to_string(),
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };

            if let Some(relay) = &processed.relay {
                self.events.send(MonitorEvent::HubRelay {
                    hub: relay.hub.clone(),
                    relayed: relay.relayed,
                    new_member: relay.observation.new_member,
                });
                if let Some(cycle_length) = relay.observation.cycle_completed {
                    let members = pipeline
                        .tracker()
                        .census(&relay.hub)
                        .map(|c| c.identities())
                        .unwrap_or_default();
                    self.events.send(MonitorEvent::CycleCompleted {
                        hub: relay.hub.clone(),
                        cycle_length,
                        members,
                    });
                }
            }
            processed
        };

        let Some(decoded) = processed.outcome.into_decoded() else {
            return Ok(None);
        };

        let device = decoded.device_id();
        if !self.matches_filter(&device, &decoded) {
            trace!(device = %device, "Filtered out");
            return Ok(None);
        }

        if self.options.deduplicate && !self.should_emit(&device, &decoded.reading, now).await {
            trace!(device = %device, "Unchanged reading");
            return Ok(None);
        }

        self.cache.write().await.insert(
            device.clone(),
            CachedReading {
                reading: decoded.reading.clone(),
                received_at: now,
            },
        );

        self.events.send(MonitorEvent::Reading {
            device,
            advertisement: Box::new(decoded.clone()),
            received_at: OffsetDateTime::now_utc(),
        });
        Ok(Some(decoded))
    }

    fn matches_filter(&self, device: &str, decoded: &DecodedAdvertisement) -> bool {
        let filter = &self.options.device_filter;
        if filter.is_empty() {
            return true;
        }
        let identity = decoded.identity.map(|id| id.to_string());
        let address = decoded.address.to_string();
        filter.iter().any(|f| {
            f.eq_ignore_ascii_case(device)
                || f.eq_ignore_ascii_case(&address)
                || identity.as_deref().is_some_and(|id| f.eq_ignore_ascii_case(id))
        })
    }

    /// Check if a reading should be emitted (for deduplication).
    async fn should_emit(&self, device: &str, reading: &SensorReading, now: Instant) -> bool {
        let cache = self.cache.read().await;
        match cache.get(device) {
            Some(cached) => {
                now.saturating_duration_since(cached.received_at) > self.options.max_reading_age
                    || cached.reading != *reading
            }
            None => true,
        }
    }

    /// Prune stale hub census entries, emitting `DevicePruned` for each.
    ///
    /// Cached readings older than `max_reading_age` are dropped as well, so
    /// devices that stop advertising do not accumulate.
    pub async fn prune(&self) -> Vec<PrunedMember> {
        let now = Instant::now();
        let pruned = self
            .pipeline
            .write()
            .await
            .tracker_mut()
            .prune_stale(now.into_std());

        let mut cache = self.cache.write().await;
        for member in &pruned {
            cache.remove(&member.identity.to_string());
            self.events.send(MonitorEvent::DevicePruned {
                hub: member.hub.clone(),
                device: member.identity,
            });
        }
        if !pruned.is_empty() {
            info!(count = pruned.len(), "Pruned stale hub members");
        }

        let before = cache.len();
        cache.retain(|_, cached| {
            now.saturating_duration_since(cached.received_at) <= self.options.max_reading_age
        });
        if cache.len() < before {
            debug!(count = before - cache.len(), "Evicted expired readings");
        }
        pruned
    }

    /// Get the last emitted reading for a device.
    pub async fn last_reading(&self, device_id: &str) -> Option<SensorReading> {
        let cache = self.cache.read().await;
        cache.get(device_id).map(|c| c.reading.clone())
    }

    /// Get all known device IDs, sorted.
    pub async fn known_devices(&self) -> Vec<String> {
        let cache = self.cache.read().await;
        let mut devices: Vec<String> = cache.keys().cloned().collect();
        devices.sort();
        devices
    }

    /// Keys of every tracked hub.
    pub async fn hubs(&self) -> Vec<String> {
        self.pipeline.read().await.tracker().hub_keys()
    }

    /// Snapshot of a hub's census.
    pub async fn census_snapshot(&self, hub: &str) -> Option<CensusSnapshot> {
        let now = Instant::now().into_std();
        self.pipeline.read().await.tracker().snapshot(hub, now)
    }

    /// Clear the reading cache.
    pub async fn clear_cache(&self) {
        self.cache.write().await.clear();
    }
}

impl Default for AdvertisementMonitor {
    fn default() -> Self {
        Self::new(MonitorOptions::default())
    }
}
