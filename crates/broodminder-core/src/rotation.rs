//! SubHub rotation tracking.
//!
//! A hub (model 52) relays one device at a time in its mock advertisements,
//! moving to the next roughly every five seconds. [`RotationTracker`] keeps a
//! census per hub of every relayed device and its latest reading, detects
//! completed rotations and expires devices that drop out.
//!
//! A rotation has no end marker on air. A pass is considered complete once
//! every member seen since the previous completion has been seen again after
//! the hub moved on from it, or once the hub's own identity comes round
//! again. Repeated advertisements for the device currently being relayed only
//! refresh its entry, unless they outlast one rotation period: a hub relaying
//! a single device repeats it pass after pass.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use broodminder_types::ble::SUBHUB_ROTATION_PERIOD_SECS;
use broodminder_types::{DeviceIdentity, SensorReading};

use crate::error::{Error, Result};

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerOptions {
    /// Nominal time a hub spends on each relayed device.
    pub rotation_period: Duration,
    /// Entries not refreshed within `rotation_period * stale_after_periods`
    /// are stale.
    pub stale_after_periods: u32,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            rotation_period: Duration::from_secs(SUBHUB_ROTATION_PERIOD_SECS),
            stale_after_periods: 6,
        }
    }
}

impl TrackerOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the nominal rotation period.
    #[must_use]
    pub fn rotation_period(mut self, period: Duration) -> Self {
        self.rotation_period = period;
        self
    }

    /// Set the staleness threshold in rotation periods.
    #[must_use]
    pub fn stale_after_periods(mut self, periods: u32) -> Self {
        self.stale_after_periods = periods;
        self
    }

    /// Age after which an entry is stale.
    pub fn stale_after(&self) -> Duration {
        self.rotation_period
            .saturating_mul(self.stale_after_periods)
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the period or the period count is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.rotation_period.is_zero() {
            return Err(Error::invalid_config("rotation period must be non-zero"));
        }
        if self.stale_after_periods == 0 {
            return Err(Error::invalid_config(
                "stale_after_periods must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Latest state of one relayed device.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusEntry {
    /// Most recent reading relayed for this device.
    pub reading: SensorReading,
    /// Signal strength of the hub advertisement that carried it.
    pub rssi: i16,
    /// When the device first appeared in this hub's rotation.
    pub first_seen: Instant,
    /// When the device was last relayed.
    pub last_seen: Instant,
    /// Number of advertisements that carried this device.
    pub sightings: u64,
}

impl CensusEntry {
    /// Whether the entry has not been refreshed within `stale_after`.
    pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > stale_after
    }
}

/// Census of the devices relayed by one hub.
#[derive(Debug, Clone, Default)]
pub struct HubCensus {
    hub: Option<DeviceIdentity>,
    entries: BTreeMap<DeviceIdentity, CensusEntry>,
    current: Option<DeviceIdentity>,
    current_since: Option<Instant>,
    members: BTreeSet<DeviceIdentity>,
    reseen: BTreeSet<DeviceIdentity>,
    cycle_length: Option<usize>,
    completed_cycles: u64,
}

impl HubCensus {
    /// The hub's own identity, if it was resolved.
    pub fn hub_identity(&self) -> Option<DeviceIdentity> {
        self.hub
    }

    /// Entry for a relayed device.
    pub fn get(&self, identity: &DeviceIdentity) -> Option<&CensusEntry> {
        self.entries.get(identity)
    }

    /// All entries, ordered by identity.
    pub fn entries(&self) -> impl Iterator<Item = (&DeviceIdentity, &CensusEntry)> {
        self.entries.iter()
    }

    /// Identities in the census, ordered.
    pub fn identities(&self) -> Vec<DeviceIdentity> {
        self.entries.keys().copied().collect()
    }

    /// Number of relayed devices.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the census is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device the hub relayed most recently.
    pub fn current(&self) -> Option<DeviceIdentity> {
        self.current
    }

    /// Member count at the most recent completed rotation.
    pub fn cycle_length(&self) -> Option<usize> {
        self.cycle_length
    }

    /// Number of completed rotations.
    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    /// Entries refreshed within `stale_after` of `now`.
    pub fn live(
        &self,
        now: Instant,
        stale_after: Duration,
    ) -> impl Iterator<Item = (&DeviceIdentity, &CensusEntry)> {
        self.entries
            .iter()
            .filter(move |(_, e)| !e.is_stale(now, stale_after))
    }

    fn observe(
        &mut self,
        relayed: DeviceIdentity,
        reading: SensorReading,
        rssi: i16,
        now: Instant,
        rotation_period: Duration,
    ) -> Observation {
        let new_member = match self.entries.get_mut(&relayed) {
            Some(entry) => {
                entry.reading = reading;
                entry.rssi = rssi;
                entry.last_seen = now;
                entry.sightings += 1;
                false
            }
            None => {
                self.entries.insert(
                    relayed,
                    CensusEntry {
                        reading,
                        rssi,
                        first_seen: now,
                        last_seen: now,
                        sightings: 1,
                    },
                );
                true
            }
        };

        let target_changed = self.current != Some(relayed);
        let dwell_elapsed = self
            .current_since
            .is_some_and(|since| now.saturating_duration_since(since) >= rotation_period);
        let new_pass = target_changed || dwell_elapsed;
        self.current = Some(relayed);
        if new_pass {
            self.current_since = Some(now);
        }

        let mut cycle_completed = None;
        if new_pass {
            let returning = !self.members.insert(relayed);
            if returning {
                self.reseen.insert(relayed);
            }
            let hub_recurred = returning && self.hub == Some(relayed);
            let all_reseen = !self.reseen.is_empty() && self.reseen.len() == self.members.len();
            if hub_recurred || all_reseen {
                self.completed_cycles += 1;
                self.cycle_length = Some(self.members.len());
                self.reseen.clear();
                cycle_completed = self.cycle_length;
            }
        }

        Observation {
            new_member,
            target_changed,
            cycle_completed,
        }
    }

    fn remove(&mut self, identity: &DeviceIdentity) {
        self.entries.remove(identity);
        self.members.remove(identity);
        self.reseen.remove(identity);
        if self.current == Some(*identity) {
            self.current = None;
            self.current_since = None;
        }
    }
}

/// Result of feeding one hub relay to the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observation {
    /// The relayed device was not in the census before.
    pub new_member: bool,
    /// The hub moved on to a different device.
    pub target_changed: bool,
    /// Set to the cycle length when this relay completed a rotation.
    pub cycle_completed: Option<usize>,
}

/// A census entry removed for staleness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrunedMember {
    /// Key of the hub the device was relayed by.
    pub hub: String,
    /// The device that dropped out.
    pub identity: DeviceIdentity,
}

/// Serializable view of a hub census at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusSnapshot {
    /// Hub key.
    pub hub: String,
    /// Hub's own identity, if resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_identity: Option<DeviceIdentity>,
    /// Relayed devices, ordered by identity.
    pub members: Vec<CensusMember>,
    /// Member count at the most recent completed rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_length: Option<usize>,
    /// Number of completed rotations.
    pub completed_cycles: u64,
}

/// One relayed device in a [`CensusSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CensusMember {
    /// Relayed device identity.
    pub identity: DeviceIdentity,
    /// Latest reading.
    pub reading: SensorReading,
    /// Signal strength of the carrying advertisement.
    pub rssi: i16,
    /// Number of advertisements that carried this device.
    pub sightings: u64,
    /// Seconds since the device was last relayed.
    pub age_secs: f64,
    /// Whether the entry is past the staleness threshold.
    pub stale: bool,
}

/// Per-hub rotation state.
///
/// Hubs are keyed by the caller; independent hubs never share state.
#[derive(Debug, Clone, Default)]
pub struct RotationTracker {
    options: TrackerOptions,
    hubs: HashMap<String, HubCensus>,
}

impl RotationTracker {
    /// Create a tracker.
    pub fn new(options: TrackerOptions) -> Self {
        Self {
            options,
            hubs: HashMap::new(),
        }
    }

    /// Tracker options.
    pub fn options(&self) -> &TrackerOptions {
        &self.options
    }

    /// Record that `hub_key` relayed `relayed` with `reading`.
    pub fn observe(
        &mut self,
        hub_key: &str,
        hub: Option<DeviceIdentity>,
        relayed: DeviceIdentity,
        reading: SensorReading,
        rssi: i16,
        now: Instant,
    ) -> Observation {
        let census = self.hubs.entry(hub_key.to_string()).or_insert_with(|| {
            info!(hub = hub_key, "Tracking new hub");
            HubCensus::default()
        });
        if let Some(identity) = hub {
            if let Some(previous) = census.hub.filter(|p| *p != identity) {
                warn!(hub = hub_key, %previous, current = %identity, "Hub identity changed");
            }
            census.hub = Some(identity);
        }

        let observation =
            census.observe(relayed, reading, rssi, now, self.options.rotation_period);
        if observation.new_member {
            debug!(hub = hub_key, %relayed, "New device in rotation");
        }
        if let Some(length) = observation.cycle_completed {
            info!(
                hub = hub_key,
                length,
                cycles = census.completed_cycles,
                "Hub rotation completed"
            );
        }
        observation
    }

    /// Census for one hub.
    pub fn census(&self, hub_key: &str) -> Option<&HubCensus> {
        self.hubs.get(hub_key)
    }

    /// Keys of every tracked hub, sorted.
    pub fn hub_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.hubs.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Identities of a hub's non-stale entries.
    pub fn live_view(&self, hub_key: &str, now: Instant) -> Vec<DeviceIdentity> {
        self.census(hub_key)
            .map(|c| {
                c.live(now, self.options.stale_after())
                    .map(|(id, _)| *id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Serializable view of one hub's census.
    pub fn snapshot(&self, hub_key: &str, now: Instant) -> Option<CensusSnapshot> {
        let stale_after = self.options.stale_after();
        self.census(hub_key).map(|c| CensusSnapshot {
            hub: hub_key.to_string(),
            hub_identity: c.hub,
            members: c
                .entries()
                .map(|(id, e)| CensusMember {
                    identity: *id,
                    reading: e.reading.clone(),
                    rssi: e.rssi,
                    sightings: e.sightings,
                    age_secs: now.saturating_duration_since(e.last_seen).as_secs_f64(),
                    stale: e.is_stale(now, stale_after),
                })
                .collect(),
            cycle_length: c.cycle_length,
            completed_cycles: c.completed_cycles,
        })
    }

    /// Remove stale entries from every hub, and hubs left empty.
    pub fn prune_stale(&mut self, now: Instant) -> Vec<PrunedMember> {
        let stale_after = self.options.stale_after();
        let mut pruned = Vec::new();

        for (key, census) in &mut self.hubs {
            let stale: Vec<DeviceIdentity> = census
                .entries()
                .filter(|(_, e)| e.is_stale(now, stale_after))
                .map(|(id, _)| *id)
                .collect();
            for identity in stale {
                debug!(hub = %key, %identity, "Pruning stale device");
                census.remove(&identity);
                pruned.push(PrunedMember {
                    hub: key.clone(),
                    identity,
                });
            }
        }

        self.hubs.retain(|key, census| {
            if census.is_empty() {
                info!(hub = %key, "Hub census empty, no longer tracking");
            }
            !census.is_empty()
        });
        pruned
    }

    /// Stop tracking a hub.
    pub fn remove_hub(&mut self, hub_key: &str) -> Option<HubCensus> {
        self.hubs.remove(hub_key)
    }

    /// Number of tracked hubs.
    pub fn hub_count(&self) -> usize {
        self.hubs.len()
    }
}
