//! Stations and per-(station, node) state.
//!
//! A station exists while at least one node still holds info about it;
//! removing the last info record removes the station. Per-node info is
//! keyed by the owning node id, so node teardown cascades here.
//
// https://github.com/apsteer/apsteer

use std::collections::BTreeMap;

use bitflags::bitflags;
use log::debug;

use crate::config::SteerConfig;
use crate::hearing::{BeaconReport, BeaconSchedule};
use crate::node::NodeId;
use crate::policy::RoamState;
use crate::{EventType, MacAddr, EVENT_TYPE_COUNT, NO_SIGNAL};

bitflags! {
    /// Bands a station has been seen on
    #[derive(Default)]
    pub struct BandFlags: u8 {
        const SEEN_2GHZ = 0x01;
        const SEEN_5GHZ = 0x02;
    }
}

/// Per-node connection state.
///
/// `Stale` only exists inside a client-list reconciliation pass and must
/// never be reported externally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Disconnected,
    Connected,
    Stale,
}

impl ConnState {
    pub fn is_connected(self) -> bool {
        self == ConnState::Connected
    }

    /// Wire/report representation: anything but disconnected counts as 1
    pub fn as_u8(self) -> u8 {
        match self {
            ConnState::Disconnected => 0,
            _ => 1,
        }
    }
}

/// Per-event-type request accounting
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventStats {
    pub requests: u32,
    pub blocked_cur: u32,
    pub blocked_total: u32,
    /// Wrapping millisecond stamp of the last denial
    pub blocked_last_time: u32,
}

/// Two-slot rx/tx byte counter window for activity detection
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ActiveBytes {
    pub slots: [[u64; 2]; 2],
    pub last_time: u64,
}

impl ActiveBytes {
    /// Shift in a new sample, at most once per `min_interval_ms`
    pub fn slide(&mut self, rx: u64, tx: u64, now: u64, min_interval_ms: u64) -> bool {
        if now.saturating_sub(self.last_time) < min_interval_ms {
            return false;
        }

        self.slots[0] = self.slots[1];
        self.slots[1] = [rx, tx];
        self.last_time = now;
        true
    }

    /// Average throughput across the window in bits per second
    pub fn rate_bits(&self, interval_secs: u64) -> u64 {
        let newer = self.slots[1][0] + self.slots[1][1];
        let older = self.slots[0][0] + self.slots[0][1];

        newer.saturating_sub(older) * 8 / interval_secs.max(1)
    }
}

/// Everything one node knows about one station
#[derive(Debug, Clone, PartialEq)]
pub struct StaInfo {
    pub addr: MacAddr,
    pub node: NodeId,

    pub signal: i32,
    pub created: u64,
    pub seen: u64,
    pub connected: ConnState,

    pub stats: [EventStats; EVENT_TYPE_COUNT],

    pub roam_state: RoamState,
    pub roam_tries: u32,
    pub roam_event: u64,
    pub roam_kick: u64,
    pub roam_scan_done: u64,

    pub kick_count: u32,
    pub scan_band: bool,

    pub active_bytes: ActiveBytes,

    pub beacons: BTreeMap<MacAddr, BeaconReport>,
    pub beacon_req: BeaconSchedule,
}

impl StaInfo {
    pub fn new(addr: MacAddr, node: NodeId, now: u64) -> Self {
        Self {
            addr,
            node,
            signal: NO_SIGNAL,
            created: now,
            seen: now,
            connected: ConnState::Disconnected,
            stats: Default::default(),
            roam_state: RoamState::Idle,
            roam_tries: 0,
            roam_event: 0,
            roam_kick: 0,
            roam_scan_done: 0,
            kick_count: 0,
            scan_band: false,
            active_bytes: Default::default(),
            beacons: BTreeMap::new(),
            beacon_req: Default::default(),
        }
    }

    /// Record a signal observation and refresh the last-seen stamp
    pub fn update_signal(&mut self, mut signal: i32, avg: bool, now: u64) {
        /* ignore probe request signal when connected */
        if self.connected == ConnState::Connected && self.signal != NO_SIGNAL && !avg {
            signal = NO_SIGNAL;
        }

        if signal != NO_SIGNAL {
            self.signal = signal;
        }

        self.seen = now;
    }
}

/// A station across all nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Sta {
    pub addr: MacAddr,
    pub bands: BandFlags,
    pub infos: BTreeMap<NodeId, StaInfo>,
}

impl Sta {
    fn new(addr: MacAddr) -> Self {
        Self { addr, bands: BandFlags::default(), infos: BTreeMap::new() }
    }
}

/// All known stations, keyed by MAC
#[derive(Default)]
pub struct StaTable {
    stations: BTreeMap<MacAddr, Sta>,
}

impl StaTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn sta(&self, addr: &MacAddr) -> Option<&Sta> {
        self.stations.get(addr)
    }

    pub fn sta_mut(&mut self, addr: &MacAddr) -> Option<&mut Sta> {
        self.stations.get_mut(addr)
    }

    pub fn info(&self, addr: &MacAddr, node: &NodeId) -> Option<&StaInfo> {
        self.stations.get(addr).and_then(|s| s.infos.get(node))
    }

    pub fn info_mut(&mut self, addr: &MacAddr, node: &NodeId) -> Option<&mut StaInfo> {
        self.stations.get_mut(addr).and_then(|s| s.infos.get_mut(node))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MacAddr, &Sta)> {
        self.stations.iter()
    }

    pub fn infos_of_node<'a>(&'a self, node: &'a NodeId) -> impl Iterator<Item = &'a StaInfo> + 'a {
        self.stations.values().filter_map(move |s| s.infos.get(node))
    }

    pub fn infos_of_node_mut<'a>(
        &'a mut self,
        node: &'a NodeId,
    ) -> impl Iterator<Item = &'a mut StaInfo> + 'a {
        self.stations.values_mut().filter_map(move |s| s.infos.get_mut(node))
    }

    /// Get or create the info record for `(addr, node)`
    pub fn get_or_create_info(&mut self, addr: MacAddr, node: &NodeId, now: u64) -> (&mut StaInfo, bool) {
        let sta = self
            .stations
            .entry(addr)
            .or_insert_with(|| {
                debug!("create station entry {}", addr);
                Sta::new(addr)
            });

        let created = !sta.infos.contains_key(node);
        if created {
            debug!("create station {} entry for node {}", addr, node);
        }

        let si = sta
            .infos
            .entry(node.clone())
            .or_insert_with(|| StaInfo::new(addr, node.clone(), now));

        (si, created)
    }

    /// Event pipeline, admission excluded: band flags, signal, request and
    /// block-window accounting. Returns whether the info was just created.
    pub fn ingest(
        &mut self,
        node: &NodeId,
        addr: MacAddr,
        ev: EventType,
        freq: u32,
        signal: i32,
        cfg: &SteerConfig,
        now: u64,
    ) -> bool {
        {
            let sta = self.stations.entry(addr).or_insert_with(|| Sta::new(addr));
            if freq < 4000 {
                sta.bands |= BandFlags::SEEN_2GHZ;
            } else {
                sta.bands |= BandFlags::SEEN_5GHZ;
            }
        }

        let (si, created) = self.get_or_create_info(addr, node, now);

        si.update_signal(signal, false, now);
        si.stats[ev as usize].requests = si.stats[ev as usize].requests.wrapping_add(1);

        // Unsigned window check; the "negative" delta wraps large on purpose
        let diff = si.stats[ev as usize].blocked_last_time.wrapping_sub(now as u32);
        if diff > cfg.sta_block_timeout {
            si.stats[ev as usize].blocked_cur = 0;
        }

        created
    }

    /// Settle the admission decision made for an ingested event
    pub fn apply_admission(
        &mut self,
        node: &NodeId,
        addr: &MacAddr,
        ev: EventType,
        accepted: bool,
        now: u64,
    ) {
        let si = match self.info_mut(addr, node) {
            Some(si) => si,
            None => return,
        };

        let stats = &mut si.stats[ev as usize];
        if accepted {
            stats.blocked_cur = 0;
        } else {
            stats.blocked_cur += 1;
            stats.blocked_total += 1;
            stats.blocked_last_time = now as u32;
        }
    }

    /// Remove one info record; returns true when the station went with it
    pub fn remove_info(&mut self, addr: &MacAddr, node: &NodeId) -> bool {
        let empty = match self.stations.get_mut(addr) {
            Some(sta) => {
                if sta.infos.remove(node).is_some() {
                    debug!("delete station {} entry for node {}", addr, node);
                }
                sta.infos.is_empty()
            }
            None => return false,
        };

        if empty {
            debug!("delete station {}", addr);
            self.stations.remove(addr);
        }

        empty
    }

    /// Remove every info record owned by `node`, returning the affected
    /// station addresses so pending timeouts can be cancelled
    pub fn remove_node_infos(&mut self, node: &NodeId) -> Vec<MacAddr> {
        let mut removed = Vec::new();

        self.stations.retain(|addr, sta| {
            if sta.infos.remove(node).is_some() {
                removed.push(*addr);
            }
            !sta.infos.is_empty()
        });

        removed
    }
}
