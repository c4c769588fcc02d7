//! Management surface.
//!
//! Typed views over the controller's observable state plus the config
//! read/write entry points, mirroring what the AP management bus exposes
//! to operators.
//
// https://github.com/apsteer/apsteer

use log::debug;
use strum::IntoEnumIterator;

use crate::bus::ApBus;
use crate::config::{ConfigUpdate, SteerConfig};
use crate::controller::Controller;
use crate::node::{NodeId, NrEntry};
use crate::timer::Timer;
use crate::transport::Transport;
use crate::{EventType, MacAddr};

/// Per-node scalar dump
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub name: String,
    pub freq: u32,
    pub n_assoc: u32,
    pub noise: i32,
    pub load: u32,
    pub max_assoc: u32,
    pub rrm_nr: Vec<NrEntry>,
}

/// Client state on one node, as shown by `get_clients`
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNodeInfo {
    pub connected: bool,
    pub signal: i32,
}

/// Per-event-type counters
#[derive(Debug, Clone, PartialEq)]
pub struct StatsView {
    pub event: String,
    pub requests: u32,
    pub blocked_cur: u32,
    pub blocked_total: u32,
}

/// Client detail on one node
#[derive(Debug, Clone, PartialEq)]
pub struct ClientNodeDetail {
    pub connected: bool,
    pub signal: i32,
    pub stats: Vec<StatsView>,
    /// Bits per second over the recent byte window
    pub average_data_rate: u64,
}

/// `get_client_info` reply
#[derive(Debug, Clone, PartialEq)]
pub struct ClientInfo {
    pub seen_2ghz: bool,
    pub seen_5ghz: bool,
    pub nodes: Vec<(String, ClientNodeDetail)>,
}

/// One hearing-map row
#[derive(Debug, Clone, PartialEq)]
pub struct HearingEntry {
    pub bssid: MacAddr,
    pub rcpi: u16,
    pub rsni: u16,
    pub channel: u16,
    pub op_class: u16,
    pub age_ms: u64,
}

impl<B, T, X> Controller<B, T, X>
where
    B: ApBus,
    T: Timer,
    X: Transport,
{
    fn node_label(&self, id: &NodeId) -> String {
        match id {
            NodeId::Local(path) => path.clone(),
            NodeId::Remote { peer, name } => self
                .remotes
                .get(*peer, name)
                .map(|rn| rn.key.clone())
                .unwrap_or_else(|| id.to_string()),
        }
    }

    /// Scalar dump of all locally attached nodes
    pub fn local_info(&self) -> Vec<NodeInfo> {
        self.local_nodes
            .iter()
            .map(|(path, ln)| NodeInfo {
                name: path.clone(),
                freq: ln.data.freq,
                n_assoc: ln.data.n_assoc,
                noise: ln.data.noise,
                load: ln.data.load,
                max_assoc: ln.data.max_assoc,
                rrm_nr: ln.data.rrm_nr.clone(),
            })
            .collect()
    }

    /// Scalar dump of all peer-announced nodes
    pub fn remote_info(&self) -> Vec<NodeInfo> {
        self.remotes
            .iter()
            .map(|rn| NodeInfo {
                name: rn.key.clone(),
                freq: rn.data.freq,
                n_assoc: rn.data.n_assoc,
                noise: rn.data.noise,
                load: rn.data.load,
                max_assoc: rn.data.max_assoc,
                rrm_nr: rn.data.rrm_nr.clone(),
            })
            .collect()
    }

    /// Every station with its per-node connection state
    pub fn get_clients(&self) -> Vec<(MacAddr, Vec<(String, ClientNodeInfo)>)> {
        self.stations
            .iter()
            .map(|(addr, sta)| {
                let nodes = sta
                    .infos
                    .iter()
                    .map(|(id, si)| {
                        (
                            self.node_label(id),
                            ClientNodeInfo {
                                connected: si.connected.as_u8() != 0,
                                signal: si.signal,
                            },
                        )
                    })
                    .collect();
                (*addr, nodes)
            })
            .collect()
    }

    /// Detailed view of one station, including event statistics
    pub fn get_client_info(&self, addr: &MacAddr) -> Option<ClientInfo> {
        let sta = self.stations.sta(addr)?;
        let interval = self.config.kick_client_active_sec as u64;

        let nodes = sta
            .infos
            .iter()
            .map(|(id, si)| {
                let stats = EventType::iter()
                    .map(|ev| {
                        let s = &si.stats[ev as usize];
                        StatsView {
                            event: ev.to_string(),
                            requests: s.requests,
                            blocked_cur: s.blocked_cur,
                            blocked_total: s.blocked_total,
                        }
                    })
                    .collect();

                (
                    self.node_label(id),
                    ClientNodeDetail {
                        connected: si.connected.as_u8() != 0,
                        signal: si.signal,
                        stats,
                        average_data_rate: si.active_bytes.rate_bits(interval),
                    },
                )
            })
            .collect();

        Some(ClientInfo {
            seen_2ghz: sta.bands.contains(crate::sta::BandFlags::SEEN_2GHZ),
            seen_5ghz: sta.bands.contains(crate::sta::BandFlags::SEEN_5GHZ),
            nodes,
        })
    }

    /// Valid beacon reports for one station, grouped by reporting node
    pub fn get_hearing_map(&self, addr: &MacAddr) -> Option<Vec<(String, Vec<HearingEntry>)>> {
        let sta = self.stations.sta(addr)?;
        let now = self.timer.ticks_ms();
        let ttl_ms = self.config.beacon_report_invalid_timeout as u64 * 1000;

        let map = sta
            .infos
            .iter()
            .map(|(id, si)| {
                let entries = si
                    .beacons
                    .values()
                    .filter(|r| now.saturating_sub(r.received) <= ttl_ms)
                    .map(|r| HearingEntry {
                        bssid: r.bssid,
                        rcpi: r.rcpi,
                        rsni: r.rsni,
                        channel: r.channel,
                        op_class: r.op_class,
                        age_ms: now.saturating_sub(r.received),
                    })
                    .collect();
                (self.node_label(id), entries)
            })
            .collect();

        Some(map)
    }

    /// Full configuration snapshot
    pub fn get_config(&self) -> ConfigUpdate {
        self.config.snapshot()
    }

    /// Replace the configuration: re-init defaults, then apply
    pub fn set_config(&mut self, update: &ConfigUpdate) {
        let mut fresh = SteerConfig::default();
        update.apply(&mut fresh);
        self.apply_config(fresh);
    }

    /// Apply only the provided fields
    pub fn update_config(&mut self, update: &ConfigUpdate) {
        let mut cfg = self.config.clone();
        update.apply(&mut cfg);
        self.apply_config(cfg);
    }

    fn apply_config(&mut self, new: SteerConfig) {
        if new.interfaces != self.config.interfaces {
            debug!("peer interfaces changed, scheduling socket reload");
            let now32 = self.timer.ticks_ms() as u32;
            self.timeouts.set(crate::controller::Deadline::Reload, 1, now32);
        }

        if new.debug_level != self.config.debug_level {
            log::set_max_level(new.level_filter());
        }

        self.config = new;
    }
}
