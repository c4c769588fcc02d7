//! Controller: owns all steering state and sequences all work.
//!
//! Single-threaded cooperative model: the owner drives `run_once` from its
//! loop; within one wakeup, due timeouts fire in deadline order, then all
//! ready bus events drain, then all ready peer datagrams drain.
//
// https://github.com/apsteer/apsteer

use std::collections::BTreeMap;

use log::{debug, info, trace, warn};

use crate::bus::{ApBus, BeaconReportEvent, BeaconRequest, BusEvent, ClientList, DisassocRequest};
use crate::config::SteerConfig;
use crate::error::Error;
use crate::hearing;
use crate::local_node::{LocalNode, PollState, NODE_PATH_PREFIX};
use crate::node::{NodeData, NodeHandler, NodeId, NrEntry, SurveyData};
use crate::policy::{self, RoamAction};
use crate::remote::{Gossip, RemoteTable};
use crate::sta::{BandFlags, ConnState, StaTable};
use crate::timeout::TimeoutQueue;
use crate::timer::Timer;
use crate::transport::{RecvMeta, Transport};
use crate::wire::{self, PeerNode, PeerSta};
use crate::{EventType, MacAddr, MSG_BUF_LEN, NO_SIGNAL};

fn div_round_up(n: u32, d: u32) -> u32 {
    (n + d - 1) / d.max(1)
}

/// Everything the timeout queue can fire
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Deadline {
    /// Station info expiry
    StaInfo(MacAddr, NodeId),
    /// Local node poll period
    NodeUpdate(String),
    /// Advance a local node's request cycle
    NodeStep(String),
    /// Peer sync producer tick
    RemoteTick,
    /// Rebuild peer sockets
    Reload,
}

/// The steering controller for one AP
pub struct Controller<B, T, X> {
    pub(crate) config: SteerConfig,
    pub(crate) timer: T,
    pub(crate) bus: B,
    pub(crate) transport: X,

    pub(crate) stations: StaTable,
    pub(crate) local_nodes: BTreeMap<String, LocalNode>,
    pub(crate) remotes: RemoteTable,
    pub(crate) timeouts: TimeoutQueue<Deadline>,
    pub(crate) gossip: Gossip,

    handlers: Vec<Box<dyn NodeHandler>>,

    rx_buf: Vec<u8>,
}

impl<B, T, X> Controller<B, T, X>
where
    B: ApBus,
    T: Timer,
    X: Transport,
{
    /// Set up a controller: draw the peer id, open peer sockets, attach to
    /// already-published AP objects and arm the sync tick.
    pub fn new(config: SteerConfig, timer: T, bus: B, transport: X) -> Result<Self, Error<B::Error>> {
        let gossip = Gossip::new().map_err(|_| Error::NoLocalId)?;

        let mut c = Self {
            config,
            timer,
            bus,
            transport,
            stations: StaTable::new(),
            local_nodes: BTreeMap::new(),
            remotes: RemoteTable::new(),
            timeouts: TimeoutQueue::new(),
            gossip,
            handlers: Vec::new(),
            rx_buf: vec![0u8; MSG_BUF_LEN],
        };

        if let Err(e) = c.transport.reload(&c.config.interfaces) {
            warn!("peer socket setup failed: {:?}", e);
        }

        let now32 = c.timer.ticks_ms() as u32;
        c.timeouts.set(Deadline::RemoteTick, c.config.remote_update_interval, now32);

        let objects = c.bus.lookup_nodes()?;
        for obj in objects {
            c.register_node(&obj.path, obj.id);
        }

        Ok(c)
    }

    pub fn local_id(&self) -> u32 {
        self.gossip.local_id
    }

    /// Register a node capability handler; handlers run in registration
    /// order
    pub fn add_handler(&mut self, handler: Box<dyn NodeHandler>) {
        self.handlers.push(handler);
    }

    /// Feed a channel survey sample into a local node's load estimate
    pub fn apply_survey(&mut self, path: &str, survey: &SurveyData) {
        if let Some(ln) = self.local_nodes.get_mut(path) {
            ln.apply_survey(survey);
        }
    }

    fn now(&self) -> u64 {
        self.timer.ticks_ms()
    }

    /// One loop iteration: expired timers, then bus events, then peer
    /// datagrams
    pub fn run_once(&mut self) {
        loop {
            let now = self.now();
            let fired = self.timeouts.expire(now as u32);
            if fired.is_empty() {
                break;
            }
            for key in fired {
                self.dispatch_deadline(key);
            }
        }

        self.poll_bus();
        self.poll_transport();
    }

    /// Milliseconds until the next armed deadline
    pub fn next_wakeup_ms(&self) -> Option<u32> {
        self.timeouts.next_delta(self.timer.ticks_ms() as u32)
    }

    fn dispatch_deadline(&mut self, key: Deadline) {
        match key {
            Deadline::StaInfo(addr, node) => {
                debug!("station {} timed out on node {}", addr, node);
                self.stations.remove_info(&addr, &node);
            }
            Deadline::NodeUpdate(path) => self.node_update(path),
            Deadline::NodeStep(path) => self.node_step(path),
            Deadline::RemoteTick => self.remote_tick(),
            Deadline::Reload => {
                if let Err(e) = self.transport.reload(&self.config.interfaces) {
                    warn!("peer socket reload failed: {:?}", e);
                }
            }
        }
    }

    /* ---------------- local nodes ---------------- */

    /// Attach to an AP daemon object once its path matches
    pub(crate) fn register_node(&mut self, path: &str, id: u32) {
        if !path.starts_with(NODE_PATH_PREFIX) {
            return;
        }

        info!("connecting to local node {}", path);
        let now32 = self.now() as u32;

        {
            let ln = self
                .local_nodes
                .entry(path.to_string())
                .or_insert_with(|| LocalNode::new(path, id));
            ln.obj_id = id;
        }

        if let Err(e) = self.bus.notify_response(id, true) {
            warn!("notify_response on {} failed: {:?}", path, e);
        }
        if let Err(e) = self.bus.bss_mgmt_enable(id) {
            warn!("bss_mgmt_enable on {} failed: {:?}", path, e);
        }
        if let Err(e) = self.bus.subscribe(id) {
            warn!("subscribe on {} failed: {:?}", path, e);
        }

        {
            let node_id = NodeId::Local(path.to_string());
            let ln = self.local_nodes.get(path).unwrap();
            for h in &mut self.handlers {
                h.init_node(&node_id, &ln.data);
            }
        }

        self.timeouts.set(Deadline::NodeUpdate(path.to_string()), 1, now32);
    }

    fn node_path_by_obj(&self, id: u32) -> Option<String> {
        self.local_nodes
            .values()
            .find(|ln| ln.obj_id == id)
            .map(|ln| ln.path.clone())
    }

    fn remove_node_by_obj(&mut self, id: u32) {
        if let Some(path) = self.node_path_by_obj(id) {
            self.free_local_node(&path);
        }
    }

    /// Tear down a local node, cascading its station infos
    pub(crate) fn free_local_node(&mut self, path: &str) {
        let node_id = NodeId::Local(path.to_string());

        if let Some(ln) = self.local_nodes.get(path) {
            for h in &mut self.handlers {
                h.free_node(&node_id, &ln.data);
            }
        }

        for addr in self.stations.remove_node_infos(&node_id) {
            self.timeouts.cancel(&Deadline::StaInfo(addr, node_id.clone()));
        }

        self.timeouts.cancel(&Deadline::NodeUpdate(path.to_string()));
        self.timeouts.cancel(&Deadline::NodeStep(path.to_string()));

        if let Some(ln) = self.local_nodes.remove(path) {
            if let Err(e) = self.bus.unsubscribe(ln.obj_id) {
                debug!("unsubscribe from {} failed: {:?}", path, e);
            }
            info!("removed local node {}", path);
        }
    }

    /// Poll period start: run handlers, restart the request cycle, run
    /// kick evaluation on the previous poll's data
    fn node_update(&mut self, path: String) {
        if !self.local_nodes.contains_key(&path) {
            return;
        }

        let now32 = self.now() as u32;
        trace!("local node {} update", path);

        {
            let node_id = NodeId::Local(path.clone());
            let ln = self.local_nodes.get_mut(&path).unwrap();
            for h in &mut self.handlers {
                h.update_node(&node_id, &mut ln.data);
            }
            ln.state = PollState::Idle;
        }

        self.timeouts.set(Deadline::NodeStep(path.clone()), 1, now32);
        self.kick_poll(&path);
        self.timeouts
            .set(Deadline::NodeUpdate(path), self.config.local_sta_update, now32);
    }

    /// Advance the request cycle one state
    fn node_step(&mut self, path: String) {
        let (obj_id, state) = match self.local_nodes.get_mut(&path) {
            Some(ln) => {
                ln.state = ln.state.next();
                (ln.obj_id, ln.state)
            }
            None => return,
        };

        match state {
            PollState::Idle => return,
            PollState::FetchClients => match self.bus.get_clients(obj_id) {
                Ok(list) => self.node_set_assoc(&path, list),
                Err(e) => warn!("get_clients on {} failed: {:?}", path, e),
            },
            PollState::PublishNeighbors => {
                let list = self.neighbor_entries_for(&path);
                if let Err(e) = self.bus.set_neighbor_list(obj_id, &list) {
                    warn!("rrm_nr_set on {} failed: {:?}", path, e);
                }
            }
            PollState::FetchOwnNeighbor => match self.bus.get_own_neighbor(obj_id) {
                Ok(Some(entry)) => {
                    if let Some(ln) = self.local_nodes.get_mut(&path) {
                        ln.data.rrm_nr = vec![entry];
                        ln.data.update_bssid_from_rrm();
                    }
                }
                Ok(None) => (),
                Err(e) => warn!("rrm_nr_get_own on {} failed: {:?}", path, e),
            },
        }

        let now32 = self.now() as u32;
        self.timeouts.set(Deadline::NodeStep(path), 1, now32);
    }

    /// Reconcile the AP daemon's client list with our station infos
    pub(crate) fn node_set_assoc(&mut self, path: &str, list: ClientList) {
        let now = self.now();
        let node_id = NodeId::Local(path.to_string());
        let node_freq = list.freq;

        if let Some(ln) = self.local_nodes.get_mut(path) {
            ln.data.freq = list.freq;
        }

        // Mark everyone connected as not-yet-seen in this pass
        for si in self.stations.infos_of_node_mut(&node_id) {
            if si.connected == ConnState::Connected {
                si.connected = ConnState::Stale;
            }
        }

        let mut n_assoc = 0u32;
        let kick_interval_ms = self.config.kick_client_active_sec as u64 * 1000;
        let scan_freqs = self.scan_freqs(&node_id);
        let mut beacon_reqs: Vec<BeaconRequest> = Vec::new();

        for (addr, entry) in &list.clients {
            let mut want_beacon = None;

            {
                let (si, _created) = self.stations.get_or_create_info(*addr, &node_id, now);

                if entry.assoc {
                    si.connected = ConnState::Connected;
                }

                if si.connected == ConnState::Connected {
                    n_assoc += 1;

                    if let Some((rx, tx)) = entry.bytes {
                        si.active_bytes.slide(rx, tx, now, kick_interval_ms);
                    }

                    // Hearing map: strong clients are probed less often
                    let interval = hearing::dyn_interval(&self.config, si.signal);
                    if now.saturating_sub(si.beacon_req.last_request) >= interval {
                        let fails = si.beacon_req.fails;
                        si.beacon_req.last_request = now;
                        si.beacon_req.fails = fails + 1;
                        want_beacon = Some(fails);
                    }
                }
            }

            if let Some(sta) = self.stations.sta_mut(addr) {
                if node_freq < 4000 {
                    sta.bands |= BandFlags::SEEN_2GHZ;
                } else {
                    sta.bands |= BandFlags::SEEN_5GHZ;
                }
            }

            {
                let node_id = node_id.clone();
                for h in &mut self.handlers {
                    h.update_sta(&node_id, *addr);
                }
            }

            if let Some(fails) = want_beacon {
                if let Some(req) = self.build_beacon_request(path, *addr, fails, &scan_freqs) {
                    beacon_reqs.push(req);
                }
            }
        }

        if let Some(ln) = self.local_nodes.get_mut(path) {
            ln.data.n_assoc = n_assoc;
        }

        // Whoever stayed stale is gone
        let mut swept: Vec<MacAddr> = Vec::new();
        for si in self.stations.infos_of_node_mut(&node_id) {
            if si.connected == ConnState::Stale {
                si.connected = ConnState::Disconnected;
                swept.push(si.addr);
            }
        }
        for addr in &swept {
            debug!("station {} disconnected from node {}", addr, path);
        }

        // Re-settle every touched timeout: connected cancels, the rest
        // re-arm for the local station lifetime
        for (addr, _) in &list.clients {
            self.update_si_timeout(addr, &node_id);
        }
        for addr in &swept {
            self.update_si_timeout(addr, &node_id);
        }

        let obj_id = match self.local_nodes.get(path) {
            Some(ln) => ln.obj_id,
            None => return,
        };
        for req in beacon_reqs {
            match self.bus.beacon_request(obj_id, &req) {
                Ok(ret) => debug!(
                    "beacon request to {} (channel {}, op-class {}, mode {}): {}",
                    req.addr, req.channel, req.op_class, req.mode, ret
                ),
                Err(e) => warn!("rrm_beacon_req on {} failed: {:?}", path, e),
            }
        }
    }

    /// Frequencies the band sweep may target: every local operating
    /// frequency plus whatever the capability handlers report for the node
    fn scan_freqs(&mut self, node_id: &NodeId) -> Vec<u32> {
        let mut freqs: Vec<u32> = self.local_nodes.values().map(|ln| ln.data.freq).collect();

        let mut extra = Vec::new();
        for h in &mut self.handlers {
            h.get_freqlist(node_id, &mut extra);
        }
        for f in extra {
            let freq = f.freq as u32;
            if !freqs.contains(&freq) {
                freqs.push(freq);
            }
        }

        freqs
    }

    fn build_beacon_request(
        &mut self,
        path: &str,
        addr: MacAddr,
        fails: u32,
        scan_freqs: &[u32],
    ) -> Option<BeaconRequest> {
        let ln = self.local_nodes.get_mut(path)?;
        let own_freq = ln.data.freq;

        // Sweep the other bands so reports cover every local frequency
        let freq = hearing::pick_scan_freq(scan_freqs, &mut ln.scan_cursor, own_freq)
            .unwrap_or(own_freq);

        let channel = hearing::channel_from_freq(freq).max(0);

        Some(BeaconRequest {
            addr,
            mode: hearing::request_mode(freq < 4000, fails),
            duration: 65535,
            channel: channel as u32,
            op_class: hearing::op_class_from_channel(channel),
        })
    }

    /// Neighbor entries of every other same-SSID node, local and remote
    fn neighbor_entries_for(&self, path: &str) -> Vec<NrEntry> {
        let ln = match self.local_nodes.get(path) {
            Some(ln) => ln,
            None => return Vec::new(),
        };
        let ssid = ln.data.ssid.clone();
        let mut out = Vec::new();

        for (other_path, other) in &self.local_nodes {
            if other_path != path && other.data.ssid == ssid {
                out.extend(other.data.rrm_nr.iter().cloned());
            }
        }
        for rn in self.remotes.iter() {
            if rn.data.ssid == ssid {
                out.extend(rn.data.rrm_nr.iter().cloned());
            }
        }

        out
    }

    /// Third tuple element of every same-SSID neighbor entry, the format
    /// the transition request wants
    fn disassoc_neighbors(&self, path: &str) -> Vec<String> {
        let ln = match self.local_nodes.get(path) {
            Some(ln) => ln,
            None => return Vec::new(),
        };
        let ssid = &ln.data.ssid;
        let mut out = Vec::new();

        for other in self.local_nodes.values() {
            if other.data.ssid == *ssid {
                out.extend(other.data.rrm_nr.iter().map(|e| e[2].clone()));
            }
        }
        for rn in self.remotes.iter() {
            if rn.data.ssid == *ssid {
                out.extend(rn.data.rrm_nr.iter().map(|e| e[2].clone()));
            }
        }

        out
    }

    /* ---------------- kick evaluation ---------------- */

    /// Per-poll policy pass: roam state machines plus load kick
    pub(crate) fn kick_poll(&mut self, path: &str) {
        let now = self.now();
        let node_id = NodeId::Local(path.to_string());

        let (node_data, thr_ok) = {
            let cfg = &self.config;
            let ln = match self.local_nodes.get_mut(path) {
                Some(ln) => ln,
                None => return,
            };

            if cfg.load_kick_enabled && ln.data.load >= cfg.load_kick_threshold {
                ln.load_thr_count += 1;
            } else {
                ln.load_thr_count = 0;
            }

            let polls_needed = div_round_up(cfg.load_kick_delay, cfg.local_sta_update);
            (ln.data.clone(), ln.load_thr_count >= polls_needed.max(1))
        };

        // Candidate scoring first, with the tables borrowed shared
        let candidates: Vec<(MacAddr, bool)> = {
            let views = self.nodes_view();
            self.stations
                .iter()
                .filter_map(|(addr, sta)| {
                    let si = sta.infos.get(&node_id)?;
                    if !si.connected.is_connected() {
                        return None;
                    }
                    let better =
                        policy::find_better_candidate(&self.config, sta, &node_id, &views, now)
                            .is_some();
                    Some((*addr, better))
                })
                .collect()
        };

        let mut actions: Vec<(MacAddr, RoamAction)> = Vec::new();
        for (addr, has_candidate) in candidates {
            if let Some(si) = self.stations.info_mut(&addr, &node_id) {
                if let Some(action) = policy::roam_sm(&self.config, si, has_candidate, now) {
                    actions.push((addr, action));
                }
            }
        }

        if thr_ok {
            if let Some(victim) = policy::load_kick_candidate(
                &self.config,
                &node_data,
                self.stations.infos_of_node(&node_id),
            ) {
                if !actions.iter().any(|(a, act)| *a == victim && *act == RoamAction::Kick) {
                    debug!("load kick on {} targets {}", path, victim);
                    actions.push((victim, RoamAction::Kick));
                }
            }
        }

        for (addr, action) in actions {
            self.execute_action(path, &node_id, addr, action, now);
        }
    }

    fn execute_action(
        &mut self,
        path: &str,
        node_id: &NodeId,
        addr: MacAddr,
        action: RoamAction,
        now: u64,
    ) {
        let obj_id = match self.local_nodes.get(path) {
            Some(ln) => ln.obj_id,
            None => return,
        };

        match action {
            RoamAction::TriggerScan => {
                let scan_band = match self.stations.info_mut(&addr, node_id) {
                    Some(si) => {
                        si.scan_band = !si.scan_band;
                        si.scan_band
                    }
                    None => return,
                };

                let req = BeaconRequest {
                    addr,
                    mode: 1,
                    duration: 65535,
                    channel: 255,
                    op_class: if scan_band { 1 } else { 12 },
                };
                match self.bus.beacon_request(obj_id, &req) {
                    Ok(ret) => debug!("roam scan for {} on {}: {}", addr, path, ret),
                    Err(e) => warn!("rrm_beacon_req on {} failed: {:?}", path, e),
                }
            }
            RoamAction::Notify => {
                let req = DisassocRequest {
                    addr,
                    duration: self.config.roam_kick_delay,
                    neighbors: self.disassoc_neighbors(path),
                };

                let outcome = self.bus.disassoc_imminent(obj_id, &req);
                match outcome {
                    Ok(0) => debug!("transition hint sent to {} on {}", addr, path),
                    Ok(ret) => {
                        warn!("wnm_disassoc_imminent for {} returned {}", addr, ret);
                        if let Some(si) = self.stations.info_mut(&addr, node_id) {
                            policy::revert_notify(si, now);
                        }
                    }
                    Err(e) => {
                        warn!("wnm_disassoc_imminent for {} failed: {:?}", addr, e);
                        if let Some(si) = self.stations.info_mut(&addr, node_id) {
                            policy::revert_notify(si, now);
                        }
                    }
                }
            }
            RoamAction::Kick => {
                let reason = self.config.load_kick_reason_code;
                match self.bus.del_client(obj_id, addr, reason, true) {
                    Ok(0) => {
                        debug!("kicked {} from {} (reason {})", addr, path, reason);
                        if let Some(si) = self.stations.info_mut(&addr, node_id) {
                            policy::note_kick(si, now);
                        }
                        self.update_si_timeout(&addr, node_id);
                    }
                    Ok(ret) => warn!("del_client for {} returned {}, keeping state", addr, ret),
                    Err(e) => warn!("del_client for {} failed: {:?}", addr, e),
                }
            }
        }
    }

    /* ---------------- station events ---------------- */

    fn poll_bus(&mut self) {
        loop {
            match self.bus.poll_event() {
                Ok(Some(ev)) => self.handle_bus_event(ev),
                Ok(None) => break,
                Err(e) => {
                    warn!("bus poll failed: {:?}", e);
                    break;
                }
            }
        }
    }

    /// Dispatch one bus event
    pub fn handle_bus_event(&mut self, ev: BusEvent) {
        match ev {
            BusEvent::ObjectAdd { path, id } => self.register_node(&path, id),
            BusEvent::ObjectRemove { id } => self.remove_node_by_obj(id),
            BusEvent::Sta { node, event, addr, freq, signal } => {
                match self.node_path_by_obj(node) {
                    Some(path) => {
                        if let Err(e) = self.handle_sta_event(&path, event, addr, freq, signal) {
                            debug!("dropped {} event on {}: {:?}", event, path, e);
                        }
                    }
                    None => debug!("{} event from unknown object {}", event, node),
                }
            }
            BusEvent::BeaconReport { node, report } => match self.node_path_by_obj(node) {
                Some(path) => {
                    if let Err(e) = self.handle_beacon_report(&path, report) {
                        debug!("dropped beacon report on {}: {:?}", path, e);
                    }
                }
                None => debug!("beacon report from unknown object {}", node),
            },
        }
    }

    /// Admission pipeline for probe/auth/assoc events.
    ///
    /// The returned flag tells the bus integration whether to let the AP
    /// respond; errors map to an invalid-argument reply with no state
    /// touched.
    pub fn handle_sta_event(
        &mut self,
        path: &str,
        ev: EventType,
        addr: Option<MacAddr>,
        freq: Option<u32>,
        signal: Option<i32>,
    ) -> Result<bool, Error<B::Error>> {
        let (addr, freq) = match (addr, freq) {
            (Some(a), Some(f)) => (a, f),
            _ => return Err(Error::InvalidArgument),
        };
        let signal = signal.unwrap_or(NO_SIGNAL);

        if !self.local_nodes.contains_key(path) {
            return Err(Error::NotFound);
        }

        let node_id = NodeId::Local(path.to_string());
        let now = self.now();

        let created = self.stations.ingest(&node_id, addr, ev, freq, signal, &self.config, now);

        let accepted = {
            let views = self.nodes_view();
            let sta = self.stations.sta(&addr).ok_or(Error::NotFound)?;
            policy::check_request(&self.config, sta, &node_id, ev, &views, now)
        };

        self.stations.apply_admission(&node_id, &addr, ev, accepted, now);
        self.update_si_timeout(&addr, &node_id);

        if created {
            self.send_sta_update(&addr, path);
        }

        debug!(
            "received {} event from {} on {} (signal {}, freq {}), handled: {}",
            ev, addr, path, signal, freq, accepted
        );

        Ok(accepted)
    }

    /// Hearing map ingestion for client beacon reports
    pub fn handle_beacon_report(
        &mut self,
        path: &str,
        report: BeaconReportEvent,
    ) -> Result<(), Error<B::Error>> {
        let addr = report.addr.ok_or(Error::InvalidArgument)?;
        let bssid = report.bssid.ok_or(Error::InvalidArgument)?;
        let node_id = NodeId::Local(path.to_string());
        let now = self.now();

        // Only reports about APs we actually know enter the map
        let known = {
            let views = self.nodes_view();
            views.iter().any(|(_, d)| d.bssid == Some(bssid))
        };
        if !known {
            debug!("beacon report from {} names unknown bssid {}", addr, bssid);
            return Ok(());
        }

        let ttl = self.config.beacon_report_invalid_timeout;
        let si = self.stations.info_mut(&addr, &node_id).ok_or(Error::NotFound)?;

        si.stats[EventType::Beacon as usize].requests += 1;
        si.seen = now;
        si.beacon_req.fails /= 2;

        debug!(
            "beacon report from {} on {}: bssid {} op-class {} channel {} rcpi {} rsni {}",
            addr, path, bssid, report.op_class, report.channel, report.rcpi, report.rsni
        );

        hearing::upsert_report(
            si,
            hearing::BeaconReport {
                bssid,
                rcpi: report.rcpi,
                rsni: report.rsni,
                op_class: report.op_class,
                channel: report.channel,
                duration: report.duration,
                start_time: report.start_time,
                received: now,
            },
        );
        hearing::cleanup_reports(si, now, ttl);

        Ok(())
    }

    /// Settle the expiry timer for one station info per the connected rule
    pub(crate) fn update_si_timeout(&mut self, addr: &MacAddr, node: &NodeId) {
        let now32 = self.now() as u32;
        let key = Deadline::StaInfo(*addr, node.clone());

        match self.stations.info(addr, node) {
            Some(si) if si.connected == ConnState::Connected => {
                self.timeouts.cancel(&key);
            }
            Some(_) => {
                self.timeouts.set(key, self.config.local_sta_timeout, now32);
            }
            None => {
                self.timeouts.cancel(&key);
            }
        }
    }

    /// All known nodes with their data, the view policy scoring works on
    pub(crate) fn nodes_view(&self) -> Vec<(NodeId, &NodeData)> {
        let mut v = Vec::with_capacity(self.local_nodes.len() + self.remotes.len());

        for (path, ln) in &self.local_nodes {
            v.push((NodeId::Local(path.clone()), &ln.data));
        }
        for rn in self.remotes.iter() {
            v.push((NodeId::Remote { peer: rn.peer, name: rn.name.clone() }, &rn.data));
        }

        v
    }

    /* ---------------- peer sync ---------------- */

    /// Producer tick: full dump to every interface, then reap silent peers
    fn remote_tick(&mut self) {
        let now = self.now();
        let now32 = now as u32;

        self.timeouts
            .set(Deadline::RemoteTick, self.config.remote_update_interval, now32);

        if !self.config.remote_disabled {
            trace!("remote update (interval {})", self.config.remote_update_interval);

            let nodes: Vec<PeerNode> = self
                .local_nodes
                .iter()
                .map(|(path, ln)| self.build_peer_node(path, &ln.data, None, now))
                .collect();

            let id = self.gossip.local_id;
            let seq = self.gossip.next_seq();
            wire::encode_msg(&mut self.gossip.buf, id, seq, &nodes);

            let data = self.gossip.buf.finish();
            for iface in &self.config.interfaces {
                if let Err(e) = self.transport.send(iface, data) {
                    warn!("peer send on {} failed: {:?}", iface, e);
                }
            }
        }

        let max_ticks =
            self.config.remote_node_timeout / self.config.remote_update_interval.max(1);
        for rn in self.remotes.reap(max_ticks) {
            let node_id = NodeId::Remote { peer: rn.peer, name: rn.name.clone() };
            for addr in self.stations.remove_node_infos(&node_id) {
                self.timeouts.cancel(&Deadline::StaInfo(addr, node_id.clone()));
            }
            info!("remote node {} timed out", rn.key);
        }
    }

    /// Broadcast a single freshly-created station info
    fn send_sta_update(&mut self, addr: &MacAddr, path: &str) {
        if self.config.remote_disabled {
            return;
        }

        let now = self.now();
        let node = match self.local_nodes.get(path) {
            Some(ln) => self.build_peer_node(path, &ln.data, Some(*addr), now),
            None => return,
        };

        let id = self.gossip.local_id;
        let seq = self.gossip.next_seq();
        wire::encode_msg(&mut self.gossip.buf, id, seq, core::slice::from_ref(&node));

        let data = self.gossip.buf.finish();
        for iface in &self.config.interfaces {
            if let Err(e) = self.transport.send(iface, data) {
                warn!("peer send on {} failed: {:?}", iface, e);
            }
        }
    }

    fn build_peer_node(
        &self,
        path: &str,
        data: &NodeData,
        only_sta: Option<MacAddr>,
        now: u64,
    ) -> PeerNode {
        let node_id = NodeId::Local(path.to_string());
        let mut stations = Vec::new();

        for si in self.stations.infos_of_node(&node_id) {
            if let Some(addr) = only_sta {
                if si.addr != addr {
                    continue;
                }
            }

            let seen = now.saturating_sub(si.seen) as u32;
            stations.push(PeerSta {
                addr: si.addr,
                connected: si.connected.as_u8(),
                signal: si.signal,
                seen,
                timeout: self.config.local_sta_timeout as i32 - seen as i32,
            });
        }

        PeerNode {
            name: path.to_string(),
            ssid: data.ssid.clone(),
            mac: data.bssid,
            freq: data.freq,
            noise: data.noise,
            load: data.load,
            n_assoc: data.n_assoc,
            max_assoc: data.max_assoc,
            rrm_nr: data.rrm_nr.clone(),
            script_data: data.script_data.clone(),
            stations,
        }
    }

    fn poll_transport(&mut self) {
        loop {
            let (len, meta) = match self.transport.recv(&mut self.rx_buf) {
                Ok(Some(r)) => r,
                Ok(None) => break,
                Err(e) => {
                    warn!("peer receive failed: {:?}", e);
                    let now32 = self.now() as u32;
                    self.timeouts.set(Deadline::Reload, 1, now32);
                    break;
                }
            };

            let data = self.rx_buf[..len].to_vec();
            self.handle_datagram(&meta, &data);
        }
    }

    /// Consume one peer datagram
    pub fn handle_datagram(&mut self, meta: &RecvMeta, data: &[u8]) {
        let msg = match wire::decode_msg(data) {
            Ok(m) => m,
            Err(e) => {
                debug!("malformed peer message on {}: {:?}", meta.iface, e);
                return;
            }
        };

        if msg.id == self.gossip.local_id {
            return;
        }

        trace!(
            "received message on {} (id={:08x} seq={} nodes={})",
            meta.iface,
            msg.id,
            msg.seq,
            msg.nodes.len()
        );

        let addr_str = meta.addr.to_string();
        let now = self.now();
        for pn in msg.nodes {
            self.apply_peer_node(&addr_str, msg.id, pn, now);
        }
    }

    fn apply_peer_node(&mut self, addr_str: &str, peer: u32, pn: PeerNode, now: u64) {
        let node_id = NodeId::Remote { peer, name: pn.name.clone() };

        {
            let rn = self.remotes.get_or_create(addr_str, peer, &pn.name);
            rn.check = 0;
            rn.data.freq = pn.freq;
            rn.data.noise = pn.noise;
            rn.data.load = pn.load;
            rn.data.n_assoc = pn.n_assoc;
            rn.data.max_assoc = pn.max_assoc;
            rn.data.set_ssid(&pn.ssid);
            rn.data.rrm_nr = pn.rrm_nr;
            rn.data.script_data = pn.script_data;
            rn.data.bssid = pn.mac;
            if rn.data.bssid.is_none() {
                rn.data.update_bssid_from_rrm();
            }
        }

        for ps in pn.stations {
            if ps.timeout <= 0 {
                debug!("refusing expired station entry from {}", addr_str);
                continue;
            }

            let connected = {
                let (si, _created) = self.stations.get_or_create_info(ps.addr, &node_id, now);
                si.connected =
                    if ps.connected != 0 { ConnState::Connected } else { ConnState::Disconnected };
                si.signal = ps.signal;
                si.seen = now.saturating_sub(ps.seen as u64);
                si.connected
            };

            let key = Deadline::StaInfo(ps.addr, node_id.clone());
            if connected == ConnState::Connected {
                self.timeouts.cancel(&key);
            } else {
                self.timeouts.set(key, ps.timeout as u32, now as u32);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bus::mock::{MockBus, Transaction};
    use crate::bus::{BusObject, ClientEntry};
    use crate::config::ConfigUpdate;
    use crate::timer::mock::MockTimer;
    use crate::transport::mock::MockTransport;

    fn mac(last: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, last])
    }

    fn empty_controller(
        interfaces: &[&str],
    ) -> (Controller<MockBus, MockTimer, MockTransport>, MockTimer, MockTransport) {
        let mut cfg = SteerConfig::default();
        cfg.interfaces = interfaces.iter().map(|s| s.to_string()).collect();

        let timer = MockTimer::new();
        let transport = MockTransport::new();
        let ctl = Controller::new(cfg, timer.clone(), MockBus::new(), transport.clone()).unwrap();

        (ctl, timer, transport)
    }

    fn node_controller() -> (
        Controller<MockBus, MockTimer, MockTransport>,
        MockBus,
        MockTimer,
        MockTransport,
    ) {
        let bus = MockBus::with_objects(&[BusObject { path: "hostapd.wlan0".to_string(), id: 1 }]);
        bus.expect(&[
            Transaction::NotifyResponse { id: 1 },
            Transaction::BssMgmtEnable { id: 1 },
            Transaction::Subscribe { id: 1 },
        ]);

        let timer = MockTimer::new();
        let transport = MockTransport::new();
        let ctl = Controller::new(
            SteerConfig::default(),
            timer.clone(),
            bus.clone(),
            transport.clone(),
        )
        .unwrap();
        bus.done();

        (ctl, bus, timer, transport)
    }

    #[test]
    fn idle_controller_announces_itself() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);
        assert_eq!(transport.interfaces(), vec!["lo".to_string()]);

        timer.set_ms(1000);
        ctl.run_once();

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "lo");

        let msg = wire::decode_msg(&sent[0].1).unwrap();
        assert_eq!(msg.id, ctl.local_id());
        assert_eq!(msg.seq, 1);
        assert!(msg.nodes.is_empty());

        // The next tick carries the next sequence number
        timer.set_ms(2000);
        ctl.run_once();
        let sent = transport.take_sent();
        assert_eq!(wire::decode_msg(&sent[0].1).unwrap().seq, 2);
    }

    #[test]
    fn new_station_info_triggers_an_immediate_update() {
        let (mut ctl, _bus, _timer, transport) = node_controller();
        ctl.config.interfaces = vec!["lo".to_string()];

        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-72))
            .unwrap();

        let sent = transport.take_sent();
        assert_eq!(sent.len(), 1);
        let msg = wire::decode_msg(&sent[0].1).unwrap();
        assert_eq!(msg.nodes.len(), 1);
        assert_eq!(msg.nodes[0].name, "hostapd.wlan0");
        assert_eq!(msg.nodes[0].stations.len(), 1);
        assert_eq!(msg.nodes[0].stations[0].signal, -72);

        // A repeat event for the same info is not broadcast again
        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-71))
            .unwrap();
        assert!(transport.take_sent().is_empty());
    }

    #[test]
    fn peer_announcement_creates_remote_state() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);

        let node = PeerNode {
            name: "ap2".to_string(),
            ssid: "net".to_string(),
            freq: 5180,
            n_assoc: 1,
            stations: vec![PeerSta {
                addr: mac(1),
                connected: 1,
                signal: -55,
                seen: 500,
                timeout: 120_000,
            }],
            ..Default::default()
        };
        let mut buf = wire::BlobBuf::new();
        wire::encode_msg(&mut buf, 42, 1, core::slice::from_ref(&node));
        let data = buf.finish().to_vec();

        timer.set_ms(10_000);
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &data);
        ctl.run_once();

        let info = ctl.remote_info();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "fe80::2#ap2");
        assert_eq!(info[0].freq, 5180);
        assert_eq!(info[0].n_assoc, 1);

        let node_id = NodeId::Remote { peer: 42, name: "ap2".to_string() };
        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.signal, -55);
        assert_eq!(si.seen, 10_000 - 500);
        assert_eq!(si.connected, ConnState::Connected);

        // Connected info keeps no expiry armed
        assert!(!ctl.timeouts.is_set(&Deadline::StaInfo(mac(1), node_id)));
    }

    #[test]
    fn own_packets_are_dropped() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);

        let mut buf = wire::BlobBuf::new();
        wire::encode_msg(&mut buf, ctl.local_id(), 99, &[]);
        let data = buf.finish().to_vec();

        timer.set_ms(100);
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &data);
        ctl.run_once();

        assert!(ctl.remote_info().is_empty());
    }

    #[test]
    fn malformed_packets_leave_state_alone() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);

        timer.set_ms(100);
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &[1, 2, 3]);
        ctl.run_once();

        assert!(ctl.remote_info().is_empty());
        assert!(ctl.stations.is_empty());
    }

    #[test]
    fn expired_peer_station_entries_are_refused() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);

        let node = PeerNode {
            name: "ap2".to_string(),
            ssid: "net".to_string(),
            freq: 5180,
            stations: vec![PeerSta {
                addr: mac(1),
                connected: 0,
                signal: -55,
                seen: 200_000,
                timeout: -80_000,
            }],
            ..Default::default()
        };
        let mut buf = wire::BlobBuf::new();
        wire::encode_msg(&mut buf, 42, 1, core::slice::from_ref(&node));
        let data = buf.finish().to_vec();

        timer.set_ms(100);
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &data);
        ctl.run_once();

        // The node exists, the dead station entry does not
        assert_eq!(ctl.remote_info().len(), 1);
        assert!(ctl.stations.is_empty());
    }

    #[test]
    fn silent_remote_nodes_are_reaped_with_their_stations() {
        let (mut ctl, timer, transport) = empty_controller(&["lo"]);
        ctl.config.remote_node_timeout = 3000;

        let node = PeerNode {
            name: "ap2".to_string(),
            ssid: "net".to_string(),
            freq: 5180,
            stations: vec![PeerSta {
                addr: mac(1),
                connected: 1,
                signal: -55,
                seen: 0,
                timeout: 600_000,
            }],
            ..Default::default()
        };
        let mut buf = wire::BlobBuf::new();
        wire::encode_msg(&mut buf, 42, 1, core::slice::from_ref(&node));
        let data = buf.finish().to_vec();

        timer.set_ms(500);
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &data);
        ctl.run_once();
        assert_eq!(ctl.remote_info().len(), 1);

        // remote_node_timeout / remote_update_interval ticks without a
        // refresh and the node cascades away
        for t in 1..=6u64 {
            timer.set_ms(t * 1000);
            ctl.run_once();
        }

        assert!(ctl.remote_info().is_empty());
        assert!(ctl.stations.is_empty());
    }

    #[test]
    fn station_info_expires_through_the_queue() {
        let (mut ctl, bus, timer, _transport) = node_controller();

        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-72))
            .unwrap();
        let node_id = NodeId::Local("hostapd.wlan0".to_string());
        assert!(ctl.timeouts.is_set(&Deadline::StaInfo(mac(1), node_id.clone())));

        timer.set_ms(ctl.config.local_sta_timeout as u64 - 1);
        ctl.run_once();
        assert!(ctl.stations.sta(&mac(1)).is_some());

        // The poll cycle armed by the previous wakeup also lands here
        bus.expect(&[Transaction::GetClients { id: 1, reply: ClientList::default() }]);
        timer.set_ms(ctl.config.local_sta_timeout as u64);
        ctl.run_once();
        bus.done();
        assert!(ctl.stations.sta(&mac(1)).is_none());
        assert!(!ctl.timeouts.is_set(&Deadline::StaInfo(mac(1), node_id)));
    }

    #[test]
    fn load_kick_fires_after_persistent_load() {
        let (mut ctl, bus, timer, _transport) = node_controller();
        ctl.update_config(&ConfigUpdate {
            load_kick_enabled: Some(true),
            load_kick_threshold: Some(50),
            load_kick_min_clients: Some(1),
            load_kick_delay: Some(2000),
            kick_client_active_kbits: Some(1),
            ..Default::default()
        });

        timer.set_ms(1000);
        ctl.node_set_assoc(
            "hostapd.wlan0",
            ClientList {
                freq: 2412,
                clients: vec![(mac(1), ClientEntry { assoc: true, bytes: Some((0, 0)) })],
            },
        );

        timer.set_ms(31_000);
        ctl.node_set_assoc(
            "hostapd.wlan0",
            ClientList {
                freq: 2412,
                clients: vec![(mac(1), ClientEntry { assoc: true, bytes: Some((1_000_000, 0)) })],
            },
        );

        ctl.local_nodes.get_mut("hostapd.wlan0").unwrap().data.load = 80;

        // First poll over the threshold arms the persistence counter only
        ctl.kick_poll("hostapd.wlan0");
        bus.done();

        bus.expect(&[Transaction::DelClient { id: 1, addr: mac(1), reason: 5, ret: 0 }]);
        ctl.kick_poll("hostapd.wlan0");
        bus.done();

        let node_id = NodeId::Local("hostapd.wlan0".to_string());
        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.connected, ConnState::Disconnected);
        assert_eq!(si.kick_count, 1);
        assert!(ctl.timeouts.is_set(&Deadline::StaInfo(mac(1), node_id)));
    }

    #[test]
    fn connected_client_gets_a_beacon_request() {
        let (mut ctl, bus, timer, _transport) = node_controller();

        timer.set_ms(100);
        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-60))
            .unwrap();

        // Interval for -60 dBm is exactly beacon_request_frequency
        timer.set_ms(30_000);
        bus.expect(&[Transaction::BeaconRequest {
            id: 1,
            req: BeaconRequest { addr: mac(1), mode: 1, duration: 65535, channel: 1, op_class: 81 },
            ret: 0,
        }]);
        ctl.node_set_assoc(
            "hostapd.wlan0",
            ClientList {
                freq: 2412,
                clients: vec![(mac(1), ClientEntry { assoc: true, bytes: None })],
            },
        );
        bus.done();

        let node_id = NodeId::Local("hostapd.wlan0".to_string());
        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.beacon_req.last_request, 30_000);
        assert_eq!(si.beacon_req.fails, 1);
    }

    struct FreqlistHandler;

    impl NodeHandler for FreqlistHandler {
        fn get_freqlist(&mut self, _id: &NodeId, out: &mut Vec<crate::node::FreqData>) {
            out.push(crate::node::FreqData { freq: 5180, txpower: 20, dfs: false });
        }
    }

    #[test]
    fn handler_freqlist_widens_the_band_sweep() {
        let (mut ctl, bus, timer, _transport) = node_controller();
        ctl.add_handler(Box::new(FreqlistHandler));

        timer.set_ms(100);
        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-60))
            .unwrap();

        // The sweep leaves the node's own 2.4 GHz channel for the
        // handler-reported 5 GHz frequency
        timer.set_ms(30_000);
        bus.expect(&[Transaction::BeaconRequest {
            id: 1,
            req: BeaconRequest { addr: mac(1), mode: 0, duration: 65535, channel: 36, op_class: 115 },
            ret: 0,
        }]);
        ctl.node_set_assoc(
            "hostapd.wlan0",
            ClientList {
                freq: 2412,
                clients: vec![(mac(1), ClientEntry { assoc: true, bytes: None })],
            },
        );
        bus.done();
    }

    #[test]
    fn beacon_report_lands_in_the_hearing_map() {
        let (mut ctl, _bus, timer, _transport) = node_controller();
        let bssid: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();

        ctl.local_nodes.get_mut("hostapd.wlan0").unwrap().data.bssid = Some(bssid);
        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-60))
            .unwrap();

        // Pretend a request was outstanding
        let node_id = NodeId::Local("hostapd.wlan0".to_string());
        ctl.stations.info_mut(&mac(1), &node_id).unwrap().beacon_req.fails = 4;

        timer.set_ms(2000);
        ctl.handle_beacon_report(
            "hostapd.wlan0",
            BeaconReportEvent {
                addr: Some(mac(1)),
                bssid: Some(bssid),
                op_class: 81,
                channel: 1,
                rcpi: 120,
                rsni: 40,
                duration: 100,
                start_time: 7,
            },
        )
        .unwrap();

        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.beacons.len(), 1);
        assert_eq!(si.beacons[&bssid].rcpi, 120);
        assert_eq!(si.beacon_req.fails, 2);

        // Reports about unknown BSSIDs are dropped
        let unknown: MacAddr = "11:22:33:44:55:66".parse().unwrap();
        ctl.handle_beacon_report(
            "hostapd.wlan0",
            BeaconReportEvent {
                addr: Some(mac(1)),
                bssid: Some(unknown),
                ..Default::default()
            },
        )
        .unwrap();
        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.beacons.len(), 1);
    }

    #[test]
    fn weak_client_roams_through_notify_and_kick() {
        let (mut ctl, bus, timer, transport) = node_controller();
        ctl.update_config(&ConfigUpdate {
            roam_trigger_snr: Some(-70),
            roam_scan_interval: Some(100),
            roam_scan_tries: Some(1),
            roam_kick_delay: Some(100),
            seen_policy_timeout: Some(600_000),
            ..Default::default()
        });

        // Weak client associated locally
        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-80))
            .unwrap();
        ctl.node_set_assoc(
            "hostapd.wlan0",
            ClientList {
                freq: 2412,
                clients: vec![(mac(1), ClientEntry { assoc: true, bytes: None })],
            },
        );

        // A peer hears the same client far better on 5 GHz
        let node = PeerNode {
            name: "ap2".to_string(),
            ssid: "net".to_string(),
            freq: 5180,
            stations: vec![PeerSta {
                addr: mac(1),
                connected: 0,
                signal: -50,
                seen: 0,
                timeout: 600_000,
            }],
            ..Default::default()
        };
        let mut buf = wire::BlobBuf::new();
        wire::encode_msg(&mut buf, 42, 1, core::slice::from_ref(&node));
        let data = buf.finish().to_vec();
        transport.push_datagram("lo", "fe80::2".parse().unwrap(), &data);
        ctl.run_once();

        let node_id = NodeId::Local("hostapd.wlan0".to_string());

        // Trigger: weak signal, interval elapsed
        timer.set_ms(60_000);
        ctl.kick_poll("hostapd.wlan0");
        assert_eq!(
            ctl.stations.info(&mac(1), &node_id).unwrap().roam_state,
            policy::RoamState::Scan
        );

        // The candidate is already known, so the scan resolves immediately
        timer.set_ms(60_100);
        ctl.kick_poll("hostapd.wlan0");
        ctl.kick_poll("hostapd.wlan0");

        bus.expect(&[Transaction::DisassocImminent {
            id: 1,
            req: DisassocRequest { addr: mac(1), duration: 100, neighbors: vec![] },
            ret: 0,
        }]);
        ctl.kick_poll("hostapd.wlan0");
        bus.done();
        assert_eq!(
            ctl.stations.info(&mac(1), &node_id).unwrap().roam_state,
            policy::RoamState::NotifyKick
        );

        // After the advertised delay the client is removed
        timer.set_ms(60_200);
        bus.expect(&[Transaction::DelClient { id: 1, addr: mac(1), reason: 5, ret: 0 }]);
        ctl.kick_poll("hostapd.wlan0");
        bus.done();

        let si = ctl.stations.info(&mac(1), &node_id).unwrap();
        assert_eq!(si.roam_state, policy::RoamState::Idle);
        assert_eq!(si.connected, ConnState::Disconnected);
        assert_eq!(si.kick_count, 1);
    }

    #[test]
    fn object_removal_cascades_station_state() {
        let (mut ctl, bus, _timer, _transport) = node_controller();

        ctl.handle_sta_event("hostapd.wlan0", EventType::Probe, Some(mac(1)), Some(2412), Some(-72))
            .unwrap();
        assert_eq!(ctl.stations.len(), 1);

        bus.expect(&[Transaction::Unsubscribe { id: 1 }]);
        ctl.handle_bus_event(BusEvent::ObjectRemove { id: 1 });
        bus.done();

        assert!(ctl.local_nodes.is_empty());
        assert!(ctl.stations.is_empty());
        assert!(ctl.local_info().is_empty());
    }

    #[test]
    fn non_hostapd_objects_are_ignored() {
        let (mut ctl, _timer, _transport) = empty_controller(&[]);

        ctl.handle_bus_event(BusEvent::ObjectAdd { path: "dnsmasq".to_string(), id: 9 });

        assert!(ctl.local_nodes.is_empty());
    }
}
