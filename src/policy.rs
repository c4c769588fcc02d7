//! Roam and load-kick policy.
//!
//! Decides whether client requests are admitted, whether a better AP
//! exists for a client, and drives the per-client roam state machine that
//! turns that knowledge into BSS-transition hints and kicks.
//
// https://github.com/apsteer/apsteer

use log::debug;

use crate::config::SteerConfig;
use crate::node::{NodeData, NodeId};
use crate::sta::{Sta, StaInfo};
use crate::{EventType, MacAddr, NO_SIGNAL};

/// Per-client roam trigger states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(strum::Display)]
pub enum RoamState {
    Idle,
    Scan,
    ScanDone,
    WaitKick,
    NotifyKick,
    Kick,
}

/// Actions requested by one state-machine step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoamAction {
    /// Issue a client beacon request on the next band
    TriggerScan,
    /// Send the BSS-transition hint (disassoc imminent)
    Notify,
    /// Remove the client from the BSS
    Kick,
}

fn lookup<'n>(nodes: &'n [(NodeId, &'n NodeData)], id: &NodeId) -> Option<&'n NodeData> {
    nodes.iter().find(|(n, _)| n == id).map(|(_, d)| *d)
}

fn node_full(node: &NodeData) -> bool {
    node.max_assoc > 0 && node.n_assoc >= node.max_assoc
}

/// Score `cand` against the client's current association
fn is_better_candidate(
    cfg: &SteerConfig,
    cur: &StaInfo,
    cur_node: &NodeData,
    cand: &StaInfo,
    cand_node: &NodeData,
    now: u64,
) -> bool {
    if now.saturating_sub(cand.seen) > cfg.seen_policy_timeout as u64 {
        return false;
    }

    if cand.signal == NO_SIGNAL {
        return false;
    }

    if cfg.min_connect_snr != 0 && cand.signal < cfg.min_connect_snr {
        return false;
    }

    if node_full(cand_node) {
        return false;
    }

    let cur_2ghz = cur_node.freq < 4000;
    let cand_2ghz = cand_node.freq < 4000;
    let mut delta = cand.signal - cur.signal;

    if !cur_2ghz && cand_2ghz {
        delta -= cfg.band_steering_threshold as i32;
    } else if cur_2ghz && !cand_2ghz {
        delta += cfg.band_steering_threshold as i32;
    }

    if cand_node.load > cur_node.load + cfg.load_balancing_threshold {
        delta -= cfg.load_balancing_threshold as i32;
    }

    delta > cfg.signal_diff_threshold as i32
}

/// Best alternative node for the station, if any beats its current one
pub fn find_better_candidate<'a>(
    cfg: &SteerConfig,
    sta: &'a Sta,
    cur_node: &NodeId,
    nodes: &[(NodeId, &NodeData)],
    now: u64,
) -> Option<&'a NodeId> {
    let cur = sta.infos.get(cur_node)?;
    let cur_data = lookup(nodes, cur_node)?;

    for (id, si) in &sta.infos {
        if id == cur_node {
            continue;
        }

        let data = match lookup(nodes, id) {
            Some(d) => d,
            None => continue,
        };

        if is_better_candidate(cfg, cur, cur_data, si, data, now) {
            return Some(id);
        }
    }

    None
}

/// Admission decision for an ingested event
pub fn check_request(
    cfg: &SteerConfig,
    sta: &Sta,
    cur_node: &NodeId,
    ev: EventType,
    nodes: &[(NodeId, &NodeData)],
    now: u64,
) -> bool {
    if ev == EventType::Auth {
        return true;
    }

    let si = match sta.infos.get(cur_node) {
        Some(si) => si,
        None => return true,
    };

    // Never steer a client that only just showed up
    if cfg.initial_connect_delay > 0
        && now.saturating_sub(si.created) < cfg.initial_connect_delay as u64
    {
        return false;
    }

    if cfg.min_snr != 0 && si.signal != NO_SIGNAL && si.signal < cfg.min_snr {
        debug!("station {} below min_snr, rejecting {}", si.addr, ev);
        return false;
    }

    if let Some(data) = lookup(nodes, cur_node) {
        if node_full(data) {
            return false;
        }
    }

    if ev == EventType::Probe {
        // Stop withholding probe responses once the client has ignored us
        // max_retry_band times in a row
        if si.stats[ev as usize].blocked_cur >= cfg.max_retry_band {
            return true;
        }

        if find_better_candidate(cfg, sta, cur_node, nodes, now).is_some() {
            debug!("station {} has a better candidate, rejecting probe", si.addr);
            return false;
        }
    }

    true
}

fn set_state(si: &mut StaInfo, state: RoamState, now: u64) {
    if si.roam_state == state {
        return;
    }

    debug!("station {} roam state {} -> {}", si.addr, si.roam_state, state);
    si.roam_state = state;
    si.roam_event = now;
}

/// One step of the per-client roam state machine.
///
/// `has_candidate` is the current scoring result for the client; returned
/// actions are executed by the local node, which reports failures back via
/// `note_kick` / `revert_notify`.
pub fn roam_sm(
    cfg: &SteerConfig,
    si: &mut StaInfo,
    has_candidate: bool,
    now: u64,
) -> Option<RoamAction> {
    match si.roam_state {
        RoamState::Idle => {
            if cfg.roam_trigger_snr != 0
                && si.signal != NO_SIGNAL
                && si.signal < cfg.roam_trigger_snr
                && now.saturating_sub(si.roam_event) >= cfg.roam_trigger_interval as u64
            {
                si.roam_tries = 0;
                set_state(si, RoamState::Scan, now);
            }
            None
        }
        RoamState::Scan => {
            if now.saturating_sub(si.roam_event) < cfg.roam_scan_interval as u64 {
                return None;
            }

            if has_candidate {
                si.roam_scan_done = now;
                set_state(si, RoamState::ScanDone, now);
                return None;
            }

            if si.roam_tries >= cfg.roam_scan_tries {
                // Scan budget exhausted without a viable target
                si.roam_scan_done = now;
                set_state(si, RoamState::Idle, now);
                return None;
            }

            si.roam_tries += 1;
            si.roam_event = now;
            Some(RoamAction::TriggerScan)
        }
        RoamState::ScanDone => {
            if has_candidate {
                set_state(si, RoamState::WaitKick, now);
            } else {
                set_state(si, RoamState::Idle, now);
            }
            None
        }
        RoamState::WaitKick => {
            set_state(si, RoamState::NotifyKick, now);
            Some(RoamAction::Notify)
        }
        RoamState::NotifyKick => {
            if now.saturating_sub(si.roam_event) >= cfg.roam_kick_delay as u64 {
                Some(RoamAction::Kick)
            } else {
                None
            }
        }
        RoamState::Kick => {
            set_state(si, RoamState::Idle, now);
            None
        }
    }
}

/// Bookkeeping after a kick was actually delivered
pub fn note_kick(si: &mut StaInfo, now: u64) {
    si.connected = crate::sta::ConnState::Disconnected;
    si.roam_kick = now;
    si.kick_count += 1;
    set_state(si, RoamState::Idle, now);
}

/// Undo the Notify transition after a failed transition call so the next
/// poll retries it
pub fn revert_notify(si: &mut StaInfo, now: u64) {
    set_state(si, RoamState::WaitKick, now);
}

/// Pick a load-kick victim among the node's clients.
///
/// The caller is responsible for the load-persistence gate; this checks
/// the instantaneous conditions and the per-client activity threshold.
pub fn load_kick_candidate<'a>(
    cfg: &SteerConfig,
    node: &NodeData,
    infos: impl Iterator<Item = &'a StaInfo>,
) -> Option<MacAddr> {
    if !cfg.load_kick_enabled {
        return None;
    }

    if node.load < cfg.load_kick_threshold {
        return None;
    }

    if node.n_assoc < cfg.load_kick_min_clients {
        return None;
    }

    let min_rate = cfg.kick_client_active_kbits as u64 * 1000;
    infos
        .filter(|si| si.connected.is_connected())
        .find(|si| si.active_bytes.rate_bits(cfg.kick_client_active_sec as u64) > min_rate)
        .map(|si| si.addr)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sta::{ConnState, StaTable};

    fn mac(last: u8) -> MacAddr {
        MacAddr([0x02, 0, 0, 0, 0, last])
    }

    fn node_2g() -> NodeId {
        NodeId::Local("hostapd.wlan0".to_string())
    }

    fn node_5g() -> NodeId {
        NodeId::Local("hostapd.wlan1".to_string())
    }

    fn data(freq: u32, load: u32) -> NodeData {
        NodeData { ssid: "net".to_string(), freq, load, ..Default::default() }
    }

    fn table_with_two_nodes(sig_2g: i32, sig_5g: i32, now: u64) -> StaTable {
        let cfg = SteerConfig::default();
        let mut table = StaTable::new();
        table.ingest(&node_2g(), mac(1), EventType::Probe, 2412, sig_2g, &cfg, now);
        table.ingest(&node_5g(), mac(1), EventType::Probe, 5180, sig_5g, &cfg, now);
        table
    }

    #[test]
    fn band_steering_bonus_wins_despite_weaker_signal() {
        let mut cfg = SteerConfig::default();
        cfg.band_steering_threshold = 5;
        cfg.signal_diff_threshold = 0;

        let table = table_with_two_nodes(-60, -62, 1000);
        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        // delta = -62 - (-60) + 5 = +3 > 0
        let winner = find_better_candidate(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), &nodes, 1000);
        assert_eq!(winner, Some(&node_5g()));
    }

    #[test]
    fn moving_down_a_band_pays_the_penalty() {
        let cfg = SteerConfig::default();
        let table = table_with_two_nodes(-58, -60, 1000);
        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        // From the 5 GHz node's view: delta = -58 - (-60) - 5 = -3
        let winner = find_better_candidate(&cfg, table.sta(&mac(1)).unwrap(), &node_5g(), &nodes, 1000);
        assert_eq!(winner, None);
    }

    #[test]
    fn stale_candidates_are_ignored() {
        let cfg = SteerConfig::default();
        let table = table_with_two_nodes(-80, -50, 1000);
        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        let late = 1000 + cfg.seen_policy_timeout as u64 + 1;
        assert_eq!(
            find_better_candidate(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), &nodes, late),
            None
        );
    }

    #[test]
    fn heavier_load_costs_the_margin() {
        let mut cfg = SteerConfig::default();
        cfg.load_balancing_threshold = 5;

        let table = table_with_two_nodes(-60, -57, 1000);
        let d2 = data(2412, 10);
        // Same-band comparison would win by 3; the busy node loses it
        let d5_busy = data(5180, 90);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5_busy)];

        // delta = 3 + 5 (band) - 5 (load) = 3 > 0, still wins
        assert!(find_better_candidate(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), &nodes, 1000).is_some());

        let mut cfg2 = cfg.clone();
        cfg2.band_steering_threshold = 0;
        cfg2.signal_diff_threshold = 2;
        // delta = 3 - 5 = -2, rejected
        assert!(find_better_candidate(&cfg2, table.sta(&mac(1)).unwrap(), &node_2g(), &nodes, 1000).is_none());
    }

    #[test]
    fn full_nodes_never_win() {
        let cfg = SteerConfig::default();
        let table = table_with_two_nodes(-80, -50, 1000);
        let d2 = data(2412, 0);
        let mut d5 = data(5180, 0);
        d5.max_assoc = 4;
        d5.n_assoc = 4;
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        assert_eq!(
            find_better_candidate(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), &nodes, 1000),
            None
        );
    }

    #[test]
    fn auth_requests_always_pass() {
        let mut cfg = SteerConfig::default();
        cfg.initial_connect_delay = 10_000;
        let table = table_with_two_nodes(-60, -50, 1000);
        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        assert!(check_request(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), EventType::Auth, &nodes, 1001));
    }

    #[test]
    fn initial_connect_grace_denies() {
        let mut cfg = SteerConfig::default();
        cfg.initial_connect_delay = 10_000;
        let table = table_with_two_nodes(-60, NO_SIGNAL, 1000);
        let d2 = data(2412, 0);
        let nodes = vec![(node_2g(), &d2)];

        let sta = table.sta(&mac(1)).unwrap();
        assert!(!check_request(&cfg, sta, &node_2g(), EventType::Probe, &nodes, 5000));
        assert!(check_request(&cfg, sta, &node_2g(), EventType::Probe, &nodes, 12_000));
    }

    #[test]
    fn probe_blocked_while_better_candidate_exists() {
        let cfg = SteerConfig::default();
        let table = table_with_two_nodes(-80, -50, 1000);
        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        let sta = table.sta(&mac(1)).unwrap();
        assert!(!check_request(&cfg, sta, &node_2g(), EventType::Probe, &nodes, 1000));
        // The candidate's own probes are fine
        assert!(check_request(&cfg, sta, &node_5g(), EventType::Probe, &nodes, 1000));
    }

    #[test]
    fn retry_budget_overrides_blocking() {
        let cfg = SteerConfig::default();
        let mut table = table_with_two_nodes(-80, -50, 1000);

        let si = table.info_mut(&mac(1), &node_2g()).unwrap();
        si.stats[EventType::Probe as usize].blocked_cur = cfg.max_retry_band;

        let d2 = data(2412, 0);
        let d5 = data(5180, 0);
        let nodes = vec![(node_2g(), &d2), (node_5g(), &d5)];

        assert!(check_request(&cfg, table.sta(&mac(1)).unwrap(), &node_2g(), EventType::Probe, &nodes, 1000));
    }

    #[test]
    fn roam_cycle_reaches_kick() {
        let mut cfg = SteerConfig::default();
        cfg.roam_trigger_snr = -70;
        cfg.roam_scan_interval = 100;
        cfg.roam_scan_tries = 2;
        cfg.roam_kick_delay = 100;

        let mut si = StaInfo::new(mac(1), node_2g(), 0);
        si.connected = ConnState::Connected;
        si.signal = -75;
        si.roam_event = 0;

        let mut now = cfg.roam_trigger_interval as u64;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), None);
        assert_eq!(si.roam_state, RoamState::Scan);

        // Two scan requests, spaced by the scan interval
        now += 100;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), Some(RoamAction::TriggerScan));
        now += 100;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), Some(RoamAction::TriggerScan));

        // A candidate shows up: scan done, then kick sequence
        now += 100;
        assert_eq!(roam_sm(&cfg, &mut si, true, now), None);
        assert_eq!(si.roam_state, RoamState::ScanDone);
        assert_eq!(si.roam_scan_done, now);

        assert_eq!(roam_sm(&cfg, &mut si, true, now), None);
        assert_eq!(si.roam_state, RoamState::WaitKick);

        assert_eq!(roam_sm(&cfg, &mut si, true, now), Some(RoamAction::Notify));
        assert_eq!(si.roam_state, RoamState::NotifyKick);

        // Kick only after the advertised delay
        assert_eq!(roam_sm(&cfg, &mut si, true, now + 50), None);
        assert_eq!(roam_sm(&cfg, &mut si, true, now + 100), Some(RoamAction::Kick));

        note_kick(&mut si, now + 100);
        assert_eq!(si.roam_state, RoamState::Idle);
        assert_eq!(si.kick_count, 1);
        assert_eq!(si.connected, ConnState::Disconnected);
    }

    #[test]
    fn scan_without_candidate_falls_back_to_idle() {
        let mut cfg = SteerConfig::default();
        cfg.roam_trigger_snr = -70;
        cfg.roam_scan_interval = 100;
        cfg.roam_scan_tries = 1;

        let mut si = StaInfo::new(mac(1), node_2g(), 0);
        si.signal = -75;

        let mut now = cfg.roam_trigger_interval as u64;
        roam_sm(&cfg, &mut si, false, now);
        assert_eq!(si.roam_state, RoamState::Scan);

        now += 100;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), Some(RoamAction::TriggerScan));
        now += 100;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), None);
        assert_eq!(si.roam_state, RoamState::Idle);

        // Re-trigger is gated by the trigger interval
        now += 10;
        assert_eq!(roam_sm(&cfg, &mut si, false, now), None);
        assert_eq!(si.roam_state, RoamState::Idle);
    }

    #[test]
    fn load_kick_picks_the_active_client() {
        let mut cfg = SteerConfig::default();
        cfg.load_kick_enabled = true;
        cfg.load_kick_threshold = 50;
        cfg.load_kick_min_clients = 1;
        cfg.kick_client_active_kbits = 1;

        let mut node = data(2412, 80);
        node.n_assoc = 2;

        let mut idle_si = StaInfo::new(mac(1), node_2g(), 0);
        idle_si.connected = ConnState::Connected;

        let mut busy_si = StaInfo::new(mac(2), node_2g(), 0);
        busy_si.connected = ConnState::Connected;
        busy_si.active_bytes.slide(0, 0, 0, 0);
        busy_si.active_bytes.slide(1_000_000, 0, 30_000, 30_000);

        let infos = vec![idle_si.clone(), busy_si.clone()];
        assert_eq!(load_kick_candidate(&cfg, &node, infos.iter()), Some(mac(2)));

        // Below the load threshold nothing happens
        let calm = data(2412, 20);
        assert_eq!(load_kick_candidate(&cfg, &calm, infos.iter()), None);

        cfg.load_kick_enabled = false;
        assert_eq!(load_kick_candidate(&cfg, &node, infos.iter()), None);
    }
}
