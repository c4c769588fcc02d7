//! Local AP node state.
//!
//! One record per AP daemon object this controller is attached to. The
//! poll cycle and client reconciliation are driven by the controller; this
//! module owns the node record itself plus the derived channel-load
//! tracking.
//
// https://github.com/apsteer/apsteer

use log::debug;

use crate::node::{NodeData, SurveyData};

/// Object path prefix identifying subscribable AP objects
pub const NODE_PATH_PREFIX: &str = "hostapd.";

/// Poll request cycle, one state per AP daemon call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    FetchClients,
    PublishNeighbors,
    FetchOwnNeighbor,
}

impl PollState {
    /// Next request in the cycle, wrapping back to idle
    pub fn next(self) -> PollState {
        match self {
            PollState::Idle => PollState::FetchClients,
            PollState::FetchClients => PollState::PublishNeighbors,
            PollState::PublishNeighbors => PollState::FetchOwnNeighbor,
            PollState::FetchOwnNeighbor => PollState::Idle,
        }
    }
}

/// A node served by the local AP daemon
#[derive(Debug, Clone, PartialEq)]
pub struct LocalNode {
    /// AP daemon object path ("hostapd.wlan0")
    pub path: String,
    /// Network interface behind the object
    pub iface: String,
    pub ifindex: u32,
    pub obj_id: u32,

    pub data: NodeData,

    pub state: PollState,

    pub load_ewma: f32,
    /// Last (time, time_busy) survey counters
    pub survey: Option<(u64, u64)>,
    /// Consecutive polls with the load above the kick threshold
    pub load_thr_count: u32,

    /// Hearing-map band sweep position
    pub scan_cursor: usize,
}

impl LocalNode {
    pub fn new(path: &str, obj_id: u32) -> Self {
        let iface = path.strip_prefix(NODE_PATH_PREFIX).unwrap_or(path).to_string();
        let ifindex = crate::transport::iface_index(&iface).unwrap_or(0);

        Self {
            path: path.to_string(),
            iface,
            ifindex,
            obj_id,
            data: NodeData::default(),
            state: PollState::Idle,
            load_ewma: 0.0,
            survey: None,
            load_thr_count: 0,
            scan_cursor: 0,
        }
    }

    /// Fold a channel survey sample into the smoothed load estimate
    pub fn apply_survey(&mut self, d: &SurveyData) {
        self.data.noise = d.noise as i32;

        if let Some((time, busy)) = self.survey {
            let dt = d.time.saturating_sub(time);
            let db = d.time_busy.saturating_sub(busy);

            if dt > 0 {
                let load = (db * 100 / dt).min(100) as f32;
                self.load_ewma = self.load_ewma * 0.75 + load * 0.25;
                self.data.load = self.load_ewma as u32;
                debug!("node {} load {} (ewma {:.1})", self.path, self.data.load, self.load_ewma);
            }
        }

        self.survey = Some((d.time, d.time_busy));
    }
}
