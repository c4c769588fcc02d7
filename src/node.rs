//! Node records shared by local and remote APs.
//
// https://github.com/apsteer/apsteer

use core::fmt;

use bytes::Bytes;

use crate::MacAddr;

/// One neighbor-report entry: an opaque 3-tuple of strings, the first
/// element carrying the BSSID
pub type NrEntry = [String; 3];

/// Stable node identity.
///
/// Local nodes are keyed by their AP-daemon object path, remote nodes by
/// the announcing peer id plus the peer-local node name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    Local(String),
    Remote { peer: u32, name: String },
}

impl NodeId {
    pub fn is_remote(&self) -> bool {
        matches!(self, NodeId::Remote { .. })
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NodeId::Local(name) => write!(f, "{}", name),
            NodeId::Remote { peer, name } => write!(f, "{:08x}#{}", peer, name),
        }
    }
}

/// Radio state common to local and remote nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeData {
    pub ssid: String,
    /// Operating frequency in MHz
    pub freq: u32,
    pub noise: i32,
    /// Channel-busy percentage
    pub load: u32,
    pub n_assoc: u32,
    /// 0 means no limit learned
    pub max_assoc: u32,
    /// Neighbor-report entries, adopted verbatim from the AP daemon or peer
    pub rrm_nr: Vec<NrEntry>,
    /// Opaque per-node payload carried for external scripting, verbatim
    pub script_data: Bytes,
    pub bssid: Option<MacAddr>,
}

impl NodeData {
    pub fn set_ssid(&mut self, ssid: &str) {
        self.ssid = ssid.chars().take(32).collect();
    }

    /// Adopt a BSSID from the first element of the first neighbor entry
    pub fn update_bssid_from_rrm(&mut self) {
        if let Some(entry) = self.rrm_nr.first() {
            if let Ok(mac) = entry[0].parse::<MacAddr>() {
                self.bssid = Some(mac);
            }
        }
    }
}

/// Channel survey sample as delivered by a driver-specific sampler
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyData {
    pub freq: u16,
    pub noise: i8,
    pub time: u64,
    pub time_busy: u64,
}

/// Frequency capability entry
#[derive(Debug, Clone, PartialEq)]
pub struct FreqData {
    pub freq: u16,
    pub txpower: u8,
    pub dfs: bool,
}

/// Capability hooks invoked around node lifecycle, in registration order.
///
/// Integrations (driver samplers, bridge glue) implement the subset they
/// care about; the default methods do nothing.
pub trait NodeHandler {
    fn init_node(&mut self, _id: &NodeId, _data: &NodeData) {}

    fn free_node(&mut self, _id: &NodeId, _data: &NodeData) {}

    fn update_node(&mut self, _id: &NodeId, _data: &mut NodeData) {}

    fn update_sta(&mut self, _id: &NodeId, _addr: MacAddr) {}

    /// Append the frequencies the node's radio can serve; they widen the
    /// hearing-map band sweep beyond the operating frequencies
    fn get_freqlist(&mut self, _id: &NodeId, _out: &mut Vec<FreqData>) {}
}
