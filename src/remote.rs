//! Remote node table and gossip identity.
//!
//! Nodes announced by peer controllers are bucketed by the announcing
//! peer id plus the peer-local node name, so duplicate ids across names
//! stay apart. Freshness is a tick counter reset on every announcement;
//! the producer tick reaps nodes that stopped refreshing.
//
// https://github.com/apsteer/apsteer

use std::collections::BTreeMap;

use log::debug;
use rand_core::{OsRng, RngCore};

use crate::node::NodeData;
use crate::wire::BlobBuf;

/// A node learned from a peer controller
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteNode {
    pub peer: u32,
    /// Peer-local node name ("ap2")
    pub name: String,
    /// Display key, "<sender address>#<name>"
    pub key: String,
    pub data: NodeData,
    /// Sync ticks since the last announcement
    pub check: u32,
}

/// All currently known remote nodes
#[derive(Default)]
pub struct RemoteTable {
    nodes: BTreeMap<(u32, String), RemoteNode>,
}

impl RemoteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, peer: u32, name: &str) -> Option<&RemoteNode> {
        self.nodes.get(&(peer, name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteNode> {
        self.nodes.values()
    }

    /// Find or create the node announced as `name` by `peer`.
    ///
    /// The sender address only contributes to the display key; a peer
    /// reachable over several addresses keeps one node per name.
    pub fn get_or_create(&mut self, addr: &str, peer: u32, name: &str) -> &mut RemoteNode {
        let key = (peer, name.to_string());

        if !self.nodes.contains_key(&key) {
            debug!("create remote node {}#{} (peer {:08x})", addr, name, peer);
            self.nodes.insert(
                key.clone(),
                RemoteNode {
                    peer,
                    name: name.to_string(),
                    key: format!("{}#{}", addr, name),
                    data: NodeData::default(),
                    check: 0,
                },
            );
        }

        self.nodes.get_mut(&key).unwrap()
    }

    /// Age every node one sync tick and remove the ones past `max_ticks`
    pub fn reap(&mut self, max_ticks: u32) -> Vec<RemoteNode> {
        let expired: Vec<(u32, String)> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.check > max_ticks)
            .map(|(k, _)| k.clone())
            .collect();

        let mut out = Vec::new();
        for key in expired {
            let node = self.nodes.remove(&key).unwrap();
            debug!("remote node {} timed out", node.key);
            out.push(node);
        }

        for node in self.nodes.values_mut() {
            node.check += 1;
        }

        out
    }
}

/// Peer sync identity plus the shared outgoing message buffer
pub struct Gossip {
    pub local_id: u32,
    pub seq: u32,
    pub buf: BlobBuf,
}

impl Gossip {
    /// Draw the 32-bit instance id from OS randomness; no handshake, no
    /// versioning
    pub fn new() -> Result<Self, rand_core::Error> {
        let mut id = [0u8; 4];
        OsRng.try_fill_bytes(&mut id)?;

        Ok(Self { local_id: u32::from_ne_bytes(id), seq: 0, buf: BlobBuf::new() })
    }

    /// Next message sequence number (first message carries 1)
    pub fn next_seq(&mut self) -> u32 {
        self.seq = self.seq.wrapping_add(1);
        self.seq
    }
}
