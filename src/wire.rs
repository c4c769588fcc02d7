//! Peer sync wire format.
//!
//! Messages are framed blob trees: each attribute carries a 4-byte
//! big-endian header (id byte plus 24-bit length, length counting the
//! header) followed by its payload, padded to 4-byte alignment. Containers
//! nest attributes inside their payload. The root attribute's padded length
//! must match the datagram length exactly.
//!
//! Field ids are positional in the enums below; every peer must agree on
//! the ordering.
//
// https://github.com/apsteer/apsteer

use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;

use crate::node::NrEntry;
use crate::MacAddr;

/// Top-level message fields
pub mod msg_tag {
    pub const ID: u8 = 1;
    pub const SEQ: u8 = 2;
    pub const NODES: u8 = 3;
}

/// Per-node fields
pub mod node_tag {
    pub const NAME: u8 = 1;
    pub const SSID: u8 = 2;
    pub const MAC: u8 = 3;
    pub const FREQ: u8 = 4;
    pub const NOISE: u8 = 5;
    pub const LOAD: u8 = 6;
    pub const N_ASSOC: u8 = 7;
    pub const MAX_ASSOC: u8 = 8;
    pub const RRM_NR: u8 = 9;
    pub const SCRIPT_DATA: u8 = 10;
    pub const STATIONS: u8 = 11;
}

/// Per-station fields
pub mod sta_tag {
    pub const ADDR: u8 = 1;
    pub const CONNECTED: u8 = 2;
    pub const SIGNAL: u8 = 3;
    pub const SEEN: u8 = 4;
    pub const TIMEOUT: u8 = 5;
}

/// Decoding errors
#[derive(Debug, Clone, PartialEq)]
pub enum WireError {
    /// Attribute header or payload runs past the buffer
    Truncated,

    /// Root length disagrees with the datagram length
    LengthMismatch { header: usize, actual: usize },

    /// Scalar payload has the wrong width
    BadLength,

    /// String payload is not UTF-8
    BadString,

    /// Address payload is not 6 bytes
    BadAddr,

    /// A required field is absent
    MissingField(&'static str),
}

const HDR_LEN: usize = 4;

fn align4(len: usize) -> usize {
    (len + 3) & !3
}

/// Reusable buffer for assembling outgoing messages.
///
/// Must be re-initialized before every message; the owner never assembles
/// two messages concurrently.
pub struct BlobBuf {
    buf: Vec<u8>,
}

impl BlobBuf {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(512) }
    }

    /// Reset and open the root container
    pub fn init(&mut self) {
        self.buf.clear();
        self.put_header(0, 0);
    }

    fn put_header(&mut self, id: u8, len: usize) {
        let mut hdr = [0u8; HDR_LEN];
        BigEndian::write_u32(&mut hdr, ((id as u32) << 24) | (len as u32 & 0x00ff_ffff));
        self.buf.extend_from_slice(&hdr);
    }

    fn patch_len(&mut self, off: usize) {
        let len = self.buf.len() - off;
        let id = self.buf[off];
        BigEndian::write_u32(
            &mut self.buf[off..off + HDR_LEN],
            ((id as u32) << 24) | (len as u32 & 0x00ff_ffff),
        );
    }

    fn pad(&mut self) {
        while self.buf.len() % 4 != 0 {
            self.buf.push(0);
        }
    }

    pub fn put_u8(&mut self, id: u8, v: u8) {
        self.put_header(id, HDR_LEN + 1);
        self.buf.push(v);
        self.pad();
    }

    pub fn put_u32(&mut self, id: u8, v: u32) {
        self.put_header(id, HDR_LEN + 4);
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, v);
        self.buf.extend_from_slice(&b);
    }

    pub fn put_i32(&mut self, id: u8, v: i32) {
        self.put_u32(id, v as u32);
    }

    pub fn put_str(&mut self, id: u8, s: &str) {
        self.put_bytes(id, s.as_bytes());
    }

    pub fn put_bytes(&mut self, id: u8, data: &[u8]) {
        self.put_header(id, HDR_LEN + data.len());
        self.buf.extend_from_slice(data);
        self.pad();
    }

    /// Open a nested container, returning the handle for `nest_end`
    pub fn nest_start(&mut self, id: u8) -> usize {
        let off = self.buf.len();
        self.put_header(id, 0);
        off
    }

    pub fn nest_end(&mut self, off: usize) {
        self.patch_len(off);
    }

    /// Close the root container and expose the finished datagram
    pub fn finish(&mut self) -> &[u8] {
        self.patch_len(0);
        &self.buf
    }
}

impl Default for BlobBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view of one decoded attribute
#[derive(Debug, Clone, Copy)]
pub struct Blob<'a> {
    id: u8,
    payload: &'a [u8],
}

fn read_header(buf: &[u8]) -> Result<(u8, usize), WireError> {
    if buf.len() < HDR_LEN {
        return Err(WireError::Truncated);
    }

    let raw = BigEndian::read_u32(buf);
    let id = (raw >> 24) as u8;
    let len = (raw & 0x00ff_ffff) as usize;

    if len < HDR_LEN || len > buf.len() {
        return Err(WireError::Truncated);
    }

    Ok((id, len))
}

impl<'a> Blob<'a> {
    /// Parse a whole datagram, verifying the framed length
    pub fn parse_root(buf: &'a [u8]) -> Result<Blob<'a>, WireError> {
        let (id, len) = read_header(buf)?;

        if align4(len) != buf.len() {
            return Err(WireError::LengthMismatch { header: align4(len), actual: buf.len() });
        }

        Ok(Blob { id, payload: &buf[HDR_LEN..len] })
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    /// Decode the nested attributes of a container payload
    pub fn children(&self) -> Result<Vec<Blob<'a>>, WireError> {
        let mut out = Vec::new();
        let mut off = 0;

        while off < self.payload.len() {
            let rest = &self.payload[off..];
            let (id, len) = read_header(rest)?;
            out.push(Blob { id, payload: &rest[HDR_LEN..len] });
            off += align4(len);
        }

        Ok(out)
    }

    pub fn u8_val(&self) -> Result<u8, WireError> {
        if self.payload.len() != 1 {
            return Err(WireError::BadLength);
        }
        Ok(self.payload[0])
    }

    pub fn u32_val(&self) -> Result<u32, WireError> {
        if self.payload.len() != 4 {
            return Err(WireError::BadLength);
        }
        Ok(BigEndian::read_u32(self.payload))
    }

    pub fn i32_val(&self) -> Result<i32, WireError> {
        self.u32_val().map(|v| v as i32)
    }

    pub fn str_val(&self) -> Result<&'a str, WireError> {
        core::str::from_utf8(self.payload).map_err(|_| WireError::BadString)
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.payload
    }

    pub fn addr_val(&self) -> Result<MacAddr, WireError> {
        if self.payload.len() != 6 {
            return Err(WireError::BadAddr);
        }
        let mut b = [0u8; 6];
        b.copy_from_slice(self.payload);
        Ok(MacAddr(b))
    }
}

/// Station entry inside a node announcement
#[derive(Debug, Clone, PartialEq)]
pub struct PeerSta {
    pub addr: MacAddr,
    pub connected: u8,
    pub signal: i32,
    /// Milliseconds since the sender last saw the station
    pub seen: u32,
    /// Remaining lifetime in milliseconds; non-positive entries are refused
    pub timeout: i32,
}

/// One announced node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerNode {
    pub name: String,
    pub ssid: String,
    pub mac: Option<MacAddr>,
    pub freq: u32,
    pub noise: i32,
    pub load: u32,
    pub n_assoc: u32,
    pub max_assoc: u32,
    pub rrm_nr: Vec<NrEntry>,
    pub script_data: Bytes,
    pub stations: Vec<PeerSta>,
}

/// Decoded peer message
#[derive(Debug, Clone, PartialEq)]
pub struct PeerMsg {
    pub id: u32,
    pub seq: u32,
    pub nodes: Vec<PeerNode>,
}

/// Assemble a full message into `buf`
pub fn encode_msg(buf: &mut BlobBuf, id: u32, seq: u32, nodes: &[PeerNode]) {
    buf.init();
    buf.put_u32(msg_tag::ID, id);
    buf.put_u32(msg_tag::SEQ, seq);

    let nodes_nest = buf.nest_start(msg_tag::NODES);
    for node in nodes {
        encode_node(buf, node);
    }
    buf.nest_end(nodes_nest);
}

fn encode_node(buf: &mut BlobBuf, node: &PeerNode) {
    let nest = buf.nest_start(0);

    buf.put_str(node_tag::NAME, &node.name);
    buf.put_str(node_tag::SSID, &node.ssid);
    if let Some(mac) = &node.mac {
        buf.put_str(node_tag::MAC, &mac.to_string());
    }
    buf.put_u32(node_tag::FREQ, node.freq);
    buf.put_i32(node_tag::NOISE, node.noise);
    buf.put_u32(node_tag::LOAD, node.load);
    buf.put_u32(node_tag::N_ASSOC, node.n_assoc);
    buf.put_u32(node_tag::MAX_ASSOC, node.max_assoc);

    if !node.rrm_nr.is_empty() {
        let nr_nest = buf.nest_start(node_tag::RRM_NR);
        for entry in &node.rrm_nr {
            let entry_nest = buf.nest_start(0);
            for field in entry {
                buf.put_str(0, field);
            }
            buf.nest_end(entry_nest);
        }
        buf.nest_end(nr_nest);
    }

    if !node.script_data.is_empty() {
        buf.put_bytes(node_tag::SCRIPT_DATA, &node.script_data);
    }

    let sta_nest = buf.nest_start(node_tag::STATIONS);
    for sta in &node.stations {
        encode_sta(buf, sta);
    }
    buf.nest_end(sta_nest);

    buf.nest_end(nest);
}

fn encode_sta(buf: &mut BlobBuf, sta: &PeerSta) {
    let nest = buf.nest_start(0);
    buf.put_bytes(sta_tag::ADDR, sta.addr.as_bytes());
    buf.put_u8(sta_tag::CONNECTED, sta.connected);
    buf.put_i32(sta_tag::SIGNAL, sta.signal);
    buf.put_u32(sta_tag::SEEN, sta.seen);
    buf.put_i32(sta_tag::TIMEOUT, sta.timeout);
    buf.nest_end(nest);
}

/// Decode a full datagram
pub fn decode_msg(data: &[u8]) -> Result<PeerMsg, WireError> {
    let root = Blob::parse_root(data)?;

    let mut id = None;
    let mut seq = None;
    let mut nodes = Vec::new();

    for attr in root.children()? {
        match attr.id() {
            msg_tag::ID => id = Some(attr.u32_val()?),
            msg_tag::SEQ => seq = Some(attr.u32_val()?),
            msg_tag::NODES => {
                for node in attr.children()? {
                    nodes.push(decode_node(&node)?);
                }
            }
            _ => (),
        }
    }

    Ok(PeerMsg {
        id: id.ok_or(WireError::MissingField("id"))?,
        seq: seq.ok_or(WireError::MissingField("seq"))?,
        nodes,
    })
}

fn decode_node(blob: &Blob) -> Result<PeerNode, WireError> {
    let mut node = PeerNode::default();
    let mut name = None;
    let mut ssid = None;
    let mut freq = None;

    for attr in blob.children()? {
        match attr.id() {
            node_tag::NAME => name = Some(attr.str_val()?.to_string()),
            node_tag::SSID => ssid = Some(attr.str_val()?.to_string()),
            node_tag::MAC => node.mac = attr.str_val()?.parse().ok(),
            node_tag::FREQ => freq = Some(attr.u32_val()?),
            node_tag::NOISE => node.noise = attr.i32_val()?,
            node_tag::LOAD => node.load = attr.u32_val()?,
            node_tag::N_ASSOC => node.n_assoc = attr.u32_val()?,
            node_tag::MAX_ASSOC => node.max_assoc = attr.u32_val()?,
            node_tag::RRM_NR => {
                for entry in attr.children()? {
                    let fields = entry.children()?;
                    let mut tuple: NrEntry = Default::default();
                    for (i, field) in fields.iter().take(3).enumerate() {
                        tuple[i] = field.str_val()?.to_string();
                    }
                    node.rrm_nr.push(tuple);
                }
            }
            node_tag::SCRIPT_DATA => {
                node.script_data = Bytes::copy_from_slice(attr.bytes());
            }
            node_tag::STATIONS => {
                for sta in attr.children()? {
                    node.stations.push(decode_sta(&sta)?);
                }
            }
            _ => (),
        }
    }

    node.name = name.ok_or(WireError::MissingField("name"))?;
    node.ssid = ssid.ok_or(WireError::MissingField("ssid"))?;
    node.freq = freq.ok_or(WireError::MissingField("freq"))?;

    Ok(node)
}

fn decode_sta(blob: &Blob) -> Result<PeerSta, WireError> {
    let mut addr = None;
    let mut connected = None;
    let mut signal = None;
    let mut seen = None;
    let mut timeout = None;

    for attr in blob.children()? {
        match attr.id() {
            sta_tag::ADDR => addr = Some(attr.addr_val()?),
            sta_tag::CONNECTED => connected = Some(attr.u8_val()?),
            sta_tag::SIGNAL => signal = Some(attr.i32_val()?),
            sta_tag::SEEN => seen = Some(attr.u32_val()?),
            sta_tag::TIMEOUT => timeout = Some(attr.i32_val()?),
            _ => (),
        }
    }

    Ok(PeerSta {
        addr: addr.ok_or(WireError::MissingField("addr"))?,
        connected: connected.ok_or(WireError::MissingField("connected"))?,
        signal: signal.ok_or(WireError::MissingField("signal"))?,
        seen: seen.ok_or(WireError::MissingField("seen"))?,
        timeout: timeout.ok_or(WireError::MissingField("timeout"))?,
    })
}
