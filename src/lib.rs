//! Cooperative Wi-Fi client steering stack.
//!
//! Each controller instance attaches to one access point, observes its
//! clients through the AP management daemon, exchanges summary state with
//! peer controllers over link-local multicast and nudges clients toward the
//! AP expected to give the best service.
//
// https://github.com/apsteer/apsteer

use core::fmt;
use core::str::FromStr;

pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod hearing;
pub mod local_node;
pub mod mgmt;
pub mod node;
pub mod policy;
pub mod remote;
pub mod sta;
pub mod timeout;
pub mod timer;
pub mod transport;
pub mod wire;

pub mod prelude;

/// UDP port shared by all peer controllers
pub const STEER_PORT: u16 = 16720;

/// Upper bound for a single peer datagram
pub const MSG_BUF_LEN: usize = 64 * 1024;

/// Sentinel for "no signal measurement available"
pub const NO_SIGNAL: i32 = 0xff;

/// Station event types as reported by the AP daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::EnumIter, strum::EnumCount)]
pub enum EventType {
    #[strum(serialize = "probe")]
    Probe,
    #[strum(serialize = "auth")]
    Auth,
    #[strum(serialize = "assoc")]
    Assoc,
    #[strum(serialize = "beacon-report")]
    Beacon,
}

pub const EVENT_TYPE_COUNT: usize = <EventType as strum::EnumCount>::COUNT;

impl EventType {
    pub fn from_method(method: &str) -> Option<EventType> {
        use strum::IntoEnumIterator;

        EventType::iter().find(|t| t.to_string() == method)
    }
}

/// 48-bit station / BSSID address
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const fn new(b: [u8; 6]) -> Self {
        MacAddr(b)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Error parsing a textual MAC address
#[derive(Debug, Clone, PartialEq)]
pub struct MacParseError;

impl fmt::Display for MacParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid MAC address")
    }
}

impl std::error::Error for MacParseError {}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut out = [0u8; 6];
        let mut parts = s.split(':');

        for b in out.iter_mut() {
            let p = parts.next().ok_or(MacParseError)?;
            if p.len() != 2 {
                return Err(MacParseError);
            }
            *b = u8::from_str_radix(p, 16).map_err(|_| MacParseError)?;
        }

        if parts.next().is_some() {
            return Err(MacParseError);
        }

        Ok(MacAddr(out))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mac_addr_round_trip() {
        let mac: MacAddr = "02:11:22:aa:bb:01".parse().unwrap();
        assert_eq!(mac, MacAddr([0x02, 0x11, 0x22, 0xaa, 0xbb, 0x01]));
        assert_eq!(mac.to_string(), "02:11:22:aa:bb:01");
    }

    #[test]
    fn mac_addr_rejects_garbage() {
        assert!("02:11:22:aa:bb".parse::<MacAddr>().is_err());
        assert!("02:11:22:aa:bb:01:07".parse::<MacAddr>().is_err());
        assert!("02:11:22:aa:bb:zz".parse::<MacAddr>().is_err());
        assert!("0211:22:aa:bb:01".parse::<MacAddr>().is_err());
    }

    #[test]
    fn event_type_names() {
        assert_eq!(EventType::from_method("probe"), Some(EventType::Probe));
        assert_eq!(EventType::from_method("beacon-report"), Some(EventType::Beacon));
        assert_eq!(EventType::from_method("bogus"), None);
        assert_eq!(EventType::Assoc.to_string(), "assoc");
    }
}
