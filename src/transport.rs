//! Peer sync transport.
//!
//! One datagram socket per configured interface: IPv6 link-local multicast
//! where available, IPv4 subnet broadcast as the fallback path. Binding
//! per interface makes the receiving interface known without packet-info
//! ancillary data.
//
// https://github.com/apsteer/apsteer

use core::fmt::Debug;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6, UdpSocket};

use log::{debug, warn};
use socket2::{Domain, Protocol, Socket, Type};

use crate::STEER_PORT;

/// All peers rendezvous on the all-routers link-local group
pub const MULTICAST_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 2);

/// Source details of a received datagram
#[derive(Debug, Clone, PartialEq)]
pub struct RecvMeta {
    pub iface: String,
    pub addr: IpAddr,
}

/// Datagram transport used by the peer gossip
pub trait Transport {
    type Error: Debug;

    /// Rebuild sockets for the given interface set
    fn reload(&mut self, interfaces: &[String]) -> Result<(), Self::Error>;

    /// Send one datagram out of `iface`
    fn send(&mut self, iface: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Fetch the next pending datagram, non-blocking
    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, RecvMeta)>, Self::Error>;
}

enum Family {
    V6 { ifindex: u32 },
    V4,
}

struct IfaceSocket {
    name: String,
    socket: UdpSocket,
    family: Family,
}

/// Kernel UDP implementation
#[derive(Default)]
pub struct UdpTransport {
    sockets: Vec<IfaceSocket>,
}

/// Interface index as maintained by the kernel
pub fn iface_index(iface: &str) -> io::Result<u32> {
    let path = format!("/sys/class/net/{}/ifindex", iface);
    let raw = std::fs::read_to_string(path)?;

    raw.trim()
        .parse()
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad ifindex"))
}

fn open_v6(iface: &str) -> io::Result<IfaceSocket> {
    let idx = iface_index(iface)?;

    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuse_port(true)?;
    socket.set_only_v6(true)?;

    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    if let Err(e) = socket.bind_device(Some(iface.as_bytes())) {
        debug!("bind_device({}) failed: {}", iface, e);
    }

    let bind: SocketAddr = SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, STEER_PORT, 0, 0).into();
    socket.bind(&bind.into())?;
    socket.join_multicast_v6(&MULTICAST_GROUP, idx)?;
    socket.set_multicast_if_v6(idx)?;

    Ok(IfaceSocket {
        name: iface.to_string(),
        socket: socket.into(),
        family: Family::V6 { ifindex: idx },
    })
}

fn open_v4(iface: &str) -> io::Result<IfaceSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_nonblocking(true)?;
    socket.set_reuse_address(true)?;
    #[cfg(all(unix, not(target_os = "solaris"), not(target_os = "illumos")))]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;

    #[cfg(any(target_os = "android", target_os = "fuchsia", target_os = "linux"))]
    if let Err(e) = socket.bind_device(Some(iface.as_bytes())) {
        debug!("bind_device({}) failed: {}", iface, e);
    }

    let bind: SocketAddr = SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, STEER_PORT).into();
    socket.bind(&bind.into())?;

    Ok(IfaceSocket { name: iface.to_string(), socket: socket.into(), family: Family::V4 })
}

impl UdpTransport {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Transport for UdpTransport {
    type Error = io::Error;

    fn reload(&mut self, interfaces: &[String]) -> Result<(), Self::Error> {
        self.sockets.clear();

        for iface in interfaces {
            match open_v6(iface).or_else(|e| {
                debug!("no IPv6 peer socket on {} ({}), trying broadcast", iface, e);
                open_v4(iface)
            }) {
                Ok(s) => self.sockets.push(s),
                Err(e) => warn!("cannot open peer socket on {}: {}", iface, e),
            }
        }

        Ok(())
    }

    fn send(&mut self, iface: &str, data: &[u8]) -> Result<(), Self::Error> {
        let s = self
            .sockets
            .iter()
            .find(|s| s.name == iface)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "interface not configured"))?;

        let dest: SocketAddr = match s.family {
            Family::V6 { ifindex } => {
                SocketAddrV6::new(MULTICAST_GROUP, STEER_PORT, 0, ifindex).into()
            }
            Family::V4 => SocketAddrV4::new(Ipv4Addr::BROADCAST, STEER_PORT).into(),
        };

        s.socket.send_to(data, dest).map(|_| ())
    }

    fn recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, RecvMeta)>, Self::Error> {
        for s in &self.sockets {
            loop {
                match s.socket.recv_from(buf) {
                    Ok((len, src)) => {
                        return Ok(Some((
                            len,
                            RecvMeta { iface: s.name.clone(), addr: src.ip() },
                        )));
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(None)
    }
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    /// In-memory transport double
    #[derive(Clone, Default)]
    pub struct MockTransport {
        sent: Rc<RefCell<Vec<(String, Vec<u8>)>>>,
        rx: Rc<RefCell<VecDeque<(RecvMeta, Vec<u8>)>>>,
        interfaces: Rc<RefCell<Vec<String>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a datagram for the next `recv`
        pub fn push_datagram(&self, iface: &str, addr: IpAddr, data: &[u8]) {
            self.rx.borrow_mut().push_back((
                RecvMeta { iface: iface.to_string(), addr },
                data.to_vec(),
            ));
        }

        /// Drain everything sent so far
        pub fn take_sent(&self) -> Vec<(String, Vec<u8>)> {
            self.sent.borrow_mut().drain(..).collect()
        }

        pub fn interfaces(&self) -> Vec<String> {
            self.interfaces.borrow().clone()
        }
    }

    impl Transport for MockTransport {
        type Error = std::io::Error;

        fn reload(&mut self, interfaces: &[String]) -> Result<(), Self::Error> {
            *self.interfaces.borrow_mut() = interfaces.to_vec();
            Ok(())
        }

        fn send(&mut self, iface: &str, data: &[u8]) -> Result<(), Self::Error> {
            self.sent.borrow_mut().push((iface.to_string(), data.to_vec()));
            Ok(())
        }

        fn recv(&mut self, buf: &mut [u8]) -> Result<Option<(usize, RecvMeta)>, Self::Error> {
            match self.rx.borrow_mut().pop_front() {
                Some((meta, data)) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(Some((data.len(), meta)))
                }
                None => Ok(None),
            }
        }
    }
}
