//! AP management bus seam.
//!
//! The controller talks to the AP daemon of its host through this trait:
//! object discovery, event delivery and the management calls used to steer
//! clients. Real transports live outside this crate; tests and the
//! standalone daemon use the implementations below.
//
// https://github.com/apsteer/apsteer

use core::fmt::Debug;

use crate::node::NrEntry;
use crate::{EventType, MacAddr};

/// A published AP daemon object
#[derive(Debug, Clone, PartialEq)]
pub struct BusObject {
    pub path: String,
    pub id: u32,
}

/// Beacon report fields as delivered by the AP daemon
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BeaconReportEvent {
    pub addr: Option<MacAddr>,
    pub bssid: Option<MacAddr>,
    pub op_class: u16,
    pub channel: u16,
    pub rcpi: u16,
    pub rsni: u16,
    pub duration: u16,
    pub start_time: u64,
}

/// Events delivered by the bus
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// A new object appeared (subscribable when its path starts with
    /// "hostapd.")
    ObjectAdd { path: String, id: u32 },

    /// A subscribed object went away
    ObjectRemove { id: u32 },

    /// Station management frame seen by a node
    Sta {
        node: u32,
        event: EventType,
        addr: Option<MacAddr>,
        freq: Option<u32>,
        signal: Option<i32>,
    },

    /// 802.11k beacon report from a client
    BeaconReport { node: u32, report: BeaconReportEvent },
}

/// One client row from `get_clients`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientEntry {
    pub assoc: bool,
    /// Cumulative (rx, tx) byte counters when the daemon reports them
    pub bytes: Option<(u64, u64)>,
}

/// `get_clients` reply
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientList {
    pub freq: u32,
    pub clients: Vec<(MacAddr, ClientEntry)>,
}

/// Client beacon measurement request
#[derive(Debug, Clone, PartialEq)]
pub struct BeaconRequest {
    pub addr: MacAddr,
    pub mode: u32,
    pub duration: u32,
    pub channel: u32,
    pub op_class: u32,
}

/// BSS transition request (disassociation imminent)
#[derive(Debug, Clone, PartialEq)]
pub struct DisassocRequest {
    pub addr: MacAddr,
    /// Milliseconds until the disassociation takes effect
    pub duration: u32,
    /// Same-SSID neighbor entries offered as targets
    pub neighbors: Vec<String>,
}

/// AP daemon RPC surface consumed by the controller.
///
/// Calls returning `i32` carry the daemon's status code; the controller
/// logs non-zero codes and leaves retry decisions to the policy layer.
pub trait ApBus {
    type Error: Debug;

    /// Enumerate currently published AP objects
    fn lookup_nodes(&mut self) -> Result<Vec<BusObject>, Self::Error>;

    /// Fetch the next pending event, non-blocking
    fn poll_event(&mut self) -> Result<Option<BusEvent>, Self::Error>;

    fn subscribe(&mut self, id: u32) -> Result<(), Self::Error>;

    fn unsubscribe(&mut self, id: u32) -> Result<(), Self::Error>;

    fn notify_response(&mut self, id: u32, enable: bool) -> Result<(), Self::Error>;

    /// Enable neighbor reports, beacon reports and BSS transitions
    fn bss_mgmt_enable(&mut self, id: u32) -> Result<(), Self::Error>;

    fn get_clients(&mut self, id: u32) -> Result<ClientList, Self::Error>;

    fn set_neighbor_list(&mut self, id: u32, list: &[NrEntry]) -> Result<(), Self::Error>;

    fn get_own_neighbor(&mut self, id: u32) -> Result<Option<NrEntry>, Self::Error>;

    fn beacon_request(&mut self, id: u32, req: &BeaconRequest) -> Result<i32, Self::Error>;

    fn disassoc_imminent(&mut self, id: u32, req: &DisassocRequest) -> Result<i32, Self::Error>;

    fn del_client(
        &mut self,
        id: u32,
        addr: MacAddr,
        reason: u32,
        deauth: bool,
    ) -> Result<i32, Self::Error>;
}

/// Bus with no AP daemon behind it.
///
/// Keeps the daemon runnable as a pure gossip participant when the host
/// integration provides no bus transport.
#[derive(Debug, Clone, Default)]
pub struct NullBus;

impl ApBus for NullBus {
    type Error = core::convert::Infallible;

    fn lookup_nodes(&mut self) -> Result<Vec<BusObject>, Self::Error> {
        Ok(Vec::new())
    }

    fn poll_event(&mut self) -> Result<Option<BusEvent>, Self::Error> {
        Ok(None)
    }

    fn subscribe(&mut self, _id: u32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn unsubscribe(&mut self, _id: u32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn notify_response(&mut self, _id: u32, _enable: bool) -> Result<(), Self::Error> {
        Ok(())
    }

    fn bss_mgmt_enable(&mut self, _id: u32) -> Result<(), Self::Error> {
        Ok(())
    }

    fn get_clients(&mut self, _id: u32) -> Result<ClientList, Self::Error> {
        Ok(ClientList::default())
    }

    fn set_neighbor_list(&mut self, _id: u32, _list: &[NrEntry]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn get_own_neighbor(&mut self, _id: u32) -> Result<Option<NrEntry>, Self::Error> {
        Ok(None)
    }

    fn beacon_request(&mut self, _id: u32, _req: &BeaconRequest) -> Result<i32, Self::Error> {
        Ok(0)
    }

    fn disassoc_imminent(&mut self, _id: u32, _req: &DisassocRequest) -> Result<i32, Self::Error> {
        Ok(0)
    }

    fn del_client(
        &mut self,
        _id: u32,
        _addr: MacAddr,
        _reason: u32,
        _deauth: bool,
    ) -> Result<i32, Self::Error> {
        Ok(0)
    }
}

#[cfg(any(test, feature = "mocks"))]
pub mod mock {
    //! Scripted bus double: queue expected transactions, drive events,
    //! assert everything was consumed.

    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    use super::*;

    /// One expected call with its canned reply
    #[derive(Debug, Clone, PartialEq)]
    pub enum Transaction {
        Subscribe { id: u32 },
        Unsubscribe { id: u32 },
        NotifyResponse { id: u32 },
        BssMgmtEnable { id: u32 },
        GetClients { id: u32, reply: ClientList },
        SetNeighborList { id: u32, list: Vec<NrEntry> },
        GetOwnNeighbor { id: u32, reply: Option<NrEntry> },
        BeaconRequest { id: u32, req: BeaconRequest, ret: i32 },
        DisassocImminent { id: u32, req: DisassocRequest, ret: i32 },
        DelClient { id: u32, addr: MacAddr, reason: u32, ret: i32 },
    }

    #[derive(Clone, Default)]
    pub struct MockBus {
        objects: Rc<RefCell<Vec<BusObject>>>,
        events: Rc<RefCell<VecDeque<BusEvent>>>,
        expected: Rc<RefCell<VecDeque<Transaction>>>,
    }

    impl MockBus {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_objects(objects: &[BusObject]) -> Self {
            let bus = Self::default();
            *bus.objects.borrow_mut() = objects.to_vec();
            bus
        }

        /// Append expected transactions
        pub fn expect(&self, transactions: &[Transaction]) {
            self.expected.borrow_mut().extend(transactions.iter().cloned());
        }

        /// Queue an event for the next `poll_event`
        pub fn push_event(&self, ev: BusEvent) {
            self.events.borrow_mut().push_back(ev);
        }

        /// Assert every expected transaction was consumed
        pub fn done(&self) {
            let left = self.expected.borrow();
            assert!(left.is_empty(), "unconsumed bus transactions: {:?}", *left);
        }

        fn next(&self, call: &str) -> Transaction {
            self.expected
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected bus call: {}", call))
        }
    }

    impl ApBus for MockBus {
        type Error = core::convert::Infallible;

        fn lookup_nodes(&mut self) -> Result<Vec<BusObject>, Self::Error> {
            Ok(self.objects.borrow().clone())
        }

        fn poll_event(&mut self) -> Result<Option<BusEvent>, Self::Error> {
            Ok(self.events.borrow_mut().pop_front())
        }

        fn subscribe(&mut self, id: u32) -> Result<(), Self::Error> {
            match self.next("subscribe") {
                Transaction::Subscribe { id: want } => assert_eq!(id, want, "subscribe id"),
                t => panic!("expected {:?}, got subscribe({})", t, id),
            }
            Ok(())
        }

        fn unsubscribe(&mut self, id: u32) -> Result<(), Self::Error> {
            match self.next("unsubscribe") {
                Transaction::Unsubscribe { id: want } => assert_eq!(id, want, "unsubscribe id"),
                t => panic!("expected {:?}, got unsubscribe({})", t, id),
            }
            Ok(())
        }

        fn notify_response(&mut self, id: u32, _enable: bool) -> Result<(), Self::Error> {
            match self.next("notify_response") {
                Transaction::NotifyResponse { id: want } => assert_eq!(id, want),
                t => panic!("expected {:?}, got notify_response({})", t, id),
            }
            Ok(())
        }

        fn bss_mgmt_enable(&mut self, id: u32) -> Result<(), Self::Error> {
            match self.next("bss_mgmt_enable") {
                Transaction::BssMgmtEnable { id: want } => assert_eq!(id, want),
                t => panic!("expected {:?}, got bss_mgmt_enable({})", t, id),
            }
            Ok(())
        }

        fn get_clients(&mut self, id: u32) -> Result<ClientList, Self::Error> {
            match self.next("get_clients") {
                Transaction::GetClients { id: want, reply } => {
                    assert_eq!(id, want, "get_clients id");
                    Ok(reply)
                }
                t => panic!("expected {:?}, got get_clients({})", t, id),
            }
        }

        fn set_neighbor_list(&mut self, id: u32, list: &[NrEntry]) -> Result<(), Self::Error> {
            match self.next("set_neighbor_list") {
                Transaction::SetNeighborList { id: want, list: want_list } => {
                    assert_eq!(id, want, "set_neighbor_list id");
                    assert_eq!(list, want_list.as_slice(), "neighbor list");
                }
                t => panic!("expected {:?}, got set_neighbor_list({})", t, id),
            }
            Ok(())
        }

        fn get_own_neighbor(&mut self, id: u32) -> Result<Option<NrEntry>, Self::Error> {
            match self.next("get_own_neighbor") {
                Transaction::GetOwnNeighbor { id: want, reply } => {
                    assert_eq!(id, want, "get_own_neighbor id");
                    Ok(reply)
                }
                t => panic!("expected {:?}, got get_own_neighbor({})", t, id),
            }
        }

        fn beacon_request(&mut self, id: u32, req: &BeaconRequest) -> Result<i32, Self::Error> {
            match self.next("beacon_request") {
                Transaction::BeaconRequest { id: want, req: want_req, ret } => {
                    assert_eq!(id, want, "beacon_request id");
                    assert_eq!(*req, want_req, "beacon request");
                    Ok(ret)
                }
                t => panic!("expected {:?}, got beacon_request({})", t, id),
            }
        }

        fn disassoc_imminent(&mut self, id: u32, req: &DisassocRequest) -> Result<i32, Self::Error> {
            match self.next("disassoc_imminent") {
                Transaction::DisassocImminent { id: want, req: want_req, ret } => {
                    assert_eq!(id, want, "disassoc_imminent id");
                    assert_eq!(*req, want_req, "disassoc request");
                    Ok(ret)
                }
                t => panic!("expected {:?}, got disassoc_imminent({})", t, id),
            }
        }

        fn del_client(
            &mut self,
            id: u32,
            addr: MacAddr,
            reason: u32,
            _deauth: bool,
        ) -> Result<i32, Self::Error> {
            match self.next("del_client") {
                Transaction::DelClient { id: want, addr: want_addr, reason: want_reason, ret } => {
                    assert_eq!(id, want, "del_client id");
                    assert_eq!(addr, want_addr, "del_client addr");
                    assert_eq!(reason, want_reason, "del_client reason");
                    Ok(ret)
                }
                t => panic!("expected {:?}, got del_client({})", t, id),
            }
        }
    }
}
