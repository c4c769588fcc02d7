pub use crate::{EventType, MacAddr, NO_SIGNAL, STEER_PORT};

pub use crate::bus::{ApBus, BusEvent, NullBus};
pub use crate::config::{ConfigUpdate, SteerConfig};
pub use crate::controller::Controller;
pub use crate::error::Error;
pub use crate::node::{NodeData, NodeHandler, NodeId, SurveyData};
pub use crate::timer::{SystemTimer, Timer};
pub use crate::transport::{Transport, UdpTransport};
