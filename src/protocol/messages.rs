use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::Address;
use super::RoutingTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    Data(DataPacket),
    RipUpdate(RipUpdate),
    MonitorRequest(MonitorCommand),
    MonitorResponse(Snapshot),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPacket {
    pub src: Address,
    pub dst: Address,
    pub ttl: u32,
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RipUpdate {
    pub src: Address,
    pub dst: Address,
    pub table: RoutingTable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum MonitorCommand {
    GetSnapshot {
        #[serde(default)]
        round: Option<Uuid>,
    },
    SetTable {
        table: RoutingTable,
    },
    RipOn,
    RipOff,
    #[serde(rename = "broadcast-ttl0")]
    BroadcastTtl0,
    ClearTable,
    PrintTable,
}

/// A router's table as reported to the monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub table: RoutingTable,
    /// Echo of the collection round that asked for it, if any.
    #[serde(default)]
    pub round: Option<Uuid>,
}

/// What travels in one datagram: the sender's address and its message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Address,
    pub message: ProtocolMessage,
}

/// A message a node wants sent, and to whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub to: Address,
    pub message: ProtocolMessage,
}

impl Outbound {
    pub fn new(to: impl Into<Address>, message: ProtocolMessage) -> Self {
        Self {
            to: to.into(),
            message,
        }
    }
}

impl ProtocolMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolMessage::Data(_) => "data",
            ProtocolMessage::RipUpdate(_) => "rip-update",
            ProtocolMessage::MonitorRequest(_) => "monitor-request",
            ProtocolMessage::MonitorResponse(_) => "monitor-response",
        }
    }
}

impl MonitorCommand {
    pub fn get_snapshot() -> Self {
        MonitorCommand::GetSnapshot { round: None }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MonitorCommand::GetSnapshot { .. } => "get-snapshot",
            MonitorCommand::SetTable { .. } => "set-table",
            MonitorCommand::RipOn => "rip-on",
            MonitorCommand::RipOff => "rip-off",
            MonitorCommand::BroadcastTtl0 => "broadcast-ttl0",
            MonitorCommand::ClearTable => "clear-table",
            MonitorCommand::PrintTable => "print-table",
        }
    }
}

impl Envelope {
    pub fn new(from: impl Into<Address>, message: ProtocolMessage) -> Self {
        Self {
            from: from.into(),
            message,
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
