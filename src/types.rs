use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc::Sender;

/// Unique node identifier, fixed at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    /// The id following this one, or `None` for the last representable id.
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for NodeId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// World coordinates of a node, only meaningful to renderers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// How an actor forwards messages it receives from other nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayMode {
    /// Forward each message to one output, cycling through the outputs.
    #[default]
    RoundRobin,

    /// Forward each message to every output.
    Multicast,

    /// Drop every message.
    Discard,
}

impl RelayMode {
    /// Numeric code used by the text graph format.
    pub fn code(self) -> u8 {
        match self {
            RelayMode::RoundRobin => 0,
            RelayMode::Multicast => 1,
            RelayMode::Discard => 2,
        }
    }

    /// Inverse of [`RelayMode::code`].
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(RelayMode::RoundRobin),
            1 => Some(RelayMode::Multicast),
            2 => Some(RelayMode::Discard),
            _ => None,
        }
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RelayMode::RoundRobin => "round-robin",
            RelayMode::Multicast => "multicast",
            RelayMode::Discard => "discard",
        };
        f.write_str(s)
    }
}

/// Emitted by an actor after each message it hands to an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Report {
    pub src: NodeId,
    pub dst: NodeId,
}

/// Live output of an actor: the destination's inbound queue and its id.
#[derive(Debug, Clone)]
pub(crate) struct Output {
    pub(crate) tx: Sender<String>,
    pub(crate) dst: NodeId,
}

/// Commands the registry sends to a running actor.
#[derive(Debug)]
pub(crate) enum Control {
    SetName(String),
    AddOutput(Output),
    RemoveOutput(NodeId),
    SetRelayMode(RelayMode),
    SetSendText(String),

    /// Zero disables the send timer.
    SetSendInterval(std::time::Duration),

    TogglePause,
    Quit,
}
