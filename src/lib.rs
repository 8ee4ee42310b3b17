//! Relaynet: a live-editable directed graph of message-relaying actors.
//!
//! Each node of the graph runs as its own Tokio task. Nodes generate text
//! messages on a timer, relay what they receive to their outputs
//! (round-robin, multicast or discard), and report every delivery so a
//! renderer can shade recently used channels. A [`Network`] registry owns the
//! metadata of every node, reconfigures running actors through control
//! messages, and saves or restores the whole population as a small
//! `digraph` text file.
//!
//! # Features
//! - One actor per node, reconfigured without restarting it.
//! - Bounded queues everywhere: a slow consumer slows the whole graph down.
//! - Non-blocking drains of delivery reports and terminations for polling loops.
//! - Coordinated shutdown of the whole population.
//! - Text serialization that restores every node, channel and setting.
//!
//! # Example
//! ```
//! use relaynet::{NetError, Network, Position, RelayMode};
//!
//! # async fn example() -> Result<(), NetError> {
//! let mut net = Network::default();
//! let a = net.spawn(Position::new(0, 0))?;
//! let b = net.spawn(Position::new(100, 0))?;
//! net.add_or_remove_channel(a, b).await?;
//! net.set_relay_mode(b, RelayMode::Discard).await?;
//! net.set_send_interval(a, 250).await?;
//!
//! let text = net.to_text();
//! net.stop_all_and_wait().await?;
//! let (restored, max_id) = Network::deserialize(&text, Default::default()).await?;
//! assert_eq!(max_id, Some(b));
//! # let mut restored = restored;
//! # restored.stop_all_and_wait().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod deserialize;
mod error;
mod escape;
mod network;
mod node;
mod relay;
mod serialize;
mod types;
mod usage;

pub use config::{Config, NetConfig, RunnerConfig};
pub use deserialize::{parse_graph, Graph, GraphNode};
pub use error::{ConfigError, NetError, ParseError};
pub use escape::{quote, unquote, UnquoteError};
pub use network::{Channel, Network, NodeInfo, TickSummary};
pub use node::NodeSpec;
pub use serialize::{HEADER, TRAILER};
pub use types::{NodeId, Position, RelayMode, Report};
pub use usage::Usage;
