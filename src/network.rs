use crate::{
    config::NetConfig,
    error::NetError,
    node::{self, NodeHandle, NodeSpec},
    types::{Control, NodeId, Output, Position, RelayMode, Report},
    usage::Usage,
};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info};

/// Registry view of one outgoing channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub dst: NodeId,
    pub usage: Usage,
}

/// Registry-owned metadata about a node.
///
/// This is the copy renderers and the serializer read; the live actor keeps
/// its own working copy, updated through control messages.
#[derive(Debug)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub send_text: String,
    pub send_interval: Duration,
    pub relay_mode: RelayMode,
    pub paused: bool,
    pub position: Position,
    channels: Vec<Channel>,
    handle: NodeHandle,
}

impl NodeInfo {
    /// Outgoing channels, in creation order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn send_interval_ms(&self) -> u64 {
        self.send_interval.as_millis() as u64
    }

    pub fn has_channel_to(&self, dst: NodeId) -> bool {
        self.channels.iter().any(|c| c.dst == dst)
    }
}

/// What one [`Network::tick`] observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub reports: Vec<Report>,
    pub terminated: Vec<NodeId>,
}

/// Registry of a running population of node actors.
///
/// The only component that spawns or stops actors. Every mutating operation
/// updates the metadata first and then enqueues the equivalent control
/// message, so the actor converges to what the metadata says.
///
/// Operations on ids that are not registered fail with
/// [`NetError::UnknownNode`] and change nothing.
pub struct Network {
    /// Nodes by id.
    nodes: BTreeMap<NodeId, NodeInfo>,

    /// Id given to the next node spawned without an explicit one.
    next_id: NodeId,

    config: NetConfig,

    /// One report per delivered message, from every actor.
    reports_tx: Sender<Report>,
    reports_rx: Receiver<Report>,

    /// Each actor sends its id here once, right before its task ends.
    terminations_tx: Sender<NodeId>,
    terminations_rx: Receiver<NodeId>,
}

impl Network {
    /// Creates an empty network. Must be called inside a Tokio runtime
    /// before any node is spawned.
    pub fn new(config: NetConfig) -> Self {
        let (reports_tx, reports_rx) = mpsc::channel(config.report_capacity.max(1));
        let (terminations_tx, terminations_rx) = mpsc::channel(config.termination_capacity.max(1));
        Self {
            nodes: BTreeMap::new(),
            next_id: NodeId(0),
            config,
            reports_tx,
            reports_rx,
            terminations_tx,
            terminations_rx,
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeInfo> {
        self.nodes.get(&id)
    }

    /// All nodes, ordered by id.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    /// Usage of the channel `src -> dst`, if it exists.
    pub fn usage(&self, src: NodeId, dst: NodeId) -> Option<f64> {
        self.nodes
            .get(&src)?
            .channels
            .iter()
            .find(|c| c.dst == dst)
            .map(|c| c.usage.value())
    }

    pub fn next_id(&self) -> NodeId {
        self.next_id
    }

    /// Resets the id counter. Only meaningful on an empty network.
    pub fn reset_ids(&mut self) {
        self.next_id = NodeId(0);
    }

    /// Spawns a node with default settings and the next free id.
    ///
    /// Fails with [`NetError::IdOutOfRange`] once the id space is used up.
    pub fn spawn(&mut self, position: Position) -> Result<NodeId, NetError> {
        let mut id = self.next_id;
        while self.nodes.contains_key(&id) {
            id = id.next().ok_or(NetError::IdOutOfRange(id))?;
        }
        self.spawn_with(NodeSpec::new(id), position)
    }

    /// Spawns a node with an explicit id and initial behavior, keeping the
    /// id counter above every id ever supplied.
    ///
    /// `u32::MAX` is reserved: the counter could not move past it.
    pub fn spawn_with(&mut self, spec: NodeSpec, position: Position) -> Result<NodeId, NetError> {
        if self.nodes.contains_key(&spec.id) {
            return Err(NetError::DuplicateNode(spec.id));
        }
        let successor = spec.id.next().ok_or(NetError::IdOutOfRange(spec.id))?;
        let id = spec.id;
        self.insert(spec, successor, position);
        Ok(id)
    }

    fn insert(&mut self, spec: NodeSpec, successor: NodeId, position: Position) {
        let handle = node::spawn(
            &spec,
            &self.config,
            self.reports_tx.clone(),
            self.terminations_tx.clone(),
        );
        info!(node = %spec.id, x = position.x, y = position.y, "spawned node");

        if successor > self.next_id {
            self.next_id = successor;
        }
        self.nodes.insert(
            spec.id,
            NodeInfo {
                id: spec.id,
                name: spec.name,
                send_text: spec.send_text,
                send_interval: spec.send_interval,
                relay_mode: spec.relay_mode,
                paused: spec.paused,
                position,
                channels: Vec::new(),
                handle,
            },
        );
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeInfo, NetError> {
        self.nodes.get_mut(&id).ok_or(NetError::UnknownNode(id))
    }

    async fn send_ctl(&self, id: NodeId, ctl: Control) -> Result<(), NetError> {
        let info = self.nodes.get(&id).ok_or(NetError::UnknownNode(id))?;
        info.handle
            .control
            .send(ctl)
            .await
            .map_err(|_| NetError::ActorGone(id))
    }

    pub async fn set_name(&mut self, id: NodeId, name: impl Into<String>) -> Result<(), NetError> {
        let name = name.into();
        self.node_mut(id)?.name = name.clone();
        self.send_ctl(id, Control::SetName(name)).await
    }

    pub async fn set_send_text(&mut self, id: NodeId, text: impl Into<String>) -> Result<(), NetError> {
        let text = text.into();
        self.node_mut(id)?.send_text = text.clone();
        self.send_ctl(id, Control::SetSendText(text)).await
    }

    /// Sets the period of generated messages in milliseconds; zero stops
    /// generation.
    pub async fn set_send_interval(&mut self, id: NodeId, ms: u64) -> Result<(), NetError> {
        let interval = Duration::from_millis(ms);
        self.node_mut(id)?.send_interval = interval;
        self.send_ctl(id, Control::SetSendInterval(interval)).await
    }

    pub async fn set_relay_mode(&mut self, id: NodeId, mode: RelayMode) -> Result<(), NetError> {
        self.node_mut(id)?.relay_mode = mode;
        self.send_ctl(id, Control::SetRelayMode(mode)).await
    }

    /// Flips the paused flag and returns the new value.
    pub async fn toggle_pause(&mut self, id: NodeId) -> Result<bool, NetError> {
        let info = self.node_mut(id)?;
        info.paused = !info.paused;
        let paused = info.paused;
        self.send_ctl(id, Control::TogglePause).await?;
        Ok(paused)
    }

    /// Creates the channel `src -> dst` if missing, removes it otherwise.
    ///
    /// Returns whether the channel exists afterwards.
    pub async fn add_or_remove_channel(&mut self, src: NodeId, dst: NodeId) -> Result<bool, NetError> {
        let tx = self
            .nodes
            .get(&dst)
            .ok_or(NetError::UnknownNode(dst))?
            .handle
            .inbound
            .clone();
        let info = self.node_mut(src)?;

        if let Some(pos) = info.channels.iter().position(|c| c.dst == dst) {
            info.channels.remove(pos);
            debug!(src = %src, dst = %dst, "removed channel");
            self.send_ctl(src, Control::RemoveOutput(dst)).await?;
            return Ok(false);
        }

        info.channels.push(Channel {
            dst,
            usage: Usage::default(),
        });
        debug!(src = %src, dst = %dst, "added channel");
        self.send_ctl(src, Control::AddOutput(Output { tx, dst })).await?;
        Ok(true)
    }

    /// Enqueues a data message on the node's inbound queue, waiting for room
    /// if it is full.
    pub async fn inject(&self, id: NodeId, text: impl Into<String>) -> Result<(), NetError> {
        let info = self.nodes.get(&id).ok_or(NetError::UnknownNode(id))?;
        info.handle
            .inbound
            .send(text.into())
            .await
            .map_err(|_| NetError::ActorGone(id))
    }

    /// Asks a node to quit.
    ///
    /// Channels into the node are detached first so no other actor keeps
    /// sending to it. The metadata entry goes away once the termination is
    /// drained.
    pub async fn stop(&mut self, id: NodeId) -> Result<(), NetError> {
        if !self.nodes.contains_key(&id) {
            return Err(NetError::UnknownNode(id));
        }

        let sources: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.id != id && n.has_channel_to(id))
            .map(|n| n.id)
            .collect();
        for src in sources {
            if let Some(info) = self.nodes.get_mut(&src) {
                info.channels.retain(|c| c.dst != id);
            }
            match self.send_ctl(src, Control::RemoveOutput(id)).await {
                Ok(()) | Err(NetError::ActorGone(_)) => {}
                Err(e) => return Err(e),
            }
        }

        info!(node = %id, "stopping node");
        self.send_ctl(id, Control::Quit).await
    }

    /// Stops every node and waits until all of their tasks have ended.
    ///
    /// Waits for one termination per registered node, then clears the map.
    /// Reports and terminations are drained while each `Quit` is queued and
    /// while waiting, so an actor blocked on a full report sink can still
    /// empty its control queue and reach its `Quit`. Not reentrant: no node
    /// may be spawned while this runs.
    pub async fn stop_all_and_wait(&mut self) -> Result<(), NetError> {
        let outstanding = self.nodes.len();
        info!(nodes = outstanding, "stopping all nodes");

        let mut acknowledged = 0;
        for info in self.nodes.values() {
            let quit = info.handle.control.send(Control::Quit);
            tokio::pin!(quit);
            loop {
                tokio::select! {
                    sent = &mut quit => {
                        if sent.is_err() {
                            debug!(node = %info.id, "already ended");
                        }
                        break;
                    }
                    Some(id) = self.terminations_rx.recv() => {
                        debug!(node = %id, "node terminated");
                        acknowledged += 1;
                    }
                    _ = self.reports_rx.recv() => {}
                }
            }
        }

        while acknowledged < outstanding {
            tokio::select! {
                id = self.terminations_rx.recv() => {
                    // the sender half lives in self, so the queue never closes here
                    let Some(id) = id else { break };
                    debug!(node = %id, "node terminated");
                    acknowledged += 1;
                }
                _ = self.reports_rx.recv() => {}
            }
        }

        let nodes = std::mem::take(&mut self.nodes);
        for (_, info) in nodes {
            info.handle.task.await?;
        }
        while self.reports_rx.try_recv().is_ok() {}

        info!("all nodes stopped");
        Ok(())
    }

    /// Stops everything and restarts ids from zero.
    pub async fn clear(&mut self) -> Result<(), NetError> {
        self.stop_all_and_wait().await?;
        self.reset_ids();
        Ok(())
    }

    /// Lowers the usage of every channel by `step`, floored at 0.
    pub fn decay_usage(&mut self, step: f64) {
        for info in self.nodes.values_mut() {
            for c in &mut info.channels {
                c.usage.decay(step);
            }
        }
    }

    /// Applies every queued report (usage := 1) without waiting.
    pub fn drain_reports(&mut self) -> Vec<Report> {
        let mut drained = Vec::new();
        while let Ok(report) = self.reports_rx.try_recv() {
            if let Some(info) = self.nodes.get_mut(&report.src) {
                for c in info.channels.iter_mut().filter(|c| c.dst == report.dst) {
                    c.usage.touch();
                }
            }
            drained.push(report);
        }
        drained
    }

    /// Removes the metadata of every node whose termination is queued,
    /// without waiting.
    pub fn drain_terminations(&mut self) -> Vec<NodeId> {
        let mut drained = Vec::new();
        while let Ok(id) = self.terminations_rx.try_recv() {
            if self.nodes.remove(&id).is_some() {
                debug!(node = %id, "node removed");
            }
            drained.push(id);
        }
        drained
    }

    /// One step of the polling loop: decay, then reports, then terminations.
    pub fn tick(&mut self, decay_step: f64) -> TickSummary {
        self.decay_usage(decay_step);
        TickSummary {
            reports: self.drain_reports(),
            terminated: self.drain_terminations(),
        }
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new(NetConfig::default())
    }
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.nodes)
            .field("next_id", &self.next_id)
            .finish()
    }
}
