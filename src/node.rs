use crate::{
    config::NetConfig,
    relay::{Relay, Targets},
    types::{Control, NodeId, Output, RelayMode, Report},
};
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Initial behavior of a node when its actor is spawned.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    pub id: NodeId,
    pub name: String,
    pub send_text: String,

    /// Zero means the node never generates messages on its own.
    pub send_interval: Duration,

    pub relay_mode: RelayMode,
    pub paused: bool,
}

impl NodeSpec {
    /// Defaults for a freshly created node.
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: "node".into(),
            send_text: format!("from {id}"),
            send_interval: Duration::ZERO,
            relay_mode: RelayMode::RoundRobin,
            paused: false,
        }
    }
}

/// Registry-side handle to a running actor.
#[derive(Debug)]
pub(crate) struct NodeHandle {
    pub control: Sender<Control>,
    pub inbound: Sender<String>,
    pub task: JoinHandle<()>,
}

/// Starts the actor for `spec` on the current runtime.
pub(crate) fn spawn(
    spec: &NodeSpec,
    config: &NetConfig,
    reports: Sender<Report>,
    terminations: Sender<NodeId>,
) -> NodeHandle {
    let (control_tx, control_rx) = mpsc::channel(config.control_capacity.max(1));
    let (inbound_tx, inbound_rx) = mpsc::channel(config.inbound_capacity.max(1));
    let actor = NodeActor {
        id: spec.id,
        name: spec.name.clone(),
        send_text: spec.send_text.clone(),
        send_interval: spec.send_interval,
        relay: Relay::new(spec.relay_mode),
        paused: spec.paused,
        outputs: Vec::new(),
        timer: None,
        control: control_rx,
        inbound: inbound_rx,
        reports,
        terminations,
    };
    let task = tokio::spawn(actor.run());
    NodeHandle {
        control: control_tx,
        inbound: inbound_tx,
        task,
    }
}

/// The task owning one node's live behavior.
///
/// All fields are private to the task; the registry changes them only by
/// sending [`Control`] messages.
struct NodeActor {
    id: NodeId,
    name: String,
    send_text: String,
    send_interval: Duration,
    relay: Relay,
    paused: bool,
    outputs: Vec<Output>,

    /// `None` while paused or when the interval is zero.
    timer: Option<Interval>,

    control: Receiver<Control>,
    inbound: Receiver<String>,
    reports: Sender<Report>,
    terminations: Sender<NodeId>,
}

impl NodeActor {
    async fn run(mut self) {
        info!(node = %self.id, name = %self.name, "start");
        self.reset_timer();

        let mut inbound_open = true;
        loop {
            tokio::select! {
                biased;

                ctl = self.control.recv() => match ctl {
                    Some(Control::Quit) | None => break,
                    Some(ctl) => self.apply(ctl),
                },

                msg = self.inbound.recv(), if inbound_open && !self.paused => match msg {
                    Some(text) => self.relay(text).await,
                    None => inbound_open = false,
                },

                _ = next_tick(&mut self.timer) => self.broadcast().await,
            }
        }

        info!(node = %self.id, name = %self.name, "quit");
        // release the queues first: senders blocked on this node must not
        // wait for the termination sink to have room
        drop(self.timer);
        drop(self.inbound);
        drop(self.outputs);
        let _ = self.terminations.send(self.id).await;
    }

    fn apply(&mut self, ctl: Control) {
        let id = self.id;
        match ctl {
            Control::SetName(name) => {
                debug!(node = %id, name = %name, "change name");
                self.name = name;
            }
            Control::AddOutput(out) => {
                debug!(node = %id, dst = %out.dst, "add output channel");
                self.outputs.push(out);
            }
            Control::RemoveOutput(dst) => {
                debug!(node = %id, dst = %dst, "delete output channel");
                if let Some(pos) = self.outputs.iter().position(|o| o.dst == dst) {
                    self.outputs.remove(pos);
                    self.relay.output_removed(pos, self.outputs.len());
                }
            }
            Control::SetRelayMode(mode) => {
                debug!(node = %id, mode = %mode, "change relay mode");
                self.relay.set_mode(mode);
            }
            Control::SetSendText(text) => {
                debug!(node = %id, text = %text, "change send text");
                self.send_text = text;
            }
            Control::SetSendInterval(interval) => {
                debug!(node = %id, ms = interval.as_millis() as u64, "change send interval");
                self.send_interval = interval;
                self.reset_timer();
            }
            Control::TogglePause => {
                self.paused = !self.paused;
                debug!(node = %id, paused = self.paused, "toggle pause");
                self.reset_timer();
            }
            // handled by the loop
            Control::Quit => {}
        }
    }

    /// Restarts the timer from now, or stops it when paused or disabled.
    fn reset_timer(&mut self) {
        self.timer = if self.paused || self.send_interval.is_zero() {
            None
        } else {
            let mut timer = interval_at(Instant::now() + self.send_interval, self.send_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            Some(timer)
        };
    }

    async fn relay(&mut self, text: String) {
        debug!(node = %self.id, text = %text, "received message");
        match self.relay.route(self.outputs.len()) {
            Targets::None => {}
            Targets::One(i) => {
                let out = &self.outputs[i];
                self.deliver(out, text, "round-robin").await;
            }
            Targets::All => {
                for out in &self.outputs {
                    self.deliver(out, text.clone(), "multicast").await;
                }
            }
        }
    }

    /// Timer firing: always multicast, whatever the relay mode.
    async fn broadcast(&self) {
        for out in &self.outputs {
            self.deliver(out, self.send_text.clone(), "send").await;
        }
    }

    /// Blocks until the destination queue has room, then reports the send.
    async fn deliver(&self, out: &Output, text: String, how: &'static str) {
        debug!(node = %self.id, dst = %out.dst, how, "relay");
        if out.tx.send(text).await.is_err() {
            warn!(node = %self.id, dst = %out.dst, "destination has ended, message dropped");
            return;
        }
        let _ = self
            .reports
            .send(Report {
                src: self.id,
                dst: out.dst,
            })
            .await;
    }
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}
