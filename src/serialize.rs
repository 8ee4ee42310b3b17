use crate::{escape::quote, network::Network, types::Position, NodeInfo};
use std::io::{self, Write};
use std::path::Path;
use tracing::info;

/// First line of every graph file.
pub const HEADER: &str = "digraph network {";

/// Last line of every graph file.
pub const TRAILER: &str = "}";

impl Network {
    /// Writes the network in text form.
    ///
    /// ```text
    /// digraph network {
    /// <id> [label="<name>"] // "<sendText>" <intervalMs> <relayMode> <paused> <x> <y>
    /// <src> -> <dst>
    /// }
    /// ```
    ///
    /// Nodes are written in id order, each followed by its outgoing channels.
    pub fn serialize<W: Write>(&self, w: &mut W) -> io::Result<()> {
        writeln!(w, "{HEADER}")?;
        for node in self.nodes() {
            write_node(w, node)?;
            writeln!(w)?;
        }
        writeln!(w, "{TRAILER}")
    }

    pub fn to_text(&self) -> String {
        let mut buf = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.serialize(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Writes the network to `path`, replacing any existing file.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let mut w = io::BufWriter::new(std::fs::File::create(path)?);
        self.serialize(&mut w)?;
        w.flush()?;
        info!(path = %path.display(), nodes = self.len(), "saved network");
        Ok(())
    }
}

fn write_node<W: Write>(w: &mut W, node: &NodeInfo) -> io::Result<()> {
    let Position { x, y } = node.position;
    writeln!(
        w,
        "{} [label={}] // {} {} {} {} {} {}",
        node.id,
        quote(&node.name),
        quote(&node.send_text),
        node.send_interval_ms(),
        node.relay_mode.code(),
        node.paused,
        x,
        y,
    )?;
    for c in node.channels() {
        writeln!(w, "{} -> {}", node.id, c.dst)?;
    }
    Ok(())
}
