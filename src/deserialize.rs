use crate::{
    config::NetConfig,
    error::{NetError, ParseError},
    escape::{unquote_from, UnquoteError},
    network::Network,
    node::NodeSpec,
    types::{NodeId, Position, RelayMode},
};
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// A node declaration read from a graph file.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    pub spec: NodeSpec,
    pub position: Position,
}

/// Parsed contents of a graph file, before any actor exists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Nodes in file order.
    pub nodes: Vec<GraphNode>,

    /// Channels in file order, duplicates removed.
    pub channels: Vec<(NodeId, NodeId)>,
}

impl Graph {
    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.spec.id).max()
    }
}

/// Parses the text graph format without spawning anything.
///
/// Channels may name nodes declared later in the file; they are checked once
/// every node is known. A node declared twice, or a channel whose endpoint is
/// never declared, fails the parse.
pub fn parse_graph(input: &str) -> Result<Graph, ParseError> {
    let mut s = Scanner::new(input);

    if !header(&mut s) {
        return Err(ParseError::MissingHeader);
    }

    let mut graph = Graph::default();
    let mut declared = HashSet::new();
    let mut seen_channels = HashSet::new();

    loop {
        s.skip_ws();
        match s.peek() {
            None => return Err(ParseError::MissingTrailer),
            Some('}') => {
                s.bump();
                break;
            }
            Some(_) => {}
        }

        // both kinds of line start with an id; the next character tells
        // them apart: '[' as in '[label=' or '-' as in '->'
        let line = s.line;
        let id = NodeId(s.integer("id")?);
        // the registry's id counter must be able to move past every id
        if id.next().is_none() {
            return Err(ParseError::InvalidNumber { line, field: "id" });
        }
        s.skip_ws();
        match s.peek() {
            Some('[') => {
                let node = parse_node(&mut s, id)?;
                if !declared.insert(id) {
                    return Err(ParseError::DuplicateNode { line, id });
                }
                graph.nodes.push(node);
            }
            Some('-') => {
                s.expect("->")?;
                let dst = NodeId(s.integer("destination id")?);
                if seen_channels.insert((id, dst)) {
                    graph.channels.push((id, dst));
                }
            }
            _ => return Err(s.unexpected("'[' or '->'")),
        }
    }

    s.skip_ws();
    if s.peek().is_some() {
        return Err(s.unexpected("end of input"));
    }

    if let Some(&(src, dst)) = graph
        .channels
        .iter()
        .find(|(src, dst)| !declared.contains(src) || !declared.contains(dst))
    {
        return Err(ParseError::UndeclaredNode { src, dst });
    }

    Ok(graph)
}

/// `digraph network {` on a line of its own, after any blank lines.
fn header(s: &mut Scanner<'_>) -> bool {
    s.skip_ws();
    if !s.eat("digraph") || s.skip_blanks() == 0 || !s.eat("network") {
        return false;
    }
    s.skip_blanks();
    if !s.eat("{") {
        return false;
    }
    s.skip_blanks();
    matches!(s.peek(), None | Some('\n' | '\r'))
}

/// `[label="<name>"] // "<sendText>" <intervalMs> <relayMode> <paused> <x> <y>`
fn parse_node(s: &mut Scanner<'_>, id: NodeId) -> Result<GraphNode, ParseError> {
    s.expect("[label=")?;
    let name = s.quoted()?;
    s.expect("]")?;
    s.expect("//")?;
    let send_text = s.quoted()?;
    let interval_ms: u64 = s.integer("send interval")?;

    let line = s.line;
    let code: u64 = s.integer("relay mode")?;
    let relay_mode =
        RelayMode::from_code(code).ok_or(ParseError::InvalidRelayMode { line, value: code })?;

    let paused = s.boolean()?;
    let x = s.integer("x")?;
    let y = s.integer("y")?;

    Ok(GraphNode {
        spec: NodeSpec {
            id,
            name,
            send_text,
            send_interval: Duration::from_millis(interval_ms),
            relay_mode,
            paused,
        },
        position: Position { x, y },
    })
}

struct Scanner<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0, line: 1 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    /// Skips spaces and tabs without leaving the line. Returns how many.
    fn skip_blanks(&mut self) -> usize {
        let mut n = 0;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
            n += 1;
        }
        n
    }

    /// Consumes `lit` if the input continues with it.
    fn eat(&mut self, lit: &str) -> bool {
        if !self.rest().starts_with(lit) {
            return false;
        }
        for _ in lit.chars() {
            self.bump();
        }
        true
    }

    fn expect(&mut self, lit: &'static str) -> Result<(), ParseError> {
        self.skip_ws();
        if self.eat(lit) {
            Ok(())
        } else {
            Err(self.unexpected(lit))
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        let found: String = self.rest().lines().next().unwrap_or("").chars().take(24).collect();
        ParseError::Expected {
            line: self.line,
            expected,
            found: if found.is_empty() {
                "end of input".into()
            } else {
                found
            },
        }
    }

    fn integer<T: FromStr>(&mut self, field: &'static str) -> Result<T, ParseError> {
        self.skip_ws();
        let start = self.pos;
        if matches!(self.peek(), Some('-' | '+')) {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| ParseError::InvalidNumber {
                line: self.line,
                field,
            })
    }

    fn boolean(&mut self) -> Result<bool, ParseError> {
        self.skip_ws();
        if self.eat("true") {
            Ok(true)
        } else if self.eat("false") {
            Ok(false)
        } else {
            Err(ParseError::InvalidBool { line: self.line })
        }
    }

    fn quoted(&mut self) -> Result<String, ParseError> {
        self.skip_ws();
        if self.peek() != Some('"') {
            return Err(self.unexpected("quoted string"));
        }
        let start_line = self.line;
        unquote_from(self).map_err(|e| match e {
            UnquoteError::NotQuoted => self.unexpected("quoted string"),
            UnquoteError::Unterminated => ParseError::UnterminatedString { line: start_line },
            UnquoteError::InvalidEscape(escape) => ParseError::InvalidEscape {
                line: self.line,
                escape,
            },
        })
    }
}

impl Iterator for Scanner<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        self.bump()
    }
}

impl Network {
    /// Builds and starts a network from an already parsed graph.
    ///
    /// On failure the partially built network is dropped, which makes every
    /// actor it started quit.
    pub async fn from_graph(graph: Graph, config: NetConfig) -> Result<Network, NetError> {
        let mut net = Network::new(config);
        for node in graph.nodes {
            net.spawn_with(node.spec, node.position)?;
        }
        for (src, dst) in graph.channels {
            net.add_or_remove_channel(src, dst).await?;
        }
        Ok(net)
    }

    /// Parses `input` and starts the network it describes.
    ///
    /// Returns the network and the largest node id in it. Nothing is spawned
    /// unless the whole input parses. The previous population, if any, must
    /// have been stopped with [`Network::stop_all_and_wait`] first.
    pub async fn deserialize(
        input: &str,
        config: NetConfig,
    ) -> Result<(Network, Option<NodeId>), NetError> {
        let graph = parse_graph(input)?;
        let max_id = graph.max_id();
        let net = Network::from_graph(graph, config).await?;
        Ok((net, max_id))
    }

    /// Reads and starts the network stored at `path`.
    pub async fn load(
        path: impl AsRef<Path>,
        config: NetConfig,
    ) -> Result<(Network, Option<NodeId>), NetError> {
        let path = path.as_ref();
        let input = tokio::fs::read_to_string(path).await?;
        let loaded = Network::deserialize(&input, config).await?;
        info!(path = %path.display(), nodes = loaded.0.len(), "loaded network");
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = r#"digraph network {
0 [label="node"] // "from 0" 500 1 false 10 -20
0 -> 1

1 [label="re\"lay\\"] // "line\nbreak" 0 0 true 30 40
1 -> 0
1 -> 2

2 [label="sink"] // "from 2" 0 2 false 0 0

}
"#;

    #[test]
    fn parses_nodes_and_channels() {
        let graph = parse_graph(SAMPLE).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.max_id(), Some(NodeId(2)));

        let first = &graph.nodes[0];
        assert_eq!(first.spec.send_interval, Duration::from_millis(500));
        assert_eq!(first.spec.relay_mode, RelayMode::Multicast);
        assert_eq!(first.position, Position::new(10, -20));

        let relay = &graph.nodes[1].spec;
        assert_eq!(relay.name, "re\"lay\\");
        assert_eq!(relay.send_text, "line\nbreak");
        assert!(relay.paused);
        assert_eq!(graph.nodes[2].spec.relay_mode, RelayMode::Discard);

        assert_eq!(
            graph.channels,
            vec![
                (NodeId(0), NodeId(1)),
                (NodeId(1), NodeId(0)),
                (NodeId(1), NodeId(2)),
            ]
        );
    }

    #[test]
    fn forward_references_resolve() {
        let input = "digraph network {\n5 -> 9\n9 [label=\"b\"] // \"t\" 0 0 false 0 0\n5 [label=\"a\"] // \"t\" 0 0 false 0 0\n}\n";
        let graph = parse_graph(input).unwrap();
        assert_eq!(graph.channels, vec![(NodeId(5), NodeId(9))]);
        assert_eq!(graph.max_id(), Some(NodeId(9)));
    }

    #[test]
    fn tolerates_loose_whitespace() {
        let input = "\n\n  digraph network {\n\n\t3   [label=\"x\"]   //   \"y\"  7 2 true -1 -2\n3->3\n   }  \n";
        let graph = parse_graph(input).unwrap();
        assert_eq!(graph.nodes[0].spec.send_interval, Duration::from_millis(7));
        assert_eq!(graph.channels, vec![(NodeId(3), NodeId(3))]);
    }

    #[test]
    fn empty_graph_has_no_max_id() {
        let graph = parse_graph("digraph network {\n}\n").unwrap();
        assert!(graph.nodes.is_empty());
        assert_eq!(graph.max_id(), None);
    }

    #[test]
    fn duplicate_channels_collapse() {
        let input = "digraph network {\n0 [label=\"a\"] // \"t\" 0 0 false 0 0\n0 -> 0\n0 -> 0\n}\n";
        assert_eq!(parse_graph(input).unwrap().channels.len(), 1);
    }

    #[rstest]
    #[case::empty("", ParseError::MissingHeader)]
    #[case::wrong_header("graph network {\n}\n", ParseError::MissingHeader)]
    #[case::glued_header("digraphnetwork{\n}\n", ParseError::MissingHeader)]
    #[case::split_header("digraph\nnetwork\n{\n}\n", ParseError::MissingHeader)]
    #[case::header_suffix("digraph networks {\n}\n", ParseError::MissingHeader)]
    #[case::no_trailer(
        "digraph network {\n0 [label=\"a\"] // \"t\" 0 0 false 0 0\n",
        ParseError::MissingTrailer
    )]
    #[case::bad_bool(
        "digraph network {\n0 [label=\"a\"] // \"t\" 0 0 maybe 0 0\n}\n",
        ParseError::InvalidBool { line: 2 }
    )]
    #[case::bad_mode(
        "digraph network {\n0 [label=\"a\"] // \"t\" 0 7 false 0 0\n}\n",
        ParseError::InvalidRelayMode { line: 2, value: 7 }
    )]
    #[case::negative_id(
        "digraph network {\n-1 [label=\"a\"] // \"t\" 0 0 false 0 0\n}\n",
        ParseError::InvalidNumber { line: 2, field: "id" }
    )]
    #[case::last_id(
        "digraph network {\n4294967295 [label=\"a\"] // \"t\" 0 0 false 0 0\n}\n",
        ParseError::InvalidNumber { line: 2, field: "id" }
    )]
    #[case::unterminated(
        "digraph network {\n0 [label=\"a] // t 0 0 false 0 0\n}\n",
        ParseError::UnterminatedString { line: 2 }
    )]
    #[case::bad_escape(
        "digraph network {\n0 [label=\"a\\q\"] // \"t\" 0 0 false 0 0\n}\n",
        ParseError::InvalidEscape { line: 2, escape: "q".into() }
    )]
    #[case::duplicate_node(
        "digraph network {\n0 [label=\"a\"] // \"t\" 0 0 false 0 0\n0 [label=\"b\"] // \"t\" 0 0 false 0 0\n}\n",
        ParseError::DuplicateNode { line: 3, id: NodeId(0) }
    )]
    #[case::undeclared(
        "digraph network {\n0 [label=\"a\"] // \"t\" 0 0 false 0 0\n0 -> 4\n}\n",
        ParseError::UndeclaredNode { src: NodeId(0), dst: NodeId(4) }
    )]
    fn rejects_malformed_input(#[case] input: &str, #[case] expected: ParseError) {
        assert_eq!(parse_graph(input).unwrap_err(), expected);
    }

    #[rstest]
    #[case::bad_discriminator("digraph network {\n0 = 1\n}\n")]
    #[case::missing_dst("digraph network {\n0 ->\n}\n")]
    #[case::unquoted_name("digraph network {\n0 [label=a] // \"t\" 0 0 false 0 0\n}\n")]
    #[case::missing_comment("digraph network {\n0 [label=\"a\"] \"t\" 0 0 false 0 0\n}\n")]
    #[case::trailing_garbage("digraph network {\n}\nextra\n")]
    fn rejects_structural_errors(#[case] input: &str) {
        assert!(parse_graph(input).is_err());
    }
}
