use crate::types::NodeId;
use thiserror::Error;

/// Errors that can occur while operating on a running network.
#[derive(Error, Debug)]
pub enum NetError {
    /// The id is not present in the registry.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The node is still registered but its actor has already ended.
    #[error("actor for node {0} has ended")]
    ActorGone(NodeId),

    /// An explicit id was supplied for a node that already exists.
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// The id is the last representable one, so no id would be left to
    /// allocate after it.
    #[error("node id {0} is out of range")]
    IdOutOfRange(NodeId),

    /// An actor task panicked or was cancelled.
    #[error("task execution failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    /// Reading or writing a graph file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A graph file could not be parsed.
    #[error("couldn't parse network: {0}")]
    Parse(#[from] ParseError),
}

/// Errors raised while parsing the text graph format.
///
/// Any of these aborts the whole parse.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected 'digraph network {{' header")]
    MissingHeader,

    #[error("missing closing '}}'")]
    MissingTrailer,

    #[error("line {line}: expected {expected}, found {found:?}")]
    Expected {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("line {line}: invalid number for {field}")]
    InvalidNumber { line: usize, field: &'static str },

    #[error("line {line}: invalid boolean, expected 'true' or 'false'")]
    InvalidBool { line: usize },

    #[error("line {line}: invalid relay mode {value}")]
    InvalidRelayMode { line: usize, value: u64 },

    #[error("line {line}: unterminated string")]
    UnterminatedString { line: usize },

    #[error("line {line}: invalid escape sequence '\\{escape}'")]
    InvalidEscape { line: usize, escape: String },

    #[error("line {line}: node {id} declared twice")]
    DuplicateNode { line: usize, id: NodeId },

    #[error("channel {src} -> {dst} references an undeclared node")]
    UndeclaredNode { src: NodeId, dst: NodeId },
}

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
