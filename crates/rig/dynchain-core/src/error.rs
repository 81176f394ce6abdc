//! Error types for the host abstraction and the chain builder.

use crate::types::{NodeHandle, Plug};
use thiserror::Error;

/// Failures reported by a [`SceneStore`](crate::scene::SceneStore) implementation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SceneError {
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),
    #[error("no node with handle {0}")]
    UnknownNode(NodeHandle),
    #[error("no node named '{0}'")]
    NodeNotFound(String),
    #[error("node type '{node_type}' has no attribute '{attr}'")]
    UnknownAttribute { node_type: String, attr: String },
    #[error("cannot set {plug}: {reason}")]
    InvalidValue { plug: Plug, reason: String },
    #[error("{0} is not a curve shape")]
    NotACurve(NodeHandle),
    #[error("{0} is not a transform")]
    NotATransform(NodeHandle),
    #[error("invalid curve: {0}")]
    InvalidCurve(String),
    #[error("dependency cycle while evaluating {0}")]
    Cycle(Plug),
    #[error("invalid scene fixture: {0}")]
    InvalidFixture(String),
    #[error("cannot evaluate {plug}: {reason}")]
    Evaluation { plug: Plug, reason: String },
}

/// Failures raised while building a dynamic chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("a selection of at least 2 controllers is required (found {found})")]
    Configuration { found: usize },
    #[error("chain has {controls} controls but {positions} positions")]
    MisalignedChain { controls: usize, positions: usize },
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("batch operation {op_index} failed: {source}")]
    Flush {
        op_index: usize,
        #[source]
        source: SceneError,
    },
    #[error("node reference {0} has not been created yet")]
    Unresolved(usize),
    #[error(transparent)]
    Scene(#[from] SceneError),
}
