use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque handle to a node living in the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub u32);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Reference to a node inside an [`EditBatch`](crate::batch::EditBatch): either a node that
/// already exists in the scene or one whose creation is still queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRef {
    Live(NodeHandle),
    Pending(usize),
}

impl From<NodeHandle> for NodeRef {
    fn from(handle: NodeHandle) -> Self {
        NodeRef::Live(handle)
    }
}

/// Address of a live attribute: `node.attr` or `node.attr[index]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plug {
    pub node: NodeHandle,
    pub attr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl Plug {
    pub fn new(node: NodeHandle, attr: impl Into<String>) -> Self {
        Self {
            node,
            attr: attr.into(),
            index: None,
        }
    }

    pub fn element(node: NodeHandle, attr: impl Into<String>, index: u32) -> Self {
        Self {
            node,
            attr: attr.into(),
            index: Some(index),
        }
    }
}

impl fmt::Display for Plug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(i) => write!(f, "{}.{}[{}]", self.node, self.attr, i),
            None => write!(f, "{}.{}", self.node, self.attr),
        }
    }
}

/// Plug address recorded in a batch, where the node may not exist yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlugRef {
    pub node: NodeRef,
    pub attr: &'static str,
    pub index: Option<u32>,
}

impl PlugRef {
    pub fn new(node: impl Into<NodeRef>, attr: &'static str) -> Self {
        Self {
            node: node.into(),
            attr,
            index: None,
        }
    }

    pub fn element(node: impl Into<NodeRef>, attr: &'static str, index: u32) -> Self {
        Self {
            node: node.into(),
            attr,
            index: Some(index),
        }
    }
}

/// Scalar values the tool writes onto attributes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrValue {
    Int(i64),
    Float(f64),
}

impl AttrValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            AttrValue::Int(i) => i as f64,
            AttrValue::Float(f) => f,
        }
    }
}

/// What the host reports a node can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeCapabilities {
    /// Part of the transform hierarchy (has a DAG path).
    pub dag: bool,
    /// Positionable transform carrying a world matrix.
    pub transform: bool,
}

/// The transform and shape produced by the curve construction primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurveNodes {
    pub transform: NodeHandle,
    pub shape: NodeHandle,
}
