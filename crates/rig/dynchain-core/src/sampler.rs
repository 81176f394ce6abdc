//! Resolve the active selection into the ordered controller chain.

use crate::error::{BuildError, SceneError};
use crate::scene::{matrix_translation, SceneStore};
use crate::types::NodeHandle;
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotDag,
    NotTransform,
}

/// A selected item left out of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedItem {
    pub node: NodeHandle,
    pub name: String,
    pub reason: SkipReason,
}

/// Controllers and their world positions, index-aligned and in selection order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainSample {
    pub controls: Vec<NodeHandle>,
    pub positions: Vec<Point3<f64>>,
    pub skipped: Vec<SkippedItem>,
}

impl ChainSample {
    /// A chain with nothing skipped. `controls` and `positions` must be index-aligned.
    pub fn new(controls: Vec<NodeHandle>, positions: Vec<Point3<f64>>) -> Self {
        Self {
            controls,
            positions,
            skipped: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Whether every control has exactly one position.
    pub fn is_aligned(&self) -> bool {
        self.controls.len() == self.positions.len()
    }
}

/// Sample the world-space position of every transform in `nodes`, preserving order.
/// Items that are not transforms are skipped with a warning.
pub fn sample_nodes<S: SceneStore + ?Sized>(
    store: &S,
    nodes: &[NodeHandle],
) -> Result<ChainSample, SceneError> {
    let mut sample = ChainSample::default();
    for &node in nodes {
        let caps = store.capabilities(node)?;
        let reason = if !caps.dag {
            Some(SkipReason::NotDag)
        } else if !caps.transform {
            Some(SkipReason::NotTransform)
        } else {
            None
        };

        if let Some(reason) = reason {
            let name = store.node_name(node)?;
            match reason {
                SkipReason::NotDag => {
                    log::warn!("skipping selected item: {name}. Not a dag node.")
                }
                SkipReason::NotTransform => {
                    log::warn!("skipping selected item: {name}. Not a transform.")
                }
            }
            sample.skipped.push(SkippedItem { node, name, reason });
            continue;
        }

        let world = store.world_matrix(node)?;
        sample.controls.push(node);
        sample.positions.push(matrix_translation(&world));
    }
    Ok(sample)
}

/// Sample the active selection. Fewer than two qualifying controllers is a configuration error.
pub fn sample_selection<S: SceneStore + ?Sized>(store: &S) -> Result<ChainSample, BuildError> {
    let sample = sample_nodes(store, &store.active_selection())?;
    if sample.len() < 2 {
        return Err(BuildError::Configuration {
            found: sample.len(),
        });
    }
    Ok(sample)
}
