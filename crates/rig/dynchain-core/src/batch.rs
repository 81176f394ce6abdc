//! Deferred scene edits.
//!
//! An [`EditBatch`] records node creations, renames, connections and value sets without touching
//! the scene. [`EditBatch::flush`] applies everything recorded since the previous flush, in order,
//! and then lets the host evaluate. Reads that depend on freshly built geometry (closest-parameter
//! queries in particular) must happen after the flush that created it.

use crate::error::BuildError;
use crate::scene::SceneStore;
use crate::types::{AttrValue, NodeHandle, NodeRef, Plug, PlugRef};

#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    CreateNode {
        slot: usize,
        type_name: &'static str,
    },
    Rename {
        node: NodeRef,
        name: String,
    },
    Connect {
        src: PlugRef,
        dst: PlugRef,
    },
    SetValue {
        plug: PlugRef,
        value: AttrValue,
    },
}

/// Outcome of a single flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Ops applied by this flush.
    pub applied: usize,
    /// Nodes created by this flush.
    pub created: usize,
}

#[derive(Debug, Default)]
pub struct EditBatch {
    ops: Vec<EditOp>,
    flushed: usize,
    created: Vec<Option<NodeHandle>>,
}

impl EditBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node creation. The returned reference can be used in later ops right away and
    /// resolves to a live handle once flushed.
    pub fn create_node(&mut self, type_name: &'static str) -> NodeRef {
        let slot = self.created.len();
        self.created.push(None);
        self.ops.push(EditOp::CreateNode { slot, type_name });
        NodeRef::Pending(slot)
    }

    pub fn rename(&mut self, node: impl Into<NodeRef>, name: impl Into<String>) {
        self.ops.push(EditOp::Rename {
            node: node.into(),
            name: name.into(),
        });
    }

    pub fn connect(&mut self, src: PlugRef, dst: PlugRef) {
        self.ops.push(EditOp::Connect { src, dst });
    }

    pub fn set_value(&mut self, plug: PlugRef, value: AttrValue) {
        self.ops.push(EditOp::SetValue { plug, value });
    }

    pub fn set_int(&mut self, plug: PlugRef, value: i64) {
        self.set_value(plug, AttrValue::Int(value));
    }

    pub fn set_float(&mut self, plug: PlugRef, value: f64) {
        self.set_value(plug, AttrValue::Float(value));
    }

    /// Every op recorded so far, flushed or not.
    pub fn ops(&self) -> &[EditOp] {
        &self.ops
    }

    /// Ops recorded since the last flush.
    pub fn pending(&self) -> &[EditOp] {
        &self.ops[self.flushed..]
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Live handle for `node`. Pending references resolve only after their creation was flushed.
    pub fn resolve(&self, node: NodeRef) -> Result<NodeHandle, BuildError> {
        match node {
            NodeRef::Live(handle) => Ok(handle),
            NodeRef::Pending(slot) => self
                .created
                .get(slot)
                .copied()
                .flatten()
                .ok_or(BuildError::Unresolved(slot)),
        }
    }

    pub fn resolve_plug(&self, plug: &PlugRef) -> Result<Plug, BuildError> {
        Ok(Plug {
            node: self.resolve(plug.node)?,
            attr: plug.attr.to_string(),
            index: plug.index,
        })
    }

    /// Apply every op recorded since the previous flush, then evaluate.
    ///
    /// Earlier flushes are never replayed. When the host rejects an op the error carries its
    /// index; ops before it stay applied and no rollback is attempted.
    pub fn flush<S: SceneStore + ?Sized>(&mut self, store: &mut S) -> Result<FlushReport, BuildError> {
        let mut report = FlushReport::default();
        for index in self.flushed..self.ops.len() {
            let result = self.apply(index, store);
            if let Err(err) = result {
                self.flushed = index + 1;
                return Err(err);
            }
            if matches!(self.ops[index], EditOp::CreateNode { .. }) {
                report.created += 1;
            }
            report.applied += 1;
        }
        self.flushed = self.ops.len();
        store.evaluate()?;
        log::debug!(
            "flushed {} edit ops ({} nodes created)",
            report.applied,
            report.created
        );
        Ok(report)
    }

    fn apply<S: SceneStore + ?Sized>(&mut self, index: usize, store: &mut S) -> Result<(), BuildError> {
        let wrap = |source| BuildError::Flush {
            op_index: index,
            source,
        };
        match &self.ops[index] {
            EditOp::CreateNode { slot, type_name } => {
                let slot = *slot;
                let handle = store.create_node(type_name).map_err(wrap)?;
                self.created[slot] = Some(handle);
            }
            EditOp::Rename { node, name } => {
                let handle = self.resolve(*node)?;
                store.rename_node(handle, name).map_err(wrap)?;
            }
            EditOp::Connect { src, dst } => {
                let src = self.resolve_plug(src)?;
                let dst = self.resolve_plug(dst)?;
                store.connect(&src, &dst).map_err(wrap)?;
            }
            EditOp::SetValue { plug, value } => {
                let plug = self.resolve_plug(plug)?;
                store.set_value(&plug, *value).map_err(wrap)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SceneError;
    use crate::memory::MemoryScene;

    #[test]
    fn nothing_happens_until_flush() {
        let mut scene = MemoryScene::new();
        let before = scene.node_count();
        let mut batch = EditBatch::new();
        let node = batch.create_node("decomposeMatrix");
        batch.rename(node, "tail_dcmpM");
        assert_eq!(scene.node_count(), before);
        assert!(batch.resolve(node).is_err());

        let report = batch.flush(&mut scene).unwrap();
        assert_eq!(report, FlushReport { applied: 2, created: 1 });
        let handle = batch.resolve(node).unwrap();
        assert_eq!(scene.node_name(handle).unwrap(), "tail_dcmpM");
        assert_eq!(scene.find_node("tail_dcmpM"), Some(handle));
    }

    #[test]
    fn later_flushes_extend_without_replaying() {
        let mut scene = MemoryScene::new();
        let mut batch = EditBatch::new();
        batch.create_node("vectorProduct");
        let first = batch.flush(&mut scene).unwrap();
        assert_eq!(first.created, 1);
        assert!(batch.pending().is_empty());

        let again = batch.flush(&mut scene).unwrap();
        assert_eq!(again, FlushReport::default());

        batch.create_node("vectorProduct");
        batch.create_node("fourByFourMatrix");
        let second = batch.flush(&mut scene).unwrap();
        assert_eq!(second.created, 2);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn ops_apply_in_recorded_order() {
        let mut scene = MemoryScene::new();
        let mut batch = EditBatch::new();
        let a = batch.create_node("plusMinusAverage");
        batch.set_int(PlugRef::new(a, "operation"), 2);
        batch.set_int(PlugRef::new(a, "operation"), 1);
        batch.flush(&mut scene).unwrap();
        let handle = batch.resolve(a).unwrap();
        assert_eq!(
            scene.value(&Plug::new(handle, "operation")),
            Some(AttrValue::Int(1))
        );
    }

    #[test]
    fn host_failure_reports_op_index_and_keeps_prefix() {
        let mut scene = MemoryScene::new();
        let mut batch = EditBatch::new();
        let ok = batch.create_node("decomposeMatrix");
        batch.create_node("nParticle");
        let err = batch.flush(&mut scene).unwrap_err();
        assert_eq!(
            err,
            BuildError::Flush {
                op_index: 1,
                source: SceneError::UnknownNodeType("nParticle".into()),
            }
        );
        assert!(batch.resolve(ok).is_ok());
    }
}
