//! Oriented frames along the simulated curve.
//!
//! Each controller gets a locator pinned to the output curve at the parameter closest to that
//! controller on the input curve. The locator's rotation comes from a 4x4 whose first row is the
//! forward direction and whose second row is the up axis of a reference frame: the root
//! controller for the first locator, the previous locator for every later one. Forward is the
//! chord to the next sample, except at the tip where the curve tangent takes over.

use crate::batch::EditBatch;
use crate::config::{DynChainConfig, NodeNames};
use crate::error::BuildError;
use crate::sampler::ChainSample;
use crate::schema::{NodeKind, PMA_SUBTRACT, VP_VECTOR_MATRIX};
use crate::scene::SceneStore;
use crate::types::{NodeHandle, NodeRef, PlugRef};
use nalgebra::Point3;

/// Where a frame's side row is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideReference {
    Controller(NodeHandle),
    Locator(NodeRef),
}

impl SideReference {
    fn node(self) -> NodeRef {
        match self {
            SideReference::Controller(handle) => handle.into(),
            SideReference::Locator(node) => node,
        }
    }
}

/// Where a frame's forward row is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardSource {
    /// `output3D` of the segment node towards the next sample.
    Segment(NodeRef),
    /// Tangent of the sample itself.
    Tangent,
}

/// Nodes queued for one controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameNodes {
    pub sampler: NodeRef,
    pub locator: NodeRef,
    pub matrix: NodeRef,
    pub side: NodeRef,
    pub rotation: NodeRef,
    pub side_reference: SideReference,
    pub forward: ForwardSource,
    /// Parameter on the curve the sampler reads at.
    pub parameter: f64,
}

/// Closest parameter on `curve` for every position, in order.
///
/// The curve must already have been flushed and evaluated; hosts return a degenerate parameter
/// for geometry they have not evaluated.
pub fn chain_parameters<S: SceneStore + ?Sized>(
    store: &S,
    curve: NodeHandle,
    positions: &[Point3<f64>],
    iterations: u32,
) -> Result<Vec<f64>, BuildError> {
    positions
        .iter()
        .map(|p| store.param_at_point(curve, p, iterations).map_err(BuildError::from))
        .collect()
}

/// Queue the sampler, locator and orientation network for every parameter.
///
/// `strand` is the plug carrying the simulated curve, `root` the first controller of the chain.
pub fn reconstruct_frames(
    batch: &mut EditBatch,
    names: &NodeNames,
    strand: PlugRef,
    root: NodeHandle,
    parameters: &[f64],
) -> Vec<FrameNodes> {
    let mut frames: Vec<FrameNodes> = Vec::with_capacity(parameters.len());
    let mut reference = SideReference::Controller(root);

    for (i, &parameter) in parameters.iter().enumerate() {
        let sampler = batch.create_node(NodeKind::PointOnCurveInfo.type_name());
        batch.rename(sampler, names.sampler(i));
        batch.connect(strand.clone(), PlugRef::new(sampler, "inputCurve"));
        batch.set_float(PlugRef::new(sampler, "parameter"), parameter);

        let locator = batch.create_node(NodeKind::Locator.type_name());
        batch.rename(locator, names.locator(i));
        batch.connect(
            PlugRef::new(sampler, "position"),
            PlugRef::new(locator, "translate"),
        );

        let matrix = batch.create_node(NodeKind::FourByFourMatrix.type_name());
        batch.rename(matrix, names.frame_matrix(i));

        // side row: the reference frame's Y axis
        let side = batch.create_node(NodeKind::VectorProduct.type_name());
        batch.rename(side, names.side_vector(i));
        batch.set_float(PlugRef::new(side, "input1Y"), 1.0);
        batch.set_int(PlugRef::new(side, "operation"), VP_VECTOR_MATRIX);
        for (src, dst) in [("outputX", "in10"), ("outputY", "in11"), ("outputZ", "in12")] {
            batch.connect(PlugRef::new(side, src), PlugRef::new(matrix, dst));
        }
        batch.connect(
            PlugRef::element(reference.node(), "worldMatrix", 0),
            PlugRef::new(side, "matrix"),
        );

        let rotation = batch.create_node(NodeKind::DecomposeMatrix.type_name());
        batch.rename(rotation, names.rotation_decompose(i));
        batch.connect(
            PlugRef::new(matrix, "output"),
            PlugRef::new(rotation, "inputMatrix"),
        );
        batch.connect(
            PlugRef::new(rotation, "outputRotate"),
            PlugRef::new(locator, "rotate"),
        );

        frames.push(FrameNodes {
            sampler,
            locator,
            matrix,
            side,
            rotation,
            side_reference: reference,
            forward: ForwardSource::Tangent,
            parameter,
        });
        reference = SideReference::Locator(locator);
    }

    // forward rows need the next sampler, so they go in once every sampler is queued
    for j in 0..frames.len().saturating_sub(1) {
        let segment = batch.create_node(NodeKind::PlusMinusAverage.type_name());
        batch.rename(segment, names.segment(j));
        batch.set_int(PlugRef::new(segment, "operation"), PMA_SUBTRACT);
        batch.connect(
            PlugRef::new(frames[j + 1].sampler, "position"),
            PlugRef::element(segment, "input3D", 0),
        );
        batch.connect(
            PlugRef::new(frames[j].sampler, "position"),
            PlugRef::element(segment, "input3D", 1),
        );
        for (src, dst) in [("output3Dx", "in00"), ("output3Dy", "in01"), ("output3Dz", "in02")] {
            batch.connect(PlugRef::new(segment, src), PlugRef::new(frames[j].matrix, dst));
        }
        frames[j].forward = ForwardSource::Segment(segment);
    }

    if let Some(tip) = frames.last() {
        for (src, dst) in [("tangentX", "in00"), ("tangentY", "in01"), ("tangentZ", "in02")] {
            batch.connect(PlugRef::new(tip.sampler, src), PlugRef::new(tip.matrix, dst));
        }
    }

    frames
}

/// Parameters on `input_curve` followed by the frame network reading `strand`.
pub fn build_frames<S: SceneStore + ?Sized>(
    store: &S,
    batch: &mut EditBatch,
    names: &NodeNames,
    config: &DynChainConfig,
    input_curve: NodeHandle,
    strand: PlugRef,
    chain: &ChainSample,
) -> Result<Vec<FrameNodes>, BuildError> {
    let root = *chain
        .controls
        .first()
        .ok_or(BuildError::Configuration { found: 0 })?;
    let parameters = chain_parameters(store, input_curve, &chain.positions, config.param_iterations)?;
    Ok(reconstruct_frames(batch, names, strand, root, &parameters))
}
