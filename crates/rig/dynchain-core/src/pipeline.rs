//! Fixed wiring from the controllers through the hair simulation to the output curve.
//!
//! ```text
//! ctrl[i].worldMatrix ─> dcmpM[i] ─> inputCurve.controlPoints[i]
//! inputCurve.worldSpace ─> follicle.startPosition
//! follicle.outHair ─> hairSystem.inputHair      hairSystem.outputHair ─> follicle.currentPosition
//! hairSystem.currentState/startState ─> nucleus.inputActive/inputActiveStart
//! nucleus.outputObjects ─> hairSystem.nextState  nucleus.startFrame ─> hairSystem.startFrame
//! time.outTime ─> nucleus.currentTime, hairSystem.currentTime
//! follicle.outCurve ─> outputCurve.create
//! ```

use crate::batch::EditBatch;
use crate::config::{DynChainConfig, NodeNames};
use crate::schema::NodeKind;
use crate::types::{CurveNodes, NodeHandle, NodeRef, PlugRef};

/// Queue one decomposeMatrix per controller that feeds its world translation into the matching
/// control point of `curve`. Returns the decompose nodes, index-aligned with `controls`.
pub fn drive_curve_points(
    batch: &mut EditBatch,
    names: &NodeNames,
    controls: &[NodeHandle],
    curve: NodeHandle,
) -> Vec<NodeRef> {
    controls
        .iter()
        .enumerate()
        .map(|(i, &ctrl)| {
            let dcmp = batch.create_node(NodeKind::DecomposeMatrix.type_name());
            batch.rename(dcmp, names.drive_decompose(i));
            batch.connect(
                PlugRef::element(ctrl, "worldMatrix", 0),
                PlugRef::new(dcmp, "inputMatrix"),
            );
            batch.connect(
                PlugRef::new(dcmp, "outputTranslate"),
                PlugRef::element(curve, "controlPoints", i as u32),
            );
            dcmp
        })
        .collect()
}

/// Nodes of the simulation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationRefs {
    pub follicle: NodeRef,
    pub hair_system: NodeRef,
    pub nucleus: NodeRef,
    /// Whether the follicle was switched to a cubic, restarting fit.
    pub cubic: bool,
}

/// Queue the follicle → hair system → nucleus loop between the input and output curves.
pub fn wire_simulation(
    batch: &mut EditBatch,
    names: &NodeNames,
    config: &DynChainConfig,
    control_count: usize,
    input: CurveNodes,
    output_curve: NodeHandle,
    time: NodeHandle,
) -> SimulationRefs {
    // follicle
    let follicle = batch.create_node(NodeKind::Follicle.type_name());
    batch.rename(follicle, names.follicle());
    batch.connect(
        PlugRef::element(input.shape, "worldSpace", 0),
        PlugRef::new(follicle, "startPosition"),
    );

    let cubic = control_count >= config.cubic_follicle_min_controls;
    if cubic {
        batch.set_int(PlugRef::new(follicle, "restPose"), 1);
        batch.set_int(PlugRef::new(follicle, "startDirection"), 1);
        batch.set_int(PlugRef::new(follicle, "degree"), 3);
    }

    // hair system
    let hair_system = batch.create_node(NodeKind::HairSystem.type_name());
    batch.rename(hair_system, names.hair_system());
    batch.connect(
        PlugRef::new(follicle, "outHair"),
        PlugRef::element(hair_system, "inputHair", 0),
    );
    batch.connect(
        PlugRef::element(hair_system, "outputHair", 0),
        PlugRef::new(follicle, "currentPosition"),
    );

    // nucleus
    let nucleus = batch.create_node(NodeKind::Nucleus.type_name());
    batch.rename(nucleus, names.nucleus());
    batch.connect(
        PlugRef::new(hair_system, "currentState"),
        PlugRef::element(nucleus, "inputActive", 0),
    );
    batch.connect(
        PlugRef::new(hair_system, "startState"),
        PlugRef::element(nucleus, "inputActiveStart", 0),
    );
    batch.connect(
        PlugRef::new(nucleus, "startFrame"),
        PlugRef::new(hair_system, "startFrame"),
    );
    batch.connect(
        PlugRef::element(nucleus, "outputObjects", 0),
        PlugRef::new(hair_system, "nextState"),
    );

    // output curve mirrors the simulated strand
    batch.rename(output_curve, names.output_curve());
    batch.connect(
        PlugRef::new(follicle, "outCurve"),
        PlugRef::new(output_curve, "create"),
    );

    // time
    batch.connect(
        PlugRef::new(time, "outTime"),
        PlugRef::new(nucleus, "currentTime"),
    );
    batch.connect(
        PlugRef::new(time, "outTime"),
        PlugRef::new(hair_system, "currentTime"),
    );

    SimulationRefs {
        follicle,
        hair_system,
        nucleus,
        cubic,
    }
}
