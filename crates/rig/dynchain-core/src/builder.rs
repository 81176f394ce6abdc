//! End-to-end construction of a dynamic chain.

use crate::batch::EditBatch;
use crate::config::{DynChainConfig, NodeNames};
use crate::error::{BuildError, SceneError};
use crate::frames::{build_frames, ForwardSource, FrameNodes};
use crate::pipeline::{drive_curve_points, wire_simulation};
use crate::sampler::{sample_selection, ChainSample, SkippedItem};
use crate::scene::SceneStore;
use crate::spline::build_curve;
use crate::types::{NodeHandle, PlugRef};
use nalgebra::Point3;

/// Live nodes driving one controller's dynamic output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChainFrame {
    pub controller: NodeHandle,
    pub sampler: NodeHandle,
    pub locator: NodeHandle,
    pub matrix: NodeHandle,
    pub side: NodeHandle,
    pub rotation: NodeHandle,
    /// Subtract node feeding the forward row; `None` at the tip, which reads the tangent.
    pub segment: Option<NodeHandle>,
    pub parameter: f64,
}

/// Everything a run left in the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicChain {
    pub prefix: String,
    pub degree: usize,
    pub controls: Vec<NodeHandle>,
    pub positions: Vec<Point3<f64>>,
    pub skipped: Vec<SkippedItem>,
    pub curve_transform: NodeHandle,
    pub input_curve: NodeHandle,
    pub output_curve: NodeHandle,
    pub drivers: Vec<NodeHandle>,
    pub follicle: NodeHandle,
    pub hair_system: NodeHandle,
    pub nucleus: NodeHandle,
    pub cubic_follicle: bool,
    pub frames: Vec<ChainFrame>,
}

impl DynamicChain {
    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Output locators, index-aligned with the controllers.
    pub fn locators(&self) -> Vec<NodeHandle> {
        self.frames.iter().map(|f| f.locator).collect()
    }
}

/// Build a dynamic chain over the active selection.
///
/// Nothing is created when the selection holds fewer than two transforms. Once construction has
/// started a host failure leaves the graph partially built.
pub fn build_dynamic_chain<S: SceneStore + ?Sized>(
    store: &mut S,
    config: &DynChainConfig,
) -> Result<DynamicChain, BuildError> {
    config.validate()?;
    let chain = sample_selection(&*store)?;
    build_from_sample(store, config, chain)
}

/// Build a dynamic chain over an already sampled controller chain.
pub fn build_from_sample<S: SceneStore + ?Sized>(
    store: &mut S,
    config: &DynChainConfig,
    chain: ChainSample,
) -> Result<DynamicChain, BuildError> {
    config.validate()?;
    if !chain.is_aligned() {
        return Err(BuildError::MisalignedChain {
            controls: chain.controls.len(),
            positions: chain.positions.len(),
        });
    }
    if chain.len() < 2 {
        return Err(BuildError::Configuration { found: chain.len() });
    }
    let time = store
        .find_node(&config.time_node)
        .ok_or_else(|| SceneError::NodeNotFound(config.time_node.clone()))?;

    let degree = config.degree.min(chain.len() - 1);
    if degree != config.degree {
        log::debug!(
            "{} controls cannot carry a degree {} curve; using degree {degree}",
            chain.len(),
            config.degree
        );
    }
    let names = NodeNames::new(config.prefix_for(&*store));

    // curves
    let input = build_curve(store, &chain.positions, degree, None)?;
    let output = build_curve(store, &chain.positions, degree, Some(input.transform))?;

    let mut batch = EditBatch::new();
    batch.rename(input.transform, names.curve_transform());
    batch.rename(input.shape, names.input_curve());
    let drivers = drive_curve_points(&mut batch, &names, &chain.controls, input.shape);
    let sim = wire_simulation(
        &mut batch,
        &names,
        config,
        chain.len(),
        input,
        output.shape,
        time,
    );
    // parameters can only be read from an evaluated input curve
    batch.flush(store)?;

    let frames = build_frames(
        &*store,
        &mut batch,
        &names,
        config,
        input.shape,
        PlugRef::new(sim.follicle, "outCurve"),
        &chain,
    )?;
    batch.flush(store)?;

    let frames = chain
        .controls
        .iter()
        .zip(&frames)
        .map(|(&controller, frame)| resolve_frame(&batch, controller, frame))
        .collect::<Result<Vec<_>, _>>()?;
    let built = DynamicChain {
        prefix: names.prefix().to_string(),
        degree,
        controls: chain.controls,
        positions: chain.positions,
        skipped: chain.skipped,
        curve_transform: input.transform,
        input_curve: input.shape,
        output_curve: output.shape,
        drivers: drivers
            .into_iter()
            .map(|d| batch.resolve(d))
            .collect::<Result<_, _>>()?,
        follicle: batch.resolve(sim.follicle)?,
        hair_system: batch.resolve(sim.hair_system)?,
        nucleus: batch.resolve(sim.nucleus)?,
        cubic_follicle: sim.cubic,
        frames,
    };

    log::info!(
        "built dynamic chain '{}': {} controls, {} skipped, {} edit ops",
        built.prefix,
        built.len(),
        built.skipped.len(),
        batch.len()
    );
    Ok(built)
}

fn resolve_frame(
    batch: &EditBatch,
    controller: NodeHandle,
    frame: &FrameNodes,
) -> Result<ChainFrame, BuildError> {
    let segment = match frame.forward {
        ForwardSource::Segment(node) => Some(batch.resolve(node)?),
        ForwardSource::Tangent => None,
    };
    Ok(ChainFrame {
        controller,
        sampler: batch.resolve(frame.sampler)?,
        locator: batch.resolve(frame.locator)?,
        matrix: batch.resolve(frame.matrix)?,
        side: batch.resolve(frame.side)?,
        rotation: batch.resolve(frame.rotation)?,
        segment,
        parameter: frame.parameter,
    })
}
