//! In-process scene host.
//!
//! `MemoryScene` implements [`SceneStore`] over plain maps so the builder can run without a live
//! host application. It validates node types and plugs against the [`schema`](crate::schema)
//! registry, renames the way hosts do (bumping a trailing number until the name is free), keeps
//! freshly built curves unevaluated until [`SceneStore::evaluate`] runs, and can evaluate any plug
//! of the resulting graph (see [`eval`]).

pub mod eval;
mod fixture;

pub use eval::{compose_transform, rotation_of, EvalValue};
pub use fixture::{ControllerFixture, ExtraNodeFixture, SceneFixture};

use crate::dynamics::{DynamicsSolver, RestSolver};
use crate::error::SceneError;
use crate::scene::SceneStore;
use crate::schema::{registry, AttrSpec, AttrType, NodeKind, NodeSignature, Registry};
use crate::spline::{CurveData, CurveForm};
use crate::types::{AttrValue, CurveNodes, NodeCapabilities, NodeHandle, Plug};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Matrix4, Point3, Vector3};
use std::fmt;

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: NodeKind,
    name: String,
    parent: Option<NodeHandle>,
    values: HashMap<(String, Option<u32>), AttrValue>,
    curve: Option<CurveState>,
}

#[derive(Debug, Clone)]
struct CurveState {
    data: CurveData,
    evaluated: bool,
}

pub struct MemoryScene {
    registry: Registry,
    supported: HashSet<NodeKind>,
    nodes: Vec<MemoryNode>,
    names: HashMap<String, NodeHandle>,
    /// Destination plug -> source plug.
    inputs: HashMap<Plug, Plug>,
    selection: Vec<NodeHandle>,
    solver: Box<dyn DynamicsSolver>,
    time: f64,
}

impl fmt::Debug for MemoryScene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryScene")
            .field("nodes", &self.nodes.len())
            .field("connections", &self.inputs.len())
            .field("selection", &self.selection)
            .field("time", &self.time)
            .finish()
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryScene {
    /// Empty scene holding only the global `time1` node, with a [`RestSolver`].
    pub fn new() -> Self {
        let mut scene = Self {
            registry: registry(),
            supported: NodeKind::ALL.into_iter().collect(),
            nodes: Vec::new(),
            names: HashMap::new(),
            inputs: HashMap::new(),
            selection: Vec::new(),
            solver: Box::new(RestSolver),
            time: 1.0,
        };
        scene.insert_node(NodeKind::Time, "time1", None);
        scene
    }

    pub fn with_solver(mut self, solver: impl DynamicsSolver + 'static) -> Self {
        self.solver = Box::new(solver);
        self
    }

    /// Pretend the host lacks `kind`, as an older host version would.
    pub fn without_node_type(mut self, kind: NodeKind) -> Self {
        self.supported.remove(&kind);
        self
    }

    pub fn solver(&self) -> &dyn DynamicsSolver {
        self.solver.as_ref()
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connection_count(&self) -> usize {
        self.inputs.len()
    }

    /// Add a node of host type `type_name` under `name` (uniquified), bypassing the supported-type
    /// set. Meant for seeding scenes.
    pub fn add_named_node(&mut self, type_name: &str, name: &str) -> Result<NodeHandle, SceneError> {
        let kind = NodeKind::from_type_name(type_name)
            .ok_or_else(|| SceneError::UnknownNodeType(type_name.to_string()))?;
        Ok(self.insert_node(kind, name, None))
    }

    /// Add a root transform with translation and XYZ rotation in degrees.
    pub fn add_transform(&mut self, name: &str, translate: Vector3<f64>, rotate: Vector3<f64>) -> NodeHandle {
        self.add_transform_node(NodeKind::Transform, name, None, translate, rotate)
    }

    pub fn add_transform_node(
        &mut self,
        kind: NodeKind,
        name: &str,
        parent: Option<NodeHandle>,
        translate: Vector3<f64>,
        rotate: Vector3<f64>,
    ) -> NodeHandle {
        let node = self.insert_node(kind, name, parent);
        let entry = &mut self.nodes[node.0 as usize];
        for (axis, (t, r)) in ["X", "Y", "Z"].iter().zip(translate.iter().zip(rotate.iter())) {
            entry
                .values
                .insert((format!("translate{axis}"), None), AttrValue::Float(*t));
            entry
                .values
                .insert((format!("rotate{axis}"), None), AttrValue::Float(*r));
        }
        node
    }

    pub fn select(&mut self, nodes: &[NodeHandle]) {
        self.selection = nodes.to_vec();
    }

    pub fn kind_of(&self, node: NodeHandle) -> Result<NodeKind, SceneError> {
        self.node(node).map(|n| n.kind)
    }

    pub fn parent_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.node(node).ok().and_then(|n| n.parent)
    }

    /// Every node of `kind`, in creation order.
    pub fn nodes_of_kind(&self, kind: NodeKind) -> Vec<NodeHandle> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.kind == kind)
            .map(|(i, _)| NodeHandle(i as u32))
            .collect()
    }

    /// The plug feeding `dst`, if any.
    pub fn source_of(&self, dst: &Plug) -> Option<&Plug> {
        self.inputs.get(dst)
    }

    /// Every plug fed by `src`.
    pub fn destinations_of(&self, src: &Plug) -> Vec<Plug> {
        let mut out: Vec<Plug> = self
            .inputs
            .iter()
            .filter(|(_, s)| *s == src)
            .map(|(d, _)| d.clone())
            .collect();
        out.sort_by(|a, b| (a.node, &a.attr, a.index).cmp(&(b.node, &b.attr, b.index)));
        out
    }

    /// Logical indices of `attr` on `node` that have an incoming connection, ascending.
    pub fn connected_indices(&self, node: NodeHandle, attr: &str) -> Vec<u32> {
        let mut out: Vec<u32> = self
            .inputs
            .keys()
            .filter(|p| p.node == node && p.attr == attr)
            .filter_map(|p| p.index)
            .collect();
        out.sort_unstable();
        out
    }

    /// Value set on `plug`, if one was set.
    pub fn value(&self, plug: &Plug) -> Option<AttrValue> {
        self.stored(plug)
    }

    /// Whether the curve shape has been through an evaluation since it was built.
    pub fn is_evaluated(&self, curve: NodeHandle) -> bool {
        self.node(curve)
            .ok()
            .and_then(|n| n.curve.as_ref())
            .is_some_and(|c| c.evaluated)
    }

    /// Evaluate any plug of the graph.
    pub fn evaluate_plug(&self, plug: &Plug) -> Result<EvalValue, SceneError> {
        self.check_plug(plug)?;
        eval::Evaluator::new(self).plug(plug)
    }

    pub fn evaluate_vec3(&self, plug: &Plug) -> Result<Vector3<f64>, SceneError> {
        self.evaluate_plug(plug)?
            .as_vec3()
            .ok_or_else(|| SceneError::Evaluation {
                plug: plug.clone(),
                reason: "expected a vector".into(),
            })
    }

    pub(crate) fn stored(&self, plug: &Plug) -> Option<AttrValue> {
        self.node(plug.node)
            .ok()
            .and_then(|n| n.values.get(&(plug.attr.clone(), plug.index)).copied())
    }

    pub(crate) fn curve_data(&self, node: NodeHandle) -> Result<&CurveData, SceneError> {
        self.node(node)?
            .curve
            .as_ref()
            .map(|c| &c.data)
            .ok_or(SceneError::NotACurve(node))
    }

    pub(crate) fn signature(&self, kind: NodeKind) -> Result<&NodeSignature, SceneError> {
        self.registry
            .signature(kind)
            .ok_or_else(|| SceneError::UnknownNodeType(kind.type_name().to_string()))
    }

    pub(crate) fn attr_spec(&self, kind: NodeKind, attr: &str) -> Result<&AttrSpec, SceneError> {
        self.signature(kind)?
            .attr(attr)
            .ok_or_else(|| SceneError::UnknownAttribute {
                node_type: kind.type_name().to_string(),
                attr: attr.to_string(),
            })
    }

    fn node(&self, node: NodeHandle) -> Result<&MemoryNode, SceneError> {
        self.nodes
            .get(node.0 as usize)
            .ok_or(SceneError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeHandle) -> Result<&mut MemoryNode, SceneError> {
        self.nodes
            .get_mut(node.0 as usize)
            .ok_or(SceneError::UnknownNode(node))
    }

    /// Validate that `plug` names an attribute of its node, indexed exactly when it is an array.
    fn check_plug(&self, plug: &Plug) -> Result<&AttrSpec, SceneError> {
        let kind = self.kind_of(plug.node)?;
        let spec = self.attr_spec(kind, &plug.attr)?;
        if spec.array != plug.index.is_some() {
            let reason = if spec.array {
                "array attribute needs an element index"
            } else {
                "attribute is not an array"
            };
            return Err(SceneError::Evaluation {
                plug: plug.clone(),
                reason: reason.into(),
            });
        }
        Ok(spec)
    }

    /// First free name for `wanted`: the name itself, else its stem with the trailing number
    /// bumped until unused.
    fn unique_name(&self, wanted: &str) -> String {
        if !self.names.contains_key(wanted) {
            return wanted.to_string();
        }
        let stem = wanted.trim_end_matches(|c: char| c.is_ascii_digit());
        let start = wanted[stem.len()..].parse::<u64>().map(|n| n + 1).unwrap_or(1);
        (start..)
            .map(|k| format!("{stem}{k}"))
            .find(|candidate| !self.names.contains_key(candidate))
            .unwrap_or_else(|| wanted.to_string())
    }

    fn insert_node(&mut self, kind: NodeKind, name: &str, parent: Option<NodeHandle>) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len() as u32);
        let name = self.unique_name(name);
        self.names.insert(name.clone(), handle);
        self.nodes.push(MemoryNode {
            kind,
            name,
            parent,
            values: HashMap::new(),
            curve: None,
        });
        handle
    }
}

fn compatible(src: AttrType, dst: AttrType) -> bool {
    let scalar = |t: AttrType| matches!(t, AttrType::Int | AttrType::Float);
    src == dst || (scalar(src) && scalar(dst))
}

impl SceneStore for MemoryScene {
    fn create_node(&mut self, type_name: &str) -> Result<NodeHandle, SceneError> {
        let kind = NodeKind::from_type_name(type_name)
            .filter(|k| self.supported.contains(k))
            .ok_or_else(|| SceneError::UnknownNodeType(type_name.to_string()))?;
        Ok(self.insert_node(kind, &format!("{type_name}1"), None))
    }

    fn rename_node(&mut self, node: NodeHandle, name: &str) -> Result<String, SceneError> {
        let old = self.node(node)?.name.clone();
        if old == name {
            return Ok(old);
        }
        self.names.remove(&old);
        let unique = self.unique_name(name);
        self.names.insert(unique.clone(), node);
        self.node_mut(node)?.name = unique.clone();
        Ok(unique)
    }

    fn connect(&mut self, src: &Plug, dst: &Plug) -> Result<(), SceneError> {
        let src_ty = self.check_plug(src)?.ty;
        let dst_ty = self.check_plug(dst)?.ty;
        if !compatible(src_ty, dst_ty) {
            return Err(SceneError::Evaluation {
                plug: dst.clone(),
                reason: format!("cannot connect {src_ty:?} output from {src} into a {dst_ty:?} input"),
            });
        }
        self.inputs.insert(dst.clone(), src.clone());
        Ok(())
    }

    fn set_value(&mut self, plug: &Plug, value: AttrValue) -> Result<(), SceneError> {
        let ty = self.check_plug(plug)?.ty;
        if !matches!(ty, AttrType::Int | AttrType::Float) {
            return Err(SceneError::InvalidValue {
                plug: plug.clone(),
                reason: format!("{ty:?} attributes do not take scalar values"),
            });
        }
        self.node_mut(plug.node)?
            .values
            .insert((plug.attr.clone(), plug.index), value);
        Ok(())
    }

    fn evaluate(&mut self) -> Result<(), SceneError> {
        for node in &mut self.nodes {
            if let Some(curve) = node.curve.as_mut() {
                curve.evaluated = true;
            }
        }
        Ok(())
    }

    fn find_node(&self, name: &str) -> Option<NodeHandle> {
        self.names.get(name).copied()
    }

    fn node_name(&self, node: NodeHandle) -> Result<String, SceneError> {
        self.node(node).map(|n| n.name.clone())
    }

    fn active_selection(&self) -> Vec<NodeHandle> {
        self.selection.clone()
    }

    fn capabilities(&self, node: NodeHandle) -> Result<NodeCapabilities, SceneError> {
        let kind = self.kind_of(node)?;
        Ok(NodeCapabilities {
            dag: kind.is_dag(),
            transform: kind.is_transform(),
        })
    }

    fn world_matrix(&self, node: NodeHandle) -> Result<Matrix4<f64>, SceneError> {
        if !self.kind_of(node)?.is_transform() {
            return Err(SceneError::NotATransform(node));
        }
        let plug = Plug::element(node, "worldMatrix", 0);
        self.evaluate_plug(&plug)?
            .as_matrix()
            .ok_or_else(|| SceneError::Evaluation {
                plug,
                reason: "expected a matrix".into(),
            })
    }

    fn create_curve(&mut self, curve: &CurveData, parent: Option<NodeHandle>) -> Result<CurveNodes, SceneError> {
        curve.validate()?;
        if curve.form != CurveForm::Open {
            return Err(SceneError::InvalidCurve("only open curves are supported".into()));
        }
        if !self.supported.contains(&NodeKind::NurbsCurve) {
            return Err(SceneError::UnknownNodeType(NodeKind::NurbsCurve.type_name().into()));
        }
        let transform = match parent {
            Some(t) => {
                if !self.kind_of(t)?.is_transform() {
                    return Err(SceneError::NotATransform(t));
                }
                t
            }
            None => self.insert_node(NodeKind::Transform, "curve1", None),
        };
        let shape_name = format!("{}Shape", self.node(transform)?.name);
        let shape = self.insert_node(NodeKind::NurbsCurve, &shape_name, Some(transform));
        self.node_mut(shape)?.curve = Some(CurveState {
            data: curve.clone(),
            evaluated: false,
        });
        Ok(CurveNodes { transform, shape })
    }

    fn param_at_point(&self, curve: NodeHandle, point: &Point3<f64>, iterations: u32) -> Result<f64, SceneError> {
        let state = self
            .node(curve)?
            .curve
            .as_ref()
            .ok_or(SceneError::NotACurve(curve))?;
        // Unevaluated geometry has no parameterization yet.
        if !state.evaluated {
            return Ok(0.0);
        }
        let shape = self
            .evaluate_plug(&Plug::element(curve, "worldSpace", 0))?
            .into_curve()
            .ok_or(SceneError::NotACurve(curve))?;
        Ok(shape.closest_param(point, iterations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(n: usize) -> CurveData {
        CurveData::open((0..n).map(|i| Point3::new(i as f64, 0.0, 0.0)).collect(), 2).unwrap()
    }

    #[test]
    fn starts_with_the_global_time_node() {
        let scene = MemoryScene::new();
        let time = scene.find_node("time1").expect("time1");
        assert_eq!(scene.kind_of(time).unwrap(), NodeKind::Time);
    }

    #[test]
    fn renames_bump_trailing_numbers() {
        let mut scene = MemoryScene::new();
        let a = scene.create_node("locator").unwrap();
        let b = scene.create_node("locator").unwrap();
        let c = scene.create_node("locator").unwrap();
        assert_eq!(scene.node_name(a).unwrap(), "locator1");
        assert_eq!(scene.node_name(b).unwrap(), "locator2");
        assert_eq!(scene.rename_node(a, "tail_loc0").unwrap(), "tail_loc0");
        assert_eq!(scene.rename_node(b, "tail_loc0").unwrap(), "tail_loc1");
        assert_eq!(scene.rename_node(c, "tail_loc0").unwrap(), "tail_loc2");
        assert_eq!(scene.rename_node(c, "shape").unwrap(), "shape");
        assert!(scene.find_node("tail_loc2").is_none());
    }

    #[test]
    fn unsupported_types_fail_to_create() {
        let mut scene = MemoryScene::new().without_node_type(NodeKind::Nucleus);
        assert_eq!(
            scene.create_node("nucleus").unwrap_err(),
            SceneError::UnknownNodeType("nucleus".into())
        );
        assert!(scene.create_node("hairSystem").is_ok());
    }

    #[test]
    fn connect_validates_attributes_and_types() {
        let mut scene = MemoryScene::new();
        let loc = scene.create_node("locator").unwrap();
        let dcmp = scene.create_node("decomposeMatrix").unwrap();
        assert!(scene
            .connect(&Plug::element(loc, "worldMatrix", 0), &Plug::new(dcmp, "inputMatrix"))
            .is_ok());
        assert!(matches!(
            scene.connect(&Plug::element(loc, "worldMatrix", 0), &Plug::new(dcmp, "bogus")),
            Err(SceneError::UnknownAttribute { .. })
        ));
        assert!(scene
            .connect(&Plug::new(loc, "worldMatrix"), &Plug::new(dcmp, "inputMatrix"))
            .is_err());
        assert!(scene
            .connect(&Plug::new(dcmp, "outputRotate"), &Plug::new(dcmp, "inputMatrix"))
            .is_err());
    }

    #[test]
    fn curve_params_are_degenerate_until_evaluated() {
        let mut scene = MemoryScene::new();
        let nodes = scene.create_curve(&line(4), None).unwrap();
        let target = Point3::new(3.0, 0.0, 0.0);
        assert!(!scene.is_evaluated(nodes.shape));
        assert_eq!(scene.param_at_point(nodes.shape, &target, 10).unwrap(), 0.0);
        scene.evaluate().unwrap();
        let t = scene.param_at_point(nodes.shape, &target, 10).unwrap();
        assert!((t - 2.0).abs() < 1e-9);
    }

    #[test]
    fn curves_can_share_a_transform() {
        let mut scene = MemoryScene::new();
        let first = scene.create_curve(&line(3), None).unwrap();
        let second = scene.create_curve(&line(3), Some(first.transform)).unwrap();
        assert_eq!(first.transform, second.transform);
        assert_ne!(first.shape, second.shape);
        assert_eq!(scene.parent_of(second.shape), Some(first.transform));
        assert_eq!(scene.node_name(first.shape).unwrap(), "curve1Shape");
        assert_eq!(scene.node_name(second.shape).unwrap(), "curve1Shape1");
        assert!(matches!(
            scene.create_curve(&line(3), Some(first.shape)),
            Err(SceneError::NotATransform(_))
        ));
    }

    #[test]
    fn world_matrix_includes_parents() {
        let mut scene = MemoryScene::new();
        let root = scene.add_transform("root", Vector3::new(0.0, 5.0, 0.0), Vector3::new(0.0, 0.0, 90.0));
        let child = scene.add_transform_node(
            NodeKind::Joint,
            "child",
            Some(root),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::zeros(),
        );
        let m = scene.world_matrix(child).unwrap();
        let t = crate::scene::matrix_translation(&m);
        assert!((t - Point3::new(0.0, 7.0, 0.0)).norm() < 1e-9);
    }

    #[test]
    fn vector_matrix_product_reads_a_matrix_row() {
        let mut scene = MemoryScene::new();
        let ctrl = scene.add_transform("ctrl", Vector3::zeros(), Vector3::new(90.0, 0.0, 0.0));
        let vp = scene.create_node("vectorProduct").unwrap();
        scene.set_value(&Plug::new(vp, "input1Y"), AttrValue::Int(1)).unwrap();
        scene
            .set_value(&Plug::new(vp, "operation"), AttrValue::Int(crate::schema::VP_VECTOR_MATRIX))
            .unwrap();
        scene
            .connect(&Plug::element(ctrl, "worldMatrix", 0), &Plug::new(vp, "matrix"))
            .unwrap();
        let out = scene.evaluate_vec3(&Plug::new(vp, "output")).unwrap();
        assert!((out - Vector3::z()).norm() < 1e-9);
        let y = scene.evaluate_plug(&Plug::new(vp, "outputY")).unwrap();
        assert!(y.as_scalar().unwrap().abs() < 1e-9);
    }

    #[test]
    fn plus_minus_average_subtracts_in_index_order() {
        let mut scene = MemoryScene::new();
        let a = scene.add_transform("a", Vector3::new(1.0, 1.0, 0.0), Vector3::zeros());
        let b = scene.add_transform("b", Vector3::new(4.0, 3.0, 0.0), Vector3::zeros());
        let pma = scene.create_node("plusMinusAverage").unwrap();
        scene
            .connect(&Plug::new(b, "translate"), &Plug::element(pma, "input3D", 0))
            .unwrap();
        scene
            .connect(&Plug::new(a, "translate"), &Plug::element(pma, "input3D", 1))
            .unwrap();
        scene
            .set_value(&Plug::new(pma, "operation"), AttrValue::Int(crate::schema::PMA_SUBTRACT))
            .unwrap();
        let out = scene.evaluate_vec3(&Plug::new(pma, "output3D")).unwrap();
        assert_eq!(out, Vector3::new(3.0, 2.0, 0.0));
    }

    #[test]
    fn cycles_are_reported() {
        let mut scene = MemoryScene::new();
        let a = scene.add_transform("a", Vector3::zeros(), Vector3::zeros());
        let dcmp = scene.create_node("decomposeMatrix").unwrap();
        scene
            .connect(&Plug::element(a, "worldMatrix", 0), &Plug::new(dcmp, "inputMatrix"))
            .unwrap();
        scene
            .connect(&Plug::new(dcmp, "outputTranslate"), &Plug::new(a, "translate"))
            .unwrap();
        assert!(matches!(
            scene.world_matrix(a),
            Err(SceneError::Cycle(_))
        ));
    }
}
