//! Pull evaluation for [`MemoryScene`](super::MemoryScene).
//!
//! A plug's value comes from its incoming connection when it has one, otherwise from the node's
//! compute rule (outputs) or its stored/default value (inputs). Dynamics feedback inputs
//! (`currentPosition`, `nextState`, `inputActive*`) are never pulled; the follicle consults the
//! scene's [`DynamicsSolver`](crate::dynamics::DynamicsSolver) instead.

use super::MemoryScene;
use crate::error::SceneError;
use crate::schema::{
    AttrSpec, AttrType, NodeKind, PMA_AVERAGE, PMA_NONE, PMA_SUBTRACT, PMA_SUM, VP_CROSS, VP_DOT,
    VP_POINT_MATRIX, VP_VECTOR_MATRIX,
};
use crate::spline::CurveData;
use crate::types::{NodeHandle, Plug};
use hashbrown::{HashMap, HashSet};
use nalgebra::{Matrix3, Matrix4, Rotation3, Vector3, Vector4};

#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Scalar(f64),
    Vec3(Vector3<f64>),
    Matrix(Matrix4<f64>),
    Curve(CurveData),
    Time(f64),
    /// Opaque simulation state.
    State,
}

impl EvalValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            EvalValue::Scalar(v) | EvalValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vector3<f64>> {
        match self {
            EvalValue::Vec3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_matrix(&self) -> Option<Matrix4<f64>> {
        match self {
            EvalValue::Matrix(m) => Some(*m),
            _ => None,
        }
    }

    pub fn into_curve(self) -> Option<CurveData> {
        match self {
            EvalValue::Curve(c) => Some(c),
            _ => None,
        }
    }
}

/// Row-vector world matrix from translation and XYZ Euler rotation in degrees.
pub fn compose_transform(translate: &Vector3<f64>, rotate_deg: &Vector3<f64>) -> Matrix4<f64> {
    let r = Rotation3::from_euler_angles(
        rotate_deg.x.to_radians(),
        rotate_deg.y.to_radians(),
        rotate_deg.z.to_radians(),
    );
    // Rows are the rotated axes.
    let rows = r.matrix().transpose();
    let mut m = Matrix4::identity();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rows);
    m[(3, 0)] = translate.x;
    m[(3, 1)] = translate.y;
    m[(3, 2)] = translate.z;
    m
}

fn row(m: &Matrix4<f64>, r: usize) -> Vector3<f64> {
    Vector3::new(m[(r, 0)], m[(r, 1)], m[(r, 2)])
}

/// XYZ Euler rotation in degrees of the frame spanned by rows 0 and 1 of `m`, after
/// Gram-Schmidt. Row 2 only breaks ties when row 1 is parallel to row 0.
pub fn rotation_of(m: &Matrix4<f64>) -> Vector3<f64> {
    let Some(x) = row(m, 0).try_normalize(1e-12) else {
        return Vector3::zeros();
    };
    let r1 = row(m, 1);
    let y = (r1 - x * x.dot(&r1))
        .try_normalize(1e-12)
        .or_else(|| row(m, 2).cross(&x).try_normalize(1e-12));
    let Some(y) = y else {
        return Vector3::zeros();
    };
    let z = x.cross(&y);
    let rot = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    let (rx, ry, rz) = rot.euler_angles();
    Vector3::new(rx.to_degrees(), ry.to_degrees(), rz.to_degrees())
}

pub(crate) struct Evaluator<'a> {
    scene: &'a MemoryScene,
    visiting: HashSet<Plug>,
    cache: HashMap<Plug, EvalValue>,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(scene: &'a MemoryScene) -> Self {
        Self {
            scene,
            visiting: HashSet::new(),
            cache: HashMap::new(),
        }
    }

    pub(crate) fn plug(&mut self, plug: &Plug) -> Result<EvalValue, SceneError> {
        if let Some(v) = self.cache.get(plug) {
            return Ok(v.clone());
        }
        if !self.visiting.insert(plug.clone()) {
            return Err(SceneError::Cycle(plug.clone()));
        }
        let result = self.compute(plug);
        self.visiting.remove(plug);
        let value = result?;
        self.cache.insert(plug.clone(), value.clone());
        Ok(value)
    }

    fn compute(&mut self, plug: &Plug) -> Result<EvalValue, SceneError> {
        if let Some(src) = self.scene.source_of(plug) {
            let src = src.clone();
            return self.plug(&src);
        }
        let kind = self.scene.kind_of(plug.node)?;
        let spec = self.scene.attr_spec(kind, &plug.attr)?.clone();

        // A scalar child reads through its connected parent.
        if let Some((parent, component)) = spec.child_of {
            let parent_plug = Plug::new(plug.node, parent);
            if self.scene.source_of(&parent_plug).is_some() || is_output(kind, parent) {
                let v = self.vec3(&parent_plug)?;
                return Ok(EvalValue::Scalar(v[component]));
            }
        }

        if is_output(kind, &plug.attr) {
            return self.output(kind, plug);
        }
        self.input(kind, &spec, plug)
    }

    /// Unconnected input: stored value, assembled children, or the attribute default.
    fn input(&mut self, kind: NodeKind, spec: &AttrSpec, plug: &Plug) -> Result<EvalValue, SceneError> {
        if let Some(v) = self.scene.stored(plug) {
            return Ok(EvalValue::Scalar(v.as_f64()));
        }
        match spec.ty {
            AttrType::Vec3 => {
                let sig = self.scene.signature(kind)?;
                let children: Vec<&'static str> = sig
                    .attrs
                    .iter()
                    .filter(|a| matches!(a.child_of, Some((p, _)) if p == spec.name))
                    .map(|a| a.name)
                    .collect();
                let mut v = Vector3::zeros();
                for (i, child) in children.into_iter().enumerate().take(3) {
                    v[i] = self.scalar(&Plug::new(plug.node, child))?;
                }
                Ok(EvalValue::Vec3(v))
            }
            AttrType::Int | AttrType::Float => Ok(EvalValue::Scalar(default_scalar(kind, &plug.attr))),
            AttrType::Matrix => Ok(EvalValue::Matrix(Matrix4::identity())),
            AttrType::Time => Ok(EvalValue::Time(self.scene.time())),
            AttrType::State => Ok(EvalValue::State),
            AttrType::Curve => Err(SceneError::Evaluation {
                plug: plug.clone(),
                reason: "no curve connected".into(),
            }),
        }
    }

    fn output(&mut self, kind: NodeKind, plug: &Plug) -> Result<EvalValue, SceneError> {
        let node = plug.node;
        let at = |attr: &'static str| Plug::new(node, attr);
        match (kind, plug.attr.as_str()) {
            (NodeKind::Transform | NodeKind::Joint | NodeKind::Locator, "worldMatrix") => {
                let local = compose_transform(&self.vec3(&at("translate"))?, &self.vec3(&at("rotate"))?);
                match self.scene.parent_of(node) {
                    Some(parent) => {
                        let parent_world = self.matrix(&Plug::element(parent, "worldMatrix", 0))?;
                        Ok(EvalValue::Matrix(local * parent_world))
                    }
                    None => Ok(EvalValue::Matrix(local)),
                }
            }
            (NodeKind::NurbsCurve, "worldSpace") => self.curve_shape(node).map(EvalValue::Curve),
            (NodeKind::DecomposeMatrix, attr) => {
                let m = self.matrix(&at("inputMatrix"))?;
                let v = match attr {
                    "outputTranslate" => row(&m, 3),
                    "outputRotate" => rotation_of(&m),
                    _ => Vector3::new(row(&m, 0).norm(), row(&m, 1).norm(), row(&m, 2).norm()),
                };
                Ok(EvalValue::Vec3(v))
            }
            (NodeKind::PointOnCurveInfo, attr) => {
                let curve = self.curve(&at("inputCurve"))?;
                let t = self.scalar(&at("parameter"))?;
                let v = if attr == "tangent" {
                    curve.tangent_at(t)
                } else {
                    curve.point_at(t).coords
                };
                Ok(EvalValue::Vec3(v))
            }
            (NodeKind::FourByFourMatrix, _) => {
                let mut m = Matrix4::identity();
                for r in 0..4 {
                    for c in 0..4 {
                        m[(r, c)] = self.scalar(&Plug::new(node, format!("in{r}{c}")))?;
                    }
                }
                Ok(EvalValue::Matrix(m))
            }
            (NodeKind::VectorProduct, _) => self.vector_product(node),
            (NodeKind::PlusMinusAverage, _) => self.plus_minus_average(node),
            (NodeKind::Follicle, "outCurve") => self.follicle_curve(node).map(EvalValue::Curve),
            (NodeKind::Time, "outTime") => Ok(EvalValue::Time(self.scene.time())),
            _ => Ok(EvalValue::State),
        }
    }

    fn vector_product(&mut self, node: NodeHandle) -> Result<EvalValue, SceneError> {
        let op = self.scalar(&Plug::new(node, "operation"))? as i64;
        let a = self.vec3(&Plug::new(node, "input1"))?;
        let b = self.vec3(&Plug::new(node, "input2"))?;
        let mut out = match op {
            VP_DOT => Vector3::repeat(a.dot(&b)),
            VP_CROSS => a.cross(&b),
            VP_VECTOR_MATRIX | VP_POINT_MATRIX => {
                let m = self.matrix(&Plug::new(node, "matrix"))?;
                let w = if op == VP_POINT_MATRIX { 1.0 } else { 0.0 };
                let v = m.transpose() * Vector4::new(a.x, a.y, a.z, w);
                v.xyz()
            }
            _ => a,
        };
        if self.scalar(&Plug::new(node, "normalizeOutput"))? != 0.0 {
            out = out.try_normalize(1e-12).unwrap_or(out);
        }
        Ok(EvalValue::Vec3(out))
    }

    fn plus_minus_average(&mut self, node: NodeHandle) -> Result<EvalValue, SceneError> {
        let op = self.scalar(&Plug::new(node, "operation"))? as i64;
        let inputs: Vec<Vector3<f64>> = self
            .scene
            .connected_indices(node, "input3D")
            .into_iter()
            .map(|i| self.vec3(&Plug::element(node, "input3D", i)))
            .collect::<Result<_, _>>()?;
        let Some((first, rest)) = inputs.split_first() else {
            return Ok(EvalValue::Vec3(Vector3::zeros()));
        };
        let out = match op {
            PMA_SUBTRACT => rest.iter().fold(*first, |acc, v| acc - v),
            PMA_AVERAGE => inputs.iter().sum::<Vector3<f64>>() / inputs.len() as f64,
            PMA_NONE => *first,
            _ => inputs.iter().sum(),
        };
        Ok(EvalValue::Vec3(out))
    }

    /// Shape of a curve node: its `create` input when connected, otherwise the constructed
    /// geometry with any driven control points applied.
    fn curve_shape(&mut self, node: NodeHandle) -> Result<CurveData, SceneError> {
        let create = Plug::new(node, "create");
        if self.scene.source_of(&create).is_some() {
            return self.curve(&create);
        }
        let mut data = self.scene.curve_data(node)?.clone();
        for i in self.scene.connected_indices(node, "controlPoints") {
            let p = self.vec3(&Plug::element(node, "controlPoints", i))?;
            if let Some(cv) = data.cvs.get_mut(i as usize) {
                *cv = p.into();
            }
        }
        Ok(data)
    }

    fn follicle_curve(&mut self, node: NodeHandle) -> Result<CurveData, SceneError> {
        let rest = self.curve(&Plug::new(node, "startPosition"))?;
        // Without a hair system closing the loop the follicle passes its rest shape through.
        let Some(hair) = self
            .scene
            .source_of(&Plug::new(node, "currentPosition"))
            .map(|p| p.node)
        else {
            return Ok(rest);
        };
        let time = self.scalar(&Plug::new(hair, "currentTime"))?;
        let simulated = self.scene.solver().simulate(&rest.cvs, time);
        if simulated.len() != rest.cvs.len() {
            return Err(SceneError::Evaluation {
                plug: Plug::new(node, "outCurve"),
                reason: format!(
                    "solver returned {} points for a {}-point strand",
                    simulated.len(),
                    rest.cvs.len()
                ),
            });
        }
        Ok(CurveData {
            cvs: simulated,
            ..rest
        })
    }

    fn scalar(&mut self, plug: &Plug) -> Result<f64, SceneError> {
        let v = self.plug(plug)?;
        v.as_scalar().ok_or_else(|| mismatch(plug, "scalar"))
    }

    fn vec3(&mut self, plug: &Plug) -> Result<Vector3<f64>, SceneError> {
        let v = self.plug(plug)?;
        v.as_vec3().ok_or_else(|| mismatch(plug, "vector"))
    }

    fn matrix(&mut self, plug: &Plug) -> Result<Matrix4<f64>, SceneError> {
        let v = self.plug(plug)?;
        v.as_matrix().ok_or_else(|| mismatch(plug, "matrix"))
    }

    fn curve(&mut self, plug: &Plug) -> Result<CurveData, SceneError> {
        let v = self.plug(plug)?;
        v.into_curve().ok_or_else(|| mismatch(plug, "curve"))
    }
}

fn mismatch(plug: &Plug, expected: &str) -> SceneError {
    SceneError::Evaluation {
        plug: plug.clone(),
        reason: format!("expected a {expected}"),
    }
}

/// Attributes each node kind computes rather than stores.
pub(crate) fn is_output(kind: NodeKind, attr: &str) -> bool {
    match kind {
        NodeKind::Transform | NodeKind::Joint | NodeKind::Locator => attr == "worldMatrix",
        NodeKind::NurbsCurve => attr == "worldSpace",
        NodeKind::DecomposeMatrix => {
            matches!(attr, "outputTranslate" | "outputRotate" | "outputScale")
        }
        NodeKind::PointOnCurveInfo => matches!(attr, "position" | "tangent"),
        NodeKind::FourByFourMatrix | NodeKind::VectorProduct => attr == "output",
        NodeKind::PlusMinusAverage => attr == "output3D",
        NodeKind::Follicle => matches!(attr, "outCurve" | "outHair"),
        NodeKind::HairSystem => matches!(attr, "outputHair" | "currentState" | "startState"),
        NodeKind::Nucleus => attr == "outputObjects",
        NodeKind::Time => attr == "outTime",
        NodeKind::Mesh => attr == "worldMesh",
        NodeKind::Lambert => attr == "outColor",
    }
}

fn default_scalar(kind: NodeKind, attr: &str) -> f64 {
    match (kind, attr) {
        (NodeKind::FourByFourMatrix, "in00" | "in11" | "in22" | "in33") => 1.0,
        (NodeKind::VectorProduct, "operation") => VP_DOT as f64,
        (NodeKind::PlusMinusAverage, "operation") => PMA_SUM as f64,
        (NodeKind::HairSystem | NodeKind::Nucleus, "startFrame") => 1.0,
        (NodeKind::Follicle, "degree") => 1.0,
        _ => 0.0,
    }
}
