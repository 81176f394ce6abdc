//! Host node types used by the dynamic chain, with their attribute signatures.
//!
//! The registry mirrors the subset of the host's dependency-graph types this tool touches. Hosts
//! may expose more; the in-memory host uses the registry to validate every plug it is handed.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    // Hierarchy
    Transform,
    Joint,
    Locator,
    NurbsCurve,
    Mesh,

    // Utility
    DecomposeMatrix,
    PointOnCurveInfo,
    FourByFourMatrix,
    VectorProduct,
    PlusMinusAverage,

    // Dynamics
    Follicle,
    HairSystem,
    Nucleus,

    // Globals / shading
    Time,
    Lambert,
}

impl NodeKind {
    pub const ALL: [NodeKind; 15] = [
        NodeKind::Transform,
        NodeKind::Joint,
        NodeKind::Locator,
        NodeKind::NurbsCurve,
        NodeKind::Mesh,
        NodeKind::DecomposeMatrix,
        NodeKind::PointOnCurveInfo,
        NodeKind::FourByFourMatrix,
        NodeKind::VectorProduct,
        NodeKind::PlusMinusAverage,
        NodeKind::Follicle,
        NodeKind::HairSystem,
        NodeKind::Nucleus,
        NodeKind::Time,
        NodeKind::Lambert,
    ];

    /// Name the host knows this type by.
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Transform => "transform",
            NodeKind::Joint => "joint",
            NodeKind::Locator => "locator",
            NodeKind::NurbsCurve => "nurbsCurve",
            NodeKind::Mesh => "mesh",
            NodeKind::DecomposeMatrix => "decomposeMatrix",
            NodeKind::PointOnCurveInfo => "pointOnCurveInfo",
            NodeKind::FourByFourMatrix => "fourByFourMatrix",
            NodeKind::VectorProduct => "vectorProduct",
            NodeKind::PlusMinusAverage => "plusMinusAverage",
            NodeKind::Follicle => "follicle",
            NodeKind::HairSystem => "hairSystem",
            NodeKind::Nucleus => "nucleus",
            NodeKind::Time => "time",
            NodeKind::Lambert => "lambert",
        }
    }

    pub fn from_type_name(name: &str) -> Option<NodeKind> {
        NodeKind::ALL.into_iter().find(|k| k.type_name() == name)
    }

    /// Whether nodes of this kind sit in the transform hierarchy.
    pub fn is_dag(self) -> bool {
        matches!(
            self,
            NodeKind::Transform
                | NodeKind::Joint
                | NodeKind::Locator
                | NodeKind::NurbsCurve
                | NodeKind::Mesh
                | NodeKind::Follicle
                | NodeKind::HairSystem
        )
    }

    /// Whether nodes of this kind carry a positionable world transform.
    pub fn is_transform(self) -> bool {
        matches!(
            self,
            NodeKind::Transform | NodeKind::Joint | NodeKind::Locator
        )
    }
}

/// vectorProduct `operation` codes.
pub const VP_NONE: i64 = 0;
pub const VP_DOT: i64 = 1;
pub const VP_CROSS: i64 = 2;
pub const VP_VECTOR_MATRIX: i64 = 3;
pub const VP_POINT_MATRIX: i64 = 4;

/// plusMinusAverage `operation` codes.
pub const PMA_NONE: i64 = 0;
pub const PMA_SUM: i64 = 1;
pub const PMA_SUBTRACT: i64 = 2;
pub const PMA_AVERAGE: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttrType {
    Int,
    Float,
    Vec3,
    Matrix,
    Curve,
    Time,
    /// Opaque simulation state exchanged between dynamics nodes.
    State,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttrSpec {
    pub name: &'static str,
    pub ty: AttrType,
    pub array: bool,
    /// Scalar child of a compound: `(parent, component)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub child_of: Option<(&'static str, usize)>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodeSignature {
    pub kind: NodeKind,
    pub attrs: Vec<AttrSpec>,
}

impl NodeSignature {
    pub fn attr(&self, name: &str) -> Option<&AttrSpec> {
        self.attrs.iter().find(|a| a.name == name)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Registry {
    pub version: &'static str,
    pub nodes: Vec<NodeSignature>,
}

impl Registry {
    pub fn signature(&self, kind: NodeKind) -> Option<&NodeSignature> {
        self.nodes.iter().find(|n| n.kind == kind)
    }
}

// Helpers
fn a(name: &'static str, ty: AttrType) -> AttrSpec {
    AttrSpec {
        name,
        ty,
        array: false,
        child_of: None,
    }
}

fn arr(name: &'static str, ty: AttrType) -> AttrSpec {
    AttrSpec {
        name,
        ty,
        array: true,
        child_of: None,
    }
}

/// A vec3 attribute plus its three scalar children.
fn vec3(name: &'static str, children: [&'static str; 3]) -> Vec<AttrSpec> {
    let mut out = vec![a(name, AttrType::Vec3)];
    for (i, child) in children.into_iter().enumerate() {
        out.push(AttrSpec {
            name: child,
            ty: AttrType::Float,
            array: false,
            child_of: Some((name, i)),
        });
    }
    out
}

fn transform_attrs() -> Vec<AttrSpec> {
    let mut attrs = Vec::new();
    attrs.extend(vec3("translate", ["translateX", "translateY", "translateZ"]));
    attrs.extend(vec3("rotate", ["rotateX", "rotateY", "rotateZ"]));
    attrs.push(arr("worldMatrix", AttrType::Matrix));
    attrs
}

const FOUR_BY_FOUR_INPUTS: [&str; 16] = [
    "in00", "in01", "in02", "in03", "in10", "in11", "in12", "in13", "in20", "in21", "in22", "in23",
    "in30", "in31", "in32", "in33",
];

pub fn registry() -> Registry {
    use NodeKind::*;
    let mut nodes: Vec<NodeSignature> = Vec::new();

    for kind in [Transform, Joint, Locator] {
        nodes.push(NodeSignature {
            kind,
            attrs: transform_attrs(),
        });
    }

    nodes.push(NodeSignature {
        kind: NurbsCurve,
        attrs: vec![
            arr("controlPoints", AttrType::Vec3),
            a("create", AttrType::Curve),
            arr("worldSpace", AttrType::Curve),
        ],
    });

    nodes.push(NodeSignature {
        kind: Mesh,
        attrs: vec![arr("worldMesh", AttrType::State)],
    });

    let mut dcmp = vec![a("inputMatrix", AttrType::Matrix)];
    dcmp.extend(vec3(
        "outputTranslate",
        ["outputTranslateX", "outputTranslateY", "outputTranslateZ"],
    ));
    dcmp.extend(vec3(
        "outputRotate",
        ["outputRotateX", "outputRotateY", "outputRotateZ"],
    ));
    dcmp.extend(vec3(
        "outputScale",
        ["outputScaleX", "outputScaleY", "outputScaleZ"],
    ));
    nodes.push(NodeSignature {
        kind: DecomposeMatrix,
        attrs: dcmp,
    });

    let mut poc = vec![
        a("inputCurve", AttrType::Curve),
        a("parameter", AttrType::Float),
    ];
    poc.extend(vec3("position", ["positionX", "positionY", "positionZ"]));
    poc.extend(vec3("tangent", ["tangentX", "tangentY", "tangentZ"]));
    nodes.push(NodeSignature {
        kind: PointOnCurveInfo,
        attrs: poc,
    });

    let mut four = vec![a("output", AttrType::Matrix)];
    four.extend(FOUR_BY_FOUR_INPUTS.iter().map(|&n| a(n, AttrType::Float)));
    nodes.push(NodeSignature {
        kind: FourByFourMatrix,
        attrs: four,
    });

    let mut vecp = vec![
        a("operation", AttrType::Int),
        a("normalizeOutput", AttrType::Int),
        a("matrix", AttrType::Matrix),
    ];
    vecp.extend(vec3("input1", ["input1X", "input1Y", "input1Z"]));
    vecp.extend(vec3("input2", ["input2X", "input2Y", "input2Z"]));
    vecp.extend(vec3("output", ["outputX", "outputY", "outputZ"]));
    nodes.push(NodeSignature {
        kind: VectorProduct,
        attrs: vecp,
    });

    let mut pma = vec![
        a("operation", AttrType::Int),
        arr("input3D", AttrType::Vec3),
    ];
    pma.extend(vec3("output3D", ["output3Dx", "output3Dy", "output3Dz"]));
    nodes.push(NodeSignature {
        kind: PlusMinusAverage,
        attrs: pma,
    });

    nodes.push(NodeSignature {
        kind: Follicle,
        attrs: vec![
            a("startPosition", AttrType::Curve),
            a("currentPosition", AttrType::State),
            a("outHair", AttrType::State),
            a("outCurve", AttrType::Curve),
            a("restPose", AttrType::Int),
            a("startDirection", AttrType::Int),
            a("degree", AttrType::Int),
        ],
    });

    nodes.push(NodeSignature {
        kind: HairSystem,
        attrs: vec![
            arr("inputHair", AttrType::State),
            arr("outputHair", AttrType::State),
            a("currentState", AttrType::State),
            a("startState", AttrType::State),
            a("nextState", AttrType::State),
            a("startFrame", AttrType::Float),
            a("currentTime", AttrType::Time),
        ],
    });

    nodes.push(NodeSignature {
        kind: Nucleus,
        attrs: vec![
            a("startFrame", AttrType::Float),
            a("currentTime", AttrType::Time),
            arr("outputObjects", AttrType::State),
            arr("inputActive", AttrType::State),
            arr("inputActiveStart", AttrType::State),
        ],
    });

    nodes.push(NodeSignature {
        kind: Time,
        attrs: vec![a("outTime", AttrType::Time)],
    });

    nodes.push(NodeSignature {
        kind: Lambert,
        attrs: vec![a("outColor", AttrType::Vec3)],
    });

    Registry {
        version: "1",
        nodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_signature() {
        let reg = registry();
        for kind in NodeKind::ALL {
            assert!(reg.signature(kind).is_some(), "{kind:?} missing");
        }
    }

    #[test]
    fn type_names_round_trip() {
        for kind in NodeKind::ALL {
            assert_eq!(NodeKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(NodeKind::from_type_name("nParticle"), None);
    }

    #[test]
    fn serde_names_match_host_type_names() {
        for kind in NodeKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.type_name()));
        }
    }

    #[test]
    fn compound_children_point_at_their_parent() {
        let reg = registry();
        let poc = reg.signature(NodeKind::PointOnCurveInfo).unwrap();
        let tx = poc.attr("tangentY").unwrap();
        assert_eq!(tx.child_of, Some(("tangent", 1)));
        assert!(poc.attr("tangent").unwrap().child_of.is_none());
    }
}
