//! Declarative scene descriptions for seeding a [`MemoryScene`].

use super::MemoryScene;
use crate::error::SceneError;
use crate::schema::NodeKind;
use crate::types::NodeHandle;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerFixture {
    pub name: String,
    #[serde(default = "default_controller_kind")]
    pub kind: NodeKind,
    pub translate: [f64; 3],
    #[serde(default)]
    pub rotate: [f64; 3],
    /// Name of an earlier controller this one is parented under.
    #[serde(default)]
    pub parent: Option<String>,
}

fn default_controller_kind() -> NodeKind {
    NodeKind::Transform
}

/// A node that is not part of any chain, e.g. a shape or shader caught in the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraNodeFixture {
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneFixture {
    #[serde(default)]
    pub time: Option<f64>,
    pub controllers: Vec<ControllerFixture>,
    #[serde(default)]
    pub extras: Vec<ExtraNodeFixture>,
    /// Node names, in selection order.
    pub selection: Vec<String>,
}

impl MemoryScene {
    /// Build a scene from `fixture`. Names must be unique within the fixture.
    pub fn from_fixture(fixture: &SceneFixture) -> Result<Self, SceneError> {
        let mut scene = MemoryScene::new();
        if let Some(time) = fixture.time {
            scene.set_time(time);
        }

        for ctrl in &fixture.controllers {
            if !ctrl.kind.is_transform() {
                return Err(SceneError::InvalidFixture(format!(
                    "controller '{}' must be a transform kind",
                    ctrl.name
                )));
            }
            let parent = match &ctrl.parent {
                Some(name) => Some(lookup(&scene, name)?),
                None => None,
            };
            scene.add_transform_node(
                ctrl.kind,
                &ctrl.name,
                parent,
                Vector3::from(ctrl.translate),
                Vector3::from(ctrl.rotate),
            );
        }

        for extra in &fixture.extras {
            scene.insert_node(extra.kind, &extra.name, None);
        }

        let selection = fixture
            .selection
            .iter()
            .map(|name| lookup(&scene, name))
            .collect::<Result<Vec<_>, _>>()?;
        scene.select(&selection);
        Ok(scene)
    }
}

fn lookup(scene: &MemoryScene, name: &str) -> Result<NodeHandle, SceneError> {
    scene
        .names
        .get(name)
        .copied()
        .ok_or_else(|| SceneError::NodeNotFound(name.to_string()))
}
