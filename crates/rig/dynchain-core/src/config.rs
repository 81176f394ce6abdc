//! Builder configuration and node naming.

use crate::error::BuildError;
use crate::scene::SceneStore;
use serde::{Deserialize, Serialize};

/// How node names are chosen across repeated runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingPolicy {
    /// Every run uses the bare tool name; collisions are left to the host's renaming.
    #[default]
    Shared,
    /// Each run takes the first free `<name><k>` prefix so its node names are predictable.
    PerRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynChainConfig {
    /// Tool name, used as the prefix of every node the builder names.
    pub name: String,
    /// Degree of the input and output curves.
    pub degree: usize,
    /// Newton refinement steps for closest-parameter queries.
    pub param_iterations: u32,
    /// Chains with at least this many controllers get a cubic, restarting follicle.
    pub cubic_follicle_min_controls: usize,
    /// Global time source expected to exist in the scene.
    pub time_node: String,
    pub naming: NamingPolicy,
}

impl Default for DynChainConfig {
    fn default() -> Self {
        Self {
            name: "DynChain".to_string(),
            degree: 2,
            param_iterations: 10,
            cubic_follicle_min_controls: 4,
            time_node: "time1".to_string(),
            naming: NamingPolicy::Shared,
        }
    }
}

impl DynChainConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.name.is_empty() || self.name.chars().any(|c| !(c.is_ascii_alphanumeric() || c == '_')) {
            return Err(BuildError::InvalidConfig(format!(
                "tool name '{}' must be a non-empty identifier",
                self.name
            )));
        }
        if self.degree == 0 {
            return Err(BuildError::InvalidConfig("curve degree must be at least 1".into()));
        }
        if self.param_iterations == 0 {
            return Err(BuildError::InvalidConfig(
                "param_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Node-name prefix for a run against `store`.
    pub fn prefix_for<S: SceneStore + ?Sized>(&self, store: &S) -> String {
        match self.naming {
            NamingPolicy::Shared => self.name.clone(),
            NamingPolicy::PerRun => {
                // A prefix is taken once its run created the input curve shape.
                let taken = |p: &str| store.find_node(&NodeNames::new(p).input_curve()).is_some();
                if !taken(&self.name) {
                    return self.name.clone();
                }
                (1..)
                    .map(|k| format!("{}{}", self.name, k))
                    .find(|p| !taken(p))
                    .unwrap_or_else(|| self.name.clone())
            }
        }
    }
}

/// Deterministic `<prefix>_<role><index>` names for every node a run creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeNames {
    prefix: String,
}

impl NodeNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn curve_transform(&self) -> String {
        format!("{}_curv", self.prefix)
    }

    pub fn input_curve(&self) -> String {
        format!("{}_input_curvShape", self.prefix)
    }

    pub fn output_curve(&self) -> String {
        format!("{}_output_curvShape", self.prefix)
    }

    pub fn drive_decompose(&self, index: usize) -> String {
        format!("{}_drive_cv{}_dcmpM", self.prefix, index)
    }

    pub fn follicle(&self) -> String {
        format!("{}_folcShape", self.prefix)
    }

    pub fn hair_system(&self) -> String {
        format!("{}_hairSysShape", self.prefix)
    }

    pub fn nucleus(&self) -> String {
        format!("{}_nucleus", self.prefix)
    }

    pub fn sampler(&self, index: usize) -> String {
        format!("{}_poc{}", self.prefix, index)
    }

    pub fn locator(&self, index: usize) -> String {
        format!("{}_loc{}", self.prefix, index)
    }

    pub fn frame_matrix(&self, index: usize) -> String {
        format!("{}_frame{}_fourMtx", self.prefix, index)
    }

    pub fn side_vector(&self, index: usize) -> String {
        format!("{}_side{}_vecP", self.prefix, index)
    }

    pub fn rotation_decompose(&self, index: usize) -> String {
        format!("{}_rot{}_dcmpM", self.prefix, index)
    }

    pub fn segment(&self, index: usize) -> String {
        format!("{}_seg{}_pma", self.prefix, index)
    }
}
