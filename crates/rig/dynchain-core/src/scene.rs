//! The host collaborator the builder runs against.
//!
//! Every scene mutation and query the chain builder performs goes through [`SceneStore`]. A live
//! host adapter implements it over the application's dependency graph; [`MemoryScene`] implements
//! it in-process for tests and offline use.
//!
//! [`MemoryScene`]: crate::memory::MemoryScene

use crate::error::SceneError;
use crate::spline::CurveData;
use crate::types::{AttrValue, CurveNodes, NodeCapabilities, NodeHandle, Plug};
use nalgebra::{Matrix4, Point3};

pub trait SceneStore {
    /// Create a node by host type name. Fails with [`SceneError::UnknownNodeType`] when the host
    /// does not provide the type.
    fn create_node(&mut self, type_name: &str) -> Result<NodeHandle, SceneError>;

    /// Rename a node; returns the name the host actually assigned, which may carry a numeric
    /// suffix when `name` is already taken.
    fn rename_node(&mut self, node: NodeHandle, name: &str) -> Result<String, SceneError>;

    /// Connect `src` into `dst`, replacing any existing input on `dst`.
    fn connect(&mut self, src: &Plug, dst: &Plug) -> Result<(), SceneError>;

    /// Set a scalar attribute value.
    fn set_value(&mut self, plug: &Plug, value: AttrValue) -> Result<(), SceneError>;

    /// Let the host evaluate pending edits so geometry created so far can be queried.
    fn evaluate(&mut self) -> Result<(), SceneError>;

    fn find_node(&self, name: &str) -> Option<NodeHandle>;

    fn node_name(&self, node: NodeHandle) -> Result<String, SceneError>;

    /// Currently selected nodes, in selection order.
    fn active_selection(&self) -> Vec<NodeHandle>;

    fn capabilities(&self, node: NodeHandle) -> Result<NodeCapabilities, SceneError>;

    /// Inclusive world matrix (row-vector convention, translation in row 3).
    fn world_matrix(&self, node: NodeHandle) -> Result<Matrix4<f64>, SceneError>;

    /// Build a curve shape from `curve`. With `parent`, the shape is placed under that existing
    /// transform instead of a new one.
    ///
    /// `curve.knots` holds the full clamped vector. Adapters for hosts whose curve primitive
    /// takes `n + degree - 1` knots pass [`KnotVector::host_knots`](crate::spline::KnotVector::host_knots).
    fn create_curve(
        &mut self,
        curve: &CurveData,
        parent: Option<NodeHandle>,
    ) -> Result<CurveNodes, SceneError>;

    /// Parameter of the closest point on `curve` to `point`, refined `iterations` times.
    fn param_at_point(
        &self,
        curve: NodeHandle,
        point: &Point3<f64>,
        iterations: u32,
    ) -> Result<f64, SceneError>;
}

/// Translation component of a world matrix in the row-vector convention.
pub fn matrix_translation(m: &Matrix4<f64>) -> Point3<f64> {
    Point3::new(m[(3, 0)], m[(3, 1)], m[(3, 2)])
}
