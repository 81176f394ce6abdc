pub mod batch;
pub mod builder;
pub mod config;
pub mod dynamics;
pub mod error;
pub mod frames;
pub mod memory;
pub mod pipeline;
pub mod sampler;
pub mod scene;
pub mod schema;
pub mod spline;
pub mod types;

pub use batch::{EditBatch, EditOp, FlushReport};
pub use builder::{build_dynamic_chain, build_from_sample, ChainFrame, DynamicChain};
pub use config::{DynChainConfig, NamingPolicy, NodeNames};
pub use dynamics::{DynamicsSolver, RestSolver};
pub use error::{BuildError, SceneError};
pub use memory::MemoryScene;
pub use sampler::{sample_nodes, sample_selection, ChainSample, SkipReason, SkippedItem};
pub use scene::SceneStore;
pub use schema::{registry, NodeKind};
pub use spline::{build_curve, CurveData, CurveForm, KnotVector};
pub use types::*;
