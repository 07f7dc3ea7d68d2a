//! vdb_grid - Sparse multi-resolution volume grid
//!
//! This crate provides a VDB-style hierarchical grid: a fixed number of
//! levels, each a dense block of cells embedded in a cell of the level above,
//! materialised only where data is written. It is the storage backbone for
//! particle fluid stepping, SDF reconstruction from particles, and
//! isosurface extraction.
//!
//! # Features
//!
//! - **Multi-level addressing**: compile-time level count, per-axis block
//!   sizes, world voxel coordinates rescaled into each level's local frame
//! - **Lock-free writes**: atomic cell storage so parallel lanes can scatter
//!   set/add/max/... into shared voxels
//! - **Pruning**: bottom-up coalescing of homogeneous subtrees into tiles,
//!   with a value tolerance
//! - **Sampling**: trilinear interpolation and gradient normals over the
//!   world-space facade
//!
//! # Example
//!
//! ```ignore
//! use glam::{IVec3, Vec3};
//! use vdb_grid::{VdbConfig, VdbGrid};
//!
//! // Three levels: 16^3 root cells, 16^3 inner cells, 4^3 leaf voxels
//! let config = VdbConfig::<f32, 3>::uniform([4, 4, 2]);
//! let mut grid = VdbGrid::with_voxel_size(&config, 0.1, Vec3::ZERO)?;
//!
//! grid.set_value_packed(Vec3::new(1.0, 2.0, 0.5), 3.0);
//! grid.add_value_world(IVec3::new(10, 20, 5), 1.0);
//!
//! let value = grid.read_value(Vec3::new(1.05, 2.0, 0.5));
//! let pruned = grid.prune(0.0);
//! ```

pub mod constants;
pub mod error;
pub mod types;
pub mod value;

// Re-export commonly used items
pub use constants::{CORNER_OFFSETS, DEFAULT_LEVEL_LOG2, MAX_VDB_LEVELS, NO_CHILD};
pub use error::{VdbConfigError, VdbResult};
pub use types::{ActiveCell, MinMaxAABB, NodeBox, VdbOp};
pub use value::VoxelValue;

// World <-> voxel mapping
pub mod transform;
pub use transform::CoordinateTransform;

// Hierarchical storage
pub mod tree;
pub use tree::{
  ActiveCells, LevelConfig, LevelStats, NodeEntry, PruneStats, SparseLevelNode, TreeStats,
  VdbConfig, VdbTree,
};

// World-space facade
pub mod grid;
pub use grid::VdbGrid;

// Interpolating samplers on the facade
mod sampling;

// Grid statistics
pub mod metrics;
pub use metrics::GridMetrics;
