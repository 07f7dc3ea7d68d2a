//! Error types for grid construction.
//!
//! Only configuration problems are recoverable. Misuse at runtime (level out
//! of range, coordinates outside a block, exhausted node pool) is a
//! precondition violation and panics.

use glam::Vec3;
use thiserror::Error;

/// Errors surfaced while building a tree or grid.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VdbConfigError {
  /// The level list is empty.
  #[error("A vdb tree needs at least one level")]
  NoLevels,

  /// More levels than the tree supports.
  #[error("{levels} levels requested, at most {max} are supported")]
  TooManyLevels { levels: usize, max: usize },

  /// A level has a zero log2 extent on some axis.
  #[error("Level {level} needs a positive log2 extent on the {axis} axis")]
  ZeroExponent { level: usize, axis: char },

  /// A single node block would hold too many cells.
  #[error("Level {level} block of 2^{log2} cells exceeds the 2^{max} cell limit")]
  BlockTooLarge { level: usize, log2: u32, max: u32 },

  /// The stacked extent of all levels overflows the voxel index range.
  #[error("Addressable extent 2^{log2} on the {axis} axis exceeds 2^{max} voxels")]
  ExtentTooLarge { axis: char, log2: u32, max: u32 },

  /// The per-level cell budget cannot hold a single node.
  #[error("Cell budget {budget} cannot hold one level {level} block of {block_size} cells")]
  CellBudgetTooSmall {
    level: usize,
    budget: u64,
    block_size: usize,
  },

  /// Voxel dimensions must be finite and positive.
  #[error("Voxel dimension {0} must be finite and positive on every axis")]
  InvalidVoxelDim(Vec3),

  /// Bounding box is empty or inverted.
  #[error("Bounding box min {min} must be below max {max} on every axis")]
  InvalidBoundingBox { min: Vec3, max: Vec3 },
}

/// Result type for grid construction.
pub type VdbResult<T> = std::result::Result<T, VdbConfigError>;
