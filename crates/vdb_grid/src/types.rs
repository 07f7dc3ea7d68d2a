//! Core data types shared by the tree and the grid facade.

use glam::{IVec3, Vec3};

/// Closed set of in-place value operations.
///
/// Every mutation of grid storage goes through one of these tags. `Set` is an
/// atomic swap; the arithmetic ops are applied with a compare-and-swap loop so
/// parallel lanes can accumulate into the same voxel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VdbOp {
  /// Overwrite the stored value.
  Set,
  /// `stored + operand`.
  Add,
  /// `stored - operand`.
  Sub,
  /// `stored * operand`.
  Mul,
  /// `stored / operand`.
  Div,
  /// `max(stored, operand)`.
  Max,
  /// `min(stored, operand)`.
  Min,
}

/// Axis-aligned bounding box in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMaxAABB {
  pub min: Vec3,
  pub max: Vec3,
}

impl MinMaxAABB {
  /// Create AABB from min/max corners.
  pub fn new(min: Vec3, max: Vec3) -> Self {
    Self { min, max }
  }
}

/// A cell that holds an explicitly stored value.
///
/// Leaf voxels have `extent == IVec3::ONE`. Tiles left behind by pruning cover
/// the whole region of the collapsed child.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveCell<V> {
  /// Tree level the value is stored at.
  pub level: usize,
  /// Minimum world voxel corner covered by the cell.
  pub origin: IVec3,
  /// World voxels covered per axis.
  pub extent: IVec3,
  /// Stored value.
  pub value: V,
}

impl<V> ActiveCell<V> {
  /// True for a single leaf voxel.
  #[inline]
  pub fn is_voxel(&self) -> bool {
    self.extent == IVec3::ONE
  }

  /// Number of world voxels covered.
  pub fn voxel_count(&self) -> u64 {
    self.extent.x as u64 * self.extent.y as u64 * self.extent.z as u64
  }
}

/// Voxel-space box of a materialised node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeBox {
  /// Tree level of the node.
  pub level: usize,
  /// Minimum world voxel corner (inclusive).
  pub min: IVec3,
  /// Maximum world voxel corner (exclusive).
  pub max: IVec3,
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
