//! LevelConfig and VdbConfig - tree topology and world-to-local addressing.

use glam::{IVec3, UVec3};

use crate::constants::{
  AXIS_NAMES, DEFAULT_CELL_BUDGET_PER_LEVEL, DEFAULT_LEVEL_LOG2, MAX_BLOCK_LOG2, MAX_VDB_LEVELS,
  MAX_WORLD_LOG2,
};
use crate::error::{VdbConfigError, VdbResult};
use crate::value::VoxelValue;

#[inline(always)]
fn pow2(log2: UVec3) -> UVec3 {
  UVec3::new(1 << log2.x, 1 << log2.y, 1 << log2.z)
}

/// Extent of one tree level.
///
/// `log2` is the local block size exponent per axis. `cumulative_log2` adds the
/// exponents of every finer level, so it is the number of world voxels a whole
/// node of this level spans (log2, per axis).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelConfig {
  pub log2: UVec3,
  pub cumulative_log2: UVec3,
}

impl LevelConfig {
  /// Exponent of the world voxels covered by one cell of this level.
  #[inline(always)]
  pub fn child_log2(&self) -> UVec3 {
    self.cumulative_log2 - self.log2
  }

  /// Cells per axis in one node block.
  #[inline(always)]
  pub fn block_dim(&self) -> UVec3 {
    pow2(self.log2)
  }

  /// Cells in one node block.
  #[inline(always)]
  pub fn block_size(&self) -> usize {
    1usize << self.log2.element_sum()
  }

  /// World voxels per axis covered by one cell.
  #[inline(always)]
  pub fn cell_extent(&self) -> IVec3 {
    pow2(self.child_log2()).as_ivec3()
  }

  /// World voxels per axis covered by one node.
  #[inline(always)]
  pub fn node_extent(&self) -> IVec3 {
    pow2(self.cumulative_log2).as_ivec3()
  }

  /// Local cell of a world voxel within this level's block.
  ///
  /// `(world >> child_log2) & (block_dim - 1)` per axis. The caller guarantees
  /// `world` is inside the addressable extent.
  #[inline(always)]
  pub fn rescale(&self, world: IVec3) -> UVec3 {
    let w = world.as_uvec3();
    let shift = self.child_log2();
    let mask = self.block_dim() - UVec3::ONE;
    UVec3::new(
      (w.x >> shift.x) & mask.x,
      (w.y >> shift.y) & mask.y,
      (w.z >> shift.z) & mask.z,
    )
  }

  /// Flat offset of a local cell (X major, Z innermost).
  #[inline(always)]
  pub fn flatten(&self, local: UVec3) -> usize {
    debug_assert!(
      local.cmplt(self.block_dim()).all(),
      "local cell {local} outside block {}",
      self.block_dim()
    );
    ((local.x as usize) << (self.log2.y + self.log2.z))
      | ((local.y as usize) << self.log2.z)
      | local.z as usize
  }

  /// Local cell of a flat offset.
  #[inline(always)]
  pub fn unflatten(&self, offset: usize) -> UVec3 {
    debug_assert!(offset < self.block_size(), "offset {offset} outside block");
    let mask = self.block_dim() - UVec3::ONE;
    let offset = offset as u32;
    UVec3::new(
      offset >> (self.log2.y + self.log2.z),
      (offset >> self.log2.z) & mask.y,
      offset & mask.z,
    )
  }

  /// Minimum world voxel of a local cell inside a node at `node_origin`.
  #[inline(always)]
  pub fn cell_origin(&self, node_origin: IVec3, local: UVec3) -> IVec3 {
    let shift = self.child_log2();
    node_origin
      + UVec3::new(local.x << shift.x, local.y << shift.y, local.z << shift.z).as_ivec3()
  }
}

/// Construction parameters of a tree with `N` levels.
///
/// Levels are ordered root first, leaf last. `N` is fixed at compile time so
/// every level walk is a bounded loop the compiler can unroll.
#[derive(Clone, Debug, PartialEq)]
pub struct VdbConfig<V, const N: usize> {
  /// Per-axis log2 block extent of each level.
  pub level_log2: [UVec3; N],

  /// Value returned for coordinates never written.
  pub background: V,

  /// Upper bound on cells allocated per level (caps each node arena).
  pub cell_budget_per_level: u64,
}

impl<V: VoxelValue, const N: usize> VdbConfig<V, N> {
  /// Create a config from per-axis level extents.
  pub fn new(level_log2: [UVec3; N]) -> Self {
    Self {
      level_log2,
      background: V::default(),
      cell_budget_per_level: DEFAULT_CELL_BUDGET_PER_LEVEL,
    }
  }

  /// Create a config with cubic blocks on every level.
  pub fn uniform(level_log2: [u32; N]) -> Self {
    Self::new(level_log2.map(UVec3::splat))
  }

  pub fn with_background(mut self, background: V) -> Self {
    self.background = background;
    self
  }

  pub fn with_cell_budget_per_level(mut self, cells: u64) -> Self {
    self.cell_budget_per_level = cells;
    self
  }

  /// Validate the topology and compute stacked extents.
  pub fn build_levels(&self) -> VdbResult<[LevelConfig; N]> {
    if N == 0 {
      return Err(VdbConfigError::NoLevels);
    }
    if N > MAX_VDB_LEVELS {
      return Err(VdbConfigError::TooManyLevels {
        levels: N,
        max: MAX_VDB_LEVELS,
      });
    }

    let mut levels = [LevelConfig::default(); N];
    let mut below = UVec3::ZERO;

    // Leaf first so each level can stack on the ones beneath it
    for level in (0..N).rev() {
      let log2 = self.level_log2[level];
      for axis in 0..3 {
        if log2[axis] == 0 {
          return Err(VdbConfigError::ZeroExponent {
            level,
            axis: AXIS_NAMES[axis],
          });
        }
      }

      let block_log2 = log2.element_sum();
      if block_log2 > MAX_BLOCK_LOG2 {
        return Err(VdbConfigError::BlockTooLarge {
          level,
          log2: block_log2,
          max: MAX_BLOCK_LOG2,
        });
      }

      let block_size = 1usize << block_log2;
      if self.cell_budget_per_level < block_size as u64 {
        return Err(VdbConfigError::CellBudgetTooSmall {
          level,
          budget: self.cell_budget_per_level,
          block_size,
        });
      }

      below += log2;
      levels[level] = LevelConfig {
        log2,
        cumulative_log2: below,
      };
    }

    for axis in 0..3 {
      if below[axis] > MAX_WORLD_LOG2 {
        return Err(VdbConfigError::ExtentTooLarge {
          axis: AXIS_NAMES[axis],
          log2: below[axis],
          max: MAX_WORLD_LOG2,
        });
      }
    }

    Ok(levels)
  }
}

impl<V: VoxelValue> Default for VdbConfig<V, MAX_VDB_LEVELS> {
  fn default() -> Self {
    Self::uniform(DEFAULT_LEVEL_LOG2)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
