//! VdbGrid - world-space facade over a [`VdbTree`].
//!
//! Float positions are quantised through a [`CoordinateTransform`] and
//! forwarded to the tree's leaf level. Position entry points are range
//! checked: out-of-range writes are skipped and reads return background.
//! World-voxel entry points skip the check for hot loops that already know
//! their coordinates are valid.

use glam::{IVec3, Vec3};
use tracing::debug;
use web_time::Instant;

use crate::error::{VdbConfigError, VdbResult};
use crate::metrics::{self, GridMetrics};
use crate::transform::CoordinateTransform;
use crate::tree::{PruneStats, TreeStats, VdbConfig, VdbTree};
use crate::types::{MinMaxAABB, VdbOp};
use crate::value::VoxelValue;

/// Sparse grid of `V` values over a world-space box.
pub struct VdbGrid<V: VoxelValue, const N: usize> {
  tree: VdbTree<V, N>,
  transform: CoordinateTransform,
  bounding_box: MinMaxAABB,
  metrics: GridMetrics,
}

impl<V: VoxelValue, const N: usize> VdbGrid<V, N> {
  /// Create a grid whose voxel `(0, 0, 0)` sits at `transform.origin()`.
  pub fn new(config: &VdbConfig<V, N>, transform: CoordinateTransform) -> VdbResult<Self> {
    let tree = VdbTree::new(config)?;
    let min = transform.origin();
    let max = transform.voxel_to_coord(tree.voxel_extent());
    Ok(Self {
      tree,
      transform,
      bounding_box: MinMaxAABB::new(min, max),
      metrics: GridMetrics::new(),
    })
  }

  /// Create a grid with cubic voxels of `voxel_size`.
  pub fn with_voxel_size(config: &VdbConfig<V, N>, voxel_size: f32, origin: Vec3) -> VdbResult<Self> {
    Self::new(config, CoordinateTransform::uniform(voxel_size, origin)?)
  }

  /// Create a grid that spans `[min, max]` exactly.
  ///
  /// The voxel size per axis is the box size divided by the addressable
  /// voxel extent of the tree.
  pub fn from_bounding_box(config: &VdbConfig<V, N>, min: Vec3, max: Vec3) -> VdbResult<Self> {
    if !min.is_finite() || !max.is_finite() || min.cmpge(max).any() {
      return Err(VdbConfigError::InvalidBoundingBox { min, max });
    }

    let levels = config.build_levels()?;
    let extent = levels[0].node_extent().as_vec3();
    let transform = CoordinateTransform::new((max - min) / extent, min)?;

    let mut grid = Self::new(config, transform)?;
    grid.bounding_box = MinMaxAABB::new(min, max);
    debug!(%min, %max, voxel_dim = %transform.voxel_dim(), "vdb grid fitted to bounds");
    Ok(grid)
  }

  // =========================================================================
  // Accessors
  // =========================================================================

  #[inline]
  pub fn tree(&self) -> &VdbTree<V, N> {
    &self.tree
  }

  #[inline]
  pub fn transform(&self) -> &CoordinateTransform {
    &self.transform
  }

  #[inline]
  pub fn voxel_dim(&self) -> Vec3 {
    self.transform.voxel_dim()
  }

  #[inline]
  pub fn inv_voxel_dim(&self) -> Vec3 {
    self.transform.inv_voxel_dim()
  }

  #[inline]
  pub fn origin(&self) -> Vec3 {
    self.transform.origin()
  }

  /// World-space box covered by the addressable voxels.
  #[inline]
  pub fn bounding_box(&self) -> MinMaxAABB {
    self.bounding_box
  }

  /// Addressable voxels per axis.
  #[inline]
  pub fn voxel_extent(&self) -> IVec3 {
    self.tree.voxel_extent()
  }

  #[inline]
  pub fn background(&self) -> V {
    self.tree.background()
  }

  pub fn metrics(&self) -> &GridMetrics {
    &self.metrics
  }

  // =========================================================================
  // Position entry points (range checked)
  // =========================================================================

  /// Voxel containing `pos`, if it is addressable.
  #[inline]
  pub fn voxel_of(&self, pos: Vec3) -> Option<IVec3> {
    if !pos.is_finite() {
      return None;
    }
    let ijk = self.transform.coord_to_voxel(pos);
    self.tree.contains_world(ijk).then_some(ijk)
  }

  #[inline]
  pub fn is_in_range(&self, pos: Vec3) -> bool {
    self.voxel_of(pos).is_some()
  }

  /// Apply `op` at the voxel containing `pos`. Returns the previous value,
  /// or `None` when `pos` is outside the grid and nothing was written.
  #[inline]
  pub fn modify_value(&self, pos: Vec3, value: V, op: VdbOp) -> Option<V> {
    let ijk = self.voxel_of(pos)?;
    Some(
      self
        .tree
        .modify_value_world(self.tree.leaf_level(), ijk, value, op),
    )
  }

  pub fn set_value(&self, x: f32, y: f32, z: f32, value: V) -> Option<V> {
    self.set_value_packed(Vec3::new(x, y, z), value)
  }

  #[inline]
  pub fn set_value_packed(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Set)
  }

  pub fn add_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Add)
  }

  pub fn sub_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Sub)
  }

  pub fn mul_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Mul)
  }

  pub fn div_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Div)
  }

  pub fn max_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Max)
  }

  pub fn min_value(&self, pos: Vec3, value: V) -> Option<V> {
    self.modify_value(pos, value, VdbOp::Min)
  }

  /// Value at the voxel containing `pos`, background outside the grid.
  #[inline]
  pub fn read_value(&self, pos: Vec3) -> V {
    match self.voxel_of(pos) {
      Some(ijk) => self.tree.read_value_world(ijk),
      None => self.tree.background(),
    }
  }

  // =========================================================================
  // World voxel entry points
  // =========================================================================

  /// Range-checked integer write. Returns `None` and writes nothing outside
  /// the grid.
  pub fn set_value_coord(&self, ijk: IVec3, value: V) -> Option<V> {
    self
      .tree
      .contains_world(ijk)
      .then(|| self.tree.set_value_world(ijk, value))
  }

  /// Value at a world voxel, background outside the grid.
  #[inline]
  pub fn read_value_checked(&self, ijk: IVec3) -> V {
    if self.tree.contains_world(ijk) {
      self.tree.read_value_world(ijk)
    } else {
      self.tree.background()
    }
  }

  /// Unchecked read. `ijk` must be inside [`Self::voxel_extent`].
  #[inline]
  pub fn read_value_world(&self, ijk: IVec3) -> V {
    self.tree.read_value_world(ijk)
  }

  #[inline]
  pub fn set_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.set_value_world(ijk, value)
  }

  #[inline]
  pub fn add_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.add_value_world(ijk, value)
  }

  #[inline]
  pub fn sub_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.sub_value_world(ijk, value)
  }

  #[inline]
  pub fn mul_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.mul_value_world(ijk, value)
  }

  #[inline]
  pub fn div_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.div_value_world(ijk, value)
  }

  #[inline]
  pub fn max_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.max_value_world(ijk, value)
  }

  #[inline]
  pub fn min_value_world(&self, ijk: IVec3, value: V) -> V {
    self.tree.min_value_world(ijk, value)
  }

  /// See [`VdbTree::is_child_active_world`].
  #[inline]
  pub fn is_child_active_world(&self, level: usize, ijk: IVec3) -> bool {
    self.tree.is_child_active_world(level, ijk)
  }

  #[inline]
  pub fn is_value_active_world(&self, ijk: IVec3) -> bool {
    self.tree.is_value_active_world(ijk)
  }

  // =========================================================================
  // Maintenance
  // =========================================================================

  /// Restore background everywhere.
  pub fn clear(&mut self) {
    self.tree.clear();
    if metrics::is_enabled() {
      self.metrics.update_from_stats(&self.tree.stats());
    }
  }

  /// Coalesce homogeneous subtrees. See [`VdbTree::prune`].
  pub fn prune(&mut self, tolerance: V) -> PruneStats {
    let start = Instant::now();
    let stats = self.tree.prune(tolerance);
    let elapsed_us = start.elapsed().as_micros() as u64;

    if metrics::is_enabled() {
      self.metrics.record_prune(elapsed_us, &stats);
      self.metrics.update_from_stats(&self.tree.stats());
    }
    debug!(elapsed_us, collapsed = stats.total_collapsed(), "vdb grid pruned");
    stats
  }

  pub fn stats(&self) -> TreeStats {
    self.tree.stats()
  }

  /// Recompute occupancy metrics from the current tree.
  pub fn refresh_metrics(&mut self) {
    self.metrics.update_from_stats(&self.tree.stats());
  }

  /// World-space box of every materialised node, tagged with its level.
  pub fn node_bounds(&self) -> Vec<(usize, MinMaxAABB)> {
    self
      .tree
      .node_boxes()
      .into_iter()
      .map(|node| {
        let min = self.transform.voxel_to_coord(node.min);
        let max = self.transform.voxel_to_coord(node.max);
        (node.level, MinMaxAABB::new(min, max))
      })
      .collect()
  }
}

#[cfg(test)]
#[path = "grid_test.rs"]
mod grid_test;
