//! Multi-level sparse tree addressed by world voxel coordinates.
//!
//! # Levels
//!
//! Level 0 is the single root node, level `N - 1` the leaf. A cell of level
//! `L < N - 1` is in one of three states:
//!
//! - INACTIVE: no child, reads return the background value
//! - ACTIVE-LEAF-EQUIVALENT: no child, the cell stores a tile value
//! - ACTIVE-SUBDIVIDED: a level `L + 1` node holds finer data
//!
//! Reads descend through subdivided cells and return the value stored at the
//! first level without a child. Writes targeting a finer level materialise
//! every missing node on the way down.
//!
//! # Module Structure
//!
//! - [`config`]: `LevelConfig`, `VdbConfig` - topology and local addressing
//! - [`pool`]: `LevelPool` - per-level node arena
//! - [`node`]: `SparseLevelNode` - view of one node block
//! - `prune`: bottom-up coalescing of homogeneous subtrees
//! - [`iter`]: lazy active-cell enumeration

pub mod config;
pub mod iter;
pub mod node;
pub mod pool;
mod prune;

use std::sync::atomic::Ordering;

use glam::{IVec3, UVec3};
use rayon::prelude::*;
use tracing::debug;

pub use config::{LevelConfig, VdbConfig};
pub use iter::ActiveCells;
pub use node::SparseLevelNode;
pub use pool::LevelPool;
pub use prune::PruneStats;

use crate::constants::{NO_CHILD, ROOT_NODE};
use crate::error::VdbResult;
use crate::types::{NodeBox, VdbOp};
use crate::value::VoxelValue;

/// A materialised node and the world voxel at its minimum corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NodeEntry {
  pub index: u32,
  pub origin: IVec3,
}

/// Occupancy of one level.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LevelStats {
  /// Live nodes reachable from the root.
  pub nodes: usize,
  /// Cells holding an explicit value (written voxels or tiles).
  pub active_values: usize,
  /// Subdivided cells.
  pub active_children: usize,
  /// Bytes held by the level arena.
  pub memory_bytes: u64,
}

/// Per-level occupancy, root first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeStats {
  pub levels: Vec<LevelStats>,
}

impl TreeStats {
  pub fn total_nodes(&self) -> usize {
    self.levels.iter().map(|l| l.nodes).sum()
  }

  pub fn total_active_values(&self) -> usize {
    self.levels.iter().map(|l| l.active_values).sum()
  }

  pub fn memory_bytes(&self) -> u64 {
    self.levels.iter().map(|l| l.memory_bytes).sum()
  }
}

/// Sparse hierarchical grid with `N` levels of `V` values.
///
/// Every write takes `&self` and is safe to issue from parallel lanes.
/// Structural passes (`prune`, `clear`) take `&mut self`.
pub struct VdbTree<V: VoxelValue, const N: usize> {
  levels: [LevelConfig; N],
  pools: [LevelPool<V>; N],
  background: V,
}

impl<V: VoxelValue, const N: usize> VdbTree<V, N> {
  /// Build an empty tree. Only the root node is allocated.
  pub fn new(config: &VdbConfig<V, N>) -> VdbResult<Self> {
    let levels = config.build_levels()?;
    let root_cumulative = levels[0].cumulative_log2;
    let pools = std::array::from_fn(|level| {
      LevelPool::new(
        level,
        levels[level],
        level + 1 < N,
        root_cumulative,
        config.cell_budget_per_level,
      )
    });

    let tree = Self {
      levels,
      pools,
      background: config.background,
    };
    tree.allocate_root();

    debug!(
      levels = N,
      extent = %tree.voxel_extent(),
      background = ?tree.background,
      "vdb tree built"
    );
    Ok(tree)
  }

  fn allocate_root(&self) {
    let root = self.pools[0].allocate(self.background, false);
    debug_assert_eq!(root, ROOT_NODE);
  }

  // =========================================================================
  // Topology
  // =========================================================================

  #[inline]
  pub fn background(&self) -> V {
    self.background
  }

  #[inline]
  pub fn leaf_level(&self) -> usize {
    N - 1
  }

  #[inline]
  pub fn level_config(&self, level: usize) -> &LevelConfig {
    &self.levels[level]
  }

  pub fn level_configs(&self) -> &[LevelConfig; N] {
    &self.levels
  }

  #[inline]
  pub(crate) fn pool(&self, level: usize) -> &LevelPool<V> {
    &self.pools[level]
  }

  /// Addressable world voxels per axis.
  #[inline]
  pub fn voxel_extent(&self) -> IVec3 {
    self.levels[0].node_extent()
  }

  /// Whether a world voxel lies inside the addressable extent.
  #[inline]
  pub fn contains_world(&self, ijk: IVec3) -> bool {
    ijk.cmpge(IVec3::ZERO).all() && ijk.cmplt(self.voxel_extent()).all()
  }

  /// Local cell of `level` containing a world voxel.
  ///
  /// # Panics
  ///
  /// If `level` is past the leaf.
  #[inline]
  pub fn rescale_index_from_world_voxel(&self, level: usize, ijk: IVec3) -> UVec3 {
    assert!(level < N, "level {level} out of range for a {}-level tree", N);
    debug_assert!(self.contains_world(ijk), "voxel {ijk} outside the tree");
    self.levels[level].rescale(ijk)
  }

  #[inline(always)]
  fn offset_of(&self, level: usize, ijk: IVec3) -> usize {
    let config = &self.levels[level];
    config.flatten(config.rescale(ijk))
  }

  // =========================================================================
  // Writes
  // =========================================================================

  /// Apply `op` at `level_target`, materialising every node on the path.
  ///
  /// Returns the previous value of the target cell. Writes to an inner level
  /// store a tile value; it stays hidden while the cell is subdivided.
  ///
  /// # Panics
  ///
  /// If `level_target` is past the leaf or a node pool is exhausted.
  pub fn modify_value_world(&self, level_target: usize, ijk: IVec3, value: V, op: VdbOp) -> V {
    assert!(
      level_target < N,
      "level {level_target} out of range for a {}-level tree", N
    );
    debug_assert!(self.contains_world(ijk), "voxel {ijk} outside the tree");

    let mut index = ROOT_NODE;
    for level in 0..level_target {
      let node = self.pools[level].node(index);
      let offset = self.offset_of(level, ijk);
      index = match node.child(offset) {
        Some(child) => child,
        None => self.materialise_child(level, &node, offset),
      };
    }

    let offset = self.offset_of(level_target, ijk);
    self.pools[level_target]
      .node(index)
      .write(offset, value, op)
  }

  /// Create the child under `parent[offset]`, or adopt the one a racing
  /// writer published first.
  ///
  /// A tile in the parent cell is pushed down into every cell of the new
  /// child, marked active, before it becomes visible.
  fn materialise_child(&self, level: usize, parent: &SparseLevelNode<'_, V>, offset: usize) -> u32 {
    let tile = parent.is_value_active(offset);
    let fill = if tile {
      parent.read(offset)
    } else {
      self.background
    };

    let child_pool = &self.pools[level + 1];
    let fresh = child_pool.allocate(fill, tile);
    match parent
      .child_slot(offset)
      .compare_exchange(NO_CHILD, fresh, Ordering::AcqRel, Ordering::Acquire)
    {
      Ok(_) => {
        if tile {
          parent.clear_tile(offset, self.background);
        }
        fresh
      }
      Err(winner) => {
        child_pool.release(fresh);
        winner
      }
    }
  }

  #[inline]
  pub fn set_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Set)
  }

  #[inline]
  pub fn add_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Add)
  }

  #[inline]
  pub fn sub_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Sub)
  }

  #[inline]
  pub fn mul_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Mul)
  }

  #[inline]
  pub fn div_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Div)
  }

  #[inline]
  pub fn max_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Max)
  }

  #[inline]
  pub fn min_value_world(&self, ijk: IVec3, value: V) -> V {
    self.modify_value_world(self.leaf_level(), ijk, value, VdbOp::Min)
  }

  // =========================================================================
  // Reads
  // =========================================================================

  /// Descend until a cell has no child. Returns the level, node and offset
  /// of that cell.
  #[inline]
  fn resolve(&self, ijk: IVec3) -> (usize, SparseLevelNode<'_, V>, usize) {
    debug_assert!(self.contains_world(ijk), "voxel {ijk} outside the tree");
    let mut level = 0;
    let mut node = self.pools[0].node(ROOT_NODE);
    loop {
      let offset = self.offset_of(level, ijk);
      match node.child(offset) {
        Some(child) => {
          level += 1;
          node = self.pools[level].node(child);
        }
        None => return (level, node, offset),
      }
    }
  }

  /// Value at a world voxel: the coarsest level without a child wins.
  #[inline]
  pub fn read_value_world(&self, ijk: IVec3) -> V {
    let (_, node, offset) = self.resolve(ijk);
    node.read(offset)
  }

  /// Value at a world voxel and the level that resolved it.
  pub fn read_value_and_level(&self, ijk: IVec3) -> (V, usize) {
    let (level, node, offset) = self.resolve(ijk);
    (node.read(offset), level)
  }

  /// Whether the resolving cell holds an explicit value (a written voxel or
  /// a tile).
  pub fn is_value_active_world(&self, ijk: IVec3) -> bool {
    let (_, node, offset) = self.resolve(ijk);
    node.is_value_active(offset)
  }

  /// Whether the cell of `level` containing `ijk` is subdivided.
  ///
  /// False when any coarser level on the path has no child. At the leaf, which
  /// has no children, this reports whether the voxel holds an explicit value:
  /// written directly, or inherited from a tile when its block was
  /// rematerialised.
  ///
  /// # Panics
  ///
  /// If `level` is past the leaf.
  pub fn is_child_active_world(&self, level: usize, ijk: IVec3) -> bool {
    assert!(level < N, "level {level} out of range for a {}-level tree", N);
    debug_assert!(self.contains_world(ijk), "voxel {ijk} outside the tree");

    let mut index = ROOT_NODE;
    for upper in 0..level {
      match self.pools[upper].node(index).child(self.offset_of(upper, ijk)) {
        Some(child) => index = child,
        None => return false,
      }
    }

    let node = self.pools[level].node(index);
    let offset = self.offset_of(level, ijk);
    if node.is_leaf() {
      node.is_value_active(offset)
    } else {
      node.child(offset).is_some()
    }
  }

  // =========================================================================
  // Maintenance
  // =========================================================================

  /// Drop every node and restore background everywhere.
  #[tracing::instrument(skip_all, name = "vdb::clear")]
  pub fn clear(&mut self) {
    let released: u32 = self.pools.iter().map(|pool| pool.live_nodes()).sum();
    for pool in &mut self.pools {
      pool.reset();
    }
    self.allocate_root();
    debug!(released, "vdb tree cleared");
  }

  /// Every node reachable from the root, per level, breadth first.
  pub fn collect_nodes(&self) -> [Vec<NodeEntry>; N] {
    let mut nodes: [Vec<NodeEntry>; N] = std::array::from_fn(|_| Vec::new());
    nodes[0].push(NodeEntry {
      index: ROOT_NODE,
      origin: IVec3::ZERO,
    });

    for level in 0..N - 1 {
      let config = &self.levels[level];
      let (upper, lower) = nodes.split_at_mut(level + 1);
      for entry in &upper[level] {
        let node = self.pools[level].node(entry.index);
        lower[0].extend(node.children().map(|(offset, child)| NodeEntry {
          index: child,
          origin: config.cell_origin(entry.origin, config.unflatten(offset)),
        }));
      }
    }
    nodes
  }

  /// Voxel-space box of every materialised node.
  pub fn node_boxes(&self) -> Vec<NodeBox> {
    self
      .collect_nodes()
      .iter()
      .enumerate()
      .flat_map(|(level, entries)| {
        let extent = self.levels[level].node_extent();
        entries.iter().map(move |entry| NodeBox {
          level,
          min: entry.origin,
          max: entry.origin + extent,
        })
      })
      .collect()
  }

  /// Per-level occupancy.
  #[tracing::instrument(skip_all, name = "vdb::stats")]
  pub fn stats(&self) -> TreeStats {
    let levels = self
      .collect_nodes()
      .iter()
      .enumerate()
      .map(|(level, entries)| {
        let pool = &self.pools[level];
        let (active_values, active_children) = entries
          .par_iter()
          .map(|entry| {
            let node = pool.node(entry.index);
            (node.active_value_count(), node.active_child_count())
          })
          .reduce(|| (0, 0), |a, b| (a.0 + b.0, a.1 + b.1));

        LevelStats {
          nodes: entries.len(),
          active_values,
          active_children,
          memory_bytes: pool.memory_bytes(),
        }
      })
      .collect();

    TreeStats { levels }
  }

  /// Run `f` on every written leaf voxel, fanned out over leaf nodes.
  pub fn par_for_each_active_voxel<F>(&self, f: F)
  where
    F: Fn(IVec3, V) + Send + Sync,
  {
    let leaf = self.leaf_level();
    let config = &self.levels[leaf];
    let pool = &self.pools[leaf];
    let nodes = self.collect_nodes();

    nodes[leaf].par_iter().for_each(|entry| {
      let node = pool.node(entry.index);
      for offset in 0..node.len() {
        if node.is_value_active(offset) {
          f(
            config.cell_origin(entry.origin, config.unflatten(offset)),
            node.read(offset),
          );
        }
      }
    });
  }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod mod_test;
