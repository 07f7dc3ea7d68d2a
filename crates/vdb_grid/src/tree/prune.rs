//! Bottom-up coalescing of homogeneous subtrees.
//!
//! Levels are visited from `N - 2` up to the root. A child node collapses
//! into its parent cell when it has no children of its own and every cell
//! agrees with its first cell within the tolerance. Because finer levels are
//! finished first, a whole uniform subtree folds up one level per step.

use rayon::prelude::*;
use tracing::{debug, trace};

use super::VdbTree;
use crate::value::VoxelValue;

/// Outcome of one prune pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
  /// Children collapsed into each level, root first. The leaf entry is
  /// always zero.
  pub collapsed_per_level: Vec<usize>,
  /// Collapses that left a non-background tile behind.
  pub tiles_created: usize,
}

impl PruneStats {
  /// Nodes released by the pass.
  pub fn total_collapsed(&self) -> usize {
    self.collapsed_per_level.iter().sum()
  }
}

impl<V: VoxelValue, const N: usize> VdbTree<V, N> {
  /// Collapse every subtree whose values agree within `tolerance`.
  ///
  /// A tolerance of zero (or below) demands exact equality. Collapsed cells
  /// whose value equals background become inactive; all others keep the value
  /// as a tile. Reads return the same values before and after, up to
  /// `tolerance`.
  #[tracing::instrument(skip_all, name = "vdb::prune")]
  pub fn prune(&mut self, tolerance: V) -> PruneStats {
    let mut stats = PruneStats {
      collapsed_per_level: vec![0; N],
      tiles_created: 0,
    };
    let background = self.background;
    let nodes = self.collect_nodes();

    for level in (0..N.saturating_sub(1)).rev() {
      let parents = &self.pools[level];
      let children = &self.pools[level + 1];

      let collapsed: Vec<(u32, bool)> = nodes[level]
        .par_iter()
        .flat_map_iter(|entry| {
          let parent = parents.node(entry.index);
          parent.children().filter_map(move |(offset, child)| {
            let representative = children.node(child).uniform_value(tolerance)?;
            let tile = representative != background;
            parent.deactivate(offset, tile.then_some(representative), background);
            Some((child, tile))
          })
        })
        .collect();

      let tiles = collapsed.iter().filter(|(_, tile)| *tile).count();
      for &(child, _) in &collapsed {
        children.release(child);
      }

      trace!(level, collapsed = collapsed.len(), tiles, "vdb prune level");
      stats.collapsed_per_level[level] = collapsed.len();
      stats.tiles_created += tiles;
    }

    debug!(
      collapsed = stats.total_collapsed(),
      tiles = stats.tiles_created,
      per_level = ?stats.collapsed_per_level,
      "vdb prune finished"
    );
    stats
  }
}

#[cfg(test)]
#[path = "prune_test.rs"]
mod prune_test;
