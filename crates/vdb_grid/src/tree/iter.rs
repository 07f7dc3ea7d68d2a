//! Lazy depth-first scan over cells holding explicit values.
//!
//! The scan keeps one frame per level on a small inline stack and reads the
//! tree as it goes, so it reflects whatever is stored when each cell is
//! visited. Cells are yielded in local offset order, children before the
//! rest of their parent block.

use std::iter::FusedIterator;

use glam::IVec3;
use smallvec::SmallVec;

use super::VdbTree;
use crate::constants::{MAX_VDB_LEVELS, ROOT_NODE};
use crate::types::ActiveCell;
use crate::value::VoxelValue;

#[derive(Clone, Copy, Debug)]
struct Frame {
  level: usize,
  node: u32,
  origin: IVec3,
  offset: usize,
}

impl Frame {
  fn root() -> Self {
    Self {
      level: 0,
      node: ROOT_NODE,
      origin: IVec3::ZERO,
      offset: 0,
    }
  }
}

/// Iterator over written leaf voxels and tiles.
#[derive(Clone)]
pub struct ActiveCells<'a, V: VoxelValue, const N: usize> {
  tree: &'a VdbTree<V, N>,
  stack: SmallVec<[Frame; MAX_VDB_LEVELS]>,
}

impl<'a, V: VoxelValue, const N: usize> ActiveCells<'a, V, N> {
  pub fn new(tree: &'a VdbTree<V, N>) -> Self {
    let mut stack = SmallVec::new();
    stack.push(Frame::root());
    Self { tree, stack }
  }

  /// Start the scan over from the root.
  pub fn restart(&mut self) {
    self.stack.clear();
    self.stack.push(Frame::root());
  }
}

impl<V: VoxelValue, const N: usize> Iterator for ActiveCells<'_, V, N> {
  type Item = ActiveCell<V>;

  fn next(&mut self) -> Option<Self::Item> {
    let tree = self.tree;
    loop {
      let frame = self.stack.last_mut()?;
      let level = frame.level;
      let node = tree.pool(level).node(frame.node);
      if frame.offset >= node.len() {
        self.stack.pop();
        continue;
      }

      let offset = frame.offset;
      frame.offset += 1;
      let config = tree.level_config(level);
      let origin = config.cell_origin(frame.origin, config.unflatten(offset));

      if let Some(child) = node.child(offset) {
        self.stack.push(Frame {
          level: level + 1,
          node: child,
          origin,
          offset: 0,
        });
        continue;
      }

      if node.is_value_active(offset) {
        return Some(ActiveCell {
          level,
          origin,
          extent: config.cell_extent(),
          value: node.read(offset),
        });
      }
    }
  }
}

impl<V: VoxelValue, const N: usize> FusedIterator for ActiveCells<'_, V, N> {}

impl<V: VoxelValue, const N: usize> VdbTree<V, N> {
  /// Every written leaf voxel and every tile, depth first.
  pub fn active_cells(&self) -> ActiveCells<'_, V, N> {
    ActiveCells::new(self)
  }

  /// Written leaf voxels only.
  pub fn active_voxels(&self) -> impl Iterator<Item = ActiveCell<V>> + '_ {
    self.active_cells().filter(ActiveCell::is_voxel)
  }
}

#[cfg(test)]
#[path = "iter_test.rs"]
mod iter_test;
