//! SparseLevelNode - view of one node block inside a level pool.
//!
//! A node block holds, per local cell:
//! - a value (atomic, interpreted through [`VoxelValue`])
//! - an activation bit ("value explicitly stored here")
//! - a child slot (inner levels only; [`NO_CHILD`] when unmaterialised)
//!
//! ```text
//! cell state            child slot   active bit   value
//! ──────────────────────────────────────────────────────────
//! INACTIVE              NO_CHILD     0            background
//! ACTIVE-LEAF-EQUIVALENT NO_CHILD    1            tile value
//! ACTIVE-SUBDIVIDED     node index   0            background
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use glam::UVec3;

use super::config::LevelConfig;
use crate::constants::{MASK_WORD_BITS, NO_CHILD};
use crate::types::VdbOp;
use crate::value::VoxelValue;

#[inline(always)]
fn mask_bit(offset: usize) -> (usize, u64) {
  (offset / MASK_WORD_BITS, 1u64 << (offset % MASK_WORD_BITS))
}

/// Borrowed view of one node's storage.
///
/// All mutation goes through atomics, so a view only ever needs `&self`.
pub struct SparseLevelNode<'a, V: VoxelValue> {
  config: LevelConfig,
  index: u32,
  values: &'a [V::Atomic],
  active: &'a [AtomicU64],
  children: &'a [AtomicU32],
}

impl<'a, V: VoxelValue> SparseLevelNode<'a, V> {
  pub(crate) fn new(
    config: LevelConfig,
    index: u32,
    values: &'a [V::Atomic],
    active: &'a [AtomicU64],
    children: &'a [AtomicU32],
  ) -> Self {
    Self {
      config,
      index,
      values,
      active,
      children,
    }
  }

  /// Index of this node in its level pool.
  #[inline]
  pub fn index(&self) -> u32 {
    self.index
  }

  #[inline]
  pub fn config(&self) -> &LevelConfig {
    &self.config
  }

  /// Leaf nodes carry no child slots.
  #[inline]
  pub fn is_leaf(&self) -> bool {
    self.children.is_empty()
  }

  /// Number of cells in the block.
  #[inline]
  pub fn len(&self) -> usize {
    self.values.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  // =========================================================================
  // Values
  // =========================================================================

  #[inline(always)]
  pub fn read(&self, offset: usize) -> V {
    V::load(&self.values[offset])
  }

  /// Read the value stored at a local cell.
  #[inline]
  pub fn read_local(&self, local: UVec3) -> V {
    self.read(self.config.flatten(local))
  }

  /// Apply `op` to a cell and mark it active. Returns the previous value.
  #[inline(always)]
  pub fn write(&self, offset: usize, value: V, op: VdbOp) -> V {
    let previous = V::apply(&self.values[offset], op, value);
    self.set_value_active(offset);
    previous
  }

  #[inline]
  pub fn write_local(&self, local: UVec3, value: V, op: VdbOp) -> V {
    self.write(self.config.flatten(local), value, op)
  }

  /// Whether the cell holds an explicitly stored value.
  #[inline(always)]
  pub fn is_value_active(&self, offset: usize) -> bool {
    let (word, bit) = mask_bit(offset);
    self.active[word].load(Ordering::Relaxed) & bit != 0
  }

  #[inline(always)]
  pub fn set_value_active(&self, offset: usize) {
    let (word, bit) = mask_bit(offset);
    if self.active[word].load(Ordering::Relaxed) & bit == 0 {
      self.active[word].fetch_or(bit, Ordering::Relaxed);
    }
  }

  #[inline(always)]
  pub fn clear_value_active(&self, offset: usize) {
    let (word, bit) = mask_bit(offset);
    self.active[word].fetch_and(!bit, Ordering::Relaxed);
  }

  /// Count of cells with their activation bit set.
  pub fn active_value_count(&self) -> usize {
    self
      .active
      .iter()
      .map(|word| word.load(Ordering::Relaxed).count_ones() as usize)
      .sum()
  }

  /// Common value of every cell, if the whole block spans less than
  /// `tolerance` and none of its cells is subdivided.
  ///
  /// Any two cells then agree within `tolerance`. The first cell is the
  /// representative.
  pub fn uniform_value(&self, tolerance: V) -> Option<V> {
    if self.has_active_children() {
      return None;
    }
    let first = self.read(0);
    let (mut lo, mut hi) = (first, first);
    for cell in self.values {
      let value = V::load(cell);
      // NaN never matches
      if !value.approx_eq(first, tolerance) {
        return None;
      }
      if value < lo {
        lo = value;
      } else if value > hi {
        hi = value;
      }
    }
    hi.approx_eq(lo, tolerance).then_some(first)
  }

  // =========================================================================
  // Children
  // =========================================================================

  /// Materialised child at `offset`, if any.
  #[inline(always)]
  pub fn child(&self, offset: usize) -> Option<u32> {
    let slot = self.children.get(offset)?;
    match slot.load(Ordering::Acquire) {
      NO_CHILD => None,
      child => Some(child),
    }
  }

  /// Whether the cell at `local` is subdivided.
  #[inline]
  pub fn is_child_active_local(&self, local: UVec3) -> bool {
    self.child(self.config.flatten(local)).is_some()
  }

  /// Raw child slot, used when publishing a freshly allocated child.
  #[inline(always)]
  pub(crate) fn child_slot(&self, offset: usize) -> &'a AtomicU32 {
    &self.children[offset]
  }

  /// Detach the child at `offset`, leaving a tile.
  ///
  /// With a representative the cell becomes ACTIVE-LEAF-EQUIVALENT holding
  /// it; without one the cell falls back to INACTIVE background. Returns the
  /// detached child index for the caller to release.
  pub fn deactivate(&self, offset: usize, representative: Option<V>, background: V) -> Option<u32> {
    let previous = self
      .children
      .get(offset)
      .map(|slot| slot.swap(NO_CHILD, Ordering::AcqRel))
      .filter(|&child| child != NO_CHILD);

    match representative {
      Some(value) => {
        V::store(&self.values[offset], value);
        self.set_value_active(offset);
      }
      None => {
        V::store(&self.values[offset], background);
        self.clear_value_active(offset);
      }
    }
    previous
  }

  /// Replace a tile with background once its value moved into a child.
  #[inline]
  pub(crate) fn clear_tile(&self, offset: usize, background: V) {
    V::store(&self.values[offset], background);
    self.clear_value_active(offset);
  }

  #[inline]
  pub fn deactivate_local(
    &self,
    local: UVec3,
    representative: Option<V>,
    background: V,
  ) -> Option<u32> {
    self.deactivate(self.config.flatten(local), representative, background)
  }

  /// Whether any cell is subdivided.
  pub fn has_active_children(&self) -> bool {
    self
      .children
      .iter()
      .any(|slot| slot.load(Ordering::Acquire) != NO_CHILD)
  }

  pub fn active_child_count(&self) -> usize {
    self
      .children
      .iter()
      .filter(|slot| slot.load(Ordering::Acquire) != NO_CHILD)
      .count()
  }

  /// Iterate `(offset, child)` over subdivided cells.
  pub fn children(&self) -> impl Iterator<Item = (usize, u32)> + 'a {
    let children: &'a [AtomicU32] = self.children;
    children
      .iter()
      .enumerate()
      .filter_map(|(offset, slot)| match slot.load(Ordering::Acquire) {
        NO_CHILD => None,
        child => Some((offset, child)),
      })
  }

  /// Reset every cell to `value`, optionally marking it active, and drop
  /// every child link.
  pub(crate) fn fill(&self, value: V, active: bool) {
    for cell in self.values {
      V::store(cell, value);
    }

    let len = self.values.len();
    for (word_index, word) in self.active.iter().enumerate() {
      let bits = if !active {
        0
      } else {
        let covered = len.saturating_sub(word_index * MASK_WORD_BITS);
        if covered >= MASK_WORD_BITS {
          u64::MAX
        } else {
          (1u64 << covered) - 1
        }
      };
      word.store(bits, Ordering::Relaxed);
    }

    for slot in self.children {
      slot.store(NO_CHILD, Ordering::Relaxed);
    }
  }
}

#[cfg(test)]
#[path = "node_test.rs"]
mod node_test;
