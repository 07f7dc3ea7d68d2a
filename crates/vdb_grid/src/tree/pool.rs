//! LevelPool - fixed-capacity node arena for one tree level.
//!
//! Nodes are addressed by a dense `u32` index. Storage is carved into
//! segments created on first touch, so a level reserves only a small slot
//! table up front and grows as nodes are materialised.
//!
//! ```text
//! segments: [ seg 0 | seg 1 | ... ]        one OnceLock per segment
//!              │
//!              ├── values   [nodes_per_segment * block_size]
//!              ├── active   [nodes_per_segment * mask_words]
//!              └── children [nodes_per_segment * block_size]  (inner levels)
//! ```

use std::mem::size_of;
use std::sync::atomic::{AtomicU32, AtomicU64};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use glam::UVec3;
use tracing::trace;

use super::config::LevelConfig;
use super::node::SparseLevelNode;
use crate::constants::{mask_words_for, NO_CHILD, SEGMENT_TARGET_CELLS};
use crate::value::VoxelValue;

struct Segment<V: VoxelValue> {
  values: Box<[V::Atomic]>,
  active: Box<[AtomicU64]>,
  children: Box<[AtomicU32]>,
}

/// Bump index plus free list. Only touched when nodes are created or released.
#[derive(Debug, Default)]
struct NodeAllocator {
  next: u32,
  free: Vec<u32>,
  live: u32,
}

/// Arena of node blocks for one level.
pub struct LevelPool<V: VoxelValue> {
  level: usize,
  config: LevelConfig,
  has_children: bool,
  block_size: usize,
  mask_words: usize,
  nodes_per_segment: usize,
  capacity: u32,
  segments: Box<[OnceLock<Segment<V>>]>,
  allocator: Mutex<NodeAllocator>,
}

impl<V: VoxelValue> LevelPool<V> {
  /// Create an empty pool.
  ///
  /// `root_cumulative_log2` bounds how many nodes this level can ever address;
  /// `cell_budget` caps the arena further.
  pub fn new(
    level: usize,
    config: LevelConfig,
    has_children: bool,
    root_cumulative_log2: UVec3,
    cell_budget: u64,
  ) -> Self {
    let block_size = config.block_size();
    let addressable_log2 =
      root_cumulative_log2.element_sum() - config.cumulative_log2.element_sum();
    let addressable = 1u64.checked_shl(addressable_log2).unwrap_or(u64::MAX);
    let budgeted = cell_budget / block_size as u64;
    let capacity = addressable.min(budgeted).min(NO_CHILD as u64 - 1).max(1) as u32;

    let nodes_per_segment = (SEGMENT_TARGET_CELLS / block_size).max(1);
    let slots = (capacity as usize).div_ceil(nodes_per_segment);

    Self {
      level,
      config,
      has_children,
      block_size,
      mask_words: mask_words_for(block_size),
      nodes_per_segment,
      capacity,
      segments: Self::empty_slots(slots),
      allocator: Mutex::new(NodeAllocator::default()),
    }
  }

  fn empty_slots(slots: usize) -> Box<[OnceLock<Segment<V>>]> {
    (0..slots).map(|_| OnceLock::new()).collect()
  }

  fn lock(&self) -> MutexGuard<'_, NodeAllocator> {
    self.allocator.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn new_segment(&self, segment: usize) -> Segment<V> {
    trace!(level = self.level, segment, "vdb pool segment created");
    let nodes = self.nodes_per_segment;
    let child_cells = if self.has_children {
      nodes * self.block_size
    } else {
      0
    };
    Segment {
      values: (0..nodes * self.block_size)
        .map(|_| V::default().new_atomic())
        .collect(),
      active: (0..nodes * self.mask_words)
        .map(|_| AtomicU64::new(0))
        .collect(),
      children: (0..child_cells).map(|_| AtomicU32::new(NO_CHILD)).collect(),
    }
  }

  // =========================================================================
  // Allocation
  // =========================================================================

  /// Claim a node and initialise every cell to `fill`.
  ///
  /// # Panics
  ///
  /// When the pool is exhausted. Capacity is a configuration limit, not a
  /// recoverable condition.
  pub fn allocate(&self, fill: V, active: bool) -> u32 {
    let index = {
      let mut allocator = self.lock();
      let index = match allocator.free.pop() {
        Some(index) => index,
        None => {
          assert!(
            allocator.next < self.capacity,
            "vdb level {} node pool exhausted ({} nodes)",
            self.level,
            self.capacity
          );
          allocator.next += 1;
          allocator.next - 1
        }
      };
      allocator.live += 1;
      index
    };

    self.node(index).fill(fill, active);
    index
  }

  /// Return a node to the free list. Its storage is reinitialised on reuse.
  pub fn release(&self, index: u32) {
    let mut allocator = self.lock();
    debug_assert!(index < allocator.next, "releasing unallocated node {index}");
    allocator.free.push(index);
    allocator.live -= 1;
  }

  /// Drop every node and segment.
  pub fn reset(&mut self) {
    self.segments = Self::empty_slots(self.segments.len());
    *self
      .allocator
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner) = NodeAllocator::default();
  }

  // =========================================================================
  // Access
  // =========================================================================

  /// View of node `index`.
  #[inline]
  pub fn node(&self, index: u32) -> SparseLevelNode<'_, V> {
    debug_assert!(index < self.capacity, "node {index} outside pool");
    let index = index as usize;
    let segment_index = index / self.nodes_per_segment;
    let slot = index % self.nodes_per_segment;
    let segment = self.segments[segment_index].get_or_init(|| self.new_segment(segment_index));

    let cells = slot * self.block_size..(slot + 1) * self.block_size;
    let words = slot * self.mask_words..(slot + 1) * self.mask_words;
    let children = if self.has_children {
      &segment.children[cells.clone()]
    } else {
      &segment.children[..0]
    };

    SparseLevelNode::new(
      self.config,
      index as u32,
      &segment.values[cells],
      &segment.active[words],
      children,
    )
  }

  #[inline]
  pub fn level(&self) -> usize {
    self.level
  }

  #[inline]
  pub fn config(&self) -> &LevelConfig {
    &self.config
  }

  /// Maximum number of nodes this level can hold.
  #[inline]
  pub fn capacity(&self) -> u32 {
    self.capacity
  }

  /// Nodes currently allocated.
  pub fn live_nodes(&self) -> u32 {
    self.lock().live
  }

  /// Bytes held by created segments.
  pub fn memory_bytes(&self) -> u64 {
    let per_node = self.block_size * size_of::<V::Atomic>()
      + self.mask_words * size_of::<AtomicU64>()
      + if self.has_children {
        self.block_size * size_of::<AtomicU32>()
      } else {
        0
      };
    let created = self.segments.iter().filter(|s| s.get().is_some()).count();
    (created * self.nodes_per_segment * per_node) as u64
  }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
