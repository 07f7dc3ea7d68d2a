//! Limits and sizing constants for the hierarchical grid.
//!
//! # Tree Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │                      VDB TREE (levels [4, 4, 2])                     │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │                                                                      │
//! │  level 0 (root)   16³ cells, each covering 2^6 = 64 voxels per axis  │
//! │       │                                                              │
//! │       └── child ── level 1   16³ cells, each covering 4 voxels/axis  │
//! │                        │                                             │
//! │                        └── child ── level 2 (leaf)  4³ voxels        │
//! │                                                                      │
//! │  cumulative log2:  level 0 = 10, level 1 = 6, level 2 = 2            │
//! │  addressable extent: 2^10 = 1024 voxels per axis                     │
//! │                                                                      │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Local Indexing
//!
//! Cells inside one node block are stored X-major, Z innermost:
//!
//! ```text
//! offset = x << (log2y + log2z) | y << log2z | z
//! ```

/// Maximum number of tree levels supported.
pub const MAX_VDB_LEVELS: usize = 5;

/// Default per-level log2 extents (root first, leaf last).
pub const DEFAULT_LEVEL_LOG2: [u32; MAX_VDB_LEVELS] = [5, 5, 5, 5, 3];

/// Largest log2 cell count of a single node block (16M cells).
pub const MAX_BLOCK_LOG2: u32 = 24;

/// Largest log2 addressable extent per axis.
///
/// World voxel coordinates are `i32`; keeping the extent at 2^30 leaves
/// headroom for neighbour offsets without overflow.
pub const MAX_WORLD_LOG2: u32 = 30;

/// Sentinel stored in a child slot that has no materialised child.
pub const NO_CHILD: u32 = u32::MAX;

/// Index of the root node in the level 0 pool (always allocated).
pub const ROOT_NODE: u32 = 0;

/// Target number of cells per arena segment.
///
/// Small blocks are packed many nodes per segment; blocks larger than this
/// get one node per segment.
pub const SEGMENT_TARGET_CELLS: usize = 1 << 15;

/// Default cell budget per level (2^28 cells, 1 GiB of `f32` values).
pub const DEFAULT_CELL_BUDGET_PER_LEVEL: u64 = 1 << 28;

/// Bits per activation mask word.
pub const MASK_WORD_BITS: usize = 64;

/// Axis names for diagnostics.
pub const AXIS_NAMES: [char; 3] = ['x', 'y', 'z'];

/// Number of mask words needed to hold one bit per cell.
#[inline(always)]
pub const fn mask_words_for(block_size: usize) -> usize {
  block_size.div_ceil(MASK_WORD_BITS)
}

/// Cube corner offsets relative to a base voxel.
///
/// Corner layout (binary: ZYX):
/// - 0 = (0,0,0)
/// - 1 = (1,0,0)
/// - 2 = (0,1,0)
/// - 3 = (1,1,0)
/// - 4 = (0,0,1)
/// - 5 = (1,0,1)
/// - 6 = (0,1,1)
/// - 7 = (1,1,1)
pub const CORNER_OFFSETS: [[i32; 3]; 8] = [
  [0, 0, 0],
  [1, 0, 0],
  [0, 1, 0],
  [1, 1, 0],
  [0, 0, 1],
  [1, 0, 1],
  [0, 1, 1],
  [1, 1, 1],
];

#[cfg(test)]
#[path = "constants_test.rs"]
mod constants_test;
