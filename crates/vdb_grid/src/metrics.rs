//! Engine-agnostic metrics collection for grid occupancy and prune cost.
//!
//! Feature-gated and runtime-toggled to ensure zero overhead when disabled.
//!
//! # Usage
//!
//! ```ignore
//! use vdb_grid::metrics::{GridMetrics, COLLECT_METRICS};
//!
//! // Compile with --features metrics
//! // Runtime toggle:
//! COLLECT_METRICS.store(false, Ordering::Relaxed);
//!
//! // Update occupancy after a simulation pass:
//! metrics.update_from_stats(&tree.stats());
//!
//! // Record prune timing:
//! metrics.record_prune(timing_us, &prune_stats);
//! ```

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

use crate::constants::MAX_VDB_LEVELS;
use crate::tree::{PruneStats, TreeStats};

/// Runtime toggle for metrics collection.
/// Set to false to disable metrics gathering at runtime.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// Check if metrics collection is enabled (both compile-time and runtime).
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Rolling window for storing recent values (e.g., timing history).
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
  buffer: VecDeque<T>,
  capacity: usize,
}

impl<T> RollingWindow<T> {
  /// Create a new rolling window with the given capacity.
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  /// Push a new value, evicting the oldest if at capacity.
  pub fn push(&mut self, value: T) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  /// Iterate over values (oldest to newest).
  pub fn iter(&self) -> impl Iterator<Item = &T> {
    self.buffer.iter()
  }

  /// Get the most recent value.
  pub fn last(&self) -> Option<&T> {
    self.buffer.back()
  }
}

impl RollingWindow<u64> {
  pub fn sum(&self) -> u64 {
    self.buffer.iter().sum()
  }

  /// Average of all values, zero when empty.
  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.sum() as f64 / self.buffer.len() as f64
    }
  }

  pub fn min_max(&self) -> Option<(u64, u64)> {
    let min = self.buffer.iter().min()?;
    let max = self.buffer.iter().max()?;
    Some((*min, *max))
  }
}

impl Default for RollingWindow<u64> {
  fn default() -> Self {
    Self::new(64)
  }
}

/// Grid statistics, refreshed after structural passes.
#[derive(Debug, Clone, Default)]
pub struct GridMetrics {
  // Occupancy
  /// Live nodes at each level (index = level, root first).
  pub nodes_per_level: [u64; MAX_VDB_LEVELS],
  /// Cells holding explicit values at each level.
  pub active_values_per_level: [u64; MAX_VDB_LEVELS],

  // Memory
  /// Bytes held by all level arenas.
  pub memory_bytes: u64,

  // Timing
  /// Rolling window of prune pass times in microseconds.
  pub prune_timings: RollingWindow<u64>,
  /// Last prune time in microseconds.
  pub last_prune_us: u64,

  // Totals
  /// Subtrees collapsed over the grid's lifetime.
  pub total_collapsed: u64,
  pub total_prunes: u64,
}

impl GridMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  /// Reset occupancy and timings. Lifetime totals are kept.
  pub fn reset(&mut self) {
    self.nodes_per_level.fill(0);
    self.active_values_per_level.fill(0);
    self.memory_bytes = 0;
    self.prune_timings.clear();
    self.last_prune_us = 0;
  }

  /// Copy occupancy from a stats snapshot.
  pub fn update_from_stats(&mut self, stats: &TreeStats) {
    if !is_enabled() {
      return;
    }

    self.nodes_per_level.fill(0);
    self.active_values_per_level.fill(0);
    for (level, level_stats) in stats.levels.iter().enumerate().take(MAX_VDB_LEVELS) {
      self.nodes_per_level[level] = level_stats.nodes as u64;
      self.active_values_per_level[level] = level_stats.active_values as u64;
    }
    self.memory_bytes = stats.memory_bytes();
  }

  /// Record one prune pass.
  pub fn record_prune(&mut self, timing_us: u64, stats: &PruneStats) {
    if !is_enabled() {
      return;
    }

    self.prune_timings.push(timing_us);
    self.last_prune_us = timing_us;
    self.total_collapsed += stats.total_collapsed() as u64;
    self.total_prunes += 1;
  }

  pub fn total_nodes(&self) -> u64 {
    self.nodes_per_level.iter().sum()
  }

  pub fn total_active_values(&self) -> u64 {
    self.active_values_per_level.iter().sum()
  }

  pub fn avg_prune_timing_us(&self) -> f64 {
    self.prune_timings.average()
  }

  pub fn memory_mb(&self) -> f64 {
    self.memory_bytes as f64 / 1_048_576.0
  }
}
