//! Scalar value types storable in the grid.
//!
//! Every cell is an atomic so writers can scatter into the grid from a rayon
//! parallel-for without locks. Floats are stored as their bit patterns.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI32, AtomicU32, AtomicU64, Ordering};

use crate::types::VdbOp;

/// A scalar the grid can store, together with its atomic cell type.
pub trait VoxelValue: Copy + PartialEq + PartialOrd + Debug + Default + Send + Sync + 'static {
  /// Atomic storage cell for one value.
  type Atomic: Send + Sync;

  /// Wrap a value in a fresh atomic cell.
  fn new_atomic(self) -> Self::Atomic;

  /// Relaxed load.
  fn load(cell: &Self::Atomic) -> Self;

  /// Relaxed store.
  fn store(cell: &Self::Atomic, value: Self);

  /// Relaxed swap, returning the previous value.
  fn swap(cell: &Self::Atomic, value: Self) -> Self;

  /// Apply `f` with a compare-and-swap loop, returning the previous value.
  fn update(cell: &Self::Atomic, f: impl FnMut(Self) -> Self) -> Self;

  /// Non-atomic result of `self <op> operand`.
  fn combine(self, op: VdbOp, operand: Self) -> Self;

  /// Equality used by pruning.
  ///
  /// A non-positive tolerance means exact equality, otherwise
  /// `|self - other| < tolerance`.
  fn approx_eq(self, other: Self, tolerance: Self) -> bool;

  /// Lossy conversion used by interpolating samplers.
  fn to_f32(self) -> f32;

  /// Atomically apply `op` to a cell, returning the previous value.
  #[inline]
  fn apply(cell: &Self::Atomic, op: VdbOp, operand: Self) -> Self {
    match op {
      VdbOp::Set => Self::swap(cell, operand),
      _ => Self::update(cell, |current| current.combine(op, operand)),
    }
  }
}

macro_rules! float_voxel_value {
  ($t:ty, $atomic:ty) => {
    impl VoxelValue for $t {
      type Atomic = $atomic;

      #[inline(always)]
      fn new_atomic(self) -> $atomic {
        <$atomic>::new(self.to_bits())
      }

      #[inline(always)]
      fn load(cell: &$atomic) -> Self {
        <$t>::from_bits(cell.load(Ordering::Relaxed))
      }

      #[inline(always)]
      fn store(cell: &$atomic, value: Self) {
        cell.store(value.to_bits(), Ordering::Relaxed);
      }

      #[inline(always)]
      fn swap(cell: &$atomic, value: Self) -> Self {
        <$t>::from_bits(cell.swap(value.to_bits(), Ordering::Relaxed))
      }

      #[inline]
      fn update(cell: &$atomic, mut f: impl FnMut(Self) -> Self) -> Self {
        let previous = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
          Some(f(<$t>::from_bits(bits)).to_bits())
        });
        match previous {
          Ok(bits) | Err(bits) => <$t>::from_bits(bits),
        }
      }

      #[inline]
      fn combine(self, op: VdbOp, operand: Self) -> Self {
        match op {
          VdbOp::Set => operand,
          VdbOp::Add => self + operand,
          VdbOp::Sub => self - operand,
          VdbOp::Mul => self * operand,
          VdbOp::Div => self / operand,
          VdbOp::Max => self.max(operand),
          VdbOp::Min => self.min(operand),
        }
      }

      #[inline]
      fn approx_eq(self, other: Self, tolerance: Self) -> bool {
        if tolerance > 0.0 {
          (self - other).abs() < tolerance
        } else {
          self == other
        }
      }

      #[inline(always)]
      fn to_f32(self) -> f32 {
        self as f32
      }
    }
  };
}

macro_rules! int_voxel_value {
  ($t:ty, $atomic:ty) => {
    impl VoxelValue for $t {
      type Atomic = $atomic;

      #[inline(always)]
      fn new_atomic(self) -> $atomic {
        <$atomic>::new(self)
      }

      #[inline(always)]
      fn load(cell: &$atomic) -> Self {
        cell.load(Ordering::Relaxed)
      }

      #[inline(always)]
      fn store(cell: &$atomic, value: Self) {
        cell.store(value, Ordering::Relaxed);
      }

      #[inline(always)]
      fn swap(cell: &$atomic, value: Self) -> Self {
        cell.swap(value, Ordering::Relaxed)
      }

      #[inline]
      fn update(cell: &$atomic, mut f: impl FnMut(Self) -> Self) -> Self {
        let previous = cell.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(f(v)));
        match previous {
          Ok(v) | Err(v) => v,
        }
      }

      /// Add/sub/mul wrap. Division by zero panics.
      #[inline]
      fn combine(self, op: VdbOp, operand: Self) -> Self {
        match op {
          VdbOp::Set => operand,
          VdbOp::Add => self.wrapping_add(operand),
          VdbOp::Sub => self.wrapping_sub(operand),
          VdbOp::Mul => self.wrapping_mul(operand),
          VdbOp::Div => self / operand,
          VdbOp::Max => Ord::max(self, operand),
          VdbOp::Min => Ord::min(self, operand),
        }
      }

      #[inline]
      fn approx_eq(self, other: Self, tolerance: Self) -> bool {
        if tolerance > 0 {
          self.abs_diff(other) < tolerance.abs_diff(0)
        } else {
          self == other
        }
      }

      #[inline(always)]
      fn to_f32(self) -> f32 {
        self as f32
      }
    }
  };
}

float_voxel_value!(f32, AtomicU32);
float_voxel_value!(f64, AtomicU64);
int_voxel_value!(i32, AtomicI32);
int_voxel_value!(u32, AtomicU32);

#[cfg(test)]
#[path = "value_test.rs"]
mod value_test;
