//! CoordinateTransform - world space <-> voxel index mapping.
//!
//! Uses the cell-corner convention: voxel `(i, j, k)` sits at
//! `origin + (i, j, k) * voxel_dim`. Callers that want voxel centres add the
//! half-voxel offset themselves.

use glam::{IVec3, Vec3};

use crate::error::{VdbConfigError, VdbResult};

/// Maps floating world positions to integer voxel coordinates and back.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CoordinateTransform {
  voxel_dim: Vec3,
  inv_voxel_dim: Vec3,
  origin: Vec3,
}

impl CoordinateTransform {
  /// Create a transform from per-axis voxel dimensions and an origin.
  pub fn new(voxel_dim: Vec3, origin: Vec3) -> VdbResult<Self> {
    if !voxel_dim.is_finite() || voxel_dim.cmple(Vec3::ZERO).any() {
      return Err(VdbConfigError::InvalidVoxelDim(voxel_dim));
    }
    Ok(Self {
      voxel_dim,
      inv_voxel_dim: voxel_dim.recip(),
      origin,
    })
  }

  /// Create a transform with cubic voxels.
  pub fn uniform(voxel_size: f32, origin: Vec3) -> VdbResult<Self> {
    Self::new(Vec3::splat(voxel_size), origin)
  }

  /// Size of one voxel in world units.
  #[inline]
  pub fn voxel_dim(&self) -> Vec3 {
    self.voxel_dim
  }

  /// Precomputed reciprocal of `voxel_dim`.
  #[inline]
  pub fn inv_voxel_dim(&self) -> Vec3 {
    self.inv_voxel_dim
  }

  /// World position of voxel `(0, 0, 0)`.
  #[inline]
  pub fn origin(&self) -> Vec3 {
    self.origin
  }

  /// World position of a voxel corner.
  #[inline]
  pub fn voxel_to_coord(&self, ijk: IVec3) -> Vec3 {
    self.origin + ijk.as_vec3() * self.voxel_dim
  }

  /// Continuous voxel-space position (no flooring).
  #[inline]
  pub fn coord_to_voxel_f(&self, pos: Vec3) -> Vec3 {
    (pos - self.origin) * self.inv_voxel_dim
  }

  /// Voxel containing a world position: `floor((pos - origin) / voxel_dim)`.
  ///
  /// Out-of-range results are valid (possibly negative) integers; range
  /// checks belong to the caller.
  #[inline]
  pub fn coord_to_voxel(&self, pos: Vec3) -> IVec3 {
    self.coord_to_voxel_f(pos).floor().as_ivec3()
  }
}

impl Default for CoordinateTransform {
  fn default() -> Self {
    Self {
      voxel_dim: Vec3::ONE,
      inv_voxel_dim: Vec3::ONE,
      origin: Vec3::ZERO,
    }
  }
}

#[cfg(test)]
#[path = "transform_test.rs"]
mod transform_test;
