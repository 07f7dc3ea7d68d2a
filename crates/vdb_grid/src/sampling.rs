//! Point sampling over a grid: corner stencils, trilinear interpolation and
//! gradient normals.
//!
//! Samples use the cell-corner convention of [`CoordinateTransform`]: the
//! value of voxel `(i, j, k)` sits at `origin + (i, j, k) * voxel_dim`.
//! Corners outside the grid read background.
//!
//! [`CoordinateTransform`]: crate::transform::CoordinateTransform

use glam::{IVec3, Vec3};

use crate::constants::CORNER_OFFSETS;
use crate::grid::VdbGrid;
use crate::value::VoxelValue;

impl<V: VoxelValue, const N: usize> VdbGrid<V, N> {
  /// The 8 values of the cube with minimum corner `ijk`.
  ///
  /// Corner layout:
  /// ```text
  /// 0: (0,0,0)  4: (0,0,1)
  /// 1: (1,0,0)  5: (1,0,1)
  /// 2: (0,1,0)  6: (0,1,1)
  /// 3: (1,1,0)  7: (1,1,1)
  /// ```
  #[inline]
  pub fn corner_samples(&self, ijk: IVec3) -> [f32; 8] {
    std::array::from_fn(|corner| {
      self
        .read_value_checked(ijk.saturating_add(IVec3::from_array(CORNER_OFFSETS[corner])))
        .to_f32()
    })
  }

  /// Trilinear interpolation at a world position.
  pub fn sample_trilinear(&self, pos: Vec3) -> f32 {
    if !pos.is_finite() {
      return self.background().to_f32();
    }

    let g = self.transform().coord_to_voxel_f(pos);
    let base = g.floor();
    let t = g - base;
    let s = self.corner_samples(base.as_ivec3());

    // X first, then Y, then Z
    let c00 = s[0] + (s[1] - s[0]) * t.x;
    let c10 = s[2] + (s[3] - s[2]) * t.x;
    let c01 = s[4] + (s[5] - s[4]) * t.x;
    let c11 = s[6] + (s[7] - s[6]) * t.x;

    let c0 = c00 + (c10 - c00) * t.y;
    let c1 = c01 + (c11 - c01) * t.y;

    c0 + (c1 - c0) * t.z
  }

  /// Normalised gradient over the cube with minimum corner `ijk`.
  ///
  /// Falls back to +Y where the field is flat.
  pub fn normal_at(&self, ijk: IVec3) -> Vec3 {
    let s = self.corner_samples(ijk);

    // Each axis: far face minus near face
    let gx = (s[1] + s[3] + s[5] + s[7]) - (s[0] + s[2] + s[4] + s[6]);
    let gy = (s[2] + s[3] + s[6] + s[7]) - (s[0] + s[1] + s[4] + s[5]);
    let gz = (s[4] + s[5] + s[6] + s[7]) - (s[0] + s[1] + s[2] + s[3]);

    let gradient = Vec3::new(gx, gy, gz);
    let len_sq = gradient.length_squared();
    if len_sq < 1e-8 {
      return Vec3::Y;
    }
    gradient * len_sq.sqrt().recip()
  }
}

#[cfg(test)]
#[path = "sampling_test.rs"]
mod sampling_test;
