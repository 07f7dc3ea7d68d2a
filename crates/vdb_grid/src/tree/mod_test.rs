use std::sync::Mutex;

use proptest::prelude::*;
use rayon::prelude::*;

use super::*;

/// Levels [4, 4, 2]: 1024 voxels per axis, 4^3 leaf blocks.
fn tree_442() -> VdbTree<f32, 3> {
  VdbTree::new(&VdbConfig::uniform([4, 4, 2])).expect("Valid config")
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_new_tree_is_empty() {
  let tree = tree_442();

  assert_eq!(tree.voxel_extent(), IVec3::splat(1024));
  assert_eq!(tree.leaf_level(), 2);
  assert_eq!(tree.background(), 0.0);

  let stats = tree.stats();
  assert_eq!(stats.levels.len(), 3);
  assert_eq!(stats.total_nodes(), 1, "Only the root is allocated");
  assert_eq!(stats.total_active_values(), 0);
}

#[test]
fn test_invalid_config_surfaces_error() {
  let config = VdbConfig::<f32, 2>::new([UVec3::new(3, 0, 3), UVec3::splat(2)]);
  assert!(VdbTree::new(&config).is_err());
}

/// The five-level default topology addresses 2^23 voxels per axis.
#[test]
fn test_default_topology() {
  let tree = VdbTree::<f32, 5>::new(&VdbConfig::default()).expect("Default config");
  let ijk = IVec3::new(1_000_000, 3, 8_000_000);

  assert_eq!(tree.voxel_extent(), IVec3::splat(1 << 23));
  tree.set_value_world(ijk, 2.0);
  assert_eq!(tree.read_value_and_level(ijk), (2.0, 4));
  assert_eq!(tree.stats().total_nodes(), 5);
}

// =========================================================================
// Reads and writes
// =========================================================================

/// Never-written voxels read background at the root.
#[test]
fn test_background_default() {
  let tree = VdbTree::<f32, 3>::new(&VdbConfig::uniform([4, 4, 2]).with_background(-3.0))
    .expect("Valid config");

  for ijk in [IVec3::ZERO, IVec3::new(1023, 0, 511), IVec3::new(17, 400, 9)] {
    assert_eq!(tree.read_value_and_level(ijk), (-3.0, 0));
    assert!(!tree.is_value_active_world(ijk));
  }
}

/// Writing (20, 42, 1) materialises one node per level along its path.
#[test]
fn test_write_materialises_path() {
  let tree = tree_442();
  let ijk = IVec3::new(20, 42, 1);

  assert_eq!(tree.rescale_index_from_world_voxel(0, ijk), UVec3::new(0, 0, 0));
  assert_eq!(tree.rescale_index_from_world_voxel(1, ijk), UVec3::new(5, 10, 0));
  assert_eq!(tree.rescale_index_from_world_voxel(2, ijk), UVec3::new(0, 2, 1));

  assert_eq!(tree.set_value_world(ijk, 3.5), 0.0);
  assert_eq!(tree.read_value_and_level(ijk), (3.5, 2));

  assert!(tree.is_child_active_world(0, ijk));
  assert!(tree.is_child_active_world(1, ijk));
  assert!(tree.is_child_active_world(2, ijk), "Leaf reports written");

  // Same leaf block, never written
  let neighbour = IVec3::new(21, 42, 1);
  assert_eq!(tree.read_value_and_level(neighbour), (0.0, 2));
  assert!(!tree.is_child_active_world(2, neighbour));

  // Different root cell entirely
  let far = IVec3::new(500, 500, 500);
  assert_eq!(tree.read_value_and_level(far), (0.0, 0));
  assert!(!tree.is_child_active_world(1, far));
  assert!(!tree.is_child_active_world(2, far));

  let stats = tree.stats();
  let nodes: Vec<usize> = stats.levels.iter().map(|l| l.nodes).collect();
  assert_eq!(nodes, vec![1, 1, 1]);
  assert_eq!(stats.levels[2].active_values, 1);
}

#[test]
fn test_ops_return_previous() {
  let tree = tree_442();
  let ijk = IVec3::new(7, 8, 9);

  assert_eq!(tree.set_value_world(ijk, 10.0), 0.0);
  assert_eq!(tree.add_value_world(ijk, 5.0), 10.0);
  assert_eq!(tree.sub_value_world(ijk, 3.0), 15.0);
  assert_eq!(tree.mul_value_world(ijk, 2.0), 12.0);
  assert_eq!(tree.div_value_world(ijk, 4.0), 24.0);
  assert_eq!(tree.max_value_world(ijk, 1.0), 6.0);
  assert_eq!(tree.min_value_world(ijk, 1.0), 6.0);
  assert_eq!(tree.read_value_world(ijk), 1.0);
}

/// Arithmetic on an untouched voxel starts from background.
#[test]
fn test_accumulate_from_background() {
  let tree = VdbTree::<i32, 3>::new(&VdbConfig::uniform([4, 4, 2]).with_background(100))
    .expect("Valid config");
  let ijk = IVec3::new(1, 2, 3);

  tree.add_value_world(ijk, 5);
  assert_eq!(tree.read_value_world(ijk), 105);
}

/// An inner-level write is hidden while the cell is subdivided.
#[test]
fn test_inner_write_hidden_by_child() {
  let tree = tree_442();
  let ijk = IVec3::new(20, 42, 1);

  tree.set_value_world(ijk, 1.0);
  assert_eq!(tree.modify_value_world(1, ijk, 5.0, VdbOp::Set), 0.0);
  assert_eq!(tree.read_value_and_level(ijk), (1.0, 2));
}

/// A tile written at an inner level covers its whole cell, and a later leaf
/// write inherits it for the untouched voxels.
#[test]
fn test_tile_inheritance() {
  let tree = tree_442();
  let ijk = IVec3::new(20, 42, 1);

  tree.modify_value_world(1, ijk, 9.0, VdbOp::Set);
  assert_eq!(tree.read_value_and_level(IVec3::new(23, 43, 3)), (9.0, 1));
  assert!(tree.is_value_active_world(IVec3::new(20, 40, 0)));
  assert!(!tree.is_child_active_world(1, ijk));

  tree.set_value_world(ijk, 1.0);
  assert_eq!(tree.read_value_and_level(ijk), (1.0, 2));
  assert_eq!(
    tree.read_value_and_level(IVec3::new(23, 43, 3)),
    (9.0, 2),
    "Untouched voxels keep the tile value"
  );
  assert!(tree.is_child_active_world(1, ijk));

  // Outside the tile
  assert_eq!(tree.read_value_world(IVec3::new(24, 42, 1)), 0.0);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_level_out_of_range_panics() {
  let tree = tree_442();
  tree.is_child_active_world(3, IVec3::ZERO);
}

#[test]
#[should_panic(expected = "out of range")]
fn test_write_past_leaf_panics() {
  let tree = tree_442();
  tree.modify_value_world(3, IVec3::ZERO, 1.0, VdbOp::Set);
}

#[test]
fn test_contains_world() {
  let tree = tree_442();

  assert!(tree.contains_world(IVec3::ZERO));
  assert!(tree.contains_world(IVec3::splat(1023)));
  assert!(!tree.contains_world(IVec3::new(-1, 0, 0)));
  assert!(!tree.contains_world(IVec3::new(0, 1024, 0)));
}

// =========================================================================
// Dense fill scenario
// =========================================================================

/// Fill `i * j * k` over [0, extent.xy) x [0, extent.z), then check the
/// filled slab and the untouched slab above it.
fn check_product_fill(extent: IVec3, read_depth: i32, cell_budget: u64) {
  let tree = VdbTree::<i32, 3>::new(
    &VdbConfig::uniform([4, 4, 2]).with_cell_budget_per_level(cell_budget),
  )
  .expect("Valid config");

  (0..extent.x).into_par_iter().for_each(|i| {
    for j in 0..extent.y {
      for k in 0..extent.z {
        tree.set_value_world(IVec3::new(i, j, k), i * j * k);
      }
    }
  });

  (0..extent.x).into_par_iter().for_each(|i| {
    for j in 0..extent.y {
      for k in 0..read_depth {
        let expected = if k < extent.z { i * j * k } else { 0 };
        assert_eq!(
          tree.read_value_world(IVec3::new(i, j, k)),
          expected,
          "Mismatch at ({}, {}, {})",
          i,
          j,
          k
        );
      }
    }
  });
}

#[test]
fn test_product_fill_scaled() {
  check_product_fill(IVec3::new(100, 100, 50), 100, 1 << 24);
}

/// Full-size fill: 5 * 10^8 voxels, about 2 GiB.
#[test]
#[ignore]
fn test_product_fill_full() {
  check_product_fill(IVec3::new(1000, 1000, 500), 1000, 1 << 30);
}

// =========================================================================
// Concurrency
// =========================================================================

/// Parallel lanes accumulating into the same voxels lose no updates.
#[test]
fn test_parallel_add() {
  let tree = tree_442();

  (0..10_000).into_par_iter().for_each(|i| {
    tree.add_value_world(IVec3::new(i % 10, 3, 700), 1.0);
  });

  for x in 0..10 {
    assert_eq!(tree.read_value_world(IVec3::new(x, 3, 700)), 1000.0);
  }
}

/// Racing writers into one fresh block publish a single node per level.
#[test]
fn test_parallel_materialisation_single_node() {
  let tree = tree_442();

  (0..6400).into_par_iter().for_each(|i| {
    let voxel = i % 64;
    let ijk = IVec3::new(voxel >> 4, (voxel >> 2) & 3, voxel & 3);
    tree.add_value_world(ijk + IVec3::splat(128), 1.0);
  });

  let stats = tree.stats();
  assert_eq!(stats.levels[1].nodes, 1);
  assert_eq!(stats.levels[2].nodes, 1);
  assert_eq!(stats.levels[2].active_values, 64);
  assert_eq!(tree.pool(2).live_nodes(), 1, "Losing racers released their nodes");
  assert_eq!(tree.read_value_world(IVec3::new(129, 130, 131)), 100.0);
}

#[test]
fn test_par_for_each_active_voxel() {
  let tree = tree_442();
  let written = [
    IVec3::new(0, 0, 0),
    IVec3::new(5, 6, 7),
    IVec3::new(300, 2, 900),
  ];
  for (n, &ijk) in written.iter().enumerate() {
    tree.set_value_world(ijk, n as f32 + 1.0);
  }

  let seen = Mutex::new(Vec::new());
  tree.par_for_each_active_voxel(|ijk, value| {
    seen.lock().expect("Poisoned").push((ijk.to_array(), value));
  });

  let mut seen = seen.into_inner().expect("Poisoned");
  seen.sort_by(|a, b| a.0.cmp(&b.0));
  assert_eq!(
    seen,
    vec![([0, 0, 0], 1.0), ([5, 6, 7], 2.0), ([300, 2, 900], 3.0)]
  );
}

// =========================================================================
// Maintenance
// =========================================================================

#[test]
fn test_clear_resets_to_background() {
  let mut tree = tree_442();
  for i in 0..50 {
    tree.set_value_world(IVec3::new(i * 20, i, 3), 1.0 + i as f32);
  }
  assert!(tree.stats().total_nodes() > 3);

  tree.clear();

  for i in 0..50 {
    assert_eq!(tree.read_value_and_level(IVec3::new(i * 20, i, 3)), (0.0, 0));
  }
  assert_eq!(tree.stats().total_nodes(), 1);

  // Usable again
  tree.set_value_world(IVec3::new(1, 1, 1), 4.0);
  assert_eq!(tree.read_value_world(IVec3::new(1, 1, 1)), 4.0);
}

#[test]
fn test_node_boxes() {
  let tree = tree_442();
  tree.set_value_world(IVec3::new(20, 42, 1), 1.0);

  let boxes = tree.node_boxes();
  assert_eq!(
    boxes,
    vec![
      NodeBox {
        level: 0,
        min: IVec3::ZERO,
        max: IVec3::splat(1024)
      },
      NodeBox {
        level: 1,
        min: IVec3::ZERO,
        max: IVec3::splat(64)
      },
      NodeBox {
        level: 2,
        min: IVec3::new(20, 40, 0),
        max: IVec3::new(24, 44, 4)
      },
    ]
  );
}

// =========================================================================
// Properties
// =========================================================================

proptest! {
  /// Any in-range voxel reads back what was written to it.
  #[test]
  fn prop_write_read_roundtrip(
    x in 0i32..1024,
    y in 0i32..1024,
    z in 0i32..1024,
    value in -1.0e6f32..1.0e6,
  ) {
    let tree = tree_442();
    let ijk = IVec3::new(x, y, z);

    tree.set_value_world(ijk, value);
    prop_assert_eq!(tree.read_value_and_level(ijk), (value, 2));
    prop_assert!(tree.is_child_active_world(2, ijk));
  }

  /// Repeating a write leaves the tree exactly as a single write does.
  #[test]
  fn prop_overwrite_is_idempotent(
    x in 0i32..1024,
    y in 0i32..1024,
    z in 0i32..1024,
    value in -1.0e6f32..1.0e6,
    repeats in 2usize..16,
  ) {
    let ijk = IVec3::new(x, y, z);
    let once = tree_442();
    once.set_value_world(ijk, value);

    let many = tree_442();
    for _ in 0..repeats {
      many.set_value_world(ijk, value);
    }

    prop_assert_eq!(many.read_value_and_level(ijk), once.read_value_and_level(ijk));
    prop_assert_eq!(many.stats(), once.stats());
    prop_assert_eq!(many.node_boxes(), once.node_boxes());
  }

  /// Local cells of every level recompose into the world voxel.
  #[test]
  fn prop_rescale_recomposes(x in 0i32..1024, y in 0i32..1024, z in 0i32..1024) {
    let tree = tree_442();
    let ijk = IVec3::new(x, y, z);

    let mut origin = IVec3::ZERO;
    for level in 0..3 {
      let local = tree.rescale_index_from_world_voxel(level, ijk);
      origin = tree.level_config(level).cell_origin(origin, local);
    }
    prop_assert_eq!(origin, ijk);
  }
}
