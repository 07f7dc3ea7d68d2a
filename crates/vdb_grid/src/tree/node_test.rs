use super::*;
use crate::tree::config::VdbConfig;
use crate::tree::pool::LevelPool;

/// Two-level pools: root blocks of 4^3 cells over leaf blocks of 2^3 voxels.
fn pools() -> (LevelPool<f32>, LevelPool<f32>) {
  let levels = VdbConfig::<f32, 2>::uniform([2, 1])
    .build_levels()
    .expect("Valid config");
  let root_cum = levels[0].cumulative_log2;
  (
    LevelPool::new(0, levels[0], true, root_cum, 1 << 16),
    LevelPool::new(1, levels[1], false, root_cum, 1 << 16),
  )
}

// =========================================================================
// Values and activation
// =========================================================================

/// A fresh node reads its fill value everywhere and has nothing active.
#[test]
fn test_fresh_node_reads_fill() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(-1.0, false));

  assert_eq!(node.len(), 8);
  assert!(node.is_leaf());
  for offset in 0..node.len() {
    assert_eq!(node.read(offset), -1.0);
    assert!(!node.is_value_active(offset));
  }
  assert_eq!(node.active_value_count(), 0);
}

/// Writes return the previous value and set the activation bit.
#[test]
fn test_write_local_marks_active() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(0.0, false));
  let local = UVec3::new(1, 0, 1);

  assert_eq!(node.write_local(local, 2.5, VdbOp::Set), 0.0);
  assert_eq!(node.write_local(local, 1.0, VdbOp::Add), 2.5);
  assert_eq!(node.read_local(local), 3.5);

  let offset = node.config().flatten(local);
  assert!(node.is_value_active(offset));
  assert_eq!(node.active_value_count(), 1);

  node.clear_value_active(offset);
  assert!(!node.is_value_active(offset));
  assert_eq!(node.read_local(local), 3.5, "Clearing the bit keeps the value");
}

/// Filling as active only sets bits for cells that exist.
#[test]
fn test_active_fill_small_block() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(4.0, true));

  assert_eq!(node.active_value_count(), 8, "8-cell block has exactly 8 bits");
}

#[test]
fn test_uniform_value() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(1.0, false));

  assert_eq!(node.uniform_value(0.0), Some(1.0));

  node.write(3, 1.05, VdbOp::Set);
  assert_eq!(node.uniform_value(0.0), None, "Exact comparison at zero tolerance");
  assert_eq!(node.uniform_value(0.1), Some(1.0), "Within tolerance");
}

/// The tolerance bounds the spread of the whole block, not the distance to
/// the representative.
#[test]
fn test_uniform_value_spread() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(1.0, false));
  node.write(1, 1.09, VdbOp::Set);
  node.write(2, 0.91, VdbOp::Set);

  assert_eq!(node.uniform_value(0.1), None, "Spread of 0.18");
  assert_eq!(node.uniform_value(0.2), Some(1.0));

  node.write(4, f32::NAN, VdbOp::Set);
  assert_eq!(node.uniform_value(10.0), None);
}

// =========================================================================
// Child links
// =========================================================================

#[test]
fn test_child_links() {
  let (roots, leaves) = pools();
  let root = roots.node(roots.allocate(0.0, false));
  let leaf = leaves.allocate(0.0, false);

  assert!(!root.is_leaf());
  assert!(!root.has_active_children());
  assert_eq!(root.child(5), None);

  root.child_slot(5).store(leaf, Ordering::Release);
  assert_eq!(root.child(5), Some(leaf));
  assert!(root.is_child_active_local(root.config().unflatten(5)));
  assert_eq!(root.active_child_count(), 1);
  assert_eq!(root.children().collect::<Vec<_>>(), vec![(5, leaf)]);
}

/// Leaf nodes never report children.
#[test]
fn test_leaf_has_no_children() {
  let (_, leaves) = pools();
  let node = leaves.node(leaves.allocate(0.0, true));

  assert_eq!(node.child(0), None);
  assert!(!node.has_active_children());
  assert_eq!(node.children().count(), 0);
}

/// Deactivating with a representative leaves an active tile.
#[test]
fn test_deactivate_with_representative() {
  let (roots, leaves) = pools();
  let root = roots.node(roots.allocate(0.0, false));
  let leaf = leaves.allocate(7.0, true);
  root.child_slot(9).store(leaf, Ordering::Release);

  let detached = root.deactivate(9, Some(7.0), 0.0);

  assert_eq!(detached, Some(leaf));
  assert_eq!(root.child(9), None);
  assert_eq!(root.read(9), 7.0);
  assert!(root.is_value_active(9), "Tile holds an explicit value");
}

/// Deactivating without a representative restores background.
#[test]
fn test_deactivate_to_background() {
  let (roots, leaves) = pools();
  let root = roots.node(roots.allocate(0.0, false));
  let leaf = leaves.allocate(0.0, false);
  let local = UVec3::new(3, 2, 1);
  root.write_local(local, 4.0, VdbOp::Set);
  root
    .child_slot(root.config().flatten(local))
    .store(leaf, Ordering::Release);

  assert_eq!(root.deactivate_local(local, None, -1.0), Some(leaf));
  assert_eq!(root.read_local(local), -1.0);
  assert!(!root.is_value_active(root.config().flatten(local)));

  // Nothing left to detach
  assert_eq!(root.deactivate_local(local, None, -1.0), None);
}
