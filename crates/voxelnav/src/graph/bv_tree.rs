//! A bounding volume tree over node bounds.
//!
//! Nodes live in an arena, freed slots are recycled. The tree is bulk built with median splits
//! after a full scan and updated leaf by leaf afterwards.

use std::{cmp::Ordering, collections::BinaryHeap};

use glam::Vec3A;

use crate::Aabb3d;

/// Handle to a leaf of a [`BvTree`], stable until the leaf is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BvLeaf(usize);

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
struct BvNode<T> {
    aabb: Aabb3d,
    parent: Option<usize>,
    kind: BvKind<T>,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
enum BvKind<T> {
    Leaf(T),
    Branch([usize; 2]),
    Free,
}

/// An axis aligned bounding box tree storing one item per leaf.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct BvTree<T> {
    nodes: Vec<BvNode<T>>,
    free: Vec<usize>,
    root: Option<usize>,
    len: usize,
}

impl<T> Default for BvTree<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: None,
            len: 0,
        }
    }
}

impl<T> BvTree<T> {
    /// Builds a balanced tree, splitting at the median centroid along the longest axis.
    /// The returned leaves are in the order of `items`.
    pub fn build(items: impl IntoIterator<Item = (T, Aabb3d)>) -> (Self, Vec<BvLeaf>) {
        let mut tree = Self::default();
        let mut leaves: Vec<usize> = items
            .into_iter()
            .map(|(item, aabb)| {
                tree.alloc(BvNode {
                    aabb,
                    parent: None,
                    kind: BvKind::Leaf(item),
                })
            })
            .collect();
        tree.len = leaves.len();
        let handles = leaves.iter().copied().map(BvLeaf).collect();
        if !leaves.is_empty() {
            tree.root = Some(tree.build_recursive(&mut leaves));
        }
        (tree, handles)
    }

    fn build_recursive(&mut self, leaves: &mut [usize]) -> usize {
        if let [leaf] = leaves {
            return *leaf;
        }
        let mut centroids = Aabb3d {
            min: Vec3A::INFINITY,
            max: Vec3A::NEG_INFINITY,
        };
        for &leaf in leaves.iter() {
            centroids.expand_to_include(self.nodes[leaf].aabb.center());
        }
        let size = centroids.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.z >= size.y {
            2
        } else {
            1
        };

        let mid = leaves.len() / 2;
        leaves.select_nth_unstable_by(mid, |a, b| {
            let a = self.nodes[*a].aabb.center()[axis];
            let b = self.nodes[*b].aabb.center()[axis];
            a.total_cmp(&b)
        });
        let (left, right) = leaves.split_at_mut(mid);
        let left = self.build_recursive(left);
        let right = self.build_recursive(right);
        self.branch(left, right, None)
    }

    fn alloc(&mut self, node: BvNode<T>) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) -> BvKind<T> {
        self.free.push(index);
        self.nodes[index].parent = None;
        std::mem::replace(&mut self.nodes[index].kind, BvKind::Free)
    }

    fn branch(&mut self, left: usize, right: usize, parent: Option<usize>) -> usize {
        let aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
        let index = self.alloc(BvNode {
            aabb,
            parent,
            kind: BvKind::Branch([left, right]),
        });
        self.nodes[left].parent = Some(index);
        self.nodes[right].parent = Some(index);
        index
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: usize) {
        match parent {
            Some(parent) => {
                if let BvKind::Branch(children) = &mut self.nodes[parent].kind {
                    for child in children.iter_mut().filter(|child| **child == old) {
                        *child = new;
                    }
                }
            }
            None => self.root = Some(new),
        }
    }

    fn refit(&mut self, mut index: Option<usize>) {
        while let Some(i) = index {
            if let BvKind::Branch([left, right]) = self.nodes[i].kind {
                self.nodes[i].aabb = self.nodes[left].aabb.union(&self.nodes[right].aabb);
            }
            index = self.nodes[i].parent;
        }
    }

    /// Inserts an item, descending towards the child whose bounds grow the least.
    pub fn insert(&mut self, item: T, aabb: Aabb3d) -> BvLeaf {
        let leaf = self.alloc(BvNode {
            aabb,
            parent: None,
            kind: BvKind::Leaf(item),
        });
        self.len += 1;
        let Some(root) = self.root else {
            self.root = Some(leaf);
            return BvLeaf(leaf);
        };

        let mut sibling = root;
        while let BvKind::Branch([left, right]) = self.nodes[sibling].kind {
            let growth = |child: usize| {
                let bounds = &self.nodes[child].aabb;
                bounds.union(&aabb).half_area() - bounds.half_area()
            };
            sibling = if growth(left) <= growth(right) {
                left
            } else {
                right
            };
        }

        let parent = self.nodes[sibling].parent;
        let branch = self.branch(sibling, leaf, parent);
        self.replace_child(parent, sibling, branch);
        self.refit(parent);
        BvLeaf(leaf)
    }

    /// Removes a leaf and returns its item. `None` if the handle is stale.
    pub fn remove(&mut self, leaf: BvLeaf) -> Option<T> {
        let index = leaf.0;
        if !matches!(self.nodes.get(index)?.kind, BvKind::Leaf(_)) {
            return None;
        }
        let parent = self.nodes[index].parent;
        let BvKind::Leaf(item) = self.release(index) else {
            return None;
        };
        self.len -= 1;

        let Some(parent) = parent else {
            self.root = None;
            return Some(item);
        };
        let BvKind::Branch([left, right]) = self.nodes[parent].kind else {
            return Some(item);
        };
        let sibling = if left == index { right } else { left };
        let grandparent = self.nodes[parent].parent;
        self.release(parent);
        self.nodes[sibling].parent = grandparent;
        self.replace_child(grandparent, parent, sibling);
        self.refit(grandparent);
        Some(item)
    }

    /// The number of items in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The bounds of the whole tree.
    pub fn bounds(&self) -> Option<Aabb3d> {
        self.root.map(|root| self.nodes[root].aabb)
    }

    /// Calls `visit` for every item whose bounds pass `overlaps`, pruning subtrees that don't.
    pub fn query(&self, overlaps: impl Fn(&Aabb3d) -> bool, mut visit: impl FnMut(&T)) {
        let mut stack: Vec<usize> = self.root.into_iter().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !overlaps(&node.aabb) {
                continue;
            }
            match &node.kind {
                BvKind::Leaf(item) => visit(item),
                BvKind::Branch([left, right]) => {
                    stack.push(*right);
                    stack.push(*left);
                }
                BvKind::Free => {}
            }
        }
    }

    /// Calls `visit` for every item whose bounds intersect `aabb`.
    pub fn query_aabb(&self, aabb: &Aabb3d, visit: impl FnMut(&T)) {
        self.query(|bounds| bounds.intersects(aabb), visit);
    }

    /// Calls `visit` for every item whose bounds contain `point` on the xz-plane.
    pub fn query_point_xz(&self, point: Vec3A, visit: impl FnMut(&T)) {
        self.query(|bounds| bounds.contains_xz(point), visit);
    }

    /// Best-first search for the item closest to `point`.
    ///
    /// `distance_squared` computes the exact squared distance to an item, or `None` to skip it.
    /// Subtrees whose bounds are farther away than the best item so far are never visited.
    pub fn nearest(
        &self,
        point: Vec3A,
        mut distance_squared: impl FnMut(&T) -> Option<f32>,
    ) -> Option<(&T, f32)> {
        let mut best: Option<(&T, f32)> = None;
        let mut queue = BinaryHeap::new();
        if let Some(root) = self.root {
            queue.push(Candidate {
                distance_squared: self.nodes[root].aabb.distance_squared_to_point(point),
                index: root,
            });
        }
        while let Some(candidate) = queue.pop() {
            if best.is_some_and(|(_, best)| candidate.distance_squared > best) {
                break;
            }
            match &self.nodes[candidate.index].kind {
                BvKind::Leaf(item) => {
                    let Some(distance) = distance_squared(item) else {
                        continue;
                    };
                    if best.is_none_or(|(_, best)| distance < best) {
                        best = Some((item, distance));
                    }
                }
                BvKind::Branch(children) => {
                    for &child in children {
                        queue.push(Candidate {
                            distance_squared: self.nodes[child]
                                .aabb
                                .distance_squared_to_point(point),
                            index: child,
                        });
                    }
                }
                BvKind::Free => {}
            }
        }
        best
    }
}

/// Min-heap entry for [`BvTree::nearest`].
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance_squared: f32,
    index: usize,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .distance_squared
            .total_cmp(&self.distance_squared)
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: f32, z: f32) -> Aabb3d {
        Aabb3d {
            min: Vec3A::new(x, 0.0, z),
            max: Vec3A::new(x + 1.0, 0.5, z + 1.0),
        }
    }

    fn grid(size: u32) -> Vec<(u32, Aabb3d)> {
        (0..size * size)
            .map(|i| (i, unit_box((i % size) as f32 * 2.0, (i / size) as f32 * 2.0)))
            .collect()
    }

    fn collect(tree: &BvTree<u32>, aabb: &Aabb3d) -> Vec<u32> {
        let mut found = Vec::new();
        tree.query_aabb(aabb, |item| found.push(*item));
        found.sort_unstable();
        found
    }

    #[test]
    fn box_query_matches_brute_force() {
        let items = grid(10);
        let (tree, leaves) = BvTree::build(items.clone());
        assert_eq!(tree.len(), 100);
        assert_eq!(leaves.len(), 100);

        let query = Aabb3d {
            min: Vec3A::new(3.5, -1.0, 3.5),
            max: Vec3A::new(8.5, 1.0, 6.5),
        };
        let expected: Vec<u32> = items
            .iter()
            .filter(|(_, aabb)| aabb.intersects(&query))
            .map(|(item, _)| *item)
            .collect();
        assert!(!expected.is_empty());
        assert_eq!(collect(&tree, &query), expected);
    }

    #[test]
    fn nearest_matches_brute_force() {
        let items = grid(8);
        let (tree, _) = BvTree::build(items.clone());
        for point in [
            Vec3A::new(-3.0, 0.0, -3.0),
            Vec3A::new(7.3, 4.0, 2.2),
            Vec3A::new(20.0, 0.0, 9.0),
        ] {
            let (nearest, distance) = tree
                .nearest(point, |item| Some(items[*item as usize].1.distance_squared_to_point(point)))
                .unwrap();
            let brute = items
                .iter()
                .map(|(_, aabb)| aabb.distance_squared_to_point(point))
                .fold(f32::INFINITY, f32::min);
            assert_eq!(distance, brute);
            assert_eq!(items[*nearest as usize].1.distance_squared_to_point(point), brute);
        }
    }

    #[test]
    fn nearest_skips_filtered_items() {
        let items = grid(4);
        let (tree, _) = BvTree::build(items.clone());
        let point = Vec3A::new(0.5, 0.0, 0.5);
        let (nearest, _) = tree
            .nearest(point, |item| {
                (*item != 0).then(|| items[*item as usize].1.distance_squared_to_point(point))
            })
            .unwrap();
        assert_ne!(*nearest, 0);
    }

    #[test]
    fn incremental_updates_keep_queries_consistent() {
        let items = grid(6);
        let (mut tree, leaves) = BvTree::build(items.clone());

        // Remove every other item, then insert replacements far away.
        for (i, leaf) in leaves.iter().enumerate().filter(|(i, _)| i % 2 == 0) {
            assert_eq!(tree.remove(*leaf), Some(i as u32));
        }
        assert_eq!(tree.len(), 18);
        assert_eq!(tree.remove(leaves[0]), None);

        for i in 0..5 {
            tree.insert(100 + i, unit_box(100.0 + i as f32, 100.0));
        }
        assert_eq!(tree.len(), 23);

        let everything = Aabb3d {
            min: Vec3A::splat(-1000.0),
            max: Vec3A::splat(1000.0),
        };
        let found = collect(&tree, &everything);
        let mut expected: Vec<u32> = (0..36).filter(|i| i % 2 == 1).collect();
        expected.extend(100..105);
        assert_eq!(found, expected);

        let far = Aabb3d {
            min: Vec3A::new(99.0, -1.0, 99.0),
            max: Vec3A::new(200.0, 1.0, 200.0),
        };
        assert_eq!(collect(&tree, &far), (100..105).collect::<Vec<_>>());
        let bounds = tree.bounds().unwrap();
        assert_eq!(bounds.max, Vec3A::new(105.0, 0.5, 101.0));
    }

    #[test]
    fn removing_the_last_item_empties_the_tree() {
        let mut tree = BvTree::default();
        let leaf = tree.insert(7_u32, unit_box(0.0, 0.0));
        assert_eq!(tree.remove(leaf), Some(7));
        assert!(tree.is_empty());
        assert!(tree.bounds().is_none());
        let reused = tree.insert(8, unit_box(1.0, 1.0));
        assert_eq!(collect(&tree, &unit_box(1.0, 1.0)), vec![8]);
        assert_eq!(tree.remove(reused), Some(8));
    }
}
