use std::cmp::Ordering;
use std::mem;

use slotmap::{Key, SlotMap};
use tap::Tap;

use crate::primitive::{
    default_compare, encapsulation_check, equals_check, inclusion_check, AxisIndex, Bounds,
    Compare, Number,
};
use crate::tree::{
    adjust_ancestor_counts, create_child, merge_up, unlink_known, Branch, Bucket,
    DivisionStrategy, Error, ItemIndex, ItemSlot, Leaf, LoadState, Node, NodeIndex, StepStatus,
    MAX_DIMENSIONS,
};

/* ---------------------------------------------------------------------------------------------- */
/*                                         OMNITREE POINTS                                        */
/* ---------------------------------------------------------------------------------------------- */

/// A spatial index over items located at a single `D`-dimensional coordinate.
///
/// The tree owns its items; their coordinates are computed once per mutation
/// by the `locate` function supplied at construction. Items located at the
/// same coordinates may coexist. The dimension count is fixed at compile time
/// through the `D` parameter; per-axis orderings and subdivision strategies
/// can be overridden axis by axis after construction.
pub struct OmnitreePoints<I, T: Number, L, const D: usize> {
    nodes: SlotMap<NodeIndex, Node<T, D>>,
    items: SlotMap<ItemIndex, ItemSlot<I, [T; D]>>,
    root: NodeIndex,
    count: usize,
    load: LoadState,
    locate: L,
    compare: [Compare<T>; D],
    divide: [DivisionStrategy<T>; D],
}

impl<I, T, L, const D: usize> OmnitreePoints<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> [T; D],
{
    pub fn new(locate: L) -> Self {
        Self::with_capacity(locate, 0)
    }

    pub fn with_capacity(locate: L, capacity: usize) -> Self {
        assert!(D >= 1, "an omnitree needs at least one axis");
        assert!(
            D <= MAX_DIMENSIONS,
            "child tables are bit-packed; at most {MAX_DIMENSIONS} axes are supported"
        );

        let mut nodes = SlotMap::with_capacity_and_key(capacity);
        let root = nodes.insert(Node::Leaf(Leaf {
            region: Bounds::none(),
            parent: NodeIndex::null(),
            bucket: Bucket::new(),
        }));

        Self {
            nodes,
            items: SlotMap::with_capacity_and_key(capacity),
            root,
            count: 0,
            load: LoadState::new(),
            locate,
            compare: [default_compare::<T> as Compare<T>; D],
            divide: [DivisionStrategy::Median; D],
        }
    }

    /// Overrides the ordering used on one axis.
    pub fn compare_on(self, axis: AxisIndex, compare: Compare<T>) -> Self {
        self.tap_mut(|tree| tree.compare[axis] = compare)
    }

    /// Overrides the subdivision-point strategy used on one axis.
    pub fn divide_on(self, axis: AxisIndex, strategy: DivisionStrategy<T>) -> Self {
        self.tap_mut(|tree| tree.divide[axis] = strategy)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub const fn dimensions(&self) -> usize {
        D
    }

    /// Visits every stored item in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &I> {
        self.items.values().map(|slot| &slot.value)
    }

    /// Drops every item and resets the tree to a single unbounded leaf, as if
    /// freshly constructed.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.items.clear();
        self.root = self.nodes.insert(Node::Leaf(Leaf {
            region: Bounds::none(),
            parent: NodeIndex::null(),
            bucket: Bucket::new(),
        }));
        self.count = 0;
        self.load = LoadState::new();
    }
}

/* ------------------------------------------ Mutation ------------------------------------------ */

impl<I, T, L, const D: usize> OmnitreePoints<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> [T; D],
{
    /// Stores `item` at the coordinates its locate function reports, and
    /// subdivides the receiving leaf if it overflowed the current load.
    pub fn add(&mut self, item: I) {
        let at = (self.locate)(&item);
        let index = self.items.insert(ItemSlot {
            value: item,
            placement: at,
            next: ItemIndex::null(),
        });

        let leaf = self.descend_create(&at);

        self.nodes[leaf]
            .as_leaf_mut()
            .unwrap()
            .bucket
            .push(&mut self.items, index);
        adjust_ancestor_counts(&mut self.nodes, leaf, true);

        self.count += 1;
        self.load.update(self.count);

        self.maybe_subdivide(leaf);
    }

    /// Removes one item structurally equal to `item`: located at the same
    /// coordinates under the per-axis comparers and equal by value. Returns
    /// the removed item, or [`Error::NotFound`].
    pub fn remove(&mut self, item: &I) -> Result<I, Error>
    where
        I: PartialEq,
    {
        let at = (self.locate)(item);
        let leaf = self.descend_find(&at).ok_or(Error::NotFound)?;

        let mut prev = ItemIndex::null();
        let mut cursor = self.nodes[leaf].as_leaf().unwrap().bucket.head;
        let target = loop {
            if cursor.is_null() {
                return Err(Error::NotFound);
            }

            let slot = &self.items[cursor];
            if equals_check(&slot.placement, &at, &self.compare) && slot.value == *item {
                break cursor;
            }

            prev = cursor;
            cursor = slot.next;
        };

        self.nodes[leaf]
            .as_leaf_mut()
            .unwrap()
            .bucket
            .unlink(&mut self.items, prev, target);
        adjust_ancestor_counts(&mut self.nodes, leaf, false);

        self.count -= 1;
        self.load.update(self.count);

        let parent = self.nodes[leaf].parent();
        merge_up(
            &mut self.nodes,
            &mut self.items,
            parent,
            self.load.merge_threshold(),
        );

        Ok(self.items.remove(target).unwrap().value)
    }

    /// Like [`remove`](Self::remove), but reports not-found as `false`
    /// instead of an error.
    pub fn try_remove(&mut self, item: &I) -> bool
    where
        I: PartialEq,
    {
        self.remove(item).is_ok()
    }

    /// Re-runs the locate function over every stored item and re-places the
    /// ones whose coordinates changed. Call after mutating item state that
    /// feeds into `locate`; the item set and count are unaffected.
    pub fn update(&mut self) {
        let moved: Vec<(ItemIndex, [T; D])> = self
            .items
            .iter()
            .filter_map(|(index, slot)| {
                let at = (self.locate)(&slot.value);
                (!equals_check(&at, &slot.placement, &self.compare)).then_some((index, at))
            })
            .collect();

        for (index, at) in moved {
            let old = self.items[index].placement;
            let from = self
                .descend_find(&old)
                .expect("stored placement must resolve to a leaf");

            unlink_known(&mut self.nodes, &mut self.items, from, index);
            adjust_ancestor_counts(&mut self.nodes, from, false);

            self.items[index].placement = at;

            let to = self.descend_create(&at);
            self.nodes[to]
                .as_leaf_mut()
                .unwrap()
                .bucket
                .push(&mut self.items, index);
            adjust_ancestor_counts(&mut self.nodes, to, true);

            self.maybe_subdivide(to);

            let parent = self.nodes[from].parent();
            merge_up(
                &mut self.nodes,
                &mut self.items,
                parent,
                self.load.merge_threshold(),
            );
        }
    }
}

/* ------------------------------------------ Queries ------------------------------------------- */

impl<I, T, L, const D: usize> OmnitreePoints<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> [T; D],
{
    /// Visits every stored item. The visitor's return value converts into a
    /// [`StepStatus`]: return `()` to always continue, or `bool` where
    /// `false` breaks out of the traversal early.
    pub fn stepper<R: Into<StepStatus>>(&self, mut visit: impl FnMut(&I) -> R) -> StepStatus {
        self.visit_all(self.root, &mut |value| visit(value).into())
    }

    /// Visits every item whose coordinates fall inside `range` on all axes.
    /// Children whose regions miss the range are pruned; leaves fully inside
    /// the range are visited without per-item checks.
    pub fn stepper_range<R: Into<StepStatus>>(
        &self,
        range: &Bounds<T, D>,
        mut visit: impl FnMut(&I) -> R,
    ) -> StepStatus {
        self.visit_range(self.root, range, &mut |value| visit(value).into())
    }

    /// Counts the items inside `range`, consuming whole subtree counts
    /// wherever the range encapsulates a node's region.
    pub fn count_sub_space(&self, range: &Bounds<T, D>) -> usize {
        self.count_range(self.root, range)
    }

    fn visit_all<F>(&self, node: NodeIndex, visit: &mut F) -> StepStatus
    where
        F: FnMut(&I) -> StepStatus,
    {
        match &self.nodes[node] {
            Node::Branch(branch) => {
                // The point tree never pins items at branch level, so the
                // children are the whole story.
                for &child in &branch.children {
                    if child.is_null() {
                        continue;
                    }
                    if self.visit_all(child, visit) == StepStatus::Break {
                        return StepStatus::Break;
                    }
                }
            }
            Node::Leaf(leaf) => {
                let mut cursor = leaf.bucket.head;
                while !cursor.is_null() {
                    let slot = &self.items[cursor];
                    if visit(&slot.value) == StepStatus::Break {
                        return StepStatus::Break;
                    }
                    cursor = slot.next;
                }
            }
        }

        StepStatus::Continue
    }

    fn visit_range<F>(&self, node: NodeIndex, range: &Bounds<T, D>, visit: &mut F) -> StepStatus
    where
        F: FnMut(&I) -> StepStatus,
    {
        match &self.nodes[node] {
            Node::Branch(branch) => {
                for &child in &branch.children {
                    if child.is_null() {
                        continue;
                    }
                    if !inclusion_check(self.nodes[child].region(), range, &self.compare) {
                        continue;
                    }
                    if self.visit_range(child, range, visit) == StepStatus::Break {
                        return StepStatus::Break;
                    }
                }
            }
            Node::Leaf(leaf) => {
                let whole = encapsulation_check(&leaf.region, range, &self.compare);

                let mut cursor = leaf.bucket.head;
                while !cursor.is_null() {
                    let slot = &self.items[cursor];
                    if whole || range.contains(&slot.placement, &self.compare) {
                        if visit(&slot.value) == StepStatus::Break {
                            return StepStatus::Break;
                        }
                    }
                    cursor = slot.next;
                }
            }
        }

        StepStatus::Continue
    }

    fn count_range(&self, node: NodeIndex, range: &Bounds<T, D>) -> usize {
        let current = &self.nodes[node];

        if encapsulation_check(current.region(), range, &self.compare) {
            return current.count();
        }

        match current {
            Node::Branch(branch) => branch
                .children
                .iter()
                .filter(|child| !child.is_null())
                .filter(|&&child| {
                    inclusion_check(self.nodes[child].region(), range, &self.compare)
                })
                .map(|&child| self.count_range(child, range))
                .sum(),
            Node::Leaf(leaf) => {
                let mut total = 0;
                let mut cursor = leaf.bucket.head;
                while !cursor.is_null() {
                    let slot = &self.items[cursor];
                    if range.contains(&slot.placement, &self.compare) {
                        total += 1;
                    }
                    cursor = slot.next;
                }
                total
            }
        }
    }
}

/* -------------------------------------- Tree maintenance -------------------------------------- */

impl<I, T, L, const D: usize> OmnitreePoints<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> [T; D],
{
    /// Walks to the unique leaf covering `at`, materializing missing children
    /// along the way.
    fn descend_create(&mut self, at: &[T; D]) -> NodeIndex {
        let mut node = self.root;

        loop {
            let step = match &self.nodes[node] {
                Node::Branch(branch) => {
                    let index = child_index(at, &branch.division, &self.compare);
                    Some((index, branch.children[index]))
                }
                Node::Leaf(_) => None,
            };

            match step {
                Some((index, child)) if child.is_null() => {
                    node = create_child(&mut self.nodes, node, index);
                }
                Some((_, child)) => node = child,
                None => return node,
            }
        }
    }

    /// Walks to the leaf that would hold `at`, or `None` when the matching
    /// child was never created.
    fn descend_find(&self, at: &[T; D]) -> Option<NodeIndex> {
        let mut node = self.root;

        loop {
            match &self.nodes[node] {
                Node::Branch(branch) => {
                    let child = branch.children[child_index(at, &branch.division, &self.compare)];
                    if child.is_null() {
                        return None;
                    }
                    node = child;
                }
                Node::Leaf(_) => return Some(node),
            }
        }
    }

    /// Turns an over-full leaf into a branch and redistributes its chain into
    /// fresh child leaves. One level per trigger; an over-full child splits
    /// on the next add that reaches it.
    fn maybe_subdivide(&mut self, node: NodeIndex) {
        let leaf = self.nodes[node].as_leaf().unwrap();
        if leaf.bucket.len <= self.load.load {
            return;
        }

        // Per-axis coordinate samples feed the division strategies.
        let mut samples: [Vec<T>; D] = std::array::from_fn(|_| Vec::with_capacity(leaf.bucket.len));
        let mut cursor = leaf.bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            for axis in 0..D {
                samples[axis].push(slot.placement[axis]);
            }
            cursor = slot.next;
        }

        let division: [T; D] =
            std::array::from_fn(|axis| self.divide[axis].divide(&mut samples[axis], self.compare[axis]));

        // If every item would land in the same child the division separates
        // nothing (all items coincide, or the strategy collapsed); leave the
        // leaf over-full rather than stacking useless levels.
        let mut first: Option<usize> = None;
        let mut separates = false;
        let mut cursor = self.nodes[node].as_leaf().unwrap().bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            let index = child_index(&slot.placement, &division, &self.compare);
            if *first.get_or_insert(index) != index {
                separates = true;
                break;
            }
            cursor = slot.next;
        }
        if !separates {
            return;
        }

        let (region, parent, bucket) = {
            let leaf = self.nodes[node].as_leaf_mut().unwrap();
            (
                leaf.region,
                leaf.parent,
                mem::replace(&mut leaf.bucket, Bucket::new()),
            )
        };
        self.nodes[node] = Node::Branch(Branch {
            region,
            parent,
            count: bucket.len,
            division,
            children: vec![NodeIndex::null(); 1 << D],
            bucket: Bucket::new(),
        });

        let mut cursor = bucket.head;
        while !cursor.is_null() {
            let next = self.items[cursor].next;
            let index = child_index(&self.items[cursor].placement, &division, &self.compare);

            let existing = self.nodes[node].as_branch().unwrap().children[index];
            let child = if existing.is_null() {
                create_child(&mut self.nodes, node, index)
            } else {
                existing
            };
            self.nodes[child]
                .as_leaf_mut()
                .unwrap()
                .bucket
                .push(&mut self.items, cursor);

            cursor = next;
        }
    }
}

/// Bit-packed child index for a point: bit `axis` set when the coordinate
/// sits at or above the division point on that axis. Routing coordinates
/// exactly on the division point to the high side keeps boundary placement
/// consistent between add, remove, and redistribution.
fn child_index<T, const D: usize>(
    point: &[T; D],
    division: &[T; D],
    compare: &[Compare<T>; D],
) -> usize {
    let mut index = 0;
    for axis in 0..D {
        if compare[axis](&point[axis], &division[axis]) != Ordering::Less {
            index |= 1 << axis;
        }
    }
    index
}

/* ----------------------------------------- Validation ----------------------------------------- */

impl<I, T, L, const D: usize> OmnitreePoints<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> [T; D],
{
    /// Deep structural validation for tests and debugging: parent links,
    /// cached counts, chain integrity, and item containment are all checked.
    pub fn __debug_verify_tree_state(&self) -> Result<(), String> {
        let reachable = self.verify_node(self.root, NodeIndex::null())?;

        if reachable != self.count {
            return Err(format!(
                "cached count is {} but {} items are reachable",
                self.count, reachable
            ));
        }
        if self.items.len() != self.count {
            return Err(format!(
                "item arena holds {} slots but cached count is {}",
                self.items.len(),
                self.count
            ));
        }

        Ok(())
    }

    fn verify_node(&self, node: NodeIndex, parent: NodeIndex) -> Result<usize, String> {
        if self.nodes[node].parent() != parent {
            return Err(format!("node {node:?} has a stale parent link"));
        }

        match &self.nodes[node] {
            Node::Branch(branch) => {
                if branch.bucket.len != 0 {
                    return Err(format!("point tree branch {node:?} has a non-empty bucket"));
                }

                let mut total = 0;
                for (index, &child) in branch.children.iter().enumerate() {
                    if child.is_null() {
                        continue;
                    }

                    let expected = branch.region.child(&branch.division, index);
                    if *self.nodes[child].region() != expected {
                        return Err(format!(
                            "child {index} of branch {node:?} has a mismatched region"
                        ));
                    }

                    total += self.verify_node(child, node)?;
                }

                if total != branch.count {
                    return Err(format!(
                        "branch {node:?} caches count {} but its children hold {total}",
                        branch.count
                    ));
                }

                Ok(total)
            }
            Node::Leaf(leaf) => {
                let mut seen = 0;
                let mut last = ItemIndex::null();
                let mut cursor = leaf.bucket.head;

                while !cursor.is_null() {
                    let slot = &self.items[cursor];
                    if !leaf.region.contains(&slot.placement, &self.compare) {
                        return Err(format!(
                            "leaf {node:?} holds an item outside its region"
                        ));
                    }

                    seen += 1;
                    last = cursor;
                    cursor = slot.next;
                }

                if seen != leaf.bucket.len {
                    return Err(format!(
                        "leaf {node:?} chain holds {seen} items but caches {}",
                        leaf.bucket.len
                    ));
                }
                if last != leaf.bucket.tail {
                    return Err(format!("leaf {node:?} has a stale tail link"));
                }

                Ok(seen)
            }
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                              TESTS                                             */
/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod __test;
