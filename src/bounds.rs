use std::cmp::Ordering;
use std::mem;

use slotmap::{Key, SlotMap};
use tap::Tap;

use crate::primitive::{
    default_compare, encapsulation_check, inclusion_check, straddles_lines, AxisIndex, Bound,
    Bounds, Compare, Number,
};
use crate::tree::{
    adjust_ancestor_counts, create_child, merge_up, unlink_known, Branch, Bucket,
    DivisionStrategy, Error, ItemIndex, ItemSlot, Leaf, LoadState, Node, NodeIndex, StepStatus,
    MAX_DIMENSIONS,
};

/* ---------------------------------------------------------------------------------------------- */
/*                                         OMNITREE BOUNDS                                        */
/* ---------------------------------------------------------------------------------------------- */

/// A spatial index over items that occupy a `D`-dimensional box rather than a
/// single point.
///
/// Because a box can straddle a branch's division point on some axis, not
/// every item fits a unique leaf: straddling items are pinned in the bucket
/// of the deepest branch whose division they straddle. Every item is stored
/// exactly once, so overlap queries never need to de-duplicate.
pub struct OmnitreeBounds<I, T: Number, L, const D: usize> {
    nodes: SlotMap<NodeIndex, Node<T, D>>,
    items: SlotMap<ItemIndex, ItemSlot<I, Bounds<T, D>>>,
    root: NodeIndex,
    count: usize,
    load: LoadState,
    locate: L,
    compare: [Compare<T>; D],
    divide: [DivisionStrategy<T>; D],
}

/// Where an item's box lands during descent: a unique leaf, or pinned at the
/// branch whose division it straddles.
#[derive(Clone, Copy)]
enum Anchor {
    Leaf(NodeIndex),
    Pinned(NodeIndex),
}

impl Anchor {
    fn node(self) -> NodeIndex {
        match self {
            Self::Leaf(node) | Self::Pinned(node) => node,
        }
    }
}

impl<I, T, L, const D: usize> OmnitreeBounds<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> ([T; D], [T; D]),
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

impl<I, T, L, const D: usize> OmnitreeBounds<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> ([T; D], [T; D]),
{
    /// Stores `item` at the box its locate function reports.
    pub fn add(&mut self, item: I) {
        let (min, max) = (self.locate)(&item);
        let at = Bounds::from_min_max(min, max);
        let index = self.items.insert(ItemSlot {
            value: item,
            placement: at,
            next: ItemIndex::null(),
        });

        let anchor = self.descend_create(&at);
        match anchor {
            Anchor::Leaf(node) => {
                self.nodes[node]
                    .as_leaf_mut()
                    .unwrap()
                    .bucket
                    .push(&mut self.items, index);
            }
            Anchor::Pinned(node) => {
                let branch = self.nodes[node].as_branch_mut().unwrap();
                branch.bucket.push(&mut self.items, index);
                branch.count += 1;
            }
        }
        adjust_ancestor_counts(&mut self.nodes, anchor.node(), true);

        self.count += 1;
        self.load.update(self.count);

        if let Anchor::Leaf(node) = anchor {
            self.maybe_subdivide(node);
        }
    }

    /// Removes one item structurally equal to `item`: same box side-for-side
    /// under the per-axis comparers, and equal by value. Returns the removed
    /// item, or [`Error::NotFound`].
    pub fn remove(&mut self, item: &I) -> Result<I, Error>
    where
        I: PartialEq,
    {
        let (min, max) = (self.locate)(item);
        let at = Bounds::from_min_max(min, max);
        let anchor = self.descend_find(&at).ok_or(Error::NotFound)?;
        let node = anchor.node();

        let head = match &self.nodes[node] {
            Node::Branch(branch) => branch.bucket.head,
            Node::Leaf(leaf) => leaf.bucket.head,
        };

        let mut prev = ItemIndex::null();
        let mut cursor = head;
        let target = loop {
            if cursor.is_null() {
                return Err(Error::NotFound);
            }

            let slot = &self.items[cursor];
            if slot.placement.same_as(&at, &self.compare) && slot.value == *item {
                break cursor;
            }

            prev = cursor;
            cursor = slot.next;
        };

        match &mut self.nodes[node] {
            Node::Branch(branch) => {
                branch.bucket.unlink(&mut self.items, prev, target);
                branch.count -= 1;
            }
            Node::Leaf(leaf) => leaf.bucket.unlink(&mut self.items, prev, target),
        }
        adjust_ancestor_counts(&mut self.nodes, node, false);

        self.count -= 1;
        self.load.update(self.count);

        let merge_from = match anchor {
            Anchor::Pinned(node) => node,
            Anchor::Leaf(node) => self.nodes[node].parent(),
        };
        merge_up(
            &mut self.nodes,
            &mut self.items,
            merge_from,
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
    /// ones whose box changed. The item set and count are unaffected.
    pub fn update(&mut self) {
        let moved: Vec<(ItemIndex, Bounds<T, D>)> = self
            .items
            .iter()
            .filter_map(|(index, slot)| {
                let (min, max) = (self.locate)(&slot.value);
                let at = Bounds::from_min_max(min, max);
                (!at.same_as(&slot.placement, &self.compare)).then_some((index, at))
            })
            .collect();

        for (index, at) in moved {
            let old = self.items[index].placement;
            let from = self
                .descend_find(&old)
                .expect("stored placement must resolve to a node")
                .node();

            unlink_known(&mut self.nodes, &mut self.items, from, index);
            adjust_ancestor_counts(&mut self.nodes, from, false);

            self.items[index].placement = at;

            let anchor = self.descend_create(&at);
            match anchor {
                Anchor::Leaf(node) => {
                    self.nodes[node]
                        .as_leaf_mut()
                        .unwrap()
                        .bucket
                        .push(&mut self.items, index);
                }
                Anchor::Pinned(node) => {
                    let branch = self.nodes[node].as_branch_mut().unwrap();
                    branch.bucket.push(&mut self.items, index);
                    branch.count += 1;
                }
            }
            adjust_ancestor_counts(&mut self.nodes, anchor.node(), true);

            if let Anchor::Leaf(node) = anchor {
                self.maybe_subdivide(node);
            }

            let merge_from = match &self.nodes[from] {
                Node::Branch(_) => from,
                Node::Leaf(leaf) => leaf.parent,
            };
            merge_up(
                &mut self.nodes,
                &mut self.items,
                merge_from,
                self.load.merge_threshold(),
            );
        }
    }
}

/* ------------------------------------------ Queries ------------------------------------------- */

impl<I, T, L, const D: usize> OmnitreeBounds<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> ([T; D], [T; D]),
{
    /// Visits every stored item. The visitor's return value converts into a
    /// [`StepStatus`]: return `()` to always continue, or `bool` where
    /// `false` breaks out of the traversal early.
    pub fn stepper<R: Into<StepStatus>>(&self, mut visit: impl FnMut(&I) -> R) -> StepStatus {
        self.visit_all(self.root, &mut |value| visit(value).into())
    }

    /// Visits every item whose box overlaps `range`. Each item is visited at
    /// most once even when its box spans several child regions, since items
    /// are stored at a single node.
    pub fn stepper_overlapped<R: Into<StepStatus>>(
        &self,
        range: &Bounds<T, D>,
        mut visit: impl FnMut(&I) -> R,
    ) -> StepStatus {
        self.visit_overlapped(self.root, range, &mut |value| visit(value).into())
    }

    /// Counts the items whose boxes overlap `range`, consuming whole subtree
    /// counts wherever the range encapsulates a node's region.
    pub fn count_sub_space(&self, range: &Bounds<T, D>) -> usize {
        self.count_range(self.root, range)
    }

    fn visit_all<F>(&self, node: NodeIndex, visit: &mut F) -> StepStatus
    where
        F: FnMut(&I) -> StepStatus,
    {
        let bucket = match &self.nodes[node] {
            Node::Branch(branch) => &branch.bucket,
            Node::Leaf(leaf) => &leaf.bucket,
        };

        let mut cursor = bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            if visit(&slot.value) == StepStatus::Break {
                return StepStatus::Break;
            }
            cursor = slot.next;
        }

        if let Node::Branch(branch) = &self.nodes[node] {
            for &child in &branch.children {
                if child.is_null() {
                    continue;
                }
                if self.visit_all(child, visit) == StepStatus::Break {
                    return StepStatus::Break;
                }
            }
        }

        StepStatus::Continue
    }

    fn visit_overlapped<F>(
        &self,
        node: NodeIndex,
        range: &Bounds<T, D>,
        visit: &mut F,
    ) -> StepStatus
    where
        F: FnMut(&I) -> StepStatus,
    {
        let current = &self.nodes[node];
        // Everything stored under this node sits inside its region, so a
        // range that swallows the region needs no per-item checks.
        let whole = encapsulation_check(current.region(), range, &self.compare);

        let bucket = match current {
            Node::Branch(branch) => &branch.bucket,
            Node::Leaf(leaf) => &leaf.bucket,
        };

        let mut cursor = bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            if whole || inclusion_check(&slot.placement, range, &self.compare) {
                if visit(&slot.value) == StepStatus::Break {
                    return StepStatus::Break;
                }
            }
            cursor = slot.next;
        }

        if let Node::Branch(branch) = current {
            for &child in &branch.children {
                if child.is_null() {
                    continue;
                }
                if !inclusion_check(self.nodes[child].region(), range, &self.compare) {
                    continue;
                }
                if self.visit_overlapped(child, range, visit) == StepStatus::Break {
                    return StepStatus::Break;
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

        let bucket = match current {
            Node::Branch(branch) => &branch.bucket,
            Node::Leaf(leaf) => &leaf.bucket,
        };

        let mut total = 0;
        let mut cursor = bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            if inclusion_check(&slot.placement, range, &self.compare) {
                total += 1;
            }
            cursor = slot.next;
        }

        if let Node::Branch(branch) = current {
            total += branch
                .children
                .iter()
                .filter(|child| !child.is_null())
                .filter(|&&child| {
                    inclusion_check(self.nodes[child].region(), range, &self.compare)
                })
                .map(|&child| self.count_range(child, range))
                .sum::<usize>();
        }

        total
    }
}

/* -------------------------------------- Tree maintenance -------------------------------------- */

impl<I, T, L, const D: usize> OmnitreeBounds<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> ([T; D], [T; D]),
{
    /// Walks toward the unique node for `at`, materializing missing children
    /// along the way. Stops early at a branch whose division `at` straddles.
    fn descend_create(&mut self, at: &Bounds<T, D>) -> Anchor {
        let mut node = self.root;

        loop {
            let step = match &self.nodes[node] {
                Node::Branch(branch) => {
                    if straddles_lines(at, &branch.division, &self.compare) {
                        return Anchor::Pinned(node);
                    }
                    let index = box_child_index(at, &branch.division, &self.compare);
                    Some((index, branch.children[index]))
                }
                Node::Leaf(_) => None,
            };

            match step {
                Some((index, child)) if child.is_null() => {
                    node = create_child(&mut self.nodes, node, index);
                }
                Some((_, child)) => node = child,
                None => return Anchor::Leaf(node),
            }
        }
    }

    /// Walks to the node that would hold `at`, or `None` when the matching
    /// child was never created.
    fn descend_find(&self, at: &Bounds<T, D>) -> Option<Anchor> {
        let mut node = self.root;

        loop {
            match &self.nodes[node] {
                Node::Branch(branch) => {
                    if straddles_lines(at, &branch.division, &self.compare) {
                        return Some(Anchor::Pinned(node));
                    }
                    let child =
                        branch.children[box_child_index(at, &branch.division, &self.compare)];
                    if child.is_null() {
                        return None;
                    }
                    node = child;
                }
                Node::Leaf(_) => return Some(Anchor::Leaf(node)),
            }
        }
    }

    /// Turns an over-full leaf into a branch: straddling boxes pin to the new
    /// branch's bucket, the rest redistribute into fresh child leaves.
    fn maybe_subdivide(&mut self, node: NodeIndex) {
        let leaf = self.nodes[node].as_leaf().unwrap();
        if leaf.bucket.len <= self.load.load {
            return;
        }

        // Box midpoints feed the division strategies. Stored placements are
        // always closed boxes, coming from locate's min/max arrays.
        let mut samples: [Vec<T>; D] = std::array::from_fn(|_| Vec::with_capacity(leaf.bucket.len));
        let mut cursor = leaf.bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            for axis in 0..D {
                let (Bound::Value(low), Bound::Value(high)) =
                    (&slot.placement.min()[axis], &slot.placement.max()[axis])
                else {
                    continue;
                };
                samples[axis].push(T::from_f64((low.to_f64() + high.to_f64()) / 2.0));
            }
            cursor = slot.next;
        }
        if samples.iter().any(Vec::is_empty) {
            return;
        }

        let division: [T; D] = std::array::from_fn(|axis| {
            self.divide[axis].divide(&mut samples[axis], self.compare[axis])
        });

        // Bail when the division separates nothing: no straddler to pin and
        // every box bound for the same single child.
        let mut first: Option<usize> = None;
        let mut any_pinned = false;
        let mut separates = false;
        let mut cursor = self.nodes[node].as_leaf().unwrap().bucket.head;
        while !cursor.is_null() {
            let slot = &self.items[cursor];
            if straddles_lines(&slot.placement, &division, &self.compare) {
                any_pinned = true;
            } else {
                let index = box_child_index(&slot.placement, &division, &self.compare);
                if *first.get_or_insert(index) != index {
                    separates = true;
                }
            }
            cursor = slot.next;
        }
        if !any_pinned && !separates {
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
            let placement = self.items[cursor].placement;

            if straddles_lines(&placement, &division, &self.compare) {
                self.nodes[node]
                    .as_branch_mut()
                    .unwrap()
                    .bucket
                    .push(&mut self.items, cursor);
            } else {
                let index = box_child_index(&placement, &division, &self.compare);
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
            }

            cursor = next;
        }
    }
}

/// Bit-packed child index for a non-straddling box: bit `axis` set when the
/// box lies strictly above the division point on that axis. Only meaningful
/// once `straddles_lines` has ruled out every axis.
fn box_child_index<T: Number, const D: usize>(
    bounds: &Bounds<T, D>,
    division: &[T; D],
    compare: &[Compare<T>; D],
) -> usize {
    let mut index = 0;
    for axis in 0..D {
        if let Bound::Value(min) = &bounds.min()[axis] {
            if compare[axis](min, &division[axis]) == Ordering::Greater {
                index |= 1 << axis;
            }
        }
    }
    index
}

/* ----------------------------------------- Validation ----------------------------------------- */

impl<I, T, L, const D: usize> OmnitreeBounds<I, T, L, D>
where
    T: Number,
    L: Fn(&I) -> ([T; D], [T; D]),
{
    /// Deep structural validation for tests and debugging: parent links,
    /// cached counts, chain integrity, and straddle placement are checked.
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
                let pinned = self.verify_chain(node, &branch.bucket)?;

                let mut cursor = branch.bucket.head;
                while !cursor.is_null() {
                    let slot = &self.items[cursor];
                    if !straddles_lines(&slot.placement, &branch.division, &self.compare) {
                        return Err(format!(
                            "branch {node:?} pins an item that does not straddle its division"
                        ));
                    }
                    cursor = slot.next;
                }

                let mut total = pinned;
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
                        "branch {node:?} caches count {} but its subtree holds {total}",
                        branch.count
                    ));
                }

                Ok(total)
            }
            Node::Leaf(leaf) => self.verify_chain(node, &leaf.bucket),
        }
    }

    fn verify_chain(&self, node: NodeIndex, bucket: &Bucket) -> Result<usize, String> {
        let mut seen = 0;
        let mut last = ItemIndex::null();
        let mut cursor = bucket.head;

        while !cursor.is_null() {
            seen += 1;
            last = cursor;
            cursor = self.items[cursor].next;
        }

        if seen != bucket.len {
            return Err(format!(
                "bucket of {node:?} chains {seen} items but caches {}",
                bucket.len
            ));
        }
        if last != bucket.tail {
            return Err(format!("bucket of {node:?} has a stale tail link"));
        }

        Ok(seen)
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                              TESTS                                             */
/* ---------------------------------------------------------------------------------------------- */
