use std::cmp::Ordering;
use std::mem;

use enum_as_inner::EnumAsInner;
use slotmap::{Key, SlotMap};

use crate::primitive::{Bounds, Compare, Number, NumberCommon};

slotmap::new_key_type! {
    /// Index of a tree node in the node arena.
    pub struct NodeIndex;

    /// Index of a stored item in the item arena.
    pub struct ItemIndex;
}

/// Child tables are bit-packed into a `usize` and allocated at `2^D` slots,
/// which stops being reasonable well before the pointer width runs out.
pub const MAX_DIMENSIONS: usize = 16;

/* ---------------------------------------------------------------------------------------------- */
/*                                         NODE HIERARCHY                                         */
/* ---------------------------------------------------------------------------------------------- */

/// A stored item together with its placement (the located coordinates for the
/// point tree, the located box for the bounds tree) and its intrusive link in
/// the owning bucket chain.
pub(crate) struct ItemSlot<I, P> {
    pub value: I,
    pub placement: P,
    pub next: ItemIndex,
}

#[derive(EnumAsInner)]
pub(crate) enum Node<T, const D: usize> {
    Branch(Branch<T, D>),
    Leaf(Leaf<T, D>),
}

/// An interior node, partitioned at `division` into up to `2^D` children.
///
/// Bit `axis` of a child's index in `children` says "at or above the division
/// point on that axis". Slots hold null keys until the matching child is
/// actually needed. `bucket` pins items whose boxes straddle the division
/// point; the point tree never puts anything in it.
pub(crate) struct Branch<T, const D: usize> {
    pub region: Bounds<T, D>,
    pub parent: NodeIndex,
    /// Items in this subtree, bucket included.
    pub count: usize,
    pub division: [T; D],
    pub children: Vec<NodeIndex>,
    pub bucket: Bucket,
}

/// A terminal node holding its items directly.
pub(crate) struct Leaf<T, const D: usize> {
    pub region: Bounds<T, D>,
    pub parent: NodeIndex,
    pub bucket: Bucket,
}

impl<T, const D: usize> Node<T, D> {
    pub fn region(&self) -> &Bounds<T, D> {
        match self {
            Self::Branch(branch) => &branch.region,
            Self::Leaf(leaf) => &leaf.region,
        }
    }

    pub fn parent(&self) -> NodeIndex {
        match self {
            Self::Branch(branch) => branch.parent,
            Self::Leaf(leaf) => leaf.parent,
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Self::Branch(branch) => branch.count,
            Self::Leaf(leaf) => leaf.bucket.len,
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                             BUCKET                                             */
/* ---------------------------------------------------------------------------------------------- */

/// A singly linked chain of item slots threaded through the item arena.
/// Keeping the tail makes appends and whole-chain concatenation O(1).
#[derive(Clone, Copy)]
pub(crate) struct Bucket {
    pub head: ItemIndex,
    pub tail: ItemIndex,
    pub len: usize,
}

impl Bucket {
    pub fn new() -> Self {
        Self {
            head: ItemIndex::null(),
            tail: ItemIndex::null(),
            len: 0,
        }
    }

    pub fn push<I, P>(
        &mut self,
        items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
        index: ItemIndex,
    ) {
        items[index].next = ItemIndex::null();

        if self.tail.is_null() {
            debug_assert!(self.head.is_null());
            self.head = index;
        } else {
            items[self.tail].next = index;
        }

        self.tail = index;
        self.len += 1;
    }

    /// Unlinks `index`, whose predecessor in the chain is `prev` (null when
    /// `index` is the head). The caller found `prev` during its match scan.
    pub fn unlink<I, P>(
        &mut self,
        items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
        prev: ItemIndex,
        index: ItemIndex,
    ) {
        let next = items[index].next;

        if prev.is_null() {
            debug_assert!(self.head == index);
            self.head = next;
        } else {
            items[prev].next = next;
        }

        if self.tail == index {
            self.tail = prev;
        }

        items[index].next = ItemIndex::null();
        self.len -= 1;
    }

    /// Splices every slot of `other` onto the end of this chain.
    pub fn append<I, P>(
        &mut self,
        items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
        other: Self,
    ) {
        if other.head.is_null() {
            debug_assert!(other.len == 0);
            return;
        }

        if self.tail.is_null() {
            self.head = other.head;
        } else {
            items[self.tail].next = other.head;
        }

        self.tail = other.tail;
        self.len += other.len;
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                        DIVISION STRATEGY                                       */
/* ---------------------------------------------------------------------------------------------- */

/// How a subdividing leaf picks its division coordinate on one axis.
#[derive(Clone, Copy, Debug)]
pub enum DivisionStrategy<T> {
    /// Statistical median of the coordinates currently stored in the leaf.
    /// Costs a sort per axis but tends to split the load evenly.
    Median,
    /// Arithmetic mean. No sort, at the price of skewed splits on clustered
    /// data.
    Mean,
    /// Caller-supplied reduction over the leaf's (unsorted) axis samples.
    Custom(fn(&[T]) -> T),
}

impl<T> Default for DivisionStrategy<T> {
    fn default() -> Self {
        Self::Median
    }
}

impl<T: Number> DivisionStrategy<T> {
    /// Reduces an over-full leaf's samples on one axis to the division
    /// coordinate. `samples` is never empty.
    pub(crate) fn divide(&self, samples: &mut Vec<T>, compare: Compare<T>) -> T {
        match self {
            Self::Median => {
                samples.sort_by(|a, b| compare(a, b));

                let mut at = samples.len() / 2;

                // A duplicate-heavy low half would leave the strictly-below
                // side empty; step up to the first distinct sample instead.
                if compare(&samples[at], &samples[0]) == Ordering::Equal {
                    at = samples[at..]
                        .iter()
                        .position(|v| compare(v, &samples[0]) == Ordering::Greater)
                        .map_or(at, |offset| at + offset);
                }

                samples[at]
            }
            Self::Mean => {
                let sum: f64 = samples.iter().map(NumberCommon::to_f64).sum();
                let mean = (sum / samples.len() as f64)
                    .clamp(T::MINVALUE.to_f64(), T::MAXVALUE.to_f64());

                T::from_f64(mean)
            }
            Self::Custom(divide) => divide(samples),
        }
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                          LOAD SCHEDULE                                         */
/* ---------------------------------------------------------------------------------------------- */

/// Leaves never subdivide before holding more than this many items.
pub(crate) const MINIMUM_LOAD: usize = 8;

/// Target leaf capacity derived from the total item count on a logarithmic
/// schedule. The count thresholds are cached so the `ln` only reruns once the
/// count drifts a full e-factor away from where the load was last computed.
#[derive(Clone, Copy, Debug)]
pub(crate) struct LoadState {
    pub load: usize,
    lower: usize,
    upper: usize,
}

impl LoadState {
    pub fn new() -> Self {
        let mut state = Self {
            load: 0,
            lower: 0,
            upper: 0,
        };
        state.recompute(0);
        state
    }

    pub fn update(&mut self, count: usize) {
        if count < self.lower || count > self.upper {
            self.recompute(count);
        }
    }

    /// Branches at or under this count are candidates for collapsing back
    /// into a leaf. Half the split trigger, so split and merge cannot thrash
    /// around a single threshold.
    pub fn merge_threshold(&self) -> usize {
        self.load / 2
    }

    fn recompute(&mut self, count: usize) {
        let natural_log = (count.max(1) as f64).ln();
        let unclamped = natural_log.ceil() as usize;

        self.load = unclamped.max(MINIMUM_LOAD);
        // While the minimum clamp is active the load cannot sink any lower,
        // so the whole clamped count range shares one cache window.
        self.lower = if unclamped <= MINIMUM_LOAD {
            0
        } else {
            ((self.load - 1) as f64).exp() as usize
        };
        self.upper = ((self.load + 1) as f64).exp() as usize;
    }
}

/* ---------------------------------------------------------------------------------------------- */
/*                                        SHARED MAINTENANCE                                      */
/* ---------------------------------------------------------------------------------------------- */

/// Propagates a single-item count change from `from`'s parent up to the root.
/// Leaf counts are derived from their bucket length, so only branches are
/// touched.
pub(crate) fn adjust_ancestor_counts<T, const D: usize>(
    nodes: &mut SlotMap<NodeIndex, Node<T, D>>,
    from: NodeIndex,
    increment: bool,
) {
    let mut cursor = nodes[from].parent();

    while !cursor.is_null() {
        let branch = nodes[cursor].as_branch_mut().unwrap();
        if increment {
            branch.count += 1;
        } else {
            branch.count -= 1;
        }
        cursor = branch.parent;
    }
}

/// Materializes the child leaf at `index` under the branch `node`, deriving
/// its region by splitting the branch region at the division point.
pub(crate) fn create_child<T: Copy, const D: usize>(
    nodes: &mut SlotMap<NodeIndex, Node<T, D>>,
    node: NodeIndex,
    index: usize,
) -> NodeIndex {
    let branch = nodes[node].as_branch().unwrap();
    debug_assert!(branch.children[index].is_null());
    let region = branch.region.child(&branch.division, index);

    let child = nodes.insert(Node::Leaf(Leaf {
        region,
        parent: node,
        bucket: Bucket::new(),
    }));
    nodes[node].as_branch_mut().unwrap().children[index] = child;

    child
}

/// Unlinks `target` from the bucket of `node`, re-finding its predecessor by
/// walking the chain. The caller must know the slot lives there.
pub(crate) fn unlink_known<I, P, T, const D: usize>(
    nodes: &mut SlotMap<NodeIndex, Node<T, D>>,
    items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
    node: NodeIndex,
    target: ItemIndex,
) {
    let head = match &nodes[node] {
        Node::Branch(branch) => branch.bucket.head,
        Node::Leaf(leaf) => leaf.bucket.head,
    };

    let mut prev = ItemIndex::null();
    let mut cursor = head;
    while cursor != target {
        debug_assert!(!cursor.is_null());
        prev = cursor;
        cursor = items[cursor].next;
    }

    match &mut nodes[node] {
        Node::Branch(branch) => {
            branch.bucket.unlink(items, prev, target);
            branch.count -= 1;
        }
        Node::Leaf(leaf) => leaf.bucket.unlink(items, prev, target),
    }
}

/// Walks from `node` to the root, collapsing every branch that has dropped
/// to `threshold` items or fewer and whose live children are all leaves.
/// Checking bottom-up lets one removal cascade several merges in one pass.
pub(crate) fn merge_up<I, P, T: Copy, const D: usize>(
    nodes: &mut SlotMap<NodeIndex, Node<T, D>>,
    items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
    mut node: NodeIndex,
    threshold: usize,
) {
    while !node.is_null() {
        let parent = nodes[node].parent();

        let collapsible = match &nodes[node] {
            Node::Branch(branch) => {
                branch.count <= threshold
                    && branch
                        .children
                        .iter()
                        .all(|&child| child.is_null() || nodes[child].is_leaf())
            }
            Node::Leaf(_) => false,
        };

        if collapsible {
            collapse_branch(nodes, items, node);
        }

        node = parent;
    }
}

/// Replaces a branch whose children are all leaves with a single leaf
/// holding the concatenation of the branch bucket and every child chain.
fn collapse_branch<I, P, T: Copy, const D: usize>(
    nodes: &mut SlotMap<NodeIndex, Node<T, D>>,
    items: &mut SlotMap<ItemIndex, ItemSlot<I, P>>,
    node: NodeIndex,
) {
    let (region, parent, children, mut bucket) = {
        let branch = nodes[node].as_branch_mut().unwrap();
        (
            branch.region,
            branch.parent,
            mem::take(&mut branch.children),
            mem::replace(&mut branch.bucket, Bucket::new()),
        )
    };

    for child in children {
        if child.is_null() {
            continue;
        }
        match nodes.remove(child) {
            Some(Node::Leaf(leaf)) => bucket.append(items, leaf.bucket),
            _ => unreachable!(),
        }
    }

    nodes[node] = Node::Leaf(Leaf {
        region,
        parent,
        bucket,
    });
}

/* ---------------------------------------------------------------------------------------------- */
/*                                          AMBIENT TYPES                                         */
/* ---------------------------------------------------------------------------------------------- */

/// Cooperative break signal returned (via `Into`) by stepper visitors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Continue,
    Break,
}

impl From<()> for StepStatus {
    fn from(_: ()) -> Self {
        Self::Continue
    }
}

impl From<bool> for StepStatus {
    /// `true` keeps the traversal going; `false` breaks out of it.
    fn from(keep_going: bool) -> Self {
        if keep_going {
            Self::Continue
        } else {
            Self::Break
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// `remove` could not find the item at the coordinates its locate
    /// function reported.
    #[error("item not found at its located coordinates")]
    NotFound,
}

/* ---------------------------------------------------------------------------------------------- */
/*                                              TESTS                                             */
/* ---------------------------------------------------------------------------------------------- */

#[cfg(test)]
mod __test;
