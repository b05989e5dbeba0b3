use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write;
use std::mem;
use std::rc::Rc;
use smallvec::SmallVec;
use crate::interval::Interval;
use crate::scalar::Scalar;




/// Type alias for an optional boxed subtree.
pub(crate) type Child<K, V> = Option<Box<Node<K, V>>>;




/**
 * One node of a centered interval tree: a center coordinate, the set of
 * stored intervals straddling that center, and two AVL-balanced children.
 * Intervals entirely below the center live in the left subtree, entirely
 * above in the right. Every mutating function returns the possibly new
 * subtree root, so rotations propagate up the call chain.
 *
 * Intervals are shared with the owning tree's membership set; moving one
 * between nodes moves the reference, never the value.
 *
 * Invariants, restored before every return:
 *   - `s_center` is non-empty and every member contains `center`;
 *   - no member of a descendant's `s_center` contains this `center`;
 *   - `left.center < center < right.center`;
 *   - `depth` and `balance` are current, and `abs(balance) <= 1`.
 */
pub(crate) struct Node<K: Scalar, V: Ord> {
    pub(crate) center: K,
    pub(crate) s_center: BTreeSet<Rc<Interval<K, V>>>,
    left: Child<K, V>,
    right: Child<K, V>,
    depth: u32,
    balance: i32,
}




// ============================================================================
impl<K: Scalar, V: Ord> Node<K, V> {

    fn leaf(center: K) -> Box<Self> {
        Box::new(Self {
            center,
            s_center: BTreeSet::new(),
            left: None,
            right: None,
            depth: 1,
            balance: 0,
        })
    }

    pub(crate) fn from_interval(iv: Rc<Interval<K, V>>) -> Box<Self> {
        let mut node = Self::leaf(iv.begin);
        node.s_center.insert(iv);
        node
    }

    /**
     * Build a subtree from a sorted interval list by divide and conquer.
     * The middle interval's begin becomes the center; intervals entirely
     * below it seed the left subtree and entirely above it the right, and
     * the rest straddle the center. The result satisfies every structural
     * invariant but is not necessarily of minimum depth.
     */
    pub(crate) fn from_sorted(ivs: Vec<Rc<Interval<K, V>>>) -> Child<K, V> {
        if ivs.is_empty() {
            return None
        }
        let center = ivs[ivs.len() / 2].begin;
        let mut node = Self::leaf(center);
        let mut below = Vec::new();
        let mut above = Vec::new();

        for iv in ivs {
            if iv.end <= center {
                below.push(iv)
            } else if iv.begin > center {
                above.push(iv)
            } else {
                node.s_center.insert(iv);
            }
        }
        node.left = Self::from_sorted(below);
        node.right = Self::from_sorted(above);
        node.refresh();

        while node.balance.abs() >= 2 {
            node = node.rotate();
        }
        Some(node)
    }




    // ========================================================================
    fn child(&self, go_right: bool) -> &Child<K, V> {
        if go_right { &self.right } else { &self.left }
    }

    fn child_mut(&mut self, go_right: bool) -> &mut Child<K, V> {
        if go_right { &mut self.right } else { &mut self.left }
    }

    /**
     * Whether the interval straddles this node's center.
     */
    fn center_hit(&self, iv: &Interval<K, V>) -> bool {
        iv.contains_point(self.center)
    }

    /**
     * Assuming no center hit, whether the interval belongs in the right
     * subtree.
     */
    fn hit_branch(&self, iv: &Interval<K, V>) -> bool {
        iv.begin > self.center
    }

    /**
     * Recompute the cached depth and balance from the children's caches.
     */
    fn refresh(&mut self) {
        let left_depth = self.left.as_ref().map_or(0, |node| node.depth);
        let right_depth = self.right.as_ref().map_or(0, |node| node.depth);
        self.depth = 1 + left_depth.max(right_depth);
        self.balance = right_depth as i32 - left_depth as i32;
    }




    // ========================================================================
    /**
     * Rebalance this subtree if the AVL bound is violated, and return the
     * new subtree root.
     */
    fn rotate(mut self: Box<Self>) -> Box<Self> {
        self.refresh();
        if self.balance.abs() < 2 {
            return self
        }
        let heavy = self.balance > 0;
        let child_balance = self.child(heavy).as_ref().unwrap().balance;
        if (child_balance > 0) == heavy || child_balance == 0 {
            self.srotate()
        } else {
            self.drotate()
        }
    }

    /**
     * Single rotation, promoting the heavy child. The demoted node may
     * hold intervals that straddle the promoted center; those are pulled
     * up into the new subtree root, and if that empties the demoted node
     * it is pruned on the spot. Skipping this repair would leave intervals
     * seated at a node whose center they no longer contain.
     */
    fn srotate(mut self: Box<Self>) -> Box<Self> {
        let heavy = self.balance > 0;
        let light = !heavy;
        let mut save = self.child_mut(heavy).take().unwrap();
        *self.child_mut(heavy) = save.child_mut(light).take();
        *save.child_mut(light) = Some(self.rotate());

        let center = save.center;
        let mut promoted: SmallVec<[Rc<Interval<K, V>>; 4]> = SmallVec::new();
        {
            let demoted = save.child_mut(light).as_mut().unwrap();
            let old = mem::take(&mut demoted.s_center);
            for iv in old {
                if iv.contains_point(center) {
                    promoted.push(iv)
                } else {
                    demoted.s_center.insert(iv);
                }
            }
        }
        if !promoted.is_empty() {
            if save.child(light).as_ref().unwrap().s_center.is_empty() {
                let emptied = save.child_mut(light).take().unwrap();
                *save.child_mut(light) = emptied.prune();
            }
            save.refresh();
            for iv in promoted {
                save.s_center.insert(iv);
            }
        }
        save.refresh();
        save
    }

    /**
     * Double rotation: first rotate the heavy child toward this node, then
     * rotate this node. The straddle repair runs inside each constituent
     * single rotation.
     */
    fn drotate(mut self: Box<Self>) -> Box<Self> {
        let heavy = self.balance > 0;
        let child = self.child_mut(heavy).take().unwrap();
        *self.child_mut(heavy) = Some(child.srotate());
        self.refresh();
        self.srotate()
    }




    // ========================================================================
    /**
     * Add the interval to this subtree and return the new subtree root.
     */
    pub(crate) fn add(mut self: Box<Self>, iv: Rc<Interval<K, V>>) -> Box<Self> {
        if self.center_hit(&iv) {
            self.s_center.insert(iv);
            self
        } else {
            let go_right = self.hit_branch(&iv);
            match self.child_mut(go_right).take() {
                None => {
                    *self.child_mut(go_right) = Some(Self::from_interval(iv));
                    self.refresh();
                    self
                }
                Some(child) => {
                    *self.child_mut(go_right) = Some(child.add(iv));
                    self.rotate()
                }
            }
        }
    }

    /**
     * Remove the interval from this subtree. Returns the new subtree root
     * and whether the interval was found. `done` short-circuits the
     * rebalancing pass once an ancestor no longer needs it.
     */
    pub(crate) fn remove(
        mut self: Box<Self>,
        iv: &Interval<K, V>,
        done: &mut bool,
    ) -> (Child<K, V>, bool) {
        if self.center_hit(iv) {
            if !self.s_center.remove(iv) {
                *done = true;
                return (Some(self), false)
            }
            if !self.s_center.is_empty() {
                *done = true;
                return (Some(self), true)
            }
            (self.prune(), true)
        } else {
            let go_right = self.hit_branch(iv);
            match self.child_mut(go_right).take() {
                None => {
                    *done = true;
                    (Some(self), false)
                }
                Some(child) => {
                    let (rest, found) = child.remove(iv, done);
                    *self.child_mut(go_right) = rest;
                    if *done {
                        (Some(self), found)
                    } else {
                        (Some(self.rotate()), found)
                    }
                }
            }
        }
    }

    /**
     * Replace this node, whose `s_center` has emptied, with a well-formed
     * subtree holding everything else. With one child missing the other is
     * grafted in place; otherwise the greatest predecessor is popped out of
     * the left subtree and installed here.
     */
    fn prune(mut self: Box<Self>) -> Child<K, V> {
        match (self.left.take(), self.right.take()) {
            (None, other) | (other, None) => other,
            (Some(left), Some(right)) => {
                let (mut heir, remainder) = left.pop_greatest_child();
                heir.left = remainder;
                heir.right = Some(right);
                Some(heir.rotate())
            }
        }
    }

    /**
     * Detach a replacement node from this subtree and return it along with
     * the remaining subtree. The heir's center maximizes the coordinate
     * while keeping as many of the rightmost node's intervals as possible:
     * one below the greatest stored end, or that interval's begin when it
     * is no longer than one unit. Intervals left behind at an ancestor that
     * straddle the heir's center migrate into the heir on the way back up.
     */
    fn pop_greatest_child(mut self: Box<Self>) -> (Box<Self>, Child<K, V>) {
        match self.right.take() {
            None => {
                let (max_begin, max_end) = {
                    let widest = self
                        .s_center
                        .iter()
                        .max_by(|a, b| a.end.total_cmp(&b.end))
                        .unwrap();
                    (widest.begin, widest.end)
                };
                let center = if max_end - max_begin <= K::one() {
                    max_begin
                } else {
                    max_end - K::one()
                };
                let mut heir = Self::leaf(center);
                let old = mem::take(&mut self.s_center);
                for iv in old {
                    if iv.contains_point(center) {
                        heir.s_center.insert(iv);
                    } else {
                        self.s_center.insert(iv);
                    }
                }
                if self.s_center.is_empty() {
                    (heir, self.left.take())
                } else {
                    (heir, Some(self))
                }
            }
            Some(right) => {
                let (mut heir, rest) = right.pop_greatest_child();
                self.right = rest;

                let old = mem::take(&mut self.s_center);
                for iv in old {
                    if iv.contains_point(heir.center) {
                        heir.s_center.insert(iv);
                    } else {
                        self.s_center.insert(iv);
                    }
                }
                if self.s_center.is_empty() {
                    let remainder = self.prune();
                    (heir, remainder)
                } else {
                    (heir, Some(self.rotate()))
                }
            }
        }
    }




    // ========================================================================
    /**
     * Whether any stored interval contains the point. Short-circuits on the
     * first hit.
     */
    pub(crate) fn contains_point(&self, p: K) -> bool {
        if self.s_center.iter().any(|iv| iv.contains_point(p)) {
            return true
        }
        self.child(p > self.center)
            .as_ref()
            .map_or(false, |branch| branch.contains_point(p))
    }

    /**
     * Accumulate every stored interval containing the point.
     */
    pub(crate) fn search_point<'a>(&'a self, p: K, result: &mut BTreeSet<&'a Interval<K, V>>) {
        for iv in &self.s_center {
            if iv.contains_point(p) {
                result.insert(iv.as_ref());
            }
        }
        if p < self.center {
            if let Some(left) = &self.left {
                left.search_point(p, result)
            }
        } else if p > self.center {
            if let Some(right) = &self.right {
                right.search_point(p, result)
            }
        }
    }

    /**
     * Accumulate every stored interval containing any of the points.
     */
    pub(crate) fn search_overlap<'a, I>(&'a self, points: I, result: &mut BTreeSet<&'a Interval<K, V>>)
    where
        I: IntoIterator<Item = K>,
    {
        for p in points {
            self.search_point(p, result);
        }
    }

    /**
     * Accumulate the whole subtree's intervals. Used to rebuild or verify
     * the membership set.
     */
    pub(crate) fn all_children<'a>(&'a self, result: &mut BTreeSet<&'a Interval<K, V>>) {
        for iv in &self.s_center {
            result.insert(iv.as_ref());
        }
        if let Some(left) = &self.left {
            left.all_children(result)
        }
        if let Some(right) = &self.right {
            right.all_children(result)
        }
    }

    /**
     * Panic unless this subtree satisfies every structural invariant.
     * `ancestors` carries the centers on the path from the root.
     */
    pub(crate) fn validate(&self, ancestors: &mut Vec<K>) {
        let left_depth = self.left.as_ref().map_or(0, |node| node.depth);
        let right_depth = self.right.as_ref().map_or(0, |node| node.depth);
        assert_eq!(
            self.depth,
            1 + left_depth.max(right_depth),
            "stale cached depth at center {:?}", self.center
        );
        assert_eq!(
            self.balance,
            right_depth as i32 - left_depth as i32,
            "stale cached balance at center {:?}", self.center
        );
        assert!(
            self.balance.abs() < 2,
            "unbalanced subtree at center {:?}", self.center
        );
        assert!(
            !self.s_center.is_empty(),
            "empty s_center at center {:?}", self.center
        );
        for iv in &self.s_center {
            assert!(
                iv.contains_point(self.center),
                "interval [{:?}, {:?}) does not contain its center {:?}",
                iv.begin, iv.end, self.center
            );
            for ancestor in ancestors.iter() {
                assert!(
                    !iv.contains_point(*ancestor),
                    "interval [{:?}, {:?}) seated below ancestor center {:?}",
                    iv.begin, iv.end, ancestor
                );
            }
        }
        ancestors.push(self.center);
        if let Some(left) = &self.left {
            assert!(
                left.center < self.center,
                "out-of-order left child under center {:?}", self.center
            );
            left.validate(ancestors);
        }
        if let Some(right) = &self.right {
            assert!(
                right.center > self.center,
                "out-of-order right child under center {:?}", self.center
            );
            right.validate(ancestors);
        }
        ancestors.pop();
    }
}




// ============================================================================
impl<K: Scalar, V: Ord + fmt::Debug> Node<K, V> {

    /**
     * Append an indented dump of this subtree. For debugging.
     */
    pub(crate) fn dump(&self, indent: usize, out: &mut String) {
        let pad = "    ".repeat(indent);
        let _ = writeln!(
            out,
            "{}Node<{:?}, depth={}, balance={}>",
            pad, self.center, self.depth, self.balance
        );
        for iv in &self.s_center {
            let _ = writeln!(out, "{} {:?}", pad, iv);
        }
        if let Some(left) = &self.left {
            let _ = writeln!(out, "{}<:", pad);
            left.dump(indent + 1, out);
        }
        if let Some(right) = &self.right {
            let _ = writeln!(out, "{}>:", pad);
            right.dump(indent + 1, out);
        }
    }
}
