use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::FromIterator;
use std::mem;
use std::rc::Rc;
use log::debug;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use crate::boundary::BoundaryIndex;
use crate::error::Error;
use crate::interval::Interval;
use crate::node::{Child, Node};
use crate::scalar::Scalar;




/**
 * A mutable, self-balancing centered interval tree over half-open intervals
 * `[begin, end)` with attached payloads.
 *
 * Queries may be by point, by range overlap, or by range envelopment, and
 * run in sub-linear time over dynamic data. Structural mutations cover
 * addition, removal, hole punching (`chop`), point splitting (`slice`),
 * merging of overlapping or equal intervals, boundary-aligned fracturing
 * (`split_overlaps`), and set algebra over whole trees.
 *
 * The tree keeps three synchronized structures: the root of the node graph,
 * a reference-counted multiset of endpoint coordinates, and the membership
 * set of all stored intervals (which doubles as the sorted snapshot used
 * for iteration and serialization). Interval values are shared between the
 * membership set and exactly one node's straddle set; re-seating an
 * interval during rebalancing moves the reference, never the value.
 *
 * Failed operations leave the tree untouched: every mutation validates its
 * arguments before the first structural change.
 */
pub struct IntervalTree<K: Scalar, V: Ord> {
    root: Child<K, V>,
    boundary: BoundaryIndex<K>,
    all: BTreeSet<Rc<Interval<K, V>>>,
}




// ============================================================================
impl<K: Scalar, V: Ord> IntervalTree<K, V> {

    pub fn new() -> Self {
        Self {
            root: None,
            boundary: BoundaryIndex::new(),
            all: BTreeSet::new(),
        }
    }

    /**
     * Build a tree of payload-less spans from `(begin, end)` pairs,
     * rejecting null pairs.
     */
    pub fn from_tuples<I>(tuples: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, K)>,
        V: Default,
    {
        let intervals = tuples
            .into_iter()
            .map(|(begin, end)| Interval::new(begin, end, V::default()))
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(intervals.into_iter().collect())
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /**
     * Whether an identical interval (same range, same payload) is stored.
     */
    pub fn contains(&self, iv: &Interval<K, V>) -> bool {
        self.all.contains(iv)
    }

    pub fn contains_range(&self, begin: K, end: K, data: V) -> bool {
        Interval::new(begin, end, data)
            .map(|iv| self.contains(&iv))
            .unwrap_or(false)
    }

    /**
     * Iterate the stored intervals in their total order.
     */
    pub fn iter(&self) -> impl Iterator<Item = &Interval<K, V>> {
        self.all.iter().map(|iv| iv.as_ref())
    }

    /**
     * A sorted snapshot of the stored intervals. Feeding it back into the
     * bulk constructor reconstructs an observationally equivalent tree.
     */
    pub fn items(&self) -> Vec<Interval<K, V>>
    where
        V: Clone,
    {
        self.iter().cloned().collect()
    }




    // ========================================================================
    /**
     * Add an interval, unless an identical one is already stored. Returns
     * whether the tree changed.
     */
    pub fn add(&mut self, iv: Interval<K, V>) -> bool {
        if self.all.contains(&iv) {
            return false
        }
        let iv = Rc::new(iv);
        self.boundary.add(iv.begin());
        self.boundary.add(iv.end());
        self.root = match self.root.take() {
            None => Some(Node::from_interval(Rc::clone(&iv))),
            Some(root) => Some(root.add(Rc::clone(&iv))),
        };
        self.all.insert(iv);
        true
    }

    /**
     * Shortcut for adding `Interval::new(begin, end, data)`.
     */
    pub fn add_range(&mut self, begin: K, end: K, data: V) -> Result<bool, Error> {
        Ok(self.add(Interval::new(begin, end, data)?))
    }

    /**
     * Remove an interval; fails with `NotFound` when it is not stored, in
     * which case the tree is untouched.
     */
    pub fn remove(&mut self, iv: &Interval<K, V>) -> Result<(), Error> {
        if !self.all.contains(iv) {
            return Err(Error::NotFound)
        }
        if let Some(root) = self.root.take() {
            let mut done = false;
            let (rest, found) = root.remove(iv, &mut done);
            self.root = rest;
            debug_assert!(found, "membership set and node graph out of sync");
        }
        self.all.remove(iv);
        self.boundary.remove(iv.begin());
        self.boundary.remove(iv.end());
        Ok(())
    }

    pub fn remove_range(&mut self, begin: K, end: K, data: V) -> Result<(), Error> {
        self.remove(&Interval::new(begin, end, data)?)
    }

    /**
     * As `remove`, but silently does nothing when the interval is not
     * stored. Returns whether the tree changed. This is the only place a
     * `NotFound` is converted into a no-op.
     */
    pub fn discard(&mut self, iv: &Interval<K, V>) -> bool {
        self.remove(iv).is_ok()
    }

    pub fn discard_range(&mut self, begin: K, end: K, data: V) -> Result<bool, Error> {
        Ok(self.discard(&Interval::new(begin, end, data)?))
    }

    /**
     * Delete every stored interval overlapping the point.
     */
    pub fn remove_overlap_point(&mut self, p: K) {
        let doomed = self.take_hits(self.at(p));
        for iv in doomed {
            let removed = self.remove(iv.as_ref());
            debug_assert!(removed.is_ok());
        }
    }

    /**
     * Delete every stored interval overlapping `[begin, end)`.
     */
    pub fn remove_overlap(&mut self, begin: K, end: K) {
        let doomed = self.take_hits(self.overlap(begin, end));
        for iv in doomed {
            let removed = self.remove(iv.as_ref());
            debug_assert!(removed.is_ok());
        }
    }

    /**
     * Delete every stored interval fully enveloped by `[begin, end)`.
     */
    pub fn remove_envelop(&mut self, begin: K, end: K) {
        let doomed = self.take_hits(self.envelop(begin, end));
        for iv in doomed {
            let removed = self.remove(iv.as_ref());
            debug_assert!(removed.is_ok());
        }
    }

    pub fn clear(&mut self) {
        self.root = None;
        self.boundary.clear();
        self.all.clear();
    }




    // ========================================================================
    /**
     * Punch the hole `[begin, end)` out of the tree: intervals inside the
     * hole disappear, intervals crossing an edge keep their outside
     * portion, and intervals enveloping the hole leave one fragment on
     * each side. Fragments keep the chopped interval's payload.
     */
    pub fn chop(&mut self, begin: K, end: K) -> Result<(), Error>
    where
        V: Clone,
    {
        self.chop_with(begin, end, |iv, _| iv.data().clone())
    }

    /**
     * As `chop`, but each fragment's payload is produced by `datafunc`,
     * which receives the chopped interval and whether the fragment is the
     * lower portion.
     */
    pub fn chop_with<F>(&mut self, begin: K, end: K, mut datafunc: F) -> Result<(), Error>
    where
        F: FnMut(&Interval<K, V>, bool) -> V,
    {
        if !(begin < end) {
            return Err(Error::InvalidInterval)
        }
        let mut fragments = Vec::new();
        for iv in self.at(begin) {
            if iv.begin() < begin {
                fragments.push(Interval::unchecked(iv.begin(), begin, datafunc(iv, true)));
            }
        }
        for iv in self.at(end) {
            if iv.end() > end {
                fragments.push(Interval::unchecked(end, iv.end(), datafunc(iv, false)));
            }
        }
        self.remove_envelop(begin, end);
        self.remove_overlap_point(begin);
        self.remove_overlap_point(end);
        for iv in fragments {
            self.add(iv);
        }
        Ok(())
    }

    /**
     * Split every interval with `point` in its strict interior into two
     * intervals meeting at `point`. Intervals beginning or ending exactly
     * at `point` are untouched.
     */
    pub fn slice(&mut self, point: K)
    where
        V: Clone,
    {
        self.slice_with(point, |iv, _| iv.data().clone())
    }

    /**
     * As `slice`, with `datafunc` producing each half's payload.
     */
    pub fn slice_with<F>(&mut self, point: K, mut datafunc: F)
    where
        F: FnMut(&Interval<K, V>, bool) -> V,
    {
        let mut halves = Vec::new();
        let mut hits = Vec::new();
        for iv in self.at(point) {
            if iv.begin() < point {
                halves.push(Interval::unchecked(iv.begin(), point, datafunc(iv, true)));
                halves.push(Interval::unchecked(point, iv.end(), datafunc(iv, false)));
                hits.push(iv);
            }
        }
        let doomed = self.take_hits(hits);
        for iv in doomed {
            let removed = self.remove(iv.as_ref());
            debug_assert!(removed.is_ok());
        }
        for iv in halves {
            self.add(iv);
        }
    }




    // ========================================================================
    /**
     * Collapse every maximal run of pairwise overlapping intervals — also
     * merely touching ones when `strict` is false — into one interval
     * spanning the run. A run that actually merged gets `V::default()` as
     * its payload; intervals that merged with nothing keep their own.
     *
     * Note that `strict = true` means "merge only overlapping, not merely
     * touching"; the naming is kept for compatibility with the tree's
     * ancestry.
     */
    pub fn merge_overlaps(&mut self, strict: bool)
    where
        V: Default,
    {
        self.merge_core(
            move |_, run_end, begin, _| begin < run_end || (!strict && begin == run_end),
            |acc, data| match acc {
                None => data,
                Some(_) => V::default(),
            },
        )
    }

    /**
     * As `merge_overlaps`, but a run's payload is the left fold of
     * `reducer` over its members' payloads, starting from the first.
     */
    pub fn merge_overlaps_with<F>(&mut self, strict: bool, mut reducer: F)
    where
        F: FnMut(V, V) -> V,
    {
        self.merge_core(
            move |_, run_end, begin, _| begin < run_end || (!strict && begin == run_end),
            move |acc, data| match acc {
                None => data,
                Some(acc) => reducer(acc, data),
            },
        )
    }

    /**
     * As `merge_overlaps_with`, but every run's fold starts from a copy of
     * `init`, so even unmerged intervals are folded once.
     */
    pub fn merge_overlaps_init<F>(&mut self, strict: bool, init: V, mut reducer: F)
    where
        V: Clone,
        F: FnMut(V, V) -> V,
    {
        self.merge_core(
            move |_, run_end, begin, _| begin < run_end || (!strict && begin == run_end),
            move |acc, data| {
                let acc = acc.unwrap_or_else(|| init.clone());
                reducer(acc, data)
            },
        )
    }

    /**
     * Collapse every maximal group of intervals sharing the same range
     * into one. Groups that actually merged get `V::default()`.
     */
    pub fn merge_equals(&mut self)
    where
        V: Default,
    {
        self.merge_core(
            |run_begin, run_end, begin, end| begin == run_begin && end == run_end,
            |acc, data| match acc {
                None => data,
                Some(_) => V::default(),
            },
        )
    }

    pub fn merge_equals_with<F>(&mut self, mut reducer: F)
    where
        F: FnMut(V, V) -> V,
    {
        self.merge_core(
            |run_begin, run_end, begin, end| begin == run_begin && end == run_end,
            move |acc, data| match acc {
                None => data,
                Some(acc) => reducer(acc, data),
            },
        )
    }

    pub fn merge_equals_init<F>(&mut self, init: V, mut reducer: F)
    where
        V: Clone,
        F: FnMut(V, V) -> V,
    {
        self.merge_core(
            |run_begin, run_end, begin, end| begin == run_begin && end == run_end,
            move |acc, data| {
                let acc = acc.unwrap_or_else(|| init.clone());
                reducer(acc, data)
            },
        )
    }

    /**
     * Walk the sorted intervals once, growing a run while `belongs` admits
     * the next interval and folding payloads with `step` (`None`
     * accumulator on the first member of a run), then rebuild the tree
     * from the merged spans.
     */
    fn merge_core<P, F>(&mut self, mut belongs: P, mut step: F)
    where
        P: FnMut(K, K, K, K) -> bool,
        F: FnMut(Option<V>, V) -> V,
    {
        if self.all.len() < 2 {
            return
        }
        let before = self.all.len();
        let mut merged: Vec<(K, K, V)> = Vec::new();
        let mut run: Option<(K, K, V)> = None;

        for iv in self.drain_sorted() {
            let (begin, end, data) = iv.into_parts();
            run = Some(match run.take() {
                Some((run_begin, run_end, acc)) if belongs(run_begin, run_end, begin, end) => {
                    let extended = if end > run_end { end } else { run_end };
                    (run_begin, extended, step(Some(acc), data))
                }
                Some(finished) => {
                    merged.push(finished);
                    (begin, end, step(None, data))
                }
                None => (begin, end, step(None, data)),
            });
        }
        if let Some(finished) = run {
            merged.push(finished);
        }
        debug!("merged {} intervals into {}", before, merged.len());
        *self = merged
            .into_iter()
            .map(|(begin, end, data)| Interval::unchecked(begin, end, data))
            .collect();
    }

    /**
     * Fracture every stored interval at every distinct boundary
     * coordinate, so that afterwards no interval strictly contains any
     * boundary. The set of boundary coordinates is unchanged.
     */
    pub fn split_overlaps(&mut self)
    where
        V: Clone,
    {
        if self.boundary.len() <= 2 {
            return
        }
        let bounds: Vec<K> = self.boundary.keys().collect();
        let mut pieces = Vec::new();
        for window in bounds.windows(2) {
            let (lower, upper) = (window[0], window[1]);
            for iv in self.at(lower) {
                pieces.push(Interval::unchecked(lower, upper, iv.data().clone()));
            }
        }
        debug!("split {} intervals into {} pieces", self.all.len(), pieces.len());
        *self = pieces.into_iter().collect();
    }




    // ========================================================================
    /**
     * Union of two trees' interval sets, as a new tree.
     */
    pub fn union(&self, other: &Self) -> Self
    where
        V: Clone,
    {
        self.iter().chain(other.iter()).cloned().collect()
    }

    /**
     * Absorb every interval of `other`.
     */
    pub fn union_update(&mut self, other: Self) {
        self.extend(other)
    }

    pub fn intersection(&self, other: &Self) -> Self
    where
        V: Clone,
    {
        self.iter().filter(|iv| other.contains(iv)).cloned().collect()
    }

    pub fn intersection_update(&mut self, other: &Self) {
        let kept: Vec<_> = self
            .drain_sorted()
            .into_iter()
            .filter(|iv| other.contains(iv))
            .collect();
        *self = kept.into_iter().collect();
    }

    pub fn difference(&self, other: &Self) -> Self
    where
        V: Clone,
    {
        self.iter().filter(|iv| !other.contains(iv)).cloned().collect()
    }

    pub fn difference_update(&mut self, other: &Self) {
        let kept: Vec<_> = self
            .drain_sorted()
            .into_iter()
            .filter(|iv| !other.contains(iv))
            .collect();
        *self = kept.into_iter().collect();
    }

    pub fn symmetric_difference(&self, other: &Self) -> Self
    where
        V: Clone,
    {
        self.iter()
            .filter(|iv| !other.contains(iv))
            .chain(other.iter().filter(|iv| !self.contains(iv)))
            .cloned()
            .collect()
    }

    pub fn symmetric_difference_update(&mut self, other: Self) {
        let mut from_other = Vec::new();
        let mut shared = BTreeSet::new();
        for iv in other {
            if self.contains(&iv) {
                shared.insert(iv);
            } else {
                from_other.push(iv);
            }
        }
        let mut kept: Vec<_> = self
            .drain_sorted()
            .into_iter()
            .filter(|iv| !shared.contains(iv))
            .collect();
        kept.extend(from_other);
        *self = kept.into_iter().collect();
    }




    // ========================================================================
    /**
     * The set of stored intervals containing the point.
     */
    pub fn at(&self, p: K) -> BTreeSet<&Interval<K, V>> {
        let mut result = BTreeSet::new();
        if let Some(root) = &self.root {
            root.search_point(p, &mut result);
        }
        result
    }

    /**
     * The set of stored intervals overlapping `[begin, end)`: everything
     * containing `begin`, plus everything found at each distinct boundary
     * coordinate strictly inside the range. A null range overlaps nothing.
     */
    pub fn overlap(&self, begin: K, end: K) -> BTreeSet<&Interval<K, V>> {
        let mut result = BTreeSet::new();
        if !(begin < end) {
            return result
        }
        if let Some(root) = &self.root {
            root.search_point(begin, &mut result);
            root.search_overlap(self.boundary.iter_between(begin, end), &mut result);
        }
        result
    }

    /**
     * The set of stored intervals fully enveloped by `[begin, end)`.
     */
    pub fn envelop(&self, begin: K, end: K) -> BTreeSet<&Interval<K, V>> {
        self.overlap(begin, end)
            .into_iter()
            .filter(|iv| iv.begin() >= begin && iv.end() <= end)
            .collect()
    }

    /**
     * Whether any stored interval contains the point.
     */
    pub fn overlaps_point(&self, p: K) -> bool {
        self.root.as_ref().map_or(false, |root| root.contains_point(p))
    }

    /**
     * Whether any stored interval overlaps `[begin, end)`.
     */
    pub fn overlaps_range(&self, begin: K, end: K) -> bool {
        if !(begin < end) {
            return false
        }
        if self.overlaps_point(begin) {
            return true
        }
        self.boundary
            .iter_between(begin, end)
            .any(|bound| self.overlaps_point(bound))
    }

    pub fn overlaps_interval(&self, iv: &Interval<K, V>) -> bool {
        self.overlaps_range(iv.begin(), iv.end())
    }




    // ========================================================================
    /**
     * The smallest stored coordinate, or zero for an empty tree.
     */
    pub fn begin(&self) -> K {
        self.boundary.min_key().unwrap_or_else(K::zero)
    }

    /**
     * The largest stored coordinate, or zero for an empty tree.
     */
    pub fn end(&self) -> K {
        self.boundary.max_key().unwrap_or_else(K::zero)
    }

    pub fn range(&self) -> (K, K) {
        (self.begin(), self.end())
    }

    pub fn span(&self) -> K {
        match (self.boundary.min_key(), self.boundary.max_key()) {
            (Some(min), Some(max)) => max - min,
            _ => K::zero(),
        }
    }

    /**
     * The last interval ending at or before the point: the maximum under
     * `(end, begin, data)` order among intervals with `end <= p`.
     */
    pub fn first_before(&self, p: K) -> Option<&Interval<K, V>> {
        self.iter()
            .filter(|iv| iv.end() <= p)
            .max_by(|a, b| {
                a.end()
                    .total_cmp(&b.end())
                    .then_with(|| a.begin().total_cmp(&b.begin()))
                    .then_with(|| a.data().cmp(b.data()))
            })
    }

    /**
     * The first interval beginning at or after the point: the minimum in
     * interval order among intervals with `begin >= p`.
     */
    pub fn first_after(&self, p: K) -> Option<&Interval<K, V>> {
        self.iter().find(|iv| iv.begin() >= p)
    }

    /**
     * Map each stored interval to the set of other stored intervals it
     * contains, testing containment in decreasing length order.
     */
    pub fn find_nested(&self) -> BTreeMap<&Interval<K, V>, BTreeSet<&Interval<K, V>>> {
        let mut by_length: Vec<&Interval<K, V>> = self.iter().collect();
        by_length.sort_by(|a, b| b.length().total_cmp(&a.length()));

        let mut result = BTreeMap::new();
        for (i, parent) in by_length.iter().enumerate() {
            for child in &by_length[i + 1..] {
                if parent.contains_interval(child) {
                    result
                        .entry(*parent)
                        .or_insert_with(BTreeSet::new)
                        .insert(*child);
                }
            }
        }
        result
    }




    // ========================================================================
    /**
     * Panic unless every structural invariant holds: the membership set
     * matches the node graph, the boundary index matches the stored
     * endpoints, and every node passes its own checks. For tests and
     * debugging; a failure means an implementation bug.
     */
    pub fn verify(&self) {
        if self.all.is_empty() {
            assert!(self.root.is_none(), "empty tree with a live root");
            assert!(self.boundary.is_empty(), "empty tree with live boundaries");
            return
        }
        let root = self.root.as_ref().expect("non-empty tree without a root");

        let mut reachable = BTreeSet::new();
        root.all_children(&mut reachable);
        let members: BTreeSet<&Interval<K, V>> = self.iter().collect();
        assert!(
            reachable == members,
            "membership set and node graph out of sync"
        );

        let mut expected = BoundaryIndex::new();
        for iv in self.iter() {
            expected.add(iv.begin());
            expected.add(iv.end());
        }
        assert!(
            self.boundary == expected,
            "boundary index out of sync with stored endpoints"
        );

        root.validate(&mut Vec::new());
    }




    // ========================================================================
    /**
     * Tear the tree down into its sorted intervals, leaving it empty.
     */
    fn drain_sorted(&mut self) -> Vec<Interval<K, V>> {
        self.root = None;
        self.boundary.clear();
        mem::take(&mut self.all)
            .into_iter()
            .map(|iv| Rc::try_unwrap(iv).ok().expect("interval still shared after teardown"))
            .collect()
    }

    /**
     * Resolve borrowed query hits into owned handles so the tree can be
     * mutated while they are processed.
     */
    fn take_hits<'a, I>(&self, hits: I) -> Vec<Rc<Interval<K, V>>>
    where
        I: IntoIterator<Item = &'a Interval<K, V>>,
        K: 'a,
        V: 'a,
    {
        hits.into_iter()
            .map(|iv| Rc::clone(self.all.get(iv).expect("query hit missing from membership set")))
            .collect()
    }
}




// ============================================================================
impl<K: Scalar, V: Ord + fmt::Debug> IntervalTree<K, V> {

    /**
     * An indented dump of the node structure. For debugging.
     */
    pub fn dump_structure(&self) -> String {
        match &self.root {
            None => String::from("<empty tree>\n"),
            Some(root) => {
                let mut out = String::new();
                root.dump(0, &mut out);
                out
            }
        }
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> Default for IntervalTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> FromIterator<Interval<K, V>> for IntervalTree<K, V> {
    fn from_iter<I: IntoIterator<Item = Interval<K, V>>>(iter: I) -> Self {
        let all: BTreeSet<Rc<Interval<K, V>>> = iter.into_iter().map(Rc::new).collect();
        let mut boundary = BoundaryIndex::new();
        for iv in &all {
            boundary.add(iv.begin());
            boundary.add(iv.end());
        }
        let root = Node::from_sorted(all.iter().map(Rc::clone).collect());
        debug!("built interval tree over {} intervals", all.len());
        Self { root, boundary, all }
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> Extend<Interval<K, V>> for IntervalTree<K, V> {
    fn extend<I: IntoIterator<Item = Interval<K, V>>>(&mut self, iter: I) {
        for iv in iter {
            self.add(iv);
        }
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> IntoIterator for IntervalTree<K, V> {
    type Item = Interval<K, V>;
    type IntoIter = std::vec::IntoIter<Interval<K, V>>;

    fn into_iter(mut self) -> Self::IntoIter {
        self.drain_sorted().into_iter()
    }
}




// ============================================================================
impl<K: Scalar, V: Ord + Clone> Clone for IntervalTree<K, V> {
    fn clone(&self) -> Self {
        self.iter().cloned().collect()
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> PartialEq for IntervalTree<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.all == other.all
    }
}

impl<K: Scalar, V: Ord> Eq for IntervalTree<K, V> {}




// ============================================================================
impl<K: Scalar, V: Ord + fmt::Debug> fmt::Debug for IntervalTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IntervalTree")?;
        f.debug_set().entries(self.iter()).finish()
    }
}




// ============================================================================
impl<K, V> Serialize for IntervalTree<K, V>
where
    K: Scalar + Serialize,
    V: Ord + Serialize,
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de, K, V> Deserialize<'de> for IntervalTree<K, V>
where
    K: Scalar + Deserialize<'de>,
    V: Ord + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let intervals = Vec::<Interval<K, V>>::deserialize(deserializer)?;
        Ok(intervals.into_iter().collect())
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use std::collections::BTreeSet;
    use crate::error::Error;
    use crate::interval::Interval;
    use super::IntervalTree;

    fn iv(begin: i64, end: i64, data: &'static str) -> Interval<i64, &'static str> {
        Interval::new(begin, end, data).unwrap()
    }

    /**
     * The labeled nine-interval fixture used throughout the query and
     * restructuring tests.
     */
    fn ivs1() -> Vec<Interval<i64, &'static str>> {
        vec![
            iv(1, 2, "[1,2)"),
            iv(4, 7, "[4,7)"),
            iv(5, 9, "[5,9)"),
            iv(6, 10, "[6,10)"),
            iv(8, 10, "[8,10)"),
            iv(8, 15, "[8,15)"),
            iv(10, 12, "[10,12)"),
            iv(12, 14, "[12,14)"),
            iv(14, 15, "[14,15)"),
        ]
    }

    fn tree1() -> IntervalTree<i64, &'static str> {
        ivs1().into_iter().collect()
    }

    fn set_data(result: BTreeSet<&Interval<i64, &'static str>>) -> BTreeSet<&'static str> {
        result.into_iter().map(|iv| *iv.data()).collect()
    }

    fn labels(items: &[&'static str]) -> BTreeSet<&'static str> {
        items.iter().copied().collect()
    }

    fn spans<V: Ord>(tree: &IntervalTree<i64, V>) -> Vec<(i64, i64)> {
        tree.iter().map(|iv| (iv.begin(), iv.end())).collect()
    }

    /**
     * Observational equality: same membership and same answer to every
     * probe over the fixture's coordinate range.
     */
    fn observationally_equal(
        a: &IntervalTree<i64, &'static str>,
        b: &IntervalTree<i64, &'static str>,
    ) -> bool {
        if a != b || a.begin() != b.begin() || a.end() != b.end() {
            return false
        }
        for p in -2..22 {
            if a.at(p) != b.at(p) {
                return false
            }
            for q in p + 1..22 {
                if a.overlap(p, q) != b.overlap(p, q) {
                    return false
                }
            }
        }
        true
    }

    #[test]
    fn query_the_labeled_set_by_point_and_range() {
        let t = tree1();
        t.verify();
        assert_eq!(set_data(t.at(4)), labels(&["[4,7)"]));
        assert_eq!(set_data(t.at(9)), labels(&["[6,10)", "[8,10)", "[8,15)"]));
        assert_eq!(set_data(t.at(15)), labels(&[]));
        assert_eq!(
            set_data(t.overlap(6, 11)),
            labels(&["[4,7)", "[5,9)", "[6,10)", "[8,10)", "[8,15)", "[10,12)"])
        );
        assert_eq!(set_data(t.envelop(6, 11)), labels(&["[6,10)", "[8,10)"]));
        assert_eq!(set_data(t.overlap(11, 7)), labels(&[]));
    }

    #[test]
    fn boolean_overlap_queries() {
        let t = tree1();
        assert!(t.overlaps_point(4));
        assert!(t.overlaps_point(9));
        assert!(!t.overlaps_point(15));
        assert!(t.overlaps_range(0, 4));
        assert!(t.overlaps_range(1, 2));
        assert!(t.overlaps_range(1, 3));
        assert!(t.overlaps_range(8, 15));
        assert!(!t.overlaps_range(15, 16));
        assert!(!t.overlaps_range(-1, 0));
        assert!(!t.overlaps_range(2, 4));
        assert!(!t.overlaps_range(5, 5));
    }

    #[test]
    fn membership_is_exact_match() {
        let t = tree1();
        assert!(t.contains(&iv(4, 7, "[4,7)")));
        assert!(!t.contains(&iv(4, 7, "other")));
        assert!(!t.contains(&iv(1, 3, "[1,3)")));
        assert!(t.contains_range(4, 7, "[4,7)"));
        assert!(!t.contains_range(7, 4, "[4,7)"));
    }

    #[test]
    fn extents_over_the_labeled_set() {
        let t = tree1();
        assert_eq!(t.begin(), 1);
        assert_eq!(t.end(), 15);
        assert_eq!(t.range(), (1, 15));
        assert_eq!(t.span(), 14);

        let empty: IntervalTree<i64, &'static str> = IntervalTree::new();
        assert_eq!(empty.begin(), 0);
        assert_eq!(empty.end(), 0);
        assert_eq!(empty.span(), 0);
    }

    #[test]
    fn adding_a_duplicate_changes_nothing() {
        let mut t = tree1();
        let before = t.clone();
        assert!(!t.add(iv(1, 2, "[1,2)")));
        t.verify();
        assert!(observationally_equal(&t, &before));

        assert!(t.add(iv(2, 4, "[2,4)")));
        assert_eq!(set_data(t.at(2)), labels(&["[2,4)"]));
        t.verify();
    }

    #[test]
    fn add_then_remove_restores_the_prior_state() {
        let mut t = tree1();
        let before = t.clone();
        let extra = iv(3, 11, "[3,11)");
        assert!(t.add(extra.clone()));
        t.verify();
        assert!(!observationally_equal(&t, &before));
        t.remove(&extra).unwrap();
        t.verify();
        assert!(observationally_equal(&t, &before));
    }

    #[test]
    fn removal_of_a_missing_interval_fails_and_leaves_the_tree_alone() {
        let mut t = tree1();
        let before = t.clone();
        assert_eq!(t.remove(&iv(1, 3, "nope")).unwrap_err(), Error::NotFound);
        assert_eq!(t.remove(&iv(500, 1000, "nope")).unwrap_err(), Error::NotFound);
        assert!(observationally_equal(&t, &before));

        assert!(!t.discard(&iv(1, 3, "nope")));
        assert!(!t.discard(&iv(500, 1000, "nope")));
        assert!(observationally_equal(&t, &before));

        assert!(t.discard(&iv(14, 15, "[14,15)")));
        assert_eq!(set_data(t.at(14)), labels(&["[8,15)"]));
        t.verify();
    }

    #[test]
    fn null_intervals_are_rejected_without_mutation() {
        let mut t = tree1();
        let before = t.clone();
        assert_eq!(t.add_range(1, 0, "null").unwrap_err(), Error::InvalidInterval);
        assert_eq!(t.add_range(1, 1, "null").unwrap_err(), Error::InvalidInterval);
        assert_eq!(t.remove_range(1, 0, "null").unwrap_err(), Error::InvalidInterval);
        assert_eq!(t.chop(5, 5).unwrap_err(), Error::InvalidInterval);
        assert_eq!(t.chop(9, 2).unwrap_err(), Error::InvalidInterval);
        assert!(observationally_equal(&t, &before));
        t.verify();
    }

    #[test]
    fn emptying_by_sorted_removal() {
        let mut t = tree1();
        for iv in t.items() {
            t.remove(&iv).unwrap();
            t.verify();
        }
        assert_eq!(t.len(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn remove_overlap_and_envelop() {
        let mut t = tree1();
        assert!(!t.at(14).is_empty());
        t.remove_overlap_point(14);
        t.verify();
        assert!(t.at(14).is_empty());

        let mut t = tree1();
        t.remove_overlap(6, 11);
        t.verify();
        assert_eq!(spans(&t), vec![(1, 2), (12, 14), (14, 15)]);

        let mut t = tree1();
        t.remove_envelop(6, 11);
        t.verify();
        assert!(!t.contains(&iv(6, 10, "[6,10)")));
        assert!(!t.contains(&iv(8, 10, "[8,10)")));
        assert_eq!(t.len(), 7);
    }

    #[test]
    fn float_sequence_with_verification() {
        let mut t: IntervalTree<f64, ()> = IntervalTree::new();
        let addi = |t: &mut IntervalTree<f64, ()>, b: f64, e: f64| {
            t.add_range(b, e, ()).unwrap();
            t.verify();
        };
        let removei = |t: &mut IntervalTree<f64, ()>, b: f64, e: f64| {
            t.remove_range(b, e, ()).unwrap();
            t.verify();
        };
        addi(&mut t, 6.37, 11.37);
        addi(&mut t, 12.09, 17.09);
        addi(&mut t, 5.68, 11.58);
        removei(&mut t, 6.37, 11.37);
        addi(&mut t, 13.23, 18.23);
        removei(&mut t, 12.09, 17.09);
        addi(&mut t, 4.29, 8.29);
        removei(&mut t, 13.23, 18.23);
        addi(&mut t, 12.04, 17.04);
        addi(&mut t, 9.39, 13.39);
        removei(&mut t, 5.68, 11.58);
        removei(&mut t, 4.29, 8.29);
        removei(&mut t, 12.04, 17.04);
        addi(&mut t, 5.66, 9.66);
        addi(&mut t, 8.65, 13.65);
        removei(&mut t, 9.39, 13.39);
        addi(&mut t, 16.49, 20.83);
        addi(&mut t, 11.42, 16.42);
        addi(&mut t, 5.38, 10.38);
        addi(&mut t, 3.57, 9.47);
        removei(&mut t, 8.65, 13.65);
        removei(&mut t, 5.66, 9.66);
        removei(&mut t, 5.38, 10.38);
    }

    #[test]
    fn chop_trims_removes_and_fragments() {
        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(0, 10, "x")).collect();
        t.chop(3, 7).unwrap();
        t.verify();
        assert_eq!(spans(&t), vec![(0, 3), (7, 10)]);

        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(0, 10, "x")).collect();
        t.chop(0, 10).unwrap();
        t.verify();
        assert!(t.is_empty());

        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(0, 10, "x")).collect();
        t.chop(-5, 15).unwrap();
        t.verify();
        assert!(t.is_empty());

        let mut t = tree1();
        t.chop(3, 11).unwrap();
        t.verify();
        assert_eq!(spans(&t), vec![(1, 2), (11, 12), (11, 15), (12, 14), (14, 15)]);
    }

    #[test]
    fn chop_with_renames_the_fragments() {
        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(0, 10, "x")).collect();
        t.chop_with(3, 7, |_, lower| if lower { "lo" } else { "hi" }).unwrap();
        t.verify();
        assert!(t.contains(&iv(0, 3, "lo")));
        assert!(t.contains(&iv(7, 10, "hi")));
    }

    #[test]
    fn slice_splits_only_strict_interiors() {
        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(5, 15, "x")).collect();
        t.slice(10);
        t.verify();
        assert_eq!(spans(&t), vec![(5, 10), (10, 15)]);

        for p in [5, 15, 0, 20].iter().copied() {
            let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(5, 15, "x")).collect();
            t.slice(p);
            t.verify();
            assert_eq!(spans(&t), vec![(5, 15)]);
        }

        let mut t: IntervalTree<i64, &'static str> = std::iter::once(iv(5, 15, "x")).collect();
        t.slice_with(10, |_, lower| if lower { "lo" } else { "hi" });
        assert!(t.contains(&iv(5, 10, "lo")));
        assert!(t.contains(&iv(10, 15, "hi")));
    }

    #[test]
    fn merge_overlaps_collapses_runs() {
        let mut t = tree1();
        t.merge_overlaps(true);
        t.verify();
        assert_eq!(spans(&t), vec![(1, 2), (4, 15)]);
        assert_eq!(*t.iter().next().unwrap().data(), "[1,2)");

        // merely touching intervals merge only when strict is off
        let mut t: IntervalTree<i64, &'static str> =
            vec![iv(1, 2, "a"), iv(2, 3, "b")].into_iter().collect();
        t.merge_overlaps(true);
        t.verify();
        assert_eq!(spans(&t), vec![(1, 2), (2, 3)]);
        t.merge_overlaps(false);
        t.verify();
        assert_eq!(spans(&t), vec![(1, 3)]);
    }

    #[test]
    fn merge_overlaps_folds_payloads() {
        let data = vec![(0, 10, 1), (5, 20, 2), (30, 40, 4)];
        let mut t: IntervalTree<i64, i32> = data
            .into_iter()
            .map(|(b, e, d)| Interval::new(b, e, d).unwrap())
            .collect();
        t.merge_overlaps_with(true, |a, b| a + b);
        t.verify();
        assert_eq!(spans(&t), vec![(0, 20), (30, 40)]);
        let payloads: Vec<i32> = t.iter().map(|iv| *iv.data()).collect();
        assert_eq!(payloads, vec![3, 4]);

        let mut t: IntervalTree<i64, i32> =
            vec![Interval::new(0, 10, 1).unwrap(), Interval::new(5, 20, 2).unwrap()]
                .into_iter()
                .collect();
        t.merge_overlaps_init(true, 10, |a, b| a + b);
        let payloads: Vec<i32> = t.iter().map(|iv| *iv.data()).collect();
        assert_eq!(payloads, vec![13]);
    }

    #[test]
    fn merge_equals_collapses_same_span_groups() {
        let data = vec![(0, 5, 1), (0, 5, 2), (3, 8, 4)];
        let mut t: IntervalTree<i64, i32> = data
            .into_iter()
            .map(|(b, e, d)| Interval::new(b, e, d).unwrap())
            .collect();
        t.merge_equals_with(|a, b| a + b);
        t.verify();
        assert_eq!(spans(&t), vec![(0, 5), (3, 8)]);
        let payloads: Vec<i32> = t.iter().map(|iv| *iv.data()).collect();
        assert_eq!(payloads, vec![3, 4]);
    }

    #[test]
    fn merged_tree_covers_exactly_the_original_points() {
        let t = tree1();
        let mut merged = t.clone();
        merged.merge_overlaps(true);
        merged.verify();
        for p in -2..22 {
            let covered = !t.at(p).is_empty();
            let hits = merged.at(p);
            assert_eq!(covered, !hits.is_empty());
            assert!(hits.len() <= 1);
        }
        let merged_ivs: Vec<_> = merged.iter().collect();
        for pair in merged_ivs.windows(2) {
            assert!(!pair[0].overlaps(pair[1]));
        }
    }

    #[test]
    fn split_overlaps_fractures_at_every_boundary() {
        let mut t = tree1();
        let bounds_before: Vec<i64> = {
            let mut b: Vec<i64> = t.iter().flat_map(|iv| vec![iv.begin(), iv.end()]).collect();
            b.sort_unstable();
            b.dedup();
            b
        };
        t.split_overlaps();
        t.verify();
        for iv in t.iter() {
            for b in &bounds_before {
                assert!(
                    !(iv.begin() < *b && *b < iv.end()),
                    "piece [{}, {}) still spans boundary {}",
                    iv.begin(), iv.end(), b
                );
            }
        }
        let bounds_after: Vec<i64> = {
            let mut b: Vec<i64> = t.iter().flat_map(|iv| vec![iv.begin(), iv.end()]).collect();
            b.sort_unstable();
            b.dedup();
            b
        };
        assert_eq!(bounds_before, bounds_after);

        let once = t.clone();
        t.split_overlaps();
        t.verify();
        assert_eq!(t, once);
    }

    #[test]
    fn set_algebra_laws() {
        let a: IntervalTree<i64, &'static str> =
            vec![iv(0, 5, "a"), iv(3, 9, "b"), iv(10, 12, "c")].into_iter().collect();
        let b: IntervalTree<i64, &'static str> =
            vec![iv(3, 9, "b"), iv(11, 14, "d")].into_iter().collect();
        let c: IntervalTree<i64, &'static str> =
            vec![iv(0, 5, "a"), iv(20, 22, "e")].into_iter().collect();
        let empty: IntervalTree<i64, &'static str> = IntervalTree::new();

        assert_eq!(a.union(&b), b.union(&a));
        assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
        assert_eq!(a.intersection(&b), b.intersection(&a));
        assert_eq!(
            a.intersection(&b).intersection(&c),
            a.intersection(&b.intersection(&c))
        );
        assert_eq!(a.difference(&a), empty);
        assert_eq!(a.union(&empty), a);
        assert_eq!(
            a.symmetric_difference(&b),
            a.union(&b).difference(&a.intersection(&b))
        );

        let mut u = a.clone();
        u.union_update(b.clone());
        u.verify();
        assert_eq!(u, a.union(&b));

        let mut i = a.clone();
        i.intersection_update(&b);
        i.verify();
        assert_eq!(i, a.intersection(&b));

        let mut d = a.clone();
        d.difference_update(&b);
        d.verify();
        assert_eq!(d, a.difference(&b));

        let mut s = a.clone();
        s.symmetric_difference_update(b.clone());
        s.verify();
        assert_eq!(s, a.symmetric_difference(&b));
    }

    #[test]
    fn build_order_does_not_matter() {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let reference = tree1();
        for seed in 0..10 {
            let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
            let mut shuffled = ivs1();
            shuffled.shuffle(&mut rng);
            let mut t = IntervalTree::new();
            for iv in shuffled {
                t.add(iv);
                t.verify();
            }
            assert!(observationally_equal(&t, &reference));
        }
    }

    #[test]
    fn bulk_and_incremental_construction_agree() {
        let bulk = tree1();
        let mut incremental = IntervalTree::new();
        for iv in ivs1() {
            incremental.add(iv);
        }
        incremental.verify();
        bulk.verify();
        assert!(observationally_equal(&bulk, &incremental));
    }

    #[test]
    fn snapshot_round_trip_preserves_observations() {
        let t = tree1();
        let rebuilt: IntervalTree<i64, &'static str> = t.items().into_iter().collect();
        rebuilt.verify();
        assert!(observationally_equal(&t, &rebuilt));
    }

    #[test]
    fn serialized_round_trip_preserves_observations() {
        let t: IntervalTree<i64, String> = ivs1()
            .into_iter()
            .map(|iv| Interval::new(iv.begin(), iv.end(), iv.data().to_string()).unwrap())
            .collect();
        let bytes = rmp_serde::to_vec(&t).unwrap();
        let back: IntervalTree<i64, String> = rmp_serde::from_read_ref(&bytes).unwrap();
        back.verify();
        assert_eq!(t, back);
        assert_eq!(t.at(9), back.at(9));
        assert_eq!(t.overlap(6, 11), back.overlap(6, 11));
    }

    #[test]
    fn first_before_and_first_after() {
        let t = tree1();
        assert_eq!(*t.first_after(7).unwrap(), iv(8, 10, "[8,10)"));
        assert_eq!(*t.first_after(8).unwrap(), iv(8, 10, "[8,10)"));
        assert_eq!(*t.first_after(13).unwrap(), iv(14, 15, "[14,15)"));
        assert_eq!(*t.first_after(4).unwrap(), iv(4, 7, "[4,7)"));
        assert_eq!(*t.first_after(5).unwrap(), iv(5, 9, "[5,9)"));
        assert!(t.first_after(16).is_none());

        assert_eq!(*t.first_before(5).unwrap(), iv(1, 2, "[1,2)"));
        assert_eq!(*t.first_before(7).unwrap(), iv(4, 7, "[4,7)"));
        assert_eq!(*t.first_before(10).unwrap(), iv(8, 10, "[8,10)"));
        assert_eq!(*t.first_before(15).unwrap(), iv(14, 15, "[14,15)"));
        assert!(t.first_before(1).is_none());
    }

    #[test]
    fn find_nested_maps_parents_to_contained_children() {
        let t = tree1();
        let nested = t.find_nested();
        let parent = iv(8, 15, "[8,15)");
        let children: BTreeSet<&'static str> = nested
            .get(&parent)
            .map(|set| set.iter().map(|iv| *iv.data()).collect())
            .unwrap_or_default();
        assert_eq!(children, labels(&["[8,10)", "[10,12)", "[12,14)", "[14,15)"]));
        assert!(!nested.contains_key(&iv(1, 2, "[1,2)")));
    }

    #[test]
    fn extend_adds_every_interval() {
        let mut t: IntervalTree<i64, &'static str> = IntervalTree::new();
        t.extend(ivs1());
        t.verify();
        assert_eq!(t, tree1());
        assert_eq!(t.len(), 9);
    }

    #[test]
    fn clearing_empties_the_tree() {
        let mut t = tree1();
        t.clear();
        t.verify();
        assert!(t.is_empty());
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn randomized_mutation_soak() {
        let mut t: IntervalTree<i64, usize> = IntervalTree::new();
        let mut live = Vec::new();
        let mut seed: usize = 97;
        for tag in 0..400 {
            seed = (1103515245 * seed + 12345) % (1 << 31);
            let begin = (seed % 1000) as i64;
            let span = (seed % 53) as i64 + 1;
            let iv = Interval::new(begin, begin + span, tag).unwrap();
            if seed % 3 == 0 && !live.is_empty() {
                let victim: Interval<i64, usize> = live.swap_remove(seed % live.len());
                t.remove(&victim).unwrap();
            } else {
                t.add(iv.clone());
                live.push(iv);
            }
            t.verify();
        }
        assert_eq!(t.len(), live.len());
    }
}
