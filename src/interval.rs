use core::cmp::Ordering;
use core::fmt;
use serde::{Deserialize, Deserializer, Serialize};
use crate::error::Error;
use crate::scalar::Scalar;




/**
 * An immutable half-open interval `[begin, end)` carrying a payload.
 *
 * A point `p` is contained when `begin <= p < end`. Construction validates
 * `begin < end`, so a null interval cannot exist; everything downstream
 * relies on that. Two intervals are equal when all three fields are equal,
 * and the total order compares `begin`, then `end`, then the payload.
 */
#[derive(Clone, Serialize)]
pub struct Interval<K: Scalar, V> {
    pub(crate) begin: K,
    pub(crate) end: K,
    pub(crate) data: V,
}




// ============================================================================
impl<K: Scalar, V> Interval<K, V> {

    /**
     * Create an interval, rejecting a null range.
     */
    pub fn new(begin: K, end: K, data: V) -> Result<Self, Error> {
        if begin < end {
            Ok(Self { begin, end, data })
        } else {
            Err(Error::InvalidInterval)
        }
    }

    /**
     * Internal constructor for ranges already known to be non-null.
     */
    pub(crate) fn unchecked(begin: K, end: K, data: V) -> Self {
        debug_assert!(begin < end);
        Self { begin, end, data }
    }

    pub fn begin(&self) -> K {
        self.begin
    }

    pub fn end(&self) -> K {
        self.end
    }

    pub fn data(&self) -> &V {
        &self.data
    }

    pub fn into_data(self) -> V {
        self.data
    }

    pub(crate) fn into_parts(self) -> (K, K, V) {
        (self.begin, self.end, self.data)
    }

    pub fn length(&self) -> K {
        self.end - self.begin
    }

    /**
     * Whether `begin <= p < end`.
     */
    pub fn contains_point(&self, p: K) -> bool {
        self.begin <= p && p < self.end
    }

    /**
     * Whether this interval spans the whole of `other`.
     */
    pub fn contains_interval(&self, other: &Self) -> bool {
        self.begin <= other.begin && self.end >= other.end
    }

    /**
     * Whether the two half-open ranges share at least one point.
     */
    pub fn overlaps(&self, other: &Self) -> bool {
        self.begin < other.end && other.begin < self.end
    }

    /**
     * Whether this interval shares at least one point with `[begin, end)`.
     * A null query range overlaps nothing.
     */
    pub fn overlaps_range(&self, begin: K, end: K) -> bool {
        begin < end && self.begin < end && begin < self.end
    }

    /**
     * Whether the two intervals cover exactly the same range, ignoring
     * their payloads.
     */
    pub fn range_matches(&self, other: &Self) -> bool {
        self.begin.total_cmp(&other.begin) == Ordering::Equal
            && self.end.total_cmp(&other.end) == Ordering::Equal
    }

    /**
     * The size of the gap separating this interval from `other`: zero when
     * they overlap or touch.
     */
    pub fn distance_to(&self, other: &Self) -> K {
        if self.overlaps(other) {
            K::zero()
        } else if self.begin < other.begin {
            other.begin - self.end
        } else {
            self.begin - other.end
        }
    }

    /**
     * Whether this interval lies entirely before `other`, with no shared
     * point.
     */
    pub fn precedes(&self, other: &Self) -> bool {
        self.end <= other.begin
    }

    /**
     * Whether this interval lies entirely after `other`, with no shared
     * point.
     */
    pub fn succeeds(&self, other: &Self) -> bool {
        self.begin >= other.end
    }

    /**
     * Whether this interval extends no further than `other` does.
     */
    pub fn ends_before(&self, other: &Self) -> bool {
        self.end <= other.end
    }

    /**
     * Whether this interval starts no earlier than `other` does.
     */
    pub fn begins_after(&self, other: &Self) -> bool {
        self.begin >= other.begin
    }
}




// ============================================================================
impl<K: Scalar, V: Ord> Ord for Interval<K, V> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.begin
            .total_cmp(&other.begin)
            .then_with(|| self.end.total_cmp(&other.end))
            .then_with(|| self.data.cmp(&other.data))
    }
}

impl<K: Scalar, V: Ord> PartialOrd for Interval<K, V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Scalar, V: Ord> PartialEq for Interval<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<K: Scalar, V: Ord> Eq for Interval<K, V> {}




// ============================================================================
impl<K: Scalar, V: fmt::Debug> fmt::Debug for Interval<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Interval({:?}, {:?}, {:?})", self.begin, self.end, self.data)
    }
}




// ============================================================================
impl<'de, K, V> Deserialize<'de> for Interval<K, V>
where
    K: Scalar + Deserialize<'de>,
    V: Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw<K, V> {
            begin: K,
            end: K,
            data: V,
        }

        let raw = Raw::<K, V>::deserialize(deserializer)?;
        Interval::new(raw.begin, raw.end, raw.data).map_err(serde::de::Error::custom)
    }
}
