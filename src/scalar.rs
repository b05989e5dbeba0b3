use core::cmp::Ordering;
use core::fmt::Debug;
use num_traits::Num;




/**
 * Trait for coordinate types usable as interval endpoints. Integer and
 * floating point primitives all qualify. The arithmetic bounds come from
 * `num_traits`: zero is the extent of an empty tree, and one is the step
 * used when re-centering a node on the predecessor of an endpoint.
 *
 * `total_cmp` must impose a total order consistent with `PartialOrd` on
 * every value that can appear as an endpoint. Floats use the IEEE-754 total
 * order, which lets them serve as search-tree keys.
 */
pub trait Scalar: Copy + PartialOrd + Num + Debug {
    fn total_cmp(&self, other: &Self) -> Ordering;
}




// ============================================================================
macro_rules! scalar_int {
    ($($t:ty)*) => {$(
        impl Scalar for $t {
            fn total_cmp(&self, other: &Self) -> Ordering {
                Ord::cmp(self, other)
            }
        }
    )*}
}

scalar_int!(i8 i16 i32 i64 i128 isize u8 u16 u32 u64 u128 usize);

impl Scalar for f32 {
    fn total_cmp(&self, other: &Self) -> Ordering {
        f32::total_cmp(self, other)
    }
}

impl Scalar for f64 {
    fn total_cmp(&self, other: &Self) -> Ordering {
        f64::total_cmp(self, other)
    }
}




/**
 * Adapter imposing the `Scalar` total order on ordered-map keys, so that
 * float coordinates can key a `BTreeMap`.
 */
#[derive(Clone, Copy, Debug)]
pub(crate) struct OrdKey<K: Scalar>(pub(crate) K);




// ============================================================================
impl<K: Scalar> PartialEq for OrdKey<K> {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl<K: Scalar> Eq for OrdKey<K> {}

impl<K: Scalar> PartialOrd for OrdKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Scalar> Ord for OrdKey<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}
