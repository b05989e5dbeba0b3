use thiserror::Error;




/**
 * Error to represent a rejected interval or a failed removal. Corrupted
 * internal state is never reported through this type: structural checks
 * assert and abort, since only an implementation bug can trip them.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// A null interval or mutation range, whose begin is not strictly less
    /// than its end.
    #[error("null interval: begin must be strictly less than end")]
    InvalidInterval,

    /// Removal of an interval that is not in the tree.
    #[error("interval not found in tree")]
    NotFound,
}
