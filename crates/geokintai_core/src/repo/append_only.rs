//! Append-only invariant check.
//!
//! Generic over any comparable element so every ledger (and any snapshot of
//! one) can be checked the same way.

/// Returns whether `next` is `previous` with zero or more elements appended.
///
/// False when `next` is shorter, or when any element of the shared prefix
/// differs.
pub fn is_append_only<T: PartialEq>(previous: &[T], next: &[T]) -> bool {
    next.len() >= previous.len() && next[..previous.len()] == *previous
}
