//! Join path hop descriptors.
//!
//! A join path is a list of strings, nearest-target-first. A hop is either
//! `"<index>:<field>"` or a bare `"<index>"` separator marking the boundary
//! between two links that meet in that index.

/// Separator between index and field in a field hop.
pub const HOP_SEPARATOR: char = ':';

/// Encode a field hop.
pub fn field_hop(index: &str, field: &str) -> String {
    format!("{index}{HOP_SEPARATOR}{field}")
}

/// Check if a hop names a field (as opposed to a bare index separator).
pub fn is_field_hop(hop: &str) -> bool {
    hop.contains(HOP_SEPARATOR)
}

/// Split a field hop into `(index, field)` at the first separator.
pub fn split_hop(hop: &str) -> Option<(&str, &str)> {
    hop.split_once(HOP_SEPARATOR)
}
