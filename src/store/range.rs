//! Ordered key-range selection shared by backends without native ordered
//! iteration.

use std::ops::Range;

/// Sort `keys` and trim them to the `[prefix, limit)` window.
///
/// The window starts at the first key carrying `prefix` (no front trim if
/// none does) and ends just before the first later key carrying `limit` (no
/// back trim if none does). Empty `prefix`/`limit` disable their bound.
pub fn select_range<S>(mut keys: Vec<S>, prefix: &str, limit: &str) -> Vec<S>
where
    S: AsRef<str> + Ord,
{
    keys.sort_unstable();
    let bounds = window(&keys, prefix, limit);
    keys.truncate(bounds.end);
    keys.drain(..bounds.start);
    keys
}

/// Index window of `[prefix, limit)` within already sorted `keys`
pub fn window<S: AsRef<str>>(sorted: &[S], prefix: &str, limit: &str) -> Range<usize> {
    let start = if prefix.is_empty() {
        0
    } else {
        sorted
            .iter()
            .position(|k| k.as_ref().starts_with(prefix))
            .unwrap_or(0)
    };

    let end = if limit.is_empty() {
        sorted.len()
    } else {
        sorted[start..]
            .iter()
            .position(|k| k.as_ref().starts_with(limit))
            .map_or(sorted.len(), |offset| start + offset)
    };

    start..end
}
