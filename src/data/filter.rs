use std::collections::BTreeSet;

use super::catalog::Catalog;

// ---------------------------------------------------------------------------
// Object filter
// ---------------------------------------------------------------------------

/// Selected object names. An empty set means "no filter" (show all).
pub type ObjectFilter = BTreeSet<String>;

/// Indices of observations whose object passes `filter`.
pub fn filtered_indices(catalog: &Catalog, filter: &ObjectFilter) -> Vec<usize> {
    catalog
        .observations
        .iter()
        .enumerate()
        .filter(|(_, obs)| filter.is_empty() || filter.contains(&obs.meta.object))
        .map(|(i, _)| i)
        .collect()
}

/// Flip one object in or out of the filter.
pub fn toggle(filter: &mut ObjectFilter, object: &str) {
    if !filter.remove(object) {
        filter.insert(object.to_string());
    }
}
