//! Even temporal subsampling under a fixed frame budget.

/// Indices `floor(i * len / budget)` for `i in 0..budget`.
///
/// When `len <= budget` every index is returned. The result is strictly
/// increasing and starts at 0 whenever it is non-empty.
pub fn even_subsample_indices(len: usize, budget: usize) -> Vec<usize> {
    if len <= budget {
        return (0..len).collect();
    }
    (0..budget).map(|i| i * len / budget).collect()
}

/// Pick at most `budget` items spread evenly over `items`.
pub fn even_subsample<T: Clone>(items: &[T], budget: usize) -> Vec<T> {
    even_subsample_indices(items.len(), budget)
        .into_iter()
        .map(|i| items[i].clone())
        .collect()
}
