use std::iter::repeat;
use std::path::{Path, PathBuf};

pub fn find_first_subpath<P: AsRef<Path>, F: Fn(&Path) -> bool>(
    root: impl AsRef<Path>,
    subpaths: &[P],
    search: F,
) -> Option<PathBuf> {
    subpaths
        .iter()
        .zip(repeat(root.as_ref()))
        .map(|(b, a)| a.join(b))
        .find(|it: &PathBuf| search(it))
}

/// Converts a decimal price into the smallest currency unit (cents).
///
/// Returns `None` for prices that can't be charged: non-finite, zero or negative.
pub fn price_to_minor_units(price: f64) -> Option<i64> {
    if !price.is_finite() || price <= 0.0 {
        return None;
    }
    let amount = (price * 100.0).round();
    if amount < 1.0 || amount > i64::MAX as f64 {
        return None;
    }
    Some(amount as i64)
}
