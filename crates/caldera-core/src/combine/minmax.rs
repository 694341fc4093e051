use crate::consts::MIN_REJECTION_STACK;

/// Discard the single lowest and single highest value of a pixel stack.
///
/// Survivors are moved to the front and their count returned. Stacks of
/// fewer than three values are kept whole.
pub fn minmax_reject(values: &mut [f32]) -> usize {
    let len = values.len();
    if len < MIN_REJECTION_STACK {
        return len;
    }

    let last = len - 1;
    let min_idx = index_of(values, |a, b| a < b);
    values.swap(min_idx, last);

    let max_idx = index_of(&values[..last], |a, b| a > b);
    values.swap(max_idx, last - 1);

    len - 2
}

fn index_of(values: &[f32], better: impl Fn(f32, f32) -> bool) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if better(v, values[best]) {
            best = i;
        }
    }
    best
}
