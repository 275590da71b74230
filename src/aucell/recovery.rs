//! A member with 0-based database rank `r` is recovered at position
//! `x = r + 1`; `r(x)` counts (or weighs) members with position `<= x`.

/// Each member at position `p <= rank_cutoff` contributes `w * (cutoff - p + 1)`,
/// i.e. it is counted at every step from `p` up to the cutoff.
pub fn recovery_area(
    row_ranks: &[u32],
    positions: &[usize],
    weights: Option<&[f64]>,
    rank_cutoff: usize,
) -> f64 {
    let mut area = 0.0;
    for (i, &col) in positions.iter().enumerate() {
        let position = row_ranks[col] as usize + 1;
        if position > rank_cutoff {
            continue;
        }
        let steps = (rank_cutoff - position + 1) as f64;
        let w = weights.map_or(1.0, |w| w[i]);
        area += w * steps;
    }
    area
}

/// Largest area `k` members can reach: all at the top positions, heaviest
/// first.
pub fn max_recovery_area(weights: &[f64], rank_cutoff: usize) -> f64 {
    let mut sorted = weights.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    sorted
        .iter()
        .take(rank_cutoff)
        .enumerate()
        .map(|(j, w)| w * (rank_cutoff - j) as f64)
        .sum()
}

pub fn window_area(weights: &[f64], rank_cutoff: usize) -> f64 {
    rank_cutoff as f64 * weights.iter().sum::<f64>()
}

/// `r(x)` for `x = 1..=rank_cutoff`; element `i` holds `r(i + 1)`.
pub fn recovery_curve(
    row_ranks: &[u32],
    positions: &[usize],
    weights: Option<&[f64]>,
    rank_cutoff: usize,
) -> Vec<f64> {
    let mut hits = vec![0.0f64; rank_cutoff];
    for (i, &col) in positions.iter().enumerate() {
        let position = row_ranks[col] as usize + 1;
        if position <= rank_cutoff {
            hits[position - 1] += weights.map_or(1.0, |w| w[i]);
        }
    }
    let mut acc = 0.0;
    for h in hits.iter_mut() {
        acc += *h;
        *h = acc;
    }
    hits
}

#[cfg(test)]
#[path = "../../tests/src_inline/aucell/recovery.rs"]
mod tests;
