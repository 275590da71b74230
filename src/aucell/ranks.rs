use std::cmp::Ordering;

/// 0-based ranks by descending score. Equal scores keep their input order
/// (stable sort over column position); NaN scores rank after every number.
pub fn rank_scores_descending(scores: &[f32]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| compare_desc(scores[a], scores[b]));

    let mut ranks = vec![0u32; scores.len()];
    for (rank, &col) in order.iter().enumerate() {
        ranks[col] = rank as u32;
    }
    ranks
}

fn compare_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/aucell/ranks.rs"]
mod tests;
