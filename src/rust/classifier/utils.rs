/// Logistic function, stable for large magnitudes.
pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Squashes per-class margins into confidences that sum to 1.
pub(crate) fn margins_to_confidences(margins: &[f32]) -> Vec<f32> {
    let squashed: Vec<f64> = margins.iter().map(|&m| sigmoid(f64::from(m))).collect();
    let total: f64 = squashed.iter().sum();
    if total <= f64::MIN_POSITIVE {
        let uniform = 1.0 / margins.len().max(1) as f32;
        return vec![uniform; margins.len()];
    }
    squashed
        .into_iter()
        .map(|s| ((s / total) as f32).clamp(0.0, 1.0))
        .collect()
}

/// Index of the largest score. On ties the lowest index wins.
pub(crate) fn first_argmax(scores: &[f32]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some(b) if s <= scores[b] => {}
            _ if s.is_nan() => {}
            _ => best = Some(i),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_extremes() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(1000.0) <= 1.0);
        assert!(sigmoid(-1000.0) >= 0.0);
        assert!(sigmoid(-1000.0).is_finite());
    }

    #[test]
    fn test_confidences_sum_to_one() {
        let c = margins_to_confidences(&[2.0, -1.0, 0.5]);
        let total: f32 = c.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(c.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(c[0] > c[2] && c[2] > c[1]);
    }

    #[test]
    fn test_confidences_when_everything_underflows() {
        let c = margins_to_confidences(&[-1e6, -1e6]);
        assert_eq!(c, vec![0.5, 0.5]);
    }

    #[test]
    fn test_first_argmax_prefers_lowest_index() {
        assert_eq!(first_argmax(&[1.0, 3.0, 3.0]), Some(1));
        assert_eq!(first_argmax(&[0.0, 0.0]), Some(0));
        assert_eq!(first_argmax(&[f32::NAN, 1.0]), Some(1));
        assert_eq!(first_argmax(&[]), None);
    }
}
