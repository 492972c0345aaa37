//! Vector similarity.

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Callers check lengths first; if either vector has zero magnitude, or the
/// result is not finite (NaN or infinite components), the similarity is 0.0.
/// Zero is always `+0.0`, so results order totally with `f32::total_cmp`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_a * norm_b);
    if similarity.is_finite() && similarity != 0.0 {
        similarity
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_vectors() {
        let v = [0.3, -1.2, 4.0, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_orthogonal_vectors() {
        assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0, 0.0], &[0.0, 1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_opposite_vectors() {
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_magnitude_is_zero() {
        let zero = [0.0; 4];
        assert_eq!(cosine_similarity(&zero, &zero), 0.0);
        assert_eq!(cosine_similarity(&zero, &[1.0, 1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_non_finite_components_are_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_zero_is_positive() {
        let s = cosine_similarity(&[-1.0, 0.0], &[0.0, -1.0]);
        assert!(s.is_sign_positive());
    }
}
