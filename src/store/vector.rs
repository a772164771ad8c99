//! Vector math helpers shared by the store implementations

/// Probes with magnitude below this are treated as zero vectors.
pub const ZERO_MAGNITUDE_EPS: f32 = 1e-6;

/// Euclidean magnitude.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity between equal-length vectors.
///
/// Returns `None` on length mismatch or when either magnitude is zero
/// (never divides by zero).
pub fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }
    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a < ZERO_MAGNITUDE_EPS || mag_b < ZERO_MAGNITUDE_EPS {
        return None;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    Some(dot / (mag_a * mag_b))
}

/// Scale a vector to unit magnitude in place. Zero vectors are left
/// untouched.
pub fn normalize(v: &mut [f32]) {
    let mag = magnitude(v);
    if mag >= ZERO_MAGNITUDE_EPS {
        for x in v.iter_mut() {
            *x /= mag;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5_f32, 0.5, 0.5, 0.5];
        let sim = cosine(&v, &v).expect("similarity");
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0_f32, 0.0];
        let b = vec![0.0_f32, 1.0];
        let sim = cosine(&a, &b).expect("similarity");
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn zero_probe_yields_none() {
        let a = vec![0.0_f32, 0.0, 0.0];
        let b = vec![1.0_f32, 0.0, 0.0];
        assert!(cosine(&a, &b).is_none());
    }

    #[test]
    fn mismatched_lengths_yield_none() {
        assert!(cosine(&[1.0, 0.0], &[1.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn normalize_produces_unit_magnitude() {
        let mut v = vec![3.0_f32, 4.0];
        normalize(&mut v);
        assert!((magnitude(&v) - 1.0).abs() < 1e-6);
    }
}
