//! Summary statistics over embedding components.

/// Mean, population variance and standard deviation of a vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorStats {
    pub len: usize,
    pub mean: f64,
    pub variance: f64,
    pub std_dev: f64,
}

impl VectorStats {
    /// Compute statistics, or `None` when the vector carries no signal:
    /// empty, all zeros, or containing a non-finite component.
    pub fn compute(values: &[f32]) -> Option<Self> {
        if values.is_empty()
            || values.iter().any(|v| !v.is_finite())
            || values.iter().all(|v| *v == 0.0)
        {
            return None;
        }

        let n = values.len() as f64;
        let mean = values.iter().map(|v| f64::from(*v)).sum::<f64>() / n;
        let variance = values
            .iter()
            .map(|v| (f64::from(*v) - mean).powi(2))
            .sum::<f64>()
            / n;

        Some(Self {
            len: values.len(),
            mean,
            variance,
            std_dev: variance.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_population_variance() {
        let stats = VectorStats::compute(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-12);
        assert!((stats.variance - 4.0).abs() < 1e-12);
        assert!((stats.std_dev - 2.0).abs() < 1e-12);
        assert_eq!(stats.len, 8);
    }

    #[test]
    fn test_degenerate_vectors_have_no_stats() {
        assert!(VectorStats::compute(&[]).is_none());
        assert!(VectorStats::compute(&[0.0; 16]).is_none());
        assert!(VectorStats::compute(&[1.0, f32::NAN]).is_none());
        assert!(VectorStats::compute(&[f32::INFINITY]).is_none());
    }

    #[test]
    fn test_constant_nonzero_vector_has_zero_variance() {
        let stats = VectorStats::compute(&[0.5; 4]).unwrap();
        assert_eq!(stats.variance, 0.0);
    }
}
