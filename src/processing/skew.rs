//! Skewness measurement and log1p correction

use crate::error::{PipelineError, Result};

/// Bias-adjusted Fisher-Pearson skewness (G1).
///
/// Returns 0 for fewer than three values or a constant column.
pub fn skewness(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 3 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = values.iter().sum::<f64>() / nf;
    let (m2, m3) = values.iter().fold((0.0, 0.0), |(m2, m3), &v| {
        let d = v - mean;
        (m2 + d * d, m3 + d * d * d)
    });
    let m2 = m2 / nf;
    let m3 = m3 / nf;
    if m2 <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }

    let g1 = m3 / m2.powf(1.5);
    g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0)
}

/// Apply `ln(1 + v)` in place; every value must be finite and greater than -1,
/// checked before mutating
pub fn log1p_in_place(column: &str, values: &mut [f64]) -> Result<()> {
    if let Some(bad) = values.iter().find(|v| !(v.is_finite() && **v > -1.0)) {
        return Err(PipelineError::DataRange {
            column: column.to_string(),
            reason: format!("log1p requires finite values > -1, found {}", bad),
        });
    }
    for v in values.iter_mut() {
        *v = v.ln_1p();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symmetric_is_zero() {
        assert!(skewness(&[1.0, 2.0, 3.0, 4.0, 5.0]).abs() < 1e-12);
    }

    #[test]
    fn test_right_skew_positive() {
        // pandas: pd.Series([1, 1, 1, 1, 10]).skew() == 2.236068
        let s = skewness(&[1.0, 1.0, 1.0, 1.0, 10.0]);
        assert!((s - 2.236068).abs() < 1e-6, "skew = {}", s);
    }

    #[test]
    fn test_degenerate_columns() {
        assert_eq!(skewness(&[1.0, 100.0]), 0.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0, 3.0]), 0.0);
    }

    #[test]
    fn test_log1p() {
        let mut values = vec![0.0, 1.0, 9.0];
        log1p_in_place("lead_time", &mut values).unwrap();
        for (got, want) in values.iter().zip([0.0, 2f64.ln(), 10f64.ln()]) {
            assert!((got - want).abs() < 1e-12);
        }
    }

    #[test]
    fn test_log1p_rejects_below_minus_one() {
        let mut values = vec![0.0, -2.0];
        let err = log1p_in_place("avg_price_per_room", &mut values).unwrap_err();
        assert!(matches!(err, PipelineError::DataRange { .. }));
        assert_eq!(values, vec![0.0, -2.0]);
    }

    #[test]
    fn test_log1p_rejects_minus_one_and_infinite() {
        // ln(0) would be -inf, which SMOTE turns into NaN
        let mut values = vec![3.0, -1.0];
        let err = log1p_in_place("avg_price_per_room", &mut values).unwrap_err();
        assert!(matches!(err, PipelineError::DataRange { ref column, .. } if column == "avg_price_per_room"));
        assert_eq!(values, vec![3.0, -1.0]);

        let mut values = vec![f64::INFINITY];
        assert!(log1p_in_place("lead_time", &mut values).is_err());
        let mut values = vec![f64::NAN];
        assert!(log1p_in_place("lead_time", &mut values).is_err());
    }
}
