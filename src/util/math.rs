//! Numeric helpers shared by the scoring and feature code.

/// Clamps a score into `[0, 1]`, mapping non-finite values to zero.
pub(crate) fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Pearson correlation of two equally sized sequences.
///
/// Returns 1.0 when both inputs are constant and equal, 0.0 when only one
/// of them is constant.
pub(crate) fn pearson(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    let inv_n = 1.0 / n as f64;
    let mean_a = a[..n].iter().map(|&v| v as f64).sum::<f64>() * inv_n;
    let mean_b = b[..n].iter().map(|&v| v as f64).sum::<f64>() * inv_n;

    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (&va, &vb) in a[..n].iter().zip(b[..n].iter()) {
        let da = va as f64 - mean_a;
        let db = vb as f64 - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    let denom = (var_a * var_b).sqrt();
    if denom <= f64::EPSILON {
        return if var_a <= f64::EPSILON && var_b <= f64::EPSILON && (mean_a - mean_b).abs() < 1e-12
        {
            1.0
        } else {
            0.0
        };
    }
    (cov / denom) as f32
}

/// Wraps an angle in radians to `[0, 2π)`.
pub(crate) fn wrap_rad(angle: f32) -> f32 {
    let two_pi = std::f32::consts::TAU;
    let wrapped = angle % two_pi;
    if wrapped < 0.0 {
        wrapped + two_pi
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::{clamp_unit, pearson, wrap_rad};

    #[test]
    fn clamp_unit_handles_range_and_nan() {
        assert_eq!(clamp_unit(-0.5), 0.0);
        assert_eq!(clamp_unit(1.5), 1.0);
        assert_eq!(clamp_unit(0.25), 0.25);
        assert_eq!(clamp_unit(f32::NAN), 0.0);
    }

    #[test]
    fn pearson_detects_linear_relations() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];
        assert!((pearson(&a, &b) - 1.0).abs() < 1e-6);
        assert!((pearson(&a, &c) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn pearson_of_constant_inputs() {
        assert_eq!(pearson(&[0.5, 0.5], &[0.5, 0.5]), 1.0);
        assert_eq!(pearson(&[0.5, 0.5], &[0.1, 0.9]), 0.0);
    }

    #[test]
    fn wrap_rad_maps_negative_angles() {
        let wrapped = wrap_rad(-std::f32::consts::FRAC_PI_2);
        assert!((wrapped - 1.5 * std::f32::consts::PI).abs() < 1e-5);
    }
}
