use std::ops::AddAssign;

/// Running L1/L2 penalty terms, summed over every weight visited while
/// updates are applied. The training driver reads them to report the
/// regularized cost.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Penalties {
    pub l1: f64,
    pub l2: f64,
}

impl AddAssign for Penalties {
    fn add_assign(&mut self, rhs: Penalties) {
        self.l1 += rhs.l1;
        self.l2 += rhs.l2;
    }
}

/// Totals gathered across all layers during one update pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct UpdateTotals {
    pub penalties: Penalties,
    /// Σ w² over every non-bias weight after its update; only gathered when
    /// max-norm is configured.
    pub squared_weight_sum: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regularization {
    pub l1: f64,
    pub l2: f64,
    pub mini_batch_size: usize,
}

impl Regularization {
    fn batch(&self) -> f64 {
        self.mini_batch_size.max(1) as f64
    }

    /// `(g + L2·w + L1·sign(w)) / mini_batch_size`
    pub fn weight_gradient(&self, gradient: f64, weight: f64) -> f64 {
        (gradient + self.l2 * weight + self.l1 * sign(weight)) / self.batch()
    }

    /// Biases are averaged over the mini-batch but never regularized.
    pub fn bias_gradient(&self, gradient: f64) -> f64 {
        gradient / self.batch()
    }

    /// `(l1 + l2) / mini_batch_size`, folded into gradient accumulation.
    pub fn accumulation_factor(&self) -> f64 {
        (self.l1 + self.l2) / self.batch()
    }

    /// Multiplier applied to one weight's gradient contribution during
    /// backward: `1 + accumulation_factor · w`.
    pub fn accumulation_scale(&self, weight: f64) -> f64 {
        1.0 + self.accumulation_factor() * weight
    }

    pub fn record_penalties(&self, weight: f64, penalties: &mut Penalties) {
        penalties.l2 += 0.5 * self.l2 * weight * weight;
        penalties.l1 += self.l1 * weight.abs();
    }
}

fn sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Factor that rescales every weight so their global L2 norm equals `cap`,
/// or `None` when the norm is already within it.
pub fn max_norm_multiplier(squared_weight_sum: f64, cap: f64) -> Option<f64> {
    let norm = squared_weight_sum.sqrt();
    if norm > cap {
        Some(cap / norm)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(l1: f64, l2: f64, mini_batch_size: usize) -> Regularization {
        Regularization { l1, l2, mini_batch_size }
    }

    #[test]
    fn weight_gradient_adds_penalty_terms() {
        let r = reg(0.01, 0.001, 2);
        let g = r.weight_gradient(0.5, -0.25);
        assert!((g - (0.5 - 0.00025 - 0.01) / 2.0).abs() < 1e-15);
    }

    #[test]
    fn zero_coefficients_leave_gradient_alone() {
        let r = reg(0.0, 0.0, 1);
        assert_eq!(r.weight_gradient(0.5, 3.0), 0.5);
        assert_eq!(r.accumulation_scale(3.0), 1.0);
    }

    #[test]
    fn l2_penalty_term() {
        let mut p = Penalties::default();
        reg(0.0, 0.001, 1).record_penalties(0.25, &mut p);
        assert_eq!(p.l2, 0.5 * 0.001 * 0.25 * 0.25);
        assert_eq!(p.l1, 0.0);
    }

    #[test]
    fn max_norm_only_shrinks() {
        let m = max_norm_multiplier(8.0, 1.0).unwrap();
        assert!((2.0 * m - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert_eq!(max_norm_multiplier(8.0, 1000.0), None);
    }
}
