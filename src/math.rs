//! Scalar helpers shared by the thermodynamic model and the sigma transform.

/// `ln(1 + e^x)` without overflow for large `x`.
///
/// `softplus(-inf) == 0` exactly, which the thermodynamic model relies on
/// for `ln c` with `c = 0`.
#[inline]
pub(crate) fn softplus(x: f64) -> f64 {
    if x > 0. {
        x + (-x).exp().ln_1p()
    } else {
        x.exp().ln_1p()
    }
}

/// `1 / (1 + e^-x)`
#[inline]
pub(crate) fn logistic(x: f64) -> f64 {
    if x >= 0. {
        (1. + (-x).exp()).recip()
    } else {
        let e = x.exp();
        e / (1. + e)
    }
}
