//! Miscellaneous utilities.

use crate::math::Real;

const INV_EPSILON: Real = 1.0e-20;

/// The inverse of `val`, with `0.0` mapped to `0.0`.
///
/// This is the convention used for inverse masses and inverse timesteps: a
/// zero value denotes "infinite" (static body) or "no scaling" (zero-duration
/// impulse resolution) rather than a division error.
pub fn inv(val: Real) -> Real {
    if (-INV_EPSILON..=INV_EPSILON).contains(&val) {
        0.0
    } else {
        1.0 / val
    }
}

#[cfg(test)]
mod test {
    use super::inv;

    #[test]
    fn inv_of_zero_is_zero() {
        assert_eq!(inv(0.0), 0.0);
        assert_eq!(inv(2.0), 0.5);
        assert_eq!(inv(-4.0), -0.25);
    }
}
