//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Apply polynomial coefficients to a value.
///
/// Coefficients are in ascending power order, i.e. `coeffs[0]` is the 
/// constant term. Evaluated with Horner's method.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float
{
    coeffs.iter()
        .rev()
        .fold(T::zero(), |acc, c| acc * value + *c)
}

/// Clamp a value into `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Integrate `f` over `[a, b]` using the composite Simpson's rule with `n`
/// sub-intervals.
///
/// `n` is rounded up to the next even number.
pub fn simpson<T, F>(f: F, a: T, b: T, n: usize) -> T
where
    T: Float,
    F: Fn(T) -> T
{
    let n = if n % 2 == 0 { n.max(2) } else { n + 1 };
    let n_t = match T::from(n) {
        Some(n) => n,
        None => return T::nan()
    };
    let two = T::one() + T::one();
    let four = two + two;

    let h = (b - a) / n_t;
    let mut sum = f(a) + f(b);

    for i in 1..n {
        let x = a + h * match T::from(i) {
            Some(i) => i,
            None => return T::nan()
        };
        sum = sum + f(x) * if i % 2 == 0 { two } else { four };
    }

    sum * h / (two + T::one())
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
/// 
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range [-pi, pi).
pub fn wrap_pi<T>(value: T) -> T
where
    T: Float
{
    let pi_t = T::from(std::f64::consts::PI).unwrap_or_else(T::nan);
    let tau_t = T::from(std::f64::consts::TAU).unwrap_or_else(T::nan);

    rem_euclid(value + pi_t, tau_t) - pi_t
}
