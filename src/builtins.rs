//! The built-in catalogue registered by [`Environment::with_builtins`].
//!
//! Functions that take an integer order or degree round that argument to the
//! nearest integer first. The cylindrical Bessel functions take a real order.

use crate::{
    env::{Arity, Environment},
    evaluator::EvalError,
    special,
};

const UNARY: &[(&str, fn(f64) -> f64)] = &[
    ("abs", f64::abs),
    ("acos", f64::acos),
    ("acosh", f64::acosh),
    ("asin", f64::asin),
    ("asinh", f64::asinh),
    ("atan", f64::atan),
    ("atanh", f64::atanh),
    ("cbrt", f64::cbrt),
    ("ceil", f64::ceil),
    ("comp_ellint_1", special::comp_ellint_1),
    ("comp_ellint_2", special::comp_ellint_2),
    ("cos", f64::cos),
    ("cosh", f64::cosh),
    ("erf", libm::erf),
    ("erfc", libm::erfc),
    ("exp", f64::exp),
    ("exp2", f64::exp2),
    ("expint", special::expint),
    ("expm1", f64::exp_m1),
    ("floor", f64::floor),
    ("lgamma", libm::lgamma),
    ("log", f64::ln),
    ("log10", f64::log10),
    ("log1p", f64::ln_1p),
    ("log2", f64::log2),
    ("nearbyint", libm::rint),
    ("riemann_zeta", special::riemann_zeta),
    ("rint", libm::rint),
    ("round", f64::round),
    ("sin", f64::sin),
    ("sinh", f64::sinh),
    ("sqrt", f64::sqrt),
    ("tan", f64::tan),
    ("tanh", f64::tanh),
    ("tgamma", libm::tgamma),
    ("trunc", f64::trunc),
];

const BINARY: &[(&str, fn(f64, f64) -> f64)] = &[
    ("atan2", f64::atan2),
    ("beta", beta),
    ("comp_ellint_3", special::comp_ellint_3),
    ("cyl_bessel_i", special::cyl_bessel_i),
    ("cyl_bessel_j", special::cyl_bessel_j),
    ("cyl_bessel_k", special::cyl_bessel_k),
    ("cyl_neumann", special::cyl_neumann),
    ("dim", libm::fdim),
    ("ellint_1", special::ellint_1),
    ("ellint_2", special::ellint_2),
    ("gcd", gcd),
    ("hermite", hermite),
    ("hypot", f64::hypot),
    ("laguerre", laguerre),
    ("lcm", lcm),
    ("legendre", legendre),
    ("midpoint", midpoint),
    ("mod", fmod),
    ("pow", f64::powf),
    ("remainder", libm::remainder),
    ("sph_bessel", sph_bessel),
    ("sph_neumann", sph_neumann),
];

const TERNARY: &[(&str, fn(f64, f64, f64) -> f64)] = &[
    ("assoc_laguerre", assoc_laguerre),
    ("assoc_legendre", assoc_legendre),
    ("ellint_3", special::ellint_3),
    ("fma", f64::mul_add),
    ("lerp", lerp),
    ("sph_legendre", sph_legendre),
];

const CONSTANTS: &[(&str, f64)] = &[
    ("e", std::f64::consts::E),
    ("log2e", std::f64::consts::LOG2_E),
    ("log10e", std::f64::consts::LOG10_E),
    ("pi", std::f64::consts::PI),
    ("inv_pi", std::f64::consts::FRAC_1_PI),
    ("inv_sqrtpi", 0.564_189_583_547_756_3),
    ("ln2", std::f64::consts::LN_2),
    ("ln10", std::f64::consts::LN_10),
    ("sqrt2", std::f64::consts::SQRT_2),
    ("sqrt3", 1.732_050_807_568_877_2),
    ("inv_sqrt3", 0.577_350_269_189_625_8),
    ("egamma", 0.577_215_664_901_532_9),
    ("phi", 1.618_033_988_749_895),
];

/// Adds every built-in function and constant to `env`.
pub fn register(env: &mut Environment) {
    for &(name, f) in UNARY {
        env.define_checked(name, Arity::Exact(1), move |args| f(args[0]));
    }
    for &(name, f) in BINARY {
        env.define_checked(name, Arity::Exact(2), move |args| f(args[0], args[1]));
    }
    for &(name, f) in TERNARY {
        env.define_checked(name, Arity::Exact(3), move |args| {
            f(args[0], args[1], args[2])
        });
    }

    env.define_checked("nan", Arity::Exact(0), |_| f64::NAN);
    env.define_checked("min", Arity::AtLeast(1), |args| {
        args.iter().copied().reduce(lesser).unwrap_or(f64::NAN)
    });
    env.define_checked("max", Arity::AtLeast(1), |args| {
        args.iter().copied().reduce(greater).unwrap_or(f64::NAN)
    });
    env.define_function("clamp", clamp);

    for &(name, value) in CONSTANTS {
        env.define_constant(name, value);
    }

    log::debug!(
        "registered {} built-in functions and {} constants",
        UNARY.len() + BINARY.len() + TERNARY.len() + 4,
        CONSTANTS.len()
    );
}

/// `right` if it is strictly smaller, else `left`. A NaN on the left is kept.
pub(crate) fn lesser(left: f64, right: f64) -> f64 {
    if right < left {
        right
    } else {
        left
    }
}

pub(crate) fn greater(left: f64, right: f64) -> f64 {
    if left < right {
        right
    } else {
        left
    }
}

/// Degree for the polynomial families, which are undefined below zero.
fn degree(value: f64) -> Option<u32> {
    u32::try_from(value.round() as i64).ok()
}

fn clamp(args: &[f64]) -> Result<f64, EvalError> {
    let &[value, low, high] = args else {
        return Err(EvalError::ArgumentCount {
            function: "clamp".to_string(),
            expected: Arity::Exact(3),
            found: args.len(),
        });
    };
    if low > high {
        return Err(EvalError::InvalidArgument {
            function: "clamp".to_string(),
            reason: format!("lower bound {low} is greater than upper bound {high}"),
        });
    }
    Ok(value.max(low).min(high))
}

fn fmod(x: f64, y: f64) -> f64 {
    x % y
}

fn midpoint(a: f64, b: f64) -> f64 {
    a + (b - a) / 2.0
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + t * (b - a)
}

fn gcd(a: f64, b: f64) -> f64 {
    let magnitude = |value: f64| (value.round() as i64).unsigned_abs();
    let (mut a, mut b) = (magnitude(a), magnitude(b));
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a as f64
}

fn lcm(a: f64, b: f64) -> f64 {
    let divisor = gcd(a, b);
    if divisor == 0.0 {
        return 0.0;
    }
    (a.round() / divisor * b.round()).abs()
}

fn beta(x: f64, y: f64) -> f64 {
    libm::tgamma(x) * libm::tgamma(y) / libm::tgamma(x + y)
}

/// Spherical Bessel function of the first kind, by upward recurrence.
fn sph_bessel(n: f64, x: f64) -> f64 {
    let Some(n) = degree(n) else {
        return f64::NAN;
    };
    if x == 0.0 {
        return if n == 0 { 1.0 } else { 0.0 };
    }

    let j0 = x.sin() / x;
    if n == 0 {
        return j0;
    }
    let mut previous = j0;
    let mut current = x.sin() / (x * x) - x.cos() / x;
    for k in 1..n {
        let next = f64::from(2 * k + 1) / x * current - previous;
        previous = current;
        current = next;
    }
    current
}

fn sph_neumann(n: f64, x: f64) -> f64 {
    match degree(n) {
        Some(n) => special::sph_neumann(n, x),
        None => f64::NAN,
    }
}

fn sph_legendre(l: f64, m: f64, theta: f64) -> f64 {
    match (degree(l), degree(m)) {
        (Some(l), Some(m)) => {
            let p = assoc_legendre(l.into(), m.into(), theta.cos());
            special::sph_legendre(l, m, p)
        }
        _ => f64::NAN,
    }
}

/// Physicists' Hermite polynomial H_n(x).
fn hermite(n: f64, x: f64) -> f64 {
    let Some(n) = degree(n) else {
        return f64::NAN;
    };
    let (mut previous, mut current) = (1.0, 2.0 * x);
    if n == 0 {
        return previous;
    }
    for k in 1..n {
        let next = 2.0 * x * current - 2.0 * f64::from(k) * previous;
        previous = current;
        current = next;
    }
    current
}

fn laguerre(n: f64, x: f64) -> f64 {
    assoc_laguerre(n, 0.0, x)
}

/// Associated Laguerre polynomial L_n^m(x).
fn assoc_laguerre(n: f64, m: f64, x: f64) -> f64 {
    let (Some(n), Some(m)) = (degree(n), degree(m)) else {
        return f64::NAN;
    };
    let m = f64::from(m);
    let (mut previous, mut current) = (1.0, 1.0 + m - x);
    if n == 0 {
        return previous;
    }
    for k in 1..n {
        let k = f64::from(k);
        let next = ((2.0 * k + 1.0 + m - x) * current - (k + m) * previous) / (k + 1.0);
        previous = current;
        current = next;
    }
    current
}

fn legendre(l: f64, x: f64) -> f64 {
    assoc_legendre(l, 0.0, x)
}

/// Associated Legendre function P_l^m(x), without the Condon-Shortley phase.
fn assoc_legendre(l: f64, m: f64, x: f64) -> f64 {
    let (Some(l), Some(m)) = (degree(l), degree(m)) else {
        return f64::NAN;
    };
    if m > l {
        return 0.0;
    }

    // P_m^m = (2m - 1)!! (1 - x^2)^(m/2)
    let mut p_mm = 1.0;
    let root = (1.0 - x * x).sqrt();
    for i in 0..m {
        p_mm *= f64::from(2 * i + 1) * root;
    }
    if l == m {
        return p_mm;
    }

    let mut previous = p_mm;
    let mut current = x * f64::from(2 * m + 1) * p_mm;
    for k in (m + 2)..=l {
        let next = (x * f64::from(2 * k - 1) * current - f64::from(k + m - 1) * previous)
            / f64::from(k - m);
        previous = current;
        current = next;
    }
    current
}
