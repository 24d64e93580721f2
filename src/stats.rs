//! Descriptive statistics and correlation
//!
//! Small numeric helpers shared by the aggregator, the correlation report and the
//! distribution summaries. All functions return `None` rather than inventing a
//! value when the input cannot support the statistic.

use crate::config::StdDevKind;

/// Arithmetic mean, `None` for an empty slice
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation.
///
/// `Sample` needs at least two values; `Population` at least one.
pub fn std_dev(values: &[f64], kind: StdDevKind) -> Option<f64> {
    let mu = mean(values)?;
    let n = values.len() as f64;
    let denominator = match kind {
        StdDevKind::Sample if values.len() < 2 => return None,
        StdDevKind::Sample => n - 1.0,
        StdDevKind::Population => n,
    };
    let sum_sq: f64 = values.iter().map(|x| (x - mu).powi(2)).sum();
    Some((sum_sq / denominator).sqrt())
}

/// sd / mean, defined only when both exist and the mean is positive
pub fn coefficient_of_variation(mean: Option<f64>, sd: Option<f64>) -> Option<f64> {
    match (mean, sd) {
        (Some(mu), Some(sigma)) if mu > 0.0 => Some(sigma / mu),
        _ => None,
    }
}

/// Quantile with linear interpolation between closest ranks (`q` in 0..=1)
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Pearson correlation coefficient with two-sided p-value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

/// Minimum paired observations for a correlation
pub const MIN_CORRELATION_PAIRS: usize = 3;

/// Pearson correlation over paired observations.
///
/// Returns `None` with fewer than three pairs or when either series is constant.
pub fn pearson(pairs: &[(f64, f64)]) -> Option<Correlation> {
    let n = pairs.len();
    if n < MIN_CORRELATION_PAIRS {
        return None;
    }

    let nf = n as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / nf;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / nf;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }

    let r = (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0);
    Some(Correlation {
        r,
        p_value: pearson_p_value(r, n),
        n,
    })
}

/// Two-sided p-value for a Pearson r under the null of no correlation.
///
/// Uses the Student t distribution with n - 2 degrees of freedom:
/// `p = I_{df/(df+t^2)}(df/2, 1/2)`.
pub fn pearson_p_value(r: f64, n: usize) -> f64 {
    if n < MIN_CORRELATION_PAIRS {
        return f64::NAN;
    }
    let df = (n - 2) as f64;
    let r2 = r * r;
    if r2 >= 1.0 {
        return 0.0;
    }
    let t2 = r2 * df / (1.0 - r2);
    regularized_incomplete_beta(df / 2.0, 0.5, df / (df + t2)).clamp(0.0, 1.0)
}

/// Regularized incomplete beta function I_x(a, b)
fn regularized_incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let front = ln_front.exp();

    // The continued fraction converges fast for x < (a+1)/(a+b+2); use the
    // symmetry relation otherwise.
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (modified Lentz)
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITERATIONS: usize = 300;
    const EPSILON: f64 = 1e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITERATIONS {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Natural log of the gamma function (Lanczos approximation, g = 7)
fn ln_gamma(x: f64) -> f64 {
    const COEFFICIENTS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut sum = COEFFICIENTS[0];
    for (i, coefficient) in COEFFICIENTS.iter().enumerate().skip(1) {
        sum += coefficient / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}
