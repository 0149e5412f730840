// Small numeric helpers shared by the scoring and recommendation engines.
//
// Every helper returns `None` instead of dividing by zero or averaging an
// empty sequence; callers decide the neutral value.

/// Smallest denominator treated as non-zero.
const DENOMINATOR_EPSILON: f64 = 1e-12;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(var.sqrt())
}

/// Least-squares slope of `values` against their indices 0..n.
pub fn slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values)?;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    ratio(num, den)
}

/// Mean with linearly increasing weights 1..=n, so later values count more.
pub fn recency_weighted_mean(values: &[f64]) -> Option<f64> {
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (i, v)| {
            let w = (i + 1) as f64;
            (num + w * v, den + w)
        });
    ratio(num, den)
}

/// Mean with weights 1, 1/2, 1/3, ... applied in the given order. Pass the
/// most recent value first.
pub fn inverse_rank_weighted_mean(values: &[f64]) -> Option<f64> {
    let (num, den) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(num, den), (rank, v)| {
            let w = 1.0 / (rank + 1) as f64;
            (num + w * v, den + w)
        });
    ratio(num, den)
}

pub fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator.abs() < DENOMINATOR_EPSILON || !denominator.is_finite() {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}
