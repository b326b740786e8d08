// --- series statistics (pure, unit-testable) ---

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt())
}

/// stdev / mean. None when the mean is zero.
pub fn coefficient_of_variation(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    if m == 0.0 {
        return None;
    }
    Some(std_dev(xs)? / m)
}

/// Least-squares slope of `ys` against x = 0, 1, 2, ...
pub fn linear_slope(ys: &[f64]) -> Option<f64> {
    let n = ys.len();
    if n < 2 {
        return None;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(ys)?;

    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    Some(num / den)
}

/// Trailing average over full windows only: `out[j]` averages `xs[j..j + period]`.
pub fn moving_average(xs: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || xs.len() < period {
        return vec![];
    }
    xs.windows(period)
        .map(|w| w.iter().sum::<f64>() / period as f64)
        .collect()
}

pub fn diffs(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Step returns `(x[i+1] - x[i]) / x[i]`.
pub fn pct_changes(xs: &[f64]) -> Vec<f64> {
    xs.windows(2).map(|w| (w[1] - w[0]) / w[0]).collect()
}

/// Rate of change over `period` steps; zero where the lookback is not yet available.
pub fn momentum(prices: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; prices.len()];
    if period == 0 {
        return out;
    }
    for i in period..prices.len() {
        out[i] = (prices[i] - prices[i - period]) / prices[i - period];
    }
    out
}

/// Index of the first maximum / minimum, like a stable argmax.
pub fn argmax(xs: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, x) in xs.iter().enumerate() {
        match best {
            Some(b) if xs[b] >= *x => {}
            _ => best = Some(i),
        }
    }
    best
}

pub fn argmin(xs: &[f64]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, x) in xs.iter().enumerate() {
        match best {
            Some(b) if xs[b] <= *x => {}
            _ => best = Some(i),
        }
    }
    best
}
