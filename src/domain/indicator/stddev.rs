//! Rolling mean and standard deviation.
//!
//! Sample standard deviation (divides by n-1) over the last n closes:
//! STDDEV(n)[i] = sqrt(sum((C[i-j] - SMA(n)[i])^2 for j in 0..n) / (n - 1))
//! Warmup: the first (n-1) entries are `None`. A period below 2 is always `None`.

/// Rolling (mean, sample std) of the window ending at each index.
pub fn rolling_mean_std(values: &[f64], period: usize) -> Vec<Option<(f64, f64)>> {
    (0..values.len())
        .map(|i| {
            if period < 2 || i + 1 < period {
                return None;
            }
            let window = &values[i + 1 - period..=i];
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance = window
                .iter()
                .map(|v| {
                    let diff = v - mean;
                    diff * diff
                })
                .sum::<f64>()
                / (period - 1) as f64;
            Some((mean, variance.sqrt()))
        })
        .collect()
}
