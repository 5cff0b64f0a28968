//! Descriptive statistics, correlation and density estimation over numeric
//! columns. Missing values are skipped everywhere.

use std::collections::HashMap;

use serde::Serialize;

use crate::table::UploadedTable;

// =============================================================================
// Summary statistics
// =============================================================================

/// Per-column summary in the usual count/mean/std/min/quartiles/max layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; absent with fewer than two values.
    pub std: Option<f64>,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Standard deviation with `n - 1` in the denominator.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Quantile of sorted data by linear interpolation between closest ranks.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

fn summarize(column: &str, values: &[Option<f64>]) -> Option<ColumnSummary> {
    let mut data = present(values);
    if data.is_empty() {
        return None;
    }
    data.sort_by(|a, b| a.total_cmp(b));
    Some(ColumnSummary {
        column: column.to_string(),
        count: data.len(),
        mean: mean(&data)?,
        std: sample_std(&data),
        min: data[0],
        q25: quantile(&data, 0.25)?,
        median: quantile(&data, 0.5)?,
        q75: quantile(&data, 0.75)?,
        max: data[data.len() - 1],
    })
}

/// Summaries of every numeric column, in column order.
pub fn describe(table: &UploadedTable) -> Vec<ColumnSummary> {
    table
        .numeric_columns()
        .into_iter()
        .filter_map(|(name, values)| summarize(name, values))
        .collect()
}

// =============================================================================
// Correlation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major coefficients; `None` where undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

/// Pearson coefficient over rows where both values are present.
///
/// Undefined for fewer than two complete pairs or a constant series.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        sxy += (a - mx) * (b - my);
        sxx += (a - mx).powi(2);
        syy += (b - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

pub fn correlation_matrix(table: &UploadedTable) -> CorrelationMatrix {
    let numeric = table.numeric_columns();
    let values = numeric
        .iter()
        .map(|(_, x)| numeric.iter().map(|(_, y)| pearson(x, y)).collect())
        .collect();
    CorrelationMatrix {
        columns: numeric.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}

// =============================================================================
// Histogram and kernel density
// =============================================================================

/// Number of histogram bins by Sturges' rule.
pub fn sturges_bins(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    (n as f64).log2().ceil() as usize + 1
}

#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub start: f64,
    pub bin_width: f64,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn end(&self) -> f64 {
        self.start + self.bin_width * self.counts.len() as f64
    }

    pub fn max_count(&self) -> usize {
        self.counts.iter().copied().max().unwrap_or(0)
    }
}

/// Equal-width histogram spanning the data range; the last bin is closed.
/// A constant series gets a single bin of width one centred on the value.
pub fn histogram(values: &[f64], bins: usize) -> Option<Histogram> {
    let min = values.iter().copied().reduce(f64::min)?;
    let max = values.iter().copied().reduce(f64::max)?;
    if max == min {
        return Some(Histogram {
            start: min - 0.5,
            bin_width: 1.0,
            counts: vec![values.len()],
        });
    }
    let bins = bins.max(1);
    let bin_width = (max - min) / bins as f64;
    let mut counts = vec![0usize; bins];
    for v in values {
        let idx = (((v - min) / bin_width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    Some(Histogram {
        start: min,
        bin_width,
        counts,
    })
}

/// Kernel bandwidth by Scott's rule, `std * n^(-1/5)`.
pub fn scott_bandwidth(values: &[f64]) -> Option<f64> {
    let std = sample_std(values)?;
    if std == 0.0 {
        return None;
    }
    Some(std * (values.len() as f64).powf(-0.2))
}

/// Gaussian kernel density estimate evaluated at each point of `grid`.
pub fn gaussian_kde(values: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<f64> {
    let n = values.len() as f64;
    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    grid.iter()
        .map(|x| {
            values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm
        })
        .collect()
}

// =============================================================================
// Category frequencies
// =============================================================================

/// Frequency of each distinct value, most common first. Ties keep the order
/// in which values first appear.
pub fn value_counts(values: &[Option<String>]) -> Vec<(String, usize)> {
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for value in values.iter().flatten() {
        match slots.get(value.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(value.as_str(), counts.len());
                counts.push((value.clone(), 1));
            }
        }
    }
    // Stable, so equal counts stay in first-seen order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}
