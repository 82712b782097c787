//! Summary statistics for column headers.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One histogram bin over normalized values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub x0: f64,
    pub x1: f64,
    pub length: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of values, missing ones included.
    pub count: usize,
    pub missing: usize,
    /// Size of the largest bin.
    pub max_bin: usize,
    pub hist: Vec<Bin>,
}

/// Number of bins by Sturges' rule.
pub fn sturges(n: usize) -> usize {
    if n == 0 {
        return 1;
    }
    ((n as f64).log2().ceil() as usize + 1).max(1)
}

/// Statistics of values in `[0, 1]`; NaN counts as missing.
pub fn compute(values: &[f64]) -> Statistics {
    let valid: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    let bins = sturges(valid.len());
    let width = 1.0 / bins as f64;
    let mut hist: Vec<Bin> = (0..bins)
        .map(|i| Bin {
            x0: i as f64 * width,
            x1: (i + 1) as f64 * width,
            length: 0,
        })
        .collect();
    for &v in &valid {
        let bin = ((v / width).floor().max(0.0) as usize).min(bins - 1);
        hist[bin].length += 1;
    }
    let (min, max) = valid
        .iter()
        .fold((f64::NAN, f64::NAN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let mean = if valid.is_empty() {
        f64::NAN
    } else {
        valid.iter().sum::<f64>() / valid.len() as f64
    };
    Statistics {
        min,
        max,
        mean,
        count: values.len(),
        missing: values.len() - valid.len(),
        max_bin: hist.iter().map(|b| b.length).max().unwrap_or(0),
        hist,
    }
}

/// `[min, max]` of the real values, if there are any.
pub fn domain_of(values: impl IntoIterator<Item = f64>) -> Option<[f64; 2]> {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some([v, v]),
            Some([lo, hi]) => Some([lo.min(v), hi.max(v)]),
        })
}

/// Row counts per category, in category order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalStats {
    pub counts: IndexMap<String, usize>,
    pub missing: usize,
    pub max_bin: usize,
}

/// Count rows per category. Values outside `categories` are ignored; rows
/// without any category are missing.
pub fn categorical<'a>(
    categories: &[String],
    rows: impl IntoIterator<Item = &'a [String]>,
) -> CategoricalStats {
    let mut counts: IndexMap<String, usize> = categories.iter().map(|c| (c.clone(), 0)).collect();
    let mut missing = 0;
    for values in rows {
        if values.is_empty() {
            missing += 1;
        }
        for value in values {
            if let Some(count) = counts.get_mut(value) {
                *count += 1;
            }
        }
    }
    let max_bin = counts.values().copied().max().unwrap_or(0);
    CategoricalStats {
        counts,
        missing,
        max_bin,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sturges() {
        assert_eq!(sturges(0), 1);
        assert_eq!(sturges(1), 1);
        assert_eq!(sturges(8), 4);
        assert_eq!(sturges(100), 8);
    }

    #[test]
    fn test_compute() {
        let stats = compute(&[0.0, 0.5, 1.0, f64::NAN]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 1.0);
        assert!((stats.mean - 0.5).abs() < 1e-12);
        assert_eq!(stats.hist.len(), 3);
        assert_eq!(stats.hist.iter().map(|b| b.length).sum::<usize>(), 3);
        assert_eq!(stats.max_bin, 1);
    }

    #[test]
    fn test_compute_empty() {
        let stats = compute(&[]);
        assert!(stats.min.is_nan());
        assert!(stats.mean.is_nan());
        assert_eq!(stats.hist.len(), 1);
        assert_eq!(stats.max_bin, 0);
    }

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of([3.0, f64::NAN, -1.0, 2.0]), Some([-1.0, 3.0]));
        assert_eq!(domain_of([f64::NAN]), None);
    }

    #[test]
    fn test_categorical_counts() {
        let cats = vec!["a".to_string(), "b".to_string()];
        let rows = [
            vec!["a".to_string()],
            vec!["a".to_string(), "b".to_string()],
            vec![],
            vec!["z".to_string()],
        ];
        let stats = categorical(&cats, rows.iter().map(Vec::as_slice));
        assert_eq!(stats.counts["a"], 2);
        assert_eq!(stats.counts["b"], 1);
        assert_eq!(stats.missing, 1);
        assert_eq!(stats.max_bin, 2);
    }
}
