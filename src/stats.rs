//! Summaries of sampled values: running moments, per-column summaries of a
//! state log, and the potential scale reduction factor across logs.

use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use num_traits::ToPrimitive;

use crate::error::{McmcError, Result};
use crate::io::StateLogTable;

/// Running mean and variance of a scalar (Welford).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSummarizer {
    n: u64,
    mean: f64,
    sum_sq_dev: f64,
    min: f64,
    max: f64,
}

impl SampleSummarizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values that do not convert to `f64` are skipped.
    pub fn observe<T: ToPrimitive>(&mut self, x: T) {
        let Some(x) = x.to_f64() else { return };
        self.n += 1;
        if self.n == 1 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.sum_sq_dev += delta * (x - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn mean(&self) -> Option<f64> {
        (self.n > 0).then_some(self.mean)
    }

    /// Sample variance (n - 1 denominator).
    pub fn variance(&self) -> Option<f64> {
        (self.n > 1).then(|| self.sum_sq_dev / (self.n - 1) as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.n > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.n > 0).then_some(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub n: usize,
    pub mean: f64,
    pub variance: f64,
    pub min: f64,
    pub max: f64,
}

/// Mean, variance and range of every column after dropping `burnin` rows.
pub fn summarize_table(table: &StateLogTable, burnin: usize) -> Result<Vec<ColumnSummary>> {
    let rows = table.after_burnin(burnin);
    if rows.nrows() == 0 {
        return Err(McmcError::Log(format!(
            "no samples left after a burnin of {burnin}"
        )));
    }
    let n = rows.nrows();
    let means = rows
        .mean_axis(Axis(0))
        .ok_or_else(|| McmcError::Log("empty state log".into()))?;
    let variances = if n > 1 {
        rows.var_axis(Axis(0), 1.0)
    } else {
        Array1::from_elem(rows.ncols(), f64::NAN)
    };
    Ok(table
        .headers
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let column = rows.column(j);
            ColumnSummary {
                name: name.clone(),
                n,
                mean: means[j],
                variance: variances[j],
                min: *column.min_skipnan(),
                max: *column.max_skipnan(),
            }
        })
        .collect())
}

/// Potential scale reduction over chains, accumulated one sample at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct RhatMulti {
    n: usize,
    mean: Array2<f64>,    // n_chains x n_params
    mean_sq: Array2<f64>, // n_chains x n_params
    n_chains: usize,
    n_params: usize,
}

impl RhatMulti {
    pub fn new(n_chains: usize, n_params: usize) -> Self {
        Self {
            n: 0,
            mean: Array2::zeros((n_chains, n_params)),
            mean_sq: Array2::zeros((n_chains, n_params)),
            n_chains,
            n_params,
        }
    }

    /// Adds one sample per chain; `x` is chains x params in row-major order.
    pub fn step<T: ToPrimitive>(&mut self, x: &[T]) -> Result<()> {
        if x.len() != self.n_chains * self.n_params {
            return Err(McmcError::Log(format!(
                "expected {} values, got {}",
                self.n_chains * self.n_params,
                x.len()
            )));
        }
        self.n += 1;
        let n = self.n as f64;
        let values: Vec<f64> = x
            .iter()
            .map(|v| v.to_f64().unwrap_or(f64::NAN))
            .collect();
        let x_arr = Array2::from_shape_vec((self.n_chains, self.n_params), values)
            .map_err(|e| McmcError::Log(e.to_string()))?;

        self.mean = (&self.mean * (n - 1.0) + &x_arr) / n;
        self.mean_sq = (&self.mean_sq * (n - 1.0) + x_arr.pow2()) / n;
        Ok(())
    }

    pub fn all(&self) -> Result<Array1<f64>> {
        if self.n_chains < 2 || self.n < 2 {
            return Err(McmcError::Log(
                "the scale reduction factor needs two chains with two samples each".into(),
            ));
        }
        let mean_chain = self
            .mean
            .mean_axis(Axis(0))
            .ok_or_else(|| McmcError::Log("no chains".into()))?;
        let n_chains = self.n_chains as f64;
        let n = self.n as f64;
        let between = (&self.mean - &mean_chain.insert_axis(Axis(0)))
            .pow2()
            .sum_axis(Axis(0))
            * (n / (n_chains - 1.0));
        let sm2 = (&self.mean_sq - &self.mean.pow2()) * (n / (n - 1.0));
        let within = sm2
            .mean_axis(Axis(0))
            .ok_or_else(|| McmcError::Log("no chains".into()))?;
        let var = &within * ((n - 1.0) / n) + between * (1.0 / n);
        Ok((var / within).sqrt())
    }

    pub fn max(&self) -> Result<f64> {
        let all = self.all()?;
        Ok(*all.max_skipnan())
    }
}

/// Scale reduction factor of every column except `generation` across logs
/// with identical columns. Logs are truncated to the shortest one.
pub fn potential_scale_reduction(
    tables: &[StateLogTable],
    burnin: usize,
) -> Result<Vec<(String, f64)>> {
    let first = tables
        .first()
        .ok_or_else(|| McmcError::Log("no state logs given".into()))?;
    if tables.iter().any(|t| t.headers != first.headers) {
        return Err(McmcError::Log("state logs have different columns".into()));
    }
    let columns: Vec<usize> = first
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.as_str() != "generation")
        .map(|(j, _)| j)
        .collect();
    let views: Vec<ArrayView2<f64>> = tables.iter().map(|t| t.after_burnin(burnin)).collect();
    let n = views.iter().map(|v| v.nrows()).min().unwrap_or(0);

    let mut rhat = RhatMulti::new(tables.len(), columns.len());
    let mut sample = Vec::with_capacity(tables.len() * columns.len());
    for i in 0..n {
        sample.clear();
        for view in &views {
            sample.extend(columns.iter().map(|&j| view[[i, j]]));
        }
        rhat.step(&sample)?;
    }
    let values = rhat.all()?;
    Ok(columns
        .iter()
        .zip(values.iter())
        .map(|(&j, &r)| (first.headers[j].clone(), r))
        .collect())
}

#[cfg(test)]
mod tests {
    use std::f64;

    use super::*;
    use approx::assert_abs_diff_eq;

    fn run_rhat_test(data0: Array2<f64>, data1: Array2<f64>, expected: Array1<f64>, tol: f64) {
        let mut psr = RhatMulti::new(3, 4);
        psr.step(data0.as_slice().unwrap()).unwrap();
        psr.step(data1.as_slice().unwrap()).unwrap();
        let rhat = psr.all().unwrap();
        let diff = *(&rhat - &expected).abs().max().unwrap();
        assert!(
            diff < tol,
            "Mismatch in Rhat. Got {rhat:?}, expected {expected:?}, diff = {diff:?}"
        );
    }

    #[test]
    fn rhat_of_two_steps() {
        let data_step_0 = arr2(&[
            [0.0, 1.0, 0.0, 1.0], // chain 0
            [1.0, 2.0, 0.0, 2.0], // chain 1
            [0.0, 0.0, 0.0, 2.0], // chain 2
        ]);
        let data_step_1 = arr2(&[
            [1.0, 2.0, 2.0, 0.0],
            [1.0, 1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0, 0.0],
        ]);
        let expected = array![f64::consts::SQRT_2, 1.08012345, 0.89442719, 0.8660254];
        run_rhat_test(data_step_0, data_step_1, expected, 1e-7);
    }

    #[test]
    fn rhat_of_other_data() {
        let data_step_0 = arr2(&[
            [1.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 2.0],
        ]);
        let data_step_1 = arr2(&[
            [1.0, 2.0, 0.0, 2.0],
            [1.0, 2.0, 0.0, 0.0],
            [2.0, 0.0, 1.0, 2.0],
        ]);
        let expected = array![f64::consts::FRAC_1_SQRT_2, 0.74535599, 1.0, 1.5];
        run_rhat_test(data_step_0, data_step_1, expected, 1e-7);
    }

    #[test]
    fn rhat_needs_two_chains() {
        let mut psr = RhatMulti::new(1, 2);
        psr.step(&[1.0, 2.0]).unwrap();
        psr.step(&[2.0, 3.0]).unwrap();
        assert!(psr.all().is_err());
        assert!(psr.step(&[1.0]).is_err());
    }

    #[test]
    fn summarizer_matches_direct_moments() {
        let xs = [3usize, 1, 4, 1, 5, 9, 2, 6];
        let mut s = SampleSummarizer::new();
        for &x in &xs {
            s.observe(x);
        }
        let mean = xs.iter().sum::<usize>() as f64 / 8.0;
        let var = xs.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / 7.0;
        assert_eq!(s.count(), 8);
        assert_abs_diff_eq!(s.mean().unwrap(), mean, epsilon = 1e-12);
        assert_abs_diff_eq!(s.variance().unwrap(), var, epsilon = 1e-12);
        assert_eq!(s.min(), Some(1.0));
        assert_eq!(s.max(), Some(9.0));
        assert_eq!(SampleSummarizer::new().mean(), None);
    }

    fn table(rows: Array2<f64>) -> StateLogTable {
        StateLogTable {
            headers: vec!["generation".into(), "x".into()],
            rows,
        }
    }

    #[test]
    fn table_summary_drops_burnin() {
        let t = table(arr2(&[[0.0, 100.0], [10.0, 1.0], [20.0, 2.0], [30.0, 3.0]]));
        let summary = summarize_table(&t, 1).unwrap();
        let x = &summary[1];
        assert_eq!(x.name, "x");
        assert_eq!(x.n, 3);
        assert_abs_diff_eq!(x.mean, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x.variance, 1.0, epsilon = 1e-12);
        assert_eq!((x.min, x.max), (1.0, 3.0));
        assert!(summarize_table(&t, 4).is_err());
    }

    #[test]
    fn identical_logs_have_unit_scale_reduction() {
        let t = table(arr2(&[[0.0, 1.0], [10.0, 2.0], [20.0, 4.0], [30.0, 3.0]]));
        let psrf = potential_scale_reduction(&[t.clone(), t], 0).unwrap();
        assert_eq!(psrf.len(), 1);
        assert_eq!(psrf[0].0, "x");
        // no between-chain variance: sqrt((n - 1) / n)
        assert_abs_diff_eq!(psrf[0].1, (0.75_f64).sqrt(), epsilon = 1e-12);
    }
}
