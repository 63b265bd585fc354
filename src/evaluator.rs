//! Fans per-comparison likelihood evaluations out over a worker pool.
//!
//! Results come back in the order of the requested indices, so any sum the
//! caller forms is independent of thread count and completion order.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::core::ComparisonLikelihood;
use crate::error::{McmcError, Result};
use crate::model::ModelState;

pub struct LikelihoodEvaluator<L> {
    likelihood: L,
    ignore_data: bool,
    pool: Option<ThreadPool>,
}

impl<L: ComparisonLikelihood> LikelihoodEvaluator<L> {
    /// `nthreads <= 1` evaluates on the calling thread.
    pub fn new(likelihood: L, ignore_data: bool, nthreads: usize) -> Result<Self> {
        let pool = if nthreads > 1 && !ignore_data {
            let pool = ThreadPoolBuilder::new()
                .num_threads(nthreads)
                .thread_name(|i| format!("likelihood-{i}"))
                .build()
                .map_err(|e| McmcError::config(format!("failed to start worker pool: {e}")))?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            likelihood,
            ignore_data,
            pool,
        })
    }

    pub fn ignores_data(&self) -> bool {
        self.ignore_data
    }

    pub fn threads(&self) -> usize {
        self.pool.as_ref().map_or(1, ThreadPool::current_num_threads)
    }

    /// Log-likelihood of each comparison in `indices`, in that order.
    pub fn comparisons(&self, state: &ModelState, indices: &[usize]) -> Vec<f64> {
        if self.ignore_data {
            return vec![0.0; indices.len()];
        }
        let eval = |&i: &usize| self.likelihood.ln_likelihood(&state.view(i));
        match &self.pool {
            Some(pool) => pool.install(|| indices.par_iter().map(eval).collect()),
            None => indices.iter().map(eval).collect(),
        }
    }

    /// Log-likelihood of every comparison.
    pub fn all(&self, state: &ModelState) -> Vec<f64> {
        let indices: Vec<usize> = (0..state.number_of_comparisons()).collect();
        self.comparisons(state, &indices)
    }

    /// Log-likelihood of comparison `i` at each candidate height.
    pub fn at_heights(&self, state: &ModelState, i: usize, heights: &[f64]) -> Vec<f64> {
        if self.ignore_data {
            return vec![0.0; heights.len()];
        }
        let eval = |&h: &f64| self.likelihood.ln_likelihood(&state.view_at_height(i, h));
        match &self.pool {
            Some(pool) => pool.install(|| heights.par_iter().map(eval).collect()),
            None => heights.iter().map(eval).collect(),
        }
    }
}
