//! Scalar model parameters with a prior and an estimate flag.

use crate::distributions::ContinuousDistribution;
use crate::error::{McmcError, Result};

/// A scalar parameter of the model.
///
/// A parameter that is not estimated is a point mass at its value: no
/// operator proposes changes to it and it contributes nothing to the log
/// prior.
#[derive(Debug, Clone)]
pub struct Parameter {
    value: f64,
    prior: ContinuousDistribution,
    estimate: bool,
}

impl Parameter {
    /// Creates a parameter, checking that the starting value has positive
    /// prior density when the parameter is estimated.
    pub fn new(value: f64, prior: ContinuousDistribution, estimate: bool) -> Result<Self> {
        if !value.is_finite() {
            return Err(McmcError::config(format!(
                "parameter value must be finite, got {value}"
            )));
        }
        if estimate && !prior.ln_pdf(value).is_finite() {
            return Err(McmcError::config(format!(
                "starting value {value} lies outside the support of its prior {prior}"
            )));
        }
        Ok(Self {
            value,
            prior,
            estimate,
        })
    }

    /// A non-estimated parameter.
    pub fn fixed(value: f64, prior: ContinuousDistribution) -> Result<Self> {
        Self::new(value, prior, false)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn prior(&self) -> &ContinuousDistribution {
        &self.prior
    }

    pub fn is_estimated(&self) -> bool {
        self.estimate
    }

    /// Log prior density of the current value; zero for fixed parameters.
    pub fn ln_prior(&self) -> f64 {
        if self.estimate {
            self.prior.ln_pdf(self.value)
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_parameters_contribute_nothing() {
        let prior = ContinuousDistribution::gamma(2.0, 1.0).unwrap();
        let p = Parameter::fixed(0.5, prior.clone()).unwrap();
        assert_eq!(p.ln_prior(), 0.0);
        let q = Parameter::new(0.5, prior.clone(), true).unwrap();
        assert_eq!(q.ln_prior(), prior.ln_pdf(0.5));
    }

    #[test]
    fn estimated_value_must_be_in_support() {
        let prior = ContinuousDistribution::beta(2.0, 2.0).unwrap();
        assert!(Parameter::new(1.5, prior.clone(), true).is_err());
        // fixed values are not checked against the prior
        assert!(Parameter::new(1.5, prior, false).is_ok());
        let gamma = ContinuousDistribution::gamma(1.0, 1.0).unwrap();
        assert!(Parameter::new(f64::INFINITY, gamma, false).is_err());
    }
}
