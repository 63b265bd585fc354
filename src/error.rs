//! Error type shared by every module of the sampler.

use std::fmt::{self, Display};

use thiserror::Error;

/// Where in the model a numerical failure was detected.
///
/// Every field is optional because a failure may be attributable to an
/// operator, a comparison, an event, or any combination of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Site {
    pub operator: Option<String>,
    pub comparison: Option<String>,
    pub event: Option<usize>,
}

impl Site {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operator(mut self, operator: impl Into<String>) -> Self {
        self.operator = Some(operator.into());
        self
    }

    pub fn with_comparison(mut self, comparison: impl Into<String>) -> Self {
        self.comparison = Some(comparison.into());
        self
    }

    pub fn with_event(mut self, event: usize) -> Self {
        self.event = Some(event);
        self
    }
}

impl Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(op) = &self.operator {
            parts.push(format!("operator {op}"));
        }
        if let Some(label) = &self.comparison {
            parts.push(format!("comparison '{label}'"));
        }
        if let Some(event) = self.event {
            parts.push(format!("event {event}"));
        }
        if parts.is_empty() {
            write!(f, "initial state")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Canonical error type of the crate.
///
/// Configuration errors are raised before the first iteration. Numerical
/// errors abort the run and name the operator, comparison, or event that
/// produced the offending value.
#[derive(Debug, Error)]
pub enum McmcError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("non-finite {quantity} ({value}) at generation {generation} ({site})")]
    NonFinite {
        quantity: &'static str,
        value: f64,
        generation: usize,
        site: Site,
    },

    #[error("malformed state log: {0}")]
    Log(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to parse configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl McmcError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        McmcError::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, McmcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_finite_message_names_the_site() {
        let err = McmcError::NonFinite {
            quantity: "ln likelihood",
            value: f64::NAN,
            generation: 12,
            site: Site::new()
                .with_operator("EventTimeScaler")
                .with_comparison("pair1")
                .with_event(2),
        };
        let msg = err.to_string();
        assert!(msg.contains("generation 12"), "unexpected message: {msg}");
        assert!(msg.contains("EventTimeScaler"), "unexpected message: {msg}");
        assert!(msg.contains("comparison 'pair1'"), "unexpected message: {msg}");
        assert!(msg.contains("event 2"), "unexpected message: {msg}");
    }

    #[test]
    fn empty_site_reads_as_initial_state() {
        assert_eq!(Site::new().to_string(), "initial state");
    }
}
