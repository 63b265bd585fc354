//! Self-tuning of operator step sizes.
//!
//! While adapting, an operator accumulates the acceptance probability of its
//! proposals. Every `batch` proposals the log of the tuning value moves by
//! `(rate - target) / k`, `k` being the number of updates so far, so the
//! adaptation fades out. Once frozen the value never changes again.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningPhase {
    Adapting,
    Frozen,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tuning {
    value: f64,
    target: f64,
    batch: usize,
    phase: TuningPhase,
    proposals_since_update: usize,
    acceptance_since_update: f64,
    updates: usize,
}

impl Tuning {
    pub fn new(value: f64, target: f64, batch: usize) -> Self {
        Self {
            value,
            target,
            batch: batch.max(1),
            phase: TuningPhase::Adapting,
            proposals_since_update: 0,
            acceptance_since_update: 0.0,
            updates: 0,
        }
    }

    /// A tuning that never adapts.
    pub fn frozen(value: f64, target: f64) -> Self {
        Self {
            phase: TuningPhase::Frozen,
            ..Self::new(value, target, 1)
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn target(&self) -> f64 {
        self.target
    }

    pub fn phase(&self) -> TuningPhase {
        self.phase
    }

    pub fn updates(&self) -> usize {
        self.updates
    }

    pub fn freeze(&mut self) {
        self.phase = TuningPhase::Frozen;
        self.proposals_since_update = 0;
        self.acceptance_since_update = 0.0;
    }

    /// Records one proposal with acceptance probability `acceptance`
    /// (already capped at one). No-op once frozen.
    pub fn observe(&mut self, acceptance: f64) {
        if self.phase == TuningPhase::Frozen {
            return;
        }
        self.proposals_since_update += 1;
        self.acceptance_since_update += acceptance;
        if self.proposals_since_update >= self.batch {
            let rate = self.acceptance_since_update / self.proposals_since_update as f64;
            self.updates += 1;
            let delta = (rate - self.target) / self.updates as f64;
            self.value = (self.value.ln() + delta).exp();
            self.proposals_since_update = 0;
            self.acceptance_since_update = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn accepting_everything_widens_the_step() {
        let mut t = Tuning::new(0.5, 0.44, 1);
        t.observe(1.0);
        assert_abs_diff_eq!(t.value(), 0.5 * (0.56_f64).exp(), epsilon = 1e-12);
        t.observe(1.0);
        assert_abs_diff_eq!(t.value(), 0.5 * (0.56_f64 + 0.28).exp(), epsilon = 1e-12);
        assert_eq!(t.updates(), 2);
    }

    #[test]
    fn batches_average_acceptance() {
        let mut t = Tuning::new(1.0, 0.25, 4);
        for a in [1.0, 0.0, 0.0, 0.0] {
            t.observe(a);
        }
        // rate equals target
        assert_abs_diff_eq!(t.value(), 1.0, epsilon = 1e-12);
        assert_eq!(t.updates(), 1);
    }

    #[test]
    fn frozen_tuning_ignores_observations() {
        let mut t = Tuning::new(0.3, 0.44, 1);
        t.freeze();
        t.observe(0.0);
        assert_eq!(t.value(), 0.3);
        assert_eq!(t.phase(), TuningPhase::Frozen);
        let f = Tuning::frozen(0.2, 0.44);
        assert_eq!(f.phase(), TuningPhase::Frozen);
    }
}
